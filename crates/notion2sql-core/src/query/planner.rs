/// Query planner
///
/// Validates a SELECT and turns it into a tree of physical operators.
/// Rows are sorted and limited before projection, so ORDER BY may name
/// columns that are not selected.
use super::ast::*;
use std::fmt;

/// Physical query plan
#[derive(Debug, Clone)]
pub struct PhysicalPlan {
    pub root: PhysicalOperator,
}

/// Physical operators for query execution
#[derive(Debug, Clone)]
pub enum PhysicalOperator {
    /// Full scan of the cached table
    TableScan { table: String },
    /// Filter rows based on predicate
    Filter {
        input: Box<PhysicalOperator>,
        condition: Expression,
    },
    /// Sort rows
    Sort {
        input: Box<PhysicalOperator>,
        columns: Vec<OrderByColumn>,
    },
    /// Limit number of results
    Limit {
        input: Box<PhysicalOperator>,
        count: usize,
        offset: usize,
    },
    /// Project columns (SELECT specific columns)
    Project {
        input: Box<PhysicalOperator>,
        columns: Vec<SelectColumn>,
    },
    /// GROUP BY, one output row per distinct key
    GroupBy {
        input: Box<PhysicalOperator>,
        group_columns: Vec<String>,
        outputs: Vec<SelectColumn>,
    },
    /// Aggregation without grouping, always one output row
    Aggregate {
        input: Box<PhysicalOperator>,
        aggregates: Vec<SelectColumn>,
    },
}

/// Query planner
#[derive(Debug, Clone, Default)]
pub struct Planner {
    /// Table name queries must target, when restricted
    table: Option<String>,
}

impl Planner {
    /// Create a planner that accepts any table name
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a planner that only accepts `table` (case-insensitive)
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
        }
    }

    /// Check the target table of any statement.
    pub fn check_table(&self, table: &str) -> Result<(), PlanError> {
        match &self.table {
            Some(expected) if !expected.eq_ignore_ascii_case(table) => {
                Err(PlanError::UnknownTable(table.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Plan a query
    pub fn plan(&self, query: &Query) -> Result<PhysicalPlan, PlanError> {
        self.check_table(&query.from.table)?;
        validate_select(query)?;

        let mut plan = PhysicalOperator::TableScan {
            table: query.from.table.clone(),
        };

        if let Some(ref where_clause) = query.where_clause {
            plan = PhysicalOperator::Filter {
                input: Box::new(plan),
                condition: where_clause.condition.clone(),
            };
        }

        let has_aggregates = query
            .select
            .columns
            .iter()
            .any(|col| matches!(col, SelectColumn::Aggregate { .. }));

        if query.group_by.is_some() || has_aggregates {
            plan = match query.group_by {
                Some(ref group_by) => PhysicalOperator::GroupBy {
                    input: Box::new(plan),
                    group_columns: group_by.columns.clone(),
                    outputs: query.select.columns.clone(),
                },
                None => PhysicalOperator::Aggregate {
                    input: Box::new(plan),
                    aggregates: query.select.columns.clone(),
                },
            };

            if let Some(ref having) = query.having {
                plan = PhysicalOperator::Filter {
                    input: Box::new(plan),
                    condition: having.condition.clone(),
                };
            }

            // Aggregate rows already carry their output names and aliases
            plan = self.apply_sort_and_limit(plan, query, |column| column.to_string());
            return Ok(PhysicalPlan { root: plan });
        }

        if query.having.is_some() {
            return Err(PlanError::InvalidExpression(
                "HAVING requires GROUP BY or an aggregate".to_string(),
            ));
        }

        // Sorting happens before projection, so aliases resolve to source columns
        let aliases: Vec<(String, String)> = query
            .select
            .columns
            .iter()
            .filter_map(|col| match col {
                SelectColumn::Column {
                    name,
                    alias: Some(alias),
                } => Some((alias.clone(), name.clone())),
                _ => None,
            })
            .collect();
        plan = self.apply_sort_and_limit(plan, query, |column| {
            aliases
                .iter()
                .find(|(alias, _)| alias == column)
                .or_else(|| {
                    aliases
                        .iter()
                        .find(|(alias, _)| alias.eq_ignore_ascii_case(column))
                })
                .map(|(_, name)| name.clone())
                .unwrap_or_else(|| column.to_string())
        });

        plan = PhysicalOperator::Project {
            input: Box::new(plan),
            columns: query.select.columns.clone(),
        };

        Ok(PhysicalPlan { root: plan })
    }

    fn apply_sort_and_limit(
        &self,
        mut plan: PhysicalOperator,
        query: &Query,
        resolve: impl Fn(&str) -> String,
    ) -> PhysicalOperator {
        if let Some(ref order_by) = query.order_by {
            plan = PhysicalOperator::Sort {
                input: Box::new(plan),
                columns: order_by
                    .columns
                    .iter()
                    .map(|col| OrderByColumn {
                        column: resolve(&col.column),
                        direction: col.direction.clone(),
                    })
                    .collect(),
            };
        }

        if let Some(ref limit) = query.limit {
            plan = PhysicalOperator::Limit {
                input: Box::new(plan),
                count: limit.count,
                offset: limit.offset.unwrap_or(0),
            };
        }

        plan
    }
}

/// Reject SELECT lists that cannot be evaluated.
fn validate_select(query: &Query) -> Result<(), PlanError> {
    let mut has_aggregates = false;
    let mut plain_columns = Vec::new();
    let mut has_wildcard = false;

    for col in &query.select.columns {
        match col {
            SelectColumn::Wildcard => has_wildcard = true,
            SelectColumn::Column { name, .. } => plain_columns.push(name),
            SelectColumn::Aggregate {
                function, column, ..
            } => {
                has_aggregates = true;
                if matches!(column.as_ref(), SelectColumn::Wildcard)
                    && *function != AggregateFunction::Count
                {
                    return Err(PlanError::InvalidExpression(format!(
                        "{}(*) is not supported, only COUNT(*)",
                        function
                    )));
                }
            }
        }
    }

    match query.group_by {
        Some(ref group_by) => {
            if has_wildcard {
                return Err(PlanError::InvalidExpression(
                    "SELECT * cannot be combined with GROUP BY".to_string(),
                ));
            }
            for name in plain_columns {
                if !group_by
                    .columns
                    .iter()
                    .any(|g| g.eq_ignore_ascii_case(name))
                {
                    return Err(PlanError::InvalidExpression(format!(
                        "column '{}' must appear in GROUP BY or an aggregate",
                        name
                    )));
                }
            }
        }
        None if has_aggregates => {
            if has_wildcard || !plain_columns.is_empty() {
                return Err(PlanError::InvalidExpression(
                    "aggregates cannot be mixed with plain columns without GROUP BY".to_string(),
                ));
            }
        }
        None => {}
    }

    Ok(())
}

/// Planning errors
#[derive(Debug, Clone, PartialEq)]
pub enum PlanError {
    UnknownTable(String),
    InvalidExpression(String),
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::UnknownTable(table) => write!(f, "Unknown table: {}", table),
            PlanError::InvalidExpression(expr) => write!(f, "Invalid expression: {}", expr),
        }
    }
}

impl std::error::Error for PlanError {}

impl fmt::Display for PhysicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for PhysicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicalOperator::TableScan { table } => write!(f, "TableScan({})", table),
            PhysicalOperator::Filter { input, condition } => {
                write!(f, "Filter({}) -> {}", condition, input)
            }
            PhysicalOperator::Sort { input, columns } => {
                write!(f, "Sort(")?;
                write_list(f, columns)?;
                write!(f, ") -> {}", input)
            }
            PhysicalOperator::Limit {
                input,
                count,
                offset,
            } => {
                write!(f, "Limit({}, {}) -> {}", count, offset, input)
            }
            PhysicalOperator::Project { input, columns } => {
                write!(f, "Project(")?;
                write_list(f, columns)?;
                write!(f, ") -> {}", input)
            }
            PhysicalOperator::GroupBy {
                input,
                group_columns,
                outputs,
            } => {
                write!(f, "GroupBy(")?;
                write_list(f, group_columns)?;
                write!(f, " | ")?;
                write_list(f, outputs)?;
                write!(f, ") -> {}", input)
            }
            PhysicalOperator::Aggregate { input, aggregates } => {
                write!(f, "Aggregate(")?;
                write_list(f, aggregates)?;
                write!(f, ") -> {}", input)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;

    fn plan(sql: &str) -> Result<PhysicalPlan, PlanError> {
        match parse(sql).unwrap() {
            Statement::Select(query) => Planner::for_table("notion_data").plan(&query),
            other => panic!("expected SELECT, got {:?}", other),
        }
    }

    #[test]
    fn test_simple_plan() {
        let plan = plan("SELECT * FROM notion_data").unwrap();

        match plan.root {
            PhysicalOperator::Project { input, .. } => {
                assert!(matches!(*input, PhysicalOperator::TableScan { .. }))
            }
            other => panic!("Expected Project, got {}", other),
        }
    }

    #[test]
    fn test_operator_order() {
        let plan = plan("SELECT Name FROM notion_data WHERE Score > 1 ORDER BY Score LIMIT 2").unwrap();
        assert_eq!(
            plan.to_string(),
            "Project(Name) -> Limit(2, 0) -> Sort(Score ASC) -> Filter((Score > 1)) -> TableScan(notion_data)"
        );
    }

    #[test]
    fn test_order_by_alias_resolves_to_source_column() {
        let plan = plan("SELECT Score AS points FROM notion_data ORDER BY points DESC").unwrap();
        assert!(plan.to_string().contains("Sort(Score DESC)"));
    }

    #[test]
    fn test_group_by_plan() {
        let plan = plan(
            "SELECT Status, COUNT(*) AS n FROM notion_data GROUP BY Status HAVING n > 1 ORDER BY n",
        )
        .unwrap();
        let text = plan.to_string();
        assert!(text.starts_with("Sort(n ASC) -> Filter((n > 1)) -> GroupBy(Status"));
    }

    #[test]
    fn test_unknown_table() {
        assert_eq!(
            plan("SELECT * FROM other").unwrap_err(),
            PlanError::UnknownTable("other".to_string())
        );
        assert!(plan("SELECT * FROM NOTION_DATA").is_ok());
    }

    #[test]
    fn test_invalid_select_lists() {
        assert!(plan("SELECT Name, COUNT(*) FROM notion_data").is_err());
        assert!(plan("SELECT Name FROM notion_data GROUP BY Status").is_err());
        assert!(plan("SELECT * FROM notion_data GROUP BY Status").is_err());
        assert!(plan("SELECT SUM(*) FROM notion_data").is_err());
        assert!(plan("SELECT Name FROM notion_data HAVING Name = 'x'").is_err());
    }
}
