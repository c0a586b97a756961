/// Query executor
///
/// Evaluates physical plans over in-memory rows.
use super::ast::*;
use super::planner::{PhysicalOperator, PhysicalPlan};
use super::value::{Column, Row, Value};
use crate::error::{Error, Result};
use regex::Regex;
use tracing::trace;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Tables visible to the executor
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub data: HashMap<String, Vec<Row>>,
}

impl ExecutionContext {
    /// Creates a new execution context
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a table.
    pub fn insert_table(&mut self, name: impl Into<String>, rows: Vec<Row>) {
        self.data.insert(name.into(), rows);
    }

    /// Look a table up by name, exact match first.
    pub fn table(&self, name: &str) -> Option<&Vec<Row>> {
        self.data.get(name).or_else(|| {
            self.data
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, rows)| rows)
        })
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Vec<Row>> {
        let key = if self.data.contains_key(name) {
            name.to_string()
        } else {
            self.data
                .keys()
                .find(|key| key.eq_ignore_ascii_case(name))?
                .clone()
        };
        self.data.get_mut(&key)
    }
}

/// Query executor
pub struct Executor<'a> {
    context: &'a ExecutionContext,
    /// Compiled LIKE patterns
    patterns: RefCell<HashMap<String, Regex>>,
}

impl<'a> Executor<'a> {
    /// Create new executor
    pub fn new(context: &'a ExecutionContext) -> Self {
        Self {
            context,
            patterns: RefCell::new(HashMap::new()),
        }
    }

    /// Execute a physical plan
    pub fn execute(&self, plan: &PhysicalPlan) -> Result<Vec<Row>> {
        self.execute_operator(&plan.root)
    }

    /// Rows of `table` satisfying `condition`; all rows when there is none.
    pub fn matching_rows(&self, table: &str, condition: Option<&Expression>) -> Result<Vec<Row>> {
        let rows = self.execute_table_scan(table)?;
        match condition {
            Some(condition) => self.filter(rows, condition),
            None => Ok(rows),
        }
    }

    fn execute_operator(&self, op: &PhysicalOperator) -> Result<Vec<Row>> {
        match op {
            PhysicalOperator::TableScan { table } => self.execute_table_scan(table),
            PhysicalOperator::Filter { input, condition } => {
                let rows = self.execute_operator(input)?;
                self.filter(rows, condition)
            }
            PhysicalOperator::Sort { input, columns } => self.execute_sort(input, columns),
            PhysicalOperator::Limit {
                input,
                count,
                offset,
            } => {
                let rows = self.execute_operator(input)?;
                Ok(rows.into_iter().skip(*offset).take(*count).collect())
            }
            PhysicalOperator::Project { input, columns } => self.execute_project(input, columns),
            PhysicalOperator::GroupBy {
                input,
                group_columns,
                outputs,
            } => self.execute_group_by(input, group_columns, outputs),
            PhysicalOperator::Aggregate { input, aggregates } => {
                let rows = self.execute_operator(input)?;
                Ok(vec![self.aggregate_row(&rows, &[], &[], aggregates)?])
            }
        }
    }

    fn execute_table_scan(&self, table: &str) -> Result<Vec<Row>> {
        self.context
            .table(table)
            .cloned()
            .ok_or_else(|| Error::Query(format!("unknown table '{}'", table)))
    }

    fn filter(&self, rows: Vec<Row>, condition: &Expression) -> Result<Vec<Row>> {
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            if self.evaluate_condition(&row, condition)? {
                kept.push(row);
            }
        }
        Ok(kept)
    }

    fn execute_sort(&self, input: &PhysicalOperator, columns: &[OrderByColumn]) -> Result<Vec<Row>> {
        let mut rows = self.execute_operator(input)?;
        if rows.is_empty() {
            return Ok(rows);
        }

        let first = &rows[0];
        let keys = columns
            .iter()
            .map(|col| {
                first
                    .position(&col.column)
                    .map(|idx| (idx, &col.direction))
                    .ok_or_else(|| unknown_column(&col.column))
            })
            .collect::<Result<Vec<_>>>()?;

        rows.sort_by(|a, b| {
            for (idx, direction) in &keys {
                let ordering = a.values[*idx].sort_cmp(&b.values[*idx]);
                let ordering = match direction {
                    OrderDirection::Asc => ordering,
                    OrderDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        Ok(rows)
    }

    fn execute_project(&self, input: &PhysicalOperator, columns: &[SelectColumn]) -> Result<Vec<Row>> {
        let rows = self.execute_operator(input)?;

        rows.into_iter()
            .map(|row| {
                let mut new_columns = Vec::new();
                let mut new_values = Vec::new();

                for col in columns {
                    match col {
                        SelectColumn::Wildcard => {
                            new_columns.extend(row.columns.iter().cloned());
                            new_values.extend(row.values.iter().cloned());
                        }
                        SelectColumn::Column { name, alias } => {
                            let idx = row.position(name).ok_or_else(|| unknown_column(name))?;
                            new_columns.push(Column {
                                name: row.columns[idx].name.clone(),
                                alias: alias.clone(),
                            });
                            new_values.push(row.values[idx].clone());
                        }
                        SelectColumn::Aggregate { .. } => {
                            return Err(Error::Query(
                                "aggregate outside of an aggregation".to_string(),
                            ))
                        }
                    }
                }

                Ok(Row::new(new_columns, new_values))
            })
            .collect()
    }

    fn execute_group_by(
        &self,
        input: &PhysicalOperator,
        group_columns: &[String],
        outputs: &[SelectColumn],
    ) -> Result<Vec<Row>> {
        let rows = self.execute_operator(input)?;

        // Value is not hashable, groups are found by linear search in first-seen order
        let mut groups: Vec<(Vec<Value>, Vec<Row>)> = Vec::new();
        for row in rows {
            let key = group_columns
                .iter()
                .map(|name| row.get(name).cloned().ok_or_else(|| unknown_column(name)))
                .collect::<Result<Vec<_>>>()?;
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(row),
                None => groups.push((key, vec![row])),
            }
        }

        groups
            .iter()
            .map(|(key, members)| self.aggregate_row(members, group_columns, key, outputs))
            .collect()
    }

    /// One output row of an aggregation over `rows`.
    fn aggregate_row(
        &self,
        rows: &[Row],
        group_columns: &[String],
        key: &[Value],
        outputs: &[SelectColumn],
    ) -> Result<Row> {
        let mut columns = Vec::new();
        let mut values = Vec::new();

        for output in outputs {
            match output {
                SelectColumn::Column { name, alias } => {
                    let idx = group_columns
                        .iter()
                        .position(|g| g.eq_ignore_ascii_case(name))
                        .ok_or_else(|| unknown_column(name))?;
                    columns.push(Column {
                        name: name.clone(),
                        alias: alias.clone(),
                    });
                    values.push(key[idx].clone());
                }
                SelectColumn::Aggregate {
                    function,
                    column,
                    alias,
                } => {
                    columns.push(Column {
                        name: output.display_name(),
                        alias: alias.clone(),
                    });
                    values.push(compute_aggregate(function, column, rows)?);
                }
                SelectColumn::Wildcard => {
                    return Err(Error::Query(
                        "SELECT * cannot be used with aggregates".to_string(),
                    ))
                }
            }
        }

        Ok(Row::new(columns, values))
    }

    fn evaluate_condition(&self, row: &Row, condition: &Expression) -> Result<bool> {
        match condition {
            Expression::Column(_) | Expression::Literal(_) => {
                Ok(truthy(&self.evaluate_expression(row, condition)?))
            }
            Expression::BinaryOp { left, op, right } => {
                let left_val = self.evaluate_expression(row, left)?;
                let right_val = self.evaluate_expression(row, right)?;
                Ok(left_val.compare(&right_val, op))
            }
            Expression::LogicalOp { left, op, right } => {
                let left_result = self.evaluate_condition(row, left)?;
                match op {
                    LogicalOperator::And if !left_result => Ok(false),
                    LogicalOperator::Or if left_result => Ok(true),
                    _ => self.evaluate_condition(row, right),
                }
            }
            Expression::Not(expr) => Ok(!self.evaluate_condition(row, expr)?),
            Expression::Like { expr, pattern } => {
                let value = self.evaluate_expression(row, expr)?;
                let regex = self.like_pattern(pattern)?;
                Ok(like_matches(&regex, &value))
            }
            Expression::In { expr, values } => {
                let value = self.evaluate_expression(row, expr)?;
                Ok(values
                    .iter()
                    .any(|lit| value.compare(&Value::from(lit), &BinaryOperator::Eq)))
            }
            Expression::Between { expr, min, max } => {
                let value = self.evaluate_expression(row, expr)?;
                let min = self.evaluate_expression(row, min)?;
                let max = self.evaluate_expression(row, max)?;
                Ok(value.compare(&min, &BinaryOperator::Ge)
                    && value.compare(&max, &BinaryOperator::Le))
            }
            Expression::IsNull { expr, negated } => {
                let value = self.evaluate_expression(row, expr)?;
                Ok(is_empty(&value) != *negated)
            }
        }
    }

    fn evaluate_expression(&self, row: &Row, expr: &Expression) -> Result<Value> {
        match expr {
            Expression::Column(name) => row.get(name).cloned().ok_or_else(|| unknown_column(name)),
            Expression::Literal(lit) => Ok(Value::from(lit)),
            other => Ok(Value::Boolean(self.evaluate_condition(row, other)?)),
        }
    }

    fn like_pattern(&self, pattern: &str) -> Result<Regex> {
        if let Some(regex) = self.patterns.borrow().get(pattern) {
            return Ok(regex.clone());
        }
        let regex = compile_like(pattern)?;
        trace!(pattern, regex = %regex, "compiled LIKE pattern");
        self.patterns
            .borrow_mut()
            .insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

fn unknown_column(name: &str) -> Error {
    Error::Query(format!("unknown column '{}'", name))
}

/// Translate a LIKE pattern (`%`, `_`) into a case-insensitive anchored regex.
pub fn compile_like(pattern: &str) -> Result<Regex> {
    let mut source = String::from("(?is)^");
    let mut literal = String::new();
    for ch in pattern.chars() {
        match ch {
            '%' | '_' => {
                source.push_str(&regex::escape(&literal));
                literal.clear();
                source.push_str(if ch == '%' { ".*" } else { "." });
            }
            _ => literal.push(ch),
        }
    }
    source.push_str(&regex::escape(&literal));
    source.push('$');
    Regex::new(&source).map_err(|e| Error::Query(format!("invalid LIKE pattern: {}", e)))
}

fn like_matches(regex: &Regex, value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => regex.is_match(s),
        Value::List(items) => items.iter().any(|item| like_matches(regex, item)),
        other => regex.is_match(&other.to_string()),
    }
}

/// NULL, empty text and empty lists all read as missing in Notion.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::List(items) => items.is_empty(),
        _ => false,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Boolean(b) => *b,
        Value::Integer(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::String(_) | Value::List(_) => !is_empty(value),
        Value::Null => false,
    }
}

fn compute_aggregate(function: &AggregateFunction, column: &SelectColumn, rows: &[Row]) -> Result<Value> {
    let name = match column {
        SelectColumn::Wildcard => {
            return match function {
                AggregateFunction::Count => Ok(Value::Integer(rows.len() as i64)),
                _ => Err(Error::Query(format!("{}(*) is not supported", function))),
            }
        }
        SelectColumn::Column { name, .. } => name,
        SelectColumn::Aggregate { .. } => {
            return Err(Error::Query("nested aggregates are not supported".to_string()))
        }
    };

    let mut values = Vec::with_capacity(rows.len());
    for row in rows {
        let value = row.get(name).ok_or_else(|| unknown_column(name))?;
        if !value.is_null() {
            values.push(value);
        }
    }

    let value = match function {
        AggregateFunction::Count => Value::Integer(values.len() as i64),
        AggregateFunction::Sum => sum(&values),
        AggregateFunction::Avg => {
            let numbers: Vec<f64> = values.iter().filter_map(|v| as_number(v)).collect();
            if numbers.is_empty() {
                Value::Null
            } else {
                Value::Float(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
        AggregateFunction::Min => values
            .iter()
            .min_by(|a, b| a.sort_cmp(b))
            .map(|v| (*v).clone())
            .unwrap_or(Value::Null),
        AggregateFunction::Max => values
            .iter()
            .max_by(|a, b| a.sort_cmp(b))
            .map(|v| (*v).clone())
            .unwrap_or(Value::Null),
    };

    Ok(value)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

/// Integer sum while every input is an integer and nothing overflows.
fn sum(values: &[&Value]) -> Value {
    let mut int_total: Option<i64> = Some(0);
    let mut float_total = 0.0;
    let mut seen = false;

    for value in values {
        match value {
            Value::Integer(i) => {
                int_total = int_total.and_then(|t| t.checked_add(*i));
                float_total += *i as f64;
                seen = true;
            }
            Value::Float(f) => {
                int_total = None;
                float_total += f;
                seen = true;
            }
            _ => {}
        }
    }

    match (seen, int_total) {
        (false, _) => Value::Null,
        (true, Some(total)) => Value::Integer(total),
        (true, None) => Value::Float(float_total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;
    use crate::query::planner::Planner;

    fn tasks() -> ExecutionContext {
        let names = ["id", "Name", "Status", "Score", "Tags"];
        let data = [
            ("1", "Write docs", "Done", Value::Integer(3), vec!["docs"]),
            ("2", "Fix bug", "Todo", Value::Float(5.5), vec!["bug", "urgent"]),
            ("3", "Review", "Done", Value::Integer(1), vec![]),
            ("4", "Plan", "Todo", Value::Null, vec!["urgent"]),
        ];

        let rows = data
            .into_iter()
            .map(|(id, name, status, score, tags)| {
                Row::new(
                    names.iter().map(|n| Column::new(*n)).collect(),
                    vec![
                        Value::String(id.to_string()),
                        Value::String(name.to_string()),
                        Value::String(status.to_string()),
                        score,
                        Value::List(tags.into_iter().map(|t| Value::String(t.into())).collect()),
                    ],
                )
            })
            .collect();

        let mut context = ExecutionContext::new();
        context.insert_table("notion_data", rows);
        context
    }

    fn run(sql: &str) -> Result<Vec<Row>> {
        let context = tasks();
        let Statement::Select(query) = parse(sql)? else {
            panic!("expected SELECT");
        };
        let plan = Planner::new().plan(&query)?;
        Executor::new(&context).execute(&plan)
    }

    fn names(rows: &[Row]) -> Vec<String> {
        rows.iter().map(|r| r.get("Name").unwrap().to_string()).collect()
    }

    #[test]
    fn test_table_scan() {
        let rows = run("SELECT * FROM notion_data").unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].len(), 5);
    }

    #[test]
    fn test_filter_and_projection() {
        let rows = run("SELECT Name AS title FROM notion_data WHERE status = 'Done'").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].columns[0].label(), "title");
        assert_eq!(rows[0].values, vec![Value::String("Write docs".into())]);
    }

    #[test]
    fn test_sort_by_unselected_column_with_nulls_first() {
        let rows = run("SELECT Name FROM notion_data ORDER BY Score").unwrap();
        assert_eq!(names(&rows), vec!["Plan", "Review", "Write docs", "Fix bug"]);

        let rows = run("SELECT Name FROM notion_data ORDER BY Score DESC LIMIT 2 OFFSET 1").unwrap();
        assert_eq!(names(&rows), vec!["Write docs", "Review"]);
    }

    #[test]
    fn test_like_is_case_insensitive() {
        let rows = run("SELECT Name FROM notion_data WHERE Name LIKE '%BUG'").unwrap();
        assert_eq!(names(&rows), vec!["Fix bug"]);
        let rows = run("SELECT Name FROM notion_data WHERE Name LIKE 'r_view'").unwrap();
        assert_eq!(names(&rows), vec!["Review"]);
    }

    #[test]
    fn test_list_membership_and_empty_checks() {
        let rows = run("SELECT Name FROM notion_data WHERE Tags = 'urgent'").unwrap();
        assert_eq!(names(&rows), vec!["Fix bug", "Plan"]);

        let rows = run("SELECT Name FROM notion_data WHERE Tags IN ('docs', 'bug')").unwrap();
        assert_eq!(names(&rows), vec!["Write docs", "Fix bug"]);

        let rows = run("SELECT Name FROM notion_data WHERE Tags IS NULL OR Score IS NULL").unwrap();
        assert_eq!(names(&rows), vec!["Review", "Plan"]);
    }

    #[test]
    fn test_between_and_null_comparisons() {
        let rows = run("SELECT Name FROM notion_data WHERE Score BETWEEN 1 AND 3").unwrap();
        assert_eq!(names(&rows), vec!["Write docs", "Review"]);

        let rows = run("SELECT Name FROM notion_data WHERE Score != 3").unwrap();
        assert_eq!(names(&rows), vec!["Fix bug", "Review"]);
    }

    #[test]
    fn test_aggregates() {
        let rows = run(
            "SELECT COUNT(*) AS n, COUNT(Score), SUM(Score), AVG(Score), MIN(Name), MAX(Score) FROM notion_data",
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.get("n"), Some(&Value::Integer(4)));
        assert_eq!(row.get("COUNT(Score)"), Some(&Value::Integer(3)));
        assert_eq!(row.get("SUM(Score)"), Some(&Value::Float(9.5)));
        assert_eq!(row.get("MIN(Name)"), Some(&Value::String("Fix bug".into())));
        assert_eq!(row.get("MAX(Score)"), Some(&Value::Float(5.5)));
        match row.get("AVG(Score)") {
            Some(Value::Float(avg)) => assert!((avg - 9.5 / 3.0).abs() < 1e-9),
            other => panic!("unexpected AVG {:?}", other),
        }
    }

    #[test]
    fn test_aggregate_over_no_rows() {
        let rows = run("SELECT COUNT(*), SUM(Score) FROM notion_data WHERE Name = 'nothing'").unwrap();
        assert_eq!(rows[0].values, vec![Value::Integer(0), Value::Null]);
    }

    #[test]
    fn test_group_by_having_order() {
        let rows = run(
            "SELECT Status, COUNT(*) AS n, SUM(Score) AS total FROM notion_data \
             GROUP BY Status HAVING COUNT(*) > 1 ORDER BY total DESC",
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Status"), Some(&Value::String("Todo".into())));
        assert_eq!(rows[0].get("total"), Some(&Value::Float(5.5)));
        assert_eq!(rows[1].get("total"), Some(&Value::Integer(4)));
    }

    #[test]
    fn test_unknown_column_is_an_error() {
        assert!(matches!(
            run("SELECT Missing FROM notion_data"),
            Err(Error::Query(_))
        ));
        assert!(matches!(
            run("SELECT * FROM notion_data WHERE Missing = 1"),
            Err(Error::Query(_))
        ));
    }

    #[test]
    fn test_matching_rows() {
        let context = tasks();
        let executor = Executor::new(&context);
        let Statement::Delete(delete) = parse("DELETE FROM notion_data WHERE id = '3'").unwrap() else {
            panic!("expected DELETE");
        };
        let condition = delete.where_clause.as_ref().map(|w| &w.condition);
        let rows = executor.matching_rows("NOTION_DATA", condition).unwrap();
        assert_eq!(names(&rows), vec!["Review"]);
        assert_eq!(executor.matching_rows("notion_data", None).unwrap().len(), 4);
    }

    #[test]
    fn test_compile_like_escapes_regex_syntax() {
        let regex = compile_like("a.b%").unwrap();
        assert!(regex.is_match("A.Bcd"));
        assert!(!regex.is_match("axbcd"));
    }
}
