/// Abstract Syntax Tree (AST) node types for SQL-like statements
///
/// Covers SELECT (with WHERE, GROUP BY, HAVING, ORDER BY, LIMIT) plus the
/// INSERT, UPDATE and DELETE forms that map onto Notion page writes.
use std::fmt;

use super::lexer::keyword;

/// A parsed statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Query),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

impl Statement {
    /// Table the statement targets
    pub fn table(&self) -> &str {
        match self {
            Statement::Select(q) => &q.from.table,
            Statement::Insert(s) => &s.table,
            Statement::Update(s) => &s.table,
            Statement::Delete(s) => &s.table,
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, Statement::Select(_))
    }
}

/// A complete SELECT query
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub select: SelectClause,
    pub from: FromClause,
    pub where_clause: Option<WhereClause>,
    pub group_by: Option<GroupByClause>,
    pub having: Option<HavingClause>,
    pub order_by: Option<OrderByClause>,
    pub limit: Option<LimitClause>,
}

/// INSERT INTO table (columns) VALUES (values)
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Literal>,
}

/// UPDATE table SET column = value, ... [WHERE ...]
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: String,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<WhereClause>,
}

/// One `column = value` pair of an UPDATE
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Literal,
}

/// DELETE FROM table [WHERE ...]
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: String,
    pub where_clause: Option<WhereClause>,
}

/// SELECT clause specifying columns to retrieve
#[derive(Debug, Clone, PartialEq)]
pub struct SelectClause {
    pub columns: Vec<SelectColumn>,
}

/// A column in the SELECT clause
#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    /// SELECT * - all columns
    Wildcard,
    /// SELECT column_name or SELECT column_name AS alias
    Column { name: String, alias: Option<String> },
    /// SELECT COUNT(*), SUM(column), etc.
    Aggregate {
        function: AggregateFunction,
        column: Box<SelectColumn>,
        alias: Option<String>,
    },
}

impl SelectColumn {
    /// Output column name of an aggregate before aliasing, e.g. `COUNT(*)`
    pub fn display_name(&self) -> String {
        match self {
            SelectColumn::Wildcard => "*".to_string(),
            SelectColumn::Column { name, .. } => name.clone(),
            SelectColumn::Aggregate {
                function, column, ..
            } => format!("{}({})", function, column.display_name()),
        }
    }
}

/// Aggregate functions
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// FROM clause naming the single table
#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub table: String,
}

/// WHERE clause for filtering
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub condition: Expression,
}

/// GROUP BY clause
#[derive(Debug, Clone, PartialEq)]
pub struct GroupByClause {
    pub columns: Vec<String>,
}

/// HAVING clause, evaluated against grouped rows
#[derive(Debug, Clone, PartialEq)]
pub struct HavingClause {
    pub condition: Expression,
}

/// Boolean expression for WHERE and HAVING conditions
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Column reference
    Column(String),
    /// Literal value
    Literal(Literal),
    /// Binary operation: column = value, column > value, etc.
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    /// Logical AND/OR
    LogicalOp {
        left: Box<Expression>,
        op: LogicalOperator,
        right: Box<Expression>,
    },
    /// NOT expression
    Not(Box<Expression>),
    /// LIKE pattern matching
    Like {
        expr: Box<Expression>,
        pattern: String,
    },
    /// IN (value1, value2, ...)
    In {
        expr: Box<Expression>,
        values: Vec<Literal>,
    },
    /// BETWEEN min AND max
    Between {
        expr: Box<Expression>,
        min: Box<Expression>,
        max: Box<Expression>,
    },
    /// IS NULL / IS NOT NULL
    IsNull {
        expr: Box<Expression>,
        negated: bool,
    },
}

/// Binary comparison operators
#[derive(Debug, Clone, PartialEq)]
pub enum BinaryOperator {
    Eq, // =
    Ne, // != or <>
    Lt, // <
    Le, // <=
    Gt, // >
    Ge, // >=
}

/// Logical operators
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalOperator {
    And,
    Or,
}

/// Literal values in statements
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
}

impl Literal {
    /// JSON form handed to the property encoder
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Literal::Integer(i) => serde_json::Value::from(*i),
            Literal::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Literal::String(s) => serde_json::Value::String(s.clone()),
            Literal::Boolean(b) => serde_json::Value::Bool(*b),
            Literal::Null => serde_json::Value::Null,
        }
    }
}

/// ORDER BY clause for sorting
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByClause {
    pub columns: Vec<OrderByColumn>,
}

/// A column in ORDER BY
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByColumn {
    pub column: String,
    pub direction: OrderDirection,
}

/// Sort direction
#[derive(Debug, Clone, PartialEq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// LIMIT clause for result limiting
#[derive(Debug, Clone, PartialEq)]
pub struct LimitClause {
    pub count: usize,
    pub offset: Option<usize>,
}

/// Writes an identifier, quoting it when it is not a bare word or is a keyword.
struct Ident<'a>(&'a str);

impl fmt::Display for Ident<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bare = !self.0.is_empty()
            && self.0.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
            && self
                .0
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '.');
        let upper = self.0.to_uppercase();
        if bare && upper != "ORDER" && keyword(&upper).is_none() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "\"{}\"", self.0.replace('"', "\"\""))
        }
    }
}

// Display implementations for logging and error messages

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Select(q) => write!(f, "{}", q),
            Statement::Insert(s) => write!(f, "{}", s),
            Statement::Update(s) => write!(f, "{}", s),
            Statement::Delete(s) => write!(f, "{}", s),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.select, self.from)?;
        if let Some(ref where_clause) = self.where_clause {
            write!(f, " {}", where_clause)?;
        }
        if let Some(ref group_by) = self.group_by {
            write!(f, " GROUP BY ")?;
            for (i, col) in group_by.columns.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", Ident(col))?;
            }
        }
        if let Some(ref having) = self.having {
            write!(f, " HAVING {}", having.condition)?;
        }
        if let Some(ref order_by) = self.order_by {
            write!(f, " {}", order_by)?;
        }
        if let Some(ref limit) = self.limit {
            write!(f, " {}", limit)?;
        }
        Ok(())
    }
}

impl fmt::Display for InsertStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INSERT INTO {} (", Ident(&self.table))?;
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", Ident(col))?;
        }
        write!(f, ") VALUES (")?;
        for (i, val) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", val)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for UpdateStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UPDATE {} SET ", Ident(&self.table))?;
        for (i, a) in self.assignments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = {}", Ident(&a.column), a.value)?;
        }
        if let Some(ref where_clause) = self.where_clause {
            write!(f, " {}", where_clause)?;
        }
        Ok(())
    }
}

impl fmt::Display for DeleteStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DELETE FROM {}", Ident(&self.table))?;
        if let Some(ref where_clause) = self.where_clause {
            write!(f, " {}", where_clause)?;
        }
        Ok(())
    }
}

impl fmt::Display for SelectClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", col)?;
        }
        Ok(())
    }
}

impl fmt::Display for SelectColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectColumn::Wildcard => write!(f, "*"),
            SelectColumn::Column { name, alias } => {
                write!(f, "{}", Ident(name))?;
                if let Some(ref alias) = alias {
                    write!(f, " AS {}", Ident(alias))?;
                }
                Ok(())
            }
            SelectColumn::Aggregate {
                function,
                column,
                alias,
            } => {
                write!(f, "{}({})", function, column)?;
                if let Some(ref alias) = alias {
                    write!(f, " AS {}", Ident(alias))?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunction::Count => write!(f, "COUNT"),
            AggregateFunction::Sum => write!(f, "SUM"),
            AggregateFunction::Avg => write!(f, "AVG"),
            AggregateFunction::Min => write!(f, "MIN"),
            AggregateFunction::Max => write!(f, "MAX"),
        }
    }
}

impl fmt::Display for FromClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FROM {}", Ident(&self.table))
    }
}

impl fmt::Display for WhereClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WHERE {}", self.condition)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Column(name) => write!(f, "{}", Ident(name)),
            Expression::Literal(lit) => write!(f, "{}", lit),
            Expression::BinaryOp { left, op, right } => {
                write!(f, "({} {} {})", left, op, right)
            }
            Expression::LogicalOp { left, op, right } => {
                write!(f, "({} {} {})", left, op, right)
            }
            Expression::Not(expr) => write!(f, "NOT ({})", expr),
            Expression::Like { expr, pattern } => {
                write!(f, "{} LIKE '{}'", expr, pattern.replace('\'', "''"))
            }
            Expression::In { expr, values } => {
                write!(f, "{} IN (", expr)?;
                for (i, val) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", val)?;
                }
                write!(f, ")")
            }
            Expression::Between { expr, min, max } => {
                write!(f, "{} BETWEEN {} AND {}", expr, min, max)
            }
            Expression::IsNull { expr, negated } => {
                if *negated {
                    write!(f, "{} IS NOT NULL", expr)
                } else {
                    write!(f, "{} IS NULL", expr)
                }
            }
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOperator::Eq => write!(f, "="),
            BinaryOperator::Ne => write!(f, "!="),
            BinaryOperator::Lt => write!(f, "<"),
            BinaryOperator::Le => write!(f, "<="),
            BinaryOperator::Gt => write!(f, ">"),
            BinaryOperator::Ge => write!(f, ">="),
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => write!(f, "AND"),
            LogicalOperator::Or => write!(f, "OR"),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(i) => write!(f, "{}", i),
            // plain decimal with a dot, so the lexer reads it back as a float
            Literal::Float(fl) => {
                let text = fl.to_string();
                if text.contains('.') {
                    write!(f, "{}", text)
                } else {
                    write!(f, "{}.0", text)
                }
            }
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "NULL"),
        }
    }
}

impl fmt::Display for OrderByClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ORDER BY ")?;
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", col)?;
        }
        Ok(())
    }
}

impl fmt::Display for OrderByColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", Ident(&self.column), self.direction)
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

impl fmt::Display for LimitClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LIMIT {}", self.count)?;
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {}", offset)?;
        }
        Ok(())
    }
}
