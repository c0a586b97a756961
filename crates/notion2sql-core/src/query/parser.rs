/// Parser for SQL-like statements
///
/// Converts a stream of tokens into an Abstract Syntax Tree (AST).
use super::ast::*;
use super::lexer::{Lexer, LexerError, Token};
use std::fmt;

/// Parser for SQL-like statements
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    /// Create a new parser from SQL text
    pub fn new(input: &str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize().map_err(ParseError::LexerError)?;
        Ok(Self {
            tokens,
            position: 0,
        })
    }

    /// Parse a single statement, optionally terminated by `;`
    pub fn parse(&mut self) -> Result<Statement, ParseError> {
        let statement = match self.current_token() {
            Token::Select => Statement::Select(self.parse_query()?),
            Token::Insert => Statement::Insert(self.parse_insert()?),
            Token::Update => Statement::Update(self.parse_update()?),
            Token::Delete => Statement::Delete(self.parse_delete()?),
            Token::Eof => return Err(ParseError::EmptyStatement),
            token => {
                return Err(ParseError::UnexpectedToken {
                    expected: "SELECT, INSERT, UPDATE or DELETE".to_string(),
                    found: token.clone(),
                })
            }
        };

        if self.current_token() == &Token::Semicolon {
            self.advance();
        }
        self.expect_token(Token::Eof)?;

        Ok(statement)
    }

    fn parse_query(&mut self) -> Result<Query, ParseError> {
        let select = self.parse_select()?;
        let from = self.parse_from()?;
        let where_clause = self.parse_where()?;
        let group_by = self.parse_group_by()?;
        let having = self.parse_having()?;
        let order_by = self.parse_order_by()?;
        let limit = self.parse_limit()?;

        Ok(Query {
            select,
            from,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
        })
    }

    fn parse_insert(&mut self) -> Result<InsertStatement, ParseError> {
        self.expect_token(Token::Insert)?;
        self.expect_token(Token::Into)?;
        let table = self.parse_identifier("table name")?;

        self.expect_token(Token::LeftParen)?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_identifier("column name")?);
            if self.current_token() == &Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_token(Token::RightParen)?;

        self.expect_token(Token::Values)?;
        self.expect_token(Token::LeftParen)?;
        let mut values = Vec::new();
        loop {
            values.push(self.parse_literal()?);
            if self.current_token() == &Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_token(Token::RightParen)?;

        if columns.len() != values.len() {
            return Err(ParseError::ColumnCountMismatch {
                columns: columns.len(),
                values: values.len(),
            });
        }

        Ok(InsertStatement {
            table,
            columns,
            values,
        })
    }

    fn parse_update(&mut self) -> Result<UpdateStatement, ParseError> {
        self.expect_token(Token::Update)?;
        let table = self.parse_identifier("table name")?;
        self.expect_token(Token::Set)?;

        let mut assignments = Vec::new();
        loop {
            let column = self.parse_identifier("column name")?;
            self.expect_token(Token::Eq)?;
            let value = self.parse_literal()?;
            assignments.push(Assignment { column, value });

            if self.current_token() == &Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        let where_clause = self.parse_where()?;

        Ok(UpdateStatement {
            table,
            assignments,
            where_clause,
        })
    }

    fn parse_delete(&mut self) -> Result<DeleteStatement, ParseError> {
        self.expect_token(Token::Delete)?;
        self.expect_token(Token::From)?;
        let table = self.parse_identifier("table name")?;
        let where_clause = self.parse_where()?;

        Ok(DeleteStatement {
            table,
            where_clause,
        })
    }

    fn parse_select(&mut self) -> Result<SelectClause, ParseError> {
        self.expect_token(Token::Select)?;

        let mut columns = Vec::new();

        loop {
            if self.current_token() == &Token::Asterisk {
                self.advance();
                columns.push(SelectColumn::Wildcard);
            } else if self.at_aggregate_call() {
                let (function, column) = self.parse_aggregate_call()?;
                let alias = self.parse_alias()?;
                columns.push(SelectColumn::Aggregate {
                    function,
                    column: Box::new(column),
                    alias,
                });
            } else if self.current_token() == &Token::From {
                return Err(ParseError::EmptySelectList);
            } else {
                let name = self.parse_identifier("column name or *")?;
                let alias = self.parse_alias()?;
                columns.push(SelectColumn::Column { name, alias });
            }

            if self.current_token() == &Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        Ok(SelectClause { columns })
    }

    fn at_aggregate_call(&self) -> bool {
        self.current_token().aggregate_name().is_some() && self.peek_token() == &Token::LeftParen
    }

    /// `FUNC(*)` or `FUNC(column)`
    fn parse_aggregate_call(&mut self) -> Result<(AggregateFunction, SelectColumn), ParseError> {
        let function = match self.current_token() {
            Token::Count => AggregateFunction::Count,
            Token::Sum => AggregateFunction::Sum,
            Token::Avg => AggregateFunction::Avg,
            Token::Min => AggregateFunction::Min,
            Token::Max => AggregateFunction::Max,
            token => {
                return Err(ParseError::UnexpectedToken {
                    expected: "aggregate function".to_string(),
                    found: token.clone(),
                })
            }
        };
        self.advance();

        self.expect_token(Token::LeftParen)?;
        let column = if self.current_token() == &Token::Asterisk {
            self.advance();
            SelectColumn::Wildcard
        } else {
            let name = self.parse_identifier("column name or *")?;
            SelectColumn::Column { name, alias: None }
        };
        self.expect_token(Token::RightParen)?;

        Ok((function, column))
    }

    fn parse_alias(&mut self) -> Result<Option<String>, ParseError> {
        if self.current_token() != &Token::As {
            return Ok(None);
        }
        self.advance();
        self.parse_identifier("alias").map(Some)
    }

    fn parse_from(&mut self) -> Result<FromClause, ParseError> {
        self.expect_token(Token::From)?;
        let table = self.parse_identifier("table name")?;
        Ok(FromClause { table })
    }

    fn parse_where(&mut self) -> Result<Option<WhereClause>, ParseError> {
        if self.current_token() != &Token::Where {
            return Ok(None);
        }

        self.advance();
        let condition = self.parse_expression()?;

        Ok(Some(WhereClause { condition }))
    }

    fn parse_group_by(&mut self) -> Result<Option<GroupByClause>, ParseError> {
        if self.current_token() != &Token::Group {
            return Ok(None);
        }

        self.advance();
        self.expect_token(Token::By)?;

        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_identifier("column name")?);
            if self.current_token() == &Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        Ok(Some(GroupByClause { columns }))
    }

    fn parse_having(&mut self) -> Result<Option<HavingClause>, ParseError> {
        if self.current_token() != &Token::Having {
            return Ok(None);
        }

        self.advance();
        let condition = self.parse_expression()?;

        Ok(Some(HavingClause { condition }))
    }

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_logical_or()
    }

    fn parse_logical_or(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_logical_and()?;

        while self.current_token() == &Token::Or {
            self.advance();
            let right = self.parse_logical_and()?;
            left = Expression::LogicalOp {
                left: Box::new(left),
                op: LogicalOperator::Or,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_not()?;

        while self.current_token() == &Token::And {
            self.advance();
            let right = self.parse_not()?;
            left = Expression::LogicalOp {
                left: Box::new(left),
                op: LogicalOperator::And,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expression, ParseError> {
        if self.current_token() == &Token::Not {
            self.advance();
            let expr = self.parse_not()?;
            return Ok(Expression::Not(Box::new(expr)));
        }

        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expression, ParseError> {
        let left = self.parse_primary()?;

        // IS [NOT] NULL
        if self.current_token() == &Token::Is {
            self.advance();
            let negated = if self.current_token() == &Token::Not {
                self.advance();
                true
            } else {
                false
            };
            self.expect_token(Token::Null)?;
            return Ok(Expression::IsNull {
                expr: Box::new(left),
                negated,
            });
        }

        // x NOT LIKE / NOT IN / NOT BETWEEN
        if self.current_token() == &Token::Not
            && matches!(
                self.peek_token(),
                Token::Like | Token::In | Token::Between
            )
        {
            self.advance();
            let expr = self.parse_postfix(left)?;
            return Ok(Expression::Not(Box::new(expr)));
        }

        if matches!(
            self.current_token(),
            Token::Like | Token::In | Token::Between
        ) {
            return self.parse_postfix(left);
        }

        let op = match self.current_token() {
            Token::Eq => BinaryOperator::Eq,
            Token::Ne => BinaryOperator::Ne,
            Token::Lt => BinaryOperator::Lt,
            Token::Le => BinaryOperator::Le,
            Token::Gt => BinaryOperator::Gt,
            Token::Ge => BinaryOperator::Ge,
            _ => return Ok(left),
        };

        self.advance();
        let right = self.parse_primary()?;

        Ok(Expression::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    /// LIKE, IN and BETWEEN, with the current token on the keyword
    fn parse_postfix(&mut self, left: Expression) -> Result<Expression, ParseError> {
        match self.current_token() {
            Token::Like => {
                self.advance();
                if let Token::String(pattern) = self.current_token().clone() {
                    self.advance();
                    Ok(Expression::Like {
                        expr: Box::new(left),
                        pattern,
                    })
                } else {
                    Err(ParseError::UnexpectedToken {
                        expected: "string pattern".to_string(),
                        found: self.current_token().clone(),
                    })
                }
            }
            Token::In => {
                self.advance();
                self.expect_token(Token::LeftParen)?;

                let mut values = Vec::new();
                loop {
                    values.push(self.parse_literal()?);
                    if self.current_token() == &Token::Comma {
                        self.advance();
                    } else {
                        break;
                    }
                }

                self.expect_token(Token::RightParen)?;

                Ok(Expression::In {
                    expr: Box::new(left),
                    values,
                })
            }
            Token::Between => {
                self.advance();
                let min = self.parse_primary()?;
                self.expect_token(Token::And)?;
                let max = self.parse_primary()?;

                Ok(Expression::Between {
                    expr: Box::new(left),
                    min: Box::new(min),
                    max: Box::new(max),
                })
            }
            token => Err(ParseError::UnexpectedToken {
                expected: "LIKE, IN or BETWEEN".to_string(),
                found: token.clone(),
            }),
        }
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        // Aggregates in HAVING refer to the output column of the same name
        if self.at_aggregate_call() {
            let (function, column) = self.parse_aggregate_call()?;
            let name = SelectColumn::Aggregate {
                function,
                column: Box::new(column),
                alias: None,
            }
            .display_name();
            return Ok(Expression::Column(name));
        }

        if let Some(name) = self.current_token().aggregate_name() {
            self.advance();
            return Ok(Expression::Column(name.to_string()));
        }

        match self.current_token().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(Expression::Column(name))
            }
            Token::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_token(Token::RightParen)?;
                Ok(expr)
            }
            Token::Integer(_)
            | Token::Float(_)
            | Token::String(_)
            | Token::Boolean(_)
            | Token::Null => self.parse_literal().map(Expression::Literal),
            token => Err(ParseError::UnexpectedToken {
                expected: "expression".to_string(),
                found: token,
            }),
        }
    }

    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        let literal = match self.current_token().clone() {
            Token::Integer(i) => Literal::Integer(i),
            Token::Float(f) => Literal::Float(f),
            Token::String(s) => Literal::String(s),
            Token::Boolean(b) => Literal::Boolean(b),
            Token::Null => Literal::Null,
            token => {
                return Err(ParseError::UnexpectedToken {
                    expected: "literal value".to_string(),
                    found: token,
                })
            }
        };
        self.advance();
        Ok(literal)
    }

    /// Identifier, also accepting aggregate keywords used as plain names
    fn parse_identifier(&mut self, expected: &str) -> Result<String, ParseError> {
        if let Token::Identifier(name) = self.current_token().clone() {
            self.advance();
            return Ok(name);
        }
        if let Some(name) = self.current_token().aggregate_name() {
            if self.peek_token() != &Token::LeftParen {
                self.advance();
                return Ok(name.to_string());
            }
        }
        Err(ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: self.current_token().clone(),
        })
    }

    fn parse_order_by(&mut self) -> Result<Option<OrderByClause>, ParseError> {
        if self.current_token() != &Token::OrderBy {
            return Ok(None);
        }

        self.advance();

        let mut columns = Vec::new();

        loop {
            let column = if self.at_aggregate_call() {
                let (function, column) = self.parse_aggregate_call()?;
                SelectColumn::Aggregate {
                    function,
                    column: Box::new(column),
                    alias: None,
                }
                .display_name()
            } else {
                self.parse_identifier("column name")?
            };

            let direction = if self.current_token() == &Token::Desc {
                self.advance();
                OrderDirection::Desc
            } else {
                if self.current_token() == &Token::Asc {
                    self.advance();
                }
                OrderDirection::Asc
            };

            columns.push(OrderByColumn { column, direction });

            if self.current_token() == &Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        Ok(Some(OrderByClause { columns }))
    }

    fn parse_limit(&mut self) -> Result<Option<LimitClause>, ParseError> {
        if self.current_token() != &Token::Limit {
            return Ok(None);
        }

        self.advance();

        let count = if let Token::Integer(n) = self.current_token() {
            if *n < 0 {
                return Err(ParseError::InvalidLimitValue(*n));
            }
            let count = *n as usize;
            self.advance();
            count
        } else {
            return Err(ParseError::UnexpectedToken {
                expected: "integer".to_string(),
                found: self.current_token().clone(),
            });
        };

        let offset = if self.current_token() == &Token::Offset {
            self.advance();
            if let Token::Integer(n) = self.current_token() {
                if *n < 0 {
                    return Err(ParseError::InvalidOffsetValue(*n));
                }
                let offset = *n as usize;
                self.advance();
                Some(offset)
            } else {
                return Err(ParseError::UnexpectedToken {
                    expected: "integer".to_string(),
                    found: self.current_token().clone(),
                });
            }
        } else {
            None
        };

        Ok(Some(LimitClause { count, offset }))
    }

    fn current_token(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn peek_token(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.position + 1).min(last)]
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn expect_token(&mut self, expected: Token) -> Result<(), ParseError> {
        if self.current_token() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                expected: format!("{}", expected),
                found: self.current_token().clone(),
            })
        }
    }
}

/// Parse SQL text into a statement.
pub fn parse(sql: &str) -> Result<Statement, ParseError> {
    Parser::new(sql)?.parse()
}

/// Parser errors
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    LexerError(LexerError),
    UnexpectedToken { expected: String, found: Token },
    EmptyStatement,
    EmptySelectList,
    ColumnCountMismatch { columns: usize, values: usize },
    InvalidLimitValue(i64),
    InvalidOffsetValue(i64),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::LexerError(e) => write!(f, "Lexer error: {}", e),
            ParseError::UnexpectedToken { expected, found } => {
                write!(f, "Expected {}, found {}", expected, found)
            }
            ParseError::EmptyStatement => write!(f, "Empty statement"),
            ParseError::EmptySelectList => write!(f, "SELECT list cannot be empty"),
            ParseError::ColumnCountMismatch { columns, values } => write!(
                f,
                "INSERT lists {} columns but {} values",
                columns, values
            ),
            ParseError::InvalidLimitValue(n) => {
                write!(f, "Invalid LIMIT value: {} (must be non-negative)", n)
            }
            ParseError::InvalidOffsetValue(n) => {
                write!(f, "Invalid OFFSET value: {} (must be non-negative)", n)
            }
        }
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(sql: &str) -> Query {
        match parse(sql).unwrap() {
            Statement::Select(query) => query,
            other => panic!("expected SELECT, got {:?}", other),
        }
    }

    #[test]
    fn test_simple_select() {
        let query = select("SELECT * FROM notion_data");

        assert_eq!(query.select.columns.len(), 1);
        assert!(matches!(query.select.columns[0], SelectColumn::Wildcard));
        assert_eq!(query.from.table, "notion_data");
    }

    #[test]
    fn test_select_with_quoted_columns_and_alias() {
        let query = select(r#"SELECT Name, "Due Date" AS due FROM notion_data;"#);

        assert_eq!(
            query.select.columns[1],
            SelectColumn::Column {
                name: "Due Date".to_string(),
                alias: Some("due".to_string()),
            }
        );
    }

    #[test]
    fn test_select_with_order_by_and_limit() {
        let query = select("SELECT * FROM notion_data ORDER BY Score DESC, Name LIMIT 10 OFFSET 5");

        let order_by = query.order_by.unwrap();
        assert_eq!(order_by.columns.len(), 2);
        assert_eq!(order_by.columns[0].direction, OrderDirection::Desc);
        assert_eq!(order_by.columns[1].direction, OrderDirection::Asc);
        let limit = query.limit.unwrap();
        assert_eq!(limit.count, 10);
        assert_eq!(limit.offset, Some(5));
    }

    #[test]
    fn test_where_precedence() {
        let query = select("SELECT * FROM t WHERE a = 1 OR b = 2 AND NOT c = 3");
        let condition = query.where_clause.unwrap().condition;
        match condition {
            Expression::LogicalOp { op, right, .. } => {
                assert_eq!(op, LogicalOperator::Or);
                assert!(matches!(
                    *right,
                    Expression::LogicalOp {
                        op: LogicalOperator::And,
                        ..
                    }
                ));
            }
            other => panic!("unexpected condition {:?}", other),
        }
    }

    #[test]
    fn test_is_null_and_negated_postfix() {
        let query = select("SELECT * FROM t WHERE Due IS NOT NULL AND Tag NOT IN ('a', 'b')");
        let text = query.where_clause.unwrap().condition.to_string();
        assert_eq!(text, "(Due IS NOT NULL AND NOT (Tag IN ('a', 'b')))");
    }

    #[test]
    fn test_group_by_having() {
        let query = select(
            "SELECT Status, COUNT(*) AS n FROM t GROUP BY Status HAVING COUNT(*) > 1 ORDER BY n",
        );

        assert_eq!(query.group_by.unwrap().columns, vec!["Status".to_string()]);
        let having = query.having.unwrap().condition;
        assert_eq!(having.to_string(), "(\"COUNT(*)\" > 1)");
    }

    #[test]
    fn test_aggregate_keyword_as_column_name() {
        let query = select("SELECT Count FROM t WHERE Count > 2");
        assert_eq!(
            query.select.columns[0],
            SelectColumn::Column {
                name: "Count".to_string(),
                alias: None
            }
        );
    }

    #[test]
    fn test_insert() {
        let statement =
            parse("INSERT INTO notion_data (Name, \"Score\", Done) VALUES ('Task', 3, true)")
                .unwrap();
        let Statement::Insert(insert) = statement else {
            panic!("expected INSERT");
        };
        assert_eq!(insert.columns, vec!["Name", "Score", "Done"]);
        assert_eq!(insert.values[1], Literal::Integer(3));
        assert_eq!(insert.values[2], Literal::Boolean(true));
    }

    #[test]
    fn test_insert_count_mismatch() {
        let err = parse("INSERT INTO t (a, b) VALUES (1)").unwrap_err();
        assert_eq!(
            err,
            ParseError::ColumnCountMismatch {
                columns: 2,
                values: 1
            }
        );
    }

    #[test]
    fn test_update_and_delete() {
        let Statement::Update(update) =
            parse("UPDATE t SET Status = 'Done', Score = -1 WHERE id = 'abc'").unwrap()
        else {
            panic!("expected UPDATE");
        };
        assert_eq!(update.assignments.len(), 2);
        assert_eq!(update.assignments[1].value, Literal::Integer(-1));
        assert!(update.where_clause.is_some());

        let Statement::Delete(delete) = parse("DELETE FROM t").unwrap() else {
            panic!("expected DELETE");
        };
        assert!(delete.where_clause.is_none());
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse("   "), Err(ParseError::EmptyStatement));
        assert_eq!(parse("SELECT FROM t"), Err(ParseError::EmptySelectList));
        assert!(matches!(
            parse("SELECT * FROM t LIMIT -1"),
            Err(ParseError::InvalidLimitValue(-1))
        ));
        assert!(matches!(
            parse("SELECT * FROM t extra"),
            Err(ParseError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            parse("DROP TABLE t"),
            Err(ParseError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_display_round_trips_through_parser() {
        let sql = r#"SELECT Name, "Due Date" FROM notion_data WHERE Name LIKE 'O''B%' ORDER BY Name DESC LIMIT 3"#;
        let query = select(sql);
        assert_eq!(select(&query.to_string()), query);

        // columns named like keywords come back quoted
        let query = select(r#"SELECT "Select", "order" FROM notion_data WHERE "Limit" IS NULL"#);
        assert!(query.to_string().contains(r#""Select""#));
        assert_eq!(select(&query.to_string()), query);

        // very small and very large floats print without exponents
        let query = select("SELECT * FROM notion_data WHERE x = 0.00001 OR y = 10000000000000000.0");
        let printed = query.to_string();
        assert!(printed.contains("0.00001"));
        assert!(printed.contains("10000000000000000.0"));
        assert!(!printed.contains("e-5") && !printed.contains("e16"));
        assert_eq!(select(&printed), query);
    }
}
