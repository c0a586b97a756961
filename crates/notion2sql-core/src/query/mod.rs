//! SQL-like query engine over decoded Notion rows.
//!
//! Text is lexed, parsed into a [`Statement`], planned into a tree of
//! [`PhysicalOperator`]s and evaluated by the [`Executor`].

/// Abstract Syntax Tree types
#[allow(missing_docs)]
pub mod ast;
/// Query executor
#[allow(missing_docs)]
pub mod executor;
/// SQL lexer
#[allow(missing_docs)]
pub mod lexer;
/// SQL parser
#[allow(missing_docs)]
pub mod parser;
/// Query planner
#[allow(missing_docs)]
pub mod planner;
/// Rows and values
#[allow(missing_docs)]
pub mod value;

pub use ast::*;
pub use executor::{compile_like, ExecutionContext, Executor};
pub use lexer::{Lexer, LexerError, Token};
pub use parser::{parse, ParseError, Parser};
pub use planner::{PhysicalOperator, PhysicalPlan, PlanError, Planner};
pub use value::{Column, Row, Value};
