//! # notion2sql core
//!
//! Core types for notion2sql: the crate-wide error, the Notion property
//! codec and the SQL-like query engine that runs over decoded rows.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod property;
pub mod query;

pub use error::{Error, Result};
pub use property::{DatabaseSchema, PropertySchema, PropertyType};
