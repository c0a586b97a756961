//! # notion2sql client
//!
//! Blocking client for the Notion API with the page and database models
//! notion2sql builds on: page lookup, child database discovery, schema
//! retrieval, paginated queries and row writes.
//!
//! This crate is an internal implementation detail of notion2sql.
//! Use the `notion2sql` crate instead.

#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod database;
pub mod filter;
pub mod id;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod page;
pub mod pagination;
pub mod transport;

pub use client::NotionClient;
pub use config::{page_id_from_env, ClientConfig};
pub use database::{Item, NotionDatabase, QueryOptions, QueryPage};
pub use filter::{Direction, Filter, Sort, Timestamp};
pub use id::normalize_id;
pub use page::{Block, NotionPage};
pub use transport::{backoff_delay, with_retries, HttpTransport, Method, Transport};

pub use notion2sql_core::{Error, Result};
