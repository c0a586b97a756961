//! # notion2sql
//!
//! Treat Notion databases as SQL tables.
//!
//! Connect to a Notion page, discover the databases embedded in it, read
//! and write their rows, or run SQL-like statements against them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use notion2sql::{NotionClient, NotionSqlInterface};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // NOTION_API_KEY and NOTION_PAGE_ID from the environment
//!     let client = NotionClient::from_env()?;
//!     let page = client.connect_page(&notion2sql::page_id_from_env()?)?;
//!
//!     for database in page.get_databases()? {
//!         println!("{} ({})", database.title(), database.database_id());
//!     }
//!
//!     let database = page.get_databases()?.remove(0);
//!     let mut sql = NotionSqlInterface::new(database)?;
//!
//!     // Reads run against the cached table
//!     let open = sql.execute_sql(
//!         "SELECT Name, Score FROM notion_data WHERE Done = false ORDER BY Score DESC LIMIT 5",
//!     )?;
//!     for row in &open {
//!         println!("{:?}", row.to_json());
//!     }
//!
//!     // Writes go to Notion and patch the cache
//!     sql.execute_sql("INSERT INTO notion_data (Name, Score) VALUES ('New task', 3)")?;
//!     sql.execute_sql("DELETE FROM notion_data WHERE Score < 1")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! Events are emitted with `tracing`. Install a subscriber with
//! [`logging::LogConfig`] or bring your own.
//!
//! ```rust,no_run
//! let _guard = notion2sql::logging::LogConfig::info().init()?;
//! # Ok::<(), notion2sql::Error>(())
//! ```

#![warn(clippy::all)]

pub mod logging;
pub mod security;
pub mod sql;

// Re-export core types
pub use notion2sql_core::{DatabaseSchema, Error, PropertySchema, PropertyType, Result};

// Query engine
pub use notion2sql_core::query::{
    parse, Column, ExecutionContext, Executor, ParseError, PhysicalPlan, PlanError, Planner, Row,
    Statement, Value,
};

// Notion client
pub use notion2sql_client::{
    page_id_from_env, Block, ClientConfig, Direction, Filter, Item, Method, NotionClient,
    NotionDatabase, NotionPage, QueryOptions, QueryPage, Sort, Timestamp, Transport,
};

pub use sql::NotionSqlInterface;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Validate `config` and connect to a page with it.
///
/// # Examples
///
/// ```rust,no_run
/// use notion2sql::ClientConfig;
///
/// let config = ClientConfig::new("secret_...").with_page_size(50);
/// let page = notion2sql::connect(config, "https://www.notion.so/Roadmap-1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d")?;
/// println!("{}", page.title());
/// # Ok::<(), notion2sql::Error>(())
/// ```
pub fn connect(config: ClientConfig, page_id: &str) -> Result<NotionPage> {
    security::validate_api_key(&config.api_key)?;
    security::validate_page_size(config.page_size)?;
    let page_id = security::normalize_id(page_id)?;
    NotionClient::with_config(config)?.connect_page(&page_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_connect_validates_before_network() {
        let err = connect(ClientConfig::new(""), "1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = connect(
            ClientConfig::new("secret_x").with_page_size(0),
            "1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d",
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = connect(ClientConfig::new("secret_x"), "nope").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
