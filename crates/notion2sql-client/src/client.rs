//! Entry point to the Notion API.

use std::sync::Arc;

use notion2sql_core::Result;
use serde_json::{json, Value};
use tracing::info;

use crate::config::ClientConfig;
use crate::database::NotionDatabase;
use crate::id::normalize_id;
use crate::page::NotionPage;
use crate::pagination::{collect_all, PaginatedList};
use crate::transport::{HttpTransport, Method, Transport};

/// Notion API client.
///
/// Cloning is cheap; clones share the same transport.
///
/// # Examples
///
/// ```no_run
/// use notion2sql_client::NotionClient;
///
/// # fn main() -> notion2sql_core::Result<()> {
/// let client = NotionClient::new("secret_...")?;
/// let page = client.connect_page("1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d")?;
/// for db in page.get_databases()? {
///     println!("{} ({} columns)", db.title(), db.schema().len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NotionClient {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
}

impl NotionClient {
    /// Client with default settings for `api_key`.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(ClientConfig::new(api_key))
    }

    /// Client over HTTP with explicit settings.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.clone())?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Client over any transport, e.g. an in-memory fake.
    pub fn with_transport(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    /// Client configured from `NOTION_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::with_config(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a raw API request.
    pub fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        self.transport.request(method, path, body)
    }

    /// Fetch a page by id or URL.
    pub fn connect_page(&self, page_id: &str) -> Result<NotionPage> {
        let page_id = normalize_id(page_id)?;
        let info = self.request(Method::Get, &format!("/pages/{page_id}"), None)?;
        let page = NotionPage::new(self.clone(), page_id, info);
        info!(page_id = %page.page_id(), title = %page.title(), "connected to page");
        Ok(page)
    }

    /// Fetch a database by id or URL.
    pub fn get_database(&self, database_id: &str) -> Result<NotionDatabase> {
        NotionDatabase::fetch(self.clone(), database_id)
    }

    /// Databases shared with the integration whose title matches `query`.
    /// An empty query lists every database.
    pub fn search_databases(&self, query: &str) -> Result<Vec<NotionDatabase>> {
        let page_size = self.config.page_size;
        let results = collect_all(
            |cursor| {
                let mut body = json!({
                    "query": query,
                    "filter": { "property": "object", "value": "database" },
                    "page_size": page_size,
                });
                if let Some(cursor) = cursor {
                    body["start_cursor"] = json!(cursor);
                }
                PaginatedList::from_json(self.request(Method::Post, "/search", Some(&body))?)
            },
            None,
        )?;

        info!(query, found = results.len(), "searched databases");
        results
            .into_iter()
            .filter(|r| r["object"] == "database")
            .map(|info| NotionDatabase::from_json(self.clone(), info))
            .collect()
    }
}

impl std::fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
