//! Page model and child database discovery.

use notion2sql_core::property::plain_text;
use notion2sql_core::Result;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::NotionClient;
use crate::database::NotionDatabase;
use crate::pagination::{collect_all, PaginatedList};
use crate::transport::Method;

/// Block types whose children may hold databases
const CONTAINER_BLOCKS: &[&str] = &["column_list", "column", "toggle", "synced_block"];

/// A block as listed under a page
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: String,
    pub block_type: String,
    pub has_children: bool,
    /// Title of `child_database` and `child_page` blocks
    pub title: Option<String>,
}

impl Block {
    fn from_json(raw: &Value) -> Option<Self> {
        let block_type = raw["type"].as_str()?.to_string();
        Some(Self {
            id: raw["id"].as_str()?.to_string(),
            title: raw[block_type.as_str()]["title"].as_str().map(String::from),
            has_children: raw["has_children"].as_bool().unwrap_or(false),
            block_type,
        })
    }

    pub fn is_database(&self) -> bool {
        self.block_type == "child_database"
    }

    fn is_container(&self) -> bool {
        self.has_children && CONTAINER_BLOCKS.contains(&self.block_type.as_str())
    }
}

/// Handle to a Notion page
#[derive(Clone)]
pub struct NotionPage {
    client: NotionClient,
    page_id: String,
    info: Value,
}

impl NotionPage {
    pub(crate) fn new(client: NotionClient, page_id: String, info: Value) -> Self {
        Self {
            client,
            page_id,
            info,
        }
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    /// Raw page object
    pub fn page_info(&self) -> &Value {
        &self.info
    }

    /// Text of the page's title property, empty when it has none.
    pub fn title(&self) -> String {
        self.info["properties"]
            .as_object()
            .and_then(|props| props.values().find(|p| p["type"] == "title"))
            .map(|p| plain_text(&p["title"]))
            .unwrap_or_default()
    }

    /// Top-level blocks of the page.
    pub fn blocks(&self) -> Result<Vec<Block>> {
        self.children(&self.page_id)
    }

    fn children(&self, block_id: &str) -> Result<Vec<Block>> {
        let page_size = self.client.config().page_size;
        let raw = collect_all(
            |cursor| {
                let mut path = format!("/blocks/{block_id}/children?page_size={page_size}");
                if let Some(cursor) = cursor {
                    path.push_str("&start_cursor=");
                    path.push_str(cursor);
                }
                PaginatedList::from_json(self.client.request(Method::Get, &path, None)?)
            },
            None,
        )?;
        Ok(raw.iter().filter_map(Block::from_json).collect())
    }

    /// Ids of every child database under `block_id`, in page order.
    fn database_ids(&self, block_id: &str, ids: &mut Vec<String>) -> Result<()> {
        for block in self.children(block_id)? {
            if block.is_database() {
                ids.push(block.id);
            } else if block.is_container() {
                self.database_ids(&block.id, ids)?;
            }
        }
        Ok(())
    }

    /// Databases embedded in the page, including those nested in columns,
    /// toggles and synced blocks.
    ///
    /// A database the integration cannot read is skipped with a warning.
    pub fn get_databases(&self) -> Result<Vec<NotionDatabase>> {
        let mut ids = Vec::new();
        self.database_ids(&self.page_id, &mut ids)?;
        debug!(page_id = %self.page_id, found = ids.len(), "child databases found");

        let mut databases = Vec::with_capacity(ids.len());
        for id in ids {
            match self.client.get_database(&id) {
                Ok(database) => databases.push(database),
                Err(e) => warn!(page_id = %self.page_id, database_id = %id, error = %e, "skipping child database"),
            }
        }
        Ok(databases)
    }
}

impl std::fmt::Debug for NotionPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionPage")
            .field("page_id", &self.page_id)
            .field("title", &self.title())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_block_from_json() {
        let block = Block::from_json(&json!({
            "object": "block",
            "id": "b1",
            "type": "child_database",
            "has_children": false,
            "child_database": { "title": "Tasks" }
        }))
        .unwrap();
        assert!(block.is_database());
        assert_eq!(block.title.as_deref(), Some("Tasks"));

        let column = Block::from_json(&json!({
            "id": "c1", "type": "column_list", "has_children": true, "column_list": {}
        }))
        .unwrap();
        assert!(column.is_container());
        assert!(Block::from_json(&json!({"id": "x"})).is_none());
    }
}
