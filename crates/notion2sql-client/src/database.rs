//! Database model: schema, paginated queries and item writes.

use notion2sql_core::property::{decode_properties, plain_text};
use notion2sql_core::{DatabaseSchema, Error, Result};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::client::NotionClient;
use crate::config::MAX_PAGE_SIZE;
use crate::id::normalize_id;
use crate::pagination::{collect_all, PaginatedList};
use crate::transport::Method;

/// A database row (a Notion page) with decoded properties
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    pub url: String,
    pub created_time: String,
    pub last_edited_time: String,
    pub archived: bool,
    /// Property name to plain value
    pub properties: Map<String, Value>,
}

impl Item {
    /// Decode a page object returned by the API.
    pub fn from_page(page: &Value) -> Result<Self> {
        let id = page["id"]
            .as_str()
            .ok_or_else(|| Error::InvalidInput("page object without id".to_string()))?;
        let text = |key: &str| page[key].as_str().unwrap_or_default().to_string();

        Ok(Self {
            id: id.to_string(),
            url: text("url"),
            created_time: text("created_time"),
            last_edited_time: text("last_edited_time"),
            archived: page["archived"].as_bool().unwrap_or(false)
                || page["in_trash"].as_bool().unwrap_or(false),
            properties: decode_properties(&page["properties"]),
        })
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }
}

/// Options for [`NotionDatabase::query`]
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub filter: Option<Value>,
    pub sorts: Vec<Value>,
    /// 1..=100; the client's default when unset
    pub page_size: Option<u32>,
    pub start_cursor: Option<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: impl Into<Value>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn sort(mut self, sort: impl Into<Value>) -> Self {
        self.sorts.push(sort.into());
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn start_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.start_cursor = Some(cursor.into());
        self
    }

    fn body(&self, default_page_size: u32, cursor: Option<&str>) -> Result<Value> {
        let page_size = self.page_size.unwrap_or(default_page_size);
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(Error::InvalidInput(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
            )));
        }

        let mut body = json!({ "page_size": page_size });
        if let Some(ref filter) = self.filter {
            body["filter"] = filter.clone();
        }
        if !self.sorts.is_empty() {
            body["sorts"] = Value::Array(self.sorts.clone());
        }
        if let Some(cursor) = cursor.or(self.start_cursor.as_deref()) {
            body["start_cursor"] = json!(cursor);
        }
        Ok(body)
    }
}

/// One page of query results
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage {
    pub items: Vec<Item>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Handle to a Notion database
#[derive(Clone)]
pub struct NotionDatabase {
    client: NotionClient,
    database_id: String,
    info: Value,
    schema: DatabaseSchema,
}

impl NotionDatabase {
    /// Build from a database object already fetched from the API.
    pub fn from_json(client: NotionClient, info: Value) -> Result<Self> {
        let raw_id = info["id"]
            .as_str()
            .ok_or_else(|| Error::InvalidInput("database object without id".to_string()))?;
        let database_id = normalize_id(raw_id)?;
        let schema = DatabaseSchema::from_json(&info);
        Ok(Self {
            client,
            database_id,
            info,
            schema,
        })
    }

    pub(crate) fn fetch(client: NotionClient, database_id: &str) -> Result<Self> {
        let database_id = normalize_id(database_id)?;
        let info = client.request(Method::Get, &format!("/databases/{database_id}"), None)?;
        let database = Self::from_json(client, info)?;
        info!(
            database_id = %database.database_id,
            title = %database.title(),
            properties = database.schema.len(),
            "loaded database schema"
        );
        Ok(database)
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    /// Raw database object
    pub fn get_info(&self) -> &Value {
        &self.info
    }

    pub fn title(&self) -> String {
        plain_text(&self.info["title"])
    }

    pub fn schema(&self) -> &DatabaseSchema {
        &self.schema
    }

    /// Raw `properties` object of the database
    pub fn properties(&self) -> &Value {
        &self.info["properties"]
    }

    /// Re-fetch the database object and its schema.
    pub fn refresh_schema(&mut self) -> Result<()> {
        let fresh = Self::fetch(self.client.clone(), &self.database_id)?;
        self.info = fresh.info;
        self.schema = fresh.schema;
        Ok(())
    }

    fn query_raw(&self, options: &QueryOptions, cursor: Option<&str>) -> Result<PaginatedList> {
        let body = options.body(self.client.config().page_size, cursor)?;
        let response = self.client.request(
            Method::Post,
            &format!("/databases/{}/query", self.database_id),
            Some(&body),
        )?;
        PaginatedList::from_json(response)
    }

    /// Run one page of a query.
    pub fn query(&self, options: QueryOptions) -> Result<QueryPage> {
        let list = self.query_raw(&options, None)?;
        let items = list
            .results
            .iter()
            .map(Item::from_page)
            .collect::<Result<Vec<_>>>()?;
        debug!(
            database_id = %self.database_id,
            items = items.len(),
            has_more = list.has_more,
            "queried database page"
        );
        Ok(QueryPage {
            items,
            next_cursor: list.next_cursor,
            has_more: list.has_more,
        })
    }

    /// Run a query and follow the cursor to the end, or until `limit` items.
    pub fn query_all(&self, options: QueryOptions, limit: Option<usize>) -> Result<Vec<Item>> {
        let pages = collect_all(|cursor| self.query_raw(&options, cursor), limit)?;
        pages.iter().map(Item::from_page).collect()
    }

    /// Create a row. `properties` maps property names to plain values.
    pub fn add_item(&self, properties: &Map<String, Value>) -> Result<Item> {
        let encoded = self.schema.encode_properties(properties)?;
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": encoded,
        });
        let page = self.client.request(Method::Post, "/pages", Some(&body))?;
        let item = Item::from_page(&page)?;
        info!(database_id = %self.database_id, page_id = %item.id, "created item");
        Ok(item)
    }

    /// Overwrite the given properties of a row.
    pub fn update_item(&self, page_id: &str, properties: &Map<String, Value>) -> Result<Item> {
        let page_id = normalize_id(page_id)?;
        let encoded = self.schema.encode_properties(properties)?;
        let body = json!({ "properties": encoded });
        let page = self
            .client
            .request(Method::Patch, &format!("/pages/{page_id}"), Some(&body))?;
        info!(database_id = %self.database_id, page_id = %page_id, "updated item");
        Item::from_page(&page)
    }

    /// Archive a row; Notion has no hard delete.
    pub fn delete_item(&self, page_id: &str) -> Result<Item> {
        let page_id = normalize_id(page_id)?;
        let body = json!({ "archived": true });
        let page = self
            .client
            .request(Method::Patch, &format!("/pages/{page_id}"), Some(&body))?;
        info!(database_id = %self.database_id, page_id = %page_id, "archived item");
        Item::from_page(&page)
    }
}

impl std::fmt::Debug for NotionDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionDatabase")
            .field("database_id", &self.database_id)
            .field("title", &self.title())
            .field("properties", &self.schema.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_from_page() {
        let item = Item::from_page(&json!({
            "object": "page",
            "id": "p1",
            "url": "https://www.notion.so/p1",
            "created_time": "2024-01-01T00:00:00.000Z",
            "last_edited_time": "2024-01-02T00:00:00.000Z",
            "archived": false,
            "properties": {
                "Name": { "type": "title", "title": [{ "plain_text": "Row" }] },
                "Done": { "type": "checkbox", "checkbox": true }
            }
        }))
        .unwrap();

        assert_eq!(item.id, "p1");
        assert_eq!(item.get("Name"), Some(&json!("Row")));
        assert_eq!(item.get("Done"), Some(&json!(true)));
        assert!(!item.archived);
        assert!(Item::from_page(&json!({})).is_err());
    }

    #[test]
    fn test_query_body() {
        let options = QueryOptions::new()
            .filter(json!({"property": "Done", "checkbox": {"equals": true}}))
            .sort(json!({"property": "Name", "direction": "ascending"}))
            .start_cursor("abc");
        let body = options.body(100, None).unwrap();
        assert_eq!(body["page_size"], json!(100));
        assert_eq!(body["start_cursor"], json!("abc"));
        assert_eq!(body["sorts"].as_array().unwrap().len(), 1);

        // an explicit cursor from pagination overrides the starting one
        assert_eq!(options.body(100, Some("next")).unwrap()["start_cursor"], json!("next"));
        assert!(QueryOptions::new().page_size(0).body(100, None).is_err());
        assert!(QueryOptions::new().page_size(101).body(100, None).is_err());
    }
}
