//! In-memory fake of the Notion API for tests.
//!
//! [`MockNotion`] implements [`Transport`] and serves the page, block,
//! database, query, create, update, archive and search endpoints from
//! memory. Every request is recorded, and failures can be injected.
//!
//! ```
//! use notion2sql_client::mock::MockNotion;
//! use serde_json::json;
//!
//! let mock = MockNotion::new();
//! let page_id = mock.add_page("Workspace");
//! let db_id = mock.add_database(&page_id, "Tasks", json!({
//!     "Name": { "type": "title", "title": {} },
//! }));
//! mock.add_row(&db_id, json!({ "Name": "First" })).unwrap();
//!
//! let client = mock.client();
//! let page = client.connect_page(&page_id).unwrap();
//! let databases = page.get_databases().unwrap();
//! assert_eq!(databases[0].title(), "Tasks");
//! ```

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use notion2sql_core::property::{decode_property, plain_text, rich_text};
use notion2sql_core::{DatabaseSchema, Error, PropertyType, Result};
use serde_json::{json, Map, Value};

use crate::client::NotionClient;
use crate::config::ClientConfig;
use crate::transport::{Method, Transport};

/// A request seen by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Default)]
struct MockState {
    pages: Vec<Value>,
    databases: Vec<Value>,
    /// parent id to child blocks, in order
    children: HashMap<String, Vec<Value>>,
    requests: Vec<RecordedRequest>,
    fail_next: VecDeque<(u16, String)>,
    fail_paths: Vec<(String, u16, String)>,
    page_size_cap: Option<usize>,
    next_id: u64,
}

impl MockState {
    fn new_id(&mut self) -> String {
        self.next_id += 1;
        format!("00000000-0000-4000-8000-{:012x}", self.next_id)
    }

    fn timestamp(&self) -> String {
        format!(
            "2024-01-01T{:02}:{:02}:00.000Z",
            (self.next_id / 60) % 24,
            self.next_id % 60
        )
    }

    fn page_mut(&mut self, id: &str) -> Option<&mut Value> {
        self.pages.iter_mut().find(|p| p["id"] == id)
    }

    fn database(&self, id: &str) -> Option<&Value> {
        self.databases.iter().find(|d| d["id"] == id)
    }
}

/// In-memory Notion API
#[derive(Default)]
pub struct MockNotion {
    state: Mutex<MockState>,
}

impl MockNotion {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// A client wired to this mock.
    pub fn client(self: &Arc<Self>) -> NotionClient {
        NotionClient::with_transport(self.clone(), ClientConfig::new("secret_mock"))
    }

    /// Serve at most `cap` results per list response, to force pagination.
    pub fn set_page_size_cap(&self, cap: usize) {
        self.state().page_size_cap = Some(cap.max(1));
    }

    /// Add a standalone page and return its id.
    pub fn add_page(&self, title: &str) -> String {
        let mut state = self.state();
        let id = state.new_id();
        let page = json!({
            "object": "page",
            "id": id,
            "url": format!("https://www.notion.so/{}", id.replace('-', "")),
            "created_time": state.timestamp(),
            "last_edited_time": state.timestamp(),
            "archived": false,
            "parent": { "type": "workspace", "workspace": true },
            "properties": {
                "title": { "id": "title", "type": "title", "title": read_rich_text(&rich_text(title)) }
            }
        });
        state.pages.push(page);
        id
    }

    /// Add a block of `block_type` under a page or block and return its id.
    pub fn add_block(&self, parent_id: &str, block_type: &str) -> String {
        let mut state = self.state();
        let id = state.new_id();
        let mut block = json!({
            "object": "block",
            "id": id,
            "type": block_type,
            "has_children": false,
        });
        block[block_type] = json!({});
        state
            .children
            .entry(parent_id.to_string())
            .or_default()
            .push(block);
        id
    }

    /// Add a database with the given `properties` schema under a page or
    /// block and return its id. Schema entries need only `type` and the
    /// type's config object.
    pub fn add_database(&self, parent_id: &str, title: &str, properties: Value) -> String {
        let mut state = self.state();
        let id = state.new_id();

        let mut schema = Map::new();
        if let Some(props) = properties.as_object() {
            for (index, (name, raw)) in props.iter().enumerate() {
                let mut entry = raw.clone();
                entry["name"] = json!(name);
                if entry.get("id").is_none() {
                    entry["id"] = json!(format!("p{index}"));
                }
                let tag = entry["type"].as_str().unwrap_or("rich_text").to_string();
                if entry.get(&tag).is_none() {
                    entry[tag.as_str()] = json!({});
                }
                schema.insert(name.clone(), entry);
            }
        }

        let database = json!({
            "object": "database",
            "id": id,
            "title": read_rich_text(&rich_text(title)),
            "parent": { "type": "page_id", "page_id": parent_id },
            "archived": false,
            "properties": schema,
        });
        state.databases.push(database);
        state
            .children
            .entry(parent_id.to_string())
            .or_default()
            .push(json!({
                "object": "block",
                "id": id,
                "type": "child_database",
                "has_children": false,
                "child_database": { "title": title },
            }));
        id
    }

    /// List a `child_database` block whose database cannot be retrieved.
    pub fn add_broken_database_block(&self, parent_id: &str, title: &str) -> String {
        let mut state = self.state();
        let id = state.new_id();
        state
            .children
            .entry(parent_id.to_string())
            .or_default()
            .push(json!({
                "object": "block",
                "id": id,
                "type": "child_database",
                "has_children": false,
                "child_database": { "title": title },
            }));
        id
    }

    /// Add a row from plain values, encoded against the database schema.
    pub fn add_row(&self, database_id: &str, values: Value) -> Result<String> {
        let mut state = self.state();
        let database = state
            .database(database_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(database_id.to_string()))?;
        let values = values.as_object().cloned().unwrap_or_default();
        let encoded = DatabaseSchema::from_json(&database).encode_properties(&values)?;
        let page = create_row(&mut state, &database, &encoded)?;
        Ok(page["id"].as_str().unwrap_or_default().to_string())
    }

    /// Stored page object, archived or not.
    pub fn page(&self, id: &str) -> Option<Value> {
        self.state().pages.iter().find(|p| p["id"] == id).cloned()
    }

    /// Live rows of a database in creation order.
    pub fn rows(&self, database_id: &str) -> Vec<Value> {
        self.state()
            .pages
            .iter()
            .filter(|p| p["parent"]["database_id"] == database_id && !is_archived(p))
            .cloned()
            .collect()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state().requests.clone()
    }

    /// Number of recorded requests with `method` whose path starts with `prefix`.
    pub fn count_requests(&self, method: Method, prefix: &str) -> usize {
        self.state()
            .requests
            .iter()
            .filter(|r| r.method == method && r.path.starts_with(prefix))
            .count()
    }

    pub fn clear_requests(&self) {
        self.state().requests.clear();
    }

    /// Fail the next request with an API error.
    pub fn fail_next(&self, status: u16, code: &str) {
        self.state().fail_next.push_back((status, code.to_string()));
    }

    /// Fail every request whose path contains `fragment`.
    pub fn fail_path(&self, fragment: &str, status: u16, code: &str) {
        self.state()
            .fail_paths
            .push((fragment.to_string(), status, code.to_string()));
    }

    fn route(
        &self,
        state: &mut MockState,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        let (path, query) = path.split_once('?').unwrap_or((path, ""));
        let params: HashMap<&str, &str> = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .collect();
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let empty = Value::Null;
        let body = body.unwrap_or(&empty);

        match (method, segments.as_slice()) {
            (Method::Get, ["pages", id]) => state
                .pages
                .iter()
                .find(|p| p["id"] == *id)
                .cloned()
                .ok_or_else(|| not_found(id)),
            (Method::Post, ["pages"]) => {
                let database_id = body["parent"]["database_id"]
                    .as_str()
                    .ok_or_else(|| api(400, "validation_error", "parent.database_id is required"))?;
                let database = state
                    .database(database_id)
                    .cloned()
                    .ok_or_else(|| not_found(database_id))?;
                let properties = body["properties"].as_object().cloned().unwrap_or_default();
                create_row(state, &database, &properties)
            }
            (Method::Patch, ["pages", id]) => update_page(state, id, body),
            (Method::Get, ["databases", id]) => {
                state.database(id).cloned().ok_or_else(|| not_found(id))
            }
            (Method::Post, ["databases", id, "query"]) => {
                if state.database(id).is_none() {
                    return Err(not_found(id));
                }
                let mut rows: Vec<Value> = state
                    .pages
                    .iter()
                    .filter(|p| p["parent"]["database_id"] == *id && !is_archived(p))
                    .filter(|p| body["filter"].is_null() || filter_matches(&body["filter"], p))
                    .cloned()
                    .collect();
                if let Some(sorts) = body["sorts"].as_array() {
                    sort_rows(&mut rows, sorts);
                }
                Ok(paginate(
                    state,
                    rows,
                    body["start_cursor"].as_str(),
                    body["page_size"].as_u64(),
                ))
            }
            (Method::Get, ["blocks", id, "children"]) => {
                let blocks: Vec<Value> = state
                    .children
                    .get(*id)
                    .cloned()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|mut block| {
                        let has_children = block["id"]
                            .as_str()
                            .and_then(|bid| state.children.get(bid))
                            .is_some_and(|c| !c.is_empty());
                        block["has_children"] = json!(has_children);
                        block
                    })
                    .collect();
                let exists = state.pages.iter().any(|p| p["id"] == *id)
                    || state.children.values().flatten().any(|b| b["id"] == *id);
                if !exists {
                    return Err(not_found(id));
                }
                Ok(paginate(
                    state,
                    blocks,
                    params.get("start_cursor").copied(),
                    params.get("page_size").and_then(|s| s.parse().ok()),
                ))
            }
            (Method::Post, ["search"]) => {
                let needle = body["query"].as_str().unwrap_or_default().to_lowercase();
                let wanted = body["filter"]["value"].as_str().unwrap_or("database");
                let pool = if wanted == "page" {
                    &state.pages
                } else {
                    &state.databases
                };
                let found: Vec<Value> = pool
                    .iter()
                    .filter(|obj| {
                        let title = match obj["object"].as_str() {
                            Some("database") => plain_text(&obj["title"]),
                            _ => plain_text(&obj["properties"]["title"]["title"]),
                        };
                        title.to_lowercase().contains(&needle)
                    })
                    .cloned()
                    .collect();
                Ok(paginate(
                    state,
                    found,
                    body["start_cursor"].as_str(),
                    body["page_size"].as_u64(),
                ))
            }
            _ => Err(api(
                400,
                "invalid_request_url",
                &format!("Invalid request URL: {method} {path}"),
            )),
        }
    }
}

impl Transport for MockNotion {
    fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let mut state = self.state();
        state.requests.push(RecordedRequest {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });

        if let Some((status, code)) = state.fail_next.pop_front() {
            return Err(api(status, &code, "injected failure"));
        }
        if let Some((_, status, code)) = state
            .fail_paths
            .iter()
            .find(|(fragment, _, _)| path.contains(fragment.as_str()))
        {
            return Err(api(*status, code, "injected failure"));
        }

        self.route(&mut state, method, path, body)
    }
}

fn api(status: u16, code: &str, message: &str) -> Error {
    Error::Api {
        status,
        code: code.to_string(),
        message: message.to_string(),
    }
}

fn not_found(id: &str) -> Error {
    api(
        404,
        "object_not_found",
        &format!("Could not find object with ID: {id}."),
    )
}

fn is_archived(page: &Value) -> bool {
    page["archived"].as_bool().unwrap_or(false)
}

fn paginate(
    state: &MockState,
    items: Vec<Value>,
    cursor: Option<&str>,
    page_size: Option<u64>,
) -> Value {
    let start = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
    let mut size = page_size.map(|s| s as usize).unwrap_or(100).clamp(1, 100);
    if let Some(cap) = state.page_size_cap {
        size = size.min(cap);
    }
    let end = (start + size).min(items.len());
    let has_more = end < items.len();
    let results: Vec<Value> = items
        .into_iter()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect();
    json!({
        "object": "list",
        "results": results,
        "next_cursor": if has_more { json!(end.to_string()) } else { Value::Null },
        "has_more": has_more,
    })
}

/// Rich text as Notion returns it, with `plain_text` filled in.
fn read_rich_text(write: &Value) -> Value {
    let parts = write.as_array().cloned().unwrap_or_default();
    Value::Array(
        parts
            .into_iter()
            .map(|mut part| {
                let content = part["text"]["content"].clone();
                part["plain_text"] = content;
                part
            })
            .collect(),
    )
}

fn stored_property(schema: &Value, mut value: Value) -> Value {
    let tag = schema["type"].as_str().unwrap_or_default();
    if tag == "title" || tag == "rich_text" {
        value = read_rich_text(&value);
    }
    let mut property = Map::new();
    property.insert("id".to_string(), schema["id"].clone());
    property.insert("type".to_string(), json!(tag));
    property.insert(tag.to_string(), value);
    Value::Object(property)
}

/// Turn a write payload (`{"<type>": value}`) into a stored page property.
fn read_property(schema: &Value, payload: &Value) -> Value {
    let tag = schema["type"].as_str().unwrap_or_default();
    stored_property(schema, payload.get(tag).cloned().unwrap_or(Value::Null))
}

fn empty_property(schema: &Value) -> Value {
    let empty = match schema["type"].as_str().unwrap_or_default() {
        "title" | "rich_text" | "multi_select" | "people" | "relation" | "files" => json!([]),
        "checkbox" => json!(false),
        _ => Value::Null,
    };
    stored_property(schema, empty)
}

fn check_writable(database: &Value, properties: &Map<String, Value>) -> Result<()> {
    for name in properties.keys() {
        let schema = &database["properties"][name.as_str()];
        if schema.is_null() {
            return Err(api(
                400,
                "validation_error",
                &format!("{name} is not a property that exists."),
            ));
        }
        if PropertyType::from_tag(schema["type"].as_str().unwrap_or_default()).is_read_only() {
            return Err(api(
                400,
                "validation_error",
                &format!("{name} is a read-only property."),
            ));
        }
    }
    Ok(())
}

fn create_row(
    state: &mut MockState,
    database: &Value,
    properties: &Map<String, Value>,
) -> Result<Value> {
    check_writable(database, properties)?;

    let mut stored = Map::new();
    if let Some(schema) = database["properties"].as_object() {
        for (name, prop_schema) in schema {
            let property = match properties.get(name) {
                Some(payload) => read_property(prop_schema, payload),
                None => empty_property(prop_schema),
            };
            stored.insert(name.clone(), property);
        }
    }

    let id = state.new_id();
    let page = json!({
        "object": "page",
        "id": id,
        "url": format!("https://www.notion.so/{}", id.replace('-', "")),
        "created_time": state.timestamp(),
        "last_edited_time": state.timestamp(),
        "archived": false,
        "parent": { "type": "database_id", "database_id": database["id"] },
        "properties": stored,
    });
    state.pages.push(page.clone());
    Ok(page)
}

fn update_page(state: &mut MockState, id: &str, body: &Value) -> Result<Value> {
    let database = {
        let page = state
            .pages
            .iter()
            .find(|p| p["id"] == id)
            .ok_or_else(|| not_found(id))?;
        page["parent"]["database_id"]
            .as_str()
            .and_then(|db| state.database(db))
            .cloned()
    };

    let properties = body["properties"].as_object().cloned().unwrap_or_default();
    if let Some(ref database) = database {
        check_writable(database, &properties)?;
    }

    let timestamp = state.timestamp();
    let page = state.page_mut(id).ok_or_else(|| not_found(id))?;
    for (name, payload) in &properties {
        let schema = database
            .as_ref()
            .map(|db| db["properties"][name.as_str()].clone())
            .unwrap_or_else(|| json!({ "id": name, "type": "title" }));
        page["properties"][name.as_str()] = read_property(&schema, payload);
    }
    if let Some(archived) = body["archived"].as_bool().or(body["in_trash"].as_bool()) {
        page["archived"] = json!(archived);
    }
    page["last_edited_time"] = json!(timestamp);
    Ok(page.clone())
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn compare_json(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Evaluate the subset of Notion filters the client builders produce.
fn filter_matches(filter: &Value, page: &Value) -> bool {
    if let Some(all) = filter["and"].as_array() {
        return all.iter().all(|f| filter_matches(f, page));
    }
    if let Some(any) = filter["or"].as_array() {
        return any.iter().any(|f| filter_matches(f, page));
    }

    let Some(name) = filter["property"].as_str() else {
        return false;
    };
    let Some((_, condition)) = filter
        .as_object()
        .and_then(|obj| obj.iter().find(|(key, _)| key.as_str() != "property"))
    else {
        return false;
    };
    let Some((op, expected)) = condition.as_object().and_then(|c| c.iter().next()) else {
        return false;
    };

    let actual = decode_property(&page["properties"][name]);
    match op.as_str() {
        "equals" => match (&actual, expected) {
            (Value::Array(items), _) => items.contains(expected),
            _ => compare_json(&actual, expected) == Some(Ordering::Equal),
        },
        "does_not_equal" => compare_json(&actual, expected) != Some(Ordering::Equal),
        "contains" => match (&actual, expected) {
            (Value::Array(items), _) => items.contains(expected),
            (Value::String(s), Value::String(needle)) => {
                s.to_lowercase().contains(&needle.to_lowercase())
            }
            _ => false,
        },
        "does_not_contain" => !filter_matches(
            &json!({ "property": name, "x": { "contains": expected } }),
            page,
        ),
        "greater_than" | "after" => compare_json(&actual, expected) == Some(Ordering::Greater),
        "less_than" | "before" => compare_json(&actual, expected) == Some(Ordering::Less),
        "is_empty" => is_empty_value(&actual),
        "is_not_empty" => !is_empty_value(&actual),
        _ => false,
    }
}

fn sort_rows(rows: &mut [Value], sorts: &[Value]) {
    rows.sort_by(|a, b| {
        for sort in sorts {
            let (left, right) = match sort["property"].as_str() {
                Some(name) => (
                    decode_property(&a["properties"][name]),
                    decode_property(&b["properties"][name]),
                ),
                None => {
                    let key = sort["timestamp"].as_str().unwrap_or("created_time");
                    (a[key].clone(), b[key].clone())
                }
            };
            // empty values sort last in either direction
            let ordering = match (left.is_null(), right.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ => {
                    let ordering = compare_json(&left, &right).unwrap_or(Ordering::Equal);
                    if sort["direction"] == "descending" {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                }
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}
