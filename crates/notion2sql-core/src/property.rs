//! Notion property model.
//!
//! Decodes the property objects found on Notion pages into plain JSON values
//! (`"Done"`, `42`, `["a", "b"]`) and encodes plain values back into the
//! write payloads the API expects, driven by the database schema.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{Error, Result};

/// Maximum length of a single rich text object accepted by Notion.
pub const MAX_RICH_TEXT_LENGTH: usize = 2000;

/// Notion column kinds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Title,
    RichText,
    Number,
    Select,
    MultiSelect,
    Status,
    Date,
    Checkbox,
    Email,
    Url,
    PhoneNumber,
    People,
    Relation,
    Files,
    Formula,
    Rollup,
    UniqueId,
    CreatedTime,
    CreatedBy,
    LastEditedTime,
    LastEditedBy,
    /// Any type tag this crate does not model
    Other(String),
}

impl PropertyType {
    /// Parse Notion's `type` tag.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "title" => PropertyType::Title,
            "rich_text" => PropertyType::RichText,
            "number" => PropertyType::Number,
            "select" => PropertyType::Select,
            "multi_select" => PropertyType::MultiSelect,
            "status" => PropertyType::Status,
            "date" => PropertyType::Date,
            "checkbox" => PropertyType::Checkbox,
            "email" => PropertyType::Email,
            "url" => PropertyType::Url,
            "phone_number" => PropertyType::PhoneNumber,
            "people" => PropertyType::People,
            "relation" => PropertyType::Relation,
            "files" => PropertyType::Files,
            "formula" => PropertyType::Formula,
            "rollup" => PropertyType::Rollup,
            "unique_id" => PropertyType::UniqueId,
            "created_time" => PropertyType::CreatedTime,
            "created_by" => PropertyType::CreatedBy,
            "last_edited_time" => PropertyType::LastEditedTime,
            "last_edited_by" => PropertyType::LastEditedBy,
            other => PropertyType::Other(other.to_string()),
        }
    }

    /// Notion's `type` tag for this kind.
    pub fn tag(&self) -> &str {
        match self {
            PropertyType::Title => "title",
            PropertyType::RichText => "rich_text",
            PropertyType::Number => "number",
            PropertyType::Select => "select",
            PropertyType::MultiSelect => "multi_select",
            PropertyType::Status => "status",
            PropertyType::Date => "date",
            PropertyType::Checkbox => "checkbox",
            PropertyType::Email => "email",
            PropertyType::Url => "url",
            PropertyType::PhoneNumber => "phone_number",
            PropertyType::People => "people",
            PropertyType::Relation => "relation",
            PropertyType::Files => "files",
            PropertyType::Formula => "formula",
            PropertyType::Rollup => "rollup",
            PropertyType::UniqueId => "unique_id",
            PropertyType::CreatedTime => "created_time",
            PropertyType::CreatedBy => "created_by",
            PropertyType::LastEditedTime => "last_edited_time",
            PropertyType::LastEditedBy => "last_edited_by",
            PropertyType::Other(tag) => tag,
        }
    }

    /// Computed and system-managed kinds cannot be written.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            PropertyType::Formula
                | PropertyType::Rollup
                | PropertyType::UniqueId
                | PropertyType::CreatedTime
                | PropertyType::CreatedBy
                | PropertyType::LastEditedTime
                | PropertyType::LastEditedBy
                | PropertyType::Other(_)
        )
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One column of a Notion database
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySchema {
    pub id: String,
    pub name: String,
    pub property_type: PropertyType,
    /// Option names for select, multi_select and status columns
    pub options: Vec<String>,
    /// Raw type-specific configuration
    pub config: Value,
}

impl PropertySchema {
    /// Build from one entry of a database's `properties` object.
    pub fn from_json(name: &str, raw: &Value) -> Self {
        let tag = raw["type"].as_str().unwrap_or("unknown");
        let property_type = PropertyType::from_tag(tag);
        let config = raw.get(tag).cloned().unwrap_or(Value::Null);
        let options = config["options"]
            .as_array()
            .map(|opts| {
                opts.iter()
                    .filter_map(|o| o["name"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: raw["id"].as_str().unwrap_or_default().to_string(),
            name: raw["name"].as_str().unwrap_or(name).to_string(),
            property_type,
            options,
            config,
        }
    }
}

/// Column definitions of a database, ordered by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseSchema {
    properties: BTreeMap<String, PropertySchema>,
}

impl DatabaseSchema {
    /// Build from a database object (or just its `properties` map).
    pub fn from_json(database: &Value) -> Self {
        let props = database.get("properties").unwrap_or(database);
        let properties = props
            .as_object()
            .map(|map| {
                map.iter()
                    .map(|(name, raw)| (name.clone(), PropertySchema::from_json(name, raw)))
                    .collect()
            })
            .unwrap_or_default();
        Self { properties }
    }

    pub fn get(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertySchema> {
        self.properties.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// The single `title` column every Notion database has.
    pub fn title_property(&self) -> Option<&PropertySchema> {
        self.iter()
            .find(|p| p.property_type == PropertyType::Title)
    }

    /// Encode a map of plain values into a Notion `properties` payload.
    pub fn encode_properties(&self, values: &Map<String, Value>) -> Result<Map<String, Value>> {
        let mut out = Map::new();
        for (name, value) in values {
            let schema = self
                .get(name)
                .ok_or_else(|| Error::UnknownProperty(name.clone()))?;
            out.insert(name.clone(), encode_property(schema, value)?);
        }
        Ok(out)
    }
}

/// Decode every property of a page into plain values.
pub fn decode_properties(page_properties: &Value) -> Map<String, Value> {
    page_properties
        .as_object()
        .map(|props| {
            props
                .iter()
                .map(|(name, prop)| (name.clone(), decode_property(prop)))
                .collect()
        })
        .unwrap_or_default()
}

/// Decode one page property object (`{"type": "...", "<type>": ...}`).
pub fn decode_property(prop: &Value) -> Value {
    let tag = prop["type"].as_str().unwrap_or_default();
    decode_typed(tag, &prop[tag])
}

fn decode_typed(tag: &str, inner: &Value) -> Value {
    match PropertyType::from_tag(tag) {
        PropertyType::Title | PropertyType::RichText => Value::String(plain_text(inner)),
        PropertyType::Number
        | PropertyType::Checkbox
        | PropertyType::Email
        | PropertyType::Url
        | PropertyType::PhoneNumber
        | PropertyType::CreatedTime
        | PropertyType::LastEditedTime => inner.clone(),
        PropertyType::Select | PropertyType::Status => inner
            .get("name")
            .cloned()
            .unwrap_or(Value::Null),
        PropertyType::MultiSelect => names_of(inner),
        PropertyType::Date => decode_date(inner),
        PropertyType::UniqueId => {
            let number = inner.get("number").cloned().unwrap_or(Value::Null);
            match (inner["prefix"].as_str(), number.as_i64()) {
                (Some(prefix), Some(n)) if !prefix.is_empty() => json!(format!("{prefix}-{n}")),
                _ => number,
            }
        }
        PropertyType::Formula => {
            let kind = inner["type"].as_str().unwrap_or_default();
            match kind {
                "date" => decode_date(&inner["date"]),
                _ => inner.get(kind).cloned().unwrap_or(Value::Null),
            }
        }
        PropertyType::Rollup => {
            let kind = inner["type"].as_str().unwrap_or_default();
            match kind {
                "array" => Value::Array(
                    inner["array"]
                        .as_array()
                        .map(|items| items.iter().map(decode_property).collect())
                        .unwrap_or_default(),
                ),
                "date" => decode_date(&inner["date"]),
                _ => inner.get(kind).cloned().unwrap_or(Value::Null),
            }
        }
        PropertyType::People => Value::Array(
            inner
                .as_array()
                .map(|people| {
                    people
                        .iter()
                        .filter_map(|p| p["name"].as_str().or_else(|| p["id"].as_str()))
                        .map(|s| Value::String(s.to_string()))
                        .collect()
                })
                .unwrap_or_default(),
        ),
        PropertyType::Relation => ids_of(inner),
        PropertyType::Files => names_of(inner),
        PropertyType::CreatedBy | PropertyType::LastEditedBy => {
            inner.get("id").cloned().unwrap_or(Value::Null)
        }
        PropertyType::Other(_) => {
            debug!(tag, "passing through unknown property type");
            inner.clone()
        }
    }
}

/// Join the text of a rich text array.
pub fn plain_text(rich_text: &Value) -> String {
    rich_text
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|t| {
                    t["plain_text"]
                        .as_str()
                        .or_else(|| t["text"]["content"].as_str())
                })
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn decode_date(date: &Value) -> Value {
    if date.is_null() {
        return Value::Null;
    }
    match date.get("end") {
        Some(end) if !end.is_null() => json!({ "start": date["start"], "end": end }),
        _ => date.get("start").cloned().unwrap_or(Value::Null),
    }
}

fn names_of(items: &Value) -> Value {
    Value::Array(
        items
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|o| o["name"].as_str())
                    .map(|s| Value::String(s.to_string()))
                    .collect()
            })
            .unwrap_or_default(),
    )
}

fn ids_of(items: &Value) -> Value {
    Value::Array(
        items
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|o| o["id"].as_str())
                    .map(|s| Value::String(s.to_string()))
                    .collect()
            })
            .unwrap_or_default(),
    )
}

/// Encode a plain value into the write payload for one property.
pub fn encode_property(schema: &PropertySchema, value: &Value) -> Result<Value> {
    let kind = &schema.property_type;
    let mismatch = |expected: &str| Error::TypeMismatch {
        property: schema.name.clone(),
        expected: expected.to_string(),
        found: describe(value),
    };

    let encoded = match kind {
        PropertyType::Title | PropertyType::RichText => {
            let text = match value {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return Err(mismatch("text")),
            };
            rich_text(&text)
        }
        PropertyType::Number => match value {
            Value::Null | Value::Number(_) => value.clone(),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| mismatch("number"))?,
            _ => return Err(mismatch("number")),
        },
        PropertyType::Select | PropertyType::Status => match value {
            Value::Null => Value::Null,
            Value::String(s) => json!({ "name": s }),
            _ => return Err(mismatch("option name")),
        },
        PropertyType::MultiSelect => {
            let names = string_list(value).ok_or_else(|| mismatch("list of option names"))?;
            Value::Array(names.into_iter().map(|n| json!({ "name": n })).collect())
        }
        PropertyType::Checkbox => match value {
            Value::Bool(b) => Value::Bool(*b),
            Value::Number(n) if n.as_i64() == Some(0) => Value::Bool(false),
            Value::Number(n) if n.as_i64() == Some(1) => Value::Bool(true),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Value::Bool(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Value::Bool(false),
            _ => return Err(mismatch("boolean")),
        },
        PropertyType::Email | PropertyType::Url | PropertyType::PhoneNumber => match value {
            Value::Null | Value::String(_) => value.clone(),
            _ => return Err(mismatch("string")),
        },
        PropertyType::Date => match value {
            Value::Null => Value::Null,
            Value::String(s) => json!({ "start": s }),
            Value::Object(obj) if obj.contains_key("start") => value.clone(),
            _ => return Err(mismatch("date string")),
        },
        PropertyType::People => {
            let ids = string_list(value).ok_or_else(|| mismatch("list of user ids"))?;
            Value::Array(
                ids.into_iter()
                    .map(|id| json!({ "object": "user", "id": id }))
                    .collect(),
            )
        }
        PropertyType::Relation => {
            let ids = string_list(value).ok_or_else(|| mismatch("list of page ids"))?;
            Value::Array(ids.into_iter().map(|id| json!({ "id": id })).collect())
        }
        PropertyType::Files => {
            let urls = string_list(value).ok_or_else(|| mismatch("list of file urls"))?;
            Value::Array(
                urls.into_iter()
                    .map(|url| {
                        let name = url.rsplit('/').next().unwrap_or(&url).to_string();
                        json!({ "name": name, "type": "external", "external": { "url": url } })
                    })
                    .collect(),
            )
        }
        PropertyType::Formula
        | PropertyType::Rollup
        | PropertyType::UniqueId
        | PropertyType::CreatedTime
        | PropertyType::CreatedBy
        | PropertyType::LastEditedTime
        | PropertyType::LastEditedBy
        | PropertyType::Other(_) => {
            return Err(Error::ReadOnlyProperty {
                name: schema.name.clone(),
                property_type: kind.tag().to_string(),
            })
        }
    };

    let mut payload = Map::new();
    payload.insert(kind.tag().to_string(), encoded);
    Ok(Value::Object(payload))
}

/// Build a rich text array, splitting long strings at Notion's size limit.
pub fn rich_text(text: &str) -> Value {
    let chars: Vec<char> = text.chars().collect();
    Value::Array(
        chars
            .chunks(MAX_RICH_TEXT_LENGTH)
            .map(|chunk| {
                let content: String = chunk.iter().collect();
                json!({ "type": "text", "text": { "content": content } })
            })
            .collect(),
    )
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::String(s) => Some(
            s.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(String::from)
                .collect(),
        ),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(String::from))
            .collect(),
        _ => None,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}
