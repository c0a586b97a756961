//! Typed builders for Notion's query `filter` and `sorts` JSON.
//!
//! ```
//! use notion2sql_client::filter::{Filter, Sort};
//! use notion2sql_core::PropertyType;
//! use serde_json::json;
//!
//! let filter = Filter::and(vec![
//!     Filter::property("Status", PropertyType::Status).equals("Done"),
//!     Filter::property("Score", PropertyType::Number).greater_than(3),
//! ]);
//! assert_eq!(
//!     filter.to_json(),
//!     json!({"and": [
//!         {"property": "Status", "status": {"equals": "Done"}},
//!         {"property": "Score", "number": {"greater_than": 3}}
//!     ]})
//! );
//! assert_eq!(
//!     serde_json::to_value(Sort::descending("Score")).unwrap(),
//!     json!({"property": "Score", "direction": "descending"})
//! );
//! ```

use notion2sql_core::PropertyType;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// A query filter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `{"property": name, "<type>": {"<condition>": value}}`
    Property {
        property: String,
        property_type: PropertyType,
        condition: String,
        value: Value,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    /// Passed through unchanged
    Raw(Value),
}

/// Builder returned by [`Filter::property`]
#[derive(Debug, Clone)]
pub struct PropertyFilter {
    property: String,
    property_type: PropertyType,
}

impl Filter {
    pub fn property(name: impl Into<String>, property_type: PropertyType) -> PropertyFilter {
        PropertyFilter {
            property: name.into(),
            property_type,
        }
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    pub fn raw(value: Value) -> Self {
        Filter::Raw(value)
    }

    pub fn to_json(&self) -> Value {
        match self {
            Filter::Property {
                property,
                property_type,
                condition,
                value,
            } => {
                let mut inner = Map::new();
                inner.insert(condition.clone(), value.clone());
                let mut filter = Map::new();
                filter.insert("property".to_string(), json!(property));
                filter.insert(property_type.tag().to_string(), Value::Object(inner));
                Value::Object(filter)
            }
            Filter::And(filters) => json!({ "and": filters.iter().map(Filter::to_json).collect::<Vec<_>>() }),
            Filter::Or(filters) => json!({ "or": filters.iter().map(Filter::to_json).collect::<Vec<_>>() }),
            Filter::Raw(value) => value.clone(),
        }
    }
}

impl PropertyFilter {
    fn condition(self, condition: &str, value: Value) -> Filter {
        Filter::Property {
            property: self.property,
            property_type: self.property_type,
            condition: condition.to_string(),
            value,
        }
    }

    pub fn equals(self, value: impl Into<Value>) -> Filter {
        self.condition("equals", value.into())
    }

    pub fn does_not_equal(self, value: impl Into<Value>) -> Filter {
        self.condition("does_not_equal", value.into())
    }

    pub fn contains(self, value: impl Into<Value>) -> Filter {
        self.condition("contains", value.into())
    }

    pub fn greater_than(self, value: impl Into<Value>) -> Filter {
        self.condition("greater_than", value.into())
    }

    pub fn less_than(self, value: impl Into<Value>) -> Filter {
        self.condition("less_than", value.into())
    }

    pub fn is_empty(self) -> Filter {
        self.condition("is_empty", Value::Bool(true))
    }

    pub fn is_not_empty(self) -> Filter {
        self.condition("is_not_empty", Value::Bool(true))
    }
}

impl From<Filter> for Value {
    fn from(filter: Filter) -> Self {
        filter.to_json()
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ascending,
    Descending,
}

/// Page timestamps Notion can sort by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Timestamp {
    CreatedTime,
    LastEditedTime,
}

/// One entry of a query's `sorts` array
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Sort {
    Property { property: String, direction: Direction },
    Timestamp { timestamp: Timestamp, direction: Direction },
}

impl Sort {
    pub fn ascending(property: impl Into<String>) -> Self {
        Sort::Property {
            property: property.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn descending(property: impl Into<String>) -> Self {
        Sort::Property {
            property: property.into(),
            direction: Direction::Descending,
        }
    }

    pub fn timestamp(timestamp: Timestamp, direction: Direction) -> Self {
        Sort::Timestamp {
            timestamp,
            direction,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Sort::Property {
                property,
                direction,
            } => json!({ "property": property, "direction": direction }),
            Sort::Timestamp {
                timestamp,
                direction,
            } => json!({ "timestamp": timestamp, "direction": direction }),
        }
    }
}

impl From<Sort> for Value {
    fn from(sort: Sort) -> Self {
        sort.to_json()
    }
}
