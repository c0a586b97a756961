/// Row and value types shared by the executor and the SQL interface
///
/// Values are the SQL-side view of decoded Notion properties.
use super::ast::{BinaryOperator, Literal};
use serde_json::{Map, Number, Value as JsonValue};
use std::cmp::Ordering;
use std::fmt;

/// Query result row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub columns: Vec<Column>,
    pub values: Vec<Value>,
}

/// Column metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub alias: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    /// Name shown to callers: the alias when one was given.
    pub fn label(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

impl Row {
    /// Build a row from column names and values of equal length.
    pub fn new(columns: Vec<Column>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Build a row whose columns follow `names`, reading values from a JSON map.
    /// Names absent from the map become NULL.
    pub fn from_json<'a>(names: impl IntoIterator<Item = &'a str>, map: &Map<String, JsonValue>) -> Self {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for name in names {
            columns.push(Column::new(name));
            values.push(map.get(name).map(Value::from_json).unwrap_or(Value::Null));
        }
        Self { columns, values }
    }

    /// Column index by name or alias; exact match wins over case-insensitive.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name || c.alias.as_deref() == Some(name))
            .or_else(|| {
                self.columns.iter().position(|c| {
                    c.name.eq_ignore_ascii_case(name)
                        || c.alias.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(name))
                })
            })
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|idx| &self.values[idx])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The `{column: value}` view of this row.
    pub fn to_json(&self) -> Map<String, JsonValue> {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(c, v)| (c.label().to_string(), v.to_json()))
            .collect()
    }
}

/// Value types in query results
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    List(Vec<Value>),
    Null,
}

impl Value {
    /// Convert a decoded property value.
    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Boolean(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            JsonValue::Object(_) => Value::String(json.to_string()),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Integer(i) => JsonValue::from(*i),
            Value::Float(f) => Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Null => JsonValue::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Compare values; any comparison involving NULL is false.
    pub fn compare(&self, other: &Value, op: &BinaryOperator) -> bool {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::List(items), scalar) if !matches!(scalar, Value::List(_)) => match op {
                BinaryOperator::Eq => items.iter().any(|i| i.compare(scalar, op)),
                BinaryOperator::Ne => !items.iter().any(|i| i.compare(scalar, &BinaryOperator::Eq)),
                _ => false,
            },
            (scalar, Value::List(_)) if !matches!(scalar, Value::List(_)) => match op {
                BinaryOperator::Eq | BinaryOperator::Ne => other.compare(self, op),
                _ => false,
            },
            (Value::List(a), Value::List(b)) => match op {
                BinaryOperator::Eq => a == b,
                BinaryOperator::Ne => a != b,
                _ => false,
            },
            (Value::Boolean(a), Value::Boolean(b)) => match op {
                BinaryOperator::Eq => a == b,
                BinaryOperator::Ne => a != b,
                _ => false,
            },
            // checkbox columns compared against 0/1
            (Value::Boolean(b), Value::Integer(i)) | (Value::Integer(i), Value::Boolean(b)) => {
                match op {
                    BinaryOperator::Eq => (*b as i64) == *i,
                    BinaryOperator::Ne => (*b as i64) != *i,
                    _ => false,
                }
            }
            (Value::String(a), Value::String(b)) => apply(a.cmp(b), op),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => match x.partial_cmp(&y) {
                    Some(ordering) => apply(ordering, op),
                    None => false,
                },
                _ => false,
            },
        }
    }

    /// Total order used by ORDER BY, MIN and MAX: NULL < boolean < number < string < list.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Boolean(_) => 1,
                Value::Integer(_) | Value::Float(_) => 2,
                Value::String(_) => 3,
                Value::List(_) => 4,
            }
        }

        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    let ordering = x.sort_cmp(y);
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                a.len().cmp(&b.len())
            }
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => rank(a).cmp(&rank(b)),
            },
        }
    }
}

fn apply(ordering: Ordering, op: &BinaryOperator) -> bool {
    match op {
        BinaryOperator::Eq => ordering == Ordering::Equal,
        BinaryOperator::Ne => ordering != Ordering::Equal,
        BinaryOperator::Lt => ordering == Ordering::Less,
        BinaryOperator::Le => ordering != Ordering::Greater,
        BinaryOperator::Gt => ordering == Ordering::Greater,
        BinaryOperator::Ge => ordering != Ordering::Less,
    }
}

impl From<&Literal> for Value {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::Integer(i) => Value::Integer(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::String(s) => Value::String(s.clone()),
            Literal::Boolean(b) => Value::Boolean(*b),
            Literal::Null => Value::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Null => write!(f, "NULL"),
        }
    }
}
