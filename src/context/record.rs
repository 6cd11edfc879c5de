//! Record representation inside the shared context

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Typed property values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<PropertyValue>),
    Object(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Convert a JSON value, dropping nulls (at any depth).
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Int(i)),
                None => n.as_f64().map(Self::Float),
            },
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Array(items) => Some(Self::Array(
                items.iter().filter_map(Self::from_json).collect(),
            )),
            Value::Object(map) => Some(Self::Object(
                map.iter()
                    .filter_map(|(k, v)| Self::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Properties collection
pub type Properties = BTreeMap<String, PropertyValue>;

/// Keys consumed as record identity rather than stored as properties.
const ID_KEYS: [&str; 1] = ["id"];
const NAME_KEYS: [&str; 3] = ["name", "label", "text"];

/// One extracted entity (an arm, an encounter, an objective, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier, unique within its record set
    pub id: String,
    /// Display name; may be empty
    pub name: String,
    /// Entity kind (e.g. "arm", "epoch", "activity")
    pub kind: String,
    /// Remaining extracted attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
}

impl Record {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Add a property to the record
    pub fn with_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Build a record from one element of an extracted JSON list.
    ///
    /// `position` is 1-based and only used when the element carries no `id`,
    /// which keeps generated ids stable across runs. Bare strings become
    /// records whose name is the string.
    pub fn from_json(kind: &str, position: usize, value: &Value) -> Option<Self> {
        let fallback_id = || format!("{}_{}", kind, position);

        match value {
            Value::String(s) if !s.trim().is_empty() => {
                Some(Self::new(fallback_id(), s.trim(), kind))
            }
            Value::Object(map) => {
                let id = ID_KEYS
                    .iter()
                    .find_map(|k| map.get(*k).and_then(json_scalar_string))
                    .unwrap_or_else(fallback_id);
                let name = NAME_KEYS
                    .iter()
                    .find_map(|k| map.get(*k).and_then(json_scalar_string))
                    .unwrap_or_default();

                let properties = map
                    .iter()
                    .filter(|(k, _)| !ID_KEYS.contains(&k.as_str()) && !NAME_KEYS.contains(&k.as_str()))
                    .filter_map(|(k, v)| PropertyValue::from_json(v).map(|v| (k.clone(), v)))
                    .collect();

                Some(Self {
                    id,
                    name,
                    kind: kind.to_string(),
                    properties,
                })
            }
            _ => None,
        }
    }

    /// Look up a string property
    pub fn text(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(PropertyValue::as_str)
    }
}

fn json_scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
