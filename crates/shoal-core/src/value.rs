// Tri-state attribute values and ordered attribute bags.
//
// A field's value distinguishes "the caller expressed no intent"
// (Unknown) from "explicitly absent" (Null) from a concrete value.
// Unknown fields never participate in diffs; Null ones do.

use indexmap::IndexMap;
use serde_json::json;

static UNKNOWN: Value = Value::Unknown;

/// Tri-state value for one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Not planned / not populated. Skipped by the diff engine.
    Unknown,
    /// Explicitly absent.
    Null,
    /// A concrete value; composite values compare structurally.
    Present(serde_json::Value),
}

impl Value {
    pub fn present(value: impl Into<serde_json::Value>) -> Self {
        Self::Present(value.into())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The concrete JSON value, if present.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Present(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_json().and_then(serde_json::Value::as_u64)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(serde_json::Value::as_str)
    }

    /// Render for a request body: `Null` serializes as JSON null.
    pub(crate) fn to_body_json(&self) -> Option<serde_json::Value> {
        match self {
            Self::Unknown => None,
            Self::Null => Some(json!(null)),
            Self::Present(v) => Some(v.clone()),
        }
    }
}

/// An ordered mapping from field name to tri-state value.
///
/// Field names come from the resource's schema; lookup of a name the
/// bag has never seen yields `Unknown`, so an empty bag is a valid
/// "no intent expressed" desired state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeBag {
    fields: IndexMap<String, Value>,
}

impl AttributeBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: Value) -> &mut Self {
        self.fields.insert(name.to_owned(), value);
        self
    }

    pub fn get(&self, name: &str) -> &Value {
        self.fields.get(name).unwrap_or(&UNKNOWN)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for AttributeBag {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
