//! Generic entities as delivered by the host
//!
//! The wire shape follows the entity graph data model: `id`, `deleted`,
//! `recorded`, `props` and `refs`. Reference values stay raw JSON until the
//! planner resolves them into a [`Reference`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Identifier of the namespace record that may open an entity stream.
pub const CONTEXT_ID: &str = "@context";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "deleted", default)]
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded: Option<u64>,
    #[serde(rename = "props", default)]
    pub properties: BTreeMap<String, Value>,
    #[serde(rename = "refs", default)]
    pub references: BTreeMap<String, Value>,
}

impl Entity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_deleted: false,
            recorded: None,
            properties: BTreeMap::new(),
            references: BTreeMap::new(),
        }
    }

    pub fn tombstone(id: impl Into<String>) -> Self {
        Self {
            is_deleted: true,
            ..Self::new(id)
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_reference(mut self, key: impl Into<String>, reference: impl Into<Reference>) -> Self {
        self.references.insert(key.into(), reference.into().into_value());
        self
    }

    /// Expands `prefix:local` forms in the identifier, keys and reference
    /// targets using the stream's namespace context.
    pub fn expand(self, context: &EntityContext) -> Self {
        if context.is_empty() {
            return self;
        }

        let expand_value = |value: Value| match value {
            Value::String(target) => Value::String(context.expand(&target)),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(target) => Value::String(context.expand(&target)),
                        other => other,
                    })
                    .collect(),
            ),
            other => other,
        };

        Self {
            id: context.expand(&self.id),
            is_deleted: self.is_deleted,
            recorded: self.recorded,
            properties: self
                .properties
                .into_iter()
                .map(|(k, v)| (context.expand(&k), v))
                .collect(),
            references: self
                .references
                .into_iter()
                .map(|(k, v)| (context.expand(&k), expand_value(v)))
                .collect(),
        }
    }
}

/// A reference value: one target identifier or several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Single(String),
    Many(Vec<String>),
}

impl Reference {
    /// Resolves a raw reference value. On failure returns the name of the
    /// offending value shape.
    pub fn from_value(value: &Value) -> Result<Self, &'static str> {
        match value {
            Value::String(target) => Ok(Reference::Single(target.clone())),
            Value::Array(items) => {
                if items.iter().all(Value::is_string) {
                    return Ok(Reference::Many(
                        items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
                    ));
                }
                let first = value_kind(&items[0]);
                if items.iter().all(|item| value_kind(item) == first) {
                    Err(first)
                } else {
                    Err("mixed list")
                }
            }
            other => Err(value_kind(other)),
        }
    }

    pub fn targets(&self) -> &[String] {
        match self {
            Reference::Single(target) => std::slice::from_ref(target),
            Reference::Many(targets) => targets,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Reference::Single(target) => Value::String(target),
            Reference::Many(targets) => Value::Array(targets.into_iter().map(Value::String).collect()),
        }
    }
}

impl From<&str> for Reference {
    fn from(target: &str) -> Self {
        Reference::Single(target.to_string())
    }
}

impl From<String> for Reference {
    fn from(target: String) -> Self {
        Reference::Single(target)
    }
}

impl From<Vec<String>> for Reference {
    fn from(targets: Vec<String>) -> Self {
        Reference::Many(targets)
    }
}

impl From<Vec<&str>> for Reference {
    fn from(targets: Vec<&str>) -> Self {
        Reference::Many(targets.into_iter().map(str::to_string).collect())
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Namespace prefixes declared by an `@context` record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EntityContext {
    #[serde(default)]
    pub namespaces: HashMap<String, String>,
}

impl EntityContext {
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// `ns0:name` becomes `<expansion of ns0>name` when `ns0` is declared.
    /// Anything else, including absolute URIs, is returned unchanged.
    pub fn expand(&self, value: &str) -> String {
        if let Some((prefix, local)) = value.split_once(':') {
            if let Some(expansion) = self.namespaces.get(prefix) {
                return format!("{}{}", expansion, local);
            }
        }
        value.to_string()
    }
}
