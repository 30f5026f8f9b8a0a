//! Mutation Planner
//!
//! Turns one buffered batch of entities into the groups of mutations the
//! executor applies: deletions, node upserts, placeholder targets and
//! relationship groups keyed by relationship type. Planning never touches the
//! store.

use crate::entity::{value_kind, Entity, Reference};
use crate::error::PlanError;
use crate::naming::{normalize, Label, RelationshipType};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::warn;

pub const GID_KEY: &str = "gid";
pub const SOURCE_KEY: &str = "source";

/// Flattened node properties: `gid`, `source` and one entry per normalized
/// property key.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub gid: String,
    pub properties: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRecord {
    pub from: String,
    pub to: String,
    pub source: String,
    /// The un-normalized reference key.
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationPlan {
    pub label: Label,
    pub deletions: BTreeSet<String>,
    pub upserts: Vec<NodeRecord>,
    pub placeholder_targets: BTreeSet<String>,
    pub relationship_groups: BTreeMap<RelationshipType, Vec<EdgeRecord>>,
}

impl MutationPlan {
    fn new(label: Label) -> Self {
        Self {
            label,
            deletions: BTreeSet::new(),
            upserts: Vec::new(),
            placeholder_targets: BTreeSet::new(),
            relationship_groups: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.upserts.is_empty() && self.placeholder_targets.is_empty()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationship_groups.values().map(Vec::len).sum()
    }
}

/// Plans a batch for `dataset`, labelling upserted nodes with `label`.
///
/// When the batch holds the same identifier more than once, only its last
/// occurrence is planned.
pub fn plan(entities: &[Entity], dataset: &str, label: &Label) -> Result<MutationPlan, PlanError> {
    let mut last_seen: HashMap<&str, usize> = HashMap::with_capacity(entities.len());
    for (position, entity) in entities.iter().enumerate() {
        last_seen.insert(entity.id.as_str(), position);
    }

    let mut plan = MutationPlan::new(label.clone());

    for (position, entity) in entities.iter().enumerate() {
        if last_seen.get(entity.id.as_str()) != Some(&position) {
            continue;
        }

        if entity.is_deleted {
            plan.deletions.insert(entity.id.clone());
            continue;
        }

        plan.upserts.push(node_record(entity, dataset)?);

        for (key, value) in &entity.references {
            let reference = Reference::from_value(value).map_err(|kind| PlanError::UnsupportedReference {
                entity: entity.id.clone(),
                key: key.clone(),
                kind,
            })?;
            let rel_type = RelationshipType::from_reference_key(key)?;

            let group = plan.relationship_groups.entry(rel_type).or_default();
            for target in reference.targets() {
                plan.placeholder_targets.insert(target.clone());
                group.push(EdgeRecord {
                    from: entity.id.clone(),
                    to: target.clone(),
                    source: dataset.to_string(),
                    reference: key.clone(),
                });
            }
        }
    }

    plan.relationship_groups.retain(|_, edges| !edges.is_empty());

    Ok(plan)
}

fn node_record(entity: &Entity, dataset: &str) -> Result<NodeRecord, PlanError> {
    let mut properties = BTreeMap::new();

    for (key, value) in &entity.properties {
        check_property(entity, key, value)?;
        if value.is_null() {
            continue;
        }

        let local = normalize(key);
        if local.is_empty() {
            return Err(PlanError::EmptyPropertyName {
                entity: entity.id.clone(),
                key: key.clone(),
            });
        }
        if local == GID_KEY || local == SOURCE_KEY {
            warn!("entity {}: property {} collides with reserved key {}, dropped", entity.id, key, local);
            continue;
        }
        properties.insert(local.to_string(), value.clone());
    }

    properties.insert(GID_KEY.to_string(), Value::String(entity.id.clone()));
    properties.insert(SOURCE_KEY.to_string(), Value::String(dataset.to_string()));

    Ok(NodeRecord {
        gid: entity.id.clone(),
        properties,
    })
}

fn check_property(entity: &Entity, key: &str, value: &Value) -> Result<(), PlanError> {
    let unsupported = |kind| PlanError::UnsupportedProperty {
        entity: entity.id.clone(),
        key: key.to_string(),
        kind,
    };

    match value {
        Value::Object(_) => Err(unsupported("object")),
        Value::Array(items) => {
            if let Some(item) = items.iter().find(|item| item.is_null() || item.is_object() || item.is_array()) {
                return Err(unsupported(value_kind(item)));
            }
            // Stored lists must be homogeneous.
            match items.first().map(element_kind) {
                Some(first) if items.iter().any(|item| element_kind(item) != first) => Err(unsupported("mixed list")),
                _ => Ok(()),
            }
        }
        _ => Ok(()),
    }
}

/// Scalar kind as the store sees it: integers and floats differ.
fn element_kind(value: &Value) -> &'static str {
    match value {
        Value::Number(n) if n.is_i64() => "integer",
        Value::Number(_) => "float",
        other => value_kind(other),
    }
}
