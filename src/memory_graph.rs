// In-memory GraphStore used by the tests. Applies statements with the same
// semantics as the Cypher templates, on a copy that only replaces the live
// graph when every statement of the transaction succeeded.

use crate::error::StoreError;
use crate::statements::Statement;
use crate::store::GraphStore;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub labels: BTreeSet<String>,
    pub props: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Edge {
    pub from: String,
    pub rel_type: String,
    pub to: String,
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub nodes: BTreeMap<String, Node>,
    pub edges: BTreeMap<Edge, BTreeMap<String, Value>>,
    pub indexes: BTreeSet<String>,
}

impl Graph {
    pub fn outgoing(&self, gid: &str) -> Vec<&Edge> {
        self.edges.keys().filter(|e| e.from == gid).collect()
    }

    pub fn incident(&self, gid: &str) -> Vec<&Edge> {
        self.edges.keys().filter(|e| e.from == gid || e.to == gid).collect()
    }

    fn detach_delete(&mut self, gid: &str) {
        self.nodes.remove(gid);
        self.edges.retain(|e, _| e.from != gid && e.to != gid);
    }

    fn apply(&mut self, statement: &Statement) {
        match statement {
            Statement::CreateIndex { label } => {
                self.indexes.insert(label.to_string());
            }
            Statement::DeleteDataset { label, source } => {
                let doomed: Vec<String> = self
                    .nodes
                    .iter()
                    .filter(|(_, n)| {
                        n.labels.contains(label.as_str()) && n.props.get("source") == Some(&Value::String(source.clone()))
                    })
                    .map(|(gid, _)| gid.clone())
                    .collect();
                for gid in doomed {
                    self.detach_delete(&gid);
                }
            }
            Statement::DeleteNodes { gids } => {
                for gid in gids {
                    self.detach_delete(gid);
                }
            }
            Statement::UpsertNodes { label, nodes } => {
                for record in nodes {
                    self.edges.retain(|e, _| e.from != record.gid);
                    let node = self.nodes.entry(record.gid.clone()).or_default();
                    node.labels.insert(label.to_string());
                    node.props = record.properties.clone();
                }
            }
            Statement::MergePlaceholders { gids } => {
                for gid in gids {
                    self.nodes.entry(gid.clone()).or_insert_with(|| Node {
                        labels: BTreeSet::new(),
                        props: BTreeMap::from([("gid".to_string(), Value::String(gid.clone()))]),
                    });
                }
            }
            Statement::MergeRelationships { rel_type, edges } => {
                for record in edges {
                    if !self.nodes.contains_key(&record.from) || !self.nodes.contains_key(&record.to) {
                        continue;
                    }
                    let edge = Edge {
                        from: record.from.clone(),
                        rel_type: rel_type.to_string(),
                        to: record.to.clone(),
                    };
                    let props = self.edges.entry(edge).or_default();
                    props.insert("source".to_string(), Value::String(record.source.clone()));
                    props.insert("type".to_string(), Value::String(record.reference.clone()));
                }
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryGraph {
    graph: Mutex<Graph>,
    transactions: Mutex<Vec<Vec<Statement>>>,
    fail_on: Mutex<Option<&'static str>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Graph {
        self.graph.lock().unwrap().clone()
    }

    /// Every transaction attempted so far, committed or not.
    pub fn transactions(&self) -> Vec<Vec<Statement>> {
        self.transactions.lock().unwrap().clone()
    }

    /// Makes every statement with this name fail until cleared.
    pub fn fail_on(&self, statement: Option<&'static str>) {
        *self.fail_on.lock().unwrap() = statement;
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn run_in_transaction(&self, statements: &[Statement]) -> Result<(), StoreError> {
        self.transactions.lock().unwrap().push(statements.to_vec());
        let fail_on = *self.fail_on.lock().unwrap();

        let mut graph = self.graph.lock().unwrap();
        let mut staged = graph.clone();
        for statement in statements {
            if fail_on == Some(statement.name()) {
                return Err(StoreError::Statement {
                    statement: statement.name(),
                    message: "injected failure".to_string(),
                });
            }
            staged.apply(statement);
        }
        *graph = staged;
        Ok(())
    }
}
