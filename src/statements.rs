//! Parameterized statement templates
//!
//! Row data always travels as the `$items` parameter. Labels and relationship
//! types are the only interpolated text, and both types can only be built
//! through the allow-list in [`crate::naming`].

use crate::naming::{Label, RelationshipType};
use crate::planner::{EdgeRecord, NodeRecord, GID_KEY};
use serde_json::Value;
use std::collections::BTreeMap;

pub type Row = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    Rows(Vec<Row>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateIndex { label: Label },
    DeleteDataset { label: Label, source: String },
    DeleteNodes { gids: Vec<String> },
    UpsertNodes { label: Label, nodes: Vec<NodeRecord> },
    MergePlaceholders { gids: Vec<String> },
    MergeRelationships { rel_type: RelationshipType, edges: Vec<EdgeRecord> },
}

const DELETE_NODES: &str = "UNWIND $items AS item
MATCH (n {gid: item.gid})
DETACH DELETE n";

const MERGE_PLACEHOLDERS: &str = "UNWIND $items AS item
MERGE (n {gid: item.gid})";

impl Statement {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Statement::CreateIndex { .. } => "create index",
            Statement::DeleteDataset { .. } => "delete dataset",
            Statement::DeleteNodes { .. } => "delete nodes",
            Statement::UpsertNodes { .. } => "upsert nodes",
            Statement::MergePlaceholders { .. } => "merge target nodes",
            Statement::MergeRelationships { .. } => "merge relationships",
        }
    }

    pub fn cypher(&self) -> String {
        match self {
            Statement::CreateIndex { label } => format!(
                "CREATE INDEX `external_id_index_{label}` IF NOT EXISTS FOR (n:`{label}`) ON (n.gid)"
            ),
            Statement::DeleteDataset { label, .. } => {
                format!("MATCH (n:`{label}` {{source: $source}})\nDETACH DELETE n")
            }
            Statement::DeleteNodes { .. } => DELETE_NODES.to_string(),
            Statement::UpsertNodes { label, .. } => format!(
                "UNWIND $items AS item
MERGE (n {{gid: item.gid}})
WITH n, item
OPTIONAL MATCH (n)-[r]->()
DELETE r
WITH DISTINCT n, item
SET n:`{label}`
SET n = item"
            ),
            Statement::MergePlaceholders { .. } => MERGE_PLACEHOLDERS.to_string(),
            Statement::MergeRelationships { rel_type, .. } => format!(
                "UNWIND $items AS item
MATCH (n1 {{gid: item.from}})
MATCH (n2 {{gid: item.to}})
MERGE (n1)-[r:`{rel_type}`]->(n2)
SET r.source = item.source
SET r.type = item.type"
            ),
        }
    }

    pub fn parameters(&self) -> Vec<(&'static str, Param)> {
        match self {
            Statement::CreateIndex { .. } => Vec::new(),
            Statement::DeleteDataset { source, .. } => vec![("source", Param::Text(source.clone()))],
            Statement::DeleteNodes { gids } | Statement::MergePlaceholders { gids } => {
                vec![("items", Param::Rows(gids.iter().map(|gid| gid_row(gid)).collect()))]
            }
            Statement::UpsertNodes { nodes, .. } => {
                vec![("items", Param::Rows(nodes.iter().map(|node| node.properties.clone()).collect()))]
            }
            Statement::MergeRelationships { edges, .. } => {
                vec![("items", Param::Rows(edges.iter().map(edge_row).collect()))]
            }
        }
    }

    /// Number of rows carried by the statement.
    pub fn len(&self) -> usize {
        match self {
            Statement::CreateIndex { .. } | Statement::DeleteDataset { .. } => 1,
            Statement::DeleteNodes { gids } | Statement::MergePlaceholders { gids } => gids.len(),
            Statement::UpsertNodes { nodes, .. } => nodes.len(),
            Statement::MergeRelationships { edges, .. } => edges.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn gid_row(gid: &str) -> Row {
    Row::from([(GID_KEY.to_string(), Value::String(gid.to_string()))])
}

fn edge_row(edge: &EdgeRecord) -> Row {
    Row::from([
        ("from".to_string(), Value::String(edge.from.clone())),
        ("to".to_string(), Value::String(edge.to.clone())),
        ("source".to_string(), Value::String(edge.source.clone())),
        ("type".to_string(), Value::String(edge.reference.clone())),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upsert_template_uses_label_and_items() {
        let statement = Statement::UpsertNodes {
            label: Label::parse("Person").unwrap(),
            nodes: vec![NodeRecord {
                gid: "A".into(),
                properties: Row::from([
                    ("gid".to_string(), json!("A")),
                    ("source".to_string(), json!("people")),
                ]),
            }],
        };

        let cypher = statement.cypher();
        assert!(cypher.contains("SET n:`Person`"));
        assert!(cypher.contains("OPTIONAL MATCH (n)-[r]->()"));
        assert!(cypher.contains("SET n = item"));

        let params = statement.parameters();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].0, "items");
        match &params[0].1 {
            Param::Rows(rows) => assert_eq!(rows[0]["source"], json!("people")),
            other => panic!("unexpected parameter {:?}", other),
        }
    }

    #[test]
    fn test_delete_dataset_binds_source() {
        let statement = Statement::DeleteDataset {
            label: Label::parse("Person").unwrap(),
            source: "people\"}) DETACH DELETE m //".into(),
        };

        assert_eq!(statement.cypher(), "MATCH (n:`Person` {source: $source})\nDETACH DELETE n");
        assert_eq!(
            statement.parameters(),
            vec![("source", Param::Text("people\"}) DETACH DELETE m //".into()))]
        );
    }

    #[test]
    fn test_relationship_rows() {
        let statement = Statement::MergeRelationships {
            rel_type: RelationshipType::parse("worksFor").unwrap(),
            edges: vec![EdgeRecord {
                from: "T1".into(),
                to: "T2".into(),
                source: "people".into(),
                reference: "http://data.sample.org/worksFor".into(),
            }],
        };

        assert!(statement.cypher().contains("MERGE (n1)-[r:`worksFor`]->(n2)"));
        let params = statement.parameters();
        let Param::Rows(rows) = &params[0].1 else {
            panic!("expected rows");
        };
        assert_eq!(rows[0]["from"], json!("T1"));
        assert_eq!(rows[0]["to"], json!("T2"));
        assert_eq!(rows[0]["type"], json!("http://data.sample.org/worksFor"));
    }

    #[test]
    fn test_index_statement() {
        let statement = Statement::CreateIndex {
            label: Label::parse("Person").unwrap(),
        };
        assert_eq!(
            statement.cypher(),
            "CREATE INDEX `external_id_index_Person` IF NOT EXISTS FOR (n:`Person`) ON (n.gid)"
        );
        assert!(statement.parameters().is_empty());
    }
}
