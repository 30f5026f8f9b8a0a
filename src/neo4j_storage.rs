//! Neo4j Storage
//!
//! [`GraphStore`] backed by a pooled `neo4rs::Graph`. Each call acquires a
//! connection, runs its statements in one transaction and releases the
//! connection on commit or rollback.

use crate::config::GraphSystemConfig;
use crate::error::StoreError;
use crate::statements::{Param, Row, Statement};
use crate::store::GraphStore;
use async_trait::async_trait;
use neo4rs::{query, BoltType, ConfigBuilder, Graph, Query, Txn};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

// ============================================================================
// Connection
// ============================================================================

/// Wait before the next connection attempt: 1s, 2s, 4s, 8s...
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt.saturating_sub(1)))
}

async fn connect_once(system: &GraphSystemConfig) -> Result<Graph, neo4rs::Error> {
    let mut builder = ConfigBuilder::default()
        .uri(system.endpoint.as_str())
        .user(system.username.as_str())
        .password(system.password.as_str());
    if let Some(database) = &system.database {
        builder = builder.db(database.as_str());
    }
    if let Some(max_connections) = system.max_connections {
        builder = builder.max_connections(max_connections);
    }

    let graph = Graph::connect(builder.build()?).await?;
    // The pool opens connections lazily; one round trip proves the server answers.
    graph.run(query("RETURN 1")).await?;
    Ok(graph)
}

/// Runs `attempt` up to `max_retries` times, sleeping [`backoff_delay`]
/// between failures.
pub(crate) async fn retry_with_backoff<T, E, F, Fut>(target: &str, max_retries: u32, mut attempt: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let max_retries = max_retries.max(1);

    for n in 1..=max_retries {
        info!("🔄 Attempting to connect to Neo4j at {}... (attempt {}/{})", target, n, max_retries);

        match attempt().await {
            Ok(connected) => {
                info!("✅ Successfully connected to Neo4j");
                return Ok(connected);
            }
            Err(e) if n < max_retries => {
                let wait_time = backoff_delay(n);
                warn!(
                    "⚠️  Failed to connect to Neo4j: {}. Retrying in {}s (attempt {}/{})...",
                    e,
                    wait_time.as_secs(),
                    n,
                    max_retries
                );
                sleep(wait_time).await;
            }
            Err(e) => {
                error!("❌ Failed to connect to Neo4j after {} attempts: {}", max_retries, e);
                return Err(StoreError::Connection(format!(
                    "Neo4j connection failed after {} retries: {}",
                    max_retries, e
                )));
            }
        }
    }

    Err(StoreError::Connection("Failed to connect to Neo4j".to_string()))
}

/// Connect to Neo4j with exponential backoff retry logic
async fn connect_neo4j_with_retry(system: &GraphSystemConfig) -> Result<Graph, StoreError> {
    retry_with_backoff(&system.endpoint, system.connect_retries, || connect_once(system)).await
}

// ============================================================================
// Store
// ============================================================================

pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    pub async fn connect(system: &GraphSystemConfig) -> Result<Self, StoreError> {
        let graph = connect_neo4j_with_retry(system).await?;
        Ok(Self::from_graph(graph))
    }

    pub fn from_graph(graph: Graph) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn run_in_transaction(&self, statements: &[Statement]) -> Result<(), StoreError> {
        let mut txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to start transaction: {}", e)))?;

        match execute_statements(&mut txn, statements).await {
            Ok(_) => {
                txn.commit()
                    .await
                    .map_err(|e| StoreError::Commit(e.to_string()))?;
                debug!("Transaction committed ({} statements)", statements.len());
                Ok(())
            }
            Err(e) => {
                warn!("❌ Error during transaction, rolling back: {}", e);
                if let Err(rollback) = txn.rollback().await {
                    warn!("Failed to rollback transaction: {}", rollback);
                }
                Err(e)
            }
        }
    }
}

async fn execute_statements(txn: &mut Txn, statements: &[Statement]) -> Result<(), StoreError> {
    for statement in statements {
        let q = to_query(statement)?;
        txn.run(q).await.map_err(|e| StoreError::Statement {
            statement: statement.name(),
            message: e.to_string(),
        })?;
        debug!("   {} ({} rows)", statement.name(), statement.len());
    }
    Ok(())
}

// ============================================================================
// Helper: Convert to BoltType parameters
// ============================================================================

fn to_query(statement: &Statement) -> Result<Query, StoreError> {
    let mut q = query(&statement.cypher());
    for (name, param) in statement.parameters() {
        q = match param {
            Param::Text(text) => q.param(name, text),
            Param::Rows(rows) => q.param(name, rows_to_bolt(&rows)?),
        };
    }
    Ok(q)
}

fn rows_to_bolt(rows: &[Row]) -> Result<Vec<HashMap<String, BoltType>>, StoreError> {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|(key, value)| Ok((key.clone(), json_to_bolt(value)?)))
                .collect()
        })
        .collect()
}

fn json_to_bolt(value: &Value) -> Result<BoltType, StoreError> {
    match value {
        Value::Bool(b) => Ok((*b).into()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i.into())
            } else if let Some(f) = n.as_f64() {
                Ok(f.into())
            } else {
                Err(StoreError::Parameter(format!("number {} is out of range", n)))
            }
        }
        Value::String(s) => Ok(s.clone().into()),
        Value::Array(items) => {
            let list = items.iter().map(json_to_bolt).collect::<Result<Vec<_>, _>>()?;
            Ok(list.into())
        }
        Value::Null => Err(StoreError::Parameter("null is not a storable value".to_string())),
        Value::Object(_) => Err(StoreError::Parameter("maps are not storable values".to_string())),
    }
}
