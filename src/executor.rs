//! Statement Executor
//!
//! Applies a [`MutationPlan`] as one transaction, bootstraps the per-label
//! identifier indexes, and resets a dataset before a full sync.

use crate::error::{LayerError, StoreError};
use crate::naming::Label;
use crate::planner::MutationPlan;
use crate::statements::Statement;
use crate::store::GraphStore;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Statements for one plan, in the order they must run:
/// deletions, upserts, placeholder targets, then one statement per
/// relationship type. Empty groups are left out.
pub fn statements_for(plan: &MutationPlan) -> Vec<Statement> {
    let mut statements = Vec::with_capacity(3 + plan.relationship_groups.len());

    if !plan.deletions.is_empty() {
        statements.push(Statement::DeleteNodes {
            gids: plan.deletions.iter().cloned().collect(),
        });
    }

    if !plan.upserts.is_empty() {
        statements.push(Statement::UpsertNodes {
            label: plan.label.clone(),
            nodes: plan.upserts.clone(),
        });
    }

    if !plan.placeholder_targets.is_empty() {
        statements.push(Statement::MergePlaceholders {
            gids: plan.placeholder_targets.iter().cloned().collect(),
        });
    }

    for (rel_type, edges) in &plan.relationship_groups {
        if edges.is_empty() {
            continue;
        }
        statements.push(Statement::MergeRelationships {
            rel_type: rel_type.clone(),
            edges: edges.clone(),
        });
    }

    statements
}

/// Runs `statements` as one transaction, abandoning it after `timeout`.
/// An abandoned transaction is never committed.
async fn run(store: &dyn GraphStore, statements: &[Statement], timeout: Duration) -> Result<(), StoreError> {
    match tokio::time::timeout(timeout, store.run_in_transaction(statements)).await {
        Ok(result) => result,
        Err(_) => {
            warn!("⏱️  Transaction of {} statements timed out after {:?}", statements.len(), timeout);
            Err(StoreError::Timeout(timeout))
        }
    }
}

/// Runs the plan in a single transaction. Any failure, including running
/// past `timeout`, rolls back the whole batch.
pub async fn execute(store: &dyn GraphStore, plan: &MutationPlan, timeout: Duration) -> Result<(), StoreError> {
    if plan.is_empty() {
        debug!("Nothing to write for label {}", plan.label);
        return Ok(());
    }
    let statements = statements_for(plan);

    run(store, &statements, timeout).await?;

    info!(
        "   Deleted {} nodes, upserted {} nodes, merged {} targets and {} relationships ({})",
        plan.deletions.len(),
        plan.upserts.len(),
        plan.placeholder_targets.len(),
        plan.relationship_count(),
        plan.label
    );
    Ok(())
}

/// Ensures an identifier index exists for every label, in one transaction.
/// A failure here is a configuration error.
pub async fn initialise(store: &dyn GraphStore, labels: &BTreeSet<Label>, timeout: Duration) -> Result<(), LayerError> {
    info!("Initialising graph indexes for labels {:?}", labels);
    if labels.is_empty() {
        return Ok(());
    }

    let statements: Vec<Statement> = labels
        .iter()
        .map(|label| Statement::CreateIndex { label: label.clone() })
        .collect();

    run(store, &statements, timeout)
        .await
        .map_err(|e| LayerError::Config(format!("could not create graph indexes: {}", e)))
}

/// Deletes every node carrying `label` whose `source` is `source`.
pub async fn delete_all(store: &dyn GraphStore, label: &Label, source: &str, timeout: Duration) -> Result<(), StoreError> {
    info!("Deleting all nodes (source={}, label={})", source, label);
    let statement = Statement::DeleteDataset {
        label: label.clone(),
        source: source.to_string(),
    };
    run(store, &[statement], timeout).await
}
