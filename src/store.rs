use crate::error::StoreError;
use crate::statements::Statement;
use async_trait::async_trait;

/// Transactional statement execution against the graph store.
///
/// Implementations run every statement of one call inside a single
/// transaction, in order, and either commit all of them or none. They must be
/// safe to share between concurrently running writers.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn run_in_transaction(&self, statements: &[Statement]) -> Result<(), StoreError>;
}
