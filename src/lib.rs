//! Synchronizes generic entity graphs into a property-graph database.
//!
//! Entities arrive through a [`writer::DatasetWriter`], are buffered into
//! batches, planned into node and relationship mutations by
//! [`planner::plan`], and applied transactionally by [`executor::execute`]
//! against a [`store::GraphStore`].

pub mod config;
pub mod entity;
pub mod error;
pub mod executor;
pub mod ingest;
pub mod layer;
pub mod naming;
pub mod neo4j_storage;
pub mod planner;
pub mod statements;
pub mod store;
pub mod writer;

pub use config::LayerConfig;
pub use entity::{Entity, Reference};
pub use error::{ErrorKind, LayerError, PlanError, StoreError};
pub use layer::{BatchInfo, GraphDataLayer, GraphDataset};
pub use neo4j_storage::Neo4jStore;
pub use store::GraphStore;
pub use writer::{DatasetWriter, SyncMode, WriterState, WriterStats};

#[cfg(test)]
mod memory_graph;
