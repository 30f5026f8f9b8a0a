//! Graph data layer
//!
//! Owns the dataset registry built from configuration and hands out writers
//! for full-sync and incremental sessions.

use crate::config::{GraphDatasetConfig, LayerConfig};
use crate::error::{LayerError, Result};
use crate::executor;
use crate::naming::Label;
use crate::store::GraphStore;
use crate::writer::{DatasetWriter, SyncMode};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Framing of one request in a full sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchInfo {
    pub sync_id: String,
    pub is_start_batch: bool,
    pub is_last_batch: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetMetadata {
    pub name: String,
    pub label: String,
    pub batch_size: usize,
}

pub struct GraphDataset {
    name: String,
    label: Label,
    config: GraphDatasetConfig,
    timeout: Duration,
    store: Arc<dyn GraphStore>,
}

impl GraphDataset {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    pub fn metadata(&self) -> DatasetMetadata {
        DatasetMetadata {
            name: self.name.clone(),
            label: self.label.to_string(),
            batch_size: self.config.batch_size,
        }
    }

    /// Opens a full-sync writer. The first request of a sync deletes every
    /// node of this dataset before the writer is returned.
    pub async fn full_sync(&self, batch: &BatchInfo) -> Result<DatasetWriter> {
        info!("full sync for dataset {} (sync {})", self.name, batch.sync_id);
        if batch.is_start_batch {
            debug!("start batch full sync for dataset {}", self.name);
            executor::delete_all(self.store.as_ref(), &self.label, &self.name, self.timeout).await?;
        }
        Ok(self.writer(SyncMode::Full))
    }

    pub fn incremental(&self) -> DatasetWriter {
        info!("incremental sync for dataset {}", self.name);
        self.writer(SyncMode::Incremental)
    }

    /// Reading changes back out of the graph is not supported.
    pub fn changes(&self, _since: &str, _limit: usize, _latest_only: bool) -> Result<()> {
        info!("get changes for dataset {}", self.name);
        Err(LayerError::NotSupported("changes"))
    }

    /// Reading entities back out of the graph is not supported.
    pub fn entities(&self, _from: &str, _limit: usize) -> Result<()> {
        info!("get entities for dataset {}", self.name);
        Err(LayerError::NotSupported("entities"))
    }

    fn writer(&self, mode: SyncMode) -> DatasetWriter {
        DatasetWriter::new(
            &self.name,
            self.label.clone(),
            self.config.batch_size,
            mode,
            self.timeout,
            Arc::clone(&self.store),
        )
    }
}

pub struct GraphDataLayer {
    config: LayerConfig,
    store: Arc<dyn GraphStore>,
    datasets: BTreeMap<String, GraphDataset>,
}

impl GraphDataLayer {
    /// Validates `config`, creates the label indexes and builds the dataset
    /// registry.
    pub async fn new(config: LayerConfig, store: Arc<dyn GraphStore>) -> Result<Self> {
        let datasets = build_datasets(&config, &store).await?;
        info!("Graph data layer ready with {} datasets", datasets.len());
        Ok(Self {
            config,
            store,
            datasets,
        })
    }

    /// Swaps in a new configuration. The current registry stays in service
    /// if the new one cannot be built. The store is bound to the connection
    /// settings it was opened with, so changing them requires a restart.
    pub async fn update_configuration(&mut self, config: LayerConfig) -> Result<()> {
        if config.system_config != self.config.system_config {
            warn!(
                "Rejected reconfiguration: connection settings changed from {} to {}",
                self.config.system_config.endpoint, config.system_config.endpoint
            );
            return Err(LayerError::Config(
                "system_config changed; restart the layer to connect with new settings".to_string(),
            ));
        }

        let datasets = build_datasets(&config, &self.store).await?;
        info!("Reconfigured graph data layer with {} datasets", datasets.len());
        self.datasets = datasets;
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    /// Dataset names in sorted order.
    pub fn list_datasets(&self) -> Vec<&str> {
        self.datasets.keys().map(String::as_str).collect()
    }

    pub fn dataset(&self, name: &str) -> Result<&GraphDataset> {
        self.datasets
            .get(name)
            .ok_or_else(|| LayerError::UnknownDataset(name.to_string()))
    }

    pub async fn open_full_sync(&self, name: &str, batch: &BatchInfo) -> Result<DatasetWriter> {
        self.dataset(name)?.full_sync(batch).await
    }

    pub fn open_incremental(&self, name: &str) -> Result<DatasetWriter> {
        Ok(self.dataset(name)?.incremental())
    }

    pub fn stop(&self) {
        info!("Graph data layer stopped");
    }
}

async fn build_datasets(config: &LayerConfig, store: &Arc<dyn GraphStore>) -> Result<BTreeMap<String, GraphDataset>> {
    config.validate()?;

    let mut datasets = BTreeMap::new();
    for definition in &config.dataset_definitions {
        let label = definition.label()?;
        datasets.insert(
            definition.name.clone(),
            GraphDataset {
                name: definition.name.clone(),
                label,
                config: definition.source_config.clone(),
                timeout: config.transaction_timeout(),
                store: Arc::clone(store),
            },
        );
    }

    let labels: BTreeSet<Label> = datasets.values().map(|d| d.label.clone()).collect();
    executor::initialise(store.as_ref(), &labels, config.transaction_timeout()).await?;

    Ok(datasets)
}
