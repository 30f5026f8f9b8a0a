//! Dataset writer
//!
//! Buffers entities for one sync session and flushes them as planned
//! transactions once `batch_size` is reached, and on close.
//!
//! ```text
//! Open --write (buffer full)--> Flushing --ok--> Open
//!                                        \--err--> Failed
//! Open --close--> Closed
//! ```

use crate::entity::Entity;
use crate::error::{LayerError, Result};
use crate::executor;
use crate::naming::Label;
use crate::planner;
use crate::store::GraphStore;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Open,
    /// A batch is being written. Only observable when a write or close was
    /// abandoned mid-transaction.
    Flushing,
    Failed,
    Closed,
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriterState::Open => "open",
            WriterState::Flushing => "flushing",
            WriterState::Failed => "failed",
            WriterState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Full,
    Incremental,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterStats {
    pub entities_written: usize,
    pub batches_flushed: usize,
    pub opened_at: DateTime<Utc>,
}

pub struct DatasetWriter {
    session_id: Uuid,
    dataset: String,
    label: Label,
    batch_size: usize,
    mode: SyncMode,
    timeout: Duration,
    store: Arc<dyn GraphStore>,
    buffer: Vec<Entity>,
    state: WriterState,
    stats: WriterStats,
}

impl DatasetWriter {
    pub(crate) fn new(
        dataset: &str,
        label: Label,
        batch_size: usize,
        mode: SyncMode,
        timeout: Duration,
        store: Arc<dyn GraphStore>,
    ) -> Self {
        let session_id = Uuid::new_v4();
        debug!("Opened {:?} writer {} for dataset {}", mode, session_id, dataset);
        Self {
            session_id,
            dataset: dataset.to_string(),
            label,
            batch_size: batch_size.max(1),
            mode,
            timeout,
            store,
            buffer: Vec::with_capacity(batch_size.max(1)),
            state: WriterState::Open,
            stats: WriterStats {
                entities_written: 0,
                batches_flushed: 0,
                opened_at: Utc::now(),
            },
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Entities accepted but not yet committed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    /// Buffers `entity`, flushing the buffer once it holds `batch_size`
    /// entities. A failed or timed out flush leaves the writer in
    /// [`WriterState::Failed`].
    pub async fn write(&mut self, entity: Entity) -> Result<()> {
        self.require(WriterState::Open, "write")?;

        self.buffer.push(entity);
        if self.buffer.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// Flushes whatever is buffered, even a partial batch, and closes the
    /// writer.
    pub async fn close(&mut self) -> Result<WriterStats> {
        match self.state {
            WriterState::Open => {}
            WriterState::Flushing if self.buffer.is_empty() => {}
            state => {
                return Err(LayerError::WriterState {
                    dataset: self.dataset.clone(),
                    state,
                    operation: "close",
                })
            }
        }

        info!("Closing dataset writer {} for dataset {}", self.session_id, self.dataset);
        if !self.buffer.is_empty() {
            self.flush().await?;
        }

        self.state = WriterState::Closed;
        info!(
            "Dataset writer {} closed: {} entities in {} batches",
            self.session_id, self.stats.entities_written, self.stats.batches_flushed
        );
        Ok(self.stats.clone())
    }

    fn require(&self, expected: WriterState, operation: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(LayerError::WriterState {
                dataset: self.dataset.clone(),
                state: self.state,
                operation,
            })
        }
    }

    async fn flush(&mut self) -> Result<()> {
        self.state = WriterState::Flushing;
        debug!(
            "Writing batch of {} entities to dataset {} (writer {})",
            self.buffer.len(),
            self.dataset,
            self.session_id
        );

        let plan = match planner::plan(&self.buffer, &self.dataset, &self.label) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Dataset {}: could not plan batch: {}", self.dataset, e);
                self.state = WriterState::Failed;
                return Err(e.into());
            }
        };

        if let Err(e) = executor::execute(self.store.as_ref(), &plan, self.timeout).await {
            warn!("Dataset {}: could not write batch: {}", self.dataset, e);
            self.state = WriterState::Failed;
            return Err(e.into());
        }

        self.stats.entities_written += self.buffer.len();
        self.stats.batches_flushed += 1;
        self.buffer.clear();
        self.state = WriterState::Open;
        Ok(())
    }
}

impl fmt::Debug for DatasetWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetWriter")
            .field("session_id", &self.session_id)
            .field("dataset", &self.dataset)
            .field("label", &self.label)
            .field("batch_size", &self.batch_size)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}
