//! Entity stream ingestion
//!
//! Reads newline-delimited entity JSON and feeds it to a [`DatasetWriter`].
//! A leading `@context` record declares namespace prefixes for the rest of
//! the stream.

use crate::entity::{Entity, EntityContext, CONTEXT_ID};
use crate::error::{LayerError, Result};
use crate::writer::DatasetWriter;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub entities: usize,
    pub stopped_early: bool,
}

/// Writes every entity of `reader` to `writer` until end of input or until
/// `shutdown` is set. The writer is left open; closing it flushes the rest.
pub async fn ingest_stream<R>(reader: R, writer: &mut DatasetWriter, shutdown: &AtomicBool) -> Result<IngestSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut context = EntityContext::default();
    let mut summary = IngestSummary::default();
    let mut line_number = 0;

    loop {
        if shutdown.load(Ordering::SeqCst) {
            info!("🛑 Shutdown requested, stopped reading after {} entities", summary.entities);
            summary.stopped_early = true;
            break;
        }

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                return Err(LayerError::Decode {
                    line: line_number + 1,
                    message: e.to_string(),
                })
            }
        };
        line_number += 1;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(trimmed).map_err(|e| LayerError::Decode {
            line: line_number,
            message: e.to_string(),
        })?;

        if value.get("id").and_then(Value::as_str) == Some(CONTEXT_ID) {
            context = serde_json::from_value(value).map_err(|e| LayerError::Decode {
                line: line_number,
                message: e.to_string(),
            })?;
            debug!("Read namespace context with {} prefixes", context.namespaces.len());
            continue;
        }

        let entity: Entity = serde_json::from_value(value).map_err(|e| LayerError::Decode {
            line: line_number,
            message: e.to_string(),
        })?;

        writer.write(entity.expand(&context)).await?;
        summary.entities += 1;
    }

    Ok(summary)
}
