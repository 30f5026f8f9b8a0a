use anyhow::{bail, Context, Result};
use graph_datalayer::ingest::ingest_stream;
use graph_datalayer::{BatchInfo, GraphDataLayer, LayerConfig, Neo4jStore};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info};
use uuid::Uuid;

const DEFAULT_CONFIG_PATH: &str = "./config";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("🚀 Graph data layer starting...");

    let args: Vec<String> = env::args().collect();
    let config_path = args
        .get(1)
        .cloned()
        .or_else(|| env::var("DATALAYER_CONFIG_PATH").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    // Load configuration
    let mut config = LayerConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;
    config.apply_env_overrides();
    config.validate().context("Invalid configuration")?;
    info!(
        "📝 Loaded configuration for {} from {}",
        config.layer_config.service_name, config_path
    );

    let store = Neo4jStore::connect(&config.system_config)
        .await
        .context("Failed to connect to Neo4j")?;
    info!("✅ Connected to Neo4j");

    let layer = GraphDataLayer::new(config, Arc::new(store))
        .await
        .context("Failed to initialise graph data layer")?;

    let Some(dataset) = args.get(2) else {
        info!("📊 Configured datasets: {}", layer.list_datasets().join(", "));
        layer.stop();
        return Ok(());
    };

    // Setup shutdown signal handler
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("🛑 Shutdown signal received, flushing buffered entities...");
                shutdown_clone.store(true, Ordering::SeqCst);
            }
            Err(err) => {
                error!("Failed to listen for shutdown signal: {}", err);
            }
        }
    });

    let mut writer = match args.get(3).map(String::as_str) {
        None | Some("incremental") => layer
            .open_incremental(dataset)
            .with_context(|| format!("Failed to open incremental sync for {}", dataset))?,
        Some("full") => {
            let batch = BatchInfo {
                sync_id: Uuid::new_v4().to_string(),
                is_start_batch: true,
                is_last_batch: true,
            };
            layer
                .open_full_sync(dataset, &batch)
                .await
                .with_context(|| format!("Failed to open full sync for {}", dataset))?
        }
        Some(other) => bail!("Unknown sync mode '{}', expected 'full' or 'incremental'", other),
    };

    let label = layer.dataset(dataset)?.label();
    info!("👂 Reading entities for dataset {} (label {}) from stdin...", dataset, label);
    let summary = ingest_stream(BufReader::new(tokio::io::stdin()), &mut writer, &shutdown)
        .await
        .context("Failed to ingest entity stream")?;

    let stats = writer.close().await.context("Failed to flush final batch")?;
    info!(
        "✅ Wrote {} entities in {} batches to dataset {}{}",
        stats.entities_written,
        stats.batches_flushed,
        dataset,
        if summary.stopped_early { " (stopped early)" } else { "" }
    );

    layer.stop();
    info!("👋 Graph data layer shutdown complete");
    Ok(())
}
