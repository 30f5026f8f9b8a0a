//! Layer configuration
//!
//! JSON documents with three sections: `layer_config`, `system_config` and
//! `dataset_definitions`. A config directory is read file by file in name
//! order; sections from later files replace earlier ones and dataset
//! definitions accumulate.

use crate::error::{LayerError, Result};
use crate::naming::Label;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_TRANSACTION_TIMEOUT_SECS: u64 = 15 * 60;
pub const DEFAULT_CONNECT_RETRIES: u32 = 4;
pub const SUPPORTED_SYSTEM_TYPE: &str = "neo4j";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LayerConfig {
    #[serde(default)]
    pub layer_config: ServiceSettings,
    #[serde(default)]
    pub system_config: GraphSystemConfig,
    #[serde(default)]
    pub dataset_definitions: Vec<DatasetDefinition>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceSettings {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_transaction_timeout_secs")]
    pub transaction_timeout_secs: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            transaction_timeout_secs: DEFAULT_TRANSACTION_TIMEOUT_SECS,
        }
    }
}

/// Connection details for the graph database.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GraphSystemConfig {
    #[serde(default)]
    pub system_type: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub max_connections: Option<usize>,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetDefinition {
    pub name: String,
    pub source_config: GraphDatasetConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GraphDatasetConfig {
    pub label: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for GraphSystemConfig {
    fn default() -> Self {
        Self {
            system_type: String::new(),
            endpoint: String::new(),
            username: String::new(),
            password: String::new(),
            database: None,
            max_connections: None,
            connect_retries: DEFAULT_CONNECT_RETRIES,
        }
    }
}

fn default_service_name() -> String {
    "graph-datalayer".to_string()
}

fn default_transaction_timeout_secs() -> u64 {
    DEFAULT_TRANSACTION_TIMEOUT_SECS
}

fn default_connect_retries() -> u32 {
    DEFAULT_CONNECT_RETRIES
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// One file of a config directory; every section is optional.
#[derive(Debug, Default, Deserialize)]
struct ConfigFragment {
    layer_config: Option<ServiceSettings>,
    system_config: Option<GraphSystemConfig>,
    #[serde(default)]
    dataset_definitions: Vec<DatasetDefinition>,
}

impl LayerConfig {
    /// Loads a config file, or every `*.json` file of a config directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let files = if path.is_dir() {
            let mut files = fs::read_dir(path)
                .map_err(|e| LayerError::Config(format!("cannot read {}: {}", path.display(), e)))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect::<Vec<_>>();
            files.sort();
            files
        } else {
            vec![path.to_path_buf()]
        };

        if files.is_empty() {
            return Err(LayerError::Config(format!("no config files found in {}", path.display())));
        }

        let mut config = LayerConfig {
            layer_config: ServiceSettings::default(),
            system_config: GraphSystemConfig::default(),
            dataset_definitions: Vec::new(),
        };

        for file in files {
            debug!("Reading config file {}", file.display());
            let data = fs::read_to_string(&file)
                .map_err(|e| LayerError::Config(format!("cannot read {}: {}", file.display(), e)))?;
            let fragment: ConfigFragment = serde_json::from_str(&data)
                .map_err(|e| LayerError::Config(format!("cannot parse {}: {}", file.display(), e)))?;

            if let Some(layer_config) = fragment.layer_config {
                config.layer_config = layer_config;
            }
            if let Some(system_config) = fragment.system_config {
                config.system_config = system_config;
            }
            config.dataset_definitions.extend(fragment.dataset_definitions);
        }

        info!(
            "Loaded configuration from {} ({} datasets)",
            path.display(),
            config.dataset_definitions.len()
        );
        Ok(config)
    }

    /// Lets `NEO4J_URI`, `NEO4J_USER`, `NEO4J_PASSWORD` and `NEO4J_DATABASE`
    /// (from the environment or a `.env` file) override the system section.
    pub fn apply_env_overrides(&mut self) {
        dotenv::dotenv().ok();
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let system = &mut self.system_config;
        if let Some(uri) = lookup("NEO4J_URI") {
            system.endpoint = uri;
        }
        if let Some(user) = lookup("NEO4J_USER") {
            system.username = user;
        }
        if let Some(password) = lookup("NEO4J_PASSWORD") {
            system.password = password;
        }
        if let Some(database) = lookup("NEO4J_DATABASE") {
            system.database = Some(database);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let system = &self.system_config;
        if system.system_type.is_empty() {
            return Err(LayerError::Config("no system type specified in system config".to_string()));
        }
        if system.system_type != SUPPORTED_SYSTEM_TYPE {
            return Err(LayerError::Config(format!("unsupported system type {}", system.system_type)));
        }
        for (field, value) in [
            ("endpoint", &system.endpoint),
            ("username", &system.username),
            ("password", &system.password),
        ] {
            if value.is_empty() {
                return Err(LayerError::Config(format!("no {} specified in system config", field)));
            }
        }
        if self.layer_config.transaction_timeout_secs == 0 {
            return Err(LayerError::Config("transaction_timeout_secs must be positive".to_string()));
        }

        let mut names = HashSet::new();
        for definition in &self.dataset_definitions {
            if !names.insert(definition.name.as_str()) {
                return Err(LayerError::Config(format!("dataset {} is defined twice", definition.name)));
            }
            definition.label()?;
            if definition.source_config.batch_size == 0 {
                return Err(LayerError::Config(format!("dataset {}: batch_size must be positive", definition.name)));
            }
        }

        Ok(())
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_secs(self.layer_config.transaction_timeout_secs)
    }
}

impl DatasetDefinition {
    pub fn label(&self) -> Result<Label> {
        Label::parse(&self.source_config.label)
            .map_err(|e| LayerError::Config(format!("dataset {}: {}", self.name, e)))
    }
}
