use anyhow::{ensure, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::Topic;
use crate::fsm::RuntimeTimeouts;

/// Default configuration file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "services-cms.toml";

/// Main configuration structure for the services CMS
///
/// Every section and key is optional in files and the environment; missing
/// values fall back to `Default`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServicesCmsConfig {
    /// Where lifecycle and publication records live
    pub store: StoreConfig,
    /// Destination of work items emitted by watchers
    pub sink: SinkConfig,
    /// Service topics reference list
    pub topics: TopicsConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local, lost on exit
    Memory,
    /// One JSON file per record
    Filesystem,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Root directory for the filesystem backend
    pub directory: PathBuf,
    pub fetch_timeout_ms: u64,
    pub save_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Filesystem,
            directory: PathBuf::from(".services-cms/store"),
            fetch_timeout_ms: 5_000,
            save_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SinkConfig {
    /// JSON lines file work items are appended to
    pub path: PathBuf,
    pub publish_timeout_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".services-cms/work-items.jsonl"),
            publish_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TopicsConfig {
    /// How long a loaded topics list is served before reloading
    pub ttl_seconds: u64,
    pub list: Vec<Topic>,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 3_600,
            list: default_topics(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level, overridden by `RUST_LOG`
    pub log_level: String,
    /// Emit JSON log lines instead of plain text
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: true,
        }
    }
}

fn default_topics() -> Vec<Topic> {
    [
        (0, "Other"),
        (1, "Environment"),
        (2, "Health"),
        (3, "Mobility"),
        (4, "Taxes"),
        (5, "Education"),
    ]
    .into_iter()
    .map(|(id, name)| Topic {
        id,
        name: name.to_string(),
    })
    .collect()
}

impl ServicesCmsConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (`path`, or services-cms.toml when present)
    /// 3. Environment variables (`SERVICES_CMS_SECTION__KEY`)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => builder = builder.add_source(File::from(path).required(true)),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE))
            }
            None => {}
        }

        builder = builder.add_source(
            Environment::with_prefix("SERVICES_CMS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: ServicesCmsConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.store.fetch_timeout_ms > 0, "store.fetch_timeout_ms must be positive");
        ensure!(self.store.save_timeout_ms > 0, "store.save_timeout_ms must be positive");
        ensure!(self.sink.publish_timeout_ms > 0, "sink.publish_timeout_ms must be positive");
        ensure!(self.topics.ttl_seconds > 0, "topics.ttl_seconds must be positive");
        Ok(())
    }

    pub fn runtime_timeouts(&self) -> RuntimeTimeouts {
        RuntimeTimeouts {
            fetch: Duration::from_millis(self.store.fetch_timeout_ms),
            save: Duration::from_millis(self.store.save_timeout_ms),
        }
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.sink.publish_timeout_ms)
    }

    pub fn topics_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.topics.ttl_seconds.min(i64::MAX as u64) as i64)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}
