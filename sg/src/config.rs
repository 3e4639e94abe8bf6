//! Scatter configuration types and loading

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::aggregator::AggregatorConfig;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// HTTP front-end
    pub gateway: GatewayConfig,

    /// Quorum and deadline limits
    pub aggregator: AggregatorConfig,

    /// Bus selection, connection and naming
    pub broker: BrokerConfig,

    /// Workers started alongside the gateway (memory broker only)
    pub workers: Vec<WorkerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: None,
            gateway: GatewayConfig::default(),
            aggregator: AggregatorConfig::default(),
            broker: BrokerConfig::default(),
            workers: vec![
                WorkerConfig::new("service_a", 50),
                WorkerConfig::new("service_b", 120),
            ],
        }
    }
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        self.aggregator.validate().context("Invalid aggregator config")?;

        if self.broker.exchange.is_empty() {
            return Err(eyre!("broker.exchange must not be empty"));
        }
        if self.broker.results_queue.is_empty() {
            return Err(eyre!("broker.results-queue must not be empty"));
        }
        if self.broker.kind == BrokerKind::Amqp && self.broker.host.is_empty() {
            return Err(eyre!("broker.host is required for the amqp broker"));
        }
        if let Some(worker) = self.workers.iter().find(|w| w.id.is_empty()) {
            return Err(eyre!("worker with delay {}ms has an empty id", worker.delay_ms));
        }
        Ok(())
    }

    /// Load only the log level, ignoring any error
    ///
    /// Used before logging is initialised.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .scatter.yml
        let local_config = PathBuf::from(".scatter.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/scatter/scatter.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("scatter").join("scatter.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Copy of the config that is safe to print
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.broker.password.is_empty() {
            config.broker.password = "***".to_string();
        }
        config
    }
}

/// HTTP front-end configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
        }
    }
}

impl GatewayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Which bus the gateway talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    /// In-process exchange with the configured workers
    #[default]
    Memory,
    /// RabbitMQ over AMQP 0-9-1
    Amqp,
}

/// Broker connection and topology
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub kind: BrokerKind,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,

    /// Fan-out exchange requests are published to
    pub exchange: String,

    /// Queue workers publish their replies to
    #[serde(rename = "results-queue")]
    pub results_queue: String,

    /// Requests buffered per bound queue before slow workers lag
    #[serde(rename = "request-buffer")]
    pub request_buffer: usize,

    /// Replies buffered in the results queue
    #[serde(rename = "reply-buffer")]
    pub reply_buffer: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            kind: BrokerKind::Memory,
            host: "rabbitmq".to_string(),
            port: 5672,
            user: "guest".to_string(),
            password: "guest".to_string(),
            exchange: "scatter-gather".to_string(),
            results_queue: "results".to_string(),
            request_buffer: 1024,
            reply_buffer: 1024,
        }
    }
}

impl BrokerConfig {
    /// Connection URL including credentials; never log this
    pub fn url(&self) -> String {
        format!("amqp://{}:{}@{}:{}/%2f", self.user, self.password, self.host, self.port)
    }

    /// Connection URL with the password masked, for logs
    pub fn redacted_url(&self) -> String {
        format!("amqp://{}:***@{}:{}/", self.user, self.host, self.port)
    }
}

/// A worker started in-process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub id: String,

    /// Time taken to produce a reply
    #[serde(rename = "delay-ms", default)]
    pub delay_ms: u64,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl WorkerConfig {
    pub fn new(id: impl Into<String>, delay_ms: u64) -> Self {
        Self {
            id: id.into(),
            delay_ms,
            enabled: true,
        }
    }
}
