//! Scatter - scatter-gather gateway
//!
//! CLI entry point for serving the gateway and querying it.

use std::io::IsTerminal;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use scatter::aggregator::{AggregatedResponse, Aggregator};
use scatter::cli::{Cli, Command};
use scatter::config::{BrokerKind, Config};
use scatter::gateway;
use scatter::transport::{AmqpTransport, MemoryBroker, Transport};
use scatter::worker::spawn_workers;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to install tracing subscriber: {}", e))?;

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Serve {
            host,
            port,
            min_replies,
            timeout_ms,
        } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(min_replies) = min_replies {
                config.aggregator.min_replies = min_replies;
            }
            if let Some(timeout_ms) = timeout_ms {
                config.aggregator.timeout_ms = timeout_ms;
            }
            cmd_serve(config).await
        }
        Command::Fetch { url } => cmd_fetch(&config, url).await,
        Command::Config => cmd_config(&config),
    }
}

/// Bus the gateway is attached to, with whatever it owns
enum Bus {
    Memory {
        broker: Arc<MemoryBroker>,
        workers: Vec<JoinHandle<()>>,
    },
    Amqp(Arc<AmqpTransport>),
}

impl Bus {
    async fn open(config: &Config) -> Result<Self> {
        match config.broker.kind {
            BrokerKind::Memory => {
                info!(exchange = %config.broker.exchange, "Starting in-process broker");
                let broker = Arc::new(MemoryBroker::new(&config.broker));
                let workers = spawn_workers(&broker, &config.workers);
                if workers.is_empty() {
                    warn!("No workers enabled; every request will time out");
                }
                Ok(Self::Memory { broker, workers })
            }
            BrokerKind::Amqp => {
                if !config.workers.is_empty() {
                    info!(count = config.workers.len(), "Configured workers only run with the memory broker, ignoring");
                }
                let transport = AmqpTransport::connect(&config.broker)
                    .await
                    .context(format!("Failed to connect to {}", config.broker.redacted_url()))?;
                Ok(Self::Amqp(Arc::new(transport)))
            }
        }
    }

    fn transport(&self) -> Arc<dyn Transport> {
        match self {
            Self::Memory { broker, .. } => broker.clone(),
            Self::Amqp(transport) => transport.clone(),
        }
    }

    async fn close(self) {
        match self {
            Self::Memory { broker, workers } => {
                broker.close();
                for worker in workers {
                    worker.abort();
                }
            }
            Self::Amqp(transport) => {
                if let Err(e) = transport.close().await {
                    warn!(error = %e, "Failed to close AMQP connection cleanly");
                }
            }
        }
    }
}

/// Run the bus, dispatcher and gateway until Ctrl-C
async fn cmd_serve(config: Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let bus = Bus::open(&config).await?;
    let aggregator = Arc::new(Aggregator::new(config.aggregator.clone(), bus.transport()));
    let dispatcher = aggregator.start().context("Failed to start reply dispatcher")?;
    info!(
        min_replies = aggregator.config().min_replies,
        timeout_ms = aggregator.config().timeout_ms,
        "Aggregator ready"
    );

    let addr = config.gateway.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind {}", addr))?;

    let router = gateway::router(aggregator, config.gateway.port);
    let result = gateway::serve(listener, router, shutdown_signal()).await;

    dispatcher.abort();
    bus.close().await;

    result
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
    }
}

/// Issue a single GET /data and print the aggregated response
async fn cmd_fetch(config: &Config, url: Option<String>) -> Result<()> {
    let url = url.unwrap_or_else(|| format!("http://127.0.0.1:{}/data", config.gateway.port));
    debug!(%url, "cmd_fetch: called");

    let response = reqwest::get(&url)
        .await
        .context(format!("Failed to reach gateway at {}", url))?
        .error_for_status()
        .context("Gateway returned an error")?;

    let aggregated: AggregatedResponse = response.json().await.context("Failed to parse gateway response")?;

    println!("{}", serde_json::to_string_pretty(&aggregated)?);

    let outcome = if aggregated.timeout {
        "timed out".yellow()
    } else {
        "quorum met".green()
    };
    println!(
        "{} {} with {} response(s)",
        aggregated.request_id.dimmed(),
        outcome,
        aggregated.count
    );
    Ok(())
}

/// Print the effective configuration as YAML
fn cmd_config(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(&config.redacted()).context("Failed to serialize config")?;
    print!("{}", yaml);
    Ok(())
}
