//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Scatter - scatter-gather request aggregator
#[derive(Parser)]
#[command(
    name = "sg",
    about = "Fan a request out to every worker and gather their replies",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the gateway with an in-process broker and workers
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Replies needed to answer early
        #[arg(short = 'm', long)]
        min_replies: Option<usize>,

        /// Per-request deadline in milliseconds
        #[arg(short = 't', long)]
        timeout_ms: Option<u64>,
    },

    /// Issue one request against a running gateway
    Fetch {
        /// Gateway data URL (defaults to the configured port on localhost)
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Print the effective configuration
    Config,
}
