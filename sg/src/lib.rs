//! Scatter - scatter-gather request aggregator
//!
//! A gateway publishes one message per client request to a fan-out exchange,
//! an open set of workers answers on a shared results queue, and the replies
//! are correlated back to the waiting request until a quorum is met or the
//! deadline passes.
//!
//! # Modules
//!
//! - [`aggregator`] - correlation registry, reply dispatcher, bounded collector
//! - [`transport`] - publish/subscribe boundary, in-process and AMQP brokers
//! - [`worker`] - simulated workers answering on the bus
//! - [`gateway`] - HTTP front-end
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod aggregator;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod transport;
pub mod worker;

// Re-export commonly used types
pub use aggregator::{
    AggregatedResponse, Aggregator, AggregatorConfig, AggregatorError, AggregatorMetrics, CorrelationRegistry,
    DispatchOutcome, Dispatcher, Mailbox, RequestMessage, ServiceResponse, collect,
};
pub use config::{BrokerConfig, BrokerKind, Config, GatewayConfig, WorkerConfig};
pub use transport::{AmqpTransport, MemoryBroker, RawReply, ReplyStream, Transport, TransportError};
pub use worker::{Worker, spawn_workers};
