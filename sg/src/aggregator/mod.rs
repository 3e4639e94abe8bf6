//! Scatter-gather aggregator
//!
//! Correlates asynchronous worker replies with the request that caused them:
//! - **Registry:** correlation id -> per-request mailbox
//! - **Dispatcher:** single loop routing replies into mailboxes
//! - **Collector:** waits for a quorum or a deadline, whichever comes first

mod collector;
mod config;
mod core;
mod dispatcher;
mod error;
mod mailbox;
mod messages;
mod metrics;
mod registry;

pub use collector::{Collected, collect, collect_until};
pub use config::AggregatorConfig;
pub use self::core::{Aggregator, RequestState};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{AggregatorError, RegistryError, ReplyError};
pub use mailbox::{Mailbox, MailboxSender, Offer};
pub use messages::{AggregatedResponse, RequestMessage, ServiceResponse, new_correlation_id};
pub use metrics::{AggregatorMetrics, Counters};
pub use registry::{CorrelationRegistry, DEFAULT_SHARD_COUNT};
