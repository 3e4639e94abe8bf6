//! Bounded collector - waits for a quorum of replies or a deadline

use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tracing::debug;

use super::mailbox::Mailbox;
use super::messages::ServiceResponse;

/// Replies gathered for one request
#[derive(Debug, Clone, PartialEq)]
pub struct Collected {
    /// Replies in arrival order
    pub replies: Vec<ServiceResponse>,
    pub timed_out: bool,
}

/// Collect until `min_replies` have arrived or `timeout` elapses from now
pub async fn collect(mailbox: &mut Mailbox, min_replies: usize, timeout: Duration) -> Collected {
    collect_until(mailbox, min_replies, Instant::now() + timeout).await
}

/// Collect until `min_replies` have arrived or `deadline` passes
///
/// A zero quorum is met before any wait and returns an empty, non-timed-out
/// result. Replies already queued when the deadline fires are taken first, and
/// each loop turn resolves exactly one branch, so no reply is counted twice.
/// A closed mailbox stops yielding replies but the deadline still applies.
pub async fn collect_until(mailbox: &mut Mailbox, min_replies: usize, deadline: Instant) -> Collected {
    let correlation_id = mailbox.correlation_id().to_string();
    debug!(%correlation_id, min_replies, "collect: called");

    let mut replies = Vec::with_capacity(min_replies);
    if min_replies == 0 {
        debug!(%correlation_id, "collect: zero quorum, returning immediately");
        return Collected {
            replies,
            timed_out: false,
        };
    }

    let sleep = sleep_until(deadline);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            biased;

            Some(reply) = mailbox.recv() => {
                debug!(%correlation_id, service_id = %reply.service_id, "collect: reply received");
                replies.push(reply);
                if replies.len() >= min_replies {
                    debug!(%correlation_id, count = replies.len(), "collect: quorum met");
                    return Collected {
                        replies,
                        timed_out: false,
                    };
                }
            }

            _ = &mut sleep => {
                debug!(%correlation_id, count = replies.len(), "collect: deadline elapsed");
                return Collected {
                    replies,
                    timed_out: true,
                };
            }
        }
    }
}
