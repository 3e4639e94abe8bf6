//! Per-request bounded mailbox
//!
//! One receiver owned by the request handler, any number of senders handed
//! out through the registry. Pushes never block: a full mailbox rejects the
//! newest reply.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::messages::ServiceResponse;

/// Result of offering a reply to a mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Accepted,
    /// Mailbox at capacity; the offered reply was dropped
    Full,
    /// The owning request already stopped receiving
    Closed,
}

/// Receiving side of a mailbox, owned by exactly one request
#[derive(Debug)]
pub struct Mailbox {
    correlation_id: String,
    rx: mpsc::Receiver<ServiceResponse>,
}

impl Mailbox {
    pub(crate) fn channel(correlation_id: impl Into<String>, capacity: usize) -> (MailboxSender, Mailbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let mailbox = Mailbox {
            correlation_id: correlation_id.into(),
            rx,
        };
        (MailboxSender { tx }, mailbox)
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Wait for the next reply
    ///
    /// Returns None once every sender is gone, i.e. after unregistration.
    pub async fn recv(&mut self) -> Option<ServiceResponse> {
        self.rx.recv().await
    }

    /// Take a reply if one is already queued
    pub fn try_recv(&mut self) -> Option<ServiceResponse> {
        self.rx.try_recv().ok()
    }

    /// Number of replies currently queued
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Non-owning push handle held by the registry
#[derive(Debug, Clone)]
pub struct MailboxSender {
    tx: mpsc::Sender<ServiceResponse>,
}

impl MailboxSender {
    /// Push without waiting
    pub fn offer(&self, reply: ServiceResponse) -> Offer {
        match self.tx.try_send(reply) {
            Ok(()) => Offer::Accepted,
            Err(TrySendError::Full(_)) => Offer::Full,
            Err(TrySendError::Closed(_)) => Offer::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn reply(service_id: &str) -> ServiceResponse {
        ServiceResponse {
            service_id: service_id.to_string(),
            correlation_id: "corr-1".to_string(),
            data: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_offer_and_receive_in_order() {
        let (tx, mut mailbox) = Mailbox::channel("corr-1", 4);
        assert_eq!(mailbox.correlation_id(), "corr-1");

        assert_eq!(tx.offer(reply("a")), Offer::Accepted);
        assert_eq!(tx.offer(reply("b")), Offer::Accepted);
        assert_eq!(mailbox.len(), 2);

        assert_eq!(mailbox.try_recv().unwrap().service_id, "a");
        assert_eq!(mailbox.try_recv().unwrap().service_id, "b");
        assert!(mailbox.try_recv().is_none());
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_full_mailbox_drops_newest() {
        let (tx, mut mailbox) = Mailbox::channel("corr-1", 2);

        assert_eq!(tx.offer(reply("first")), Offer::Accepted);
        assert_eq!(tx.offer(reply("second")), Offer::Accepted);
        assert_eq!(tx.offer(reply("third")), Offer::Full);

        // The earlier replies survive; the overflowing one is gone
        assert_eq!(mailbox.try_recv().unwrap().service_id, "first");
        assert_eq!(mailbox.try_recv().unwrap().service_id, "second");
        assert!(mailbox.try_recv().is_none());
    }

    #[test]
    fn test_offer_after_receiver_dropped() {
        let (tx, mailbox) = Mailbox::channel("corr-1", 2);
        drop(mailbox);
        assert_eq!(tx.offer(reply("late")), Offer::Closed);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (tx, _mailbox) = Mailbox::channel("corr-1", 0);
        assert_eq!(tx.offer(reply("a")), Offer::Accepted);
    }

    #[tokio::test]
    async fn test_recv_ends_when_senders_dropped() {
        let (tx, mut mailbox) = Mailbox::channel("corr-1", 2);
        tx.offer(reply("a"));
        drop(tx);

        assert!(mailbox.recv().await.is_some());
        assert!(mailbox.recv().await.is_none());
    }
}
