//! Correlation registry - maps in-flight correlation ids to their mailboxes
//!
//! The only structure shared by every request handler and the dispatcher.
//! Keys are spread over a fixed set of shards so unrelated requests rarely
//! touch the same lock, and a lock is only held for the map operation itself.

use std::collections::HashMap;
use std::collections::hash_map::{DefaultHasher, Entry};
use std::hash::{Hash, Hasher};

use parking_lot::Mutex;
use tracing::{debug, error};

use super::error::RegistryError;
use super::mailbox::{Mailbox, MailboxSender};

/// Default number of lock shards
pub const DEFAULT_SHARD_COUNT: usize = 16;

type Shard = Mutex<HashMap<String, MailboxSender>>;

pub struct CorrelationRegistry {
    shards: Vec<Shard>,
    mailbox_capacity: usize,
}

impl CorrelationRegistry {
    /// Create a registry whose mailboxes hold `mailbox_capacity` replies
    pub fn new(mailbox_capacity: usize) -> Self {
        Self::with_shards(mailbox_capacity, DEFAULT_SHARD_COUNT)
    }

    pub fn with_shards(mailbox_capacity: usize, shard_count: usize) -> Self {
        debug!(mailbox_capacity, shard_count, "CorrelationRegistry::new: called");
        let shards = (0..shard_count.max(1)).map(|_| Mutex::new(HashMap::new())).collect();
        Self {
            shards,
            mailbox_capacity,
        }
    }

    fn shard(&self, correlation_id: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        correlation_id.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }

    /// Create and store a fresh mailbox for `correlation_id`
    pub fn register(&self, correlation_id: &str) -> Result<Mailbox, RegistryError> {
        debug!(%correlation_id, "CorrelationRegistry::register: called");
        let mut shard = self.shard(correlation_id).lock();
        match shard.entry(correlation_id.to_string()) {
            Entry::Occupied(_) => {
                error!(%correlation_id, "Correlation id collision, refusing to register");
                Err(RegistryError::DuplicateKey(correlation_id.to_string()))
            }
            Entry::Vacant(slot) => {
                let (tx, mailbox) = Mailbox::channel(correlation_id, self.mailbox_capacity);
                slot.insert(tx);
                Ok(mailbox)
            }
        }
    }

    /// Get a push handle for `correlation_id` if it is in flight
    pub fn lookup(&self, correlation_id: &str) -> Option<MailboxSender> {
        self.shard(correlation_id).lock().get(correlation_id).cloned()
    }

    /// Remove the entry; returns false if it was already gone
    pub fn unregister(&self, correlation_id: &str) -> bool {
        let removed = self.shard(correlation_id).lock().remove(correlation_id).is_some();
        debug!(%correlation_id, removed, "CorrelationRegistry::unregister: called");
        removed
    }

    pub fn contains(&self, correlation_id: &str) -> bool {
        self.shard(correlation_id).lock().contains_key(correlation_id)
    }

    /// Number of in-flight requests across all shards
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.lock().is_empty())
    }
}
