//! Key/value store clients
//!
//! The mirror only needs three capabilities from a store: a pattern scan,
//! a single-key read, and a change subscription. Backends:
//! - `redis`: RESP2 over TCP with keyspace notifications
//! - `memory`: in-process map, for tests and offline runs

mod factory;
mod memory;
pub mod pattern;
mod redis;
pub mod resp;

pub use factory::create_store;
pub use memory::MemoryStore;
pub use pattern::glob_match;
pub use redis::{classify_frame, PubSubFrame, RedisStore};

use crate::error::MirrorResult;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A change event delivered by a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The store confirmed the subscription
    Subscribed { pattern: String },
    /// A key changed; `value` is its current value at delivery time
    Message { key: String, value: String },
    /// A key was deleted or expired
    Removed { key: String },
    /// The store ended the subscription
    Unsubscribed { pattern: String },
    /// A frame that could not be understood
    Malformed { detail: String },
}

/// Abstract key/value store interface
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Return every key matching the glob `pattern` with its current value
    async fn scan_prefix(&self, pattern: &str) -> MirrorResult<HashMap<String, String>>;

    /// Read a single key
    async fn get(&self, key: &str) -> MirrorResult<Option<String>>;

    /// Start delivering change notifications for keys matching `pattern`.
    ///
    /// Returns once the store has registered the subscription; delivery
    /// continues on a separate task until the subscription is closed.
    async fn subscribe(&self, pattern: &str, capacity: usize) -> MirrorResult<Subscription>;

    /// Release connections held by the store
    async fn shutdown(&self) -> MirrorResult<()> {
        Ok(())
    }

    /// Get the human-readable backend name for display
    fn backend_name(&self) -> &'static str;
}

/// An active change subscription
///
/// Dropping the handle aborts the delivery task; `close` also waits for it
/// to finish so its connections are released on return.
pub struct Subscription {
    pattern: String,
    notifications: mpsc::Receiver<Notification>,
    pump: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a notification channel and the task feeding it
    pub fn new(
        pattern: impl Into<String>,
        notifications: mpsc::Receiver<Notification>,
        pump: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            notifications,
            pump,
        }
    }

    /// Pattern this subscription listens on
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Wait for the next notification; `None` once delivery has ended
    pub async fn next(&mut self) -> Option<Notification> {
        self.notifications.recv().await
    }

    /// Tear down the subscription and wait for delivery to stop
    pub async fn close(mut self) {
        self.notifications.close();
        if let Some(pump) = self.pump.take() {
            pump.abort();
            // Cancelled is the expected outcome here
            let _ = pump.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(pump) = &self.pump {
            pump.abort();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("pattern", &self.pattern)
            .field("has_pump", &self.pump.is_some())
            .finish()
    }
}
