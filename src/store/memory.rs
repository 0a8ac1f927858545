//! In-process key/value store
//!
//! Implements the KeyValueStore trait over a local map. Writes go through
//! `set`/`delete` and are pushed to every subscriber whose pattern matches.

use crate::error::{MirrorError, MirrorResult};
use crate::store::pattern::glob_match;
use crate::store::{KeyValueStore, Notification, Subscription};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

struct Subscriber {
    pattern: String,
    tx: mpsc::Sender<Notification>,
}

/// Key/value store held in process memory
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    subscribers: Mutex<Vec<Subscriber>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        store.entries.write().extend(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into())),
        );
        store
    }

    /// Simulate an outage: every call fails with `StoreUnavailable`
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Write a key and notify matching subscribers
    pub async fn set(&self, key: &str, value: &str) {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        self.publish(
            key,
            Notification::Message {
                key: key.to_string(),
                value: value.to_string(),
            },
        )
        .await;
    }

    /// Delete a key and notify matching subscribers
    pub async fn delete(&self, key: &str) {
        let existed = self.entries.write().remove(key).is_some();
        if existed {
            self.publish(
                key,
                Notification::Removed {
                    key: key.to_string(),
                },
            )
            .await;
        }
    }

    /// Number of subscriptions still being delivered to
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|s| !s.tx.is_closed());
        subscribers.len()
    }

    async fn publish(&self, key: &str, notification: Notification) {
        // Collect senders first so no lock is held across the await
        let targets: Vec<mpsc::Sender<Notification>> = {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|s| !s.tx.is_closed());
            subscribers
                .iter()
                .filter(|s| glob_match(&s.pattern, key))
                .map(|s| s.tx.clone())
                .collect()
        };

        for tx in targets {
            if tx.send(notification.clone()).await.is_err() {
                debug!("Subscriber went away while publishing {}", key);
            }
        }
    }

    fn check_available(&self) -> MirrorResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MirrorError::store_unavailable("memory", "store marked unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn scan_prefix(&self, pattern: &str) -> MirrorResult<HashMap<String, String>> {
        self.check_available()?;
        let entries = self.entries.read();
        Ok(entries
            .iter()
            .filter(|(k, _)| glob_match(pattern, k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn get(&self, key: &str) -> MirrorResult<Option<String>> {
        self.check_available()?;
        Ok(self.entries.read().get(key).cloned())
    }

    async fn subscribe(&self, pattern: &str, capacity: usize) -> MirrorResult<Subscription> {
        self.check_available()?;
        let (tx, rx) = mpsc::channel(capacity.max(1));

        // Fresh channel with capacity >= 1, so this cannot fail
        let _ = tx.try_send(Notification::Subscribed {
            pattern: pattern.to_string(),
        });

        self.subscribers.lock().push(Subscriber {
            pattern: pattern.to_string(),
            tx,
        });
        debug!("Memory store subscribed to {}", pattern);

        Ok(Subscription::new(pattern, rx, None))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
