//! Environment mirror lifecycle
//!
//! An `Environment` owns one cache and one subscription. `start` subscribes,
//! bulk-loads everything matching the pattern, then hands the subscription to
//! a listener task that applies changes as they arrive. Notifications raised
//! while the bulk load runs wait in the subscription's queue and are applied
//! after it, so they overwrite the scanned values.

use crate::error::{MirrorError, MirrorResult};
use crate::mirror::key::EnvKey;
use crate::mirror::reader::{EnvReader, Entries, LiveFlag};
use crate::mirror::validator::is_valid_env_key;
use crate::store::{KeyValueStore, Notification, Subscription};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// State held only while the environment is started
struct Running {
    store: Arc<dyn KeyValueStore>,
    shutdown: oneshot::Sender<()>,
    listener: JoinHandle<()>,
}

/// Local mirror of the `env` keys in a key/value store
pub struct Environment {
    pattern: String,
    capacity: usize,
    entries: Entries,
    live: LiveFlag,
    running: Option<Running>,
}

impl Environment {
    /// Create an empty, stopped environment mirroring `pattern`
    pub fn new(pattern: impl Into<String>) -> Self {
        Self::with_capacity(pattern, 1024)
    }

    /// Like `new`, with an explicit notification queue size
    pub fn with_capacity(pattern: impl Into<String>, capacity: usize) -> Self {
        Self {
            pattern: pattern.into(),
            capacity,
            entries: Entries::default(),
            live: LiveFlag::default(),
            running: None,
        }
    }

    /// Pattern this environment mirrors
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether `start` has completed and `stop` has not been called
    pub fn is_started(&self) -> bool {
        self.running.is_some()
    }

    /// Whether store changes are still being applied. Goes `false` when the
    /// mirror stops or the store ends the change feed.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Subscribe to changes, bulk-load current values, and start applying
    /// changes in the background.
    ///
    /// Returns the number of entries admitted by the bulk load.
    pub async fn start(&mut self, store: Arc<dyn KeyValueStore>) -> MirrorResult<usize> {
        if self.running.is_some() {
            return Err(MirrorError::AlreadyStarted(self.pattern.clone()));
        }

        let subscription = store.subscribe(&self.pattern, self.capacity).await?;

        let scanned = match store.scan_prefix(&self.pattern).await {
            Ok(scanned) => scanned,
            Err(e) => {
                subscription.close().await;
                return Err(e);
            }
        };

        let total = scanned.len();
        let loaded = scanned
            .iter()
            .filter(|(key, value)| apply(&self.entries, key, value))
            .count();
        info!(
            "Loaded {} of {} keys matching {} from {}",
            loaded,
            total,
            self.pattern,
            store.backend_name()
        );

        let (shutdown, shutdown_rx) = oneshot::channel();
        self.live.store(true, Ordering::Release);
        let listener = tokio::spawn(listen(
            self.entries.clone(),
            self.live.clone(),
            subscription,
            shutdown_rx,
        ));

        self.running = Some(Running {
            store,
            shutdown,
            listener,
        });
        Ok(loaded)
    }

    /// Apply a change; invalid keys are dropped. Returns whether it was applied.
    pub fn on_change(&self, key: &str, value: &str) -> bool {
        apply(&self.entries, key, value)
    }

    /// Forget a key that no longer exists in the store
    pub fn on_remove(&self, key: &str) -> bool {
        remove(&self.entries, key)
    }

    /// Latest value for `key`, if mirrored
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// Latest value for `key`, or `default`
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Read handle for consumers running on their own schedule
    pub fn reader(&self) -> EnvReader {
        EnvReader::new(self.entries.clone(), self.live.clone())
    }

    /// Sorted copy of the cache
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| (k.as_str().to_owned(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Stop applying changes and close the subscription.
    ///
    /// Returns after the listener has exited and the subscription is closed.
    /// Cached values stay readable.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        // The listener may already have exited if the feed closed
        let _ = running.shutdown.send(());
        self.live.store(false, Ordering::Release);
        if let Err(e) = running.listener.await {
            if e.is_panic() {
                warn!("Listener for {} panicked: {}", self.pattern, e);
            }
        }

        info!(
            "Stopped mirroring {} from {}",
            self.pattern,
            running.store.backend_name()
        );
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            self.live.store(false, Ordering::Release);
            running.listener.abort();
        }
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("pattern", &self.pattern)
            .field("entries", &self.len())
            .field("started", &self.is_started())
            .field("live", &self.is_live())
            .finish()
    }
}

fn apply(entries: &Entries, key: &str, value: &str) -> bool {
    if !is_valid_env_key(key) {
        warn!("Rejected update for {:?}: not an env key", key);
        return false;
    }

    entries.write().insert(EnvKey::from(key), value.to_string());
    info!("{} = {}", key, value);
    true
}

fn remove(entries: &Entries, key: &str) -> bool {
    if !is_valid_env_key(key) {
        warn!("Rejected removal of {:?}: not an env key", key);
        return false;
    }

    let removed = entries.write().remove(key).is_some();
    if removed {
        info!("{} removed", key);
    }
    removed
}

async fn listen(
    entries: Entries,
    live: LiveFlag,
    mut subscription: Subscription,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            next = subscription.next() => match next {
                Some(notification) => handle(&entries, notification),
                None => {
                    live.store(false, Ordering::Release);
                    warn!(
                        "Change feed for {} closed; mirrored values may go stale",
                        subscription.pattern()
                    );
                    break;
                }
            },
        }
    }

    subscription.close().await;
}

fn handle(entries: &Entries, notification: Notification) {
    match notification {
        Notification::Subscribed { pattern } => debug!("Listening on {}", pattern),
        Notification::Message { key, value } => {
            apply(entries, &key, &value);
        }
        Notification::Removed { key } => {
            remove(entries, &key);
        }
        Notification::Unsubscribed { pattern } => info!("Store ended subscription {}", pattern),
        Notification::Malformed { detail } => debug!("Dropped malformed notification: {}", detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    async fn eventually(env: &Environment, key: &str, expected: Option<&str>) {
        for _ in 0..200 {
            if env.get(key).as_deref() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("{} never became {:?}, last {:?}", key, expected, env.get(key));
    }

    #[tokio::test]
    async fn bulk_load_admits_only_env_keys() {
        let store = Arc::new(MemoryStore::with_entries([
            ("env/color", "12"),
            ("junk/x", "1"),
        ]));
        let mut env = Environment::new("*");

        let loaded = env.start(store).await.unwrap();

        assert_eq!(loaded, 1);
        assert_eq!(env.get("env/color").as_deref(), Some("12"));
        assert_eq!(env.get("junk/x"), None);
        env.stop().await;
    }

    #[test]
    fn on_change_is_validator_gated() {
        let env = Environment::new("env*");
        env.on_change("env/color", "12");

        assert!(env.on_change("env/color", "200"));
        assert_eq!(env.get("env/color").as_deref(), Some("200"));

        assert!(!env.on_change("bad key", "x"));
        assert_eq!(env.snapshot().len(), 1);

        assert!(!env.on_remove("bad key"));
        assert!(env.on_remove("env/color"));
        assert!(env.is_empty());
    }

    #[test]
    fn get_falls_back_without_mutating() {
        let env = Environment::new("env*");
        assert_eq!(env.get_or("env/missing", "red"), "red");
        assert_eq!(env.get_or("env/missing", "blue"), "blue");
        assert!(env.is_empty());
    }

    #[test]
    fn repeated_change_is_idempotent() {
        let env = Environment::new("env*");
        env.on_change("env/color", "7");
        let once = env.snapshot();
        env.on_change("env/color", "7");
        assert_eq!(env.snapshot(), once);
    }

    #[tokio::test]
    async fn notifications_reach_the_cache() {
        let store = Arc::new(MemoryStore::with_entries([("env/color", "12")]));
        let mut env = Environment::new("env*");
        env.start(store.clone()).await.unwrap();
        let reader = env.reader();

        store.set("env/color", "200").await;
        store.set("env.display/width", "640").await;
        store.set("environment/color", "9").await;

        eventually(&env, "env/color", Some("200")).await;
        eventually(&env, "env.display/width", Some("640")).await;
        assert_eq!(reader.number("env.display/width"), Some(640.0));
        assert_eq!(env.get("environment/color"), None);

        store.delete("env/color").await;
        eventually(&env, "env/color", None).await;
        assert_eq!(reader.get_or("env/color", "default"), "default");

        env.stop().await;
    }

    /// Returns a stale scan and writes a newer value while the scan runs
    struct RacingStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl KeyValueStore for RacingStore {
        async fn scan_prefix(&self, pattern: &str) -> MirrorResult<HashMap<String, String>> {
            let snapshot = self.inner.scan_prefix(pattern).await?;
            self.inner.set("env/color", "newer").await;
            Ok(snapshot)
        }

        async fn get(&self, key: &str) -> MirrorResult<Option<String>> {
            self.inner.get(key).await
        }

        async fn subscribe(&self, pattern: &str, capacity: usize) -> MirrorResult<Subscription> {
            self.inner.subscribe(pattern, capacity).await
        }

        fn backend_name(&self) -> &'static str {
            "racing"
        }
    }

    #[tokio::test]
    async fn changes_during_bulk_load_win() {
        let store = Arc::new(RacingStore {
            inner: MemoryStore::with_entries([("env/color", "stale")]),
        });
        let mut env = Environment::new("env*");
        env.start(store).await.unwrap();

        eventually(&env, "env/color", Some("newer")).await;
        env.stop().await;
    }

    #[tokio::test]
    async fn unavailable_store_fails_start() {
        let store = Arc::new(MemoryStore::new());
        store.set_available(false);
        let mut env = Environment::new("env*");

        let err = env.start(store).await.unwrap_err();
        assert!(matches!(err, MirrorError::StoreUnavailable { .. }));
        assert!(!env.is_started());
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut env = Environment::new("env*");
        env.start(store.clone()).await.unwrap();

        assert!(matches!(
            env.start(store).await,
            Err(MirrorError::AlreadyStarted(_))
        ));
        env.stop().await;
    }

    #[tokio::test]
    async fn stop_closes_the_subscription() {
        let store = Arc::new(MemoryStore::with_entries([("env/color", "1")]));
        let mut env = Environment::new("env*");
        env.start(store.clone()).await.unwrap();
        assert_eq!(store.subscriber_count(), 1);

        env.stop().await;

        assert!(!env.is_started());
        assert_eq!(store.subscriber_count(), 0);
        store.set("env/color", "2").await;
        assert_eq!(env.get("env/color").as_deref(), Some("1"));

        // Stopping again is a no-op
        env.stop().await;
    }

    /// Delivers one change, then ends the feed
    struct ClosingStore;

    #[async_trait]
    impl KeyValueStore for ClosingStore {
        async fn scan_prefix(&self, _pattern: &str) -> MirrorResult<HashMap<String, String>> {
            Ok(HashMap::from([("env/color".to_string(), "1".to_string())]))
        }

        async fn get(&self, _key: &str) -> MirrorResult<Option<String>> {
            Ok(None)
        }

        async fn subscribe(&self, pattern: &str, capacity: usize) -> MirrorResult<Subscription> {
            let (tx, rx) = tokio::sync::mpsc::channel(capacity);
            tx.send(Notification::Message {
                key: "env/color".to_string(),
                value: "2".to_string(),
            })
            .await
            .unwrap();
            Ok(Subscription::new(pattern, rx, None))
        }

        fn backend_name(&self) -> &'static str {
            "closing"
        }
    }

    #[tokio::test]
    async fn closed_feed_is_reported() {
        let mut env = Environment::new("env*");
        assert!(!env.is_live());
        env.start(Arc::new(ClosingStore)).await.unwrap();
        let reader = env.reader();

        eventually(&env, "env/color", Some("2")).await;
        for _ in 0..200 {
            if !reader.is_live() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(!reader.is_live());
        assert!(!env.is_live());
        assert!(env.is_started());
        assert_eq!(reader.get("env/color").as_deref(), Some("2"));
        env.stop().await;
    }

    #[tokio::test]
    async fn live_until_stopped() {
        let store = Arc::new(MemoryStore::new());
        let mut env = Environment::new("env*");
        env.start(store).await.unwrap();
        let reader = env.reader();
        assert!(reader.is_live());

        env.stop().await;
        assert!(!reader.is_live());
    }

    #[tokio::test]
    async fn independent_mirrors_do_not_interfere() {
        let store = Arc::new(MemoryStore::with_entries([
            ("env/color", "1"),
            ("env.display/width", "640"),
        ]));
        let mut all = Environment::new("env*");
        let mut display = Environment::new("env.display*");
        all.start(store.clone()).await.unwrap();
        display.start(store.clone()).await.unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(display.len(), 1);

        display.stop().await;
        store.set("env.display/width", "800").await;
        eventually(&all, "env.display/width", Some("800")).await;
        assert_eq!(display.get("env.display/width").as_deref(), Some("640"));

        all.stop().await;
    }

    #[test]
    fn concurrent_reads_and_writes_on_disjoint_keys() {
        const KEYS: usize = 4;
        const WRITES: usize = 500;

        let env = Environment::new("env*");
        for k in 0..KEYS {
            env.on_change(&format!("env/k{}", k), "0");
        }

        std::thread::scope(|scope| {
            for k in 0..KEYS {
                let env = &env;
                scope.spawn(move || {
                    let key = format!("env/k{}", k);
                    for i in 1..=WRITES {
                        assert!(env.on_change(&key, &i.to_string()));
                    }
                });
            }

            for _ in 0..KEYS {
                let reader = env.reader();
                scope.spawn(move || {
                    let mut last = [0usize; KEYS];
                    for _ in 0..WRITES {
                        for (k, seen) in last.iter_mut().enumerate() {
                            let value: usize = reader
                                .get(&format!("env/k{}", k))
                                .and_then(|v| v.parse().ok())
                                .expect("every read sees a value written for that key");
                            assert!(value <= WRITES);
                            // Single writer per key, so values never go backwards
                            assert!(value >= *seen);
                            *seen = value;
                        }
                    }
                });
            }
        });

        for k in 0..KEYS {
            assert_eq!(env.get(&format!("env/k{}", k)), Some(WRITES.to_string()));
        }
    }
}
