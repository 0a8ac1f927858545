//! Component wiring
//!
//! Starts the store, then the environment mirror with the store injected.
//! Stops them in reverse order.

use crate::config::schema::MirrorConfig;
use crate::config::Config;
use crate::error::MirrorResult;
use crate::mirror::{EnvReader, Environment};
use crate::store::{create_store, KeyValueStore};
use std::sync::Arc;
use tracing::{debug, info};

/// Running store plus the environment mirrored from it
pub struct System {
    store: Arc<dyn KeyValueStore>,
    environment: Environment,
}

impl System {
    /// Connect the configured store and start mirroring
    pub async fn start(config: &Config) -> MirrorResult<Self> {
        let store = create_store(&config.store).await?;
        Self::start_with(store, &config.mirror).await
    }

    /// Start mirroring from an already connected store
    pub async fn start_with(
        store: Arc<dyn KeyValueStore>,
        mirror: &MirrorConfig,
    ) -> MirrorResult<Self> {
        let mut environment = Environment::with_capacity(&mirror.pattern, mirror.channel_capacity);

        if let Err(e) = environment.start(store.clone()).await {
            // Release whatever the store opened before failing
            if let Err(shutdown_err) = store.shutdown().await {
                debug!("Store shutdown after failed start: {}", shutdown_err);
            }
            return Err(e);
        }

        info!(
            "Mirroring {} keys matching {} from {}",
            environment.len(),
            environment.pattern(),
            store.backend_name()
        );
        Ok(Self { store, environment })
    }

    /// The mirrored environment
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Read handle for consumers
    pub fn reader(&self) -> EnvReader {
        self.environment.reader()
    }

    /// Backend name of the underlying store
    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Stop the environment, then release the store
    pub async fn stop(mut self) -> MirrorResult<()> {
        self.environment.stop().await;
        self.store.shutdown().await?;
        debug!("System stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MirrorError;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn starts_from_config() {
        let mut config = Config::default();
        config.store.backend = "memory".to_string();
        config
            .store
            .seed
            .insert("env/color".to_string(), "12".to_string());
        config
            .store
            .seed
            .insert("other/color".to_string(), "99".to_string());

        let system = System::start(&config).await.unwrap();
        assert_eq!(system.backend_name(), "memory");
        assert_eq!(system.reader().number("env/color"), Some(12.0));
        assert_eq!(system.environment().len(), 1);

        system.stop().await.unwrap();
    }

    #[tokio::test]
    async fn store_outage_aborts_start() {
        let store = Arc::new(MemoryStore::new());
        store.set_available(false);

        let result = System::start_with(store, &MirrorConfig::default()).await;
        assert!(matches!(result, Err(MirrorError::StoreUnavailable { .. })));
    }

    #[tokio::test]
    async fn stop_releases_subscription() {
        let store = Arc::new(MemoryStore::new());
        let system = System::start_with(store.clone(), &MirrorConfig::default())
            .await
            .unwrap();
        assert_eq!(store.subscriber_count(), 1);

        system.stop().await.unwrap();
        assert_eq!(store.subscriber_count(), 0);
    }
}
