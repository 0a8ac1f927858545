//! Store factory
//!
//! Picks the backend named in `[store] backend` and connects to it.

use crate::config::schema::StoreConfig;
use crate::error::{MirrorError, MirrorResult};
use crate::store::memory::MemoryStore;
use crate::store::redis::RedisStore;
use crate::store::KeyValueStore;
use std::sync::Arc;
use tracing::debug;

/// Create and connect the configured key/value store
///
/// # Returns
/// * `Ok(Arc<dyn KeyValueStore>)` - A connected store
/// * `Err(StoreUnavailable)` - If the store cannot be reached
/// * `Err(UnknownBackend)` - If the backend name is not recognised
pub async fn create_store(config: &StoreConfig) -> MirrorResult<Arc<dyn KeyValueStore>> {
    match config.backend.as_str() {
        "redis" => {
            debug!("Connecting to redis at {}", config.addr());
            Ok(Arc::new(RedisStore::connect(config.clone()).await?))
        }
        "memory" => {
            debug!("Using memory store with {} seeded keys", config.seed.len());
            Ok(Arc::new(MemoryStore::with_entries(config.seed.clone())))
        }
        other => Err(MirrorError::UnknownBackend(other.to_string())),
    }
}
