use std::sync::Arc;

use crate::config::Config;
use crate::core::locks::KeyedLocks;
use crate::core::store::{KvStore, MemoryStore, SpinStore};

/// Everything a request handler needs, passed explicitly instead of opened
/// from ambient state.
pub struct AppContext {
    pub store: Arc<dyn KvStore>,
    pub config: Config,
    pub locks: KeyedLocks,
}

impl AppContext {
    pub fn new(store: Arc<dyn KvStore>, config: Config) -> Self {
        let locks = KeyedLocks::new(config.serialize_post_updates);
        Self { store, config, locks }
    }

    pub fn in_memory(config: Config) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config)
    }

    pub fn spin(config: Config) -> Self {
        let store = SpinStore::new(config.kv_store.clone());
        Self::new(Arc::new(store), config)
    }

    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }
}
