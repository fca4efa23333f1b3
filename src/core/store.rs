use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::anyhow;
use serde::{de::DeserializeOwned, Serialize};

/// Raw key-value persistence. Documents are stored as JSON bytes.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;
    fn delete(&self, key: &str) -> anyhow::Result<()>;
    fn keys(&self) -> anyhow::Result<Vec<String>>;
}

/// Typed JSON accessors over any [`KvStore`], including trait objects.
pub trait KvStoreExt {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>>;
    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()>;
}

impl<S: KvStore + ?Sized> KvStoreExt for S {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        self.set(key, &serde_json::to_vec(value)?)
    }
}

/// Spin key-value store, opened by label for every operation so the handle
/// itself carries no host resource.
pub struct SpinStore {
    label: String,
}

impl SpinStore {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }

    fn open(&self) -> anyhow::Result<spin_sdk::key_value::Store> {
        spin_sdk::key_value::Store::open(&self.label)
            .map_err(|e| anyhow!("failed to open key-value store {}: {}", self.label, e))
    }
}

impl KvStore for SpinStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.open()?.get(key)?)
    }

    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        Ok(self.open()?.set(key, value)?)
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        Ok(self.open()?.delete(key)?)
    }

    fn keys(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.open()?.get_keys()?)
    }
}

/// Process-local store used by the native server and tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let entries = self.entries.read().map_err(|_| anyhow!("memory store poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        let mut entries = self.entries.write().map_err(|_| anyhow!("memory store poisoned"))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.write().map_err(|_| anyhow!("memory store poisoned"))?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> anyhow::Result<Vec<String>> {
        let entries = self.entries.read().map_err(|_| anyhow!("memory store poisoned"))?;
        Ok(entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_through_trait_object() {
        let store: Box<dyn KvStore> = Box::new(MemoryStore::new());
        store.set_json("feed", &vec!["a", "b"]).unwrap();

        let feed: Option<Vec<String>> = store.get_json("feed").unwrap();
        assert_eq!(feed, Some(vec!["a".to_string(), "b".to_string()]));

        store.delete("feed").unwrap();
        assert!(store.get_json::<Vec<String>>("feed").unwrap().is_none());
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn deleting_missing_key_is_ok() {
        let store = MemoryStore::new();
        assert!(store.delete("nothing").is_ok());
    }
}
