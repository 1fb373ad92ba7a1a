//! Key-value store layer for flightkeep.
//!
//! The durability manager only needs string keys and string values, so every
//! backend sits behind [`KeyValueStore`]. [`MemoryStore`] is used in tests and
//! embedded hosts; [`SqliteStore`] persists to a database file.

pub mod migrations;
pub mod schema;
mod sqlite;

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::{Error, Result};

pub use sqlite::{SqliteStore, StoreStats};

/// A synchronous string key-value store.
///
/// Each single-key write is atomic. Nothing is atomic across keys.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write, e.g. when it is full.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// List every key in the backend's enumeration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn keys(&self) -> Result<Vec<String>>;

    /// List keys starting with any of `prefixes`, in enumeration order,
    /// stopping after `limit` matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn scan_prefixes(&self, prefixes: &[String], limit: usize) -> Result<Vec<String>> {
        Ok(self
            .keys()?
            .into_iter()
            .filter(|key| prefixes.iter().any(|p| key.starts_with(p.as_str())))
            .take(limit)
            .collect())
    }

    /// Check whether `key` holds a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// An in-memory store, optionally limited to a byte quota.
///
/// Keys enumerate in lexicographic order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    /// Create an empty, unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that rejects writes once keys plus values would
    /// exceed `quota_bytes`.
    #[must_use]
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Total bytes held by keys and values.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn used_bytes(&self) -> Result<usize> {
        let entries = self.entries.lock().map_err(|_| Error::StoreLock)?;
        Ok(entries.iter().map(|(k, v)| k.len() + v.len()).sum())
    }

    /// Number of stored keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.entries.lock().map_err(|_| Error::StoreLock)?.len())
    }

    /// Check if the store holds no keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| Error::StoreLock)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| Error::StoreLock)?;

        if let Some(limit) = self.quota_bytes {
            let current: usize = entries.iter().map(|(k, v)| k.len() + v.len()).sum();
            let replaced = entries.get(key).map_or(0, |old| key.len() + old.len());
            let needed = current - replaced + key.len() + value.len();
            if needed > limit {
                return Err(Error::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    limit,
                });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.lock().map_err(|_| Error::StoreLock)?;
        Ok(entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_get_missing() {
        let store = MemoryStore::new();
        assert!(store.get("nothing").unwrap().is_none());
        assert!(!store.contains("nothing").unwrap());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_memory_set_and_get() {
        let store = MemoryStore::new();
        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();

        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
        assert_eq!(store.len().unwrap(), 1);
        assert!(store.contains("k").unwrap());
    }

    #[test]
    fn test_memory_keys_sorted() {
        let store = MemoryStore::new();
        store.set("b", "1").unwrap();
        store.set("a", "1").unwrap();
        store.set("c", "1").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_scan_prefixes_filters_and_limits() {
        let store = MemoryStore::new();
        for key in [
            "emergency_3",
            "milavia_flights_primary",
            "safety_backup_2",
            "safety_reduction_1",
            "safety_reduction_4",
        ] {
            store.set(key, "[]").unwrap();
        }

        let prefixes = vec!["safety_reduction_".to_string(), "emergency_".to_string()];
        let all = store.scan_prefixes(&prefixes, 10).unwrap();
        assert_eq!(all, vec!["emergency_3", "safety_reduction_1", "safety_reduction_4"]);

        let capped = store.scan_prefixes(&prefixes, 2).unwrap();
        assert_eq!(capped, vec!["emergency_3", "safety_reduction_1"]);
    }

    #[test]
    fn test_quota_rejects_oversized_write() {
        let store = MemoryStore::with_quota(10);
        store.set("k", "12345").unwrap();
        assert_eq!(store.used_bytes().unwrap(), 6);

        let err = store.set("other", "123456").unwrap_err();
        assert!(err.is_quota_exceeded());
        assert!(store.get("other").unwrap().is_none());
    }

    #[test]
    fn test_quota_counts_replaced_value_once() {
        let store = MemoryStore::with_quota(10);
        store.set("k", "123456789").unwrap();
        // Replacing shrinks the footprint even though the store is full.
        store.set("k", "1").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("1"));
    }
}
