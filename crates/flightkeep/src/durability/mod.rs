//! The local durability manager.
//!
//! Keeps the flight list mirrored across three slots of a [`KeyValueStore`]
//! and recovers it after reloads, crashes and corruption:
//!
//! - writes refuse to replace stored flights with an empty list unless forced,
//!   and snapshot the primary slot into a safety key before a shrinking write;
//! - reads fall back from the primary slot to the backup and emergency slots,
//!   then to safety keys, then to legacy keys, and repair the slots afterwards.
//!
//! The manager holds no application state. Hosts call it whenever their flight
//! list changes, from an [`AutoSaver`](crate::scheduler::AutoSaver), and once
//! more on shutdown.

mod diagnose;
mod read;
mod write;

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::config::{Config, KeyConfig};
use crate::record::{FlightRecord, StorageEnvelope};
use crate::store::KeyValueStore;

pub use diagnose::{DiagnosticReport, SlotReport, SlotState};
pub use read::{Recovery, RecoverySource};
pub use write::PersistOutcome;

/// One of the three redundant slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// Authoritative read target.
    Primary,
    /// First fallback.
    Backup,
    /// Second fallback.
    Emergency,
}

impl Slot {
    /// All slots in read priority order.
    pub const ALL: [Slot; 3] = [Slot::Primary, Slot::Backup, Slot::Emergency];

    /// The storage key for this slot.
    #[must_use]
    pub fn key(self, keys: &KeyConfig) -> &str {
        match self {
            Self::Primary => &keys.primary,
            Self::Backup => &keys.backup,
            Self::Emergency => &keys.emergency,
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Backup => write!(f, "backup"),
            Self::Emergency => write!(f, "emergency"),
        }
    }
}

/// Persists and recovers the flight list with triple redundancy.
#[derive(Debug, Clone)]
pub struct DurabilityManager {
    store: Arc<dyn KeyValueStore>,
    keys: KeyConfig,
    shrink_threshold: usize,
    max_safety_scan: usize,
}

impl DurabilityManager {
    /// Create a manager over `store` using the key layout and tuning in `config`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, config: &Config) -> Self {
        Self {
            store,
            keys: config.keys.clone(),
            shrink_threshold: config.durability.shrink_threshold,
            max_safety_scan: config.durability.max_safety_scan,
        }
    }

    /// Create a manager with the default configuration.
    #[must_use]
    pub fn with_defaults(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(store, &Config::default())
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// The key layout in use.
    #[must_use]
    pub fn keys(&self) -> &KeyConfig {
        &self.keys
    }

    /// Read and decode one key. Unreadable values are logged and reported
    /// as [`SlotRead::Invalid`].
    fn read_key(&self, key: &str) -> SlotRead {
        match self.store.get(key) {
            Ok(None) => SlotRead::Missing,
            Ok(Some(raw)) => match StorageEnvelope::decode(&raw) {
                Ok(envelope) => SlotRead::Valid { envelope, raw },
                Err(e) => {
                    warn!(key, error = %e, "Ignoring unreadable stored value");
                    SlotRead::Invalid
                }
            },
            Err(e) => {
                warn!(key, error = %e, "Failed to read from store");
                SlotRead::Invalid
            }
        }
    }

    /// Flights under `key`, only if it decodes to at least one record.
    fn non_empty_flights(&self, key: &str) -> Option<Vec<FlightRecord>> {
        match self.read_key(key) {
            SlotRead::Valid { envelope, .. } if !envelope.is_empty() => Some(envelope.flights),
            _ => None,
        }
    }
}

/// Result of reading one key.
enum SlotRead {
    Missing,
    Invalid,
    Valid {
        envelope: StorageEnvelope,
        raw: String,
    },
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use serde_json::json;

    use super::DurabilityManager;
    use crate::record::FlightRecord;
    use crate::store::{KeyValueStore, MemoryStore};

    pub fn flight(id: &str) -> FlightRecord {
        FlightRecord::new(json!({ "id": id, "status": "pending", "legs": [] }))
    }

    pub fn flights(n: usize) -> Vec<FlightRecord> {
        (1..=n).map(|i| flight(&format!("f{i}"))).collect()
    }

    pub fn ids(records: &[FlightRecord]) -> Vec<String> {
        records
            .iter()
            .map(|r| r.id().map(|id| id.to_string()).unwrap_or_default())
            .collect()
    }

    pub fn memory_manager() -> (Arc<MemoryStore>, DurabilityManager) {
        let store = Arc::new(MemoryStore::new());
        let manager = DurabilityManager::with_defaults(store.clone() as Arc<dyn KeyValueStore>);
        (store, manager)
    }

    pub fn bare_array(records: &[FlightRecord]) -> String {
        serde_json::to_string(records).unwrap()
    }
}
