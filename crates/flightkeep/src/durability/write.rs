//! Write path: guarded, mirrored saves.

use chrono::{SubsecRound, Utc};
use tracing::{debug, error, info, warn};

use super::{DurabilityManager, Slot, SlotRead};
use crate::error::{Error, Result};
use crate::record::{format_timestamp, FlightRecord, StorageEnvelope};

/// Consecutive millisecond suffixes tried before giving up on a safety key.
const MAX_SAFETY_KEY_ATTEMPTS: i64 = 1_000;

/// What happened to a [`DurabilityManager::persist`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// All three slots and the last-save key were written.
    Saved {
        /// Number of flights written.
        count: usize,
        /// Safety key holding the previous primary slot, if the write shrank it.
        safety_key: Option<String>,
    },
    /// An unforced empty write was refused because the primary slot holds flights.
    GuardedAbort {
        /// Number of flights still stored.
        existing: usize,
    },
    /// The store rejected a write.
    WriteFailed {
        /// Description of the store failure.
        reason: String,
    },
}

impl PersistOutcome {
    /// Check if the flights were saved.
    #[must_use]
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

impl std::fmt::Display for PersistOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Saved {
                count,
                safety_key: Some(key),
            } => write!(f, "saved {count} flights (previous data kept in {key})"),
            Self::Saved { count, .. } => write!(f, "saved {count} flights"),
            Self::GuardedAbort { existing } => write!(
                f,
                "refused to replace {existing} stored flights with an empty list"
            ),
            Self::WriteFailed { reason } => write!(f, "save failed: {reason}"),
        }
    }
}

impl DurabilityManager {
    /// Store `records` as the new flight list.
    ///
    /// An empty list is only written over stored flights when
    /// `force_overwrite` is set. Any write that leaves fewer flights than the
    /// shrink threshold first copies the current primary slot to a fresh
    /// safety key. If the primary slot is unreadable, the first non-empty
    /// fallback slot is guarded and copied instead. Store failures are
    /// reported in the outcome.
    #[must_use = "a refused or failed save leaves the previous flights in place"]
    pub fn persist(&self, records: &[FlightRecord], force_overwrite: bool) -> PersistOutcome {
        let current = if records.is_empty() || records.len() < self.shrink_threshold {
            self.stored_baseline()
        } else {
            SlotRead::Missing
        };
        let existing = match &current {
            SlotRead::Valid { envelope, .. } => envelope.len(),
            SlotRead::Missing | SlotRead::Invalid => 0,
        };

        if records.is_empty() && !force_overwrite && existing > 0 {
            warn!(existing, "Refusing to overwrite stored flights with an empty list");
            return PersistOutcome::GuardedAbort { existing };
        }

        let mut safety_key = None;
        if let SlotRead::Valid { raw, .. } = &current {
            if existing > records.len() {
                match self.write_safety_snapshot(raw) {
                    Ok(key) => safety_key = Some(key),
                    Err(e) => {
                        error!(error = %e, "Could not snapshot flights before shrinking write");
                        return PersistOutcome::WriteFailed {
                            reason: e.to_string(),
                        };
                    }
                }
            }
        }

        let now = Utc::now().trunc_subsecs(3);
        let envelope = StorageEnvelope::new(records.to_vec(), now);
        let result = serde_json::to_string(&envelope)
            .map_err(Into::into)
            .and_then(|serialized| self.write_slots(&serialized, &format_timestamp(now)));

        match result {
            Ok(()) => {
                info!(count = records.len(), "Saved flights to all slots");
                PersistOutcome::Saved {
                    count: records.len(),
                    safety_key,
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to save flights");
                PersistOutcome::WriteFailed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Save synchronously on shutdown.
    ///
    /// The write is forced only when the user deliberately emptied the list,
    /// so that an intentionally empty session is stored as empty.
    #[must_use = "a refused or failed save leaves the previous flights in place"]
    pub fn force_flush(&self, records: &[FlightRecord], user_emptied: bool) -> PersistOutcome {
        let force = user_emptied && records.is_empty();
        debug!(count = records.len(), force, "Flushing flights");
        self.persist(records, force)
    }

    /// What a shrinking or empty write would replace.
    ///
    /// Normally the primary slot. When the primary slot is unreadable, the
    /// first non-empty fallback slot stands in for it, since the write is
    /// about to overwrite that slot too.
    fn stored_baseline(&self) -> SlotRead {
        let primary = self.read_key(&self.keys.primary);
        if !matches!(primary, SlotRead::Invalid) {
            return primary;
        }
        for slot in [Slot::Backup, Slot::Emergency] {
            let read = self.read_key(slot.key(&self.keys));
            if matches!(&read, SlotRead::Valid { envelope, .. } if !envelope.is_empty()) {
                debug!(%slot, "Primary slot unreadable, guarding against fallback slot");
                return read;
            }
        }
        SlotRead::Invalid
    }

    /// Write identical bytes to every slot, then the timestamp.
    fn write_slots(&self, serialized: &str, saved_at: &str) -> Result<()> {
        for key in self.keys.slots() {
            self.store.set(key, serialized)?;
        }
        self.store.set(&self.keys.last_save, saved_at)?;
        Ok(())
    }

    /// Copy `raw` into a safety key that does not exist yet.
    fn write_safety_snapshot(&self, raw: &str) -> Result<String> {
        let now = Utc::now().timestamp_millis();
        for millis in now..now + MAX_SAFETY_KEY_ATTEMPTS {
            let key = format!("{}{millis}", self.keys.safety_write_prefix);
            if !self.store.contains(&key)? {
                self.store.set(&key, raw)?;
                info!(key = %key, "Snapshotted flights before shrinking write");
                return Ok(key);
            }
        }
        Err(Error::internal(format!(
            "no free safety key after {MAX_SAFETY_KEY_ATTEMPTS} attempts"
        )))
    }
}
