//! Read-only slot diagnostics for operators.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{DurabilityManager, Slot};
use crate::record::{format_timestamp, StorageEnvelope};

/// State of one slot as seen by [`DurabilityManager::diagnose`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SlotState {
    /// The key holds no value.
    Missing,
    /// The key holds a value that cannot be read as flights.
    Corrupt {
        /// Why decoding or reading failed.
        reason: String,
    },
    /// The key holds a readable flight list.
    Valid {
        /// Number of flights.
        count: usize,
        /// When the envelope was written, if recorded.
        saved_at: Option<DateTime<Utc>>,
    },
}

/// Diagnostics for one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotReport {
    /// Which slot.
    pub slot: Slot,
    /// Storage key of the slot.
    pub key: String,
    /// Whether it is present and readable.
    pub state: SlotState,
    /// BLAKE3 digest of the raw stored bytes.
    pub digest: Option<String>,
}

/// Snapshot of the durability layer's storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticReport {
    /// The three slots in priority order.
    pub slots: Vec<SlotReport>,
    /// Raw value of the last-save key.
    pub last_save: Option<String>,
    /// Whether all three slots hold byte-identical values.
    pub consistent: bool,
    /// Safety keys found, up to the scan limit.
    pub safety_keys: usize,
    /// Legacy keys that still hold flights.
    pub legacy_keys: Vec<String>,
}

impl DurabilityManager {
    /// Report the state of every slot without modifying anything.
    #[must_use]
    pub fn diagnose(&self) -> DiagnosticReport {
        let slots: Vec<SlotReport> = Slot::ALL
            .iter()
            .map(|&slot| self.diagnose_slot(slot))
            .collect();

        let consistent = slots[0].digest.is_some()
            && slots.iter().all(|report| report.digest == slots[0].digest);

        let last_save = self.store.get(&self.keys.last_save).ok().flatten();

        let safety_keys = self
            .store
            .scan_prefixes(&self.keys.safety_prefixes, self.max_safety_scan)
            .map_or(0, |keys| keys.len());

        let legacy_keys = self
            .keys
            .legacy
            .iter()
            .filter(|key| self.non_empty_flights(key).is_some())
            .cloned()
            .collect();

        DiagnosticReport {
            slots,
            last_save,
            consistent,
            safety_keys,
            legacy_keys,
        }
    }

    fn diagnose_slot(&self, slot: Slot) -> SlotReport {
        let key = slot.key(&self.keys).to_string();
        let (state, digest) = match self.store.get(&key) {
            Ok(None) => (SlotState::Missing, None),
            Ok(Some(raw)) => {
                let digest = Some(blake3::hash(raw.as_bytes()).to_hex().to_string());
                let state = match StorageEnvelope::decode(&raw) {
                    Ok(envelope) => SlotState::Valid {
                        count: envelope.len(),
                        saved_at: envelope.saved_at,
                    },
                    Err(e) => SlotState::Corrupt {
                        reason: e.to_string(),
                    },
                };
                (state, digest)
            }
            Err(e) => (
                SlotState::Corrupt {
                    reason: e.to_string(),
                },
                None,
            ),
        };

        SlotReport {
            slot,
            key,
            state,
            digest,
        }
    }
}

impl std::fmt::Display for SlotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::Corrupt { reason } => write!(f, "corrupt ({reason})"),
            Self::Valid {
                count,
                saved_at: Some(at),
            } => write!(f, "{count} flights, saved {}", format_timestamp(*at)),
            Self::Valid { count, .. } => write!(f, "{count} flights"),
        }
    }
}

impl std::fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Slots")?;
        writeln!(f, "-----")?;
        for report in &self.slots {
            writeln!(
                f,
                "  {:<10} {:<34} {}",
                report.slot.to_string(),
                report.key,
                report.state
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "Last save:        {}",
            self.last_save.as_deref().unwrap_or("never")
        )?;
        writeln!(
            f,
            "Slots identical:  {}",
            if self.consistent { "yes" } else { "no" }
        )?;
        writeln!(f, "Safety snapshots: {}", self.safety_keys)?;
        if self.legacy_keys.is_empty() {
            write!(f, "Legacy data:      none")
        } else {
            write!(f, "Legacy data:      {}", self.legacy_keys.join(", "))
        }
    }
}
