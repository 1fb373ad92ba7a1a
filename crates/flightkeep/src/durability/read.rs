//! Read path: ordered fallback with self-repair.

use tracing::{debug, info, warn};

use super::{DurabilityManager, Slot, SlotRead};
use crate::record::{dedup_by_id, FlightRecord};

/// Where recovered flights came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySource {
    /// The primary slot, as stored.
    Primary,
    /// The backup slot.
    Backup,
    /// The emergency slot.
    Emergency,
    /// An ad-hoc safety key.
    Safety(String),
    /// One or more legacy keys, merged in the listed order.
    Legacy(Vec<String>),
    /// Nothing usable was found.
    Empty,
}

impl std::fmt::Display for RecoverySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary slot"),
            Self::Backup => write!(f, "backup slot"),
            Self::Emergency => write!(f, "emergency slot"),
            Self::Safety(key) => write!(f, "safety key {key}"),
            Self::Legacy(keys) => write!(f, "legacy keys {}", keys.join(", ")),
            Self::Empty => write!(f, "nothing stored"),
        }
    }
}

/// The result of [`DurabilityManager::recover`].
#[derive(Debug, Clone, PartialEq)]
pub struct Recovery {
    /// Recovered flights, in stored order.
    pub flights: Vec<FlightRecord>,
    /// Where they came from.
    pub source: RecoverySource,
    /// Whether the slots were rewritten from a fallback source.
    pub repaired: bool,
}

impl DurabilityManager {
    /// Load the best available flight list.
    ///
    /// Sources are tried in order: primary slot (accepted even when empty),
    /// backup slot, emergency slot, safety keys, then all legacy keys merged
    /// and deduplicated by id. Fallback sources only count when they hold at
    /// least one flight, and whichever one succeeds is written back to all
    /// three slots. Unreadable values are skipped; this never fails.
    pub fn recover(&self) -> Recovery {
        if let SlotRead::Valid { envelope, .. } = self.read_key(&self.keys.primary) {
            debug!(count = envelope.len(), "Loaded flights from primary slot");
            return Recovery {
                flights: envelope.flights,
                source: RecoverySource::Primary,
                repaired: false,
            };
        }

        for (slot, source) in [
            (Slot::Backup, RecoverySource::Backup),
            (Slot::Emergency, RecoverySource::Emergency),
        ] {
            if let Some(flights) = self.non_empty_flights(slot.key(&self.keys)) {
                warn!(%slot, count = flights.len(), "Primary slot unusable, recovered from fallback");
                return self.repair(flights, source);
            }
        }

        if let Some((key, flights)) = self.recover_from_safety_keys() {
            warn!(key = %key, count = flights.len(), "Recovered flights from safety snapshot");
            return self.repair(flights, RecoverySource::Safety(key));
        }

        let (keys, flights) = self.recover_from_legacy_keys();
        if !flights.is_empty() {
            info!(keys = ?keys, count = flights.len(), "Migrated flights from legacy keys");
            return self.repair(flights, RecoverySource::Legacy(keys));
        }

        info!("No stored flights found");
        Recovery {
            flights: Vec::new(),
            source: RecoverySource::Empty,
            repaired: false,
        }
    }

    /// First safety key, in enumeration order, holding at least one flight.
    fn recover_from_safety_keys(&self) -> Option<(String, Vec<FlightRecord>)> {
        let keys = match self
            .store
            .scan_prefixes(&self.keys.safety_prefixes, self.max_safety_scan)
        {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Could not list safety keys");
                return None;
            }
        };
        debug!(candidates = keys.len(), "Scanning safety keys");

        keys.into_iter()
            .find_map(|key| self.non_empty_flights(&key).map(|flights| (key, flights)))
    }

    /// Every legacy key holding flights, and their deduplicated union.
    fn recover_from_legacy_keys(&self) -> (Vec<String>, Vec<FlightRecord>) {
        let mut found = Vec::new();
        let mut merged = Vec::new();
        for key in &self.keys.legacy {
            if let Some(flights) = self.non_empty_flights(key) {
                found.push(key.clone());
                merged.extend(flights);
            }
        }
        (found, dedup_by_id(merged))
    }

    fn repair(&self, flights: Vec<FlightRecord>, source: RecoverySource) -> Recovery {
        let outcome = self.persist(&flights, false);
        let repaired = outcome.is_saved();
        if !repaired {
            warn!(%outcome, %source, "Could not repair slots after recovery");
        }
        Recovery {
            flights,
            source,
            repaired,
        }
    }
}
