//! `flightkeep` - Local durability for a charter flight list
//!
//! This library keeps an ordered list of flight records safe in a local
//! key-value store: three redundant slots, a guard against accidental wipes,
//! safety snapshots before shrinking writes, and an ordered recovery path that
//! repairs the slots after falling back.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod durability;
pub mod error;
pub mod logging;
pub mod record;
pub mod scheduler;
pub mod snapshot;
pub mod store;

pub use config::Config;
pub use durability::{
    DiagnosticReport, DurabilityManager, PersistOutcome, Recovery, RecoverySource, Slot,
};
pub use error::{DecodeError, Error, Result};
pub use logging::init_logging;
pub use record::{FlightRecord, RecordId, StorageEnvelope};
pub use scheduler::{AutoSaveStatus, AutoSaver};
pub use snapshot::{export_snapshot, import_snapshot, merge_imported, ExportFile};
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
