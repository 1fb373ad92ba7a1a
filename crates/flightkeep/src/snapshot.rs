//! JSON export and import of the flight list.
//!
//! Export files use the same `flights` object shape as the storage slots, so
//! an export can be imported again and a raw slot value can be imported too.
//! Neither direction touches the store; callers persist the merged result.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{DecodeError, Error, Result};
use crate::record::{FlightRecord, StorageEnvelope};

/// A downloadable snapshot of the flight list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFile {
    /// Flights in application order.
    pub flights: Vec<FlightRecord>,
    /// When the export was produced.
    pub exported_at: DateTime<Utc>,
    /// Number of flights.
    pub count: usize,
}

impl ExportFile {
    /// Build an export stamped with `exported_at`.
    #[must_use]
    pub fn at(flights: Vec<FlightRecord>, exported_at: DateTime<Utc>) -> Self {
        let count = flights.len();
        Self {
            flights,
            exported_at,
            count,
        }
    }

    /// Render as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be serialized.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the export to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Snapshot `records` for export, stamped with the current time.
#[must_use]
pub fn export_snapshot(records: &[FlightRecord]) -> ExportFile {
    ExportFile::at(records.to_vec(), Utc::now())
}

/// Default file name for an export produced at `at`.
#[must_use]
pub fn export_file_name(at: DateTime<Utc>) -> String {
    format!("flightkeep-export-{}.json", at.format("%Y-%m-%d"))
}

/// Parse flights out of an export file, a slot value, or a bare array.
///
/// # Errors
///
/// Returns [`Error::ImportFormat`] if the text is not JSON or has no flights
/// array.
pub fn import_snapshot(contents: &str) -> Result<Vec<FlightRecord>> {
    StorageEnvelope::decode(contents)
        .map(|envelope| envelope.flights)
        .map_err(|e| match e {
            DecodeError::Json(inner) => Error::import_format(format!(
                "file is not valid JSON (line {}, column {})",
                inner.line(),
                inner.column()
            )),
            DecodeError::MissingFlights => {
                Error::import_format("file has no \"flights\" array")
            }
            DecodeError::UnexpectedShape(kind) => Error::import_format(format!(
                "expected a flights array or an object with \"flights\", found a {kind}"
            )),
        })
}

/// Read and parse an import file.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read, or
/// [`Error::ImportFormat`] if its contents have no flights.
pub fn import_file(path: &Path) -> Result<Vec<FlightRecord>> {
    let contents = fs::read_to_string(path)?;
    import_snapshot(&contents)
}

/// Add imported flights to `existing`.
///
/// Existing records stay first and are never replaced. Imported records are
/// appended when their id is not already present; records without an id are
/// always appended.
#[must_use]
pub fn merge_imported(
    existing: Vec<FlightRecord>,
    imported: Vec<FlightRecord>,
) -> Vec<FlightRecord> {
    let mut seen: HashSet<_> = existing.iter().filter_map(FlightRecord::id).collect();
    let mut merged = existing;
    merged.extend(
        imported
            .into_iter()
            .filter(|record| record.id().map_or(true, |id| seen.insert(id))),
    );
    merged
}
