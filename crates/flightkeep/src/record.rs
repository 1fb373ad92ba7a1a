//! Flight records and the envelope they are stored in.
//!
//! A [`FlightRecord`] is opaque to this crate apart from its `id`, which is
//! used to drop duplicates when several recovery sources are merged.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;

/// Identity of a flight record.
///
/// String and numeric ids are distinct: `"7"` and `7` name different flights.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordId {
    /// A JSON string id.
    Text(String),
    /// A JSON number id, in its serialized form.
    Number(String),
}

impl RecordId {
    /// Get the id as text, without its JSON type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(s) | Self::Number(s) => s,
        }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single flight request, as owned by the hosting application.
///
/// The value is stored and returned verbatim, object field order included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlightRecord(Value);

impl FlightRecord {
    /// Wrap an application-defined JSON value.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The record's `id` field, if it is a string or a number.
    #[must_use]
    pub fn id(&self) -> Option<RecordId> {
        match self.0.get("id")? {
            Value::String(s) => Some(RecordId::Text(s.clone())),
            Value::Number(n) => Some(RecordId::Number(n.to_string())),
            _ => None,
        }
    }

    /// Borrow the underlying JSON value.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Unwrap into the underlying JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for FlightRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Drop records whose id has already been seen, keeping the first occurrence.
///
/// Records without an id are always kept. Order is otherwise preserved.
#[must_use]
pub fn dedup_by_id(records: Vec<FlightRecord>) -> Vec<FlightRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| record.id().map_or(true, |id| seen.insert(id)))
        .collect()
}

/// The unit written to each storage slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEnvelope {
    /// Flights in application order.
    pub flights: Vec<FlightRecord>,

    /// When the envelope was written. Absent in envelopes from older writers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,

    /// Length of `flights` at write time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl StorageEnvelope {
    /// Build an envelope stamped with `saved_at`.
    #[must_use]
    pub fn new(flights: Vec<FlightRecord>, saved_at: DateTime<Utc>) -> Self {
        let count = flights.len();
        Self {
            flights,
            saved_at: Some(saved_at),
            count: Some(count),
        }
    }

    /// Number of flights actually held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    /// Check if the envelope holds no flights.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    /// Decode a stored value.
    ///
    /// Accepts an object with a `flights` array (the envelope shape, also
    /// used by export files) or a bare array of records (legacy shape).
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the text is not JSON or has no flights.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        match serde_json::from_str::<Value>(raw)? {
            Value::Object(mut map) => match map.remove("flights") {
                Some(flights @ Value::Array(_)) => {
                    let flights: Vec<FlightRecord> = serde_json::from_value(flights)?;
                    let saved_at = map
                        .get("savedAt")
                        .and_then(Value::as_str)
                        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                        .map(|dt| dt.with_timezone(&Utc));
                    let count = map
                        .get("count")
                        .and_then(Value::as_u64)
                        .and_then(|n| usize::try_from(n).ok());
                    Ok(Self {
                        flights,
                        saved_at,
                        count,
                    })
                }
                _ => Err(DecodeError::MissingFlights),
            },
            Value::Array(items) => Ok(Self {
                flights: items.into_iter().map(FlightRecord::new).collect(),
                saved_at: None,
                count: None,
            }),
            Value::Null => Err(DecodeError::UnexpectedShape("null")),
            Value::Bool(_) => Err(DecodeError::UnexpectedShape("boolean")),
            Value::Number(_) => Err(DecodeError::UnexpectedShape("number")),
            Value::String(_) => Err(DecodeError::UnexpectedShape("string")),
        }
    }
}

/// Format a timestamp the way it is written to `savedAt` and the last-save key.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
