//! Raw record normalization
//!
//! A raw batch is a JSON array of announcement objects produced by a
//! collector. Each entry is validated against [`RawAnnouncement`] and turned
//! into an [`AnnouncedRecord`] with source defaults applied. One bad entry
//! rejects the whole batch.

use crate::error::{IngestError, IngestResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Source code used when a record does not name its source
pub const DEFAULT_SOURCE_CODE: &str = "unknown";

/// Source type used when a record does not classify its source
pub const DEFAULT_SOURCE_TYPE: &str = "ixp";

/// Wire shape of one raw announcement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAnnouncement {
    /// Announced prefix in CIDR notation
    pub prefix: String,
    /// Space-separated AS path as announced
    pub as_path: String,
    pub origin_asn: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
}

/// A validated announcement ready for persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncedRecord {
    pub prefix: String,
    pub as_path: String,
    pub origin_asn: u32,
    pub source_code: String,
    pub source_type: String,
}

impl From<RawAnnouncement> for AnnouncedRecord {
    fn from(raw: RawAnnouncement) -> Self {
        AnnouncedRecord {
            prefix: raw.prefix,
            as_path: raw.as_path,
            origin_asn: raw.origin_asn,
            source_code: raw
                .source_code
                .unwrap_or_else(|| DEFAULT_SOURCE_CODE.to_string()),
            source_type: raw
                .source_type
                .unwrap_or_else(|| DEFAULT_SOURCE_TYPE.to_string()),
        }
    }
}

/// Validate already decoded JSON entries, preserving their order.
pub fn normalize_entries(entries: Vec<Value>) -> IngestResult<Vec<AnnouncedRecord>> {
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            serde_json::from_value::<RawAnnouncement>(entry)
                .map(AnnouncedRecord::from)
                .map_err(|e| IngestError::MalformedRecord {
                    index,
                    reason: e.to_string(),
                })
        })
        .collect()
}

/// Parse and validate a raw batch.
///
/// An empty array is valid and yields no records.
pub fn normalize_batch(raw: &str) -> IngestResult<Vec<AnnouncedRecord>> {
    let payload: Value = serde_json::from_str(raw).map_err(|e| IngestError::MalformedBatch {
        reason: e.to_string(),
    })?;

    match payload {
        Value::Array(entries) => normalize_entries(entries),
        other => Err(IngestError::MalformedBatch {
            reason: format!("expected a JSON array of records, found {}", json_kind(&other)),
        }),
    }
}

/// Read a raw batch from a local path or URL (optionally compressed) and normalize it.
pub fn load_raw_file(path: &str) -> IngestResult<Vec<AnnouncedRecord>> {
    let raw = oneio::read_to_string(path).map_err(|e| IngestError::RawInput {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    normalize_batch(&raw)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
