//! Per-line transformation into the destination record shapes
//!
//! A decoded access-log line becomes either the flat warehouse record
//! ([`transform`]) or the raw staging record ([`stage`]). Both are maps of
//! destination column name to scalar value, consumed immediately by a sink
//! writer.

use ldp_common::{PipelineError, Result};
use serde_json::{Map, Value};

/// Destination field carrying the canonical timestamp.
pub const DS_FIELD: &str = "ds";

/// Source field the timestamp is copied from. The one required field.
pub const TIME_FIELD: &str = "time";

/// Staging field carrying the undecoded line.
pub const LOG_FIELD: &str = "log";

/// Source fields with no destination column. Absent members are ignored.
const DROPPED_FIELDS: &[&str] = &["ClientAddr", "StartLocal", "StartUTC", TIME_FIELD];

/// `ServiceURL` sub-fields and their flattened destination names.
const SERVICE_URL_FIELDS: &[(&str, &str)] = &[
    ("Scheme", "ServiceScheme"),
    ("Path", "ServiceUrlPath"),
    ("RawPath", "ServiceUrlRawPath"),
    ("RawQuery", "ServiceUrlRawQuery"),
    ("Fragment", "ServiceUrlFragment"),
];

/// Transform one decoded log line into the flat warehouse record.
///
/// - copies `time` to the canonical `ds` field;
/// - flattens the `ServiceURL` sub-object into sibling fields and removes
///   the nested field; absent sub-fields are omitted, never fabricated;
/// - drops the fields the warehouse schema has no column for.
pub fn transform(mut log: Map<String, Value>) -> Result<Map<String, Value>> {
    let ds = log.get(TIME_FIELD).cloned().ok_or_else(|| {
        PipelineError::malformed(format!("missing required field `{}`", TIME_FIELD))
    })?;
    log.insert(DS_FIELD.to_string(), ds);

    match log.remove("ServiceURL") {
        Some(Value::Object(url)) => {
            for (source, destination) in SERVICE_URL_FIELDS {
                if let Some(value) = url.get(*source) {
                    log.insert((*destination).to_string(), value.clone());
                }
            }
        },
        Some(other) => {
            return Err(PipelineError::malformed(format!(
                "`ServiceURL` must be an object, got {}",
                json_type(&other)
            )));
        },
        None => {},
    }

    for field in DROPPED_FIELDS {
        log.remove(*field);
    }

    Ok(log)
}

/// Build the raw staging record: the undecoded line plus its timestamp.
///
/// Unlike the warehouse shape, a missing `time` is not an error here; the
/// staging row carries a null datestamp and downstream jobs decide.
pub fn stage(raw: &str, decoded: &Map<String, Value>) -> Map<String, Value> {
    let mut record = Map::new();
    record.insert(
        DS_FIELD.to_string(),
        decoded.get(TIME_FIELD).cloned().unwrap_or(Value::Null),
    );
    record.insert(LOG_FIELD.to_string(), Value::String(raw.to_string()));
    record
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
