//! Encoding of the structured employee columns.
//!
//! Absences persist as a JSON array of `YYYY-MM-DD` strings and metadata as a
//! JSON object. Depending on the driver and column type the stored value comes
//! back either as native JSON or as a JSON document inside a text value; both
//! decode to the same in-memory types.

use serde_json::Value;

use crate::entity::{DutyDate, Metadata};
use crate::error::{RotaError, RotaResult};

pub const ABSENCES_COLUMN: &str = "known_absences";
pub const METADATA_COLUMN: &str = "metadata";

pub fn encode_absences(absences: &[DutyDate]) -> Value {
    Value::Array(
        absences
            .iter()
            .map(|d| Value::String(d.to_string()))
            .collect(),
    )
}

pub fn decode_absences(stored: Value) -> RotaResult<Vec<DutyDate>> {
    match unwrap_text(ABSENCES_COLUMN, stored)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => DutyDate::parse(&s).map_err(|_| encoding(
                    ABSENCES_COLUMN,
                    format!("'{s}' is not a YYYY-MM-DD date"),
                )),
                other => Err(encoding(
                    ABSENCES_COLUMN,
                    format!("expected date string, found {}", kind(&other)),
                )),
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(encoding(
            ABSENCES_COLUMN,
            format!("expected array, found {}", kind(&other)),
        )),
    }
}

pub fn encode_metadata(metadata: &Metadata) -> Value {
    Value::Object(metadata.clone())
}

pub fn decode_metadata(stored: Value) -> RotaResult<Metadata> {
    match unwrap_text(METADATA_COLUMN, stored)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Metadata::new()),
        other => Err(encoding(
            METADATA_COLUMN,
            format!("expected object, found {}", kind(&other)),
        )),
    }
}

/// Text-encoded JSON is parsed once; anything else is returned as-is.
fn unwrap_text(column: &str, stored: Value) -> RotaResult<Value> {
    match stored {
        Value::String(text) => serde_json::from_str(&text)
            .map_err(|e| encoding(column, format!("stored text is not JSON: {e}"))),
        other => Ok(other),
    }
}

fn encoding(column: &str, message: String) -> RotaError {
    RotaError::Encoding {
        column: column.to_string(),
        message,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
