//! Batch parsing for raw monitoring records
//!
//! Accepts a JSON array or NDJSON. Object keys are trimmed before the record is
//! decoded so exports with padded headers (" Timestamp ") still map onto the
//! schema.

use crate::error::CareError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Parser for raw record batches of any domain
pub struct RecordParser;

impl RecordParser {
    /// Parse a JSON string containing an array of records
    pub fn parse_array<T: DeserializeOwned>(json: &str) -> Result<Vec<T>, CareError> {
        let value: Value = serde_json::from_str(json)?;
        let rows = match value {
            Value::Array(rows) => rows,
            other => {
                return Err(CareError::ParseError(format!(
                    "Expected a JSON array of records, got {}",
                    value_kind(&other)
                )))
            }
        };

        rows.into_iter()
            .enumerate()
            .map(|(idx, row)| decode_row(row).map_err(|e| row_error(idx, e)))
            .collect()
    }

    /// Parse NDJSON (newline-delimited JSON) containing one record per line
    pub fn parse_ndjson<T: DeserializeOwned>(ndjson: &str) -> Result<Vec<T>, CareError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(trimmed).map_err(|e| {
                CareError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
            })?;
            let record = decode_row(value).map_err(|e| {
                CareError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
            })?;
            records.push(record);
        }
        Ok(records)
    }
}

/// Trim whitespace around every key of a JSON object
pub fn trim_keys(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| (key.trim().to_string(), value))
        .collect()
}

fn decode_row<T: DeserializeOwned>(row: Value) -> Result<T, serde_json::Error> {
    let row = match row {
        Value::Object(map) => Value::Object(trim_keys(map)),
        other => other,
    };
    serde_json::from_value(row)
}

fn row_error(idx: usize, e: serde_json::Error) -> CareError {
    CareError::ParseError(format!("Failed to parse record {}: {}", idx, e))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
