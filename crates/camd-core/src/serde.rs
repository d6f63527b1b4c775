use std::collections::BTreeMap;
use std::iter::FromIterator;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::errors::{CampError, ErrorInfo};

fn serde_error(code: &str, err: impl ToString) -> CampError {
    CampError::Serde(ErrorInfo::new(code, err.to_string()))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Compact JSON with object keys sorted at every depth.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CampError> {
    let value = serde_json::to_value(value).map_err(|err| serde_error("json-serialize", err))?;
    let canonical = canonicalize(value);
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &canonical).map_err(|err| serde_error("json-write", err))?;
    Ok(bytes)
}

/// Indented form of [`to_canonical_json_bytes`].
pub fn to_canonical_json_pretty<T: Serialize>(value: &T) -> Result<Vec<u8>, CampError> {
    let value = serde_json::to_value(value).map_err(|err| serde_error("json-serialize", err))?;
    serde_json::to_vec_pretty(&canonicalize(value)).map_err(|err| serde_error("json-write", err))
}

/// Parses JSON bytes into `T`.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, CampError> {
    serde_json::from_slice(data).map_err(|err| serde_error("json-deserialize", err))
}
