use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::CampError;
use crate::serde::to_canonical_json_bytes;

/// Lowercase hex SHA-256 of the canonical JSON form of `value`.
///
/// Key order in maps does not affect the result.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, CampError> {
    let digest = Sha256::digest(to_canonical_json_bytes(value)?);
    Ok(format!("{digest:x}"))
}
