//! # Typed Value Codec
//!
//! Purpose: Encode values before storage and decode them after fetch, one
//! generic path shared by every typed getter.
//!
//! The wire format is MessagePack via `rmp-serde`. It is self-describing
//! enough that decoding bytes as a type other than the one encoded fails
//! instead of silently coercing, which is exactly the contract the typed
//! getters rely on.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreResult;

/// Serializes a value for storage. `None` encodes to an empty byte sequence.
pub fn encode<T: Serialize>(value: Option<&T>) -> StoreResult<Vec<u8>> {
    match value {
        Some(value) => Ok(rmp_serde::to_vec(value)?),
        None => Ok(Vec::new()),
    }
}

/// Deserializes stored bytes as exactly one value of type `T`.
///
/// Empty input, corrupt input, and type mismatches all surface as
/// `StoreError::Decode`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    Ok(rmp_serde::from_slice(bytes)?)
}
