//! # Error Taxonomy
//!
//! Purpose: Give every facade outcome a local, matchable error kind so
//! callers never depend on transport-library error identities.

use std::io;

use thiserror::Error;

/// Result type used throughout the crate.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the storage facade.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Dial, resolve, or socket IO failure. Never retried internally.
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),

    /// The pool is at capacity with no idle connection available.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// The requested key is absent. A normal, branchable outcome.
    #[error("key not found")]
    NotFound,

    /// RESP framing violation or a reply shape the command cannot produce.
    #[error("malformed server reply")]
    Protocol,

    /// The server rejected or did not fully acknowledge a write or delete.
    #[error("command failed: {0}")]
    Command(String),

    /// Stored bytes do not parse as the requested type.
    #[error("value decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// The value could not be serialized for storage.
    #[error("value encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

impl StoreError {
    /// True when the error is the absent-key outcome rather than a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}
