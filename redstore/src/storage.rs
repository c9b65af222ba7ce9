//! # Storage Facade
//!
//! Purpose: Expose a compact, blocking API over the pool, the typed codec,
//! and the publish/subscribe connections.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `Storage` hides pooling, framing, and codec
//!    details behind per-key operations.
//! 2. **Scoped Acquisition**: Every keyed operation acquires one pooled
//!    connection, performs one round trip, and releases it by drop on every
//!    exit path.
//! 3. **Uniform Prefixing**: The configured prefix is applied to every
//!    logical key here and nowhere else.
//! 4. **Explicit Errors**: Every operation returns success-or-error; the
//!    sole exception is best-effort `publish`.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec;
use crate::conn::ConnConfig;
use crate::error::{StoreError, StoreResult};
use crate::pool::Pool;
use crate::publish::Publisher;
use crate::resp::Reply;
use crate::subscribe::Subscription;

/// Construction parameters for [`Storage`].
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Remote endpoint, e.g. "127.0.0.1:6379".
    pub addr: String,
    /// Fixed pool capacity; zero makes every keyed operation fail.
    pub pool_size: usize,
    /// Prepended to every logical key before it reaches the store.
    pub prefix: String,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Period of the background publish flush.
    pub flush_interval: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            addr: "127.0.0.1:6379".to_string(),
            pool_size: 8,
            prefix: String::new(),
            read_timeout: None,
            write_timeout: None,
            connect_timeout: None,
            flush_interval: Duration::from_millis(200),
        }
    }
}

/// Typed storage facade over a Redis-protocol store.
///
/// Owns the connection pool, the shared publish connection with its flusher,
/// and hands out independent subscription connections. All keyed operations
/// are synchronous and may block on network I/O; the instance is shared by
/// reference across threads.
pub struct Storage {
    pool: Pool,
    prefix: String,
    publisher: Publisher,
    conn_config: ConnConfig,
}

impl Storage {
    /// Creates a facade for the given endpoint with default settings.
    pub fn connect(addr: impl Into<String>) -> Self {
        Self::open(StorageConfig {
            addr: addr.into(),
            ..StorageConfig::default()
        })
    }

    /// Creates a facade from an explicit configuration.
    ///
    /// Performs no network I/O: pool slots and the publish connection are
    /// dialed lazily, so opening against an unreachable endpoint succeeds
    /// and the first operation reports the failure.
    pub fn open(config: StorageConfig) -> Self {
        let conn_config = ConnConfig {
            addr: config.addr,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            connect_timeout: config.connect_timeout,
        };
        Storage {
            pool: Pool::new(conn_config.clone(), config.pool_size),
            prefix: config.prefix,
            publisher: Publisher::start(conn_config.clone(), config.flush_interval),
            conn_config,
        }
    }

    fn prefixed(&self, key: &str) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(self.prefix.as_bytes());
        full.extend_from_slice(key.as_bytes());
        full
    }

    /// Fetches the raw stored bytes for a key.
    ///
    /// Returns [`StoreError::NotFound`] when the key is absent.
    pub fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        let full_key = self.prefixed(key);
        let mut conn = self.pool.acquire()?;
        match conn.call(&[b"GET", &full_key])? {
            Reply::Bulk(Some(data)) => Ok(data),
            Reply::Bulk(None) => Err(StoreError::NotFound),
            Reply::Error(message) => Err(server_error(message)),
            _ => Err(StoreError::Protocol),
        }
    }

    /// Stores an encoded value under a key, without expiration.
    ///
    /// `None` is stored as an empty byte sequence.
    pub fn set<T: Serialize>(&self, key: &str, value: Option<&T>) -> StoreResult<()> {
        let full_key = self.prefixed(key);
        let encoded = codec::encode(value)?;
        let mut conn = self.pool.acquire()?;
        match conn.call(&[b"SET", &full_key, &encoded])? {
            Reply::Simple(status) if status == b"OK" => Ok(()),
            Reply::Error(message) => Err(server_error(message)),
            _ => Err(StoreError::Command("SET not acknowledged".to_string())),
        }
    }

    /// Stores an encoded value with an expiration.
    ///
    /// The TTL is transmitted in whole seconds; sub-second precision is
    /// truncated.
    pub fn setex<T: Serialize>(
        &self,
        key: &str,
        value: Option<&T>,
        ttl: Duration,
    ) -> StoreResult<()> {
        let full_key = self.prefixed(key);
        let encoded = codec::encode(value)?;
        let seconds = ttl.as_secs().to_string();
        let mut conn = self.pool.acquire()?;
        match conn.call(&[b"SETEX", &full_key, seconds.as_bytes(), &encoded])? {
            Reply::Simple(status) if status == b"OK" => Ok(()),
            Reply::Error(message) => Err(server_error(message)),
            _ => Err(StoreError::Command("SETEX not acknowledged".to_string())),
        }
    }

    /// Removes a key. Strict: deleting an absent key is an error, not a
    /// no-op.
    pub fn delete(&self, key: &str) -> StoreResult<()> {
        let full_key = self.prefixed(key);
        let mut conn = self.pool.acquire()?;
        match conn.call(&[b"DEL", &full_key])? {
            Reply::Integer(1) => Ok(()),
            Reply::Integer(removed) => Err(StoreError::Command(format!(
                "DEL removed {} keys for {}",
                removed,
                String::from_utf8_lossy(&full_key),
            ))),
            Reply::Error(message) => Err(server_error(message)),
            _ => Err(StoreError::Protocol),
        }
    }

    /// Fetches and decodes a value as `T`.
    ///
    /// The scalar getters below are thin wrappers over this.
    pub fn get_value<T: DeserializeOwned>(&self, key: &str) -> StoreResult<T> {
        codec::decode(&self.get(key)?)
    }

    /// Fetches a value stored as a string.
    pub fn get_string(&self, key: &str) -> StoreResult<String> {
        self.get_value(key)
    }

    /// Fetches a value stored as an `i32`.
    pub fn get_i32(&self, key: &str) -> StoreResult<i32> {
        self.get_value(key)
    }

    /// Fetches a value stored as an `i64`.
    pub fn get_i64(&self, key: &str) -> StoreResult<i64> {
        self.get_value(key)
    }

    /// Fetches a value stored as a platform-width integer.
    pub fn get_int(&self, key: &str) -> StoreResult<isize> {
        self.get_value(key)
    }

    /// Fetches a value stored as an `f64`.
    pub fn get_f64(&self, key: &str) -> StoreResult<f64> {
        self.get_value(key)
    }

    /// Publishes a payload on a channel, best-effort.
    ///
    /// Never blocks on the network and never reports failure: the command is
    /// buffered on the shared connection and transmitted by the background
    /// flusher within one flush interval. Channels are not prefixed.
    pub fn publish(&self, channel: &str, payload: &str) {
        self.publisher.publish(channel, payload);
    }

    /// Opens a dedicated subscription connection for the given channels.
    pub fn subscription(&self, channels: &[&str]) -> StoreResult<Subscription> {
        Subscription::open(&self.conn_config, channels)
    }
}

fn server_error(message: Vec<u8>) -> StoreError {
    StoreError::Command(String::from_utf8_lossy(&message).into_owned())
}
