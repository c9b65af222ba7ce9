//! # redstore
//!
//! Purpose: A typed, concurrency-safe client facade over a Redis-protocol
//! key-value store: pooled per-key operations with expiration, a generic
//! value codec, and a lightweight publish/subscribe channel.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Keyed operations share a bounded pool of
//!    reusable connections, released by RAII on every exit path.
//! 2. **One Round Trip Per Call**: No transactions, no retries, no local
//!    cache; each operation is a single independent remote command.
//! 3. **Typed Boundary**: Values cross the wire through one generic
//!    encode/decode pair; a type mismatch on read fails, never coerces.
//! 4. **Fire-and-Forget Publishing**: One mutex-guarded shared connection
//!    with a periodic background flush keeps publish calls off the network.

mod codec;
mod conn;
mod error;
mod pool;
mod publish;
mod resp;
mod storage;
mod subscribe;

pub use error::{StoreError, StoreResult};
pub use storage::{Storage, StorageConfig};
pub use subscribe::{Message, Subscription};
