//! # Connection Pool
//!
//! Purpose: Reuse TCP connections across facade calls to avoid per-request
//! handshakes.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: A bounded set of fungible connections.
//! 2. **RAII Release**: The guard returns its connection on drop, so release
//!    happens exactly once on every exit path.
//! 3. **Fail Fast**: At capacity with nothing idle, acquire errors instead
//!    of queueing.
//! 4. **Minimal Locking**: The mutex covers only free-list bookkeeping,
//!    never network I/O.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::conn::{Conn, ConnConfig};
use crate::error::{StoreError, StoreResult};
use crate::resp::Reply;

struct PoolState {
    idle: VecDeque<Conn>,
    total: usize,
}

struct PoolInner {
    config: ConnConfig,
    size: usize,
    state: Mutex<PoolState>,
}

/// Bounded pool handle. Cloning shares the same pool.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Creates a pool that will hold at most `size` connections.
    ///
    /// No connection is dialed here; each slot is filled lazily on first use.
    pub fn new(config: ConnConfig, size: usize) -> Self {
        Pool {
            inner: Arc::new(PoolInner {
                config,
                size,
                state: Mutex::new(PoolState {
                    idle: VecDeque::with_capacity(size),
                    total: 0,
                }),
            }),
        }
    }

    /// Hands out one connection, dialing a fresh one if the pool is below
    /// capacity and nothing is idle.
    pub fn acquire(&self) -> StoreResult<PooledConn> {
        if let Some(conn) = self.pop_idle() {
            return Ok(PooledConn::new(self.inner.clone(), conn));
        }

        if !self.reserve_slot() {
            return Err(StoreError::PoolExhausted);
        }

        match Conn::dial(&self.inner.config) {
            Ok(conn) => {
                debug!(size = self.inner.size, "pool grew by one connection");
                Ok(PooledConn::new(self.inner.clone(), conn))
            }
            Err(err) => {
                self.free_slot();
                Err(err)
            }
        }
    }

    fn pop_idle(&self) -> Option<Conn> {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        state.idle.pop_front()
    }

    fn reserve_slot(&self) -> bool {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        if state.total >= self.inner.size {
            return false;
        }
        state.total += 1;
        true
    }

    fn free_slot(&self) {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        state.total = state.total.saturating_sub(1);
    }

    fn put_back(&self, conn: Conn) {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        state.idle.push_back(conn);
    }
}

/// RAII guard over one acquired connection.
pub struct PooledConn {
    pool: Arc<PoolInner>,
    conn: Option<Conn>,
    healthy: bool,
}

impl PooledConn {
    fn new(pool: Arc<PoolInner>, conn: Conn) -> Self {
        PooledConn {
            pool,
            conn: Some(conn),
            healthy: true,
        }
    }

    /// Executes one command round trip on the held connection.
    ///
    /// A failed round trip marks the connection unhealthy so it is discarded
    /// instead of returned to the idle set.
    pub fn call(&mut self, args: &[&[u8]]) -> StoreResult<Reply> {
        let conn = self.conn.as_mut().expect("guard holds a connection");
        let reply = conn.call(args);
        if reply.is_err() {
            self.healthy = false;
        }
        reply
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => return,
        };
        let pool = Pool {
            inner: self.pool.clone(),
        };
        if self.healthy {
            pool.put_back(conn);
        } else {
            pool.free_slot();
        }
    }
}
