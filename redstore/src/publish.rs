//! # Shared Publish Channel
//!
//! Purpose: Fire-and-forget publishing on one long-lived connection,
//! decoupling publish latency from transmission.
//!
//! ## Design Principles
//! 1. **Memory-Only Enqueue**: `publish` appends an encoded frame to a byte
//!    backlog under the mutex; it never dials and never touches the socket.
//! 2. **Flusher Owns The Wire**: The background thread takes the backlog,
//!    dials when needed, and writes outside the lock on a fixed interval.
//! 3. **Best Effort**: Transport failures are logged and swallowed; the
//!    broken connection is discarded so a later flush can re-dial.
//! 4. **Owned Lifecycle**: The flusher drains the backlog once more, then
//!    stops and joins when the publisher is dropped; nothing outlives the
//!    facade.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, warn};

use crate::conn::{Conn, ConnConfig};
use crate::resp::encode_command;

// Drop buffered publishes rather than grow without bound while flushing
// cannot keep up.
const MAX_BACKLOG_BYTES: usize = 1 << 20;

/// Owner of the publish backlog and the background flusher that transmits it.
pub struct Publisher {
    backlog: Arc<Mutex<Vec<u8>>>,
    stop: Option<mpsc::Sender<()>>,
    flusher: Option<JoinHandle<()>>,
}

impl Publisher {
    /// Starts the publisher and its flusher thread.
    ///
    /// All dialing happens on the flusher thread, so starting against an
    /// unreachable endpoint succeeds and no caller ever waits on a connect.
    pub fn start(config: ConnConfig, interval: Duration) -> Self {
        let backlog = Arc::new(Mutex::new(Vec::new()));
        let (stop, ticks) = mpsc::channel::<()>();

        let flusher_backlog = backlog.clone();
        let flusher = std::thread::spawn(move || {
            let mut conn: Option<Conn> = None;
            loop {
                // The sender is dropped on shutdown; a timeout is a tick.
                let shutdown = !matches!(
                    ticks.recv_timeout(interval),
                    Err(RecvTimeoutError::Timeout)
                );

                let frames = {
                    let mut backlog = flusher_backlog.lock().expect("publish mutex poisoned");
                    std::mem::take(&mut *backlog)
                };
                if !frames.is_empty() {
                    transmit(&config, &mut conn, &frames);
                }

                if shutdown {
                    return;
                }
            }
        });

        Publisher {
            backlog,
            stop: Some(stop),
            flusher: Some(flusher),
        }
    }

    /// Enqueues one publish command. Best-effort: appends to the in-memory
    /// backlog and returns; transmission happens within one flush interval.
    pub fn publish(&self, channel: &str, payload: &str) {
        let mut backlog = self.backlog.lock().expect("publish mutex poisoned");
        if backlog.len() > MAX_BACKLOG_BYTES {
            warn!("publish backlog over cap, dropping buffered commands");
            backlog.clear();
        }
        encode_command(
            &[b"PUBLISH", channel.as_bytes(), payload.as_bytes()],
            &mut backlog,
        );
    }
}

fn transmit(config: &ConnConfig, conn: &mut Option<Conn>, frames: &[u8]) {
    if conn.is_none() {
        match Conn::dial(config) {
            Ok(dialed) => *conn = Some(dialed),
            Err(err) => {
                debug!(%err, "publish frames dropped, endpoint unreachable");
                return;
            }
        }
    }
    let dialed = conn.as_mut().expect("dialed above");
    if let Err(err) = dialed.send_frames(frames) {
        warn!(%err, "publish flush failed, discarding connection");
        *conn = None;
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        // Dropping the sender wakes the flusher, which drains the backlog
        // one last time before exiting.
        self.stop.take();
        if let Some(flusher) = self.flusher.take() {
            let _ = flusher.join();
        }
    }
}
