//! # Transport Connection
//!
//! Purpose: One TCP connection with reusable buffers, shared by the pool,
//! the publish channel, and subscription readers.
//!
//! ## Design Principles
//! 1. **Buffer Reuse**: Framing and parsing reuse per-connection buffers.
//! 2. **Deferred I/O**: `enqueue` never touches the socket; `flush` does.
//! 3. **Lazy Dialing**: Nothing connects until a caller needs the wire.

use std::io::{BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::StoreResult;
use crate::resp::{encode_command, read_reply, Reply};

/// Dial parameters shared by every connection this crate opens.
#[derive(Debug, Clone)]
pub struct ConnConfig {
    /// Remote endpoint, e.g. "127.0.0.1:6379". Hostnames are resolved.
    pub addr: String,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
}

/// A single transport connection.
///
/// Writes accumulate in `pending` until `flush`; `call` is the one-round-trip
/// convenience used by pooled connections.
pub struct Conn {
    reader: BufReader<TcpStream>,
    pending: Vec<u8>,
    scratch: Vec<u8>,
}

impl Conn {
    /// Opens a connection to the configured endpoint.
    pub fn dial(config: &ConnConfig) -> StoreResult<Self> {
        let stream = match config.connect_timeout {
            Some(timeout) => {
                let addr = config.addr.to_socket_addrs()?.next().ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("no address for {}", config.addr),
                    )
                })?;
                TcpStream::connect_timeout(&addr, timeout)?
            }
            None => TcpStream::connect(config.addr.as_str())?,
        };
        if let Some(timeout) = config.read_timeout {
            stream.set_read_timeout(Some(timeout))?;
        }
        if let Some(timeout) = config.write_timeout {
            stream.set_write_timeout(Some(timeout))?;
        }
        // Small request/reply payloads; Nagle only adds latency here.
        stream.set_nodelay(true)?;
        debug!(addr = %config.addr, "dialed store endpoint");

        Ok(Conn {
            reader: BufReader::new(stream),
            pending: Vec::with_capacity(256),
            scratch: Vec::with_capacity(128),
        })
    }

    /// Buffers one command without performing any I/O.
    pub fn enqueue(&mut self, args: &[&[u8]]) {
        encode_command(args, &mut self.pending);
    }

    /// Transmits pre-encoded frames, bypassing the pending buffer.
    pub fn send_frames(&mut self, frames: &[u8]) -> StoreResult<()> {
        let stream = self.reader.get_mut();
        stream.write_all(frames)?;
        stream.flush()?;
        Ok(())
    }

    /// Transmits everything buffered so far.
    pub fn flush(&mut self) -> StoreResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let stream = self.reader.get_mut();
        stream.write_all(&self.pending)?;
        stream.flush()?;
        self.pending.clear();
        Ok(())
    }

    /// Blocks until one reply arrives.
    pub fn read_reply(&mut self) -> StoreResult<Reply> {
        read_reply(&mut self.reader, &mut self.scratch)
    }

    /// Sends one command and reads its reply.
    pub fn call(&mut self, args: &[&[u8]]) -> StoreResult<Reply> {
        self.pending.clear();
        self.enqueue(args);
        self.flush()?;
        self.read_reply()
    }
}
