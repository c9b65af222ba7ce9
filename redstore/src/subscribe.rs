//! # Subscription Reader
//!
//! Purpose: Receive published messages on a dedicated connection and hand
//! them to the caller as normalized records.
//!
//! There is deliberately no reconnect logic here: a broken connection
//! surfaces from `receive` and restart policy belongs to the caller.

use crate::conn::{Conn, ConnConfig};
use crate::error::StoreResult;
use crate::resp::Reply;

/// One received pub/sub event, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Event kind; only `"message"` events are surfaced.
    pub kind: String,
    /// Channel the payload was published on.
    pub channel: String,
    /// Published payload.
    pub payload: String,
}

/// A dedicated subscribe/receive connection.
///
/// Each handle owns its own connection, independent of the pool and the
/// shared publish connection. `receive` takes `&mut self`, so concurrent
/// receives on one handle are unrepresentable.
pub struct Subscription {
    conn: Conn,
}

impl Subscription {
    pub(crate) fn open(config: &ConnConfig, channels: &[&str]) -> StoreResult<Self> {
        let mut subscription = Subscription {
            conn: Conn::dial(config)?,
        };
        for channel in channels {
            subscription.subscribe(channel)?;
        }
        Ok(subscription)
    }

    /// Subscribes this connection to one more channel.
    ///
    /// The server's confirmation arrives as a non-`"message"` event through
    /// `receive`, where it yields `None`.
    pub fn subscribe(&mut self, channel: &str) -> StoreResult<()> {
        self.conn.enqueue(&[b"SUBSCRIBE", channel.as_bytes()]);
        self.conn.flush()
    }

    /// Blocks until one event arrives.
    ///
    /// Returns `Some` only for `"message"` events; anything else (subscribe
    /// confirmations included) yields `None` and the caller loops.
    pub fn receive(&mut self) -> StoreResult<Option<Message>> {
        let reply = self.conn.read_reply()?;
        Ok(into_message(reply))
    }
}

fn into_message(reply: Reply) -> Option<Message> {
    let items = match reply {
        Reply::Array(items) if items.len() == 3 => items,
        _ => return None,
    };
    let mut fields = items.into_iter().map(|item| match item {
        Reply::Bulk(Some(data)) => Some(String::from_utf8_lossy(&data).into_owned()),
        _ => None,
    });
    let kind = fields.next()??;
    if kind != "message" {
        return None;
    }
    let channel = fields.next()??;
    let payload = fields.next()??;
    Some(Message {
        kind,
        channel,
        payload,
    })
}
