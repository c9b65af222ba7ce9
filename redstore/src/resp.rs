//! # RESP2 Framing
//!
//! Purpose: Encode command arrays and parse server replies without external
//! dependencies, keeping allocations under control.
//!
//! ## Design Principles
//! 1. **Binary-Safe**: Bulk strings are raw bytes end to end.
//! 2. **Buffer Reuse**: The caller owns the scratch line buffer.
//! 3. **Fail Fast**: Any framing violation is `StoreError::Protocol`.

use std::io::BufRead;

use crate::error::{StoreError, StoreResult};

/// One parsed server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK` style status line.
    Simple(Vec<u8>),
    /// `-ERR ...` error line.
    Error(Vec<u8>),
    /// `:123` integer.
    Integer(i64),
    /// `$...` bulk string; `None` is the null bulk (absent key).
    Bulk(Option<Vec<u8>>),
    /// `*...` array; pub/sub pushes arrive as these.
    Array(Vec<Reply>),
}

/// Appends one command as a RESP2 array of bulk strings.
pub fn encode_command(args: &[&[u8]], out: &mut Vec<u8>) {
    out.push(b'*');
    out.extend_from_slice(args.len().to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
    for arg in args {
        out.push(b'$');
        out.extend_from_slice(arg.len().to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
}

/// Reads exactly one reply, recursing for arrays.
pub fn read_reply<R: BufRead>(reader: &mut R, scratch: &mut Vec<u8>) -> StoreResult<Reply> {
    read_line(reader, scratch)?;
    let (tag, rest) = match scratch.split_first() {
        Some(split) => split,
        None => return Err(StoreError::Protocol),
    };

    match tag {
        b'+' => Ok(Reply::Simple(rest.to_vec())),
        b'-' => Ok(Reply::Error(rest.to_vec())),
        b':' => Ok(Reply::Integer(parse_int(rest)?)),
        b'$' => {
            let len = parse_int(rest)?;
            read_bulk(reader, len)
        }
        b'*' => {
            let len = parse_int(rest)?;
            read_array(reader, len, scratch)
        }
        _ => Err(StoreError::Protocol),
    }
}

fn read_bulk<R: BufRead>(reader: &mut R, len: i64) -> StoreResult<Reply> {
    if len < 0 {
        return Ok(Reply::Bulk(None));
    }
    let mut data = vec![0u8; len as usize];
    reader.read_exact(&mut data)?;

    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf)?;
    if crlf != *b"\r\n" {
        return Err(StoreError::Protocol);
    }
    Ok(Reply::Bulk(Some(data)))
}

fn read_array<R: BufRead>(reader: &mut R, len: i64, scratch: &mut Vec<u8>) -> StoreResult<Reply> {
    if len <= 0 {
        return Ok(Reply::Array(Vec::new()));
    }
    let mut items = Vec::with_capacity(len as usize);
    for _ in 0..len {
        items.push(read_reply(reader, scratch)?);
    }
    Ok(Reply::Array(items))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> StoreResult<()> {
    buf.clear();
    let read = reader.read_until(b'\n', buf)?;
    if read == 0 {
        // EOF mid-reply means the server hung up on us.
        return Err(StoreError::Protocol);
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(StoreError::Protocol);
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

// Only an optional leading `-` and digits; RESP never frames `+42` or
// whitespace, so anything else is a protocol violation.
fn parse_int(data: &[u8]) -> StoreResult<i64> {
    let (negative, digits) = match data.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, data),
    };
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(StoreError::Protocol);
    }
    let magnitude: i64 = std::str::from_utf8(digits)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(StoreError::Protocol)?;
    Ok(if negative { -magnitude } else { magnitude })
}
