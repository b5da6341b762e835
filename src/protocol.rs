//! Wire protocol: message shapes (`spec.md` §6) and framing.
//!
//! Per the REDESIGN FLAGS in `spec.md` §9, framing is explicit and
//! length-prefixed rather than relying on one message fitting in a
//! single read: every frame is a 4-byte big-endian length prefix
//! followed by that many bytes of UTF-8 JSON.
use std::{
    collections::BTreeMap,
    io::{Read, Write},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use crate::error::ProtocolError;

/// Ceiling on a single frame's payload size. `spec.md` §4.5/§6 call for
/// a receive ceiling of "at least 1 MiB"; frames larger than this are
/// rejected rather than silently truncated.
pub const MAX_FRAME_BYTES: u32 = 4 * 1024 * 1024;

/// Response to `start`/`stop`/`restart`, and to unknown/malformed
/// commands: a list of human-readable messages, printed one per line
/// by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagesResponse {
    /// Messages to render, in order.
    pub messages: Vec<String>,
}

impl MessagesResponse {
    /// Builds a response carrying a single message.
    pub fn single(message: impl Into<String>) -> Self {
        MessagesResponse {
            messages: vec![message.into()],
        }
    }
}

/// Response to `status`: service name -> status string.
pub type StatusResponse = BTreeMap<String, String>;

/// Either shape of response the daemon can send back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// A `{"messages": [...]}` response.
    Messages(MessagesResponse),
    /// A `{name: status, ...}` response.
    Status(StatusResponse),
}

/// Serializes a value to JSON bytes (no framing).
pub fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(value)?)
}

/// Parses a request payload as a generic JSON value, for the
/// dispatcher to inspect (it needs to distinguish "missing `command`
/// key" from "unknown `command` value", which a strongly-typed struct
/// would conflate).
pub fn decode_value(bytes: &[u8]) -> Result<Value, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Deserializes a JSON payload into `T`.
pub fn decode_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Prepends a 4-byte big-endian length prefix to `payload`.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Writes a length-prefixed frame to `writer`.
pub fn write_framed<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), ProtocolError> {
    writer.write_all(&frame(payload))?;
    writer.flush()?;
    Ok(())
}

/// Blocks until a complete length-prefixed frame has been read from
/// `reader`, returning its payload. Used by the client, which performs
/// one synchronous request/response round-trip per connection.
pub fn read_framed<R: Read>(reader: &mut R, max_len: u32) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > max_len {
        return Err(ProtocolError::FrameTooLarge { got: len, max: max_len });
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

/// Attempts to extract one complete frame from the front of `buf`,
/// used by the non-blocking event loop to incrementally assemble
/// frames out of whatever bytes a single `recv` happened to return.
///
/// Returns `Ok(None)` if `buf` does not yet contain a full frame.
/// Drains the consumed bytes from `buf` on success.
pub fn try_take_frame(buf: &mut Vec<u8>, max_len: u32) -> Result<Option<Vec<u8>>, ProtocolError> {
    if buf.len() < 4 {
        return Ok(None);
    }

    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if len > max_len {
        return Err(ProtocolError::FrameTooLarge { got: len, max: max_len });
    }

    let total = 4 + len as usize;
    if buf.len() < total {
        return Ok(None);
    }

    let payload = buf[4..total].to_vec();
    buf.drain(0..total);
    Ok(Some(payload))
}
