//! Talkie message payloads and their canonical encoding
//!
//! A payload is an open JSON map; the fields the engine touches are the
//! target tag `t`, the message kind `m`, the message id `i` and the checksum
//! `c`. The canonical encoding is the compact `serde_json` text of the map;
//! keys come out in sorted order, so the same logical payload always encodes
//! to the same bytes.

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::wire::checksum::checksum;

/// Message kinds carried in the `m` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Talk = 0,
    List = 1,
    Run = 2,
    Set = 3,
    Get = 4,
    Sys = 5,
    Echo = 6,
    Error = 7,
    Channel = 8,
}

impl MessageKind {
    /// Map a numeric `m` field to a kind
    pub fn from_u64(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::Talk),
            1 => Some(Self::List),
            2 => Some(Self::Run),
            3 => Some(Self::Set),
            4 => Some(Self::Get),
            5 => Some(Self::Sys),
            6 => Some(Self::Echo),
            7 => Some(Self::Error),
            8 => Some(Self::Channel),
            _ => None,
        }
    }

    /// Numeric wire value for the `m` field
    pub fn as_u64(self) -> u64 {
        self as u64
    }
}

/// Encode a payload map to its canonical compact JSON bytes.
pub fn encode_payload(payload: &Map<String, Value>) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(payload).map(Bytes::from)
}

/// Stamp a payload with its message id and checksum, returning the final
/// wire bytes.
///
/// The id `i` is the scheduled time truncated to a 32-bit integer; `c` is
/// first zeroed, the canonical text checksummed, and the real value written
/// back. Because checksum computation masks the `c` digits, re-checksumming
/// the stamped text yields the carried value again.
pub fn stamp_payload(
    payload: &mut Map<String, Value>,
    time_ms: f64,
) -> Result<Bytes, serde_json::Error> {
    payload.insert("i".to_string(), Value::from(time_ms.trunc() as u32));
    payload.insert("c".to_string(), Value::from(0u32));

    let zeroed = serde_json::to_vec(payload)?;
    let sum = checksum(&zeroed);

    payload.insert("c".to_string(), Value::from(sum));
    encode_payload(payload)
}

/// Build a stamped `set` message carrying one tempo property.
///
/// Sent to a device right after its creation so the peer learns the score's
/// tempo before any timed message arrives.
pub fn tempo_set_message(
    target: Value,
    property: &str,
    value: i64,
) -> Result<Bytes, serde_json::Error> {
    let mut payload = Map::new();
    payload.insert("t".to_string(), target);
    payload.insert("m".to_string(), Value::from(MessageKind::Set.as_u64()));
    payload.insert("n".to_string(), Value::from(property));
    payload.insert("v".to_string(), Value::from(value));
    stamp_payload(&mut payload, 0.0)
}
