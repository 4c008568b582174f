//! Opportunistic peer discovery
//!
//! Peers announce themselves with a small JSON datagram carrying their name
//! in `f` and a checksum in `c`. While the player idles between pins it
//! drains those announcements and binds each sender's address to the
//! matching registry entry, upgrading later transmissions from broadcast to
//! unicast. Everything here is best-effort: malformed or unverifiable
//! datagrams are dropped with a log line and the play loop never notices.

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::error::NetworkError;
use crate::net::socket::TalkieSocket;
use crate::wire::checksum::checksum;
use crate::wire::message::stamp_payload;

/// Build a checksum-stamped announcement datagram for a peer name.
///
/// The player only consumes announcements, but companion receivers and
/// test rigs need to produce the exact shape the player verifies.
pub fn announcement(peer_name: &str) -> Result<Bytes, serde_json::Error> {
    let mut payload = Map::new();
    payload.insert("f".to_string(), Value::from(peer_name));
    stamp_payload(&mut payload, 0.0)
}

/// Drain ready datagrams and bind any announced peer addresses.
///
/// Returns whether at least one device was resolved this tick.
pub fn discovery_tick(socket: &mut TalkieSocket) -> bool {
    let mut bound_any = false;

    for (sender_ip, bytes) in socket.poll_inbound() {
        let value: Value = match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("discovery: unparseable datagram from {sender_ip}: {e}");
                continue;
            }
        };

        let Some(name) = value.get("f").and_then(Value::as_str) else {
            tracing::debug!("discovery: datagram from {sender_ip} has no peer name");
            continue;
        };

        let Some(id) = socket.registry().id_by_name(name) else {
            continue;
        };
        if socket.registry().get(id).is_resolved() {
            continue;
        }

        let Some(carried) = value.get("c").and_then(Value::as_u64) else {
            tracing::debug!("discovery: announcement from {name} carries no checksum");
            continue;
        };
        let computed = checksum(&bytes);
        if carried != computed as u64 {
            tracing::warn!(
                "discovery: dropping announcement from {name}: {}",
                NetworkError::ChecksumMismatch {
                    carried: carried as u16,
                    computed,
                }
            );
            continue;
        }

        socket.registry_mut().resolve(id, sender_ip);
        tracing::info!("discovery: resolved {name} to {sender_ip}");
        bound_any = true;
    }

    bound_any
}
