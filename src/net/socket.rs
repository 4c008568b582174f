//! Shared UDP socket for all device traffic
//!
//! One socket carries everything: broadcast transmissions to unresolved
//! devices, unicast transmissions to resolved ones, and the inbound
//! announcements discovery feeds on. The socket never blocks the player
//! loop; sends are fire-and-forget and receives drain whatever is ready.

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use crate::constants::{LOCAL_PORT, MAX_DATAGRAM_SIZE};
use crate::error::NetworkError;
use crate::net::registry::{DeviceId, DeviceRegistry};

/// The shared socket plus the device registry it owns
pub struct TalkieSocket {
    socket: UdpSocket,
    registry: DeviceRegistry,
}

impl TalkieSocket {
    /// Create the shared socket on the well-known local port.
    ///
    /// Binds `0.0.0.0:5005`, enables broadcast and switches to non-blocking
    /// mode. Any failure tears down the partial state and is fatal to the
    /// engine.
    pub fn initialise() -> Result<Self, NetworkError> {
        Self::bind_to(LOCAL_PORT)
    }

    /// Bind to an explicit port (0 for an ephemeral one, used by tests).
    pub(crate) fn bind_to(port: u16) -> Result<Self, NetworkError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
            .map_err(|e| NetworkError::InitFailed(format!("bind 0.0.0.0:{port}: {e}")))?;
        socket
            .set_broadcast(true)
            .map_err(|e| NetworkError::InitFailed(format!("enable broadcast: {e}")))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| NetworkError::InitFailed(format!("set non-blocking: {e}")))?;

        tracing::info!(port = %socket.local_addr().map(|a| a.port()).unwrap_or(port),
            "talkie socket ready");
        Ok(Self {
            socket,
            registry: DeviceRegistry::new(),
        })
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut DeviceRegistry {
        &mut self.registry
    }

    /// Actual bound port (differs from the constant for test sockets)
    pub fn local_port(&self) -> Option<u16> {
        self.socket.local_addr().ok().map(|addr| addr.port())
    }

    /// Best-effort datagram to a specific peer. Transport errors are logged
    /// and swallowed.
    pub fn send_unicast(&self, ip: Ipv4Addr, port: u16, bytes: &[u8]) {
        if let Err(e) = self.socket.send_to(bytes, (ip, port)) {
            let failed = NetworkError::SendFailed(format!("unicast to {ip}:{port}: {e}"));
            tracing::warn!("{failed}");
        }
    }

    /// Best-effort datagram to the broadcast address. Transport errors are
    /// logged and swallowed.
    pub fn send_broadcast(&self, port: u16, bytes: &[u8]) {
        if let Err(e) = self.socket.send_to(bytes, (Ipv4Addr::BROADCAST, port)) {
            let failed = NetworkError::SendFailed(format!("broadcast to port {port}: {e}"));
            tracing::warn!("{failed}");
        }
    }

    /// Transmit to a device: unicast when its address is known, broadcast on
    /// its port otherwise.
    pub fn send_to_device(&self, id: DeviceId, bytes: &[u8]) {
        let device = self.registry.get(id);
        match device.addr() {
            Some(ip) => self.send_unicast(ip, device.port(), bytes),
            None => self.send_broadcast(device.port(), bytes),
        }
    }

    /// Drain every datagram that is immediately available.
    ///
    /// Non-blocking reads until the socket would block. Datagrams from IPv6
    /// senders are skipped; the discovery protocol speaks IPv4.
    pub fn poll_inbound(&self) -> Vec<(Ipv4Addr, Vec<u8>)> {
        let mut inbound = Vec::new();
        let mut buf = [0u8; MAX_DATAGRAM_SIZE + 1];

        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((len, sender)) => match sender.ip() {
                    IpAddr::V4(ip) => inbound.push((ip, buf[..len].to_vec())),
                    IpAddr::V6(ip) => {
                        tracing::debug!("ignoring datagram from IPv6 sender {ip}");
                    }
                },
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::warn!("receive failed: {e}");
                    break;
                }
            }
        }
        inbound
    }
}
