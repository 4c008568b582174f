//! Device registry: logical targets and their resolved endpoints
//!
//! Devices live in an append-only arena owned by the socket. Pins refer to
//! them by `DeviceId`, a stable index that stays valid for the whole run, so
//! the play loop resolves a device's current endpoint at emission time.

use std::collections::HashMap;
use std::net::Ipv4Addr;

/// Stable handle into the registry arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(usize);

/// A device's identity: a peer name or a numeric channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceKey {
    Name(String),
    Channel(u8),
}

/// A logical target and what is known about its endpoint
///
/// The port is fixed at creation. The address transitions from unresolved to
/// a concrete peer address exactly once, when discovery hears the peer
/// announce itself; until then transmissions go to broadcast.
#[derive(Debug)]
pub struct Device {
    key: DeviceKey,
    port: u16,
    addr: Option<Ipv4Addr>,
}

impl Device {
    pub fn key(&self) -> &DeviceKey {
        &self.key
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn addr(&self) -> Option<Ipv4Addr> {
        self.addr
    }

    pub fn is_resolved(&self) -> bool {
        self.addr.is_some()
    }

    /// The device's key as a payload target tag value
    pub fn target_tag(&self) -> serde_json::Value {
        match &self.key {
            DeviceKey::Name(name) => serde_json::Value::from(name.as_str()),
            DeviceKey::Channel(channel) => serde_json::Value::from(*channel),
        }
    }
}

/// Registry of every device the timeline or the network has mentioned
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
    by_name: HashMap<String, DeviceId>,
    by_channel: HashMap<u8, DeviceId>,
    resolved_count: usize,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a name-keyed device, inserting it if this is the first
    /// mention. Returns the handle and whether an insert happened.
    pub fn lookup_or_create_name(&mut self, name: &str, port: u16) -> (DeviceId, bool) {
        if let Some(&id) = self.by_name.get(name) {
            return (id, false);
        }
        let id = self.push(Device {
            key: DeviceKey::Name(name.to_string()),
            port,
            addr: None,
        });
        self.by_name.insert(name.to_string(), id);
        tracing::debug!(name, port, "registered device");
        (id, true)
    }

    /// Look up a channel-keyed device, inserting it if this is the first
    /// mention. Returns the handle and whether an insert happened.
    pub fn lookup_or_create_channel(&mut self, channel: u8, port: u16) -> (DeviceId, bool) {
        if let Some(&id) = self.by_channel.get(&channel) {
            return (id, false);
        }
        let id = self.push(Device {
            key: DeviceKey::Channel(channel),
            port,
            addr: None,
        });
        self.by_channel.insert(channel, id);
        tracing::debug!(channel, port, "registered device");
        (id, true)
    }

    pub fn get(&self, id: DeviceId) -> &Device {
        &self.devices[id.0]
    }

    pub fn id_by_name(&self, name: &str) -> Option<DeviceId> {
        self.by_name.get(name).copied()
    }

    /// Bind a discovered peer address to a device.
    ///
    /// Returns false without touching the entry when the device is already
    /// resolved; an address is learned exactly once.
    pub fn resolve(&mut self, id: DeviceId, addr: Ipv4Addr) -> bool {
        let device = &mut self.devices[id.0];
        if device.addr.is_some() {
            return false;
        }
        device.addr = Some(addr);
        if matches!(device.key, DeviceKey::Name(_)) {
            self.resolved_count += 1;
        }
        true
    }

    /// Number of name-keyed devices with a learned address
    pub fn resolved_count(&self) -> usize {
        self.resolved_count
    }

    /// Whether discovery has nothing left to learn
    pub fn all_names_resolved(&self) -> bool {
        self.resolved_count == self.by_name.len()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    fn push(&mut self, device: Device) -> DeviceId {
        let id = DeviceId(self.devices.len());
        self.devices.push(device);
        id
    }
}
