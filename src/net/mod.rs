//! Network subsystem: shared UDP socket, device registry, peer discovery

pub mod discovery;
pub mod registry;
pub mod socket;

pub use discovery::{announcement, discovery_tick};
pub use registry::{Device, DeviceId, DeviceKey, DeviceRegistry};
pub use socket::TalkieSocket;
