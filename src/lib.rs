//! # JSON Talkie Player
//!
//! Plays a pre-composed timeline of symbolic control messages ("talkie
//! messages") to networked receiver devices over UDP, hitting each scheduled
//! wall-clock instant with sub-millisecond accuracy.
//!
//! ## Architecture Overview
//!
//! ```text
//!   timeline JSON
//!        │
//!        ▼
//!  ┌─────────────┐     ┌──────────────────────────────────────────┐
//!  │   ingest    │────▶│             play list (pins)             │
//!  │ (validate,  │     │  (time_ms, device, checksummed payload)  │
//!  │  stamp i/c) │     └──────────────────┬───────────────────────┘
//!  └──────┬──────┘                        │ stable time sort
//!         │ creates devices               ▼
//!         │                 ┌──────────────────────────┐
//!         ▼                 │          player          │
//!  ┌─────────────┐          │  sleep → emit → measure  │
//!  │  registry   │◀────────▶│  delay → accumulate drag │
//!  │ name/channel│  resolve └────────────┬─────────────┘
//!  └──────▲──────┘                       │ UDP datagrams
//!         │ bind sender IP               ▼
//!  ┌──────┴──────┐          ┌──────────────────────────┐
//!  │  discovery  │◀─────────│  shared UDP socket :5005 │
//!  │ (idle pump) │  inbound │  broadcast + unicast     │
//!  └─────────────┘          └──────────────────────────┘
//! ```
//!
//! The engine is entirely single-threaded and cooperative: one logical task
//! interleaves precise timing, transmission, and opportunistic peer
//! discovery. Devices start out unresolved (transmissions go to broadcast)
//! and switch to unicast once a peer's announcement is heard during a sleep
//! window.

pub mod error;
pub mod ingest;
pub mod net;
pub mod player;
pub mod wire;

pub use error::{Error, IngestError, NetworkError, Result};
pub use net::{Device, DeviceId, DeviceKey, DeviceRegistry, TalkieSocket};
pub use player::{play_list, PlayReport, Player};
pub use wire::MessageKind;

/// Application-wide constants
pub mod constants {
    /// File type tag every playable timeline file must carry
    pub const FILE_TYPE: &str = "Json Midi Player";

    /// Project URL tag every playable timeline file must carry
    pub const FILE_URL: &str = "https://github.com/ruiseixasm/JsonMidiPlayer";

    /// Local UDP port the shared socket binds to
    pub const LOCAL_PORT: u16 = 5005;

    /// Maximum UDP payload size in bytes (receive buffers add a terminator)
    pub const MAX_DATAGRAM_SIZE: usize = 1023;

    /// Per-pin jitter tolerance: one 24-PPQ tick at 120 BPM, in milliseconds.
    /// Delays above this accumulate as drag and push later targets forward.
    pub const DRAG_THRESHOLD_MS: f64 = 1000.0 / ((120.0 / 60.0) * 24.0);

    /// Slice width for the coarse phase of the hybrid sleep, in microseconds
    pub const SLEEP_SLICE_US: u64 = 100;

    /// Remaining-time window below which the timer busy-waits, in microseconds
    pub const BUSY_WAIT_WINDOW_US: u64 = 1000;

    /// Crate version, reported by the CLI and the verbose banner
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}
