//! Error types for the talkie player engine

use thiserror::Error;

/// Main error type for the engine
///
/// Only socket initialisation aborts a run; every other failure is logged
/// and converted into a counter or a dropped datagram before it can cross
/// the engine boundary. Ingestion failures in particular never propagate,
/// so [`IngestError`] exists purely as diagnostic vocabulary.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
}

/// Network subsystem errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Socket init failed: {0}")]
    InitFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Checksum mismatch: carried {carried:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { carried: u16, computed: u16 },
}

/// Timeline ingestion errors
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not a playable file: {0}")]
    WrongFileType(String),

    #[error("Entry rejected: {0}")]
    Rejected(String),
}

/// Result type alias for the engine
pub type Result<T> = std::result::Result<T, Error>;
