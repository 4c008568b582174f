//! Wire codec for talkie messages

pub mod checksum;
pub mod message;

pub use checksum::{checksum, mask_checksum_field};
pub use message::{encode_payload, stamp_payload, tempo_set_message, MessageKind};
