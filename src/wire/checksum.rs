//! 16-bit XOR checksum over the canonical payload text
//!
//! The checksum is carried inside the payload it protects, so both ends
//! compute it over a derived byte sequence in which the value of the `c`
//! field is masked down to a single ASCII `0`. The masking is a byte-level
//! scan of the encoded text rather than a re-encode: a receiver must be able
//! to verify a datagram exactly as it arrived, even when its own encoder
//! would have produced a different byte shape.

use std::borrow::Cow;

/// The byte pattern that introduces the checksum field in encoded text.
const C_FIELD: &[u8] = b"\"c\":";

/// Produce the derived byte sequence with the `c` field value masked.
///
/// Locates the first `"c":` occurrence; if the byte immediately after the
/// colon starts a run of ASCII digits, the entire run is replaced with a
/// single `0`. At most one masking occurs; all other bytes pass through.
/// Returns a borrowed slice when nothing needed masking.
pub fn mask_checksum_field(bytes: &[u8]) -> Cow<'_, [u8]> {
    let Some(at) = find(bytes, C_FIELD) else {
        return Cow::Borrowed(bytes);
    };

    let run_start = at + C_FIELD.len();
    let run_end = bytes[run_start..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map(|n| run_start + n)
        .unwrap_or(bytes.len());

    if run_end == run_start {
        // No digits after the colon, nothing to mask.
        return Cow::Borrowed(bytes);
    }

    let mut masked = Vec::with_capacity(bytes.len() - (run_end - run_start) + 1);
    masked.extend_from_slice(&bytes[..run_start]);
    masked.push(b'0');
    masked.extend_from_slice(&bytes[run_end..]);
    Cow::Owned(masked)
}

/// Compute the 16-bit checksum of an encoded payload.
///
/// The masked sequence is folded as big-endian 16-bit chunks (a trailing odd
/// byte contributes as a high byte with a zero low byte), all XORed into an
/// accumulator initialised to 0.
pub fn checksum(bytes: &[u8]) -> u16 {
    fold(&mask_checksum_field(bytes))
}

fn fold(bytes: &[u8]) -> u16 {
    let mut acc: u16 = 0;
    for chunk in bytes.chunks(2) {
        let hi = (chunk[0] as u16) << 8;
        let lo = if chunk.len() == 2 { chunk[1] as u16 } else { 0 };
        acc ^= hi | lo;
    }
    acc
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_pairs() {
        assert_eq!(checksum(b""), 0);
        assert_eq!(checksum(b"AB"), 0x4142);
        assert_eq!(checksum(b"ABAB"), 0);
    }

    #[test]
    fn test_fold_trailing_odd_byte() {
        // Final odd byte is the high byte of a chunk with a zero low byte
        assert_eq!(checksum(b"ABC"), 0x4142 ^ 0x4300);
    }

    #[test]
    fn test_mask_replaces_digit_run() {
        let masked = mask_checksum_field(br#"{"c":12345,"t":"A"}"#);
        assert_eq!(masked.as_ref(), br#"{"c":0,"t":"A"}"#);
    }

    #[test]
    fn test_mask_single_zero_unchanged_shape() {
        let masked = mask_checksum_field(br#"{"c":0,"t":"A"}"#);
        assert_eq!(masked.as_ref(), br#"{"c":0,"t":"A"}"#);
    }

    #[test]
    fn test_mask_without_c_field_passes_through() {
        let text: &[u8] = br#"{"t":"A","v":1}"#;
        assert!(matches!(mask_checksum_field(text), Cow::Borrowed(_)));
    }

    #[test]
    fn test_mask_non_numeric_value_passes_through() {
        let text: &[u8] = br#"{"c":"xyz"}"#;
        assert!(matches!(mask_checksum_field(text), Cow::Borrowed(_)));
    }

    #[test]
    fn test_mask_only_first_occurrence() {
        let masked = mask_checksum_field(br#"{"c":42,"n":"x","c":99}"#);
        assert_eq!(masked.as_ref(), br#"{"c":0,"n":"x","c":99}"#);
    }

    #[test]
    fn test_known_payload_vector() {
        // {"c":0} folds as 7B22 ^ 6322 ^ 3A30 ^ 7D00
        assert_eq!(checksum(br#"{"c":0}"#), 0x5F30);
    }

    #[test]
    fn test_checksum_independent_of_carried_value() {
        // The whole point of the masking: a payload checksums identically
        // whether it carries c=0 or its real checksum digits.
        let zeroed = br#"{"c":0,"i":7,"t":"A"}"#;
        let stamped = br#"{"c":54321,"i":7,"t":"A"}"#;
        assert_eq!(checksum(zeroed), checksum(stamped));
    }
}
