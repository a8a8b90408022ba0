//! The textual frame layer: magic, hex length, base64 payload, checksum.
//!
//! Wire syntax (bit-exact):
//!
//! ```text
//! "!CP" ("C" | "D") <hexlen> <base64payload> <hexcrc> "\n"
//! hexlen := 4 uppercase hex digits (short) or 12 (long, protocol 1.1 only)
//! hexcrc := 8 uppercase hex digits (CRC-32/IEEE)
//! ```
//!
//! The long `!CPD` form is chosen only when the base64 payload exceeds 65535
//! octets *and* the link has negotiated protocol 1.1.  Before that, an
//! oversized payload is a hard error — the 1.0 length field is 16 bits and
//! silently truncating it would desynchronize the peer.
//!
//! # Checksum domains
//!
//! The trailing CRC-32 covers either the base64 text or the pre-base64 binary
//! octets, depending on the negotiated binary-checksum capability.  The one
//! exception is the kind-6 handshake packet: it must be verifiable before any
//! negotiation has happened, so its checksum always covers the base64 text.
//!
//! A failed checksum is reported as [`FrameError::ChecksumMismatch`]; callers
//! drop the frame and keep reading — a corrupt frame must never
//! desynchronize the stream.

use thiserror::Error;

use super::base64;
use super::capabilities::Capabilities;
use super::crc::crc32;
use super::messages::PacketKind;

/// Errors from frame encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    /// Payload too large for a 1.0 short frame and 1.1 was not negotiated.
    #[error("payload of {size} base64 octets exceeds the 65535-octet short-frame limit")]
    TooLarge { size: usize },

    /// No `!CPC`/`!CPD` magic anywhere in the input.
    #[error("no frame magic found")]
    MissingMagic,

    /// The frame is structurally broken (bad hex, bad base64, short read).
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The checksum did not verify; the frame should be dropped silently.
    #[error("checksum mismatch: expected {expected:08X}, found {found:08X}")]
    ChecksumMismatch { expected: u32, found: u32 },
}

/// Selects the checksum input for a payload, honoring the kind-6 exception.
fn checksum_for(payload: &[u8], encoded: &str, caps: &Capabilities) -> u32 {
    let is_handshake = payload.first() == Some(&(PacketKind::Handshake as u8));
    if caps.binary_checksum() && !is_handshake {
        crc32(payload)
    } else {
        crc32(encoded.as_bytes())
    }
}

/// Wraps payload octets into a complete textual frame (with trailing newline).
///
/// # Errors
///
/// [`FrameError::TooLarge`] when the base64 payload exceeds 65535 octets and
/// protocol 1.1 has not been negotiated.
pub fn encode_frame(payload: &[u8], caps: &Capabilities) -> Result<Vec<u8>, FrameError> {
    let encoded = base64::encode(payload);
    let long = encoded.len() > 0xFFFF;
    if long && !caps.version_11() {
        return Err(FrameError::TooLarge {
            size: encoded.len(),
        });
    }

    let checksum = checksum_for(payload, &encoded, caps);

    let mut frame = String::with_capacity(encoded.len() + 32);
    if long {
        frame.push_str("!CPD");
        frame.push_str(&format!("{:012X}", encoded.len()));
    } else {
        frame.push_str("!CPC");
        frame.push_str(&format!("{:04X}", encoded.len()));
    }
    frame.push_str(&encoded);
    frame.push_str(&format!("{checksum:08X}"));
    frame.push('\n');
    Ok(frame.into_bytes())
}

/// Unwraps one frame back into payload octets.
///
/// Scans forward to the magic (leading garbage is tolerated), reads the hex
/// length, collects exactly that many payload characters while skipping any
/// stray newlines embedded by line-oriented transports, then verifies the
/// checksum in the negotiated domain.
///
/// # Errors
///
/// [`FrameError::ChecksumMismatch`] must be treated as "drop this frame";
/// the other variants indicate a frame that never parsed at all.
pub fn decode_frame(frame: &[u8], caps: &Capabilities) -> Result<Vec<u8>, FrameError> {
    let text = std::str::from_utf8(frame)
        .map_err(|e| FrameError::Malformed(format!("frame is not UTF-8: {e}")))?;

    let start = text.find("!CP").ok_or(FrameError::MissingMagic)?;
    let after_magic = &text[start + 3..];
    let (len_digits, rest) = match after_magic.as_bytes().first() {
        Some(b'C') => (4usize, &after_magic[1..]),
        Some(b'D') => (12usize, &after_magic[1..]),
        _ => return Err(FrameError::MissingMagic),
    };

    let len_field = rest
        .get(..len_digits)
        .ok_or_else(|| FrameError::Malformed("length field cut short".to_string()))?;
    let payload_len = usize::from_str_radix(len_field, 16)
        .map_err(|e| FrameError::Malformed(format!("bad length field: {e}")))?;

    // Collect the payload window, skipping embedded newlines: long frames are
    // sometimes relayed through line-oriented plumbing that wraps them.
    let mut payload_text = String::with_capacity(payload_len);
    let mut chars = rest[len_digits..].chars();
    while payload_text.len() < payload_len {
        match chars.next() {
            Some('\n') | Some('\r') => continue,
            Some(c) => payload_text.push(c),
            None => {
                return Err(FrameError::Malformed(format!(
                    "payload cut short: expected {payload_len} characters, got {}",
                    payload_text.len()
                )));
            }
        }
    }

    let mut checksum_hex = String::with_capacity(8);
    while checksum_hex.len() < 8 {
        match chars.next() {
            Some('\n') | Some('\r') => continue,
            Some(c) => checksum_hex.push(c),
            None => return Err(FrameError::Malformed("checksum cut short".to_string())),
        }
    }
    let found = u32::from_str_radix(&checksum_hex, 16)
        .map_err(|e| FrameError::Malformed(format!("bad checksum field: {e}")))?;

    let payload = base64::decode(&payload_text)
        .map_err(|e| FrameError::Malformed(format!("bad base64 payload: {e}")))?;

    let expected = checksum_for(&payload, &payload_text, caps);
    if expected != found {
        return Err(FrameError::ChecksumMismatch { expected, found });
    }
    Ok(payload)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn v10() -> Capabilities {
        Capabilities::new()
    }

    fn v11() -> Capabilities {
        let caps = Capabilities::new();
        caps.enable_version_11();
        caps
    }

    #[test]
    fn test_short_frame_shape() {
        // Payload [1, 0, 30, 8] -> base64 "AQAeCA==" (8 chars).
        let caps = v10();
        let frame = encode_frame(&[1, 0, 30, 8], &caps).unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("!CPC0008AQAeCA=="));
        assert!(text.ends_with('\n'));
        // magic(4) + len(4) + payload(8) + crc(8) + newline(1)
        assert_eq!(frame.len(), 25);
    }

    #[test]
    fn test_round_trip_short_frame() {
        let caps = v10();
        let payload = vec![6u8, 0, 0x07, 0x00];
        let frame = encode_frame(&payload, &caps).unwrap();
        assert_eq!(decode_frame(&frame, &caps).unwrap(), payload);
    }

    #[test]
    fn test_oversize_payload_refused_pre_handshake() {
        let caps = v10();
        // 50_000 raw bytes -> ~66_668 base64 octets, over the short limit.
        let payload = vec![0u8; 50_000];
        assert!(matches!(
            encode_frame(&payload, &caps),
            Err(FrameError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_oversize_payload_uses_long_form_after_handshake() {
        let caps = v11();
        let payload = vec![0xABu8; 50_000];
        let frame = encode_frame(&payload, &caps).unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("!CPD"));
        // 12 uppercase hex digits of length follow the magic.
        let len = usize::from_str_radix(&text[4..16], 16).unwrap();
        assert!(len > 0xFFFF);
        assert_eq!(decode_frame(&frame, &caps).unwrap(), payload);
    }

    #[test]
    fn test_small_payload_stays_short_after_handshake() {
        let caps = v11();
        let frame = encode_frame(&[0, 0, 0, 0], &caps).unwrap();
        assert!(frame.starts_with(b"!CPC"));
    }

    #[test]
    fn test_decoder_skips_leading_garbage() {
        let caps = v10();
        let payload = vec![5u8, 0, 0, 0, 0, 0, b'T', 0, b'B', 0];
        let mut frame = b"noise\n".to_vec();
        frame.extend_from_slice(&encode_frame(&payload, &caps).unwrap());
        assert_eq!(decode_frame(&frame, &caps).unwrap(), payload);
    }

    #[test]
    fn test_decoder_tolerates_embedded_newlines() {
        let caps = v10();
        let payload = vec![1u8, 0, 57, 0];
        let frame = encode_frame(&payload, &caps).unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        // Split the base64 window in half with a newline.
        let mid = 8 + 4;
        let wrapped = format!("{}\n{}", &text[..mid], &text[mid..]);
        assert_eq!(decode_frame(wrapped.as_bytes(), &caps).unwrap(), payload);
    }

    #[test]
    fn test_corrupt_frame_reports_checksum_mismatch() {
        let caps = v10();
        let mut frame = encode_frame(&[1, 0, 30, 0], &caps).unwrap();
        // Flip one payload character without touching the checksum.
        frame[9] ^= 0x01;
        assert!(matches!(
            decode_frame(&frame, &caps),
            Err(FrameError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_checksum_domain_follows_binary_flag() {
        let payload = vec![2u8, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0];
        let encoded = super::base64::encode(&payload);

        let text_caps = v11();
        let frame = encode_frame(&payload, &text_caps).unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        let crc_field = u32::from_str_radix(&text[text.len() - 9..text.len() - 1], 16).unwrap();
        assert_eq!(crc_field, crc32(encoded.as_bytes()));

        let bin_caps = v11();
        bin_caps.enable_binary_checksum();
        let frame = encode_frame(&payload, &bin_caps).unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        let crc_field = u32::from_str_radix(&text[text.len() - 9..text.len() - 1], 16).unwrap();
        assert_eq!(crc_field, crc32(&payload));
    }

    #[test]
    fn test_handshake_always_uses_text_domain() {
        let caps = v11();
        caps.enable_binary_checksum();
        let payload = vec![6u8, 0, 0x03, 0x00];
        let encoded = super::base64::encode(&payload);
        let frame = encode_frame(&payload, &caps).unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        let crc_field = u32::from_str_radix(&text[text.len() - 9..text.len() - 1], 16).unwrap();
        assert_eq!(crc_field, crc32(encoded.as_bytes()));
        assert_eq!(decode_frame(&frame, &caps).unwrap(), payload);
    }

    #[test]
    fn test_missing_magic() {
        let caps = v10();
        assert_eq!(
            decode_frame(b"hello world\n", &caps),
            Err(FrameError::MissingMagic)
        );
    }

    #[test]
    fn test_cross_domain_decode_fails_checksum() {
        // A frame encoded in the text domain must not verify on a receiver
        // that has switched to the binary domain (kind-6 frames aside).
        let payload = vec![1u8, 0, 28, 0];
        let text_caps = v10();
        let frame = encode_frame(&payload, &text_caps).unwrap();

        let bin_caps = v11();
        bin_caps.enable_binary_checksum();
        assert!(matches!(
            decode_frame(&frame, &bin_caps),
            Err(FrameError::ChecksumMismatch { .. })
        ));
    }
}
