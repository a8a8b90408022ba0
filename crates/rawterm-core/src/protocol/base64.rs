//! Base64 wrappers tuned for the raw-mode frame payload.
//!
//! Encoding always produces the standard alphabet (`A-Z a-z 0-9 + /`) with
//! `=` padding.  Decoding is deliberately lenient: some historical encoders
//! drop the final 6-bit component of a two-byte trailing group, producing a
//! last quartet of two or three characters with non-canonical trailing bits.
//! The engine below accepts both, and accepts missing padding.

use base64::alphabet;
use base64::engine::general_purpose::GeneralPurpose;
use base64::engine::{DecodePaddingMode, GeneralPurposeConfig};
use base64::Engine as _;

pub use base64::DecodeError;

/// Engine shared by [`encode`] and [`decode`].
const ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encodes raw bytes to standard padded base64 text.
pub fn encode(data: &[u8]) -> String {
    ENGINE.encode(data)
}

/// Decodes base64 text to raw bytes, tolerating missing padding and
/// non-canonical trailing bits.
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    ENGINE.decode(text)
}
