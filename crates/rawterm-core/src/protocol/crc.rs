//! CRC-32 (IEEE 802.3) checksum used by the frame layer.
//!
//! # What is this checksum for? (for beginners)
//!
//! Every raw-mode frame ends in an 8-hex-digit checksum so that a receiver can
//! detect corruption introduced by the transport.  The algorithm is the same
//! CRC-32 used by Ethernet, gzip, and PNG: polynomial `0xEDB88320` (the
//! bit-reflected form of `0x04C11DB7`), initial value `0xFFFFFFFF`, and a
//! final XOR with `0xFFFFFFFF`.
//!
//! The classic implementation precomputes a 256-entry lookup table so that the
//! inner loop processes one *byte* per step instead of one *bit*.  Rust lets
//! us build that table at compile time with a `const fn`, so there is no
//! lazy-init state and no runtime cost on first use.

/// 256-entry lookup table, one entry per possible input byte.
static CRC_TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Computes the CRC-32/IEEE checksum of `data`.
///
/// # Examples
///
/// ```rust
/// use rawterm_core::protocol::crc::crc32;
///
/// // The standard check value for CRC-32/IEEE.
/// assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
/// ```
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        let index = ((crc ^ byte as u32) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC_TABLE[index];
    }
    crc ^ 0xFFFF_FFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_reference_value() {
        // "123456789" is the canonical check input for every CRC variant;
        // CRC-32/IEEE must produce 0xCBF43926.
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_crc32_empty_input() {
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn test_crc32_single_byte() {
        // Independently computed with the gzip implementation.
        assert_eq!(crc32(b"a"), 0xE8B7_BE43);
    }

    #[test]
    fn test_crc32_differs_on_corruption() {
        let clean = crc32(b"The quick brown fox");
        let flipped = crc32(b"The quick brown fox\x01");
        assert_ne!(clean, flipped);
    }

    #[test]
    fn test_crc32_table_first_entries() {
        // Spot-check the generated table against well-known values.
        assert_eq!(CRC_TABLE[0], 0x0000_0000);
        assert_eq!(CRC_TABLE[1], 0x7707_3096);
        assert_eq!(CRC_TABLE[255], 0x2D02_EF8D);
    }
}
