//! IEEE CRC-32 (reflected, polynomial 0xEDB88320).
//!
//! Dictionary blobs end with this checksum, and the SIMD dispatch table
//! (`crate::simd`) may override `crc32_update` with an accelerated variant.
//! This module is the scalar reference implementation every override must
//! match bit-for-bit.

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0usize;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

static CRC32_TABLE: [u32; 256] = build_table();

/// Fold `data` into a running checksum. `crc` is the finalized value of the
/// previous call (0 for the first), so calls compose:
/// `crc32_update(crc32_update(0, a), b) == crc32(a ++ b)`.
#[inline]
pub fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    let mut c = crc ^ 0xFFFF_FFFF;
    for &b in data {
        c = CRC32_TABLE[((c ^ b as u32) & 0xFF) as usize] ^ (c >> 8);
    }
    c ^ 0xFFFF_FFFF
}

/// One-shot CRC-32 of `data`.
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    crc32_update(0, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference vectors from the zlib crc32() implementation.
    #[test]
    fn known_vectors() {
        assert_eq!(crc32(b""), 0x0000_0000);
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(b"The quick brown fox jumps over the lazy dog"), 0x414F_A339);
    }

    #[test]
    fn streaming_matches_oneshot() {
        let data = b"position-bucketed frequency tables";
        let split = crc32_update(crc32_update(0, &data[..10]), &data[10..]);
        assert_eq!(split, crc32(data));
    }

    #[test]
    fn single_bit_flip_changes_crc() {
        let mut data = [0x42u8; 64];
        let base = crc32(&data);
        data[17] ^= 0x04;
        assert_ne!(crc32(&data), base);
    }
}
