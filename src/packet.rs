//! Wire format: the 256-entry packet-type table and both header layouts.
//!
//! Compact packets spend 1–3 bytes of framing: a type code, then an optional
//! size field (`original_size − 1`, one byte or two little-endian bytes).
//! The code alone determines the algorithm, the pre-filter chain, the table
//! bucket, and the width of the size field, so nothing else travels on the
//! wire. Legacy packets use a fixed 8-byte header for interoperability with
//! deployments that still negotiate model ids per packet.
//!
//! Code map:
//!
//! ```text
//! 0x00        passthrough (size derived from the frame length)
//! 0x01-0x04   rle   {short, long} × {plain, delta1}
//! 0x05-0x08   lz77  {short, long} × {plain, delta1}
//! 0x09-0x0C   lz77x {short, long} × {plain, delta1}
//! 0x10-0x6F   tans12: bucket × {plain, delta1, bigram, bigram+delta1,
//!                               delta2, bigram+delta2}
//! 0x70-0x8F   lzp → tans12 unigram: bucket × {plain, delta1}
//! 0x90-0xAF   lzp → tans12 bigram:  bucket × {plain, delta1}
//! 0xB0-0xCF   tans10 unigram: bucket × {plain, delta1}
//! 0xD0-0xD3   pctx bigram × {plain, delta1, delta2, lzp}
//! 0xFF        sentinel (never emitted); everything else reserved
//! ```

use crate::bucket::{bucket, LAST_SHORT_BUCKET};
use crate::error::{PktcError, Result};
use crate::MAX_PAYLOAD;

// ─────────────────────────────────────────────────────────────────────────────
// Packet-type decode table
// ─────────────────────────────────────────────────────────────────────────────

/// Entropy/coding stage selected by a packet-type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Passthrough,
    Rle,
    Lz77,
    Lz77x,
    Tans12,
    Tans10,
    Pctx,
}

/// Width of the `original_size` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeMode {
    /// No size field (passthrough derives the size from the frame length).
    None,
    /// One byte holding `original_size − 1`.
    Short,
    /// Two little-endian bytes holding `original_size − 1`.
    Long,
}

/// Decoded meaning of one packet-type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub algo: Algorithm,
    /// Inter-packet delta order applied before coding (0, 1 or 2).
    pub delta: u8,
    /// Conditional (bigram-class) tables instead of plain unigram tables.
    pub bigram: bool,
    /// LZP XOR pre-filter applied after the delta stage.
    pub lzp: bool,
    /// Table bucket hint for the bucket-hinted tANS codes.
    pub bucket: u8,
    pub size_mode: SizeMode,
}

#[inline]
fn bucket_size_mode(bucket: u8) -> SizeMode {
    if bucket <= LAST_SHORT_BUCKET {
        SizeMode::Short
    } else {
        SizeMode::Long
    }
}

/// Decode a packet-type code. Reserved codes (including the 0xFF sentinel)
/// return `None`.
pub fn decode_type(code: u8) -> Option<TypeInfo> {
    match code {
        0x00 => Some(TypeInfo {
            algo: Algorithm::Passthrough,
            delta: 0,
            bigram: false,
            lzp: false,
            bucket: 0,
            size_mode: SizeMode::None,
        }),
        0x01..=0x0C => {
            let t = (code - 0x01) as usize;
            let algo = [Algorithm::Rle, Algorithm::Lz77, Algorithm::Lz77x][t / 4];
            let v = t % 4;
            Some(TypeInfo {
                algo,
                delta: if v >= 2 { 1 } else { 0 },
                bigram: false,
                lzp: false,
                bucket: 0,
                size_mode: if v % 2 == 0 { SizeMode::Short } else { SizeMode::Long },
            })
        }
        0x10..=0x6F => {
            let t = (code - 0x10) as usize;
            let bucket = (t / 6) as u8;
            let (delta, bigram) = match t % 6 {
                0 => (0, false),
                1 => (1, false),
                2 => (0, true),
                3 => (1, true),
                4 => (2, false),
                _ => (2, true),
            };
            Some(TypeInfo {
                algo: Algorithm::Tans12,
                delta,
                bigram,
                lzp: false,
                bucket,
                size_mode: bucket_size_mode(bucket),
            })
        }
        0x70..=0xAF => {
            let t = (code - 0x70) as usize;
            let bigram = t >= 32;
            let t = t % 32;
            let bucket = (t / 2) as u8;
            Some(TypeInfo {
                algo: Algorithm::Tans12,
                delta: (t % 2) as u8,
                bigram,
                lzp: true,
                bucket,
                size_mode: bucket_size_mode(bucket),
            })
        }
        0xB0..=0xCF => {
            let t = (code - 0xB0) as usize;
            let bucket = (t / 2) as u8;
            Some(TypeInfo {
                algo: Algorithm::Tans10,
                delta: (t % 2) as u8,
                bigram: false,
                lzp: false,
                bucket,
                size_mode: bucket_size_mode(bucket),
            })
        }
        0xD0..=0xD3 => {
            let (delta, lzp) = match code - 0xD0 {
                0 => (0, false),
                1 => (1, false),
                2 => (2, false),
                _ => (0, true),
            };
            Some(TypeInfo {
                algo: Algorithm::Pctx,
                delta,
                bigram: true,
                lzp,
                bucket: 0,
                size_mode: SizeMode::Long,
            })
        }
        _ => None,
    }
}

/// Inverse of [`decode_type`] for the codes the encoder emits.
pub fn encode_type(info: &TypeInfo) -> u8 {
    match info.algo {
        Algorithm::Passthrough => 0x00,
        Algorithm::Rle | Algorithm::Lz77 | Algorithm::Lz77x => {
            let base = match info.algo {
                Algorithm::Rle => 0x01,
                Algorithm::Lz77 => 0x05,
                _ => 0x09,
            };
            let long = matches!(info.size_mode, SizeMode::Long) as u8;
            base + 2 * info.delta + long
        }
        Algorithm::Tans12 if info.lzp => {
            let base = if info.bigram { 0x90 } else { 0x70 };
            base + info.bucket * 2 + info.delta
        }
        Algorithm::Tans12 => {
            let v = match (info.delta, info.bigram) {
                (0, false) => 0,
                (1, false) => 1,
                (0, true) => 2,
                (1, true) => 3,
                (2, false) => 4,
                _ => 5,
            };
            0x10 + info.bucket * 6 + v
        }
        Algorithm::Tans10 => 0xB0 + info.bucket * 2 + info.delta,
        Algorithm::Pctx => {
            0xD0 + if info.lzp { 3 } else { info.delta }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compact header
// ─────────────────────────────────────────────────────────────────────────────

/// Framing bytes the compact header spends for a given code.
#[inline]
pub fn compact_header_len(size_mode: SizeMode) -> usize {
    match size_mode {
        SizeMode::None => 1,
        SizeMode::Short => 2,
        SizeMode::Long => 3,
    }
}

/// Parsed header plus the offset of the algorithm payload within the frame.
#[derive(Debug, Clone, Copy)]
pub struct ParsedHeader {
    pub code: u8,
    pub info: TypeInfo,
    pub original_size: usize,
    pub payload_start: usize,
}

/// Write a compact header; the caller has already sized `dst`.
pub fn write_compact(dst: &mut [u8], code: u8, info: &TypeInfo, original_size: usize) -> usize {
    dst[0] = code;
    match info.size_mode {
        SizeMode::None => 1,
        SizeMode::Short => {
            dst[1] = (original_size - 1) as u8;
            2
        }
        SizeMode::Long => {
            dst[1..3].copy_from_slice(&((original_size - 1) as u16).to_le_bytes());
            3
        }
    }
}

/// Parse and validate a compact header.
pub fn parse_compact(src: &[u8]) -> Result<ParsedHeader> {
    let code = *src.first().ok_or(PktcError::Corrupt)?;
    let info = decode_type(code).ok_or(PktcError::Corrupt)?;
    let header_len = compact_header_len(info.size_mode);
    if src.len() < header_len {
        return Err(PktcError::Corrupt);
    }
    let original_size = match info.size_mode {
        SizeMode::None => src.len() - 1,
        SizeMode::Short => src[1] as usize + 1,
        SizeMode::Long => u16::from_le_bytes([src[1], src[2]]) as usize + 1,
    };
    if original_size == 0 || original_size > MAX_PAYLOAD {
        return Err(PktcError::Corrupt);
    }
    // Bucket-hinted codes must agree with the size they frame.
    if uses_bucket_hint(&info) && bucket(original_size - 1) != info.bucket as usize {
        return Err(PktcError::Corrupt);
    }
    Ok(ParsedHeader { code, info, original_size, payload_start: header_len })
}

#[inline]
fn uses_bucket_hint(info: &TypeInfo) -> bool {
    matches!(info.algo, Algorithm::Tans12 | Algorithm::Tans10)
}

// ─────────────────────────────────────────────────────────────────────────────
// Legacy header
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed size of the legacy header.
pub const LEGACY_HEADER_LEN: usize = 8;

/// Write the 8-byte legacy header:
/// `original_size u16 | compressed_size u16 | flags | algorithm | model_id | seq`.
pub fn write_legacy(
    dst: &mut [u8],
    code: u8,
    original_size: usize,
    payload_len: usize,
    model_id: u8,
    seq: u8,
) {
    dst[0..2].copy_from_slice(&(original_size as u16).to_le_bytes());
    dst[2..4].copy_from_slice(&(payload_len as u16).to_le_bytes());
    dst[4] = 0; // reserved flags
    dst[5] = code;
    dst[6] = model_id;
    dst[7] = seq;
}

/// Parsed legacy header fields the dispatcher still has to cross-check.
#[derive(Debug, Clone, Copy)]
pub struct LegacyHeader {
    pub parsed: ParsedHeader,
    pub model_id: u8,
    pub seq: u8,
}

/// Parse and validate a legacy header against the frame length.
pub fn parse_legacy(src: &[u8]) -> Result<LegacyHeader> {
    if src.len() < LEGACY_HEADER_LEN {
        return Err(PktcError::Corrupt);
    }
    let original_size = u16::from_le_bytes([src[0], src[1]]) as usize;
    let payload_len = u16::from_le_bytes([src[2], src[3]]) as usize;
    let code = src[5];
    let info = decode_type(code).ok_or(PktcError::Corrupt)?;
    if original_size == 0 {
        return Err(PktcError::Corrupt);
    }
    if payload_len != src.len() - LEGACY_HEADER_LEN {
        return Err(PktcError::Corrupt);
    }
    if info.algo == Algorithm::Passthrough && payload_len != original_size {
        return Err(PktcError::Corrupt);
    }
    if uses_bucket_hint(&info) && bucket(original_size - 1) != info.bucket as usize {
        return Err(PktcError::Corrupt);
    }
    Ok(LegacyHeader {
        parsed: ParsedHeader {
            code,
            info,
            original_size,
            payload_start: LEGACY_HEADER_LEN,
        },
        model_id: src[6],
        seq: src[7],
    })
}

/// Pick the bucket-hinted code components for a payload size.
#[inline]
pub fn size_bucket(original_size: usize) -> (u8, SizeMode) {
    let b = bucket(original_size - 1) as u8;
    (b, bucket_size_mode(b))
}

/// Size mode of the mini-coder codes for a payload size.
#[inline]
pub fn mini_size_mode(original_size: usize) -> SizeMode {
    if original_size <= 256 {
        SizeMode::Short
    } else {
        SizeMode::Long
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::NUM_BUCKETS;

    #[test]
    fn every_code_decodes_consistently() {
        let mut known = 0;
        for code in 0..=255u8 {
            if let Some(info) = decode_type(code) {
                known += 1;
                assert_eq!(encode_type(&info), code, "code {code:#04x} not a fixed point");
                assert!((info.bucket as usize) < NUM_BUCKETS);
                assert!(info.delta <= 2);
            }
        }
        // 1 passthrough + 12 mini + 96 tans12 + 64 lzp + 32 tans10 + 4 pctx.
        assert_eq!(known, 209);
    }

    #[test]
    fn sentinel_and_reserved_codes_are_unknown() {
        assert!(decode_type(0xFF).is_none());
        assert!(decode_type(0x0D).is_none());
        assert!(decode_type(0x0F).is_none());
        assert!(decode_type(0xD4).is_none());
        assert!(decode_type(0xFE).is_none());
    }

    #[test]
    fn compact_roundtrip_all_size_modes() {
        for (size, code) in [(1usize, 0x10u8), (256, 0x10 + 13 * 6), (257, 0x10 + 14 * 6), (65_535, 0x10 + 15 * 6)] {
            let info = decode_type(code).unwrap();
            let (b, mode) = size_bucket(size);
            assert_eq!(b, info.bucket);
            assert_eq!(mode, info.size_mode);

            let mut frame = vec![0u8; 8];
            let hl = write_compact(&mut frame, code, &info, size);
            assert_eq!(hl, compact_header_len(info.size_mode));
            // Frame must extend past the header for the parse to accept it.
            let parsed = parse_compact(&frame[..hl.max(3)]).unwrap();
            assert_eq!(parsed.original_size, size);
            assert_eq!(parsed.code, code);
        }
    }

    #[test]
    fn passthrough_size_comes_from_frame_length() {
        let mut frame = vec![0u8; 129];
        frame[0] = 0x00;
        let parsed = parse_compact(&frame).unwrap();
        assert_eq!(parsed.original_size, 128);
        assert_eq!(parsed.payload_start, 1);
    }

    #[test]
    fn bucket_hint_mismatch_is_corrupt() {
        // Code for bucket 0 (size 1) framing a size-9 packet.
        let frame = [0x10u8, 8u8];
        assert_eq!(parse_compact(&frame).err(), Some(PktcError::Corrupt));
    }

    #[test]
    fn legacy_roundtrip_and_length_check() {
        let mut frame = vec![0u8; LEGACY_HEADER_LEN + 10];
        write_legacy(&mut frame, 0x01, 40, 10, 7, 3);
        let h = parse_legacy(&frame).unwrap();
        assert_eq!(h.parsed.original_size, 40);
        assert_eq!(h.model_id, 7);
        assert_eq!(h.seq, 3);

        // Truncate the frame: declared payload length no longer matches.
        assert_eq!(parse_legacy(&frame[..frame.len() - 1]).err(), Some(PktcError::Corrupt));
    }

    #[test]
    fn legacy_passthrough_sizes_must_agree() {
        let mut frame = vec![0u8; LEGACY_HEADER_LEN + 10];
        write_legacy(&mut frame, 0x00, 40, 10, 1, 0);
        assert_eq!(parse_legacy(&frame).err(), Some(PktcError::Corrupt));
    }
}
