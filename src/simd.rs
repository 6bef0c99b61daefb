//! Dispatch table for the accelerable helpers.
//!
//! CPU-feature detection lives outside the core: an embedder may register a
//! table of accelerated helpers at context creation, and the core calls
//! through the table without knowing what instruction set backs it. Every
//! override must produce output identical to the scalar reference set in
//! this module; the core itself only ships the reference set.

use crate::crc32;
use crate::delta;
use crate::freq;

// ─────────────────────────────────────────────────────────────────────────────
// Levels
// ─────────────────────────────────────────────────────────────────────────────

/// Requested (or resolved) acceleration tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SimdLevel {
    /// Use the embedder-registered table when present, else generic.
    #[default]
    Auto = 0,
    /// Scalar reference implementations.
    Generic = 1,
    Sse42 = 2,
    Avx2 = 3,
    Neon = 4,
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatch table
// ─────────────────────────────────────────────────────────────────────────────

/// Function table consumed by contexts. Fixed at context creation.
#[derive(Debug, Clone, Copy)]
pub struct SimdOps {
    /// Accumulate byte counts of a slice (adds into `counts`).
    pub freq_count: fn(src: &[u8], counts: &mut [u32; 256]),
    /// Order-1 field-class residual (see `crate::delta::delta1_encode`).
    pub delta_encode: fn(dst: &mut [u8], src: &[u8], prev: &[u8]),
    /// In-place inverse of `delta_encode`.
    pub delta_decode: fn(buf: &mut [u8], prev: &[u8]),
    /// Composable IEEE CRC-32 update.
    pub crc32_update: fn(crc: u32, data: &[u8]) -> u32,
}

/// Scalar reference table. The baseline every accelerated table must match.
pub static GENERIC_OPS: SimdOps = SimdOps {
    freq_count: freq::freq_count,
    delta_encode: delta::delta1_encode,
    delta_decode: delta::delta1_decode,
    crc32_update: crc32::crc32_update,
};

/// Resolve the configured level against an optional embedder table.
///
/// Returns the table to use plus the effective level, or `None` when a
/// non-generic level was requested and no table backs it.
pub fn resolve(
    level: SimdLevel,
    registered: Option<(&'static SimdOps, SimdLevel)>,
) -> Option<(&'static SimdOps, SimdLevel)> {
    match (level, registered) {
        (SimdLevel::Auto, Some((ops, lvl))) => Some((ops, lvl)),
        (SimdLevel::Auto, None) | (SimdLevel::Generic, _) => {
            Some((&GENERIC_OPS, SimdLevel::Generic))
        }
        (want, Some((ops, have))) if want == have => Some((ops, have)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_without_table_is_generic() {
        let (ops, level) = resolve(SimdLevel::Auto, None).unwrap();
        assert_eq!(level, SimdLevel::Generic);
        assert_eq!((ops.crc32_update)(0, b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn explicit_level_requires_matching_table() {
        assert!(resolve(SimdLevel::Avx2, None).is_none());
        assert!(resolve(SimdLevel::Avx2, Some((&GENERIC_OPS, SimdLevel::Sse42))).is_none());
        assert!(resolve(SimdLevel::Sse42, Some((&GENERIC_OPS, SimdLevel::Sse42))).is_some());
    }

    #[test]
    fn auto_prefers_registered_table() {
        let (_, level) = resolve(SimdLevel::Auto, Some((&GENERIC_OPS, SimdLevel::Neon))).unwrap();
        assert_eq!(level, SimdLevel::Neon);
    }
}
