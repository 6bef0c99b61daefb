//! pktc — trained-model compression for short network payloads.
//!
//! Game-state, telemetry and tick traffic repeats itself: bytes correlate
//! with their position inside the payload and with the previous payloads on
//! the same connection. pktc exploits both with a trained dictionary
//! (position-bucketed tANS tables, bigram classes, an LZP predictor),
//! inter-packet delta filters, and a per-packet competition that always
//! falls back to passthrough — output is never more than the input plus a
//! small bounded header.
//!
//! Compressed packets are self-describing (a 1–3 byte compact header or the
//! 8-byte legacy layout) and the decoder is hardened: no input, however
//! corrupt or adversarial, makes it read or write out of bounds.

pub mod bitstream;
pub mod bucket;
pub mod compress;
pub mod context;
pub mod crc32;
pub mod decompress;
pub mod delta;
pub mod dict;
pub mod error;
pub mod freq;
pub mod lz77;
pub mod lzp;
pub mod packet;
pub mod ring;
pub mod rle;
pub mod simd;
pub mod tans;

// ─────────────────────────────────────────────────────────────────────────────
// Core limits
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum payload size accepted by any operation.
pub const MAX_PAYLOAD: usize = 65_535;

// ─────────────────────────────────────────────────────────────────────────────
// Primary API re-exports
// ─────────────────────────────────────────────────────────────────────────────

/// Error kind of every fallible operation.
pub use error::{PktcError, Result};

/// The trained model shared read-only by contexts.
pub use dict::Dictionary;
/// Train a dictionary from a corpus of representative payloads.
pub use dict::train::{dict_train, dict_train_with, TrainOptions};
/// Current and minimum supported blob format versions.
pub use dict::{DICT_MIN_VERSION, DICT_VERSION};

/// Per-connection compression context and its configuration.
pub use context::{Ctx, CtxConfig, CtxFlags, CtxMode, Stats};

/// Worst-case output size for a payload of the given size.
pub use compress::max_compressed_size;

/// SIMD dispatch surface (the embedder registers accelerated helpers).
pub use simd::{SimdLevel, SimdOps, GENERIC_OPS};

// ─────────────────────────────────────────────────────────────────────────────
// Stateless convenience API
// ─────────────────────────────────────────────────────────────────────────────

/// One-shot compression with no inter-packet state.
///
/// Equivalent to driving a fresh stateless [`Ctx`]; every packet is
/// self-contained and decodable by [`decompress_stateless`].
pub fn compress_stateless(dict: &Dictionary, src: &[u8], dst: &mut [u8]) -> Result<usize> {
    let mut ctx = Ctx::new(
        Some(dict),
        CtxConfig { mode: CtxMode::Stateless, ..CtxConfig::default() },
    )?;
    ctx.compress(src, dst)
}

/// One-shot decompression of a [`compress_stateless`] packet.
pub fn decompress_stateless(dict: &Dictionary, src: &[u8], dst: &mut [u8]) -> Result<usize> {
    let mut ctx = Ctx::new(
        Some(dict),
        CtxConfig { mode: CtxMode::Stateless, ..CtxConfig::default() },
    )?;
    ctx.decompress(src, dst)
}
