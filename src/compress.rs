//! The per-packet algorithm competition.
//!
//! Every feasible pre-filter × coder combination encodes the payload into
//! the trial lane, and the cheapest exact total (header + payload bytes)
//! wins. Passthrough seeds the incumbent, so the output can never exceed
//! the input by more than the header — the passthrough guarantee.
//! Replacement requires a strictly smaller total and the enumeration order
//! is fixed, so ties resolve identically on every build.
//!
//! Trials only record sizes; the winner is re-encoded straight into the
//! caller's buffer. Re-encoding is byte-exact because nothing the coders
//! read (tables, previous packets, ring) mutates before the packet commits,
//! and it halves the scratch footprint against staging every winner.

use log::{debug, trace};

use crate::context::{Ctx, CtxMode};
use crate::delta::delta2_encode;
use crate::error::{PktcError, Result};
use crate::lz77::{lz77_encode, lz77x_encode};
use crate::lzp::LzpTable;
use crate::packet::{
    compact_header_len, decode_type, encode_type, mini_size_mode, size_bucket, write_compact,
    write_legacy, Algorithm, SizeMode, TypeInfo, LEGACY_HEADER_LEN,
};
use crate::ring::{MatchIndex, RingBuffer};
use crate::rle::rle_encode;
use crate::simd::SimdOps;
use crate::tans::{tans_encode, CodecPair, TansTables};
use crate::MAX_PAYLOAD;

// ─────────────────────────────────────────────────────────────────────────────
// Pre-filter chain
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pre {
    Identity,
    Delta1,
    Delta2,
    Lzp,
    Delta1Lzp,
}

impl Pre {
    #[inline]
    fn delta(self) -> u8 {
        match self {
            Pre::Identity | Pre::Lzp => 0,
            Pre::Delta1 | Pre::Delta1Lzp => 1,
            Pre::Delta2 => 2,
        }
    }

    #[inline]
    fn lzp(self) -> bool {
        matches!(self, Pre::Lzp | Pre::Delta1Lzp)
    }
}

/// Build the residual for `pre` in the shared lane (identity borrows the
/// input directly). `None` when a required table is missing.
fn build_residual<'r>(
    pre: Pre,
    src: &'r [u8],
    lane: &'r mut [u8],
    prev: &[u8],
    prev2: &[u8],
    lzp: Option<&LzpTable>,
    ops: &SimdOps,
) -> Option<&'r [u8]> {
    let n = src.len();
    Some(match pre {
        Pre::Identity => src,
        Pre::Delta1 => {
            (ops.delta_encode)(&mut lane[..n], src, &prev[..n]);
            &lane[..n]
        }
        Pre::Delta2 => {
            delta2_encode(&mut lane[..n], src, &prev[..n], &prev2[..n]);
            &lane[..n]
        }
        Pre::Lzp => {
            let table = lzp?;
            lane[..n].copy_from_slice(src);
            table.filter_encode(&mut lane[..n]);
            &lane[..n]
        }
        Pre::Delta1Lzp => {
            let table = lzp?;
            (ops.delta_encode)(&mut lane[..n], src, &prev[..n]);
            table.filter_encode(&mut lane[..n]);
            &lane[..n]
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Coders
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coder {
    Rle,
    Lz77,
    Lz77x,
    Tans12Uni,
    Tans12Bi,
    Tans10,
    PctxBi,
}

/// Model tables in effect for one packet.
struct ModelRefs<'t> {
    uni12: Option<&'t [CodecPair]>,
    uni10: Option<&'t [CodecPair]>,
    bi12: Option<&'t [CodecPair]>,
    class_map: Option<&'t [u8; 256]>,
    num_classes: usize,
}

/// Run one coder over `residual` into `out`; `None` when the coder is
/// infeasible here (missing tables, uncodable symbol, output too large).
fn run_coder(
    coder: Coder,
    residual: &[u8],
    out: &mut [u8],
    model: &ModelRefs<'_>,
    bucket: usize,
    ring: &RingBuffer,
    index: &MatchIndex,
    lz_table: &mut [u32],
) -> Option<usize> {
    match coder {
        Coder::Rle => rle_encode(residual, out),
        Coder::Lz77 => {
            if lz_table.len() != 1 << 12 {
                return None;
            }
            lz_table.fill(0);
            lz77_encode(residual, out, lz_table)
        }
        Coder::Lz77x => lz77x_encode(residual, out, ring, index),
        Coder::Tans12Uni => {
            let pairs = model.uni12?;
            tans_encode(residual, &TansTables::Single { pair: &pairs[bucket] }, out)
        }
        Coder::Tans12Bi => {
            let pairs = model.bi12?;
            let tables = TansTables::Bigram {
                pairs,
                class_map: model.class_map?,
                num_classes: model.num_classes,
                bucket,
            };
            tans_encode(residual, &tables, out)
        }
        Coder::Tans10 => {
            let pairs = model.uni10?;
            tans_encode(residual, &TansTables::Single { pair: &pairs[bucket] }, out)
        }
        Coder::PctxBi => {
            let pairs = model.bi12?;
            let tables = TansTables::Pctx {
                pairs,
                class_map: model.class_map?,
                num_classes: model.num_classes,
            };
            tans_encode(residual, &tables, out)
        }
    }
}

/// Winner bookkeeping. `coder == None` means passthrough (payload is the
/// raw input).
#[derive(Clone, Copy)]
struct Best {
    code: u8,
    pre: Pre,
    coder: Option<Coder>,
    payload_len: usize,
    total: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Competition state
// ─────────────────────────────────────────────────────────────────────────────

struct Competition<'a, 't> {
    compact: bool,
    bucket: usize,
    model: ModelRefs<'t>,
    ring: &'a RingBuffer,
    index: &'a MatchIndex,
    cand: &'a mut [u8],
    lz_table: &'a mut [u32],
    best: Best,
}

impl<'a, 't> Competition<'a, 't> {
    fn header_len(&self, mode: SizeMode) -> usize {
        if self.compact {
            compact_header_len(mode)
        } else {
            LEGACY_HEADER_LEN
        }
    }

    /// Trial-encode one candidate and keep it if strictly cheaper.
    fn attempt(&mut self, pre: Pre, coder: Coder, info: &TypeInfo, residual: &[u8]) {
        let len = match run_coder(
            coder,
            residual,
            self.cand,
            &self.model,
            self.bucket,
            self.ring,
            self.index,
            self.lz_table,
        ) {
            Some(len) => len,
            None => return,
        };
        let total = self.header_len(info.size_mode) + len;
        let code = encode_type(info);
        trace!("candidate {code:#04x}: {len}+{} bytes", total - len);
        if total < self.best.total {
            self.best = Best { code, pre, coder: Some(coder), payload_len: len, total };
        }
    }
}

impl<'d> Ctx<'d> {
    /// Compress one payload into `dst`, returning the emitted byte count.
    ///
    /// The output never exceeds `src.len()` plus the header overhead
    /// (1–3 bytes compact, 8 legacy); [`crate::max_compressed_size`] bounds
    /// it over all configurations.
    pub fn compress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        match self.compress_inner(src, dst) {
            Ok(n) => Ok(n),
            Err(e) => {
                if self.config.flags.stats {
                    self.stats.encode_errors += 1;
                }
                Err(e)
            }
        }
    }

    fn compress_inner(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        if src.is_empty() {
            return Err(PktcError::InvalidArg);
        }
        if src.len() > MAX_PAYLOAD {
            return Err(PktcError::TooBig);
        }
        let n = src.len();
        let compact = self.config.flags.compact_header;

        // Roster gates, resolved once per packet.
        let level = if self.config.flags.fast_compress {
            self.config.compression_level.min(3)
        } else {
            self.config.compression_level
        };
        let flags = self.config.flags;
        let d1_ok = flags.delta && level >= 4 && self.delta1_ready(n);
        let d2_ok = flags.delta && level >= 6 && self.delta2_ready(n);
        let stateful = self.config.mode == CtxMode::Stateful;

        // Model tables in effect for this packet.
        let dict = self.dict;
        let adaptive = self.adaptive.as_ref();
        let model = ModelRefs {
            uni12: match (adaptive, dict) {
                (Some(ad), Some(_)) => Some(&ad.uni12[..]),
                (None, Some(d)) => Some(&d.codec.uni12[..]),
                _ => None,
            },
            uni10: match (adaptive, dict) {
                (Some(ad), Some(_)) => Some(&ad.uni10[..]),
                (None, Some(d)) => Some(&d.codec.uni10[..]),
                _ => None,
            },
            bi12: if flags.bigram { dict.and_then(|d| d.codec.bi12.as_deref()) } else { None },
            class_map: dict.map(|d| &d.class_map),
            num_classes: dict.map(|d| d.num_classes).unwrap_or(0),
        };
        let lzp: Option<&LzpTable> = if level >= 7 {
            match adaptive {
                Some(ad) if ad.lzp.is_some() => ad.lzp.as_deref(),
                _ => dict.and_then(|d| d.lzp_table()),
            }
        } else {
            None
        };

        let ops: &'static SimdOps = self.ops;
        let prev = &self.prev[..];
        let prev2 = &self.prev2[..];
        let scratch = &mut self.scratch;
        let lane = &mut scratch.lane[..];

        let (bkt, bucket_mode) = size_bucket(n);
        let mini_mode = mini_size_mode(n);

        let mut comp = Competition {
            compact,
            bucket: bkt as usize,
            model,
            ring: &self.ring,
            index: &self.index,
            cand: &mut scratch.cand[..],
            lz_table: &mut scratch.lz_table[..],
            best: Best {
                code: 0x00,
                pre: Pre::Identity,
                coder: None,
                payload_len: n,
                total: if compact { 1 + n } else { LEGACY_HEADER_LEN + n },
            },
        };

        for pre in [Pre::Identity, Pre::Delta1, Pre::Delta2, Pre::Lzp, Pre::Delta1Lzp] {
            let applicable = match pre {
                Pre::Identity => true,
                Pre::Delta1 => d1_ok,
                Pre::Delta2 => d2_ok,
                Pre::Lzp => lzp.is_some(),
                Pre::Delta1Lzp => level >= 9 && d1_ok && lzp.is_some(),
            };
            if !applicable {
                continue;
            }
            let residual = match build_residual(pre, src, &mut *lane, prev, prev2, lzp, ops) {
                Some(r) => r,
                None => continue,
            };
            let delta = pre.delta();
            let with_lzp = pre.lzp();

            // ── Mini-coders (identity and delta1 residuals only) ─────────
            if !with_lzp && delta < 2 {
                let mini = |algo: Algorithm| TypeInfo {
                    algo,
                    delta,
                    bigram: false,
                    lzp: false,
                    bucket: 0,
                    size_mode: mini_mode,
                };
                comp.attempt(pre, Coder::Rle, &mini(Algorithm::Rle), residual);
                if level >= 2 {
                    comp.attempt(pre, Coder::Lz77, &mini(Algorithm::Lz77), residual);
                }
                if level >= 8 && stateful {
                    comp.attempt(pre, Coder::Lz77x, &mini(Algorithm::Lz77x), residual);
                }
            }

            // ── tANS coders ──────────────────────────────────────────────
            if level >= 3 {
                let info = TypeInfo {
                    algo: Algorithm::Tans12,
                    delta,
                    bigram: false,
                    lzp: with_lzp,
                    bucket: bkt,
                    size_mode: bucket_mode,
                };
                comp.attempt(pre, Coder::Tans12Uni, &info, residual);
            }
            if level >= 5 {
                let info = TypeInfo {
                    algo: Algorithm::Tans12,
                    delta,
                    bigram: true,
                    lzp: with_lzp,
                    bucket: bkt,
                    size_mode: bucket_mode,
                };
                comp.attempt(pre, Coder::Tans12Bi, &info, residual);
                if !with_lzp && delta < 2 {
                    let info = TypeInfo {
                        algo: Algorithm::Tans10,
                        delta,
                        bigram: false,
                        lzp: false,
                        bucket: bkt,
                        size_mode: bucket_mode,
                    };
                    comp.attempt(pre, Coder::Tans10, &info, residual);
                }
                if pre != Pre::Delta1Lzp {
                    let info = TypeInfo {
                        algo: Algorithm::Pctx,
                        delta,
                        bigram: true,
                        lzp: with_lzp,
                        bucket: 0,
                        size_mode: SizeMode::Long,
                    };
                    comp.attempt(pre, Coder::PctxBi, &info, residual);
                }
            }
        }

        // ── Assemble the winning frame ───────────────────────────────────
        let best = comp.best;
        if dst.len() < best.total {
            return Err(PktcError::BufferTooSmall);
        }
        let header_len = best.total - best.payload_len;
        let info = decode_type(best.code).ok_or(PktcError::InvalidArg)?;
        if compact {
            let written = write_compact(dst, best.code, &info, n);
            debug_assert_eq!(written, header_len);
        } else {
            let model_id = dict.map(|d| d.model_id()).unwrap_or(0);
            write_legacy(dst, best.code, n, best.payload_len, model_id, self.seq as u8);
        }
        match best.coder {
            None => dst[header_len..best.total].copy_from_slice(src),
            Some(coder) => {
                // Re-encode the winner in place; bitwise identical to the
                // trial since no coder input has changed.
                let residual = build_residual(best.pre, src, &mut *lane, prev, prev2, lzp, ops)
                    .ok_or(PktcError::InvalidArg)?;
                let len = run_coder(
                    coder,
                    residual,
                    &mut dst[header_len..best.total],
                    &comp.model,
                    comp.bucket,
                    comp.ring,
                    comp.index,
                    comp.lz_table,
                )
                .ok_or(PktcError::InvalidArg)?;
                debug_assert_eq!(len, best.payload_len);
            }
        }

        debug!(
            "packet {}: {} -> {} bytes via {:#04x}",
            self.seq, n, best.total, best.code
        );

        self.commit_packet(src);
        if self.config.flags.stats {
            self.stats.packets_compressed += 1;
            self.stats.bytes_in += n as u64;
            self.stats.bytes_out += best.total as u64;
            if best.code == 0x00 {
                self.stats.passthrough_packets += 1;
            }
        }
        Ok(best.total)
    }
}

/// Worst-case compressed size over every configuration (the legacy header
/// is the larger framing).
#[inline]
pub const fn max_compressed_size(src_size: usize) -> usize {
    src_size + LEGACY_HEADER_LEN
}
