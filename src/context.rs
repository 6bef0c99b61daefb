//! Per-connection compression state.
//!
//! A context binds an optional dictionary to the mutable state both ends of
//! a connection evolve in lockstep: the ring of previous payloads, the two
//! reference packets for the delta predictors, the adaptive table set, and
//! the packet counter. The encode and decode paths mutate this state from
//! byte-identical payloads, which is what keeps the two ends synchronized
//! without any side-channel traffic.
//!
//! All working memory is acquired here, at creation, and only what the
//! configuration can actually use: stateless contexts carry no packet
//! history, the residual lane exists only when a pre-filter can run, and
//! the ring-match index only when the ring coder is on the roster. The
//! per-packet paths allocate nothing.

use default_boxed::DefaultBoxed;
use log::debug;

use crate::bucket::{bucket_ranges, NUM_BUCKETS};
use crate::dict::{build_pair_1024, Dictionary};
use crate::error::{PktcError, Result};
use crate::freq::normalize;
use crate::lzp::LzpTable;
use crate::ring::{MatchIndex, RingBuffer, DEFAULT_RING_SIZE, MAX_RING_SIZE, MIN_RING_SIZE};
use crate::simd::{resolve, SimdLevel, SimdOps};
use crate::tans::{build_codec_pair, CodecPair, TABLE_LOG_12};
use crate::MAX_PAYLOAD;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Whether a context carries inter-packet state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CtxMode {
    /// Both ends track ring/delta/adaptive state across packets.
    #[default]
    Stateful,
    /// Every packet is self-contained; only the dictionary model applies.
    Stateless,
}

/// Feature toggles. Both ends of a connection must configure identically.
#[derive(Debug, Clone, Copy)]
pub struct CtxFlags {
    /// Allow the inter-packet delta pre-filters.
    pub delta: bool,
    /// Allow the conditional (bigram-class) entropy tables.
    pub bigram: bool,
    /// Maintain the statistics counters.
    pub stats: bool,
    /// Emit compact headers instead of the legacy 8-byte layout.
    pub compact_header: bool,
    /// Cap the competition roster for latency-critical paths.
    pub fast_compress: bool,
    /// Evolve unigram and LZP tables with observed traffic.
    pub adaptive: bool,
}

impl Default for CtxFlags {
    fn default() -> Self {
        CtxFlags {
            delta: true,
            bigram: true,
            stats: false,
            compact_header: true,
            fast_compress: false,
            adaptive: false,
        }
    }
}

/// Context construction parameters.
#[derive(Debug, Clone, Copy)]
pub struct CtxConfig {
    pub mode: CtxMode,
    /// 1 (cheapest roster) ..= 9 (every algorithm competes).
    pub compression_level: u8,
    /// Ring capacity in bytes; 0 selects the 64 KB default. Rounded up to a
    /// power of two.
    pub ring_buffer_size: usize,
    pub flags: CtxFlags,
    pub simd_level: SimdLevel,
    /// Embedder-registered accelerated helpers, with their level tag.
    pub simd_ops: Option<(&'static SimdOps, SimdLevel)>,
    /// Packets between adaptive table rebuilds.
    pub rebuild_interval: u32,
    /// Dictionary weight in the adaptive blend (`w:1` dict:observed).
    pub blend_weight: u32,
}

impl Default for CtxConfig {
    fn default() -> Self {
        CtxConfig {
            mode: CtxMode::Stateful,
            compression_level: 6,
            ring_buffer_size: 0,
            flags: CtxFlags::default(),
            simd_level: SimdLevel::Auto,
            simd_ops: None,
            rebuild_interval: 128,
            blend_weight: 3,
        }
    }
}

/// Counters exposed by [`Ctx::stats`] (live only when the stats flag is set).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub packets_compressed: u64,
    pub packets_decompressed: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub passthrough_packets: u64,
    pub adaptive_rebuilds: u64,
    pub encode_errors: u64,
    pub decode_errors: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal state
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) struct AdaptiveState {
    /// Per-bucket byte accumulators since the last rebuild.
    pub acc: Box<[[u32; 256]; NUM_BUCKETS]>,
    pub since_rebuild: u32,
    /// Context-local unigram table sets, rebuilt in place.
    pub uni12: Vec<CodecPair>,
    pub uni10: Vec<CodecPair>,
    /// Mutable LZP table copied from the dictionary.
    pub lzp: Option<Box<LzpTable>>,
}

/// Preallocated per-packet working memory.
///
/// Candidates are tried in `cand` and only their sizes kept; the winner is
/// re-encoded straight into the caller's buffer, so no second staging lane
/// exists. The residual lane is shared by every pre-filter (the LZP filter
/// runs in place on top of the delta output) and is absent when the
/// configuration can never run a pre-filter.
pub(crate) struct Scratch {
    /// Pre-filter residual lane.
    pub lane: Vec<u8>,
    /// Candidate encoder output.
    pub cand: Vec<u8>,
    /// LZ77 position table, zeroed per packet.
    pub lz_table: Vec<u32>,
}

impl Scratch {
    fn new(residuals: bool, lz77: bool) -> Scratch {
        Scratch {
            lane: if residuals { vec![0u8; MAX_PAYLOAD] } else { Vec::new() },
            cand: vec![0u8; MAX_PAYLOAD + 16],
            lz_table: if lz77 { vec![0u32; 1 << 12] } else { Vec::new() },
        }
    }
}

/// A per-connection compression context.
///
/// The dictionary borrow pins the lifetime: a context never outlives its
/// model. One context must not be driven from two threads at once; there is
/// no internal locking.
pub struct Ctx<'d> {
    pub(crate) dict: Option<&'d Dictionary>,
    pub(crate) config: CtxConfig,
    pub(crate) ops: &'static SimdOps,
    pub(crate) level: SimdLevel,
    pub(crate) ring: RingBuffer,
    pub(crate) index: MatchIndex,
    pub(crate) prev: Vec<u8>,
    pub(crate) prev_len: usize,
    pub(crate) prev2: Vec<u8>,
    pub(crate) prev2_len: usize,
    pub(crate) seq: u32,
    pub(crate) adaptive: Option<AdaptiveState>,
    pub(crate) scratch: Scratch,
    pub(crate) stats: Stats,
}

impl<'d> Ctx<'d> {
    /// Create a context bound to `dict` (or model-free when `None`).
    pub fn new(dict: Option<&'d Dictionary>, config: CtxConfig) -> Result<Ctx<'d>> {
        if !(1..=9).contains(&config.compression_level) {
            return Err(PktcError::InvalidArg);
        }
        if config.rebuild_interval == 0 || config.blend_weight == 0 {
            return Err(PktcError::InvalidArg);
        }
        if config.flags.adaptive && (dict.is_none() || config.mode == CtxMode::Stateless) {
            return Err(PktcError::InvalidArg);
        }
        let stateful = config.mode == CtxMode::Stateful;
        // A stateless context never reads its ring; keep the allocation at
        // the floor so the footprint tracks what the configuration can use.
        let ring_size = match config.ring_buffer_size {
            n if n > MAX_RING_SIZE => return Err(PktcError::InvalidArg),
            _ if !stateful => MIN_RING_SIZE,
            0 => DEFAULT_RING_SIZE,
            n => n.next_power_of_two().max(MIN_RING_SIZE),
        };
        let (ops, level) =
            resolve(config.simd_level, config.simd_ops).ok_or(PktcError::Unsupported)?;

        let adaptive = match (config.flags.adaptive, dict) {
            (true, Some(d)) => Some(AdaptiveState {
                acc: vec![[0u32; 256]; NUM_BUCKETS]
                    .into_boxed_slice()
                    .try_into()
                    .unwrap(),
                since_rebuild: 0,
                uni12: d.codec.uni12.clone(),
                uni10: d.codec.uni10.clone(),
                lzp: d.lzp_table().map(|base| {
                    let mut table = LzpTable::default_boxed();
                    table.copy_from(base);
                    table
                }),
            }),
            _ => None,
        };

        // Lanes the roster can actually reach.
        let wants_delta = stateful && config.flags.delta && config.compression_level >= 4;
        let wants_lzp =
            config.compression_level >= 7 && dict.map(|d| d.has_lzp()).unwrap_or(false);
        let wants_lz77 = config.compression_level >= 2;
        let wants_ring_coder = stateful && config.compression_level >= 8;

        Ok(Ctx {
            dict,
            config,
            ops,
            level,
            ring: RingBuffer::new(ring_size),
            index: if wants_ring_coder { MatchIndex::new() } else { MatchIndex::disabled() },
            prev: if stateful { vec![0u8; MAX_PAYLOAD] } else { Vec::new() },
            prev_len: 0,
            prev2: if stateful { vec![0u8; MAX_PAYLOAD] } else { Vec::new() },
            prev2_len: 0,
            seq: 0,
            adaptive,
            scratch: Scratch::new(wants_delta || wants_lzp, wants_lz77),
            stats: Stats::default(),
        })
    }

    /// Re-zero all mutable state without releasing any allocation.
    pub fn reset(&mut self) {
        self.ring.reset();
        self.index.reset();
        self.prev_len = 0;
        self.prev2_len = 0;
        self.seq = 0;
        if let Some(ad) = &mut self.adaptive {
            for row in ad.acc.iter_mut() {
                *row = [0u32; 256];
            }
            ad.since_rebuild = 0;
            if let Some(d) = self.dict {
                for (dst, src) in ad.uni12.iter_mut().zip(&d.codec.uni12) {
                    dst.clone_from(src);
                }
                for (dst, src) in ad.uni10.iter_mut().zip(&d.codec.uni10) {
                    dst.clone_from(src);
                }
                if let (Some(table), Some(base)) = (&mut ad.lzp, d.lzp_table()) {
                    table.copy_from(base);
                }
            }
        }
        self.stats = Stats::default();
    }

    /// Effective acceleration tier of this context.
    #[inline]
    pub fn simd_level(&self) -> SimdLevel {
        self.level
    }

    /// Snapshot of the statistics counters.
    #[inline]
    pub fn stats(&self) -> Stats {
        self.stats
    }

    #[inline]
    pub(crate) fn stateful(&self) -> bool {
        self.config.mode == CtxMode::Stateful
    }

    /// Order-1 delta is usable for an `n`-byte payload.
    #[inline]
    pub(crate) fn delta1_ready(&self, n: usize) -> bool {
        self.stateful() && self.prev_len == n
    }

    /// Order-2 delta is usable for an `n`-byte payload.
    #[inline]
    pub(crate) fn delta2_ready(&self, n: usize) -> bool {
        self.stateful() && self.prev_len == n && self.prev2_len == n
    }

    /// Fold a successfully processed payload into the connection state.
    /// Called by both the encode and the decode path with byte-identical
    /// payloads, which keeps the two ends in lockstep.
    pub(crate) fn commit_packet(&mut self, payload: &[u8]) {
        if !self.stateful() {
            return;
        }
        let base = self.ring.head();
        self.ring.push(payload);
        self.index.insert_payload(base, payload);

        std::mem::swap(&mut self.prev, &mut self.prev2);
        std::mem::swap(&mut self.prev_len, &mut self.prev2_len);
        self.prev[..payload.len()].copy_from_slice(payload);
        self.prev_len = payload.len();

        self.seq = self.seq.wrapping_add(1);

        let mut rebuild_due = false;
        if let Some(ad) = &mut self.adaptive {
            for (b, start, end) in bucket_ranges(payload.len()) {
                (self.ops.freq_count)(&payload[start..end], &mut ad.acc[b]);
            }
            if let Some(table) = &mut ad.lzp {
                table.update(payload);
            }
            ad.since_rebuild += 1;
            rebuild_due = ad.since_rebuild >= self.config.rebuild_interval;
        }
        if rebuild_due {
            self.rebuild_adaptive();
        }
    }

    /// Blend the accumulated statistics into the dictionary baseline and
    /// rebuild the context-local unigram tables in place.
    fn rebuild_adaptive(&mut self) {
        let dict = match self.dict {
            Some(d) => d,
            None => return,
        };
        let weight = self.config.blend_weight as u64;
        let ad = match &mut self.adaptive {
            Some(ad) => ad,
            None => return,
        };
        for b in 0..NUM_BUCKETS {
            let observed: u64 = ad.acc[b].iter().map(|&c| c as u64).sum();
            if observed == 0 {
                continue;
            }
            let mut acc64 = [0u64; 256];
            for s in 0..256 {
                acc64[s] = ad.acc[b][s] as u64;
            }
            let acc_norm = normalize(&acc64, 4096);
            let mut blended = [0u64; 256];
            for s in 0..256 {
                blended[s] = weight * dict.unigram[b][s] as u64 + acc_norm[s] as u64;
            }
            let effective = normalize(&blended, 4096);
            ad.uni12[b] = build_codec_pair(&effective, TABLE_LOG_12);
            ad.uni10[b] = build_pair_1024(&effective);
            ad.acc[b] = [0u32; 256];
        }
        ad.since_rebuild = 0;
        if self.config.flags.stats {
            self.stats.adaptive_rebuilds += 1;
        }
        debug!("adaptive tables rebuilt (packet {})", self.seq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::train::dict_train;

    fn dict() -> Dictionary {
        let p: Vec<u8> = (0..200).map(|i| (i % 32) as u8).collect();
        dict_train(&[&p], 1).unwrap()
    }

    #[test]
    fn rejects_bad_configs() {
        let d = dict();
        let mut cfg = CtxConfig { compression_level: 0, ..CtxConfig::default() };
        assert!(Ctx::new(Some(&d), cfg).is_err());
        cfg.compression_level = 10;
        assert!(Ctx::new(Some(&d), cfg).is_err());

        let cfg = CtxConfig {
            flags: CtxFlags { adaptive: true, ..CtxFlags::default() },
            ..CtxConfig::default()
        };
        assert!(Ctx::new(None, cfg).is_err());

        let cfg = CtxConfig {
            mode: CtxMode::Stateless,
            flags: CtxFlags { adaptive: true, ..CtxFlags::default() },
            ..CtxConfig::default()
        };
        assert!(Ctx::new(Some(&d), cfg).is_err());
    }

    #[test]
    fn explicit_simd_level_without_table_is_unsupported() {
        let d = dict();
        let cfg = CtxConfig { simd_level: SimdLevel::Avx2, ..CtxConfig::default() };
        assert_eq!(Ctx::new(Some(&d), cfg).err(), Some(PktcError::Unsupported));
    }

    #[test]
    fn commit_tracks_prev_packets() {
        let d = dict();
        let mut ctx = Ctx::new(Some(&d), CtxConfig::default()).unwrap();
        ctx.commit_packet(&[1, 2, 3, 4]);
        assert_eq!(ctx.prev_len, 4);
        assert_eq!(ctx.prev2_len, 0);
        ctx.commit_packet(&[5, 6, 7, 8]);
        assert_eq!(&ctx.prev[..4], &[5, 6, 7, 8]);
        assert_eq!(&ctx.prev2[..4], &[1, 2, 3, 4]);
        assert_eq!(ctx.ring.head(), 8);
        assert_eq!(ctx.seq, 2);
    }

    #[test]
    fn stateless_commit_is_a_no_op() {
        let d = dict();
        let cfg = CtxConfig { mode: CtxMode::Stateless, ..CtxConfig::default() };
        let mut ctx = Ctx::new(Some(&d), cfg).unwrap();
        ctx.commit_packet(&[1, 2, 3]);
        assert_eq!(ctx.prev_len, 0);
        assert_eq!(ctx.ring.head(), 0);
        assert_eq!(ctx.seq, 0);
    }

    #[test]
    fn reset_restores_creation_state() {
        let d = dict();
        let cfg = CtxConfig {
            flags: CtxFlags { adaptive: true, stats: true, ..CtxFlags::default() },
            rebuild_interval: 2,
            ..CtxConfig::default()
        };
        let mut ctx = Ctx::new(Some(&d), cfg).unwrap();
        for _ in 0..4 {
            ctx.commit_packet(&[7u8; 16]);
        }
        assert!(ctx.stats.adaptive_rebuilds > 0);
        ctx.reset();
        assert_eq!(ctx.seq, 0);
        assert_eq!(ctx.prev_len, 0);
        assert_eq!(ctx.stats, Stats::default());
        let ad = ctx.adaptive.as_ref().unwrap();
        assert_eq!(ad.since_rebuild, 0);
        assert!(ad.acc.iter().all(|row| row.iter().all(|&c| c == 0)));
    }

    #[test]
    fn adaptive_rebuild_fires_on_interval() {
        let d = dict();
        let cfg = CtxConfig {
            flags: CtxFlags { adaptive: true, stats: true, ..CtxFlags::default() },
            rebuild_interval: 3,
            ..CtxConfig::default()
        };
        let mut ctx = Ctx::new(Some(&d), cfg).unwrap();
        let payload = [3u8; 32];
        ctx.commit_packet(&payload);
        ctx.commit_packet(&payload);
        assert_eq!(ctx.stats.adaptive_rebuilds, 0);
        ctx.commit_packet(&payload);
        assert_eq!(ctx.stats.adaptive_rebuilds, 1);
        assert_eq!(ctx.adaptive.as_ref().unwrap().since_rebuild, 0);
    }
}
