//! Decode dispatch and hardening.
//!
//! The inverse of every encode path, validated at each step: header fields,
//! declared sizes, bitstream consumption, entropy state ranges, and every
//! back-reference. No input can make a decode write outside `dst`, and a
//! failed decode leaves the context exactly as it was (error counters
//! aside), so one corrupt packet does not poison the connection state.

use crate::context::Ctx;
use crate::delta::delta2_decode;
use crate::error::{PktcError, Result};
use crate::lz77::{lz77_decode, lz77x_decode};
use crate::lzp::LzpTable;
use crate::packet::{parse_compact, parse_legacy, Algorithm, ParsedHeader};
use crate::rle::rle_decode;
use crate::tans::{tans_decode, CodecPair, TansTables};

impl<'d> Ctx<'d> {
    /// Decompress one packet into `dst`, returning the payload size.
    pub fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        match self.decompress_inner(src, dst) {
            Ok(n) => Ok(n),
            Err(e) => {
                if self.config.flags.stats {
                    self.stats.decode_errors += 1;
                }
                Err(e)
            }
        }
    }

    fn decompress_inner(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        // ── Header ───────────────────────────────────────────────────────
        let parsed: ParsedHeader = if self.config.flags.compact_header {
            parse_compact(src)?
        } else {
            let legacy = parse_legacy(src)?;
            if legacy.model_id != 0 {
                if let Some(d) = self.dict {
                    if legacy.model_id != d.model_id() {
                        return Err(PktcError::ModelMismatch);
                    }
                }
            }
            if self.stateful() && legacy.seq != self.seq as u8 {
                return Err(PktcError::Corrupt);
            }
            legacy.parsed
        };
        let info = parsed.info;
        let n = parsed.original_size;
        if dst.len() < n {
            return Err(PktcError::BufferTooSmall);
        }
        let payload = &src[parsed.payload_start..];

        // ── Requirements of the selected pipeline ────────────────────────
        let needs_model = matches!(info.algo, Algorithm::Tans12 | Algorithm::Tans10 | Algorithm::Pctx);
        if needs_model && self.dict.is_none() {
            return Err(PktcError::NoDict);
        }
        if info.bigram
            && !self.dict.map(|d| d.codec.bi12.is_some()).unwrap_or(false)
        {
            return Err(PktcError::Unsupported);
        }
        let lzp: Option<&LzpTable> = match &self.adaptive {
            Some(ad) if ad.lzp.is_some() => ad.lzp.as_deref(),
            _ => self.dict.and_then(|d| d.lzp_table()),
        };
        if info.lzp && lzp.is_none() {
            return Err(PktcError::Unsupported);
        }
        if info.delta == 1 && !self.delta1_ready(n) {
            return Err(PktcError::Corrupt);
        }
        if info.delta == 2 && !self.delta2_ready(n) {
            return Err(PktcError::Corrupt);
        }

        // ── Entropy / copy stage ─────────────────────────────────────────
        let out = &mut dst[..n];
        match info.algo {
            Algorithm::Passthrough => {
                if payload.len() != n {
                    return Err(PktcError::Corrupt);
                }
                out.copy_from_slice(payload);
            }
            Algorithm::Rle => rle_decode(out, n, payload)?,
            Algorithm::Lz77 => lz77_decode(out, n, payload)?,
            Algorithm::Lz77x => lz77x_decode(out, n, payload, &self.ring)?,
            Algorithm::Tans12 if !info.bigram => {
                let pairs = self.uni12_pairs()?;
                let tables = TansTables::Single { pair: &pairs[info.bucket as usize] };
                tans_decode(out, payload, &tables)?;
            }
            Algorithm::Tans12 => {
                let d = self.dict.ok_or(PktcError::NoDict)?;
                let pairs = d.codec.bi12.as_deref().ok_or(PktcError::Unsupported)?;
                let tables = TansTables::Bigram {
                    pairs,
                    class_map: &d.class_map,
                    num_classes: d.num_classes,
                    bucket: info.bucket as usize,
                };
                tans_decode(out, payload, &tables)?;
            }
            Algorithm::Tans10 => {
                let pairs = self.uni10_pairs()?;
                let tables = TansTables::Single { pair: &pairs[info.bucket as usize] };
                tans_decode(out, payload, &tables)?;
            }
            Algorithm::Pctx => {
                let d = self.dict.ok_or(PktcError::NoDict)?;
                let pairs = d.codec.bi12.as_deref().ok_or(PktcError::Unsupported)?;
                let tables = TansTables::Pctx {
                    pairs,
                    class_map: &d.class_map,
                    num_classes: d.num_classes,
                };
                tans_decode(out, payload, &tables)?;
            }
        }

        // ── Post-filters (inverse order of the encoder chain) ────────────
        if info.lzp {
            // Checked non-None above.
            if let Some(table) = lzp {
                table.filter_decode(out);
            }
        }
        match info.delta {
            1 => (self.ops.delta_decode)(out, &self.prev[..n]),
            2 => delta2_decode(out, &self.prev[..n], &self.prev2[..n]),
            _ => {}
        }

        // ── Success: fold the reconstruction into the connection state ───
        self.commit_packet(&dst[..n]);
        if self.config.flags.stats {
            self.stats.packets_decompressed += 1;
            self.stats.bytes_in += src.len() as u64;
            self.stats.bytes_out += n as u64;
        }
        Ok(n)
    }

    /// Unigram 12-bit pairs in effect (adaptive set when live).
    fn uni12_pairs(&self) -> Result<&[CodecPair]> {
        match (&self.adaptive, self.dict) {
            (Some(ad), Some(_)) => Ok(&ad.uni12),
            (None, Some(d)) => Ok(&d.codec.uni12),
            _ => Err(PktcError::NoDict),
        }
    }

    /// Unigram 10-bit pairs in effect (adaptive set when live).
    fn uni10_pairs(&self) -> Result<&[CodecPair]> {
        match (&self.adaptive, self.dict) {
            (Some(ad), Some(_)) => Ok(&ad.uni10),
            (None, Some(d)) => Ok(&d.codec.uni10),
            _ => Err(PktcError::NoDict),
        }
    }
}
