//! Dictionary training.
//!
//! One pass over the corpus collects position-bucketed unigram counts and
//! the per-previous-byte conditional distributions; the conditional peaks
//! rank the 256 previous-byte values into 8 bigram classes of 32 values
//! each. A second pass fills the per-bucket-per-class bigram counts, and an
//! optional pass trains the LZP table with a Boyer–Moore majority vote per
//! slot. All counts end in the floor-and-proportional normalizer, so every
//! byte value seen in training stays encodable.

use default_boxed::DefaultBoxed;
use log::debug;

use crate::bucket::{bucket, bucket_ranges, NUM_BUCKETS};
use crate::dict::{Dictionary, DICT_VERSION, NUM_CLASSES_V5};
use crate::error::{PktcError, Result};
use crate::freq::normalize;
use crate::lzp::{lzp_hash, LzpEntry, LzpTable, LZP_TABLE_SIZE};
use crate::MAX_PAYLOAD;

/// Training knobs.
#[derive(Debug, Clone, Copy)]
pub struct TrainOptions {
    /// Train the LZP prediction table (adds ~256 KB to the blob).
    pub lzp: bool,
}

impl Default for TrainOptions {
    fn default() -> Self {
        TrainOptions { lzp: true }
    }
}

/// Train a v5 dictionary from `payloads` with default options.
pub fn dict_train(payloads: &[&[u8]], model_id: u8) -> Result<Dictionary> {
    dict_train_with(payloads, model_id, &TrainOptions::default())
}

/// Train a v5 dictionary from `payloads`.
///
/// Fails with [`PktcError::InvalidArg`] for an empty corpus, an empty or
/// oversized payload, or a reserved model id (0 and 255).
pub fn dict_train_with(
    payloads: &[&[u8]],
    model_id: u8,
    opts: &TrainOptions,
) -> Result<Dictionary> {
    if model_id == 0 || model_id == 255 || payloads.is_empty() {
        return Err(PktcError::InvalidArg);
    }
    if payloads.iter().any(|p| p.is_empty() || p.len() > MAX_PAYLOAD) {
        return Err(PktcError::InvalidArg);
    }

    // ── Pass 1: unigram counts and conditional distributions ─────────────
    let mut uni = vec![[0u64; 256]; NUM_BUCKETS];
    let mut cond = vec![[0u64; 256]; 256];
    for p in payloads {
        for (b, start, end) in bucket_ranges(p.len()) {
            for &byte in &p[start..end] {
                uni[b][byte as usize] += 1;
            }
        }
        for i in 1..p.len() {
            cond[p[i - 1] as usize][p[i] as usize] += 1;
        }
    }

    let class_map = build_class_map(&cond);

    // ── Pass 2: bigram counts keyed by the class map ─────────────────────
    // Byte 0 has no predecessor; it trains (and is later coded) as class 0.
    let mut bi = vec![[0u64; 256]; NUM_BUCKETS * NUM_CLASSES_V5];
    for p in payloads {
        for i in 0..p.len() {
            let class = if i == 0 { 0 } else { class_map[p[i - 1] as usize] as usize };
            let row = bucket(i) * NUM_CLASSES_V5 + class;
            bi[row][p[i] as usize] += 1;
        }
    }

    let unigram: Vec<[u16; 256]> = uni.iter().map(|row| normalize(row, 4096)).collect();
    let bigram: Vec<[u16; 256]> = bi.iter().map(|row| normalize(row, 4096)).collect();

    // ── Pass 3 (optional): LZP majority vote ─────────────────────────────
    let lzp = if opts.lzp { Some(train_lzp(payloads)) } else { None };

    debug!(
        "trained model {} from {} payloads ({} bytes), lzp={}",
        model_id,
        payloads.len(),
        payloads.iter().map(|p| p.len() as u64).sum::<u64>(),
        lzp.is_some()
    );

    Dictionary::from_parts(
        DICT_VERSION,
        model_id,
        class_map,
        NUM_CLASSES_V5,
        unigram,
        Some(bigram),
        lzp,
    )
}

/// Rank previous-byte values by the peak of their conditional next-byte
/// distribution and cut the ranking into 8 classes of 32 values.
fn build_class_map(cond: &[[u64; 256]]) -> [u8; 256] {
    let values_per_class = 256 / NUM_CLASSES_V5;
    let mut keys = [0u64; 256];
    for v in 0..256 {
        let total: u64 = cond[v].iter().sum();
        if total > 0 {
            let peak = cond[v].iter().copied().max().unwrap_or(0);
            keys[v] = peak * 4096 / total;
        }
    }
    let mut order: Vec<u8> = (0..=255u8).collect();
    order.sort_by_key(|&v| (keys[v as usize], v));

    let mut class_map = [0u8; 256];
    for (rank, &v) in order.iter().enumerate() {
        class_map[v as usize] = (rank / values_per_class) as u8;
    }
    class_map
}

/// Boyer–Moore majority vote over `(previous byte, position) → byte` pairs.
/// Slot winners keep confidence 2 when their net vote survives by 2 or more,
/// 1 otherwise; slots with no surviving candidate stay empty.
fn train_lzp(payloads: &[&[u8]]) -> Box<LzpTable> {
    let mut votes: Vec<(u8, i64)> = vec![(0, 0); LZP_TABLE_SIZE];
    for p in payloads {
        for i in 1..p.len() {
            let slot = &mut votes[lzp_hash(p[i - 1], i)];
            if slot.1 == 0 {
                *slot = (p[i], 1);
            } else if slot.0 == p[i] {
                slot.1 += 1;
            } else {
                slot.1 -= 1;
            }
        }
    }

    let mut table = LzpTable::default_boxed();
    for (slot, (byte, count)) in votes.into_iter().enumerate() {
        if count > 0 {
            table.set(slot, LzpEntry { predict: byte, confidence: if count >= 2 { 2 } else { 1 } });
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_corpora() {
        assert_eq!(dict_train(&[], 1).err(), Some(PktcError::InvalidArg));
        assert_eq!(dict_train(&[b"x"], 0).err(), Some(PktcError::InvalidArg));
        assert_eq!(dict_train(&[b"x"], 255).err(), Some(PktcError::InvalidArg));
        assert_eq!(dict_train(&[&[] as &[u8]], 1).err(), Some(PktcError::InvalidArg));
    }

    #[test]
    fn trains_complete_v5_model() {
        let a: Vec<u8> = (0..64).map(|i| (i * 3) as u8).collect();
        let b: Vec<u8> = (0..300).map(|i| (i % 7) as u8).collect();
        let dict = dict_train(&[&a, &b, &a], 42).unwrap();
        assert_eq!(dict.model_id(), 42);
        assert_eq!(dict.version(), DICT_VERSION);
        assert!(dict.has_bigram());
        assert!(dict.has_lzp());
    }

    #[test]
    fn class_map_is_balanced() {
        let a: Vec<u8> = (0..1000).map(|i| (i * 17 + 3) as u8).collect();
        let dict = dict_train(&[&a], 5).unwrap();
        let mut per_class = [0usize; NUM_CLASSES_V5];
        for &c in dict.class_map.iter() {
            per_class[c as usize] += 1;
        }
        assert!(per_class.iter().all(|&n| n == 256 / NUM_CLASSES_V5));
    }

    #[test]
    fn lzp_table_predicts_the_training_stream() {
        let p: Vec<u8> = (0..200).map(|i| (i * 11 + 1) as u8).collect();
        let dict = dict_train(&[&p, &p, &p], 3).unwrap();
        let table = dict.lzp_table().unwrap();
        let mut residual = p.clone();
        table.filter_encode(&mut residual);
        let zeros = residual[1..].iter().filter(|&&b| b == 0).count();
        assert!(zeros >= p.len() - 1 - 8, "only {zeros} predicted positions");
    }

    #[test]
    fn opting_out_of_lzp_shrinks_the_model() {
        let p = [9u8; 32];
        let dict = dict_train_with(&[&p], 1, &TrainOptions { lzp: false }).unwrap();
        assert!(!dict.has_lzp());
    }
}
