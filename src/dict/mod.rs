//! The trained model: frequency tables, bigram classes, LZP predictions.
//!
//! A dictionary is immutable once constructed and may back any number of
//! contexts concurrently; contexts hold a plain borrow. Besides the
//! serialized statistics, the struct carries the prebuilt tANS tables so
//! that context creation and the per-packet hot paths never build tables.

pub mod blob;
pub mod train;

use crate::bucket::NUM_BUCKETS;
use crate::error::{PktcError, Result};
use crate::freq::normalize;
use crate::lzp::LzpTable;
use crate::tans::{build_codec_pair, CodecPair, TABLE_LOG_10, TABLE_LOG_12};

/// Current blob format version.
pub const DICT_VERSION: u8 = 5;
/// Oldest loadable blob format version.
pub const DICT_MIN_VERSION: u8 = 3;
/// Bigram classes of a v5 dictionary.
pub const NUM_CLASSES_V5: usize = 8;
/// Bigram classes of a v4 dictionary (class map fixed to `prev >> 6`).
pub const NUM_CLASSES_V4: usize = 4;

/// Prebuilt tANS tables, derived from the frequency rows.
pub struct CodecSet {
    /// 12-bit unigram pair per bucket.
    pub uni12: Vec<CodecPair>,
    /// 10-bit unigram pair per bucket (rows renormalized to 1024).
    pub uni10: Vec<CodecPair>,
    /// 12-bit bigram pairs, indexed `bucket * num_classes + class`.
    pub bi12: Option<Vec<CodecPair>>,
}

impl CodecSet {
    pub(crate) fn build(unigram: &[[u16; 256]], bigram: Option<&[[u16; 256]]>) -> CodecSet {
        CodecSet {
            uni12: unigram.iter().map(|row| build_codec_pair(row, TABLE_LOG_12)).collect(),
            uni10: unigram.iter().map(|row| build_pair_1024(row)).collect(),
            bi12: bigram.map(|rows| {
                rows.iter().map(|row| build_codec_pair(row, TABLE_LOG_12)).collect()
            }),
        }
    }
}

/// Renormalize a 4096-sum row down to 1024 and build the compact pair.
pub(crate) fn build_pair_1024(row: &[u16; 256]) -> CodecPair {
    let mut counts = [0u64; 256];
    for s in 0..256 {
        counts[s] = row[s] as u64;
    }
    build_codec_pair(&normalize(&counts, 1 << TABLE_LOG_10), TABLE_LOG_10)
}

/// An immutable trained model.
pub struct Dictionary {
    pub(crate) version: u8,
    pub(crate) model_id: u8,
    /// Previous-byte value → bigram class.
    pub(crate) class_map: [u8; 256],
    pub(crate) num_classes: usize,
    /// Per-bucket unigram rows, each summing to 4096.
    pub(crate) unigram: Vec<[u16; 256]>,
    /// Per-bucket-per-class bigram rows, or `None` for v3 models.
    pub(crate) bigram: Option<Vec<[u16; 256]>>,
    pub(crate) lzp: Option<Box<LzpTable>>,
    pub(crate) codec: CodecSet,
}

impl Dictionary {
    /// Assemble a dictionary from validated parts and prebuild its tables.
    pub(crate) fn from_parts(
        version: u8,
        model_id: u8,
        class_map: [u8; 256],
        num_classes: usize,
        unigram: Vec<[u16; 256]>,
        bigram: Option<Vec<[u16; 256]>>,
        lzp: Option<Box<LzpTable>>,
    ) -> Result<Dictionary> {
        if model_id == 0 || model_id == 255 {
            return Err(PktcError::InvalidArg);
        }
        if unigram.len() != NUM_BUCKETS {
            return Err(PktcError::DictInvalid);
        }
        if let Some(rows) = &bigram {
            if rows.len() != NUM_BUCKETS * num_classes {
                return Err(PktcError::DictInvalid);
            }
        }
        for row in unigram.iter().chain(bigram.iter().flatten()) {
            let sum: u32 = row.iter().map(|&f| f as u32).sum();
            if sum != 4096 {
                return Err(PktcError::DictInvalid);
            }
        }
        if bigram.is_some() {
            if class_map.iter().any(|&c| c as usize >= num_classes) {
                return Err(PktcError::DictInvalid);
            }
        }
        let codec = CodecSet::build(&unigram, bigram.as_deref());
        Ok(Dictionary {
            version,
            model_id,
            class_map,
            num_classes,
            unigram,
            bigram,
            lzp,
            codec,
        })
    }

    /// Model id tag used by the rolling-upgrade protocol.
    #[inline]
    pub fn model_id(&self) -> u8 {
        self.model_id
    }

    /// Format version this model was built or loaded as.
    #[inline]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Whether conditional (bigram-class) tables are available.
    #[inline]
    pub fn has_bigram(&self) -> bool {
        self.bigram.is_some()
    }

    /// Whether the LZP prediction table is present.
    #[inline]
    pub fn has_lzp(&self) -> bool {
        self.lzp.is_some()
    }

    #[inline]
    pub(crate) fn lzp_table(&self) -> Option<&LzpTable> {
        self.lzp.as_deref()
    }
}

/// The fixed v4 class map: top two bits of the previous byte.
pub(crate) fn v4_class_map() -> [u8; 256] {
    let mut map = [0u8; 256];
    for (v, slot) in map.iter_mut().enumerate() {
        *slot = (v >> 6) as u8;
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_rows(n: usize) -> Vec<[u16; 256]> {
        vec![[16u16; 256]; n]
    }

    #[test]
    fn from_parts_rejects_reserved_model_ids() {
        for id in [0u8, 255] {
            let r = Dictionary::from_parts(
                DICT_VERSION,
                id,
                [0u8; 256],
                NUM_CLASSES_V5,
                uniform_rows(NUM_BUCKETS),
                None,
                None,
            );
            assert_eq!(r.err(), Some(PktcError::InvalidArg));
        }
    }

    #[test]
    fn from_parts_rejects_unnormalized_rows() {
        let mut rows = uniform_rows(NUM_BUCKETS);
        rows[3][7] += 1;
        let r = Dictionary::from_parts(
            DICT_VERSION,
            1,
            [0u8; 256],
            NUM_CLASSES_V5,
            rows,
            None,
            None,
        );
        assert_eq!(r.err(), Some(PktcError::DictInvalid));
    }

    #[test]
    fn codec_set_matches_model_shape() {
        let dict = Dictionary::from_parts(
            DICT_VERSION,
            9,
            [0u8; 256],
            NUM_CLASSES_V5,
            uniform_rows(NUM_BUCKETS),
            Some(uniform_rows(NUM_BUCKETS * NUM_CLASSES_V5)),
            None,
        )
        .unwrap();
        assert_eq!(dict.codec.uni12.len(), NUM_BUCKETS);
        assert_eq!(dict.codec.uni10.len(), NUM_BUCKETS);
        assert_eq!(
            dict.codec.bi12.as_ref().unwrap().len(),
            NUM_BUCKETS * NUM_CLASSES_V5
        );
        assert!(dict.has_bigram());
        assert!(!dict.has_lzp());
    }
}
