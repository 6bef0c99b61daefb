//! Dictionary blob serialization.
//!
//! Little-endian throughout, CRC-32 over every byte ahead of the trailing
//! checksum field. Three format revisions are loadable:
//!
//! - v5 (current): explicit bigram class map, 8 bigram classes;
//! - v4: no class-map field, 4 classes with the fixed `prev >> 6` map;
//! - v3: unigram-only — bigram-coded packet types become unsupported.
//!
//! The blob always describes the model exactly, so `load(save(d))`
//! reproduces `d` for every revision.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use default_boxed::DefaultBoxed;
use log::warn;

use crate::bucket::NUM_BUCKETS;
use crate::crc32::crc32;
use crate::dict::{
    v4_class_map, Dictionary, DICT_MIN_VERSION, DICT_VERSION, NUM_CLASSES_V4, NUM_CLASSES_V5,
};
use crate::error::{PktcError, Result};
use crate::lzp::{LzpEntry, LzpTable, LZP_TABLE_SIZE};

/// Blob magic, `"PKC5"` on the wire.
pub const DICT_MAGIC: u32 = 0x3543_4B50;

const FLAG_LZP: u8 = 0x01;

impl Dictionary {
    /// Serialize the model, trailing CRC-32 included.
    pub fn save(&self) -> Result<Vec<u8>> {
        let mut out: Vec<u8> = Vec::new();
        let w = &mut out;
        w.write_u32::<LittleEndian>(DICT_MAGIC).map_err(|_| PktcError::NoMem)?;
        w.write_u8(self.version).map_err(|_| PktcError::NoMem)?;
        w.write_u8(self.model_id).map_err(|_| PktcError::NoMem)?;
        let flags = if self.lzp.is_some() { FLAG_LZP } else { 0 };
        w.write_u8(flags).map_err(|_| PktcError::NoMem)?;
        w.write_u8(0).map_err(|_| PktcError::NoMem)?;

        if self.version >= 5 {
            w.extend_from_slice(&self.class_map);
        }
        for row in &self.unigram {
            for &f in row.iter() {
                w.write_u16::<LittleEndian>(f).map_err(|_| PktcError::NoMem)?;
            }
        }
        if let Some(rows) = &self.bigram {
            for row in rows {
                for &f in row.iter() {
                    w.write_u16::<LittleEndian>(f).map_err(|_| PktcError::NoMem)?;
                }
            }
        }

        match &self.lzp {
            Some(table) => {
                w.write_u32::<LittleEndian>(LZP_TABLE_SIZE as u32).map_err(|_| PktcError::NoMem)?;
                for e in table.entries() {
                    w.write_u8(e.predict).map_err(|_| PktcError::NoMem)?;
                    w.write_u8(e.confidence).map_err(|_| PktcError::NoMem)?;
                }
            }
            None => {
                w.write_u32::<LittleEndian>(0).map_err(|_| PktcError::NoMem)?;
            }
        }

        let crc = crc32(&out);
        out.write_u32::<LittleEndian>(crc).map_err(|_| PktcError::NoMem)?;
        Ok(out)
    }

    /// Load and validate a blob: length, CRC, magic, version, table sums.
    pub fn load(bytes: &[u8]) -> Result<Dictionary> {
        if bytes.len() < 12 {
            return Err(PktcError::DictInvalid);
        }
        let (body, crc_bytes) = bytes.split_at(bytes.len() - 4);
        let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        if crc32(body) != stored_crc {
            return Err(PktcError::DictInvalid);
        }

        let mut r: &[u8] = body;
        let magic = r.read_u32::<LittleEndian>().map_err(|_| PktcError::DictInvalid)?;
        if magic != DICT_MAGIC {
            return Err(PktcError::DictInvalid);
        }
        let version = r.read_u8().map_err(|_| PktcError::DictInvalid)?;
        if version > DICT_VERSION {
            return Err(PktcError::Version);
        }
        if version < DICT_MIN_VERSION {
            return Err(PktcError::DictInvalid);
        }
        if version < DICT_VERSION {
            warn!("loading downlevel dictionary format v{version}");
        }
        let model_id = r.read_u8().map_err(|_| PktcError::DictInvalid)?;
        let flags = r.read_u8().map_err(|_| PktcError::DictInvalid)?;
        let _reserved = r.read_u8().map_err(|_| PktcError::DictInvalid)?;

        let (num_classes, class_map) = match version {
            5 => {
                let mut map = [0u8; 256];
                r.read_exact(&mut map).map_err(|_| PktcError::DictInvalid)?;
                (NUM_CLASSES_V5, map)
            }
            _ => (NUM_CLASSES_V4, v4_class_map()),
        };

        let unigram = read_rows(&mut r, NUM_BUCKETS)?;
        let bigram = if version >= 4 {
            Some(read_rows(&mut r, NUM_BUCKETS * num_classes)?)
        } else {
            None
        };

        let lzp_count = r.read_u32::<LittleEndian>().map_err(|_| PktcError::DictInvalid)? as usize;
        let lzp = match lzp_count {
            0 => None,
            LZP_TABLE_SIZE => {
                let mut table = LzpTable::default_boxed();
                for e in table.entries_mut() {
                    let predict = r.read_u8().map_err(|_| PktcError::DictInvalid)?;
                    let confidence = r.read_u8().map_err(|_| PktcError::DictInvalid)?;
                    *e = LzpEntry { predict, confidence };
                }
                Some(table)
            }
            _ => return Err(PktcError::DictInvalid),
        };
        if (flags & FLAG_LZP != 0) != lzp.is_some() {
            return Err(PktcError::DictInvalid);
        }
        if !r.is_empty() {
            return Err(PktcError::DictInvalid);
        }

        Dictionary::from_parts(version, model_id, class_map, num_classes, unigram, bigram, lzp)
            .map_err(|e| match e {
                PktcError::InvalidArg => PktcError::DictInvalid,
                other => other,
            })
    }
}

fn read_rows(r: &mut &[u8], n: usize) -> Result<Vec<[u16; 256]>> {
    let mut rows = Vec::with_capacity(n);
    for _ in 0..n {
        let mut row = [0u16; 256];
        for slot in row.iter_mut() {
            *slot = r.read_u16::<LittleEndian>().map_err(|_| PktcError::DictInvalid)?;
        }
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::train::dict_train;

    fn sample_dict() -> Dictionary {
        let a: Vec<u8> = (0..100).map(|i| (i * 7 + 1) as u8).collect();
        let b: Vec<u8> = (0..100).map(|i| (i % 16) as u8).collect();
        dict_train(&[&a, &b], 17).unwrap()
    }

    #[test]
    fn save_load_reproduces_the_blob() {
        let dict = sample_dict();
        let blob = dict.save().unwrap();
        let loaded = Dictionary::load(&blob).unwrap();
        assert_eq!(loaded.model_id(), 17);
        assert_eq!(loaded.version(), DICT_VERSION);
        assert_eq!(loaded.save().unwrap(), blob);
    }

    #[test]
    fn any_corruption_is_rejected() {
        let dict = sample_dict();
        let blob = dict.save().unwrap();
        // One flipped bit at a sample of offsets, including the CRC field.
        let step = (blob.len() / 64).max(1);
        for off in (0..blob.len()).step_by(step) {
            let mut bad = blob.clone();
            bad[off] ^= 0x10;
            assert!(
                Dictionary::load(&bad).is_err(),
                "flip at offset {off} went undetected"
            );
        }
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let blob = sample_dict().save().unwrap();
        for cut in [0usize, 4, 11, blob.len() / 2, blob.len() - 1] {
            assert!(Dictionary::load(&blob[..cut]).is_err());
        }
    }

    #[test]
    fn future_version_is_reported_as_version_error() {
        let dict = sample_dict();
        let mut blob = dict.save().unwrap();
        blob[4] = DICT_VERSION + 1;
        let len = blob.len();
        let crc = crc32(&blob[..len - 4]);
        blob[len - 4..].copy_from_slice(&crc.to_le_bytes());
        assert_eq!(Dictionary::load(&blob).err(), Some(PktcError::Version));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let dict = sample_dict();
        let mut blob = dict.save().unwrap();
        let crc_at = blob.len() - 4;
        blob.insert(crc_at, 0xAB);
        let len = blob.len();
        let crc = crc32(&blob[..len - 4]);
        blob[len - 4..].copy_from_slice(&crc.to_le_bytes());
        assert_eq!(Dictionary::load(&blob).err(), Some(PktcError::DictInvalid));
    }
}
