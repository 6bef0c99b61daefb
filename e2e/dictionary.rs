//! E2E Suite 03: dictionary training, serialization, and version handling.

use byteorder::{LittleEndian, WriteBytesExt};
use pktc::crc32::crc32;
use pktc::{
    compress_stateless, decompress_stateless, dict_train, dict_train_with, max_compressed_size,
    Dictionary, PktcError, TrainOptions, DICT_VERSION,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn corpus(seed: u64, count: usize, len: usize) -> Vec<Vec<u8>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            (0..len)
                .map(|i| (((i as u32 * 29) >> 2) as u8 & 0x30) | rng.gen_range(0..12u8))
                .collect()
        })
        .collect()
}

fn trained(seed: u64, model_id: u8) -> Dictionary {
    let corpus = corpus(seed, 120, 160);
    let refs: Vec<&[u8]> = corpus.iter().map(|p| p.as_slice()).collect();
    dict_train(&refs, model_id).unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Invariant 5: save/load fidelity and corruption detection
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn save_load_save_is_identity() {
    let dict = trained(1, 33);
    let blob = dict.save().unwrap();
    let loaded = Dictionary::load(&blob).unwrap();
    assert_eq!(loaded.model_id(), 33);
    assert_eq!(loaded.version(), DICT_VERSION);
    assert_eq!(loaded.save().unwrap(), blob);
}

#[test]
fn loaded_dict_compresses_like_the_original() {
    let dict = trained(2, 9);
    let reloaded = Dictionary::load(&dict.save().unwrap()).unwrap();

    let payloads = corpus(77, 10, 160);
    for p in &payloads {
        let mut fa = vec![0u8; max_compressed_size(p.len())];
        let mut fb = vec![0u8; max_compressed_size(p.len())];
        let wa = compress_stateless(&dict, p, &mut fa).unwrap();
        let wb = compress_stateless(&reloaded, p, &mut fb).unwrap();
        assert_eq!(fa[..wa], fb[..wb], "reloaded model must encode identically");

        let mut out = vec![0u8; p.len()];
        let n = decompress_stateless(&reloaded, &fa[..wa], &mut out).unwrap();
        assert_eq!(&out[..n], p.as_slice());
    }
}

#[test]
fn every_sampled_bit_flip_is_rejected() {
    let blob = trained(3, 5).save().unwrap();
    let step = (blob.len() / 200).max(1);
    for byte in (0..blob.len()).step_by(step) {
        for bit in [0u8, 3, 7] {
            let mut bad = blob.clone();
            bad[byte] ^= 1 << bit;
            assert!(
                Dictionary::load(&bad).is_err(),
                "flip at byte {byte} bit {bit} survived"
            );
        }
    }
}

#[test]
fn training_is_deterministic() {
    let a = trained(4, 8).save().unwrap();
    let b = trained(4, 8).save().unwrap();
    assert_eq!(a, b);
}

#[test]
fn train_without_lzp_roundtrips() {
    let corpus = corpus(5, 60, 120);
    let refs: Vec<&[u8]> = corpus.iter().map(|p| p.as_slice()).collect();
    let dict = dict_train_with(&refs, 2, &TrainOptions { lzp: false }).unwrap();
    assert!(!dict.has_lzp());

    let blob = dict.save().unwrap();
    let loaded = Dictionary::load(&blob).unwrap();
    assert!(!loaded.has_lzp());

    let p = &corpus[0];
    let mut frame = vec![0u8; max_compressed_size(p.len())];
    let w = compress_stateless(&loaded, p, &mut frame).unwrap();
    let mut out = vec![0u8; p.len()];
    decompress_stateless(&loaded, &frame[..w], &mut out).unwrap();
    assert_eq!(&out, p);
}

// ─────────────────────────────────────────────────────────────────────────────
// Downlevel formats
// ─────────────────────────────────────────────────────────────────────────────

/// Hand-assemble a downlevel blob with uniform tables (16 per symbol sums
/// each row to exactly 4096).
fn downlevel_blob(version: u8, model_id: u8, num_classes: usize) -> Vec<u8> {
    let mut blob: Vec<u8> = Vec::new();
    blob.write_u32::<LittleEndian>(0x3543_4B50).unwrap();
    blob.write_u8(version).unwrap();
    blob.write_u8(model_id).unwrap();
    blob.write_u8(0).unwrap(); // flags: no lzp
    blob.write_u8(0).unwrap();
    // v3/v4 carry no class map.
    let unigram_rows = 16;
    let bigram_rows = if version >= 4 { 16 * num_classes } else { 0 };
    for _ in 0..(unigram_rows + bigram_rows) {
        for _ in 0..256 {
            blob.write_u16::<LittleEndian>(16).unwrap();
        }
    }
    blob.write_u32::<LittleEndian>(0).unwrap(); // lzp_count
    let crc = crc32(&blob);
    blob.write_u32::<LittleEndian>(crc).unwrap();
    blob
}

#[test]
fn v4_blob_loads_with_fixed_class_map() {
    let blob = downlevel_blob(4, 12, 4);
    let dict = Dictionary::load(&blob).unwrap();
    assert_eq!(dict.version(), 4);
    assert_eq!(dict.model_id(), 12);
    assert!(dict.has_bigram());
    assert_eq!(dict.save().unwrap(), blob);

    // Uniform tables encode anything; exercise a full roundtrip.
    let payload: Vec<u8> = (0..200).map(|i| (i % 64) as u8).collect();
    let mut frame = vec![0u8; max_compressed_size(payload.len())];
    let w = compress_stateless(&dict, &payload, &mut frame).unwrap();
    let mut out = vec![0u8; payload.len()];
    decompress_stateless(&dict, &frame[..w], &mut out).unwrap();
    assert_eq!(out, payload);
}

#[test]
fn v3_blob_loads_without_bigram() {
    let blob = downlevel_blob(3, 12, 0);
    let dict = Dictionary::load(&blob).unwrap();
    assert_eq!(dict.version(), 3);
    assert!(!dict.has_bigram());
    assert_eq!(dict.save().unwrap(), blob);

    let payload: Vec<u8> = (0..80).map(|i| (i % 32) as u8).collect();
    let mut frame = vec![0u8; max_compressed_size(payload.len())];
    let w = compress_stateless(&dict, &payload, &mut frame).unwrap();
    let mut out = vec![0u8; payload.len()];
    decompress_stateless(&dict, &frame[..w], &mut out).unwrap();
    assert_eq!(out, payload);
}

#[test]
fn newer_version_is_a_version_error() {
    let mut blob = downlevel_blob(4, 12, 4);
    blob[4] = DICT_VERSION + 1;
    let len = blob.len();
    let crc = crc32(&blob[..len - 4]);
    blob[len - 4..].copy_from_slice(&crc.to_le_bytes());
    assert_eq!(Dictionary::load(&blob).err(), Some(PktcError::Version));
}

#[test]
fn reserved_model_id_in_blob_is_invalid() {
    for id in [0u8, 255] {
        let blob = downlevel_blob(4, id, 4);
        assert_eq!(Dictionary::load(&blob).err(), Some(PktcError::DictInvalid));
    }
}

#[test]
fn wrong_magic_is_invalid() {
    let mut blob = trained(6, 3).save().unwrap();
    blob[0] ^= 0xFF;
    let len = blob.len();
    let crc = crc32(&blob[..len - 4]);
    blob[len - 4..].copy_from_slice(&crc.to_le_bytes());
    assert_eq!(Dictionary::load(&blob).err(), Some(PktcError::DictInvalid));
}
