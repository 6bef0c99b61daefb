//! E2E Suite 01: round-trip correctness and the passthrough guarantee.
//!
//! Every payload must survive compress → decompress bit-exactly between two
//! freshly created contexts, and the emitted frame must never exceed the
//! input plus the bounded header overhead — for cooperative payloads and
//! for uniform-random ones alike.

use std::sync::OnceLock;

use pktc::{
    dict_train, max_compressed_size, Ctx, CtxConfig, CtxFlags, Dictionary, PktcError,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rstest::rstest;

const BOUNDARY_SIZES: &[usize] =
    &[1, 8, 15, 16, 63, 64, 65, 127, 128, 255, 256, 4095, 65_535];

/// Position-correlated bytes from a small per-position alphabet, mimicking
/// fielded game-state layouts. Training and test draws share the support.
fn structured_payload(rng: &mut ChaCha8Rng, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (((i as u32 * 37) >> 3) as u8 & 0x38) | rng.gen_range(0..8u8))
        .collect()
}

fn trained_dict() -> &'static Dictionary {
    static DICT: OnceLock<Dictionary> = OnceLock::new();
    DICT.get_or_init(|| {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut corpus: Vec<Vec<u8>> = Vec::new();
        for &size in BOUNDARY_SIZES {
            for _ in 0..30 {
                corpus.push(structured_payload(&mut rng, size));
            }
        }
        let refs: Vec<&[u8]> = corpus.iter().map(|p| p.as_slice()).collect();
        dict_train(&refs, 1).expect("training must succeed")
    })
}

fn roundtrip_with(config: CtxConfig, payload: &[u8]) -> usize {
    let dict = trained_dict();
    let mut enc = Ctx::new(Some(dict), config).unwrap();
    let mut dec = Ctx::new(Some(dict), config).unwrap();

    let mut frame = vec![0u8; max_compressed_size(payload.len())];
    let written = enc.compress(payload, &mut frame).unwrap();
    assert!(written <= max_compressed_size(payload.len()));

    let mut out = vec![0u8; payload.len()];
    let got = dec.decompress(&frame[..written], &mut out).unwrap();
    assert_eq!(got, payload.len());
    assert_eq!(out, payload);
    written
}

// ─────────────────────────────────────────────────────────────────────────────
// Invariant 1: round-trip at every boundary size
// ─────────────────────────────────────────────────────────────────────────────

#[rstest]
#[case(1)]
#[case(8)]
#[case(15)]
#[case(16)]
#[case(63)]
#[case(64)]
#[case(65)]
#[case(127)]
#[case(128)]
#[case(255)]
#[case(256)]
#[case(4095)]
#[case(65_535)]
fn boundary_sizes_roundtrip(#[case] size: usize) {
    let mut rng = ChaCha8Rng::seed_from_u64(size as u64);
    let payload = structured_payload(&mut rng, size);
    roundtrip_with(CtxConfig::default(), &payload);
}

#[rstest]
#[case(1)]
#[case(64)]
#[case(256)]
#[case(4095)]
fn legacy_header_roundtrip(#[case] size: usize) {
    let mut rng = ChaCha8Rng::seed_from_u64(size as u64 + 1000);
    let payload = structured_payload(&mut rng, size);
    let config = CtxConfig {
        flags: CtxFlags { compact_header: false, ..CtxFlags::default() },
        ..CtxConfig::default()
    };
    let written = roundtrip_with(config, &payload);
    assert!(written <= size + 8);
}

#[test]
fn every_compression_level_roundtrips() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let payload = structured_payload(&mut rng, 200);
    for level in 1..=9 {
        let config = CtxConfig { compression_level: level, ..CtxConfig::default() };
        roundtrip_with(config, &payload);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Invariant 2: the passthrough guarantee
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn uniform_random_payload_takes_passthrough() {
    // Scenario S3: incompressible input costs exactly one compact header byte.
    let dict = trained_dict();
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let payload: Vec<u8> = (0..128).map(|_| rng.gen::<u8>()).collect();

    let mut enc = Ctx::new(Some(dict), CtxConfig::default()).unwrap();
    let mut frame = vec![0u8; max_compressed_size(payload.len())];
    let written = enc.compress(&payload, &mut frame).unwrap();
    assert_eq!(written, payload.len() + 1);
    assert_eq!(frame[0], 0x00, "incompressible input must go passthrough");

    let mut dec = Ctx::new(Some(dict), CtxConfig::default()).unwrap();
    let mut out = vec![0u8; payload.len()];
    dec.decompress(&frame[..written], &mut out).unwrap();
    assert_eq!(out, payload);
}

#[test]
fn output_is_bounded_for_any_input() {
    let dict = trained_dict();
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    for _ in 0..50 {
        let len = rng.gen_range(1..=2048usize);
        let payload: Vec<u8> = (0..len).map(|_| rng.gen::<u8>()).collect();
        let mut enc = Ctx::new(Some(dict), CtxConfig::default()).unwrap();
        let mut frame = vec![0u8; max_compressed_size(len)];
        let written = enc.compress(&payload, &mut frame).unwrap();
        assert!(written <= len + 3, "{written} bytes for a {len}-byte payload");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Concrete scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn constant_payload_with_matching_dict_collapses() {
    // Scenario S1.
    let corpus = vec![vec![0x42u8; 100]; 8];
    let refs: Vec<&[u8]> = corpus.iter().map(|p| p.as_slice()).collect();
    let dict = dict_train(&refs, 1).unwrap();

    let payload = [0x42u8; 8];
    let mut enc = Ctx::new(Some(&dict), CtxConfig::default()).unwrap();
    let mut frame = vec![0u8; 32];
    let written = enc.compress(&payload, &mut frame).unwrap();
    assert!(written <= 6, "got {written} bytes");

    let mut dec = Ctx::new(Some(&dict), CtxConfig::default()).unwrap();
    let mut out = [0u8; 8];
    dec.decompress(&frame[..written], &mut out).unwrap();
    assert_eq!(out, payload);
}

#[test]
fn zero_body_payload_stays_tiny() {
    // Scenario S4.
    let payload = [0u8; 64];
    let written = roundtrip_with(CtxConfig::default(), &payload);
    assert!(written <= 10, "got {written} bytes");
}

#[test]
fn structured_traffic_beats_point_eight_ratio() {
    // Scenario S2: model-fit traffic must compress well below 0.8.
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut total_in = 0usize;
    let mut total_out = 0usize;
    for _ in 0..20 {
        let payload = structured_payload(&mut rng, 64);
        total_in += payload.len();
        total_out += roundtrip_with(CtxConfig::default(), &payload);
    }
    let ratio = total_out as f64 / total_in as f64;
    assert!(ratio <= 0.80, "compression ratio {ratio:.3}");
}

// ─────────────────────────────────────────────────────────────────────────────
// Invariant 6: determinism
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn identical_streams_compress_identically() {
    let dict = trained_dict();
    let mut rng = ChaCha8Rng::seed_from_u64(21);
    let payloads: Vec<Vec<u8>> =
        (0..40).map(|_| structured_payload(&mut rng, 64)).collect();

    let mut enc_a = Ctx::new(Some(dict), CtxConfig::default()).unwrap();
    let mut enc_b = Ctx::new(Some(dict), CtxConfig::default()).unwrap();
    for p in &payloads {
        let mut fa = vec![0u8; max_compressed_size(p.len())];
        let mut fb = vec![0u8; max_compressed_size(p.len())];
        let wa = enc_a.compress(p, &mut fa).unwrap();
        let wb = enc_b.compress(p, &mut fb).unwrap();
        assert_eq!(fa[..wa], fb[..wb]);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument validation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn rejects_out_of_contract_inputs() {
    let dict = trained_dict();
    let mut ctx = Ctx::new(Some(dict), CtxConfig::default()).unwrap();
    let mut frame = vec![0u8; 128];

    assert_eq!(ctx.compress(&[], &mut frame), Err(PktcError::InvalidArg));

    let huge = vec![0u8; 65_536];
    let mut big_frame = vec![0u8; max_compressed_size(huge.len())];
    assert_eq!(ctx.compress(&huge, &mut big_frame), Err(PktcError::TooBig));

    let payload: Vec<u8> = (0..100).map(|i| (i * 83 + 19) as u8).collect();
    let mut tiny = [0u8; 3];
    assert_eq!(ctx.compress(&payload, &mut tiny), Err(PktcError::BufferTooSmall));
}
