//! E2E Suite 04: stateful streams.
//!
//! Encoder and decoder contexts must stay byte-synchronized across long
//! packet streams: delta residuals, ring-history references, and sequence
//! numbering all depend on both ends committing identical bytes.

use pktc::{
    dict_train, max_compressed_size, Ctx, CtxConfig, CtxFlags, Dictionary, PktcError,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn template(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len)
        .map(|i| (((i as u32 * 41) >> 2) as u8 & 0x3C) | rng.gen_range(0..4u8))
        .collect()
}

fn train_on(payloads: &[Vec<u8>], model_id: u8) -> Dictionary {
    let refs: Vec<&[u8]> = payloads.iter().map(|p| p.as_slice()).collect();
    dict_train(&refs, model_id).unwrap()
}

/// Drive one payload through an encoder/decoder pair and return the frame
/// size.
fn pump(enc: &mut Ctx<'_>, dec: &mut Ctx<'_>, payload: &[u8]) -> usize {
    let mut frame = vec![0u8; max_compressed_size(payload.len())];
    let written = enc.compress(payload, &mut frame).unwrap();
    let mut out = vec![0u8; payload.len()];
    let got = dec.decompress(&frame[..written], &mut out).unwrap();
    assert_eq!(got, payload.len());
    assert_eq!(out, payload);
    written
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario S5: counter traffic shrinks once history kicks in
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn counter_stream_compresses_better_with_history() {
    let base = template(64, 1);
    let mut corpus: Vec<Vec<u8>> = Vec::new();
    for k in 0..=255u8 {
        let mut p = base.clone();
        p[0] = k;
        corpus.push(p);
    }
    let dict = train_on(&corpus, 1);

    let config = CtxConfig {
        flags: CtxFlags { adaptive: true, stats: true, ..CtxFlags::default() },
        ..CtxConfig::default()
    };
    let mut enc = Ctx::new(Some(&dict), config).unwrap();
    let mut dec = Ctx::new(Some(&dict), config).unwrap();

    let mut sizes = Vec::new();
    for k in 0..100u8 {
        let mut p = base.clone();
        p[0] = k;
        sizes.push(pump(&mut enc, &mut dec, &p));
    }

    let early: f64 = sizes[..3].iter().sum::<usize>() as f64 / 3.0;
    let late: f64 = sizes[10..].iter().sum::<usize>() as f64 / (sizes.len() - 10) as f64;
    assert!(
        late < early,
        "late average {late:.1} must beat early average {early:.1}"
    );
    // With one-byte deltas the steady state is a handful of bytes.
    assert!(late < 16.0, "steady-state frames too large: {late:.1}");
}

// ─────────────────────────────────────────────────────────────────────────────
// Ring-buffer wrap
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn stream_survives_three_ring_wraps() {
    let corpus: Vec<Vec<u8>> = (0..16).map(|k| template(64, 100 + k)).collect();
    let dict = train_on(&corpus, 2);

    let config = CtxConfig {
        compression_level: 8,
        ring_buffer_size: 4096,
        ..CtxConfig::default()
    };
    let mut enc = Ctx::new(Some(&dict), config).unwrap();
    let mut dec = Ctx::new(Some(&dict), config).unwrap();

    // 250 × 64 B = 16,000 B through a 4 KB ring: covers three full wraps,
    // with recurring payloads so cross-packet references stay attractive.
    for k in 0..250usize {
        pump(&mut enc, &mut dec, &corpus[k % corpus.len()]);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Delta applicability
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn size_changes_disable_delta_without_desync() {
    let corpus: Vec<Vec<u8>> = vec![template(64, 7), template(65, 8), template(64, 9)];
    let dict = train_on(&corpus, 3);

    let mut enc = Ctx::new(Some(&dict), CtxConfig::default()).unwrap();
    let mut dec = Ctx::new(Some(&dict), CtxConfig::default()).unwrap();

    // Alternating sizes: order-1 and order-2 silently drop out whenever the
    // reference sizes disagree, and the stream still round-trips.
    for k in 0..30usize {
        let p = &corpus[k % 3];
        pump(&mut enc, &mut dec, p);
    }
    // Three same-size packets in a row re-arm order-2.
    for _ in 0..3 {
        pump(&mut enc, &mut dec, &corpus[0]);
    }
}

#[test]
fn reset_resynchronizes_both_ends() {
    let corpus: Vec<Vec<u8>> = (0..8).map(|k| template(64, 300 + k)).collect();
    let dict = train_on(&corpus, 4);

    let mut enc = Ctx::new(Some(&dict), CtxConfig::default()).unwrap();
    let mut dec = Ctx::new(Some(&dict), CtxConfig::default()).unwrap();
    for p in &corpus {
        pump(&mut enc, &mut dec, p);
    }

    // Caller-driven recovery: both ends reset, stream continues cleanly.
    enc.reset();
    dec.reset();
    for p in &corpus {
        pump(&mut enc, &mut dec, p);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Legacy header: model id and sequence validation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn legacy_stream_validates_sequence() {
    let corpus: Vec<Vec<u8>> = (0..4).map(|k| template(64, 400 + k)).collect();
    let dict = train_on(&corpus, 5);
    let config = CtxConfig {
        flags: CtxFlags { compact_header: false, ..CtxFlags::default() },
        ..CtxConfig::default()
    };
    let mut enc = Ctx::new(Some(&dict), config).unwrap();
    let mut dec = Ctx::new(Some(&dict), config).unwrap();

    let mut frame = vec![0u8; max_compressed_size(64)];
    let w0 = enc.compress(&corpus[0], &mut frame).unwrap();
    let first = frame[..w0].to_vec();

    let mut out = vec![0u8; 64];
    dec.decompress(&first, &mut out).unwrap();

    // Replaying the first frame now trips the sequence check.
    assert_eq!(
        dec.decompress(&first, &mut out),
        Err(PktcError::Corrupt)
    );

    // The in-order continuation still decodes.
    let w1 = enc.compress(&corpus[1], &mut frame).unwrap();
    dec.decompress(&frame[..w1], &mut out).unwrap();
    assert_eq!(out, corpus[1]);
}

#[test]
fn legacy_stream_detects_model_mismatch() {
    let corpus: Vec<Vec<u8>> = (0..4).map(|k| template(64, 500 + k)).collect();
    let dict_a = train_on(&corpus, 6);
    let dict_b = train_on(&corpus, 7);
    let config = CtxConfig {
        flags: CtxFlags { compact_header: false, ..CtxFlags::default() },
        ..CtxConfig::default()
    };
    let mut enc = Ctx::new(Some(&dict_a), config).unwrap();
    let mut dec = Ctx::new(Some(&dict_b), config).unwrap();

    let mut frame = vec![0u8; max_compressed_size(64)];
    let w = enc.compress(&corpus[0], &mut frame).unwrap();
    let mut out = vec![0u8; 64];
    assert_eq!(
        dec.decompress(&frame[..w], &mut out),
        Err(PktcError::ModelMismatch)
    );
}
