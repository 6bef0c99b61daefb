//! E2E Suite 05: adaptive mode lockstep.
//!
//! Adaptive contexts retrain their unigram and LZP tables from observed
//! traffic. Correctness hinges on invariant 7: after any shared packet
//! history, encoder- and decoder-side adaptive state is bitwise equal, which
//! this suite observes through continued byte-exact interoperability across
//! rebuild boundaries.

use pktc::{
    dict_train, max_compressed_size, Ctx, CtxConfig, CtxFlags, Dictionary,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn payload(rng: &mut ChaCha8Rng, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (((i as u32 * 53) >> 3) as u8 & 0x60) | rng.gen_range(0..16u8))
        .collect()
}

fn trained(seed: u64) -> Dictionary {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let corpus: Vec<Vec<u8>> = (0..150).map(|_| payload(&mut rng, 96)).collect();
    let refs: Vec<&[u8]> = corpus.iter().map(|p| p.as_slice()).collect();
    dict_train(&refs, 1).unwrap()
}

fn adaptive_config(interval: u32) -> CtxConfig {
    CtxConfig {
        flags: CtxFlags { adaptive: true, stats: true, ..CtxFlags::default() },
        rebuild_interval: interval,
        ..CtxConfig::default()
    }
}

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
// Invariant 7: lockstep across rebuild boundaries
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn stream_stays_decodable_across_rebuilds() {
    let dict = trained(1);
    let mut enc = Ctx::new(Some(&dict), adaptive_config(16)).unwrap();
    let mut dec = Ctx::new(Some(&dict), adaptive_config(16)).unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(2);
    for _ in 0..100 {
        let p = payload(&mut rng, 96);
        pump(&mut enc, &mut dec, &p);
    }
    assert!(enc.stats().adaptive_rebuilds >= 5);
    assert_eq!(
        enc.stats().adaptive_rebuilds,
        dec.stats().adaptive_rebuilds,
        "both ends must rebuild at the same packets"
    );
}

#[test]
fn parallel_adaptive_encoders_stay_bitwise_identical() {
    let dict = trained(3);
    let mut enc_a = Ctx::new(Some(&dict), adaptive_config(8)).unwrap();
    let mut enc_b = Ctx::new(Some(&dict), adaptive_config(8)).unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(4);
    for _ in 0..40 {
        let p = payload(&mut rng, 96);
        let mut fa = vec![0u8; max_compressed_size(p.len())];
        let mut fb = vec![0u8; max_compressed_size(p.len())];
        let wa = enc_a.compress(&p, &mut fa).unwrap();
        let wb = enc_b.compress(&p, &mut fb).unwrap();
        assert_eq!(fa[..wa], fb[..wb]);
    }
}

#[test]
fn identical_traffic_tightens_the_model() {
    // A fixed payload repeated past a rebuild: the adapted tables must not
    // make it larger, and the stream must stay exact.
    let dict = trained(5);
    let mut enc = Ctx::new(Some(&dict), adaptive_config(8)).unwrap();
    let mut dec = Ctx::new(Some(&dict), adaptive_config(8)).unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(6);
    let p = payload(&mut rng, 96);
    let first = pump(&mut enc, &mut dec, &p);
    let mut last = first;
    for _ in 0..30 {
        last = pump(&mut enc, &mut dec, &p);
    }
    assert!(last <= first, "adaptation regressed: {first} -> {last}");
}

#[test]
fn custom_blend_weight_is_honored_in_lockstep() {
    let dict = trained(7);
    let config = CtxConfig { blend_weight: 1, ..adaptive_config(4) };
    let mut enc = Ctx::new(Some(&dict), config).unwrap();
    let mut dec = Ctx::new(Some(&dict), config).unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(8);
    for _ in 0..20 {
        let p = payload(&mut rng, 96);
        pump(&mut enc, &mut dec, &p);
    }
    assert_eq!(enc.stats().adaptive_rebuilds, 5);
}

#[test]
fn reset_rewinds_adaptation_on_both_ends() {
    let dict = trained(9);
    let mut enc = Ctx::new(Some(&dict), adaptive_config(8)).unwrap();
    let mut dec = Ctx::new(Some(&dict), adaptive_config(8)).unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(10);
    for _ in 0..20 {
        let p = payload(&mut rng, 96);
        pump(&mut enc, &mut dec, &p);
    }

    enc.reset();
    dec.reset();

    // After the reset the pair behaves like a fresh pair.
    let mut fresh_enc = Ctx::new(Some(&dict), adaptive_config(8)).unwrap();
    let p = payload(&mut rng, 96);
    let mut fa = vec![0u8; max_compressed_size(p.len())];
    let mut fb = vec![0u8; max_compressed_size(p.len())];
    let wa = enc.compress(&p, &mut fa).unwrap();
    let wb = fresh_enc.compress(&p, &mut fb).unwrap();
    assert_eq!(fa[..wa], fb[..wb]);

    let mut out = vec![0u8; p.len()];
    dec.decompress(&fa[..wa], &mut out).unwrap();
    assert_eq!(out, p);
}
