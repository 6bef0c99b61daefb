//! E2E Suite 06: the stateless API.
//!
//! Stateless packets are fully self-contained: no delta, no ring history,
//! no adaptation. Every frame must decode with a completely fresh context,
//! in any order.

use pktc::{
    compress_stateless, decompress_stateless, dict_train, max_compressed_size, Ctx, CtxConfig,
    CtxMode, Dictionary, PktcError,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rstest::rstest;

fn payload(rng: &mut ChaCha8Rng, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (((i as u32 * 19) >> 2) as u8 & 0x18) | rng.gen_range(0..8u8))
        .collect()
}

fn trained() -> Dictionary {
    let mut rng = ChaCha8Rng::seed_from_u64(31);
    let mut corpus: Vec<Vec<u8>> = Vec::new();
    for &len in &[8usize, 64, 256, 1024] {
        for _ in 0..40 {
            corpus.push(payload(&mut rng, len));
        }
    }
    let refs: Vec<&[u8]> = corpus.iter().map(|p| p.as_slice()).collect();
    dict_train(&refs, 1).unwrap()
}

#[rstest]
#[case(1)]
#[case(8)]
#[case(64)]
#[case(256)]
#[case(1024)]
fn stateless_roundtrip(#[case] len: usize) {
    let dict = trained();
    let mut rng = ChaCha8Rng::seed_from_u64(len as u64);
    let p = payload(&mut rng, len);

    let mut frame = vec![0u8; max_compressed_size(len)];
    let written = compress_stateless(&dict, &p, &mut frame).unwrap();
    assert!(written <= len + 3);

    let mut out = vec![0u8; len];
    let got = decompress_stateless(&dict, &frame[..written], &mut out).unwrap();
    assert_eq!(got, len);
    assert_eq!(out, p);
}

#[test]
fn stateless_frames_decode_in_any_order() {
    let dict = trained();
    let mut rng = ChaCha8Rng::seed_from_u64(32);

    // One long-lived stateless encoder context: reuse must not leak state
    // into the frames.
    let mut enc = Ctx::new(
        Some(&dict),
        CtxConfig { mode: CtxMode::Stateless, ..CtxConfig::default() },
    )
    .unwrap();

    let payloads: Vec<Vec<u8>> = (0..12).map(|_| payload(&mut rng, 64)).collect();
    let mut frames = Vec::new();
    for p in &payloads {
        let mut frame = vec![0u8; max_compressed_size(p.len())];
        let w = enc.compress(p, &mut frame).unwrap();
        frame.truncate(w);
        frames.push(frame);
    }

    // Decode newest-first with fresh contexts.
    for (p, frame) in payloads.iter().zip(&frames).rev() {
        let mut out = vec![0u8; p.len()];
        let got = decompress_stateless(&dict, frame, &mut out).unwrap();
        assert_eq!(got, p.len());
        assert_eq!(&out, p);
    }
}

#[test]
fn stateless_compression_is_reproducible() {
    let dict = trained();
    let mut rng = ChaCha8Rng::seed_from_u64(33);
    let p = payload(&mut rng, 128);

    let mut fa = vec![0u8; max_compressed_size(p.len())];
    let mut fb = vec![0u8; max_compressed_size(p.len())];
    let wa = compress_stateless(&dict, &p, &mut fa).unwrap();
    let wb = compress_stateless(&dict, &p, &mut fb).unwrap();
    assert_eq!(fa[..wa], fb[..wb]);

    // Repeating the same payload must not shrink later frames: there is no
    // inter-packet state to exploit.
    let wc = compress_stateless(&dict, &p, &mut fb).unwrap();
    assert_eq!(wa, wc);
}

#[test]
fn model_free_context_still_honors_the_guarantee() {
    // No dictionary at all: only the model-free algorithms compete.
    let mut ctx = Ctx::new(None, CtxConfig::default()).unwrap();
    let p = vec![0u8; 300];
    let mut frame = vec![0u8; max_compressed_size(p.len())];
    let written = ctx.compress(&p, &mut frame).unwrap();
    assert!(written < 16, "a zero run must collapse, got {written}");

    let mut dec = Ctx::new(None, CtxConfig::default()).unwrap();
    let mut out = vec![0u8; p.len()];
    dec.decompress(&frame[..written], &mut out).unwrap();
    assert_eq!(out, p);
}

#[test]
fn model_coded_frame_without_dict_is_no_dict() {
    let dict = trained();
    let mut rng = ChaCha8Rng::seed_from_u64(34);
    let p = payload(&mut rng, 64);
    let mut frame = vec![0u8; max_compressed_size(p.len())];
    let w = compress_stateless(&dict, &p, &mut frame).unwrap();

    // Only meaningful when the winning frame actually used the model.
    if frame[0] >= 0x10 {
        let mut dec = Ctx::new(None, CtxConfig::default()).unwrap();
        let mut out = vec![0u8; p.len()];
        assert_eq!(
            dec.decompress(&frame[..w], &mut out),
            Err(PktcError::NoDict)
        );
    }
}
