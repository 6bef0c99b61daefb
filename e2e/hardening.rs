//! E2E Suite 02: decoder hardening.
//!
//! The decoder must survive arbitrary adversarial input without panicking,
//! without writing outside the destination, and without poisoning the
//! connection state. Corruption must surface as an error or as an
//! observable output mismatch — never as a silent desync.

use std::sync::OnceLock;

use pktc::{
    dict_train, max_compressed_size, Ctx, CtxConfig, Dictionary, PktcError,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn structured_payload(rng: &mut ChaCha8Rng, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (((i as u32 * 37) >> 3) as u8 & 0x38) | rng.gen_range(0..8u8))
        .collect()
}

fn trained_dict() -> &'static Dictionary {
    static DICT: OnceLock<Dictionary> = OnceLock::new();
    DICT.get_or_init(|| {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let corpus: Vec<Vec<u8>> =
            (0..200).map(|_| structured_payload(&mut rng, 200)).collect();
        let refs: Vec<&[u8]> = corpus.iter().map(|p| p.as_slice()).collect();
        dict_train(&refs, 1).unwrap()
    })
}

fn compress_one(payload: &[u8]) -> Vec<u8> {
    let mut enc = Ctx::new(Some(trained_dict()), CtxConfig::default()).unwrap();
    let mut frame = vec![0u8; max_compressed_size(payload.len())];
    let written = enc.compress(payload, &mut frame).unwrap();
    frame.truncate(written);
    frame
}

// ─────────────────────────────────────────────────────────────────────────────
// Invariant 4: arbitrary bytes never break the decoder
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn random_frames_never_panic_or_overflow() {
    let dict = trained_dict();
    let mut rng = ChaCha8Rng::seed_from_u64(0xDEAD);
    let mut out = vec![0u8; 4096];
    for _ in 0..2000 {
        let len = rng.gen_range(1..=320usize);
        let frame: Vec<u8> = (0..len).map(|_| rng.gen::<u8>()).collect();
        let mut dec = Ctx::new(Some(dict), CtxConfig::default()).unwrap();
        match dec.decompress(&frame, &mut out) {
            Ok(n) => assert!(n <= out.len()),
            Err(_) => {}
        }
    }
}

#[test]
fn every_packet_type_code_is_handled() {
    let dict = trained_dict();
    let mut out = vec![0u8; 1024];
    for code in 0..=255u8 {
        // A small plausible frame under every code byte.
        let frame = [code, 0x1F, 0x00, 0x40, 0x10, 0x01, 0x02, 0x03];
        let mut dec = Ctx::new(Some(dict), CtxConfig::default()).unwrap();
        match dec.decompress(&frame, &mut out) {
            Ok(n) => assert!(n <= out.len()),
            Err(_) => {}
        }
    }
}

#[test]
fn reserved_codes_are_corrupt() {
    let dict = trained_dict();
    let mut out = vec![0u8; 1024];
    for code in [0x0Du8, 0x0E, 0x0F, 0xD4, 0xE0, 0xFE, 0xFF] {
        let frame = [code, 0x10, 0x00, 0x00];
        let mut dec = Ctx::new(Some(dict), CtxConfig::default()).unwrap();
        assert_eq!(
            dec.decompress(&frame, &mut out),
            Err(PktcError::Corrupt),
            "code {code:#04x} must be rejected"
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Truncation and bit flips
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn truncation_at_every_offset_is_detected_or_mismatched() {
    let mut rng = ChaCha8Rng::seed_from_u64(51);
    let payload = structured_payload(&mut rng, 120);
    let frame = compress_one(&payload);

    for cut in 0..frame.len() {
        let mut dec = Ctx::new(Some(trained_dict()), CtxConfig::default()).unwrap();
        let mut out = vec![0u8; payload.len()];
        match dec.decompress(&frame[..cut], &mut out) {
            Err(_) => {}
            Ok(n) => assert!(
                n != payload.len() || out != payload,
                "truncation to {cut} bytes decoded as the original"
            ),
        }
    }
}

#[test]
fn bit_flips_are_detected_or_mismatched() {
    let mut rng = ChaCha8Rng::seed_from_u64(52);
    let payload = structured_payload(&mut rng, 120);
    let frame = compress_one(&payload);
    assert!(frame.len() < payload.len(), "fixture must actually compress");

    let mut hard_errors = 0usize;
    let total_bits = frame.len() * 8;
    for bit in 0..total_bits {
        let mut bad = frame.clone();
        bad[bit / 8] ^= 1 << (bit % 8);
        let mut dec = Ctx::new(Some(trained_dict()), CtxConfig::default()).unwrap();
        let mut out = vec![0u8; payload.len()];
        match dec.decompress(&bad, &mut out) {
            Err(_) => hard_errors += 1,
            Ok(n) => assert!(
                n != payload.len() || out != payload,
                "bit {bit} flip went completely unnoticed"
            ),
        }
    }
    // The majority of flips must be hard decode failures.
    assert!(
        hard_errors * 2 > total_bits,
        "only {hard_errors}/{total_bits} flips raised errors"
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Size validation ordering
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn oversold_original_size_is_corrupt_not_buffer_too_small() {
    // Scenario S6: a tans frame claiming 65,535 bytes from 8 compressed
    // bytes must die in the entropy stage, not on capacity.
    let dict = trained_dict();
    // tans12 unigram plain, bucket 15 (long size mode), size field 65534.
    let frame = [0x6A, 0xFE, 0xFF, 0x10, 0x10, 0xAB, 0xCD, 0x01];
    let mut dec = Ctx::new(Some(dict), CtxConfig::default()).unwrap();
    let mut out = vec![0u8; 65_535];
    assert_eq!(dec.decompress(&frame, &mut out), Err(PktcError::Corrupt));
}

#[test]
fn insufficient_capacity_is_buffer_too_small() {
    let mut rng = ChaCha8Rng::seed_from_u64(53);
    let payload = structured_payload(&mut rng, 200);
    let frame = compress_one(&payload);

    let mut dec = Ctx::new(Some(trained_dict()), CtxConfig::default()).unwrap();
    let mut out = vec![0u8; payload.len() - 1];
    assert_eq!(
        dec.decompress(&frame, &mut out),
        Err(PktcError::BufferTooSmall)
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Error rollback
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn failed_decode_leaves_the_stream_decodable() {
    let dict = trained_dict();
    let mut rng = ChaCha8Rng::seed_from_u64(54);
    let mut enc = Ctx::new(Some(dict), CtxConfig::default()).unwrap();
    let mut dec = Ctx::new(Some(dict), CtxConfig::default()).unwrap();

    let payloads: Vec<Vec<u8>> =
        (0..10).map(|_| structured_payload(&mut rng, 64)).collect();

    for (k, payload) in payloads.iter().enumerate() {
        let mut frame = vec![0u8; max_compressed_size(payload.len())];
        let written = enc.compress(payload, &mut frame).unwrap();

        // Between every valid packet, hit the decoder with garbage.
        let garbage = [0xFFu8, 0x00, 0x13, 0x37];
        let mut scratch = vec![0u8; 256];
        assert!(dec.decompress(&garbage, &mut scratch).is_err());

        let mut out = vec![0u8; payload.len()];
        let got = dec
            .decompress(&frame[..written], &mut out)
            .unwrap_or_else(|e| panic!("packet {k} failed after garbage: {e}"));
        assert_eq!(got, payload.len());
        assert_eq!(&out, payload);
    }
}
