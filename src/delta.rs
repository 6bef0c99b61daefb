//! Inter-packet delta predictors.
//!
//! Short protocol payloads repeat their layout packet after packet, so the
//! byte at index `i` of the previous packet is a strong predictor of the byte
//! at index `i` of the current one. Two predictors are offered:
//!
//! - order-1, field-class aware: the payload is split into fixed index
//!   regions and each region uses the residual operator that suits its
//!   typical content (XOR for flag-like regions, wrapping subtraction for
//!   counter-like regions);
//! - order-2, linear extrapolation from the two previous packets, for
//!   fields that advance by a steady stride.
//!
//! Both predictors require the reference packets to have the same length as
//! the input; the competition engine simply skips them otherwise.

// ─────────────────────────────────────────────────────────────────────────────
// Order-1 field-class regions
// ─────────────────────────────────────────────────────────────────────────────

/// End of the header region (XOR residuals — bit flags).
const HEADER_END: usize = 16;
/// End of the subheader region (subtract residuals — counters, positions).
const SUBHEADER_END: usize = 64;
/// End of the body region (XOR residuals). Everything past it is tail
/// (subtract residuals).
const BODY_END: usize = 256;

#[inline]
fn xor_region(i: usize) -> bool {
    i < HEADER_END || (i >= SUBHEADER_END && i < BODY_END)
}

/// Order-1 residual: `dst[i] = src[i] (xor|sub) prev[i]` per region.
///
/// Reference implementation behind `SimdOps::delta_encode`. Requires
/// `dst.len() == src.len() == prev.len()`.
pub fn delta1_encode(dst: &mut [u8], src: &[u8], prev: &[u8]) {
    debug_assert_eq!(src.len(), prev.len());
    debug_assert_eq!(src.len(), dst.len());
    for i in 0..src.len() {
        dst[i] = if xor_region(i) {
            src[i] ^ prev[i]
        } else {
            src[i].wrapping_sub(prev[i])
        };
    }
}

/// In-place inverse of [`delta1_encode`]: `buf` holds residuals on entry and
/// the reconstructed payload on exit.
///
/// Reference implementation behind `SimdOps::delta_decode`.
pub fn delta1_decode(buf: &mut [u8], prev: &[u8]) {
    debug_assert_eq!(buf.len(), prev.len());
    for i in 0..buf.len() {
        buf[i] = if xor_region(i) {
            buf[i] ^ prev[i]
        } else {
            buf[i].wrapping_add(prev[i])
        };
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Order-2
// ─────────────────────────────────────────────────────────────────────────────

/// Order-2 residual: `dst[i] = src[i] − (2·prev[i] − prev2[i])`, wrapping.
pub fn delta2_encode(dst: &mut [u8], src: &[u8], prev: &[u8], prev2: &[u8]) {
    debug_assert_eq!(src.len(), prev.len());
    debug_assert_eq!(src.len(), prev2.len());
    for i in 0..src.len() {
        let predicted = prev[i].wrapping_add(prev[i]).wrapping_sub(prev2[i]);
        dst[i] = src[i].wrapping_sub(predicted);
    }
}

/// In-place inverse of [`delta2_encode`].
pub fn delta2_decode(buf: &mut [u8], prev: &[u8], prev2: &[u8]) {
    debug_assert_eq!(buf.len(), prev.len());
    debug_assert_eq!(buf.len(), prev2.len());
    for i in 0..buf.len() {
        let predicted = prev[i].wrapping_add(prev[i]).wrapping_sub(prev2[i]);
        buf[i] = buf[i].wrapping_add(predicted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order1_roundtrip_spans_all_regions() {
        let src: Vec<u8> = (0..300).map(|i| (i * 7 + 13) as u8).collect();
        let prev: Vec<u8> = (0..300).map(|i| (i * 3) as u8).collect();
        let mut buf = vec![0u8; 300];
        delta1_encode(&mut buf, &src, &prev);
        delta1_decode(&mut buf, &prev);
        assert_eq!(buf, src);
    }

    #[test]
    fn order1_identical_packets_give_zero_residual() {
        let pkt: Vec<u8> = (0..300).map(|i| i as u8).collect();
        let mut buf = vec![0u8; 300];
        delta1_encode(&mut buf, &pkt, &pkt);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn order2_cancels_constant_stride() {
        // Byte i advances by i per packet; linear extrapolation predicts it.
        let prev2: Vec<u8> = (0..64).map(|i| i as u8).collect();
        let prev: Vec<u8> = (0..64).map(|i| (2 * i) as u8).collect();
        let src: Vec<u8> = (0..64).map(|i| (3 * i) as u8).collect();
        let mut buf = vec![0u8; 64];
        delta2_encode(&mut buf, &src, &prev, &prev2);
        assert!(buf.iter().all(|&b| b == 0));
        delta2_decode(&mut buf, &prev, &prev2);
        assert_eq!(buf, src);
    }

    #[test]
    fn order2_roundtrip_random_bytes() {
        let src: Vec<u8> = (0..257).map(|i| (i * 31 + 5) as u8).collect();
        let prev: Vec<u8> = (0..257).map(|i| (i * 11) as u8).collect();
        let prev2: Vec<u8> = (0..257).map(|i| (i * 201 + 90) as u8).collect();
        let mut buf = vec![0u8; 257];
        delta2_encode(&mut buf, &src, &prev, &prev2);
        delta2_decode(&mut buf, &prev, &prev2);
        assert_eq!(buf, src);
    }
}
