//! Run-length mini-coder.
//!
//! The simplest competitor: alternating literal/run tuples
//! `[lit_len u8][literals][run_len u8][run_byte]`, with the run byte omitted
//! for `run_len == 0` and the trailing run field omitted when the literals
//! complete the payload. Runs shorter than 4 bytes are folded into the
//! literal stream, where they cost less than a tuple.
//!
//! Wins on payloads dominated by long single-byte runs (zero-padded bodies),
//! where it beats even the entropy coders on framing overhead.

use crate::error::{PktcError, Result};

/// Minimum run length worth its own tuple.
const MIN_RUN: usize = 4;

#[inline]
fn run_length(src: &[u8], from: usize) -> usize {
    let b = src[from];
    let mut end = from + 1;
    while end < src.len() && src[end] == b {
        end += 1;
    }
    end - from
}

/// Encode `src` into `out`; `None` when the encoding would outgrow `out`
/// (the competition then drops the candidate).
pub fn rle_encode(src: &[u8], out: &mut [u8]) -> Option<usize> {
    let n = src.len();
    let mut i = 0usize;
    let mut w = 0usize;
    let push = |out: &mut [u8], w: &mut usize, b: u8| -> Option<()> {
        if *w >= out.len() {
            return None;
        }
        out[*w] = b;
        *w += 1;
        Some(())
    };

    while i < n {
        // Literals until a worthwhile run starts (or the length cap).
        let lit_start = i;
        while i < n && i - lit_start < 255 {
            if run_length(src, i) >= MIN_RUN {
                break;
            }
            i += 1;
        }
        let lit_len = i - lit_start;
        push(out, &mut w, lit_len as u8)?;
        if w + lit_len > out.len() {
            return None;
        }
        out[w..w + lit_len].copy_from_slice(&src[lit_start..i]);
        w += lit_len;

        if i == n {
            break;
        }
        let run = run_length(src, i).min(255);
        if run >= MIN_RUN {
            push(out, &mut w, run as u8)?;
            push(out, &mut w, src[i])?;
            i += run;
        } else {
            // Literal cap hit mid-texture: empty run keeps the framing regular.
            push(out, &mut w, 0)?;
        }
    }
    Some(w)
}

/// Decode exactly `original_size` bytes from `src` into `dst`.
pub fn rle_decode(dst: &mut [u8], original_size: usize, src: &[u8]) -> Result<()> {
    debug_assert!(dst.len() >= original_size);
    let mut p = 0usize;
    let mut written = 0usize;

    while written < original_size {
        let lit_len = *src.get(p).ok_or(PktcError::Corrupt)? as usize;
        p += 1;
        if written + lit_len > original_size || p + lit_len > src.len() {
            return Err(PktcError::Corrupt);
        }
        dst[written..written + lit_len].copy_from_slice(&src[p..p + lit_len]);
        written += lit_len;
        p += lit_len;

        if written == original_size {
            break;
        }
        let run_len = *src.get(p).ok_or(PktcError::Corrupt)? as usize;
        p += 1;
        if run_len > 0 {
            let run_byte = *src.get(p).ok_or(PktcError::Corrupt)?;
            p += 1;
            if written + run_len > original_size {
                return Err(PktcError::Corrupt);
            }
            dst[written..written + run_len].fill(run_byte);
            written += run_len;
        } else if lit_len == 0 {
            // A tuple that moves nothing cannot appear in a valid stream.
            return Err(PktcError::Corrupt);
        }
    }

    if p != src.len() {
        return Err(PktcError::Corrupt);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(src: &[u8]) -> usize {
        let mut out = vec![0u8; src.len() * 2 + 16];
        let len = rle_encode(src, &mut out).unwrap();
        let mut dst = vec![0u8; src.len()];
        rle_decode(&mut dst, src.len(), &out[..len]).unwrap();
        assert_eq!(dst, src);
        len
    }

    #[test]
    fn zero_body_collapses() {
        let src = [0u8; 64];
        let len = roundtrip(&src);
        // [lit 0][run 64][byte 0]
        assert_eq!(len, 3);
    }

    #[test]
    fn long_run_spans_multiple_tuples() {
        let src = [7u8; 1000];
        let len = roundtrip(&src);
        assert!(len <= 3 * (1000 / 255 + 1));
    }

    #[test]
    fn mixed_payload_roundtrips() {
        let mut src = Vec::new();
        src.extend_from_slice(b"header-bytes");
        src.extend_from_slice(&[0u8; 100]);
        src.extend_from_slice(b"tail");
        src.extend_from_slice(&[0xFFu8; 40]);
        roundtrip(&src);
    }

    #[test]
    fn incompressible_payload_roundtrips_or_aborts() {
        let src: Vec<u8> = (0..600).map(|i| (i * 31 + 7) as u8).collect();
        roundtrip(&src);
    }

    #[test]
    fn short_runs_fold_into_literals() {
        let src = b"aabbccdd";
        let mut out = vec![0u8; 64];
        let len = rle_encode(src, &mut out).unwrap();
        // One literal tuple, no run fields.
        assert_eq!(len, 1 + src.len());
    }

    #[test]
    fn truncated_input_is_corrupt() {
        let src = [0u8; 64];
        let mut out = vec![0u8; 16];
        let len = rle_encode(&src, &mut out).unwrap();
        let mut dst = [0u8; 64];
        for cut in 0..len {
            assert!(rle_decode(&mut dst, 64, &out[..cut]).is_err());
        }
    }

    #[test]
    fn oversized_run_is_corrupt() {
        // Claims a 200-byte run into a 10-byte payload.
        let bad = [0u8, 200u8, 0x55u8];
        let mut dst = [0u8; 10];
        assert_eq!(rle_decode(&mut dst, 10, &bad), Err(PktcError::Corrupt));
    }

    #[test]
    fn stalled_stream_is_corrupt() {
        // [lit 0][run 0] makes no progress.
        let bad = [0u8, 0u8, 0u8, 0u8];
        let mut dst = [0u8; 4];
        assert_eq!(rle_decode(&mut dst, 4, &bad), Err(PktcError::Corrupt));
    }

    #[test]
    fn trailing_garbage_is_corrupt() {
        let src = [3u8; 8];
        let mut out = vec![0u8; 16];
        let len = rle_encode(&src, &mut out).unwrap();
        out[len] = 0xAB;
        let mut dst = [0u8; 8];
        assert_eq!(rle_decode(&mut dst, 8, &out[..len + 1]), Err(PktcError::Corrupt));
    }
}
