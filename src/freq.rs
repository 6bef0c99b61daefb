//! Byte histograms and power-of-two frequency normalization.
//!
//! Every tANS table is built from a 256-entry frequency row whose sum is
//! exactly the table size (4096 for 12-bit tables, 1024 for 10-bit). The
//! normalizer guarantees a floor of 1 for every symbol that was observed, so
//! every trained symbol stays encodable, while unseen symbols keep weight 0
//! instead of wasting codebook budget on Laplace smoothing.

/// Accumulate byte counts of `src` into `counts` (adds, does not zero).
///
/// Reference implementation behind `SimdOps::freq_count`; callers slice the
/// input per position bucket and reuse one call per region.
pub fn freq_count(src: &[u8], counts: &mut [u32; 256]) {
    for &b in src {
        counts[b as usize] += 1;
    }
}

/// Renormalize raw `counts` into a row summing to exactly `target`
/// (a power of two, at least 256).
///
/// - every seen symbol (count > 0) receives at least 1;
/// - the remaining capacity is split proportionally to the raw counts;
/// - rounding drift is repaid by nudging the current largest entry ±1 until
///   the sum is exact.
///
/// An all-zero histogram (a position bucket never reached in training) yields
/// the degenerate row `{0: target}`; such a row can only ever code zero
/// bytes, which is what an untrained bucket deserves.
pub fn normalize(counts: &[u64; 256], target: u32) -> [u16; 256] {
    debug_assert!(target.is_power_of_two() && target >= 256);
    let total: u64 = counts.iter().sum();
    let mut norm = [0u16; 256];
    if total == 0 {
        norm[0] = target as u16;
        return norm;
    }

    let seen = counts.iter().filter(|&&c| c > 0).count() as u64;
    let spare = target as u64 - seen;
    let mut sum: u64 = 0;
    for s in 0..256 {
        if counts[s] > 0 {
            let share = 1 + counts[s] * spare / total;
            norm[s] = share.min(u16::MAX as u64) as u16;
            sum += share;
        }
    }

    while sum != target as u64 {
        let mut largest = 0usize;
        for s in 1..256 {
            if norm[s] > norm[largest] {
                largest = s;
            }
        }
        if sum < target as u64 {
            norm[largest] += 1;
            sum += 1;
        } else {
            debug_assert!(norm[largest] > 1);
            norm[largest] -= 1;
            sum -= 1;
        }
    }
    norm
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counted(pairs: &[(usize, u64)]) -> [u64; 256] {
        let mut c = [0u64; 256];
        for &(s, n) in pairs {
            c[s] = n;
        }
        c
    }

    #[test]
    fn sums_are_exact() {
        for target in [1024u32, 4096] {
            let counts = counted(&[(0, 1000), (1, 500), (2, 3), (255, 1)]);
            let norm = normalize(&counts, target);
            assert_eq!(norm.iter().map(|&v| v as u64).sum::<u64>(), target as u64);
        }
    }

    #[test]
    fn seen_symbols_keep_nonzero_weight() {
        // One dominant symbol must not starve the rare ones.
        let counts = counted(&[(7, 1_000_000), (8, 1), (9, 1)]);
        let norm = normalize(&counts, 4096);
        assert!(norm[8] >= 1);
        assert!(norm[9] >= 1);
        assert_eq!(norm.iter().map(|&v| v as u64).sum::<u64>(), 4096);
    }

    #[test]
    fn unseen_symbols_stay_zero() {
        let counts = counted(&[(10, 5), (20, 5)]);
        let norm = normalize(&counts, 4096);
        assert_eq!(norm[0], 0);
        assert_eq!(norm[255], 0);
        assert_eq!(norm[10], norm[20]);
    }

    #[test]
    fn uniform_histogram_normalizes_evenly() {
        let counts = [4u64; 256];
        let norm = normalize(&counts, 4096);
        assert!(norm.iter().all(|&v| v == 16));
    }

    #[test]
    fn empty_bucket_degenerates() {
        let norm = normalize(&[0u64; 256], 4096);
        assert_eq!(norm[0], 4096);
        assert!(norm[1..].iter().all(|&v| v == 0));
    }

    #[test]
    fn freq_count_accumulates() {
        let mut counts = [0u32; 256];
        freq_count(b"aab", &mut counts);
        freq_count(b"b", &mut counts);
        assert_eq!(counts[b'a' as usize], 2);
        assert_eq!(counts[b'b' as usize], 2);
    }
}
