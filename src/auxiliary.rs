//! Stride-ranking helpers for the strided copy kernel.

use crate::shape::Dims;

/// Rank of each stride among the non-zero strides, by absolute value.
///
/// `result[i]` is 1 plus the number of non-zero strides strictly smaller
/// than `|strides[i]|`. Zero strides rank 1; equal strides share a rank.
pub(crate) fn index_order(strides: &[isize]) -> Dims {
    strides
        .iter()
        .map(|&si| {
            let si = si.unsigned_abs();
            if si == 0 {
                return 1;
            }
            1 + strides
                .iter()
                .filter(|&&s| s != 0 && s.unsigned_abs() < si)
                .count()
        })
        .collect()
}
