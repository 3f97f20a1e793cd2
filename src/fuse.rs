//! Dimension fusion for the strided copy kernel.
//!
//! Adjacent axes that every array walks contiguously (the outer axis stride
//! is the inner extent times the inner stride) collapse into one longer
//! axis, so the kernel runs fewer, longer inner loops.

use crate::shape::Dims;

/// Fuse contiguous neighbouring axes, inner axis first.
///
/// Axis `i` merges into axis `i - 1` when
/// `strides[k][i] == dims[i - 1] * strides[k][i - 1]` for every array `k`.
/// A merged-away axis keeps its slot with extent 1; callers drop those.
pub(crate) fn fuse_dims(dims: &[usize], all_strides: &[&[isize]]) -> Dims {
    let mut result = Dims::from_slice(dims);
    if dims.len() <= 1 || all_strides.is_empty() {
        return result;
    }
    for i in (1..dims.len()).rev() {
        let contiguous = all_strides
            .iter()
            .all(|s| s[i] == result[i - 1] as isize * s[i - 1]);
        if contiguous {
            result[i - 1] *= result[i];
            result[i] = 1;
        }
    }
    result
}

/// Per-axis cost weights for block shrinking.
///
/// The smallest absolute stride of each axis over all arrays, doubled;
/// axes that no array moves along cost 1.
pub(crate) fn compute_costs(all_strides: &[&[isize]]) -> Vec<isize> {
    let Some(first) = all_strides.first() else {
        return Vec::new();
    };
    (0..first.len())
        .map(|i| {
            let min = all_strides.iter().map(|s| s[i].abs()).min().unwrap_or(0);
            if min == 0 {
                1
            } else {
                2 * min
            }
        })
        .collect()
}
