//! Loop ordering for the strided copy kernel.

use crate::shape::Dims;

/// Axis permutation for a blocked walk, innermost axis first.
///
/// Axes are ranked by the sum of their absolute strides over all arrays,
/// with the destination (`dest_index`) counted twice. Ties keep the later
/// axis innermost, which is the row-major default.
pub(crate) fn compute_order(dims: &[usize], strides_list: &[&[isize]], dest_index: Option<usize>) -> Dims {
    let mut order: Dims = (0..dims.len()).collect();
    order.sort_by(|&a, &b| {
        let score_a = dim_score(a, strides_list, dest_index);
        let score_b = dim_score(b, strides_list, dest_index);
        score_a.cmp(&score_b).then_with(|| b.cmp(&a))
    });
    order
}

fn dim_score(dim: usize, strides_list: &[&[isize]], dest_index: Option<usize>) -> usize {
    strides_list
        .iter()
        .enumerate()
        .fold(0usize, |score, (i, strides)| {
            let weight = if dest_index == Some(i) { 2 } else { 1 };
            score.saturating_add(weight * strides[dim].unsigned_abs())
        })
}
