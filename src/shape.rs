//! Shape and stride algebra.
//!
//! Pure functions over extent and stride sequences: element counts, stride
//! and back-stride computation for a layout, broadcast compatibility and
//! promotion, and conversions between multi-indices and linear positions.
//!
//! Every function accepts slices of any length; the `*_fixed` variants take
//! const-generic arrays for callers that know the rank at compile time.

use smallvec::SmallVec;

use crate::layout::{Layout, Traversal};
use crate::{ExprError, Result};

/// Extents of an expression, one per axis.
pub type Dims = SmallVec<[usize; 4]>;

/// Linear-storage steps, one per axis. May be zero or negative.
pub type Strides = SmallVec<[isize; 4]>;

/// Number of elements addressed by `shape` (1 for rank 0).
#[inline]
pub fn size(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Compute the canonical strides of `shape` for `layout`.
///
/// Row-major walks the last axis fastest, column-major the first. `Dynamic`
/// and `Any` carry no ordering of their own and get row-major strides.
/// Axes of extent 1 get stride 0, so stepping along them never moves.
pub fn compute_strides(shape: &[usize], layout: Layout) -> Strides {
    let mut strides = Strides::from_elem(0, shape.len());
    let mut data_size: isize = 1;
    let mut visit = |i: usize| {
        strides[i] = if shape[i] == 1 { 0 } else { data_size };
        data_size *= shape[i] as isize;
    };
    match layout {
        Layout::ColumnMajor => (0..shape.len()).for_each(&mut visit),
        Layout::RowMajor | Layout::Dynamic | Layout::Any => {
            (0..shape.len()).rev().for_each(&mut visit)
        }
    }
    strides
}

/// Fixed-rank variant of [`compute_strides`].
pub fn compute_strides_fixed<const N: usize>(shape: &[usize; N], layout: Layout) -> [isize; N] {
    let mut strides = [0isize; N];
    let mut data_size: isize = 1;
    let mut visit = |i: usize| {
        strides[i] = if shape[i] == 1 { 0 } else { data_size };
        data_size *= shape[i] as isize;
    };
    match layout {
        Layout::ColumnMajor => (0..N).for_each(&mut visit),
        Layout::RowMajor | Layout::Dynamic | Layout::Any => (0..N).rev().for_each(&mut visit),
    }
    strides
}

/// Back-strides: `strides[i] * (shape[i] - 1)`.
///
/// The distance a cursor travels from the first to the last position of an
/// axis. Zero-extent axes yield 0.
pub fn compute_backstrides(shape: &[usize], strides: &[isize]) -> Strides {
    shape
        .iter()
        .zip(strides)
        .map(|(&n, &s)| s * (n.saturating_sub(1) as isize))
        .collect()
}

/// Replace the stride of every extent-1 axis by 0.
pub fn normalize_strides(shape: &[usize], strides: &[isize]) -> Strides {
    shape
        .iter()
        .zip(strides)
        .map(|(&n, &s)| if n == 1 { 0 } else { s })
        .collect()
}

/// Whether two shapes are broadcast-compatible after right-alignment.
///
/// Missing leading axes of the shorter shape count as extent 1.
pub fn broadcastable(a: &[usize], b: &[usize]) -> bool {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .all(|(&x, &y)| x == y || x == 1 || y == 1)
}

/// Fixed-rank variant of [`broadcastable`] for two shapes of equal rank.
pub fn broadcastable_fixed<const N: usize>(a: &[usize; N], b: &[usize; N]) -> bool {
    a.iter().zip(b).all(|(&x, &y)| x == y || x == 1 || y == 1)
}

/// Promote two shapes to their common broadcast shape.
///
/// # Errors
/// [`ExprError::ShapeMismatch`] when a pair of right-aligned extents differ
/// and neither is 1.
pub fn promote(a: &[usize], b: &[usize]) -> Result<Dims> {
    let rank = a.len().max(b.len());
    let mut out = Dims::from_elem(1, rank);
    for i in 0..rank {
        let x = if i < a.len() { a[a.len() - 1 - i] } else { 1 };
        let y = if i < b.len() { b[b.len() - 1 - i] } else { 1 };
        out[rank - 1 - i] = match (x, y) {
            _ if x == y => x,
            (1, _) => y,
            (_, 1) => x,
            _ => return Err(ExprError::ShapeMismatch(a.to_vec(), b.to_vec())),
        };
    }
    Ok(out)
}

/// Fixed-rank variant of [`promote`] for two shapes of equal rank.
pub fn promote_fixed<const N: usize>(a: &[usize; N], b: &[usize; N]) -> Result<[usize; N]> {
    let mut out = [0usize; N];
    for i in 0..N {
        out[i] = match (a[i], b[i]) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => return Err(ExprError::ShapeMismatch(a.to_vec(), b.to_vec())),
        };
    }
    Ok(out)
}

/// Merge `shape` into the accumulated shape `inout`.
///
/// On success `inout` holds the promotion of both. The return value tells
/// whether the merge was trivial: both shapes were already identical, so
/// neither side needed rank padding or stretching.
pub fn broadcast_shape(inout: &mut Dims, shape: &[usize]) -> Result<bool> {
    let trivial = inout.as_slice() == shape;
    if !trivial {
        *inout = promote(inout, shape)?;
    }
    Ok(trivial)
}

/// Check that `src` can be broadcast *to* `dest` (one direction only).
///
/// `src` may not have a higher rank than `dest`, and each right-aligned
/// extent of `src` must match `dest` or be 1.
pub fn check_broadcast_to(src: &[usize], dest: &[usize]) -> Result<()> {
    let ok = src.len() <= dest.len()
        && src
            .iter()
            .rev()
            .zip(dest.iter().rev())
            .all(|(&s, &d)| s == d || s == 1);
    if ok {
        Ok(())
    } else {
        Err(ExprError::ShapeMismatch(src.to_vec(), dest.to_vec()))
    }
}

/// Strides that address a `shape`/`strides` operand as if it had shape `target`.
///
/// Leading axes the operand lacks and axes the operand stretches (extent 1)
/// get stride 0.
pub fn broadcast_strides(shape: &[usize], strides: &[isize], target: &[usize]) -> Result<Strides> {
    if shape.len() != strides.len() {
        return Err(ExprError::StrideLengthMismatch);
    }
    check_broadcast_to(shape, target)?;
    let lead = target.len() - shape.len();
    let mut out = Strides::from_elem(0, target.len());
    for (j, (&n, &s)) in shape.iter().zip(strides).enumerate() {
        if n != 1 {
            out[lead + j] = s;
        }
    }
    Ok(out)
}

/// Storage offset of a multi-index, relative to the position of `(0, ..., 0)`.
///
/// Indices are right-aligned with the axes: surplus leading indices are
/// ignored and missing leading indices count as 0. An extent-1 axis always
/// contributes 0, whatever the index, so broadcast callers can pass indices
/// taken from a larger target shape.
pub fn element_offset(shape: &[usize], strides: &[isize], index: &[usize]) -> isize {
    let k = shape.len().min(index.len());
    let idx = &index[index.len() - k..];
    let axes = shape.len() - k;
    idx.iter()
        .zip(&shape[axes..])
        .zip(&strides[axes..])
        .map(|((&i, &n), &s)| if n == 1 { 0 } else { i as isize * s })
        .sum()
}

/// Position of `index` in a walk of `shape` in `traversal` order.
pub fn ravel_index(index: &[usize], shape: &[usize], traversal: Traversal) -> usize {
    let strides = compute_strides(shape, traversal.into());
    index
        .iter()
        .zip(&strides)
        .map(|(&i, &s)| i * s as usize)
        .sum()
}

/// Inverse of [`ravel_index`].
pub fn unravel_index(mut linear: usize, shape: &[usize], traversal: Traversal) -> Dims {
    let mut index = Dims::from_elem(0, shape.len());
    let axes: SmallVec<[usize; 4]> = match traversal {
        Traversal::RowMajor => (0..shape.len()).rev().collect(),
        Traversal::ColumnMajor => (0..shape.len()).collect(),
    };
    for axis in axes {
        let n = shape[axis];
        if n == 0 {
            continue;
        }
        index[axis] = linear % n;
        linear /= n;
    }
    index
}

/// Whether a right-aligned `index` lies inside `shape`, letting extent-1
/// axes take any index. Used by the unchecked accessors' debug assertions.
pub(crate) fn in_broadcast_bounds(shape: &[usize], index: &[usize]) -> bool {
    index
        .iter()
        .rev()
        .zip(shape.iter().rev())
        .all(|(&i, &n)| i < n || n == 1)
}

/// Validate a multi-index against `shape` for a checked accessor.
///
/// Fewer indices than axes are allowed (leading axes read as 0); more are a
/// [`ExprError::DimensionMismatch`]. Extent-1 axes are not broadcast here:
/// each index must lie inside its own axis.
pub fn check_index(shape: &[usize], index: &[usize]) -> Result<()> {
    if index.len() > shape.len() {
        return Err(ExprError::DimensionMismatch {
            got: index.len(),
            rank: shape.len(),
        });
    }
    let lead = shape.len() - index.len();
    for (j, &i) in index.iter().enumerate() {
        let extent = shape[lead + j];
        if i >= extent {
            return Err(ExprError::IndexOutOfBounds {
                index: i as isize,
                axis: lead + j,
                extent,
            });
        }
    }
    Ok(())
}
