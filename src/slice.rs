//! Slice descriptors and view geometry.
//!
//! A view is described by a list of [`SliceSpec`]s, one per source axis
//! (plus `NewAxis` insertions). [`SliceGeometry::resolve`] validates the
//! list against a source shape and records, for every view axis, which
//! source axis it reads and how. [`compute_view`] applies that geometry to
//! a strided source and produces the new `(shape, strides, offset)` triple
//! over the same buffer.

use std::ops::{Range, RangeFrom, RangeFull, RangeInclusive, RangeTo, RangeToInclusive};

use smallvec::SmallVec;

use crate::shape::{Dims, Strides};
use crate::{ExprError, Result};

/// One entry of a slice descriptor list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SliceSpec {
    /// Select a single position and drop the axis. Negative values count
    /// from the end.
    Index(isize),
    /// Keep `start..stop` with the given step. Missing bounds default to the
    /// axis ends for the step direction; negative bounds count from the end.
    Range {
        start: Option<isize>,
        stop: Option<isize>,
        step: isize,
    },
    /// Keep the whole axis.
    All,
    /// Insert a new axis of extent 1.
    NewAxis,
    /// Expand to as many `All` as needed to cover the remaining axes.
    Ellipsis,
    /// Keep the listed positions, in order (index-array selection).
    Keep(Vec<isize>),
}

impl SliceSpec {
    /// A stepped range; `None` bounds run to the axis ends.
    pub fn range(start: Option<isize>, stop: Option<isize>, step: isize) -> Self {
        SliceSpec::Range { start, stop, step }
    }

    /// Replace the step of a range (or of `All`); other descriptors are
    /// returned unchanged.
    pub fn with_step(self, step: isize) -> Self {
        match self {
            SliceSpec::Range { start, stop, .. } => SliceSpec::Range { start, stop, step },
            SliceSpec::All => SliceSpec::Range {
                start: None,
                stop: None,
                step,
            },
            other => other,
        }
    }

    fn consumes_axis(&self) -> bool {
        !matches!(self, SliceSpec::NewAxis | SliceSpec::Ellipsis)
    }
}

impl From<RangeFull> for SliceSpec {
    fn from(_: RangeFull) -> Self {
        SliceSpec::All
    }
}

macro_rules! impl_slice_spec_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for SliceSpec {
                fn from(i: $t) -> Self {
                    SliceSpec::Index(i as isize)
                }
            }

            impl From<Range<$t>> for SliceSpec {
                fn from(r: Range<$t>) -> Self {
                    SliceSpec::range(Some(r.start as isize), Some(r.end as isize), 1)
                }
            }

            impl From<RangeInclusive<$t>> for SliceSpec {
                fn from(r: RangeInclusive<$t>) -> Self {
                    let end = *r.end() as isize;
                    // `-1..=-1` runs to the end of the axis
                    let stop = if end == -1 { None } else { Some(end + 1) };
                    SliceSpec::range(Some(*r.start() as isize), stop, 1)
                }
            }

            impl From<RangeFrom<$t>> for SliceSpec {
                fn from(r: RangeFrom<$t>) -> Self {
                    SliceSpec::range(Some(r.start as isize), None, 1)
                }
            }

            impl From<RangeTo<$t>> for SliceSpec {
                fn from(r: RangeTo<$t>) -> Self {
                    SliceSpec::range(None, Some(r.end as isize), 1)
                }
            }

            impl From<RangeToInclusive<$t>> for SliceSpec {
                fn from(r: RangeToInclusive<$t>) -> Self {
                    let end = r.end as isize;
                    let stop = if end == -1 { None } else { Some(end + 1) };
                    SliceSpec::range(None, stop, 1)
                }
            }
        )*
    };
}

impl_slice_spec_from!(usize, isize, i32);

/// Build a `Vec<SliceSpec>` from ranges, integers and descriptors.
///
/// Each element is converted with `SliceSpec::from`; `range;step` sets a
/// step on a range.
///
/// ```rust
/// use strided_expr::{s, SliceSpec};
///
/// let specs = s![1..3, ..;2, -1, SliceSpec::NewAxis];
/// assert_eq!(specs[0], SliceSpec::range(Some(1), Some(3), 1));
/// assert_eq!(specs[1], SliceSpec::range(None, None, 2));
/// assert_eq!(specs[2], SliceSpec::Index(-1));
/// ```
#[macro_export]
macro_rules! s {
    (@parse [$($acc:expr),*]) => {
        ::std::vec![$($acc),*]
    };
    (@parse [$($acc:expr),*] $r:expr ; $step:expr , $($rest:tt)*) => {
        $crate::s!(@parse [$($acc,)* $crate::SliceSpec::from($r).with_step($step)] $($rest)*)
    };
    (@parse [$($acc:expr),*] $r:expr ; $step:expr) => {
        $crate::s!(@parse [$($acc,)* $crate::SliceSpec::from($r).with_step($step)])
    };
    (@parse [$($acc:expr),*] $r:expr , $($rest:tt)*) => {
        $crate::s!(@parse [$($acc,)* $crate::SliceSpec::from($r)] $($rest)*)
    };
    (@parse [$($acc:expr),*] $r:expr) => {
        $crate::s!(@parse [$($acc,)* $crate::SliceSpec::from($r)])
    };
    ($($t:tt)*) => {
        $crate::s!(@parse [] $($t)*)
    };
}

// ============================================================================
// Geometry
// ============================================================================

/// How one view axis reads its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisMap {
    /// Source index is `start + i * step`.
    Range { axis: usize, start: usize, step: isize },
    /// Source index is `indices[i]`.
    Keep { axis: usize, indices: Vec<usize> },
    /// Inserted axis of extent 1; reads nothing.
    NewAxis,
}

/// Validated view geometry over a source of known shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceGeometry {
    shape: Dims,
    axes: SmallVec<[AxisMap; 4]>,
    /// Source axes fixed by an `Index` descriptor: `(axis, position)`.
    fixed: SmallVec<[(usize, usize); 4]>,
    source_rank: usize,
}

impl SliceGeometry {
    /// Validate `specs` against `source_shape`.
    ///
    /// Fewer descriptors than axes keep the remaining axes whole.
    ///
    /// # Errors
    /// - [`ExprError::DimensionMismatch`] for more axis-consuming descriptors
    ///   than source axes, or more than one `Ellipsis`.
    /// - [`ExprError::IndexOutOfBounds`] for an index, range start or kept
    ///   position outside its axis.
    /// - [`ExprError::ZeroStep`] for a step of 0.
    pub fn resolve(source_shape: &[usize], specs: &[SliceSpec]) -> Result<Self> {
        let rank = source_shape.len();
        let consumed = specs.iter().filter(|s| s.consumes_axis()).count();
        let ellipses = specs.iter().filter(|s| matches!(s, SliceSpec::Ellipsis)).count();
        if consumed > rank || ellipses > 1 {
            return Err(ExprError::DimensionMismatch {
                got: consumed,
                rank,
            });
        }

        let mut geometry = SliceGeometry {
            shape: Dims::new(),
            axes: SmallVec::new(),
            fixed: SmallVec::new(),
            source_rank: rank,
        };

        let mut axis = 0usize;
        for spec in specs {
            match spec {
                SliceSpec::Ellipsis => {
                    for _ in 0..rank - consumed {
                        geometry.push_range(axis, 0, 1, source_shape[axis]);
                        axis += 1;
                    }
                }
                SliceSpec::NewAxis => {
                    geometry.shape.push(1);
                    geometry.axes.push(AxisMap::NewAxis);
                }
                SliceSpec::Index(i) => {
                    let pos = normalize_index(*i, axis, source_shape[axis])?;
                    geometry.fixed.push((axis, pos));
                    axis += 1;
                }
                SliceSpec::All => {
                    geometry.push_range(axis, 0, 1, source_shape[axis]);
                    axis += 1;
                }
                SliceSpec::Range { start, stop, step } => {
                    let (first, len) = stepped_range(*start, *stop, *step, axis, source_shape[axis])?;
                    geometry.push_range(axis, first, *step, len);
                    axis += 1;
                }
                SliceSpec::Keep(list) => {
                    let extent = source_shape[axis];
                    let indices = list
                        .iter()
                        .map(|&i| normalize_index(i, axis, extent))
                        .collect::<Result<Vec<_>>>()?;
                    geometry.shape.push(indices.len());
                    geometry.axes.push(AxisMap::Keep { axis, indices });
                    axis += 1;
                }
            }
        }
        while axis < rank {
            geometry.push_range(axis, 0, 1, source_shape[axis]);
            axis += 1;
        }
        Ok(geometry)
    }

    fn push_range(&mut self, axis: usize, start: usize, step: isize, len: usize) {
        // a single position never steps
        let step = if len <= 1 { 1 } else { step };
        self.shape.push(len);
        self.axes.push(AxisMap::Range { axis, start, step });
    }

    /// Extents of the view.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Per-view-axis source mapping.
    pub fn axes(&self) -> &[AxisMap] {
        &self.axes
    }

    /// Source axes pinned by `Index` descriptors.
    pub fn fixed(&self) -> &[(usize, usize)] {
        &self.fixed
    }

    pub fn source_rank(&self) -> usize {
        self.source_rank
    }

    /// Whether the view can be expressed with constant strides (no `Keep`).
    pub fn is_strided(&self) -> bool {
        !self.axes.iter().any(|a| matches!(a, AxisMap::Keep { .. }))
    }

    /// Whether every kept axis is a unit-step range (no `Keep`, no steps).
    pub fn is_trivially_strided(&self) -> bool {
        self.axes.iter().all(|a| match a {
            AxisMap::Range { step, .. } => *step == 1,
            AxisMap::NewAxis => true,
            AxisMap::Keep { .. } => false,
        })
    }

    /// Map a view multi-index to the source multi-index it reads.
    ///
    /// `index` is right-aligned with the view axes; extent-1 view axes read
    /// position 0 whatever the index.
    pub fn source_index(&self, index: &[usize]) -> Dims {
        let mut src = Dims::from_elem(0, self.source_rank);
        for &(axis, pos) in &self.fixed {
            src[axis] = pos;
        }
        let rank = self.shape.len();
        let k = rank.min(index.len());
        let idx = &index[index.len() - k..];
        for (a, map) in self.axes.iter().enumerate() {
            let i = if a < rank - k || self.shape[a] == 1 {
                0
            } else {
                idx[a - (rank - k)]
            };
            match map {
                AxisMap::Range { axis, start, step } => {
                    src[*axis] = (*start as isize + i as isize * *step) as usize;
                }
                AxisMap::Keep { axis, indices } => {
                    src[*axis] = indices.get(i).copied().unwrap_or(0);
                }
                AxisMap::NewAxis => {}
            }
        }
        src
    }

    /// Strides and base offset of the view over a strided source.
    ///
    /// Returns `None` when the geometry contains a `Keep` axis.
    pub fn strided(&self, strides: &[isize], offset: isize) -> Option<(Strides, isize)> {
        if !self.is_strided() {
            return None;
        }
        let mut base = offset;
        for &(axis, pos) in &self.fixed {
            base += pos as isize * strides[axis];
        }
        let mut out = Strides::with_capacity(self.axes.len());
        for map in &self.axes {
            match map {
                AxisMap::Range { axis, start, step } => {
                    base += *start as isize * strides[*axis];
                    out.push(strides[*axis] * step);
                }
                AxisMap::NewAxis => out.push(0),
                AxisMap::Keep { .. } => return None,
            }
        }
        Some((out, base))
    }
}

/// Result of applying a descriptor list to a strided source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewGeometry {
    pub shape: Dims,
    pub strides: Strides,
    pub offset: isize,
    /// Unit steps only; eligible for contiguous fast paths when the
    /// resulting strides are canonical.
    pub trivially_strided: bool,
}

/// Apply `specs` to a strided source `(shape, strides, offset)`.
///
/// # Errors
/// As [`SliceGeometry::resolve`], plus [`ExprError::NonStridedSelection`]
/// for a `Keep` descriptor.
pub fn compute_view(
    shape: &[usize],
    strides: &[isize],
    offset: isize,
    specs: &[SliceSpec],
) -> Result<ViewGeometry> {
    if shape.len() != strides.len() {
        return Err(ExprError::StrideLengthMismatch);
    }
    let geometry = SliceGeometry::resolve(shape, specs)?;
    let (new_strides, new_offset) = geometry
        .strided(strides, offset)
        .ok_or(ExprError::NonStridedSelection)?;
    Ok(ViewGeometry {
        trivially_strided: geometry.is_trivially_strided(),
        shape: geometry.shape,
        strides: new_strides,
        offset: new_offset,
    })
}

fn normalize_index(i: isize, axis: usize, extent: usize) -> Result<usize> {
    let n = extent as isize;
    let pos = if i < 0 { i + n } else { i };
    if pos < 0 || pos >= n {
        return Err(ExprError::IndexOutOfBounds {
            index: i,
            axis,
            extent,
        });
    }
    Ok(pos as usize)
}

/// First position and length of a stepped range over an axis of `extent`.
///
/// The stop bound is clamped to the axis; an out-of-range start is an
/// error. A range that selects nothing has length 0 and starts at 0.
fn stepped_range(
    start: Option<isize>,
    stop: Option<isize>,
    step: isize,
    axis: usize,
    extent: usize,
) -> Result<(usize, usize)> {
    if step == 0 {
        return Err(ExprError::ZeroStep { axis });
    }
    let n = extent as isize;
    let wrap = |v: isize| if v < 0 { v + n } else { v };
    let out_of_bounds = |v: isize| ExprError::IndexOutOfBounds {
        index: v,
        axis,
        extent,
    };

    if step > 0 {
        let first = match start {
            Some(s) => {
                let w = wrap(s);
                if w < 0 || w > n {
                    return Err(out_of_bounds(s));
                }
                w
            }
            None => 0,
        };
        let last = stop.map_or(n, |s| wrap(s).clamp(0, n));
        if last <= first {
            return Ok((0, 0));
        }
        let len = (last - first - 1) as usize / step as usize + 1;
        Ok((first as usize, len))
    } else {
        if extent == 0 {
            return Ok((0, 0));
        }
        let first = match start {
            Some(s) => {
                let w = wrap(s);
                if w < 0 || w >= n {
                    return Err(out_of_bounds(s));
                }
                w
            }
            None => n - 1,
        };
        let last = stop.map_or(-1, |s| wrap(s).clamp(-1, n - 1));
        if last >= first {
            return Ok((0, 0));
        }
        let len = (first - last - 1) as usize / step.unsigned_abs() + 1;
        Ok((first as usize, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s_macro() {
        let specs = s![1..3, .., 2];
        assert_eq!(
            specs,
            vec![
                SliceSpec::range(Some(1), Some(3), 1),
                SliceSpec::All,
                SliceSpec::Index(2)
            ]
        );
        let stepped = s![..;-1, 1..;2];
        assert_eq!(stepped[0], SliceSpec::range(None, None, -1));
        assert_eq!(stepped[1], SliceSpec::range(Some(1), None, 2));
        let empty: Vec<SliceSpec> = s![];
        assert!(empty.is_empty());
    }

    #[test]
    fn test_row_range_view() {
        // (3, 4) row-major; rows 1..3, all columns
        let v = compute_view(&[3, 4], &[4, 1], 0, &s![1..3, ..]).unwrap();
        assert_eq!(v.shape.as_slice(), &[2, 4]);
        assert_eq!(v.strides.as_slice(), &[4, 1]);
        assert_eq!(v.offset, 4);
        assert!(v.trivially_strided);
    }

    #[test]
    fn test_index_drops_axis() {
        let v = compute_view(&[3, 4], &[4, 1], 0, &s![.., 2]).unwrap();
        assert_eq!(v.shape.as_slice(), &[3]);
        assert_eq!(v.strides.as_slice(), &[4]);
        assert_eq!(v.offset, 2);
        let v = compute_view(&[3, 4], &[4, 1], 0, &s![-1]).unwrap();
        assert_eq!(v.shape.as_slice(), &[4]);
        assert_eq!(v.offset, 8);
    }

    #[test]
    fn test_stepped_and_reversed_ranges() {
        let v = compute_view(&[10], &[1], 0, &s![1..8;3]).unwrap();
        assert_eq!(v.shape.as_slice(), &[3]); // 1, 4, 7
        assert_eq!(v.strides.as_slice(), &[3]);
        assert_eq!(v.offset, 1);
        assert!(!v.trivially_strided);

        let v = compute_view(&[5], &[1], 0, &s![..;-1]).unwrap();
        assert_eq!(v.shape.as_slice(), &[5]);
        assert_eq!(v.strides.as_slice(), &[-1]);
        assert_eq!(v.offset, 4);

        let v = compute_view(&[5], &[1], 0, &[SliceSpec::range(Some(3), Some(0), -2)]).unwrap();
        assert_eq!(v.shape.as_slice(), &[2]); // 3, 1
        assert_eq!(v.offset, 3);
    }

    #[test]
    fn test_negative_extent_is_empty() {
        let v = compute_view(&[5], &[1], 0, &s![3..1]).unwrap();
        assert_eq!(v.shape.as_slice(), &[0]);
        // stop past the end is clamped
        let v = compute_view(&[5], &[1], 0, &s![2..100]).unwrap();
        assert_eq!(v.shape.as_slice(), &[3]);
    }

    #[test]
    fn test_extreme_steps_select_one_element() {
        let v = compute_view(&[5], &[4], 0, &[SliceSpec::range(Some(0), Some(5), isize::MAX)]).unwrap();
        assert_eq!(v.shape.as_slice(), &[1]);
        assert_eq!(v.offset, 0);
        assert!(v.trivially_strided);

        let v = compute_view(&[5], &[4], 0, &[SliceSpec::range(None, None, isize::MIN)]).unwrap();
        assert_eq!(v.shape.as_slice(), &[1]);
        assert_eq!(v.offset, 16);

        let v = compute_view(&[5], &[1], 0, &[SliceSpec::range(Some(1), None, isize::MAX - 1)]).unwrap();
        assert_eq!(v.shape.as_slice(), &[1]);
        assert_eq!(v.offset, 1);
    }

    #[test]
    fn test_new_axis_and_ellipsis() {
        let v = compute_view(
            &[2, 3, 4],
            &[12, 4, 1],
            0,
            &[SliceSpec::NewAxis, SliceSpec::Ellipsis, SliceSpec::Index(1)],
        )
        .unwrap();
        assert_eq!(v.shape.as_slice(), &[1, 2, 3]);
        assert_eq!(v.strides.as_slice(), &[0, 12, 4]);
        assert_eq!(v.offset, 1);
    }

    #[test]
    fn test_fewer_descriptors_keep_trailing_axes() {
        let v = compute_view(&[2, 3, 4], &[12, 4, 1], 0, &s![1]).unwrap();
        assert_eq!(v.shape.as_slice(), &[3, 4]);
        assert_eq!(v.offset, 12);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            compute_view(&[3, 4], &[4, 1], 0, &s![3]).unwrap_err(),
            ExprError::IndexOutOfBounds { index: 3, axis: 0, extent: 3 }
        );
        assert_eq!(
            compute_view(&[3, 4], &[4, 1], 0, &s![.., .., 0]).unwrap_err(),
            ExprError::DimensionMismatch { got: 3, rank: 2 }
        );
        assert_eq!(
            compute_view(&[3, 4], &[4, 1], 0, &s![..;0]).unwrap_err(),
            ExprError::ZeroStep { axis: 0 }
        );
        assert!(matches!(
            compute_view(&[3, 4], &[4, 1], 0, &s![5..]),
            Err(ExprError::IndexOutOfBounds { index: 5, .. })
        ));
        assert!(compute_view(
            &[3, 4],
            &[4, 1],
            0,
            &[SliceSpec::Ellipsis, SliceSpec::Ellipsis]
        )
        .is_err());
    }

    #[test]
    fn test_keep_is_not_strided() {
        let g = SliceGeometry::resolve(&[5, 2], &[SliceSpec::Keep(vec![4, 0, -2])]).unwrap();
        assert_eq!(g.shape(), &[3, 2]);
        assert!(!g.is_strided());
        assert_eq!(g.source_index(&[2, 1]).as_slice(), &[3, 1]);
        assert_eq!(
            compute_view(&[5, 2], &[2, 1], 0, &[SliceSpec::Keep(vec![0])]),
            Err(ExprError::NonStridedSelection)
        );
    }

    #[test]
    fn test_source_index_broadcast_aware() {
        let g = SliceGeometry::resolve(&[3, 4], &s![1..2, 1..4]).unwrap();
        assert_eq!(g.shape(), &[1, 3]);
        // index on the extent-1 axis is ignored
        assert_eq!(g.source_index(&[7, 2]).as_slice(), &[1, 3]);
        // missing leading index reads 0
        assert_eq!(g.source_index(&[0]).as_slice(), &[1, 1]);
    }
}
