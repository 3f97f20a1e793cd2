//! View node over an arbitrary expression.
//!
//! [`View`] applies a list of [`SliceSpec`]s to any [`Expression`]. The
//! geometry is validated once at construction; element access maps the view
//! index back to a source index. When the source reads straight from a
//! buffer, the view's own strides and offset are derived on first use and
//! cached, which lets the assignment engine treat the view as a strided
//! leaf.

use std::sync::OnceLock;

use crate::cursor::Cursor;
use crate::expression::{Expression, StridedParts};
use crate::layout::{layout_matches, Layout, Traversal};
use crate::shape::{self, Dims, Strides};
use crate::slice::{AxisMap, SliceGeometry, SliceSpec};
use crate::Result;

/// A sliced, re-indexed presentation of `E`.
///
/// # Example
/// ```rust
/// use strided_expr::{s, Array, Expression, Layout, View};
///
/// let a = Array::from_vec((0..12).collect::<Vec<i32>>(), &[3, 4], Layout::RowMajor).unwrap();
/// let v = View::new(&a, &s![1..3, ..;2]).unwrap();
/// assert_eq!(v.shape().as_slice(), &[2, 2]);
/// assert_eq!(v.get(&[1, 1]).unwrap(), 10);
/// ```
#[derive(Debug, Clone)]
pub struct View<E> {
    expr: E,
    geometry: SliceGeometry,
    strided: OnceLock<Option<StridedGeometry>>,
}

/// Addressing of a [`View`] into the buffer of its source.
#[derive(Debug, Clone)]
struct StridedGeometry {
    strides: Strides,
    offset: usize,
    /// The view is one block of the buffer starting at `offset`.
    contiguous: bool,
}

impl<E: Expression> View<E> {
    /// Build a view of `expr`.
    ///
    /// # Errors
    /// See [`SliceGeometry::resolve`]. Errors surface here, never when the
    /// view is later read.
    pub fn new(expr: E, specs: &[SliceSpec]) -> Result<Self> {
        let geometry = SliceGeometry::resolve(&expr.shape(), specs)?;
        Ok(Self {
            expr,
            geometry,
            strided: OnceLock::new(),
        })
    }

    pub fn inner(&self) -> &E {
        &self.expr
    }

    /// The resolved geometry.
    pub fn geometry(&self) -> &SliceGeometry {
        &self.geometry
    }

    /// Whether every kept axis is a unit-step range.
    pub fn is_trivially_strided(&self) -> bool {
        self.geometry.is_trivially_strided()
    }

    fn strided_geometry(&self) -> Option<&StridedGeometry> {
        self.strided
            .get_or_init(|| {
                let parts = self.expr.strided()?;
                let (strides, offset) = self.geometry.strided(&parts.strides, parts.offset as isize)?;
                let offset = usize::try_from(offset).ok()?;
                let dims = self.geometry.shape();
                let canonical = layout_matches(dims, &strides, Layout::RowMajor, false)
                    || layout_matches(dims, &strides, Layout::ColumnMajor, false);
                let contiguous = canonical && offset + shape::size(dims) <= parts.data.len();
                Some(StridedGeometry {
                    strides,
                    offset,
                    contiguous,
                })
            })
            .as_ref()
    }

    /// Buffer and start of the contiguous block this view covers.
    fn contiguous_block(&self) -> Option<(&[E::Elem], usize)> {
        let g = self.strided_geometry().filter(|g| g.contiguous)?;
        Some((self.expr.buffer()?, g.offset))
    }
}

/// Build a [`View`] of `expr`; see [`View::new`].
pub fn view<E: Expression>(expr: E, specs: &[SliceSpec]) -> Result<View<E>> {
    View::new(expr, specs)
}

impl<E: Expression> Expression for View<E> {
    type Elem = E::Elem;
    type Cursor<'a> = ViewCursor<'a, E::Cursor<'a>> where Self: 'a;

    fn shape(&self) -> Dims {
        Dims::from_slice(self.geometry.shape())
    }

    fn dimension(&self) -> usize {
        self.geometry.shape().len()
    }

    #[inline]
    fn element(&self, index: &[usize]) -> E::Elem {
        self.expr.element(&self.geometry.source_index(index))
    }

    fn is_trivial_broadcast(&self, strides: &[isize]) -> bool {
        self.strided().is_some_and(|p| p.matches_strides(strides))
    }

    #[inline]
    fn linear_element(&self, i: usize) -> E::Elem {
        match self.contiguous_block() {
            Some((data, start)) => data[start + i],
            None => self.element(&shape::unravel_index(i, self.geometry.shape(), Traversal::RowMajor)),
        }
    }

    fn strided(&self) -> Option<StridedParts<'_, E::Elem>> {
        let g = self.strided_geometry()?;
        Some(StridedParts {
            data: self.expr.buffer()?,
            shape: Dims::from_slice(self.geometry.shape()),
            strides: g.strides.clone(),
            offset: g.offset,
        })
    }

    fn contiguous_slice(&self) -> Option<&[E::Elem]> {
        let (data, start) = self.contiguous_block()?;
        data.get(start..start + shape::size(self.geometry.shape()))
    }

    fn buffer(&self) -> Option<&[E::Elem]> {
        self.strided_geometry()?;
        self.expr.buffer()
    }

    fn cursor(&self, target: &[usize]) -> Self::Cursor<'_> {
        ViewCursor::new(self.expr.cursor(&self.expr.shape()), &self.geometry, target.len())
    }
}

/// Cursor of a [`View`].
///
/// Wraps a cursor over the whole source and translates each view-axis move
/// into a move along the mapped source axis: a range axis steps by its
/// slice step, a kept axis jumps between listed positions, and inserted or
/// broadcast axes do not move.
#[derive(Debug, Clone)]
pub struct ViewCursor<'a, C> {
    inner: C,
    geometry: &'a SliceGeometry,
    lead: usize,
    pos: Dims,
}

impl<'a, C: Cursor> ViewCursor<'a, C> {
    fn new(inner: C, geometry: &'a SliceGeometry, target_rank: usize) -> Self {
        let rank = geometry.shape().len();
        debug_assert!(target_rank >= rank);
        let mut cursor = Self {
            inner,
            geometry,
            lead: target_rank.saturating_sub(rank),
            pos: Dims::from_elem(0, rank),
        };
        cursor.to_begin();
        cursor
    }

    /// Move the source cursor by `delta` positions of source axis `axis`.
    #[inline]
    fn shift(&mut self, axis: usize, delta: isize) {
        if delta >= 0 {
            self.inner.step_n(axis, delta as usize);
        } else {
            self.inner.step_back_n(axis, delta.unsigned_abs());
        }
    }

    /// View axis for a target axis, if it can move at all.
    #[inline]
    fn view_axis(&self, target_axis: usize) -> Option<usize> {
        let a = target_axis.checked_sub(self.lead)?;
        (self.geometry.shape()[a] > 1).then_some(a)
    }

    /// Move view axis `a` from its current position to `to`.
    fn move_to(&mut self, a: usize, to: usize) {
        let from = self.pos[a];
        self.pos[a] = to;
        let geometry = self.geometry;
        match &geometry.axes()[a] {
            AxisMap::Range { axis, step, .. } => {
                self.shift(*axis, (to as isize - from as isize) * step);
            }
            AxisMap::Keep { axis, indices } => {
                let before = indices.get(from).copied().unwrap_or(0) as isize;
                let after = indices.get(to).copied().unwrap_or(0) as isize;
                self.shift(*axis, after - before);
            }
            AxisMap::NewAxis => {}
        }
    }
}

impl<'a, C: Cursor> Cursor for ViewCursor<'a, C> {
    type Item = C::Item;

    fn step_n(&mut self, axis: usize, n: usize) {
        if let Some(a) = self.view_axis(axis) {
            self.move_to(a, self.pos[a].wrapping_add(n));
        }
    }

    fn step_back_n(&mut self, axis: usize, n: usize) {
        if let Some(a) = self.view_axis(axis) {
            // Positions may pass before the first element transiently.
            self.move_to(a, self.pos[a].wrapping_sub(n));
        }
    }

    fn reset(&mut self, axis: usize) {
        if let Some(a) = self.view_axis(axis) {
            self.move_to(a, 0);
        }
    }

    fn reset_back(&mut self, axis: usize) {
        if let Some(a) = self.view_axis(axis) {
            self.move_to(a, self.geometry.shape()[a] - 1);
        }
    }

    fn to_begin(&mut self) {
        self.inner.to_begin();
        self.pos.iter_mut().for_each(|p| *p = 0);
        let geometry = self.geometry;
        for &(axis, pos) in geometry.fixed() {
            self.inner.step_n(axis, pos);
        }
        for map in geometry.axes() {
            match map {
                AxisMap::Range { axis, start, .. } => self.inner.step_n(*axis, *start),
                AxisMap::Keep { axis, indices } => {
                    if let Some(&first) = indices.first() {
                        self.inner.step_n(*axis, first);
                    }
                }
                AxisMap::NewAxis => {}
            }
        }
    }

    #[inline]
    fn value(&self) -> C::Item {
        self.inner.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{binary, s, Array, Broadcast, ExprError, Layout, Scalar};

    fn iota(shape: &[usize]) -> Array<i64> {
        let n = shape.iter().product::<usize>() as i64;
        Array::from_vec((0..n).collect(), shape, Layout::RowMajor).unwrap()
    }

    fn collect<E: Expression>(e: &E) -> Vec<E::Elem> {
        e.elements(Layout::RowMajor).unwrap().collect()
    }

    #[test]
    fn test_view_of_array_rows() {
        let a = iota(&[3, 4]);
        let v = View::new(&a, &s![1..3, ..]).unwrap();
        assert_eq!(v.shape().as_slice(), &[2, 4]);
        let parts = v.strided().unwrap();
        assert_eq!(parts.strides.as_slice(), &[4, 1]);
        assert_eq!(parts.offset, 4);
        assert_eq!(v.contiguous_slice(), Some(&a.as_slice()[4..12]));
        assert_eq!(collect(&v), (4..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_stepped_and_reversed_view() {
        let a = iota(&[3, 4]);
        let v = View::new(&a, &s![..;-1, 1..;2]).unwrap();
        assert_eq!(v.shape().as_slice(), &[3, 2]);
        assert_eq!(collect(&v), vec![9, 11, 5, 7, 1, 3]);
        assert!(!v.is_trivially_strided());
        assert!(v.contiguous_slice().is_none());
    }

    #[test]
    fn test_keep_selection_walks_listed_positions() {
        let a = iota(&[4, 2]);
        let v = View::new(&a, &[SliceSpec::Keep(vec![3, 0, 2]), SliceSpec::All]).unwrap();
        assert_eq!(v.shape().as_slice(), &[3, 2]);
        assert!(v.strided().is_none());
        assert_eq!(collect(&v), vec![6, 7, 0, 1, 4, 5]);
        let cm: Vec<i64> = v.elements(Layout::ColumnMajor).unwrap().collect();
        assert_eq!(cm, vec![6, 0, 4, 7, 1, 5]);
        assert_eq!(v.element(&[2, 1]), 5);
    }

    #[test]
    fn test_view_of_function() {
        let a = iota(&[2, 3]);
        let f = binary(|x: i64, y: i64| x * y, &a, Scalar(10)).unwrap();
        let v = View::new(&f, &s![.., 2]).unwrap();
        assert_eq!(v.shape().as_slice(), &[2]);
        assert!(v.strided().is_none());
        assert_eq!(collect(&v), vec![20, 50]);
        assert_eq!(v.linear_element(1), 50);
    }

    #[test]
    fn test_view_of_broadcast() {
        let row = iota(&[3]);
        let b = Broadcast::new(&row, &[4, 3]).unwrap();
        let v = View::new(&b, &s![1..3, ..;-1]).unwrap();
        assert_eq!(collect(&v), vec![2, 1, 0, 2, 1, 0]);
        let parts = v.strided().unwrap();
        assert_eq!(parts.strides.as_slice(), &[0, -1]);
    }

    #[test]
    fn test_new_axis_is_broadcast_in_cursor() {
        let a = iota(&[3]);
        let v = View::new(&a, &[SliceSpec::NewAxis, SliceSpec::All]).unwrap();
        assert_eq!(v.shape().as_slice(), &[1, 3]);
        // broadcast (1, 3) to (2, 3): the inserted axis never moves
        let mut c = v.cursor(&[2, 3]);
        c.step(1);
        c.step(0);
        assert_eq!(c.value(), 1);
        c.reset(0);
        assert_eq!(c.value(), 1);
    }

    #[test]
    fn test_cursor_with_leading_target_axes() {
        let a = iota(&[2, 4]);
        let v = View::new(&a, &s![1, 1..]).unwrap();
        let mut c = v.cursor(&[2, 3]);
        assert_eq!(c.value(), 5);
        c.step(1);
        c.step(1);
        assert_eq!(c.value(), 7);
        c.step(0);
        assert_eq!(c.value(), 7);
        c.reset(1);
        assert_eq!(c.value(), 5);
        c.reset_back(1);
        assert_eq!(c.value(), 7);
    }

    #[test]
    fn test_cursor_end_of_view() {
        let a = iota(&[3, 4]);
        let v = View::new(&a, &s![1.., 1..3]).unwrap();
        let mut end = v.cursor_end(&[2, 2], Layout::RowMajor).unwrap();
        end.step_back(1);
        assert_eq!(end.value(), 10);
    }

    #[test]
    fn test_invalid_view_fails_at_construction() {
        let a = iota(&[3, 4]);
        assert_eq!(
            View::new(&a, &s![0, 0, 0]).err(),
            Some(ExprError::DimensionMismatch { got: 3, rank: 2 })
        );
        assert!(matches!(
            view(&a, &s![.., 7]),
            Err(ExprError::IndexOutOfBounds { index: 7, axis: 1, .. })
        ));
    }

    #[test]
    fn test_linear_element_reads_contiguous_block() {
        let a = iota(&[4, 3]);
        let v = View::new(&a, &s![1..3, ..]).unwrap();
        let block = v.contiguous_slice().unwrap();
        for i in 0..6 {
            assert_eq!(v.linear_element(i), block[i]);
            assert_eq!(v.linear_element(i), 3 + i as i64);
        }
        assert_eq!(v.buffer().map(<[i64]>::len), Some(12));

        // stepped rows fall back to indexed reads
        let stepped = View::new(&a, &s![..;2, 1..]).unwrap();
        assert!(stepped.contiguous_slice().is_none());
        assert_eq!((0..4).map(|i| stepped.linear_element(i)).collect::<Vec<_>>(), vec![1, 2, 7, 8]);
    }

    #[test]
    fn test_view_is_shared_across_threads() {
        fn assert_sync<T: Sync>() {}
        assert_sync::<View<&Array<i64>>>();

        let a = iota(&[4, 4]);
        let v = View::new(&a, &s![1.., ..;2]).unwrap();
        let sums: Vec<i64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..3)
                .map(|row| {
                    let v = &v;
                    scope.spawn(move || (0..2).map(|col| v.element(&[row, col])).sum::<i64>())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(sums, vec![4 + 6, 8 + 10, 12 + 14]);
        assert!(v.strided().is_some());
    }

    #[test]
    fn test_full_view_round_trip() {
        let a = iota(&[2, 3]);
        let v = View::new(&a, &[]).unwrap();
        let parts = v.strided().unwrap();
        assert_eq!(parts.shape.as_slice(), a.dims());
        assert_eq!(parts.strides.as_slice(), a.strides());
        assert_eq!(parts.offset, a.offset());
        assert!(v.is_trivial_broadcast(&[3, 1]));
        assert_eq!(v.linear_element(4), 4);
    }
}
