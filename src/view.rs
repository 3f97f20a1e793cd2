//! Strided views over existing buffers.
//!
//! [`StridedView`] and [`StridedViewMut`] address a borrowed slice through
//! a shape, a stride per axis (in elements, possibly zero or negative) and a
//! base offset. Slicing, permuting and broadcasting produce new views over
//! the same buffer without copying.
//!
//! Both types implement [`Expression`], and [`StridedViewMut`] is the
//! destination type of [`assign`](crate::assign).

use crate::assign::assign;
use crate::cursor::{IndexWalker, StridedCursor, StridedCursorMut};
use crate::expression::{Expression, StridedParts};
use crate::layout::{layout_of, Layout, Traversal};
use crate::shape::{self, Dims, Strides};
use crate::slice::{compute_view, SliceSpec};
use crate::{ExprError, Result};

/// An immutable strided view over a slice.
///
/// # Example
/// ```rust
/// use strided_expr::{Expression, StridedView};
///
/// let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
/// let view = StridedView::new(&data, &[2, 3], &[3, 1], 0).unwrap();
/// let t = view.transpose();
/// assert_eq!(t.dims(), &[3, 2]);
/// assert_eq!(t.get(&[2, 1]).unwrap(), 6.0);
/// ```
#[derive(Debug, Clone)]
pub struct StridedView<'a, T> {
    data: &'a [T],
    shape: Dims,
    strides: Strides,
    offset: usize,
}

/// A mutable strided view over a slice.
#[derive(Debug)]
pub struct StridedViewMut<'a, T> {
    data: &'a mut [T],
    shape: Dims,
    strides: Strides,
    offset: usize,
}

impl<'a, T> StridedView<'a, T> {
    /// Create a new strided view.
    ///
    /// # Errors
    /// [`ExprError::StrideLengthMismatch`] if `strides` and `shape` differ in
    /// length, [`ExprError::OffsetOverflow`] if some index would address
    /// outside `data`.
    pub fn new(data: &'a [T], shape: &[usize], strides: &[isize], offset: usize) -> Result<Self> {
        validate_bounds(data.len(), shape, strides, offset)?;
        Ok(Self {
            data,
            shape: Dims::from_slice(shape),
            strides: Strides::from_slice(strides),
            offset,
        })
    }

    /// Build from parts already known to be in bounds.
    pub(crate) fn from_parts_unchecked(data: &'a [T], shape: Dims, strides: Strides, offset: usize) -> Self {
        debug_assert!(validate_bounds(data.len(), &shape, &strides, offset).is_ok());
        Self {
            data,
            shape,
            strides,
            offset,
        }
    }

    /// View of a whole slice as a dense array of `shape` in `layout`.
    pub fn from_slice(data: &'a [T], shape: &[usize], layout: Layout) -> Result<Self> {
        if data.len() != shape::size(shape) {
            return Err(ExprError::ShapeMismatch(vec![data.len()], shape.to_vec()));
        }
        Self::new(data, shape, &shape::compute_strides(shape, layout), 0)
    }

    /// Extent of each axis.
    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.shape
    }

    /// Stride of each axis.
    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Back-stride of each axis.
    pub fn backstrides(&self) -> Strides {
        shape::compute_backstrides(&self.shape, &self.strides)
    }

    /// Position of `(0, ..., 0)` in the buffer.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        shape::size(&self.shape)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// The underlying buffer.
    #[inline]
    pub fn data(&self) -> &'a [T] {
        self.data
    }

    /// Layout recognized from the strides.
    pub fn layout(&self) -> Layout {
        layout_of(&self.shape, &self.strides)
    }

    /// Whether the elements occupy one contiguous block in a canonical order.
    pub fn is_contiguous(&self) -> bool {
        self.layout() != Layout::Dynamic
    }

    /// Sub-view selected by slice descriptors.
    ///
    /// # Errors
    /// See [`compute_view`].
    pub fn slice(&self, specs: &[SliceSpec]) -> Result<StridedView<'a, T>> {
        let g = compute_view(&self.shape, &self.strides, self.offset as isize, specs)?;
        let offset = usize::try_from(g.offset).map_err(|_| ExprError::OffsetOverflow)?;
        StridedView::new(self.data, &g.shape, &g.strides, offset)
    }

    /// Reorder axes: axis `i` of the result is axis `perm[i]` of `self`.
    ///
    /// # Errors
    /// [`ExprError::DimensionMismatch`] for a wrong length,
    /// [`ExprError::InvalidAxis`] for a repeated or out-of-range axis.
    pub fn permute(&self, perm: &[usize]) -> Result<StridedView<'a, T>> {
        let (shape, strides) = permute_axes(&self.shape, &self.strides, perm)?;
        Ok(StridedView {
            data: self.data,
            shape,
            strides,
            offset: self.offset,
        })
    }

    /// Reverse the axis order.
    pub fn transpose(&self) -> StridedView<'a, T> {
        StridedView {
            data: self.data,
            shape: self.shape.iter().rev().copied().collect(),
            strides: self.strides.iter().rev().copied().collect(),
            offset: self.offset,
        }
    }

    /// Present the view with a larger shape; stretched axes get stride 0.
    ///
    /// # Errors
    /// [`ExprError::ShapeMismatch`] if the view cannot be broadcast to `shape`.
    pub fn broadcast(&self, shape: &[usize]) -> Result<StridedView<'a, T>> {
        let strides = shape::broadcast_strides(&self.shape, &self.strides, shape)?;
        Ok(StridedView {
            data: self.data,
            shape: Dims::from_slice(shape),
            strides,
            offset: self.offset,
        })
    }

    fn parts(&self) -> StridedParts<'a, T> {
        StridedParts {
            data: self.data,
            shape: self.shape.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
        }
    }
}

impl<'a, T: Copy> Expression for StridedView<'a, T> {
    type Elem = T;
    type Cursor<'b> = StridedCursor<'b, T> where Self: 'b;

    fn shape(&self) -> Dims {
        self.shape.clone()
    }

    fn dimension(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    fn element(&self, index: &[usize]) -> T {
        debug_assert!(shape::in_broadcast_bounds(&self.shape, index));
        let pos = self.offset as isize + shape::element_offset(&self.shape, &self.strides, index);
        self.data[pos as usize]
    }

    fn is_trivial_broadcast(&self, strides: &[isize]) -> bool {
        crate::broadcast::is_trivial_broadcast(&self.shape, &self.strides, strides)
    }

    #[inline]
    fn linear_element(&self, i: usize) -> T {
        self.data[self.offset + i]
    }

    fn strided(&self) -> Option<StridedParts<'_, T>> {
        Some(self.parts())
    }

    fn contiguous_slice(&self) -> Option<&[T]> {
        self.parts().contiguous()
    }

    fn buffer(&self) -> Option<&[T]> {
        Some(self.data)
    }

    fn cursor(&self, target: &[usize]) -> StridedCursor<'_, T> {
        StridedCursor::new(self.data, &self.shape, &self.strides, self.offset, target)
    }
}

impl<'a, T> StridedViewMut<'a, T> {
    /// Create a new mutable strided view.
    ///
    /// Distinct indices may alias the same element (e.g. stride 0); writes
    /// through such a view land on the shared element.
    ///
    /// # Errors
    /// As [`StridedView::new`].
    pub fn new(
        data: &'a mut [T],
        shape: &[usize],
        strides: &[isize],
        offset: usize,
    ) -> Result<Self> {
        validate_bounds(data.len(), shape, strides, offset)?;
        Ok(Self {
            data,
            shape: Dims::from_slice(shape),
            strides: Strides::from_slice(strides),
            offset,
        })
    }

    /// Build from parts already known to be in bounds.
    pub(crate) fn from_parts_unchecked(
        data: &'a mut [T],
        shape: Dims,
        strides: Strides,
        offset: usize,
    ) -> Self {
        debug_assert!(validate_bounds(data.len(), &shape, &strides, offset).is_ok());
        Self {
            data,
            shape,
            strides,
            offset,
        }
    }

    /// Mutable view of a whole slice as a dense array of `shape` in `layout`.
    pub fn from_slice(data: &'a mut [T], shape: &[usize], layout: Layout) -> Result<Self> {
        if data.len() != shape::size(shape) {
            return Err(ExprError::ShapeMismatch(vec![data.len()], shape.to_vec()));
        }
        let strides = shape::compute_strides(shape, layout);
        Self::new(data, shape, &strides, 0)
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn len(&self) -> usize {
        shape::size(&self.shape)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn layout(&self) -> Layout {
        layout_of(&self.shape, &self.strides)
    }

    /// Immutable view of the same elements.
    pub fn as_view(&self) -> StridedView<'_, T> {
        StridedView {
            data: &*self.data,
            shape: self.shape.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
        }
    }

    /// Reborrow as a shorter-lived mutable view.
    pub fn reborrow(&mut self) -> StridedViewMut<'_, T> {
        StridedViewMut {
            data: &mut *self.data,
            shape: self.shape.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
        }
    }

    /// Mutable sub-view selected by slice descriptors.
    pub fn slice_mut(&mut self, specs: &[SliceSpec]) -> Result<StridedViewMut<'_, T>> {
        self.reborrow().into_slice(specs)
    }

    /// Consume the view and keep the part selected by slice descriptors.
    pub fn into_slice(self, specs: &[SliceSpec]) -> Result<StridedViewMut<'a, T>> {
        let g = compute_view(&self.shape, &self.strides, self.offset as isize, specs)?;
        let offset = usize::try_from(g.offset).map_err(|_| ExprError::OffsetOverflow)?;
        StridedViewMut::new(self.data, &g.shape, &g.strides, offset)
    }

    /// Reorder axes; see [`StridedView::permute`].
    pub fn permute(self, perm: &[usize]) -> Result<StridedViewMut<'a, T>> {
        let (shape, strides) = permute_axes(&self.shape, &self.strides, perm)?;
        Ok(StridedViewMut {
            data: self.data,
            shape,
            strides,
            offset: self.offset,
        })
    }

    /// Reverse the axis order.
    pub fn transpose(self) -> StridedViewMut<'a, T> {
        StridedViewMut {
            data: self.data,
            shape: self.shape.iter().rev().copied().collect(),
            strides: self.strides.iter().rev().copied().collect(),
            offset: self.offset,
        }
    }

    /// Store `value` at `index`.
    ///
    /// # Errors
    /// As [`Expression::get`].
    pub fn set(&mut self, index: &[usize], value: T) -> Result<()> {
        shape::check_index(&self.shape, index)?;
        let pos = self.offset as isize + shape::element_offset(&self.shape, &self.strides, index);
        self.data[pos as usize] = value;
        Ok(())
    }

    /// Writable cursor at `(0, ..., 0)` broadcast to `target`.
    pub fn cursor_mut(&mut self, target: &[usize]) -> StridedCursorMut<'_, T> {
        StridedCursorMut::new(&mut *self.data, &self.shape, &self.strides, self.offset, target)
    }

    /// Mutable contiguous block holding all elements, in this view's
    /// canonical order, if there is one.
    pub(crate) fn contiguous_mut(&mut self) -> Option<&mut [T]> {
        if !self.is_contiguous_canonical() {
            return None;
        }
        let n = self.len();
        self.data.get_mut(self.offset..self.offset + n)
    }

    pub(crate) fn is_contiguous_canonical(&self) -> bool {
        self.layout() != Layout::Dynamic
    }

    /// Raw buffer and addressing for the strided copy kernel.
    pub(crate) fn raw_parts_mut(&mut self) -> (&mut [T], &[usize], &[isize], usize) {
        (&mut *self.data, &self.shape, &self.strides, self.offset)
    }
}

impl<'a, T: Copy> StridedViewMut<'a, T> {
    /// Set every element to `value`.
    pub fn fill(&mut self, value: T) {
        if let Some(block) = self.contiguous_mut() {
            block.fill(value);
            return;
        }
        if self.is_empty() {
            return;
        }
        let target = self.shape.clone();
        let mut cursor = self.cursor_mut(&target);
        let mut walker = IndexWalker::new(&target, Traversal::RowMajor);
        loop {
            cursor.write(value);
            if !walker.advance(&mut cursor) {
                break;
            }
        }
    }

    /// Evaluate `src` into this view; see [`assign`](crate::assign).
    pub fn assign<E: Expression<Elem = T>>(&mut self, src: &E) -> Result<()> {
        assign(self, src)
    }
}

impl<'a, T: Copy> Expression for StridedViewMut<'a, T> {
    type Elem = T;
    type Cursor<'b> = StridedCursor<'b, T> where Self: 'b;

    fn shape(&self) -> Dims {
        self.shape.clone()
    }

    #[inline]
    fn element(&self, index: &[usize]) -> T {
        debug_assert!(shape::in_broadcast_bounds(&self.shape, index));
        let pos = self.offset as isize + shape::element_offset(&self.shape, &self.strides, index);
        self.data[pos as usize]
    }

    fn is_trivial_broadcast(&self, strides: &[isize]) -> bool {
        crate::broadcast::is_trivial_broadcast(&self.shape, &self.strides, strides)
    }

    #[inline]
    fn linear_element(&self, i: usize) -> T {
        self.data[self.offset + i]
    }

    fn strided(&self) -> Option<StridedParts<'_, T>> {
        Some(StridedParts {
            data: &*self.data,
            shape: self.shape.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
        })
    }

    fn contiguous_slice(&self) -> Option<&[T]> {
        self.strided().and_then(|p| p.contiguous())
    }

    fn buffer(&self) -> Option<&[T]> {
        Some(&*self.data)
    }

    fn cursor(&self, target: &[usize]) -> StridedCursor<'_, T> {
        StridedCursor::new(&*self.data, &self.shape, &self.strides, self.offset, target)
    }
}

/// Check that every index of `shape` addresses inside `0..data_len`.
pub(crate) fn validate_bounds(
    data_len: usize,
    shape: &[usize],
    strides: &[isize],
    offset: usize,
) -> Result<()> {
    if shape.len() != strides.len() {
        return Err(ExprError::StrideLengthMismatch);
    }
    if shape.contains(&0) {
        // Empty view, nothing is ever read
        return Ok(());
    }

    let mut min_offset = offset as isize;
    let mut max_offset = offset as isize;
    for (&n, &s) in shape.iter().zip(strides) {
        let reach = s
            .checked_mul((n - 1) as isize)
            .ok_or(ExprError::OffsetOverflow)?;
        if reach >= 0 {
            max_offset += reach;
        } else {
            min_offset += reach;
        }
    }

    if min_offset < 0 || max_offset as usize >= data_len {
        return Err(ExprError::OffsetOverflow);
    }
    Ok(())
}

/// Apply an axis permutation to a shape/stride pair.
pub(crate) fn permute_axes(
    shape: &[usize],
    strides: &[isize],
    perm: &[usize],
) -> Result<(Dims, Strides)> {
    let rank = shape.len();
    if perm.len() != rank {
        return Err(ExprError::DimensionMismatch {
            got: perm.len(),
            rank,
        });
    }
    let mut seen: smallvec::SmallVec<[bool; 8]> = smallvec::smallvec![false; rank];
    for &p in perm {
        if p >= rank || seen[p] {
            return Err(ExprError::InvalidAxis { axis: p, rank });
        }
        seen[p] = true;
    }
    Ok((
        perm.iter().map(|&p| shape[p]).collect(),
        perm.iter().map(|&p| strides[p]).collect(),
    ))
}
