//! Owned dense storage.
//!
//! [`Array`] owns a flat buffer plus the shape, strides, back-strides,
//! offset and layout that address it. It is the only leaf of the expression
//! tree that owns memory, and the usual destination of an assignment.

use std::ops::{Index, IndexMut};

use num_traits::Zero;

use crate::assign::assign;
use crate::cursor::StridedCursor;
use crate::expression::{Expression, StridedParts};
use crate::layout::{layout_of, Layout};
use crate::shape::{self, Dims, Strides};
use crate::slice::SliceSpec;
use crate::view::{permute_axes, validate_bounds, StridedView, StridedViewMut};
use crate::{ExprError, Result};

/// Owned N-dimensional array.
///
/// Constructors taking a [`Layout`] store row-major or column-major data;
/// `Dynamic` and `Any` carry no order of their own and store row-major.
/// Arrays with arbitrary strides come from [`Array::from_parts`] or
/// [`Array::resize_with_strides`].
#[derive(Debug, Clone, PartialEq)]
pub struct Array<T> {
    data: Vec<T>,
    shape: Dims,
    strides: Strides,
    backstrides: Strides,
    offset: usize,
    layout: Layout,
}

fn storage_layout(layout: Layout) -> Layout {
    match layout {
        Layout::ColumnMajor => Layout::ColumnMajor,
        Layout::RowMajor | Layout::Dynamic | Layout::Any => Layout::RowMajor,
    }
}

impl<T: Clone> Array<T> {
    /// Array of `shape` with every element set to `value`.
    pub fn filled(shape: &[usize], layout: Layout, value: T) -> Self {
        Self::dense(vec![value; shape::size(shape)], shape, storage_layout(layout))
    }
}

impl<T: Clone + Default> Array<T> {
    /// Array of `shape` filled with `T::default()`.
    pub fn new(shape: &[usize], layout: Layout) -> Self {
        Self::filled(shape, layout, T::default())
    }
}

impl<T: Clone + Zero> Array<T> {
    pub fn zeros(shape: &[usize], layout: Layout) -> Self {
        Self::filled(shape, layout, T::zero())
    }
}

impl<T> Array<T> {
    fn dense(data: Vec<T>, shape: &[usize], layout: Layout) -> Self {
        let strides = shape::compute_strides(shape, layout);
        Self {
            backstrides: shape::compute_backstrides(shape, &strides),
            data,
            shape: Dims::from_slice(shape),
            strides,
            offset: 0,
            layout,
        }
    }

    /// Wrap `data`, read in `layout` order, as an array of `shape`.
    ///
    /// # Errors
    /// [`ExprError::ShapeMismatch`] when `data.len()` is not the element
    /// count of `shape`.
    pub fn from_vec(data: Vec<T>, shape: &[usize], layout: Layout) -> Result<Self> {
        if data.len() != shape::size(shape) {
            return Err(ExprError::ShapeMismatch(vec![data.len()], shape.to_vec()));
        }
        Ok(Self::dense(data, shape, storage_layout(layout)))
    }

    /// Array whose element at each multi-index is `f(index)`.
    ///
    /// `f` is called once per element, in storage order.
    pub fn from_fn(shape: &[usize], layout: Layout, mut f: impl FnMut(&[usize]) -> T) -> Self {
        let layout = storage_layout(layout);
        let traversal = match layout {
            Layout::ColumnMajor => crate::Traversal::ColumnMajor,
            _ => crate::Traversal::RowMajor,
        };
        let n = shape::size(shape);
        let mut data = Vec::with_capacity(n);
        for k in 0..n {
            data.push(f(&shape::unravel_index(k, shape, traversal)));
        }
        Self::dense(data, shape, layout)
    }

    /// Create from raw parts.
    ///
    /// # Errors
    /// [`ExprError::StrideLengthMismatch`] or [`ExprError::OffsetOverflow`]
    /// when the parts would address outside `data`.
    pub fn from_parts(data: Vec<T>, shape: &[usize], strides: &[isize], offset: usize) -> Result<Self> {
        validate_bounds(data.len(), shape, strides, offset)?;
        Ok(Self {
            layout: layout_of(shape, strides),
            backstrides: shape::compute_backstrides(shape, strides),
            data,
            shape: Dims::from_slice(shape),
            strides: Strides::from_slice(strides),
            offset,
        })
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
    pub fn backstrides(&self) -> &[isize] {
        &self.backstrides
    }

    /// Storage layout; `Dynamic` for arrays built from arbitrary strides.
    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
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

    /// The whole underlying buffer.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Mutable reference to the element at `index`.
    ///
    /// # Errors
    /// As [`Expression::get`].
    pub fn get_mut(&mut self, index: &[usize]) -> Result<&mut T> {
        shape::check_index(&self.shape, index)?;
        let pos = self.position(index);
        Ok(&mut self.data[pos])
    }

    /// Store `value` at `index`.
    ///
    /// # Errors
    /// As [`Expression::get`].
    pub fn set(&mut self, index: &[usize], value: T) -> Result<()> {
        *self.get_mut(index)? = value;
        Ok(())
    }

    #[inline]
    fn position(&self, index: &[usize]) -> usize {
        (self.offset as isize + shape::element_offset(&self.shape, &self.strides, index)) as usize
    }

    fn set_geometry(&mut self, shape: &[usize], strides: Strides, offset: usize, layout: Layout) {
        self.backstrides = shape::compute_backstrides(shape, &strides);
        self.shape = Dims::from_slice(shape);
        self.strides = strides;
        self.offset = offset;
        self.layout = layout;
    }

    /// Give the array a new shape with the same element count.
    ///
    /// Data is reinterpreted in the array's layout order, not copied.
    ///
    /// # Errors
    /// [`ExprError::ShapeMismatch`] when the element counts differ,
    /// [`ExprError::UnsupportedLayout`] when the array has no canonical layout.
    pub fn reshape(&mut self, shape: &[usize]) -> Result<()> {
        if shape::size(shape) != self.len() {
            return Err(ExprError::ShapeMismatch(self.shape.to_vec(), shape.to_vec()));
        }
        if !self.layout.is_canonical() {
            return Err(ExprError::UnsupportedLayout(self.layout));
        }
        let strides = shape::compute_strides(shape, self.layout);
        self.set_geometry(shape, strides, self.offset, self.layout);
        Ok(())
    }

    /// Immutable view of the whole array.
    pub fn view(&self) -> StridedView<'_, T> {
        StridedView::from_parts_unchecked(
            &self.data,
            self.shape.clone(),
            self.strides.clone(),
            self.offset,
        )
    }

    /// Mutable view of the whole array.
    pub fn view_mut(&mut self) -> StridedViewMut<'_, T> {
        StridedViewMut::from_parts_unchecked(
            &mut self.data,
            self.shape.clone(),
            self.strides.clone(),
            self.offset,
        )
    }

    /// Strided sub-view; see [`StridedView::slice`].
    pub fn slice(&self, specs: &[SliceSpec]) -> Result<StridedView<'_, T>> {
        self.view().slice(specs)
    }

    /// Mutable strided sub-view; see [`StridedViewMut::into_slice`].
    pub fn slice_mut(&mut self, specs: &[SliceSpec]) -> Result<StridedViewMut<'_, T>> {
        self.view_mut().into_slice(specs)
    }

    /// View with the axis order reversed.
    pub fn transpose(&self) -> StridedView<'_, T> {
        self.view().transpose()
    }

    /// View with axes reordered; see [`StridedView::permute`].
    pub fn permute(&self, perm: &[usize]) -> Result<StridedView<'_, T>> {
        self.view().permute(perm)
    }

    /// Permute the axes in place, without moving data.
    pub fn permute_in_place(&mut self, perm: &[usize]) -> Result<()> {
        let (shape, strides) = permute_axes(&self.shape, &self.strides, perm)?;
        let layout = layout_of(&shape, &strides);
        let offset = self.offset;
        self.set_geometry(&shape, strides, offset, layout);
        Ok(())
    }

    /// View broadcast to `shape`; see [`StridedView::broadcast`].
    pub fn broadcast(&self, shape: &[usize]) -> Result<StridedView<'_, T>> {
        self.view().broadcast(shape)
    }

    fn parts(&self) -> StridedParts<'_, T> {
        StridedParts {
            data: &self.data,
            shape: self.shape.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
        }
    }
}

impl<T: Clone + Default> Array<T> {
    /// Change the shape to `shape` with canonical strides for `layout`.
    ///
    /// The buffer is reallocated (filled with `T::default()`) only when the
    /// element count changes; otherwise the existing data is reinterpreted.
    pub fn resize(&mut self, shape: &[usize], layout: Layout) {
        let layout = storage_layout(layout);
        let n = shape::size(shape);
        if n != self.data.len() || self.offset != 0 {
            tracing::debug!(old = ?self.shape.as_slice(), new = ?shape, "reallocating array storage");
            self.data = vec![T::default(); n];
        }
        let strides = shape::compute_strides(shape, layout);
        self.set_geometry(shape, strides, 0, layout);
    }

    /// Change the shape to `shape` with explicit `strides`.
    ///
    /// The buffer is sized to the span the strides reach; negative strides
    /// place `(0, ..., 0)` at the far end of that span.
    ///
    /// # Errors
    /// [`ExprError::StrideLengthMismatch`] if `strides` and `shape` differ in length,
    /// [`ExprError::OffsetOverflow`] if the span does not fit in `usize`.
    pub fn resize_with_strides(&mut self, shape: &[usize], strides: &[isize]) -> Result<()> {
        if shape.len() != strides.len() {
            return Err(ExprError::StrideLengthMismatch);
        }
        let (span, offset) = if shape.contains(&0) {
            (0, 0)
        } else {
            let mut span = 1usize;
            let mut offset = 0usize;
            for (&n, &s) in shape.iter().zip(strides) {
                let reach = s
                    .unsigned_abs()
                    .checked_mul(n - 1)
                    .ok_or(ExprError::OffsetOverflow)?;
                span = span.checked_add(reach).ok_or(ExprError::OffsetOverflow)?;
                if s < 0 {
                    offset += reach;
                }
            }
            (span, offset)
        };
        if span != self.data.len() {
            tracing::debug!(old = ?self.shape.as_slice(), new = ?shape, len = span, "reallocating array storage");
            self.data = vec![T::default(); span];
        }
        self.set_geometry(shape, Strides::from_slice(strides), offset, layout_of(shape, strides));
        Ok(())
    }
}

impl<T: Copy> Array<T> {
    /// Set every element to `value`.
    pub fn fill(&mut self, value: T) {
        self.view_mut().fill(value);
    }

    /// Evaluate `src` into this array, broadcasting it to the array's shape.
    ///
    /// # Errors
    /// See [`assign`](crate::assign).
    pub fn assign<E: Expression<Elem = T>>(&mut self, src: &E) -> Result<()> {
        assign(&mut self.view_mut(), src)
    }

    /// Materialize `expr` into a new array of its shape.
    ///
    /// # Errors
    /// [`ExprError::UnsupportedLayout`] for `Layout::Dynamic`.
    pub fn from_expr<E: Expression<Elem = T>>(expr: &E, layout: Layout) -> Result<Self> {
        let layout = match layout {
            Layout::Dynamic => return Err(ExprError::UnsupportedLayout(layout)),
            other => storage_layout(other),
        };
        let shape = expr.shape();
        let data: Vec<T> = expr.elements(layout)?.collect();
        Ok(Self::dense(data, &shape, layout))
    }
}

impl<T: Copy> Expression for Array<T> {
    type Elem = T;
    type Cursor<'a> = StridedCursor<'a, T> where Self: 'a;

    fn shape(&self) -> Dims {
        self.shape.clone()
    }

    fn dimension(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    fn element(&self, index: &[usize]) -> T {
        debug_assert!(shape::in_broadcast_bounds(&self.shape, index));
        self.data[self.position(index)]
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
        Some(&self.data)
    }

    fn cursor(&self, target: &[usize]) -> StridedCursor<'_, T> {
        StridedCursor::new(&self.data, &self.shape, &self.strides, self.offset, target)
    }
}

#[inline]
fn checked_position<T>(a: &Array<T>, index: &[usize]) -> usize {
    #[cfg(feature = "bounds-checks")]
    if let Err(e) = shape::check_index(&a.shape, index) {
        panic!("{e}");
    }
    debug_assert!(index.len() <= a.shape.len());
    a.position(index)
}

/// Panics on an out-of-range index when the `bounds-checks` feature is on.
impl<T> Index<&[usize]> for Array<T> {
    type Output = T;

    fn index(&self, index: &[usize]) -> &T {
        &self.data[checked_position(self, index)]
    }
}

impl<T> IndexMut<&[usize]> for Array<T> {
    fn index_mut(&mut self, index: &[usize]) -> &mut T {
        let pos = checked_position(self, index);
        &mut self.data[pos]
    }
}

impl<T, const N: usize> Index<[usize; N]> for Array<T> {
    type Output = T;

    fn index(&self, index: [usize; N]) -> &T {
        &self[&index[..]]
    }
}

impl<T, const N: usize> IndexMut<[usize; N]> for Array<T> {
    fn index_mut(&mut self, index: [usize; N]) -> &mut T {
        &mut self[&index[..]]
    }
}
