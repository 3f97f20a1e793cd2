//! The expression contract.
//!
//! Every node kind (dense array, strided view, broadcast, view, elementwise
//! function, scalar) implements [`Expression`]. Consumers only ever talk to
//! this trait: they ask for a shape, read single elements, or build a
//! [`Cursor`](crate::Cursor) broadcast to some target shape and walk it.

use crate::cursor::{Cursor, IndexWalker, ScalarCursor};
use crate::layout::{layout_matches, Layout};
use crate::shape::{self, Dims, Strides};
use crate::Result;

/// Raw strided addressing of a node that reads straight from a buffer.
///
/// `shape`, `strides` and `offset` describe the node itself (not broadcast).
#[derive(Debug, Clone)]
pub struct StridedParts<'a, T> {
    pub data: &'a [T],
    pub shape: Dims,
    pub strides: Strides,
    pub offset: usize,
}

impl<'a, T> StridedParts<'a, T> {
    /// Whether this addressing, normalized, equals `target_strides`.
    ///
    /// Assumes the node has already been checked broadcastable to the
    /// target, so equal normalized strides imply an equal shape.
    pub fn matches_strides(&self, target_strides: &[isize]) -> bool {
        crate::broadcast::is_trivial_broadcast(&self.shape, &self.strides, target_strides)
    }

    /// The addressed elements as one slice, if they are contiguous in a
    /// canonical order.
    pub fn contiguous(&self) -> Option<&'a [T]> {
        let n = shape::size(&self.shape);
        let canonical = layout_matches(&self.shape, &self.strides, Layout::RowMajor, false)
            || layout_matches(&self.shape, &self.strides, Layout::ColumnMajor, false);
        if canonical {
            self.data.get(self.offset..self.offset + n)
        } else {
            None
        }
    }
}

/// A lazily evaluated N-dimensional array expression.
///
/// # Element access
///
/// Multi-indices are right-aligned with the node's axes: missing leading
/// indices read as 0, and on an axis of extent 1 any index reads position 0.
/// This lets a parent node pass the index it received for its own (larger)
/// shape straight down to its operands.
///
/// - [`element`](Expression::element) performs no axis checks beyond a
///   `debug_assert!`; out-of-range indices may read an unrelated element
///   (or panic on the buffer bound) in release builds.
/// - [`get`](Expression::get) checks every index and reports an error.
pub trait Expression {
    /// Element type.
    type Elem: Copy;

    /// Cursor type built by [`cursor`](Expression::cursor).
    type Cursor<'a>: crate::cursor::Cursor<Item = Self::Elem>
    where
        Self: 'a;

    /// Extents of this node, recomputed from its operands on each call.
    fn shape(&self) -> Dims;

    /// Number of axes.
    fn dimension(&self) -> usize {
        self.shape().len()
    }

    /// Number of elements.
    fn size(&self) -> usize {
        shape::size(&self.shape())
    }

    /// Element at `index` without axis checks.
    fn element(&self, index: &[usize]) -> Self::Elem;

    /// Element at `index`, checked against the node's shape.
    ///
    /// # Errors
    /// [`ExprError::DimensionMismatch`](crate::ExprError::DimensionMismatch)
    /// for more indices than axes,
    /// [`ExprError::IndexOutOfBounds`](crate::ExprError::IndexOutOfBounds)
    /// for an index outside its axis.
    fn get(&self, index: &[usize]) -> Result<Self::Elem> {
        shape::check_index(&self.shape(), index)?;
        Ok(self.element(index))
    }

    /// Merge this node's shape into the accumulated shape `shape`.
    ///
    /// Returns whether the merge was trivial (no rank padding, no stretching).
    fn broadcast_shape(&self, shape: &mut Dims) -> Result<bool> {
        shape::broadcast_shape(shape, &self.shape())
    }

    /// Whether this node can be read with the linear index of a destination
    /// whose (normalized) strides are `strides`.
    ///
    /// True only when every leaf already has the destination's shape and
    /// strides, so no rank padding or stride zeroing is needed.
    fn is_trivial_broadcast(&self, strides: &[isize]) -> bool;

    /// Element at linear position `i` of a trivially broadcast walk.
    ///
    /// Only meaningful when [`is_trivial_broadcast`](Expression::is_trivial_broadcast)
    /// returned `true` for the destination strides.
    fn linear_element(&self, i: usize) -> Self::Elem;

    /// Direct strided addressing, for nodes that read straight from a buffer.
    fn strided(&self) -> Option<StridedParts<'_, Self::Elem>> {
        None
    }

    /// All elements as one contiguous slice in a canonical order, if possible.
    fn contiguous_slice(&self) -> Option<&[Self::Elem]> {
        None
    }

    /// The buffer behind [`strided`](Expression::strided), without building
    /// the addressing.
    fn buffer(&self) -> Option<&[Self::Elem]> {
        self.strided().map(|p| p.data)
    }

    /// Cursor at `(0, ..., 0)` of this node broadcast to `target`.
    ///
    /// `target` must be a broadcast of [`shape`](Expression::shape).
    fn cursor(&self, target: &[usize]) -> Self::Cursor<'_>;

    /// Cursor one past the last element of `target` in `layout` order.
    ///
    /// # Errors
    /// [`ExprError::UnsupportedLayout`](crate::ExprError::UnsupportedLayout)
    /// for `Layout::Dynamic`.
    fn cursor_end(&self, target: &[usize], layout: Layout) -> Result<Self::Cursor<'_>> {
        let traversal = layout.traversal()?;
        let mut cursor = self.cursor(target);
        cursor.to_end(target.len(), traversal);
        Ok(cursor)
    }

    /// Iterate over all elements in `layout` order.
    ///
    /// # Errors
    /// [`ExprError::UnsupportedLayout`](crate::ExprError::UnsupportedLayout)
    /// for `Layout::Dynamic`.
    fn elements(&self, layout: Layout) -> Result<Elements<'_, Self>>
    where
        Self: Sized,
    {
        let traversal = layout.traversal()?;
        let shape = self.shape();
        Ok(Elements {
            cursor: self.cursor(&shape),
            walker: IndexWalker::new(&shape, traversal),
            remaining: shape::size(&shape),
        })
    }
}

impl<E: Expression + ?Sized> Expression for &E {
    type Elem = E::Elem;
    type Cursor<'a> = E::Cursor<'a> where Self: 'a;

    #[inline]
    fn shape(&self) -> Dims {
        (**self).shape()
    }

    #[inline]
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    #[inline]
    fn element(&self, index: &[usize]) -> Self::Elem {
        (**self).element(index)
    }

    #[inline]
    fn broadcast_shape(&self, shape: &mut Dims) -> Result<bool> {
        (**self).broadcast_shape(shape)
    }

    #[inline]
    fn is_trivial_broadcast(&self, strides: &[isize]) -> bool {
        (**self).is_trivial_broadcast(strides)
    }

    #[inline]
    fn linear_element(&self, i: usize) -> Self::Elem {
        (**self).linear_element(i)
    }

    #[inline]
    fn strided(&self) -> Option<StridedParts<'_, Self::Elem>> {
        (**self).strided()
    }

    #[inline]
    fn contiguous_slice(&self) -> Option<&[Self::Elem]> {
        (**self).contiguous_slice()
    }

    #[inline]
    fn buffer(&self) -> Option<&[Self::Elem]> {
        (**self).buffer()
    }

    #[inline]
    fn cursor(&self, target: &[usize]) -> Self::Cursor<'_> {
        (**self).cursor(target)
    }
}

/// Iterator over the elements of an expression in a traversal order.
pub struct Elements<'a, E: Expression + 'a> {
    cursor: E::Cursor<'a>,
    walker: IndexWalker,
    remaining: usize,
}

impl<'a, E: Expression + 'a> Iterator for Elements<'a, E> {
    type Item = E::Elem;

    fn next(&mut self) -> Option<E::Elem> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.cursor.value();
        self.remaining -= 1;
        if self.remaining > 0 {
            self.walker.advance(&mut self.cursor);
        }
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, E: Expression + 'a> ExactSizeIterator for Elements<'a, E> {}

// ============================================================================
// Scalar
// ============================================================================

/// A rank-0 expression holding one value; broadcasts to any shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scalar<T>(pub T);

impl<T: Copy> Expression for Scalar<T> {
    type Elem = T;
    type Cursor<'a> = ScalarCursor<T> where Self: 'a;

    fn shape(&self) -> Dims {
        Dims::new()
    }

    fn dimension(&self) -> usize {
        0
    }

    #[inline]
    fn element(&self, _index: &[usize]) -> T {
        self.0
    }

    fn is_trivial_broadcast(&self, _strides: &[isize]) -> bool {
        true
    }

    #[inline]
    fn linear_element(&self, _i: usize) -> T {
        self.0
    }

    fn strided(&self) -> Option<StridedParts<'_, T>> {
        Some(StridedParts {
            data: std::slice::from_ref(&self.0),
            shape: Dims::new(),
            strides: Strides::new(),
            offset: 0,
        })
    }

    fn buffer(&self) -> Option<&[T]> {
        Some(std::slice::from_ref(&self.0))
    }

    fn cursor(&self, _target: &[usize]) -> ScalarCursor<T> {
        ScalarCursor(self.0)
    }
}
