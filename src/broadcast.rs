//! Broadcasting resolver and the broadcast expression node.
//!
//! [`broadcast_shapes`] promotes any number of shapes to their common
//! shape. [`Broadcast`] wraps one expression and presents it with a larger
//! target shape without copying: its cursors are the source cursors built
//! for the target, whose steps are already zero on every stretched axis.

use crate::expression::{Expression, StridedParts};
use crate::shape::{self, Dims};
use crate::Result;

/// Promote a list of shapes to their common broadcast shape.
///
/// The empty list promotes to the rank-0 shape.
///
/// # Errors
/// [`ExprError::ShapeMismatch`](crate::ExprError::ShapeMismatch) naming the accumulated shape and the first
/// operand that does not fit it.
pub fn broadcast_shapes(shapes: &[&[usize]]) -> Result<Dims> {
    let mut out = Dims::new();
    for s in shapes {
        out = shape::promote(&out, s)?;
    }
    Ok(out)
}

/// Whether a leaf with `shape`/`strides` is addressed exactly like a
/// destination whose normalized strides are `target_strides`.
///
/// Requires equal rank (no padding) and equal normalized strides (no
/// zeroing). The leaf must already be known broadcastable to the target.
pub fn is_trivial_broadcast(shape: &[usize], strides: &[isize], target_strides: &[isize]) -> bool {
    shape.len() == target_strides.len()
        && shape
            .iter()
            .zip(strides)
            .zip(target_strides)
            .all(|((&n, &s), &t)| (if n == 1 { 0 } else { s }) == t)
}

/// An expression presented with a larger (broadcast) shape.
#[derive(Debug, Clone)]
pub struct Broadcast<E> {
    expr: E,
    shape: Dims,
}

impl<E: Expression> Broadcast<E> {
    /// Broadcast `expr` to `shape`.
    ///
    /// # Errors
    /// [`ExprError::ShapeMismatch`](crate::ExprError::ShapeMismatch) if `expr` cannot be stretched to `shape`.
    pub fn new(expr: E, shape: &[usize]) -> Result<Self> {
        shape::check_broadcast_to(&expr.shape(), shape)?;
        Ok(Self {
            expr,
            shape: Dims::from_slice(shape),
        })
    }

    /// The wrapped expression.
    pub fn inner(&self) -> &E {
        &self.expr
    }

    pub fn into_inner(self) -> E {
        self.expr
    }
}

/// Broadcast `expr` to `shape`; see [`Broadcast::new`].
pub fn broadcast_to<E: Expression>(expr: E, shape: &[usize]) -> Result<Broadcast<E>> {
    Broadcast::new(expr, shape)
}

impl<E: Expression> Expression for Broadcast<E> {
    type Elem = E::Elem;
    type Cursor<'a> = E::Cursor<'a> where Self: 'a;

    fn shape(&self) -> Dims {
        self.shape.clone()
    }

    fn dimension(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    fn element(&self, index: &[usize]) -> E::Elem {
        self.expr.element(index)
    }

    fn is_trivial_broadcast(&self, strides: &[isize]) -> bool {
        self.expr.shape() == self.shape && self.expr.is_trivial_broadcast(strides)
    }

    #[inline]
    fn linear_element(&self, i: usize) -> E::Elem {
        self.expr.linear_element(i)
    }

    fn strided(&self) -> Option<StridedParts<'_, E::Elem>> {
        let parts = self.expr.strided()?;
        let strides = shape::broadcast_strides(&parts.shape, &parts.strides, &self.shape).ok()?;
        Some(StridedParts {
            data: parts.data,
            shape: self.shape.clone(),
            strides,
            offset: parts.offset,
        })
    }

    fn contiguous_slice(&self) -> Option<&[E::Elem]> {
        if self.expr.shape() == self.shape {
            self.expr.contiguous_slice()
        } else {
            None
        }
    }

    fn buffer(&self) -> Option<&[E::Elem]> {
        self.expr.buffer()
    }

    #[inline]
    fn cursor(&self, target: &[usize]) -> E::Cursor<'_> {
        self.expr.cursor(target)
    }
}
