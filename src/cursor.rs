//! Traversal cursors.
//!
//! A [`Cursor`] addresses one element of an expression and moves along the
//! axes of a *target* shape, the shape the expression is being broadcast
//! to. Composite expressions build their cursors by nesting the cursors of
//! their operands, so a walk over `view(broadcast(f(a, b)))` is a tree of
//! concrete types with no dynamic dispatch.
//!
//! Leaf cursors fix their per-axis steps when they are built: leading axes
//! the leaf lacks and axes where the leaf has extent 1 get a step of 0.
//! Stepping such an axis therefore never moves the address, and the hot
//! loop has no broadcast branch.

use crate::layout::Traversal;
use crate::shape::{Dims, Strides};

/// Position-plus-navigation over an expression, in target-shape coordinates.
///
/// `reset(d)` assumes the cursor sits on the last position of axis `d` and
/// moves it to the first; `reset_back(d)` does the opposite. This is exactly
/// what a nested multi-axis walk needs when an inner axis wraps.
pub trait Cursor {
    /// Element type produced by [`Cursor::value`].
    type Item;

    /// Advance one position along `axis`.
    #[inline]
    fn step(&mut self, axis: usize) {
        self.step_n(axis, 1);
    }

    /// Advance `n` positions along `axis`.
    fn step_n(&mut self, axis: usize, n: usize);

    /// Move back one position along `axis`.
    #[inline]
    fn step_back(&mut self, axis: usize) {
        self.step_back_n(axis, 1);
    }

    /// Move back `n` positions along `axis`.
    fn step_back_n(&mut self, axis: usize, n: usize);

    /// Jump from the last to the first position of `axis`.
    fn reset(&mut self, axis: usize);

    /// Jump from the first to the last position of `axis`.
    fn reset_back(&mut self, axis: usize);

    /// Return to the multi-index `(0, ..., 0)`.
    fn to_begin(&mut self);

    /// Move one past the last element in `traversal` order.
    ///
    /// `rank` is the target rank the cursor was built for. The resulting
    /// position is an end marker and must not be read.
    fn to_end(&mut self, rank: usize, traversal: Traversal) {
        self.to_begin();
        for axis in 0..rank {
            self.reset_back(axis);
        }
        if rank > 0 {
            match traversal {
                Traversal::RowMajor => self.step(rank - 1),
                Traversal::ColumnMajor => self.step(0),
            }
        }
    }

    /// Element at the current position.
    fn value(&self) -> Self::Item;
}

// ============================================================================
// Strided addressing shared by the leaf cursors
// ============================================================================

/// Linear address plus per-target-axis steps.
#[derive(Debug, Clone)]
struct Address {
    start: isize,
    pos: isize,
    strides: Strides,
    backstrides: Strides,
}

impl Address {
    /// Build the address of `(0, ..., 0)` for a leaf broadcast to `target`.
    fn new(shape: &[usize], strides: &[isize], offset: usize, target: &[usize]) -> Self {
        debug_assert_eq!(shape.len(), strides.len());
        debug_assert!(
            crate::shape::check_broadcast_to(shape, target).is_ok(),
            "cursor target {target:?} is not a broadcast of {shape:?}"
        );
        let lead = target.len().saturating_sub(shape.len());
        let skip = shape.len().saturating_sub(target.len());
        let mut steps = Strides::from_elem(0, target.len());
        let mut backs = Strides::from_elem(0, target.len());
        for (j, (&n, &s)) in shape.iter().zip(strides).enumerate().skip(skip) {
            let axis = lead + j - skip;
            // Broadcast axes keep a zero step.
            if n != 1 {
                steps[axis] = s;
                backs[axis] = s * (target[axis].saturating_sub(1) as isize);
            }
        }
        Self {
            start: offset as isize,
            pos: offset as isize,
            strides: steps,
            backstrides: backs,
        }
    }

    #[inline]
    fn step_n(&mut self, axis: usize, n: usize) {
        self.pos += self.strides[axis] * n as isize;
    }

    #[inline]
    fn step_back_n(&mut self, axis: usize, n: usize) {
        self.pos -= self.strides[axis] * n as isize;
    }

    #[inline]
    fn reset(&mut self, axis: usize) {
        self.pos -= self.backstrides[axis];
    }

    #[inline]
    fn reset_back(&mut self, axis: usize) {
        self.pos += self.backstrides[axis];
    }

    #[inline]
    fn index(&self) -> usize {
        debug_assert!(self.pos >= 0, "cursor moved before the start of its buffer");
        self.pos as usize
    }
}

/// Cursor over a strided leaf (dense array or strided view).
#[derive(Debug, Clone)]
pub struct StridedCursor<'a, T> {
    data: &'a [T],
    addr: Address,
}

impl<'a, T> StridedCursor<'a, T> {
    /// Cursor over `data` addressed by `shape`/`strides`/`offset`, broadcast to `target`.
    pub fn new(
        data: &'a [T],
        shape: &[usize],
        strides: &[isize],
        offset: usize,
        target: &[usize],
    ) -> Self {
        Self {
            data,
            addr: Address::new(shape, strides, offset, target),
        }
    }

    /// Current linear position in the underlying buffer.
    #[inline]
    pub fn position(&self) -> isize {
        self.addr.pos
    }

    /// Per-target-axis steps, zero on broadcast axes.
    pub fn strides(&self) -> &[isize] {
        &self.addr.strides
    }

    /// Per-target-axis back-strides.
    pub fn backstrides(&self) -> &[isize] {
        &self.addr.backstrides
    }
}

impl<'a, T: Copy> Cursor for StridedCursor<'a, T> {
    type Item = T;

    #[inline]
    fn step_n(&mut self, axis: usize, n: usize) {
        self.addr.step_n(axis, n);
    }

    #[inline]
    fn step_back_n(&mut self, axis: usize, n: usize) {
        self.addr.step_back_n(axis, n);
    }

    #[inline]
    fn reset(&mut self, axis: usize) {
        self.addr.reset(axis);
    }

    #[inline]
    fn reset_back(&mut self, axis: usize) {
        self.addr.reset_back(axis);
    }

    #[inline]
    fn to_begin(&mut self) {
        self.addr.pos = self.addr.start;
    }

    #[inline]
    fn value(&self) -> T {
        self.data[self.addr.index()]
    }
}

/// Writable cursor over a strided destination.
#[derive(Debug)]
pub struct StridedCursorMut<'a, T> {
    data: &'a mut [T],
    addr: Address,
}

impl<'a, T> StridedCursorMut<'a, T> {
    /// Writable cursor over `data`, broadcast to `target`.
    pub fn new(
        data: &'a mut [T],
        shape: &[usize],
        strides: &[isize],
        offset: usize,
        target: &[usize],
    ) -> Self {
        Self {
            data,
            addr: Address::new(shape, strides, offset, target),
        }
    }

    /// Store `value` at the current position.
    #[inline]
    pub fn write(&mut self, value: T) {
        let i = self.addr.index();
        self.data[i] = value;
    }

    /// Current linear position in the underlying buffer.
    #[inline]
    pub fn position(&self) -> isize {
        self.addr.pos
    }
}

impl<'a, T: Copy> Cursor for StridedCursorMut<'a, T> {
    type Item = T;

    #[inline]
    fn step_n(&mut self, axis: usize, n: usize) {
        self.addr.step_n(axis, n);
    }

    #[inline]
    fn step_back_n(&mut self, axis: usize, n: usize) {
        self.addr.step_back_n(axis, n);
    }

    #[inline]
    fn reset(&mut self, axis: usize) {
        self.addr.reset(axis);
    }

    #[inline]
    fn reset_back(&mut self, axis: usize) {
        self.addr.reset_back(axis);
    }

    #[inline]
    fn to_begin(&mut self) {
        self.addr.pos = self.addr.start;
    }

    #[inline]
    fn value(&self) -> T {
        self.data[self.addr.index()]
    }
}

/// Cursor of a rank-0 value; every movement is a no-op.
#[derive(Debug, Clone, Copy)]
pub struct ScalarCursor<T>(pub(crate) T);

impl<T: Copy> Cursor for ScalarCursor<T> {
    type Item = T;

    #[inline]
    fn step_n(&mut self, _axis: usize, _n: usize) {}

    #[inline]
    fn step_back_n(&mut self, _axis: usize, _n: usize) {}

    #[inline]
    fn reset(&mut self, _axis: usize) {}

    #[inline]
    fn reset_back(&mut self, _axis: usize) {}

    #[inline]
    fn to_begin(&mut self) {}

    #[inline]
    fn value(&self) -> T {
        self.0
    }
}

/// Two cursors moved in lock-step (e.g. destination and source of an assignment).
impl<A: Cursor, B: Cursor> Cursor for (A, B) {
    type Item = (A::Item, B::Item);

    #[inline]
    fn step_n(&mut self, axis: usize, n: usize) {
        self.0.step_n(axis, n);
        self.1.step_n(axis, n);
    }

    #[inline]
    fn step_back_n(&mut self, axis: usize, n: usize) {
        self.0.step_back_n(axis, n);
        self.1.step_back_n(axis, n);
    }

    #[inline]
    fn reset(&mut self, axis: usize) {
        self.0.reset(axis);
        self.1.reset(axis);
    }

    #[inline]
    fn reset_back(&mut self, axis: usize) {
        self.0.reset_back(axis);
        self.1.reset_back(axis);
    }

    #[inline]
    fn to_begin(&mut self) {
        self.0.to_begin();
        self.1.to_begin();
    }

    #[inline]
    fn value(&self) -> Self::Item {
        (self.0.value(), self.1.value())
    }
}

// ============================================================================
// Index walker
// ============================================================================

/// Drives a cursor through every multi-index of a shape in traversal order.
///
/// The walker owns the multi-index; the cursor only sees `step`/`reset`
/// calls. Starting from `(0, ..., 0)`, each [`IndexWalker::advance`] moves
/// to the next index and returns `false` once the walk is exhausted.
#[derive(Debug, Clone)]
pub struct IndexWalker {
    index: Dims,
    shape: Dims,
    traversal: Traversal,
}

impl IndexWalker {
    pub fn new(shape: &[usize], traversal: Traversal) -> Self {
        Self {
            index: Dims::from_elem(0, shape.len()),
            shape: Dims::from_slice(shape),
            traversal,
        }
    }

    /// Current multi-index.
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    /// Step `cursor` to the next multi-index; `false` when the walk is done.
    ///
    /// On `false` the walker and the cursor are back at `(0, ..., 0)`.
    pub fn advance<C: Cursor + ?Sized>(&mut self, cursor: &mut C) -> bool {
        let rank = self.shape.len();
        for k in 0..rank {
            let axis = match self.traversal {
                Traversal::RowMajor => rank - 1 - k,
                Traversal::ColumnMajor => k,
            };
            if self.index[axis] + 1 < self.shape[axis] {
                self.index[axis] += 1;
                cursor.step(axis);
                return true;
            }
            self.index[axis] = 0;
            cursor.reset(axis);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect<C: Cursor>(cursor: &mut C, shape: &[usize], t: Traversal) -> Vec<C::Item> {
        let mut walker = IndexWalker::new(shape, t);
        let mut out = vec![cursor.value()];
        while walker.advance(cursor) {
            out.push(cursor.value());
        }
        out
    }

    #[test]
    fn test_strided_cursor_row_major_walk() {
        let data: Vec<i32> = (0..6).collect();
        let mut c = StridedCursor::new(&data, &[2, 3], &[3, 1], 0, &[2, 3]);
        assert_eq!(collect(&mut c, &[2, 3], Traversal::RowMajor), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(c.position(), 0);
    }

    #[test]
    fn test_strided_cursor_column_major_walk() {
        let data: Vec<i32> = (0..6).collect();
        let mut c = StridedCursor::new(&data, &[2, 3], &[3, 1], 0, &[2, 3]);
        assert_eq!(collect(&mut c, &[2, 3], Traversal::ColumnMajor), vec![0, 3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_broadcast_axis_never_moves() {
        let data = [10, 20, 30];
        // (1, 3) broadcast to (4, 3)
        let mut c = StridedCursor::new(&data, &[1, 3], &[3, 1], 0, &[4, 3]);
        assert_eq!(c.strides(), &[0, 1]);
        let before = c.position();
        for _ in 0..4 {
            c.step(0);
            assert_eq!(c.position(), before);
        }
        c.step_n(0, 100);
        c.reset(0);
        assert_eq!(c.position(), before);
    }

    #[test]
    fn test_leading_axes_are_broadcast() {
        let data = [1, 2, 3];
        let mut c = StridedCursor::new(&data, &[3], &[1], 0, &[2, 3]);
        assert_eq!(c.strides(), &[0, 1]);
        assert_eq!(collect(&mut c, &[2, 3], Traversal::RowMajor), vec![1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_step_back_and_reset() {
        let data: Vec<i32> = (0..12).collect();
        let mut c = StridedCursor::new(&data, &[3, 4], &[4, 1], 0, &[3, 4]);
        c.step_n(0, 2);
        c.step_n(1, 3);
        assert_eq!(c.value(), 11);
        c.step_back(1);
        assert_eq!(c.value(), 10);
        c.step_back_n(0, 2);
        assert_eq!(c.value(), 2);
        c.reset_back(0);
        assert_eq!(c.value(), 10);
        c.to_begin();
        assert_eq!(c.value(), 0);
    }

    #[test]
    fn test_to_end_is_one_past_last() {
        let data: Vec<i32> = (0..6).collect();
        let mut c = StridedCursor::new(&data, &[2, 3], &[3, 1], 0, &[2, 3]);
        c.to_end(2, Traversal::RowMajor);
        assert_eq!(c.position(), 6);
        let mut c = StridedCursor::new(&data, &[2, 3], &[1, 2], 0, &[2, 3]);
        c.to_end(2, Traversal::ColumnMajor);
        assert_eq!(c.position(), 6);
    }

    #[test]
    fn test_negative_strides() {
        let data: Vec<i32> = (0..4).collect();
        let mut c = StridedCursor::new(&data, &[4], &[-1], 3, &[4]);
        assert_eq!(collect(&mut c, &[4], Traversal::RowMajor), vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_lock_step_pair_writes() {
        let src = [1, 2, 3];
        let mut dst = [0; 6];
        {
            let mut pair = (
                StridedCursorMut::new(&mut dst, &[2, 3], &[3, 1], 0, &[2, 3]),
                StridedCursor::new(&src, &[3], &[1], 0, &[2, 3]),
            );
            let mut walker = IndexWalker::new(&[2, 3], Traversal::RowMajor);
            loop {
                let v = pair.1.value();
                pair.0.write(v * 10);
                if !walker.advance(&mut pair) {
                    break;
                }
            }
        }
        assert_eq!(dst, [10, 20, 30, 10, 20, 30]);
    }

    #[test]
    fn test_scalar_cursor() {
        let mut c = ScalarCursor(7.5f64);
        c.step_n(3, 10);
        c.reset(1);
        assert_eq!(c.value(), 7.5);
    }

    #[test]
    fn test_walker_rank_zero() {
        let mut c = ScalarCursor(1u8);
        let mut w = IndexWalker::new(&[], Traversal::RowMajor);
        assert!(!w.advance(&mut c));
    }
}
