//! Evaluation of an expression into a strided destination.
//!
//! The source is broadcast to the destination shape and written element by
//! element. Three interchangeable paths exist; [`select_strategy`] picks
//! the fastest one whose preconditions hold:
//!
//! - [`AssignStrategy::Linear`]: the destination is one contiguous block and
//!   the source reads with the same linear index, so a flat loop suffices.
//! - [`AssignStrategy::Strided`]: the source is a strided leaf; both sides
//!   go through the blocked, fused strided copy kernel.
//! - [`AssignStrategy::Cursor`]: anything else; a destination cursor and a
//!   source cursor walk the destination shape in lock-step.

use std::mem::size_of;

use crate::cursor::{Cursor, IndexWalker};
use crate::expression::Expression;
use crate::kernel::{build_plan, for_each_inner_block};
use crate::layout::Traversal;
use crate::shape::{self, Dims};
use crate::simd;
use crate::view::StridedViewMut;
use crate::{ExprError, Result};

/// Evaluation path of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignStrategy {
    /// Flat loop over one contiguous block, source read by linear index.
    Linear,
    /// Blocked strided copy from a strided leaf.
    Strided,
    /// Lock-step cursor walk.
    Cursor,
}

/// The fastest strategy that is valid for `dest <- src`.
///
/// Assumes `src` broadcasts to `dest`; shapes are checked by [`assign`].
pub fn select_strategy<T, E>(dest: &StridedViewMut<'_, T>, src: &E) -> AssignStrategy
where
    T: Copy,
    E: Expression<Elem = T> + ?Sized,
{
    if linear_applies(dest, src) {
        AssignStrategy::Linear
    } else if src.strided().is_some() {
        AssignStrategy::Strided
    } else {
        AssignStrategy::Cursor
    }
}

fn linear_applies<T, E>(dest: &StridedViewMut<'_, T>, src: &E) -> bool
where
    T: Copy,
    E: Expression<Elem = T> + ?Sized,
{
    dest.is_contiguous_canonical()
        && src.is_trivial_broadcast(&shape::normalize_strides(dest.dims(), dest.strides()))
}

/// Evaluate `src`, broadcast to the shape of `dest`, into `dest`.
///
/// # Errors
/// [`ExprError::ShapeMismatch`] if `src` does not broadcast to the
/// destination shape.
///
/// # Example
///
/// ```rust
/// use strided_expr::{assign, Array, Expression, Layout, Scalar};
///
/// let mut out = Array::<i32>::zeros(&[2, 3], Layout::ColumnMajor);
/// let row = Array::from_vec(vec![1, 2, 3], &[3], Layout::RowMajor).unwrap();
/// assign(&mut out.view_mut(), &row).unwrap();
/// assert_eq!(out.get(&[1, 2]).unwrap(), 3);
///
/// assign(&mut out.view_mut(), &Scalar(7)).unwrap();
/// assert!(out.as_slice().iter().all(|&x| x == 7));
/// ```
pub fn assign<T, E>(dest: &mut StridedViewMut<'_, T>, src: &E) -> Result<()>
where
    T: Copy,
    E: Expression<Elem = T> + ?Sized,
{
    shape::check_broadcast_to(&src.shape(), dest.dims())?;
    let strategy = select_strategy(dest, src);
    run(dest, src, strategy)
}

/// Like [`assign`], but with a forced evaluation path.
///
/// # Errors
/// [`ExprError::ShapeMismatch`] as for [`assign`];
/// [`ExprError::StrategyNotApplicable`] if the preconditions of `strategy`
/// do not hold for this pair.
pub fn assign_with<T, E>(dest: &mut StridedViewMut<'_, T>, src: &E, strategy: AssignStrategy) -> Result<()>
where
    T: Copy,
    E: Expression<Elem = T> + ?Sized,
{
    shape::check_broadcast_to(&src.shape(), dest.dims())?;
    let applicable = match strategy {
        AssignStrategy::Linear => linear_applies(dest, src),
        AssignStrategy::Strided => src.strided().is_some(),
        AssignStrategy::Cursor => true,
    };
    if !applicable {
        return Err(ExprError::StrategyNotApplicable(strategy));
    }
    run(dest, src, strategy)
}

fn run<T, E>(dest: &mut StridedViewMut<'_, T>, src: &E, strategy: AssignStrategy) -> Result<()>
where
    T: Copy,
    E: Expression<Elem = T> + ?Sized,
{
    if dest.is_empty() {
        return Ok(());
    }
    tracing::trace!(shape = ?dest.dims(), ?strategy, "assign");
    match strategy {
        AssignStrategy::Linear => assign_linear(dest, src),
        AssignStrategy::Strided => assign_strided(dest, src),
        AssignStrategy::Cursor => {
            assign_cursor(dest, src);
            Ok(())
        }
    }
}

fn assign_linear<T, E>(dest: &mut StridedViewMut<'_, T>, src: &E) -> Result<()>
where
    T: Copy,
    E: Expression<Elem = T> + ?Sized,
{
    let layout = dest.layout();
    let out = dest
        .contiguous_mut()
        .ok_or(ExprError::UnsupportedLayout(layout))?;
    match src.contiguous_slice() {
        Some(block) if block.len() == out.len() => out.copy_from_slice(block),
        _ => simd::fill_linear(out, |i| src.linear_element(i)),
    }
    Ok(())
}

fn assign_strided<T, E>(dest: &mut StridedViewMut<'_, T>, src: &E) -> Result<()>
where
    T: Copy,
    E: Expression<Elem = T> + ?Sized,
{
    let parts = src
        .strided()
        .ok_or(ExprError::StrategyNotApplicable(AssignStrategy::Strided))?;
    let (out, dims, dest_strides, dest_offset) = dest.raw_parts_mut();
    let src_strides = shape::broadcast_strides(&parts.shape, &parts.strides, dims)?;

    let strides_list = [dest_strides, &src_strides[..]];
    let plan = build_plan(dims, &strides_list, Some(0), size_of::<T>().max(1));

    let dest_base = dest_offset as isize;
    let src_base = parts.offset as isize;
    let input = parts.data;
    for_each_inner_block(&plan, |offsets, len, inner| {
        let d = (dest_base + offsets[0]) as usize;
        let s = (src_base + offsets[1]) as usize;
        if inner[0] == 1 && inner[1] == 1 {
            out[d..d + len].copy_from_slice(&input[s..s + len]);
            return Ok(());
        }
        let (ds, ss) = (inner[0], inner[1]);
        simd::dispatch_if_large(len, || {
            let mut d = d as isize;
            let mut s = s as isize;
            for _ in 0..len {
                out[d as usize] = input[s as usize];
                d += ds;
                s += ss;
            }
        });
        Ok(())
    })
}

fn assign_cursor<T, E>(dest: &mut StridedViewMut<'_, T>, src: &E)
where
    T: Copy,
    E: Expression<Elem = T> + ?Sized,
{
    let target: Dims = Dims::from_slice(dest.dims());
    let traversal = dest.layout().traversal().unwrap_or(Traversal::RowMajor);
    let mut walker = IndexWalker::new(&target, traversal);
    let mut pair = (dest.cursor_mut(&target), src.cursor(&target));
    loop {
        let value = pair.1.value();
        pair.0.write(value);
        if !walker.advance(&mut pair) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;
    use crate::{binary, s, Array, Broadcast, Scalar};

    fn iota(shape: &[usize], layout: Layout) -> Array<i64> {
        Array::from_fn(shape, layout, |idx| {
            idx.iter().fold(0i64, |acc, &i| acc * 10 + i as i64)
        })
    }

    #[test]
    fn test_strategy_selection() {
        let a = iota(&[3, 4], Layout::RowMajor);
        let cm = iota(&[3, 4], Layout::ColumnMajor);
        let mut out = Array::<i64>::zeros(&[3, 4], Layout::RowMajor);
        let dest = out.view_mut();

        assert_eq!(select_strategy(&dest, &a), AssignStrategy::Linear);
        assert_eq!(select_strategy(&dest, &cm), AssignStrategy::Strided);
        let row = iota(&[4], Layout::RowMajor);
        assert_eq!(select_strategy(&dest, &row), AssignStrategy::Strided);
        let f = binary(|x: i64, y: i64| x + y, &a, &row).unwrap();
        assert_eq!(select_strategy(&dest, &f), AssignStrategy::Cursor);
        let g = binary(|x: i64, y: i64| x - y, &a, &a).unwrap();
        assert_eq!(select_strategy(&dest, &g), AssignStrategy::Linear);
    }

    #[test]
    fn test_paths_agree() {
        let src = iota(&[3, 4], Layout::ColumnMajor);
        let mut expected = Array::<i64>::zeros(&[3, 4], Layout::RowMajor);
        assign_with(&mut expected.view_mut(), &src, AssignStrategy::Cursor).unwrap();

        let mut strided = Array::<i64>::zeros(&[3, 4], Layout::RowMajor);
        assign_with(&mut strided.view_mut(), &src, AssignStrategy::Strided).unwrap();
        assert_eq!(strided, expected);

        let mut auto = Array::<i64>::zeros(&[3, 4], Layout::RowMajor);
        assign(&mut auto.view_mut(), &src).unwrap();
        assert_eq!(auto, expected);
        assert_eq!(auto.get(&[2, 3]).unwrap(), 23);
    }

    #[test]
    fn test_linear_path_copies_block() {
        let src = iota(&[2, 5], Layout::RowMajor);
        let mut out = Array::<i64>::zeros(&[2, 5], Layout::RowMajor);
        assign_with(&mut out.view_mut(), &src, AssignStrategy::Linear).unwrap();
        assert_eq!(out.as_slice(), src.as_slice());
    }

    #[test]
    fn test_broadcast_row_into_column_major() {
        let row = Array::from_vec(vec![1, 2, 3], &[1, 3], Layout::RowMajor).unwrap();
        let mut out = Array::<i32>::zeros(&[2, 3], Layout::ColumnMajor);
        assign(&mut out.view_mut(), &row).unwrap();
        assert_eq!(out.as_slice(), &[1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn test_scalar_fills_destination() {
        let mut out = Array::<f64>::zeros(&[2, 2], Layout::RowMajor);
        assign(&mut out.view_mut(), &Scalar(2.5)).unwrap();
        assert!(out.as_slice().iter().all(|&x| x == 2.5));
    }

    #[test]
    fn test_into_strided_subview() {
        let mut out = Array::<i64>::zeros(&[4, 4], Layout::RowMajor);
        let src = iota(&[2, 2], Layout::RowMajor);
        {
            let mut corner = out.slice_mut(&s![2.., 1..;2]).unwrap();
            assign(&mut corner, &src).unwrap();
        }
        assert_eq!(out.get(&[2, 1]).unwrap(), 0);
        assert_eq!(out.get(&[2, 3]).unwrap(), 1);
        assert_eq!(out.get(&[3, 1]).unwrap(), 10);
        assert_eq!(out.get(&[3, 3]).unwrap(), 11);
        assert_eq!(out.as_slice().iter().filter(|&&x| x != 0).count(), 3);
    }

    #[test]
    fn test_shape_mismatch() {
        let src = iota(&[3], Layout::RowMajor);
        let mut out = Array::<i64>::zeros(&[2, 4], Layout::RowMajor);
        let err = assign(&mut out.view_mut(), &src).unwrap_err();
        assert!(matches!(err, ExprError::ShapeMismatch(_, _)));
    }

    #[test]
    fn test_forced_strategy_not_applicable() {
        let a = iota(&[2, 2], Layout::RowMajor);
        let f = binary(|x: i64, y: i64| x * y, &a, &a).unwrap();
        let mut out = Array::<i64>::zeros(&[2, 2], Layout::ColumnMajor);
        let err = assign_with(&mut out.view_mut(), &f, AssignStrategy::Strided).unwrap_err();
        assert_eq!(err, ExprError::StrategyNotApplicable(AssignStrategy::Strided));
        let err = assign_with(&mut out.view_mut(), &f, AssignStrategy::Linear).unwrap_err();
        assert_eq!(err, ExprError::StrategyNotApplicable(AssignStrategy::Linear));
    }

    #[test]
    fn test_broadcast_node_source() {
        let col = iota(&[3, 1], Layout::RowMajor);
        let b = Broadcast::new(&col, &[3, 2]).unwrap();
        let mut out = Array::<i64>::zeros(&[3, 2], Layout::RowMajor);
        assign(&mut out.view_mut(), &b).unwrap();
        assert_eq!(out.as_slice(), &[0, 0, 10, 10, 20, 20]);
    }

    #[test]
    fn test_empty_destination() {
        let src = Array::<i64>::zeros(&[0, 3], Layout::RowMajor);
        let mut out = Array::<i64>::zeros(&[0, 3], Layout::RowMajor);
        for strategy in [AssignStrategy::Strided, AssignStrategy::Cursor] {
            assign_with(&mut out.view_mut(), &src, strategy).unwrap();
        }
    }
}
