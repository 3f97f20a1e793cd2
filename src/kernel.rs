//! Tiled iteration engine for strided copies.
//!
//! [`build_plan`] brings the iteration space into a canonical form: axes are
//! sorted innermost first, unit axes are dropped, contiguous neighbours are
//! fused and every axis gets a block size. [`for_each_inner_block`] then
//! walks the tiles and hands each innermost run to a callback.

use smallvec::SmallVec;

use crate::fuse::fuse_dims;
use crate::shape::{Dims, Strides};
use crate::{block, order, Result};

/// Canonical iteration space shared by every array of one operation.
///
/// All fields are in iteration order, innermost axis first.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct KernelPlan {
    pub(crate) dims: Dims,
    pub(crate) strides: SmallVec<[Strides; 2]>,
    pub(crate) blocks: Dims,
}

/// Build an execution plan for arrays of shape `dims` with the given
/// element strides. `dest_index` names the array that is written.
pub(crate) fn build_plan(
    dims: &[usize],
    strides_list: &[&[isize]],
    dest_index: Option<usize>,
    elem_size: usize,
) -> KernelPlan {
    let order = order::compute_order(dims, strides_list, dest_index);
    let ordered_dims: Dims = order.iter().map(|&axis| dims[axis]).collect();
    let ordered_strides: SmallVec<[Strides; 2]> = strides_list
        .iter()
        .map(|s| order.iter().map(|&axis| s[axis]).collect())
        .collect();

    let (dims, strides) = squeeze(&ordered_dims, &ordered_strides);
    let refs: SmallVec<[&[isize]; 2]> = strides.iter().map(|s| s.as_slice()).collect();
    let fused = fuse_dims(&dims, &refs);
    let (dims, strides) = squeeze(&fused, &strides);

    let blocks = block::compute_block_sizes(&dims, &strides, elem_size);
    KernelPlan { dims, strides, blocks }
}

/// Drop extent-1 axes. They contribute nothing to any offset.
fn squeeze(dims: &[usize], strides: &[Strides]) -> (Dims, SmallVec<[Strides; 2]>) {
    let keep: Dims = (0..dims.len()).filter(|&i| dims[i] != 1).collect();
    let out_dims = keep.iter().map(|&i| dims[i]).collect();
    let out_strides = strides
        .iter()
        .map(|s| keep.iter().map(|&i| s[i]).collect())
        .collect();
    (out_dims, out_strides)
}

/// Visit every innermost run of the plan.
///
/// `f(offsets, len, inner_strides)` receives the element offset of the run
/// start in each array, the run length and the innermost stride of each
/// array. An empty iteration space never calls `f`; a rank-0 plan calls it
/// once with length 1.
pub(crate) fn for_each_inner_block<F>(plan: &KernelPlan, mut f: F) -> Result<()>
where
    F: FnMut(&[isize], usize, &[isize]) -> Result<()>,
{
    let arrays = plan.strides.len();
    let mut offsets: SmallVec<[isize; 2]> = SmallVec::from_elem(0, arrays);
    if plan.dims.iter().any(|&d| d == 0) {
        return Ok(());
    }
    if plan.dims.is_empty() {
        let zeros: SmallVec<[isize; 2]> = SmallVec::from_elem(0, arrays);
        return f(&offsets, 1, &zeros);
    }

    let inner: SmallVec<[isize; 2]> = plan.strides.iter().map(|s| s[0]).collect();
    let mut tile = plan.dims.clone();
    let top = plan.dims.len() - 1;
    tile_loop(plan, top, &mut tile, &mut offsets, &inner, &mut f)
}

fn tile_loop<F>(
    plan: &KernelPlan,
    level: usize,
    tile: &mut Dims,
    offsets: &mut [isize],
    inner: &[isize],
    f: &mut F,
) -> Result<()>
where
    F: FnMut(&[isize], usize, &[isize]) -> Result<()>,
{
    let extent = plan.dims[level];
    let block = plan.blocks.get(level).copied().unwrap_or(extent).clamp(1, extent);
    let mut start = 0;
    while start < extent {
        let len = block.min(extent - start);
        tile[level] = len;
        if level == 0 {
            element_loop(plan, plan.dims.len() - 1, tile, offsets, inner, f)?;
        } else {
            tile_loop(plan, level - 1, tile, offsets, inner, f)?;
        }
        advance(offsets, &plan.strides, level, len as isize);
        start += len;
    }
    advance(offsets, &plan.strides, level, -(extent as isize));
    Ok(())
}

fn element_loop<F>(
    plan: &KernelPlan,
    level: usize,
    tile: &Dims,
    offsets: &mut [isize],
    inner: &[isize],
    f: &mut F,
) -> Result<()>
where
    F: FnMut(&[isize], usize, &[isize]) -> Result<()>,
{
    if level == 0 {
        return f(offsets, tile[0], inner);
    }
    for _ in 0..tile[level] {
        element_loop(plan, level - 1, tile, offsets, inner, f)?;
        advance(offsets, &plan.strides, level, 1);
    }
    advance(offsets, &plan.strides, level, -(tile[level] as isize));
    Ok(())
}

#[inline]
fn advance(offsets: &mut [isize], strides: &[Strides], level: usize, n: isize) {
    for (offset, s) in offsets.iter_mut().zip(strides) {
        *offset += s[level] * n;
    }
}
