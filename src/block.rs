//! Block sizes for the strided copy kernel.
//!
//! The kernel tiles its iteration space so that one tile of every array
//! fits in [`BLOCK_MEMORY_SIZE`] bytes. The memory estimate counts cache
//! lines: small strides add up to one contiguous run, strides of a cache
//! line or more multiply the number of separate runs.

use crate::auxiliary::index_order;
use crate::fuse::compute_costs;
use crate::shape::{Dims, Strides};
use crate::{BLOCK_MEMORY_SIZE, CACHE_LINE_SIZE};

/// Block size of each axis, for axes and strides already in iteration
/// order (innermost first).
pub(crate) fn compute_block_sizes(dims: &[usize], strides_list: &[Strides], elem_size: usize) -> Dims {
    if dims.is_empty() {
        return Dims::new();
    }
    let byte_strides: Vec<Strides> = strides_list
        .iter()
        .map(|s| s.iter().map(|&x| x * elem_size as isize).collect())
        .collect();
    let stride_orders: Vec<Dims> = byte_strides.iter().map(|bs| index_order(bs)).collect();
    let stride_refs: Vec<&[isize]> = strides_list.iter().map(|s| s.as_slice()).collect();
    let costs = compute_costs(&stride_refs);

    let byte_refs: Vec<&[isize]> = byte_strides.iter().map(|s| s.as_slice()).collect();
    let order_refs: Vec<&[usize]> = stride_orders.iter().map(|s| s.as_slice()).collect();
    compute_blocks(dims, &costs, &byte_refs, &order_refs, BLOCK_MEMORY_SIZE)
}

fn compute_blocks(
    dims: &[usize],
    costs: &[isize],
    byte_strides: &[&[isize]],
    stride_orders: &[&[usize]],
    block_size: usize,
) -> Dims {
    if dims.is_empty() {
        return Dims::new();
    }
    if total_memory_region(dims, byte_strides) <= block_size {
        return Dims::from_slice(dims);
    }

    // The innermost axis is the fastest one for every array: keep it whole
    // and block the rest.
    let min_order = stride_orders
        .iter()
        .filter_map(|orders| orders.iter().min().copied())
        .min()
        .unwrap_or(1);
    if stride_orders.iter().all(|o| o.first() == Some(&min_order)) {
        let tail_strides: Vec<&[isize]> = byte_strides.iter().map(|s| &s[1..]).collect();
        let tail_orders: Vec<&[usize]> = stride_orders.iter().map(|s| &s[1..]).collect();
        let mut blocks = Dims::with_capacity(dims.len());
        blocks.push(dims[0]);
        blocks.extend(compute_blocks(&dims[1..], &costs[1..], &tail_strides, &tail_orders, block_size));
        return blocks;
    }

    let min_stride = byte_strides
        .iter()
        .filter_map(|s| s.iter().map(|x| x.unsigned_abs()).min())
        .min()
        .unwrap_or(0);
    if min_stride > block_size {
        return Dims::from_elem(1, dims.len());
    }

    let mut blocks = Dims::from_slice(dims);
    while total_memory_region(&blocks, byte_strides) >= 2 * block_size {
        match last_argmax_weighted(&blocks, costs) {
            Some(i) => blocks[i] = (blocks[i] + 1) / 2,
            None => break,
        }
    }
    while total_memory_region(&blocks, byte_strides) > block_size {
        match last_argmax_weighted(&blocks, costs) {
            Some(i) => blocks[i] -= 1,
            None => break,
        }
    }
    blocks
}

/// Bytes touched by one tile of extents `dims`, summed over the arrays.
fn total_memory_region(dims: &[usize], byte_strides: &[&[isize]]) -> usize {
    byte_strides
        .iter()
        .map(|strides| {
            let mut contiguous = 0usize;
            let mut runs = 1usize;
            for (&d, &s) in dims.iter().zip(strides.iter()) {
                let s = s.unsigned_abs();
                if s < CACHE_LINE_SIZE {
                    contiguous += d.saturating_sub(1) * s;
                } else {
                    runs = runs.saturating_mul(d);
                }
            }
            let lines = contiguous / CACHE_LINE_SIZE + 1;
            CACHE_LINE_SIZE.saturating_mul(lines).saturating_mul(runs)
        })
        .fold(0usize, usize::saturating_add)
}

/// Last axis maximizing `(blocks[i] - 1) * costs[i]`, skipping blocks of 1.
fn last_argmax_weighted(blocks: &[usize], costs: &[isize]) -> Option<usize> {
    let mut best = None;
    let mut max_score = 0isize;
    for (i, (&b, &c)) in blocks.iter().zip(costs).enumerate() {
        if b <= 1 {
            continue;
        }
        let score = (b as isize - 1) * c;
        if score >= max_score {
            max_score = score;
            best = Some(i);
        }
    }
    best
}
