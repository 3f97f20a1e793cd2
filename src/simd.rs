//! Optional runtime SIMD dispatch.
//!
//! With the `simd` feature the closure runs under `pulp`'s best available
//! instruction set, so the compiler can auto-vectorize the loop inside it.
//! Without the feature the closure is called directly.

/// Loops shorter than this skip the dispatch.
pub(crate) const DISPATCH_THRESHOLD: usize = 64;

#[inline(always)]
pub(crate) fn dispatch<R>(f: impl FnOnce() -> R) -> R {
    #[cfg(feature = "simd")]
    {
        pulp::Arch::new().dispatch(f)
    }
    #[cfg(not(feature = "simd"))]
    {
        f()
    }
}

#[inline(always)]
pub(crate) fn dispatch_if_large<R>(len: usize, f: impl FnOnce() -> R) -> R {
    if len >= DISPATCH_THRESHOLD {
        dispatch(f)
    } else {
        f()
    }
}

/// Write `value_at(i)` to every `out[i]`.
#[inline]
pub(crate) fn fill_linear<T>(out: &mut [T], value_at: impl Fn(usize) -> T) {
    dispatch_if_large(out.len(), || {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = value_at(i);
        }
    })
}
