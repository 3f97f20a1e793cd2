//! Layout model.
//!
//! A [`Layout`] says how a dense buffer maps multi-indices to linear
//! positions. [`layout_matches`] and [`layout_of`] recognize the layout a
//! given stride sequence is consistent with.

use crate::{ExprError, Result};

/// Memory layout of a dense storage or view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Layout {
    /// Last axis varies fastest (C order).
    #[default]
    RowMajor,
    /// First axis varies fastest (Fortran order).
    ColumnMajor,
    /// Strides follow neither canonical order; only the generic walk is valid.
    Dynamic,
    /// Layout is immaterial (zero or one element).
    Any,
}

/// Order in which a multi-axis walk visits elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Traversal {
    /// Innermost loop on the last axis.
    #[default]
    RowMajor,
    /// Innermost loop on the first axis.
    ColumnMajor,
}

impl Layout {
    /// Traversal order implied by this layout.
    ///
    /// `Any` walks row-major.
    ///
    /// # Errors
    /// [`ExprError::UnsupportedLayout`] for `Dynamic`, which has no order.
    pub fn traversal(self) -> Result<Traversal> {
        match self {
            Layout::RowMajor | Layout::Any => Ok(Traversal::RowMajor),
            Layout::ColumnMajor => Ok(Traversal::ColumnMajor),
            Layout::Dynamic => Err(ExprError::UnsupportedLayout(self)),
        }
    }

    /// Whether this is one of the two canonical orders.
    #[inline]
    pub fn is_canonical(self) -> bool {
        matches!(self, Layout::RowMajor | Layout::ColumnMajor)
    }
}

impl From<Traversal> for Layout {
    fn from(t: Traversal) -> Self {
        match t {
            Traversal::RowMajor => Layout::RowMajor,
            Traversal::ColumnMajor => Layout::ColumnMajor,
        }
    }
}

/// Check that `strides` are exactly the canonical strides of `shape` in `layout`.
///
/// With `check_trailing_ones == false`, axes of extent 1 are skipped: their
/// stride never contributes to an address, so a view can be contiguous even
/// when those strides hold leftovers from slicing. With `true`, such axes
/// must carry stride 0 (the normalized value) or the running element count.
///
/// `Any` matches either canonical order. `Dynamic` never matches.
pub fn layout_matches(
    shape: &[usize],
    strides: &[isize],
    layout: Layout,
    check_trailing_ones: bool,
) -> bool {
    if shape.len() != strides.len() {
        return false;
    }
    let axis_ok = |n: usize, s: isize, data_size: isize| {
        if n == 1 {
            !check_trailing_ones || s == 0 || s == data_size
        } else {
            s == data_size
        }
    };
    match layout {
        Layout::RowMajor => {
            let mut data_size = 1isize;
            for i in (0..shape.len()).rev() {
                if !axis_ok(shape[i], strides[i], data_size) {
                    return false;
                }
                data_size *= shape[i] as isize;
            }
            true
        }
        Layout::ColumnMajor => {
            let mut data_size = 1isize;
            for i in 0..shape.len() {
                if !axis_ok(shape[i], strides[i], data_size) {
                    return false;
                }
                data_size *= shape[i] as isize;
            }
            true
        }
        Layout::Any => {
            layout_matches(shape, strides, Layout::RowMajor, check_trailing_ones)
                || layout_matches(shape, strides, Layout::ColumnMajor, check_trailing_ones)
        }
        Layout::Dynamic => false,
    }
}

/// Recognize the layout of a stride sequence.
///
/// Tries row-major, then column-major (extent-1 axes ignored), and reports
/// `Dynamic` when neither fits.
pub fn layout_of(shape: &[usize], strides: &[isize]) -> Layout {
    if layout_matches(shape, strides, Layout::RowMajor, false) {
        Layout::RowMajor
    } else if layout_matches(shape, strides, Layout::ColumnMajor, false) {
        Layout::ColumnMajor
    } else {
        Layout::Dynamic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::compute_strides;

    #[test]
    fn test_layout_matches_canonical() {
        let shape = [2, 3, 4];
        let rm = compute_strides(&shape, Layout::RowMajor);
        let cm = compute_strides(&shape, Layout::ColumnMajor);
        assert!(layout_matches(&shape, &rm, Layout::RowMajor, true));
        assert!(layout_matches(&shape, &cm, Layout::ColumnMajor, true));
        assert!(!layout_matches(&shape, &rm, Layout::ColumnMajor, true));
        assert!(layout_matches(&shape, &cm, Layout::Any, false));
        assert!(!layout_matches(&shape, &rm, Layout::Dynamic, false));
    }

    #[test]
    fn test_layout_matches_trailing_ones() {
        // Row 1 of a (3, 4) row-major buffer, kept as a (1, 4) view.
        let shape = [1, 4];
        let strides = [4, 1];
        assert!(layout_matches(&shape, &strides, Layout::RowMajor, true));
        // A stale stride on the unit axis is only tolerated when ignored.
        let stale = [7, 1];
        assert!(layout_matches(&shape, &stale, Layout::RowMajor, false));
        assert!(!layout_matches(&shape, &stale, Layout::RowMajor, true));
    }

    #[test]
    fn test_layout_of() {
        assert_eq!(layout_of(&[3, 4], &[4, 1]), Layout::RowMajor);
        assert_eq!(layout_of(&[3, 4], &[1, 3]), Layout::ColumnMajor);
        assert_eq!(layout_of(&[3, 4], &[8, 2]), Layout::Dynamic);
        assert_eq!(layout_of(&[3, 4], &[-4, 1]), Layout::Dynamic);
        assert_eq!(layout_of(&[4], &[1]), Layout::RowMajor);
    }

    #[test]
    fn test_traversal() {
        assert_eq!(Layout::Any.traversal().unwrap(), Traversal::RowMajor);
        assert_eq!(Layout::ColumnMajor.traversal().unwrap(), Traversal::ColumnMajor);
        assert_eq!(
            Layout::Dynamic.traversal(),
            Err(ExprError::UnsupportedLayout(Layout::Dynamic))
        );
    }
}
