//! Lazy N-dimensional array expressions over strided storage.
//!
//! This crate provides the addressing and traversal engine of an array
//! expression library: callers compose broadcasts, slices, transposes and
//! element-wise functions over dense arrays without materializing
//! intermediate buffers, and evaluate the resulting expression tree into
//! concrete storage only when asked to.
//!
//! # Core Types
//!
//! - [`Array`]: Owned dense storage with a row-major, column-major or dynamic layout
//! - [`StridedView`] / [`StridedViewMut`]: Zero-copy strided views over existing data
//! - [`Broadcast`], [`View`], [`Function`], [`Scalar`]: Lazy expression nodes
//! - [`Expression`]: The contract every node implements (shape, element access, cursors)
//! - [`Cursor`]: Position-plus-navigation used to walk any expression in lock-step
//!
//! # Evaluation
//!
//! [`assign`] copies a source expression into a destination view, broadcasting
//! the source to the destination shape. It picks the fastest valid path:
//!
//! - a flat loop when both sides share one contiguous addressing ([`AssignStrategy::Linear`])
//! - a blocked strided copy when the source is a strided leaf ([`AssignStrategy::Strided`])
//! - a cursor-driven walk otherwise ([`AssignStrategy::Cursor`])
//!
//! All paths produce identical results.
//!
//! # Example
//!
//! ```rust
//! use strided_expr::{binary, s, Array, Expression, Layout};
//!
//! let a = Array::from_fn(&[3, 4], Layout::RowMajor, |idx| (idx[0] * 4 + idx[1]) as f64);
//! let row = Array::from_vec(vec![10.0, 20.0, 30.0, 40.0], &[1, 4], Layout::RowMajor).unwrap();
//!
//! // Rows 1..3 of `a`, plus the broadcast row.
//! let tail = a.slice(&s![1..3, ..]).unwrap();
//! let sum = binary(|x: f64, y: f64| x + y, &tail, &row).unwrap();
//!
//! let mut out = Array::<f64>::zeros(&[2, 4], Layout::RowMajor);
//! out.assign(&sum).unwrap();
//! assert_eq!(out.get(&[0, 0]).unwrap(), 14.0);
//! assert_eq!(out.get(&[1, 3]).unwrap(), 51.0);
//! ```

mod array;
mod assign;
mod auxiliary;
mod block;
pub mod broadcast;
pub mod cursor;
mod expression;
mod function;
mod fuse;
mod kernel;
pub mod layout;
mod order;
mod semantic;
pub mod shape;
mod simd;
pub mod slice;
mod view;
mod view_expr;

// ============================================================================
// Storage and views
// ============================================================================
pub use array::Array;
pub use view::{StridedView, StridedViewMut};

// ============================================================================
// Expression nodes
// ============================================================================
pub use broadcast::{broadcast_to, Broadcast};
pub use expression::{Elements, Expression, Scalar, StridedParts};
pub use function::{binary, quaternary, ternary, unary, Function, FunctionCursor};
pub use slice::SliceSpec;
pub use view_expr::{view, View, ViewCursor};

// ============================================================================
// Traversal and evaluation
// ============================================================================
pub use assign::{assign, assign_with, select_strategy, AssignStrategy};
pub use cursor::{Cursor, IndexWalker, StridedCursor, StridedCursorMut};
pub use layout::{Layout, Traversal};
pub use semantic::{add_assign_expr, div_assign_expr, mul_assign_expr, sub_assign_expr};
pub use shape::{Dims, Strides};

// ============================================================================
// Constants
// ============================================================================

/// Block memory size for cache-optimized strided copies (L1 cache target).
///
/// The strided assignment path tiles its iteration space so that each tile
/// touches at most this many bytes across source and destination.
pub const BLOCK_MEMORY_SIZE: usize = 32 * 1024;

/// Cache line size in bytes.
///
/// Used for memory region calculations in block size computation.
pub const CACHE_LINE_SIZE: usize = 64;

// ============================================================================
// Error types
// ============================================================================

/// Errors raised while building or evaluating array expressions.
///
/// Every error is reported where it is detected: shape and dimension errors
/// when a node is constructed, index errors by checked accessors, and
/// assignment errors before the destination is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    /// Shapes are not broadcast-compatible (or element counts differ).
    #[error("shape mismatch: {0:?} vs {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),

    /// Too many indices or slice descriptors for the expression rank.
    #[error("dimension mismatch: got {got} for rank {rank}")]
    DimensionMismatch { got: usize, rank: usize },

    /// A single index (or range start) lies outside its axis.
    #[error("index {index} out of bounds for axis {axis} with extent {extent}")]
    IndexOutOfBounds {
        index: isize,
        axis: usize,
        extent: usize,
    },

    /// The operation needs a row-major or column-major layout.
    #[error("operation not defined for {0:?} layout")]
    UnsupportedLayout(layout::Layout),

    /// A range descriptor was given a step of zero.
    #[error("slice step is zero for axis {axis}")]
    ZeroStep { axis: usize },

    /// An index-array selection was requested where constant strides are needed.
    #[error("selection cannot be expressed as a strided view")]
    NonStridedSelection,

    /// Invalid axis index for the given rank.
    #[error("invalid axis {axis} for rank {rank}")]
    InvalidAxis { axis: usize, rank: usize },

    /// A view would address memory outside of its buffer.
    #[error("offset overflow while computing view bounds")]
    OffsetOverflow,

    /// Stride array length doesn't match the shape.
    #[error("stride and shape length mismatch")]
    StrideLengthMismatch,

    /// A forced assignment path cannot handle this destination/source pair.
    #[error("assignment strategy {0:?} is not applicable")]
    StrategyNotApplicable(assign::AssignStrategy),
}

/// Result type for expression operations.
pub type Result<T> = std::result::Result<T, ExprError>;
