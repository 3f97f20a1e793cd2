//! Compound assignment of expressions into arrays.
//!
//! `dest op= rhs` evaluates `binary(op, dest, rhs)` back into `dest`. The
//! right-hand side must broadcast to the shape of `dest`. The current
//! contents of `dest` are snapshotted first, so the walk never reads an
//! element it has already overwritten.

use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Sub, SubAssign};

use crate::array::Array;
use crate::expression::Expression;
use crate::function::binary;
use crate::Result;

macro_rules! compound_assign {
    ($fn_name:ident, $Op:ident, $op:ident, $OpAssign:ident, $op_assign:ident, $sym:literal) => {
        #[doc = concat!("`dest ", $sym, "= rhs` with `rhs` broadcast to the shape of `dest`.")]
        ///
        /// # Errors
        /// [`ExprError::ShapeMismatch`](crate::ExprError::ShapeMismatch) if
        /// `rhs` does not broadcast to `dest`. `dest` is unchanged then.
        pub fn $fn_name<T, E>(dest: &mut Array<T>, rhs: &E) -> Result<()>
        where
            T: Copy + $Op<Output = T>,
            E: Expression<Elem = T> + ?Sized,
        {
            let snapshot = dest.clone();
            let expr = binary(|a: T, b: T| a.$op(b), &snapshot, rhs)?;
            dest.assign(&expr)
        }

        #[doc = concat!("Panics where [`", stringify!($fn_name), "`] returns an error.")]
        impl<T, E> $OpAssign<E> for Array<T>
        where
            T: Copy + $Op<Output = T>,
            E: Expression<Elem = T>,
        {
            fn $op_assign(&mut self, rhs: E) {
                if let Err(e) = $fn_name(self, &rhs) {
                    panic!("{e}");
                }
            }
        }
    };
}

compound_assign!(add_assign_expr, Add, add, AddAssign, add_assign, "+");
compound_assign!(sub_assign_expr, Sub, sub, SubAssign, sub_assign, "-");
compound_assign!(mul_assign_expr, Mul, mul, MulAssign, mul_assign, "*");
compound_assign!(div_assign_expr, Div, div, DivAssign, div_assign, "/");
