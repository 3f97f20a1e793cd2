//! Elementwise-function expression node.
//!
//! [`Function`] applies a pure function to the elements of 1 to 4 operand
//! expressions. Its shape is the broadcast promotion of the operand shapes,
//! and its cursor holds one sub-cursor per operand and moves them in
//! lock-step.

use crate::broadcast::broadcast_shapes;
use crate::cursor::Cursor;
use crate::expression::Expression;
use crate::shape::Dims;
use crate::Result;

/// Lazy elementwise application of `f` to the operands in `args`.
///
/// `Args` is a tuple of expressions. Construct with [`unary`], [`binary`],
/// [`ternary`], [`quaternary`] or `Function::new`.
#[derive(Debug, Clone)]
pub struct Function<F, Args> {
    f: F,
    args: Args,
}

/// Cursor of a [`Function`]: one cursor per operand plus the function.
#[derive(Debug, Clone)]
pub struct FunctionCursor<'a, F, Cursors> {
    f: &'a F,
    cursors: Cursors,
}

impl<F, Args> Function<F, Args> {
    /// The operand tuple.
    pub fn args(&self) -> &Args {
        &self.args
    }
}

macro_rules! impl_function {
    ($ctor:ident; $($A:ident $a:ident $C:ident $idx:tt),+) => {
        impl<F, $($A: Expression),+> Function<F, ($($A,)+)> {
            /// Build the node, checking that the operand shapes broadcast together.
            ///
            /// # Errors
            /// [`ExprError::ShapeMismatch`](crate::ExprError::ShapeMismatch)
            /// when two operands are incompatible.
            pub fn new(f: F, args: ($($A,)+)) -> Result<Self> {
                broadcast_shapes(&[$(&args.$idx.shape()[..]),+])?;
                Ok(Self { f, args })
            }
        }

        /// Build a [`Function`] node over the given operands.
        pub fn $ctor<F, R, $($A),+>(f: F, $($a: $A),+) -> Result<Function<F, ($($A,)+)>>
        where
            $($A: Expression,)+
            F: Fn($($A::Elem),+) -> R,
            R: Copy,
        {
            Function::<F, ($($A,)+)>::new(f, ($($a,)+))
        }

        impl<F, R, $($A),+> Expression for Function<F, ($($A,)+)>
        where
            $($A: Expression,)+
            F: Fn($($A::Elem),+) -> R,
            R: Copy,
        {
            type Elem = R;
            type Cursor<'a> = FunctionCursor<'a, F, ($($A::Cursor<'a>,)+)> where Self: 'a;

            fn shape(&self) -> Dims {
                // Operands were checked compatible at construction.
                broadcast_shapes(&[$(&self.args.$idx.shape()[..]),+]).unwrap_or_default()
            }

            fn broadcast_shape(&self, shape: &mut Dims) -> Result<bool> {
                let mut trivial = true;
                $( trivial &= self.args.$idx.broadcast_shape(shape)?; )+
                Ok(trivial)
            }

            #[inline]
            fn element(&self, index: &[usize]) -> R {
                (self.f)($(self.args.$idx.element(index)),+)
            }

            fn is_trivial_broadcast(&self, strides: &[isize]) -> bool {
                true $(&& self.args.$idx.is_trivial_broadcast(strides))+
            }

            #[inline]
            fn linear_element(&self, i: usize) -> R {
                (self.f)($(self.args.$idx.linear_element(i)),+)
            }

            fn cursor(&self, target: &[usize]) -> Self::Cursor<'_> {
                FunctionCursor {
                    f: &self.f,
                    cursors: ($(self.args.$idx.cursor(target),)+),
                }
            }
        }

        impl<'a, F, R, $($C: Cursor),+> Cursor for FunctionCursor<'a, F, ($($C,)+)>
        where
            F: Fn($($C::Item),+) -> R,
        {
            type Item = R;

            #[inline]
            fn step_n(&mut self, axis: usize, n: usize) {
                $( self.cursors.$idx.step_n(axis, n); )+
            }

            #[inline]
            fn step_back_n(&mut self, axis: usize, n: usize) {
                $( self.cursors.$idx.step_back_n(axis, n); )+
            }

            #[inline]
            fn reset(&mut self, axis: usize) {
                $( self.cursors.$idx.reset(axis); )+
            }

            #[inline]
            fn reset_back(&mut self, axis: usize) {
                $( self.cursors.$idx.reset_back(axis); )+
            }

            #[inline]
            fn to_begin(&mut self) {
                $( self.cursors.$idx.to_begin(); )+
            }

            #[inline]
            fn value(&self) -> R {
                (self.f)($(self.cursors.$idx.value()),+)
            }
        }
    };
}

impl_function!(unary; A0 a0 C0 0);
impl_function!(binary; A0 a0 C0 0, A1 a1 C1 1);
impl_function!(ternary; A0 a0 C0 0, A1 a1 C1 1, A2 a2 C2 2);
impl_function!(quaternary; A0 a0 C0 0, A1 a1 C1 1, A2 a2 C2 2, A3 a3 C3 3);
