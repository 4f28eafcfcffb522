use std::ops::{Add, Div, Mul, Neg, Rem, Sub};

use super::{BinaryOperator, Expression, UnaryOperator};

impl From<f32> for Expression {
    fn from(value: f32) -> Self {
        Expression::scalar(value)
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Expression::scalar(value as f32)
    }
}

impl From<&Expression> for Expression {
    fn from(value: &Expression) -> Self {
        value.clone()
    }
}

/// Forward operators for every combination of owned and borrowed
/// expressions, plus expression-with-scalar on the right.
macro_rules! forward_operator {
    (@scalar $trait:ident, $method:ident, $operator:expr, $scalar:ty) => {
        impl $trait<$scalar> for Expression {
            type Output = Expression;

            fn $method(self, rhs: $scalar) -> Expression {
                Expression::binary($operator, self, Expression::from(rhs))
            }
        }

        impl $trait<$scalar> for &Expression {
            type Output = Expression;

            fn $method(self, rhs: $scalar) -> Expression {
                Expression::binary($operator, self.clone(), Expression::from(rhs))
            }
        }
    };
    ($trait:ident, $method:ident, $operator:expr) => {
        impl $trait<Expression> for Expression {
            type Output = Expression;

            fn $method(self, rhs: Expression) -> Expression {
                Expression::binary($operator, self, rhs)
            }
        }

        impl $trait<&Expression> for Expression {
            type Output = Expression;

            fn $method(self, rhs: &Expression) -> Expression {
                Expression::binary($operator, self, rhs.clone())
            }
        }

        impl $trait<Expression> for &Expression {
            type Output = Expression;

            fn $method(self, rhs: Expression) -> Expression {
                Expression::binary($operator, self.clone(), rhs)
            }
        }

        impl $trait<&Expression> for &Expression {
            type Output = Expression;

            fn $method(self, rhs: &Expression) -> Expression {
                Expression::binary($operator, self.clone(), rhs.clone())
            }
        }

        forward_operator!(@scalar $trait, $method, $operator, f32);
        forward_operator!(@scalar $trait, $method, $operator, f64);
    };
}

/// `scalar op expression` for commutative operators: forwards to the same
/// operator with the operands swapped.
macro_rules! commutative_reflected {
    ($trait:ident, $method:ident, $scalar:ty) => {
        impl $trait<Expression> for $scalar {
            type Output = Expression;

            fn $method(self, rhs: Expression) -> Expression {
                rhs.$method(self)
            }
        }

        impl $trait<&Expression> for $scalar {
            type Output = Expression;

            fn $method(self, rhs: &Expression) -> Expression {
                rhs.$method(self)
            }
        }
    };
}

/// `scalar op expression` for order-sensitive operators: the scalar stays on
/// the left.
macro_rules! ordered_reflected {
    ($trait:ident, $method:ident, $operator:expr, $scalar:ty) => {
        impl $trait<Expression> for $scalar {
            type Output = Expression;

            fn $method(self, rhs: Expression) -> Expression {
                Expression::binary($operator, Expression::from(self), rhs)
            }
        }

        impl $trait<&Expression> for $scalar {
            type Output = Expression;

            fn $method(self, rhs: &Expression) -> Expression {
                Expression::binary($operator, Expression::from(self), rhs.clone())
            }
        }
    };
}

forward_operator!(Add, add, BinaryOperator::Add);
forward_operator!(Sub, sub, BinaryOperator::Subtract);
forward_operator!(Mul, mul, BinaryOperator::Multiply);
forward_operator!(Div, div, BinaryOperator::Divide);
forward_operator!(Rem, rem, BinaryOperator::Modulo);

commutative_reflected!(Add, add, f32);
commutative_reflected!(Add, add, f64);
commutative_reflected!(Mul, mul, f32);
commutative_reflected!(Mul, mul, f64);

ordered_reflected!(Sub, sub, BinaryOperator::Subtract, f32);
ordered_reflected!(Sub, sub, BinaryOperator::Subtract, f64);
ordered_reflected!(Div, div, BinaryOperator::Divide, f32);
ordered_reflected!(Div, div, BinaryOperator::Divide, f64);
ordered_reflected!(Rem, rem, BinaryOperator::Modulo, f32);
ordered_reflected!(Rem, rem, BinaryOperator::Modulo, f64);

impl Neg for Expression {
    type Output = Expression;

    fn neg(self) -> Expression {
        Expression::unary(UnaryOperator::Negate, self)
    }
}

impl Neg for &Expression {
    type Output = Expression;

    fn neg(self) -> Expression {
        Expression::unary(UnaryOperator::Negate, self.clone())
    }
}
