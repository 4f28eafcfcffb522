use std::fmt;

use super::{BinaryOperator, Constant, Expression, NodeKind, UnaryOperator};

fn write_list(
    f: &mut fmt::Formatter<'_>,
    items: impl IntoIterator<Item = impl fmt::Display>,
) -> fmt::Result {
    for (index, item) in items.into_iter().enumerate() {
        if index > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Shader-like text, used for logs and the `inspect` command.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            NodeKind::Constant(Constant::Scalar(value)) => write!(f, "{value:?}"),
            NodeKind::Constant(Constant::Vector(values)) => {
                write!(f, "vec{}<f32>(", values.len())?;
                write_list(f, values.iter().map(|v| format!("{v:?}")))?;
                write!(f, ")")
            }
            NodeKind::Constant(Constant::Array(array)) => {
                write!(f, "array<{}x{}>", array.rows(), array.components())
            }
            NodeKind::BufferRef(field) => write!(f, "instance.{}", field.label()),
            NodeKind::UniformField(field) => {
                write!(f, "{}.{}", field.struct_name().to_lowercase(), field.name())
            }
            NodeKind::Binary {
                operator,
                left,
                right,
            } => match operator {
                BinaryOperator::Add => write!(f, "({left} + {right})"),
                BinaryOperator::Subtract => write!(f, "({left} - {right})"),
                BinaryOperator::Multiply => write!(f, "({left} * {right})"),
                BinaryOperator::Divide => write!(f, "({left} / {right})"),
                BinaryOperator::FloorDivide => write!(f, "floor({left} / {right})"),
                BinaryOperator::Modulo => write!(f, "({left} % {right})"),
                BinaryOperator::Power => write!(f, "pow({left}, {right})"),
            },
            NodeKind::Unary { operator, value } => match operator {
                UnaryOperator::Negate => write!(f, "-{value}"),
                UnaryOperator::Cos => write!(f, "cos({value})"),
                UnaryOperator::Sin => write!(f, "sin({value})"),
                UnaryOperator::Tan => write!(f, "tan({value})"),
                UnaryOperator::Exp => write!(f, "exp({value})"),
                UnaryOperator::Floor => write!(f, "floor({value})"),
                UnaryOperator::Length => write!(f, "length({value})"),
            },
            NodeKind::Compose(components) => {
                write!(f, "vec{}<f32>(", components.len())?;
                write_list(f, components)?;
                write!(f, ")")
            }
        }
    }
}
