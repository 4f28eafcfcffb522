//! CPU reference evaluation of expression graphs.
//!
//! Leaves that reference buffers read the bytes currently mirrored for the
//! device, so evaluation observes every `update()` without rebuilding the
//! graph.

use crate::{ExprVizError, Result};

use super::{BinaryOperator, Constant, Expression, NodeKind, UnaryOperator};

impl Expression {
    /// Component values of this graph for instance `instance`.
    pub fn evaluate(&self, instance: usize) -> Result<Vec<f32>> {
        match self.kind() {
            NodeKind::Constant(Constant::Scalar(value)) => Ok(vec![*value]),
            NodeKind::Constant(Constant::Vector(values)) => Ok(values.clone()),
            NodeKind::Constant(Constant::Array(array)) => {
                let row = if array.rows() == 1 { 0 } else { instance };
                array.row_f32(row).ok_or_else(|| {
                    ExprVizError::binding(format!(
                        "instance {instance} is out of range for an array of {} rows",
                        array.rows()
                    ))
                })
            }
            NodeKind::BufferRef(field) => field.read(instance),
            NodeKind::UniformField(field) => Ok(vec![field.read()?]),
            NodeKind::Binary {
                operator,
                left,
                right,
            } => {
                let left = left.evaluate(instance)?;
                let right = right.evaluate(instance)?;
                zip_broadcast(&left, &right, |a, b| apply_binary(*operator, a, b))
            }
            NodeKind::Unary { operator, value } => {
                let value = value.evaluate(instance)?;
                Ok(apply_unary(*operator, value))
            }
            NodeKind::Compose(components) => components
                .iter()
                .map(|component| {
                    component
                        .evaluate(instance)
                        .map(|values| values.first().copied().unwrap_or_default())
                })
                .collect(),
        }
    }
}

fn zip_broadcast(left: &[f32], right: &[f32], f: impl Fn(f32, f32) -> f32) -> Result<Vec<f32>> {
    match (left.len(), right.len()) {
        (1, _) => Ok(right.iter().map(|&b| f(left[0], b)).collect()),
        (_, 1) => Ok(left.iter().map(|&a| f(a, right[0])).collect()),
        (l, r) if l == r => Ok(left.iter().zip(right).map(|(&a, &b)| f(a, b)).collect()),
        (l, r) => Err(ExprVizError::coercion(format!(
            "cannot combine {l} components with {r}"
        ))),
    }
}

fn apply_binary(operator: BinaryOperator, a: f32, b: f32) -> f32 {
    match operator {
        BinaryOperator::Add => a + b,
        BinaryOperator::Subtract => a - b,
        BinaryOperator::Multiply => a * b,
        BinaryOperator::Divide => a / b,
        BinaryOperator::FloorDivide => (a / b).floor(),
        BinaryOperator::Modulo => a % b,
        BinaryOperator::Power => a.powf(b),
    }
}

fn apply_unary(operator: UnaryOperator, values: Vec<f32>) -> Vec<f32> {
    let map = |f: fn(f32) -> f32| -> Vec<f32> { values.iter().map(|&v| f(v)).collect() };
    match operator {
        UnaryOperator::Negate => map(|v| -v),
        UnaryOperator::Cos => map(f32::cos),
        UnaryOperator::Sin => map(f32::sin),
        UnaryOperator::Tan => map(f32::tan),
        UnaryOperator::Exp => map(f32::exp),
        UnaryOperator::Floor => map(f32::floor),
        UnaryOperator::Length => vec![values.iter().map(|v| v * v).sum::<f32>().sqrt()],
    }
}
