//! Coercion of host values into graph nodes.
//!
//! Every builder function lifts its left and right operands independently
//! through [`lift`] before combining them, so no raw host value ever ends up
//! inside a graph.

use serde_json::Value;

use crate::{
    instance::{HostArray, InstanceBuffer},
    uniform::UniformFieldRef,
    ExprVizError, Result,
};

use super::{BinaryOperator, Constant, Expression};

/// Anything a caller may hand to the builder as an operand.
#[derive(Debug, Clone)]
pub enum HostValue {
    Expression(Expression),
    Scalar(f64),
    Vector(Vec<f64>),
    Array(HostArray),
    /// Dynamically typed input, for scenes described in JSON.
    Json(Value),
}

impl From<Expression> for HostValue {
    fn from(value: Expression) -> Self {
        Self::Expression(value)
    }
}

impl From<&Expression> for HostValue {
    fn from(value: &Expression) -> Self {
        Self::Expression(value.clone())
    }
}

impl From<&InstanceBuffer> for HostValue {
    fn from(value: &InstanceBuffer) -> Self {
        Self::Expression(value.expression())
    }
}

impl From<UniformFieldRef> for HostValue {
    fn from(value: UniformFieldRef) -> Self {
        Self::Expression(value.into())
    }
}

impl From<&UniformFieldRef> for HostValue {
    fn from(value: &UniformFieldRef) -> Self {
        Self::Expression(value.clone().into())
    }
}

impl From<f32> for HostValue {
    fn from(value: f32) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        Self::Scalar(value.into())
    }
}

impl<const N: usize> From<[f32; N]> for HostValue {
    fn from(value: [f32; N]) -> Self {
        Self::Vector(value.iter().map(|&v| f64::from(v)).collect())
    }
}

impl<const N: usize> From<[f64; N]> for HostValue {
    fn from(value: [f64; N]) -> Self {
        Self::Vector(value.to_vec())
    }
}

impl From<Vec<f64>> for HostValue {
    fn from(value: Vec<f64>) -> Self {
        Self::Vector(value)
    }
}

impl From<HostArray> for HostValue {
    fn from(value: HostArray) -> Self {
        Self::Array(value)
    }
}

impl From<&HostArray> for HostValue {
    fn from(value: &HostArray) -> Self {
        Self::Array(value.clone())
    }
}

impl From<Value> for HostValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Converts a host value into a graph node. Expressions pass through
/// untouched, everything else becomes a [`Constant`] leaf holding a copy of
/// the value.
pub fn lift(value: impl Into<HostValue>) -> Result<Expression> {
    match value.into() {
        HostValue::Expression(expression) => Ok(expression),
        HostValue::Scalar(value) => Ok(Expression::scalar(value as f32)),
        HostValue::Vector(values) => lift_vector(&values),
        HostValue::Array(array) => {
            if array.rows() == 0 {
                return Err(ExprVizError::coercion("cannot lift an empty array"));
            }
            Ok(Expression::constant(Constant::Array(array)))
        }
        HostValue::Json(value) => lift_json(&value),
    }
}

fn lift_vector(values: &[f64]) -> Result<Expression> {
    match values.len() {
        2..=4 => Ok(Expression::constant(Constant::Vector(
            values.iter().map(|&v| v as f32).collect(),
        ))),
        len => Err(ExprVizError::coercion(format!(
            "vectors of length {len} are not supported"
        ))),
    }
}

fn lift_json(value: &Value) -> Result<Expression> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .map(|v| Expression::scalar(v as f32))
            .ok_or_else(|| ExprVizError::coercion(format!("number {number} is not representable"))),
        Value::Array(items) if items.iter().all(Value::is_number) => {
            lift_vector(&json_numbers(items)?)
        }
        Value::Array(items) if items.iter().all(Value::is_array) => {
            let rows = items
                .iter()
                .map(|row| match row {
                    Value::Array(cells) => json_numbers(cells),
                    _ => Err(ExprVizError::coercion("array rows must be arrays")),
                })
                .collect::<Result<Vec<_>>>()?;
            lift(HostArray::from_rows_f64(&rows)?)
        }
        other => Err(ExprVizError::coercion(format!(
            "cannot lift {} into an expression",
            json_kind(other)
        ))),
    }
}

fn json_numbers(items: &[Value]) -> Result<Vec<f64>> {
    items
        .iter()
        .map(|item| {
            item.as_f64()
                .ok_or_else(|| ExprVizError::coercion(format!("expected a number, got {item}")))
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a mixed array",
        Value::Object(_) => "an object",
    }
}

fn combine(
    operator: BinaryOperator,
    lhs: impl Into<HostValue>,
    rhs: impl Into<HostValue>,
) -> Result<Expression> {
    let left = lift(lhs)?;
    let right = lift(rhs)?;
    if left.shape().broadcast(right.shape()).is_none() {
        return Err(ExprVizError::coercion(format!(
            "{operator:?} combines {:?} with {:?}",
            left.shape(),
            right.shape()
        )));
    }
    Ok(Expression::binary(operator, left, right))
}

pub fn add(lhs: impl Into<HostValue>, rhs: impl Into<HostValue>) -> Result<Expression> {
    combine(BinaryOperator::Add, lhs, rhs)
}

pub fn sub(lhs: impl Into<HostValue>, rhs: impl Into<HostValue>) -> Result<Expression> {
    combine(BinaryOperator::Subtract, lhs, rhs)
}

pub fn mul(lhs: impl Into<HostValue>, rhs: impl Into<HostValue>) -> Result<Expression> {
    combine(BinaryOperator::Multiply, lhs, rhs)
}

pub fn div(lhs: impl Into<HostValue>, rhs: impl Into<HostValue>) -> Result<Expression> {
    combine(BinaryOperator::Divide, lhs, rhs)
}

pub fn floor_div(lhs: impl Into<HostValue>, rhs: impl Into<HostValue>) -> Result<Expression> {
    combine(BinaryOperator::FloorDivide, lhs, rhs)
}

pub fn modulo(lhs: impl Into<HostValue>, rhs: impl Into<HostValue>) -> Result<Expression> {
    combine(BinaryOperator::Modulo, lhs, rhs)
}

pub fn pow(lhs: impl Into<HostValue>, rhs: impl Into<HostValue>) -> Result<Expression> {
    combine(BinaryOperator::Power, lhs, rhs)
}

pub fn vec2(x: impl Into<HostValue>, y: impl Into<HostValue>) -> Result<Expression> {
    Expression::compose(vec![lift(x)?, lift(y)?])
}

pub fn vec3(
    x: impl Into<HostValue>,
    y: impl Into<HostValue>,
    z: impl Into<HostValue>,
) -> Result<Expression> {
    Expression::compose(vec![lift(x)?, lift(y)?, lift(z)?])
}

pub fn vec4(
    x: impl Into<HostValue>,
    y: impl Into<HostValue>,
    z: impl Into<HostValue>,
    w: impl Into<HostValue>,
) -> Result<Expression> {
    Expression::compose(vec![lift(x)?, lift(y)?, lift(z)?, lift(w)?])
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::expression::{NodeKind, Shape};

    fn is_node_operand(expression: &Expression) -> bool {
        matches!(
            expression.kind(),
            NodeKind::Constant(_) | NodeKind::BufferRef(_) | NodeKind::Binary { .. }
        )
    }

    #[test]
    fn expressions_pass_through_lift_unchanged() {
        let node = Expression::scalar(1.0);
        assert!(lift(&node).unwrap().ptr_eq(&node));
    }

    #[test]
    fn lifting_the_same_value_twice_gives_distinct_leaves() {
        let value = [1.0_f32, 2.0, 3.0];
        let a = lift(value).unwrap();
        let b = lift(value).unwrap();
        assert!(!a.ptr_eq(&b));
        assert_eq!(a.shape(), Shape::Vector(3));
    }

    #[test]
    fn unsupported_vector_lengths_are_coercion_errors() {
        let err = lift(vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap_err();
        assert!(matches!(err, ExprVizError::Coercion(_)));
    }

    #[test]
    fn json_objects_cannot_be_lifted() {
        let err = lift(json!({ "x": 1.0 })).unwrap_err();
        assert!(matches!(err, ExprVizError::Coercion(_)));
        assert!(err.to_string().contains("an object"));
    }

    #[test]
    fn json_nested_arrays_lift_to_per_instance_constants() {
        let expression = lift(json!([[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]])).unwrap();
        assert_eq!(expression.shape(), Shape::Vector(3));
        assert_eq!(expression.instance_count().unwrap(), 2);
    }

    #[test]
    fn ragged_json_arrays_are_rejected() {
        assert!(lift(json!([[0.0, 1.0], [3.0]])).is_err());
    }

    #[test]
    fn vec3_requires_scalar_components() {
        assert!(vec3(1.0, [1.0_f32, 2.0], 3.0).is_err());
        assert_eq!(vec3(1.0, 2.0, 3.0).unwrap().shape(), Shape::Vector(3));
    }

    #[test]
    fn mismatched_vector_arities_fail_at_construction() {
        let err = add([1.0_f32, 2.0], [1.0_f32, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, ExprVizError::Coercion(_)));
        assert!(mul(vec2(1.0, 2.0).unwrap(), vec4(1.0, 2.0, 3.0, 4.0).unwrap()).is_err());

        let broadcast = pow(vec4(1.0, 2.0, 3.0, 4.0).unwrap(), 2.0).unwrap();
        assert_eq!(broadcast.shape(), Shape::Vector(4));
        assert_eq!(broadcast.evaluate(0).unwrap(), vec![1.0, 4.0, 9.0, 16.0]);
    }

    #[test]
    fn vec2_and_vec4_compose_scalars() {
        assert_eq!(vec2(1.0, 2.0).unwrap().shape(), Shape::Vector(2));
        assert!(vec2([1.0_f32, 2.0], 0.0).is_err());
        let rgba = vec4(0.1, 0.2, 0.3, 1.0).unwrap();
        assert_eq!(rgba.shape(), Shape::Vector(4));
        assert_eq!(rgba.children().len(), 4);
    }

    fn operand() -> impl Strategy<Value = HostValue> {
        prop_oneof![
            any::<f32>().prop_map(HostValue::from),
            prop::collection::vec(-10.0_f64..10.0, 1..8)
                .prop_map(|values| HostValue::Array(HostArray::column(values))),
            any::<f32>().prop_map(|v| HostValue::Expression(Expression::scalar(v))),
        ]
    }

    proptest! {
        #[test]
        fn every_operator_lifts_both_operands(lhs in operand(), rhs in operand(), op in 0usize..7) {
            let builders: [fn(HostValue, HostValue) -> Result<Expression>; 7] = [
                |a, b| add(a, b),
                |a, b| sub(a, b),
                |a, b| mul(a, b),
                |a, b| div(a, b),
                |a, b| floor_div(a, b),
                |a, b| modulo(a, b),
                |a, b| pow(a, b),
            ];
            let expression = builders[op](lhs, rhs).unwrap();
            match expression.kind() {
                NodeKind::Binary { left, right, .. } => {
                    prop_assert!(is_node_operand(left));
                    prop_assert!(is_node_operand(right));
                }
                other => prop_assert!(false, "expected binary node, got {:?}", other),
            }
        }
    }
}
