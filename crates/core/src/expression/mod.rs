//! Symbolic expression graphs.
//!
//! An [`Expression`] is a cheap, reference-counted handle to an immutable
//! [`Node`]. Subgraphs are shared rather than copied, so the same leaf (for
//! instance an instance buffer) can appear in many places of one graph while
//! keeping a single identity.

mod builder;
mod display;
mod eval;
mod ops;

use std::{collections::HashSet, rc::Rc};

use serde::{Deserialize, Serialize};

pub use builder::{
    add, div, floor_div, lift, modulo, mul, pow, sub, vec2, vec3, vec4, HostValue,
};

use crate::{
    instance::{HostArray, InstanceFieldRef},
    uniform::UniformFieldRef,
    ExprVizError, Result,
};

/// Number of components a node evaluates to per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    Scalar,
    Vector(usize),
}

impl Shape {
    pub fn from_components(components: usize) -> Self {
        if components == 1 {
            Shape::Scalar
        } else {
            Shape::Vector(components)
        }
    }

    pub fn components(self) -> usize {
        match self {
            Shape::Scalar => 1,
            Shape::Vector(n) => n,
        }
    }

    /// Shape of an element-wise operation, with scalars broadcasting over
    /// vectors. `None` when two vectors of different arity meet.
    pub fn broadcast(self, other: Shape) -> Option<Shape> {
        match (self, other) {
            (Shape::Scalar, shape) | (shape, Shape::Scalar) => Some(shape),
            (Shape::Vector(a), Shape::Vector(b)) if a == b => Some(Shape::Vector(a)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    /// True division.
    Divide,
    /// `floor(a / b)`.
    FloorDivide,
    /// Truncated remainder, as in shader `%`.
    Modulo,
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    Negate,
    Cos,
    Sin,
    Tan,
    Exp,
    Floor,
    /// Euclidean length; always produces a scalar.
    Length,
}

/// Host value captured by value at graph construction time.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Scalar(f32),
    Vector(Vec<f32>),
    /// Per-instance data, one row per instance.
    Array(HostArray),
}

impl Constant {
    pub fn shape(&self) -> Shape {
        match self {
            Constant::Scalar(_) => Shape::Scalar,
            Constant::Vector(values) => Shape::from_components(values.len()),
            Constant::Array(array) => Shape::from_components(array.components()),
        }
    }
}

#[derive(Debug)]
pub enum NodeKind {
    Constant(Constant),
    /// Live contents of an instance buffer.
    BufferRef(InstanceFieldRef),
    /// Live value of one field of a uniform buffer.
    UniformField(UniformFieldRef),
    Binary {
        operator: BinaryOperator,
        left: Expression,
        right: Expression,
    },
    Unary {
        operator: UnaryOperator,
        value: Expression,
    },
    /// Vector built from scalar components.
    Compose(Vec<Expression>),
}

#[derive(Debug)]
pub struct Node {
    kind: NodeKind,
    shape: Shape,
}

impl Node {
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }
}

#[derive(Debug, Clone)]
pub struct Expression {
    node: Rc<Node>,
}

impl Expression {
    fn from_kind(kind: NodeKind, shape: Shape) -> Self {
        Self {
            node: Rc::new(Node { kind, shape }),
        }
    }

    pub fn constant(constant: Constant) -> Self {
        let shape = constant.shape();
        Self::from_kind(NodeKind::Constant(constant), shape)
    }

    pub fn scalar(value: f32) -> Self {
        Self::constant(Constant::Scalar(value))
    }

    pub(crate) fn buffer_ref(field: InstanceFieldRef) -> Self {
        let shape = Shape::from_components(field.components());
        Self::from_kind(NodeKind::BufferRef(field), shape)
    }

    pub(crate) fn uniform_field(field: UniformFieldRef) -> Self {
        Self::from_kind(NodeKind::UniformField(field), Shape::Scalar)
    }

    /// Combines two existing nodes. Incompatible vector arities are kept as
    /// given and reported by [`Expression::validate`].
    pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Self {
        let shape = left.shape().broadcast(right.shape()).unwrap_or(left.shape());
        Self::from_kind(
            NodeKind::Binary {
                operator,
                left,
                right,
            },
            shape,
        )
    }

    pub fn unary(operator: UnaryOperator, value: Expression) -> Self {
        let shape = match operator {
            UnaryOperator::Length => Shape::Scalar,
            _ => value.shape(),
        };
        Self::from_kind(NodeKind::Unary { operator, value }, shape)
    }

    /// Builds a vector from scalar components.
    pub fn compose(components: Vec<Expression>) -> Result<Self> {
        if !(2..=4).contains(&components.len()) {
            return Err(ExprVizError::coercion(format!(
                "vectors have 2 to 4 components, got {}",
                components.len()
            )));
        }
        if let Some(position) = components.iter().position(|c| c.shape() != Shape::Scalar) {
            return Err(ExprVizError::coercion(format!(
                "vector component {position} must be scalar, got {:?}",
                components[position].shape()
            )));
        }
        let shape = Shape::Vector(components.len());
        Ok(Self::from_kind(NodeKind::Compose(components), shape))
    }

    pub fn kind(&self) -> &NodeKind {
        self.node.kind()
    }

    pub fn shape(&self) -> Shape {
        self.node.shape()
    }

    /// Whether both handles point at the very same node.
    pub fn ptr_eq(&self, other: &Expression) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    /// Direct children, left to right.
    pub fn children(&self) -> Vec<&Expression> {
        match self.kind() {
            NodeKind::Constant(_) | NodeKind::BufferRef(_) | NodeKind::UniformField(_) => {
                Vec::new()
            }
            NodeKind::Binary { left, right, .. } => vec![left, right],
            NodeKind::Unary { value, .. } => vec![value],
            NodeKind::Compose(components) => components.iter().collect(),
        }
    }

    pub fn pow(&self, exponent: impl Into<Expression>) -> Expression {
        Self::binary(BinaryOperator::Power, self.clone(), exponent.into())
    }

    pub fn floor_div(&self, divisor: impl Into<Expression>) -> Expression {
        Self::binary(BinaryOperator::FloorDivide, self.clone(), divisor.into())
    }

    pub fn cos(&self) -> Expression {
        Self::unary(UnaryOperator::Cos, self.clone())
    }

    pub fn sin(&self) -> Expression {
        Self::unary(UnaryOperator::Sin, self.clone())
    }

    pub fn tan(&self) -> Expression {
        Self::unary(UnaryOperator::Tan, self.clone())
    }

    pub fn exp(&self) -> Expression {
        Self::unary(UnaryOperator::Exp, self.clone())
    }

    pub fn floor(&self) -> Expression {
        Self::unary(UnaryOperator::Floor, self.clone())
    }

    pub fn length(&self) -> Expression {
        Self::unary(UnaryOperator::Length, self.clone())
    }

    /// Visits every distinct node once, parents before children.
    pub fn walk(&self, visit: &mut dyn FnMut(&Expression) -> Result<()>) -> Result<()> {
        let mut seen = HashSet::new();
        let mut stack = vec![self];
        while let Some(expression) = stack.pop() {
            if !seen.insert(Rc::as_ptr(&expression.node)) {
                continue;
            }
            visit(expression)?;
            stack.extend(expression.children().into_iter().rev());
        }
        Ok(())
    }

    /// Checks that every buffer the graph references is still alive and that
    /// all element-wise operations combine compatible shapes.
    pub fn validate(&self) -> Result<()> {
        self.walk(&mut |expression| match expression.kind() {
            NodeKind::BufferRef(field) => field.check_alive(),
            NodeKind::UniformField(field) => field.check_alive(),
            NodeKind::Binary {
                operator,
                left,
                right,
            } => match left.shape().broadcast(right.shape()) {
                Some(_) => Ok(()),
                None => Err(ExprVizError::coercion(format!(
                    "{operator:?} combines {:?} with {:?}",
                    left.shape(),
                    right.shape()
                ))),
            },
            _ => Ok(()),
        })
    }

    /// Number of instances the graph spans. Leaves with a single row
    /// broadcast; any other per-instance leaves must agree.
    pub fn instance_count(&self) -> Result<usize> {
        let mut count: Option<usize> = None;
        self.walk(&mut |expression| {
            let rows = match expression.kind() {
                NodeKind::Constant(Constant::Array(array)) => array.rows(),
                NodeKind::BufferRef(field) => field.count()?,
                _ => return Ok(()),
            };
            if rows == 1 {
                return Ok(());
            }
            match count {
                Some(existing) if existing != rows => Err(ExprVizError::binding(format!(
                    "per-instance data disagrees on instance count ({existing} vs {rows})"
                ))),
                _ => {
                    count = Some(rows);
                    Ok(())
                }
            }
        })?;
        Ok(count.unwrap_or(1))
    }
}
