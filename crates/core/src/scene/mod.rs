//! Drawable primitives bound to expression graphs.

use serde::{Deserialize, Serialize};

use crate::{
    expression::{lift, Constant, Expression, HostValue, Shape},
    ExprVizError, Result,
};

/// Semantic inputs a renderer recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    Position,
    Radius,
    Color,
    Start,
    End,
    Width,
    Alpha,
}

impl Slot {
    pub fn expected_shape(self) -> Shape {
        match self {
            Slot::Position | Slot::Color | Slot::Start | Slot::End => Shape::Vector(3),
            Slot::Radius | Slot::Width | Slot::Alpha => Shape::Scalar,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Slot::Position => "position",
            Slot::Radius => "radius",
            Slot::Color => "color",
            Slot::Start => "start",
            Slot::End => "end",
            Slot::Width => "width",
            Slot::Alpha => "alpha",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderableKind {
    Spheres,
    Lines,
}

#[derive(Debug, Clone)]
pub struct SlotBinding {
    pub slot: Slot,
    pub expression: Expression,
}

/// What a backend compiles: the slot graphs of one drawable primitive.
#[derive(Debug, Clone)]
pub struct RenderableDescriptor {
    pub kind: RenderableKind,
    pub slots: Vec<SlotBinding>,
}

impl RenderableDescriptor {
    pub fn expression(&self, slot: Slot) -> Option<&Expression> {
        self.slots
            .iter()
            .find(|binding| binding.slot == slot)
            .map(|binding| &binding.expression)
    }

    /// Checks every slot graph and that each one has the shape its slot
    /// expects.
    pub fn validate(&self) -> Result<()> {
        for binding in &self.slots {
            binding.expression.validate()?;
            let expected = binding.slot.expected_shape();
            let actual = binding.expression.shape();
            if actual != expected {
                return Err(ExprVizError::coercion(format!(
                    "{:?} slot `{}` expects {expected:?}, got {actual:?}",
                    self.kind,
                    binding.slot.name()
                )));
            }
        }
        Ok(())
    }

    /// Instances drawn, agreed on by all slots.
    pub fn instance_count(&self) -> Result<usize> {
        let mut count = 1;
        for binding in &self.slots {
            let slot_count = binding.expression.instance_count()?;
            if slot_count == 1 {
                continue;
            }
            if count != 1 && count != slot_count {
                return Err(ExprVizError::binding(format!(
                    "{:?} slot `{}` spans {slot_count} instances, other slots span {count}",
                    self.kind,
                    binding.slot.name()
                )));
            }
            count = slot_count;
        }
        Ok(count)
    }
}

#[derive(Debug, Clone)]
pub struct SphereDelegate {
    pub position: Expression,
    pub radius: Expression,
    pub color: Expression,
}

impl Default for SphereDelegate {
    fn default() -> Self {
        Self {
            position: Expression::constant(Constant::Vector(vec![0.0; 3])),
            radius: Expression::scalar(1.0),
            color: Expression::constant(Constant::Vector(vec![1.0; 3])),
        }
    }
}

impl SphereDelegate {
    pub fn new(
        position: impl Into<HostValue>,
        radius: impl Into<HostValue>,
        color: impl Into<HostValue>,
    ) -> Result<Self> {
        Ok(Self {
            position: lift(position)?,
            radius: lift(radius)?,
            color: lift(color)?,
        })
    }

    pub fn descriptor(&self) -> RenderableDescriptor {
        RenderableDescriptor {
            kind: RenderableKind::Spheres,
            slots: vec![
                SlotBinding {
                    slot: Slot::Position,
                    expression: self.position.clone(),
                },
                SlotBinding {
                    slot: Slot::Radius,
                    expression: self.radius.clone(),
                },
                SlotBinding {
                    slot: Slot::Color,
                    expression: self.color.clone(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct LineDelegate {
    pub start: Expression,
    pub end: Expression,
    pub width: Expression,
    pub color: Expression,
    pub alpha: Expression,
}

impl Default for LineDelegate {
    fn default() -> Self {
        Self {
            start: Expression::constant(Constant::Vector(vec![0.0; 3])),
            end: Expression::constant(Constant::Vector(vec![1.0, 0.0, 0.0])),
            width: Expression::scalar(1.0),
            color: Expression::constant(Constant::Vector(vec![1.0; 3])),
            alpha: Expression::scalar(1.0),
        }
    }
}

impl LineDelegate {
    /// Lines with opaque alpha; set `alpha` afterwards for translucency.
    pub fn new(
        start: impl Into<HostValue>,
        end: impl Into<HostValue>,
        width: impl Into<HostValue>,
        color: impl Into<HostValue>,
    ) -> Result<Self> {
        Ok(Self {
            start: lift(start)?,
            end: lift(end)?,
            width: lift(width)?,
            color: lift(color)?,
            alpha: Expression::scalar(1.0),
        })
    }

    pub fn with_alpha(mut self, alpha: impl Into<HostValue>) -> Result<Self> {
        self.alpha = lift(alpha)?;
        Ok(self)
    }

    pub fn descriptor(&self) -> RenderableDescriptor {
        let slots = [
            (Slot::Start, &self.start),
            (Slot::End, &self.end),
            (Slot::Width, &self.width),
            (Slot::Color, &self.color),
            (Slot::Alpha, &self.alpha),
        ];
        RenderableDescriptor {
            kind: RenderableKind::Lines,
            slots: slots
                .into_iter()
                .map(|(slot, expression)| SlotBinding {
                    slot,
                    expression: expression.clone(),
                })
                .collect(),
        }
    }
}

/// Any primitive a figure can show.
#[derive(Debug, Clone)]
pub enum Delegate {
    Spheres(SphereDelegate),
    Lines(LineDelegate),
}

impl Delegate {
    pub fn descriptor(&self) -> RenderableDescriptor {
        match self {
            Delegate::Spheres(spheres) => spheres.descriptor(),
            Delegate::Lines(lines) => lines.descriptor(),
        }
    }
}

impl From<SphereDelegate> for Delegate {
    fn from(value: SphereDelegate) -> Self {
        Delegate::Spheres(value)
    }
}

impl From<LineDelegate> for Delegate {
    fn from(value: LineDelegate) -> Self {
        Delegate::Lines(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{expression::vec3, instance::HostArray};

    #[test]
    fn defaults_have_slot_shapes() {
        assert!(SphereDelegate::default().descriptor().validate().is_ok());
        assert!(LineDelegate::default().descriptor().validate().is_ok());
    }

    #[test]
    fn wrong_slot_shape_is_rejected() {
        let spheres = SphereDelegate::new([0.0_f32, 0.0, 0.0], [1.0_f32, 1.0, 1.0], 1.0).unwrap();
        let err = spheres.descriptor().validate().unwrap_err();
        assert!(err.to_string().contains("radius"));
    }

    #[test]
    fn instance_count_spans_all_slots() {
        let positions = HostArray::from_rows(&[[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]]).unwrap();
        let spheres = SphereDelegate::new(&positions, 0.2, vec3(1.0, 1.0, 0.0).unwrap()).unwrap();
        assert_eq!(spheres.descriptor().instance_count().unwrap(), 2);

        let radii = HostArray::linspace(0.1, 0.3, 3);
        let mismatched = SphereDelegate::new(&positions, &radii, [1.0_f32, 1.0, 1.0]).unwrap();
        assert!(matches!(
            mismatched.descriptor().instance_count(),
            Err(ExprVizError::Binding(_))
        ));
    }

    #[test]
    fn line_alpha_can_be_overridden() {
        let lines = LineDelegate::default().with_alpha(0.5).unwrap();
        let alpha = lines.descriptor().expression(Slot::Alpha).cloned().unwrap();
        assert_eq!(alpha.evaluate(0).unwrap(), vec![0.5]);
    }
}
