use serde::{Deserialize, Serialize};

/// Interactive scalar control. Rendering the widget is up to the host; this
/// only tracks the value and its range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slider {
    pub name: String,
    pub value: f32,
    pub minimum: f32,
    pub maximum: f32,
    pub step: f32,
}

impl Slider {
    pub fn new(
        name: impl Into<String>,
        value: f32,
        minimum: f32,
        maximum: f32,
        step: f32,
    ) -> Self {
        let mut slider = Self {
            name: name.into(),
            value: minimum,
            minimum,
            maximum,
            step,
        };
        slider.set(value);
        slider
    }

    /// Sets the value, clamped to the range and snapped to the nearest step
    /// above the minimum.
    pub fn set(&mut self, value: f32) {
        let mut value = value.clamp(self.minimum, self.maximum);
        if self.step > 0.0 {
            let steps = ((value - self.minimum) / self.step).round();
            value = (self.minimum + steps * self.step).min(self.maximum);
        }
        self.value = value;
    }

    /// Moves the value by `steps` increments.
    pub fn nudge(&mut self, steps: f32) {
        self.set(self.value + steps * self.step);
    }
}

/// Ordered set of sliders a figure shows next to the scene.
#[derive(Debug, Default, Clone)]
pub struct ControlPanel {
    sliders: Vec<Slider>,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sliders(sliders: Vec<Slider>) -> Self {
        Self { sliders }
    }

    pub fn push(&mut self, slider: Slider) {
        self.sliders.push(slider);
    }

    pub fn sliders(&self) -> &[Slider] {
        &self.sliders
    }

    pub fn sliders_mut(&mut self) -> &mut [Slider] {
        &mut self.sliders
    }

    pub fn get(&self, name: &str) -> Option<&Slider> {
        self.sliders.iter().find(|slider| slider.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Slider> {
        self.sliders.iter_mut().find(|slider| slider.name == name)
    }

    pub fn value(&self, name: &str) -> Option<f32> {
        self.get(name).map(|slider| slider.value)
    }

    /// One update per slider, targeting the parameter of the same name.
    pub fn updates(&self) -> Vec<ParameterUpdate> {
        self.sliders
            .iter()
            .map(|slider| ParameterUpdate::new(slider.name.clone(), slider.value))
            .collect()
    }
}

/// Concrete value routed to a named parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    pub target: String,
    pub value: f32,
}

impl ParameterUpdate {
    pub fn new(target: impl Into<String>, value: f32) -> Self {
        Self {
            target: target.into(),
            value,
        }
    }
}
