//! Core library for the expression-graph visualiser.
//!
//! Host code declares uniform parameter structs and per-instance buffers,
//! combines their fields with ordinary arithmetic into lazily evaluated
//! expression graphs, and binds those graphs to drawable primitives. Each
//! module owns one concern (graph construction, buffer layout, rendering
//! backend, the frame loop) so the application crate only wires them up.

pub mod config;
pub mod controls;
pub mod error;
pub mod expression;
pub mod figure;
pub mod instance;
pub mod render;
pub mod scene;
pub mod uniform;

pub use config::{AppConfig, FigureConfig, LoggingConfig};
pub use controls::{ControlPanel, ParameterUpdate, Slider};
pub use error::{ExprVizError, Result};
pub use expression::{lift, vec2, vec3, vec4, Expression, HostValue, Shape};
pub use figure::{Figure, Frame, ShowSummary};
pub use instance::{HostArray, InstanceBuffer, InstanceFieldRef};
pub use render::{HeadlessBackend, RenderBackend};
pub use scene::{Delegate, LineDelegate, RenderableDescriptor, SphereDelegate};
pub use uniform::{FieldType, UniformBuffer, UniformFieldDecl, UniformFieldRef};
