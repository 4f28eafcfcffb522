//! Parameter structs packed into uniform buffers.

mod buffer;
mod layout;

pub use buffer::{UniformBuffer, UniformFieldRef};
pub use layout::{FieldType, UniformField, UniformFieldDecl, UniformLayout, WireType};
