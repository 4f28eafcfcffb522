//! Per-instance data: host arrays and the device buffers that mirror them.

mod array;
mod buffer;

pub use array::{HostArray, ScalarType};
pub use buffer::{InstanceBuffer, InstanceFieldRef, VertexFormat};
