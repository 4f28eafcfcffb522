//! Boundary with the rendering backend.
//!
//! Buffers and graphs never reach for a global device: every constructor and
//! update takes the backend by `&mut dyn RenderBackend`, which lets the whole
//! crate run against [`HeadlessBackend`] without a GPU.

mod headless;

use std::sync::atomic::{AtomicU64, Ordering};

pub use headless::HeadlessBackend;

use crate::{scene::RenderableDescriptor, Result};

/// Opaque handle to a device-resident buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// Opaque handle to a renderable compiled by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderableHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Shared parameters bound once per draw call.
    Uniform,
    /// Per-instance vertex data.
    Instance,
}

#[derive(Debug, Clone, Copy)]
pub struct BufferDescriptor<'a> {
    pub label: &'a str,
    pub size: u64,
    pub usage: BufferUsage,
}

pub trait RenderBackend {
    fn create_buffer(&mut self, descriptor: &BufferDescriptor<'_>) -> Result<BufferHandle>;

    /// Copies `data` into the device buffer starting at `offset` bytes.
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()>;

    /// Frees a buffer. The handle is invalid afterwards.
    fn destroy_buffer(&mut self, buffer: BufferHandle) -> Result<()>;

    /// Whether instance buffers may be reallocated with a new element count.
    fn supports_resize(&self) -> bool {
        true
    }

    /// Generates and compiles shader code for the slot graphs of one
    /// renderable.
    fn compile(&mut self, renderable: &RenderableDescriptor) -> Result<RenderableHandle>;

    /// Draws the given compiled renderables as one frame.
    fn draw(&mut self, renderables: &[RenderableHandle], clear_color: [f32; 3]) -> Result<()>;
}

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity for host-side buffer state, independent of the
/// device handle (which changes when a buffer is reallocated).
pub(crate) fn next_buffer_id() -> u64 {
    NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed)
}
