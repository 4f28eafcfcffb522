use std::collections::BTreeMap;

use crate::{config::FigureConfig, scene::RenderableDescriptor, ExprVizError, Result};

use super::{BufferDescriptor, BufferHandle, BufferUsage, RenderBackend, RenderableHandle};

#[derive(Debug)]
struct HeadlessBuffer {
    label: String,
    usage: BufferUsage,
    bytes: Vec<u8>,
}

/// In-memory backend. Buffers are plain byte vectors, compiled renderables
/// are kept as descriptors and every draw re-validates their graphs.
#[derive(Debug)]
pub struct HeadlessBackend {
    buffers: BTreeMap<u64, HeadlessBuffer>,
    next_buffer: u64,
    renderables: Vec<RenderableDescriptor>,
    writes: usize,
    frames_drawn: u64,
    allow_resize: bool,
    failing_write: Option<String>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            buffers: BTreeMap::new(),
            next_buffer: 0,
            renderables: Vec::new(),
            writes: 0,
            frames_drawn: 0,
            allow_resize: true,
            failing_write: None,
        }
    }

    pub fn from_config(config: &FigureConfig) -> Self {
        Self {
            allow_resize: config.resizable_buffers,
            ..Self::new()
        }
    }

    /// Refuses reallocation of instance buffers with a new element count.
    pub fn without_resize(mut self) -> Self {
        self.allow_resize = false;
        self
    }

    /// Makes the next `write_buffer` call fail with `reason`.
    pub fn fail_next_write(&mut self, reason: impl Into<String>) {
        self.failing_write = Some(reason.into());
    }

    pub fn buffer_bytes(&self, handle: BufferHandle) -> Option<&[u8]> {
        self.buffer(handle).ok().map(|buffer| buffer.bytes.as_slice())
    }

    pub fn buffer_label(&self, handle: BufferHandle) -> Option<&str> {
        self.buffer(handle).ok().map(|buffer| buffer.label.as_str())
    }

    /// Buffers created and not yet destroyed.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn buffer_count_with_usage(&self, usage: BufferUsage) -> usize {
        self.buffers.values().filter(|b| b.usage == usage).count()
    }

    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn compiled(&self) -> &[RenderableDescriptor] {
        &self.renderables
    }

    fn buffer(&self, handle: BufferHandle) -> Result<&HeadlessBuffer> {
        self.buffers
            .get(&handle.0)
            .ok_or_else(|| ExprVizError::backend(format!("unknown buffer handle {}", handle.0)))
    }
}

impl RenderBackend for HeadlessBackend {
    fn create_buffer(&mut self, descriptor: &BufferDescriptor<'_>) -> Result<BufferHandle> {
        let size = usize::try_from(descriptor.size).map_err(|_| {
            ExprVizError::backend(format!("buffer `{}` is too large", descriptor.label))
        })?;
        let handle = BufferHandle(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(
            handle.0,
            HeadlessBuffer {
                label: descriptor.label.to_string(),
                usage: descriptor.usage,
                bytes: vec![0; size],
            },
        );
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        if let Some(reason) = self.failing_write.take() {
            return Err(ExprVizError::backend(reason));
        }
        let target = self
            .buffers
            .get_mut(&buffer.0)
            .ok_or_else(|| ExprVizError::backend(format!("unknown buffer handle {}", buffer.0)))?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let end = start.saturating_add(data.len());
        if end > target.bytes.len() {
            return Err(ExprVizError::backend(format!(
                "write of {} bytes at offset {start} overflows buffer `{}` of {} bytes",
                data.len(),
                target.label,
                target.bytes.len()
            )));
        }
        target.bytes[start..end].copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> Result<()> {
        self.buffers
            .remove(&buffer.0)
            .map(|_| ())
            .ok_or_else(|| ExprVizError::backend(format!("unknown buffer handle {}", buffer.0)))
    }

    fn supports_resize(&self) -> bool {
        self.allow_resize
    }

    fn compile(&mut self, renderable: &RenderableDescriptor) -> Result<RenderableHandle> {
        renderable.validate()?;
        let handle = RenderableHandle(self.renderables.len() as u64);
        self.renderables.push(renderable.clone());
        Ok(handle)
    }

    fn draw(&mut self, renderables: &[RenderableHandle], _clear_color: [f32; 3]) -> Result<()> {
        for handle in renderables {
            let descriptor = usize::try_from(handle.0)
                .ok()
                .and_then(|index| self.renderables.get(index))
                .ok_or_else(|| {
                    ExprVizError::backend(format!("unknown renderable handle {}", handle.0))
                })?;
            descriptor.validate()?;
        }
        self.frames_drawn += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(size: u64) -> BufferDescriptor<'static> {
        BufferDescriptor {
            label: "scratch",
            size,
            usage: BufferUsage::Uniform,
        }
    }

    #[test]
    fn writes_land_at_offset() {
        let mut backend = HeadlessBackend::new();
        let handle = backend.create_buffer(&descriptor(8)).unwrap();
        backend.write_buffer(handle, 4, &[1, 2, 3, 4]).unwrap();

        assert_eq!(backend.buffer_bytes(handle), Some(&[0, 0, 0, 0, 1, 2, 3, 4][..]));
        assert_eq!(backend.write_count(), 1);
    }

    #[test]
    fn overflowing_write_is_rejected() {
        let mut backend = HeadlessBackend::new();
        let handle = backend.create_buffer(&descriptor(4)).unwrap();

        let err = backend.write_buffer(handle, 2, &[0; 4]).unwrap_err();
        assert!(matches!(err, ExprVizError::Backend(_)));
        assert_eq!(backend.buffer_bytes(handle), Some(&[0, 0, 0, 0][..]));
    }

    #[test]
    fn destroyed_buffers_are_gone() {
        let mut backend = HeadlessBackend::new();
        let first = backend.create_buffer(&descriptor(4)).unwrap();
        let second = backend
            .create_buffer(&BufferDescriptor {
                label: "positions",
                size: 12,
                usage: BufferUsage::Instance,
            })
            .unwrap();
        assert_eq!(backend.buffer_count(), 2);
        assert_eq!(backend.buffer_label(second), Some("positions"));

        backend.destroy_buffer(first).unwrap();
        assert_eq!(backend.buffer_count(), 1);
        assert_eq!(backend.buffer_count_with_usage(BufferUsage::Uniform), 0);
        assert_eq!(backend.buffer_count_with_usage(BufferUsage::Instance), 1);
        assert_eq!(backend.buffer_label(first), None);
        assert!(backend.write_buffer(first, 0, &[0; 4]).is_err());
        assert!(matches!(backend.destroy_buffer(first), Err(ExprVizError::Backend(_))));

        // Handles are never reused.
        let third = backend.create_buffer(&descriptor(4)).unwrap();
        assert_ne!(third, first);
    }

    #[test]
    fn injected_failure_only_affects_next_write() {
        let mut backend = HeadlessBackend::new();
        let handle = backend.create_buffer(&descriptor(4)).unwrap();
        backend.fail_next_write("device lost");

        assert!(backend.write_buffer(handle, 0, &[9; 4]).is_err());
        assert!(backend.write_buffer(handle, 0, &[9; 4]).is_ok());
        assert_eq!(backend.write_count(), 1);
    }
}
