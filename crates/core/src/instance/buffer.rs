use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use crate::{
    expression::Expression,
    render::{next_buffer_id, BufferDescriptor, BufferHandle, BufferUsage, RenderBackend},
    ExprVizError, Result,
};

use super::HostArray;

const WIRE_SCALAR_SIZE: usize = std::mem::size_of::<f32>();

/// Vertex attribute format a backend binds an instance buffer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    pub fn from_components(components: usize) -> Option<Self> {
        match components {
            1 => Some(Self::Float32),
            2 => Some(Self::Float32x2),
            3 => Some(Self::Float32x3),
            4 => Some(Self::Float32x4),
            _ => None,
        }
    }

    pub fn size(self) -> u64 {
        let components = match self {
            Self::Float32 => 1,
            Self::Float32x2 => 2,
            Self::Float32x3 => 3,
            Self::Float32x4 => 4,
        };
        (components * WIRE_SCALAR_SIZE) as u64
    }
}

#[derive(Debug)]
struct InstanceBufferInner {
    id: u64,
    label: String,
    handle: BufferHandle,
    format: VertexFormat,
    count: usize,
    /// Host copy of what was last written to the device.
    data: Vec<f32>,
}

impl InstanceBufferInner {
    fn components(&self) -> usize {
        (self.format.size() as usize) / WIRE_SCALAR_SIZE
    }
}

/// Device buffer mirroring a host array, one element per instance.
///
/// The buffer owns its state; the expression leaf handed out by
/// [`InstanceBuffer::expression`] only holds a weak reference, so graphs
/// never keep a released buffer alive.
#[derive(Debug)]
pub struct InstanceBuffer {
    inner: Rc<RefCell<InstanceBufferInner>>,
    leaf: Expression,
}

impl InstanceBuffer {
    pub fn new(backend: &mut dyn RenderBackend, label: &str, array: &HostArray) -> Result<Self> {
        let format = VertexFormat::from_components(array.components()).ok_or_else(|| {
            ExprVizError::binding(format!(
                "instance buffer `{label}` needs 1 to 4 components per element, got {}",
                array.components()
            ))
        })?;
        let data = array.to_f32();
        let bytes: &[u8] = bytemuck::cast_slice(&data);
        let handle = backend.create_buffer(&BufferDescriptor {
            label,
            size: bytes.len() as u64,
            usage: BufferUsage::Instance,
        })?;
        backend.write_buffer(handle, 0, bytes)?;

        let inner = Rc::new(RefCell::new(InstanceBufferInner {
            id: next_buffer_id(),
            label: label.to_string(),
            handle,
            format,
            count: array.rows(),
            data,
        }));
        tracing::debug!(label, count = array.rows(), ?format, "created instance buffer");

        let leaf = Expression::buffer_ref(InstanceFieldRef {
            buffer_id: inner.borrow().id,
            label: label.to_string(),
            components: array.components(),
            inner: Rc::downgrade(&inner),
        });
        Ok(Self { inner, leaf })
    }

    /// Leaf node reading this buffer's live contents. Every call returns the
    /// same node.
    pub fn expression(&self) -> Expression {
        self.leaf.clone()
    }

    pub fn id(&self) -> u64 {
        self.inner.borrow().id
    }

    pub fn handle(&self) -> BufferHandle {
        self.inner.borrow().handle
    }

    pub fn count(&self) -> usize {
        self.inner.borrow().count
    }

    pub fn format(&self) -> VertexFormat {
        self.inner.borrow().format
    }

    /// Byte stride of one element on the device.
    pub fn stride(&self) -> u64 {
        self.format().size()
    }

    pub fn data(&self) -> Vec<f32> {
        self.inner.borrow().data.clone()
    }

    /// Replaces the buffer contents with `array`.
    ///
    /// The wire stride must match the one the buffer was created with; the
    /// host precision may differ since elements always travel as f32. A
    /// different element count reallocates the device buffer when the
    /// backend supports it. On failure the previous contents stay in place.
    pub fn update(&self, backend: &mut dyn RenderBackend, array: &HostArray) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if array.components() != inner.components() {
            return Err(ExprVizError::binding(format!(
                "instance buffer `{}` holds elements of {} components, got {}",
                inner.label,
                inner.components(),
                array.components()
            )));
        }

        let data = array.to_f32();
        let bytes: &[u8] = bytemuck::cast_slice(&data);
        if array.rows() == inner.count {
            backend.write_buffer(inner.handle, 0, bytes)?;
        } else if backend.supports_resize() {
            let handle = backend.create_buffer(&BufferDescriptor {
                label: &inner.label,
                size: bytes.len() as u64,
                usage: BufferUsage::Instance,
            })?;
            if let Err(err) = backend.write_buffer(handle, 0, bytes) {
                if let Err(destroy_err) = backend.destroy_buffer(handle) {
                    tracing::warn!(
                        label = %inner.label,
                        error = %destroy_err,
                        "failed to free buffer"
                    );
                }
                return Err(err);
            }
            tracing::debug!(
                label = %inner.label,
                from = inner.count,
                to = array.rows(),
                "reallocated instance buffer"
            );
            let previous = std::mem::replace(&mut inner.handle, handle);
            inner.count = array.rows();
            if let Err(err) = backend.destroy_buffer(previous) {
                tracing::warn!(
                    label = %inner.label,
                    error = %err,
                    "failed to free replaced buffer"
                );
            }
        } else {
            return Err(ExprVizError::binding(format!(
                "instance buffer `{}` has {} elements and the backend cannot resize it to {}",
                inner.label,
                inner.count,
                array.rows()
            )));
        }
        tracing::trace!(label = %inner.label, count = inner.count, "updated instance buffer");
        inner.data = data;
        Ok(())
    }

    /// Frees the device buffer and drops the host state. Graphs still
    /// referencing it fail validation with a binding error from now on.
    pub fn release(self, backend: &mut dyn RenderBackend) -> Result<()> {
        let inner = self.inner.borrow();
        backend.destroy_buffer(inner.handle)?;
        tracing::debug!(label = %inner.label, "released instance buffer");
        Ok(())
    }
}

/// Non-owning reference from a graph leaf to an instance buffer.
#[derive(Debug, Clone)]
pub struct InstanceFieldRef {
    buffer_id: u64,
    label: String,
    components: usize,
    inner: Weak<RefCell<InstanceBufferInner>>,
}

impl InstanceFieldRef {
    pub fn buffer_id(&self) -> u64 {
        self.buffer_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn components(&self) -> usize {
        self.components
    }

    fn upgrade(&self) -> Result<Rc<RefCell<InstanceBufferInner>>> {
        self.inner.upgrade().ok_or_else(|| {
            ExprVizError::binding(format!(
                "instance buffer `{}` was released while still referenced",
                self.label
            ))
        })
    }

    pub fn check_alive(&self) -> Result<()> {
        self.upgrade().map(|_| ())
    }

    /// Current device handle. Changes when the buffer is reallocated.
    pub fn handle(&self) -> Result<BufferHandle> {
        let inner = self.upgrade()?;
        let handle = inner.borrow().handle;
        Ok(handle)
    }

    pub fn count(&self) -> Result<usize> {
        let inner = self.upgrade()?;
        let count = inner.borrow().count;
        Ok(count)
    }

    pub fn format(&self) -> Result<VertexFormat> {
        let inner = self.upgrade()?;
        let format = inner.borrow().format;
        Ok(format)
    }

    pub fn read(&self, instance: usize) -> Result<Vec<f32>> {
        let inner = self.upgrade()?;
        let inner = inner.borrow();
        let values = instance
            .checked_mul(self.components)
            .and_then(|start| Some(start..start.checked_add(self.components)?))
            .and_then(|range| inner.data.get(range))
            .map(<[f32]>::to_vec)
            .ok_or_else(|| {
                ExprVizError::binding(format!(
                    "instance {instance} is out of range for buffer `{}` of {} elements",
                    self.label, inner.count
                ))
            })?;
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{expression::NodeKind, render::HeadlessBackend};

    fn column(values: &[f64]) -> HostArray {
        HostArray::column(values.to_vec())
    }

    #[test]
    fn creation_uploads_packed_f32_elements() {
        let mut backend = HeadlessBackend::new();
        let array = HostArray::from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
        let buffer = InstanceBuffer::new(&mut backend, "positions", &array).unwrap();

        assert_eq!(buffer.stride(), 12);
        assert_eq!(buffer.format(), VertexFormat::Float32x3);
        let bytes = backend.buffer_bytes(buffer.handle()).unwrap();
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[12..16], &4.0_f32.to_ne_bytes());
    }

    #[test]
    fn update_with_the_same_array_matches_a_fresh_buffer() {
        let mut backend = HeadlessBackend::new();
        let array = column(&[0.0, 1.0, 2.0]);
        let buffer = InstanceBuffer::new(&mut backend, "t", &array).unwrap();
        buffer.update(&mut backend, &array).unwrap();
        let fresh = InstanceBuffer::new(&mut backend, "t", &array).unwrap();

        assert_eq!(
            backend.buffer_bytes(buffer.handle()),
            backend.buffer_bytes(fresh.handle())
        );
    }

    #[test]
    fn mismatched_stride_is_a_binding_error() {
        let mut backend = HeadlessBackend::new();
        let created = HostArray::from_rows(&[[0.0_f32; 3]; 4]).unwrap();
        let wider = HostArray::from_rows(&[[1.0_f32; 4]; 4]).unwrap();
        let buffer = InstanceBuffer::new(&mut backend, "positions", &created).unwrap();

        let err = buffer.update(&mut backend, &wider).unwrap_err();
        assert!(matches!(err, ExprVizError::Binding(_)));
        assert_eq!(buffer.data(), vec![0.0; 12]);
    }

    #[test]
    fn host_precision_may_change_between_updates() {
        let mut backend = HeadlessBackend::new();
        let buffer =
            InstanceBuffer::new(&mut backend, "t", &HostArray::linspace(0.0, 1.0, 2)).unwrap();
        let as_f32 = HostArray::from_rows(&[[0.5_f32], [0.25]]).unwrap();

        buffer.update(&mut backend, &as_f32).unwrap();
        assert_eq!(buffer.data(), vec![0.5, 0.25]);
        assert_eq!(buffer.stride(), 4);
    }

    #[test]
    fn resizing_keeps_the_leaf_identity() {
        let mut backend = HeadlessBackend::new();
        let buffer = InstanceBuffer::new(&mut backend, "t", &column(&[0.0, 1.0])).unwrap();
        let leaf = buffer.expression();
        let old_handle = buffer.handle();

        buffer.update(&mut backend, &column(&[5.0, 6.0, 7.0])).unwrap();

        assert_ne!(buffer.handle(), old_handle);
        assert_eq!(backend.buffer_bytes(old_handle), None);
        assert!(buffer.expression().ptr_eq(&leaf));
        assert_eq!(leaf.instance_count().unwrap(), 3);
        assert_eq!(leaf.evaluate(2).unwrap(), vec![7.0]);
    }

    #[test]
    fn resize_without_backend_support_is_rejected() {
        let mut backend = HeadlessBackend::new().without_resize();
        let buffer = InstanceBuffer::new(&mut backend, "t", &column(&[0.0, 1.0])).unwrap();

        let err = buffer.update(&mut backend, &column(&[1.0])).unwrap_err();
        assert!(matches!(err, ExprVizError::Binding(_)));
        assert_eq!(buffer.count(), 2);
    }

    #[test]
    fn failed_write_keeps_last_known_good_contents() {
        let mut backend = HeadlessBackend::new();
        let buffer = InstanceBuffer::new(&mut backend, "t", &column(&[1.0, 2.0])).unwrap();
        backend.fail_next_write("device lost");

        assert!(matches!(
            buffer.update(&mut backend, &column(&[3.0, 4.0])),
            Err(ExprVizError::Backend(_))
        ));
        assert_eq!(buffer.data(), vec![1.0, 2.0]);
        assert_eq!(
            backend.buffer_bytes(buffer.handle()).unwrap(),
            bytemuck::cast_slice::<f32, u8>(&[1.0, 2.0])
        );
    }

    #[test]
    fn repeated_resizes_keep_one_live_allocation() {
        let mut backend = HeadlessBackend::new();
        let buffer = InstanceBuffer::new(&mut backend, "t", &column(&[0.0])).unwrap();
        for rows in 2..12 {
            let values: Vec<f64> = (0..rows).map(f64::from).collect();
            buffer.update(&mut backend, &HostArray::column(values)).unwrap();
            assert_eq!(backend.buffer_count(), 1);
        }

        buffer.release(&mut backend).unwrap();
        assert_eq!(backend.buffer_count(), 0);
    }

    #[test]
    fn failed_resize_frees_the_new_allocation() {
        let mut backend = HeadlessBackend::new();
        let buffer = InstanceBuffer::new(&mut backend, "t", &column(&[1.0])).unwrap();
        let handle = buffer.handle();
        backend.fail_next_write("device lost");

        assert!(buffer.update(&mut backend, &column(&[1.0, 2.0])).is_err());
        assert_eq!(backend.buffer_count(), 1);
        assert_eq!(buffer.handle(), handle);
        assert_eq!(buffer.count(), 1);
    }

    #[test]
    fn leaves_report_the_current_device_binding() {
        let mut backend = HeadlessBackend::new();
        let uv = HostArray::from_rows(&[[0.0_f32, 1.0]]).unwrap();
        let buffer = InstanceBuffer::new(&mut backend, "uv", &uv).unwrap();
        let field = match buffer.expression().kind() {
            NodeKind::BufferRef(field) => field.clone(),
            other => panic!("expected a buffer leaf, got {other:?}"),
        };
        assert_eq!(field.format().unwrap(), VertexFormat::Float32x2);
        assert_eq!(field.handle().unwrap(), buffer.handle());

        let wider = HostArray::from_rows(&[[2.0_f32, 3.0]; 3]).unwrap();
        buffer.update(&mut backend, &wider).unwrap();
        assert_eq!(field.handle().unwrap(), buffer.handle());
        assert_eq!(field.read(2).unwrap(), vec![2.0, 3.0]);
        assert!(matches!(field.read(usize::MAX), Err(ExprVizError::Binding(_))));
    }

    #[test]
    fn released_buffers_invalidate_their_leaves() {
        let mut backend = HeadlessBackend::new();
        let buffer = InstanceBuffer::new(&mut backend, "t", &column(&[1.0])).unwrap();
        let graph = buffer.expression() * 2.0_f32;
        buffer.release(&mut backend).unwrap();

        assert!(matches!(graph.validate(), Err(ExprVizError::Binding(_))));
        assert!(matches!(graph.evaluate(0), Err(ExprVizError::Binding(_))));
        assert!(matches!(
            graph.children()[0].kind(),
            NodeKind::BufferRef(_)
        ));
    }
}
