use std::{
    cell::RefCell,
    collections::BTreeMap,
    rc::{Rc, Weak},
};

use crate::{
    controls::ParameterUpdate,
    expression::Expression,
    render::{next_buffer_id, BufferDescriptor, BufferHandle, BufferUsage, RenderBackend},
    ExprVizError, Result,
};

use super::{UniformFieldDecl, UniformLayout, WireType};

#[derive(Debug)]
struct UniformBufferInner {
    id: u64,
    struct_name: String,
    layout: UniformLayout,
    handle: BufferHandle,
    /// Bytes last pushed to the device.
    bytes: Vec<u8>,
}

/// Parameter struct packed into one device uniform buffer.
///
/// Field values live on the host until [`UniformBuffer::update`] serializes
/// all of them and pushes the whole buffer.
#[derive(Debug)]
pub struct UniformBuffer {
    inner: Rc<RefCell<UniformBufferInner>>,
    values: Vec<f64>,
}

impl UniformBuffer {
    /// Computes the layout for `fields`, allocates the device buffer and
    /// pushes the initial values.
    pub fn declare(
        backend: &mut dyn RenderBackend,
        struct_name: &str,
        fields: &[UniformFieldDecl],
    ) -> Result<Self> {
        let layout = UniformLayout::compute(fields)?;
        let handle = backend.create_buffer(&BufferDescriptor {
            label: struct_name,
            size: layout.size() as u64,
            usage: BufferUsage::Uniform,
        })?;
        tracing::debug!(
            struct_name,
            fields = layout.fields().len(),
            size = layout.size(),
            "declared uniform buffer"
        );

        let mut buffer = Self {
            inner: Rc::new(RefCell::new(UniformBufferInner {
                id: next_buffer_id(),
                struct_name: struct_name.to_string(),
                bytes: vec![0; layout.size()],
                layout,
                handle,
            })),
            values: fields.iter().map(|field| field.value).collect(),
        };
        buffer.update(backend)?;
        Ok(buffer)
    }

    /// Parses a JSON array of field declarations and declares the buffer.
    pub fn declare_json(
        backend: &mut dyn RenderBackend,
        struct_name: &str,
        json: &str,
    ) -> Result<Self> {
        let fields: Vec<UniformFieldDecl> = serde_json::from_str(json)?;
        Self::declare(backend, struct_name, &fields)
    }

    pub fn id(&self) -> u64 {
        self.inner.borrow().id
    }

    pub fn struct_name(&self) -> String {
        self.inner.borrow().struct_name.clone()
    }

    pub fn handle(&self) -> BufferHandle {
        self.inner.borrow().handle
    }

    pub fn layout(&self) -> UniformLayout {
        self.inner.borrow().layout.clone()
    }

    /// Reference to field `index`, usable as a graph leaf.
    pub fn field_ref(&self, index: usize) -> Result<UniformFieldRef> {
        let inner = self.inner.borrow();
        let field = inner.layout.field(index).ok_or_else(|| {
            ExprVizError::binding(format!(
                "`{}` has no field with index {index}",
                inner.struct_name
            ))
        })?;
        Ok(UniformFieldRef {
            buffer_id: inner.id,
            index,
            offset: field.offset,
            wire: field.wire,
            name: field.name.clone(),
            struct_name: inner.struct_name.clone(),
            inner: Rc::downgrade(&self.inner),
        })
    }

    pub fn field(&self, name: &str) -> Result<UniformFieldRef> {
        let index = self.index_of(name)?;
        self.field_ref(index)
    }

    /// References to every field, keyed by name.
    pub fn instance(&self) -> Result<BTreeMap<String, UniformFieldRef>> {
        (0..self.values.len())
            .map(|index| self.field_ref(index).map(|field| (field.name.clone(), field)))
            .collect()
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        let inner = self.inner.borrow();
        let index = inner.layout.index_of(name).ok_or_else(|| {
            ExprVizError::binding(format!("`{}` has no field `{name}`", inner.struct_name))
        })?;
        Ok(index)
    }

    /// Current host value of `name`.
    pub fn get(&self, name: &str) -> Result<f64> {
        Ok(self.values[self.index_of(name)?])
    }

    pub fn set(&mut self, name: &str, value: f64) -> Result<()> {
        let index = self.index_of(name)?;
        self.values[index] = value;
        Ok(())
    }

    pub fn set_field(&mut self, field: &UniformFieldRef, value: f64) -> Result<()> {
        if field.buffer_id != self.id() {
            return Err(ExprVizError::binding(format!(
                "field `{}.{}` belongs to another uniform buffer",
                field.struct_name, field.name
            )));
        }
        self.values[field.index] = value;
        Ok(())
    }

    /// Routes updates whose target names a field into this buffer. Other
    /// targets are ignored. Returns how many updates were applied.
    pub fn apply_updates(&mut self, updates: &[ParameterUpdate]) -> usize {
        let mut applied = 0;
        for update in updates {
            if self.set(&update.target, f64::from(update.value)).is_ok() {
                applied += 1;
            } else {
                tracing::trace!(target_field = %update.target, "no uniform field for update");
            }
        }
        applied
    }

    /// Host values packed into the wire layout.
    pub fn serialize(&self) -> Vec<u8> {
        let inner = self.inner.borrow();
        let mut bytes = vec![0; inner.layout.size()];
        for (field, value) in inner.layout.fields().iter().zip(&self.values) {
            let range = field.offset..field.offset + field.size;
            match field.wire {
                WireType::Float32 => {
                    bytes[range].copy_from_slice(&(*value as f32).to_le_bytes())
                }
                WireType::Float64 => bytes[range].copy_from_slice(&value.to_le_bytes()),
            }
        }
        bytes
    }

    /// Serializes every field and pushes the entire buffer. If the backend
    /// rejects the write, the previously pushed bytes remain current.
    pub fn update(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        let bytes = self.serialize();
        let mut inner = self.inner.borrow_mut();
        backend.write_buffer(inner.handle, 0, &bytes)?;
        tracing::trace!(
            struct_name = %inner.struct_name,
            size = bytes.len(),
            "pushed uniform buffer"
        );
        inner.bytes = bytes;
        Ok(())
    }

    /// Bytes last pushed to the device.
    pub fn bytes(&self) -> Vec<u8> {
        self.inner.borrow().bytes.clone()
    }

    /// Frees the device buffer and drops the host state. Graphs still
    /// referencing its fields fail validation with a binding error from now
    /// on.
    pub fn release(self, backend: &mut dyn RenderBackend) -> Result<()> {
        let inner = self.inner.borrow();
        backend.destroy_buffer(inner.handle)?;
        tracing::debug!(struct_name = %inner.struct_name, "released uniform buffer");
        Ok(())
    }
}

/// Non-owning handle to one field of a [`UniformBuffer`]. As a graph leaf it
/// evaluates to whatever was last pushed for that field.
#[derive(Debug, Clone)]
pub struct UniformFieldRef {
    buffer_id: u64,
    index: usize,
    offset: usize,
    wire: WireType,
    name: String,
    struct_name: String,
    inner: Weak<RefCell<UniformBufferInner>>,
}

impl UniformFieldRef {
    pub fn buffer_id(&self) -> u64 {
        self.buffer_id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn struct_name(&self) -> &str {
        &self.struct_name
    }

    pub fn expression(&self) -> Expression {
        Expression::uniform_field(self.clone())
    }

    fn upgrade(&self) -> Result<Rc<RefCell<UniformBufferInner>>> {
        self.inner.upgrade().ok_or_else(|| {
            ExprVizError::binding(format!(
                "uniform buffer `{}` was released while `{}` is still referenced",
                self.struct_name, self.name
            ))
        })
    }

    pub fn check_alive(&self) -> Result<()> {
        self.upgrade().map(|_| ())
    }

    /// Device handle of the owning buffer.
    pub fn handle(&self) -> Result<BufferHandle> {
        let inner = self.upgrade()?;
        let handle = inner.borrow().handle;
        Ok(handle)
    }

    /// Value last pushed for this field. Double precision fields are
    /// narrowed, as graphs compute in f32.
    pub fn read(&self) -> Result<f32> {
        let inner = self.upgrade()?;
        let inner = inner.borrow();
        let raw = &inner.bytes[self.offset..self.offset + self.wire.size()];
        match self.wire {
            WireType::Float32 => {
                let mut word = [0; 4];
                word.copy_from_slice(raw);
                Ok(f32::from_le_bytes(word))
            }
            WireType::Float64 => {
                let mut word = [0; 8];
                word.copy_from_slice(raw);
                Ok(f64::from_le_bytes(word) as f32)
            }
        }
    }
}

impl From<UniformFieldRef> for Expression {
    fn from(value: UniformFieldRef) -> Self {
        Expression::uniform_field(value)
    }
}

impl From<&UniformFieldRef> for Expression {
    fn from(value: &UniformFieldRef) -> Self {
        value.expression()
    }
}
