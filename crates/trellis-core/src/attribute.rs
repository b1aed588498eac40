//! Per-vertex and per-instance attributes.

use crate::buffer::{ArrayData, BufferData, DataType};
use crate::ids::{AttributeId, BufferId};

/// How often an attribute advances while drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexStep {
    /// Advances once per vertex (divisor 0).
    #[default]
    PerVertex,
    /// Advances once every `n` instances (divisor `n`).
    PerInstance(u32),
}

impl VertexStep {
    /// The attribute divisor for this step mode.
    pub fn divisor(&self) -> u32 {
        match self {
            VertexStep::PerVertex => 0,
            VertexStep::PerInstance(n) => *n,
        }
    }
}

/// A buffer holding several attributes interleaved with a common stride.
///
/// Owned by a [`Geometry`](crate::Geometry); attributes reference it by id.
#[derive(Debug)]
pub struct InterleavedBuffer {
    data: BufferData,
    stride: usize,
    step: VertexStep,
}

impl InterleavedBuffer {
    /// Creates an interleaved buffer. `stride` is measured in elements.
    pub fn new(array: impl Into<ArrayData>, stride: usize) -> Self {
        Self {
            data: BufferData::new(array),
            stride: stride.max(1),
            step: VertexStep::PerVertex,
        }
    }

    /// Creates a per-instance interleaved buffer.
    pub fn instanced(array: impl Into<ArrayData>, stride: usize, mesh_per_attribute: u32) -> Self {
        Self {
            step: VertexStep::PerInstance(mesh_per_attribute.max(1)),
            ..Self::new(array, stride)
        }
    }

    pub fn id(&self) -> BufferId {
        self.data.id()
    }

    pub fn data(&self) -> &BufferData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut BufferData {
        &mut self.data
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn step(&self) -> VertexStep {
        self.step
    }

    /// Number of records in the buffer.
    pub fn count(&self) -> usize {
        self.data.array().len() / self.stride
    }
}

/// Where an attribute's elements live.
#[derive(Debug)]
pub enum AttributeSource {
    /// The attribute owns a tightly packed buffer.
    Owned(BufferData),
    /// The attribute reads from a shared interleaved buffer.
    Interleaved {
        buffer: BufferId,
        /// Stride in elements, copied from the buffer.
        stride: usize,
        /// Offset of the first element in elements.
        offset: usize,
    },
}

/// A named, typed array of per-vertex (or per-instance) data.
#[derive(Debug)]
pub struct Attribute {
    id: AttributeId,
    source: AttributeSource,
    item_size: usize,
    normalized: bool,
    step: VertexStep,
}

impl Attribute {
    /// Creates a tightly packed per-vertex attribute with `item_size`
    /// components per vertex.
    pub fn new(array: impl Into<ArrayData>, item_size: usize) -> Self {
        Self {
            id: AttributeId::next(),
            source: AttributeSource::Owned(BufferData::new(array)),
            item_size: item_size.max(1),
            normalized: false,
            step: VertexStep::PerVertex,
        }
    }

    /// Creates a tightly packed per-instance attribute.
    pub fn instanced(array: impl Into<ArrayData>, item_size: usize, mesh_per_attribute: u32) -> Self {
        Self {
            step: VertexStep::PerInstance(mesh_per_attribute.max(1)),
            ..Self::new(array, item_size)
        }
    }

    /// Creates an attribute reading `item_size` components at `offset`
    /// (in elements) from each record of `buffer`.
    pub fn interleaved(buffer: &InterleavedBuffer, item_size: usize, offset: usize) -> Self {
        Self {
            id: AttributeId::next(),
            source: AttributeSource::Interleaved {
                buffer: buffer.id(),
                stride: buffer.stride(),
                offset,
            },
            item_size: item_size.max(1),
            normalized: false,
            step: buffer.step(),
        }
    }

    /// Sets whether integer data is normalized to [0, 1] / [-1, 1].
    pub fn with_normalized(mut self, normalized: bool) -> Self {
        self.normalized = normalized;
        self
    }

    pub fn id(&self) -> AttributeId {
        self.id
    }

    pub fn source(&self) -> &AttributeSource {
        &self.source
    }

    /// Identity of the buffer that holds this attribute's elements.
    pub fn data_id(&self) -> BufferId {
        match &self.source {
            AttributeSource::Owned(data) => data.id(),
            AttributeSource::Interleaved { buffer, .. } => *buffer,
        }
    }

    /// The owned buffer, if this attribute is tightly packed.
    pub fn owned_data(&self) -> Option<&BufferData> {
        match &self.source {
            AttributeSource::Owned(data) => Some(data),
            AttributeSource::Interleaved { .. } => None,
        }
    }

    /// Mutable owned buffer, if this attribute is tightly packed.
    pub fn owned_data_mut(&mut self) -> Option<&mut BufferData> {
        match &mut self.source {
            AttributeSource::Owned(data) => Some(data),
            AttributeSource::Interleaved { .. } => None,
        }
    }

    pub fn is_interleaved(&self) -> bool {
        matches!(self.source, AttributeSource::Interleaved { .. })
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    pub fn normalized(&self) -> bool {
        self.normalized
    }

    pub fn step(&self) -> VertexStep {
        self.step
    }

    pub fn is_instanced(&self) -> bool {
        matches!(self.step, VertexStep::PerInstance(_))
    }

    /// Element type, when the attribute owns its data.
    pub fn data_type(&self) -> Option<DataType> {
        self.owned_data().map(|data| data.data_type())
    }

    /// Number of items (vertices or instances) when tightly packed.
    pub fn count(&self) -> Option<usize> {
        self.owned_data()
            .map(|data| data.array().len() / self.item_size)
    }
}
