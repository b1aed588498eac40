//! Typed CPU-side arrays that back GPU buffers.

use crate::ids::BufferId;

/// Component type of a buffer's elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Float,
}

impl DataType {
    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DataType::Byte | DataType::UnsignedByte => 1,
            DataType::Short | DataType::UnsignedShort => 2,
            DataType::Int | DataType::UnsignedInt | DataType::Float => 4,
        }
    }

    /// Returns true for 32-bit integer types, which are bound through the
    /// integer attribute pointer path.
    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::Int | DataType::UnsignedInt)
    }
}

/// A typed array of buffer elements.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    F32(Vec<f32>),
}

impl ArrayData {
    /// Number of elements (not vertices) in the array.
    pub fn len(&self) -> usize {
        match self {
            ArrayData::I8(v) => v.len(),
            ArrayData::U8(v) => v.len(),
            ArrayData::I16(v) => v.len(),
            ArrayData::U16(v) => v.len(),
            ArrayData::I32(v) => v.len(),
            ArrayData::U32(v) => v.len(),
            ArrayData::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ArrayData::I8(_) => DataType::Byte,
            ArrayData::U8(_) => DataType::UnsignedByte,
            ArrayData::I16(_) => DataType::Short,
            ArrayData::U16(_) => DataType::UnsignedShort,
            ArrayData::I32(_) => DataType::Int,
            ArrayData::U32(_) => DataType::UnsignedInt,
            ArrayData::F32(_) => DataType::Float,
        }
    }

    /// Raw bytes for upload.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ArrayData::I8(v) => bytemuck::cast_slice(v),
            ArrayData::U8(v) => v.as_slice(),
            ArrayData::I16(v) => bytemuck::cast_slice(v),
            ArrayData::U16(v) => bytemuck::cast_slice(v),
            ArrayData::I32(v) => bytemuck::cast_slice(v),
            ArrayData::U32(v) => bytemuck::cast_slice(v),
            ArrayData::F32(v) => bytemuck::cast_slice(v),
        }
    }

    /// Size of the array in bytes.
    pub fn byte_len(&self) -> usize {
        self.len() * self.data_type().size_in_bytes()
    }

    /// Reads element `i` as an unsigned index. Returns `None` for float arrays,
    /// negative values, or out-of-range positions.
    pub fn index_at(&self, i: usize) -> Option<u32> {
        match self {
            ArrayData::U8(v) => v.get(i).map(|&x| x as u32),
            ArrayData::U16(v) => v.get(i).map(|&x| x as u32),
            ArrayData::U32(v) => v.get(i).copied(),
            ArrayData::I8(v) => v.get(i).and_then(|&x| u32::try_from(x).ok()),
            ArrayData::I16(v) => v.get(i).and_then(|&x| u32::try_from(x).ok()),
            ArrayData::I32(v) => v.get(i).and_then(|&x| u32::try_from(x).ok()),
            ArrayData::F32(_) => None,
        }
    }

    /// Builds the smallest unsigned index array able to hold `indices`.
    pub fn index_from(indices: Vec<u32>) -> Self {
        if indices.iter().copied().max().unwrap_or(0) > u16::MAX as u32 {
            ArrayData::U32(indices)
        } else {
            ArrayData::U16(indices.into_iter().map(|i| i as u16).collect())
        }
    }
}

macro_rules! impl_from_vec {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for ArrayData {
                fn from(v: Vec<$ty>) -> Self {
                    ArrayData::$variant(v)
                }
            }
        )*
    };
}

impl_from_vec!(
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    f32 => F32,
);

/// Expected update frequency of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    #[default]
    Static,
    Dynamic,
    Stream,
}

/// A versioned array with a stable identity.
///
/// The version advances whenever the contents may have changed; the attribute
/// cache re-uploads when it sees a newer version than the one it holds.
/// Not `Clone`: a copy would share the identity, and with it the GPU buffer.
#[derive(Debug)]
pub struct BufferData {
    id: BufferId,
    array: ArrayData,
    version: u32,
    usage: BufferUsage,
}

impl BufferData {
    /// Creates a new buffer with a fresh identity.
    pub fn new(array: impl Into<ArrayData>) -> Self {
        Self {
            id: BufferId::next(),
            array: array.into(),
            version: 0,
            usage: BufferUsage::Static,
        }
    }

    /// Sets the usage hint.
    pub fn with_usage(mut self, usage: BufferUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn array(&self) -> &ArrayData {
        &self.array
    }

    /// Mutable access to the contents. Marks the buffer as needing upload.
    pub fn array_mut(&mut self) -> &mut ArrayData {
        self.version = self.version.wrapping_add(1);
        &mut self.array
    }

    /// Replaces the contents, keeping the identity.
    pub fn set_array(&mut self, array: impl Into<ArrayData>) {
        self.array = array.into();
        self.version = self.version.wrapping_add(1);
    }

    /// Forces a re-upload on next use.
    pub fn mark_needs_update(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn data_type(&self) -> DataType {
        self.array.data_type()
    }
}
