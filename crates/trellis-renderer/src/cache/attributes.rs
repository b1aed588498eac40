//! GPU buffers for attribute data.

use std::collections::HashMap;

use tracing::{debug, trace};
use trellis_core::{BufferData, BufferId, DataType};

use crate::context::{BufferTarget, GpuContext};
use crate::error::{RenderError, RenderResult};

/// A GPU buffer mirroring one [`BufferData`].
#[derive(Debug)]
pub struct GpuBuffer<C: GpuContext> {
    pub buffer: C::Buffer,
    pub data_type: DataType,
    pub bytes_per_element: usize,
    /// Data version last uploaded.
    pub version: u32,
    byte_len: usize,
}

/// GPU buffers keyed by buffer data identity.
///
/// Interleaved attributes share one entry since they share one data id.
pub struct AttributeCache<C: GpuContext> {
    buffers: HashMap<BufferId, GpuBuffer<C>>,
}

impl<C: GpuContext> AttributeCache<C> {
    pub fn new() -> Self {
        Self {
            buffers: HashMap::new(),
        }
    }

    /// The GPU buffer for `id`, if uploaded.
    pub fn get(&self, id: BufferId) -> Option<&GpuBuffer<C>> {
        self.buffers.get(&id)
    }

    /// Creates the GPU buffer on first sight and re-uploads when the data's
    /// version has advanced. Leaves the buffer bound to `target`.
    ///
    /// Returns `true` when data was uploaded.
    pub fn update(&mut self, gl: &C, data: &BufferData, target: BufferTarget) -> RenderResult<bool> {
        let bytes = data.array().as_bytes();

        match self.buffers.get_mut(&data.id()) {
            None => {
                let buffer = gl.create_buffer().map_err(RenderError::Resource)?;
                gl.bind_buffer(target, Some(buffer));
                gl.buffer_data(target, bytes, data.usage());
                debug!("Created buffer for {} ({} bytes)", data.id(), bytes.len());
                let data_type = data.data_type();
                self.buffers.insert(
                    data.id(),
                    GpuBuffer {
                        buffer,
                        data_type,
                        bytes_per_element: data_type.size_in_bytes(),
                        version: data.version(),
                        byte_len: bytes.len(),
                    },
                );
                Ok(true)
            }
            Some(cached) if cached.version < data.version() => {
                gl.bind_buffer(target, Some(cached.buffer));
                if cached.byte_len == bytes.len() && cached.data_type == data.data_type() {
                    gl.buffer_sub_data(target, 0, bytes);
                } else {
                    gl.buffer_data(target, bytes, data.usage());
                    cached.data_type = data.data_type();
                    cached.bytes_per_element = cached.data_type.size_in_bytes();
                    cached.byte_len = bytes.len();
                }
                trace!("Updated buffer for {} to version {}", data.id(), data.version());
                cached.version = data.version();
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    /// Deletes the GPU buffer for `id`. Removing an absent id is a no-op.
    pub fn remove(&mut self, gl: &C, id: BufferId) -> bool {
        match self.buffers.remove(&id) {
            Some(cached) => {
                gl.delete_buffer(cached.buffer);
                debug!("Deleted buffer for {}", id);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Deletes every buffer.
    pub fn dispose(&mut self, gl: &C) {
        for (_, cached) in self.buffers.drain() {
            gl.delete_buffer(cached.buffer);
        }
    }
}

impl<C: GpuContext> Default for AttributeCache<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GlCall, HeadlessContext};

    #[test]
    fn test_create_once() {
        let gl = HeadlessContext::new();
        let mut cache = AttributeCache::new();
        let data = BufferData::new(vec![0.0f32; 9]);

        assert!(cache.update(&gl, &data, BufferTarget::Array).unwrap());
        assert!(!cache.update(&gl, &data, BufferTarget::Array).unwrap());
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::CreateBuffer(_))), 1);

        let cached = cache.get(data.id()).unwrap();
        assert_eq!(cached.data_type, DataType::Float);
        assert_eq!(cached.bytes_per_element, 4);
    }

    #[test]
    fn test_version_bump_reuploads() {
        let gl = HeadlessContext::new();
        let mut cache = AttributeCache::new();
        let mut data = BufferData::new(vec![0.0f32; 3]);
        cache.update(&gl, &data, BufferTarget::Array).unwrap();

        data.mark_needs_update();
        gl.clear_calls();
        assert!(cache.update(&gl, &data, BufferTarget::Array).unwrap());
        assert!(gl.calls().contains(&GlCall::BufferSubData {
            target: BufferTarget::Array,
            offset: 0,
            bytes: 12
        }));

        data.set_array(vec![0.0f32; 6]);
        gl.clear_calls();
        cache.update(&gl, &data, BufferTarget::Array).unwrap();
        assert!(gl.count_calls(|c| matches!(c, GlCall::BufferData { bytes: 24, .. })) == 1);
        assert_eq!(cache.get(data.id()).unwrap().version, data.version());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let gl = HeadlessContext::new();
        let mut cache = AttributeCache::new();
        let data = BufferData::new(vec![1u16, 2, 3]);
        cache.update(&gl, &data, BufferTarget::ElementArray).unwrap();

        assert!(cache.remove(&gl, data.id()));
        assert!(!cache.remove(&gl, data.id()));
        assert_eq!(gl.live_buffers(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_allocation_failure() {
        let gl = HeadlessContext::new();
        gl.set_fail_allocations(true);
        let mut cache = AttributeCache::new();
        let data = BufferData::new(vec![0.0f32; 3]);
        assert!(matches!(
            cache.update(&gl, &data, BufferTarget::Array),
            Err(RenderError::Resource(_))
        ));
    }
}
