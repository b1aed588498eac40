//! Geometry: named attributes plus an optional index and a draw mode.

use std::collections::{BTreeMap, HashMap};

use crate::attribute::{Attribute, InterleavedBuffer};
use crate::buffer::{ArrayData, BufferData};
use crate::ids::{BufferId, GeometryId};

/// Name of the attribute used to derive the vertex count of non-indexed geometry.
pub const POSITION_ATTRIBUTE: &str = "position";

/// Primitive topology of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

/// Vertex data shared by one or more render objects.
///
/// Geometries are not `Clone`: attribute and buffer identities key GPU caches,
/// so a copy would alias another geometry's GPU state.
#[derive(Debug)]
pub struct Geometry {
    id: GeometryId,
    name: String,
    attributes: BTreeMap<String, Attribute>,
    interleaved: HashMap<BufferId, InterleavedBuffer>,
    index: Option<Attribute>,
    mode: DrawMode,
    count: Option<u32>,
}

impl Geometry {
    /// Creates an empty triangle geometry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GeometryId::next(),
            name: name.into(),
            attributes: BTreeMap::new(),
            interleaved: HashMap::new(),
            index: None,
            mode: DrawMode::Triangles,
            count: None,
        }
    }

    /// Sets the draw mode.
    pub fn with_mode(mut self, mode: DrawMode) -> Self {
        self.mode = mode;
        self
    }

    /// Adds an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.set_attribute(name, attribute);
        self
    }

    /// Sets the index.
    pub fn with_index(mut self, indices: Vec<u32>) -> Self {
        self.set_index(indices);
        self
    }

    pub fn id(&self) -> GeometryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts an attribute, returning the one it replaced.
    ///
    /// A replaced attribute still owns a GPU buffer until the renderer is told
    /// to release it.
    pub fn set_attribute(&mut self, name: impl Into<String>, attribute: Attribute) -> Option<Attribute> {
        self.attributes.insert(name.into(), attribute)
    }

    /// Removes an attribute by name.
    pub fn remove_attribute(&mut self, name: &str) -> Option<Attribute> {
        self.attributes.remove(name)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attributes.get_mut(name)
    }

    /// Attributes ordered by name.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Registers an interleaved buffer and returns its id.
    pub fn add_interleaved_buffer(&mut self, buffer: InterleavedBuffer) -> BufferId {
        let id = buffer.id();
        self.interleaved.insert(id, buffer);
        id
    }

    pub fn interleaved_buffer(&self, id: BufferId) -> Option<&InterleavedBuffer> {
        self.interleaved.get(&id)
    }

    pub fn interleaved_buffer_mut(&mut self, id: BufferId) -> Option<&mut InterleavedBuffer> {
        self.interleaved.get_mut(&id)
    }

    /// Resolves the buffer holding an attribute's elements.
    ///
    /// Returns `None` when an interleaved attribute references a buffer this
    /// geometry does not hold.
    pub fn buffer_for<'a>(&'a self, attribute: &'a Attribute) -> Option<&'a BufferData> {
        match attribute.owned_data() {
            Some(data) => Some(data),
            None => self
                .interleaved
                .get(&attribute.data_id())
                .map(InterleavedBuffer::data),
        }
    }

    /// Sets a new index, choosing 16- or 32-bit storage by the largest value.
    pub fn set_index(&mut self, indices: Vec<u32>) -> Option<Attribute> {
        self.index
            .replace(Attribute::new(ArrayData::index_from(indices), 1))
    }

    /// Removes the index.
    pub fn clear_index(&mut self) -> Option<Attribute> {
        self.index.take()
    }

    pub fn index(&self) -> Option<&Attribute> {
        self.index.as_ref()
    }

    pub fn index_mut(&mut self) -> Option<&mut Attribute> {
        self.index.as_mut()
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DrawMode) {
        self.mode = mode;
    }

    /// Limits the number of drawn elements. `None` draws everything.
    pub fn set_draw_count(&mut self, count: Option<u32>) {
        self.count = count;
    }

    /// Number of vertices in the position attribute.
    pub fn vertex_count(&self) -> usize {
        let Some(position) = self.attributes.get(POSITION_ATTRIBUTE) else {
            return 0;
        };
        match position.count() {
            Some(count) => count,
            None => self
                .interleaved
                .get(&position.data_id())
                .map(InterleavedBuffer::count)
                .unwrap_or(0),
        }
    }

    /// Number of elements a draw call consumes: the index length when indexed,
    /// the vertex count otherwise, clamped by any explicit draw count.
    pub fn draw_count(&self) -> u32 {
        let available = match &self.index {
            Some(index) => index.count().unwrap_or(0),
            None => self.vertex_count(),
        } as u32;
        match self.count {
            Some(limit) => limit.min(available),
            None => available,
        }
    }

    /// Every buffer this geometry owns: attribute buffers, interleaved buffers
    /// and the index.
    pub fn buffer_ids(&self) -> Vec<BufferId> {
        let mut ids: Vec<BufferId> = self
            .attributes
            .values()
            .filter_map(|a| a.owned_data().map(BufferData::id))
            .collect();
        ids.extend(self.interleaved.keys().copied());
        if let Some(index) = &self.index {
            ids.push(index.data_id());
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Geometry {
        Geometry::new("triangle")
            .with_attribute(POSITION_ATTRIBUTE, Attribute::new(vec![0.0f32; 9], 3))
    }

    #[test]
    fn test_draw_count_non_indexed() {
        assert_eq!(triangle().draw_count(), 3);
    }

    #[test]
    fn test_draw_count_indexed() {
        let geometry = triangle().with_index(vec![0, 1, 2, 2, 1, 0]);
        assert!(geometry.is_indexed());
        assert_eq!(geometry.draw_count(), 6);
    }

    #[test]
    fn test_draw_count_is_clamped() {
        let mut geometry = triangle();
        geometry.set_draw_count(Some(100));
        assert_eq!(geometry.draw_count(), 3);
        geometry.set_draw_count(Some(2));
        assert_eq!(geometry.draw_count(), 2);
    }

    #[test]
    fn test_interleaved_vertex_count() {
        let mut geometry = Geometry::new("interleaved");
        let buffer = InterleavedBuffer::new(vec![0.0f32; 30], 6);
        let position = Attribute::interleaved(&buffer, 3, 0);
        geometry.add_interleaved_buffer(buffer);
        geometry.set_attribute(POSITION_ATTRIBUTE, position);

        assert_eq!(geometry.vertex_count(), 5);
        let attr = geometry.attribute(POSITION_ATTRIBUTE).unwrap();
        assert!(geometry.buffer_for(attr).is_some());
    }

    #[test]
    fn test_replacing_attribute_returns_previous() {
        let mut geometry = triangle();
        let previous = geometry.set_attribute(POSITION_ATTRIBUTE, Attribute::new(vec![0.0f32; 3], 3));
        assert!(previous.is_some());
        assert_eq!(geometry.attribute_count(), 1);
    }

    #[test]
    fn test_buffer_ids_cover_index() {
        let geometry = triangle().with_index(vec![0, 1, 2]);
        assert_eq!(geometry.buffer_ids().len(), 2);
    }
}
