//! Geometry registration, attribute uploads and derived wireframe indices.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};
use trellis_core::{ArrayData, Attribute, BufferData, BufferId, Geometry, GeometryId, POSITION_ATTRIBUTE};

use crate::cache::attributes::AttributeCache;
use crate::cache::bindings::BindingStateCache;
use crate::context::{BufferTarget, GpuContext};
use crate::error::{RenderError, RenderResult};
use crate::info::RenderInfo;
use crate::state::GlState;

/// Edge index derived from a geometry's triangles.
struct WireframeIndex {
    data: BufferData,
    /// Identity and version of the index or position buffer it was built from.
    source: Option<(BufferId, u32)>,
}

impl WireframeIndex {
    fn build(geometry: &Geometry, source: Option<(BufferId, u32)>) -> Self {
        let data = BufferData::new(ArrayData::index_from(edge_indices(geometry)));
        debug!("Built wireframe index of {} ({} indices)", geometry.id(), data.array().len());
        Self { data, source }
    }
}

/// GPU-side bookkeeping for every geometry the renderer has seen.
#[derive(Default)]
pub struct GeometryCache {
    /// Buffers uploaded on behalf of each registered geometry.
    geometries: HashMap<GeometryId, HashSet<BufferId>>,
    wireframe: HashMap<GeometryId, WireframeIndex>,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `geometry` on first sight. Returns `true` if it was new.
    pub fn get(&mut self, geometry: &Geometry, info: &mut RenderInfo) -> bool {
        if self.geometries.contains_key(&geometry.id()) {
            return false;
        }
        self.geometries.insert(geometry.id(), HashSet::new());
        info.memory.geometries += 1;
        debug!("Registered geometry {} ({})", geometry.name(), geometry.id());
        true
    }

    /// Uploads every attribute buffer of `geometry` that is new or changed.
    pub fn update<C: GpuContext>(
        &mut self,
        gl: &C,
        attributes: &mut AttributeCache<C>,
        geometry: &Geometry,
    ) -> RenderResult<()> {
        let owned = self.geometries.entry(geometry.id()).or_default();
        for (name, attribute) in geometry.attributes() {
            let data = geometry.buffer_for(attribute).ok_or(RenderError::MissingBufferData {
                attribute: attribute.id(),
            })?;
            if attributes.update(gl, data, BufferTarget::Array)? {
                trace!("Uploaded attribute {} of {}", name, geometry.id());
            }
            owned.insert(data.id());
        }
        if let Some(index) = geometry.index() {
            owned.insert(index.data_id());
        }
        Ok(())
    }

    /// The edge index of `geometry`, regenerated when its source buffer
    /// changed since the last call.
    ///
    /// Each triangle `(a, b, c)` contributes `a, b, b, c, c, a`. The source is
    /// the index when present, otherwise consecutive positions.
    pub fn wireframe_index<C: GpuContext>(
        &mut self,
        gl: &C,
        attributes: &mut AttributeCache<C>,
        geometry: &Geometry,
    ) -> &BufferData {
        let source = wireframe_source(geometry);
        let index = match self.wireframe.entry(geometry.id()) {
            Entry::Occupied(entry) => {
                let current = entry.into_mut();
                if current.source != source {
                    attributes.remove(gl, current.data.id());
                    *current = WireframeIndex::build(geometry, source);
                }
                current
            }
            Entry::Vacant(entry) => entry.insert(WireframeIndex::build(geometry, source)),
        };
        &index.data
    }

    /// Forgets `geometry`: deletes its buffers, its wireframe index and every
    /// binding state built for it. Returns `false` if it was not registered.
    pub fn dispose<C: GpuContext>(
        &mut self,
        state: &mut GlState<C>,
        attributes: &mut AttributeCache<C>,
        bindings: &mut BindingStateCache<C>,
        info: &mut RenderInfo,
        geometry: GeometryId,
    ) -> bool {
        if let Some(wireframe) = self.wireframe.remove(&geometry) {
            attributes.remove(state.gl(), wireframe.data.id());
        }
        bindings.release_states_of_geometry(state, geometry);

        let Some(buffers) = self.geometries.remove(&geometry) else {
            return false;
        };
        for buffer in buffers {
            attributes.remove(state.gl(), buffer);
        }
        info.memory.geometries = info.memory.geometries.saturating_sub(1);
        debug!("Disposed geometry {}", geometry);
        true
    }

    /// Whether `geometry` is registered.
    pub fn contains(&self, geometry: GeometryId) -> bool {
        self.geometries.contains_key(&geometry)
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    /// Registered geometry ids.
    pub fn ids(&self) -> Vec<GeometryId> {
        self.geometries.keys().copied().collect()
    }
}

fn wireframe_source(geometry: &Geometry) -> Option<(BufferId, u32)> {
    let attribute = match geometry.index() {
        Some(index) => index,
        None => geometry.attribute(POSITION_ATTRIBUTE)?,
    };
    let data = geometry.buffer_for(attribute)?;
    Some((data.id(), data.version()))
}

fn edge_indices(geometry: &Geometry) -> Vec<u32> {
    let triangles: Vec<u32> = match geometry.index().and_then(Attribute::owned_data) {
        Some(index) => (0..index.array().len())
            .filter_map(|i| index.array().index_at(i))
            .collect(),
        None => (0..geometry.vertex_count() as u32).collect(),
    };

    triangles
        .chunks_exact(3)
        .flat_map(|t| [t[0], t[1], t[1], t[2], t[2], t[0]])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeadlessContext;
    use trellis_core::{DataType, primitives};

    #[test]
    fn test_register_once() {
        let mut cache = GeometryCache::new();
        let mut info = RenderInfo::new();
        let geometry = primitives::axes(1.0);
        assert!(cache.get(&geometry, &mut info));
        assert!(!cache.get(&geometry, &mut info));
        assert_eq!(info.memory.geometries, 1);
    }

    #[test]
    fn test_update_uploads_attributes() {
        let gl = HeadlessContext::new();
        let mut attributes = AttributeCache::new();
        let mut cache = GeometryCache::new();
        let floor = primitives::floor(&primitives::FloorConfig::default());

        cache.update(&gl, &mut attributes, &floor).unwrap();
        // position and color share one interleaved buffer
        assert_eq!(attributes.len(), 1);
    }

    #[test]
    fn test_wireframe_index_of_tetrahedron() {
        let gl = HeadlessContext::new();
        let mut attributes = AttributeCache::new();
        let mut cache = GeometryCache::new();
        let mut geometry = primitives::tetrahedron(1.0, 0.0);

        let first = cache.wireframe_index(&gl, &mut attributes, &geometry);
        assert_eq!(first.array().len(), 24);
        assert_eq!(first.data_type(), DataType::UnsignedShort);
        assert_eq!(
            (0..6).filter_map(|i| first.array().index_at(i)).collect::<Vec<_>>(),
            vec![2, 3, 3, 1, 1, 2]
        );
        let first_id = first.id();
        attributes.update(&gl, first, BufferTarget::ElementArray).unwrap();

        assert_eq!(cache.wireframe_index(&gl, &mut attributes, &geometry).id(), first_id);

        geometry.index_mut().and_then(Attribute::owned_data_mut).unwrap().mark_needs_update();
        let rebuilt = cache.wireframe_index(&gl, &mut attributes, &geometry).id();
        assert_ne!(rebuilt, first_id);
        assert!(attributes.get(first_id).is_none());
    }

    #[test]
    fn test_wireframe_index_without_index() {
        let gl = HeadlessContext::new();
        let mut attributes = AttributeCache::new();
        let mut cache = GeometryCache::new();
        let geometry =
            Geometry::new("quad").with_attribute(POSITION_ATTRIBUTE, Attribute::new(vec![0.0f32; 18], 3));

        let index = cache.wireframe_index(&gl, &mut attributes, &geometry);
        assert_eq!(
            (0..index.array().len()).filter_map(|i| index.array().index_at(i)).collect::<Vec<_>>(),
            vec![0, 1, 1, 2, 2, 0, 3, 4, 4, 5, 5, 3]
        );
    }

    #[test]
    fn test_wide_wireframe_index_uses_u32() {
        let gl = HeadlessContext::new();
        let mut attributes = AttributeCache::new();
        let mut cache = GeometryCache::new();
        let geometry = Geometry::new("big")
            .with_attribute(POSITION_ATTRIBUTE, Attribute::new(vec![0.0f32; 3 * 70_000], 3))
            .with_index(vec![0, 1, 69_999]);

        let index = cache.wireframe_index(&gl, &mut attributes, &geometry);
        assert_eq!(index.data_type(), DataType::UnsignedInt);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let gl = HeadlessContext::new();
        let mut state = GlState::new(gl);
        let mut bindings = BindingStateCache::new(state.gl());
        let mut attributes = AttributeCache::new();
        let mut cache = GeometryCache::new();
        let mut info = RenderInfo::new();
        let geometry = primitives::tetrahedron(1.0, 0.0);

        cache.get(&geometry, &mut info);
        cache.update(state.gl(), &mut attributes, &geometry).unwrap();
        let index = geometry.index().and_then(Attribute::owned_data).unwrap();
        attributes.update(state.gl(), index, BufferTarget::ElementArray).unwrap();
        let wireframe = cache.wireframe_index(state.gl(), &mut attributes, &geometry);
        attributes.update(state.gl(), wireframe, BufferTarget::ElementArray).unwrap();
        assert_eq!(state.gl().live_buffers(), 4);

        assert!(cache.dispose(&mut state, &mut attributes, &mut bindings, &mut info, geometry.id()));
        assert_eq!(state.gl().live_buffers(), 0);
        assert!(attributes.is_empty());
        assert_eq!(info.memory.geometries, 0);

        assert!(!cache.dispose(&mut state, &mut attributes, &mut bindings, &mut info, geometry.id()));
        assert_eq!(info.memory.geometries, 0);
    }
}
