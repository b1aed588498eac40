//! Per-frame upload of the data each drawn object depends on.

use std::collections::HashMap;

use tracing::trace;
use trellis_core::{Geometry, GeometryId, RenderObject};

use crate::cache::attributes::AttributeCache;
use crate::cache::geometries::GeometryCache;
use crate::context::{BufferTarget, GpuContext};
use crate::error::RenderResult;
use crate::info::RenderInfo;

/// Uploads a geometry at most once per frame, and an object's instance
/// data every time the object is drawn.
#[derive(Debug, Default)]
pub struct ObjectCache {
    /// Frame a geometry was last updated in.
    updated: HashMap<GeometryId, u64>,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update<C: GpuContext>(
        &mut self,
        gl: &C,
        attributes: &mut AttributeCache<C>,
        geometries: &mut GeometryCache,
        info: &mut RenderInfo,
        object: &RenderObject,
        geometry: &Geometry,
        frame: u64,
    ) -> RenderResult<()> {
        geometries.get(geometry, info);

        if self.updated.get(&geometry.id()) != Some(&frame) {
            geometries.update(gl, attributes, geometry)?;
            self.updated.insert(geometry.id(), frame);
        }

        if let Some(instancing) = object.instancing() {
            for attribute in [Some(instancing.matrix()), instancing.color()].into_iter().flatten() {
                if let Some(data) = attribute.owned_data() {
                    attributes.update(gl, data, BufferTarget::Array)?;
                }
            }
            trace!("Updated instance data of {} ({} instances)", object.name, instancing.count());
        }
        Ok(())
    }

    /// Deletes the instance buffers of `object`.
    pub fn dispose_object<C: GpuContext>(&mut self, gl: &C, attributes: &mut AttributeCache<C>, object: &RenderObject) {
        if let Some(instancing) = object.instancing() {
            for attribute in [Some(instancing.matrix()), instancing.color()].into_iter().flatten() {
                attributes.remove(gl, attribute.data_id());
            }
        }
    }

    /// Drops the per-frame record of a disposed geometry.
    pub fn forget_geometry(&mut self, geometry: GeometryId) {
        self.updated.remove(&geometry);
    }
}
