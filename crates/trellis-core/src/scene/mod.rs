//! Scene: geometries plus render objects in insertion order.

mod render_object;

use std::collections::HashMap;

use uuid::Uuid;

use crate::geometry::Geometry;
use crate::ids::GeometryId;

pub use render_object::{INSTANCE_COLOR_ATTRIBUTE, INSTANCE_MATRIX_ATTRIBUTE, Instancing, RenderObject};

/// A collection of shared geometries and the objects that draw them.
#[derive(Debug, Default)]
pub struct Scene {
    geometries: HashMap<GeometryId, Geometry>,
    objects: Vec<RenderObject>,
}

impl Scene {
    /// Create a new empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a geometry and returns its id.
    pub fn add_geometry(&mut self, geometry: Geometry) -> GeometryId {
        let id = geometry.id();
        self.geometries.insert(id, geometry);
        id
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(&id)
    }

    pub fn geometry_mut(&mut self, id: GeometryId) -> Option<&mut Geometry> {
        self.geometries.get_mut(&id)
    }

    /// Removes a geometry. GPU resources stay alive until the renderer
    /// disposes the geometry.
    pub fn remove_geometry(&mut self, id: GeometryId) -> Option<Geometry> {
        let users = self.users_of(id);
        if users > 0 {
            tracing::warn!("Removing geometry {} still drawn by {} object(s)", id, users);
        }
        self.geometries.remove(&id)
    }

    pub fn geometries(&self) -> impl Iterator<Item = &Geometry> {
        self.geometries.values()
    }

    /// Appends an object and returns its id.
    pub fn add_object(&mut self, object: RenderObject) -> Uuid {
        let id = object.id;
        self.objects.push(object);
        id
    }

    pub fn object(&self, id: Uuid) -> Option<&RenderObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn object_mut(&mut self, id: Uuid) -> Option<&mut RenderObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    /// Removes an object, keeping the order of the rest.
    pub fn remove_object(&mut self, id: Uuid) -> Option<RenderObject> {
        let index = self.objects.iter().position(|o| o.id == id)?;
        Some(self.objects.remove(index))
    }

    /// All objects in insertion order.
    pub fn objects(&self) -> &[RenderObject] {
        &self.objects
    }

    /// All objects, mutably, in insertion order.
    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut RenderObject> {
        self.objects.iter_mut()
    }

    /// Visible objects in insertion order.
    pub fn visible_objects(&self) -> impl Iterator<Item = &RenderObject> {
        self.objects.iter().filter(|o| o.visible)
    }

    /// Calls `f` for each visible object in insertion order.
    pub fn for_each_visible(&self, mut f: impl FnMut(&RenderObject)) {
        self.visible_objects().for_each(|o| f(o));
    }

    /// Number of objects drawing `geometry`.
    pub fn users_of(&self, geometry: GeometryId) -> usize {
        self.objects.iter().filter(|o| o.geometry == geometry).count()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
