//! Render object definition.

use std::cell::Cell;

use glam::{EulerRot, Mat4, Quat, Vec3};
use uuid::Uuid;

use crate::attribute::Attribute;
use crate::buffer::ArrayData;
use crate::ids::GeometryId;
use crate::material::Material;

/// Attribute name of per-instance transforms.
pub const INSTANCE_MATRIX_ATTRIBUTE: &str = "instanceMatrix";
/// Attribute name of per-instance colors.
pub const INSTANCE_COLOR_ATTRIBUTE: &str = "instanceColor";

/// Floats per instance transform.
const MATRIX_ITEM_SIZE: usize = 16;
/// Floats per instance color.
const COLOR_ITEM_SIZE: usize = 3;

/// Per-instance data of an instanced object.
#[derive(Debug)]
pub struct Instancing {
    count: u32,
    matrix: Attribute,
    color: Option<Attribute>,
}

impl Instancing {
    /// One instance per transform.
    pub fn new(transforms: &[Mat4]) -> Self {
        let data: Vec<f32> = transforms.iter().flat_map(|m| m.to_cols_array()).collect();
        Self {
            count: transforms.len() as u32,
            matrix: Attribute::instanced(data, MATRIX_ITEM_SIZE, 1),
            color: None,
        }
    }

    /// Adds per-instance colors. Missing entries default to white.
    pub fn with_colors(mut self, colors: &[Vec3]) -> Self {
        let data: Vec<f32> = (0..self.count as usize)
            .flat_map(|i| colors.get(i).copied().unwrap_or(Vec3::ONE).to_array())
            .collect();
        self.color = Some(Attribute::instanced(data, COLOR_ITEM_SIZE, 1));
        self
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// The `instanceMatrix` attribute.
    pub fn matrix(&self) -> &Attribute {
        &self.matrix
    }

    /// The `instanceColor` attribute, if colors were set.
    pub fn color(&self) -> Option<&Attribute> {
        self.color.as_ref()
    }

    /// The per-instance attribute a shader declares as `name`.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        match name {
            INSTANCE_MATRIX_ATTRIBUTE => Some(&self.matrix),
            INSTANCE_COLOR_ATTRIBUTE => self.color.as_ref(),
            _ => None,
        }
    }

    /// Replaces the transform of one instance.
    pub fn set_matrix_at(&mut self, index: usize, matrix: Mat4) -> bool {
        write_floats(&mut self.matrix, index, MATRIX_ITEM_SIZE, &matrix.to_cols_array())
    }

    /// Replaces the color of one instance.
    pub fn set_color_at(&mut self, index: usize, color: Vec3) -> bool {
        match &mut self.color {
            Some(attribute) => write_floats(attribute, index, COLOR_ITEM_SIZE, &color.to_array()),
            None => false,
        }
    }
}

fn write_floats(attribute: &mut Attribute, index: usize, item_size: usize, values: &[f32]) -> bool {
    let Some(data) = attribute.owned_data_mut() else {
        return false;
    };
    let start = index * item_size;
    if let ArrayData::F32(floats) = data.array_mut() {
        if let Some(slot) = floats.get_mut(start..start + item_size) {
            slot.copy_from_slice(values);
            return true;
        }
    }
    false
}

/// A renderable object in the scene.
///
/// One type covers plain and instanced meshes; capability queries
/// ([`is_instanced`](Self::is_instanced), [`is_wireframe`](Self::is_wireframe))
/// replace subtype checks.
#[derive(Debug)]
pub struct RenderObject {
    /// Unique identifier, stable for the object's lifetime.
    pub id: Uuid,

    /// Display name.
    pub name: String,

    /// Geometry drawn by this object.
    pub geometry: GeometryId,

    /// Surface description.
    pub material: Material,

    /// Whether this object is visible.
    pub visible: bool,

    position: Vec3,
    rotation: Vec3,
    scale: Vec3,
    world: Cell<Option<Mat4>>,
    instancing: Option<Instancing>,
}

impl RenderObject {
    /// Creates a visible object at the origin.
    pub fn new(name: impl Into<String>, geometry: GeometryId, material: Material) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            geometry,
            material,
            visible: true,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            world: Cell::new(None),
            instancing: None,
        }
    }

    /// Sets the position.
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.set_position(position);
        self
    }

    /// Sets the XYZ Euler rotation in radians.
    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.set_rotation(rotation);
        self
    }

    /// Sets the scale.
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.set_scale(scale);
        self
    }

    /// Sets the visibility.
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Makes this an instanced object.
    pub fn with_instancing(mut self, instancing: Instancing) -> Self {
        self.instancing = Some(instancing);
        self
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.world.set(None);
    }

    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.rotation = rotation;
        self.world.set(None);
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.world.set(None);
    }

    /// World transform, recomputed only after the transform changed.
    pub fn world_matrix(&self) -> Mat4 {
        if let Some(world) = self.world.get() {
            return world;
        }
        let rotation = Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z);
        let world = Mat4::from_scale_rotation_translation(self.scale, rotation, self.position);
        self.world.set(Some(world));
        world
    }

    pub fn is_instanced(&self) -> bool {
        self.instancing.is_some()
    }

    pub fn is_wireframe(&self) -> bool {
        self.material.wireframe
    }

    /// Number of instances drawn; 1 for plain objects.
    pub fn instance_count(&self) -> u32 {
        self.instancing.as_ref().map_or(1, Instancing::count)
    }

    pub fn instancing(&self) -> Option<&Instancing> {
        self.instancing.as_ref()
    }

    pub fn instancing_mut(&mut self) -> Option<&mut Instancing> {
        self.instancing.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn object() -> RenderObject {
        RenderObject::new("test", GeometryId::next(), Material::basic())
    }

    #[test]
    fn test_world_matrix_tracks_changes() {
        let mut object = object();
        assert_eq!(object.world_matrix(), Mat4::IDENTITY);

        object.set_position(Vec3::new(1.0, 2.0, 3.0));
        let world = object.world_matrix();
        assert_relative_eq!(world.w_axis.x, 1.0);
        assert_relative_eq!(world.w_axis.z, 3.0);

        object.set_scale(Vec3::splat(2.0));
        assert_relative_eq!(object.world_matrix().x_axis.x, 2.0);
    }

    #[test]
    fn test_rotation() {
        let object = object().with_rotation(Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0));
        let x = object.world_matrix().transform_vector3(Vec3::X);
        assert_relative_eq!(x.z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_instancing() {
        let transforms = [Mat4::IDENTITY, Mat4::from_translation(Vec3::X)];
        let mut object = object().with_instancing(Instancing::new(&transforms).with_colors(&[Vec3::X]));
        assert!(object.is_instanced());
        assert_eq!(object.instance_count(), 2);

        let instancing = object.instancing_mut().unwrap();
        let before = instancing.matrix().owned_data().unwrap().version();
        assert!(instancing.set_matrix_at(1, Mat4::IDENTITY));
        assert!(!instancing.set_matrix_at(2, Mat4::IDENTITY));
        assert!(instancing.matrix().owned_data().unwrap().version() > before);
        assert_eq!(instancing.color().and_then(Attribute::count), Some(2));
    }
}
