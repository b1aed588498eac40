//! The demo scene: a floor grid, axes, a tetrahedron and an instanced ring.

use glam::{Mat4, Vec3};
use trellis_core::primitives::{self, FloorConfig};
use trellis_core::{Instancing, Material, RenderObject, Scene};
use uuid::Uuid;

/// Number of tetrahedra in the instanced ring.
const RING_SIZE: usize = 8;
const RING_RADIUS: f32 = 3.0;

/// Handles to the objects the frame loop animates.
pub struct DemoScene {
    pub scene: Scene,
    pub tetrahedron: Uuid,
    pub ring: Uuid,
}

impl DemoScene {
    pub fn new() -> Self {
        let mut scene = Scene::new();

        let floor = scene.add_geometry(primitives::floor(&FloorConfig {
            dimension: 10.0,
            lines: 20,
            ..Default::default()
        }));
        scene.add_object(RenderObject::new("floor", floor, Material::basic()));

        let axes = scene.add_geometry(primitives::axes(1.5));
        scene.add_object(RenderObject::new("axes", axes, Material::basic()));

        let shape = scene.add_geometry(primitives::tetrahedron(1.0, 0.0));
        let tetrahedron = scene.add_object(
            RenderObject::new("tetrahedron", shape, Material::basic()).with_position(Vec3::new(0.0, 0.5, 0.0)),
        );

        let (transforms, colors): (Vec<Mat4>, Vec<Vec3>) = (0..RING_SIZE)
            .map(|i| {
                let angle = i as f32 / RING_SIZE as f32 * std::f32::consts::TAU;
                let position = Vec3::new(angle.cos() * RING_RADIUS, 0.0, angle.sin() * RING_RADIUS);
                let transform = Mat4::from_scale_rotation_translation(
                    Vec3::splat(0.4),
                    glam::Quat::from_rotation_y(angle),
                    position,
                );
                let color = Vec3::new(0.5 + 0.5 * angle.cos(), 0.5 + 0.5 * angle.sin(), 1.0);
                (transform, color)
            })
            .unzip();
        let ring = scene.add_object(
            RenderObject::new("ring", shape, Material::basic())
                .with_instancing(Instancing::new(&transforms).with_colors(&colors)),
        );

        Self {
            scene,
            tetrahedron,
            ring,
        }
    }

    /// Spins the tetrahedron and slowly turns the ring.
    pub fn animate(&mut self, frame: u64) {
        let t = frame as f32 / 60.0;
        if let Some(object) = self.scene.object_mut(self.tetrahedron) {
            object.set_rotation(Vec3::new(0.0, t * 1.5, 0.0));
        }
        if let Some(object) = self.scene.object_mut(self.ring) {
            object.set_rotation(Vec3::new(0.0, -t * 0.25, 0.0));
        }
    }

    /// Flips the tetrahedron between solid and wireframe.
    pub fn toggle_wireframe(&mut self) -> bool {
        match self.scene.object_mut(self.tetrahedron) {
            Some(object) => {
                object.material.wireframe = !object.material.wireframe;
                object.material.wireframe
            }
            None => false,
        }
    }
}

impl Default for DemoScene {
    fn default() -> Self {
        Self::new()
    }
}
