//! Shared fixtures for renderer integration tests.

#![allow(dead_code)]

use trellis_core::{Camera, GeometryId, Material, RenderObject, Scene, primitives};
use trellis_renderer::{GlCall, HeadlessContext, Renderer, RendererConfig};
use uuid::Uuid;

pub fn renderer() -> Renderer<HeadlessContext> {
    let mut renderer = Renderer::new(HeadlessContext::new(), RendererConfig::default());
    renderer.set_size(800, 600);
    renderer
}

pub fn camera() -> Camera {
    Camera::new(4.0 / 3.0)
}

/// A scene holding one tetrahedron drawn with `material`.
pub fn tetrahedron_scene(material: Material) -> (Scene, Uuid, GeometryId) {
    let mut scene = Scene::new();
    let geometry = scene.add_geometry(primitives::tetrahedron(1.0, 0.0));
    let object = scene.add_object(RenderObject::new("tetrahedron", geometry, material));
    (scene, object, geometry)
}

/// Draw calls recorded since the last clear.
pub fn draws(renderer: &Renderer<HeadlessContext>) -> Vec<GlCall> {
    renderer.context().calls().into_iter().filter(GlCall::is_draw).collect()
}

pub fn count(renderer: &Renderer<HeadlessContext>, predicate: impl Fn(&GlCall) -> bool) -> usize {
    renderer.context().count_calls(predicate)
}

pub fn pointer_calls(renderer: &Renderer<HeadlessContext>) -> usize {
    count(renderer, |c| matches!(c, GlCall::VertexAttribPointer { .. }))
}

pub fn link_calls(renderer: &Renderer<HeadlessContext>) -> usize {
    count(renderer, |c| matches!(c, GlCall::LinkProgram(_)))
}
