//! Steady-state frames must not repeat GPU work.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use approx::assert_relative_eq;
use common::*;
use glam::Vec3;
use trellis_core::{
    Material, Precision, ProgramKey, ProgramParameters, RawShaderProvider, RenderObject, Scene, ShaderCode,
    ShaderProvider, UniformValue, primitives,
};
use trellis_renderer::context::BufferTarget;
use trellis_renderer::{GlCall, HeadlessContext, Renderer, RendererConfig};

#[test]
fn test_second_frame_only_draws() {
    let mut renderer = renderer();
    let (scene, _, _) = tetrahedron_scene(Material::basic());

    renderer.render(&scene, &camera());
    assert_eq!(renderer.info().render.uniform_calls, 2);
    renderer.context().clear_calls();

    renderer.render(&scene, &camera());
    assert_eq!(
        renderer.context().calls(),
        vec![
            GlCall::Viewport {
                x: 0,
                y: 0,
                width: 800,
                height: 600,
            },
            draws(&renderer)[0].clone(),
        ]
    );
    assert_eq!(renderer.info().render.uniform_calls, 0);
}

#[test]
fn test_equal_keys_share_one_program() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let geometry = scene.add_geometry(primitives::tetrahedron(1.0, 0.0));
    let a = scene.add_object(RenderObject::new("a", geometry, Material::basic()));
    let b = scene.add_object(
        RenderObject::new("b", geometry, Material::basic()).with_position(Vec3::new(2.0, 0.0, 0.0)),
    );

    renderer.render(&scene, &camera());
    assert_eq!(renderer.program_of(a), renderer.program_of(b));
    assert_eq!(renderer.info().programs, 1);
    assert_eq!(link_calls(&renderer), 1);
    // one vertex array: same geometry, program and wireframe flag
    assert_eq!(renderer.binding_state_count(), 1);
    // projection is shared, the second model-view differs
    assert_eq!(renderer.info().render.uniform_calls, 3);

    renderer.render(&scene, &camera());
    assert_eq!(renderer.info().render.uniform_calls, 2);
}

#[test]
fn test_material_change_switches_program() {
    let mut renderer = renderer();
    let (mut scene, object, _) = tetrahedron_scene(Material::basic());
    renderer.render(&scene, &camera());
    let solid = renderer.program_of(object);

    scene.object_mut(object).unwrap().material.wireframe = true;
    renderer.render(&scene, &camera());
    assert_ne!(renderer.program_of(object), solid);
    assert_eq!(renderer.info().programs, 1);
    assert_eq!(renderer.context().live_programs(), 1);
    assert_eq!(renderer.binding_state_count(), 1);

    scene.object_mut(object).unwrap().material.wireframe = false;
    renderer.render(&scene, &camera());
    assert_eq!(link_calls(&renderer), 3);
}

#[test]
fn test_geometry_edit_reuploads_once() {
    let mut renderer = renderer();
    let (mut scene, _, geometry) = tetrahedron_scene(Material::basic());
    renderer.render(&scene, &camera());
    renderer.context().clear_calls();

    scene
        .geometry_mut(geometry)
        .and_then(|g| g.attribute_mut("color"))
        .and_then(|a| a.owned_data_mut())
        .unwrap()
        .mark_needs_update();
    renderer.render(&scene, &camera());
    assert_eq!(count(&renderer, |c| matches!(c, GlCall::BufferSubData { .. })), 1);
    // same attribute object, so the vertex layout is untouched
    assert_eq!(pointer_calls(&renderer), 0);
}

#[test]
fn test_replaced_attribute_rebuilds_layout() {
    let mut renderer = renderer();
    let (mut scene, _, geometry) = tetrahedron_scene(Material::basic());
    renderer.render(&scene, &camera());
    assert_eq!(renderer.buffer_count(), 3);

    let old = scene
        .geometry_mut(geometry)
        .unwrap()
        .set_attribute("color", trellis_core::Attribute::new(vec![0.5f32; 12], 3))
        .unwrap();
    renderer.context().clear_calls();
    renderer.render(&scene, &camera());
    assert_eq!(pointer_calls(&renderer), 2);
    assert_eq!(renderer.buffer_count(), 4);

    assert!(renderer.release_attribute(&old));
    assert_eq!(renderer.buffer_count(), 3);
    assert!(!renderer.release_attribute(&old));

    renderer.context().clear_calls();
    renderer.render(&scene, &camera());
    assert_eq!(pointer_calls(&renderer), 0);
}

#[test]
fn test_material_uniforms_are_deduplicated() {
    let vertex = "uniform mat4 uModelViewMatrix;\nuniform mat4 uProjectionMatrix;\nin vec3 position;\n\
                  void main() { gl_Position = uProjectionMatrix * uModelViewMatrix * vec4(position, 1.0); }\n";
    let fragment = "uniform vec3 uTint;\nout vec4 fragColor;\nvoid main() { fragColor = vec4(uTint, 1.0); }\n";
    let material = Material::new("tinted", vertex, fragment).with_uniform("uTint", Vec3::new(1.0, 0.5, 0.25));

    let mut renderer = renderer();
    let (mut scene, object, _) = tetrahedron_scene(material);
    renderer.render(&scene, &camera());
    assert_eq!(renderer.info().render.uniform_calls, 3);

    renderer.render(&scene, &camera());
    assert_eq!(renderer.info().render.uniform_calls, 0);

    scene
        .object_mut(object)
        .unwrap()
        .material
        .set_uniform("uTint", UniformValue::Vec3(Vec3::ONE));
    renderer.render(&scene, &camera());
    assert_eq!(renderer.info().render.uniform_calls, 1);

    let tint = renderer.get_uniform_value(object, "uTint").and_then(|c| c.as_f32()).unwrap();
    assert_eq!(tint, &[1.0, 1.0, 1.0][..]);
}

#[test]
fn test_uniform_value_accessor() {
    let mut renderer = renderer();
    let camera = camera();
    let (scene, object, _) = tetrahedron_scene(Material::basic());
    renderer.render(&scene, &camera);

    let projection = renderer
        .get_uniform_value(object, "uProjectionMatrix")
        .and_then(|c| c.as_f32())
        .unwrap();
    for (cached, expected) in projection.iter().zip(camera.projection_matrix().to_cols_array()) {
        assert_relative_eq!(*cached, expected);
    }
    assert!(renderer.get_uniform_value(object, "uMissing").is_none());
    assert!(renderer.get_uniform_value(uuid::Uuid::new_v4(), "uProjectionMatrix").is_none());
}

#[test]
fn test_precision_falls_back() {
    let gl = HeadlessContext::new().with_max_precision(Precision::Mediump);
    let mut renderer = Renderer::new(gl, RendererConfig::default());
    assert_eq!(renderer.capabilities().precision, Precision::Mediump);

    let (scene, _, _) = tetrahedron_scene(Material::basic());
    assert!(renderer.render(&scene, &camera()).is_ok());
}

#[test]
fn test_default_attribute_value() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    let mut geometry = primitives::tetrahedron(1.0, 0.0);
    geometry.remove_attribute("color");
    let id = scene.add_geometry(geometry);
    scene.add_object(RenderObject::new(
        "grey",
        id,
        Material::basic().with_default_attribute("color", vec![0.5, 0.5, 0.5]),
    ));

    assert!(renderer.render(&scene, &camera()).is_ok());
    assert_eq!(
        count(&renderer, |c| matches!(c, GlCall::VertexAttribDefault { value, .. } if value == &[0.5, 0.5, 0.5])),
        1
    );
    assert_eq!(pointer_calls(&renderer), 1);
}

#[test]
fn test_removed_attribute_disables_its_slot() {
    let mut renderer = renderer();
    let (mut scene, _, geometry) = tetrahedron_scene(Material::basic());
    renderer.render(&scene, &camera());
    let enabled: Vec<u32> = renderer
        .context()
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            GlCall::EnableVertexAttribArray(index) => Some(index),
            _ => None,
        })
        .collect();
    assert_eq!(enabled.len(), 2);
    assert_eq!(count(&renderer, |c| matches!(c, GlCall::DisableVertexAttribArray(_))), 0);

    scene.geometry_mut(geometry).unwrap().remove_attribute("color");
    renderer.context().clear_calls();
    renderer.render(&scene, &camera());

    let disabled: Vec<u32> = renderer
        .context()
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            GlCall::DisableVertexAttribArray(index) => Some(index),
            _ => None,
        })
        .collect();
    assert_eq!(disabled.len(), 1);
    assert!(enabled.contains(&disabled[0]));
    assert_eq!(pointer_calls(&renderer), 1);
}

fn last_element_buffer(renderer: &Renderer<HeadlessContext>) -> Option<u32> {
    renderer
        .context()
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            GlCall::BindBuffer {
                target: BufferTarget::ElementArray,
                buffer,
            } => buffer,
            _ => None,
        })
        .last()
}

#[test]
fn test_replaced_index_is_bound_again() {
    let mut renderer = renderer();
    let (mut scene, _, geometry) = tetrahedron_scene(Material::basic());
    renderer.render(&scene, &camera());
    let first = last_element_buffer(&renderer);
    assert!(first.is_some());

    let old = scene.geometry_mut(geometry).unwrap().set_index(vec![0, 1, 2]).unwrap();
    renderer.context().clear_calls();
    renderer.render(&scene, &camera());

    let second = last_element_buffer(&renderer);
    assert!(second.is_some());
    assert_ne!(first, second);
    // the vertex array is still current, only its layout is specified again
    assert_eq!(count(&renderer, |c| matches!(c, GlCall::BindVertexArray(_))), 0);
    assert_eq!(pointer_calls(&renderer), 2);
    assert_eq!(
        draws(&renderer),
        vec![GlCall::DrawElements {
            mode: trellis_core::DrawMode::Triangles,
            count: 3,
            index_type: trellis_core::DataType::UnsignedShort,
            offset: 0,
            instances: None,
        }]
    );
    assert!(renderer.release_attribute(&old));
}

/// Counts key computations of the wrapped provider.
struct CountingProvider {
    keys: Rc<Cell<usize>>,
}

impl ShaderProvider for CountingProvider {
    fn cache_key(&self, params: &ProgramParameters<'_>) -> ProgramKey {
        self.keys.set(self.keys.get() + 1);
        RawShaderProvider.cache_key(params)
    }

    fn build(&self, params: &ProgramParameters<'_>) -> ShaderCode {
        RawShaderProvider.build(params)
    }
}

#[test]
fn test_program_key_recomputed_only_on_material_change() {
    let keys = Rc::new(Cell::new(0));
    let mut renderer = Renderer::new(HeadlessContext::new(), RendererConfig::default())
        .with_shader_provider(CountingProvider { keys: keys.clone() });
    let (mut scene, object, _) = tetrahedron_scene(Material::basic());

    renderer.render(&scene, &camera());
    let after_first = keys.get();
    assert!(after_first > 0);

    renderer.render(&scene, &camera());
    renderer.render(&scene, &camera());
    assert_eq!(keys.get(), after_first);

    let before = renderer.program_of(object);
    scene.object_mut(object).unwrap().material.wireframe = true;
    renderer.render(&scene, &camera());
    assert!(keys.get() > after_first);
    assert_ne!(renderer.program_of(object), before);

    let after_change = keys.get();
    renderer.render(&scene, &camera());
    assert_eq!(keys.get(), after_change);
}
