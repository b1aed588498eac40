//! The frame loop tying every cache together.

use std::collections::HashMap;

use glam::Mat4;
use tracing::{debug, info, warn};
use trellis_core::{
    Attribute, BufferData, Camera, DrawMode, Geometry, ProgramInputs, ProgramKey, ProgramParameters, RawShaderProvider,
    RenderObject, Scene, ShaderProvider, UniformValue,
};
use uuid::Uuid;

use crate::cache::{
    AttributeCache, BindingStateCache, GeometryCache, ObjectCache, ProgramCache, ProgramId, UniformCacheData,
};
use crate::capabilities::Capabilities;
use crate::config::RendererConfig;
use crate::context::GpuContext;
use crate::error::{ObjectFailure, ProgramError, RenderError, RenderResult};
use crate::info::RenderInfo;
use crate::state::GlState;

/// Objects that could not be drawn in one frame.
#[derive(Debug, Default)]
pub struct FrameReport {
    pub failures: Vec<ObjectFailure>,
}

impl FrameReport {
    /// Whether every visible object was drawn.
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The program an object currently holds a use of, and the material
/// parameters its key was computed from.
#[derive(Debug, Clone)]
struct ObjectProperties {
    program: ProgramId,
    key: ProgramKey,
    inputs: ProgramInputs,
}

/// Draws [`Scene`]s through a [`GpuContext`], caching every GPU object it
/// creates.
pub struct Renderer<C: GpuContext> {
    state: GlState<C>,
    attributes: AttributeCache<C>,
    bindings: BindingStateCache<C>,
    programs: ProgramCache<C>,
    geometries: GeometryCache,
    objects: ObjectCache,
    info: RenderInfo,
    config: RendererConfig,
    capabilities: Capabilities,
    provider: Box<dyn ShaderProvider>,
    properties: HashMap<Uuid, ObjectProperties>,
    size: (u32, u32),
    frame: u64,
    disposed: bool,
}

impl<C: GpuContext> Renderer<C> {
    pub fn new(gl: C, config: RendererConfig) -> Self {
        let capabilities = Capabilities::query(&gl, config.precision);
        gl.clear_color(config.clear_color);
        gl.set_depth_test(config.depth_test);

        let bindings = BindingStateCache::new(&gl);
        info!(
            "Renderer created ({} attribute slots, {} precision)",
            capabilities.max_vertex_attribs, capabilities.precision
        );

        Self {
            state: GlState::new(gl),
            attributes: AttributeCache::new(),
            bindings,
            programs: ProgramCache::new().with_check_shader_errors(config.check_shader_errors),
            geometries: GeometryCache::new(),
            objects: ObjectCache::new(),
            info: RenderInfo::new(),
            config,
            capabilities,
            provider: Box::new(RawShaderProvider::new()),
            properties: HashMap::new(),
            size: (1, 1),
            frame: 0,
            disposed: false,
        }
    }

    /// Replaces the shader provider. Programs already built are kept.
    pub fn with_shader_provider(mut self, provider: impl ShaderProvider + 'static) -> Self {
        self.provider = Box::new(provider);
        self
    }

    /// Sets the drawing buffer size applied as the viewport of each frame.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width.max(1), height.max(1));
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Clears the color buffer, and the depth buffer when depth testing is on.
    pub fn clear(&self) {
        self.state.gl().clear(true, self.config.depth_test);
    }

    /// Draws every visible object of `scene` in insertion order.
    ///
    /// An object that fails is skipped and reported; the rest of the frame
    /// is still drawn.
    pub fn render(&mut self, scene: &Scene, camera: &Camera) -> FrameReport {
        let mut report = FrameReport::default();
        if self.disposed {
            warn!("render called on a disposed renderer");
            return report;
        }

        if self.config.auto_reset_info {
            self.info.reset();
        }
        self.frame += 1;

        let (width, height) = self.size;
        self.state.gl().viewport(0, 0, width as i32, height as i32);

        let view = camera.view_matrix();
        let projection = camera.projection_matrix();

        for object in scene.visible_objects() {
            if let Err(error) = self.render_object(scene, object, view, projection) {
                warn!("Skipped {} ({}): {}", object.name, object.id, error);
                report.failures.push(ObjectFailure {
                    object: object.id,
                    error,
                });
            }
        }

        self.info.programs = self.programs.count();
        report
    }

    fn render_object(&mut self, scene: &Scene, object: &RenderObject, view: Mat4, projection: Mat4) -> RenderResult<()> {
        let geometry = scene
            .geometry(object.geometry)
            .ok_or(RenderError::MissingGeometry(object.geometry))?;

        let program_id = self.program_for(object)?;
        let program = self
            .programs
            .get_mut(program_id)
            .ok_or_else(|| RenderError::Resource(format!("{} is not cached", program_id)))?;
        self.state.use_program(Some(program.handle()));

        let gl = self.state.gl();
        let uniforms = program.uniforms_mut();
        let model_view = UniformValue::Mat4(view * object.world_matrix());
        uniforms.set_value(gl, &mut self.info, &self.config.model_view_uniform, &model_view);
        uniforms.set_value(
            gl,
            &mut self.info,
            &self.config.projection_uniform,
            &UniformValue::Mat4(projection),
        );
        for (name, value) in &object.material.uniforms {
            uniforms.set_value(gl, &mut self.info, name, value);
        }

        self.objects.update(
            gl,
            &mut self.attributes,
            &mut self.geometries,
            &mut self.info,
            object,
            geometry,
            self.frame,
        )?;

        let wireframe = object.is_wireframe();
        let index: Option<&BufferData> = match geometry.index() {
            Some(_) if wireframe => Some(self.geometries.wireframe_index(gl, &mut self.attributes, geometry)),
            Some(index) => Some(index_data(geometry, index)?),
            None => None,
        };

        let count = match index {
            Some(index) if wireframe => (geometry.draw_count() * 2).min(index.array().len() as u32),
            _ => geometry.draw_count(),
        };
        let instances = object.instance_count();
        if count == 0 || instances == 0 {
            return Ok(());
        }

        let program = self
            .programs
            .get(program_id)
            .ok_or_else(|| RenderError::Resource(format!("{} is not cached", program_id)))?;
        self.bindings
            .setup(&mut self.state, &mut self.attributes, object, program, geometry, index)?;

        let mode = if wireframe { DrawMode::LineLoop } else { geometry.mode() };
        let instanced = object.is_instanced();
        let gl = self.state.gl();
        match index {
            None if instanced => gl.draw_arrays_instanced(mode, 0, count as i32, instances as i32),
            None => gl.draw_arrays(mode, 0, count as i32),
            Some(index) if instanced => {
                gl.draw_elements_instanced(mode, count as i32, index.data_type(), 0, instances as i32)
            }
            Some(index) => gl.draw_elements(mode, count as i32, index.data_type(), 0),
        }
        self.info.update(count, mode, instances);
        Ok(())
    }

    /// The program `object` should draw with. The key is only recomputed,
    /// and the program cache only consulted, when the object's program
    /// parameters changed; the previous program's use is then released.
    fn program_for(&mut self, object: &RenderObject) -> Result<ProgramId, ProgramError> {
        let params = ProgramParameters::new(&object.material, self.capabilities.precision).with_instancing(
            object.is_instanced(),
            object.instancing().is_some_and(|i| i.color().is_some()),
        );

        if let Some(properties) = self.properties.get(&object.id) {
            if properties.inputs.matches(&params) && self.programs.get(properties.program).is_some() {
                return Ok(properties.program);
            }
        }

        let key = self.provider.cache_key(&params);
        if let Some(properties) = self.properties.get_mut(&object.id) {
            if properties.key == key && self.programs.get(properties.program).is_some() {
                properties.inputs = ProgramInputs::from(&params);
                return Ok(properties.program);
            }
        }

        let program = self
            .programs
            .resolve(self.state.gl(), self.provider.as_ref(), &params, &mut self.info)?;
        let properties = ObjectProperties {
            program,
            key,
            inputs: ProgramInputs::from(&params),
        };
        if let Some(previous) = self.properties.insert(object.id, properties) {
            debug!("{} switched from {} to {}", object.name, previous.program, program);
            self.programs
                .release(&mut self.state, &mut self.bindings, &mut self.info, previous.program);
        }
        Ok(program)
    }

    /// The value last uploaded to uniform `name` of the program `object`
    /// draws with.
    pub fn get_uniform_value(&self, object: Uuid, name: &str) -> Option<&UniformCacheData> {
        let properties = self.properties.get(&object)?;
        self.programs.get(properties.program)?.uniforms().cached(name)
    }

    /// The program `object` currently holds.
    pub fn program_of(&self, object: Uuid) -> Option<ProgramId> {
        self.properties.get(&object).map(|p| p.program)
    }

    /// Deletes every GPU object created for the geometry. Returns `false` if
    /// the renderer had not seen it.
    pub fn dispose_geometry(&mut self, geometry: &Geometry) -> bool {
        self.objects.forget_geometry(geometry.id());
        self.geometries.dispose(
            &mut self.state,
            &mut self.attributes,
            &mut self.bindings,
            &mut self.info,
            geometry.id(),
        )
    }

    /// Releases the program use and instance buffers held for `object`.
    /// Returns `false` if the renderer held nothing for it.
    pub fn dispose_object(&mut self, object: &RenderObject) -> bool {
        self.objects
            .dispose_object(self.state.gl(), &mut self.attributes, object);
        let Some(properties) = self.properties.remove(&object.id) else {
            return false;
        };
        self.programs
            .release(&mut self.state, &mut self.bindings, &mut self.info, properties.program);
        self.info.programs = self.programs.count();
        true
    }

    /// Deletes the GPU buffer of an attribute removed from its geometry.
    pub fn release_attribute(&mut self, attribute: &Attribute) -> bool {
        self.attributes.remove(self.state.gl(), attribute.data_id())
    }

    /// Allows a program whose compile failed to be built again on its next
    /// use. Returns `false` if no failure was recorded for `key`.
    pub fn rebuild_program(&mut self, key: &ProgramKey) -> bool {
        self.programs.forget_failure(key)
    }

    /// The recorded compile failure for `key`.
    pub fn program_failure(&self, key: &ProgramKey) -> Option<&ProgramError> {
        self.programs.failure(key)
    }

    /// Unbinds the current vertex array, forcing layouts to be checked again.
    pub fn reset_bindings(&mut self) {
        self.bindings.reset(&mut self.state);
    }

    pub fn info(&self) -> &RenderInfo {
        &self.info
    }

    /// Starts a new statistics frame. Needed only when `auto_reset_info` is off.
    pub fn reset_info(&mut self) {
        self.info.reset();
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn context(&self) -> &C {
        self.state.gl()
    }

    /// Number of vertex array states held.
    pub fn binding_state_count(&self) -> usize {
        self.bindings.len()
    }

    /// Number of GPU buffers held.
    pub fn buffer_count(&self) -> usize {
        self.attributes.len()
    }

    /// Deletes every GPU object. Later calls do nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        self.bindings.dispose(&mut self.state);
        self.programs
            .dispose(&mut self.state, &mut self.bindings, &mut self.info);
        for geometry in self.geometries.ids() {
            self.objects.forget_geometry(geometry);
            self.geometries.dispose(
                &mut self.state,
                &mut self.attributes,
                &mut self.bindings,
                &mut self.info,
                geometry,
            );
        }
        self.attributes.dispose(self.state.gl());
        self.properties.clear();
        self.info.programs = 0;
        info!("Renderer disposed");
    }
}

impl<C: GpuContext> Drop for Renderer<C> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn index_data<'a>(geometry: &'a Geometry, index: &'a Attribute) -> RenderResult<&'a BufferData> {
    geometry
        .buffer_for(index)
        .ok_or(RenderError::MissingBufferData { attribute: index.id() })
}
