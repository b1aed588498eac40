//! Recording context for tests and headless runs.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use trellis_core::{BufferUsage, DataType, DrawMode, Precision};

use super::glsl::{self, ShaderInterface};
use super::{
    ActiveAttribute, ActiveUniform, BufferTarget, GpuContext, ShaderStage, UniformData,
};

/// Owned copy of an uploaded uniform value.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedUniform {
    Float { components: u8, data: Vec<f32> },
    Matrix { dim: u8, data: Vec<f32> },
    Int { components: u8, data: Vec<i32> },
    UInt { components: u8, data: Vec<u32> },
}

impl From<UniformData<'_>> for RecordedUniform {
    fn from(data: UniformData<'_>) -> Self {
        match data {
            UniformData::Float { components, data } => RecordedUniform::Float {
                components,
                data: data.to_vec(),
            },
            UniformData::Matrix { dim, data } => RecordedUniform::Matrix { dim, data: data.to_vec() },
            UniformData::Int { components, data } => RecordedUniform::Int {
                components,
                data: data.to_vec(),
            },
            UniformData::UInt { components, data } => RecordedUniform::UInt {
                components,
                data: data.to_vec(),
            },
        }
    }
}

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    CreateBuffer(u32),
    DeleteBuffer(u32),
    BindBuffer {
        target: BufferTarget,
        buffer: Option<u32>,
    },
    BufferData {
        target: BufferTarget,
        bytes: usize,
        usage: BufferUsage,
    },
    BufferSubData {
        target: BufferTarget,
        offset: usize,
        bytes: usize,
    },
    CreateVertexArray(u32),
    DeleteVertexArray(u32),
    BindVertexArray(Option<u32>),
    EnableVertexAttribArray(u32),
    DisableVertexAttribArray(u32),
    VertexAttribPointer {
        index: u32,
        size: i32,
        data_type: DataType,
        normalized: bool,
        stride: i32,
        offset: i32,
        integer: bool,
    },
    VertexAttribDivisor {
        index: u32,
        divisor: u32,
    },
    VertexAttribDefault {
        index: u32,
        value: Vec<f32>,
    },
    CreateShader {
        stage: ShaderStage,
        shader: u32,
    },
    CompileShader(u32),
    DeleteShader(u32),
    CreateProgram(u32),
    AttachShader {
        program: u32,
        shader: u32,
    },
    DetachShader {
        program: u32,
        shader: u32,
    },
    BindAttribLocation {
        program: u32,
        index: u32,
        name: String,
    },
    LinkProgram(u32),
    DeleteProgram(u32),
    UseProgram(Option<u32>),
    Uniform {
        name: String,
        value: RecordedUniform,
    },
    DrawArrays {
        mode: DrawMode,
        first: i32,
        count: i32,
        instances: Option<i32>,
    },
    DrawElements {
        mode: DrawMode,
        count: i32,
        index_type: DataType,
        offset: i32,
        instances: Option<i32>,
    },
    Viewport {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    ClearColor([f32; 4]),
    Clear {
        color: bool,
        depth: bool,
    },
    DepthTest(bool),
}

impl GlCall {
    pub fn is_draw(&self) -> bool {
        matches!(self, GlCall::DrawArrays { .. } | GlCall::DrawElements { .. })
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self, GlCall::Uniform { .. })
    }
}

#[derive(Debug)]
struct ShaderObject {
    stage: ShaderStage,
    source: String,
    compiled: Option<Result<ShaderInterface, String>>,
}

#[derive(Debug, Default)]
struct ProgramObject {
    shaders: Vec<u32>,
    bindings: HashMap<String, u32>,
    linked: bool,
    log: String,
    uniforms: Vec<ActiveUniform>,
    attributes: Vec<(ActiveAttribute, u32)>,
    locations: HashMap<String, u32>,
}

/// A [`GpuContext`] that performs no rendering.
///
/// Hands out integer handles, emulates shader compilation and program
/// linking by scanning declarations, and records every call for inspection.
#[derive(Debug)]
pub struct HeadlessContext {
    calls: RefCell<Vec<GlCall>>,
    next_handle: Cell<u32>,
    buffers: RefCell<HashSet<u32>>,
    vertex_arrays: RefCell<HashSet<u32>>,
    shaders: RefCell<HashMap<u32, ShaderObject>>,
    programs: RefCell<HashMap<u32, ProgramObject>>,
    uniform_names: RefCell<HashMap<u32, String>>,
    max_vertex_attribs: u32,
    max_precision: Precision,
    fail_allocations: Cell<bool>,
}

impl HeadlessContext {
    /// Creates a context with 16 attribute slots and highp support.
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            next_handle: Cell::new(1),
            buffers: RefCell::new(HashSet::new()),
            vertex_arrays: RefCell::new(HashSet::new()),
            shaders: RefCell::new(HashMap::new()),
            programs: RefCell::new(HashMap::new()),
            uniform_names: RefCell::new(HashMap::new()),
            max_vertex_attribs: 16,
            max_precision: Precision::Highp,
            fail_allocations: Cell::new(false),
        }
    }

    /// Sets the number of vertex attribute slots.
    pub fn with_max_vertex_attribs(mut self, count: u32) -> Self {
        self.max_vertex_attribs = count;
        self
    }

    /// Sets the highest supported float precision.
    pub fn with_max_precision(mut self, precision: Precision) -> Self {
        self.max_precision = precision;
        self
    }

    /// Makes every subsequent object creation fail.
    pub fn set_fail_allocations(&self, fail: bool) {
        self.fail_allocations.set(fail);
    }

    /// All calls recorded so far.
    pub fn calls(&self) -> Vec<GlCall> {
        self.calls.borrow().clone()
    }

    /// Returns and forgets the recorded calls.
    pub fn take_calls(&self) -> Vec<GlCall> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&GlCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| predicate(c)).count()
    }

    /// Buffers created and not yet deleted.
    pub fn live_buffers(&self) -> usize {
        self.buffers.borrow().len()
    }

    /// Vertex arrays created and not yet deleted.
    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.borrow().len()
    }

    /// Programs created and not yet deleted.
    pub fn live_programs(&self) -> usize {
        self.programs.borrow().len()
    }

    fn record(&self, call: GlCall) {
        self.calls.borrow_mut().push(call);
    }

    fn allocate(&self) -> Result<u32, String> {
        if self.fail_allocations.get() {
            return Err("out of memory".to_string());
        }
        let handle = self.next_handle.get();
        self.next_handle.set(handle + 1);
        Ok(handle)
    }

    fn link(&self, program: &mut ProgramObject) -> Result<(), String> {
        let shaders = self.shaders.borrow();
        let mut vertex = None;
        let mut fragment = None;
        for handle in &program.shaders {
            let shader = shaders
                .get(handle)
                .ok_or_else(|| format!("ERROR: shader {handle} was deleted"))?;
            let interface = match &shader.compiled {
                Some(Ok(interface)) => interface,
                _ => return Err(format!("ERROR: {} shader not compiled", shader.stage.name())),
            };
            match shader.stage {
                ShaderStage::Vertex => vertex = Some(interface),
                ShaderStage::Fragment => fragment = Some(interface),
            }
        }
        let (Some(vertex), Some(fragment)) = (vertex, fragment) else {
            return Err("ERROR: program needs a vertex and a fragment shader".to_string());
        };

        let mut uniforms: Vec<ActiveUniform> = Vec::new();
        for uniform in vertex.uniforms.iter().chain(&fragment.uniforms) {
            match uniforms.iter().find(|u| u.name == uniform.name) {
                Some(existing) if existing != uniform => {
                    return Err(format!("ERROR: uniform '{}' differs between stages", uniform.name));
                }
                Some(_) => {}
                None => uniforms.push(uniform.clone()),
            }
        }

        let mut used = vec![false; self.max_vertex_attribs as usize];
        let mut attributes = Vec::with_capacity(vertex.attributes.len());
        let (bound, free): (Vec<_>, Vec<_>) = vertex
            .attributes
            .iter()
            .partition(|a| program.bindings.contains_key(&a.name));
        for attribute in bound.into_iter().chain(free) {
            let span = attribute.atype.location_size() as usize;
            let location = match program.bindings.get(&attribute.name) {
                Some(&location) => location as usize,
                None => (0..used.len())
                    .find(|&start| start + span <= used.len() && used[start..start + span].iter().all(|u| !u))
                    .ok_or_else(|| format!("ERROR: too many attributes, '{}' has no slot", attribute.name))?,
            };
            let slots = used
                .get_mut(location..location + span)
                .ok_or_else(|| format!("ERROR: attribute '{}' exceeds slot limit", attribute.name))?;
            slots.iter_mut().for_each(|u| *u = true);
            attributes.push((attribute.clone(), location as u32));
        }

        let mut locations = HashMap::new();
        let mut names = self.uniform_names.borrow_mut();
        for uniform in &uniforms {
            let handle = self.allocate()?;
            names.insert(handle, uniform.name.clone());
            locations.insert(uniform.name.clone(), handle);
            if let Some(base) = uniform.name.strip_suffix("[0]") {
                locations.insert(base.to_string(), handle);
            }
        }

        program.uniforms = uniforms;
        program.attributes = attributes;
        program.locations = locations;
        Ok(())
    }
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuContext for HeadlessContext {
    type Buffer = u32;
    type VertexArray = u32;
    type Program = u32;
    type Shader = u32;
    type UniformLocation = u32;

    fn create_buffer(&self) -> Result<u32, String> {
        let handle = self.allocate()?;
        self.buffers.borrow_mut().insert(handle);
        self.record(GlCall::CreateBuffer(handle));
        Ok(handle)
    }

    fn delete_buffer(&self, buffer: u32) {
        self.buffers.borrow_mut().remove(&buffer);
        self.record(GlCall::DeleteBuffer(buffer));
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<u32>) {
        self.record(GlCall::BindBuffer { target, buffer });
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        self.record(GlCall::BufferData {
            target,
            bytes: data.len(),
            usage,
        });
    }

    fn buffer_sub_data(&self, target: BufferTarget, offset: usize, data: &[u8]) {
        self.record(GlCall::BufferSubData {
            target,
            offset,
            bytes: data.len(),
        });
    }

    fn create_vertex_array(&self) -> Result<u32, String> {
        let handle = self.allocate()?;
        self.vertex_arrays.borrow_mut().insert(handle);
        self.record(GlCall::CreateVertexArray(handle));
        Ok(handle)
    }

    fn delete_vertex_array(&self, vertex_array: u32) {
        self.vertex_arrays.borrow_mut().remove(&vertex_array);
        self.record(GlCall::DeleteVertexArray(vertex_array));
    }

    fn bind_vertex_array(&self, vertex_array: Option<u32>) {
        self.record(GlCall::BindVertexArray(vertex_array));
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        self.record(GlCall::EnableVertexAttribArray(index));
    }

    fn disable_vertex_attrib_array(&self, index: u32) {
        self.record(GlCall::DisableVertexAttribArray(index));
    }

    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: DataType,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        self.record(GlCall::VertexAttribPointer {
            index,
            size,
            data_type,
            normalized,
            stride,
            offset,
            integer: false,
        });
    }

    fn vertex_attrib_pointer_i32(&self, index: u32, size: i32, data_type: DataType, stride: i32, offset: i32) {
        self.record(GlCall::VertexAttribPointer {
            index,
            size,
            data_type,
            normalized: false,
            stride,
            offset,
            integer: true,
        });
    }

    fn vertex_attrib_divisor(&self, index: u32, divisor: u32) {
        self.record(GlCall::VertexAttribDivisor { index, divisor });
    }

    fn vertex_attrib_default(&self, index: u32, value: &[f32]) {
        self.record(GlCall::VertexAttribDefault {
            index,
            value: value.to_vec(),
        });
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<u32, String> {
        let shader = self.allocate()?;
        self.shaders.borrow_mut().insert(
            shader,
            ShaderObject {
                stage,
                source: String::new(),
                compiled: None,
            },
        );
        self.record(GlCall::CreateShader { stage, shader });
        Ok(shader)
    }

    fn shader_source(&self, shader: u32, source: &str) {
        if let Some(object) = self.shaders.borrow_mut().get_mut(&shader) {
            object.source = source.to_string();
        }
    }

    fn compile_shader(&self, shader: u32) {
        if let Some(object) = self.shaders.borrow_mut().get_mut(&shader) {
            object.compiled = Some(glsl::analyze(&object.source, object.stage));
        }
        self.record(GlCall::CompileShader(shader));
    }

    fn shader_compile_status(&self, shader: u32) -> bool {
        self.shaders
            .borrow()
            .get(&shader)
            .is_some_and(|s| matches!(s.compiled, Some(Ok(_))))
    }

    fn shader_info_log(&self, shader: u32) -> String {
        match self.shaders.borrow().get(&shader).and_then(|s| s.compiled.as_ref()) {
            Some(Err(log)) => log.clone(),
            _ => String::new(),
        }
    }

    fn delete_shader(&self, shader: u32) {
        self.shaders.borrow_mut().remove(&shader);
        self.record(GlCall::DeleteShader(shader));
    }

    fn create_program(&self) -> Result<u32, String> {
        let program = self.allocate()?;
        self.programs.borrow_mut().insert(program, ProgramObject::default());
        self.record(GlCall::CreateProgram(program));
        Ok(program)
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        if let Some(object) = self.programs.borrow_mut().get_mut(&program) {
            object.shaders.push(shader);
        }
        self.record(GlCall::AttachShader { program, shader });
    }

    fn detach_shader(&self, program: u32, shader: u32) {
        if let Some(object) = self.programs.borrow_mut().get_mut(&program) {
            object.shaders.retain(|&s| s != shader);
        }
        self.record(GlCall::DetachShader { program, shader });
    }

    fn bind_attrib_location(&self, program: u32, index: u32, name: &str) {
        if let Some(object) = self.programs.borrow_mut().get_mut(&program) {
            object.bindings.insert(name.to_string(), index);
        }
        self.record(GlCall::BindAttribLocation {
            program,
            index,
            name: name.to_string(),
        });
    }

    fn link_program(&self, program: u32) {
        let mut programs = self.programs.borrow_mut();
        if let Some(object) = programs.get_mut(&program) {
            match self.link(object) {
                Ok(()) => {
                    object.linked = true;
                    object.log.clear();
                }
                Err(log) => {
                    object.linked = false;
                    object.log = log;
                }
            }
        }
        drop(programs);
        self.record(GlCall::LinkProgram(program));
    }

    fn program_link_status(&self, program: u32) -> bool {
        self.programs.borrow().get(&program).is_some_and(|p| p.linked)
    }

    fn program_info_log(&self, program: u32) -> String {
        self.programs
            .borrow()
            .get(&program)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&self, program: u32) {
        self.programs.borrow_mut().remove(&program);
        self.record(GlCall::DeleteProgram(program));
    }

    fn use_program(&self, program: Option<u32>) {
        self.record(GlCall::UseProgram(program));
    }

    fn active_uniforms(&self, program: u32) -> Vec<ActiveUniform> {
        self.programs
            .borrow()
            .get(&program)
            .filter(|p| p.linked)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default()
    }

    fn uniform_location(&self, program: u32, name: &str) -> Option<u32> {
        self.programs.borrow().get(&program)?.locations.get(name).copied()
    }

    fn active_attributes(&self, program: u32) -> Vec<ActiveAttribute> {
        self.programs
            .borrow()
            .get(&program)
            .filter(|p| p.linked)
            .map(|p| p.attributes.iter().map(|(a, _)| a.clone()).collect())
            .unwrap_or_default()
    }

    fn attrib_location(&self, program: u32, name: &str) -> Option<u32> {
        self.programs
            .borrow()
            .get(&program)?
            .attributes
            .iter()
            .find(|(a, _)| a.name == name)
            .map(|(_, location)| *location)
    }

    fn upload_uniform(&self, location: &u32, data: UniformData<'_>) {
        let name = self
            .uniform_names
            .borrow()
            .get(location)
            .cloned()
            .unwrap_or_default();
        self.record(GlCall::Uniform {
            name,
            value: data.into(),
        });
    }

    fn draw_arrays(&self, mode: DrawMode, first: i32, count: i32) {
        self.record(GlCall::DrawArrays {
            mode,
            first,
            count,
            instances: None,
        });
    }

    fn draw_elements(&self, mode: DrawMode, count: i32, index_type: DataType, offset: i32) {
        self.record(GlCall::DrawElements {
            mode,
            count,
            index_type,
            offset,
            instances: None,
        });
    }

    fn draw_arrays_instanced(&self, mode: DrawMode, first: i32, count: i32, instances: i32) {
        self.record(GlCall::DrawArrays {
            mode,
            first,
            count,
            instances: Some(instances),
        });
    }

    fn draw_elements_instanced(
        &self,
        mode: DrawMode,
        count: i32,
        index_type: DataType,
        offset: i32,
        instances: i32,
    ) {
        self.record(GlCall::DrawElements {
            mode,
            count,
            index_type,
            offset,
            instances: Some(instances),
        });
    }

    fn max_vertex_attribs(&self) -> u32 {
        self.max_vertex_attribs
    }

    fn supports_precision(&self, _stage: ShaderStage, precision: Precision) -> bool {
        let rank = |p: Precision| match p {
            Precision::Lowp => 0,
            Precision::Mediump => 1,
            Precision::Highp => 2,
        };
        rank(precision) <= rank(self.max_precision)
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record(GlCall::Viewport { x, y, width, height });
    }

    fn clear_color(&self, color: [f32; 4]) {
        self.record(GlCall::ClearColor(color));
    }

    fn clear(&self, color: bool, depth: bool) {
        self.record(GlCall::Clear { color, depth });
    }

    fn set_depth_test(&self, enabled: bool) {
        self.record(GlCall::DepthTest(enabled));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(gl: &HeadlessContext, vertex: &str, fragment: &str) -> u32 {
        let program = gl.create_program().unwrap();
        for (stage, source) in [(ShaderStage::Vertex, vertex), (ShaderStage::Fragment, fragment)] {
            let shader = gl.create_shader(stage).unwrap();
            gl.shader_source(shader, source);
            gl.compile_shader(shader);
            gl.attach_shader(program, shader);
        }
        gl.link_program(program);
        program
    }

    #[test]
    fn test_link_collects_interface() {
        let gl = HeadlessContext::new();
        let program = build(
            &gl,
            "uniform mat4 uMatrix;\nin vec3 position;\nin mat4 instanceMatrix;\nin vec3 color;\n",
            "uniform mat4 uMatrix;\nuniform vec3 uTint;\n",
        );
        assert!(gl.program_link_status(program));
        assert_eq!(gl.active_uniforms(program).len(), 2);
        assert_eq!(gl.attrib_location(program, "position"), Some(0));
        assert_eq!(gl.attrib_location(program, "instanceMatrix"), Some(1));
        assert_eq!(gl.attrib_location(program, "color"), Some(5));
        assert!(gl.uniform_location(program, "uTint").is_some());
    }

    #[test]
    fn test_bound_location_is_honored() {
        let gl = HeadlessContext::new();
        let program = gl.create_program().unwrap();
        let vertex = gl.create_shader(ShaderStage::Vertex).unwrap();
        gl.shader_source(vertex, "in vec3 color;\nin vec3 position;\n");
        gl.compile_shader(vertex);
        let fragment = gl.create_shader(ShaderStage::Fragment).unwrap();
        gl.compile_shader(fragment);
        gl.attach_shader(program, vertex);
        gl.attach_shader(program, fragment);
        gl.bind_attrib_location(program, 0, "position");
        gl.link_program(program);

        assert_eq!(gl.attrib_location(program, "position"), Some(0));
        assert_eq!(gl.attrib_location(program, "color"), Some(1));
    }

    #[test]
    fn test_compile_failure_blocks_link() {
        let gl = HeadlessContext::new();
        let program = build(&gl, "#error nope\n", "");
        assert!(!gl.program_link_status(program));
        assert!(!gl.program_info_log(program).is_empty());
        assert!(gl.active_uniforms(program).is_empty());
    }

    #[test]
    fn test_array_uniform_alias() {
        let gl = HeadlessContext::new();
        let program = build(&gl, "uniform float weights[3];\n", "");
        assert_eq!(
            gl.uniform_location(program, "weights"),
            gl.uniform_location(program, "weights[0]")
        );
    }

    #[test]
    fn test_too_many_attributes() {
        let gl = HeadlessContext::new().with_max_vertex_attribs(4);
        let program = build(&gl, "in mat4 a;\nin vec3 b;\n", "");
        assert!(!gl.program_link_status(program));
    }

    #[test]
    fn test_live_object_tracking() {
        let gl = HeadlessContext::new();
        let buffer = gl.create_buffer().unwrap();
        let vao = gl.create_vertex_array().unwrap();
        assert_eq!(gl.live_buffers(), 1);
        gl.delete_buffer(buffer);
        gl.delete_vertex_array(vao);
        assert_eq!(gl.live_buffers(), 0);
        assert_eq!(gl.live_vertex_arrays(), 0);

        gl.set_fail_allocations(true);
        assert!(gl.create_buffer().is_err());
    }

    #[test]
    fn test_precision_support() {
        let gl = HeadlessContext::new().with_max_precision(Precision::Mediump);
        assert!(!gl.supports_precision(ShaderStage::Vertex, Precision::Highp));
        assert!(gl.supports_precision(ShaderStage::Fragment, Precision::Lowp));
    }
}
