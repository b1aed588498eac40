//! [`GpuContext`] for `glow::Context` (OpenGL 3.3+, OpenGL ES 3.0, WebGL2).

use glow::HasContext;
use trellis_core::{BufferUsage, DataType, DrawMode, Precision};

use super::{ActiveAttribute, ActiveUniform, BufferTarget, GpuContext, ShaderStage, UniformData, UniformType};

fn target(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Array => glow::ARRAY_BUFFER,
        BufferTarget::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
    }
}

fn usage(usage: BufferUsage) -> u32 {
    match usage {
        BufferUsage::Static => glow::STATIC_DRAW,
        BufferUsage::Dynamic => glow::DYNAMIC_DRAW,
        BufferUsage::Stream => glow::STREAM_DRAW,
    }
}

fn data_type(data_type: DataType) -> u32 {
    match data_type {
        DataType::Byte => glow::BYTE,
        DataType::UnsignedByte => glow::UNSIGNED_BYTE,
        DataType::Short => glow::SHORT,
        DataType::UnsignedShort => glow::UNSIGNED_SHORT,
        DataType::Int => glow::INT,
        DataType::UnsignedInt => glow::UNSIGNED_INT,
        DataType::Float => glow::FLOAT,
    }
}

fn mode(mode: DrawMode) -> u32 {
    match mode {
        DrawMode::Points => glow::POINTS,
        DrawMode::Lines => glow::LINES,
        DrawMode::LineLoop => glow::LINE_LOOP,
        DrawMode::LineStrip => glow::LINE_STRIP,
        DrawMode::Triangles => glow::TRIANGLES,
        DrawMode::TriangleStrip => glow::TRIANGLE_STRIP,
        DrawMode::TriangleFan => glow::TRIANGLE_FAN,
    }
}

fn stage(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
    }
}

fn uniform_type(gl_type: u32) -> UniformType {
    match gl_type {
        glow::FLOAT => UniformType::Float,
        glow::FLOAT_VEC2 => UniformType::Vec2,
        glow::FLOAT_VEC3 => UniformType::Vec3,
        glow::FLOAT_VEC4 => UniformType::Vec4,
        glow::INT => UniformType::Int,
        glow::INT_VEC2 => UniformType::IVec2,
        glow::INT_VEC3 => UniformType::IVec3,
        glow::INT_VEC4 => UniformType::IVec4,
        glow::UNSIGNED_INT => UniformType::UInt,
        glow::UNSIGNED_INT_VEC2 => UniformType::UVec2,
        glow::UNSIGNED_INT_VEC3 => UniformType::UVec3,
        glow::UNSIGNED_INT_VEC4 => UniformType::UVec4,
        glow::BOOL => UniformType::Bool,
        glow::FLOAT_MAT2 => UniformType::Mat2,
        glow::FLOAT_MAT3 => UniformType::Mat3,
        glow::FLOAT_MAT4 => UniformType::Mat4,
        glow::SAMPLER_2D
        | glow::SAMPLER_3D
        | glow::SAMPLER_CUBE
        | glow::SAMPLER_2D_ARRAY
        | glow::SAMPLER_2D_SHADOW
        | glow::INT_SAMPLER_2D
        | glow::UNSIGNED_INT_SAMPLER_2D => UniformType::Sampler,
        other => UniformType::Other(other),
    }
}

// SAFETY (all methods below): the caller owns a current GL context for
// `self`, and every handle passed in was created by this context.
impl GpuContext for glow::Context {
    type Buffer = <glow::Context as HasContext>::Buffer;
    type VertexArray = <glow::Context as HasContext>::VertexArray;
    type Program = <glow::Context as HasContext>::Program;
    type Shader = <glow::Context as HasContext>::Shader;
    type UniformLocation = <glow::Context as HasContext>::UniformLocation;

    fn create_buffer(&self) -> Result<Self::Buffer, String> {
        unsafe { HasContext::create_buffer(self) }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        unsafe { HasContext::delete_buffer(self, buffer) }
    }

    fn bind_buffer(&self, buffer_target: BufferTarget, buffer: Option<Self::Buffer>) {
        unsafe { HasContext::bind_buffer(self, target(buffer_target), buffer) }
    }

    fn buffer_data(&self, buffer_target: BufferTarget, data: &[u8], buffer_usage: BufferUsage) {
        unsafe { self.buffer_data_u8_slice(target(buffer_target), data, usage(buffer_usage)) }
    }

    fn buffer_sub_data(&self, buffer_target: BufferTarget, offset: usize, data: &[u8]) {
        unsafe { self.buffer_sub_data_u8_slice(target(buffer_target), offset as i32, data) }
    }

    fn create_vertex_array(&self) -> Result<Self::VertexArray, String> {
        unsafe { HasContext::create_vertex_array(self) }
    }

    fn delete_vertex_array(&self, vertex_array: Self::VertexArray) {
        unsafe { HasContext::delete_vertex_array(self, vertex_array) }
    }

    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>) {
        unsafe { HasContext::bind_vertex_array(self, vertex_array) }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        unsafe { HasContext::enable_vertex_attrib_array(self, index) }
    }

    fn disable_vertex_attrib_array(&self, index: u32) {
        unsafe { HasContext::disable_vertex_attrib_array(self, index) }
    }

    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        element_type: DataType,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        unsafe {
            HasContext::vertex_attrib_pointer_f32(
                self,
                index,
                size,
                data_type(element_type),
                normalized,
                stride,
                offset,
            )
        }
    }

    fn vertex_attrib_pointer_i32(&self, index: u32, size: i32, element_type: DataType, stride: i32, offset: i32) {
        unsafe { HasContext::vertex_attrib_pointer_i32(self, index, size, data_type(element_type), stride, offset) }
    }

    fn vertex_attrib_divisor(&self, index: u32, divisor: u32) {
        unsafe { HasContext::vertex_attrib_divisor(self, index, divisor) }
    }

    fn vertex_attrib_default(&self, index: u32, value: &[f32]) {
        unsafe {
            match *value {
                [x, y] => self.vertex_attrib_2_f32(index, x, y),
                [x, y, z] => self.vertex_attrib_3_f32(index, x, y, z),
                [x, y, z, w, ..] => self.vertex_attrib_4_f32(index, x, y, z, w),
                [x] => self.vertex_attrib_1_f32(index, x),
                [] => {}
            }
        }
    }

    fn create_shader(&self, shader_stage: ShaderStage) -> Result<Self::Shader, String> {
        unsafe { HasContext::create_shader(self, stage(shader_stage)) }
    }

    fn shader_source(&self, shader: Self::Shader, source: &str) {
        unsafe { HasContext::shader_source(self, shader, source) }
    }

    fn compile_shader(&self, shader: Self::Shader) {
        unsafe { HasContext::compile_shader(self, shader) }
    }

    fn shader_compile_status(&self, shader: Self::Shader) -> bool {
        unsafe { self.get_shader_compile_status(shader) }
    }

    fn shader_info_log(&self, shader: Self::Shader) -> String {
        unsafe { self.get_shader_info_log(shader) }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe { HasContext::delete_shader(self, shader) }
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        unsafe { HasContext::create_program(self) }
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { HasContext::attach_shader(self, program, shader) }
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { HasContext::detach_shader(self, program, shader) }
    }

    fn bind_attrib_location(&self, program: Self::Program, index: u32, name: &str) {
        unsafe { HasContext::bind_attrib_location(self, program, index, name) }
    }

    fn link_program(&self, program: Self::Program) {
        unsafe { HasContext::link_program(self, program) }
    }

    fn program_link_status(&self, program: Self::Program) -> bool {
        unsafe { self.get_program_link_status(program) }
    }

    fn program_info_log(&self, program: Self::Program) -> String {
        unsafe { self.get_program_info_log(program) }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe { HasContext::delete_program(self, program) }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        unsafe { HasContext::use_program(self, program) }
    }

    fn active_uniforms(&self, program: Self::Program) -> Vec<ActiveUniform> {
        unsafe {
            (0..self.get_active_uniforms(program))
                .filter_map(|index| self.get_active_uniform(program, index))
                .map(|info| ActiveUniform {
                    name: info.name,
                    size: info.size,
                    utype: uniform_type(info.utype),
                })
                .collect()
        }
    }

    fn uniform_location(&self, program: Self::Program, name: &str) -> Option<Self::UniformLocation> {
        unsafe { self.get_uniform_location(program, name) }
    }

    fn active_attributes(&self, program: Self::Program) -> Vec<ActiveAttribute> {
        unsafe {
            (0..self.get_active_attributes(program))
                .filter_map(|index| self.get_active_attribute(program, index))
                .map(|info| ActiveAttribute {
                    name: info.name,
                    size: info.size,
                    atype: uniform_type(info.atype),
                })
                .collect()
        }
    }

    fn attrib_location(&self, program: Self::Program, name: &str) -> Option<u32> {
        unsafe { self.get_attrib_location(program, name) }
    }

    fn upload_uniform(&self, location: &Self::UniformLocation, data: UniformData<'_>) {
        let location = Some(location);
        unsafe {
            match data {
                UniformData::Float { components, data } => match components {
                    2 => self.uniform_2_f32_slice(location, data),
                    3 => self.uniform_3_f32_slice(location, data),
                    4 => self.uniform_4_f32_slice(location, data),
                    _ => self.uniform_1_f32_slice(location, data),
                },
                UniformData::Matrix { dim, data } => match dim {
                    2 => self.uniform_matrix_2_f32_slice(location, false, data),
                    3 => self.uniform_matrix_3_f32_slice(location, false, data),
                    _ => self.uniform_matrix_4_f32_slice(location, false, data),
                },
                UniformData::Int { components, data } => match components {
                    2 => self.uniform_2_i32_slice(location, data),
                    3 => self.uniform_3_i32_slice(location, data),
                    4 => self.uniform_4_i32_slice(location, data),
                    _ => self.uniform_1_i32_slice(location, data),
                },
                UniformData::UInt { components, data } => match components {
                    2 => self.uniform_2_u32_slice(location, data),
                    3 => self.uniform_3_u32_slice(location, data),
                    4 => self.uniform_4_u32_slice(location, data),
                    _ => self.uniform_1_u32_slice(location, data),
                },
            }
        }
    }

    fn draw_arrays(&self, draw_mode: DrawMode, first: i32, count: i32) {
        unsafe { HasContext::draw_arrays(self, mode(draw_mode), first, count) }
    }

    fn draw_elements(&self, draw_mode: DrawMode, count: i32, index_type: DataType, offset: i32) {
        unsafe { HasContext::draw_elements(self, mode(draw_mode), count, data_type(index_type), offset) }
    }

    fn draw_arrays_instanced(&self, draw_mode: DrawMode, first: i32, count: i32, instances: i32) {
        unsafe { HasContext::draw_arrays_instanced(self, mode(draw_mode), first, count, instances) }
    }

    fn draw_elements_instanced(
        &self,
        draw_mode: DrawMode,
        count: i32,
        index_type: DataType,
        offset: i32,
        instances: i32,
    ) {
        unsafe {
            HasContext::draw_elements_instanced(
                self,
                mode(draw_mode),
                count,
                data_type(index_type),
                offset,
                instances,
            )
        }
    }

    fn max_vertex_attribs(&self) -> u32 {
        unsafe { self.get_parameter_i32(glow::MAX_VERTEX_ATTRIBS).max(0) as u32 }
    }

    fn supports_precision(&self, shader_stage: ShaderStage, precision: Precision) -> bool {
        let format = match precision {
            Precision::Highp => glow::HIGH_FLOAT,
            Precision::Mediump => glow::MEDIUM_FLOAT,
            Precision::Lowp => glow::LOW_FLOAT,
        };
        unsafe {
            self.get_shader_precision_format(stage(shader_stage), format)
                .is_some_and(|f| f.precision > 0)
        }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { HasContext::viewport(self, x, y, width, height) }
    }

    fn clear_color(&self, color: [f32; 4]) {
        unsafe { HasContext::clear_color(self, color[0], color[1], color[2], color[3]) }
    }

    fn clear(&self, color: bool, depth: bool) {
        let mut mask = 0;
        if color {
            mask |= glow::COLOR_BUFFER_BIT;
        }
        if depth {
            mask |= glow::DEPTH_BUFFER_BIT;
        }
        unsafe { HasContext::clear(self, mask) }
    }

    fn set_depth_test(&self, enabled: bool) {
        unsafe {
            if enabled {
                self.enable(glow::DEPTH_TEST);
                self.depth_func(glow::LEQUAL);
            } else {
                self.disable(glow::DEPTH_TEST);
            }
        }
    }
}
