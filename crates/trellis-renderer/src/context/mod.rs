//! GPU context abstraction.
//!
//! [`GpuContext`] is the minimal immediate-mode capability surface the caches
//! need. Handles are opaque associated types, so a backend decides what a
//! buffer or program is.
//!
//! Backends:
//! - [`HeadlessContext`] records every call and emulates compile/link
//! - `glow::Context` (feature `glow`) drives a real OpenGL / WebGL2 context

mod glsl;
mod headless;
#[cfg(feature = "glow")]
mod glow_backend;

use std::fmt::Debug;
use std::hash::Hash;

use trellis_core::{BufferUsage, DataType, DrawMode, Precision};

pub use headless::{GlCall, HeadlessContext, RecordedUniform};

/// Buffer binding point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data.
    Array,
    /// Index data. Bound into the current vertex array.
    ElementArray,
}

/// Shader stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn name(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

/// GLSL type of an active uniform or attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    UInt,
    UVec2,
    UVec3,
    UVec4,
    Bool,
    Mat2,
    Mat3,
    Mat4,
    Sampler,
    Other(u32),
}

impl UniformType {
    /// Parses a GLSL type keyword.
    pub fn from_glsl(name: &str) -> Option<Self> {
        Some(match name {
            "float" => UniformType::Float,
            "vec2" => UniformType::Vec2,
            "vec3" => UniformType::Vec3,
            "vec4" => UniformType::Vec4,
            "int" => UniformType::Int,
            "ivec2" => UniformType::IVec2,
            "ivec3" => UniformType::IVec3,
            "ivec4" => UniformType::IVec4,
            "uint" => UniformType::UInt,
            "uvec2" => UniformType::UVec2,
            "uvec3" => UniformType::UVec3,
            "uvec4" => UniformType::UVec4,
            "bool" => UniformType::Bool,
            "mat2" => UniformType::Mat2,
            "mat3" => UniformType::Mat3,
            "mat4" => UniformType::Mat4,
            s if s.starts_with("sampler") || s.starts_with("isampler") || s.starts_with("usampler") => {
                UniformType::Sampler
            }
            _ => return None,
        })
    }

    /// Components per element (16 for a `mat4`).
    pub fn components(&self) -> usize {
        match self {
            UniformType::Float | UniformType::Int | UniformType::UInt | UniformType::Bool => 1,
            UniformType::Sampler | UniformType::Other(_) => 1,
            UniformType::Vec2 | UniformType::IVec2 | UniformType::UVec2 => 2,
            UniformType::Vec3 | UniformType::IVec3 | UniformType::UVec3 => 3,
            UniformType::Vec4 | UniformType::IVec4 | UniformType::UVec4 | UniformType::Mat2 => 4,
            UniformType::Mat3 => 9,
            UniformType::Mat4 => 16,
        }
    }

    /// Consecutive attribute locations an attribute of this type occupies.
    pub fn location_size(&self) -> u32 {
        match self {
            UniformType::Mat2 => 2,
            UniformType::Mat3 => 3,
            UniformType::Mat4 => 4,
            _ => 1,
        }
    }
}

/// One entry of a program's active uniform list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniform {
    /// Full path, e.g. `light.color` or `weights[0]`.
    pub name: String,
    /// Array length; 1 for non-arrays.
    pub size: i32,
    pub utype: UniformType,
}

/// One entry of a program's active attribute list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveAttribute {
    pub name: String,
    pub size: i32,
    pub atype: UniformType,
}

/// Uniform components to upload, shaped by the uniform's type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformData<'a> {
    /// `float` / `vecN` (or arrays of them). `components` is 1 to 4.
    Float { components: u8, data: &'a [f32] },
    /// `matN` (or arrays of them), column-major. `dim` is 2 to 4.
    Matrix { dim: u8, data: &'a [f32] },
    /// `int` / `ivecN` / `bool` / samplers.
    Int { components: u8, data: &'a [i32] },
    /// `uint` / `uvecN`.
    UInt { components: u8, data: &'a [u32] },
}

/// Minimal immediate-mode GPU API.
///
/// Every method issues exactly one driver call (or one query). Callers are
/// responsible for not issuing redundant calls.
pub trait GpuContext {
    type Buffer: Copy + Eq + Hash + Debug;
    type VertexArray: Copy + Eq + Hash + Debug;
    type Program: Copy + Eq + Hash + Debug;
    type Shader: Copy + Eq + Debug;
    type UniformLocation: Clone + Debug;

    // Buffers
    fn create_buffer(&self) -> Result<Self::Buffer, String>;
    fn delete_buffer(&self, buffer: Self::Buffer);
    fn bind_buffer(&self, target: BufferTarget, buffer: Option<Self::Buffer>);
    fn buffer_data(&self, target: BufferTarget, data: &[u8], usage: BufferUsage);
    fn buffer_sub_data(&self, target: BufferTarget, offset: usize, data: &[u8]);

    // Vertex arrays
    fn create_vertex_array(&self) -> Result<Self::VertexArray, String>;
    fn delete_vertex_array(&self, vertex_array: Self::VertexArray);
    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>);

    // Vertex attributes
    fn enable_vertex_attrib_array(&self, index: u32);
    fn disable_vertex_attrib_array(&self, index: u32);
    /// Float attribute pointer. Integer data is converted (and optionally
    /// normalized). `stride` and `offset` are in bytes.
    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: DataType,
        normalized: bool,
        stride: i32,
        offset: i32,
    );
    /// Integer attribute pointer; values reach the shader unconverted.
    fn vertex_attrib_pointer_i32(&self, index: u32, size: i32, data_type: DataType, stride: i32, offset: i32);
    fn vertex_attrib_divisor(&self, index: u32, divisor: u32);
    /// Constant value for a disabled attribute array (1 to 4 components).
    fn vertex_attrib_default(&self, index: u32, value: &[f32]);

    // Shaders
    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String>;
    fn shader_source(&self, shader: Self::Shader, source: &str);
    fn compile_shader(&self, shader: Self::Shader);
    fn shader_compile_status(&self, shader: Self::Shader) -> bool;
    fn shader_info_log(&self, shader: Self::Shader) -> String;
    fn delete_shader(&self, shader: Self::Shader);

    // Programs
    fn create_program(&self) -> Result<Self::Program, String>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn detach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn bind_attrib_location(&self, program: Self::Program, index: u32, name: &str);
    fn link_program(&self, program: Self::Program);
    fn program_link_status(&self, program: Self::Program) -> bool;
    fn program_info_log(&self, program: Self::Program) -> String;
    fn delete_program(&self, program: Self::Program);
    fn use_program(&self, program: Option<Self::Program>);

    // Introspection
    fn active_uniforms(&self, program: Self::Program) -> Vec<ActiveUniform>;
    fn uniform_location(&self, program: Self::Program, name: &str) -> Option<Self::UniformLocation>;
    fn active_attributes(&self, program: Self::Program) -> Vec<ActiveAttribute>;
    fn attrib_location(&self, program: Self::Program, name: &str) -> Option<u32>;

    // Uniforms
    /// Uploads to the program currently in use.
    fn upload_uniform(&self, location: &Self::UniformLocation, data: UniformData<'_>);

    // Draws
    fn draw_arrays(&self, mode: DrawMode, first: i32, count: i32);
    fn draw_elements(&self, mode: DrawMode, count: i32, index_type: DataType, offset: i32);
    fn draw_arrays_instanced(&self, mode: DrawMode, first: i32, count: i32, instances: i32);
    fn draw_elements_instanced(
        &self,
        mode: DrawMode,
        count: i32,
        index_type: DataType,
        offset: i32,
        instances: i32,
    );

    // Capabilities and fixed-function state
    fn max_vertex_attribs(&self) -> u32;
    /// Whether `stage` supports float precision `precision`.
    fn supports_precision(&self, stage: ShaderStage, precision: Precision) -> bool;
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&self, color: [f32; 4]);
    fn clear(&self, color: bool, depth: bool);
    fn set_depth_test(&self, enabled: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_type_from_glsl() {
        assert_eq!(UniformType::from_glsl("mat4"), Some(UniformType::Mat4));
        assert_eq!(UniformType::from_glsl("sampler2D"), Some(UniformType::Sampler));
        assert_eq!(UniformType::from_glsl("Light"), None);
    }

    #[test]
    fn test_location_size() {
        assert_eq!(UniformType::Mat4.location_size(), 4);
        assert_eq!(UniformType::Mat3.components(), 9);
        assert_eq!(UniformType::Vec3.location_size(), 1);
    }
}
