//! Trellis core - scene data model for the trellis renderer.
//!
//! This crate holds everything the renderer reads but never owns on the GPU:
//! - Buffer data, attributes and geometries
//! - Materials, uniform values and shader source providers
//! - Render objects, the scene and the camera
//! - Built-in primitives (tetrahedron, floor grid, axes)

pub mod attribute;
pub mod buffer;
pub mod camera;
pub mod geometry;
pub mod ids;
pub mod material;
pub mod primitives;
pub mod scene;
pub mod shader;
pub mod uniform;

pub use attribute::{Attribute, AttributeSource, InterleavedBuffer, VertexStep};
pub use buffer::{ArrayData, BufferData, BufferUsage, DataType};
pub use camera::Camera;
pub use geometry::{DrawMode, Geometry, POSITION_ATTRIBUTE};
pub use ids::{AttributeId, BufferId, GeometryId};
pub use material::{Material, Precision};
pub use scene::{INSTANCE_COLOR_ATTRIBUTE, INSTANCE_MATRIX_ATTRIBUTE, Instancing, RenderObject, Scene};
pub use shader::{ProgramInputs, ProgramKey, ProgramParameters, RawShaderProvider, ShaderCode, ShaderProvider};
pub use uniform::{ScalarKind, UniformValue};
