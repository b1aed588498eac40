//! Trellis Renderer
//!
//! GPU state caching for scene-graph rendering.
//!
//! # Architecture
//!
//! - [`context::GpuContext`] - The GPU calls the renderer needs, with a
//!   recording [`context::HeadlessContext`] and an optional `glow` backend
//! - [`state::GlState`] - Tracks the bound program and vertex array
//! - [`cache::AttributeCache`] - One GPU buffer per buffer data identity
//! - [`cache::BindingStateCache`] - Vertex arrays per geometry, program and
//!   wireframe flag
//! - [`cache::ProgramCache`] - Programs shared by structural key
//! - [`cache::UniformCache`] - Uniform locations and deduplicated uploads
//! - [`Renderer`] - The per-frame loop over a [`trellis_core::Scene`]
//!
//! # Example
//!
//! ```ignore
//! use trellis_renderer::{HeadlessContext, Renderer, RendererConfig};
//!
//! let mut renderer = Renderer::new(HeadlessContext::new(), RendererConfig::default());
//! renderer.set_size(1280, 720);
//!
//! let report = renderer.render(&scene, &camera);
//! println!("{}", renderer.info());
//! ```

pub mod cache;
pub mod capabilities;
pub mod config;
pub mod context;
pub mod error;
pub mod info;
pub mod renderer;
pub mod state;

pub use cache::{ProgramId, UniformCacheData};
pub use capabilities::Capabilities;
pub use config::RendererConfig;
pub use context::{GlCall, GpuContext, HeadlessContext};
pub use error::{ConfigError, ObjectFailure, ProgramDiagnostics, ProgramError, RenderError, RenderResult};
pub use info::{FrameInfo, MemoryInfo, RenderInfo};
pub use renderer::{FrameReport, Renderer};
pub use state::GlState;
