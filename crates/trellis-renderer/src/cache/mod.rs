//! GPU state caches.
//!
//! Each cache owns one kind of GPU object and decides when it needs to be
//! created, re-specified or deleted. None of them holds the context; callers
//! pass it in, along with [`GlState`](crate::state::GlState) where binds happen.

pub mod attributes;
pub mod bindings;
pub mod geometries;
pub mod objects;
pub mod programs;
pub mod uniforms;

pub use attributes::{AttributeCache, GpuBuffer};
pub use bindings::{BindingState, BindingStateCache};
pub use geometries::GeometryCache;
pub use objects::ObjectCache;
pub use programs::{Program, ProgramAttribute, ProgramCache, ProgramId};
pub use uniforms::{UniformCache, UniformCacheData};
