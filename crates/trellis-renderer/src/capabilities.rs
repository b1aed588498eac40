//! Context capability queries, made once at renderer creation.

use tracing::warn;
use trellis_core::Precision;

use crate::context::{GpuContext, ShaderStage};

/// Limits and precision support of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Number of vertex attribute slots.
    pub max_vertex_attribs: u32,
    /// Highest usable precision not above the requested one.
    pub precision: Precision,
}

impl Capabilities {
    /// Queries `gl`, degrading `requested` precision until both stages
    /// support it.
    pub fn query<C: GpuContext>(gl: &C, requested: Precision) -> Self {
        let precision = max_precision(gl, requested);
        if precision != requested {
            warn!("{} not supported, using {} instead", requested, precision);
        }
        Self {
            max_vertex_attribs: gl.max_vertex_attribs(),
            precision,
        }
    }
}

/// Highest precision at or below `requested` that both stages support.
/// Falls back to `lowp`.
pub fn max_precision<C: GpuContext>(gl: &C, requested: Precision) -> Precision {
    let mut candidate = Some(requested);
    while let Some(precision) = candidate {
        if gl.supports_precision(ShaderStage::Vertex, precision)
            && gl.supports_precision(ShaderStage::Fragment, precision)
        {
            return precision;
        }
        candidate = precision.lower();
    }
    Precision::Lowp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeadlessContext;

    #[test]
    fn test_precision_fallback() {
        let gl = HeadlessContext::new().with_max_precision(Precision::Mediump);
        assert_eq!(max_precision(&gl, Precision::Highp), Precision::Mediump);
        assert_eq!(max_precision(&gl, Precision::Lowp), Precision::Lowp);

        let caps = Capabilities::query(&gl, Precision::Highp);
        assert_eq!(caps.precision, Precision::Mediump);
        assert_eq!(caps.max_vertex_attribs, 16);
    }
}
