//! Materials: shader sources plus the parameters that affect compilation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shader::{BASIC_FRAGMENT_SHADER, BASIC_VERTEX_SHADER};
use crate::uniform::UniformValue;

/// Floating point precision qualifier for shader code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    Highp,
    Mediump,
    Lowp,
}

impl Precision {
    /// The next lower precision, if any.
    pub fn lower(&self) -> Option<Precision> {
        match self {
            Precision::Highp => Some(Precision::Mediump),
            Precision::Mediump => Some(Precision::Lowp),
            Precision::Lowp => None,
        }
    }

    /// GLSL keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::Highp => "highp",
            Precision::Mediump => "mediump",
            Precision::Lowp => "lowp",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Surface description of a render object.
#[derive(Debug, Clone)]
pub struct Material {
    name: String,
    vertex_shader: String,
    fragment_shader: String,
    /// Draw triangle edges as line loops.
    pub wireframe: bool,
    /// Shader precision. `None` uses the renderer's configured precision.
    pub precision: Option<Precision>,
    /// `#define` switches prepended to both shader stages.
    pub defines: BTreeMap<String, String>,
    /// Extra uniforms uploaded after the camera matrices.
    pub uniforms: BTreeMap<String, UniformValue>,
    /// Constant values for program attributes the geometry does not provide.
    pub default_attribute_values: BTreeMap<String, Vec<f32>>,
    /// Attribute forced to location 0 before linking.
    pub index0_attribute_name: Option<String>,
}

impl Material {
    /// Creates a material from raw shader bodies.
    ///
    /// The bodies must not carry a `#version` or precision line; the shader
    /// provider prepends those.
    pub fn new(
        name: impl Into<String>,
        vertex_shader: impl Into<String>,
        fragment_shader: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            vertex_shader: vertex_shader.into(),
            fragment_shader: fragment_shader.into(),
            wireframe: false,
            precision: None,
            defines: BTreeMap::new(),
            uniforms: BTreeMap::new(),
            default_attribute_values: BTreeMap::new(),
            index0_attribute_name: None,
        }
    }

    /// Per-vertex color material used by the built-in primitives.
    pub fn basic() -> Self {
        Self::new("basic", BASIC_VERTEX_SHADER, BASIC_FRAGMENT_SHADER)
    }

    /// Sets wireframe rendering.
    pub fn with_wireframe(mut self, wireframe: bool) -> Self {
        self.wireframe = wireframe;
        self
    }

    /// Overrides the shader precision.
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Adds a `#define`.
    pub fn with_define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defines.insert(name.into(), value.into());
        self
    }

    /// Adds a uniform value.
    pub fn with_uniform(mut self, name: impl Into<String>, value: impl Into<UniformValue>) -> Self {
        self.uniforms.insert(name.into(), value.into());
        self
    }

    /// Adds a constant attribute value.
    pub fn with_default_attribute(mut self, name: impl Into<String>, value: Vec<f32>) -> Self {
        self.default_attribute_values.insert(name.into(), value);
        self
    }

    /// Forces an attribute to location 0.
    pub fn with_index0_attribute(mut self, name: impl Into<String>) -> Self {
        self.index0_attribute_name = Some(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertex_shader(&self) -> &str {
        &self.vertex_shader
    }

    pub fn fragment_shader(&self) -> &str {
        &self.fragment_shader
    }

    /// Sets a uniform value in place.
    pub fn set_uniform(&mut self, name: impl Into<String>, value: impl Into<UniformValue>) {
        self.uniforms.insert(name.into(), value.into());
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::basic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_fallback_chain() {
        assert_eq!(Precision::Highp.lower(), Some(Precision::Mediump));
        assert_eq!(Precision::Mediump.lower(), Some(Precision::Lowp));
        assert_eq!(Precision::Lowp.lower(), None);
    }

    #[test]
    fn test_builder() {
        let material = Material::basic()
            .with_wireframe(true)
            .with_define("USE_FOG", "1")
            .with_uniform("uOpacity", 0.5f32);
        assert!(material.wireframe);
        assert_eq!(material.defines.get("USE_FOG").map(String::as_str), Some("1"));
        assert_eq!(material.uniforms.len(), 1);
    }
}
