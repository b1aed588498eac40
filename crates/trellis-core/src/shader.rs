//! Shader source assembly and program cache keys.
//!
//! The renderer never looks inside shader text; it asks a [`ShaderProvider`]
//! for a key and, when the key is new, for the finished sources.

use std::collections::BTreeMap;
use std::fmt;

use crate::material::{Material, Precision};

/// Vertex shader body of [`Material::basic`].
pub const BASIC_VERTEX_SHADER: &str = r#"uniform mat4 uModelViewMatrix;
uniform mat4 uProjectionMatrix;

in vec3 position;
in vec3 color;
#ifdef USE_INSTANCING
in mat4 instanceMatrix;
#endif
#ifdef USE_INSTANCING_COLOR
in vec3 instanceColor;
#endif

out vec4 vColor;

void main() {
    vec3 tint = color;
#ifdef USE_INSTANCING_COLOR
    tint *= instanceColor;
#endif
    vColor = vec4(tint, 1.0);

    vec4 local = vec4(position, 1.0);
#ifdef USE_INSTANCING
    local = instanceMatrix * local;
#endif
    gl_Position = uProjectionMatrix * uModelViewMatrix * local;
}
"#;

/// Fragment shader body of [`Material::basic`].
pub const BASIC_FRAGMENT_SHADER: &str = r#"in vec4 vColor;
out vec4 fragColor;

void main() {
    fragColor = vColor;
}
"#;

/// Everything that changes the generated shader source of an object.
#[derive(Debug, Clone)]
pub struct ProgramParameters<'a> {
    pub shader_name: &'a str,
    pub vertex_shader: &'a str,
    pub fragment_shader: &'a str,
    pub precision: Precision,
    pub defines: &'a BTreeMap<String, String>,
    pub wireframe: bool,
    pub instancing: bool,
    pub instancing_color: bool,
    pub index0_attribute_name: Option<&'a str>,
}

impl<'a> ProgramParameters<'a> {
    /// Parameters of a material drawn without instancing.
    ///
    /// `default_precision` applies when the material does not set one.
    pub fn new(material: &'a Material, default_precision: Precision) -> Self {
        Self {
            shader_name: material.name(),
            vertex_shader: material.vertex_shader(),
            fragment_shader: material.fragment_shader(),
            precision: material.precision.unwrap_or(default_precision),
            defines: &material.defines,
            wireframe: material.wireframe,
            instancing: false,
            instancing_color: false,
            index0_attribute_name: material.index0_attribute_name.as_deref(),
        }
    }

    /// Sets the instancing switches.
    pub fn with_instancing(mut self, instancing: bool, instancing_color: bool) -> Self {
        self.instancing = instancing;
        self.instancing_color = instancing && instancing_color;
        self
    }
}

/// Structural cache key of a compiled program.
///
/// Keys compare on the full shader bodies as well as the label, so two
/// programs only share a key when their sources are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramKey {
    label: String,
    vertex: String,
    fragment: String,
}

impl ProgramKey {
    /// A key made of a label alone, for providers whose label already
    /// identifies the sources.
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_sources(label, String::new(), String::new())
    }

    pub fn with_sources(label: impl Into<String>, vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// The readable part of the key, without shader bodies.
    pub fn as_str(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for ProgramKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Owned copy of the [`ProgramParameters`] a key was computed from.
///
/// Comparing against it is enough to tell whether an object's material
/// changed since its key was last computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramInputs {
    shader_name: String,
    vertex_shader: String,
    fragment_shader: String,
    precision: Precision,
    defines: BTreeMap<String, String>,
    wireframe: bool,
    instancing: bool,
    instancing_color: bool,
    index0_attribute_name: Option<String>,
}

impl ProgramInputs {
    pub fn matches(&self, params: &ProgramParameters<'_>) -> bool {
        self.precision == params.precision
            && self.wireframe == params.wireframe
            && self.instancing == params.instancing
            && self.instancing_color == params.instancing_color
            && self.index0_attribute_name.as_deref() == params.index0_attribute_name
            && self.shader_name == params.shader_name
            && &self.defines == params.defines
            && self.vertex_shader == params.vertex_shader
            && self.fragment_shader == params.fragment_shader
    }
}

impl From<&ProgramParameters<'_>> for ProgramInputs {
    fn from(params: &ProgramParameters<'_>) -> Self {
        Self {
            shader_name: params.shader_name.to_string(),
            vertex_shader: params.vertex_shader.to_string(),
            fragment_shader: params.fragment_shader.to_string(),
            precision: params.precision,
            defines: params.defines.clone(),
            wireframe: params.wireframe,
            instancing: params.instancing,
            instancing_color: params.instancing_color,
            index0_attribute_name: params.index0_attribute_name.map(str::to_string),
        }
    }
}

/// Finished sources for both stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderCode {
    pub vertex: String,
    pub fragment: String,
}

/// Produces shader sources and cache keys from program parameters.
pub trait ShaderProvider {
    /// Key identifying the program `build` would produce.
    ///
    /// Two parameter sets with equal keys must build identical sources.
    fn cache_key(&self, params: &ProgramParameters<'_>) -> ProgramKey;

    /// Assembles the vertex and fragment sources.
    fn build(&self, params: &ProgramParameters<'_>) -> ShaderCode;
}

/// Prepends a GLSL ES 3.00 prefix (version, precision, defines) to the
/// material's shader bodies.
#[derive(Debug, Clone, Default)]
pub struct RawShaderProvider;

impl RawShaderProvider {
    pub fn new() -> Self {
        Self
    }

    fn prefix(params: &ProgramParameters<'_>) -> String {
        let mut prefix = String::from("#version 300 es\n");
        prefix.push_str(&format!("precision {} float;\n", params.precision));
        prefix.push_str(&format!("precision {} int;\n", params.precision));
        if params.instancing {
            prefix.push_str("#define USE_INSTANCING\n");
        }
        if params.instancing_color {
            prefix.push_str("#define USE_INSTANCING_COLOR\n");
        }
        for (name, value) in params.defines {
            prefix.push_str(&format!("#define {name} {value}\n"));
        }
        prefix
    }
}

impl ShaderProvider for RawShaderProvider {
    fn cache_key(&self, params: &ProgramParameters<'_>) -> ProgramKey {
        let mut key = format!(
            "{}:{}:w{}:i{}:c{}",
            params.shader_name,
            params.precision,
            u8::from(params.wireframe),
            u8::from(params.instancing),
            u8::from(params.instancing_color),
        );
        for (name, value) in params.defines {
            key.push_str(&format!(":{name}={value}"));
        }
        if let Some(name) = params.index0_attribute_name {
            key.push_str(&format!(":@{name}"));
        }
        ProgramKey::with_sources(key, params.vertex_shader, params.fragment_shader)
    }

    fn build(&self, params: &ProgramParameters<'_>) -> ShaderCode {
        let prefix = Self::prefix(params);
        ShaderCode {
            vertex: format!("{prefix}{}", params.vertex_shader),
            fragment: format!("{prefix}{}", params.fragment_shader),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_materials_share_key() {
        let provider = RawShaderProvider::new();
        let a = Material::basic();
        let b = Material::basic();
        assert_eq!(
            provider.cache_key(&ProgramParameters::new(&a, Precision::Highp)),
            provider.cache_key(&ProgramParameters::new(&b, Precision::Highp)),
        );
    }

    #[test]
    fn test_key_tracks_parameters() {
        let provider = RawShaderProvider::new();
        let solid = Material::basic();
        let wire = Material::basic().with_wireframe(true);
        let solid_key = provider.cache_key(&ProgramParameters::new(&solid, Precision::Highp));

        assert_ne!(solid_key, provider.cache_key(&ProgramParameters::new(&wire, Precision::Highp)));
        assert_ne!(solid_key, provider.cache_key(&ProgramParameters::new(&solid, Precision::Lowp)));
        assert_ne!(
            solid_key,
            provider.cache_key(&ProgramParameters::new(&solid, Precision::Highp).with_instancing(true, false))
        );
    }

    #[test]
    fn test_key_compares_full_sources() {
        let provider = RawShaderProvider::new();
        let a = Material::new("custom", "void main() { gl_Position = vec4(0.0); }", "void main() {}");
        let b = Material::new("custom", "void main() { gl_Position = vec4(1.0); }", "void main() {}");
        let key_a = provider.cache_key(&ProgramParameters::new(&a, Precision::Highp));
        let key_b = provider.cache_key(&ProgramParameters::new(&b, Precision::Highp));

        assert_eq!(key_a.as_str(), key_b.as_str());
        assert_ne!(key_a, key_b);
    }

    #[test]
    fn test_inputs_detect_material_changes() {
        let mut material = Material::basic();
        let inputs = ProgramInputs::from(&ProgramParameters::new(&material, Precision::Highp));
        assert!(inputs.matches(&ProgramParameters::new(&material, Precision::Highp)));
        assert!(!inputs.matches(&ProgramParameters::new(&material, Precision::Lowp)));

        material.wireframe = true;
        assert!(!inputs.matches(&ProgramParameters::new(&material, Precision::Highp)));
        material.wireframe = false;
        material.defines.insert("SCALE".into(), "2.0".into());
        assert!(!inputs.matches(&ProgramParameters::new(&material, Precision::Highp)));
    }

    #[test]
    fn test_build_prefix() {
        let material = Material::basic().with_define("SCALE", "2.0");
        let params = ProgramParameters::new(&material, Precision::Mediump).with_instancing(true, true);
        let code = RawShaderProvider::new().build(&params);

        assert!(code.vertex.starts_with("#version 300 es\nprecision mediump float;\n"));
        assert!(code.vertex.contains("#define USE_INSTANCING\n"));
        assert!(code.vertex.contains("#define USE_INSTANCING_COLOR\n"));
        assert!(code.fragment.contains("#define SCALE 2.0\n"));
    }

    #[test]
    fn test_instancing_color_requires_instancing() {
        let material = Material::basic();
        let params = ProgramParameters::new(&material, Precision::Highp).with_instancing(false, true);
        assert!(!params.instancing_color);
    }
}
