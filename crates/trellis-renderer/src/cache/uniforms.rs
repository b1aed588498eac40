//! Per-program uniform locations and last-uploaded values.
//!
//! Built once when a program links. Active uniform names are parsed into a
//! tree: `a.b` descends into struct member `b`, `a[2].b` into element 2, and
//! a trailing `[0]` marks a pure array leaf uploaded in one call. Leaves keep
//! the last uploaded components and skip uploads of equal values.

use std::collections::BTreeMap;

use tracing::{debug, warn};
use trellis_core::{ScalarKind, UniformValue};

use crate::context::{GpuContext, UniformData, UniformType};
use crate::info::RenderInfo;

/// Components last uploaded to a uniform.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformCacheData {
    Float(Vec<f32>),
    Int(Vec<i32>),
    UInt(Vec<u32>),
}

impl UniformCacheData {
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            UniformCacheData::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match self {
            UniformCacheData::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<&[u32]> {
        match self {
            UniformCacheData::UInt(v) => Some(v),
            _ => None,
        }
    }
}

/// Key of a structured uniform's child.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathKey {
    Name(String),
    Index(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartKind {
    Single,
    PureArray,
    Container,
}

fn scalar_kind(utype: UniformType) -> ScalarKind {
    match utype {
        UniformType::UInt | UniformType::UVec2 | UniformType::UVec3 | UniformType::UVec4 => ScalarKind::UInt,
        UniformType::Int
        | UniformType::IVec2
        | UniformType::IVec3
        | UniformType::IVec4
        | UniformType::Bool
        | UniformType::Sampler => ScalarKind::Int,
        _ => ScalarKind::Float,
    }
}

/// Splits an active uniform name into keyed parts.
fn parse_path(path: &str) -> Vec<(PathKey, PartKind)> {
    let bytes = path.as_bytes();
    let mut parts = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let start = pos;
        while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
            pos += 1;
        }
        let id = &path[start..pos];
        let is_index = bytes.get(pos) == Some(&b']');
        if is_index {
            pos += 1;
        }
        let subscript = match bytes.get(pos) {
            Some(&c) if c == b'[' || c == b'.' => {
                pos += 1;
                Some(c)
            }
            _ => None,
        };

        let key = match id.parse::<usize>() {
            Ok(index) if is_index => PathKey::Index(index),
            _ => PathKey::Name(id.to_string()),
        };

        match subscript {
            None => {
                parts.push((key, PartKind::Single));
                break;
            }
            Some(b'[') if pos + 2 == bytes.len() => {
                parts.push((key, PartKind::PureArray));
                break;
            }
            Some(_) => parts.push((key, PartKind::Container)),
        }
        if start == pos {
            break;
        }
    }
    parts
}

/// Reusable flattening buffers.
#[derive(Debug, Default)]
struct Scratch {
    floats: Vec<f32>,
    ints: Vec<i32>,
    uints: Vec<u32>,
}

impl Scratch {
    /// Flattens `value` as `kind`. Returns `false` on a type mismatch.
    fn fill(&mut self, kind: ScalarKind, value: &UniformValue) -> bool {
        match kind {
            ScalarKind::Float => {
                self.floats.clear();
                value.write_f32(&mut self.floats)
            }
            ScalarKind::Int => {
                self.ints.clear();
                value.write_i32(&mut self.ints)
            }
            ScalarKind::UInt => {
                self.uints.clear();
                value.write_u32(&mut self.uints)
            }
        }
    }

    fn len(&self, kind: ScalarKind) -> usize {
        match kind {
            ScalarKind::Float => self.floats.len(),
            ScalarKind::Int => self.ints.len(),
            ScalarKind::UInt => self.uints.len(),
        }
    }

    fn matches(&self, cache: &Option<UniformCacheData>) -> bool {
        match cache {
            Some(UniformCacheData::Float(v)) => *v == self.floats,
            Some(UniformCacheData::Int(v)) => *v == self.ints,
            Some(UniformCacheData::UInt(v)) => *v == self.uints,
            None => false,
        }
    }

    fn store(&self, kind: ScalarKind, cache: &mut Option<UniformCacheData>) {
        match (kind, cache.as_mut()) {
            (ScalarKind::Float, Some(UniformCacheData::Float(v))) => v.clone_from(&self.floats),
            (ScalarKind::Int, Some(UniformCacheData::Int(v))) => v.clone_from(&self.ints),
            (ScalarKind::UInt, Some(UniformCacheData::UInt(v))) => v.clone_from(&self.uints),
            (ScalarKind::Float, _) => *cache = Some(UniformCacheData::Float(self.floats.clone())),
            (ScalarKind::Int, _) => *cache = Some(UniformCacheData::Int(self.ints.clone())),
            (ScalarKind::UInt, _) => *cache = Some(UniformCacheData::UInt(self.uints.clone())),
        }
    }

    fn data(&self, utype: UniformType) -> UniformData<'_> {
        let components = utype.components() as u8;
        match utype {
            UniformType::Mat2 => UniformData::Matrix { dim: 2, data: &self.floats },
            UniformType::Mat3 => UniformData::Matrix { dim: 3, data: &self.floats },
            UniformType::Mat4 => UniformData::Matrix { dim: 4, data: &self.floats },
            _ => match scalar_kind(utype) {
                ScalarKind::Float => UniformData::Float { components, data: &self.floats },
                ScalarKind::Int => UniformData::Int { components, data: &self.ints },
                ScalarKind::UInt => UniformData::UInt { components, data: &self.uints },
            },
        }
    }
}

/// A uniform leaf: a single value or a pure array uploaded in one call.
struct Leaf<C: GpuContext> {
    path: String,
    location: C::UniformLocation,
    utype: UniformType,
    /// Array length; 1 for single uniforms.
    size: usize,
    pure_array: bool,
    cache: Option<UniformCacheData>,
}

impl<C: GpuContext> Leaf<C> {
    fn set_value(&mut self, gl: &C, info: &mut RenderInfo, value: &UniformValue, scratch: &mut Scratch) -> bool {
        let kind = scalar_kind(self.utype);
        if !scratch.fill(kind, value) {
            warn!("Uniform {} expects {:?}, got {:?}", self.path, self.utype, value.scalar_kind());
            return false;
        }

        let components = self.utype.components();
        let len = scratch.len(kind);
        let valid = if self.pure_array {
            len > 0 && len % components == 0 && len <= components * self.size
        } else {
            len == components
        };
        if !valid {
            warn!("Uniform {} expects {} x {:?}, got {} components", self.path, self.size, self.utype, len);
            return false;
        }

        if scratch.matches(&self.cache) {
            return false;
        }
        gl.upload_uniform(&self.location, scratch.data(self.utype));
        scratch.store(kind, &mut self.cache);
        info.update_uniforms();
        true
    }
}

enum UniformNode<C: GpuContext> {
    Leaf(Leaf<C>),
    Structured(Vec<(PathKey, UniformNode<C>)>),
}

impl<C: GpuContext> UniformNode<C> {
    fn set_value(&mut self, gl: &C, info: &mut RenderInfo, value: &UniformValue, scratch: &mut Scratch) -> bool {
        match self {
            UniformNode::Leaf(leaf) => leaf.set_value(gl, info, value, scratch),
            UniformNode::Structured(children) => {
                let mut uploaded = false;
                for (key, child) in children.iter_mut() {
                    let member = match key {
                        PathKey::Name(name) => value.member(name),
                        PathKey::Index(index) => value.element(*index),
                    };
                    if let Some(member) = member {
                        uploaded |= child.set_value(gl, info, member, scratch);
                    }
                }
                uploaded
            }
        }
    }

    fn child_mut(&mut self, key: &PathKey) -> Option<&mut UniformNode<C>> {
        match self {
            UniformNode::Structured(children) => children.iter_mut().find(|(k, _)| k == key).map(|(_, n)| n),
            UniformNode::Leaf(_) => None,
        }
    }

    fn child(&self, key: &PathKey) -> Option<&UniformNode<C>> {
        match self {
            UniformNode::Structured(children) => children.iter().find(|(k, _)| k == key).map(|(_, n)| n),
            UniformNode::Leaf(_) => None,
        }
    }
}

/// Uniform tree of one linked program.
pub struct UniformCache<C: GpuContext> {
    roots: BTreeMap<String, UniformNode<C>>,
    active: usize,
    scratch: Scratch,
}

impl<C: GpuContext> UniformCache<C> {
    /// Introspects the active uniforms of a linked program.
    pub fn new(gl: &C, program: C::Program) -> Self {
        let mut cache = Self {
            roots: BTreeMap::new(),
            active: 0,
            scratch: Scratch::default(),
        };
        for uniform in gl.active_uniforms(program) {
            let Some(location) = gl.uniform_location(program, &uniform.name) else {
                debug!("Uniform {} has no location", uniform.name);
                continue;
            };
            cache.active += 1;
            cache.insert(&uniform.name, location, uniform.utype, uniform.size.max(1) as usize);
        }
        cache
    }

    fn insert(&mut self, path: &str, location: C::UniformLocation, utype: UniformType, size: usize) {
        let parts = parse_path(path);
        let Some(((root_key, root_kind), rest)) = parts.split_first() else {
            return;
        };
        let PathKey::Name(root_name) = root_key else {
            return;
        };

        let leaf = |kind: PartKind, location: C::UniformLocation| {
            UniformNode::Leaf(Leaf {
                path: path.to_string(),
                location,
                utype,
                size,
                pure_array: kind == PartKind::PureArray,
                cache: None,
            })
        };

        if *root_kind != PartKind::Container {
            self.roots.insert(root_name.clone(), leaf(*root_kind, location));
            return;
        }

        let mut node = self
            .roots
            .entry(root_name.clone())
            .or_insert_with(|| UniformNode::Structured(Vec::new()));
        for (key, kind) in rest {
            let UniformNode::Structured(children) = node else {
                return;
            };
            let position = match children.iter().position(|(k, _)| k == key) {
                Some(position) => position,
                None => {
                    let child = match kind {
                        PartKind::Container => UniformNode::Structured(Vec::new()),
                        _ => leaf(*kind, location.clone()),
                    };
                    children.push((key.clone(), child));
                    children.len() - 1
                }
            };
            node = &mut children[position].1;
        }
    }

    /// Sets a top-level uniform. Structured values only touch the members
    /// they carry. Returns `true` if anything was uploaded.
    ///
    /// Names the program does not use are ignored.
    pub fn set_value(&mut self, gl: &C, info: &mut RenderInfo, name: &str, value: &UniformValue) -> bool {
        match self.roots.get_mut(name) {
            Some(node) => node.set_value(gl, info, value, &mut self.scratch),
            None => false,
        }
    }

    /// Sets a uniform addressed by a full path such as `light.color`.
    pub fn set_path(&mut self, gl: &C, info: &mut RenderInfo, path: &str, value: &UniformValue) -> bool {
        let parts = parse_path(path);
        let Some(((PathKey::Name(root), _), rest)) = parts.split_first() else {
            return false;
        };
        let Some(mut node) = self.roots.get_mut(root) else {
            return false;
        };
        for (key, _) in rest {
            match node.child_mut(key) {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.set_value(gl, info, value, &mut self.scratch)
    }

    /// Components last uploaded to the leaf at `path`.
    pub fn cached(&self, path: &str) -> Option<&UniformCacheData> {
        let parts = parse_path(path);
        let ((PathKey::Name(root), _), rest) = parts.split_first()? else {
            return None;
        };
        let mut node = self.roots.get(root)?;
        for (key, _) in rest {
            node = node.child(key)?;
        }
        match node {
            UniformNode::Leaf(leaf) => leaf.cache.as_ref(),
            UniformNode::Structured(_) => None,
        }
    }

    /// Whether the program declares a top-level uniform `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.roots.contains_key(name)
    }

    /// Number of active uniforms the program reported.
    pub fn active_count(&self) -> usize {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GlCall, HeadlessContext, ShaderStage};
    use glam::{Mat4, Vec3};

    fn program(gl: &HeadlessContext, fragment: &str) -> u32 {
        let program = gl.create_program().unwrap();
        let vs = gl.create_shader(ShaderStage::Vertex).unwrap();
        gl.shader_source(vs, "uniform mat4 uModelViewMatrix;\n");
        gl.compile_shader(vs);
        let fs = gl.create_shader(ShaderStage::Fragment).unwrap();
        gl.shader_source(fs, fragment);
        gl.compile_shader(fs);
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.link_program(program);
        program
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(parse_path("color"), vec![(PathKey::Name("color".into()), PartKind::Single)]);
        assert_eq!(parse_path("weights[0]"), vec![(PathKey::Name("weights".into()), PartKind::PureArray)]);
        assert_eq!(
            parse_path("lights[1].color"),
            vec![
                (PathKey::Name("lights".into()), PartKind::Container),
                (PathKey::Index(1), PartKind::Container),
                (PathKey::Name("color".into()), PartKind::Single),
            ]
        );
        assert_eq!(
            parse_path("light.falloff[0]"),
            vec![
                (PathKey::Name("light".into()), PartKind::Container),
                (PathKey::Name("falloff".into()), PartKind::PureArray),
            ]
        );
    }

    #[test]
    fn test_equal_value_skips_upload() {
        let gl = HeadlessContext::new();
        let program = program(&gl, "");
        let mut cache = UniformCache::new(&gl, program);
        let mut info = RenderInfo::new();
        let value = UniformValue::Mat4(Mat4::from_translation(Vec3::X));

        assert!(cache.set_value(&gl, &mut info, "uModelViewMatrix", &value));
        assert!(!cache.set_value(&gl, &mut info, "uModelViewMatrix", &value));
        assert_eq!(info.render.uniform_calls, 1);

        assert!(cache.set_value(&gl, &mut info, "uModelViewMatrix", &UniformValue::Mat4(Mat4::IDENTITY)));
        assert_eq!(info.render.uniform_calls, 2);
        assert_eq!(gl.count_calls(GlCall::is_uniform), 2);
        assert_eq!(cache.cached("uModelViewMatrix").and_then(|c| c.as_f32()).map(<[f32]>::len), Some(16));
    }

    #[test]
    fn test_type_mismatch_is_skipped() {
        let gl = HeadlessContext::new();
        let program = program(&gl, "uniform vec3 uTint;\n");
        let mut cache = UniformCache::new(&gl, program);
        let mut info = RenderInfo::new();

        assert!(!cache.set_value(&gl, &mut info, "uTint", &UniformValue::Int(3)));
        assert!(!cache.set_value(&gl, &mut info, "uTint", &UniformValue::Float(1.0)));
        assert!(cache.set_value(&gl, &mut info, "uTint", &UniformValue::Vec3(Vec3::ONE)));
        assert_eq!(info.render.uniform_calls, 1);
    }

    #[test]
    fn test_unknown_name_is_ignored() {
        let gl = HeadlessContext::new();
        let program = program(&gl, "");
        let mut cache = UniformCache::new(&gl, program);
        let mut info = RenderInfo::new();
        assert!(!cache.set_value(&gl, &mut info, "uMissing", &UniformValue::Float(1.0)));
        assert_eq!(cache.active_count(), 1);
    }

    #[test]
    fn test_pure_array() {
        let gl = HeadlessContext::new();
        let program = program(&gl, "uniform float weights[4];\n");
        let mut cache = UniformCache::new(&gl, program);
        let mut info = RenderInfo::new();
        let weights = UniformValue::from(vec![0.1f32, 0.2, 0.3, 0.4]);

        assert!(cache.set_value(&gl, &mut info, "weights", &weights));
        assert!(!cache.set_value(&gl, &mut info, "weights", &weights));
        assert_eq!(info.render.uniform_calls, 1);

        let too_long = UniformValue::from(vec![0.0f32; 5]);
        assert!(!cache.set_value(&gl, &mut info, "weights", &too_long));
        assert_eq!(cache.cached("weights[0]").and_then(|c| c.as_f32()), Some(&[0.1, 0.2, 0.3, 0.4][..]));
    }

    #[test]
    fn test_structured_partial_update() {
        let gl = HeadlessContext::new();
        let program = program(
            &gl,
            "struct Light { vec3 color; float intensity; };\nuniform Light lights[2];\n",
        );
        let mut cache = UniformCache::new(&gl, program);
        let mut info = RenderInfo::new();

        let first = UniformValue::structure([
            ("color", UniformValue::Vec3(Vec3::ONE)),
            ("intensity", UniformValue::Float(2.0)),
        ]);
        let lights = UniformValue::Array(vec![first.clone()]);
        assert!(cache.set_value(&gl, &mut info, "lights", &lights));
        assert_eq!(info.render.uniform_calls, 2);

        // lights[1] is absent from the value and keeps its state
        assert!(cache.cached("lights[1].color").is_none());
        assert!(cache.cached("lights[0].intensity").is_some());

        let dimmer = UniformValue::Array(vec![UniformValue::structure([(
            "intensity",
            UniformValue::Float(1.0),
        )])]);
        assert!(cache.set_value(&gl, &mut info, "lights", &dimmer));
        assert_eq!(info.render.uniform_calls, 3);

        assert!(cache.set_path(&gl, &mut info, "lights[1].intensity", &UniformValue::Float(0.5)));
        assert_eq!(info.render.uniform_calls, 4);
    }

    #[test]
    fn test_int_and_bool_uniforms() {
        let gl = HeadlessContext::new();
        let program = program(&gl, "uniform bool uEnabled;\nuniform uvec2 uSize;\n");
        let mut cache = UniformCache::new(&gl, program);
        let mut info = RenderInfo::new();

        assert!(cache.set_value(&gl, &mut info, "uEnabled", &UniformValue::Bool(true)));
        assert!(!cache.set_value(&gl, &mut info, "uEnabled", &UniformValue::Int(1)));
        assert!(cache.set_value(&gl, &mut info, "uSize", &UniformValue::UVec2(glam::UVec2::new(4, 2))));
        assert_eq!(cache.cached("uEnabled").and_then(|c| c.as_i32()), Some(&[1][..]));
    }
}
