//! Linked programs keyed by their structural key, with usage counting.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error, info, warn};
use trellis_core::{ProgramKey, ProgramParameters, ShaderCode, ShaderProvider};

use crate::cache::bindings::BindingStateCache;
use crate::cache::uniforms::UniformCache;
use crate::context::{GpuContext, ShaderStage};
use crate::error::{ProgramDiagnostics, ProgramError, ShaderDiagnostics, add_line_numbers};
use crate::info::RenderInfo;
use crate::state::GlState;

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a cached program. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProgramId(u64);

impl ProgramId {
    fn next() -> Self {
        Self(NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ProgramId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Program#{}", self.0)
    }
}

/// An active vertex attribute of a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramAttribute {
    pub location: u32,
    /// Consecutive locations used (4 for a `mat4`).
    pub location_size: u32,
}

/// A linked program with its attribute locations and uniform cache.
pub struct Program<C: GpuContext> {
    id: ProgramId,
    key: ProgramKey,
    name: String,
    handle: C::Program,
    attributes: BTreeMap<String, ProgramAttribute>,
    uniforms: UniformCache<C>,
    used_times: usize,
}

impl<C: GpuContext> Program<C> {
    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn key(&self) -> &ProgramKey {
        &self.key
    }

    /// Shader name of the material the program was built for.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> C::Program {
        self.handle
    }

    /// Active attributes by name.
    pub fn attributes(&self) -> &BTreeMap<String, ProgramAttribute> {
        &self.attributes
    }

    pub fn uniforms(&self) -> &UniformCache<C> {
        &self.uniforms
    }

    pub fn uniforms_mut(&mut self) -> &mut UniformCache<C> {
        &mut self.uniforms
    }

    /// Number of holders sharing this program.
    pub fn used_times(&self) -> usize {
        self.used_times
    }
}

/// Compiled programs shared by every object with the same key.
///
/// A key that failed to compile is remembered with its diagnostics and not
/// retried until [`ProgramCache::forget_failure`] is called for it.
pub struct ProgramCache<C: GpuContext> {
    programs: HashMap<ProgramId, Program<C>>,
    by_key: HashMap<ProgramKey, ProgramId>,
    failures: HashMap<ProgramKey, ProgramError>,
    check_shader_errors: bool,
}

impl<C: GpuContext> ProgramCache<C> {
    pub fn new() -> Self {
        Self {
            programs: HashMap::new(),
            by_key: HashMap::new(),
            failures: HashMap::new(),
            check_shader_errors: true,
        }
    }

    /// Whether link status and logs are queried after linking.
    pub fn with_check_shader_errors(mut self, check: bool) -> Self {
        self.check_shader_errors = check;
        self
    }

    /// Resolves the program for `params`, compiling it if its key is new.
    ///
    /// Every successful call counts as one use; pair it with
    /// [`ProgramCache::release`].
    pub fn resolve(
        &mut self,
        gl: &C,
        provider: &dyn ShaderProvider,
        params: &ProgramParameters<'_>,
        info: &mut RenderInfo,
    ) -> Result<ProgramId, ProgramError> {
        let key = provider.cache_key(params);

        if let Some(id) = self.by_key.get(&key) {
            if let Some(program) = self.programs.get_mut(id) {
                program.used_times += 1;
                return Ok(*id);
            }
        }
        if let Some(failure) = self.failures.get(&key) {
            return Err(failure.clone());
        }

        let code = provider.build(params);
        match self.compile(gl, &key, params, &code) {
            Ok(program) => {
                let id = program.id;
                info!("Compiled {} for {} ({})", id, program.name, key);
                info.memory.active_uniforms += program.uniforms.active_count();
                self.by_key.insert(key, id);
                self.programs.insert(id, program);
                Ok(id)
            }
            Err(failure) => {
                if matches!(failure, ProgramError::Compile(_)) {
                    self.failures.insert(key, failure.clone());
                }
                Err(failure)
            }
        }
    }

    fn compile(
        &self,
        gl: &C,
        key: &ProgramKey,
        params: &ProgramParameters<'_>,
        code: &ShaderCode,
    ) -> Result<Program<C>, ProgramError> {
        let vertex = compile_shader(gl, ShaderStage::Vertex, &code.vertex)?;
        let fragment = match compile_shader(gl, ShaderStage::Fragment, &code.fragment) {
            Ok(shader) => shader,
            Err(e) => {
                gl.delete_shader(vertex);
                return Err(e);
            }
        };
        let handle = match gl.create_program() {
            Ok(handle) => handle,
            Err(e) => {
                gl.delete_shader(vertex);
                gl.delete_shader(fragment);
                return Err(ProgramError::Resource(e));
            }
        };

        gl.attach_shader(handle, vertex);
        gl.attach_shader(handle, fragment);
        if let Some(name) = params.index0_attribute_name {
            gl.bind_attrib_location(handle, 0, name);
        }
        gl.link_program(handle);

        if self.check_shader_errors {
            let program_log = gl.program_info_log(handle).trim().to_string();
            if !gl.program_link_status(handle) {
                let diagnostics = ProgramDiagnostics {
                    key: key.clone(),
                    program_log,
                    vertex: shader_diagnostics(gl, vertex, ShaderStage::Vertex, &code.vertex),
                    fragment: shader_diagnostics(gl, fragment, ShaderStage::Fragment, &code.fragment),
                };
                error!("Shader error: {}", diagnostics);
                gl.delete_shader(vertex);
                gl.delete_shader(fragment);
                gl.delete_program(handle);
                return Err(ProgramError::Compile(Box::new(diagnostics)));
            }
            if !program_log.is_empty() {
                warn!("Program info log for {}: {}", key, program_log);
            }
        }

        gl.delete_shader(vertex);
        gl.delete_shader(fragment);

        let attributes = gl
            .active_attributes(handle)
            .into_iter()
            .filter_map(|attribute| {
                let location = gl.attrib_location(handle, &attribute.name)?;
                Some((
                    attribute.name,
                    ProgramAttribute {
                        location,
                        location_size: attribute.atype.location_size(),
                    },
                ))
            })
            .collect();

        Ok(Program {
            id: ProgramId::next(),
            key: key.clone(),
            name: params.shader_name.to_string(),
            handle,
            attributes,
            uniforms: UniformCache::new(gl, handle),
            used_times: 1,
        })
    }

    /// Drops one use of `id`. The last release deletes the program and
    /// every binding state built for it.
    ///
    /// Returns `true` if the program was destroyed.
    pub fn release(
        &mut self,
        state: &mut GlState<C>,
        bindings: &mut BindingStateCache<C>,
        info: &mut RenderInfo,
        id: ProgramId,
    ) -> bool {
        let Some(program) = self.programs.get_mut(&id) else {
            return false;
        };
        program.used_times = program.used_times.saturating_sub(1);
        if program.used_times > 0 {
            return false;
        }

        let Some(program) = self.programs.remove(&id) else {
            return false;
        };
        self.by_key.remove(&program.key);
        bindings.release_states_of_program(state, id);
        state.delete_program(program.handle);
        info.memory.active_uniforms = info
            .memory
            .active_uniforms
            .saturating_sub(program.uniforms.active_count());
        debug!("Destroyed {} ({})", id, program.key);
        true
    }

    /// Clears the remembered failure for `key` so the next resolve compiles
    /// again. Returns `true` if a failure was recorded.
    pub fn forget_failure(&mut self, key: &ProgramKey) -> bool {
        self.failures.remove(key).is_some()
    }

    /// The recorded failure for `key`.
    pub fn failure(&self, key: &ProgramKey) -> Option<&ProgramError> {
        self.failures.get(key)
    }

    pub fn get(&self, id: ProgramId) -> Option<&Program<C>> {
        self.programs.get(&id)
    }

    pub fn get_mut(&mut self, id: ProgramId) -> Option<&mut Program<C>> {
        self.programs.get_mut(&id)
    }

    /// The live program for `key`.
    pub fn find(&self, key: &ProgramKey) -> Option<ProgramId> {
        self.by_key.get(key).copied()
    }

    /// Number of live programs.
    pub fn count(&self) -> usize {
        self.programs.len()
    }

    /// Deletes every program regardless of usage.
    pub fn dispose(&mut self, state: &mut GlState<C>, bindings: &mut BindingStateCache<C>, info: &mut RenderInfo) {
        for (id, program) in self.programs.drain() {
            bindings.release_states_of_program(state, id);
            state.delete_program(program.handle);
            info.memory.active_uniforms = info
                .memory
                .active_uniforms
                .saturating_sub(program.uniforms.active_count());
        }
        self.by_key.clear();
        self.failures.clear();
    }
}

impl<C: GpuContext> Default for ProgramCache<C> {
    fn default() -> Self {
        Self::new()
    }
}

fn compile_shader<C: GpuContext>(gl: &C, stage: ShaderStage, source: &str) -> Result<C::Shader, ProgramError> {
    let shader = gl.create_shader(stage).map_err(ProgramError::Resource)?;
    gl.shader_source(shader, source);
    gl.compile_shader(shader);
    Ok(shader)
}

fn shader_diagnostics<C: GpuContext>(gl: &C, shader: C::Shader, stage: ShaderStage, source: &str) -> ShaderDiagnostics {
    let log = if gl.shader_compile_status(shader) {
        String::new()
    } else {
        gl.shader_info_log(shader).trim().to_string()
    };
    ShaderDiagnostics {
        stage,
        log,
        numbered_source: add_line_numbers(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GlCall, HeadlessContext};
    use trellis_core::{Material, Precision, RawShaderProvider};

    fn broken() -> Material {
        Material::new("broken", "void main() {}\n#error missing body\n", "void main() {}\n")
    }

    #[test]
    fn test_shared_by_key() {
        let gl = HeadlessContext::new();
        let mut cache = ProgramCache::new();
        let mut info = RenderInfo::new();
        let material = Material::basic();
        let params = ProgramParameters::new(&material, Precision::Highp);

        let a = cache.resolve(&gl, &RawShaderProvider, &params, &mut info).unwrap();
        let b = cache.resolve(&gl, &RawShaderProvider, &params, &mut info).unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.count(), 1);
        assert_eq!(cache.get(a).unwrap().used_times(), 2);
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::LinkProgram(_))), 1);
        assert!(info.memory.active_uniforms >= 2);
    }

    #[test]
    fn test_attribute_locations() {
        let gl = HeadlessContext::new();
        let mut cache = ProgramCache::new();
        let mut info = RenderInfo::new();
        let material = Material::basic().with_index0_attribute("position");
        let params = ProgramParameters::new(&material, Precision::Highp).with_instancing(true, false);

        let id = cache.resolve(&gl, &RawShaderProvider, &params, &mut info).unwrap();
        let program = cache.get(id).unwrap();
        assert_eq!(program.attributes()["position"].location, 0);
        assert_eq!(program.attributes()["instanceMatrix"].location_size, 4);
        assert!(!program.attributes().contains_key("instanceColor"));
        assert!(gl.calls().contains(&GlCall::BindAttribLocation {
            program: program.handle(),
            index: 0,
            name: "position".into(),
        }));
    }

    #[test]
    fn test_shaders_deleted_after_link() {
        let gl = HeadlessContext::new();
        let mut cache = ProgramCache::new();
        let mut info = RenderInfo::new();
        let material = Material::basic();
        let params = ProgramParameters::new(&material, Precision::Highp);
        cache.resolve(&gl, &RawShaderProvider, &params, &mut info).unwrap();
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::DeleteShader(_))), 2);
        assert_eq!(gl.live_programs(), 1);
    }

    #[test]
    fn test_failure_is_remembered() {
        let gl = HeadlessContext::new();
        let mut cache = ProgramCache::new();
        let mut info = RenderInfo::new();
        let material = broken();
        let params = ProgramParameters::new(&material, Precision::Highp);

        let error = cache.resolve(&gl, &RawShaderProvider, &params, &mut info).unwrap_err();
        let ProgramError::Compile(diagnostics) = &error else {
            panic!("expected a compile error, got {error:?}");
        };
        assert!(diagnostics.vertex.log.contains("missing body"));
        assert!(diagnostics.vertex.numbered_source.starts_with("1: #version 300 es"));
        assert!(diagnostics.fragment.log.is_empty());
        assert_eq!(gl.live_programs(), 0);

        let links = gl.count_calls(|c| matches!(c, GlCall::LinkProgram(_)));
        assert!(cache.resolve(&gl, &RawShaderProvider, &params, &mut info).is_err());
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::LinkProgram(_))), links);

        let key = RawShaderProvider.cache_key(&params);
        assert!(cache.failure(&key).is_some());
        assert!(cache.forget_failure(&key));
        assert!(cache.resolve(&gl, &RawShaderProvider, &params, &mut info).is_err());
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::LinkProgram(_))), links + 1);
    }

    #[test]
    fn test_unchecked_link_failure_yields_empty_program() {
        let gl = HeadlessContext::new();
        let mut cache = ProgramCache::new().with_check_shader_errors(false);
        let mut info = RenderInfo::new();
        let material = broken();
        let params = ProgramParameters::new(&material, Precision::Highp);

        let id = cache.resolve(&gl, &RawShaderProvider, &params, &mut info).unwrap();
        assert!(cache.get(id).unwrap().attributes().is_empty());
    }

    #[test]
    fn test_release_destroys_on_last_use() {
        let gl = HeadlessContext::new();
        let mut state = GlState::new(gl);
        let mut bindings = BindingStateCache::new(state.gl());
        let mut cache = ProgramCache::new();
        let mut info = RenderInfo::new();
        let material = Material::basic();
        let params = ProgramParameters::new(&material, Precision::Highp);

        let id = cache.resolve(state.gl(), &RawShaderProvider, &params, &mut info).unwrap();
        cache.resolve(state.gl(), &RawShaderProvider, &params, &mut info).unwrap();
        state.use_program(Some(cache.get(id).unwrap().handle()));

        assert!(!cache.release(&mut state, &mut bindings, &mut info, id));
        assert!(cache.release(&mut state, &mut bindings, &mut info, id));
        assert_eq!(cache.count(), 0);
        assert_eq!(state.bound().program, None);
        assert_eq!(state.gl().live_programs(), 0);
        assert_eq!(info.memory.active_uniforms, 0);
        assert!(!cache.release(&mut state, &mut bindings, &mut info, id));
    }
}
