//! Explicit tracking of the GPU's bound program and vertex array.

use tracing::trace;

use crate::context::GpuContext;

/// Objects currently bound on the context.
pub struct Bound<C: GpuContext> {
    pub vertex_array: Option<C::VertexArray>,
    pub program: Option<C::Program>,
}

impl<C: GpuContext> Default for Bound<C> {
    fn default() -> Self {
        Self {
            vertex_array: None,
            program: None,
        }
    }
}

impl<C: GpuContext> Clone for Bound<C> {
    fn clone(&self) -> Self {
        Self {
            vertex_array: self.vertex_array,
            program: self.program,
        }
    }
}

impl<C: GpuContext> std::fmt::Debug for Bound<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bound")
            .field("vertex_array", &self.vertex_array)
            .field("program", &self.program)
            .finish()
    }
}

/// The GPU context plus its bound-object record.
///
/// All program and vertex-array binds go through here, so a bind for an
/// object that is already bound never reaches the driver.
pub struct GlState<C: GpuContext> {
    gl: C,
    bound: Bound<C>,
}

impl<C: GpuContext> GlState<C> {
    pub fn new(gl: C) -> Self {
        Self {
            gl,
            bound: Bound::default(),
        }
    }

    /// The underlying context.
    pub fn gl(&self) -> &C {
        &self.gl
    }

    pub fn bound(&self) -> &Bound<C> {
        &self.bound
    }

    /// Makes `program` current. Returns `true` if a call was issued.
    pub fn use_program(&mut self, program: Option<C::Program>) -> bool {
        if self.bound.program == program {
            return false;
        }
        trace!("use_program {:?}", program);
        self.gl.use_program(program);
        self.bound.program = program;
        true
    }

    /// Binds `vertex_array`. Returns `true` if a call was issued.
    pub fn bind_vertex_array(&mut self, vertex_array: Option<C::VertexArray>) -> bool {
        if self.bound.vertex_array == vertex_array {
            return false;
        }
        trace!("bind_vertex_array {:?}", vertex_array);
        self.gl.bind_vertex_array(vertex_array);
        self.bound.vertex_array = vertex_array;
        true
    }

    /// Deletes a program, forgetting it if bound.
    pub fn delete_program(&mut self, program: C::Program) {
        if self.bound.program == Some(program) {
            self.bound.program = None;
        }
        self.gl.delete_program(program);
    }

    /// Deletes a vertex array, forgetting it if bound.
    pub fn delete_vertex_array(&mut self, vertex_array: C::VertexArray) {
        if self.bound.vertex_array == Some(vertex_array) {
            self.bound.vertex_array = None;
        }
        self.gl.delete_vertex_array(vertex_array);
    }

    /// Consumes the state, returning the context.
    pub fn into_inner(self) -> C {
        self.gl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GlCall, HeadlessContext};

    #[test]
    fn test_redundant_binds_are_skipped() {
        let mut state = GlState::new(HeadlessContext::new());
        assert!(state.use_program(Some(3)));
        assert!(!state.use_program(Some(3)));
        assert!(state.bind_vertex_array(Some(7)));
        assert!(!state.bind_vertex_array(Some(7)));
        assert!(state.bind_vertex_array(None));

        let calls = state.gl().calls();
        assert_eq!(
            calls,
            vec![
                GlCall::UseProgram(Some(3)),
                GlCall::BindVertexArray(Some(7)),
                GlCall::BindVertexArray(None),
            ]
        );
    }

    #[test]
    fn test_delete_forgets_binding() {
        let mut state = GlState::new(HeadlessContext::new());
        let vao = state.gl().create_vertex_array().unwrap();
        state.bind_vertex_array(Some(vao));
        state.delete_vertex_array(vao);
        assert!(state.bound().vertex_array.is_none());
        // binding a fresh array after deletion must reach the driver
        assert!(state.bind_vertex_array(Some(vao + 1)));
    }
}
