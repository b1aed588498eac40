//! Vertex array objects per (geometry, program, wireframe) triple.
//!
//! Each state remembers which attribute objects its layout was built from.
//! A state is only re-specified when that record no longer matches the
//! geometry, so steady frames issue a single vertex array bind per object.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::{debug, trace, warn};
use trellis_core::{
    Attribute, AttributeId, AttributeSource, BufferData, BufferId, DataType, Geometry, GeometryId, RenderObject,
};

use crate::cache::attributes::AttributeCache;
use crate::cache::programs::{Program, ProgramId};
use crate::context::{BufferTarget, GpuContext};
use crate::error::{RenderError, RenderResult};
use crate::state::GlState;

/// What a state's layout was built from, per program attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CachedAttribute {
    attribute: Option<AttributeId>,
    data: Option<BufferId>,
}

/// A vertex array and the layout record it was built from.
pub struct BindingState<C: GpuContext> {
    /// `None` for the context's default vertex array.
    vertex_array: Option<C::VertexArray>,
    attributes: HashMap<String, CachedAttribute>,
    attributes_num: usize,
    index: Option<BufferId>,
    new_attributes: Vec<bool>,
    enabled_attributes: Vec<bool>,
    attribute_divisors: Vec<u32>,
}

impl<C: GpuContext> BindingState<C> {
    fn new(vertex_array: Option<C::VertexArray>, max_vertex_attributes: usize) -> Self {
        Self {
            vertex_array,
            attributes: HashMap::new(),
            attributes_num: 0,
            index: None,
            new_attributes: vec![false; max_vertex_attributes],
            enabled_attributes: vec![false; max_vertex_attributes],
            attribute_divisors: vec![0; max_vertex_attributes],
        }
    }

    pub fn vertex_array(&self) -> Option<C::VertexArray> {
        self.vertex_array
    }

    /// Whether slot `index` is enabled on this vertex array.
    pub fn is_enabled(&self, index: u32) -> bool {
        self.enabled_attributes.get(index as usize).copied().unwrap_or(false)
    }

    fn init_attributes(&mut self) {
        self.new_attributes.fill(false);
    }

    /// Whether `count` slots starting at `location` exist.
    fn fits(&self, location: u32, count: u32) -> bool {
        (location as usize).saturating_add(count as usize) <= self.new_attributes.len()
    }

    fn enable_attribute(&mut self, gl: &C, index: u32, divisor: u32) {
        let slot = index as usize;
        self.new_attributes[slot] = true;
        if !self.enabled_attributes[slot] {
            gl.enable_vertex_attrib_array(index);
            self.enabled_attributes[slot] = true;
        }
        if self.attribute_divisors[slot] != divisor {
            gl.vertex_attrib_divisor(index, divisor);
            self.attribute_divisors[slot] = divisor;
        }
    }

    fn disable_unused_attributes(&mut self, gl: &C) {
        for (slot, (enabled, wanted)) in self.enabled_attributes.iter_mut().zip(&self.new_attributes).enumerate() {
            if *enabled != *wanted {
                gl.disable_vertex_attrib_array(slot as u32);
                *enabled = false;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StateKey {
    Default,
    Keyed {
        geometry: GeometryId,
        program: ProgramId,
        wireframe: bool,
    },
}

/// The attribute an object supplies for a program attribute: the geometry's
/// own, or the object's per-instance data.
fn object_attribute<'a>(
    geometry: &'a Geometry,
    object: &'a RenderObject,
    name: &str,
) -> Option<&'a Attribute> {
    geometry
        .attribute(name)
        .or_else(|| object.instancing().and_then(|instancing| instancing.attribute(name)))
}

/// Vertex array states for every geometry/program pair drawn so far.
pub struct BindingStateCache<C: GpuContext> {
    max_vertex_attributes: usize,
    default_state: BindingState<C>,
    states: HashMap<GeometryId, HashMap<ProgramId, HashMap<bool, BindingState<C>>>>,
    current: StateKey,
    force_update: bool,
    /// Constant value last set per slot. Context state, shared by every
    /// vertex array.
    attribute_defaults: Vec<Option<Vec<f32>>>,
}

impl<C: GpuContext> BindingStateCache<C> {
    pub fn new(gl: &C) -> Self {
        let max_vertex_attributes = gl.max_vertex_attribs() as usize;
        Self {
            max_vertex_attributes,
            default_state: BindingState::new(None, max_vertex_attributes),
            states: HashMap::new(),
            current: StateKey::Default,
            force_update: false,
            attribute_defaults: vec![None; max_vertex_attributes],
        }
    }

    /// Binds the state for `object` drawn with `program` and re-specifies its
    /// attribute layout when needed. `index` is the element buffer to draw
    /// with, already chosen for the material's wireframe flag.
    ///
    /// Returns `true` if the layout was re-specified.
    pub fn setup(
        &mut self,
        state: &mut GlState<C>,
        attributes: &mut AttributeCache<C>,
        object: &RenderObject,
        program: &Program<C>,
        geometry: &Geometry,
        index: Option<&BufferData>,
    ) -> RenderResult<bool> {
        let geometry_id = geometry.id();
        let program_id = program.id();
        let wireframe = object.is_wireframe();
        let key = StateKey::Keyed {
            geometry: geometry_id,
            program: program_id,
            wireframe,
        };

        let by_wireframe = self.states.entry(geometry_id).or_default().entry(program_id).or_default();
        let binding = match by_wireframe.entry(wireframe) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let vertex_array = state.gl().create_vertex_array().map_err(RenderError::Resource)?;
                debug!("Created vertex array for {} with {}", geometry_id, program_id);
                entry.insert(BindingState::new(Some(vertex_array), self.max_vertex_attributes))
            }
        };

        if self.current != key {
            self.current = key;
            state.bind_vertex_array(binding.vertex_array);
        }

        let mut update_buffers = needs_update(binding, object, program, geometry, index);
        if update_buffers {
            save_cache(binding, object, program, geometry, index);
        }
        if object.is_instanced() {
            update_buffers = true;
        }

        if let Some(index) = index {
            attributes.update(state.gl(), index, BufferTarget::ElementArray)?;
        }

        if update_buffers || self.force_update {
            self.force_update = false;
            trace!("Specifying vertex layout of {} for {}", geometry.id(), program.id());
            setup_vertex_attributes(state.gl(), binding, attributes, object, program, geometry)?;
            if let Some(index) = index {
                let buffer = attributes
                    .get(index.id())
                    .ok_or_else(|| RenderError::Resource(format!("index buffer {} missing", index.id())))?;
                state.gl().bind_buffer(BufferTarget::ElementArray, Some(buffer.buffer));
            }
        }
        apply_attribute_defaults(state.gl(), &mut self.attribute_defaults, object, program, geometry);

        Ok(update_buffers)
    }

    /// Deletes every state built for `geometry`.
    pub fn release_states_of_geometry(&mut self, state: &mut GlState<C>, geometry: GeometryId) {
        let Some(by_program) = self.states.remove(&geometry) else {
            return;
        };
        for binding in by_program.into_values().flat_map(HashMap::into_values) {
            if let Some(vertex_array) = binding.vertex_array {
                state.delete_vertex_array(vertex_array);
            }
        }
        if matches!(self.current, StateKey::Keyed { geometry: g, .. } if g == geometry) {
            self.current = StateKey::Default;
        }
        debug!("Released binding states of {}", geometry);
    }

    /// Deletes every state built for `program`.
    pub fn release_states_of_program(&mut self, state: &mut GlState<C>, program: ProgramId) {
        for by_program in self.states.values_mut() {
            let Some(by_wireframe) = by_program.remove(&program) else {
                continue;
            };
            for binding in by_wireframe.into_values() {
                if let Some(vertex_array) = binding.vertex_array {
                    state.delete_vertex_array(vertex_array);
                }
            }
        }
        self.states.retain(|_, by_program| !by_program.is_empty());
        if matches!(self.current, StateKey::Keyed { program: p, .. } if p == program) {
            self.current = StateKey::Default;
        }
    }

    /// Returns to the default vertex array and forces the next setup to
    /// re-specify its layout.
    pub fn reset(&mut self, state: &mut GlState<C>) {
        self.force_update = true;
        self.attribute_defaults.fill(None);
        if self.current == StateKey::Default {
            return;
        }
        self.current = StateKey::Default;
        state.bind_vertex_array(self.default_state.vertex_array);
    }

    /// Resets and deletes every state.
    pub fn dispose(&mut self, state: &mut GlState<C>) {
        self.reset(state);
        for binding in self
            .states
            .drain()
            .flat_map(|(_, by_program)| by_program.into_values())
            .flat_map(HashMap::into_values)
        {
            if let Some(vertex_array) = binding.vertex_array {
                state.delete_vertex_array(vertex_array);
            }
        }
    }

    /// The state built for the triple, if any.
    pub fn state(&self, geometry: GeometryId, program: ProgramId, wireframe: bool) -> Option<&BindingState<C>> {
        self.states.get(&geometry)?.get(&program)?.get(&wireframe)
    }

    /// Number of states held, not counting the default one.
    pub fn len(&self) -> usize {
        self.states
            .values()
            .flat_map(HashMap::values)
            .map(HashMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn needs_update<C: GpuContext>(
    binding: &BindingState<C>,
    object: &RenderObject,
    program: &Program<C>,
    geometry: &Geometry,
    index: Option<&BufferData>,
) -> bool {
    let mut attributes_num = 0;
    for name in program.attributes().keys() {
        let Some(cached) = binding.attributes.get(name) else {
            return true;
        };
        let attribute = object_attribute(geometry, object, name);
        if cached.attribute != attribute.map(|a| a.id()) {
            return true;
        }
        if attribute.is_some() && cached.data != attribute.map(|a| a.data_id()) {
            return true;
        }
        attributes_num += 1;
    }
    binding.attributes_num != attributes_num || binding.index != index.map(BufferData::id)
}

fn save_cache<C: GpuContext>(
    binding: &mut BindingState<C>,
    object: &RenderObject,
    program: &Program<C>,
    geometry: &Geometry,
    index: Option<&BufferData>,
) {
    binding.attributes = program
        .attributes()
        .keys()
        .map(|name| {
            let attribute = object_attribute(geometry, object, name);
            (
                name.clone(),
                CachedAttribute {
                    attribute: attribute.map(|a| a.id()),
                    data: attribute.map(|a| a.data_id()),
                },
            )
        })
        .collect();
    binding.attributes_num = binding.attributes.len();
    binding.index = index.map(BufferData::id);
}

fn setup_vertex_attributes<C: GpuContext>(
    gl: &C,
    binding: &mut BindingState<C>,
    attributes: &AttributeCache<C>,
    object: &RenderObject,
    program: &Program<C>,
    geometry: &Geometry,
) -> RenderResult<()> {
    binding.init_attributes();

    for (name, program_attribute) in program.attributes() {
        let location = program_attribute.location;
        let location_size = program_attribute.location_size.max(1);

        if !binding.fits(location, location_size) {
            warn!(
                "Attribute {} at location {} exceeds the {} available slots",
                name,
                location,
                binding.new_attributes.len()
            );
            continue;
        }
        let Some(attribute) = object_attribute(geometry, object, name) else {
            continue;
        };

        // Not uploaded (yet, or after a context loss): leave the slot alone.
        let Some(buffer) = attributes.get(attribute.data_id()) else {
            trace!("Attribute {} has no GPU buffer, skipped", name);
            continue;
        };

        let size = attribute.item_size() as i32;
        let bytes_per_element = buffer.bytes_per_element as i32;
        let integer = matches!(buffer.data_type, DataType::Int | DataType::UnsignedInt);
        let divisor = attribute.step().divisor();

        let (stride, offset) = match attribute.source() {
            AttributeSource::Interleaved { stride, offset, .. } => {
                (*stride as i32 * bytes_per_element, *offset as i32 * bytes_per_element)
            }
            AttributeSource::Owned(_) => (size * bytes_per_element, 0),
        };

        for i in 0..location_size {
            binding.enable_attribute(gl, location + i, divisor);
        }
        gl.bind_buffer(BufferTarget::Array, Some(buffer.buffer));

        let slot_size = size / location_size as i32;
        for i in 0..location_size {
            let slot_offset = offset + slot_size * i as i32 * bytes_per_element;
            if integer {
                gl.vertex_attrib_pointer_i32(location + i, slot_size, buffer.data_type, stride, slot_offset);
            } else {
                gl.vertex_attrib_pointer_f32(
                    location + i,
                    slot_size,
                    buffer.data_type,
                    attribute.normalized(),
                    stride,
                    slot_offset,
                );
            }
        }
    }

    binding.disable_unused_attributes(gl);
    Ok(())
}

/// Sets the material's constant value for every program attribute the
/// object does not supply. Runs on every setup since constant values are not
/// part of vertex array state; slots already holding the value are skipped.
fn apply_attribute_defaults<C: GpuContext>(
    gl: &C,
    defaults: &mut [Option<Vec<f32>>],
    object: &RenderObject,
    program: &Program<C>,
    geometry: &Geometry,
) {
    for (name, value) in &object.material.default_attribute_values {
        let Some(program_attribute) = program.attributes().get(name) else {
            continue;
        };
        if object_attribute(geometry, object, name).is_some() {
            continue;
        }
        if !(1..=4).contains(&value.len()) {
            warn!("Default value of attribute {} has {} components", name, value.len());
            continue;
        }
        let Some(current) = defaults.get_mut(program_attribute.location as usize) else {
            continue;
        };
        if current.as_deref() != Some(value.as_slice()) {
            gl.vertex_attrib_default(program_attribute.location, value);
            *current = Some(value.clone());
        }
    }
}
