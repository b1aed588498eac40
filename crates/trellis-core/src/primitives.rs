//! Built-in geometries: tetrahedron, floor grid, axes.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::attribute::{Attribute, InterleavedBuffer};
use crate::geometry::{DrawMode, Geometry, POSITION_ATTRIBUTE};

/// Name of the per-vertex color attribute.
pub const COLOR_ATTRIBUTE: &str = "color";

/// Floor line color.
pub const FLOOR_COLOR: [f32; 3] = [0.2, 0.2, 0.3];
pub const X_AXIS_COLOR: [f32; 3] = [1.0, 0.0, 0.0];
pub const Y_AXIS_COLOR: [f32; 3] = [0.0, 1.0, 0.0];
pub const Z_AXIS_COLOR: [f32; 3] = [0.0, 0.0, 1.0];

/// Interleaved position + color vertex.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PositionColorVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl PositionColorVertex {
    /// Floats per vertex.
    pub const STRIDE: usize = 6;

    pub fn new(position: [f32; 3], color: [f32; 3]) -> Self {
        Self { position, color }
    }
}

/// Builds a geometry with interleaved `position` and `color` attributes.
pub fn interleaved_geometry(name: &str, vertices: &[PositionColorVertex], mode: DrawMode) -> Geometry {
    let floats: Vec<f32> = bytemuck::cast_slice(vertices).to_vec();
    let buffer = InterleavedBuffer::new(floats, PositionColorVertex::STRIDE);
    let position = Attribute::interleaved(&buffer, 3, 0);
    let color = Attribute::interleaved(&buffer, 3, 3);

    let mut geometry = Geometry::new(name).with_mode(mode);
    geometry.add_interleaved_buffer(buffer);
    geometry.set_attribute(POSITION_ATTRIBUTE, position);
    geometry.set_attribute(COLOR_ATTRIBUTE, color);
    geometry
}

/// Regular tetrahedron resting on the XZ plane with its apex on +Y.
///
/// `side` is the base edge length, `rotation` turns the base around Y.
/// Vertices are colored red, yellow, green and blue.
pub fn tetrahedron(side: f32, rotation: f32) -> Geometry {
    let radius = side / 3.0_f32.sqrt();
    let third = std::f32::consts::TAU / 3.0;
    let corner = |angle: f32| [radius * angle.cos(), 0.0, radius * angle.sin()];

    let [a, b, c] = [corner(rotation + third), corner(rotation + 2.0 * third), corner(rotation)];
    let positions: Vec<f32> = [a, b, c, [0.0, radius, 0.0]].concat();
    let colors: Vec<f32> = [
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
    ]
    .concat();

    Geometry::new("tetrahedron")
        .with_attribute(POSITION_ATTRIBUTE, Attribute::new(positions, 3))
        .with_attribute(COLOR_ATTRIBUTE, Attribute::new(colors, 3))
        .with_index(vec![2, 3, 1, 0, 2, 1, 0, 3, 2, 3, 0, 1])
}

/// Plane a floor grid lies in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Alignment {
    /// The YZ plane.
    X,
    /// The XZ plane.
    #[default]
    Y,
    /// The XY plane.
    Z,
}

/// Floor grid parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorConfig {
    /// Half extent of the grid.
    pub dimension: f32,
    /// Number of cells along each side.
    pub lines: u32,
    /// Offset along the alignment axis.
    pub shift: f32,
    pub alignment: Alignment,
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self {
            dimension: 50.0,
            lines: 100,
            shift: 0.0,
            alignment: Alignment::Y,
        }
    }
}

/// Generate floor grid line vertices.
///
/// The first `2 * (lines + 1)` vertices run along one in-plane axis, the
/// rest along the other.
pub fn generate_floor_vertices(config: &FloorConfig) -> Vec<PositionColorVertex> {
    let lines = config.lines.max(1);
    let a = config.dimension;
    let c = config.shift;
    let step = 2.0 * a / lines as f32;

    let aligned = |b: f32| -> [[f32; 3]; 4] {
        match config.alignment {
            Alignment::X => [[c, -a, b], [c, a, b], [c, b, -a], [c, b, a]],
            Alignment::Y => [[-a, c, b], [a, c, b], [b, c, -a], [b, c, a]],
            Alignment::Z => [[-a, b, c], [a, b, c], [b, -a, c], [b, a, c]],
        }
    };

    let mut first = Vec::with_capacity(2 * (lines as usize + 1));
    let mut second = Vec::with_capacity(2 * (lines as usize + 1));
    for l in 0..=lines {
        let [p0, p1, p2, p3] = aligned(-a + l as f32 * step);
        first.push(PositionColorVertex::new(p0, FLOOR_COLOR));
        first.push(PositionColorVertex::new(p1, FLOOR_COLOR));
        second.push(PositionColorVertex::new(p2, FLOOR_COLOR));
        second.push(PositionColorVertex::new(p3, FLOOR_COLOR));
    }
    first.extend(second);
    first
}

/// Floor grid drawn as indexed line segments.
pub fn floor(config: &FloorConfig) -> Geometry {
    let vertices = generate_floor_vertices(config);
    let indices = (0..vertices.len() as u32).collect();
    interleaved_geometry("floor", &vertices, DrawMode::Lines).with_index(indices)
}

/// Generate axis line vertices: one colored segment per axis.
pub fn generate_axis_vertices(length: f32) -> Vec<PositionColorVertex> {
    vec![
        PositionColorVertex::new([0.0, 0.0, 0.0], X_AXIS_COLOR),
        PositionColorVertex::new([length, 0.0, 0.0], X_AXIS_COLOR),
        PositionColorVertex::new([0.0, 0.0, 0.0], Y_AXIS_COLOR),
        PositionColorVertex::new([0.0, length, 0.0], Y_AXIS_COLOR),
        PositionColorVertex::new([0.0, 0.0, 0.0], Z_AXIS_COLOR),
        PositionColorVertex::new([0.0, 0.0, length], Z_AXIS_COLOR),
    ]
}

/// X, Y and Z axes as red, green and blue lines.
pub fn axes(length: f32) -> Geometry {
    let vertices = generate_axis_vertices(length);
    let positions: Vec<f32> = vertices.iter().flat_map(|v| v.position).collect();
    let colors: Vec<f32> = vertices.iter().flat_map(|v| v.color).collect();

    Geometry::new("axes")
        .with_mode(DrawMode::Lines)
        .with_attribute(POSITION_ATTRIBUTE, Attribute::new(positions, 3))
        .with_attribute(COLOR_ATTRIBUTE, Attribute::new(colors, 3))
}
