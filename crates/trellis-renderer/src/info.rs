//! Per-renderer statistics.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::warn;
use trellis_core::DrawMode;

/// Length of the window fps is sampled over.
const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Live GPU object counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryInfo {
    pub geometries: usize,
    pub textures: usize,
    pub active_uniforms: usize,
}

/// Counters for the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameInfo {
    /// Frames started so far.
    pub frame: u64,
    pub calls: u64,
    pub triangles: u64,
    pub lines: u64,
    pub points: u64,
    pub uniform_calls: u64,
    /// Frames counted in the last full one-second window.
    pub fps: u64,
}

/// Draw and memory statistics of one renderer.
#[derive(Debug, Clone, Serialize)]
pub struct RenderInfo {
    pub memory: MemoryInfo,
    pub render: FrameInfo,
    /// Live compiled programs.
    pub programs: usize,
    #[serde(skip)]
    window: Option<(Instant, u64)>,
}

impl RenderInfo {
    pub fn new() -> Self {
        Self {
            memory: MemoryInfo::default(),
            render: FrameInfo::default(),
            programs: 0,
            window: None,
        }
    }

    /// Accounts for one draw call of `count` elements drawn `instances` times.
    ///
    /// Strip and fan topologies are not classified; they count as a call
    /// with a warning.
    pub fn update(&mut self, count: u32, mode: DrawMode, instances: u32) {
        let count = u64::from(count);
        let instances = u64::from(instances);
        self.render.calls += 1;
        match mode {
            DrawMode::Triangles => self.render.triangles += instances * (count / 3),
            DrawMode::Lines => self.render.lines += instances * (count / 2),
            DrawMode::LineStrip => self.render.lines += instances * count.saturating_sub(1),
            DrawMode::LineLoop => self.render.lines += instances * count,
            DrawMode::Points => self.render.points += instances * count,
            DrawMode::TriangleStrip | DrawMode::TriangleFan => {
                warn!("Unknown draw mode: {:?}", mode);
            }
        }
    }

    /// Accounts for one uniform upload.
    pub fn update_uniforms(&mut self) {
        self.render.uniform_calls += 1;
    }

    /// Starts a new frame: bumps the frame counter, samples fps and zeroes
    /// the per-frame counters.
    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    /// [`reset`](Self::reset) with an explicit clock reading.
    pub fn reset_at(&mut self, now: Instant) {
        self.render.frame += 1;
        match self.window {
            Some((start, frames)) if now.duration_since(start) > FPS_WINDOW => {
                self.render.fps = self.render.frame - frames;
                self.window = Some((now, self.render.frame));
            }
            Some(_) => {}
            None => {
                self.render.fps = self.render.frame;
                self.window = Some((now, self.render.frame));
            }
        }
        self.render.calls = 0;
        self.render.triangles = 0;
        self.render.lines = 0;
        self.render.points = 0;
        self.render.uniform_calls = 0;
    }
}

impl Default for RenderInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RenderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "active uniforms: {}", self.memory.active_uniforms)?;
        writeln!(f, "uniform calls: {}", self.render.uniform_calls)?;
        writeln!(f, "fps: {}", self.render.fps)?;
        writeln!(f, "draw calls: {}", self.render.calls)?;
        writeln!(f, "triangles: {}", self.render.triangles)?;
        writeln!(f, "points: {}", self.render.points)?;
        writeln!(f, "lines: {}", self.render.lines)?;
        writeln!(f, "geometries: {}", self.memory.geometries)?;
        writeln!(f, "textures: {}", self.memory.textures)?;
        write!(f, "programs: {}", self.programs)
    }
}
