//! Error types.

use std::fmt;

use thiserror::Error;
use trellis_core::{AttributeId, GeometryId, ProgramKey};
use uuid::Uuid;

use crate::context::ShaderStage;

/// Compiler output for one shader stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDiagnostics {
    pub stage: ShaderStage,
    /// Shader info log, trimmed.
    pub log: String,
    /// The submitted source with `N: ` line-number prefixes.
    pub numbered_source: String,
}

/// Everything known about a failed program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDiagnostics {
    pub key: ProgramKey,
    /// Program info log, trimmed.
    pub program_log: String,
    pub vertex: ShaderDiagnostics,
    pub fragment: ShaderDiagnostics,
}

impl fmt::Display for ProgramDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "program {}: {}", self.key, self.program_log)?;
        for shader in [&self.vertex, &self.fragment] {
            if !shader.log.is_empty() {
                writeln!(f, "{} shader: {}", shader.stage.name(), shader.log)?;
                writeln!(f, "{}", shader.numbered_source)?;
            }
        }
        Ok(())
    }
}

/// Prefixes each line of `source` with its 1-based number.
pub fn add_line_numbers(source: &str) -> String {
    source
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{}: {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Program creation errors.
#[derive(Debug, Clone, Error)]
pub enum ProgramError {
    #[error("Program failed to link: {}", .0.program_log)]
    Compile(Box<ProgramDiagnostics>),

    #[error("Program resource error: {0}")]
    Resource(String),
}

/// Per-object rendering errors.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error(transparent)]
    Program(#[from] ProgramError),

    #[error("Geometry not found: {0}")]
    MissingGeometry(GeometryId),

    #[error("Attribute {attribute} has no backing buffer in its geometry")]
    MissingBufferData { attribute: AttributeId },

    #[error("GPU resource error: {0}")]
    Resource(String),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

/// A per-object failure collected during a frame.
#[derive(Debug, Clone)]
pub struct ObjectFailure {
    pub object: Uuid,
    pub error: RenderError,
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_line_numbers() {
        assert_eq!(add_line_numbers("a\nb"), "1: a\n2: b");
    }

    #[test]
    fn test_program_error_converts() {
        let error: RenderError = ProgramError::Resource("no context".into()).into();
        assert!(matches!(error, RenderError::Program(ProgramError::Resource(_))));
        assert_eq!(error.to_string(), "Program resource error: no context");
    }
}
