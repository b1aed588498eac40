//! Renderer configuration, persisted as RON.

use std::path::Path;

use serde::{Deserialize, Serialize};
use trellis_core::Precision;

use crate::error::ConfigError;

/// Renderer settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RendererConfig {
    /// Clear color (RGBA).
    pub clear_color: [f32; 4],
    /// Enable depth testing (`LEQUAL`).
    pub depth_test: bool,
    /// Requested shader precision; lowered if the context lacks support.
    pub precision: Precision,
    /// Query link status and collect diagnostics after linking.
    pub check_shader_errors: bool,
    /// Reset per-frame statistics at the start of every render.
    pub auto_reset_info: bool,
    /// Name of the model-view matrix uniform.
    pub model_view_uniform: String,
    /// Name of the projection matrix uniform.
    pub projection_uniform: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.10, 0.12, 0.15, 1.0],
            depth_test: true,
            precision: Precision::Highp,
            check_shader_errors: true,
            auto_reset_info: true,
            model_view_uniform: "uModelViewMatrix".to_string(),
            projection_uniform: "uProjectionMatrix".to_string(),
        }
    }
}

impl RendererConfig {
    /// Parses a RON document. Missing fields take their defaults.
    pub fn from_ron_str(content: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(content)?)
    }

    /// Loads a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_ron_str(&content)?;
        tracing::info!("Loaded renderer config from {:?}", path);
        Ok(config)
    }

    /// Serializes to pretty RON.
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Writes pretty RON to `path`, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_ron()?)?;
        tracing::info!("Saved renderer config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RendererConfig::default();
        assert!(config.auto_reset_info);
        assert_eq!(config.model_view_uniform, "uModelViewMatrix");
        assert_eq!(config.precision, Precision::Highp);
    }

    #[test]
    fn test_partial_document() {
        let config = RendererConfig::from_ron_str("(precision: mediump, depth_test: false)").unwrap();
        assert_eq!(config.precision, Precision::Mediump);
        assert!(!config.depth_test);
        assert!(config.check_shader_errors);
    }

    #[test]
    fn test_to_ron_and_back() {
        let mut config = RendererConfig::default();
        config.projection_uniform = "projection".to_string();
        let parsed = RendererConfig::from_ron_str(&config.to_ron().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_document() {
        assert!(matches!(
            RendererConfig::from_ron_str("(precision: ultra)"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            RendererConfig::load("/nonexistent/trellis/renderer.ron"),
            Err(ConfigError::Io(_))
        ));
    }
}
