//! Session configuration.

use crate::tracking::CaptureVolume;
use mirror_env::JointType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors reading a session configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Configuration for a MirrorSession.
///
/// Every field has a default, so a config file only needs the fields it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Region in which a body can become the target (default: 1.75..3.25m deep, ±0.75m wide)
    pub capture_volume: CaptureVolume,

    /// Joint used for capture filtering and as the eye point (default: Head)
    pub reference_joint: JointType,

    /// Fine-offset change per nudge signal (default: 0.005m)
    pub nudge_step: f64,

    /// Debug marker radius (default: 0.02m)
    pub marker_radius: f64,

    /// Drop the selected body when nobody is in the capture volume
    /// instead of keeping the last one (default: false)
    pub clear_stale_selection: bool,

    /// Start with the debug overlay enabled (default: false)
    pub debug_on_start: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture_volume: CaptureVolume::default(),
            reference_joint: JointType::Head,
            nudge_step: 0.005,
            marker_radius: 0.02,
            clear_stale_selection: false,
            debug_on_start: false,
        }
    }
}

impl SessionConfig {
    /// Loads a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: SessionConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks bounds ordering and step sizes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let volume = &self.capture_volume;
        if !(volume.near <= volume.far) {
            return Err(ConfigError::Invalid(format!(
                "capture near ({}) must not exceed far ({})",
                volume.near, volume.far
            )));
        }
        if !(volume.side >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "capture side must be >= 0, got {}",
                volume.side
            )));
        }
        if !(self.nudge_step > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "nudge step must be > 0, got {}",
                self.nudge_step
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.capture_volume.near, 1.75);
        assert_eq!(config.capture_volume.far, 3.25);
        assert_eq!(config.capture_volume.side, 0.75);
        assert_eq!(config.reference_joint, JointType::Head);
        assert_eq!(config.nudge_step, 0.005);
        assert!(!config.clear_stale_selection);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "clear_stale_selection": true, "nudge_step": 0.01 }"#).unwrap();
        assert!(config.clear_stale_selection);
        assert_eq!(config.nudge_step, 0.01);
        assert_eq!(config.capture_volume, CaptureVolume::default());
    }

    #[test]
    fn test_validate_rejects_inverted_volume() {
        let config = SessionConfig {
            capture_volume: CaptureVolume {
                near: 3.0,
                far: 2.0,
                side: 0.5,
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
