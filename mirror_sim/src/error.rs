//! Simulator errors.

use mirror_core::{CalibrationError, ConfigError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Export failed: {0}")]
    Export(#[from] std::io::Error),

    #[error("Invalid arguments: {0}")]
    Usage(String),
}
