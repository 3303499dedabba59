//! Error types for the collaborator boundary.

use thiserror::Error;

/// Errors raised by sensor, input or renderer collaborators.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The sensor produced no usable data this tick (disconnected, warming up)
    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(String),
}

impl EnvError {
    /// Creates a sensor-unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::SensorUnavailable(msg.into())
    }
}
