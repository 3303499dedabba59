//! Magic Mirror Core - Perspective-Correct Virtual Mirror Camera
//!
//! A screen behind a half-silvered mirror can only line up rendered content
//! with the viewer's reflection if the render camera sees the scene from
//! where the reflection of the viewer's eye would be. This library derives
//! that camera every frame:
//! 1. **Tracking**: pick the nearest body inside the capture volume
//! 2. **Projection**: level and translate sensor joints into mirror space
//! 3. **Camera**: reflect the head through the mirror plane and aim at the
//!    mirror center with a FOV matching the mirror's vertical extent
//!
//! Calibration lives in a persistent key/value store and fine offsets can be
//! nudged live through the debug overlay.

pub mod calibration;
pub mod camera;
pub mod config;
pub mod overlay;
pub mod projection;
pub mod session;
pub mod tracking;

// Re-export key types for convenience
pub use calibration::{
    CalibrationError, CalibrationParameters, CalibrationStorage, CalibrationStore, JsonFileStorage,
    SledCalibrationStorage,
};
pub use camera::{MirrorCameraModel, MirrorGeometry, FALLBACK_FOV_DEGREES};
pub use config::{ConfigError, SessionConfig};
pub use overlay::{CalibrationReadout, DebugOverlay};
pub use projection::{tilt_from_normal, JointProjector, ProjectedSkeleton, SensorPose};
pub use session::{MirrorRuntime, MirrorSession, RuntimeStats, TickContext, TickOutput};
pub use tracking::{ActiveTarget, CaptureVolume, TargetTracker};
