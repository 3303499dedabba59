//! MirrorBody Environment Boundary
//!
//! This crate holds everything the camera model exchanges with the outside
//! world, so that the same core runs against a real body sensor and render
//! engine in production, or against the seeded harness in `mirror_sim`.
//!
//! # Collaborators
//!
//! - **Sensor** ([`BodySource`]): per-tick snapshot of tracked bodies plus the
//!   detected floor plane
//! - **Input** ([`InputSource`]): debug toggle and the four offset nudges
//! - **Renderer** ([`CameraSink`], [`MarkerSink`]): consumes the camera pose
//!   and optional debug markers
//!
//! # Example
//!
//! ```ignore
//! use mirror_env::{BodySource, InputSource};
//!
//! fn frame_loop<B: BodySource, I: InputSource>(sensor: &mut B, input: &mut I) {
//!     loop {
//!         let signals = input.poll();
//!         if let Ok(Some(frame)) = sensor.acquire_latest() {
//!             tick(&frame, &signals);
//!         }
//!     }
//! }
//! ```

mod error;
mod input;
mod render;
mod sensor;
mod types;

pub use error::EnvError;
pub use input::{InputSignals, InputSource, NudgeDirection};
pub use render::{CameraPose, CameraSink, JointMarker, MarkerSink};
pub use sensor::{BodySource, FloorPlane, SensorFrame};
pub use types::{JointType, TrackedBody};
