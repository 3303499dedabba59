//! Sensor collaborator: per-tick body snapshots and the floor plane.

use crate::error::EnvError;
use crate::types::TrackedBody;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Floor plane detected by the sensor, `normal · p + w = 0` in sensor space.
///
/// `w` is the sensor's height above the floor in metres. A sensor that has
/// not found the floor yet reports an all-zero plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FloorPlane {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl FloorPlane {
    /// Creates a floor plane from its normal and offset.
    pub fn new(normal: Vector3<f64>, w: f64) -> Self {
        Self {
            x: normal.x,
            y: normal.y,
            z: normal.z,
            w,
        }
    }

    /// Plane seen by a sensor mounted `height` metres above the floor and
    /// pitched by `pitch_degrees` about its X axis (positive = looking down).
    pub fn for_mounting(height: f64, pitch_degrees: f64) -> Self {
        let pitch = pitch_degrees.to_radians();
        Self::new(Vector3::new(0.0, pitch.cos(), -pitch.sin()), height)
    }

    /// The plane normal.
    pub fn normal(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Whether the sensor has found the floor.
    pub fn is_detected(&self) -> bool {
        self.w != 0.0
    }
}

/// Everything the sensor reports for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorFrame {
    /// All body slots, tracked or not, in sensor order
    pub bodies: Vec<TrackedBody>,

    /// Latest floor-plane reading
    pub floor: FloorPlane,
}

impl SensorFrame {
    /// Creates a frame.
    pub fn new(bodies: Vec<TrackedBody>, floor: FloorPlane) -> Self {
        Self { bodies, floor }
    }

    /// Number of body slots currently tracked.
    pub fn tracked_count(&self) -> usize {
        self.bodies.iter().filter(|b| b.is_tracked).count()
    }
}

/// A depth/body sensor.
///
/// The core never manages the connection lifecycle; it only asks for the
/// latest frame once per tick.
pub trait BodySource {
    /// Returns a new frame if one arrived since the last call.
    ///
    /// `Ok(None)` means no new data this tick; callers keep using the
    /// previous frame.
    fn acquire_latest(&mut self) -> Result<Option<SensorFrame>, EnvError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JointType;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_floor_not_detected() {
        let floor = FloorPlane::default();
        assert!(!floor.is_detected());
        assert_eq!(floor.normal(), Vector3::zeros());
    }

    #[test]
    fn test_floor_for_mounting() {
        let floor = FloorPlane::for_mounting(0.8, 0.0);
        assert!(floor.is_detected());
        assert_relative_eq!(floor.normal(), Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);

        let tilted = FloorPlane::for_mounting(0.8, 90.0);
        assert_relative_eq!(tilted.normal().z, -1.0, epsilon = 1e-12);
        assert_relative_eq!(tilted.normal().norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_tracked_count() {
        let frame = SensorFrame::new(
            vec![TrackedBody::untracked(0), TrackedBody::new(1, [Vector3::zeros(); JointType::COUNT])],
            FloorPlane::default(),
        );
        assert_eq!(frame.tracked_count(), 1);
    }
}
