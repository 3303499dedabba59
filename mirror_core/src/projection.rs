//! The "PROJECTION" Engine - sensor space to mirror space
//!
//! The sensor sits somewhere in front of the mirror and is rarely level.
//! Joints are translated by the calibrated sensor position, then rotated
//! about the world X axis by the sensor's pitch:
//!
//! ```text
//! mirror = R_x(tilt) · (raw + sensor_position)
//! ```
//!
//! The pitch comes from the floor plane the sensor reports every frame, so
//! the pose is rebuilt each tick and nothing here is cached.

use crate::calibration::CalibrationParameters;
use mirror_env::{FloorPlane, JointType, TrackedBody};
use nalgebra::{Rotation3, Vector3};
use tracing::warn;

// ============================================================================
// SENSOR POSE
// ============================================================================

/// Where the sensor is and how far it is pitched, for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorPose {
    /// Sensor origin in mirror space
    pub position: Vector3<f64>,

    /// Rotation about X that levels the sensor, in degrees
    pub tilt_degrees: f64,
}

impl SensorPose {
    /// A level sensor at the mirror origin.
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            tilt_degrees: 0.0,
        }
    }

    /// Derives the pose from the latest floor reading and calibration.
    ///
    /// X carries the fine X offset, Y is the floor offset plus the fine Y
    /// offset, Z is the installed depth.
    pub fn from_floor(floor: &FloorPlane, params: &CalibrationParameters) -> Self {
        Self {
            position: Vector3::new(
                params.sensor_position_x + params.fine_offset_x,
                floor.w + params.fine_offset_y,
                params.sensor_position_z,
            ),
            tilt_degrees: tilt_from_normal(&floor.normal()),
        }
    }

    /// The leveling rotation.
    #[inline]
    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::from_axis_angle(&Vector3::x_axis(), self.tilt_degrees.to_radians())
    }
}

impl Default for SensorPose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Pitch (degrees) of the smallest rotation taking `normal` onto world up.
///
/// Uses the engine's Y·X·Z Euler convention, where the X angle is
/// `asin(-m[1][2])`. A zero normal (floor not found) is level. A normal
/// pointing straight down has no unique minimal rotation and is treated as
/// level too.
pub fn tilt_from_normal(normal: &Vector3<f64>) -> f64 {
    match Rotation3::rotation_between(normal, &Vector3::y()) {
        Some(rotation) => {
            let m = rotation.matrix();
            // Adding 0.0 turns the -0.0 of a level reading into +0.0
            (-m[(1, 2)]).clamp(-1.0, 1.0).asin().to_degrees() + 0.0
        }
        None => {
            warn!("Floor normal {:?} points away from up; assuming level sensor", normal);
            0.0
        }
    }
}

// ============================================================================
// JOINT PROJECTOR
// ============================================================================

/// Every joint of one body in mirror space.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedSkeleton {
    pub tracking_id: u64,
    pub joints: [Vector3<f64>; JointType::COUNT],
}

impl ProjectedSkeleton {
    /// Mirror-space position of a joint.
    #[inline]
    pub fn joint(&self, joint: JointType) -> Vector3<f64> {
        self.joints[joint.index()]
    }

    /// `(joint, position)` pairs in joint order.
    pub fn iter(&self) -> impl Iterator<Item = (JointType, Vector3<f64>)> + '_ {
        JointType::ALL.iter().map(move |&j| (j, self.joint(j)))
    }
}

/// Pure sensor-to-mirror transforms.
pub struct JointProjector;

impl JointProjector {
    /// Projects one raw sensor-space position into mirror space.
    #[inline]
    pub fn project(raw: &Vector3<f64>, pose: &SensorPose) -> Vector3<f64> {
        pose.rotation() * (raw + pose.position)
    }

    /// Exact inverse of [`JointProjector::project`].
    #[inline]
    pub fn unproject(mirror: &Vector3<f64>, pose: &SensorPose) -> Vector3<f64> {
        pose.rotation().inverse() * mirror - pose.position
    }

    /// Projects every joint of a body.
    pub fn project_body(body: &TrackedBody, pose: &SensorPose) -> ProjectedSkeleton {
        let rotation = pose.rotation();
        let mut joints = [Vector3::zeros(); JointType::COUNT];
        for (out, raw) in joints.iter_mut().zip(body.joints.iter()) {
            *out = rotation * (raw + pose.position);
        }
        ProjectedSkeleton {
            tracking_id: body.tracking_id,
            joints,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn params_with(sensor_x: f64, sensor_z: f64, offset_x: f64, offset_y: f64) -> CalibrationParameters {
        CalibrationParameters {
            sensor_position_x: sensor_x,
            sensor_position_z: sensor_z,
            fine_offset_x: offset_x,
            fine_offset_y: offset_y,
            mirror_width: 1.0,
            mirror_height: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_identity_pose_is_passthrough() {
        let raw = Vector3::new(0.3, 1.2, 2.4);
        let projected = JointProjector::project(&raw, &SensorPose::identity());
        assert_relative_eq!(projected, raw, epsilon = 1e-12);
    }

    #[test]
    fn test_sensor_position_from_floor() {
        let floor = FloorPlane::for_mounting(0.85, 0.0);
        let pose = SensorPose::from_floor(&floor, &params_with(0.1, -0.2, 0.015, -0.005));

        assert_relative_eq!(pose.position, Vector3::new(0.115, 0.845, -0.2), epsilon = 1e-12);
        assert_relative_eq!(pose.tilt_degrees, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_tilt_matches_mounting_pitch() {
        for pitch in [-20.0, -5.0, 3.5, 12.0, 30.0] {
            let floor = FloorPlane::for_mounting(1.0, pitch);
            assert_relative_eq!(tilt_from_normal(&floor.normal()), pitch, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_tilt_ignores_normal_length() {
        let normal = FloorPlane::for_mounting(1.0, 8.0).normal() * 3.0;
        assert_relative_eq!(tilt_from_normal(&normal), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_normals_are_level() {
        assert_eq!(tilt_from_normal(&Vector3::zeros()), 0.0);
        assert_eq!(tilt_from_normal(&Vector3::new(0.0, -1.0, 0.0)), 0.0);
    }

    #[test]
    fn test_level_tilt_is_positive_zero() {
        assert!(tilt_from_normal(&Vector3::zeros()).is_sign_positive());
        assert!(tilt_from_normal(&Vector3::y()).is_sign_positive());
        let level = FloorPlane::for_mounting(0.9, 0.0);
        assert!(tilt_from_normal(&level.normal()).is_sign_positive());
    }

    #[test]
    fn test_downward_pitch_lowers_forward_points() {
        // A sensor looking down sees a point straight ahead below its own height
        let pose = SensorPose {
            position: Vector3::zeros(),
            tilt_degrees: 10.0,
        };
        let projected = JointProjector::project(&Vector3::new(0.0, 0.0, 2.0), &pose);
        assert!(projected.y < 0.0);
        assert_relative_eq!(projected.y, -2.0 * 10f64.to_radians().sin(), epsilon = 1e-12);
        assert_relative_eq!(projected.z, 2.0 * 10f64.to_radians().cos(), epsilon = 1e-12);
    }

    #[test]
    fn test_translate_then_rotate() {
        let pose = SensorPose {
            position: Vector3::new(0.0, 1.0, 0.0),
            tilt_degrees: 90.0,
        };
        // (0, 0, 0) + (0, 1, 0) rotated 90° about X lands on +Z
        let projected = JointProjector::project(&Vector3::zeros(), &pose);
        assert_relative_eq!(projected, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_project_body_matches_single_joint() {
        let mut body = TrackedBody::new(4, [Vector3::zeros(); JointType::COUNT]);
        body.set_joint(JointType::Head, Vector3::new(0.1, 0.6, 2.2));
        body.set_joint(JointType::HandLeft, Vector3::new(-0.4, 0.1, 2.0));
        let pose = SensorPose {
            position: Vector3::new(0.05, 0.9, -0.1),
            tilt_degrees: 7.5,
        };

        let skeleton = JointProjector::project_body(&body, &pose);
        assert_eq!(skeleton.tracking_id, 4);
        for (joint, position) in skeleton.iter() {
            assert_relative_eq!(
                position,
                JointProjector::project(&body.joint(joint), &pose),
                epsilon = 1e-12
            );
        }
    }

    proptest! {
        #[test]
        fn prop_unproject_inverts_project(
            x in -2.0f64..2.0, y in -1.0f64..2.5, z in 0.5f64..4.5,
            px in -0.5f64..0.5, py in 0.0f64..1.5, pz in -0.5f64..0.5,
            tilt in -45.0f64..45.0,
        ) {
            let pose = SensorPose { position: Vector3::new(px, py, pz), tilt_degrees: tilt };
            let raw = Vector3::new(x, y, z);
            let back = JointProjector::unproject(&JointProjector::project(&raw, &pose), &pose);
            prop_assert!((back - raw).norm() < 1e-9);
        }

        #[test]
        fn prop_rotation_preserves_distance_from_origin(
            x in -2.0f64..2.0, y in -1.0f64..2.5, z in 0.5f64..4.5,
            tilt in -45.0f64..45.0,
        ) {
            let pose = SensorPose { position: Vector3::new(0.1, 0.8, 0.0), tilt_degrees: tilt };
            let raw = Vector3::new(x, y, z);
            let translated = raw + pose.position;
            let projected = JointProjector::project(&raw, &pose);
            prop_assert!((projected.norm() - translated.norm()).abs() < 1e-9);
            // Rotation about X never moves the lateral coordinate
            prop_assert!((projected.x - translated.x).abs() < 1e-12);
        }
    }
}
