//! The "CAMERA" Engine - virtual mirror camera
//!
//! A real mirror shows the room as seen from the viewer's eye reflected
//! through the mirror plane. The virtual camera therefore:
//! - sits at the head position with its depth negated
//! - always looks at the mirror center
//! - uses the vertical angle the mirror subtends at that point as its FOV,
//!   so the view widens as the viewer steps closer

use crate::calibration::CalibrationParameters;
use mirror_env::CameraPose;
use nalgebra::{Vector2, Vector3};
use tracing::trace;

/// Field of view used when the mirror subtends no usable angle.
pub const FALLBACK_FOV_DEGREES: f64 = 10.0;

// ============================================================================
// MIRROR GEOMETRY
// ============================================================================

/// The display surface: a vertical rectangle centered on the X/Z origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorGeometry {
    pub center: Vector3<f64>,
    pub width: f64,
    pub height: f64,
}

impl MirrorGeometry {
    /// Geometry for a mirror whose bottom edge is at `bottom_y`.
    pub fn new(bottom_y: f64, width: f64, height: f64) -> Self {
        Self {
            center: Vector3::new(0.0, bottom_y + height / 2.0, 0.0),
            width,
            height,
        }
    }

    /// Derives the geometry from calibration.
    pub fn from_calibration(params: &CalibrationParameters) -> Self {
        Self::new(params.mirror_position_y, params.mirror_width, params.mirror_height)
    }

    /// Midpoint of the top edge.
    pub fn top_edge(&self) -> Vector3<f64> {
        self.center + Vector3::new(0.0, self.height / 2.0, 0.0)
    }

    /// Midpoint of the bottom edge.
    pub fn bottom_edge(&self) -> Vector3<f64> {
        self.center - Vector3::new(0.0, self.height / 2.0, 0.0)
    }
}

// ============================================================================
// MIRROR CAMERA MODEL
// ============================================================================

/// Derives camera poses from a projected head position.
pub struct MirrorCameraModel;

impl MirrorCameraModel {
    /// Reflects the head through the mirror plane (negates depth).
    #[inline]
    pub fn camera_position(head: &Vector3<f64>) -> Vector3<f64> {
        Vector3::new(head.x, head.y, -head.z)
    }

    /// Vertical angle, in degrees, between the mirror's top and bottom edge
    /// as seen from `camera`, measured in the (Y, Z) plane.
    ///
    /// Falls back to [`FALLBACK_FOV_DEGREES`] when the camera is on the
    /// mirror plane or the angle is not a positive number.
    pub fn field_of_view(camera: &Vector3<f64>, geometry: &MirrorGeometry) -> f64 {
        if camera.z == geometry.center.z {
            trace!("Camera on mirror plane; using fallback FOV");
            return FALLBACK_FOV_DEGREES;
        }

        let top = geometry.top_edge();
        let bottom = geometry.bottom_edge();
        let to_top = Vector2::new(top.z - camera.z, top.y - camera.y);
        let to_bottom = Vector2::new(bottom.z - camera.z, bottom.y - camera.y);

        let cosine = to_top.dot(&to_bottom) / (to_top.norm_squared() * to_bottom.norm_squared()).sqrt();
        let angle = cosine.clamp(-1.0, 1.0).acos().to_degrees();

        // NaN fails this comparison too
        if angle > 0.0 {
            angle
        } else {
            trace!("Degenerate mirror angle {}; using fallback FOV", angle);
            FALLBACK_FOV_DEGREES
        }
    }

    /// Full camera pose for a mirror-space head position.
    pub fn pose(head: &Vector3<f64>, geometry: &MirrorGeometry) -> CameraPose {
        let position = Self::camera_position(head);
        CameraPose {
            position,
            look_at: geometry.center,
            field_of_view_degrees: Self::field_of_view(&position, geometry),
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

    #[test]
    fn test_geometry_from_calibration() {
        let params = CalibrationParameters {
            mirror_position_y: 0.3,
            mirror_width: 0.9,
            mirror_height: 1.6,
            ..Default::default()
        };
        let geometry = MirrorGeometry::from_calibration(&params);
        assert_relative_eq!(geometry.center, Vector3::new(0.0, 1.1, 0.0), epsilon = 1e-12);
        assert_relative_eq!(geometry.top_edge().y, 1.9, epsilon = 1e-12);
        assert_relative_eq!(geometry.bottom_edge().y, 0.3, epsilon = 1e-12);
        assert_eq!(geometry.width, 0.9);
    }

    #[test]
    fn test_camera_reflects_depth() {
        let head = Vector3::new(0.2, 1.7, 2.3);
        let camera = MirrorCameraModel::camera_position(&head);
        assert_eq!(camera, Vector3::new(0.2, 1.7, -2.3));
    }

    #[test]
    fn test_reference_scenario() {
        let geometry = MirrorGeometry::new(0.0, 1.0, 1.0);
        assert_eq!(geometry.center, Vector3::new(0.0, 0.5, 0.0));

        let pose = MirrorCameraModel::pose(&Vector3::new(0.0, 1.6, 2.0), &geometry);
        assert_eq!(pose.position, Vector3::new(0.0, 1.6, -2.0));
        assert_eq!(pose.look_at, Vector3::new(0.0, 0.5, 0.0));

        // Angle between rays to y=1.0 and y=0.0 from 2m away at 1.6m height
        let expected = (0.8f64.atan() - 0.3f64.atan()).to_degrees();
        assert_relative_eq!(pose.field_of_view_degrees, expected, epsilon = 1e-9);
        assert_relative_eq!(pose.field_of_view_degrees, 21.9606, epsilon = 1e-4);
    }

    #[test]
    fn test_fov_shrinks_with_distance() {
        let geometry = MirrorGeometry::new(0.5, 1.0, 1.2);
        let mut previous = f64::INFINITY;
        for step in 1..40 {
            let depth = 0.25 * step as f64;
            let camera = Vector3::new(0.0, geometry.center.y, -depth);
            let fov = MirrorCameraModel::field_of_view(&camera, &geometry);
            assert!(fov < previous, "FOV did not shrink at depth {}", depth);
            previous = fov;
        }
    }

    #[test]
    fn test_fov_grows_when_viewer_approaches() {
        let geometry = MirrorGeometry::new(0.0, 1.0, 1.0);
        let far = MirrorCameraModel::pose(&Vector3::new(0.0, 1.6, 3.0), &geometry);
        let near = MirrorCameraModel::pose(&Vector3::new(0.0, 1.6, 2.0), &geometry);
        assert!(near.field_of_view_degrees > far.field_of_view_degrees);
    }

    #[test]
    fn test_fallback_at_mirror_center() {
        let geometry = MirrorGeometry::new(0.0, 1.0, 1.0);
        let fov = MirrorCameraModel::field_of_view(&geometry.center, &geometry);
        assert_eq!(fov, FALLBACK_FOV_DEGREES);
    }

    #[test]
    fn test_fallback_on_mirror_plane() {
        let geometry = MirrorGeometry::new(0.0, 1.0, 1.0);
        let fov = MirrorCameraModel::field_of_view(&Vector3::new(0.0, 3.0, 0.0), &geometry);
        assert_eq!(fov, FALLBACK_FOV_DEGREES);
    }

    #[test]
    fn test_fallback_for_zero_height_mirror() {
        let geometry = MirrorGeometry::new(0.5, 1.0, 0.0);
        let fov = MirrorCameraModel::field_of_view(&Vector3::new(0.0, 1.6, -2.0), &geometry);
        assert_eq!(fov, FALLBACK_FOV_DEGREES);
    }

    #[test]
    fn test_fov_ignores_lateral_offset() {
        let geometry = MirrorGeometry::new(0.0, 1.0, 1.0);
        let centered = MirrorCameraModel::field_of_view(&Vector3::new(0.0, 1.6, -2.0), &geometry);
        let offset = MirrorCameraModel::field_of_view(&Vector3::new(0.6, 1.6, -2.0), &geometry);
        assert_eq!(centered, offset);
    }
}
