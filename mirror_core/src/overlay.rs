//! Debug overlay - joint markers and live fine-offset calibration.
//!
//! Installers flip it on, watch the markers line up with the reflection,
//! and nudge the fine offsets until they do. Nothing else depends on it.

use crate::calibration::{CalibrationParameters, CalibrationStorage, CalibrationStore};
use crate::projection::{ProjectedSkeleton, SensorPose};
use mirror_env::{FloorPlane, InputSignals, JointMarker};
use std::fmt;
use tracing::{error, info};

/// Toggleable overlay state.
#[derive(Debug, Clone)]
pub struct DebugOverlay {
    enabled: bool,
    nudge_step: f64,
    marker_radius: f64,
}

impl DebugOverlay {
    /// Creates an overlay with the given nudge step and marker radius.
    pub fn new(nudge_step: f64, marker_radius: f64) -> Self {
        Self {
            enabled: false,
            nudge_step,
            marker_radius,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Applies this tick's signals: the toggle first, then (if enabled) the
    /// nudges. Each nudge is persisted before the next one is applied.
    ///
    /// Returns the number of nudges applied. Persistence failures are logged;
    /// the in-memory offset still changes.
    pub fn handle_input<S: CalibrationStorage>(
        &mut self,
        signals: &InputSignals,
        store: &mut CalibrationStore<S>,
    ) -> usize {
        if signals.toggle_debug {
            self.enabled = !self.enabled;
            info!("Debug overlay {}", if self.enabled { "enabled" } else { "disabled" });
        }
        if !self.enabled {
            return 0;
        }

        let mut applied = 0;
        for direction in signals.nudges() {
            let (ux, uy) = direction.unit();
            if let Err(e) = store.nudge_fine_offset(ux * self.nudge_step, uy * self.nudge_step) {
                error!("Failed to persist fine offset after {:?} nudge: {}", direction, e);
            }
            applied += 1;
        }
        applied
    }

    /// One marker per joint of the projected target; empty when disabled.
    pub fn markers(&self, skeleton: Option<&ProjectedSkeleton>) -> Vec<JointMarker> {
        match skeleton {
            Some(skeleton) if self.enabled => skeleton
                .iter()
                .map(|(joint, position)| JointMarker {
                    joint,
                    position,
                    radius: self.marker_radius,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Calibration readout while enabled.
    pub fn readout(
        &self,
        pose: &SensorPose,
        params: &CalibrationParameters,
        floor: &FloorPlane,
    ) -> Option<CalibrationReadout> {
        self.enabled.then(|| CalibrationReadout {
            tilt_degrees: pose.tilt_degrees,
            sensor_position_x: params.sensor_position_x,
            floor_height: floor.w,
            sensor_position_z: params.sensor_position_z,
            mirror_position_y: params.mirror_position_y,
            mirror_width: params.mirror_width,
            mirror_height: params.mirror_height,
            fine_offset_x: params.fine_offset_x,
            fine_offset_y: params.fine_offset_y,
            floor_detected: floor.is_detected(),
        })
    }
}

/// Snapshot of the values shown on the calibration panel.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationReadout {
    pub tilt_degrees: f64,
    pub sensor_position_x: f64,
    pub floor_height: f64,
    pub sensor_position_z: f64,
    pub mirror_position_y: f64,
    pub mirror_width: f64,
    pub mirror_height: f64,
    pub fine_offset_x: f64,
    pub fine_offset_y: f64,
    pub floor_detected: bool,
}

impl fmt::Display for CalibrationReadout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ANGLE : AUTO ({:.2})", self.tilt_degrees)?;
        writeln!(f, "SENSOR_POS_X : {}", self.sensor_position_x)?;
        writeln!(f, "SENSOR_POS_Y : AUTO ({:.3})", self.floor_height)?;
        writeln!(f, "SENSOR_POS_Z : {}", self.sensor_position_z)?;
        writeln!(f, "MIRROR_POS_Y : {}", self.mirror_position_y)?;
        writeln!(f, "MIRROR_WIDTH : {}", self.mirror_width)?;
        writeln!(f, "MIRROR_HEIGHT : {}", self.mirror_height)?;
        writeln!(f)?;
        writeln!(f, "OFFSET_X : {:.3}", self.fine_offset_x)?;
        writeln!(f, "OFFSET_Y : {:.3}", self.fine_offset_y)?;
        writeln!(f)?;
        writeln!(f, "IS_FLOOR : {}", if self.floor_detected { "TRUE" } else { "FALSE" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::SledCalibrationStorage;
    use crate::projection::JointProjector;
    use approx::assert_relative_eq;
    use mirror_env::{JointType, NudgeDirection, TrackedBody};
    use nalgebra::Vector3;

    fn temp_store() -> CalibrationStore<SledCalibrationStorage> {
        let storage = SledCalibrationStorage::open_temp().unwrap();
        storage
            .seed(&CalibrationParameters {
                mirror_width: 1.0,
                mirror_height: 1.5,
                ..Default::default()
            })
            .unwrap();
        CalibrationStore::load(storage).unwrap()
    }

    #[test]
    fn test_nudges_ignored_while_disabled() {
        let mut overlay = DebugOverlay::new(0.005, 0.02);
        let mut store = temp_store();

        let applied = overlay.handle_input(&InputSignals::nudge(NudgeDirection::Right), &mut store);
        assert_eq!(applied, 0);
        assert_eq!(store.get().fine_offset_x, 0.0);
    }

    #[test]
    fn test_toggle_then_nudge_same_tick() {
        let mut overlay = DebugOverlay::new(0.005, 0.02);
        let mut store = temp_store();

        let signals = InputSignals {
            toggle_debug: true,
            nudge_left: true,
            nudge_up: true,
            ..Default::default()
        };
        assert_eq!(overlay.handle_input(&signals, &mut store), 2);
        assert!(overlay.is_enabled());
        assert_relative_eq!(store.get().fine_offset_x, -0.005, epsilon = 1e-12);
        assert_relative_eq!(store.get().fine_offset_y, 0.005, epsilon = 1e-12);

        // Persisted immediately
        let persisted = store.storage().load().unwrap();
        assert_eq!(persisted.fine_offset_x, store.get().fine_offset_x);
        assert_eq!(persisted.fine_offset_y, store.get().fine_offset_y);
    }

    #[test]
    fn test_toggle_flips() {
        let mut overlay = DebugOverlay::new(0.005, 0.02);
        let mut store = temp_store();
        overlay.handle_input(&InputSignals::toggle(), &mut store);
        overlay.handle_input(&InputSignals::toggle(), &mut store);
        assert!(!overlay.is_enabled());
    }

    #[test]
    fn test_markers_follow_projection() {
        let mut overlay = DebugOverlay::new(0.005, 0.02);
        let mut body = TrackedBody::new(1, [Vector3::zeros(); JointType::COUNT]);
        body.set_joint(JointType::Head, Vector3::new(0.0, 0.7, 2.0));
        let skeleton = JointProjector::project_body(&body, &SensorPose::identity());

        assert!(overlay.markers(Some(&skeleton)).is_empty());

        overlay.set_enabled(true);
        let markers = overlay.markers(Some(&skeleton));
        assert_eq!(markers.len(), JointType::COUNT);
        assert_eq!(markers[JointType::Head.index()].position, Vector3::new(0.0, 0.7, 2.0));
        assert_eq!(markers[0].radius, 0.02);
        assert!(overlay.markers(None).is_empty());
    }

    #[test]
    fn test_readout_text() {
        let mut overlay = DebugOverlay::new(0.005, 0.02);
        let params = CalibrationParameters {
            fine_offset_x: 0.015,
            mirror_height: 1.5,
            ..Default::default()
        };
        let floor = FloorPlane::default();
        assert!(overlay.readout(&SensorPose::identity(), &params, &floor).is_none());

        overlay.set_enabled(true);
        let text = overlay
            .readout(&SensorPose::identity(), &params, &floor)
            .unwrap()
            .to_string();
        assert!(text.contains("OFFSET_X : 0.015"));
        assert!(text.contains("MIRROR_HEIGHT : 1.5"));
        assert!(text.contains("IS_FLOOR : FALSE"));
    }

    #[test]
    fn test_readout_undetected_floor_shows_unsigned_angle() {
        let mut overlay = DebugOverlay::new(0.005, 0.02);
        overlay.set_enabled(true);
        let params = CalibrationParameters::default();
        let floor = FloorPlane::default();
        let pose = SensorPose::from_floor(&floor, &params);

        let text = overlay.readout(&pose, &params, &floor).unwrap().to_string();
        assert!(text.contains("ANGLE : AUTO (0.00)"));
        assert!(!text.contains("-0.00"));
    }
}
