//! Renderer collaborator: consumes the virtual camera pose and debug markers.

use crate::types::JointType;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Virtual camera pose for one tick, in mirror space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    /// Camera position (the viewer's head reflected through the mirror plane)
    pub position: Vector3<f64>,

    /// Point the camera looks at (the mirror center)
    pub look_at: Vector3<f64>,

    /// Vertical field of view in degrees
    pub field_of_view_degrees: f64,
}

/// A debug sphere drawn at a projected joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointMarker {
    pub joint: JointType,
    pub position: Vector3<f64>,
    pub radius: f64,
}

/// Moves the render camera.
pub trait CameraSink {
    /// Applies a pose. Only called on ticks that have a valid target.
    fn apply_camera(&mut self, pose: &CameraPose);
}

/// Draws debug visuals.
pub trait MarkerSink {
    /// Replaces the visible joint markers; an empty slice hides them.
    fn draw_markers(&mut self, markers: &[JointMarker]);

    /// Shows the calibration readout text, or hides it with `None`.
    fn show_readout(&mut self, text: Option<&str>);
}
