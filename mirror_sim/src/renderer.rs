//! Recording renderer - stands in for the 3D engine.

use mirror_env::{CameraPose, CameraSink, JointMarker, MarkerSink};

/// Keeps everything the runtime pushed to it.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    /// Every applied pose, in order
    pub poses: Vec<CameraPose>,

    /// Markers from the latest draw call
    pub markers: Vec<JointMarker>,

    /// Readout from the latest call
    pub readout: Option<String>,

    /// Draw calls that carried at least one marker
    pub marker_frames: usize,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current render camera (the last applied pose).
    pub fn last_pose(&self) -> Option<&CameraPose> {
        self.poses.last()
    }

    pub fn pose_count(&self) -> usize {
        self.poses.len()
    }
}

impl CameraSink for RecordingRenderer {
    fn apply_camera(&mut self, pose: &CameraPose) {
        self.poses.push(*pose);
    }
}

impl MarkerSink for RecordingRenderer {
    fn draw_markers(&mut self, markers: &[JointMarker]) {
        if !markers.is_empty() {
            self.marker_frames += 1;
        }
        self.markers = markers.to_vec();
    }

    fn show_readout(&mut self, text: Option<&str>) {
        self.readout = text.map(str::to_owned);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_env::JointType;
    use nalgebra::Vector3;

    #[test]
    fn test_records_calls() {
        let mut renderer = RecordingRenderer::new();
        assert!(renderer.last_pose().is_none());

        let pose = CameraPose {
            position: Vector3::new(0.0, 1.6, -2.0),
            look_at: Vector3::new(0.0, 0.5, 0.0),
            field_of_view_degrees: 22.0,
        };
        renderer.apply_camera(&pose);
        renderer.draw_markers(&[JointMarker {
            joint: JointType::Head,
            position: Vector3::zeros(),
            radius: 0.02,
        }]);
        renderer.draw_markers(&[]);
        renderer.show_readout(Some("ANGLE"));

        assert_eq!(renderer.last_pose(), Some(&pose));
        assert_eq!(renderer.pose_count(), 1);
        assert_eq!(renderer.marker_frames, 1);
        assert!(renderer.markers.is_empty());
        assert_eq!(renderer.readout.as_deref(), Some("ANGLE"));
    }
}
