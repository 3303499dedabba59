//! JSON exporter for offline inspection of a run.
//!
//! Exports one record per sampled tick: where the viewer's head was, what
//! the camera did and how wide its view was.

use mirror_core::TickOutput;
use mirror_env::{CameraPose, JointType};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use uuid::Uuid;

/// A single sampled tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Simulation time in seconds
    pub time_sec: f64,

    pub tick: u64,

    pub target_present: bool,

    /// Held target (may be stale)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<u64>,

    /// Sensor pitch derived from the floor plane
    pub tilt_degrees: f64,

    /// Target head in mirror space
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Point>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraFrame>,
}

impl SimFrame {
    /// Builds a frame from a tick's output.
    pub fn from_tick(time_sec: f64, output: &TickOutput) -> Self {
        Self {
            time_sec,
            tick: output.tick,
            target_present: output.target_present,
            target_id: output.target_id,
            tilt_degrees: output.sensor_pose.tilt_degrees,
            head: output
                .skeleton
                .as_ref()
                .map(|s| Point::from(s.joint(JointType::Head))),
            camera: output.camera_pose.as_ref().map(CameraFrame::from),
        }
    }
}

/// A point in mirror space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<Vector3<f64>> for Point {
    fn from(v: Vector3<f64>) -> Self {
        Self { x: v.x, y: v.y, z: v.z }
    }
}

/// Camera pose as exported.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CameraFrame {
    pub position: Point,
    pub look_at: Point,
    pub fov_degrees: f64,
}

impl From<&CameraPose> for CameraFrame {
    fn from(pose: &CameraPose) -> Self {
        Self {
            position: pose.position.into(),
            look_at: pose.look_at.into(),
            fov_degrees: pose.field_of_view_degrees,
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Unique id of this run
    pub run_id: String,

    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
