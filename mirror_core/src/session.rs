//! Mirror Session - per-tick orchestration of the camera model.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        MirrorRuntime                         │
//! │   BodySource ──► SensorFrame      InputSource ──► Signals    │
//! │                        │                  │                  │
//! │  ┌─────────────────────▼──────────────────▼───────────────┐  │
//! │  │                   MirrorSession::tick                  │  │
//! │  │  overlay input ─► sensor pose ─► target ─► projection  │  │
//! │  │                                     ─► camera ─► markers│  │
//! │  └──────────────────────────┬─────────────────────────────┘  │
//! │                             ▼                                │
//! │              CameraSink / MarkerSink (renderer)              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs synchronously on the frame loop. Offset nudges are
//! applied before the sensor pose is derived, so they affect projection in
//! the same tick.

use crate::calibration::{CalibrationStorage, CalibrationStore};
use crate::camera::{MirrorCameraModel, MirrorGeometry};
use crate::config::SessionConfig;
use crate::overlay::DebugOverlay;
use crate::projection::{JointProjector, ProjectedSkeleton, SensorPose};
use crate::tracking::{ActiveTarget, TargetTracker};
use mirror_env::{
    BodySource, CameraPose, CameraSink, InputSignals, InputSource, JointMarker, JointType,
    MarkerSink, SensorFrame,
};
use tracing::warn;

// ============================================================================
// TICK CONTEXT
// ============================================================================

/// State derived for one tick and handed down the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    pub sensor_pose: SensorPose,
    pub geometry: MirrorGeometry,
    pub target: &'a ActiveTarget,
}

impl TickContext<'_> {
    /// Projects the target selected this tick, if any.
    pub fn project_target(&self) -> Option<ProjectedSkeleton> {
        self.target
            .current()
            .map(|body| JointProjector::project_body(body, &self.sensor_pose))
    }

    /// Camera pose with the eye at `eye` of the projected skeleton.
    pub fn camera_pose(&self, skeleton: &ProjectedSkeleton, eye: JointType) -> CameraPose {
        MirrorCameraModel::pose(&skeleton.joint(eye), &self.geometry)
    }
}

/// Everything one tick produced.
#[derive(Debug, Clone)]
pub struct TickOutput {
    /// 1-based tick number
    pub tick: u64,

    /// Whether a body was in the capture volume this tick
    pub target_present: bool,

    /// Id of the held body (may be stale when `target_present` is false)
    pub target_id: Option<u64>,

    pub sensor_pose: SensorPose,

    /// Target joints in mirror space (present ticks only)
    pub skeleton: Option<ProjectedSkeleton>,

    /// New camera pose; `None` means keep the previous render camera
    pub camera_pose: Option<CameraPose>,

    /// Debug markers (empty unless the overlay is on and a target is present)
    pub markers: Vec<JointMarker>,

    /// Calibration panel text while the overlay is on
    pub readout: Option<String>,

    /// Offset nudges applied from this tick's input
    pub nudges_applied: usize,
}

// ============================================================================
// MIRROR SESSION
// ============================================================================

/// Owns calibration and tracking state for the life of the display.
pub struct MirrorSession<S: CalibrationStorage> {
    config: SessionConfig,
    calibration: CalibrationStore<S>,
    tracker: TargetTracker,
    overlay: DebugOverlay,
    tick_count: u64,
}

impl<S: CalibrationStorage> MirrorSession<S> {
    /// Creates a session around a loaded calibration store.
    pub fn new(config: SessionConfig, calibration: CalibrationStore<S>) -> Self {
        let tracker = TargetTracker::new(config.capture_volume, config.reference_joint)
            .clear_stale_selection(config.clear_stale_selection);
        let mut overlay = DebugOverlay::new(config.nudge_step, config.marker_radius);
        overlay.set_enabled(config.debug_on_start);

        Self {
            config,
            calibration,
            tracker,
            overlay,
            tick_count: 0,
        }
    }

    /// Runs one frame of the pipeline.
    pub fn tick(&mut self, frame: &SensorFrame, input: &InputSignals) -> TickOutput {
        self.tick_count += 1;

        let nudges_applied = self.overlay.handle_input(input, &mut self.calibration);
        let params = self.calibration.get();

        let ctx = TickContext {
            sensor_pose: SensorPose::from_floor(&frame.floor, &params),
            geometry: MirrorGeometry::from_calibration(&params),
            target: self.tracker.update(&frame.bodies),
        };

        let skeleton = ctx.project_target();
        let camera_pose = skeleton
            .as_ref()
            .map(|s| ctx.camera_pose(s, self.config.reference_joint));
        let markers = self.overlay.markers(skeleton.as_ref());
        let readout = self
            .overlay
            .readout(&ctx.sensor_pose, &params, &frame.floor)
            .map(|r| r.to_string());

        TickOutput {
            tick: self.tick_count,
            target_present: ctx.target.is_present,
            target_id: ctx.target.tracking_id(),
            sensor_pose: ctx.sensor_pose,
            skeleton,
            camera_pose,
            markers,
            readout,
            nudges_applied,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn calibration(&self) -> &CalibrationStore<S> {
        &self.calibration
    }

    pub fn calibration_mut(&mut self) -> &mut CalibrationStore<S> {
        &mut self.calibration
    }

    pub fn active_target(&self) -> &ActiveTarget {
        self.tracker.active()
    }

    pub fn overlay(&self) -> &DebugOverlay {
        &self.overlay
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}

// ============================================================================
// RUNTIME
// ============================================================================

/// Counters kept by the runtime loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub ticks: u64,
    pub frames_received: u64,
    pub sensor_errors: u64,
    pub poses_applied: u64,
}

/// Frame loop wiring a session to its collaborators.
///
/// Generic over storage, sensor, input and renderer so the same loop runs
/// against real devices or the simulation harness.
pub struct MirrorRuntime<S, B, I, R>
where
    S: CalibrationStorage,
    B: BodySource,
    I: InputSource,
    R: CameraSink + MarkerSink,
{
    session: MirrorSession<S>,
    sensor: B,
    input: I,
    renderer: R,
    last_frame: SensorFrame,
    stats: RuntimeStats,
}

impl<S, B, I, R> MirrorRuntime<S, B, I, R>
where
    S: CalibrationStorage,
    B: BodySource,
    I: InputSource,
    R: CameraSink + MarkerSink,
{
    pub fn new(session: MirrorSession<S>, sensor: B, input: I, renderer: R) -> Self {
        Self {
            session,
            sensor,
            input,
            renderer,
            last_frame: SensorFrame::default(),
            stats: RuntimeStats::default(),
        }
    }

    /// Polls the collaborators, ticks the session and pushes results to the
    /// renderer. Without a new frame the previous one is processed again.
    pub fn step(&mut self) -> TickOutput {
        let signals = self.input.poll();

        match self.sensor.acquire_latest() {
            Ok(Some(frame)) => {
                self.last_frame = frame;
                self.stats.frames_received += 1;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Sensor error, reusing previous frame: {}", e);
                self.stats.sensor_errors += 1;
            }
        }

        let output = self.session.tick(&self.last_frame, &signals);
        self.stats.ticks += 1;

        if let Some(pose) = &output.camera_pose {
            self.renderer.apply_camera(pose);
            self.stats.poses_applied += 1;
        }
        self.renderer.draw_markers(&output.markers);
        self.renderer.show_readout(output.readout.as_deref());

        output
    }

    pub fn session(&self) -> &MirrorSession<S> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut MirrorSession<S> {
        &mut self.session
    }

    pub fn sensor_mut(&mut self) -> &mut B {
        &mut self.sensor
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn stats(&self) -> RuntimeStats {
        self.stats
    }
}

// ============================================================================
// TESTS
// ============================================================================
