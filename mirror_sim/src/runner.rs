//! Scenario runner - drives a MirrorRuntime against the simulated crowd.

use crate::crowd::Crowd;
use crate::error::SimError;
use crate::exporter::{SimExport, SimFrame};
use crate::input::ScriptedInput;
use crate::renderer::RecordingRenderer;
use crate::scenarios::ScenarioId;

use mirror_core::{
    CalibrationParameters, CalibrationStorage, CalibrationStore, MirrorGeometry, MirrorRuntime,
    MirrorSession, SessionConfig, SledCalibrationStorage, TickOutput, FALLBACK_FOV_DEGREES,
};
use mirror_env::{JointType, NudgeDirection};
use nalgebra::Vector3;
use rand::Rng;
use serde::Serialize;
use std::ops::Range;
use tracing::{debug, info, warn};

type SimRuntime = MirrorRuntime<SledCalibrationStorage, Crowd, ScriptedInput, RecordingRenderer>;

/// Tick at which the calibration script turns the overlay on.
const OVERLAY_ON_TICK: u64 = 5;

/// Tick at which the calibration script turns the overlay off.
const OVERLAY_OFF_TICK: u64 = 40;

/// Acquisitions that fail in the dropout scenario.
const DROPOUT_TICKS: Range<u64> = 30..60;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

impl ScenarioResult {
    fn aborted(scenario: ScenarioId, seed: u64, reason: String) -> Self {
        Self {
            scenario,
            seed,
            passed: false,
            total_ticks: 0,
            final_time_secs: 0.0,
            failure_reason: Some(reason),
            metrics: ScenarioMetrics::default(),
        }
    }
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScenarioMetrics {
    /// Ticks on which a body was in the capture volume
    pub ticks_with_target: u64,

    /// Poses pushed to the renderer
    pub camera_updates: u64,

    /// Failed sensor acquisitions
    pub sensor_errors: u64,

    /// Times the selected body changed between present ticks
    pub target_switches: u64,

    pub mean_fov_degrees: Option<f64>,
    pub min_fov_degrees: Option<f64>,
    pub max_fov_degrees: Option<f64>,

    /// Fine offsets at the end of the run
    pub final_offset_x: f64,
    pub final_offset_y: f64,
}

impl ScenarioMetrics {
    fn collect(history: &[TickOutput], runtime: &SimRuntime) -> Self {
        let fovs: Vec<f64> = history
            .iter()
            .filter_map(|o| o.camera_pose.map(|p| p.field_of_view_degrees))
            .collect();

        let mut target_switches = 0;
        let mut previous = None;
        for output in history.iter().filter(|o| o.target_present) {
            if previous.is_some() && previous != output.target_id {
                target_switches += 1;
            }
            previous = output.target_id;
        }

        let stats = runtime.stats();
        let params = runtime.session().calibration().get();

        Self {
            ticks_with_target: history.iter().filter(|o| o.target_present).count() as u64,
            camera_updates: stats.poses_applied,
            sensor_errors: stats.sensor_errors,
            target_switches,
            mean_fov_degrees: (!fovs.is_empty()).then(|| fovs.iter().sum::<f64>() / fovs.len() as f64),
            min_fov_degrees: fovs.iter().copied().reduce(f64::min),
            max_fov_degrees: fovs.iter().copied().reduce(f64::max),
            final_offset_x: params.fine_offset_x,
            final_offset_y: params.fine_offset_y,
        }
    }
}

/// Crowd and input prepared for one scenario.
struct ScenarioPlan {
    crowd: Crowd,
    input: ScriptedInput,

    /// Body expected to drive the camera, if any
    subject: Option<u64>,
}

/// Runs scenarios with a fixed seed and calibration.
pub struct ScenarioRunner {
    seed: u64,
    tick_rate_hz: u32,
    duration_secs: f64,
    calibration: CalibrationParameters,
    config: SessionConfig,
    export_interval: u64,
}

impl ScenarioRunner {
    /// Creates a runner. Every scenario starts from a fresh temporary store
    /// seeded with `calibration`.
    pub fn new(seed: u64, calibration: CalibrationParameters) -> Self {
        Self {
            seed,
            tick_rate_hz: 30,
            duration_secs: 10.0,
            calibration,
            config: SessionConfig::default(),
            export_interval: 3,
        }
    }

    /// A typical install: 0.9m x 1.6m mirror 0.4m off the floor, sensor
    /// centered 5cm in front of the glass.
    pub fn installation_calibration() -> CalibrationParameters {
        CalibrationParameters {
            sensor_position_x: 0.0,
            sensor_position_z: 0.05,
            mirror_position_y: 0.4,
            mirror_width: 0.9,
            mirror_height: 1.6,
            fine_offset_x: 0.0,
            fine_offset_y: 0.0,
        }
    }

    /// Sets the tick rate.
    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz.max(1);
        self
    }

    /// Sets the simulation duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    /// Sets the session configuration.
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Records every n-th tick when exporting.
    pub fn with_export_interval(mut self, ticks: u64) -> Self {
        self.export_interval = ticks.max(1);
        self
    }

    /// Ticks a scenario will run for.
    pub fn total_ticks(&self, scenario: ScenarioId) -> u64 {
        ((self.duration_secs * self.tick_rate_hz as f64) as u64).max(scenario.min_ticks())
    }

    /// Runs a scenario.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.run_recording(scenario, None)
    }

    /// Runs a scenario and records sampled frames.
    pub fn run_with_export(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        let mut export = SimExport::new(scenario.name(), self.seed);
        let result = self.run_recording(scenario, Some(&mut export));
        export.finalize(result.passed, result.failure_reason.clone());
        (result, export)
    }

    fn run_recording(&self, scenario: ScenarioId, export: Option<&mut SimExport>) -> ScenarioResult {
        match self.execute(scenario, export) {
            Ok(result) => result,
            Err(e) => {
                warn!("Scenario {} aborted: {}", scenario, e);
                ScenarioResult::aborted(scenario, self.seed, e.to_string())
            }
        }
    }

    fn execute(
        &self,
        scenario: ScenarioId,
        mut export: Option<&mut SimExport>,
    ) -> Result<ScenarioResult, SimError> {
        let total_ticks = self.total_ticks(scenario);
        let dt = 1.0 / self.tick_rate_hz as f64;
        let plan = self.plan(scenario, total_ticks as f64 * dt);

        let storage = SledCalibrationStorage::open_temp()?;
        storage.seed(&self.calibration)?;
        let session = MirrorSession::new(self.config.clone(), CalibrationStore::load(storage)?);
        let mut runtime = MirrorRuntime::new(session, plan.crowd, plan.input, RecordingRenderer::new());

        info!("Running {} (seed={}, ticks={})", scenario, self.seed, total_ticks);

        let mut history = Vec::with_capacity(total_ticks as usize);
        for tick in 0..total_ticks {
            runtime.sensor_mut().step(dt);
            let output = runtime.step();
            let time = (tick + 1) as f64 * dt;

            if let Some(export) = export.as_mut() {
                if tick % self.export_interval == 0 {
                    export.add_frame(SimFrame::from_tick(time, &output));
                }
            }

            if tick % 30 == 0 {
                debug!(
                    "  t={:.1}s | present={} | target={:?} | fov={:?}",
                    time,
                    output.target_present,
                    output.target_id,
                    output.camera_pose.map(|p| p.field_of_view_degrees)
                );
            }
            history.push(output);
        }

        let verdict = self.verify(scenario, plan.subject, &history, &runtime);
        let metrics = ScenarioMetrics::collect(&history, &runtime);

        Ok(ScenarioResult {
            scenario,
            seed: self.seed,
            passed: verdict.is_ok(),
            total_ticks,
            final_time_secs: total_ticks as f64 * dt,
            failure_reason: verdict.err(),
            metrics,
        })
    }

    // ========================================================================
    // SETUP
    // ========================================================================

    fn plan(&self, scenario: ScenarioId, duration: f64) -> ScenarioPlan {
        let volume = self.config.capture_volume;
        let span = volume.far - volume.near;
        let mid = (volume.near + volume.far) / 2.0;
        let still = Vector3::zeros();

        let mut crowd = Crowd::new(self.seed);
        let mut input = ScriptedInput::new();
        let mut subject = None;

        match scenario {
            ScenarioId::SingleViewer => {
                let height = crowd.sensor_height();
                let pitch = crowd.rng().gen_range(0.0..=10.0);
                crowd = crowd.with_sensor(height, pitch).with_joint_noise(0.005);

                let rng = crowd.rng();
                let lateral = rng.gen_range(-0.5 * volume.side..=0.5 * volume.side);
                let depth = rng.gen_range(volume.near + 0.25 * span..=volume.far - 0.25 * span);
                let stature = rng.gen_range(1.55..=1.85);
                subject = Some(crowd.spawn(lateral, depth, stature, still));
            }

            ScenarioId::NearestWins => {
                crowd = crowd.with_joint_noise(0.003);
                let laterals: Vec<f64> = (0..3)
                    .map(|_| crowd.rng().gen_range(-0.5 * volume.side..=0.5 * volume.side))
                    .collect();

                crowd.spawn(laterals[0], volume.near + 0.8 * span, 1.80, still);
                subject = Some(crowd.spawn(laterals[1], volume.near + 0.2 * span, 1.65, still));
                crowd.spawn(laterals[2], volume.near + 0.5 * span, 1.75, still);
                // Nearest of all, but inside the near bound
                crowd.spawn(0.0, volume.near - 0.4, 1.70, still);
            }

            ScenarioId::WalkOut => {
                let speed = (volume.far - mid + 0.2) / (0.4 * duration);
                subject = Some(crowd.spawn(0.0, mid, 1.72, Vector3::new(0.0, 0.0, speed)));
            }

            ScenarioId::EmptyRoom => {
                crowd.spawn(0.0, volume.far + 1.0, 1.70, still);
                crowd.spawn(volume.side + 0.4, mid, 1.70, still);
                let ghost = crowd.spawn(0.0, mid, 1.70, still);
                crowd.untrack(ghost);
            }

            ScenarioId::CalibrationNudge => {
                subject = Some(crowd.spawn(0.0, mid, 1.70, still));
                if !self.config.debug_on_start {
                    input = input.toggle_at(OVERLAY_ON_TICK);
                }
                input = input
                    .hold(NudgeDirection::Right, 10..20)
                    .hold(NudgeDirection::Up, 25..27)
                    .toggle_at(OVERLAY_OFF_TICK)
                    .hold(NudgeDirection::Left, 45..50);
            }

            ScenarioId::Approach => {
                // Keep the eye within the mirror's vertical extent
                let geometry = MirrorGeometry::from_calibration(&self.calibration);
                let offset_y = self.calibration.fine_offset_y;
                let eye = 1.70 + offset_y;
                let stature = if eye >= geometry.bottom_edge().y && eye <= geometry.top_edge().y {
                    1.70
                } else {
                    geometry.center.y - offset_y
                };

                let speed = (span - 0.1) / (0.8 * duration);
                subject = Some(crowd.spawn(
                    0.0,
                    volume.far - 0.05,
                    stature,
                    Vector3::new(0.0, 0.0, -speed),
                ));
            }

            ScenarioId::SensorDropout => {
                crowd = crowd.with_joint_noise(0.002).with_dropout(DROPOUT_TICKS);
                subject = Some(crowd.spawn(0.1, mid, 1.68, still));
            }
        }

        ScenarioPlan {
            crowd,
            input,
            subject,
        }
    }

    // ========================================================================
    // ASSERTIONS
    // ========================================================================

    fn verify(
        &self,
        scenario: ScenarioId,
        subject: Option<u64>,
        history: &[TickOutput],
        runtime: &SimRuntime,
    ) -> Result<(), String> {
        let stats = runtime.stats();
        let renderer = runtime.renderer();

        let present = history.iter().filter(|o| o.target_present).count() as u64;
        check(stats.poses_applied == present, || {
            format!("{} camera updates for {} ticks with a target", stats.poses_applied, present)
        })?;

        match scenario {
            ScenarioId::SingleViewer => {
                let geometry = MirrorGeometry::from_calibration(&self.calibration);
                for output in history {
                    check(output.target_present && output.target_id == subject, || {
                        format!("tick {}: viewer not selected", output.tick)
                    })?;
                    let (Some(pose), Some(skeleton)) = (&output.camera_pose, &output.skeleton) else {
                        return Err(format!("tick {}: no camera pose", output.tick));
                    };
                    let head = skeleton.joint(self.config.reference_joint);
                    check(pose.position == Vector3::new(head.x, head.y, -head.z), || {
                        format!("tick {}: camera is not the reflected head", output.tick)
                    })?;
                    check(pose.look_at == geometry.center, || {
                        format!("tick {}: camera not aimed at mirror center", output.tick)
                    })?;
                    let fov = pose.field_of_view_degrees;
                    check(fov > 0.0 && fov < 180.0 && fov != FALLBACK_FOV_DEGREES, || {
                        format!("tick {}: implausible FOV {:.3}", output.tick, fov)
                    })?;
                }
            }

            ScenarioId::NearestWins => {
                for output in history {
                    check(output.target_present && output.target_id == subject, || {
                        format!(
                            "tick {}: selected {:?}, nearest is {:?}",
                            output.tick, output.target_id, subject
                        )
                    })?;
                }
            }

            ScenarioId::WalkOut => {
                check(history.first().map_or(false, |o| o.target_present), || {
                    "viewer not selected at start".into()
                })?;
                let first_absent = history
                    .iter()
                    .position(|o| !o.target_present)
                    .ok_or_else(|| "viewer never left the capture volume".to_string())?;
                check(history[first_absent..].iter().all(|o| !o.target_present), || {
                    "viewer re-acquired after leaving".into()
                })?;

                let last_present = history[..first_absent].last().and_then(|o| o.camera_pose);
                check(renderer.last_pose() == last_present.as_ref(), || {
                    "render camera moved after the viewer left".into()
                })?;

                let expected = if self.config.clear_stale_selection { None } else { subject };
                let held = history.last().and_then(|o| o.target_id);
                check(held == expected, || format!("held target {:?}, expected {:?}", held, expected))?;
            }

            ScenarioId::EmptyRoom => {
                check(present == 0, || format!("{} ticks selected an ineligible body", present))?;
                check(renderer.pose_count() == 0, || "render camera was moved".into())?;
                check(renderer.marker_frames == 0, || "markers drawn without a target".into())?;
                check(history.iter().all(|o| o.target_id.is_none()), || {
                    "a target id was held".into()
                })?;
            }

            ScenarioId::CalibrationNudge => {
                self.verify_calibration(history, runtime)?;
            }

            ScenarioId::Approach => {
                let fovs: Vec<f64> = history
                    .iter()
                    .filter_map(|o| o.camera_pose.map(|p| p.field_of_view_degrees))
                    .collect();
                check(fovs.len() * 2 >= history.len(), || {
                    format!("viewer tracked for only {} of {} ticks", fovs.len(), history.len())
                })?;
                for (i, pair) in fovs.windows(2).enumerate() {
                    check(pair[1] >= pair[0] - 1e-9, || {
                        format!("FOV shrank from {:.4} to {:.4} at sample {}", pair[0], pair[1], i + 1)
                    })?;
                }
            }

            ScenarioId::SensorDropout => {
                check(present == history.len() as u64, || {
                    format!("target lost on {} ticks", history.len() as u64 - present)
                })?;
                let expected = DROPOUT_TICKS.end - DROPOUT_TICKS.start;
                check(stats.sensor_errors == expected, || {
                    format!("{} sensor errors, expected {}", stats.sensor_errors, expected)
                })?;
                check(stats.frames_received == history.len() as u64 - expected, || {
                    format!("{} frames received", stats.frames_received)
                })?;
            }
        }

        Ok(())
    }

    fn verify_calibration(&self, history: &[TickOutput], runtime: &SimRuntime) -> Result<(), String> {
        let step = self.config.nudge_step;
        let start = self.calibration;
        let params = runtime.session().calibration().get();

        // Each nudge rounds to the millimetre
        let within = |actual: f64, expected: f64, nudges: f64| (actual - expected).abs() <= nudges * 5e-4 + 1e-9;
        check(within(params.fine_offset_x, start.fine_offset_x + 10.0 * step, 10.0), || {
            format!("offset x {:.3} after ten right nudges", params.fine_offset_x)
        })?;
        check(within(params.fine_offset_y, start.fine_offset_y + 2.0 * step, 2.0), || {
            format!("offset y {:.3} after two up nudges", params.fine_offset_y)
        })?;

        let stored = runtime
            .session()
            .calibration()
            .storage()
            .load()
            .map_err(|e| e.to_string())?;
        check(stored == params, || "persisted offsets differ from the live ones".into())?;

        let head = |output: Option<&TickOutput>| {
            output
                .and_then(|o| o.skeleton.as_ref())
                .map(|s| s.joint(JointType::Head))
        };
        let (Some(before), Some(after)) = (head(history.first()), head(history.last())) else {
            return Err("viewer not tracked at both ends of the run".into());
        };
        let shift = after - before;
        check((shift.x - (params.fine_offset_x - start.fine_offset_x)).abs() < 1e-9, || {
            format!("head moved {:.4} in x", shift.x)
        })?;
        check((shift.y - (params.fine_offset_y - start.fine_offset_y)).abs() < 1e-9, || {
            format!("head moved {:.4} in y", shift.y)
        })?;

        let enabled_from = if self.config.debug_on_start { 0 } else { OVERLAY_ON_TICK };
        for (i, output) in history.iter().enumerate() {
            let enabled = (enabled_from..OVERLAY_OFF_TICK).contains(&(i as u64));
            check(output.markers.is_empty() != enabled, || {
                format!("tick {}: markers shown={} with overlay on={}", output.tick, !output.markers.is_empty(), enabled)
            })?;
            check(output.readout.is_some() == enabled, || {
                format!("tick {}: readout shown with overlay on={}", output.tick, enabled)
            })?;
        }

        let nudges: usize = history.iter().map(|o| o.nudges_applied).sum();
        check(nudges == 12, || format!("{} nudges applied, expected 12", nudges))
    }
}

fn check(condition: bool, reason: impl FnOnce() -> String) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(reason())
    }
}
