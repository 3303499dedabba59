//! Magic Mirror Deterministic Simulation Harness
//!
//! Runs the real `MirrorRuntime` against a simulated installation:
//! - **Sensor**: a seeded synthetic crowd emitting skeleton frames
//! - **Input**: scripted debug key presses
//! - **Renderer**: a recorder that keeps every camera pose and marker
//!
//! All randomness derives from a single 64-bit seed, so a failing run can
//! be replayed exactly.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                       │
//! │  ┌─────────┐   frames   ┌──────────────┐   poses          │
//! │  │  Crowd  │───────────►│ MirrorRuntime│──────────┐       │
//! │  └─────────┘            └──────▲───────┘          ▼       │
//! │                                │          ┌─────────────┐ │
//! │                  ScriptedInput─┘          │  Recording  │ │
//! │                                           │  Renderer   │ │
//! │                                           └─────────────┘ │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use mirror_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let runner = ScenarioRunner::new(42, ScenarioRunner::installation_calibration());
//! let result = runner.run(ScenarioId::NearestWins);
//! assert!(result.passed);
//! ```

mod crowd;
mod error;
mod exporter;
mod input;
mod renderer;
mod runner;
pub mod scenarios;

pub use crowd::{template_offset, Crowd, Person};
pub use error::SimError;
pub use exporter::{CameraFrame, Point, SimExport, SimFrame};
pub use input::ScriptedInput;
pub use renderer::RecordingRenderer;
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
