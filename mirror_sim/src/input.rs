//! Scripted input - replays debug key presses at fixed ticks.

use mirror_env::{InputSignals, InputSource, NudgeDirection};
use std::collections::BTreeMap;

/// An [`InputSource`] that returns pre-recorded signals.
///
/// Ticks are counted from zero, one per `poll`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    events: BTreeMap<u64, InputSignals>,
    tick: u64,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises `signals` at `tick`, merged with anything already scheduled.
    pub fn at(mut self, tick: u64, signals: InputSignals) -> Self {
        let slot = self.events.entry(tick).or_default();
        slot.toggle_debug |= signals.toggle_debug;
        slot.nudge_left |= signals.nudge_left;
        slot.nudge_right |= signals.nudge_right;
        slot.nudge_up |= signals.nudge_up;
        slot.nudge_down |= signals.nudge_down;
        self
    }

    /// Presses the debug toggle at `tick`.
    pub fn toggle_at(self, tick: u64) -> Self {
        self.at(tick, InputSignals::toggle())
    }

    /// Holds a nudge key for every tick in `ticks`.
    pub fn hold(self, direction: NudgeDirection, ticks: std::ops::Range<u64>) -> Self {
        ticks.fold(self, |input, tick| input.at(tick, InputSignals::nudge(direction)))
    }

    /// Number of ticks with any signal raised.
    pub fn event_count(&self) -> usize {
        self.events.values().filter(|s| !s.is_idle()).count()
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> InputSignals {
        let signals = self.events.get(&self.tick).copied().unwrap_or_default();
        self.tick += 1;
        signals
    }
}
