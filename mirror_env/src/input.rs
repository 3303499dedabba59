//! Input collaborator: discrete debug signals delivered once per tick.

use serde::{Deserialize, Serialize};

/// Direction of a fine-offset nudge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NudgeDirection {
    Left,
    Right,
    Up,
    Down,
}

impl NudgeDirection {
    /// Unit step on the (X, Y) offset plane.
    pub fn unit(self) -> (f64, f64) {
        match self {
            NudgeDirection::Left => (-1.0, 0.0),
            NudgeDirection::Right => (1.0, 0.0),
            NudgeDirection::Up => (0.0, 1.0),
            NudgeDirection::Down => (0.0, -1.0),
        }
    }
}

/// Signals raised during one tick. The default is "nothing pressed".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSignals {
    /// Flip debug mode on/off
    pub toggle_debug: bool,
    pub nudge_left: bool,
    pub nudge_right: bool,
    pub nudge_up: bool,
    pub nudge_down: bool,
}

impl InputSignals {
    /// Signals with only the debug toggle raised.
    pub fn toggle() -> Self {
        Self {
            toggle_debug: true,
            ..Default::default()
        }
    }

    /// Signals with a single nudge raised.
    pub fn nudge(direction: NudgeDirection) -> Self {
        let mut signals = Self::default();
        match direction {
            NudgeDirection::Left => signals.nudge_left = true,
            NudgeDirection::Right => signals.nudge_right = true,
            NudgeDirection::Up => signals.nudge_up = true,
            NudgeDirection::Down => signals.nudge_down = true,
        }
        signals
    }

    /// Raised nudges in left, right, up, down order.
    pub fn nudges(&self) -> impl Iterator<Item = NudgeDirection> + '_ {
        [
            (self.nudge_left, NudgeDirection::Left),
            (self.nudge_right, NudgeDirection::Right),
            (self.nudge_up, NudgeDirection::Up),
            (self.nudge_down, NudgeDirection::Down),
        ]
        .into_iter()
        .filter_map(|(raised, dir)| raised.then_some(dir))
    }

    /// True when no signal is raised.
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// Source of per-tick input signals (keyboard, remote, script).
pub trait InputSource {
    /// Signals raised since the previous poll.
    fn poll(&mut self) -> InputSignals;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        assert!(InputSignals::default().is_idle());
        assert!(!InputSignals::toggle().is_idle());
    }

    #[test]
    fn test_nudges_order() {
        let signals = InputSignals {
            nudge_down: true,
            nudge_left: true,
            ..Default::default()
        };
        let dirs: Vec<_> = signals.nudges().collect();
        assert_eq!(dirs, vec![NudgeDirection::Left, NudgeDirection::Down]);
    }

    #[test]
    fn test_nudge_units() {
        assert_eq!(NudgeDirection::Left.unit(), (-1.0, 0.0));
        assert_eq!(NudgeDirection::Up.unit(), (0.0, 1.0));
        assert!(InputSignals::nudge(NudgeDirection::Right).nudge_right);
    }
}
