//! Mirror camera scenarios.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// MIR-001: one viewer standing inside the capture volume
    SingleViewer,

    /// MIR-002: several viewers, the nearest one drives the camera
    NearestWins,

    /// MIR-003: the viewer walks out past the far bound
    WalkOut,

    /// MIR-004: nobody eligible, the camera is never touched
    EmptyRoom,

    /// MIR-005: live fine-offset calibration through the debug overlay
    CalibrationNudge,

    /// MIR-006: the viewer walks toward the mirror
    Approach,

    /// MIR-007: the sensor drops frames mid-run
    SensorDropout,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SingleViewer,
            ScenarioId::NearestWins,
            ScenarioId::WalkOut,
            ScenarioId::EmptyRoom,
            ScenarioId::CalibrationNudge,
            ScenarioId::Approach,
            ScenarioId::SensorDropout,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::SingleViewer => "single_viewer",
            ScenarioId::NearestWins => "nearest_wins",
            ScenarioId::WalkOut => "walk_out",
            ScenarioId::EmptyRoom => "empty_room",
            ScenarioId::CalibrationNudge => "calibration_nudge",
            ScenarioId::Approach => "approach",
            ScenarioId::SensorDropout => "sensor_dropout",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::SingleViewer => "One noisy viewer, camera mirrors the head every tick",
            ScenarioId::NearestWins => "Three viewers inside plus one too close, nearest depth is selected",
            ScenarioId::WalkOut => "Viewer leaves through the far bound, camera freezes on the last pose",
            ScenarioId::EmptyRoom => "Only ineligible bodies, no camera updates",
            ScenarioId::CalibrationNudge => "Toggle overlay, nudge offsets, verify persistence and projection shift",
            ScenarioId::Approach => "Viewer walks toward the mirror, FOV never shrinks",
            ScenarioId::SensorDropout => "30 failed acquisitions, last frame keeps the camera alive",
        }
    }

    /// Fewest ticks the scenario needs for its script to play out.
    pub fn min_ticks(&self) -> u64 {
        match self {
            ScenarioId::CalibrationNudge => 60,
            ScenarioId::SensorDropout => 90,
            _ => 30,
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single_viewer" | "singleviewer" | "mir-001" => Ok(ScenarioId::SingleViewer),
            "nearest_wins" | "nearestwins" | "mir-002" => Ok(ScenarioId::NearestWins),
            "walk_out" | "walkout" | "mir-003" => Ok(ScenarioId::WalkOut),
            "empty_room" | "emptyroom" | "mir-004" => Ok(ScenarioId::EmptyRoom),
            "calibration_nudge" | "calibrationnudge" | "mir-005" => Ok(ScenarioId::CalibrationNudge),
            "approach" | "mir-006" => Ok(ScenarioId::Approach),
            "sensor_dropout" | "sensordropout" | "mir-007" => Ok(ScenarioId::SensorDropout),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
            assert_eq!(scenario.to_string(), scenario.name());
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("MIR-005".parse::<ScenarioId>(), Ok(ScenarioId::CalibrationNudge));
        assert_eq!("WalkOut".parse::<ScenarioId>(), Ok(ScenarioId::WalkOut));
        assert!("flash_mob".parse::<ScenarioId>().is_err());
    }
}
