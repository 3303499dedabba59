//! The "TRACKING" Engine - single-target selection
//!
//! The sensor reports several bodies at once but the mirror can only be
//! correct for one pair of eyes. Each tick:
//! 1. Drop untracked slots
//! 2. Drop bodies whose reference joint lies outside the capture volume
//! 3. Keep the survivor nearest to the sensor (smallest depth)
//!
//! Ties on exactly equal depth go to the body seen first in the frame.

use mirror_env::{JointType, TrackedBody};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// CAPTURE VOLUME
// ============================================================================

/// Bounds on the reference joint's raw sensor-space position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureVolume {
    /// Minimum depth (Z) in metres
    pub near: f64,

    /// Maximum depth (Z) in metres
    pub far: f64,

    /// Maximum lateral distance |X| in metres
    pub side: f64,
}

impl Default for CaptureVolume {
    fn default() -> Self {
        Self {
            near: 1.75,
            far: 3.25,
            side: 0.75,
        }
    }
}

impl CaptureVolume {
    /// Whether a raw sensor-space point is eligible. Bounds are inclusive;
    /// non-finite coordinates are never inside.
    #[inline]
    pub fn contains(&self, point: &Vector3<f64>) -> bool {
        (self.near..=self.far).contains(&point.z) && (-self.side..=self.side).contains(&point.x)
    }
}

// ============================================================================
// ACTIVE TARGET
// ============================================================================

/// Result of target selection for one tick.
///
/// `is_present` is authoritative. `body` may hold the last selection from an
/// earlier tick even when nobody is in the capture volume now.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveTarget {
    pub is_present: bool,
    pub body: Option<TrackedBody>,
}

impl ActiveTarget {
    /// The body, only if it was selected this tick.
    pub fn current(&self) -> Option<&TrackedBody> {
        if self.is_present {
            self.body.as_ref()
        } else {
            None
        }
    }

    /// Tracking id of the held body, fresh or stale.
    pub fn tracking_id(&self) -> Option<u64> {
        self.body.as_ref().map(|b| b.tracking_id)
    }
}

// ============================================================================
// TARGET TRACKER
// ============================================================================

/// Selects the nearest eligible body each tick.
#[derive(Debug, Clone)]
pub struct TargetTracker {
    volume: CaptureVolume,
    reference_joint: JointType,
    clear_stale_selection: bool,
    active: ActiveTarget,
}

impl TargetTracker {
    /// Creates a tracker filtering on `reference_joint`.
    pub fn new(volume: CaptureVolume, reference_joint: JointType) -> Self {
        Self {
            volume,
            reference_joint,
            clear_stale_selection: false,
            active: ActiveTarget::default(),
        }
    }

    /// Tracker with the default capture volume and head as reference.
    pub fn with_defaults() -> Self {
        Self::new(CaptureVolume::default(), JointType::Head)
    }

    /// Drop the held body on ticks with no eligible candidate.
    pub fn clear_stale_selection(mut self, clear: bool) -> Self {
        self.clear_stale_selection = clear;
        self
    }

    /// The capture volume in use.
    pub fn volume(&self) -> &CaptureVolume {
        &self.volume
    }

    /// Runs selection over this tick's bodies.
    pub fn update(&mut self, bodies: &[TrackedBody]) -> &ActiveTarget {
        let mut nearest: Option<(f64, &TrackedBody)> = None;

        for body in bodies.iter().filter(|b| b.is_tracked) {
            let reference = body.joint(self.reference_joint);
            if !self.volume.contains(&reference) {
                continue;
            }
            // Strict comparison keeps the first body on equal depth
            match nearest {
                Some((depth, _)) if reference.z >= depth => {}
                _ => nearest = Some((reference.z, body)),
            }
        }

        match nearest {
            Some((depth, body)) => {
                if self.active.tracking_id() != Some(body.tracking_id) || !self.active.is_present {
                    debug!("Target acquired: body {} at depth {:.3}m", body.tracking_id, depth);
                }
                self.active.is_present = true;
                self.active.body = Some(body.clone());
            }
            None => {
                if self.active.is_present {
                    debug!("Target lost ({} bodies in frame)", bodies.len());
                }
                self.active.is_present = false;
                if self.clear_stale_selection {
                    self.active.body = None;
                }
            }
        }

        &self.active
    }

    /// Selection from the most recent update.
    pub fn active(&self) -> &ActiveTarget {
        &self.active
    }

    /// Forgets any selection.
    pub fn reset(&mut self) {
        self.active = ActiveTarget::default();
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn body_with_head(id: u64, x: f64, z: f64) -> TrackedBody {
        let mut body = TrackedBody::new(id, [Vector3::zeros(); JointType::COUNT]);
        body.set_joint(JointType::Head, Vector3::new(x, 1.6, z));
        body
    }

    #[test]
    fn test_no_bodies_not_present() {
        let mut tracker = TargetTracker::with_defaults();
        let target = tracker.update(&[]);
        assert!(!target.is_present);
        assert!(target.body.is_none());
    }

    #[test]
    fn test_volume_bounds() {
        let volume = CaptureVolume::default();
        assert!(volume.contains(&Vector3::new(0.0, 1.6, 2.5)));
        assert!(volume.contains(&Vector3::new(0.75, 1.6, 1.75)));
        assert!(volume.contains(&Vector3::new(-0.75, 1.6, 3.25)));
        assert!(!volume.contains(&Vector3::new(0.0, 1.6, 3.26)));
        assert!(!volume.contains(&Vector3::new(0.0, 1.6, 1.74)));
        assert!(!volume.contains(&Vector3::new(0.76, 1.6, 2.5)));
        assert!(!volume.contains(&Vector3::new(-0.76, 1.6, 2.5)));
    }

    #[test]
    fn test_non_finite_points_outside_volume() {
        let volume = CaptureVolume::default();
        assert!(!volume.contains(&Vector3::new(f64::NAN, f64::NAN, f64::NAN)));
        assert!(!volume.contains(&Vector3::new(0.0, 1.6, f64::NAN)));
        assert!(!volume.contains(&Vector3::new(f64::NAN, 1.6, 2.5)));
        assert!(!volume.contains(&Vector3::new(0.0, 1.6, f64::INFINITY)));
    }

    #[test]
    fn test_non_finite_head_never_selected() {
        let mut tracker = TargetTracker::with_defaults();
        let mut garbled = TrackedBody::new(1, [Vector3::zeros(); JointType::COUNT]);
        garbled.set_joint(JointType::Head, Vector3::new(f64::NAN, f64::NAN, f64::NAN));
        let bodies = vec![body_with_head(0, 0.5, 2.5), garbled.clone()];

        let target = tracker.update(&bodies);
        assert!(target.is_present);
        assert_eq!(target.tracking_id(), Some(0));

        let target = tracker.update(&[garbled]);
        assert!(!target.is_present);
        assert_eq!(target.tracking_id(), Some(0));
    }

    #[test]
    fn test_nearest_wins() {
        let mut tracker = TargetTracker::with_defaults();
        let bodies = vec![body_with_head(1, 0.0, 3.0), body_with_head(2, 0.2, 2.2)];

        let target = tracker.update(&bodies);
        assert!(target.is_present);
        assert_eq!(target.tracking_id(), Some(2));
    }

    #[test]
    fn test_equal_depth_first_wins() {
        let mut tracker = TargetTracker::with_defaults();
        let bodies = vec![body_with_head(5, 0.3, 2.0), body_with_head(3, -0.3, 2.0)];

        assert_eq!(tracker.update(&bodies).tracking_id(), Some(5));

        let reversed = vec![bodies[1].clone(), bodies[0].clone()];
        assert_eq!(tracker.update(&reversed).tracking_id(), Some(3));
    }

    #[test]
    fn test_untracked_ignored() {
        let mut tracker = TargetTracker::with_defaults();
        let mut ghost = body_with_head(1, 0.0, 2.0);
        ghost.is_tracked = false;
        let bodies = vec![ghost, body_with_head(2, 0.0, 3.0)];

        assert_eq!(tracker.update(&bodies).tracking_id(), Some(2));
    }

    #[test]
    fn test_out_of_volume_excluded() {
        let mut tracker = TargetTracker::with_defaults();
        let bodies = vec![
            body_with_head(1, 0.0, 1.0), // too near
            body_with_head(2, 0.0, 4.0), // too far
            body_with_head(3, 1.0, 2.0), // too far right
            body_with_head(4, -1.0, 2.0), // too far left
        ];

        let target = tracker.update(&bodies);
        assert!(!target.is_present);
        assert!(target.body.is_none());
    }

    #[test]
    fn test_stale_selection_retained() {
        let mut tracker = TargetTracker::with_defaults();
        tracker.update(&[body_with_head(9, 0.0, 2.0)]);

        let target = tracker.update(&[]);
        assert!(!target.is_present);
        assert_eq!(target.tracking_id(), Some(9));
        assert!(target.current().is_none());

        // Walked out of the volume rather than vanishing
        let target = tracker.update(&[body_with_head(9, 0.0, 5.0)]);
        assert!(!target.is_present);
        assert_eq!(target.body.as_ref().unwrap().joint(JointType::Head).z, 2.0);
    }

    #[test]
    fn test_stale_selection_cleared_when_configured() {
        let mut tracker = TargetTracker::with_defaults().clear_stale_selection(true);
        tracker.update(&[body_with_head(9, 0.0, 2.0)]);

        let target = tracker.update(&[]);
        assert!(!target.is_present);
        assert!(target.body.is_none());
    }

    #[test]
    fn test_reset() {
        let mut tracker = TargetTracker::with_defaults();
        tracker.update(&[body_with_head(1, 0.0, 2.0)]);
        tracker.reset();
        assert_eq!(tracker.active(), &ActiveTarget::default());
    }

    proptest! {
        #[test]
        fn prop_selected_body_is_inside_and_nearest(
            heads in proptest::collection::vec((-1.5f64..1.5, 0.5f64..4.5), 0..8)
        ) {
            let bodies: Vec<_> = heads
                .iter()
                .enumerate()
                .map(|(i, (x, z))| body_with_head(i as u64, *x, *z))
                .collect();
            let mut tracker = TargetTracker::with_defaults();
            let volume = *tracker.volume();
            let target = tracker.update(&bodies).clone();

            let eligible: Vec<_> = bodies
                .iter()
                .filter(|b| volume.contains(&b.joint(JointType::Head)))
                .collect();

            prop_assert_eq!(target.is_present, !eligible.is_empty());
            if let Some(selected) = target.current() {
                let head = selected.joint(JointType::Head);
                prop_assert!(volume.contains(&head));
                for other in &eligible {
                    prop_assert!(head.z <= other.joint(JointType::Head).z);
                }
            }
        }
    }
}
