//! Skeleton types reported by the body sensor.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// A skeleton joint, in the sensor's enumeration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JointType {
    SpineBase,
    SpineMid,
    Neck,
    Head,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
    SpineShoulder,
    HandTipLeft,
    ThumbLeft,
    HandTipRight,
    ThumbRight,
}

impl JointType {
    /// Number of joints in a full skeleton.
    pub const COUNT: usize = 25;

    /// Every joint, in enumeration order.
    pub const ALL: [JointType; JointType::COUNT] = [
        JointType::SpineBase,
        JointType::SpineMid,
        JointType::Neck,
        JointType::Head,
        JointType::ShoulderLeft,
        JointType::ElbowLeft,
        JointType::WristLeft,
        JointType::HandLeft,
        JointType::ShoulderRight,
        JointType::ElbowRight,
        JointType::WristRight,
        JointType::HandRight,
        JointType::HipLeft,
        JointType::KneeLeft,
        JointType::AnkleLeft,
        JointType::FootLeft,
        JointType::HipRight,
        JointType::KneeRight,
        JointType::AnkleRight,
        JointType::FootRight,
        JointType::SpineShoulder,
        JointType::HandTipLeft,
        JointType::ThumbLeft,
        JointType::HandTipRight,
        JointType::ThumbRight,
    ];

    /// Position of this joint in [`JointType::ALL`].
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// One body as reported by the sensor for a single frame.
///
/// Positions are in raw sensor space (metres): X lateral, Y up, Z depth
/// away from the sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedBody {
    /// Sensor-assigned identifier, stable while the person stays tracked
    pub tracking_id: u64,

    /// Whether the sensor currently tracks this body slot
    pub is_tracked: bool,

    /// Raw joint positions indexed by [`JointType::index`]
    pub joints: [Vector3<f64>; JointType::COUNT],
}

impl TrackedBody {
    /// Creates a tracked body with every joint at the given positions.
    pub fn new(tracking_id: u64, joints: [Vector3<f64>; JointType::COUNT]) -> Self {
        Self {
            tracking_id,
            is_tracked: true,
            joints,
        }
    }

    /// Creates an empty (untracked) body slot.
    pub fn untracked(tracking_id: u64) -> Self {
        Self {
            tracking_id,
            is_tracked: false,
            joints: [Vector3::zeros(); JointType::COUNT],
        }
    }

    /// Raw sensor-space position of a joint.
    #[inline]
    pub fn joint(&self, joint: JointType) -> Vector3<f64> {
        self.joints[joint.index()]
    }

    /// Overwrites a single joint position.
    pub fn set_joint(&mut self, joint: JointType, position: Vector3<f64>) {
        self.joints[joint.index()] = position;
    }
}
