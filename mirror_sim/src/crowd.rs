//! Synthetic crowd - the ground truth the simulated sensor observes.
//!
//! The Crowd holds every simulated person in front of the mirror:
//! - Head positions in the level sensor frame (constant-velocity walk)
//! - Full standing skeletons built from a fixed template
//! - Sensor frame generation (pitch, floor plane, optional joint noise)
//! - Scheduled sensor dropouts
//!
//! People are kept in spawn order so frames are reproducible for a seed.

use mirror_env::{BodySource, EnvError, FloorPlane, JointType, SensorFrame, TrackedBody};
use nalgebra::{Rotation3, Vector3};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::trace;

/// One simulated person.
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    /// Tracking id reported by the sensor
    pub id: u64,

    /// Head position in the level sensor frame (metres)
    pub head: Vector3<f64>,

    /// Walking velocity (m/s)
    pub velocity: Vector3<f64>,

    /// Whether the sensor currently reports this body as tracked
    pub tracked: bool,
}

/// Offset of a joint from the head for a standing person facing the sensor.
pub fn template_offset(joint: JointType) -> Vector3<f64> {
    let (x, y, z) = match joint {
        JointType::SpineBase => (0.0, -0.65, 0.0),
        JointType::SpineMid => (0.0, -0.42, 0.0),
        JointType::Neck => (0.0, -0.12, 0.0),
        JointType::Head => (0.0, 0.0, 0.0),
        JointType::ShoulderLeft => (-0.18, -0.22, 0.0),
        JointType::ElbowLeft => (-0.22, -0.47, 0.0),
        JointType::WristLeft => (-0.24, -0.70, 0.0),
        JointType::HandLeft => (-0.24, -0.78, 0.0),
        JointType::ShoulderRight => (0.18, -0.22, 0.0),
        JointType::ElbowRight => (0.22, -0.47, 0.0),
        JointType::WristRight => (0.24, -0.70, 0.0),
        JointType::HandRight => (0.24, -0.78, 0.0),
        JointType::HipLeft => (-0.10, -0.70, 0.0),
        JointType::KneeLeft => (-0.10, -1.15, 0.0),
        JointType::AnkleLeft => (-0.10, -1.57, 0.0),
        JointType::FootLeft => (-0.10, -1.64, -0.08),
        JointType::HipRight => (0.10, -0.70, 0.0),
        JointType::KneeRight => (0.10, -1.15, 0.0),
        JointType::AnkleRight => (0.10, -1.57, 0.0),
        JointType::FootRight => (0.10, -1.64, -0.08),
        JointType::SpineShoulder => (0.0, -0.20, 0.0),
        JointType::HandTipLeft => (-0.24, -0.86, 0.0),
        JointType::ThumbLeft => (-0.21, -0.80, -0.03),
        JointType::HandTipRight => (0.24, -0.86, 0.0),
        JointType::ThumbRight => (0.21, -0.80, -0.03),
    };
    Vector3::new(x, y, z)
}

/// The Crowd - ground truth for the simulated body sensor.
pub struct Crowd {
    seed: u64,
    rng: ChaCha8Rng,
    people: BTreeMap<u64, Person>,
    next_id: u64,
    current_time: f64,

    /// Sensor height above the floor (metres)
    sensor_height: f64,

    /// Sensor pitch, positive looking down (degrees)
    sensor_pitch_degrees: f64,

    joint_noise: Option<Normal<f64>>,

    /// Acquisition indices at which the sensor reports an error
    dropouts: Vec<Range<u64>>,
    acquisitions: u64,
}

impl Crowd {
    /// Creates an empty crowd with a level sensor 0.8m above the floor.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            people: BTreeMap::new(),
            next_id: 1,
            current_time: 0.0,
            sensor_height: 0.8,
            sensor_pitch_degrees: 0.0,
            joint_noise: None,
            dropouts: Vec::new(),
            acquisitions: 0,
        }
    }

    /// Sets the sensor mounting.
    pub fn with_sensor(mut self, height: f64, pitch_degrees: f64) -> Self {
        self.sensor_height = height;
        self.sensor_pitch_degrees = pitch_degrees;
        self
    }

    /// Adds zero-mean Gaussian noise to every joint coordinate.
    /// A non-positive or non-finite deviation disables noise.
    pub fn with_joint_noise(mut self, std_dev: f64) -> Self {
        self.joint_noise = if std_dev > 0.0 {
            Normal::new(0.0, std_dev).ok()
        } else {
            None
        };
        self
    }

    /// Makes the sensor fail for the given acquisition indices.
    pub fn with_dropout(mut self, acquisitions: Range<u64>) -> Self {
        self.dropouts.push(acquisitions);
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn sensor_height(&self) -> f64 {
        self.sensor_height
    }

    /// Mutable access to the crowd's RNG for scenario setup.
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Adds a person whose feet are at (`lateral`, `depth`) in front of the
    /// sensor and whose head is `stature` metres above the floor.
    pub fn spawn(&mut self, lateral: f64, depth: f64, stature: f64, velocity: Vector3<f64>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let head = Vector3::new(lateral, stature - self.sensor_height, depth);
        self.people.insert(
            id,
            Person {
                id,
                head,
                velocity,
                tracked: true,
            },
        );
        id
    }

    /// Removes a person entirely.
    pub fn remove(&mut self, id: u64) {
        self.people.remove(&id);
    }

    /// Keeps the body slot but reports it as untracked.
    pub fn untrack(&mut self, id: u64) {
        if let Some(person) = self.people.get_mut(&id) {
            person.tracked = false;
        }
    }

    /// Advances every person by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        self.current_time += dt;
        for person in self.people.values_mut() {
            person.head += person.velocity * dt;
        }
    }

    pub fn time(&self) -> f64 {
        self.current_time
    }

    pub fn person(&self, id: u64) -> Option<&Person> {
        self.people.get(&id)
    }

    pub fn people(&self) -> impl Iterator<Item = &Person> {
        self.people.values()
    }

    /// Floor plane for the configured mounting.
    pub fn floor(&self) -> FloorPlane {
        FloorPlane::for_mounting(self.sensor_height, self.sensor_pitch_degrees)
    }

    /// What the sensor sees right now.
    pub fn frame(&mut self) -> SensorFrame {
        // Undo the pitch so leveling recovers the level-frame positions
        let to_sensor = Rotation3::from_axis_angle(&Vector3::x_axis(), -self.sensor_pitch_degrees.to_radians());

        let mut bodies = Vec::with_capacity(self.people.len());
        for person in self.people.values() {
            if !person.tracked {
                bodies.push(TrackedBody::untracked(person.id));
                continue;
            }

            let mut joints = [Vector3::zeros(); JointType::COUNT];
            for (slot, joint) in joints.iter_mut().zip(JointType::ALL) {
                let level = person.head + template_offset(joint);
                let noise = match &self.joint_noise {
                    Some(normal) => Vector3::new(
                        normal.sample(&mut self.rng),
                        normal.sample(&mut self.rng),
                        normal.sample(&mut self.rng),
                    ),
                    None => Vector3::zeros(),
                };
                *slot = to_sensor * level + noise;
            }
            bodies.push(TrackedBody::new(person.id, joints));
        }

        SensorFrame::new(bodies, self.floor())
    }
}

impl BodySource for Crowd {
    fn acquire_latest(&mut self) -> Result<Option<SensorFrame>, EnvError> {
        let index = self.acquisitions;
        self.acquisitions += 1;

        if self.dropouts.iter().any(|r| r.contains(&index)) {
            trace!("Simulated dropout at acquisition {}", index);
            return Err(EnvError::unavailable(format!("simulated dropout at acquisition {}", index)));
        }
        Ok(Some(self.frame()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mirror_core::{JointProjector, SensorPose};

    #[test]
    fn test_spawn_and_step() {
        let mut crowd = Crowd::new(42);
        let id = crowd.spawn(0.2, 2.5, 1.7, Vector3::new(0.0, 0.0, 0.5));

        let person = crowd.person(id).unwrap();
        assert_relative_eq!(person.head, Vector3::new(0.2, 0.9, 2.5), epsilon = 1e-12);

        crowd.step(1.0);
        assert_relative_eq!(crowd.person(id).unwrap().head.z, 3.0, epsilon = 1e-12);
        assert_relative_eq!(crowd.time(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_frame_keeps_spawn_order() {
        let mut crowd = Crowd::new(1);
        let a = crowd.spawn(0.0, 3.0, 1.7, Vector3::zeros());
        let b = crowd.spawn(0.0, 2.0, 1.7, Vector3::zeros());
        crowd.untrack(a);

        let frame = crowd.frame();
        assert_eq!(frame.bodies.len(), 2);
        assert_eq!(frame.bodies[0].tracking_id, a);
        assert!(!frame.bodies[0].is_tracked);
        assert_eq!(frame.bodies[1].tracking_id, b);
        assert_eq!(frame.tracked_count(), 1);
    }

    #[test]
    fn test_pitched_frame_levels_back() {
        let mut crowd = Crowd::new(7).with_sensor(1.1, 12.0);
        let id = crowd.spawn(-0.3, 2.4, 1.75, Vector3::zeros());
        let frame = crowd.frame();

        let pose = SensorPose {
            position: Vector3::zeros(),
            tilt_degrees: mirror_core::tilt_from_normal(&frame.floor.normal()),
        };
        let head = frame.bodies[0].joint(JointType::Head);
        let leveled = JointProjector::project(&head, &pose);
        assert_relative_eq!(leveled, crowd.person(id).unwrap().head, epsilon = 1e-9);
    }

    #[test]
    fn test_noise_is_seeded() {
        let build = |seed| {
            let mut crowd = Crowd::new(seed).with_joint_noise(0.01);
            crowd.spawn(0.0, 2.5, 1.7, Vector3::zeros());
            crowd.frame()
        };
        assert_eq!(build(9), build(9));
        assert_ne!(build(9), build(10));
    }

    #[test]
    fn test_dropout_window() {
        let mut crowd = Crowd::new(3).with_dropout(1..3);
        assert!(crowd.acquire_latest().unwrap().is_some());
        assert!(crowd.acquire_latest().is_err());
        assert!(crowd.acquire_latest().is_err());
        assert!(crowd.acquire_latest().unwrap().is_some());
    }

    #[test]
    fn test_remove() {
        let mut crowd = Crowd::new(3);
        let id = crowd.spawn(0.0, 2.0, 1.7, Vector3::zeros());
        crowd.remove(id);
        assert!(crowd.frame().bodies.is_empty());
    }
}
