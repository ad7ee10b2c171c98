use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::{geometry::Vec3, FieldGeometry, Hand, Result, SaberError};

/// Tracked state of one hand as published by the tracking adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HandState {
    /// World position, `None` while the hand is not detected.
    pub position: Option<Vec3>,
    /// World units per second.
    pub velocity: Vec3,
}

impl HandState {
    pub fn at(position: Vec3, velocity: Vec3) -> Self {
        Self {
            position: Some(position),
            velocity,
        }
    }

    pub fn lost() -> Self {
        Self::default()
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }
}

/// Both hands, always written and read as a whole.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HandsSnapshot {
    pub left: HandState,
    pub right: HandState,
}

impl HandsSnapshot {
    pub fn hand(&self, hand: Hand) -> &HandState {
        match hand {
            Hand::Left => &self.left,
            Hand::Right => &self.right,
        }
    }

    pub fn hand_mut(&mut self, hand: Hand) -> &mut HandState {
        match hand {
            Hand::Left => &mut self.left,
            Hand::Right => &mut self.right,
        }
    }
}

/// Slot shared between the detector loop and the simulation tick.
///
/// The detector replaces the whole snapshot; the tick copies it out once at
/// the start of every frame. Last write wins.
#[derive(Clone, Default)]
pub struct SharedHands {
    slot: Arc<Mutex<HandsSnapshot>>,
}

impl SharedHands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: HandsSnapshot) -> Result<()> {
        let mut slot = self.lock()?;
        *slot = snapshot;
        Ok(())
    }

    pub fn snapshot(&self) -> Result<HandsSnapshot> {
        let slot = self.lock()?;
        Ok(*slot)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HandsSnapshot>> {
        self.slot
            .lock()
            .map_err(|_| SaberError::SharedStatePoisoned("hand tracking slot"))
    }
}

impl std::fmt::Debug for SharedHands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedHands").finish()
    }
}

/// Normalised 2D landmark as produced by the vision model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

const DEFAULT_VELOCITY_ALPHA: f32 = 0.5;
/// Gaps longer than this reset the velocity estimate.
const MAX_SAMPLE_GAP: f32 = 0.25;

/// Turns raw per-frame landmarks of one hand into a world position and a
/// smoothed velocity.
#[derive(Debug, Clone)]
pub struct LandmarkSmoother {
    field: FieldGeometry,
    alpha: f32,
    last: Option<(Vec3, f32)>,
    velocity: Vec3,
}

impl LandmarkSmoother {
    pub fn new(field: FieldGeometry) -> Self {
        Self::with_alpha(field, DEFAULT_VELOCITY_ALPHA)
    }

    pub fn with_alpha(field: FieldGeometry, alpha: f32) -> Self {
        Self {
            field,
            alpha: alpha.clamp(0.0, 1.0),
            last: None,
            velocity: Vec3::ZERO,
        }
    }

    /// Maps a landmark onto the player plane. The camera image is mirrored
    /// and image y grows downwards, so both axes are flipped. The unit square
    /// spans one lane/layer spacing beyond the outermost slots.
    pub fn to_world(&self, landmark: Landmark) -> Vec3 {
        let half_width = self.field.lane_x(3) + self.field.lane_spacing;
        let half_height = self.field.layer_y(2) + self.field.layer_spacing;
        Vec3::new(
            (0.5 - landmark.x) * 2.0 * half_width,
            (0.5 - landmark.y) * 2.0 * half_height,
            0.0,
        )
    }

    /// Feeds one detection cycle. `timestamp` is in seconds.
    pub fn update(&mut self, landmark: Option<Landmark>, timestamp: f32) -> HandState {
        let Some(landmark) = landmark else {
            self.last = None;
            self.velocity = Vec3::ZERO;
            return HandState::lost();
        };

        let position = self.to_world(landmark);
        match self.last {
            Some((previous, previous_time)) => {
                let dt = timestamp - previous_time;
                if dt > 0.0 && dt <= MAX_SAMPLE_GAP {
                    let instant = (position - previous) * (1.0 / dt);
                    self.velocity = self.velocity * (1.0 - self.alpha) + instant * self.alpha;
                } else {
                    self.velocity = Vec3::ZERO;
                }
            }
            None => self.velocity = Vec3::ZERO,
        }

        self.last = Some((position, timestamp));
        HandState::at(position, self.velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_and_reads_whole_snapshots() {
        let shared = SharedHands::new();
        let detector = shared.clone();
        let snapshot = HandsSnapshot {
            left: HandState::at(Vec3::new(1.0, 2.0, 0.0), Vec3::new(0.0, -5.0, 0.0)),
            right: HandState::lost(),
        };

        std::thread::spawn(move || detector.publish(snapshot).unwrap())
            .join()
            .unwrap();

        assert_eq!(shared.snapshot().unwrap(), snapshot);
    }

    #[test]
    fn centre_of_image_maps_to_field_centre() {
        let smoother = LandmarkSmoother::new(FieldGeometry::default());
        let centre = smoother.to_world(Landmark { x: 0.5, y: 0.5 });
        assert!(centre.length() < 1e-6);

        let upper_left_of_image = smoother.to_world(Landmark { x: 0.0, y: 0.0 });
        assert!(upper_left_of_image.x > 0.0, "image is mirrored");
        assert!(upper_left_of_image.y > 0.0);
    }

    #[test]
    fn velocity_follows_motion_and_resets_on_loss() {
        let mut smoother = LandmarkSmoother::with_alpha(FieldGeometry::default(), 1.0);
        smoother.update(Some(Landmark { x: 0.5, y: 0.2 }), 0.0);
        let state = smoother.update(Some(Landmark { x: 0.5, y: 0.8 }), 0.1);
        assert!(state.velocity.y < 0.0, "hand moved down the image");
        assert!(state.speed() > 1.0);

        let lost = smoother.update(None, 0.2);
        assert!(lost.position.is_none());
        let back = smoother.update(Some(Landmark { x: 0.5, y: 0.5 }), 0.3);
        assert_eq!(back.velocity, Vec3::ZERO);
    }
}
