use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::FieldGeometry;

pub const LANE_COUNT: u8 = 4;
pub const LAYER_COUNT: u8 = 3;

/// World-space vector. x runs across lanes, y across layers, z along the
/// travel axis (notes move towards +z).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector.
    pub fn normalized(self) -> Option<Vec3> {
        let len = self.length();
        if len <= f32::EPSILON {
            None
        } else {
            Some(self * (1.0 / len))
        }
    }

    /// Distance in the lane/layer plane, ignoring the travel axis.
    pub fn planar_distance(self, other: Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Remaining distance a note has to travel before reaching the player plane.
///
/// Pure in its inputs: equal arguments always give the same result.
pub fn travel_distance(time_to_target: f32, note_speed: f32) -> f32 {
    time_to_target * note_speed
}

impl FieldGeometry {
    /// Horizontal coordinate of a lane; lanes are centred on x = 0.
    pub fn lane_x(&self, lane: u8) -> f32 {
        let centre = (LANE_COUNT as f32 - 1.0) * 0.5;
        (lane as f32 - centre) * self.lane_spacing
    }

    /// Vertical coordinate of a layer; the middle layer sits at y = 0.
    pub fn layer_y(&self, layer: u8) -> f32 {
        let centre = (LAYER_COUNT as f32 - 1.0) * 0.5;
        (layer as f32 - centre) * self.layer_spacing
    }

    /// World position of a note slot that still has `distance` to travel.
    pub fn slot_position(&self, lane: u8, layer: u8, distance: f32) -> Vec3 {
        Vec3::new(self.lane_x(lane), self.layer_y(layer), -distance)
    }

    /// Time a note needs to cross from the spawn plane to the player plane.
    pub fn spawn_lead_time(&self, note_speed: f32) -> f32 {
        self.spawn_distance / note_speed
    }

    /// Whether `distance` lies inside the asymmetric hit band, whose depth
    /// scales with the equipped item's hit-window perk.
    pub fn in_hit_window(&self, distance: f32, hit_window_perk: f32) -> bool {
        distance <= self.approach_depth * hit_window_perk
            && distance >= -self.departure_depth * hit_window_perk
    }

    pub fn past_miss_plane(&self, distance: f32) -> bool {
        distance < -self.miss_plane
    }

    pub fn reach_radius(&self, hit_window_perk: f32) -> f32 {
        self.base_radius * hit_window_perk
    }
}
