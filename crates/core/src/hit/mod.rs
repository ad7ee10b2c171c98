use serde::{Deserialize, Serialize};

use crate::{
    geometry::Vec3, scoring::classify_cut, FieldGeometry, Hand, HandState, HandsSnapshot,
    ItemPerks, Note, NoteId, NoteTracker, Tier, TierThresholds,
};

/// A note cut during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitResolution {
    pub id: NoteId,
    pub tier: Tier,
    pub hand: Hand,
}

/// Tests hand positions and swings against active notes.
#[derive(Debug, Clone)]
pub struct HitDetector {
    field: FieldGeometry,
    thresholds: TierThresholds,
    perks: ItemPerks,
}

impl HitDetector {
    pub fn new(field: FieldGeometry, thresholds: TierThresholds, perks: ItemPerks) -> Self {
        Self {
            field,
            thresholds,
            perks,
        }
    }

    pub fn reach_radius(&self) -> f32 {
        self.field.reach_radius(self.perks.hit_window)
    }

    /// Evaluates every active note of `tracker` against one hand snapshot.
    pub fn detect(
        &self,
        tracker: &NoteTracker,
        song_time: f32,
        hands: &HandsSnapshot,
    ) -> Vec<HitResolution> {
        tracker
            .active_notes()
            .filter_map(|note| {
                let distance = tracker.distance(note, song_time);
                let position = tracker.position(note, song_time);
                self.evaluate(note, distance, position, hands)
            })
            .collect()
    }

    /// Resolution for one note whose remaining travel distance is `distance`
    /// and whose world position is `position`, or `None` while it is still
    /// out of reach.
    pub fn evaluate(
        &self,
        note: &Note,
        distance: f32,
        position: Vec3,
        hands: &HandsSnapshot,
    ) -> Option<HitResolution> {
        if note.is_resolved() || !self.field.in_hit_window(distance, self.perks.hit_window) {
            return None;
        }

        if note.is_gold_star {
            let left = self.reach(&hands.left, position);
            let right = self.reach(&hands.right, position);
            let hand = match (left, right) {
                (Some(left), Some(right)) if left < right => Hand::Left,
                (_, Some(_)) => Hand::Right,
                (Some(_), None) => Hand::Left,
                (None, None) => return None,
            };
            return Some(HitResolution {
                id: note.id,
                tier: Tier::GoldStar,
                hand,
            });
        }

        let correct = note.required_hand;
        let wrong = correct.other();

        if let Some(gap) = self.reach(hands.hand(correct), position) {
            let tier = if self.perks.auto_perfect {
                Tier::Perfect
            } else {
                self.cut_quality(note, hands.hand(correct), gap)
            };
            return Some(HitResolution {
                id: note.id,
                tier,
                hand: correct,
            });
        }

        self.reach(hands.hand(wrong), position).map(|_| HitResolution {
            id: note.id,
            tier: Tier::WrongSaber,
            hand: wrong,
        })
    }

    /// Planar gap between the hand and the note, if within reach.
    fn reach(&self, hand: &HandState, position: Vec3) -> Option<f32> {
        let radius = self.reach_radius();
        hand.position
            .map(|at| at.planar_distance(position))
            .filter(|gap| *gap < radius)
    }

    fn cut_quality(&self, note: &Note, hand: &HandState, gap: f32) -> Tier {
        let precision = (1.0 - gap / self.reach_radius()).clamp(0.0, 1.0);
        let speed = hand.speed();
        let angle = note.cut_direction.unit_vector().map(|required| {
            hand.velocity
                .normalized()
                .map(|swing| swing.dot(required))
                .unwrap_or(0.0)
        });
        classify_cut(&self.thresholds, precision, speed, angle)
    }
}
