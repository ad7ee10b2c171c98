//! Stand-in for the camera tracker: an autoplay player running on its own
//! thread and publishing hand snapshots at the detector's cadence.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use rand::Rng;
use saber_beat_core::{
    FieldGeometry, Hand, HandState, HandsSnapshot, Note, Result, SharedHands, Vec3,
};

const SWING_SPEED: f32 = 7.0;
const MAX_JITTER: f32 = 0.45;

/// Song time derived from wall-clock time, shared by value between threads.
#[derive(Debug, Clone, Copy)]
pub struct SimClock {
    start: Instant,
    time_scale: f32,
}

impl SimClock {
    pub fn start(time_scale: f32) -> Self {
        Self {
            start: Instant::now(),
            time_scale: time_scale.max(0.01),
        }
    }

    pub fn song_time(&self) -> f32 {
        self.start.elapsed().as_secs_f32() * self.time_scale
    }

    /// Wall-clock sleep that corresponds to `song_seconds` of song time.
    pub fn wall(&self, song_seconds: f32) -> Duration {
        Duration::from_secs_f32(song_seconds / self.time_scale)
    }
}

/// One planned cut.
#[derive(Debug, Clone, Copy)]
struct Cue {
    time: f32,
    hand: Hand,
    target: Vec3,
    swing: Vec3,
}

/// Autoplay that knows the chart ahead of time and misses on purpose
/// according to its skill.
#[derive(Debug, Clone)]
pub struct AutoPlayer {
    cues: Vec<Cue>,
}

impl AutoPlayer {
    /// `skill` in `[0, 1]`: the chance of going for a note, and how far the
    /// hand lands from the note centre.
    pub fn new<R: Rng + ?Sized>(
        notes: &[Note],
        field: &FieldGeometry,
        skill: f32,
        rng: &mut R,
    ) -> Self {
        let skill = if skill.is_finite() {
            skill.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let jitter = (1.0 - skill) * MAX_JITTER;

        let mut cues = Vec::with_capacity(notes.len());
        for note in notes {
            if !rng.gen_bool(f64::from(skill)) {
                continue;
            }
            let hand = if note.is_gold_star {
                if field.lane_x(note.lane) < 0.0 {
                    Hand::Left
                } else {
                    Hand::Right
                }
            } else {
                note.required_hand
            };
            let offset = if jitter > 0.0 {
                Vec3::new(rng.gen_range(-jitter..jitter), rng.gen_range(-jitter..jitter), 0.0)
            } else {
                Vec3::ZERO
            };
            let direction = note
                .cut_direction
                .unit_vector()
                .unwrap_or(Vec3::new(0.0, -1.0, 0.0));
            cues.push(Cue {
                time: note.time,
                hand,
                target: note_target(field, note) + offset,
                swing: direction * SWING_SPEED,
            });
        }

        Self { cues }
    }

    /// Where both hands are at `song_time`: on the next cue each hand still
    /// has to play, or out of view.
    pub fn hands_at(&self, song_time: f32) -> HandsSnapshot {
        let mut hands = HandsSnapshot::default();
        for hand in [Hand::Left, Hand::Right] {
            if let Some(cue) = self
                .cues
                .iter()
                .find(|cue| cue.hand == hand && cue.time >= song_time)
            {
                *hands.hand_mut(hand) = HandState::at(cue.target, cue.swing);
            }
        }
        hands
    }
}

fn note_target(field: &FieldGeometry, note: &Note) -> Vec3 {
    field.slot_position(note.lane, note.layer, 0.0)
}

/// Runs `player` on a background thread, publishing into `shared` every
/// `period` seconds of song time until `stop` is raised.
pub fn spawn_detector(
    player: AutoPlayer,
    shared: SharedHands,
    clock: SimClock,
    period: f32,
    stop: Arc<AtomicBool>,
) -> JoinHandle<Result<()>> {
    thread::spawn(move || {
        tracing::debug!(period, "detector loop started");
        while !stop.load(Ordering::Relaxed) {
            shared.publish(player.hands_at(clock.song_time()))?;
            thread::sleep(clock.wall(period));
        }
        tracing::debug!("detector loop stopped");
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};
    use saber_beat_core::CutDirection;

    use super::*;

    #[test]
    fn perfect_player_parks_on_the_next_note() {
        let field = FieldGeometry::default();
        let notes = vec![
            Note::new(0, 1.0, 0, 0, Hand::Left, CutDirection::Up),
            Note::new(1, 2.0, 3, 2, Hand::Right, CutDirection::Left),
        ];
        let mut rng = StdRng::seed_from_u64(5);
        let player = AutoPlayer::new(&notes, &field, 1.0, &mut rng);

        let hands = player.hands_at(0.5);
        assert_eq!(hands.left.position, Some(field.slot_position(0, 0, 0.0)));
        assert_eq!(hands.right.position, Some(field.slot_position(3, 2, 0.0)));
        assert!(hands.right.velocity.x < 0.0);

        let later = player.hands_at(1.5);
        assert!(later.left.position.is_none());
    }

    #[test]
    fn hopeless_player_never_shows_up() {
        let field = FieldGeometry::default();
        let notes = vec![Note::new(0, 1.0, 0, 0, Hand::Left, CutDirection::Up)];
        let mut rng = StdRng::seed_from_u64(5);
        let player = AutoPlayer::new(&notes, &field, 0.0, &mut rng);
        assert_eq!(player.hands_at(0.0), HandsSnapshot::default());
    }

    #[test]
    fn non_finite_skill_plays_nothing() {
        let field = FieldGeometry::default();
        let notes = vec![Note::new(0, 1.0, 0, 0, Hand::Left, CutDirection::Up)];
        let mut rng = StdRng::seed_from_u64(5);
        let player = AutoPlayer::new(&notes, &field, f32::NAN, &mut rng);
        assert_eq!(player.hands_at(0.0), HandsSnapshot::default());
    }
}
