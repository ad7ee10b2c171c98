//! Note data model and the chart generator.
//!
//! Charts are generated from a difficulty profile and an injected random
//! number generator. Generation is not deterministic across seeds, but the
//! emitted notes are always sorted by target time.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    geometry::{Vec3, LANE_COUNT, LAYER_COUNT},
    ChartProfile, ChartSettings, Difficulty, Tier,
};

pub type NoteId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub fn other(self) -> Hand {
        match self {
            Hand::Left => Hand::Right,
            Hand::Right => Hand::Left,
        }
    }

    /// The hand that naturally covers a lane.
    fn for_lane(lane: u8) -> Hand {
        if lane < LANE_COUNT / 2 {
            Hand::Left
        } else {
            Hand::Right
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CutDirection {
    Up,
    Down,
    Left,
    Right,
    Any,
}

impl CutDirection {
    /// Unit swing vector in the lane/layer plane; `None` for [`CutDirection::Any`].
    pub fn unit_vector(self) -> Option<Vec3> {
        match self {
            CutDirection::Up => Some(Vec3::new(0.0, 1.0, 0.0)),
            CutDirection::Down => Some(Vec3::new(0.0, -1.0, 0.0)),
            CutDirection::Left => Some(Vec3::new(-1.0, 0.0, 0.0)),
            CutDirection::Right => Some(Vec3::new(1.0, 0.0, 0.0)),
            CutDirection::Any => None,
        }
    }
}

/// Lifecycle of a note. Resolution is terminal: once a note is `Hit` or
/// `Missed` no transition method changes it again.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NoteState {
    Pending,
    Active,
    Hit { tier: Tier, hand: Hand, time: f32 },
    Missed { time: f32 },
}

impl NoteState {
    pub fn is_resolved(&self) -> bool {
        matches!(self, NoteState::Hit { .. } | NoteState::Missed { .. })
    }

    /// Song time at which the note was resolved.
    pub fn resolved_at(&self) -> Option<f32> {
        match *self {
            NoteState::Hit { time, .. } | NoteState::Missed { time } => Some(time),
            NoteState::Pending | NoteState::Active => None,
        }
    }
}

/// A single scorable target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Song time at which the note reaches the player plane.
    pub time: f32,
    pub lane: u8,
    pub layer: u8,
    pub required_hand: Hand,
    pub cut_direction: CutDirection,
    pub is_gold_star: bool,
    state: NoteState,
}

impl Note {
    pub fn new(
        id: NoteId,
        time: f32,
        lane: u8,
        layer: u8,
        required_hand: Hand,
        cut_direction: CutDirection,
    ) -> Self {
        Self {
            id,
            time,
            lane: lane.min(LANE_COUNT - 1),
            layer: layer.min(LAYER_COUNT - 1),
            required_hand,
            cut_direction,
            is_gold_star: false,
            state: NoteState::Pending,
        }
    }

    pub fn gold_star(id: NoteId, time: f32, lane: u8, layer: u8) -> Self {
        Self {
            is_gold_star: true,
            ..Self::new(id, time, lane, layer, Hand::Right, CutDirection::Any)
        }
    }

    pub fn state(&self) -> NoteState {
        self.state
    }

    pub fn is_hit(&self) -> bool {
        matches!(self.state, NoteState::Hit { .. })
    }

    pub fn is_missed(&self) -> bool {
        matches!(self.state, NoteState::Missed { .. })
    }

    pub fn is_resolved(&self) -> bool {
        self.state.is_resolved()
    }

    /// Set iff the note was hit.
    pub fn hit_time(&self) -> Option<f32> {
        match self.state {
            NoteState::Hit { time, .. } => Some(time),
            _ => None,
        }
    }

    pub(crate) fn activate(&mut self) -> bool {
        if self.state == NoteState::Pending {
            self.state = NoteState::Active;
            true
        } else {
            false
        }
    }

    /// Returns an active note to pending after the clock jumped backwards.
    pub(crate) fn deactivate(&mut self) -> bool {
        if self.state == NoteState::Active {
            self.state = NoteState::Pending;
            true
        } else {
            false
        }
    }

    pub(crate) fn resolve_hit(&mut self, tier: Tier, hand: Hand, time: f32) -> bool {
        if self.state == NoteState::Active {
            self.state = NoteState::Hit { tier, hand, time };
            true
        } else {
            false
        }
    }

    pub(crate) fn resolve_miss(&mut self, time: f32) -> bool {
        if self.state == NoteState::Active {
            self.state = NoteState::Missed { time };
            true
        } else {
            false
        }
    }
}

/// Time-ordered note sequence for one play-through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub difficulty: Difficulty,
    pub bpm: f32,
    /// Song length in seconds, including the lead-in and outro.
    pub duration: f32,
    pub notes: Vec<Note>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartStats {
    pub notes: usize,
    /// Number of instants carrying more than one note.
    pub doubles: usize,
    pub gold_stars: usize,
    /// Notes placed between beats.
    pub off_beat: usize,
}

impl Chart {
    /// Builds a chart from arbitrary notes, sorting them and renumbering ids
    /// in time order.
    pub fn from_notes(
        difficulty: Difficulty,
        bpm: f32,
        duration: f32,
        mut notes: Vec<Note>,
    ) -> Self {
        notes.sort_by(|a, b| a.time.total_cmp(&b.time));
        for (index, note) in notes.iter_mut().enumerate() {
            note.id = index as NoteId;
        }
        Self {
            difficulty,
            bpm,
            duration,
            notes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn is_time_ordered(&self) -> bool {
        self.notes.windows(2).all(|pair| pair[0].time <= pair[1].time)
    }

    pub fn stats(&self) -> ChartStats {
        let period = 60.0 / self.bpm;
        let mut stats = ChartStats {
            notes: self.notes.len(),
            ..ChartStats::default()
        };

        for (index, note) in self.notes.iter().enumerate() {
            if note.is_gold_star {
                stats.gold_stars += 1;
            }
            let beats = note.time / period;
            if (beats - beats.round()).abs() > 1e-3 {
                stats.off_beat += 1;
            }
            let starts_group = index == 0 || self.notes[index - 1].time != note.time;
            let has_partner = self
                .notes
                .get(index + 1)
                .map(|next| next.time == note.time)
                .unwrap_or(false);
            if starts_group && has_partner {
                stats.doubles += 1;
            }
        }
        stats
    }
}

/// Pattern family used for a stretch of beats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Alternating,
    Sweep,
    Scatter,
}

impl Phase {
    fn for_beat(beat: u32, phase_length: u32) -> Phase {
        match (beat / phase_length) % 3 {
            0 => Phase::Alternating,
            1 => Phase::Sweep,
            _ => Phase::Scatter,
        }
    }
}

/// Draft note without an id; ids are assigned after sorting.
struct Draft {
    time: f32,
    lane: u8,
    layer: u8,
    hand: Hand,
    direction: CutDirection,
    gold_star: bool,
}

struct PatternState {
    next_hand: Hand,
    downswing: bool,
    sweep_lane: u8,
    sweep_rising: bool,
}

impl Default for PatternState {
    fn default() -> Self {
        Self {
            next_hand: Hand::Left,
            downswing: true,
            sweep_lane: 0,
            sweep_rising: true,
        }
    }
}

/// Generates charts for a difficulty.
pub struct ChartGenerator<'a> {
    settings: &'a ChartSettings,
}

impl<'a> ChartGenerator<'a> {
    pub fn new(settings: &'a ChartSettings) -> Self {
        Self { settings }
    }

    pub fn generate<R: Rng + ?Sized>(&self, difficulty: Difficulty, rng: &mut R) -> Chart {
        let settings = self.settings;
        let profile = settings.profiles.get(difficulty);
        let period = settings.beat_period();
        let mut emitter = Emitter {
            drafts: Vec::new(),
            emitted: 0,
            gold_star_every: settings.gold_star_every.max(1),
            pattern: PatternState::default(),
        };

        for beat in 0..settings.beats {
            let time = (settings.lead_in_beats + beat) as f32 * period;
            let phase = Phase::for_beat(beat, settings.phase_length_beats.max(1));

            if chance(rng, profile.skip_probability) {
                continue;
            }

            // Bursts are emitted ahead of the beat they follow; the final
            // sort puts them back in time order.
            if has_bursts(&profile) && chance(rng, profile.burst_probability) {
                let offsets: &[f32] = if rng.gen_bool(0.5) {
                    &[0.5]
                } else {
                    &[0.25, 0.5, 0.75]
                };
                for offset in offsets {
                    emitter.single(time + period * offset, phase, rng);
                }
            }

            if chance(rng, profile.double_probability) {
                emitter.double(time, rng);
            } else {
                emitter.single(time, phase, rng);
            }
        }

        let duration =
            (settings.lead_in_beats + settings.beats) as f32 * period + settings.outro_seconds;
        let notes = emitter
            .drafts
            .into_iter()
            .map(|draft| {
                if draft.gold_star {
                    Note::gold_star(0, draft.time, draft.lane, draft.layer)
                } else {
                    Note::new(0, draft.time, draft.lane, draft.layer, draft.hand, draft.direction)
                }
            })
            .collect();

        let chart = Chart::from_notes(difficulty, settings.bpm, duration, notes);
        tracing::debug!(%difficulty, notes = chart.notes.len(), "generated chart");
        chart
    }
}

fn has_bursts(profile: &ChartProfile) -> bool {
    profile.burst_probability > 0.0
}

fn chance<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    rng.gen_bool(probability.clamp(0.0, 1.0))
}

struct Emitter {
    drafts: Vec<Draft>,
    emitted: u32,
    gold_star_every: u32,
    pattern: PatternState,
}

impl Emitter {
    /// Counts the slot and reports whether it is reserved for a gold star.
    fn claim_slot(&mut self) -> bool {
        self.emitted += 1;
        self.emitted % self.gold_star_every == 0
    }

    fn push_gold_star(&mut self, time: f32, lane: u8, layer: u8) {
        self.drafts.push(Draft {
            time,
            lane,
            layer,
            hand: Hand::Right,
            direction: CutDirection::Any,
            gold_star: true,
        });
    }

    fn single<R: Rng + ?Sized>(&mut self, time: f32, phase: Phase, rng: &mut R) {
        if self.claim_slot() {
            let lane = rng.gen_range(1..LANE_COUNT - 1);
            self.push_gold_star(time, lane, LAYER_COUNT / 2);
            return;
        }

        let half = LANE_COUNT / 2;
        let pattern = &mut self.pattern;
        let (lane, layer, hand, direction) = match phase {
            Phase::Alternating => {
                let hand = pattern.next_hand;
                pattern.next_hand = hand.other();
                let lane = match hand {
                    Hand::Left => rng.gen_range(0..half),
                    Hand::Right => rng.gen_range(half..LANE_COUNT),
                };
                let direction = if pattern.downswing {
                    CutDirection::Down
                } else {
                    CutDirection::Up
                };
                if hand == Hand::Right {
                    pattern.downswing = !pattern.downswing;
                }
                (lane, rng.gen_range(0..LAYER_COUNT), hand, direction)
            }
            Phase::Sweep => {
                let lane = pattern.sweep_lane;
                let direction = if pattern.sweep_rising {
                    CutDirection::Right
                } else {
                    CutDirection::Left
                };
                if pattern.sweep_rising && lane + 1 >= LANE_COUNT {
                    pattern.sweep_rising = false;
                } else if !pattern.sweep_rising && lane == 0 {
                    pattern.sweep_rising = true;
                }
                pattern.sweep_lane = if pattern.sweep_rising {
                    (lane + 1).min(LANE_COUNT - 1)
                } else {
                    lane.saturating_sub(1)
                };
                (lane, LAYER_COUNT / 2, Hand::for_lane(lane), direction)
            }
            Phase::Scatter => {
                let lane = rng.gen_range(0..LANE_COUNT);
                let natural = Hand::for_lane(lane);
                let hand = if rng.gen_bool(0.2) {
                    natural.other()
                } else {
                    natural
                };
                let direction = match rng.gen_range(0..20u8) {
                    0..=2 => CutDirection::Any,
                    3..=6 => CutDirection::Up,
                    7..=12 => CutDirection::Down,
                    13..=16 => CutDirection::Left,
                    _ => CutDirection::Right,
                };
                (lane, rng.gen_range(0..LAYER_COUNT), hand, direction)
            }
        };

        self.drafts.push(Draft {
            time,
            lane,
            layer,
            hand,
            direction,
            gold_star: false,
        });
    }

    /// Two simultaneous notes, one per hand, mirrored around the centre.
    fn double<R: Rng + ?Sized>(&mut self, time: f32, rng: &mut R) {
        let layer = rng.gen_range(0..LAYER_COUNT);
        let direction = if rng.gen_bool(0.5) {
            CutDirection::Down
        } else {
            CutDirection::Up
        };
        let left_lane = rng.gen_range(0..LANE_COUNT / 2);

        for (hand, lane) in [(Hand::Left, left_lane), (Hand::Right, LANE_COUNT - 1 - left_lane)] {
            // A gold star keeps its partner's mirrored slot.
            if self.claim_slot() {
                self.push_gold_star(time, lane, layer);
                continue;
            }
            self.drafts.push(Draft {
                time,
                lane,
                layer,
                hand,
                direction,
                gold_star: false,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn generate(difficulty: Difficulty, seed: u64) -> Chart {
        let settings = ChartSettings::default();
        let mut rng = StdRng::seed_from_u64(seed);
        ChartGenerator::new(&settings).generate(difficulty, &mut rng)
    }

    #[test]
    fn expert_bursts_are_sorted_into_place() {
        let chart = generate(Difficulty::Expert, 7);
        assert!(chart.is_time_ordered());
        assert!(chart.stats().off_beat > 0);
        for (index, note) in chart.notes.iter().enumerate() {
            assert_eq!(note.id as usize, index);
        }
    }

    #[test]
    fn only_expert_subdivides_beats() {
        for difficulty in [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard] {
            let chart = generate(difficulty, 3);
            assert_eq!(chart.stats().off_beat, 0, "{difficulty}");
        }
    }

    #[test]
    fn easy_is_sparser_than_expert() {
        let easy = generate(Difficulty::Easy, 11);
        let expert = generate(Difficulty::Expert, 11);
        assert!(easy.notes.len() < expert.notes.len());
    }

    #[test]
    fn every_fiftieth_note_is_a_gold_star() {
        let mut settings = ChartSettings::default();
        settings.profiles.normal = ChartProfile {
            skip_probability: 0.0,
            double_probability: 0.0,
            burst_probability: 0.0,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let chart = ChartGenerator::new(&settings).generate(Difficulty::Normal, &mut rng);

        assert_eq!(chart.notes.len(), settings.beats as usize);
        let stars: Vec<usize> = chart
            .notes
            .iter()
            .enumerate()
            .filter(|(_, note)| note.is_gold_star)
            .map(|(index, _)| index)
            .collect();
        assert_eq!(stars, vec![49]);
        let star = &chart.notes[49];
        assert_eq!(star.cut_direction, CutDirection::Any);
    }

    fn assert_no_stacked_notes(chart: &Chart) {
        let mut slots = std::collections::HashSet::new();
        for note in &chart.notes {
            assert!(
                slots.insert((note.time.to_bits(), note.lane, note.layer)),
                "two notes share a slot at {}: lane {} layer {}",
                note.time,
                note.lane,
                note.layer
            );
        }
    }

    #[test]
    fn gold_stars_in_doubles_keep_their_own_slot() {
        let mut settings = ChartSettings::default();
        settings.profiles.hard = ChartProfile {
            skip_probability: 0.0,
            double_probability: 1.0,
            burst_probability: 0.0,
        };
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let chart = ChartGenerator::new(&settings).generate(Difficulty::Hard, &mut rng);
            assert!(chart.stats().gold_stars > 0);
            assert_no_stacked_notes(&chart);
        }
    }

    #[test]
    fn expert_charts_never_stack_notes() {
        for seed in 0..200 {
            assert_no_stacked_notes(&generate(Difficulty::Expert, seed));
        }
    }

    #[test]
    fn zero_beats_yields_an_empty_chart() {
        let settings = ChartSettings {
            beats: 0,
            ..ChartSettings::default()
        };
        let mut rng = StdRng::seed_from_u64(0);
        let chart = ChartGenerator::new(&settings).generate(Difficulty::Hard, &mut rng);
        assert!(chart.is_empty());
        assert!(chart.duration > 0.0);
    }

    #[test]
    fn resolution_is_a_single_transition() {
        let mut note = Note::new(0, 1.0, 0, 0, Hand::Left, CutDirection::Down);
        assert!(!note.resolve_miss(1.0), "pending notes cannot resolve");
        assert!(note.activate());
        assert!(note.resolve_hit(Tier::Good, Hand::Left, 0.9));
        assert!(!note.resolve_miss(1.2));
        assert!(!note.deactivate());
        assert!(note.is_hit() && !note.is_missed());
        assert_eq!(note.hit_time(), Some(0.9));
    }
}
