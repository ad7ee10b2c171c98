//! Song clock and the note lifecycle tracker.
//!
//! Every spawn, miss and visibility decision is recomputed from the current
//! song time, so a clock that jumps backwards corrects itself on the next
//! tick instead of leaving stale state behind.

use serde::{Deserialize, Serialize};

use crate::{
    geometry::{travel_distance, Vec3},
    CutDirection, FieldGeometry, Hand, Note, NoteId, NoteState, Tier,
};

/// Song-relative playhead in seconds.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SongClock {
    time_seconds: f32,
}

impl SongClock {
    pub fn time(&self) -> f32 {
        self.time_seconds
    }

    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    pub fn advance(&mut self, delta: f32) {
        self.time_seconds = (self.time_seconds + delta).max(0.0);
    }

    /// Moves the playhead; returns `true` when it moved backwards.
    pub fn seek(&mut self, time_seconds: f32) -> bool {
        let rewound = time_seconds < self.time_seconds;
        self.time_seconds = time_seconds.max(0.0);
        rewound
    }
}

/// What the presentation layer needs to draw one note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteView {
    pub id: NoteId,
    pub lane: u8,
    pub layer: u8,
    pub position: Vec3,
    pub state: NoteState,
    pub required_hand: Hand,
    pub cut_direction: CutDirection,
    pub is_gold_star: bool,
}

/// Owns the notes of a session and moves them from pending to active to
/// resolved.
#[derive(Debug, Clone)]
pub struct NoteTracker {
    notes: Vec<Note>,
    /// Indices of spawned, unresolved notes in time order.
    active: Vec<usize>,
    /// Indices of resolved notes still inside the decay window.
    recent: Vec<usize>,
    /// Lowest index that may still be pending.
    next_pending: usize,
    note_speed: f32,
    field: FieldGeometry,
    last_time: f32,
}

impl NoteTracker {
    /// `notes` must be sorted by time.
    pub fn new(notes: Vec<Note>, note_speed: f32, field: FieldGeometry) -> Self {
        Self {
            notes,
            active: Vec::new(),
            recent: Vec::new(),
            next_pending: 0,
            note_speed,
            field,
            last_time: 0.0,
        }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note_speed(&self) -> f32 {
        self.note_speed
    }

    pub fn spawn_lead_time(&self) -> f32 {
        self.field.spawn_lead_time(self.note_speed)
    }

    /// Remaining travel distance of `note` at `song_time`.
    pub fn distance(&self, note: &Note, song_time: f32) -> f32 {
        travel_distance(note.time - song_time, self.note_speed)
    }

    pub fn position(&self, note: &Note, song_time: f32) -> Vec3 {
        self.field
            .slot_position(note.lane, note.layer, self.distance(note, song_time))
    }

    pub fn active_notes(&self) -> impl Iterator<Item = &Note> + '_ {
        self.active.iter().map(move |&index| &self.notes[index])
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn all_resolved(&self) -> bool {
        self.active.is_empty() && self.notes[self.next_pending..].iter().all(Note::is_resolved)
    }

    /// Spawns due notes and returns the ids of active notes that crossed
    /// the miss plane. They stay active until the caller resolves them with
    /// [`NoteTracker::resolve_miss`].
    pub fn advance(&mut self, song_time: f32) -> Vec<NoteId> {
        if song_time < self.last_time {
            self.rewind(song_time);
        }
        self.last_time = song_time;

        let lead = self.spawn_lead_time();
        while let Some(note) = self.notes.get_mut(self.next_pending) {
            if note.time - lead > song_time {
                break;
            }
            if note.activate() {
                self.active.push(self.next_pending);
            }
            self.next_pending += 1;
        }

        let decay = self.field.decay_seconds;
        let notes = &self.notes;
        self.recent.retain(|&index| {
            notes[index]
                .state()
                .resolved_at()
                .map(|at| song_time - at <= decay)
                .unwrap_or(false)
        });

        self.active_notes()
            .filter(|note| {
                self.field
                    .past_miss_plane(self.distance(note, song_time))
            })
            .map(|note| note.id)
            .collect()
    }

    /// Resolves an active note as hit and drops it from the working set.
    pub fn resolve_hit(&mut self, id: NoteId, tier: Tier, hand: Hand, song_time: f32) -> bool {
        self.resolve(id, |note| note.resolve_hit(tier, hand, song_time))
    }

    /// Resolves an active note as missed and drops it from the working set.
    pub fn resolve_miss(&mut self, id: NoteId, song_time: f32) -> bool {
        self.resolve(id, |note| note.resolve_miss(song_time))
    }

    fn resolve(&mut self, id: NoteId, transition: impl FnOnce(&mut Note) -> bool) -> bool {
        let Some(slot) = self
            .active
            .iter()
            .position(|&index| self.notes[index].id == id)
        else {
            return false;
        };

        let note_index = self.active[slot];
        if !transition(&mut self.notes[note_index]) {
            return false;
        }
        self.active.remove(slot);
        self.recent.push(note_index);
        true
    }

    /// Active notes plus notes resolved within the decay window.
    pub fn visible(&self, song_time: f32) -> Vec<NoteView> {
        let mut indices: Vec<usize> = self
            .active
            .iter()
            .chain(self.recent.iter())
            .copied()
            .collect();
        indices.sort_unstable();

        indices
            .into_iter()
            .map(|index| {
                let note = &self.notes[index];
                NoteView {
                    id: note.id,
                    lane: note.lane,
                    layer: note.layer,
                    position: self.position(note, song_time),
                    state: note.state(),
                    required_hand: note.required_hand,
                    cut_direction: note.cut_direction,
                    is_gold_star: note.is_gold_star,
                }
            })
            .collect()
    }

    /// Returns notes that have not spawned yet at `song_time` to pending.
    /// Resolved notes stay resolved.
    fn rewind(&mut self, song_time: f32) {
        tracing::warn!(
            from = self.last_time,
            to = song_time,
            "song clock moved backwards"
        );
        let lead = self.spawn_lead_time();
        let notes = &mut self.notes;
        let mut lowest = self.next_pending;
        self.active.retain(|&index| {
            let note = &mut notes[index];
            if note.time - lead > song_time && note.deactivate() {
                lowest = lowest.min(index);
                false
            } else {
                true
            }
        });
        self.next_pending = lowest;
        self.recent.retain(|&index| {
            notes[index]
                .state()
                .resolved_at()
                .map_or(false, |at| at <= song_time)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: NoteId, time: f32) -> Note {
        Note::new(id, time, 1, 1, Hand::Left, CutDirection::Down)
    }

    fn tracker(times: &[f32]) -> NoteTracker {
        let notes = times
            .iter()
            .enumerate()
            .map(|(id, &time)| note(id as NoteId, time))
            .collect();
        // speed 10, spawn distance 20 => notes spawn two seconds early
        NoteTracker::new(notes, 10.0, FieldGeometry::default())
    }

    #[test]
    fn clock_never_goes_negative() {
        let mut clock = SongClock::default();
        clock.advance(-1.0);
        assert_eq!(clock.time(), 0.0);
        clock.advance(2.5);
        assert!(clock.seek(1.0));
        assert!(!clock.seek(3.0));
        clock.reset();
        assert_eq!(clock.time(), 0.0);
    }

    #[test]
    fn spawns_at_lead_time() {
        let mut tracker = tracker(&[3.0, 5.0]);
        tracker.advance(0.9);
        assert_eq!(tracker.active_len(), 0);
        tracker.advance(1.0);
        assert_eq!(tracker.active_len(), 1);
        tracker.advance(3.0);
        assert_eq!(tracker.active_len(), 2);
    }

    #[test]
    fn position_is_a_pure_function_of_time() {
        let tracker = tracker(&[4.0]);
        let note = &tracker.notes()[0];
        let a = tracker.position(note, 3.0);
        let b = tracker.position(note, 3.0);
        assert_eq!(a, b);
        assert!((a.z + 10.0).abs() < 1e-5);
        assert_eq!(tracker.position(note, 4.0).z, 0.0);
    }

    #[test]
    fn notes_past_the_miss_plane_are_missed_once() {
        let mut tracker = tracker(&[2.0]);
        tracker.advance(1.0);
        assert!(tracker.advance(2.05).is_empty());
        let expired = tracker.advance(2.1);
        assert_eq!(expired, vec![0]);
        assert!(!tracker.notes()[0].is_resolved(), "expiry alone does not resolve");

        assert!(tracker.resolve_miss(0, 2.1));
        assert!(!tracker.resolve_miss(0, 2.1));
        assert!(tracker.notes()[0].is_missed());
        assert!(tracker.advance(2.2).is_empty());
        assert!(tracker.all_resolved());
    }

    #[test]
    fn hit_notes_cannot_be_missed() {
        let mut tracker = tracker(&[2.0]);
        tracker.advance(1.9);
        assert!(tracker.resolve_hit(0, Tier::Good, Hand::Left, 1.9));
        assert!(tracker.advance(2.5).is_empty());
        assert!(!tracker.resolve_miss(0, 2.5));
        assert!(tracker.notes()[0].is_hit());
    }

    #[test]
    fn resolved_notes_decay_out_of_view() {
        let mut tracker = tracker(&[2.0]);
        tracker.advance(1.9);
        assert!(tracker.resolve_hit(0, Tier::Great, Hand::Left, 1.9));
        assert!(!tracker.resolve_hit(0, Tier::Great, Hand::Left, 1.9));
        assert_eq!(tracker.visible(2.0).len(), 1);
        tracker.advance(2.5);
        assert!(tracker.visible(2.5).is_empty());
    }

    #[test]
    fn rewinding_returns_unspawned_notes_to_pending() {
        let mut tracker = tracker(&[3.0, 3.5]);
        tracker.advance(2.0);
        assert!(tracker.resolve_hit(0, Tier::Ok, Hand::Left, 2.0));
        assert_eq!(tracker.active_len(), 1);

        tracker.advance(0.5);
        assert_eq!(tracker.active_len(), 0);
        assert_eq!(tracker.notes()[1].state(), NoteState::Pending);
        assert!(tracker.notes()[0].is_hit(), "no retries after a rewind");

        tracker.advance(2.0);
        assert_eq!(tracker.active_len(), 1);
    }
}
