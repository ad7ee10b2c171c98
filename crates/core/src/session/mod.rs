//! One play-through: the per-tick orchestration of the tracker, the hit
//! detector and the score keeper.
//!
//! Each call to [`Session::tick`] runs, in order:
//!
//! 1. spawn and miss bookkeeping for the new song time,
//! 2. hit detection against the hand snapshot for that tick,
//! 3. scoring of every resolution,
//! 4. terminal checks (failure first, then victory).
//!
//! Misses are resolved before any hit test, so a note that crossed the miss
//! plane can never be cut in the same tick. Observers read what happened
//! through [`Session::drain_events`].

use serde::{Deserialize, Serialize};

use crate::{
    Award, Chart, Difficulty, DifficultyConfig, GameConfig, Hand, HandsSnapshot, HitDetector,
    ItemPerks, NoteId, NoteTracker, NoteView, Progression, ScoreKeeper, ScoreStats, SongClock,
    Tier,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOutcome {
    Victory,
    Failure,
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Running,
    Ended(SessionOutcome),
}

/// Notification for the presentation layer, queued during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    NoteHit {
        id: NoteId,
        tier: Tier,
        hand: Hand,
        points: u64,
        coins: u64,
    },
    NoteMissed {
        id: NoteId,
    },
    ComboBroken {
        previous: u32,
    },
    LevelUp {
        level: u32,
    },
    SessionEnded {
        outcome: SessionOutcome,
    },
}

/// Player-side inputs chosen before the session starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionInit {
    pub perks: ItemPerks,
    pub starting_xp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_accuracy(accuracy: f32, outcome: Option<SessionOutcome>) -> Grade {
        if outcome == Some(SessionOutcome::Failure) {
            return Grade::F;
        }
        match accuracy {
            a if a >= 0.95 => Grade::S,
            a if a >= 0.85 => Grade::A,
            a if a >= 0.70 => Grade::B,
            a if a >= 0.50 => Grade::C,
            _ => Grade::D,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub difficulty: Difficulty,
    /// `None` while the session is still running.
    pub outcome: Option<SessionOutcome>,
    pub score: u64,
    pub coins: u64,
    pub xp: u64,
    pub level: u32,
    pub max_combo: u32,
    pub accuracy: f32,
    pub grade: Grade,
    pub notes: usize,
    pub stats: ScoreStats,
}

#[derive(Debug, Clone)]
pub struct Session {
    config: GameConfig,
    difficulty: Difficulty,
    difficulty_config: DifficultyConfig,
    init: SessionInit,
    duration: f32,
    clock: SongClock,
    tracker: NoteTracker,
    detector: HitDetector,
    scorer: ScoreKeeper,
    progression: Progression,
    status: SessionStatus,
    failure_pending: bool,
    events: Vec<GameEvent>,
}

impl Session {
    /// Starts a session at song time zero with full health.
    pub fn start(config: &GameConfig, chart: Chart, init: SessionInit) -> Self {
        let difficulty = chart.difficulty;
        let difficulty_config = config.difficulties.get(difficulty);
        let mut notes = chart.notes;
        if notes.windows(2).any(|pair| pair[0].time > pair[1].time) {
            tracing::warn!("chart was not time ordered; sorting");
            notes.sort_by(|a, b| a.time.total_cmp(&b.time));
        }
        let note_count = notes.len();

        tracing::info!(
            %difficulty,
            notes = note_count,
            duration = chart.duration,
            "session started"
        );

        Self {
            config: config.clone(),
            difficulty,
            difficulty_config,
            init,
            duration: chart.duration,
            clock: SongClock::default(),
            tracker: NoteTracker::new(notes, difficulty_config.note_speed, config.field),
            detector: HitDetector::new(config.field, config.thresholds, init.perks),
            scorer: ScoreKeeper::new(config.tiers.clone(), difficulty_config, init.perks),
            progression: Progression::new(init.starting_xp, &config.progression),
            status: SessionStatus::Running,
            failure_pending: false,
            events: Vec::new(),
        }
    }

    /// Replaces all per-session state with a fresh play-through of `chart`.
    /// Undrained events of the previous session are discarded.
    pub fn restart(&mut self, chart: Chart) {
        let init = SessionInit {
            starting_xp: self.progression.xp(),
            ..self.init
        };
        *self = Session::start(&self.config, chart, init);
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn difficulty_config(&self) -> &DifficultyConfig {
        &self.difficulty_config
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn song_time(&self) -> f32 {
        self.clock.time()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn health(&self) -> f32 {
        self.scorer.health()
    }

    pub fn combo(&self) -> u32 {
        self.scorer.combo()
    }

    pub fn multiplier(&self) -> u32 {
        self.scorer.multiplier()
    }

    pub fn score(&self) -> u64 {
        self.scorer.score()
    }

    pub fn coins(&self) -> u64 {
        self.scorer.coins()
    }

    pub fn xp(&self) -> u64 {
        self.progression.xp()
    }

    pub fn level(&self) -> u32 {
        self.progression.level()
    }

    pub fn tracker(&self) -> &NoteTracker {
        &self.tracker
    }

    /// Active notes and recently resolved notes with their current position.
    pub fn visible_notes(&self) -> Vec<NoteView> {
        self.tracker.visible(self.clock.time())
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Advances the playhead by `delta` seconds and runs a tick.
    pub fn advance(&mut self, delta: f32, hands: &HandsSnapshot) {
        let mut clock = self.clock;
        clock.advance(delta);
        self.tick(clock.time(), hands);
    }

    /// Runs one simulation step at `song_time`. Does nothing once the
    /// session has ended.
    pub fn tick(&mut self, song_time: f32, hands: &HandsSnapshot) {
        if !self.is_running() {
            return;
        }
        self.clock.seek(song_time);
        let now = self.clock.time();

        // Expired notes are only resolved while the session can still score
        // them, so every note marked missed has a matching event.
        for id in self.tracker.advance(now) {
            if self.failure_pending {
                break;
            }
            if !self.tracker.resolve_miss(id, now) {
                continue;
            }
            tracing::debug!(id, time = now, "note missed");
            self.events.push(GameEvent::NoteMissed { id });
            let award = self.scorer.apply_miss();
            self.absorb(award);
        }

        if !self.failure_pending {
            let hits = self.detector.detect(&self.tracker, now, hands);
            for hit in hits {
                if self.failure_pending {
                    break;
                }
                if !self.tracker.resolve_hit(hit.id, hit.tier, hit.hand, now) {
                    continue;
                }
                let award = self.scorer.apply_hit(hit.tier);
                tracing::debug!(
                    id = hit.id,
                    tier = hit.tier.label(),
                    points = award.points,
                    "note hit"
                );
                self.events.push(GameEvent::NoteHit {
                    id: hit.id,
                    tier: hit.tier,
                    hand: hit.hand,
                    points: award.points,
                    coins: award.coins,
                });
                self.absorb(award);
            }
        }

        // Failure is decided when health empties but carried out here, after
        // the updates that emptied it have finished.
        if self.failure_pending {
            self.finish(SessionOutcome::Failure);
        } else if now >= self.duration && self.tracker.all_resolved() {
            let bonus = Progression::victory_bonus(self.scorer.score(), &self.config.progression);
            self.grant_xp(bonus);
            self.finish(SessionOutcome::Victory);
        }
    }

    /// Ends the session without a result. Later ticks are ignored.
    pub fn abandon(&mut self) {
        if self.is_running() {
            self.finish(SessionOutcome::Abandoned);
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let outcome = match self.status {
            SessionStatus::Running => None,
            SessionStatus::Ended(outcome) => Some(outcome),
        };
        let stats = self.scorer.stats().clone();
        let accuracy = stats.accuracy();
        SessionSummary {
            difficulty: self.difficulty,
            outcome,
            score: self.scorer.score(),
            coins: self.scorer.coins(),
            xp: self.progression.xp(),
            level: self.progression.level(),
            max_combo: stats.max_combo,
            accuracy,
            grade: Grade::from_accuracy(accuracy, outcome),
            notes: self.tracker.notes().len(),
            stats,
        }
    }

    fn absorb(&mut self, award: Award) {
        if let Some(previous) = award.combo_broken {
            self.events.push(GameEvent::ComboBroken { previous });
        }
        if award.xp > 0 {
            self.grant_xp(award.xp);
        }
        if award.depleted {
            self.failure_pending = true;
        }
    }

    fn grant_xp(&mut self, amount: u64) {
        for level in self.progression.grant(amount) {
            tracing::info!(level, "level up");
            self.events.push(GameEvent::LevelUp { level });
        }
    }

    fn finish(&mut self, outcome: SessionOutcome) {
        self.status = SessionStatus::Ended(outcome);
        self.failure_pending = false;
        self.events.push(GameEvent::SessionEnded { outcome });
        tracing::info!(
            ?outcome,
            score = self.scorer.score(),
            coins = self.scorer.coins(),
            time = self.clock.time(),
            "session ended"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{geometry::Vec3, CutDirection, HandState, Note};

    fn chart(notes: Vec<Note>, duration: f32) -> Chart {
        Chart::from_notes(Difficulty::Normal, 120.0, duration, notes)
    }

    #[test]
    fn empty_chart_runs_to_victory() {
        let mut session = Session::start(
            &GameConfig::default(),
            chart(Vec::new(), 3.0),
            SessionInit::default(),
        );
        let hands = HandsSnapshot::default();
        session.tick(1.0, &hands);
        assert!(session.is_running());
        session.tick(3.0, &hands);
        assert_eq!(session.status(), SessionStatus::Ended(SessionOutcome::Victory));
        assert_eq!(session.score(), 0);
        assert_eq!(session.xp(), 250);
    }

    #[test]
    fn abandoned_sessions_ignore_further_ticks() {
        let notes = vec![Note::new(0, 3.0, 0, 0, Hand::Left, CutDirection::Down)];
        let mut session = Session::start(
            &GameConfig::default(),
            chart(notes, 5.0),
            SessionInit::default(),
        );
        session.tick(1.5, &HandsSnapshot::default());
        session.abandon();
        session.abandon();
        session.tick(4.0, &HandsSnapshot::default());

        let events = session.drain_events();
        assert_eq!(
            events,
            vec![GameEvent::SessionEnded {
                outcome: SessionOutcome::Abandoned
            }]
        );
        assert_eq!(session.song_time(), 1.5);
        assert_eq!(session.health(), 100.0);
    }

    #[test]
    fn restart_clears_previous_notes() {
        let config = GameConfig::default();
        let notes = vec![Note::new(0, 2.5, 0, 0, Hand::Left, CutDirection::Down)];
        let mut session =
            Session::start(&config, chart(notes.clone(), 4.0), SessionInit::default());
        session.tick(3.0, &HandsSnapshot::default());
        assert!(session.tracker().notes()[0].is_missed());

        session.restart(chart(notes, 4.0));
        assert_eq!(session.song_time(), 0.0);
        assert_eq!(session.health(), 100.0);
        assert!(session.drain_events().is_empty());
        assert_eq!(session.tracker().notes()[0].state(), crate::NoteState::Pending);
    }

    #[test]
    fn visible_notes_report_world_positions() {
        let config = GameConfig::default();
        let notes = vec![Note::new(0, 2.0, 3, 2, Hand::Right, CutDirection::Up)];
        let mut session = Session::start(&config, chart(notes, 4.0), SessionInit::default());
        let right = HandState::at(Vec3::new(-5.0, 0.0, 0.0), Vec3::ZERO);
        session.tick(1.5, &HandsSnapshot { left: HandState::lost(), right });

        let views = session.visible_notes();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].position.x, config.field.lane_x(3));
        assert!(views[0].position.z < 0.0);
    }

    #[test]
    fn grades_follow_accuracy() {
        assert_eq!(Grade::from_accuracy(0.99, Some(SessionOutcome::Victory)), Grade::S);
        assert_eq!(Grade::from_accuracy(0.6, None), Grade::C);
        assert_eq!(Grade::from_accuracy(1.0, Some(SessionOutcome::Failure)), Grade::F);
    }
}
