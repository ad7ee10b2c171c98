//! Gameplay simulation core for Saber Beat, a motion-controlled rhythm game.
//!
//! Notes fly towards the player and must be cut by two tracked hands. The
//! crate owns everything between the hand tracker and the renderer: chart
//! generation, the note lifecycle, hit detection, scoring and the session
//! state machine. Rendering, audio and the vision model are collaborators
//! that talk to the core through [`HandsSnapshot`], [`NoteView`] and
//! [`GameEvent`].

pub mod chart;
pub mod config;
pub mod error;
pub mod geometry;
pub mod hit;
pub mod progression;
pub mod scoring;
pub mod session;
pub mod timeline;
pub mod tracking;

pub use chart::{Chart, ChartGenerator, ChartStats, CutDirection, Hand, Note, NoteId, NoteState};
pub use config::{
    ChartProfile, ChartSettings, Difficulty, DifficultyConfig, FieldGeometry, GameConfig,
    ItemPerks, PerDifficulty, ProgressionSettings, TierBand, TierThresholds,
};
pub use error::{Result, SaberError};
pub use geometry::Vec3;
pub use hit::{HitDetector, HitResolution};
pub use progression::Progression;
pub use scoring::{Award, ScoreKeeper, ScoreStats, Tier, TierReward, TierTable};
pub use session::{
    GameEvent, Grade, Session, SessionInit, SessionOutcome, SessionStatus, SessionSummary,
};
pub use timeline::{NoteTracker, NoteView, SongClock};
pub use tracking::{HandState, HandsSnapshot, Landmark, LandmarkSmoother, SharedHands};
