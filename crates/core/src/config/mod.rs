use std::{fmt, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Result, SaberError, TierTable};

/// Difficulty selector chosen before a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
    Expert,
}

impl Difficulty {
    pub fn all() -> &'static [Difficulty] {
        &[
            Difficulty::Easy,
            Difficulty::Normal,
            Difficulty::Hard,
            Difficulty::Expert,
        ]
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        };
        f.write_str(name)
    }
}

impl FromStr for Difficulty {
    type Err = SaberError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "normal" => Ok(Difficulty::Normal),
            "hard" => Ok(Difficulty::Hard),
            "expert" => Ok(Difficulty::Expert),
            other => Err(SaberError::msg(format!("unknown difficulty `{other}`"))),
        }
    }
}

/// One value per [`Difficulty`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerDifficulty<T> {
    pub easy: T,
    pub normal: T,
    pub hard: T,
    pub expert: T,
}

impl<T: Copy> PerDifficulty<T> {
    pub fn get(&self, difficulty: Difficulty) -> T {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Normal => self.normal,
            Difficulty::Hard => self.hard,
            Difficulty::Expert => self.expert,
        }
    }
}

/// Balance values for one difficulty, snapshotted into a session at start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyConfig {
    /// Travel speed of notes in world units per second.
    pub note_speed: f32,
    pub health_drain_per_miss: f32,
    /// Scale applied to the health gain of every non-penalty tier.
    pub health_gain_per_tier: f32,
    pub score_multiplier: f32,
}

impl Default for PerDifficulty<DifficultyConfig> {
    fn default() -> Self {
        Self {
            easy: DifficultyConfig {
                note_speed: 8.0,
                health_drain_per_miss: 10.0,
                health_gain_per_tier: 1.5,
                score_multiplier: 1.0,
            },
            normal: DifficultyConfig {
                note_speed: 10.0,
                health_drain_per_miss: 12.0,
                health_gain_per_tier: 1.0,
                score_multiplier: 1.2,
            },
            hard: DifficultyConfig {
                note_speed: 12.0,
                health_drain_per_miss: 15.0,
                health_gain_per_tier: 0.8,
                score_multiplier: 1.5,
            },
            expert: DifficultyConfig {
                note_speed: 14.0,
                health_drain_per_miss: 20.0,
                health_gain_per_tier: 0.6,
                score_multiplier: 2.0,
            },
        }
    }
}

/// Perks of the equipped saber. Read-only catalog data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemPerks {
    pub score_mult: f32,
    pub coin_mult: f32,
    /// Scales both the reach radius and the hit window depth.
    pub hit_window: f32,
    /// Novelty item: every correct-hand reach is scored as the top tier.
    #[serde(default)]
    pub auto_perfect: bool,
}

impl Default for ItemPerks {
    fn default() -> Self {
        Self {
            score_mult: 1.0,
            coin_mult: 1.0,
            hit_window: 1.0,
            auto_perfect: false,
        }
    }
}

/// Minimum precision, speed and angle alignment a cut needs for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierBand {
    pub precision: f32,
    pub speed: f32,
    pub angle: f32,
}

impl TierBand {
    pub fn admits(&self, precision: f32, speed: f32, angle: f32) -> bool {
        precision >= self.precision && speed >= self.speed && angle >= self.angle
    }
}

/// Tunable cut-quality thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    /// Swings slower than this (units per second) are scored as BAD.
    pub min_speed: f32,
    /// Alignment below this score on a directional note is scored as BAD.
    pub bad_angle: f32,
    pub perfect: TierBand,
    pub great: TierBand,
    pub good: TierBand,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            min_speed: 1.5,
            bad_angle: -0.3,
            perfect: TierBand {
                precision: 0.6,
                speed: 4.0,
                angle: 0.8,
            },
            great: TierBand {
                precision: 0.4,
                speed: 3.0,
                angle: 0.6,
            },
            good: TierBand {
                precision: 0.2,
                speed: 2.0,
                angle: 0.3,
            },
        }
    }
}

/// Spatial layout of the play field, in world units.
///
/// Notes travel along +z towards the player plane at `z = 0`. Distances
/// along the travel axis are measured as "distance still to travel", so
/// positive values are on the approach side and negative values have
/// already passed the player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldGeometry {
    pub lane_spacing: f32,
    pub layer_spacing: f32,
    /// Distance from the spawn plane to the player plane.
    pub spawn_distance: f32,
    /// Depth of the hit window on the approach side.
    pub approach_depth: f32,
    /// Depth of the hit window past the player plane.
    pub departure_depth: f32,
    /// Offset past the player plane at which unresolved notes are missed.
    pub miss_plane: f32,
    /// Planar reach radius before the item perk is applied.
    pub base_radius: f32,
    /// How long resolved notes stay visible for decay animations.
    pub decay_seconds: f32,
}

impl Default for FieldGeometry {
    fn default() -> Self {
        Self {
            lane_spacing: 0.5,
            layer_spacing: 0.5,
            spawn_distance: 20.0,
            approach_depth: 1.2,
            departure_depth: 0.4,
            miss_plane: 0.8,
            base_radius: 0.35,
            decay_seconds: 0.5,
        }
    }
}

/// Per-difficulty knobs for the chart generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartProfile {
    pub skip_probability: f64,
    pub double_probability: f64,
    /// Chance that a beat carries a half/quarter-beat burst. Zero disables
    /// sub-beat subdivisions entirely.
    pub burst_probability: f64,
}

impl Default for PerDifficulty<ChartProfile> {
    fn default() -> Self {
        Self {
            easy: ChartProfile {
                skip_probability: 0.5,
                double_probability: 0.0,
                burst_probability: 0.0,
            },
            normal: ChartProfile {
                skip_probability: 0.3,
                double_probability: 0.1,
                burst_probability: 0.0,
            },
            hard: ChartProfile {
                skip_probability: 0.15,
                double_probability: 0.2,
                burst_probability: 0.0,
            },
            expert: ChartProfile {
                skip_probability: 0.02,
                double_probability: 0.25,
                burst_probability: 0.35,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartSettings {
    pub bpm: f32,
    pub beats: u32,
    pub lead_in_beats: u32,
    pub outro_seconds: f32,
    /// Every n-th generated note becomes a gold star.
    pub gold_star_every: u32,
    pub phase_length_beats: u32,
    pub profiles: PerDifficulty<ChartProfile>,
}

impl ChartSettings {
    pub fn beat_period(&self) -> f32 {
        60.0 / self.bpm
    }
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            beats: 96,
            lead_in_beats: 4,
            outro_seconds: 2.0,
            gold_star_every: 50,
            phase_length_beats: 16,
            profiles: PerDifficulty::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressionSettings {
    pub xp_per_level: u64,
    pub victory_xp_bonus: u64,
}

impl Default for ProgressionSettings {
    fn default() -> Self {
        Self {
            xp_per_level: 1000,
            victory_xp_bonus: 250,
        }
    }
}

/// Top-level configuration structure for the game core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub difficulties: PerDifficulty<DifficultyConfig>,
    #[serde(default)]
    pub thresholds: TierThresholds,
    #[serde(default)]
    pub tiers: TierTable,
    #[serde(default)]
    pub field: FieldGeometry,
    #[serde(default)]
    pub chart: ChartSettings,
    #[serde(default)]
    pub progression: ProgressionSettings,
}

impl GameConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rejects values the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        for &difficulty in Difficulty::all() {
            let config = self.difficulties.get(difficulty);
            ensure_positive(config.note_speed, "note_speed", difficulty)?;
            ensure_positive(config.score_multiplier, "score_multiplier", difficulty)?;
            if config.health_drain_per_miss < 0.0 || config.health_gain_per_tier < 0.0 {
                return Err(SaberError::invalid_config(format!(
                    "{difficulty}: health values must not be negative"
                )));
            }
        }

        let field = &self.field;
        for (value, name) in [
            (field.spawn_distance, "spawn_distance"),
            (field.base_radius, "base_radius"),
            (field.approach_depth, "approach_depth"),
            (field.miss_plane, "miss_plane"),
        ] {
            if !(value > 0.0) {
                return Err(SaberError::invalid_config(format!(
                    "field.{name} must be positive"
                )));
            }
        }

        if !(self.chart.bpm > 0.0) {
            return Err(SaberError::invalid_config("chart.bpm must be positive"));
        }
        if self.chart.gold_star_every == 0 || self.chart.phase_length_beats == 0 {
            return Err(SaberError::invalid_config(
                "chart.gold_star_every and chart.phase_length_beats must be non-zero",
            ));
        }
        if self.progression.xp_per_level == 0 {
            return Err(SaberError::invalid_config(
                "progression.xp_per_level must be non-zero",
            ));
        }
        Ok(())
    }
}

fn ensure_positive(value: f32, name: &str, difficulty: Difficulty) -> Result<()> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(SaberError::invalid_config(format!(
            "{difficulty}: {name} must be positive, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        GameConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{ "progression": { "xp_per_level": 500, "victory_xp_bonus": 10 } }"#;
        let config = GameConfig::from_json_str(json).unwrap();
        assert_eq!(config.progression.xp_per_level, 500);
        assert_eq!(config.field, FieldGeometry::default());
    }

    #[test]
    fn rejects_zero_note_speed() {
        let mut config = GameConfig::default();
        config.difficulties.hard.note_speed = 0.0;
        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("note_speed"));
    }

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("Expert".parse::<Difficulty>().unwrap(), Difficulty::Expert);
        assert!("legendary".parse::<Difficulty>().is_err());
    }
}
