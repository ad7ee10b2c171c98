use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{DifficultyConfig, ItemPerks, TierThresholds};

pub const MAX_HEALTH: f32 = 100.0;

/// Quality bucket of a resolved hit, ordered by value.
///
/// Misses are not a tier; they are scored through [`ScoreKeeper::apply_miss`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    WrongSaber,
    Bad,
    Ok,
    Good,
    Great,
    Perfect,
    GoldStar,
}

impl Tier {
    /// Penalty tiers break the combo and are never scaled.
    pub fn is_penalty(self) -> bool {
        matches!(self, Tier::Bad | Tier::WrongSaber)
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::GoldStar => "GOLD STAR",
            Tier::Perfect => "PERFECT",
            Tier::Great => "GREAT",
            Tier::Good => "GOOD",
            Tier::Ok => "OK",
            Tier::Bad => "BAD",
            Tier::WrongSaber => "WRONG SABER",
        }
    }
}

/// Base award for a tier before any multiplier is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierReward {
    pub points: u32,
    pub coins: u32,
    pub health: f32,
    pub xp: u32,
}

impl TierReward {
    const fn new(points: u32, coins: u32, health: f32, xp: u32) -> Self {
        Self {
            points,
            coins,
            health,
            xp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTable {
    pub gold_star: TierReward,
    pub perfect: TierReward,
    pub great: TierReward,
    pub good: TierReward,
    pub ok: TierReward,
    pub bad: TierReward,
    pub wrong_saber: TierReward,
    /// Combo lost on a penalty hit.
    pub penalty_combo_decrement: u32,
}

impl TierTable {
    pub fn reward(&self, tier: Tier) -> TierReward {
        match tier {
            Tier::GoldStar => self.gold_star,
            Tier::Perfect => self.perfect,
            Tier::Great => self.great,
            Tier::Good => self.good,
            Tier::Ok => self.ok,
            Tier::Bad => self.bad,
            Tier::WrongSaber => self.wrong_saber,
        }
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            gold_star: TierReward::new(500, 25, 5.0, 50),
            perfect: TierReward::new(300, 10, 3.0, 30),
            great: TierReward::new(200, 5, 2.0, 20),
            good: TierReward::new(100, 2, 1.0, 10),
            ok: TierReward::new(50, 1, 0.0, 5),
            bad: TierReward::new(0, 0, -2.0, 0),
            wrong_saber: TierReward::new(0, 0, -3.0, 0),
            penalty_combo_decrement: 5,
        }
    }
}

/// Tier for a correct-hand cut on a normal note.
///
/// `angle` is the alignment score against the required direction, or `None`
/// when the note accepts any direction.
pub fn classify_cut(
    thresholds: &TierThresholds,
    precision: f32,
    speed: f32,
    angle: Option<f32>,
) -> Tier {
    if speed < thresholds.min_speed {
        return Tier::Bad;
    }
    if let Some(angle) = angle {
        if angle < thresholds.bad_angle {
            return Tier::Bad;
        }
    }

    let angle = angle.unwrap_or(1.0);
    if thresholds.perfect.admits(precision, speed, angle) {
        Tier::Perfect
    } else if thresholds.great.admits(precision, speed, angle) {
        Tier::Great
    } else if thresholds.good.admits(precision, speed, angle) {
        Tier::Good
    } else {
        Tier::Ok
    }
}

/// Combo multiplier: 2x past 10, 4x past 20 and 8x past 30.
pub fn multiplier_for_combo(combo: u32) -> u32 {
    match combo {
        0..=10 => 1,
        11..=20 => 2,
        21..=30 => 4,
        _ => 8,
    }
}

/// Effect of one resolution on the session totals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Award {
    pub points: u64,
    pub coins: u64,
    pub xp: u64,
    pub health_delta: f32,
    /// Combo before it was broken, if this resolution broke one.
    pub combo_broken: Option<u32>,
    /// Health went from positive to zero with this resolution.
    pub depleted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub tier_counts: BTreeMap<Tier, u32>,
    pub misses: u32,
    pub max_combo: u32,
}

impl ScoreStats {
    pub fn count(&self, tier: Tier) -> u32 {
        self.tier_counts.get(&tier).copied().unwrap_or(0)
    }

    pub fn resolved(&self) -> u32 {
        self.tier_counts.values().sum::<u32>() + self.misses
    }

    /// Fraction of resolved notes cut with a non-penalty tier.
    pub fn accuracy(&self) -> f32 {
        let resolved = self.resolved();
        if resolved == 0 {
            return 1.0;
        }
        let clean: u32 = self
            .tier_counts
            .iter()
            .filter(|(tier, _)| !tier.is_penalty())
            .map(|(_, count)| count)
            .sum();
        clean as f32 / resolved as f32
    }
}

/// Score, combo and health bookkeeping for one session.
///
/// The tier table, difficulty and item perks are copied in at construction
/// and never change afterwards.
#[derive(Debug, Clone)]
pub struct ScoreKeeper {
    tiers: TierTable,
    difficulty: DifficultyConfig,
    perks: ItemPerks,
    score: u64,
    coins: u64,
    combo: u32,
    multiplier: u32,
    health: f32,
    stats: ScoreStats,
}

impl ScoreKeeper {
    pub fn new(tiers: TierTable, difficulty: DifficultyConfig, perks: ItemPerks) -> Self {
        Self {
            tiers,
            difficulty,
            perks,
            score: 0,
            coins: 0,
            combo: 0,
            multiplier: 1,
            health: MAX_HEALTH,
            stats: ScoreStats::default(),
        }
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn coins(&self) -> u64 {
        self.coins
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn stats(&self) -> &ScoreStats {
        &self.stats
    }

    pub fn apply_hit(&mut self, tier: Tier) -> Award {
        let reward = self.tiers.reward(tier);
        *self.stats.tier_counts.entry(tier).or_insert(0) += 1;

        if tier.is_penalty() {
            let previous = self.combo;
            self.combo = self.combo.saturating_sub(self.tiers.penalty_combo_decrement);
            self.multiplier = (self.multiplier / 2).max(1);
            let (health_delta, depleted) = self.shift_health(reward.health);
            return Award {
                points: 0,
                coins: 0,
                xp: 0,
                health_delta,
                combo_broken: (previous > 0).then_some(previous),
                depleted,
            };
        }

        self.combo += 1;
        self.stats.max_combo = self.stats.max_combo.max(self.combo);
        self.multiplier = multiplier_for_combo(self.combo);

        let points = scale(
            reward.points as f32
                * self.multiplier as f32
                * self.perks.score_mult
                * self.difficulty.score_multiplier,
        );
        let coins = scale(
            reward.coins as f32 * self.perks.coin_mult * self.difficulty.score_multiplier,
        );
        self.score += points;
        self.coins += coins;

        let (health_delta, depleted) =
            self.shift_health(reward.health * self.difficulty.health_gain_per_tier);
        Award {
            points,
            coins,
            xp: reward.xp as u64,
            health_delta,
            combo_broken: None,
            depleted,
        }
    }

    pub fn apply_miss(&mut self) -> Award {
        self.stats.misses += 1;
        let previous = self.combo;
        self.combo = 0;
        self.multiplier = 1;
        let (health_delta, depleted) = self.shift_health(-self.difficulty.health_drain_per_miss);
        Award {
            points: 0,
            coins: 0,
            xp: 0,
            health_delta,
            combo_broken: (previous > 0).then_some(previous),
            depleted,
        }
    }

    /// Applies a clamped health change and returns the effective delta and
    /// whether this change emptied the bar.
    fn shift_health(&mut self, delta: f32) -> (f32, bool) {
        let before = self.health;
        self.health = (self.health + delta).clamp(0.0, MAX_HEALTH);
        (self.health - before, before > 0.0 && self.health <= 0.0)
    }
}

fn scale(value: f32) -> u64 {
    value.max(0.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Difficulty, PerDifficulty};

    fn keeper() -> ScoreKeeper {
        let difficulty = PerDifficulty::<DifficultyConfig>::default().get(Difficulty::Normal);
        ScoreKeeper::new(TierTable::default(), difficulty, ItemPerks::default())
    }

    #[test]
    fn multiplier_boundaries_are_exclusive() {
        assert_eq!(multiplier_for_combo(10), 1);
        assert_eq!(multiplier_for_combo(11), 2);
        assert_eq!(multiplier_for_combo(20), 2);
        assert_eq!(multiplier_for_combo(21), 4);
        assert_eq!(multiplier_for_combo(30), 4);
        assert_eq!(multiplier_for_combo(31), 8);
    }

    #[test]
    fn consecutive_hits_step_the_multiplier() {
        let mut keeper = keeper();
        for _ in 0..10 {
            keeper.apply_hit(Tier::Good);
        }
        assert_eq!(keeper.multiplier(), 1);
        keeper.apply_hit(Tier::Good);
        assert_eq!(keeper.multiplier(), 2);
        for _ in 0..10 {
            keeper.apply_hit(Tier::Good);
        }
        assert_eq!(keeper.combo(), 21);
        assert_eq!(keeper.multiplier(), 4);
        for _ in 0..10 {
            keeper.apply_hit(Tier::Good);
        }
        assert_eq!(keeper.multiplier(), 8);
    }

    #[test]
    fn penalty_hit_halves_multiplier_and_trims_combo() {
        let mut keeper = keeper();
        for _ in 0..25 {
            keeper.apply_hit(Tier::Great);
        }
        assert_eq!(keeper.multiplier(), 4);
        let score = keeper.score();

        let award = keeper.apply_hit(Tier::WrongSaber);
        assert_eq!(award.points, 0);
        assert_eq!(award.coins, 0);
        assert_eq!(award.combo_broken, Some(25));
        assert_eq!(keeper.combo(), 20);
        assert_eq!(keeper.multiplier(), 2);
        assert_eq!(keeper.score(), score);
    }

    #[test]
    fn miss_resets_combo_and_drains_difficulty_health() {
        let mut keeper = keeper();
        for _ in 0..12 {
            keeper.apply_hit(Tier::Perfect);
        }
        let before = keeper.health();
        let award = keeper.apply_miss();
        assert_eq!(keeper.combo(), 0);
        assert_eq!(keeper.multiplier(), 1);
        assert_eq!(award.health_delta, -12.0);
        assert_eq!(keeper.health(), before - 12.0);
    }

    #[test]
    fn health_clamps_and_depletes_once() {
        let mut keeper = keeper();
        let mut depletions = 0;
        for _ in 0..12 {
            if keeper.apply_miss().depleted {
                depletions += 1;
            }
        }
        assert_eq!(keeper.health(), 0.0);
        assert_eq!(depletions, 1);
    }

    #[test]
    fn points_scale_with_perks_and_difficulty() {
        let difficulty = DifficultyConfig {
            note_speed: 10.0,
            health_drain_per_miss: 10.0,
            health_gain_per_tier: 1.0,
            score_multiplier: 1.5,
        };
        let perks = ItemPerks {
            score_mult: 2.0,
            coin_mult: 3.0,
            ..ItemPerks::default()
        };
        let mut keeper = ScoreKeeper::new(TierTable::default(), difficulty, perks);
        let award = keeper.apply_hit(Tier::Perfect);
        assert_eq!(award.points, 900);
        assert_eq!(award.coins, 45);
    }

    #[test]
    fn classify_respects_speed_and_angle_gates() {
        let thresholds = TierThresholds::default();
        assert_eq!(classify_cut(&thresholds, 1.0, 0.5, Some(1.0)), Tier::Bad);
        assert_eq!(classify_cut(&thresholds, 1.0, 6.0, Some(-0.9)), Tier::Bad);
        assert_eq!(classify_cut(&thresholds, 1.0, 6.0, Some(1.0)), Tier::Perfect);
        assert_eq!(classify_cut(&thresholds, 0.5, 6.0, None), Tier::Great);
        assert_eq!(classify_cut(&thresholds, 0.3, 2.5, Some(0.5)), Tier::Good);
        assert_eq!(classify_cut(&thresholds, 0.1, 2.5, Some(0.5)), Tier::Ok);
    }

    #[test]
    fn accuracy_counts_penalties_and_misses_against() {
        let mut keeper = keeper();
        keeper.apply_hit(Tier::Perfect);
        keeper.apply_hit(Tier::Bad);
        keeper.apply_miss();
        keeper.apply_hit(Tier::Ok);
        assert!((keeper.stats().accuracy() - 0.5).abs() < 1e-6);
    }
}
