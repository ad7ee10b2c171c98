use serde::{Deserialize, Serialize};

use crate::ProgressionSettings;

/// Player experience carried across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    xp: u64,
    xp_per_level: u64,
}

impl Progression {
    pub fn new(starting_xp: u64, settings: &ProgressionSettings) -> Self {
        Self {
            xp: starting_xp,
            xp_per_level: settings.xp_per_level.max(1),
        }
    }

    pub fn xp(&self) -> u64 {
        self.xp
    }

    pub fn level(&self) -> u32 {
        level_for_xp(self.xp, self.xp_per_level)
    }

    /// Adds experience and returns every level newly reached, lowest first.
    pub fn grant(&mut self, amount: u64) -> Vec<u32> {
        let before = self.level();
        self.xp = self.xp.saturating_add(amount);
        let after = self.level();
        ((before + 1)..=after).collect()
    }

    /// Bonus granted on victory.
    pub fn victory_bonus(score: u64, settings: &ProgressionSettings) -> u64 {
        settings.victory_xp_bonus + score / 100
    }
}

pub fn level_for_xp(xp: u64, xp_per_level: u64) -> u32 {
    let level = 1 + xp / xp_per_level.max(1);
    u32::try_from(level).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_flat_steps_of_xp() {
        assert_eq!(level_for_xp(0, 1000), 1);
        assert_eq!(level_for_xp(999, 1000), 1);
        assert_eq!(level_for_xp(1000, 1000), 2);
    }

    #[test]
    fn grant_reports_each_level_crossed() {
        let settings = ProgressionSettings::default();
        let mut progression = Progression::new(900, &settings);
        assert!(progression.grant(50).is_empty());
        assert_eq!(progression.grant(2100), vec![2, 3, 4]);
        assert_eq!(progression.xp(), 3050);
    }

    #[test]
    fn victory_bonus_scales_with_score() {
        let settings = ProgressionSettings::default();
        assert_eq!(Progression::victory_bonus(12_345, &settings), 250 + 123);
    }
}
