//! Stat blocks.
//!
//! A stat block holds base values, a bonus bucket per stat and the derived
//! totals recomputed from them. Only the status runtime writes bonus buckets;
//! everything else reads `get`.

use serde::{Deserialize, Serialize};

use super::constants::{
    ATTACK_POWER_PER_STRENGTH, CRIT_CHANCE_PER_AGILITY, HEALING_BONUS_PER_SPIRIT,
    SPELL_POWER_PER_INTELLECT,
};

/// Primary and secondary stats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stat {
    // Primary
    Strength,
    Agility,
    Intellect,
    Stamina,
    Spirit,
    // Secondary
    AttackPower,
    SpellPower,
    /// Chance to crit, 0.0-1.0
    CritChance,
    /// Percent bonus to outgoing healing and restoration (10.0 = +10%)
    HealingBonus,
    Armor,
    Resistance,
    /// Movement speed in units per second
    MoveSpeed,
}

impl Stat {
    pub const COUNT: usize = 12;

    pub const ALL: [Stat; Stat::COUNT] = [
        Stat::Strength,
        Stat::Agility,
        Stat::Intellect,
        Stat::Stamina,
        Stat::Spirit,
        Stat::AttackPower,
        Stat::SpellPower,
        Stat::CritChance,
        Stat::HealingBonus,
        Stat::Armor,
        Stat::Resistance,
        Stat::MoveSpeed,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// A flat stat delta carried by a status effect for its whole lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatModifier {
    pub stat: Stat,
    pub value: f32,
}

/// Stats of one combatant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatBlock {
    base: [f32; Stat::COUNT],
    bonus: [f32; Stat::COUNT],
    total: [f32; Stat::COUNT],
}

fn zeroed() -> [f32; Stat::COUNT] {
    [0.0; Stat::COUNT]
}

impl Default for StatBlock {
    fn default() -> Self {
        Self::from_base(&[])
    }
}

impl StatBlock {
    /// Build a stat block from `(stat, base value)` pairs; unspecified stats are 0.
    pub fn from_base(values: &[(Stat, f32)]) -> Self {
        let mut base = zeroed();
        for (stat, value) in values {
            base[stat.index()] = *value;
        }
        let mut block = Self {
            base,
            bonus: zeroed(),
            total: zeroed(),
        };
        block.recompute();
        block
    }

    /// Effective value of a stat (base + bonus + derived contributions).
    pub fn get(&self, stat: Stat) -> f32 {
        self.total[stat.index()]
    }

    pub fn base(&self, stat: Stat) -> f32 {
        self.base[stat.index()]
    }

    /// Current bonus bucket for a stat (sum of all active modifiers).
    pub fn bonus(&self, stat: Stat) -> f32 {
        self.bonus[stat.index()]
    }

    /// Add to a bonus bucket and recompute. Status runtime only.
    pub(crate) fn add_bonus(&mut self, stat: Stat, value: f32) {
        self.bonus[stat.index()] += value;
        self.recompute();
    }

    /// Recompute derived totals from base and bonus buckets.
    pub fn recompute(&mut self) {
        for stat in Stat::ALL {
            let i = stat.index();
            self.total[i] = self.base[i] + self.bonus[i];
        }

        let strength = self.total[Stat::Strength.index()];
        let agility = self.total[Stat::Agility.index()];
        let intellect = self.total[Stat::Intellect.index()];
        let spirit = self.total[Stat::Spirit.index()];

        self.total[Stat::AttackPower.index()] += strength * ATTACK_POWER_PER_STRENGTH;
        self.total[Stat::SpellPower.index()] += intellect * SPELL_POWER_PER_INTELLECT;
        self.total[Stat::CritChance.index()] =
            (self.total[Stat::CritChance.index()] + agility * CRIT_CHANCE_PER_AGILITY).clamp(0.0, 1.0);
        self.total[Stat::HealingBonus.index()] += spirit * HEALING_BONUS_PER_SPIRIT;
    }
}
