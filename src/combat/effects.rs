//! Effect Pipeline
//!
//! A closed set of effect variants. Each one resolves exactly one step against
//! one target when `apply` is called and can describe itself for tooltips.
//!
//! - Damage: base + stat scaling, crit roll, armor/resistance mitigation
//! - Heal: base + stat scaling, healing bonus, crit roll, floored
//! - ResourceRestore: base scaled by healing bonus, clamped to capacity
//! - ApplyStatus: hands a status definition to the target's status holder
//! - Sequence: chance roll, then an asynchronous chain of steps

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::constants::{
    ARMOR_MITIGATION_K, CRIT_MULTIPLIER, MAX_MITIGATION, RESISTANCE_MITIGATION_K,
};
use super::context::{CasterSnapshot, Resolver};
use super::events::CombatEvent;
use super::stats::Stat;
use super::status::{self, StatusId};
use super::tasks::{CombatTask, SequenceTask};

/// Types of damage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageType {
    Physical,
    Fire,
    Frost,
    Nature,
    Shadow,
    Holy,
    Arcane,
    /// Ignores mitigation
    True,
}

impl DamageType {
    pub fn name(&self) -> &'static str {
        match self {
            DamageType::Physical => "physical",
            DamageType::Fire => "fire",
            DamageType::Frost => "frost",
            DamageType::Nature => "nature",
            DamageType::Shadow => "shadow",
            DamageType::Holy => "holy",
            DamageType::Arcane => "arcane",
            DamageType::True => "true",
        }
    }

    /// Stat on the target that mitigates this type, with its constant.
    fn mitigation(&self) -> Option<(Stat, f32)> {
        match self {
            DamageType::True => None,
            DamageType::Physical => Some((Stat::Armor, ARMOR_MITIGATION_K)),
            _ => Some((Stat::Resistance, RESISTANCE_MITIGATION_K)),
        }
    }
}

/// One `stat x ratio` term added to a base amount.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatScaling {
    pub stat: Stat,
    pub ratio: f32,
}

fn default_true() -> bool {
    true
}

/// Polymorphic unit of gameplay impact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    Damage {
        amount: f32,
        damage_type: DamageType,
        #[serde(default)]
        scaling: Vec<StatScaling>,
        #[serde(default = "default_true")]
        can_crit: bool,
    },
    Heal {
        amount: f32,
        #[serde(default)]
        scaling: Vec<StatScaling>,
        #[serde(default = "default_true")]
        can_crit: bool,
        /// Allows the heal to land on a downed target and stand it back up
        #[serde(default)]
        revive: bool,
    },
    ResourceRestore {
        amount: f32,
    },
    ApplyStatus {
        status: StatusId,
    },
    Sequence {
        /// Percent chance (0-100) that the sequence runs at all
        chance: f32,
        steps: Vec<SequenceStep>,
    },
}

/// One step of a sequence, optionally gated by its own percent chance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SequenceStep {
    #[serde(default)]
    pub chance: Option<f32>,
    pub action: SequenceAction,
}

/// A suspending action inside a sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SequenceAction {
    /// Wait for elapsed time
    Wait { seconds: f32 },
    /// Ask presentation to play an animation and wait for it to finish
    Animate { name: String, seconds: f32 },
    /// Move the owner toward the target until within `stop_distance`
    DashToTarget { speed: f32, stop_distance: f32 },
    /// Resolve effects against the sequence target
    ApplyToTarget(Vec<Effect>),
    /// Resolve effects against the owner
    ApplyToSelf(Vec<Effect>),
}

/// What one `apply` call did.
#[derive(Clone, Debug, PartialEq)]
pub enum EffectOutcome {
    Damaged { amount: f32, is_critical: bool },
    Healed { amount: f32, is_critical: bool },
    Restored { amount: f32 },
    StatusApplied,
    /// Instant status fired its effects without creating an instance
    StatusFired,
    /// Target has no status holder
    NoHolder,
    SequenceStarted,
    SequenceSkipped,
    /// Target missing, dead/downed, or lacking the needed pool
    Ineligible,
}

impl Effect {
    pub fn damage(amount: f32, damage_type: DamageType) -> Self {
        Effect::Damage {
            amount,
            damage_type,
            scaling: Vec::new(),
            can_crit: true,
        }
    }

    pub fn heal(amount: f32) -> Self {
        Effect::Heal {
            amount,
            scaling: Vec::new(),
            can_crit: true,
            revive: false,
        }
    }

    pub fn apply_status(status: &str) -> Self {
        Effect::ApplyStatus {
            status: StatusId::from(status),
        }
    }

    /// Whether this effect may resolve against a downed target.
    pub fn affects_downed(&self) -> bool {
        matches!(self, Effect::Heal { revive: true, .. })
    }

    /// Apply this effect from `caster` to `target`. One call, one resolution.
    pub fn apply(&self, ctx: &mut Resolver, caster: &CasterSnapshot, target: Entity) -> EffectOutcome {
        let Some(target_record) = ctx.world.combatant(target) else {
            return EffectOutcome::Ineligible;
        };
        if !target_record.is_alive() && !self.affects_downed() {
            return EffectOutcome::Ineligible;
        }

        match self {
            Effect::Damage {
                amount,
                damage_type,
                scaling,
                can_crit,
            } => apply_damage(ctx, caster, target, *amount, *damage_type, scaling, *can_crit),
            Effect::Heal {
                amount,
                scaling,
                can_crit,
                revive,
            } => apply_heal(ctx, caster, target, *amount, scaling, *can_crit, *revive),
            Effect::ResourceRestore { amount } => apply_restore(ctx, caster, target, *amount),
            Effect::ApplyStatus { status } => {
                let Some(definition) = ctx.statuses.get(status).cloned() else {
                    warn!("ApplyStatus references unknown status '{}'", status);
                    return EffectOutcome::Ineligible;
                };
                status::apply_status(ctx, caster, target, definition)
            }
            Effect::Sequence { chance, steps } => {
                if !ctx.rng.roll(chance / 100.0) {
                    return EffectOutcome::SequenceSkipped;
                }
                let Some(owner) = caster.id else {
                    return EffectOutcome::SequenceSkipped;
                };
                ctx.spawned.push(CombatTask::Sequence(SequenceTask::new(
                    owner,
                    target,
                    steps.clone(),
                )));
                EffectOutcome::SequenceStarted
            }
        }
    }

    /// Human-readable summary for tooltips. No gameplay effect.
    pub fn describe(&self) -> String {
        match self {
            Effect::Damage {
                amount,
                damage_type,
                scaling,
                ..
            } => format!(
                "Deals {:.0}{} {} damage",
                amount,
                describe_scaling(scaling),
                damage_type.name()
            ),
            Effect::Heal {
                amount,
                scaling,
                revive,
                ..
            } => {
                let verb = if *revive { "Revives and heals" } else { "Heals" };
                format!("{} for {:.0}{}", verb, amount, describe_scaling(scaling))
            }
            Effect::ResourceRestore { amount } => format!("Restores {:.0} resource", amount),
            Effect::ApplyStatus { status } => format!("Applies {}", status),
            Effect::Sequence { chance, steps } => {
                let parts: Vec<String> = steps.iter().map(|s| s.action.describe()).collect();
                format!("{:.0}% chance: {}", chance, parts.join(", then "))
            }
        }
    }

    /// Collect every status id referenced by this effect, including nested sequences.
    pub fn collect_status_refs(&self, out: &mut Vec<StatusId>) {
        match self {
            Effect::ApplyStatus { status } => out.push(status.clone()),
            Effect::Sequence { steps, .. } => {
                for step in steps {
                    if let SequenceAction::ApplyToTarget(effects) | SequenceAction::ApplyToSelf(effects) =
                        &step.action
                    {
                        for effect in effects {
                            effect.collect_status_refs(out);
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

impl SequenceAction {
    pub fn describe(&self) -> String {
        match self {
            SequenceAction::Wait { seconds } => format!("wait {:.1}s", seconds),
            SequenceAction::Animate { name, .. } => format!("perform {}", name),
            SequenceAction::DashToTarget { .. } => "dash to the target".to_string(),
            SequenceAction::ApplyToTarget(effects) => effects
                .iter()
                .map(|e| e.describe().to_lowercase())
                .collect::<Vec<_>>()
                .join(" and "),
            SequenceAction::ApplyToSelf(effects) => format!(
                "self: {}",
                effects
                    .iter()
                    .map(|e| e.describe().to_lowercase())
                    .collect::<Vec<_>>()
                    .join(" and ")
            ),
        }
    }
}

fn describe_scaling(scaling: &[StatScaling]) -> String {
    scaling
        .iter()
        .map(|s| format!(" (+{:.0}% {:?})", s.ratio * 100.0, s.stat))
        .collect()
}

/// Base amount plus the sum of `stat x ratio` terms over the caster's stats.
pub fn scaled_amount(base: f32, scaling: &[StatScaling], caster: &CasterSnapshot) -> f32 {
    base + scaling
        .iter()
        .map(|s| caster.stat(s.stat) * s.ratio)
        .sum::<f32>()
}

/// Fraction of a hit removed by the target's mitigation stat.
pub fn mitigation_fraction(damage_type: DamageType, target_stat: f32) -> f32 {
    let Some((_, k)) = damage_type.mitigation() else {
        return 0.0;
    };
    if target_stat <= 0.0 {
        return 0.0;
    }
    (target_stat / (target_stat + k)).min(MAX_MITIGATION)
}

#[allow(clippy::too_many_arguments)]
fn apply_damage(
    ctx: &mut Resolver,
    caster: &CasterSnapshot,
    target: Entity,
    base: f32,
    damage_type: DamageType,
    scaling: &[StatScaling],
    can_crit: bool,
) -> EffectOutcome {
    let mut amount = scaled_amount(base, scaling, caster);

    let is_critical = can_crit && ctx.rng.roll(caster.stat(Stat::CritChance));
    if is_critical {
        amount *= CRIT_MULTIPLIER;
    }

    let Some(target_record) = ctx.world.combatant_mut(target) else {
        return EffectOutcome::Ineligible;
    };

    if let Some((stat, _)) = damage_type.mitigation() {
        amount *= 1.0 - mitigation_fraction(damage_type, target_record.stat(stat));
    }

    let dealt = target_record.take_damage(amount.floor());
    let downed = target_record.health.downed;
    target_record.debug_validate();

    if let Some(source) = caster.id.and_then(|id| ctx.world.combatant_mut(id)) {
        source.damage_dealt += dealt;
    }

    ctx.notify(CombatEvent::Damage {
        source: caster.id,
        target,
        amount: dealt,
        is_critical,
        damage_type,
    });

    if downed && dealt > 0.0 {
        ctx.notify(CombatEvent::Downed {
            target,
            source: caster.id,
        });
        // Statuses fall off a downed combatant
        status::purge_statuses(ctx, target);
    }

    EffectOutcome::Damaged {
        amount: dealt,
        is_critical,
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_heal(
    ctx: &mut Resolver,
    caster: &CasterSnapshot,
    target: Entity,
    base: f32,
    scaling: &[StatScaling],
    can_crit: bool,
    revive: bool,
) -> EffectOutcome {
    let mut amount = scaled_amount(base, scaling, caster);
    amount *= 1.0 + caster.stat(Stat::HealingBonus) / 100.0;

    let is_critical = can_crit && ctx.rng.roll(caster.stat(Stat::CritChance));
    if is_critical {
        amount *= CRIT_MULTIPLIER;
    }
    let amount = amount.floor();

    let Some(target_record) = ctx.world.combatant_mut(target) else {
        return EffectOutcome::Ineligible;
    };

    let was_downed = target_record.health.downed;
    if was_downed && !revive {
        return EffectOutcome::Ineligible;
    }

    let healed = target_record.restore_health(amount);
    let revived = was_downed && target_record.health.current > 0.0;
    if revived {
        target_record.health.downed = false;
    }

    if let Some(source) = caster.id.and_then(|id| ctx.world.combatant_mut(id)) {
        source.healing_done += healed;
    }

    if revived {
        ctx.notify(CombatEvent::Revived {
            target,
            source: caster.id,
        });
    }
    ctx.notify(CombatEvent::Healing {
        source: caster.id,
        target,
        amount: healed,
        is_critical,
    });

    EffectOutcome::Healed {
        amount: healed,
        is_critical,
    }
}

fn apply_restore(ctx: &mut Resolver, caster: &CasterSnapshot, target: Entity, base: f32) -> EffectOutcome {
    let amount = base * (1.0 + caster.stat(Stat::HealingBonus) / 100.0);

    let Some(pool) = ctx
        .world
        .combatant_mut(target)
        .and_then(|c| c.resource.as_mut())
    else {
        return EffectOutcome::Ineligible;
    };

    let restored = amount.max(0.0).min(pool.missing());
    pool.current += restored;

    ctx.notify(CombatEvent::ResourceRestored {
        source: caster.id,
        target,
        amount: restored,
    });

    EffectOutcome::Restored { amount: restored }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_true_damage_ignores_mitigation() {
        assert_eq!(mitigation_fraction(DamageType::True, 10_000.0), 0.0);
    }

    #[test]
    fn test_mitigation_is_capped() {
        assert_eq!(mitigation_fraction(DamageType::Physical, 1.0e9), MAX_MITIGATION);
        assert_eq!(mitigation_fraction(DamageType::Fire, 200.0), 0.5);
    }

    #[test]
    fn test_describe_mentions_amounts() {
        assert_eq!(Effect::damage(12.0, DamageType::Fire).describe(), "Deals 12 fire damage");
        assert_eq!(Effect::heal(30.0).describe(), "Heals for 30");
    }

    #[test]
    fn test_only_reviving_heals_reach_downed_targets() {
        assert!(!Effect::heal(10.0).affects_downed());
        let revive = Effect::Heal {
            amount: 10.0,
            scaling: vec![],
            can_crit: false,
            revive: true,
        };
        assert!(revive.affects_downed());
    }
}
