//! Ability Selectors
//!
//! Autonomous decision logic. Each variant implements `AbilitySelector`:
//! - `creature`: hostile creatures (survival, finishers, crowds, range bands)
//! - `companion`: role-aware party companions (heals first for supports)
//! - `defense`: stationary structures (auras plus independent turrets)
//!
//! ## Architecture
//!
//! Selectors only read the battlefield. They return decisions; the engine
//! hands each decision to delivery, which is the only place cooldowns and
//! costs are paid. A selector is told afterwards which of its decisions
//! actually executed through `record_executed`.
//!
//! Wherever several usable abilities share the top priority the pick is
//! uniform over them; a single top ability never touches the random source.

pub mod companion;
pub mod creature;
pub mod defense;

use bevy::prelude::*;
use std::sync::Arc;

use super::ability::{Ability, AbilityCategory, AbilityId, AbilityLibrary, DeliveryKind};
use super::combatant::Combatant;
use super::config::SelectorConfig;
use super::delivery::{check_usable, resolve_target, CastTarget};
use super::rng::RandomSource;
use super::targeting::{find_best_target, TargetFilter, TargetQuery};
use super::world::Battlefield;

pub use companion::CompanionSelector;
pub use creature::{CreatureSelector, RangeBand};
pub use defense::DefenseSelector;

/// Which branch of a priority tree produced a decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionTier {
    Survival,
    Opportunity,
    CrowdResponse,
    Opener,
    Pursuit,
    Fallback,
    AreaHeal,
    SingleHeal,
    Rotation,
    Aura,
    Turret,
}

/// A chosen ability and where to aim it.
#[derive(Clone, Debug)]
pub struct AbilityDecision {
    pub ability: Arc<Ability>,
    pub target: CastTarget,
    pub tier: DecisionTier,
}

impl AbilityDecision {
    pub fn target_entity(&self) -> Option<Entity> {
        match self.target {
            CastTarget::Entity(id) => Some(id),
            _ => None,
        }
    }
}

/// Read-only inputs to one decision.
pub struct DecisionContext<'a> {
    pub world: &'a dyn Battlefield,
    pub abilities: &'a AbilityLibrary,
    pub config: &'a SelectorConfig,
    pub rng: &'a mut dyn RandomSource,
}

impl<'a> DecisionContext<'a> {
    /// The actor's known abilities resolved against the library, in catalog order.
    ///
    /// The default attack is appended when `with_default_attack` is set.
    pub fn catalog(&self, actor: &Combatant, with_default_attack: bool) -> Vec<Arc<Ability>> {
        let mut ids: Vec<&AbilityId> = actor.abilities.iter().collect();
        if with_default_attack {
            if let Some(default_attack) = actor.default_attack.as_ref() {
                if !ids.contains(&default_attack) {
                    ids.push(default_attack);
                }
            }
        }
        ids.into_iter()
            .filter_map(|id| {
                let ability = self.abilities.get(id);
                if ability.is_none() {
                    warn!("{} knows unknown ability '{}'", actor.name, id);
                }
                ability.cloned()
            })
            .collect()
    }

    /// Strongest hostile target around `actor`, honoring the configured priority tag.
    pub fn acquire_hostile(&self, actor: &Combatant) -> Option<Entity> {
        let mut query = TargetQuery::new(actor.position, self.config.aggro_radius, TargetFilter::Hostile(actor.faction))
            .ignoring(actor.id);
        if self.config.require_line_of_sight {
            query = query.with_line_of_sight();
        }
        if let Some(tag) = &self.config.priority_tag {
            query = query.with_priority_tag(tag.clone(), self.config.priority_multiplier);
        }
        find_best_target(self.world, &query)
    }

    /// Keep `current` while it is alive and hostile; otherwise search again.
    pub fn maintain_target(&self, actor: &Combatant, current: Option<Entity>) -> Option<Entity> {
        let still_valid = current
            .and_then(|id| self.world.combatant(id))
            .filter(|t| t.is_alive() && TargetFilter::Hostile(actor.faction).accepts(t.faction))
            .is_some();
        if still_valid {
            current
        } else {
            self.acquire_hostile(actor)
        }
    }
}

/// Shared shape of every autonomous selector.
pub trait AbilitySelector {
    /// Decide what `actor` does this tick. Missing inputs yield no decisions.
    fn decide(&mut self, actor: Entity, ctx: &mut DecisionContext) -> Vec<AbilityDecision>;

    /// Delivery accepted `decision`.
    fn record_executed(&mut self, _decision: &AbilityDecision) {}

    /// Forget engagement state (opener used, remembered target).
    fn reset_engagement(&mut self) {}

    /// The target the selector is currently working on, if any.
    fn current_target(&self) -> Option<Entity> {
        None
    }
}

/// Whether `ability` can be executed by `actor` against `target` right now.
///
/// Applies the same target-shape and usability checks as execution.
pub fn is_usable(world: &dyn Battlefield, actor: &Combatant, ability: &Ability, target: CastTarget) -> bool {
    resolve_target(ability, target)
        .and_then(|target| check_usable(world, actor, ability, target))
        .is_ok()
}

/// Pick the highest-priority ability; ties are broken uniformly at random.
///
/// A unique maximum never consults `rng`.
pub fn pick_highest_priority<'p>(
    candidates: &'p [Arc<Ability>],
    rng: &mut dyn RandomSource,
) -> Option<&'p Arc<Ability>> {
    let top = candidates.iter().map(|a| a.priority).max()?;
    let tied: Vec<&Arc<Ability>> = candidates.iter().filter(|a| a.priority == top).collect();
    match tied.len() {
        1 => Some(tied[0]),
        n => Some(tied[rng.pick_index(n)]),
    }
}

/// Usable abilities of `category` from `pool`, aimed at `target`.
pub fn usable_in_category(
    ctx: &DecisionContext,
    actor: &Combatant,
    pool: &[Arc<Ability>],
    category: AbilityCategory,
    target: CastTarget,
) -> Vec<Arc<Ability>> {
    pool.iter()
        .filter(|a| a.category == category && is_usable(ctx.world, actor, a, target))
        .cloned()
        .collect()
}

/// Pick from the usable abilities of `category`, producing a decision.
pub fn choose(
    ctx: &mut DecisionContext,
    actor: &Combatant,
    pool: &[Arc<Ability>],
    category: AbilityCategory,
    target: CastTarget,
    tier: DecisionTier,
) -> Option<AbilityDecision> {
    let usable = usable_in_category(ctx, actor, pool, category, target);
    let ability = pick_highest_priority(&usable, &mut *ctx.rng)?.clone();
    let target = aim_for(&ability, target, ctx.world);
    Some(AbilityDecision { ability, target, tier })
}

/// Ground-placed abilities aim at the target's feet; others keep the target.
fn aim_for(ability: &Ability, target: CastTarget, world: &dyn Battlefield) -> CastTarget {
    match (ability.delivery, target) {
        (DeliveryKind::GroundPlacement, CastTarget::Entity(id)) => world
            .position_of(id)
            .map(CastTarget::Point)
            .unwrap_or(target),
        _ => target,
    }
}
