//! Static defense selector
//!
//! Every decision: fire each usable PassiveAura on self, then let each
//! AutoTurret ability pick its own nearest valid enemy inside its own range.
//! Turrets can engage different targets in the same decision.

use bevy::prelude::*;

use super::{is_usable, AbilityDecision, AbilitySelector, DecisionContext, DecisionTier};
use crate::combat::ability::AbilityCategory;
use crate::combat::delivery::CastTarget;
use crate::combat::targeting::{find_best_target, TargetFilter, TargetQuery};

#[derive(Clone, Debug, Default)]
pub struct DefenseSelector;

impl DefenseSelector {
    pub fn new() -> Self {
        Self
    }
}

impl AbilitySelector for DefenseSelector {
    fn decide(&mut self, actor_id: Entity, ctx: &mut DecisionContext) -> Vec<AbilityDecision> {
        let world = ctx.world;
        let Some(actor) = world.combatant(actor_id) else {
            return Vec::new();
        };
        let catalog = ctx.catalog(actor, false);
        let mut decisions = Vec::new();

        for ability in catalog.iter().filter(|a| a.category == AbilityCategory::PassiveAura) {
            if is_usable(world, actor, ability, CastTarget::SelfCast) {
                decisions.push(AbilityDecision {
                    ability: ability.clone(),
                    target: CastTarget::SelfCast,
                    tier: DecisionTier::Aura,
                });
            }
        }

        for ability in catalog.iter().filter(|a| a.category == AbilityCategory::AutoTurret) {
            let mut query = TargetQuery::new(actor.position, ability.range, TargetFilter::Hostile(actor.faction))
                .ignoring(actor_id);
            if ctx.config.require_line_of_sight {
                query = query.with_line_of_sight();
            }
            let Some(target) = find_best_target(world, &query) else {
                continue;
            };
            let aim = CastTarget::Entity(target);
            if is_usable(world, actor, ability, aim) {
                decisions.push(AbilityDecision {
                    ability: ability.clone(),
                    target: aim,
                    tier: DecisionTier::Turret,
                });
            }
        }

        decisions
    }
}
