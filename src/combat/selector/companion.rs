//! Party companion selector
//!
//! Supports heal first: an AOE heal when enough allies are hurt, otherwise a
//! single heal on the most wounded ally a heal can reach. Everyone else (and a support with
//! nobody to heal) runs the damage tree: Finisher, then AOE damage on a
//! cluster, then the best StandardDamage ability including the default attack.

use bevy::prelude::*;
use std::collections::HashSet;

use super::{choose, is_usable, AbilityDecision, AbilitySelector, DecisionContext, DecisionTier};
use crate::combat::ability::AbilityCategory;
use crate::combat::combatant::Role;
use crate::combat::delivery::CastTarget;
use crate::combat::faction::is_ally;
use crate::combat::targeting::{count_within, has_line_of_sight, TargetFilter};
use crate::combat::world::Layers;

#[derive(Clone, Debug, Default)]
pub struct CompanionSelector {
    target: Option<Entity>,
}

impl CompanionSelector {
    pub fn new() -> Self {
        Self::default()
    }

    fn decide_heal(&self, actor_id: Entity, ctx: &mut DecisionContext) -> Option<AbilityDecision> {
        let world = ctx.world;
        let actor = world.combatant(actor_id)?;
        let catalog = ctx.catalog(actor, false);

        // Living allies in scan range below the heal threshold
        let mut seen = HashSet::new();
        let wounded: Vec<Entity> = world
            .contacts_within(actor.position, ctx.config.ally_scan_radius, Layers::COMBATANTS)
            .into_iter()
            .filter(|hit| seen.insert(hit.entity))
            .filter_map(|hit| world.combatant(hit.entity))
            .filter(|c| c.is_alive() && is_ally(actor.faction, c.faction))
            .filter(|c| c.health.fraction() < ctx.config.heal_threshold)
            .map(|c| c.id)
            .collect();

        if wounded.is_empty() {
            return None;
        }

        if wounded.len() >= ctx.config.ally_aoe_threshold {
            if let Some(decision) = choose(
                ctx,
                actor,
                &catalog,
                AbilityCategory::AoeHeal,
                CastTarget::Point(actor.position),
                DecisionTier::AreaHeal,
            ) {
                return Some(decision);
            }
        }

        // Most wounded ally some single heal can reach; equal fractions keep scan order
        let sight_origin = actor.position + Vec3::Y;
        let mut most_wounded: Option<(Entity, f32)> = None;
        for id in &wounded {
            let reachable = catalog.iter().any(|a| {
                a.category == AbilityCategory::SingleHeal && is_usable(world, actor, a, CastTarget::Entity(*id))
            });
            if !reachable {
                continue;
            }
            if ctx.config.require_line_of_sight
                && *id != actor_id
                && !has_line_of_sight(world, sight_origin, *id, Some(actor_id))
            {
                continue;
            }
            let Some(fraction) = world.combatant(*id).map(|c| c.health.fraction()) else {
                continue;
            };
            if most_wounded.map_or(true, |(_, lowest)| fraction < lowest) {
                most_wounded = Some((*id, fraction));
            }
        }
        let (ally, _) = most_wounded?;
        choose(
            ctx,
            actor,
            &catalog,
            AbilityCategory::SingleHeal,
            CastTarget::Entity(ally),
            DecisionTier::SingleHeal,
        )
    }

    fn decide_damage(&mut self, actor_id: Entity, ctx: &mut DecisionContext) -> Option<AbilityDecision> {
        let world = ctx.world;
        let actor = world.combatant(actor_id)?;
        let catalog = ctx.catalog(actor, true);

        self.target = ctx.maintain_target(actor, self.target);
        let target_id = self.target?;
        let target = world.combatant(target_id)?;
        let aim = CastTarget::Entity(target_id);

        if target.health.fraction() < ctx.config.finisher_threshold {
            if let Some(decision) = choose(ctx, actor, &catalog, AbilityCategory::Finisher, aim, DecisionTier::Opportunity) {
                return Some(decision);
            }
        }

        let clustered = count_within(
            world,
            target.position,
            ctx.config.crowd_radius,
            TargetFilter::Hostile(actor.faction),
        );
        if clustered >= ctx.config.aoe_threshold {
            if let Some(decision) =
                choose(ctx, actor, &catalog, AbilityCategory::AoeDamage, aim, DecisionTier::CrowdResponse)
            {
                return Some(decision);
            }
        }

        choose(ctx, actor, &catalog, AbilityCategory::StandardDamage, aim, DecisionTier::Rotation)
    }
}

impl AbilitySelector for CompanionSelector {
    fn decide(&mut self, actor_id: Entity, ctx: &mut DecisionContext) -> Vec<AbilityDecision> {
        let Some(role) = ctx.world.combatant(actor_id).map(|c| c.role) else {
            return Vec::new();
        };

        if role == Role::Support {
            if let Some(decision) = self.decide_heal(actor_id, ctx) {
                return vec![decision];
            }
        }

        self.decide_damage(actor_id, ctx).into_iter().collect()
    }

    fn reset_engagement(&mut self) {
        self.target = None;
    }

    fn current_target(&self) -> Option<Entity> {
        self.target
    }
}
