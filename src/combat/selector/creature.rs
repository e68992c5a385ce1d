//! Hostile creature selector
//!
//! Priority tree, first match wins:
//! 1. Survival: low own health → DefensiveBuff on self
//! 2. Opportunity: low target health → Finisher
//! 3. Crowd response: enough enemies clustered near the target → AoeDamage
//! 4. Opener band: unused opener list while at opener distance
//! 5. Pursuit band: pursuit list while at pursuit distance
//! 6. Fallback: any usable StandardDamage from the full catalog

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{choose, AbilityDecision, AbilitySelector, DecisionContext, DecisionTier};
use crate::combat::ability::{Ability, AbilityCategory, AbilityId};
use crate::combat::delivery::CastTarget;
use crate::combat::targeting::{count_within, TargetFilter};

/// Inclusive distance band.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeBand {
    pub min: f32,
    pub max: f32,
}

impl RangeBand {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, distance: f32) -> bool {
        distance >= self.min && distance <= self.max
    }
}

#[derive(Clone, Debug, Default)]
pub struct CreatureSelector {
    /// Abilities tried once per engagement when at opener distance
    pub opener: Vec<AbilityId>,
    pub opener_range: Option<RangeBand>,
    /// Abilities preferred while closing distance
    pub pursuit: Vec<AbilityId>,
    pub pursuit_range: Option<RangeBand>,
    opener_used: bool,
    target: Option<Entity>,
}

impl CreatureSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_opener(mut self, abilities: &[&str], band: RangeBand) -> Self {
        self.opener = abilities.iter().map(|id| AbilityId::from(*id)).collect();
        self.opener_range = Some(band);
        self
    }

    pub fn with_pursuit(mut self, abilities: &[&str], band: RangeBand) -> Self {
        self.pursuit = abilities.iter().map(|id| AbilityId::from(*id)).collect();
        self.pursuit_range = Some(band);
        self
    }

    pub fn opener_used(&self) -> bool {
        self.opener_used
    }
}

/// Members of `catalog` whose ids are listed in `ids`.
fn subset(catalog: &[Arc<Ability>], ids: &[AbilityId]) -> Vec<Arc<Ability>> {
    catalog.iter().filter(|a| ids.contains(&a.id)).cloned().collect()
}

impl AbilitySelector for CreatureSelector {
    fn decide(&mut self, actor_id: Entity, ctx: &mut DecisionContext) -> Vec<AbilityDecision> {
        let world = ctx.world;
        let Some(actor) = world.combatant(actor_id) else {
            return Vec::new();
        };
        let catalog = ctx.catalog(actor, true);
        if catalog.is_empty() {
            return Vec::new();
        }

        // Survival needs no target
        if actor.health.fraction() < ctx.config.defensive_threshold {
            if let Some(decision) = choose(
                ctx,
                actor,
                &catalog,
                AbilityCategory::DefensiveBuff,
                CastTarget::SelfCast,
                DecisionTier::Survival,
            ) {
                return vec![decision];
            }
        }

        let target_id = ctx.maintain_target(actor, self.target);
        if target_id != self.target {
            // A new engagement starts whenever the target changes
            self.opener_used = false;
            self.target = target_id;
        }
        let Some(target_id) = target_id else {
            return Vec::new();
        };
        let Some(target) = world.combatant(target_id) else {
            return Vec::new();
        };
        let aim = CastTarget::Entity(target_id);

        if target.health.fraction() < ctx.config.finisher_threshold {
            if let Some(decision) = choose(ctx, actor, &catalog, AbilityCategory::Finisher, aim, DecisionTier::Opportunity) {
                return vec![decision];
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
                return vec![decision];
            }
        }

        let distance = actor.distance_to(target.position);

        if !self.opener_used && !self.opener.is_empty() && self.opener_range.is_some_and(|b| b.contains(distance)) {
            let pool = subset(&catalog, &self.opener);
            if let Some(decision) = choose(ctx, actor, &pool, AbilityCategory::StandardDamage, aim, DecisionTier::Opener) {
                return vec![decision];
            }
        }

        if !self.pursuit.is_empty() && self.pursuit_range.is_some_and(|b| b.contains(distance)) {
            let pool = subset(&catalog, &self.pursuit);
            if let Some(decision) = choose(ctx, actor, &pool, AbilityCategory::StandardDamage, aim, DecisionTier::Pursuit) {
                return vec![decision];
            }
        }

        choose(ctx, actor, &catalog, AbilityCategory::StandardDamage, aim, DecisionTier::Fallback)
            .into_iter()
            .collect()
    }

    fn record_executed(&mut self, decision: &AbilityDecision) {
        if decision.tier == DecisionTier::Opener {
            self.opener_used = true;
        }
    }

    fn reset_engagement(&mut self) {
        self.opener_used = false;
        self.target = None;
    }

    fn current_target(&self) -> Option<Entity> {
        self.target
    }
}
