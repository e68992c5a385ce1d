//! Target Acquisition
//!
//! Scores candidates inside a radius by distance, filters them by faction,
//! alive-ness and line of sight, and boosts high-value tagged entities.
//! Ties keep the first candidate the spatial query returned.

use bevy::prelude::*;
use std::collections::HashSet;

use super::faction::{is_ally, Faction};
use super::world::{Battlefield, Layers};

/// Which side a candidate must be on relative to `Faction`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetFilter {
    Hostile(Faction),
    Allied(Faction),
    Any,
}

impl TargetFilter {
    pub fn accepts(&self, faction: Faction) -> bool {
        match self {
            TargetFilter::Hostile(own) => !is_ally(*own, faction),
            TargetFilter::Allied(own) => is_ally(*own, faction),
            TargetFilter::Any => true,
        }
    }
}

/// Parameters for one target search.
#[derive(Clone, Debug)]
pub struct TargetQuery {
    pub origin: Vec3,
    /// Where sight lines start (usually the searcher's eye point)
    pub sight_origin: Vec3,
    pub radius: f32,
    pub filter: TargetFilter,
    pub require_los: bool,
    /// Skip downed candidates
    pub exclude_downed: bool,
    /// Candidates carrying this tag get their score multiplied
    pub priority_tag: Option<String>,
    pub priority_multiplier: f32,
    /// Never returned (the searcher itself)
    pub ignore: Option<Entity>,
}

impl TargetQuery {
    pub fn new(origin: Vec3, radius: f32, filter: TargetFilter) -> Self {
        Self {
            origin,
            sight_origin: origin + Vec3::Y,
            radius,
            filter,
            require_los: false,
            exclude_downed: true,
            priority_tag: None,
            priority_multiplier: 1.0,
            ignore: None,
        }
    }

    pub fn with_line_of_sight(mut self) -> Self {
        self.require_los = true;
        self
    }

    pub fn with_priority_tag(mut self, tag: impl Into<String>, multiplier: f32) -> Self {
        self.priority_tag = Some(tag.into());
        self.priority_multiplier = multiplier;
        self
    }

    pub fn ignoring(mut self, entity: Entity) -> Self {
        self.ignore = Some(entity);
        self
    }

    pub fn including_downed(mut self) -> Self {
        self.exclude_downed = false;
        self
    }
}

/// Base score of a candidate at `distance`.
pub fn distance_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

/// Whether the segment from `from` to the candidate is clear.
///
/// A hit on the candidate itself (any of its colliders) does not block.
pub fn has_line_of_sight(world: &dyn Battlefield, from: Vec3, candidate: Entity, ignore: Option<Entity>) -> bool {
    let Some(target) = world.combatant(candidate) else {
        return false;
    };
    let to = target.position + Vec3::Y;
    match world.raycast(from, to, Layers::TERRAIN | Layers::COMBATANTS, ignore) {
        None => true,
        Some(hit) => hit.owner == Some(candidate),
    }
}

/// Score every candidate and return the strictly best one.
pub fn find_best_target(world: &dyn Battlefield, query: &TargetQuery) -> Option<Entity> {
    let hits = world.contacts_within(query.origin, query.radius, Layers::COMBATANTS);

    let mut seen = HashSet::new();
    let mut best: Option<(Entity, f32)> = None;

    for hit in hits {
        if !seen.insert(hit.entity) || Some(hit.entity) == query.ignore {
            continue;
        }
        let Some(candidate) = world.combatant(hit.entity) else {
            continue;
        };
        if !query.filter.accepts(candidate.faction) {
            continue;
        }
        if !candidate.is_alive() && (query.exclude_downed || !candidate.health.downed) {
            continue;
        }
        if query.require_los && !has_line_of_sight(world, query.sight_origin, hit.entity, query.ignore) {
            continue;
        }

        let distance = candidate.distance_to(query.origin);
        let mut score = distance_score(distance);
        if let Some(tag) = &query.priority_tag {
            if candidate.has_tag(tag) {
                score *= query.priority_multiplier;
            }
        }

        if best.map_or(true, |(_, top)| score > top) {
            best = Some((hit.entity, score));
        }
    }

    best.map(|(entity, _)| entity)
}

/// Living combatants near `center` accepted by `filter`, each counted once.
pub fn count_within(world: &dyn Battlefield, center: Vec3, radius: f32, filter: TargetFilter) -> usize {
    let mut seen = HashSet::new();
    world
        .contacts_within(center, radius, Layers::COMBATANTS)
        .into_iter()
        .filter(|hit| seen.insert(hit.entity))
        .filter_map(|hit| world.combatant(hit.entity))
        .filter(|c| c.is_alive() && filter.accepts(c.faction))
        .count()
}
