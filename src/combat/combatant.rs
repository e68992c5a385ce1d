//! Combatant records.
//!
//! The host owns combatant records; the core borrows them through the
//! `Battlefield` trait for the duration of one decision or resolution step.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

use super::ability::AbilityId;
use super::constants::TIME_EPSILON;
use super::faction::Faction;
use super::stats::{Stat, StatBlock};
use super::status::StatusEffects;

/// Tag marking a high-value target (e.g. a siege objective).
pub const SIEGE_OBJECTIVE_TAG: &str = "siege_objective";

/// Health pool with a downed flag.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
    /// Set when health reaches 0; companions stay downed until revived
    pub downed: bool,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self {
            current: max,
            max,
            downed: false,
        }
    }

    /// Health as a fraction (0.0 to 1.0)
    pub fn fraction(&self) -> f32 {
        if self.max > 0.0 {
            self.current / self.max
        } else {
            0.0
        }
    }
}

/// Mana-like resource pool.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourcePool {
    pub current: f32,
    pub max: f32,
}

impl ResourcePool {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    /// Remaining capacity before the pool is full
    pub fn missing(&self) -> f32 {
        (self.max - self.current).max(0.0)
    }
}

/// Declared party role, used by the companion selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[default]
    Damage,
    Tank,
    Support,
}

/// A participant in combat: creature, companion or structure.
#[derive(Clone, Debug)]
pub struct Combatant {
    pub id: Entity,
    pub name: String,
    pub faction: Faction,
    /// World position (host-updated; leap/charge/teleport deliveries move it)
    pub position: Vec3,
    pub health: Health,
    pub resource: Option<ResourcePool>,
    pub stats: Option<StatBlock>,
    /// Known abilities in catalog order
    pub abilities: Vec<AbilityId>,
    /// Innate attack folded into the companion's StandardDamage pool
    pub default_attack: Option<AbilityId>,
    /// Remaining cooldown per ability in seconds
    pub cooldowns: HashMap<AbilityId, f32>,
    pub role: Role,
    pub tags: SmallVec<[String; 2]>,
    /// Current target entity (None if no valid target)
    pub target: Option<Entity>,
    /// Status holder; None on entities that cannot carry statuses
    pub statuses: Option<StatusEffects>,
    /// Number of contact volumes (colliders) this entity exposes to area queries
    pub volumes: u8,
    /// Whether this entity obstructs line of sight (walls, gates)
    pub blocks_sight: bool,
    /// Total damage this combatant has dealt
    pub damage_dealt: f32,
    /// Total damage this combatant has taken
    pub damage_taken: f32,
    /// Total healing this combatant has done
    pub healing_done: f32,
}

impl Combatant {
    /// Create a combatant with full health, no resource pool and an empty status holder.
    pub fn new(id: Entity, name: impl Into<String>, faction: Faction, max_health: f32) -> Self {
        Self {
            id,
            name: name.into(),
            faction,
            position: Vec3::ZERO,
            health: Health::new(max_health),
            resource: None,
            stats: None,
            abilities: Vec::new(),
            default_attack: None,
            cooldowns: HashMap::new(),
            role: Role::default(),
            tags: SmallVec::new(),
            target: None,
            statuses: Some(StatusEffects::default()),
            volumes: 1,
            blocks_sight: false,
            damage_dealt: 0.0,
            damage_taken: 0.0,
            healing_done: 0.0,
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_resource(mut self, max: f32) -> Self {
        self.resource = Some(ResourcePool::new(max));
        self
    }

    pub fn with_stats(mut self, stats: StatBlock) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_abilities(mut self, abilities: &[&str]) -> Self {
        self.abilities = abilities.iter().map(|id| AbilityId::from(*id)).collect();
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    /// Check if this combatant is alive and standing.
    pub fn is_alive(&self) -> bool {
        self.health.current > 0.0 && !self.health.downed
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Read a stat, 0 when the entity has no stat block.
    pub fn stat(&self, stat: Stat) -> f32 {
        self.stats.as_ref().map(|s| s.get(stat)).unwrap_or(0.0)
    }

    pub fn distance_to(&self, point: Vec3) -> f32 {
        self.position.distance(point)
    }

    /// Remaining cooldown for an ability (0 when ready).
    pub fn cooldown_remaining(&self, ability: &AbilityId) -> f32 {
        self.cooldowns.get(ability).copied().unwrap_or(0.0)
    }

    pub fn is_on_cooldown(&self, ability: &AbilityId) -> bool {
        self.cooldown_remaining(ability) > TIME_EPSILON
    }

    /// True when the resource pool covers `cost` (a cost of 0 never needs a pool).
    pub fn can_afford(&self, cost: f32) -> bool {
        if cost <= 0.0 {
            return true;
        }
        self.resource.map(|pool| pool.current >= cost).unwrap_or(false)
    }

    /// Tick down ability cooldowns, dropping finished ones.
    pub fn tick_cooldowns(&mut self, dt: f32) {
        for remaining in self.cooldowns.values_mut() {
            *remaining -= dt;
        }
        self.cooldowns.retain(|_, remaining| *remaining > TIME_EPSILON);
    }

    /// Apply raw health loss. Returns the health actually removed.
    pub fn take_damage(&mut self, amount: f32) -> f32 {
        let actual = amount.max(0.0).min(self.health.current);
        self.health.current -= actual;
        self.damage_taken += actual;
        if self.health.current <= 0.0 {
            self.health.current = 0.0;
            self.health.downed = true;
        }
        actual
    }

    /// Restore health up to max. Returns the health actually restored.
    pub fn restore_health(&mut self, amount: f32) -> f32 {
        let actual = amount.max(0.0).min((self.health.max - self.health.current).max(0.0));
        self.health.current += actual;
        actual
    }

    /// Known-ability catalog and running cooldowns for persistence.
    pub fn catalog(&self) -> AbilityCatalog {
        AbilityCatalog {
            abilities: self.abilities.clone(),
            default_attack: self.default_attack.clone(),
            cooldowns: self.cooldowns.clone(),
        }
    }

    /// Replace the catalog. Cooldowns that are already over (or not finite) are dropped.
    pub fn set_catalog(&mut self, catalog: AbilityCatalog) {
        self.abilities = catalog.abilities;
        self.default_attack = catalog.default_attack;
        self.cooldowns = catalog.cooldowns;
        self.cooldowns
            .retain(|_, remaining| remaining.is_finite() && *remaining > TIME_EPSILON);
    }

    /// Validate that combatant invariants hold. Panics in debug builds only.
    #[inline]
    pub fn debug_validate(&self) {
        debug_assert!(
            self.health.current >= 0.0 && self.health.current <= self.health.max,
            "{} health {} outside 0..={}",
            self.name,
            self.health.current,
            self.health.max
        );
        if let Some(pool) = self.resource {
            debug_assert!(
                pool.current >= 0.0 && pool.current <= pool.max,
                "{} resource {} outside 0..={}",
                self.name,
                pool.current,
                pool.max
            );
        }
    }
}

/// Serializable known-ability catalog.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilityCatalog {
    pub abilities: Vec<AbilityId>,
    #[serde(default)]
    pub default_attack: Option<AbilityId>,
    /// Seconds left per ability still cooling down
    #[serde(default)]
    pub cooldowns: HashMap<AbilityId, f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy() -> Combatant {
        Combatant::new(Entity::from_raw(1), "Dummy", Faction::HORDE, 100.0).with_resource(50.0)
    }

    #[test]
    fn test_damage_to_zero_downs() {
        let mut c = dummy();
        assert_eq!(c.take_damage(150.0), 100.0);
        assert!(c.health.downed);
        assert!(!c.is_alive());
    }

    #[test]
    fn test_restore_clamps_to_missing() {
        let mut c = dummy();
        c.take_damage(30.0);
        assert_eq!(c.restore_health(50.0), 30.0);
        assert_eq!(c.health.current, 100.0);
    }

    #[test]
    fn test_cooldowns_expire() {
        let mut c = dummy();
        let id = AbilityId::from("bite");
        c.cooldowns.insert(id.clone(), 1.0);
        assert!(c.is_on_cooldown(&id));
        for _ in 0..10 {
            c.tick_cooldowns(0.1);
        }
        assert!(!c.is_on_cooldown(&id));
        assert!(c.cooldowns.is_empty());
    }

    #[test]
    fn test_zero_cost_needs_no_pool() {
        let c = Combatant::new(Entity::from_raw(2), "Wall", Faction::PARTY, 500.0);
        assert!(c.can_afford(0.0));
        assert!(!c.can_afford(1.0));
    }

    #[test]
    fn test_catalog_survives_persistence() {
        let mut c = dummy().with_abilities(&["bite", "howl"]);
        c.default_attack = Some(AbilityId::from("claw"));
        c.cooldowns.insert(AbilityId::from("howl"), 4.5);

        let json = serde_json::to_string(&c.catalog()).expect("serialize json");
        let from_json: AbilityCatalog = serde_json::from_str(&json).expect("deserialize json");
        let text = ron::to_string(&c.catalog()).expect("serialize ron");
        let from_ron: AbilityCatalog = ron::from_str(&text).expect("deserialize ron");
        assert_eq!(from_json, c.catalog());
        assert_eq!(from_ron, c.catalog());

        let mut copy = Combatant::new(Entity::from_raw(9), "Copy", Faction::HORDE, 100.0);
        copy.set_catalog(from_json);
        assert_eq!(copy.abilities, vec![AbilityId::from("bite"), AbilityId::from("howl")]);
        assert_eq!(copy.default_attack, Some(AbilityId::from("claw")));
        assert!(copy.is_on_cooldown(&AbilityId::from("howl")));
        assert_eq!(copy.cooldown_remaining(&AbilityId::from("howl")), 4.5);
        assert!(!copy.is_on_cooldown(&AbilityId::from("bite")));
    }

    #[test]
    fn test_set_catalog_drops_finished_cooldowns() {
        let mut catalog = AbilityCatalog {
            abilities: vec![AbilityId::from("bite")],
            ..Default::default()
        };
        catalog.cooldowns.insert(AbilityId::from("bite"), 0.0);
        catalog.cooldowns.insert(AbilityId::from("howl"), f32::NAN);

        let mut c = dummy();
        c.set_catalog(catalog);
        assert!(c.cooldowns.is_empty());
        assert!(c.default_attack.is_none());
    }
}
