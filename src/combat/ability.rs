//! Data-Driven Ability Definitions
//!
//! Abilities are immutable reference data loaded from `assets/config/abilities.ron`.
//! Many combatants share one definition through `Arc<Ability>`; nothing in the
//! core mutates a definition at runtime. Cooldowns and costs live on the caster.
//!
//! ## Usage
//! ```ignore
//! let statuses = load_status_library("assets/config/status_effects.ron")?;
//! let abilities = load_ability_library("assets/config/abilities.ron", &statuses)?;
//! let bite = abilities.get(&AbilityId::from("bite")).unwrap();
//! println!("{}", bite.describe());
//! ```

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::effects::Effect;
use super::status::StatusLibrary;

/// Identity of an ability definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbilityId(pub String);

impl From<&str> for AbilityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for AbilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What an ability is for. Selectors pick candidates by category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityCategory {
    StandardDamage,
    /// Execute-style attack used on low-health targets
    Finisher,
    AoeDamage,
    SingleHeal,
    AoeHeal,
    /// Fired unconditionally every decision tick by static defenses
    PassiveAura,
    /// Aimed independently at the nearest enemy by static defenses
    AutoTurret,
    /// Self-targeted survival cooldown
    DefensiveBuff,
    AllyBuff,
    Control,
    /// Only ever issued by the host (e.g. called in from the supply wagon)
    WagonCallable,
}

/// How an ability's effects reach the world.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum DeliveryKind {
    /// Instant contact volume at the target
    Melee,
    /// Traveling missile; effects resolve on arrival
    Projectile { speed: f32 },
    /// Channel that re-resolves every `tick_interval` while constraints hold
    Beam {
        tick_interval: f32,
        #[serde(default)]
        drain_per_tick: f32,
        max_duration: f32,
    },
    /// Area placed at a point (ground-targeted)
    GroundPlacement,
    /// Resolves on the caster (area around the caster when `area_radius > 0`)
    SelfCast,
    /// Caster travels to the target, then strikes
    Leap { speed: f32 },
    Charge { speed: f32 },
    /// Caster appears at the target instantly, then strikes
    Teleport,
}

impl DeliveryKind {
    pub fn name(&self) -> &'static str {
        match self {
            DeliveryKind::Melee => "melee",
            DeliveryKind::Projectile { .. } => "projectile",
            DeliveryKind::Beam { .. } => "beam",
            DeliveryKind::GroundPlacement => "ground",
            DeliveryKind::SelfCast => "self",
            DeliveryKind::Leap { .. } => "leap",
            DeliveryKind::Charge { .. } => "charge",
            DeliveryKind::Teleport => "teleport",
        }
    }

    /// Abilities delivered this way never need a target entity.
    pub fn is_self_delivered(&self) -> bool {
        matches!(self, DeliveryKind::SelfCast)
    }
}

/// Immutable ability definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ability {
    pub id: AbilityId,
    /// Display name of the ability
    pub name: String,
    pub category: AbilityCategory,
    /// Higher wins inside one selection pool
    #[serde(default)]
    pub priority: i32,
    /// Resource cost (mana, energy, ...)
    #[serde(default)]
    pub cost: f32,
    /// Cooldown after use in seconds
    #[serde(default)]
    pub cooldown: f32,
    /// Maximum range in units
    #[serde(default)]
    pub range: f32,
    /// 0 = single target
    #[serde(default)]
    pub area_radius: f32,
    pub delivery: DeliveryKind,
    /// Applied to struck entities allied with the caster
    #[serde(default)]
    pub friendly: Vec<Effect>,
    /// Applied to struck entities hostile to the caster
    #[serde(default)]
    pub hostile: Vec<Effect>,
}

impl Ability {
    pub fn is_area(&self) -> bool {
        self.area_radius > 0.0
    }

    /// Select the effect list for a struck entity given the faction verdict.
    pub fn effects_for(&self, allied: bool) -> &[Effect] {
        if allied {
            &self.friendly
        } else {
            &self.hostile
        }
    }

    /// Human-readable tooltip. Pure data export.
    pub fn describe(&self) -> String {
        let mut lines = vec![format!(
            "{} ({:?}, {}, range {:.0})",
            self.name,
            self.category,
            self.delivery.name(),
            self.range
        )];
        if self.cost > 0.0 || self.cooldown > 0.0 {
            lines.push(format!("Cost {:.0}, cooldown {:.1}s", self.cost, self.cooldown));
        }
        if self.is_area() {
            lines.push(format!("Radius {:.1}", self.area_radius));
        }
        for effect in &self.hostile {
            lines.push(format!("Enemies: {}", effect.describe()));
        }
        for effect in &self.friendly {
            lines.push(format!("Allies: {}", effect.describe()));
        }
        lines.join("\n")
    }
}

/// Root structure for the abilities.ron file
#[derive(Debug, Serialize, Deserialize)]
pub struct AbilitiesConfig {
    pub abilities: Vec<Ability>,
}

/// All ability definitions, shared by every combatant that knows them.
#[derive(Clone, Debug, Default)]
pub struct AbilityLibrary {
    definitions: HashMap<AbilityId, Arc<Ability>>,
}

impl AbilityLibrary {
    pub fn new(abilities: Vec<Ability>) -> Self {
        let mut library = Self::default();
        for ability in abilities {
            library.insert(ability);
        }
        library
    }

    pub fn insert(&mut self, ability: Ability) {
        self.definitions.insert(ability.id.clone(), Arc::new(ability));
    }

    /// Get the definition for an ability id
    pub fn get(&self, id: &AbilityId) -> Option<&Arc<Ability>> {
        self.definitions.get(id)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Get all ability ids that are defined
    pub fn ids(&self) -> impl Iterator<Item = &AbilityId> {
        self.definitions.keys()
    }

    /// Check that every status referenced by an ApplyStatus effect exists.
    ///
    /// Returns the list of `(ability, status)` pairs that don't resolve.
    pub fn validate(&self, statuses: &StatusLibrary) -> Result<(), Vec<(AbilityId, String)>> {
        let mut missing = Vec::new();
        let mut ids: Vec<&AbilityId> = self.definitions.keys().collect();
        ids.sort();
        for id in ids {
            let ability = &self.definitions[id];
            let mut referenced = Vec::new();
            for effect in ability.friendly.iter().chain(ability.hostile.iter()) {
                effect.collect_status_refs(&mut referenced);
            }
            for status in referenced {
                if statuses.get(&status).is_none() {
                    missing.push((id.clone(), status.0));
                }
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }
}

/// Parse ability definitions from RON text.
pub fn parse_ability_library(contents: &str) -> Result<AbilityLibrary, String> {
    let config: AbilitiesConfig =
        ron::from_str(contents).map_err(|e| format!("Failed to parse abilities: {}", e))?;

    for ability in &config.abilities {
        if ability.range < 0.0 || ability.cost < 0.0 || ability.cooldown < 0.0 {
            return Err(format!(
                "Ability '{}' has a negative range, cost or cooldown",
                ability.id
            ));
        }
    }

    Ok(AbilityLibrary::new(config.abilities))
}

/// Load ability definitions from a RON file and validate status references.
pub fn load_ability_library(path: &str, statuses: &StatusLibrary) -> Result<AbilityLibrary, String> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path, e))?;

    let library = parse_ability_library(&contents).map_err(|e| format!("{} ({})", e, path))?;

    library.validate(statuses).map_err(|missing| {
        format!("Abilities reference unknown status effects: {:?}", missing)
    })?;

    info!("Loaded {} ability definitions from {}", library.len(), path);

    Ok(library)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::effects::DamageType;

    fn strike() -> Ability {
        Ability {
            id: AbilityId::from("strike"),
            name: "Strike".to_string(),
            category: AbilityCategory::StandardDamage,
            priority: 1,
            cost: 0.0,
            cooldown: 1.5,
            range: 2.5,
            area_radius: 0.0,
            delivery: DeliveryKind::Melee,
            friendly: vec![],
            hostile: vec![Effect::damage(12.0, DamageType::Physical)],
        }
    }

    #[test]
    fn test_effects_for_picks_list_by_verdict() {
        let ability = strike();
        assert!(ability.effects_for(true).is_empty());
        assert_eq!(ability.effects_for(false).len(), 1);
    }

    #[test]
    fn test_parse_minimal_library() {
        let text = r#"(
            abilities: [
                (
                    id: "bite",
                    name: "Bite",
                    category: StandardDamage,
                    priority: 2,
                    range: 2.0,
                    delivery: Melee,
                    hostile: [Damage(amount: 8.0, damage_type: Physical)],
                ),
            ],
        )"#;
        let library = parse_ability_library(text).expect("library should parse");
        let bite = library.get(&AbilityId::from("bite")).expect("bite defined");
        assert_eq!(bite.priority, 2);
        assert!(!bite.is_area());
    }

    #[test]
    fn test_negative_cooldown_is_rejected() {
        let text = r#"(abilities: [(id: "x", name: "X", category: Control, cooldown: -1.0, delivery: SelfCast)])"#;
        assert!(parse_ability_library(text).is_err());
    }
}
