//! JSON configuration parsing for headless mode
//!
//! Parses a JSON skirmish scenario and builds the arena and engine actors
//! from it.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::combat::ability::{AbilityId, AbilityLibrary};
use crate::combat::combatant::{Combatant, ResourcePool, Role};
use crate::combat::config::SelectorConfig;
use crate::combat::faction::Faction;
use crate::combat::selector::{CompanionSelector, CreatureSelector, DefenseSelector, RangeBand};
use crate::combat::stats::{Stat, StatBlock};
use crate::combat::Brain;

/// Which selector drives a combatant. `None` means host-controlled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrainKind {
    Creature,
    Companion,
    Defense,
    #[default]
    None,
}

/// Opener or pursuit list with the distance band it applies in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandedAbilities {
    pub abilities: Vec<String>,
    pub min: f32,
    pub max: f32,
}

/// One combatant in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatantConfig {
    pub name: String,
    pub faction: u8,
    #[serde(default)]
    pub brain: BrainKind,
    #[serde(default)]
    pub position: [f32; 3],
    pub max_health: f32,
    /// Resource pool capacity (omit for combatants without a pool)
    #[serde(default)]
    pub resource: Option<f32>,
    /// Base stats; omit entirely for a combatant without a stat block
    #[serde(default)]
    pub stats: Option<HashMap<Stat, f32>>,
    #[serde(default)]
    pub abilities: Vec<String>,
    #[serde(default)]
    pub default_attack: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Contact volumes exposed to area queries (default: 1)
    #[serde(default = "default_volumes")]
    pub volumes: u8,
    #[serde(default)]
    pub blocks_sight: bool,
    /// Whether this combatant can carry statuses (default: true)
    #[serde(default = "default_true")]
    pub has_status_holder: bool,
    #[serde(default)]
    pub opener: Option<BandedAbilities>,
    #[serde(default)]
    pub pursuit: Option<BandedAbilities>,
}

/// A sight-blocking obstacle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObstacleConfig {
    pub position: [f32; 3],
    pub radius: f32,
}

/// Headless skirmish configuration loaded from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Scenario name used in the summary (default: "skirmish")
    #[serde(default = "default_name")]
    pub name: String,
    pub combatants: Vec<CombatantConfig>,
    #[serde(default)]
    pub obstacles: Vec<ObstacleConfig>,
    /// Maximum skirmish duration in seconds (default: 120)
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: f32,
    /// Random seed for deterministic reproduction
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Custom output path for the skirmish summary (optional)
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default = "default_abilities_path")]
    pub abilities_path: String,
    #[serde(default = "default_statuses_path")]
    pub statuses_path: String,
    /// Selector tuning; defaults apply when omitted
    #[serde(default)]
    pub selector: Option<SelectorConfig>,
}

fn default_name() -> String {
    "skirmish".to_string()
}

fn default_max_duration() -> f32 {
    120.0
}

fn default_abilities_path() -> String {
    "assets/config/abilities.ron".to_string()
}

fn default_statuses_path() -> String {
    "assets/config/status_effects.ron".to_string()
}

fn default_volumes() -> u8 {
    1
}

fn default_true() -> bool {
    true
}

impl ScenarioConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config = Self::from_json(&contents)?;
        Ok(config)
    }

    /// Parse and validate configuration from JSON text
    pub fn from_json(contents: &str) -> Result<Self, String> {
        let config: ScenarioConfig = serde_json::from_str(contents)
            .map_err(|e| format!("Failed to parse JSON: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.combatants.is_empty() {
            return Err("combatants must not be empty".to_string());
        }

        let factions: HashSet<u8> = self.combatants.iter().map(|c| c.faction).collect();
        if factions.len() < 2 {
            return Err("a skirmish needs at least two factions".to_string());
        }

        let mut names = HashSet::new();
        for combatant in &self.combatants {
            if !names.insert(combatant.name.as_str()) {
                return Err(format!("Duplicate combatant name: '{}'", combatant.name));
            }
            if combatant.max_health <= 0.0 {
                return Err(format!("'{}' must have positive max_health", combatant.name));
            }
            if combatant.resource.is_some_and(|r| r < 0.0) {
                return Err(format!("'{}' has a negative resource pool", combatant.name));
            }
            if combatant.volumes == 0 {
                return Err(format!("'{}' must expose at least one volume", combatant.name));
            }
            for band in [&combatant.opener, &combatant.pursuit].into_iter().flatten() {
                if band.min < 0.0 || band.max < band.min {
                    return Err(format!(
                        "'{}' has an invalid range band {}..{}",
                        combatant.name, band.min, band.max
                    ));
                }
                if combatant.brain != BrainKind::Creature {
                    return Err(format!(
                        "'{}' declares opener/pursuit lists but is not a Creature",
                        combatant.name
                    ));
                }
            }
        }

        for obstacle in &self.obstacles {
            if obstacle.radius <= 0.0 {
                return Err("obstacle radius must be positive".to_string());
            }
        }

        if self.max_duration_secs <= 0.0 {
            return Err("max_duration_secs must be positive".to_string());
        }

        if let Some(selector) = &self.selector {
            selector.validate()?;
        }

        Ok(())
    }

    /// Check every ability a combatant references against the loaded library.
    pub fn validate_abilities(&self, library: &AbilityLibrary) -> Result<(), String> {
        for combatant in &self.combatants {
            let banded = [&combatant.opener, &combatant.pursuit]
                .into_iter()
                .flatten()
                .flat_map(|b| b.abilities.iter());
            for id in combatant
                .abilities
                .iter()
                .chain(combatant.default_attack.iter())
                .chain(banded)
            {
                if library.get(&AbilityId::from(id.as_str())).is_none() {
                    return Err(format!(
                        "'{}' references unknown ability '{}'",
                        combatant.name, id
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn selector_config(&self) -> SelectorConfig {
        self.selector.clone().unwrap_or_default()
    }
}

impl CombatantConfig {
    /// Build the combatant record.
    pub fn to_combatant(&self, id: Entity) -> Combatant {
        let mut combatant = Combatant::new(id, self.name.clone(), Faction(self.faction), self.max_health)
            .at(Vec3::from_array(self.position))
            .with_role(self.role);
        combatant.resource = self.resource.map(ResourcePool::new);
        combatant.stats = self.stats.as_ref().map(|values| {
            let mut base: Vec<(Stat, f32)> = values.iter().map(|(s, v)| (*s, *v)).collect();
            base.sort_by_key(|(s, _)| *s as usize);
            StatBlock::from_base(&base)
        });
        combatant.abilities = self.abilities.iter().map(|a| AbilityId::from(a.as_str())).collect();
        combatant.default_attack = self.default_attack.as_deref().map(AbilityId::from);
        combatant.tags = self.tags.iter().cloned().collect();
        combatant.volumes = self.volumes;
        combatant.blocks_sight = self.blocks_sight;
        if !self.has_status_holder {
            combatant.statuses = None;
        }
        combatant
    }

    /// Build the decision logic, if this combatant is autonomous.
    pub fn to_brain(&self) -> Option<Brain> {
        match self.brain {
            BrainKind::Creature => {
                let mut selector = CreatureSelector::new();
                if let Some(opener) = &self.opener {
                    selector.opener = opener.abilities.iter().map(|a| AbilityId::from(a.as_str())).collect();
                    selector.opener_range = Some(RangeBand::new(opener.min, opener.max));
                }
                if let Some(pursuit) = &self.pursuit {
                    selector.pursuit = pursuit.abilities.iter().map(|a| AbilityId::from(a.as_str())).collect();
                    selector.pursuit_range = Some(RangeBand::new(pursuit.min, pursuit.max));
                }
                Some(Brain::Creature(selector))
            }
            BrainKind::Companion => Some(Brain::Companion(CompanionSelector::new())),
            BrainKind::Defense => Some(Brain::Defense(DefenseSelector::new())),
            BrainKind::None => None,
        }
    }
}
