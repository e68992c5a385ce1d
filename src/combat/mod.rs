//! Combat system
//!
//! Implements the decision-and-resolution core:
//! - Faction verdicts and target acquisition
//! - Abilities, their delivery, and contact resolution
//! - Effects (damage, healing, resource restore, statuses, sequences)
//! - Timed status effects with stat modifiers
//! - Autonomous ability selectors and the cooperative task scheduler
//! - Combat logging

pub mod ability;
pub mod combatant;
pub mod config;
pub mod constants;
pub mod context;
pub mod delivery;
pub mod effects;
pub mod engine;
pub mod events;
pub mod faction;
pub mod log;
pub mod rng;
pub mod selector;
pub mod stats;
pub mod status;
pub mod targeting;
pub mod tasks;
pub mod world;

pub use ability::{Ability, AbilityCategory, AbilityId, AbilityLibrary, DeliveryKind};
pub use combatant::{Combatant, Role};
pub use delivery::{CastRejected, CastTarget};
pub use effects::{DamageType, Effect};
pub use engine::{Brain, CombatEngine};
pub use events::{CombatEvent, CombatNotifier};
pub use faction::{is_ally, Faction};
pub use status::{StatusEffect, StatusId, StatusLibrary};
pub use world::Battlefield;
