//! Resolution context.
//!
//! Collaborators are passed explicitly instead of reached through globals:
//! every resolution step borrows the battlefield, the notifier, the random
//! source and the status library through one `Resolver`.

use bevy::prelude::*;

use super::events::{CombatEvent, CombatNotifier};
use super::faction::Faction;
use super::rng::RandomSource;
use super::stats::{Stat, StatBlock};
use super::status::StatusLibrary;
use super::tasks::CombatTask;
use super::world::Battlefield;

/// Borrowed collaborators for one resolution step.
pub struct Resolver<'a> {
    pub world: &'a mut dyn Battlefield,
    pub events: &'a mut dyn CombatNotifier,
    pub rng: &'a mut dyn RandomSource,
    pub statuses: &'a StatusLibrary,
    /// Tasks started during this step; the engine moves them into its scheduler
    pub spawned: &'a mut Vec<CombatTask>,
}

impl<'a> Resolver<'a> {
    pub fn notify(&mut self, event: CombatEvent) {
        self.events.notify(&event);
    }
}

/// Caster data captured before an effect mutates the world.
///
/// Effects read the caster's stats while writing to the target, which may be
/// the caster itself, so the stats are copied out first.
#[derive(Clone, Debug)]
pub struct CasterSnapshot {
    /// None when the caster no longer exists (a lingering DoT)
    pub id: Option<Entity>,
    pub faction: Faction,
    pub stats: StatBlock,
}

impl CasterSnapshot {
    pub fn capture(world: &dyn Battlefield, id: Entity) -> Option<Self> {
        let caster = world.combatant(id)?;
        Some(Self {
            id: Some(id),
            faction: caster.faction,
            stats: caster.stats.clone().unwrap_or_default(),
        })
    }

    /// Snapshot for an effect whose caster is gone; keeps attribution only.
    pub fn detached(id: Option<Entity>, faction: Faction) -> Self {
        Self {
            id,
            faction,
            stats: StatBlock::default(),
        }
    }

    pub fn stat(&self, stat: Stat) -> f32 {
        self.stats.get(stat)
    }
}
