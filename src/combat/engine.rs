//! Combat engine
//!
//! Owns the shared content (ability and status libraries), the selector
//! tuning, the random source, the registered autonomous actors and the task
//! scheduler. The host passes its battlefield and notifier into every call.
//!
//! One `step` runs, in order:
//! 1. cooldown countdown
//! 2. status effect advance (ticks, expiry)
//! 3. scheduled tasks (sequences, beams, traveling deliveries)
//! 4. autonomous decisions for every actor whose cadence is due and who is
//!    not paused by a task it owns

use bevy::prelude::*;

use super::ability::{AbilityCategory, AbilityId, AbilityLibrary};
use super::config::{DecisionCadence, SelectorConfig};
use super::context::Resolver;
use super::delivery::{execute_ability, CastRejected, CastTarget};
use super::events::CombatNotifier;
use super::rng::{GameRng, RandomSource};
use super::selector::{
    AbilitySelector, CompanionSelector, CreatureSelector, DecisionContext, DefenseSelector,
};
use super::status::{self, StatusId, StatusLibrary, StatusSnapshot};
use super::tasks::{CombatTask, Scheduler};
use super::world::Battlefield;

/// Decision logic attached to an autonomous actor.
#[derive(Clone, Debug)]
pub enum Brain {
    Creature(CreatureSelector),
    Companion(CompanionSelector),
    Defense(DefenseSelector),
}

impl Brain {
    pub fn selector(&self) -> &dyn AbilitySelector {
        match self {
            Brain::Creature(s) => s,
            Brain::Companion(s) => s,
            Brain::Defense(s) => s,
        }
    }

    pub fn selector_mut(&mut self) -> &mut dyn AbilitySelector {
        match self {
            Brain::Creature(s) => s,
            Brain::Companion(s) => s,
            Brain::Defense(s) => s,
        }
    }
}

#[derive(Clone, Debug)]
struct Actor {
    id: Entity,
    brain: Brain,
    cadence: DecisionCadence,
}

type SharedRng = Box<dyn RandomSource + Send + Sync>;

#[derive(Resource)]
pub struct CombatEngine {
    abilities: AbilityLibrary,
    statuses: StatusLibrary,
    config: SelectorConfig,
    rng: SharedRng,
    actors: Vec<Actor>,
    scheduler: Scheduler,
    elapsed: f32,
}

impl CombatEngine {
    pub fn new(
        abilities: AbilityLibrary,
        statuses: StatusLibrary,
        config: SelectorConfig,
        rng: impl RandomSource + Send + Sync + 'static,
    ) -> Self {
        Self {
            abilities,
            statuses,
            config,
            rng: Box::new(rng),
            actors: Vec::new(),
            scheduler: Scheduler::default(),
            elapsed: 0.0,
        }
    }

    /// Engine with an entropy-seeded (or fixed-seed) `GameRng`.
    pub fn with_seed(abilities: AbilityLibrary, statuses: StatusLibrary, config: SelectorConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => GameRng::from_seed(seed),
            None => GameRng::from_entropy(),
        };
        Self::new(abilities, statuses, config, rng)
    }

    pub fn abilities(&self) -> &AbilityLibrary {
        &self.abilities
    }

    pub fn statuses(&self) -> &StatusLibrary {
        &self.statuses
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Simulation time accumulated by `step`.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Register an autonomous actor at the configured decision rate.
    pub fn register_actor(&mut self, id: Entity, brain: Brain) {
        let cadence = DecisionCadence::new(self.config.decision_hz);
        self.register_actor_with_cadence(id, brain, cadence);
    }

    pub fn register_actor_with_cadence(&mut self, id: Entity, brain: Brain, cadence: DecisionCadence) {
        self.actors.retain(|actor| actor.id != id);
        self.actors.push(Actor { id, brain, cadence });
    }

    pub fn brain(&self, id: Entity) -> Option<&Brain> {
        self.actors.iter().find(|a| a.id == id).map(|a| &a.brain)
    }

    /// True while `entity` owns a task that suspends its decisions.
    pub fn is_paused(&self, entity: Entity) -> bool {
        self.scheduler.is_paused(entity)
    }

    /// Stop every task owned by `entity` on the next step.
    pub fn cancel_tasks(&mut self, entity: Entity) {
        self.scheduler.cancel(entity);
    }

    fn adopt(&mut self, spawned: &mut Vec<CombatTask>) {
        for task in spawned.drain(..) {
            self.scheduler.spawn(task);
        }
    }

    /// Advance the simulation by `dt` seconds.
    pub fn step(&mut self, world: &mut dyn Battlefield, events: &mut dyn CombatNotifier, dt: f32) {
        self.elapsed += dt;

        for id in world.combatant_ids() {
            if let Some(combatant) = world.combatant_mut(id) {
                combatant.tick_cooldowns(dt);
            }
        }

        let mut spawned = Vec::new();
        {
            let mut ctx = Resolver {
                world: &mut *world,
                events: &mut *events,
                rng: &mut *self.rng,
                statuses: &self.statuses,
                spawned: &mut spawned,
            };
            status::advance_statuses(&mut ctx, dt);
            self.scheduler.run(&mut ctx, dt);
        }
        self.adopt(&mut spawned);

        for actor in self.actors.iter_mut() {
            if !actor.cadence.tick(dt) {
                continue;
            }
            if !world.is_alive(actor.id) {
                actor.brain.selector_mut().reset_engagement();
                continue;
            }
            if self.scheduler.is_paused(actor.id) {
                continue;
            }

            let decisions = {
                let mut decision_ctx = DecisionContext {
                    world: &*world,
                    abilities: &self.abilities,
                    config: &self.config,
                    rng: &mut *self.rng,
                };
                actor.brain.selector_mut().decide(actor.id, &mut decision_ctx)
            };

            for decision in decisions {
                let mut ctx = Resolver {
                    world: &mut *world,
                    events: &mut *events,
                    rng: &mut *self.rng,
                    statuses: &self.statuses,
                    spawned: &mut spawned,
                };
                match execute_ability(&mut ctx, actor.id, &decision.ability, decision.target) {
                    Ok(()) => actor.brain.selector_mut().record_executed(&decision),
                    Err(reason) => debug!("{:?} could not use {}: {}", actor.id, decision.ability.id, reason),
                }
            }

            let target = actor.brain.selector().current_target();
            if let Some(combatant) = world.combatant_mut(actor.id) {
                combatant.target = target;
            }

            // Tasks started by this actor pause it before anyone else decides
            for task in spawned.drain(..) {
                self.scheduler.spawn(task);
            }
        }
    }

    /// Execute a command from the input collaborator, bypassing the selectors.
    pub fn use_ability(
        &mut self,
        world: &mut dyn Battlefield,
        events: &mut dyn CombatNotifier,
        caster: Entity,
        ability: &AbilityId,
        target: CastTarget,
    ) -> Result<(), CastRejected> {
        let definition = self
            .abilities
            .get(ability)
            .cloned()
            .ok_or_else(|| CastRejected::UnknownAbility(ability.clone()))?;

        let mut spawned = Vec::new();
        let result = {
            let mut ctx = Resolver {
                world,
                events,
                rng: &mut *self.rng,
                statuses: &self.statuses,
                spawned: &mut spawned,
            };
            execute_ability(&mut ctx, caster, &definition, target)
        };
        self.adopt(&mut spawned);
        result
    }

    /// Remove a status from `target` on behalf of an outside system (dispel, cleanse).
    pub fn clear_status(
        &mut self,
        world: &mut dyn Battlefield,
        events: &mut dyn CombatNotifier,
        target: Entity,
        status_id: &StatusId,
    ) -> bool {
        let mut spawned = Vec::new();
        let mut ctx = Resolver {
            world,
            events,
            rng: &mut *self.rng,
            statuses: &self.statuses,
            spawned: &mut spawned,
        };
        status::clear_status(&mut ctx, target, status_id)
    }

    /// Persistence export of `target`'s active statuses.
    pub fn snapshot_statuses(&self, world: &dyn Battlefield, target: Entity) -> Vec<StatusSnapshot> {
        world
            .combatant(target)
            .and_then(|c| c.statuses.as_ref())
            .map(|holder| holder.snapshot())
            .unwrap_or_default()
    }

    /// Persistence import; returns how many instances were recreated.
    pub fn restore_statuses(&self, world: &mut dyn Battlefield, target: Entity, snapshots: &[StatusSnapshot]) -> usize {
        status::restore_statuses(world, &self.statuses, target, snapshots)
    }

    /// Distance an actor wants to keep from its target: the longest reach of
    /// its damage abilities, falling back to its default attack.
    pub fn engagement_range(&self, world: &dyn Battlefield, id: Entity) -> Option<f32> {
        let combatant = world.combatant(id)?;
        combatant
            .abilities
            .iter()
            .chain(combatant.default_attack.iter())
            .filter_map(|ability| self.abilities.get(ability))
            .filter(|a| {
                matches!(
                    a.category,
                    AbilityCategory::StandardDamage | AbilityCategory::Finisher | AbilityCategory::AoeDamage
                )
            })
            .map(|a| a.range)
            .reduce(f32::max)
    }
}
