//! Shared fixtures for integration tests
#![allow(dead_code)]

use bevy::prelude::*;

use skirmish::combat::ability::{Ability, AbilityCategory, AbilityId, DeliveryKind};
use skirmish::combat::combatant::Combatant;
use skirmish::combat::context::{CasterSnapshot, Resolver};
use skirmish::combat::effects::{DamageType, Effect};
use skirmish::combat::events::RecordingNotifier;
use skirmish::combat::faction::Faction;
use skirmish::combat::rng::{GameRng, RandomSource};
use skirmish::combat::stats::StatBlock;
use skirmish::combat::status::StatusLibrary;
use skirmish::combat::tasks::{CombatTask, Scheduler};
use skirmish::combat::world::Battlefield;
use skirmish::headless::Arena;

/// Random source that counts how often it is consulted.
pub struct CountingRng {
    pub calls: usize,
}

impl RandomSource for CountingRng {
    fn next_f32(&mut self) -> f32 {
        self.calls += 1;
        0.5
    }

    fn pick_index(&mut self, _len: usize) -> usize {
        self.calls += 1;
        0
    }
}

/// An arena plus every collaborator a `Resolver` borrows.
pub struct Harness {
    pub arena: Arena,
    pub events: RecordingNotifier,
    pub rng: GameRng,
    pub statuses: StatusLibrary,
    pub spawned: Vec<CombatTask>,
    pub scheduler: Scheduler,
}

impl Harness {
    pub fn new(statuses: StatusLibrary) -> Self {
        Self {
            arena: Arena::new(),
            events: RecordingNotifier::default(),
            rng: GameRng::from_seed(7),
            statuses,
            spawned: Vec::new(),
            scheduler: Scheduler::default(),
        }
    }

    pub fn ctx(&mut self) -> Resolver<'_> {
        Resolver {
            world: &mut self.arena,
            events: &mut self.events,
            rng: &mut self.rng,
            statuses: &self.statuses,
            spawned: &mut self.spawned,
        }
    }

    /// Add a combatant with an empty stat block at `position`.
    pub fn spawn(&mut self, name: &str, faction: Faction, max_health: f32, position: Vec3) -> Entity {
        let id = self.arena.allocate();
        let combatant = Combatant::new(id, name, faction, max_health)
            .at(position)
            .with_stats(StatBlock::default());
        self.arena.insert(combatant)
    }

    pub fn get(&self, id: Entity) -> &Combatant {
        self.arena.combatant(id).expect("combatant exists")
    }

    pub fn get_mut(&mut self, id: Entity) -> &mut Combatant {
        self.arena.combatant_mut(id).expect("combatant exists")
    }

    pub fn snapshot(&self, id: Entity) -> CasterSnapshot {
        CasterSnapshot::capture(&self.arena, id).expect("caster exists")
    }

    /// Apply `effect` from `caster` to `target`.
    pub fn apply(&mut self, effect: &Effect, caster: Entity, target: Entity) -> skirmish::combat::effects::EffectOutcome {
        let snapshot = self.snapshot(caster);
        let mut ctx = self.ctx();
        effect.apply(&mut ctx, &snapshot, target)
    }

    /// Move freshly spawned tasks into the scheduler.
    pub fn adopt(&mut self) {
        for task in self.spawned.drain(..) {
            self.scheduler.spawn(task);
        }
    }

    /// Run the scheduler `steps` times at `dt`.
    pub fn run_tasks(&mut self, steps: usize, dt: f32) {
        for _ in 0..steps {
            self.adopt();
            let mut scheduler = std::mem::take(&mut self.scheduler);
            {
                let mut ctx = self.ctx();
                scheduler.run(&mut ctx, dt);
            }
            self.scheduler = scheduler;
        }
        self.adopt();
    }

    pub fn kill(&mut self, id: Entity) {
        let combatant = self.get_mut(id);
        combatant.health.current = 0.0;
        combatant.health.downed = true;
    }
}

/// A no-cost, no-cooldown ability dealing 10 true damage.
pub fn ability(id: &str, category: AbilityCategory, priority: i32, range: f32, delivery: DeliveryKind) -> Ability {
    Ability {
        id: AbilityId::from(id),
        name: id.to_string(),
        category,
        priority,
        cost: 0.0,
        cooldown: 0.0,
        range,
        area_radius: 0.0,
        delivery,
        friendly: vec![],
        hostile: vec![true_damage(10.0)],
    }
}

pub fn true_damage(amount: f32) -> Effect {
    Effect::Damage {
        amount,
        damage_type: DamageType::True,
        scaling: vec![],
        can_crit: false,
    }
}
