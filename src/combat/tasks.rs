//! Cooperative task scheduler
//!
//! Multi-step work (sequence effects, channeled beams, traveling missiles and
//! leap/charge movement) runs as tasks owned by the engine. Every simulation
//! step the scheduler hands each task a `StepSignal`; the task answers
//! `Continue`, `Done`, or stops with a `StopReason`.
//!
//! An entity counts as paused exactly while it owns a live pausing task, so
//! removing a task from the scheduler is the un-pause. Every exit path (done,
//! stopped, cancelled) goes through `CombatTask::finish`.

use bevy::prelude::*;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::ability::{Ability, AbilityId};
use super::constants::{BODY_RADIUS, HIT_DISTANCE, MAX_TICKS_PER_STEP, RANGE_TOLERANCE, TIME_EPSILON};
use super::context::{CasterSnapshot, Resolver};
use super::delivery::{resolve_contact, Contact};
use super::effects::{SequenceAction, SequenceStep};
use super::events::CombatEvent;
use super::world::Layers;

/// Why a task ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    /// Owner died or disappeared
    CasterLost,
    /// Target died or disappeared
    TargetLost,
    OutOfRange,
    /// Terrain came between caster and target
    Obstructed,
    OutOfResource,
    Cancelled,
    /// Malformed step data
    Failed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::Completed => "completed",
            StopReason::CasterLost => "caster lost",
            StopReason::TargetLost => "target lost",
            StopReason::OutOfRange => "out of range",
            StopReason::Obstructed => "line of sight blocked",
            StopReason::OutOfResource => "out of resource",
            StopReason::Cancelled => "cancelled",
            StopReason::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// Input delivered to a task each step.
#[derive(Clone, Copy, Debug)]
pub struct StepSignal {
    pub dt: f32,
    /// Set when someone asked the owner's tasks to stop
    pub cancelled: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    Continue,
    Done,
}

pub type StepResult = Result<StepStatus, StopReason>;

/// A unit of suspended combat work.
#[derive(Clone, Debug)]
pub enum CombatTask {
    Sequence(SequenceTask),
    Channel(ChannelTask),
    Travel(TravelTask),
}

impl CombatTask {
    pub fn owner(&self) -> Entity {
        match self {
            CombatTask::Sequence(task) => task.owner,
            CombatTask::Channel(task) => task.caster,
            CombatTask::Travel(task) => task.caster,
        }
    }

    /// Whether the owner's autonomous decisions are suspended while this runs.
    pub fn pauses_owner(&self) -> bool {
        match self {
            CombatTask::Sequence(_) | CombatTask::Channel(_) => true,
            CombatTask::Travel(task) => task.carrier == Carrier::Caster,
        }
    }

    pub fn ability(&self) -> Option<&AbilityId> {
        match self {
            CombatTask::Sequence(_) => None,
            CombatTask::Channel(task) => Some(&task.ability.id),
            CombatTask::Travel(task) => Some(&task.ability.id),
        }
    }

    fn step(&mut self, ctx: &mut Resolver, signal: StepSignal) -> StepResult {
        if signal.cancelled {
            return Err(StopReason::Cancelled);
        }
        match self {
            CombatTask::Sequence(task) => task.step(ctx, signal.dt),
            CombatTask::Channel(task) => task.step(ctx, signal.dt),
            CombatTask::Travel(task) => task.step(ctx, signal.dt),
        }
    }

    /// Cleanup that runs on every exit path.
    fn finish(&mut self, ctx: &mut Resolver, reason: StopReason) {
        if reason != StopReason::Completed {
            debug!("Task for {:?} stopped: {}", self.owner(), reason);
        }
        // Missiles that land are not a "cast stopped" from the caster's view
        if matches!(self, CombatTask::Travel(t) if t.carrier == Carrier::Missile)
            && reason == StopReason::Completed
        {
            return;
        }
        ctx.notify(CombatEvent::CastStopped {
            caster: self.owner(),
            ability: self.ability().cloned(),
            reason,
        });
    }
}

// ============================================================================
// Sequence
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
enum Suspended {
    Waiting { remaining: f32 },
    Dashing { speed: f32, stop_distance: f32 },
}

/// Ordered chain of sequence steps, each awaited before the next starts.
#[derive(Clone, Debug)]
pub struct SequenceTask {
    pub owner: Entity,
    pub target: Entity,
    steps: Vec<SequenceStep>,
    cursor: usize,
    current: Option<Suspended>,
}

impl SequenceTask {
    pub fn new(owner: Entity, target: Entity, steps: Vec<SequenceStep>) -> Self {
        Self {
            owner,
            target,
            steps,
            cursor: 0,
            current: None,
        }
    }

    fn step(&mut self, ctx: &mut Resolver, dt: f32) -> StepResult {
        if !ctx.world.is_alive(self.owner) {
            return Err(StopReason::CasterLost);
        }

        let mut budget = dt;
        loop {
            if let Some(suspended) = self.current.as_mut() {
                match advance_suspended(suspended, ctx, self.owner, self.target, &mut budget)? {
                    StepStatus::Continue => return Ok(StepStatus::Continue),
                    StepStatus::Done => self.current = None,
                }
            }

            let Some(step) = self.steps.get(self.cursor) else {
                return Ok(StepStatus::Done);
            };
            self.cursor += 1;

            if let Some(chance) = step.chance {
                if !ctx.rng.roll(chance / 100.0) {
                    continue;
                }
            }

            match &step.action {
                SequenceAction::Wait { seconds } => {
                    self.current = Some(Suspended::Waiting { remaining: *seconds });
                }
                SequenceAction::Animate { name, seconds } => {
                    ctx.notify(CombatEvent::Animation {
                        actor: self.owner,
                        name: name.clone(),
                    });
                    self.current = Some(Suspended::Waiting { remaining: *seconds });
                }
                SequenceAction::DashToTarget { speed, stop_distance } => {
                    if *speed <= 0.0 {
                        return Err(StopReason::Failed);
                    }
                    self.current = Some(Suspended::Dashing {
                        speed: *speed,
                        stop_distance: *stop_distance,
                    });
                }
                SequenceAction::ApplyToTarget(effects) => {
                    if !ctx.world.is_alive(self.target) {
                        return Err(StopReason::TargetLost);
                    }
                    let caster = CasterSnapshot::capture(&*ctx.world, self.owner)
                        .ok_or(StopReason::CasterLost)?;
                    for effect in effects {
                        effect.apply(ctx, &caster, self.target);
                    }
                }
                SequenceAction::ApplyToSelf(effects) => {
                    let caster = CasterSnapshot::capture(&*ctx.world, self.owner)
                        .ok_or(StopReason::CasterLost)?;
                    for effect in effects {
                        effect.apply(ctx, &caster, self.owner);
                    }
                }
            }
        }
    }
}

/// Spend `budget` seconds on a suspended step.
fn advance_suspended(
    suspended: &mut Suspended,
    ctx: &mut Resolver,
    owner: Entity,
    target: Entity,
    budget: &mut f32,
) -> StepResult {
    match suspended {
        Suspended::Waiting { remaining } => {
            if *remaining > *budget + TIME_EPSILON {
                *remaining -= *budget;
                *budget = 0.0;
                Ok(StepStatus::Continue)
            } else {
                *budget = (*budget - *remaining).max(0.0);
                *remaining = 0.0;
                Ok(StepStatus::Done)
            }
        }
        Suspended::Dashing { speed, stop_distance } => {
            let destination = match ctx.world.combatant(target) {
                Some(t) if t.is_alive() => t.position,
                _ => return Err(StopReason::TargetLost),
            };
            let Some(mover) = ctx.world.combatant_mut(owner) else {
                return Err(StopReason::CasterLost);
            };
            match move_toward(&mut mover.position, destination, *stop_distance, *speed, *budget) {
                Some(spent) => {
                    *budget -= spent;
                    Ok(StepStatus::Done)
                }
                None => {
                    *budget = 0.0;
                    Ok(StepStatus::Continue)
                }
            }
        }
    }
}

/// Move `position` toward `destination`, stopping `stop_distance` short.
///
/// Returns the seconds spent if the stop point was reached within `budget`.
fn move_toward(position: &mut Vec3, destination: Vec3, stop_distance: f32, speed: f32, budget: f32) -> Option<f32> {
    let offset = destination - *position;
    let remaining = offset.length() - stop_distance;
    if remaining <= HIT_DISTANCE * 0.1 {
        return Some(0.0);
    }
    let direction = offset.normalize_or_zero();
    let reach = speed * budget;
    if reach >= remaining {
        *position += direction * remaining;
        Some(remaining / speed)
    } else {
        *position += direction * reach;
        None
    }
}

// ============================================================================
// Channel (beam)
// ============================================================================

/// Continuously ticking beam between caster and target.
#[derive(Clone, Debug)]
pub struct ChannelTask {
    pub caster: Entity,
    pub target: Entity,
    pub ability: Arc<Ability>,
    tick_interval: f32,
    drain_per_tick: f32,
    /// Seconds left before the channel completes on its own (None = until broken)
    remaining: Option<f32>,
    until_tick: f32,
    pub ticks: u32,
}

impl ChannelTask {
    pub fn new(
        caster: Entity,
        target: Entity,
        ability: Arc<Ability>,
        tick_interval: f32,
        drain_per_tick: f32,
        max_duration: Option<f32>,
    ) -> Self {
        Self {
            caster,
            target,
            ability,
            tick_interval,
            drain_per_tick,
            remaining: max_duration,
            until_tick: tick_interval,
            ticks: 0,
        }
    }

    /// Every constraint that keeps the beam alive.
    fn check_constraints(&self, ctx: &Resolver) -> Result<(), StopReason> {
        let caster = match ctx.world.combatant(self.caster) {
            Some(c) if c.is_alive() => c,
            _ => return Err(StopReason::CasterLost),
        };
        let target = match ctx.world.combatant(self.target) {
            Some(t) if t.is_alive() => t,
            _ => return Err(StopReason::TargetLost),
        };
        if caster.distance_to(target.position) > self.ability.range + RANGE_TOLERANCE {
            return Err(StopReason::OutOfRange);
        }
        let from = caster.position + Vec3::Y;
        let to = target.position + Vec3::Y;
        if ctx.world.raycast(from, to, Layers::TERRAIN, Some(self.caster)).is_some() {
            return Err(StopReason::Obstructed);
        }
        if let Some(pool) = &caster.resource {
            if pool.current + TIME_EPSILON < self.drain_per_tick {
                return Err(StopReason::OutOfResource);
            }
        }
        Ok(())
    }

    fn step(&mut self, ctx: &mut Resolver, dt: f32) -> StepResult {
        self.check_constraints(ctx)?;

        if self.tick_interval <= 0.0 {
            return Err(StopReason::Failed);
        }

        self.until_tick -= dt;
        let mut fired = 0;
        while self.until_tick <= TIME_EPSILON {
            if fired == MAX_TICKS_PER_STEP {
                // Backlog past the per-step cap is dropped
                self.until_tick = self.tick_interval;
                break;
            }
            self.check_constraints(ctx)?;
            if let Some(pool) = ctx
                .world
                .combatant_mut(self.caster)
                .and_then(|c| c.resource.as_mut())
            {
                pool.current = (pool.current - self.drain_per_tick).max(0.0);
            }
            resolve_contact(ctx, self.caster, &self.ability, Contact::Entity(self.target));
            self.ticks += 1;
            fired += 1;
            self.until_tick += self.tick_interval;
        }

        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= dt;
            if *remaining <= TIME_EPSILON {
                return Ok(StepStatus::Done);
            }
        }
        Ok(StepStatus::Continue)
    }
}

// ============================================================================
// Travel (projectiles, leap, charge)
// ============================================================================

/// What moves across the battlefield.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Carrier {
    /// A missile launched by the caster
    Missile,
    /// The caster itself (leap, charge)
    Caster,
}

/// Where a traveling delivery is headed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Destination {
    /// Homes on an entity
    Entity(Entity),
    /// Fixed ground point
    Point(Vec3),
}

/// A delivery in flight; resolves contact on arrival.
#[derive(Clone, Debug)]
pub struct TravelTask {
    pub caster: Entity,
    pub ability: Arc<Ability>,
    pub destination: Destination,
    pub carrier: Carrier,
    pub position: Vec3,
    speed: f32,
}

impl TravelTask {
    pub fn new(
        caster: Entity,
        ability: Arc<Ability>,
        destination: Destination,
        carrier: Carrier,
        origin: Vec3,
        speed: f32,
    ) -> Self {
        Self {
            caster,
            ability,
            destination,
            carrier,
            position: origin,
            speed,
        }
    }

    fn step(&mut self, ctx: &mut Resolver, dt: f32) -> StepResult {
        if self.speed <= 0.0 {
            return Err(StopReason::Failed);
        }

        match self.carrier {
            // A missile keeps flying after its caster falls, but needs the record
            Carrier::Missile if ctx.world.combatant(self.caster).is_none() => {
                return Err(StopReason::CasterLost)
            }
            Carrier::Caster if !ctx.world.is_alive(self.caster) => return Err(StopReason::CasterLost),
            _ => {}
        }

        let (goal, stop_distance) = match self.destination {
            Destination::Entity(target) => match ctx.world.combatant(target) {
                Some(t) if t.is_alive() => match self.carrier {
                    Carrier::Missile => (t.position, 0.0),
                    Carrier::Caster => (t.position, BODY_RADIUS * 2.0),
                },
                _ => return Err(StopReason::TargetLost),
            },
            Destination::Point(point) => (point, 0.0),
        };

        let arrived = if self.carrier == Carrier::Missile {
            let before = self.position;
            let hit = move_toward(&mut self.position, goal, stop_distance, self.speed, dt).is_some();
            hit || before.distance(goal) <= HIT_DISTANCE
        } else {
            let Some(caster) = ctx.world.combatant_mut(self.caster) else {
                return Err(StopReason::CasterLost);
            };
            let arrived = move_toward(&mut caster.position, goal, stop_distance, self.speed, dt).is_some();
            self.position = caster.position;
            arrived
        };

        if !arrived {
            return Ok(StepStatus::Continue);
        }

        let contact = if self.ability.is_area() {
            Contact::Area(self.position)
        } else {
            match self.destination {
                Destination::Entity(target) => Contact::Entity(target),
                Destination::Point(point) => Contact::Area(point),
            }
        };
        resolve_contact(ctx, self.caster, &self.ability, contact);
        Ok(StepStatus::Done)
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Engine-owned runner for combat tasks.
#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    tasks: Vec<CombatTask>,
    cancel_requests: HashSet<Entity>,
}

impl Scheduler {
    pub fn spawn(&mut self, task: CombatTask) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// True while `entity` owns a live task that suspends its decisions.
    pub fn is_paused(&self, entity: Entity) -> bool {
        self.tasks
            .iter()
            .any(|task| task.owner() == entity && task.pauses_owner())
    }

    /// Ask every task owned by `owner` to stop; delivered on the next run.
    pub fn cancel(&mut self, owner: Entity) {
        self.cancel_requests.insert(owner);
    }

    /// Step every task once. Tasks spawned during the run land in `ctx.spawned`.
    pub fn run(&mut self, ctx: &mut Resolver, dt: f32) {
        let running = std::mem::take(&mut self.tasks);
        let mut kept = Vec::with_capacity(running.len());

        for mut task in running {
            let signal = StepSignal {
                dt,
                cancelled: self.cancel_requests.contains(&task.owner()),
            };
            match task.step(ctx, signal) {
                Ok(StepStatus::Continue) => kept.push(task),
                Ok(StepStatus::Done) => task.finish(ctx, StopReason::Completed),
                Err(reason) => task.finish(ctx, reason),
            }
        }

        self.cancel_requests.clear();
        self.tasks = kept;
    }
}
