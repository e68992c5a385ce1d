//! Status Effect Runtime
//!
//! Handles all timed modifiers (buffs, debuffs, DoTs, HoTs) on combatants.
//! Includes:
//! - Status definitions loaded from `assets/config/status_effects.ron`
//! - Per-target holders of active instances
//! - Duration countdown, periodic tick effects and expiry
//! - Stat modifier application and exact reversal
//!
//! This module is the only writer of stat bonus buckets. An instance adds its
//! modifiers when created and subtracts the same values exactly once when it
//! ends, whether it expired, was cleared, purged or replaced.
//!
//! IMPORTANT: within one step the duration is checked before the tick timer,
//! and expired instances are finalized only after that step's ticks ran. A
//! 10s status with 2s ticks therefore ticks at t=2,4,6,8,10 (5 total).

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::combatant::Combatant;
use super::constants::{MAX_TICKS_PER_STEP, TIME_EPSILON};
use super::context::{CasterSnapshot, Resolver};
use super::effects::{Effect, EffectOutcome};
use super::events::{CombatEvent, StatusRemovalReason};
use super::faction::Faction;
use super::stats::{Stat, StatModifier};
use super::world::Battlefield;

/// Identity of a status effect definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusId(pub String);

impl From<&str> for StatusId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for StatusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How long a status lasts.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum StatusDuration {
    /// Tick effects fire once on application; no instance is created
    Instant,
    /// Expires after the given seconds
    Timed(f32),
    /// Lasts until cleared
    Infinite,
}

/// What happens when a status is applied to a target already holding it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackingPolicy {
    /// The old instance ends (modifiers reverted) and a fresh one starts
    #[default]
    Replace,
    /// The old instance keeps its modifiers; duration and tick timer restart
    Refresh,
    /// Independent instances up to `max_stacks`; the oldest is replaced beyond that
    Stack,
}

fn default_max_stacks() -> u8 {
    1
}

/// Immutable status effect definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusEffect {
    pub id: StatusId,
    pub name: String,
    #[serde(default)]
    pub is_buff: bool,
    pub duration: StatusDuration,
    /// Seconds between tick effect firings (0.0 = no ticks)
    #[serde(default)]
    pub tick_interval: f32,
    /// Flat stat deltas held for the instance's lifetime
    #[serde(default)]
    pub modifiers: Vec<StatModifier>,
    /// Effects run against the holder every tick (DoT/HoT)
    #[serde(default)]
    pub tick_effects: Vec<Effect>,
    #[serde(default)]
    pub stacking: StackingPolicy,
    #[serde(default = "default_max_stacks")]
    pub max_stacks: u8,
}

impl StatusEffect {
    /// Number of ticks a timed instance fires over its whole life.
    pub fn max_ticks(&self) -> Option<u32> {
        match self.duration {
            StatusDuration::Timed(seconds) if self.tick_interval > 0.0 => {
                Some((seconds / self.tick_interval + TIME_EPSILON).floor() as u32)
            }
            StatusDuration::Timed(_) => Some(0),
            _ => None,
        }
    }

    /// Human-readable tooltip. Pure data export.
    pub fn describe(&self) -> String {
        let kind = if self.is_buff { "Buff" } else { "Debuff" };
        let duration = match self.duration {
            StatusDuration::Instant => "instant".to_string(),
            StatusDuration::Timed(seconds) => format!("{:.0}s", seconds),
            StatusDuration::Infinite => "permanent".to_string(),
        };
        let mut parts = vec![format!("{} ({}, {})", self.name, kind, duration)];
        for modifier in &self.modifiers {
            parts.push(format!("{:+.0} {:?}", modifier.value, modifier.stat));
        }
        if !self.tick_effects.is_empty() {
            let effects: Vec<String> = self.tick_effects.iter().map(|e| e.describe()).collect();
            if self.tick_interval > 0.0 {
                parts.push(format!("Every {:.1}s: {}", self.tick_interval, effects.join(", ")));
            } else {
                parts.push(effects.join(", "));
            }
        }
        parts.join("\n")
    }
}

/// Lifecycle of an active instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusPhase {
    Applying,
    Active,
    Expired,
    Removed,
}

impl StatusPhase {
    pub fn is_finished(&self) -> bool {
        matches!(self, StatusPhase::Expired | StatusPhase::Removed)
    }
}

/// One application of a status on one target.
#[derive(Clone, Debug)]
pub struct ActiveStatusEffect {
    pub definition: Arc<StatusEffect>,
    /// Who applied it (for attributing tick effects)
    pub caster: Option<Entity>,
    pub caster_faction: Faction,
    /// Seconds left (meaningful for timed statuses only)
    pub remaining: f32,
    /// Seconds until the next tick
    pub until_tick: f32,
    pub ticks_fired: u32,
    pub phase: StatusPhase,
    /// Whether modifiers were written to the holder's stat block
    modifiers_applied: bool,
}

impl ActiveStatusEffect {
    fn new(definition: Arc<StatusEffect>, caster: Option<Entity>, caster_faction: Faction) -> Self {
        let remaining = match definition.duration {
            StatusDuration::Timed(seconds) => seconds,
            _ => 0.0,
        };
        let until_tick = definition.tick_interval;
        Self {
            definition,
            caster,
            caster_faction,
            remaining,
            until_tick,
            ticks_fired: 0,
            phase: StatusPhase::Applying,
            modifiers_applied: false,
        }
    }

    pub fn id(&self) -> &StatusId {
        &self.definition.id
    }

    /// Advance timers by `dt`. Returns how many ticks are due this step.
    ///
    /// Duration is checked first; a tick landing exactly on expiry still fires.
    fn advance(&mut self, dt: f32) -> u32 {
        if self.phase != StatusPhase::Active {
            return 0;
        }

        if let StatusDuration::Timed(_) = self.definition.duration {
            self.remaining -= dt;
            if self.remaining <= TIME_EPSILON {
                self.remaining = 0.0;
                self.phase = StatusPhase::Expired;
            }
        }

        let interval = self.definition.tick_interval;
        if interval <= 0.0 {
            return 0;
        }

        self.until_tick -= dt;
        if self.until_tick > TIME_EPSILON {
            return 0;
        }

        let elapsed = ((TIME_EPSILON - self.until_tick) / interval).floor() as u32;
        let mut due = elapsed.saturating_add(1).min(MAX_TICKS_PER_STEP);
        if let Some(max) = self.definition.max_ticks() {
            due = due.min(max.saturating_sub(self.ticks_fired));
        }
        self.until_tick += due as f32 * interval;
        if self.until_tick <= TIME_EPSILON {
            // Backlog past the per-step cap is dropped
            self.until_tick = interval;
        }
        self.ticks_fired = self.ticks_fired.saturating_add(due);
        due
    }
}

/// Status holder attached to a combatant that can carry statuses.
#[derive(Clone, Debug, Default)]
pub struct StatusEffects {
    active: Vec<ActiveStatusEffect>,
}

impl StatusEffects {
    pub fn iter(&self) -> impl Iterator<Item = &ActiveStatusEffect> {
        self.active.iter()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn has(&self, id: &StatusId) -> bool {
        self.active.iter().any(|s| s.id() == id && !s.phase.is_finished())
    }

    pub fn count(&self, id: &StatusId) -> usize {
        self.active.iter().filter(|s| s.id() == id).count()
    }

    /// Seconds left on the longest-lived instance of a timed status.
    pub fn remaining(&self, id: &StatusId) -> Option<f32> {
        self.active
            .iter()
            .filter(|s| s.id() == id)
            .map(|s| s.remaining)
            .reduce(f32::max)
    }

    /// Sum of a stat's modifiers over all live instances.
    ///
    /// Always equals the holder's stat bonus for that stat.
    pub fn modifier_total(&self, stat: Stat) -> f32 {
        self.active
            .iter()
            .filter(|s| s.modifiers_applied && !s.phase.is_finished())
            .flat_map(|s| s.definition.modifiers.iter())
            .filter(|m| m.stat == stat)
            .map(|m| m.value)
            .sum()
    }

    /// Persistence export: definition identity, timers and caster.
    pub fn snapshot(&self) -> Vec<StatusSnapshot> {
        self.active
            .iter()
            .filter(|s| !s.phase.is_finished())
            .map(|s| StatusSnapshot {
                status: s.id().clone(),
                remaining: match s.definition.duration {
                    StatusDuration::Timed(_) => Some(s.remaining),
                    _ => None,
                },
                until_tick: s.until_tick,
                ticks_fired: s.ticks_fired,
                caster: s.caster.map(|c| c.to_bits()),
                caster_faction: Some(s.caster_faction),
            })
            .collect()
    }
}

/// Serializable record of one active instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: StatusId,
    /// None for infinite statuses
    pub remaining: Option<f32>,
    pub until_tick: f32,
    #[serde(default)]
    pub ticks_fired: u32,
    /// Caster entity bits, if the caster should be kept for attribution
    #[serde(default)]
    pub caster: Option<u64>,
    #[serde(default)]
    pub caster_faction: Option<Faction>,
}

// ============================================================================
// Runtime operations
// ============================================================================

fn add_modifiers(combatant: &mut Combatant, instance: &mut ActiveStatusEffect) {
    if let Some(stats) = combatant.stats.as_mut() {
        for modifier in &instance.definition.modifiers {
            stats.add_bonus(modifier.stat, modifier.value);
        }
        instance.modifiers_applied = true;
    }
}

fn revert_modifiers(combatant: &mut Combatant, instance: &mut ActiveStatusEffect) {
    if !instance.modifiers_applied {
        return;
    }
    if let Some(stats) = combatant.stats.as_mut() {
        for modifier in &instance.definition.modifiers {
            stats.add_bonus(modifier.stat, -modifier.value);
        }
    }
    instance.modifiers_applied = false;
}

/// End every instance on `target` matching `predicate`, reverting modifiers once.
fn end_matching(
    ctx: &mut Resolver,
    target: Entity,
    reason: StatusRemovalReason,
    mut predicate: impl FnMut(&ActiveStatusEffect) -> bool,
) -> Vec<StatusId> {
    let Some(combatant) = ctx.world.combatant_mut(target) else {
        return Vec::new();
    };
    let Some(mut holder) = combatant.statuses.take() else {
        return Vec::new();
    };

    let terminal = match reason {
        StatusRemovalReason::Expired => StatusPhase::Expired,
        _ => StatusPhase::Removed,
    };

    let mut ended = Vec::new();
    let mut kept = Vec::with_capacity(holder.active.len());
    for mut instance in holder.active.drain(..) {
        if predicate(&instance) {
            revert_modifiers(combatant, &mut instance);
            instance.phase = terminal;
            ended.push(instance.id().clone());
        } else {
            kept.push(instance);
        }
    }
    holder.active = kept;
    combatant.statuses = Some(holder);

    for status in &ended {
        ctx.notify(CombatEvent::StatusRemoved {
            target,
            status: status.clone(),
            reason,
        });
    }
    ended
}

/// Register a status on `target`, or fire it once if it is instant.
pub fn apply_status(
    ctx: &mut Resolver,
    caster: &CasterSnapshot,
    target: Entity,
    definition: Arc<StatusEffect>,
) -> EffectOutcome {
    let Some(combatant) = ctx.world.combatant(target) else {
        return EffectOutcome::Ineligible;
    };
    let Some(holder) = combatant.statuses.as_ref() else {
        warn!(
            "{} cannot hold status effects; {} not applied",
            combatant.name, definition.name
        );
        return EffectOutcome::NoHolder;
    };
    let existing = holder.count(&definition.id);

    if definition.duration == StatusDuration::Instant {
        for effect in &definition.tick_effects {
            effect.apply(ctx, caster, target);
        }
        return EffectOutcome::StatusFired;
    }

    if existing > 0 {
        match definition.stacking {
            StackingPolicy::Replace => {
                end_matching(ctx, target, StatusRemovalReason::Replaced, |s| s.id() == &definition.id);
            }
            StackingPolicy::Refresh => {
                refresh(ctx, caster, target, &definition);
                return EffectOutcome::StatusApplied;
            }
            StackingPolicy::Stack => {
                if existing >= definition.max_stacks.max(1) as usize {
                    let mut found = false;
                    end_matching(ctx, target, StatusRemovalReason::Replaced, |s| {
                        let oldest = !found && s.id() == &definition.id;
                        found |= oldest;
                        oldest
                    });
                }
            }
        }
    }

    let Some(combatant) = ctx.world.combatant_mut(target) else {
        return EffectOutcome::Ineligible;
    };
    let mut instance = ActiveStatusEffect::new(definition.clone(), caster.id, caster.faction);
    add_modifiers(combatant, &mut instance);
    instance.phase = StatusPhase::Active;
    let Some(holder) = combatant.statuses.as_mut() else {
        return EffectOutcome::NoHolder;
    };
    holder.active.push(instance);

    debug!("{} gains {}", combatant.name, definition.name);

    ctx.notify(CombatEvent::StatusApplied {
        source: caster.id,
        target,
        status: definition.id.clone(),
        duration: match definition.duration {
            StatusDuration::Timed(seconds) => Some(seconds),
            _ => None,
        },
        is_buff: definition.is_buff,
    });

    EffectOutcome::StatusApplied
}

fn refresh(ctx: &mut Resolver, caster: &CasterSnapshot, target: Entity, definition: &StatusEffect) {
    let Some(holder) = ctx
        .world
        .combatant_mut(target)
        .and_then(|c| c.statuses.as_mut())
    else {
        return;
    };
    for instance in holder.active.iter_mut().filter(|s| s.id() == &definition.id) {
        if let StatusDuration::Timed(seconds) = definition.duration {
            instance.remaining = seconds;
            // Ticks restart counting from the refresh
            instance.ticks_fired = 0;
        }
        instance.until_tick = definition.tick_interval;
        instance.caster = caster.id;
        instance.caster_faction = caster.faction;
    }
    ctx.notify(CombatEvent::StatusApplied {
        source: caster.id,
        target,
        status: definition.id.clone(),
        duration: match definition.duration {
            StatusDuration::Timed(seconds) => Some(seconds),
            _ => None,
        },
        is_buff: definition.is_buff,
    });
}

/// Advance every active instance on every tracked combatant by `dt`.
///
/// For each target: timers advance (duration first), due tick effects fire
/// with the original caster's attribution, then expired instances are
/// finalized and their modifiers reverted.
pub fn advance_statuses(ctx: &mut Resolver, dt: f32) {
    for target in ctx.world.combatant_ids() {
        let mut due: Vec<(Arc<StatusEffect>, Option<Entity>, Faction)> = Vec::new();
        let mut any_expired = false;

        {
            let Some(holder) = ctx
                .world
                .combatant_mut(target)
                .and_then(|c| c.statuses.as_mut())
            else {
                continue;
            };
            for instance in holder.active.iter_mut() {
                let ticks = instance.advance(dt);
                for _ in 0..ticks {
                    due.push((instance.definition.clone(), instance.caster, instance.caster_faction));
                }
                any_expired |= instance.phase == StatusPhase::Expired;
            }
        }

        for (definition, caster, faction) in due {
            let snapshot = caster
                .and_then(|id| CasterSnapshot::capture(&*ctx.world, id))
                .unwrap_or_else(|| CasterSnapshot::detached(caster, faction));
            for effect in &definition.tick_effects {
                effect.apply(ctx, &snapshot, target);
            }
        }

        if any_expired {
            end_matching(ctx, target, StatusRemovalReason::Expired, |s| {
                s.phase == StatusPhase::Expired
            });
        }
    }
}

/// Remove every instance of `status` from `target`. Returns true if any ended.
pub fn clear_status(ctx: &mut Resolver, target: Entity, status: &StatusId) -> bool {
    !end_matching(ctx, target, StatusRemovalReason::Cleared, |s| s.id() == status).is_empty()
}

/// Remove the most recently applied buff (or debuff) from `target`.
pub fn dispel(ctx: &mut Resolver, target: Entity, buffs: bool) -> Option<StatusId> {
    let active = &ctx.world.combatant(target)?.statuses.as_ref()?.active;
    let index = active
        .iter()
        .rposition(|s| s.definition.is_buff == buffs && !s.phase.is_finished())?;
    let newest = active[index].id().clone();

    // Only the newest instance, even if several stacks share the id
    let mut position = 0;
    end_matching(ctx, target, StatusRemovalReason::Cleared, |_| {
        let hit = position == index;
        position += 1;
        hit
    });
    Some(newest)
}

/// Remove every status from `target` (death, reset).
pub fn purge_statuses(ctx: &mut Resolver, target: Entity) {
    end_matching(ctx, target, StatusRemovalReason::Purged, |_| true);
}

/// Persistence import: recreate instances from snapshots, re-adding modifiers.
///
/// Unknown definitions are skipped with a warning. Timers are clamped to what
/// the definition allows. Returns how many were restored.
pub fn restore_statuses(
    world: &mut dyn Battlefield,
    library: &StatusLibrary,
    target: Entity,
    snapshots: &[StatusSnapshot],
) -> usize {
    let casters: Vec<(Option<Entity>, Option<Faction>)> = snapshots
        .iter()
        .map(|snapshot| {
            let caster = snapshot
                .caster
                .and_then(|bits| Entity::try_from_bits(bits).ok());
            let faction = snapshot
                .caster_faction
                .or_else(|| caster.and_then(|id| world.combatant(id)).map(|c| c.faction));
            (caster, faction)
        })
        .collect();

    let Some(combatant) = world.combatant_mut(target) else {
        return 0;
    };
    let Some(mut holder) = combatant.statuses.take() else {
        warn!("{} cannot hold status effects; nothing restored", combatant.name);
        return 0;
    };

    let mut restored = 0;
    for (snapshot, (caster, caster_faction)) in snapshots.iter().zip(casters) {
        let Some(definition) = library.get(&snapshot.status) else {
            warn!("Skipping unknown status '{}' on restore", snapshot.status);
            continue;
        };
        let faction = caster_faction.unwrap_or(combatant.faction);
        let mut instance = ActiveStatusEffect::new(definition.clone(), caster, faction);
        if let (StatusDuration::Timed(seconds), Some(remaining)) = (definition.duration, snapshot.remaining) {
            if remaining.is_finite() {
                instance.remaining = remaining.clamp(0.0, seconds.max(0.0));
            }
        }
        let interval = definition.tick_interval.max(0.0);
        if snapshot.until_tick.is_finite() {
            instance.until_tick = snapshot.until_tick.clamp(0.0, interval);
        }
        instance.ticks_fired = definition
            .max_ticks()
            .map_or(snapshot.ticks_fired, |max| snapshot.ticks_fired.min(max));
        add_modifiers(combatant, &mut instance);
        instance.phase = StatusPhase::Active;
        holder.active.push(instance);
        restored += 1;
    }

    combatant.statuses = Some(holder);
    restored
}

// ============================================================================
// Library
// ============================================================================

/// Root structure for the status_effects.ron file
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusEffectsConfig {
    pub statuses: Vec<StatusEffect>,
}

/// All status definitions, shared by reference.
#[derive(Clone, Debug, Default)]
pub struct StatusLibrary {
    definitions: HashMap<StatusId, Arc<StatusEffect>>,
}

impl StatusLibrary {
    pub fn new(statuses: Vec<StatusEffect>) -> Self {
        let mut library = Self::default();
        for status in statuses {
            library.insert(status);
        }
        library
    }

    pub fn insert(&mut self, status: StatusEffect) {
        self.definitions.insert(status.id.clone(), Arc::new(status));
    }

    pub fn get(&self, id: &StatusId) -> Option<&Arc<StatusEffect>> {
        self.definitions.get(id)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Parse status definitions from RON text.
pub fn parse_status_library(contents: &str) -> Result<StatusLibrary, String> {
    let config: StatusEffectsConfig =
        ron::from_str(contents).map_err(|e| format!("Failed to parse status effects: {}", e))?;

    for status in &config.statuses {
        if status.tick_interval < 0.0 {
            return Err(format!("Status '{}' has a negative tick interval", status.id));
        }
        if let StatusDuration::Timed(seconds) = status.duration {
            if seconds <= 0.0 {
                return Err(format!("Status '{}' must have a positive duration", status.id));
            }
        }
        if status.duration == StatusDuration::Infinite
            && status.tick_interval == 0.0
            && !status.tick_effects.is_empty()
        {
            return Err(format!(
                "Status '{}' has tick effects but no tick interval",
                status.id
            ));
        }
    }

    let library = StatusLibrary::new(config.statuses);

    // Tick effects may apply further statuses; those must exist too
    for status in library.definitions.values() {
        let mut referenced = Vec::new();
        for effect in &status.tick_effects {
            effect.collect_status_refs(&mut referenced);
        }
        if let Some(missing) = referenced.iter().find(|id| library.get(id).is_none()) {
            return Err(format!(
                "Status '{}' references unknown status '{}'",
                status.id, missing
            ));
        }
    }

    Ok(library)
}

/// Load status definitions from a RON file.
pub fn load_status_library(path: &str) -> Result<StatusLibrary, String> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path, e))?;
    let library = parse_status_library(&contents).map_err(|e| format!("{} ({})", e, path))?;
    info!("Loaded {} status effect definitions from {}", library.len(), path);
    Ok(library)
}
