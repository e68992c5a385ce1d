//! Delivery & Contact Resolution
//!
//! Turns a chosen ability into world contact. Instant kinds (melee, self,
//! ground placement, teleport) resolve immediately; projectiles, leaps,
//! charges and beams hand off to a scheduler task that resolves contact later.
//!
//! On contact the faction verdict is taken per struck entity, and an area hit
//! visits each entity once no matter how many of its volumes overlap.

use bevy::prelude::*;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::ability::{Ability, AbilityId, DeliveryKind};
use super::combatant::Combatant;
use super::constants::{BODY_RADIUS, RANGE_TOLERANCE};
use super::context::{CasterSnapshot, Resolver};
use super::events::CombatEvent;
use super::faction::is_ally;
use super::tasks::{Carrier, ChannelTask, CombatTask, Destination, TravelTask};
use super::world::{Battlefield, Layers};

/// Where an ability is aimed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CastTarget {
    SelfCast,
    Entity(Entity),
    Point(Vec3),
}

/// Why an ability could not be executed. Only that ability is affected.
#[derive(Clone, Debug, PartialEq)]
pub enum CastRejected {
    UnknownAbility(AbilityId),
    /// The caster's catalog does not contain the ability
    NotKnown(AbilityId),
    CasterUnavailable,
    OnCooldown { remaining: f32 },
    InsufficientResource { needed: f32, available: f32 },
    /// The delivery kind needs a target the command did not give
    MissingTarget,
    TargetUnavailable,
    OutOfRange { distance: f32, range: f32 },
}

impl fmt::Display for CastRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CastRejected::UnknownAbility(id) => write!(f, "unknown ability '{}'", id),
            CastRejected::NotKnown(id) => write!(f, "ability '{}' is not in the caster's catalog", id),
            CastRejected::CasterUnavailable => write!(f, "caster is missing or down"),
            CastRejected::OnCooldown { remaining } => write!(f, "on cooldown ({:.1}s left)", remaining),
            CastRejected::InsufficientResource { needed, available } => {
                write!(f, "needs {:.0} resource, has {:.0}", needed, available)
            }
            CastRejected::MissingTarget => write!(f, "no target given"),
            CastRejected::TargetUnavailable => write!(f, "target is missing or down"),
            CastRejected::OutOfRange { distance, range } => {
                write!(f, "target at {:.1} is beyond range {:.1}", distance, range)
            }
        }
    }
}

/// Whether `ability` has an effect that can land on a downed target.
fn reaches_downed(ability: &Ability) -> bool {
    ability.friendly.iter().chain(&ability.hostile).any(|e| e.affects_downed())
}

/// Cooldown and resource gate, independent of any target.
pub fn check_ready(caster: &Combatant, ability: &Ability) -> Result<(), CastRejected> {
    if !caster.is_alive() {
        return Err(CastRejected::CasterUnavailable);
    }
    if caster.is_on_cooldown(&ability.id) {
        return Err(CastRejected::OnCooldown {
            remaining: caster.cooldown_remaining(&ability.id),
        });
    }
    if !caster.can_afford(ability.cost) {
        return Err(CastRejected::InsufficientResource {
            needed: ability.cost,
            available: caster.resource.map(|pool| pool.current).unwrap_or(0.0),
        });
    }
    Ok(())
}

/// Range gate from the caster to a point.
pub fn check_range(caster: &Combatant, ability: &Ability, point: Vec3) -> Result<(), CastRejected> {
    if ability.delivery.is_self_delivered() {
        return Ok(());
    }
    let distance = caster.distance_to(point);
    if distance > ability.range + RANGE_TOLERANCE {
        return Err(CastRejected::OutOfRange {
            distance,
            range: ability.range,
        });
    }
    Ok(())
}

/// Full usability check: ready, and in range of `target` when one is given.
pub fn check_usable(
    world: &dyn Battlefield,
    caster: &Combatant,
    ability: &Ability,
    target: CastTarget,
) -> Result<(), CastRejected> {
    check_ready(caster, ability)?;
    match target {
        CastTarget::SelfCast => Ok(()),
        CastTarget::Point(point) => check_range(caster, ability, point),
        CastTarget::Entity(id) => {
            let target = world.combatant(id).ok_or(CastRejected::TargetUnavailable)?;
            if !target.is_alive() && !(target.health.downed && reaches_downed(ability)) {
                return Err(CastRejected::TargetUnavailable);
            }
            check_range(caster, ability, target.position)
        }
    }
}

/// The target a delivery kind actually resolves against.
///
/// Self-delivered abilities always land on the caster. Every other kind needs
/// a point or an entity, and beams need an entity.
pub fn resolve_target(ability: &Ability, target: CastTarget) -> Result<CastTarget, CastRejected> {
    if ability.delivery.is_self_delivered() {
        return Ok(CastTarget::SelfCast);
    }
    if target == CastTarget::SelfCast {
        return Err(CastRejected::MissingTarget);
    }
    if matches!(ability.delivery, DeliveryKind::Beam { .. }) && !matches!(target, CastTarget::Entity(_)) {
        return Err(CastRejected::MissingTarget);
    }
    Ok(target)
}

/// Validate, pay for and deliver an ability.
///
/// Cost and cooldown are deducted here and nowhere else.
pub fn execute_ability(
    ctx: &mut Resolver,
    caster_id: Entity,
    ability: &Arc<Ability>,
    target: CastTarget,
) -> Result<(), CastRejected> {
    let caster = ctx
        .world
        .combatant(caster_id)
        .ok_or(CastRejected::CasterUnavailable)?;

    let known = caster.abilities.contains(&ability.id) || caster.default_attack.as_ref() == Some(&ability.id);
    if !known {
        return Err(CastRejected::NotKnown(ability.id.clone()));
    }

    let target = resolve_target(ability, target)?;
    check_usable(&*ctx.world, caster, ability, target)?;

    let origin = caster.position;
    let caster_name = caster.name.clone();

    // Pay
    let Some(caster) = ctx.world.combatant_mut(caster_id) else {
        return Err(CastRejected::CasterUnavailable);
    };
    if ability.cost > 0.0 {
        if let Some(pool) = caster.resource.as_mut() {
            pool.current = (pool.current - ability.cost).max(0.0);
        }
    }
    if ability.cooldown > 0.0 {
        caster.cooldowns.insert(ability.id.clone(), ability.cooldown);
    }

    let target_entity = match target {
        CastTarget::SelfCast => Some(caster_id),
        CastTarget::Entity(id) => Some(id),
        CastTarget::Point(_) => None,
    };

    debug!("{} uses {}", caster_name, ability.name);
    ctx.notify(CombatEvent::CastStarted {
        caster: caster_id,
        ability: ability.id.clone(),
        target: target_entity,
    });

    let aim = match target {
        CastTarget::SelfCast => origin,
        CastTarget::Point(point) => point,
        CastTarget::Entity(id) => ctx.world.position_of(id).unwrap_or(origin),
    };
    let destination = match target {
        CastTarget::Entity(id) => Destination::Entity(id),
        CastTarget::SelfCast => Destination::Point(origin),
        CastTarget::Point(point) => Destination::Point(point),
    };

    match ability.delivery {
        DeliveryKind::Melee | DeliveryKind::GroundPlacement | DeliveryKind::SelfCast => {
            resolve_contact(ctx, caster_id, ability, immediate_contact(ability, target, aim, caster_id));
        }
        DeliveryKind::Teleport => {
            let landing = match target {
                // Arrive beside the target, not inside it
                CastTarget::Entity(_) => aim + (origin - aim).normalize_or_zero() * BODY_RADIUS * 2.0,
                _ => aim,
            };
            if let Some(caster) = ctx.world.combatant_mut(caster_id) {
                caster.position = landing;
            }
            resolve_contact(ctx, caster_id, ability, immediate_contact(ability, target, landing, caster_id));
        }
        DeliveryKind::Projectile { speed } => {
            ctx.spawned.push(CombatTask::Travel(TravelTask::new(
                caster_id,
                ability.clone(),
                destination,
                Carrier::Missile,
                origin,
                speed,
            )));
        }
        DeliveryKind::Leap { speed } | DeliveryKind::Charge { speed } => {
            ctx.spawned.push(CombatTask::Travel(TravelTask::new(
                caster_id,
                ability.clone(),
                destination,
                Carrier::Caster,
                origin,
                speed,
            )));
        }
        DeliveryKind::Beam {
            tick_interval,
            drain_per_tick,
            max_duration,
        } => {
            let Some(beam_target) = target_entity else {
                return Err(CastRejected::MissingTarget);
            };
            ctx.spawned.push(CombatTask::Channel(ChannelTask::new(
                caster_id,
                beam_target,
                ability.clone(),
                tick_interval,
                drain_per_tick,
                (max_duration > 0.0).then_some(max_duration),
            )));
        }
    }

    Ok(())
}

fn immediate_contact(ability: &Ability, target: CastTarget, aim: Vec3, caster: Entity) -> Contact {
    if ability.is_area() {
        return Contact::Area(aim);
    }
    match target {
        CastTarget::Entity(id) => Contact::Entity(id),
        CastTarget::SelfCast => Contact::Entity(caster),
        CastTarget::Point(point) => Contact::Area(point),
    }
}

/// What an ability touched.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Contact {
    /// A single struck entity
    Entity(Entity),
    /// Everything within the ability's area radius of a point
    Area(Vec3),
}

/// Apply the ability's effect lists to everything it touched.
///
/// Returns the number of distinct entities that received a non-empty list.
pub fn resolve_contact(ctx: &mut Resolver, caster_id: Entity, ability: &Ability, contact: Contact) -> usize {
    let Some(caster) = CasterSnapshot::capture(&*ctx.world, caster_id) else {
        warn!("Contact for {} resolved without a caster record", ability.name);
        return 0;
    };

    let struck: Vec<Entity> = match contact {
        Contact::Entity(id) => vec![id],
        Contact::Area(center) => {
            let mut seen = HashSet::new();
            ctx.world
                .contacts_within(center, ability.area_radius, Layers::COMBATANTS)
                .into_iter()
                .filter(|hit| seen.insert(hit.entity))
                .map(|hit| hit.entity)
                .collect()
        }
    };

    let mut affected = 0;
    for target in struck {
        let Some(faction) = ctx.world.combatant(target).map(|c| c.faction) else {
            continue;
        };
        let effects = ability.effects_for(is_ally(caster.faction, faction));
        if effects.is_empty() {
            continue;
        }
        for effect in effects {
            effect.apply(ctx, &caster, target);
        }
        affected += 1;
    }
    affected
}
