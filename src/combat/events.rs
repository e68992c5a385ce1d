//! Combat events
//!
//! Notifications emitted to the presentation collaborator. They are
//! fire-and-forget: a notifier can observe a resolution but never alter it.

use bevy::prelude::*;

use super::ability::AbilityId;
use super::effects::DamageType;
use super::status::StatusId;
use super::tasks::StopReason;

/// A resolved combat event
#[derive(Clone, Debug, PartialEq)]
pub enum CombatEvent {
    /// An ability passed its checks and started delivery
    CastStarted {
        caster: Entity,
        ability: AbilityId,
        target: Option<Entity>,
    },
    /// A channel, sequence or traveling delivery ended
    CastStopped {
        caster: Entity,
        ability: Option<AbilityId>,
        reason: StopReason,
    },
    Damage {
        source: Option<Entity>,
        target: Entity,
        /// Amount after mitigation
        amount: f32,
        is_critical: bool,
        damage_type: DamageType,
    },
    Healing {
        source: Option<Entity>,
        target: Entity,
        amount: f32,
        is_critical: bool,
    },
    ResourceRestored {
        source: Option<Entity>,
        target: Entity,
        amount: f32,
    },
    StatusApplied {
        source: Option<Entity>,
        target: Entity,
        status: StatusId,
        /// Duration in seconds (None for infinite)
        duration: Option<f32>,
        is_buff: bool,
    },
    StatusRemoved {
        target: Entity,
        status: StatusId,
        reason: StatusRemovalReason,
    },
    Downed {
        target: Entity,
        source: Option<Entity>,
    },
    Revived {
        target: Entity,
        source: Option<Entity>,
    },
    /// A sequence step asked the presentation layer to play an animation
    Animation {
        actor: Entity,
        name: String,
    },
}

/// Reason a status instance ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusRemovalReason {
    /// Duration elapsed
    Expired,
    /// Cleared externally (dispel, cleanse)
    Cleared,
    /// Target died or was purged
    Purged,
    /// Replaced by a new application of the same status
    Replaced,
}

/// Presentation collaborator.
pub trait CombatNotifier {
    fn notify(&mut self, event: &CombatEvent);
}

/// Notifier that keeps every event, for inspection.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Vec<CombatEvent>,
}

impl CombatNotifier for RecordingNotifier {
    fn notify(&mut self, event: &CombatEvent) {
        self.events.push(event.clone());
    }
}

impl RecordingNotifier {
    /// Damage events landing on `target`
    pub fn damage_to(&self, target: Entity) -> Vec<(f32, bool)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                CombatEvent::Damage {
                    target: t,
                    amount,
                    is_critical,
                    ..
                } if *t == target => Some((*amount, *is_critical)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&CombatEvent) -> bool) -> usize {
        self.events.iter().filter(|e| predicate(e)).count()
    }
}
