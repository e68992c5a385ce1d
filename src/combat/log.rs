//! Combat logging
//!
//! Records all combat events for display and post-skirmish analysis.

use bevy::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

use super::events::{CombatEvent, CombatNotifier, StatusRemovalReason};

/// A single entry in the combat log
#[derive(Debug, Clone, Serialize)]
pub struct CombatLogEntry {
    /// Timestamp in skirmish time (seconds since start)
    pub timestamp: f32,
    /// The type of event
    pub event_type: CombatLogEventType,
    /// Human-readable description of the event
    pub message: String,
}

/// Types of combat log events for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CombatLogEventType {
    /// Damage dealt
    Damage,
    /// Healing done or resource restored
    Healing,
    /// Ability cast started or stopped
    AbilityUsed,
    /// Buff/debuff applied
    StatusApplied,
    /// Buff/debuff removed
    StatusRemoved,
    /// Combatant downed or revived
    Death,
    /// Skirmish event (start, end, etc.)
    MatchEvent,
}

/// The combat log resource storing all events
#[derive(Resource, Default)]
pub struct CombatLog {
    /// All log entries in chronological order
    pub entries: Vec<CombatLogEntry>,
    /// Current skirmish time
    pub match_time: f32,
    names: HashMap<Entity, String>,
}

impl CombatLog {
    /// Clear the log for a new skirmish
    pub fn clear(&mut self) {
        self.entries.clear();
        self.match_time = 0.0;
    }

    /// Remember a display name for log messages
    pub fn register_combatant(&mut self, id: Entity, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    fn name(&self, id: Entity) -> String {
        self.names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("{:?}", id))
    }

    fn source_name(&self, id: Option<Entity>) -> String {
        id.map(|id| self.name(id)).unwrap_or_else(|| "Unknown".to_string())
    }

    /// Add a new entry to the log
    pub fn log(&mut self, event_type: CombatLogEventType, message: String) {
        self.entries.push(CombatLogEntry {
            timestamp: self.match_time,
            event_type,
            message,
        });
    }

    /// Get entries filtered by event type
    pub fn filter_by_type(&self, event_type: CombatLogEventType) -> Vec<&CombatLogEntry> {
        self.entries
            .iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    /// Get only HP-changing events (damage and healing)
    pub fn hp_changes_only(&self) -> Vec<&CombatLogEntry> {
        self.entries
            .iter()
            .filter(|e| {
                matches!(
                    e.event_type,
                    CombatLogEventType::Damage | CombatLogEventType::Healing
                )
            })
            .collect()
    }

    /// Get the last N entries
    pub fn recent(&self, count: usize) -> Vec<&CombatLogEntry> {
        self.entries.iter().rev().take(count).rev().collect()
    }
}

impl CombatNotifier for CombatLog {
    fn notify(&mut self, event: &CombatEvent) {
        let (event_type, message) = match event {
            CombatEvent::CastStarted { caster, ability, target } => {
                let message = match target {
                    Some(target) if target != caster => {
                        format!("{} casts {} on {}", self.name(*caster), ability, self.name(*target))
                    }
                    _ => format!("{} casts {}", self.name(*caster), ability),
                };
                (CombatLogEventType::AbilityUsed, message)
            }
            CombatEvent::CastStopped { caster, ability, reason } => {
                let what = ability.as_ref().map(|a| a.to_string()).unwrap_or_else(|| "sequence".to_string());
                (
                    CombatLogEventType::AbilityUsed,
                    format!("{}'s {} ended ({})", self.name(*caster), what, reason),
                )
            }
            CombatEvent::Damage {
                source,
                target,
                amount,
                is_critical,
                damage_type,
            } => (
                CombatLogEventType::Damage,
                format!(
                    "{} hits {} for {:.0} {} damage{}",
                    self.source_name(*source),
                    self.name(*target),
                    amount,
                    damage_type.name(),
                    if *is_critical { " (critical)" } else { "" }
                ),
            ),
            CombatEvent::Healing {
                source,
                target,
                amount,
                is_critical,
            } => (
                CombatLogEventType::Healing,
                format!(
                    "{} heals {} for {:.0}{}",
                    self.source_name(*source),
                    self.name(*target),
                    amount,
                    if *is_critical { " (critical)" } else { "" }
                ),
            ),
            CombatEvent::ResourceRestored { source, target, amount } => (
                CombatLogEventType::Healing,
                format!(
                    "{} restores {:.0} resource to {}",
                    self.source_name(*source),
                    amount,
                    self.name(*target)
                ),
            ),
            CombatEvent::StatusApplied {
                target,
                status,
                duration,
                ..
            } => {
                let length = duration.map(|d| format!(" ({:.0}s)", d)).unwrap_or_default();
                (
                    CombatLogEventType::StatusApplied,
                    format!("{} gains {}{}", self.name(*target), status, length),
                )
            }
            CombatEvent::StatusRemoved { target, status, reason } => {
                let how = match reason {
                    StatusRemovalReason::Expired => "fades from",
                    StatusRemovalReason::Cleared => "is cleared from",
                    StatusRemovalReason::Purged => "is purged from",
                    StatusRemovalReason::Replaced => "is replaced on",
                };
                (
                    CombatLogEventType::StatusRemoved,
                    format!("{} {} {}", status, how, self.name(*target)),
                )
            }
            CombatEvent::Downed { target, source } => (
                CombatLogEventType::Death,
                format!("{} is downed by {}", self.name(*target), self.source_name(*source)),
            ),
            CombatEvent::Revived { target, source } => (
                CombatLogEventType::Death,
                format!("{} is revived by {}", self.name(*target), self.source_name(*source)),
            ),
            // Presentation-only
            CombatEvent::Animation { .. } => return,
        };
        self.log(event_type, message);
    }
}
