//! Unit tests for the combat log
//!
//! These tests verify that the CombatLog correctly:
//! - Turns combat events into readable entries
//! - Stamps entries with skirmish time
//! - Filters entries by type
//! - Skips presentation-only events

use bevy::prelude::*;

use skirmish::combat::ability::AbilityId;
use skirmish::combat::effects::DamageType;
use skirmish::combat::events::{CombatEvent, CombatNotifier, StatusRemovalReason};
use skirmish::combat::status::StatusId;
use skirmish::combat::tasks::StopReason;
use skirmish::{CombatLog, CombatLogEventType};

fn create_test_log() -> (CombatLog, Entity, Entity) {
    let mut log = CombatLog::default();
    let wolf = Entity::from_raw(1);
    let knight = Entity::from_raw(2);
    log.register_combatant(wolf, "Alpha Wolf");
    log.register_combatant(knight, "Warden");
    (log, wolf, knight)
}

fn damage(source: Option<Entity>, target: Entity, amount: f32, is_critical: bool) -> CombatEvent {
    CombatEvent::Damage {
        source,
        target,
        amount,
        is_critical,
        damage_type: DamageType::Physical,
    }
}

// =============================================================================
// Formatting
// =============================================================================

#[test]
fn test_damage_message() {
    let (mut log, wolf, knight) = create_test_log();
    log.notify(&damage(Some(wolf), knight, 12.0, false));
    log.notify(&damage(Some(wolf), knight, 18.0, true));

    assert_eq!(log.entries[0].message, "Alpha Wolf hits Warden for 12 physical damage");
    assert_eq!(log.entries[1].message, "Alpha Wolf hits Warden for 18 physical damage (critical)");
    assert_eq!(log.entries[0].event_type, CombatLogEventType::Damage);
}

#[test]
fn test_unknown_source_is_named() {
    let (mut log, _, knight) = create_test_log();
    log.notify(&damage(None, knight, 6.0, false));
    assert_eq!(log.entries[0].message, "Unknown hits Warden for 6 physical damage");
}

#[test]
fn test_cast_messages() {
    let (mut log, wolf, knight) = create_test_log();
    log.notify(&CombatEvent::CastStarted {
        caster: wolf,
        ability: AbilityId::from("pounce"),
        target: Some(knight),
    });
    log.notify(&CombatEvent::CastStarted {
        caster: wolf,
        ability: AbilityId::from("harden"),
        target: Some(wolf),
    });
    log.notify(&CombatEvent::CastStopped {
        caster: wolf,
        ability: None,
        reason: StopReason::CasterLost,
    });

    let messages: Vec<&str> = log.entries.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "Alpha Wolf casts pounce on Warden",
            "Alpha Wolf casts harden",
            "Alpha Wolf's sequence ended (caster lost)",
        ]
    );
}

#[test]
fn test_status_messages() {
    let (mut log, _, knight) = create_test_log();
    log.notify(&CombatEvent::StatusApplied {
        source: None,
        target: knight,
        status: StatusId::from("bleed"),
        duration: Some(10.0),
        is_buff: false,
    });
    log.notify(&CombatEvent::StatusRemoved {
        target: knight,
        status: StatusId::from("bleed"),
        reason: StatusRemovalReason::Expired,
    });

    assert_eq!(log.entries[0].message, "Warden gains bleed (10s)");
    assert_eq!(log.entries[1].message, "bleed fades from Warden");
}

#[test]
fn test_animation_is_not_logged() {
    let (mut log, wolf, _) = create_test_log();
    log.notify(&CombatEvent::Animation {
        actor: wolf,
        name: "howl".to_string(),
    });
    assert!(log.entries.is_empty());
}

// =============================================================================
// Queries
// =============================================================================

#[test]
fn test_entries_use_skirmish_time() {
    let (mut log, wolf, knight) = create_test_log();
    log.match_time = 3.5;
    log.notify(&damage(Some(wolf), knight, 5.0, false));
    assert_eq!(log.entries[0].timestamp, 3.5);
}

#[test]
fn test_filter_and_recent() {
    let (mut log, wolf, knight) = create_test_log();
    log.log(CombatLogEventType::MatchEvent, "Skirmish started".to_string());
    log.notify(&damage(Some(wolf), knight, 5.0, false));
    log.notify(&CombatEvent::Healing {
        source: Some(knight),
        target: knight,
        amount: 4.0,
        is_critical: false,
    });
    log.notify(&CombatEvent::Downed {
        target: knight,
        source: Some(wolf),
    });

    assert_eq!(log.filter_by_type(CombatLogEventType::Damage).len(), 1);
    assert_eq!(log.hp_changes_only().len(), 2);
    let recent: Vec<&str> = log.recent(2).iter().map(|e| e.message.as_str()).collect();
    assert_eq!(recent, vec!["Warden heals Warden for 4", "Warden is downed by Alpha Wolf"]);

    log.clear();
    assert!(log.entries.is_empty());
    assert_eq!(log.match_time, 0.0);
}
