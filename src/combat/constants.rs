//! Combat Constants
//!
//! Centralized location for magic numbers used throughout the combat core.
//! Thresholds that designers tune per encounter live in `SelectorConfig`
//! instead; these are the fixed rules of resolution.

// ============================================================================
// Critical Strikes
// ============================================================================

/// Multiplier applied to damage and healing on a critical roll.
pub const CRIT_MULTIPLIER: f32 = 1.5;

// ============================================================================
// Mitigation
// ============================================================================

/// Armor constant for physical mitigation: reduction = armor / (armor + K).
pub const ARMOR_MITIGATION_K: f32 = 400.0;

/// Resistance constant for magical mitigation: reduction = res / (res + K).
pub const RESISTANCE_MITIGATION_K: f32 = 200.0;

/// Mitigation never removes more than this fraction of a hit.
pub const MAX_MITIGATION: f32 = 0.75;

// ============================================================================
// Derived Stats
// ============================================================================

/// Attack power granted per point of Strength.
pub const ATTACK_POWER_PER_STRENGTH: f32 = 2.0;

/// Spell power granted per point of Intellect.
pub const SPELL_POWER_PER_INTELLECT: f32 = 1.0;

/// Crit chance (0.0-1.0) granted per point of Agility.
pub const CRIT_CHANCE_PER_AGILITY: f32 = 0.001;

/// Healing bonus (percent) granted per point of Spirit.
pub const HEALING_BONUS_PER_SPIRIT: f32 = 0.1;

// ============================================================================
// Delivery
// ============================================================================

/// A traveling carrier (projectile, leaping caster) connects within this distance.
pub const HIT_DISTANCE: f32 = 0.5;

/// Body radius used for line-of-sight tests against combatants.
pub const BODY_RADIUS: f32 = 0.5;

/// Extra reach allowed on range checks so units standing at max range still connect.
pub const RANGE_TOLERANCE: f32 = 0.05;

// ============================================================================
// Timing
// ============================================================================

/// Timers within this distance of zero are considered elapsed.
///
/// Simulation steps accumulate float error (10 x 0.1 != 1.0), so every
/// countdown in the core compares against this instead of exactly 0.0.
pub const TIME_EPSILON: f32 = 1e-4;

/// Most periodic ticks a status or channel fires in one simulation step.
pub const MAX_TICKS_PER_STEP: u32 = 16;

/// Decision cadence for autonomous AI actors (decisions per second).
pub const AI_DECISION_HZ: f32 = 4.0;
