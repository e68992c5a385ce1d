//! Selector tuning
//!
//! Thresholds and radii used by the ability selectors, loadable from RON with
//! every field optional.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::combatant::SIEGE_OBJECTIVE_TAG;
use super::constants::{AI_DECISION_HZ, TIME_EPSILON};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Self health fraction below which the Survival branch runs
    pub defensive_threshold: f32,
    /// Target health fraction below which Finishers are preferred
    pub finisher_threshold: f32,
    /// Radius around the target for counting clustered enemies
    pub crowd_radius: f32,
    /// Clustered enemies needed to prefer AOE damage
    pub aoe_threshold: usize,
    /// Ally health fraction that counts as "needs healing"
    pub heal_threshold: f32,
    /// Wounded allies needed to prefer AOE healing
    pub ally_aoe_threshold: usize,
    /// Radius a support companion scans for allies
    pub ally_scan_radius: f32,
    /// Radius for acquiring a new hostile target
    pub aggro_radius: f32,
    /// Tag that marks high-value targets, and its score multiplier
    pub priority_tag: Option<String>,
    pub priority_multiplier: f32,
    pub require_line_of_sight: bool,
    /// Decisions per second for autonomous actors (0 = every step)
    pub decision_hz: f32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            defensive_threshold: 0.4,
            finisher_threshold: 0.2,
            crowd_radius: 5.0,
            aoe_threshold: 3,
            heal_threshold: 0.7,
            ally_aoe_threshold: 3,
            ally_scan_radius: 15.0,
            aggro_radius: 30.0,
            priority_tag: Some(SIEGE_OBJECTIVE_TAG.to_string()),
            priority_multiplier: 2.0,
            require_line_of_sight: true,
            decision_hz: AI_DECISION_HZ,
        }
    }
}

impl SelectorConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("defensive_threshold", self.defensive_threshold),
            ("finisher_threshold", self.finisher_threshold),
            ("heal_threshold", self.heal_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be between 0.0 and 1.0, got {}", name, value));
            }
        }
        if self.crowd_radius < 0.0 || self.ally_scan_radius < 0.0 || self.aggro_radius < 0.0 {
            return Err("Radii cannot be negative".to_string());
        }
        if self.priority_multiplier <= 0.0 {
            return Err("priority_multiplier must be positive".to_string());
        }
        if self.decision_hz < 0.0 {
            return Err("decision_hz cannot be negative".to_string());
        }
        Ok(())
    }
}

/// Parse and validate a selector config from RON text.
pub fn parse_selector_config(contents: &str) -> Result<SelectorConfig, String> {
    let config: SelectorConfig =
        ron::from_str(contents).map_err(|e| format!("Failed to parse selector config: {}", e))?;
    config.validate()?;
    Ok(config)
}

/// Load selector tuning from a RON file such as `assets/config/selector.ron`.
pub fn load_selector_config(path: &str) -> Result<SelectorConfig, String> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path, e))?;
    let config = parse_selector_config(&contents)?;
    info!("Loaded selector config from {}", path);
    Ok(config)
}

/// Throttle for an actor's decision rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecisionCadence {
    interval: f32,
    until_next: f32,
}

impl DecisionCadence {
    /// `hz <= 0` decides every step (player-driven actors).
    pub fn new(hz: f32) -> Self {
        let interval = if hz > 0.0 { 1.0 / hz } else { 0.0 };
        Self {
            interval,
            until_next: 0.0,
        }
    }

    /// Advance by `dt`; returns true when a decision is due this step.
    pub fn tick(&mut self, dt: f32) -> bool {
        if self.interval <= 0.0 {
            return true;
        }
        self.until_next -= dt;
        if self.until_next <= TIME_EPSILON {
            // Never bank more than one decision
            self.until_next = (self.until_next + self.interval).max(0.0);
            return true;
        }
        false
    }
}
