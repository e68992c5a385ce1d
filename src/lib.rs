//! Skirmish - decision and resolution core for real-time party combat
//!
//! Faction verdicts, target acquisition, the effect pipeline, timed status
//! effects, autonomous ability selectors and ability delivery, plus a
//! headless Bevy runner that plays JSON scenarios.
//!
//! This library exposes the core modules for testing and reuse.

pub mod cli;
pub mod combat;
pub mod headless;

// Re-export commonly used types
pub use combat::log::{CombatLog, CombatLogEventType};
pub use combat::{Battlefield, CombatEngine};
pub use headless::{Arena, ScenarioConfig, SkirmishResult};
