//! Headless mode for automated testing
//!
//! Runs skirmishes without any graphical output. A JSON scenario lists the
//! combatants, their factions, brains, stats and ability loadouts; the ability
//! and status definitions come from the RON content files.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release -- --scenario scenarios/wolf_den.json
//! ```
//!
//! ## JSON Configuration
//!
//! ```json
//! {
//!   "name": "duel",
//!   "combatants": [
//!     { "name": "Wolf", "faction": 2, "brain": "Creature", "max_health": 80,
//!       "position": [10, 0, 0], "abilities": ["bite"] },
//!     { "name": "Guard", "faction": 1, "brain": "Companion", "max_health": 120,
//!       "default_attack": "slash" }
//!   ],
//!   "max_duration_secs": 60
//! }
//! ```

pub mod arena;
pub mod config;
pub mod runner;

pub use arena::Arena;
pub use config::ScenarioConfig;
pub use runner::{run_headless_skirmish, SkirmishPlugin, SkirmishResult};
