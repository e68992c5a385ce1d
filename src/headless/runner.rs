//! Headless skirmish execution
//!
//! Drives the combat engine inside a Bevy app with no window or renderer.
//! The arena, the engine and the combat log are resources; one system moves
//! actors toward their targets, steps the engine, and a second one watches
//! for the end of the skirmish.

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::combat::ability::load_ability_library;
use crate::combat::log::{CombatLog, CombatLogEntry, CombatLogEventType};
use crate::combat::stats::Stat;
use crate::combat::status::load_status_library;
use crate::combat::world::Battlefield;
use crate::combat::{AbilityLibrary, Brain, CombatEngine, StatusLibrary};

use super::arena::Arena;
use super::config::ScenarioConfig;

/// Fixed simulation step (60 Hz)
pub const STEP_SECONDS: f32 = 1.0 / 60.0;

/// Movement speed for combatants without a MoveSpeed stat
const DEFAULT_MOVE_SPEED: f32 = 4.0;

/// Actors stop this fraction of their engagement range short of the target
const ENGAGEMENT_SLACK: f32 = 0.9;

/// Result of a completed headless skirmish
#[derive(Debug, Clone, Serialize)]
pub struct SkirmishResult {
    pub scenario: String,
    /// The winning faction, or None for a draw
    pub winner: Option<u8>,
    /// Simulated duration in seconds
    pub duration: f32,
    pub combatants: Vec<CombatantResult>,
    /// Random seed used (if deterministic mode)
    pub random_seed: Option<u64>,
}

/// Statistics for a single combatant after the skirmish
#[derive(Debug, Clone, Serialize)]
pub struct CombatantResult {
    pub name: String,
    pub faction: u8,
    pub max_health: f32,
    /// Health remaining at the end (0 if downed)
    pub final_health: f32,
    pub survived: bool,
    pub damage_dealt: f32,
    pub damage_taken: f32,
    pub healing_done: f32,
    pub final_position: (f32, f32, f32),
}

/// What gets written to disk: the result plus the full combat log.
#[derive(Serialize)]
struct SkirmishSummary<'a> {
    result: &'a SkirmishResult,
    log: &'a [CombatLogEntry],
}

/// Resource to track headless skirmish state
#[derive(Resource)]
pub struct HeadlessSkirmishState {
    pub scenario: String,
    /// Maximum duration before declaring a draw
    pub max_duration: f32,
    pub elapsed_time: f32,
    /// Custom output path for the summary
    pub output_path: Option<String>,
    pub complete: bool,
    pub random_seed: Option<u64>,
    /// Populated when the skirmish completes
    pub result: Option<SkirmishResult>,
}

/// Core simulation systems. Expects `Arena`, `CombatEngine` and `CombatLog`
/// resources to be present.
pub struct SkirmishPlugin;

impl Plugin for SkirmishPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CombatLog>()
            .add_systems(Update, (move_toward_targets, advance_skirmish).chain());
    }
}

/// Plugin for headless skirmish execution
pub struct HeadlessPlugin {
    pub config: ScenarioConfig,
    pub abilities: AbilityLibrary,
    pub statuses: StatusLibrary,
}

impl Plugin for HeadlessPlugin {
    fn build(&self, app: &mut App) {
        let (arena, engine, log) = match build_skirmish(&self.config, self.abilities.clone(), self.statuses.clone()) {
            Ok(parts) => parts,
            Err(e) => {
                error!("Invalid scenario: {}", e);
                return;
            }
        };

        app.insert_resource(arena)
            .insert_resource(engine)
            .insert_resource(log)
            .insert_resource(HeadlessSkirmishState {
                scenario: self.config.name.clone(),
                max_duration: self.config.max_duration_secs,
                elapsed_time: 0.0,
                output_path: self.config.output_path.clone(),
                complete: false,
                random_seed: self.config.random_seed,
                result: None,
            })
            .add_plugins(SkirmishPlugin)
            .add_systems(
                Update,
                (headless_track_time, headless_check_skirmish_end)
                    .chain()
                    .after(advance_skirmish),
            );
    }
}

/// Build the arena, engine and log for a scenario.
pub fn build_skirmish(
    config: &ScenarioConfig,
    abilities: AbilityLibrary,
    statuses: StatusLibrary,
) -> Result<(Arena, CombatEngine, CombatLog), String> {
    config.validate()?;
    config.validate_abilities(&abilities)?;

    match config.random_seed {
        Some(seed) => info!("Using deterministic RNG with seed: {}", seed),
        None => info!("Using non-deterministic RNG (no seed provided)"),
    }
    let mut engine = CombatEngine::with_seed(abilities, statuses, config.selector_config(), config.random_seed);
    let mut arena = Arena::new();
    let mut log = CombatLog::default();

    for obstacle in &config.obstacles {
        arena.add_obstacle(Vec3::from_array(obstacle.position), obstacle.radius);
    }

    for entry in &config.combatants {
        let id = arena.allocate();
        arena.insert(entry.to_combatant(id));
        log.register_combatant(id, entry.name.clone());
        if let Some(brain) = entry.to_brain() {
            engine.register_actor(id, brain);
        }
    }

    log.log(
        CombatLogEventType::MatchEvent,
        format!("Skirmish '{}' started (headless mode)!", config.name),
    );
    info!(
        "Headless skirmish setup complete: {} combatants, {} obstacles",
        config.combatants.len(),
        config.obstacles.len()
    );

    Ok((arena, engine, log))
}

/// Move every autonomous actor toward its current target until it is within
/// engagement range. Structures and actors paused by a task stay put.
pub fn move_toward_targets(time: Res<Time>, mut arena: ResMut<Arena>, engine: Res<CombatEngine>) {
    let dt = time.delta_secs();
    if dt <= 0.0 {
        return;
    }

    for id in arena.combatant_ids() {
        match engine.brain(id) {
            None | Some(Brain::Defense(_)) => continue,
            Some(_) => {}
        }
        if engine.is_paused(id) {
            continue;
        }
        let Some(actor) = arena.combatant(id).filter(|c| c.is_alive()) else {
            continue;
        };
        let Some(goal) = actor.target.and_then(|t| arena.position_of(t)) else {
            continue;
        };
        let speed = actor
            .stats
            .as_ref()
            .map(|s| s.get(Stat::MoveSpeed))
            .filter(|s| *s > 0.0)
            .unwrap_or(DEFAULT_MOVE_SPEED);
        let stop = engine
            .engagement_range(&*arena, id)
            .map(|range| range * ENGAGEMENT_SLACK)
            .unwrap_or(1.0);

        arena.approach(id, goal, stop, speed, dt);
    }
}

/// Advance cooldowns, statuses, tasks and decisions by one frame.
pub fn advance_skirmish(
    time: Res<Time>,
    mut arena: ResMut<Arena>,
    mut engine: ResMut<CombatEngine>,
    mut log: ResMut<CombatLog>,
) {
    let dt = time.delta_secs();
    if dt <= 0.0 {
        return;
    }
    log.match_time += dt;
    engine.step(&mut *arena, &mut *log, dt);
}

fn headless_track_time(time: Res<Time>, mut state: ResMut<HeadlessSkirmishState>) {
    if !state.complete {
        state.elapsed_time += time.delta_secs();
    }
}

/// Factions with at least one combatant still standing, in ascending order.
pub fn standing_factions(arena: &Arena) -> BTreeSet<u8> {
    arena
        .combatants()
        .filter(|c| c.is_alive())
        .map(|c| c.faction.0)
        .collect()
}

/// Check if the skirmish has ended (one faction left, or timeout)
fn headless_check_skirmish_end(
    arena: Res<Arena>,
    mut log: ResMut<CombatLog>,
    mut state: ResMut<HeadlessSkirmishState>,
) {
    if state.complete {
        return;
    }

    let standing = standing_factions(&arena);
    let winner = if state.elapsed_time >= state.max_duration {
        info!("Skirmish timed out after {:.1}s - declaring DRAW", state.elapsed_time);
        None
    } else if standing.len() <= 1 {
        let winner = standing.iter().next().copied();
        match winner {
            Some(faction) => info!("Skirmish ended! Faction {} wins!", faction),
            None => info!("Skirmish ended in a DRAW (everyone is down)!"),
        }
        winner
    } else {
        return;
    };

    log.log(
        CombatLogEventType::MatchEvent,
        match winner {
            Some(faction) => format!("Faction {} wins", faction),
            None => "Draw".to_string(),
        },
    );

    let result = build_skirmish_result(&arena, winner, &state);
    match save_skirmish_summary(&result, &log, state.output_path.as_deref()) {
        Ok(filename) => println!("Skirmish complete. Log saved to: {}", filename),
        Err(e) => eprintln!("Failed to save combat log: {}", e),
    }
    state.result = Some(result);
    state.complete = true;
}

/// Build the SkirmishResult from current combatant state
pub fn build_skirmish_result(arena: &Arena, winner: Option<u8>, state: &HeadlessSkirmishState) -> SkirmishResult {
    let combatants = arena
        .combatants()
        .map(|c| CombatantResult {
            name: c.name.clone(),
            faction: c.faction.0,
            max_health: c.health.max,
            final_health: c.health.current,
            survived: c.is_alive(),
            damage_dealt: c.damage_dealt,
            damage_taken: c.damage_taken,
            healing_done: c.healing_done,
            final_position: (c.position.x, c.position.y, c.position.z),
        })
        .collect();

    SkirmishResult {
        scenario: state.scenario.clone(),
        winner,
        duration: state.elapsed_time,
        combatants,
        random_seed: state.random_seed,
    }
}

/// Write the result and log as pretty JSON. Returns the file name used.
pub fn save_skirmish_summary(
    result: &SkirmishResult,
    log: &CombatLog,
    output_path: Option<&str>,
) -> Result<String, Box<dyn std::error::Error>> {
    let filename = match output_path {
        Some(path) => path.to_string(),
        None => {
            std::fs::create_dir_all("skirmish_logs")?;
            let stamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
            format!("skirmish_logs/skirmish_{}.json", stamp)
        }
    };

    let summary = SkirmishSummary {
        result,
        log: &log.entries,
    };
    std::fs::write(&filename, serde_json::to_string_pretty(&summary)?)?;
    Ok(filename)
}

/// Run a headless skirmish with the given configuration.
///
/// `log_filter` installs Bevy's log plugin with that filter; pass None when
/// the caller already owns a tracing subscriber (tests).
pub fn run_headless_skirmish(config: ScenarioConfig, log_filter: Option<String>) -> Result<SkirmishResult, String> {
    println!("Starting headless skirmish simulation...");
    println!("  Scenario: {}", config.name);
    println!("  Combatants: {}", config.combatants.len());
    println!("  Max duration: {:.0}s", config.max_duration_secs);

    let statuses = load_status_library(&config.statuses_path)?;
    let abilities = load_ability_library(&config.abilities_path, &statuses)?;
    // Fail here rather than inside plugin build
    build_skirmish(&config, abilities.clone(), statuses.clone())?;

    let max_updates = (config.max_duration_secs / STEP_SECONDS).ceil() as u64 + 2;

    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f32(STEP_SECONDS)));
    if let Some(filter) = log_filter {
        app.add_plugins(bevy::log::LogPlugin {
            filter,
            ..default()
        });
    }
    app.add_plugins(HeadlessPlugin {
        config,
        abilities,
        statuses,
    });
    app.finish();
    app.cleanup();

    // The first update only primes the clock
    for _ in 0..=max_updates {
        app.update();
        if app.world().resource::<HeadlessSkirmishState>().complete {
            break;
        }
    }

    app.world_mut()
        .resource_mut::<HeadlessSkirmishState>()
        .result
        .take()
        .ok_or_else(|| "Skirmish did not finish".to_string())
}
