//! Integration tests for the ability selectors
//!
//! These tests verify that:
//! - The creature tree honors its tier order (survival, finisher, crowd,
//!   opener, pursuit, fallback)
//! - Every returned decision passes the usability check
//! - Ties are broken uniformly, and a unique best never consults the RNG
//! - Openers are used once per engagement
//! - Support companions heal before fighting
//! - Defenses fire auras and aim each turret on its own

mod common;

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use common::{ability, true_damage, CountingRng, Harness};
use skirmish::combat::ability::{Ability, AbilityCategory, AbilityId, AbilityLibrary, DeliveryKind};
use skirmish::combat::combatant::{ResourcePool, Role};
use skirmish::combat::config::SelectorConfig;
use skirmish::combat::delivery::{check_usable, CastTarget};
use skirmish::combat::effects::Effect;
use skirmish::combat::faction::Faction;
use skirmish::combat::rng::{GameRng, RandomSource};
use skirmish::combat::selector::{
    AbilityDecision, AbilitySelector, CompanionSelector, CreatureSelector, DecisionContext, DecisionTier,
    DefenseSelector, RangeBand,
};
use skirmish::combat::status::StatusLibrary;

fn creature_library() -> AbilityLibrary {
    let mut howl = ability("howl", AbilityCategory::AoeDamage, 2, 5.0, DeliveryKind::SelfCast);
    howl.area_radius = 5.0;
    let mut harden = ability("harden", AbilityCategory::DefensiveBuff, 1, 0.0, DeliveryKind::SelfCast);
    harden.hostile.clear();
    let mut frenzy = ability("frenzy", AbilityCategory::StandardDamage, 9, 3.0, DeliveryKind::Melee);
    frenzy.cost = 30.0;

    AbilityLibrary::new(vec![
        ability("bite", AbilityCategory::StandardDamage, 1, 3.0, DeliveryKind::Melee),
        ability("maul", AbilityCategory::StandardDamage, 1, 3.0, DeliveryKind::Melee),
        ability("throat_rip", AbilityCategory::Finisher, 5, 3.0, DeliveryKind::Melee),
        ability("pounce", AbilityCategory::StandardDamage, 4, 12.0, DeliveryKind::Leap { speed: 18.0 }),
        howl,
        harden,
        frenzy,
    ])
}

fn decide(
    h: &Harness,
    library: &AbilityLibrary,
    selector: &mut dyn AbilitySelector,
    actor: Entity,
    rng: &mut dyn RandomSource,
) -> Vec<AbilityDecision> {
    let config = SelectorConfig::default();
    let mut ctx = DecisionContext {
        world: &h.arena,
        abilities: library,
        config: &config,
        rng,
    };
    selector.decide(actor, &mut ctx)
}

fn wolf_and_hero(abilities: &[&str]) -> (Harness, Entity, Entity) {
    let mut h = Harness::new(StatusLibrary::default());
    let wolf = h.spawn("Wolf", Faction::HORDE, 100.0, Vec3::ZERO);
    h.get_mut(wolf).abilities = abilities.iter().map(|a| AbilityId::from(*a)).collect();
    let hero = h.spawn("Hero", Faction::PARTY, 100.0, Vec3::new(2.0, 0.0, 0.0));
    (h, wolf, hero)
}

fn only(decisions: &[AbilityDecision]) -> &AbilityDecision {
    assert_eq!(decisions.len(), 1, "expected exactly one decision");
    &decisions[0]
}

// =============================================================================
// Creature
// =============================================================================

#[test]
fn test_low_health_creature_defends_itself() {
    let library = creature_library();
    let (mut h, wolf, _) = wolf_and_hero(&["bite", "throat_rip", "howl", "harden"]);
    h.get_mut(wolf).health.current = 20.0;

    let mut rng = GameRng::from_seed(1);
    let decisions = decide(&h, &library, &mut CreatureSelector::new(), wolf, &mut rng);
    let decision = only(&decisions);
    assert_eq!(decision.ability.id, AbilityId::from("harden"));
    assert_eq!(decision.tier, DecisionTier::Survival);
    assert_eq!(decision.target, CastTarget::SelfCast);
}

#[test]
fn test_survival_needs_no_target() {
    let library = creature_library();
    let mut h = Harness::new(StatusLibrary::default());
    let wolf = h.spawn("Wolf", Faction::HORDE, 100.0, Vec3::ZERO);
    h.get_mut(wolf).abilities = vec![AbilityId::from("harden"), AbilityId::from("bite")];
    h.get_mut(wolf).health.current = 10.0;

    let mut rng = GameRng::from_seed(1);
    let decisions = decide(&h, &library, &mut CreatureSelector::new(), wolf, &mut rng);
    assert_eq!(only(&decisions).tier, DecisionTier::Survival);
}

#[test]
fn test_survival_on_cooldown_falls_through() {
    let library = creature_library();
    let (mut h, wolf, hero) = wolf_and_hero(&["bite", "throat_rip", "harden"]);
    h.get_mut(wolf).health.current = 20.0;
    h.get_mut(wolf).cooldowns.insert(AbilityId::from("harden"), 10.0);
    h.get_mut(hero).health.current = 8.0;

    let mut rng = GameRng::from_seed(1);
    let decisions = decide(&h, &library, &mut CreatureSelector::new(), wolf, &mut rng);
    assert_eq!(only(&decisions).tier, DecisionTier::Opportunity);
}

#[test]
fn test_survival_skips_buff_that_needs_a_target() {
    let mut library = creature_library();
    let mut brace = ability("brace", AbilityCategory::DefensiveBuff, 3, 3.0, DeliveryKind::Melee);
    brace.hostile.clear();
    brace.friendly = vec![Effect::heal(5.0)];
    library.insert(brace);
    let (mut h, wolf, hero) = wolf_and_hero(&["bite", "brace"]);
    h.get_mut(wolf).health.current = 20.0;

    let mut rng = GameRng::from_seed(1);
    let decisions = decide(&h, &library, &mut CreatureSelector::new(), wolf, &mut rng);
    let decision = only(&decisions);
    assert_eq!(decision.ability.id, AbilityId::from("bite"));
    assert_eq!(decision.target, CastTarget::Entity(hero));
}

#[test]
fn test_finisher_preferred_on_low_target() {
    let library = creature_library();
    let (mut h, wolf, hero) = wolf_and_hero(&["bite", "pounce", "throat_rip"]);
    h.get_mut(hero).health.current = 8.0;

    let mut rng = GameRng::from_seed(1);
    let decisions = decide(&h, &library, &mut CreatureSelector::new(), wolf, &mut rng);
    let decision = only(&decisions);
    assert_eq!(decision.ability.id, AbilityId::from("throat_rip"));
    assert_eq!(decision.tier, DecisionTier::Opportunity);
    assert_eq!(decision.target, CastTarget::Entity(hero));
}

#[test]
fn test_crowd_around_target_triggers_area_attack() {
    let library = creature_library();
    let (mut h, wolf, hero) = wolf_and_hero(&["bite", "howl"]);
    h.spawn("Squire", Faction::PARTY, 100.0, Vec3::new(3.0, 0.0, 1.0));

    // Two enemies are not a crowd
    let mut rng = GameRng::from_seed(1);
    let decisions = decide(&h, &library, &mut CreatureSelector::new(), wolf, &mut rng);
    assert_eq!(only(&decisions).ability.id, AbilityId::from("bite"));

    h.spawn("Page", Faction::PARTY, 100.0, Vec3::new(2.0, 0.0, -1.5));
    let decisions = decide(&h, &library, &mut CreatureSelector::new(), wolf, &mut rng);
    let decision = only(&decisions);
    assert_eq!(decision.ability.id, AbilityId::from("howl"));
    assert_eq!(decision.tier, DecisionTier::CrowdResponse);
    assert_eq!(decision.target_entity(), Some(hero));
}

#[test]
fn test_no_target_no_decision() {
    let library = creature_library();
    let mut h = Harness::new(StatusLibrary::default());
    let wolf = h.spawn("Wolf", Faction::HORDE, 100.0, Vec3::ZERO);
    h.get_mut(wolf).abilities = vec![AbilityId::from("bite")];

    let mut rng = GameRng::from_seed(1);
    assert!(decide(&h, &library, &mut CreatureSelector::new(), wolf, &mut rng).is_empty());
}

#[test]
fn test_equal_priorities_split_evenly() {
    let library = creature_library();
    let (h, wolf, _) = wolf_and_hero(&["bite", "maul"]);

    let mut rng = GameRng::from_seed(99);
    let mut picks: HashMap<AbilityId, usize> = HashMap::new();
    for _ in 0..2000 {
        let decisions = decide(&h, &library, &mut CreatureSelector::new(), wolf, &mut rng);
        *picks.entry(only(&decisions).ability.id.clone()).or_default() += 1;
    }

    for id in ["bite", "maul"] {
        let count = picks.get(&AbilityId::from(id)).copied().unwrap_or(0);
        assert!((800..=1200).contains(&count), "{} picked {} times", id, count);
    }
}

#[test]
fn test_unique_best_never_consults_rng() {
    let library = creature_library();
    let (h, wolf, _) = wolf_and_hero(&["bite", "pounce"]);

    let mut rng = CountingRng { calls: 0 };
    let decisions = decide(&h, &library, &mut CreatureSelector::new(), wolf, &mut rng);
    assert_eq!(only(&decisions).ability.id, AbilityId::from("pounce"));
    assert_eq!(rng.calls, 0);
}

#[test]
fn test_decisions_are_always_usable() {
    let library = creature_library();
    let ids = ["bite", "maul", "throat_rip", "pounce", "howl", "harden", "frenzy"];
    let mut dice = StdRng::seed_from_u64(2024);
    let mut rng = GameRng::from_seed(5);

    for _ in 0..300 {
        let (mut h, wolf, hero) = wolf_and_hero(&ids);
        h.get_mut(hero).position = Vec3::new(dice.gen_range(0.5..15.0), 0.0, 0.0);
        h.get_mut(hero).health.current = dice.gen_range(1.0..100.0);
        {
            let me = h.get_mut(wolf);
            me.health.current = dice.gen_range(1.0..100.0);
            me.resource = Some(ResourcePool {
                current: dice.gen_range(0.0..60.0),
                max: 60.0,
            });
            for id in ids {
                if dice.gen_bool(0.4) {
                    me.cooldowns.insert(AbilityId::from(id), dice.gen_range(0.5..5.0));
                }
            }
        }
        for i in 0..dice.gen_range(0..4) {
            h.spawn("Militia", Faction::PARTY, 50.0, Vec3::new(3.0, 0.0, i as f32));
        }

        for decision in decide(&h, &library, &mut CreatureSelector::new(), wolf, &mut rng) {
            let result = check_usable(&h.arena, h.get(wolf), &decision.ability, decision.target);
            assert!(result.is_ok(), "{} unusable: {:?}", decision.ability.id, result);
        }
    }
}

#[test]
fn test_opener_used_once_per_engagement() {
    let library = creature_library();
    let (mut h, wolf, hero) = wolf_and_hero(&["bite", "pounce"]);
    h.get_mut(hero).position = Vec3::new(8.0, 0.0, 0.0);
    let mut selector = CreatureSelector::new().with_opener(&["pounce"], RangeBand::new(5.0, 12.0));
    let mut rng = GameRng::from_seed(3);

    // Not executed yet: still an opener
    let first = decide(&h, &library, &mut selector, wolf, &mut rng);
    assert_eq!(only(&first).tier, DecisionTier::Opener);
    let again = decide(&h, &library, &mut selector, wolf, &mut rng);
    assert_eq!(only(&again).tier, DecisionTier::Opener);

    selector.record_executed(only(&again));
    assert!(selector.opener_used());
    let later = decide(&h, &library, &mut selector, wolf, &mut rng);
    assert_eq!(only(&later).tier, DecisionTier::Fallback);

    // A new target is a new engagement
    h.kill(hero);
    h.spawn("Reinforcement", Faction::PARTY, 100.0, Vec3::new(0.0, 0.0, 8.0));
    let fresh = decide(&h, &library, &mut selector, wolf, &mut rng);
    assert_eq!(only(&fresh).tier, DecisionTier::Opener);
    assert!(!selector.opener_used());
}

#[test]
fn test_pursuit_band_prefers_listed_abilities() {
    let library = creature_library();
    let (mut h, wolf, hero) = wolf_and_hero(&["bite", "pounce"]);
    h.get_mut(hero).position = Vec3::new(6.0, 0.0, 0.0);
    let mut selector = CreatureSelector::new().with_pursuit(&["pounce"], RangeBand::new(4.0, 12.0));

    let mut rng = GameRng::from_seed(3);
    let decisions = decide(&h, &library, &mut selector, wolf, &mut rng);
    let decision = only(&decisions);
    assert_eq!(decision.tier, DecisionTier::Pursuit);
    assert_eq!(decision.ability.id, AbilityId::from("pounce"));
}

// =============================================================================
// Companion
// =============================================================================

fn companion_library() -> AbilityLibrary {
    let mut mend = ability("mend", AbilityCategory::SingleHeal, 1, 20.0, DeliveryKind::Melee);
    mend.hostile.clear();
    mend.friendly = vec![Effect::heal(20.0)];
    let mut renewal = ability("renewal", AbilityCategory::AoeHeal, 1, 0.0, DeliveryKind::GroundPlacement);
    renewal.area_radius = 10.0;
    renewal.hostile.clear();
    renewal.friendly = vec![Effect::heal(15.0)];

    AbilityLibrary::new(vec![
        mend,
        renewal,
        ability("arrow", AbilityCategory::StandardDamage, 0, 20.0, DeliveryKind::Projectile { speed: 30.0 }),
        ability("execute", AbilityCategory::Finisher, 5, 3.0, DeliveryKind::Melee),
    ])
}

/// Support healer at the origin, a tank beside it and a raider further out.
fn party() -> (Harness, Entity, Entity, Entity) {
    let mut h = Harness::new(StatusLibrary::default());
    let healer = h.spawn("Healer", Faction::PARTY, 100.0, Vec3::ZERO);
    {
        let me = h.get_mut(healer);
        me.role = Role::Support;
        me.abilities = vec![AbilityId::from("mend"), AbilityId::from("renewal")];
        me.default_attack = Some(AbilityId::from("arrow"));
    }
    let tank = h.spawn("Tank", Faction::PARTY, 100.0, Vec3::new(3.0, 0.0, 0.0));
    let raider = h.spawn("Raider", Faction::HORDE, 100.0, Vec3::new(10.0, 0.0, 0.0));
    (h, healer, tank, raider)
}

#[test]
fn test_support_heals_single_wounded_ally() {
    let library = companion_library();
    let (mut h, healer, tank, _) = party();
    h.get_mut(tank).health.current = 50.0;

    let mut rng = GameRng::from_seed(1);
    let decisions = decide(&h, &library, &mut CompanionSelector::new(), healer, &mut rng);
    let decision = only(&decisions);
    assert_eq!(decision.ability.id, AbilityId::from("mend"));
    assert_eq!(decision.tier, DecisionTier::SingleHeal);
    assert_eq!(decision.target, CastTarget::Entity(tank));
}

#[test]
fn test_support_heals_most_wounded_first() {
    let library = companion_library();
    let (mut h, healer, tank, _) = party();
    h.get_mut(tank).health.current = 50.0;
    let squire = h.spawn("Squire", Faction::PARTY, 100.0, Vec3::new(-2.0, 0.0, 1.0));
    h.get_mut(squire).health.current = 30.0;

    let mut rng = GameRng::from_seed(1);
    let decisions = decide(&h, &library, &mut CompanionSelector::new(), healer, &mut rng);
    assert_eq!(only(&decisions).target, CastTarget::Entity(squire));
}

#[test]
fn test_support_heals_reachable_ally_before_distant_one() {
    let mut library = companion_library();
    let mut short_mend = Ability::clone(library.get(&AbilityId::from("mend")).expect("mend defined"));
    short_mend.range = 8.0;
    library.insert(short_mend);

    let (mut h, healer, tank, _) = party();
    h.get_mut(tank).health.current = 40.0;
    let straggler = h.spawn("Straggler", Faction::PARTY, 100.0, Vec3::new(0.0, 0.0, -12.0));
    h.get_mut(straggler).health.current = 20.0;

    let mut rng = GameRng::from_seed(1);
    let decisions = decide(&h, &library, &mut CompanionSelector::new(), healer, &mut rng);
    let decision = only(&decisions);
    assert_eq!(decision.ability.id, AbilityId::from("mend"));
    assert_eq!(decision.tier, DecisionTier::SingleHeal);
    assert_eq!(decision.target, CastTarget::Entity(tank));
}

#[test]
fn test_support_area_heals_wounded_group() {
    let library = companion_library();
    let (mut h, healer, tank, _) = party();
    h.get_mut(tank).health.current = 60.0;
    for x in [-2.0, -4.0] {
        let ally = h.spawn("Militia", Faction::PARTY, 100.0, Vec3::new(x, 0.0, 0.0));
        h.get_mut(ally).health.current = 40.0;
    }

    let mut rng = GameRng::from_seed(1);
    let decisions = decide(&h, &library, &mut CompanionSelector::new(), healer, &mut rng);
    let decision = only(&decisions);
    assert_eq!(decision.ability.id, AbilityId::from("renewal"));
    assert_eq!(decision.tier, DecisionTier::AreaHeal);
    assert_eq!(decision.target, CastTarget::Point(Vec3::ZERO));
}

#[test]
fn test_support_with_nobody_to_heal_attacks() {
    let library = companion_library();
    let (h, healer, _, raider) = party();

    let mut selector = CompanionSelector::new();
    let mut rng = GameRng::from_seed(1);
    let decisions = decide(&h, &library, &mut selector, healer, &mut rng);
    let decision = only(&decisions);
    assert_eq!(decision.ability.id, AbilityId::from("arrow"));
    assert_eq!(decision.tier, DecisionTier::Rotation);
    assert_eq!(decision.target, CastTarget::Entity(raider));
    assert_eq!(selector.current_target(), Some(raider));
}

#[test]
fn test_damage_role_never_heals() {
    let library = companion_library();
    let (mut h, healer, tank, raider) = party();
    h.get_mut(healer).role = Role::Damage;
    h.get_mut(tank).health.current = 10.0;

    let mut rng = GameRng::from_seed(1);
    let decisions = decide(&h, &library, &mut CompanionSelector::new(), healer, &mut rng);
    assert_eq!(only(&decisions).target, CastTarget::Entity(raider));
}

#[test]
fn test_companion_finishes_low_enemy() {
    let library = companion_library();
    let (mut h, healer, _, raider) = party();
    h.get_mut(healer).abilities.push(AbilityId::from("execute"));
    h.get_mut(raider).position = Vec3::new(2.0, 0.0, 1.0);
    h.get_mut(raider).health.current = 10.0;

    let mut rng = GameRng::from_seed(1);
    let decisions = decide(&h, &library, &mut CompanionSelector::new(), healer, &mut rng);
    let decision = only(&decisions);
    assert_eq!(decision.ability.id, AbilityId::from("execute"));
    assert_eq!(decision.tier, DecisionTier::Opportunity);
}

// =============================================================================
// Defense
// =============================================================================

fn defense_library() -> AbilityLibrary {
    let mut aura = ability("aura", AbilityCategory::PassiveAura, 0, 0.0, DeliveryKind::SelfCast);
    aura.area_radius = 6.0;
    aura.friendly = vec![Effect::heal(2.0)];
    aura.hostile = vec![true_damage(3.0)];
    AbilityLibrary::new(vec![
        aura,
        ability("ballista", AbilityCategory::AutoTurret, 0, 25.0, DeliveryKind::Projectile { speed: 35.0 }),
        ability("flame_jet", AbilityCategory::AutoTurret, 0, 10.0, DeliveryKind::Melee),
    ])
}

fn tower() -> (Harness, Entity) {
    let mut h = Harness::new(StatusLibrary::default());
    let tower = h.spawn("Tower", Faction::PARTY, 500.0, Vec3::ZERO);
    h.get_mut(tower).abilities = ["aura", "ballista", "flame_jet"]
        .iter()
        .map(|a| AbilityId::from(*a))
        .collect();
    (h, tower)
}

fn by_ability(decisions: &[AbilityDecision], id: &str) -> Option<CastTarget> {
    decisions
        .iter()
        .find(|d| d.ability.id == AbilityId::from(id))
        .map(|d| d.target)
}

#[test]
fn test_defense_fires_aura_and_turrets() {
    let library = defense_library();
    let (mut h, tower) = tower();
    let near = h.spawn("Sapper", Faction::HORDE, 50.0, Vec3::new(8.0, 0.0, 0.0));
    h.spawn("Archer", Faction::HORDE, 50.0, Vec3::new(0.0, 0.0, 20.0));

    let mut rng = GameRng::from_seed(1);
    let decisions = decide(&h, &library, &mut DefenseSelector::new(), tower, &mut rng);
    assert_eq!(decisions.len(), 3);
    assert_eq!(by_ability(&decisions, "aura"), Some(CastTarget::SelfCast));
    assert_eq!(by_ability(&decisions, "ballista"), Some(CastTarget::Entity(near)));
    assert_eq!(by_ability(&decisions, "flame_jet"), Some(CastTarget::Entity(near)));
}

#[test]
fn test_each_turret_searches_its_own_range() {
    let library = defense_library();
    let (mut h, tower) = tower();
    let far = h.spawn("Archer", Faction::HORDE, 50.0, Vec3::new(0.0, 0.0, 20.0));

    let mut rng = GameRng::from_seed(1);
    let decisions = decide(&h, &library, &mut DefenseSelector::new(), tower, &mut rng);
    assert_eq!(by_ability(&decisions, "ballista"), Some(CastTarget::Entity(far)));
    assert_eq!(by_ability(&decisions, "flame_jet"), None);
    assert_eq!(decisions.len(), 2);
}

#[test]
fn test_turret_on_cooldown_does_not_block_others() {
    let library = defense_library();
    let (mut h, tower) = tower();
    let near = h.spawn("Sapper", Faction::HORDE, 50.0, Vec3::new(5.0, 0.0, 0.0));
    h.get_mut(tower).cooldowns.insert(AbilityId::from("ballista"), 2.0);
    h.get_mut(tower).cooldowns.insert(AbilityId::from("aura"), 1.0);

    let mut rng = GameRng::from_seed(1);
    let decisions = decide(&h, &library, &mut DefenseSelector::new(), tower, &mut rng);
    assert_eq!(decisions.len(), 1);
    assert_eq!(by_ability(&decisions, "flame_jet"), Some(CastTarget::Entity(near)));
}
