//! Tests of climbing, wall jumps, leaps and jetpack flight

use botnav_common::{EntityId, EntityKind, SpatialQuery, Species, StaticSpeciesTable, Team, Vec3};

use crate::test_world::{BoxWorld, FixedPath};
use crate::{
    ActorState, Bot, Buttons, JetpackPhase, MoveOutcome, NavGoal, SteeringConfig,
    SteeringEngine,
};

fn bot_at(species: Species, origin: Vec3) -> Bot {
    let mut bot = Bot::new(ActorState::new(EntityId(0), species, origin));
    bot.nav.set_direction(Vec3::X, origin + Vec3::X * 200.0);
    bot.begin_tick(0);
    bot
}

fn allowed_jetpack_step(from: JetpackPhase, to: JetpackPhase) -> bool {
    from == to
        || matches!(
            (from, to),
            (JetpackPhase::None, JetpackPhase::Waiting)
                | (JetpackPhase::Waiting, JetpackPhase::Flying)
                | (JetpackPhase::Flying, JetpackPhase::Landing)
                | (JetpackPhase::Landing, JetpackPhase::None)
        )
}

#[test]
fn test_wallclimber_climbs_inside_window() {
    let world = BoxWorld::with_floor();
    let species = StaticSpeciesTable::new();
    let engine = SteeringEngine::new(SteeringConfig::default(), &world, &species);

    let origin = Vec3::new(0.0, 0.0, 15.0);
    let mut bot = bot_at(Species::Level0, origin);
    bot.nav.record_navcon(0, 200);
    let wall_top = FixedPath::to(Vec3::new(60.0, 0.0, 265.0));

    bot.begin_tick(500);
    assert!(engine.try_move_upward(&mut bot, &wall_top));
    assert_eq!(bot.cmd.up_move, -127);
    assert_eq!(bot.cmd.forward_move, 127);
    assert_eq!(bot.cmd.right_move, 0);
    assert!(bot.cmd.angles.y.abs() < 1e-3);

    // keeps climbing to the end of the window once the corner is level
    let level = FixedPath::to(Vec3::new(60.0, 0.0, 15.0));
    bot.begin_tick(1200);
    assert!(engine.try_move_upward(&mut bot, &level));
    bot.begin_tick(1400);
    assert!(!engine.try_move_upward(&mut bot, &level));

    // outside the window even a high corner is not climbed
    bot.begin_tick(2000);
    assert!(!engine.try_move_upward(&mut bot, &wall_top));
}

#[test]
fn test_climber_attacks_enemy_in_reach() {
    let mut world = BoxWorld::with_floor();
    let human = world.add_entity(
        Vec3::new(30.0, -15.0, 0.0),
        Vec3::new(60.0, 15.0, 56.0),
        EntityKind::Client,
        Team::Humans,
    );
    let species = StaticSpeciesTable::new();
    let engine = SteeringEngine::new(SteeringConfig::default(), &world, &species);
    let corner = FixedPath::to(Vec3::new(100.0, 0.0, 300.0));

    let mut bot = bot_at(Species::Level0, Vec3::new(0.0, 0.0, 15.0));
    bot.nav.record_navcon(0, 200);
    bot.begin_tick(500);
    assert!(engine.try_move_upward(&mut bot, &corner));
    // the biter only keeps climbing toward the enemy
    assert!(!bot.cmd.is_pressed(Buttons::ATTACK_PRIMARY));
    assert_eq!(bot.nav.last_navcon_distance, 230);
    assert_eq!(world.team_of(human), Team::Humans);

    // the clawing climber strikes as well
    let mut clawer = bot_at(Species::Level1, Vec3::new(0.0, 0.0, 18.0));
    clawer.nav.record_navcon(0, 200);
    clawer.begin_tick(500);
    assert!(engine.try_move_upward(&mut clawer, &corner));
    assert!(clawer.cmd.is_pressed(Buttons::ATTACK_PRIMARY));
    assert_eq!(clawer.nav.last_navcon_distance, 230);

    // the extension is bounded
    bot.nav.record_navcon(0, 3990);
    bot.begin_tick(600);
    engine.try_move_upward(&mut bot, &corner);
    assert_eq!(bot.nav.last_navcon_distance, 4000);

    // allies are left alone
    let mut friendly_world = BoxWorld::with_floor();
    friendly_world.add_entity(
        Vec3::new(30.0, -15.0, 0.0),
        Vec3::new(60.0, 15.0, 56.0),
        EntityKind::Client,
        Team::Aliens,
    );
    let engine = SteeringEngine::new(SteeringConfig::default(), &friendly_world, &species);
    clawer.nav.record_navcon(0, 200);
    clawer.begin_tick(700);
    assert!(engine.try_move_upward(&mut clawer, &corner));
    assert!(!clawer.cmd.is_pressed(Buttons::ATTACK_PRIMARY));
    assert_eq!(clawer.nav.last_navcon_distance, 200);
}

#[test]
fn test_wall_jump_inside_window() {
    let world = BoxWorld::with_floor();
    let species = StaticSpeciesTable::new();
    let engine = SteeringEngine::new(SteeringConfig::default(), &world, &species);
    let corner = FixedPath::to(Vec3::new(80.0, 0.0, 224.0));

    let mut bot = bot_at(Species::Level2, Vec3::new(0.0, 0.0, 24.0));
    bot.nav.record_navcon(0, 100);
    bot.begin_tick(300);
    assert!(engine.try_move_upward(&mut bot, &corner));
    assert_eq!(bot.cmd.forward_move, 127);
    assert_eq!(bot.cmd.up_move, 127);
    assert_eq!(bot.cmd.angles.x, -60.0);

    bot.begin_tick(1000);
    assert!(!engine.try_move_upward(&mut bot, &corner));
}

#[test]
fn test_leap_only_shortly_after_navcon() {
    let world = BoxWorld::with_floor();
    let species = StaticSpeciesTable::new();
    let engine = SteeringEngine::new(SteeringConfig::default(), &world, &species);
    let ledge = FixedPath::to(Vec3::new(200.0, 0.0, 321.0));

    let mut bot = bot_at(Species::Level3, Vec3::new(0.0, 0.0, 21.0));
    bot.nav.record_navcon(0, 300);
    bot.begin_tick(500);
    assert!(engine.try_move_upward(&mut bot, &ledge));
    assert!(bot.cmd.is_pressed(Buttons::ATTACK_SECONDARY));
    assert_eq!(bot.cmd.forward_move, 0);
    // out of reach: the 45 degree maximum range angle plus the correction, upward
    assert!((bot.cmd.angles.x + 65.0).abs() < 1e-3);

    // a charged leap is released
    bot.actor.weapon_charge = 700;
    bot.begin_tick(600);
    assert!(engine.try_move_upward(&mut bot, &ledge));
    assert!(!bot.cmd.is_pressed(Buttons::ATTACK_SECONDARY));

    bot.begin_tick(2000);
    assert!(!engine.try_move_upward(&mut bot, &ledge));

    // navcons in the future do not count
    bot.nav.record_navcon(3000, 300);
    bot.begin_tick(2500);
    assert!(!engine.try_move_upward(&mut bot, &ledge));
}

#[test]
fn test_upgraded_builder_climbs_high_corners_without_navcon() {
    let world = BoxWorld::with_floor();
    let species = StaticSpeciesTable::new();
    let engine = SteeringEngine::new(SteeringConfig::default(), &world, &species);
    let wall_top = FixedPath::to(Vec3::new(60.0, 0.0, 270.0));

    let mut bot = bot_at(Species::BuilderUpg, Vec3::new(0.0, 0.0, 20.0));
    bot.begin_tick(5000);
    assert!(bot.level_time() > bot.nav.wallclimb_stop_time());
    assert!(engine.try_move_upward(&mut bot, &wall_top));
    assert_eq!(bot.cmd.up_move, -127);
    assert_eq!(bot.cmd.forward_move, 127);

    // a level corner still needs the window
    let level = FixedPath::to(Vec3::new(60.0, 0.0, 20.0));
    bot.begin_tick(5100);
    assert!(!engine.try_move_upward(&mut bot, &level));

    // biting climbers keep waiting for a navcon
    let mut biter = bot_at(Species::Level0, Vec3::new(0.0, 0.0, 15.0));
    biter.begin_tick(5000);
    assert!(!engine.try_move_upward(&mut biter, &wall_top));
}

#[test]
fn test_species_without_vertical_moves_keep_steering() {
    let world = BoxWorld::with_floor();
    let species = StaticSpeciesTable::new();
    let engine = SteeringEngine::new(SteeringConfig::default(), &world, &species);
    let corner = FixedPath::to(Vec3::new(80.0, 0.0, 500.0));

    for kind in [Species::Builder, Species::Level4, Species::HumanBsuit] {
        let mut bot = bot_at(kind, Vec3::new(0.0, 0.0, 40.0));
        bot.nav.record_navcon(0, 400);
        bot.begin_tick(100);
        assert!(!engine.try_move_upward(&mut bot, &corner), "{kind}");
    }
}

#[test]
fn test_jetpack_phases_in_order() {
    let world = BoxWorld::with_floor();
    let species = StaticSpeciesTable::new();
    let engine = SteeringEngine::new(SteeringConfig::default(), &world, &species);
    let corner = Vec3::new(0.0, 0.0, 324.0);
    let path = FixedPath::to(corner);

    let mut bot = bot_at(Species::HumanNaked, Vec3::new(0.0, 0.0, 24.0));
    bot.actor.jetpack_equipped = true;
    bot.actor.fuel = 6000;
    bot.nav.record_navcon(1000, 300);

    // (level time, height, still in control, phase after the tick)
    let script = [
        (1100, 24.0, true, JetpackPhase::Waiting),
        (1300, 24.0, true, JetpackPhase::Waiting),
        (1600, 24.0, true, JetpackPhase::Flying),
        (1700, 24.0, true, JetpackPhase::Flying),
        (2500, 250.0, true, JetpackPhase::Landing),
        (2600, 300.0, true, JetpackPhase::Landing),
        (2700, 330.0, false, JetpackPhase::None),
    ];

    for (level_time, z, in_control, expected) in script {
        let before = bot.nav.jetpack;
        bot.actor.origin.z = z;
        bot.begin_tick(level_time);
        assert_eq!(engine.try_move_upward(&mut bot, &path), in_control, "at {level_time}");
        assert_eq!(bot.nav.jetpack, expected, "at {level_time}");
        assert!(allowed_jetpack_step(before, bot.nav.jetpack));

        match before {
            // holds position without thrust
            JetpackPhase::Waiting => {
                assert_eq!(bot.cmd.up_move, 0);
                assert_eq!(bot.nav.stuck_time, level_time);
            }
            JetpackPhase::Flying => assert_eq!(bot.cmd.up_move, 127),
            JetpackPhase::Landing if in_control => assert_eq!(bot.cmd.up_move, 127),
            _ => {}
        }
    }
}

#[test]
fn test_jetpack_waits_for_fuel() {
    let world = BoxWorld::with_floor();
    let species = StaticSpeciesTable::new();
    let engine = SteeringEngine::new(SteeringConfig::default(), &world, &species);
    let path = FixedPath::to(Vec3::new(0.0, 0.0, 624.0));

    let mut bot = bot_at(Species::HumanLight, Vec3::new(0.0, 0.0, 24.0));
    bot.actor.jetpack_equipped = true;
    // a 600 unit climb needs half a tank
    bot.actor.fuel = 2999;
    bot.nav.record_navcon(0, 600);

    for level_time in [100, 700, 1500] {
        bot.begin_tick(level_time);
        assert!(engine.try_move_upward(&mut bot, &path));
        assert_eq!(bot.nav.jetpack, JetpackPhase::Waiting);
    }

    bot.actor.fuel = 3000;
    bot.begin_tick(1600);
    engine.try_move_upward(&mut bot, &path);
    assert_eq!(bot.nav.jetpack, JetpackPhase::Flying);

    // a new goal drops the ascent
    bot.nav
        .set_goal(NavGoal::Position(Vec3::new(500.0, 0.0, 24.0)), bot.actor.origin, 1700);
    assert_eq!(bot.nav.jetpack, JetpackPhase::None);
}

#[test]
fn test_jetpack_requires_equipment_and_recent_navcon() {
    let world = BoxWorld::with_floor();
    let species = StaticSpeciesTable::new();
    let engine = SteeringEngine::new(SteeringConfig::default(), &world, &species);
    let path = FixedPath::to(Vec3::new(0.0, 0.0, 324.0));

    let mut bot = bot_at(Species::HumanNaked, Vec3::new(0.0, 0.0, 24.0));
    bot.actor.fuel = 6000;
    bot.nav.record_navcon(0, 300);
    bot.begin_tick(100);
    assert!(!engine.try_move_upward(&mut bot, &path));

    bot.actor.jetpack_equipped = true;
    bot.begin_tick(800);
    assert!(!engine.try_move_upward(&mut bot, &path));
    assert_eq!(bot.nav.jetpack, JetpackPhase::None);
}

#[test]
fn test_move_to_goal_hands_over_to_jetpack() {
    let world = BoxWorld::with_floor();
    let species = StaticSpeciesTable::new();
    let engine = SteeringEngine::new(SteeringConfig::default(), &world, &species);
    let corner = Vec3::new(0.0, 0.0, 324.0);

    let mut bot = bot_at(Species::HumanMedium, Vec3::new(0.0, 0.0, 24.0));
    bot.actor.jetpack_equipped = true;
    bot.actor.fuel = 6000;
    bot.nav
        .set_goal(NavGoal::Position(Vec3::new(0.0, 50.0, 324.0)), bot.actor.origin, 0);
    bot.nav.set_direction(Vec3::Y, corner);
    bot.nav.record_navcon(0, 300);

    bot.begin_tick(100);
    assert_eq!(
        engine.move_to_goal(&mut bot, &FixedPath::to(corner)),
        MoveOutcome::Traversing
    );
    assert_eq!(bot.nav.jetpack, JetpackPhase::Waiting);
}
