//! Steering toward a goal and the basic movement primitives

use botnav_common::{
    alignment_2d, ballistic_pitch, clamp_char, length_2d, radius_from_bounds_2d, right_of,
    Abilities, Bounds, ContentMask, EntityId, SpatialQuery, SpeciesAttributes, SpeciesProvider, Team,
    Vec3,
};

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::cell::RefCell;

use crate::{Bot, Buttons, MoveDir, MoveOutcome, NavGoal, Obstacle, SteeringConfig};

/// Goals closer than this vertically count as reached
const GOAL_MAX_DZ: f32 = 90.0;

/// Route lookups provided by the path layer
pub trait PathQuery {
    /// Next corner of the route planned for `bot`
    fn next_corner(&self, bot: EntityId) -> Option<Vec3>;

    /// Fraction of the straight line `start..end` that stays on the mesh
    fn nav_trace(&self, bot: EntityId, start: Vec3, end: Vec3) -> Option<f32>;
}

/// Turns directions toward the next corner into movement commands
pub struct SteeringEngine<'a> {
    pub(crate) config: SteeringConfig,
    pub(crate) world: &'a dyn SpatialQuery,
    pub(crate) species: &'a dyn SpeciesProvider,
    rng: RefCell<Box<dyn RngCore + 'a>>,
}

impl<'a> SteeringEngine<'a> {
    pub fn new(
        config: SteeringConfig,
        world: &'a dyn SpatialQuery,
        species: &'a dyn SpeciesProvider,
    ) -> Self {
        Self {
            config,
            world,
            species,
            rng: RefCell::new(Box::new(StdRng::from_entropy())),
        }
    }

    /// Replaces the random source behind evasive moves
    pub fn with_rng(mut self, rng: impl RngCore + 'a) -> Self {
        self.rng = RefCell::new(Box::new(rng));
        self
    }

    pub fn config(&self) -> &SteeringConfig {
        &self.config
    }

    pub(crate) fn attributes(&self, bot: &Bot) -> &'a SpeciesAttributes {
        self.species.attributes(bot.actor.species)
    }

    /// Moves and aims the bot toward its goal for one tick
    pub fn move_to_goal(&self, bot: &mut Bot, paths: &dyn PathQuery) -> MoveOutcome {
        let now = bot.level_time();
        let stuck_time = bot
            .nav
            .update_stuck(bot.actor.origin, now, self.config.stuck_radius);

        // at first doors and movers are not obstacles, unless stuck for a while
        let ignore_geometry = stuck_time < self.config.ignore_geometry_ms;
        let avoidance = self.avoid_obstacles(bot, ignore_geometry);

        if avoidance.blocked {
            if self.try_move_upward(bot, paths) {
                return MoveOutcome::Traversing;
            }
            self.seek(bot, avoidance.dir);
            return self.progress_outcome(bot, stuck_time);
        }

        self.seek(bot, avoidance.dir);

        let own_team = bot.actor.team();
        let target_team = bot.nav.goal.map_or(Team::None, |goal| goal.team());

        // aliens keep tricks for reaching friendly goals quickly
        if own_team == Team::Aliens && own_team != target_team {
            if self.try_move_upward(bot, paths) {
                return MoveOutcome::Traversing;
            }
            return self.progress_outcome(bot, stuck_time);
        }
        if self.try_move_upward(bot, paths) {
            return MoveOutcome::Traversing;
        }

        if !bot.actor.fast_flee {
            if own_team == Team::Humans {
                self.walk_if_stamina_low(bot);
            }
            return self.progress_outcome(bot, stuck_time);
        }

        self.fast_flee(bot, avoidance.obstacle);
        self.progress_outcome(bot, stuck_time)
    }

    fn progress_outcome(&self, bot: &Bot, stuck_time: i64) -> MoveOutcome {
        if stuck_time > self.config.soft_stuck_ms {
            log::debug!(
                "bot {} made no progress for {stuck_time}ms",
                bot.actor.entity.0
            );
            MoveOutcome::Stuck
        } else {
            MoveOutcome::Moving
        }
    }

    /// Uses the species' fastest means of travel
    fn fast_flee(&self, bot: &mut Bot, obstacle: Obstacle) {
        let attributes = self.attributes(bot);

        if attributes.has(Abilities::SPRINT) {
            self.sprint(bot, true);
            self.walk_if_stamina_low(bot);
            return;
        }

        if attributes.flee_jump_chance > 0.0 {
            // now and then rather than every frame, turning stays possible
            let chance = attributes.flee_jump_chance * bot.actor.frame_msec as f32 / 1000.0;
            if self.rng.borrow_mut().gen::<f32>() < chance {
                self.jump(bot);
            }
            return;
        }

        if let Some(leap) = attributes.leap {
            // charging the leap prevents jumping over what is in front
            let yield_to_jump = leap.yields_to_jump && obstacle == Obstacle::Jumpable;
            if bot.actor.weapon_charge <= leap.max_charge && !yield_to_jump {
                let pitch = ballistic_pitch(
                    bot.actor.origin,
                    bot.nav.target_pos,
                    leap.magnitude,
                    bot.actor.gravity,
                );
                bot.cmd.set_pitch(-pitch / 3.0);
                bot.cmd.press(Buttons::ATTACK_SECONDARY);
            }
            return;
        }

        if attributes.has(Abilities::TRAMPLE) {
            bot.cmd.press(Buttons::ATTACK_SECONDARY);
        }
    }

    /// Sets forward and right moves for a world direction
    ///
    /// The larger of the two components runs at full speed and the other one
    /// keeps the ratio, so diagonal moves are as fast as possible. `dir` does
    /// not need to be normalized.
    pub fn direction_to_usercmd(&self, bot: &mut Bot, dir: Vec3) {
        if dir.truncate().length_squared() < 1.0e-5 {
            bot.cmd.forward_move = 0;
            bot.cmd.right_move = 0;
            return;
        }

        let speed = bot.cmd.max_speed() as f32;
        let (forward, right) = bot.actor.view_axes();
        let forward_move = speed * alignment_2d(forward, dir);
        let right_move = speed * alignment_2d(right, dir);

        if forward_move.abs() > right_move.abs() {
            let highest_forward = speed.copysign(forward_move);
            bot.cmd.forward_move = clamp_char(highest_forward);
            bot.cmd.right_move = clamp_char(highest_forward * right_move / forward_move);
        } else {
            let highest_right = speed.copysign(right_move);
            bot.cmd.forward_move = clamp_char(highest_right * forward_move / right_move);
            bot.cmd.right_move = clamp_char(highest_right);
        }
    }

    /// Moves along `dir` and aims 100 units ahead in that direction
    pub fn seek(&self, bot: &mut Bot, dir: Vec3) {
        let eye = bot.actor.view_origin(self.attributes(bot));
        self.direction_to_usercmd(bot, dir);
        bot.cmd.aim_at(eye, eye + 100.0 * dir);
    }

    pub fn stand_still(&self, bot: &mut Bot) {
        self.walk(bot, false);
        self.sprint(bot, false);
        bot.cmd.forward_move = 0;
        bot.cmd.right_move = 0;
        bot.cmd.up_move = 0;
    }

    /// Jumps unless the species lacks the stamina for it
    pub fn jump(&self, bot: &mut Bot) -> bool {
        if let Some(cost) = self.attributes(bot).stamina_jump_cost {
            if bot.actor.stamina < cost {
                return false;
            }
        }
        bot.cmd.up_move = 127;
        true
    }

    pub fn sprint(&self, bot: &mut Bot, enable: bool) -> bool {
        if enable {
            bot.cmd.press(Buttons::SPRINT);
        } else {
            bot.cmd.release(Buttons::SPRINT);
        }
        self.walk(bot, !enable);
        enable
    }

    /// Toggles walking, scaling the current moves to the new speed
    pub fn walk(&self, bot: &mut Bot, enable: bool) {
        let cmd = &mut bot.cmd;
        if !enable {
            if cmd.is_pressed(Buttons::WALKING) {
                cmd.release(Buttons::WALKING);
                cmd.forward_move = cmd.forward_move.saturating_mul(2);
                cmd.right_move = cmd.right_move.saturating_mul(2);
            }
            return;
        }

        if !cmd.is_pressed(Buttons::WALKING) {
            cmd.press(Buttons::WALKING);
            cmd.forward_move /= 2;
            cmd.right_move /= 2;
        }
    }

    /// Walks to recover stamina once it runs low, runs again once it is back
    pub fn walk_if_stamina_low(&self, bot: &mut Bot) {
        let stamina = bot.actor.stamina;
        let low = self.config.low_stamina;
        if stamina < low {
            if bot.cmd.is_pressed(Buttons::SPRINT) {
                self.sprint(bot, false);
            }
            self.walk(bot, true);
        } else if stamina >= low * 2 {
            self.walk(bot, false);
        }
    }

    /// Full speed along the given relative directions
    pub fn move_in_dir(&self, bot: &mut Bot, dir: MoveDir) {
        let speed = bot.cmd.max_speed();

        if dir.contains(MoveDir::FORWARD) {
            bot.cmd.forward_move = speed;
        } else if dir.contains(MoveDir::BACKWARD) {
            bot.cmd.forward_move = -speed;
        }

        if dir.contains(MoveDir::RIGHT) {
            bot.cmd.right_move = speed;
        } else if dir.contains(MoveDir::LEFT) {
            bot.cmd.right_move = -speed;
        }
    }

    /// Whether there is floor to stand on one step away in `dir`
    ///
    /// Only backward, left and right are checked; other directions report no floor.
    pub fn trace_for_floor(&self, bot: &Bot, dir: MoveDir) -> bool {
        let (forward, _) = bot.actor.flat_view_axes();
        let dir_vec = if dir == MoveDir::BACKWARD {
            -forward
        } else if dir == MoveDir::LEFT {
            -right_of(forward)
        } else if dir == MoveDir::RIGHT {
            right_of(forward)
        } else {
            return false;
        };

        let bounds = self.attributes(bot).bounds;
        let width = bounds.width();
        let height = bounds.height();

        // a square of side `width` next to the bbox diagonally is sqrt(2) * width away
        let mut start = bot.actor.origin + dir_vec * (std::f32::consts::SQRT_2 * width);
        start.z += bounds.maxs.z;
        let end = start - Vec3::Z * (height * 2.0);

        let hit = self.world.trace(
            start,
            &Bounds::new(Vec3::ZERO, Vec3::ZERO),
            end,
            bot.actor.entity,
            ContentMask::SOLID | ContentMask::PLAYER_CLIP,
        );
        !hit.is_clear()
    }

    /// Strafes unpredictably while staying on solid floor
    pub fn strafe_dodge(&self, bot: &mut Bot) {
        let speed = bot.cmd.max_speed();
        let floor_right = self.trace_for_floor(bot, MoveDir::RIGHT);
        let floor_left = self.trace_for_floor(bot, MoveDir::LEFT);
        let time1000 = bot.level_time().rem_euclid(1000);
        let time10000 = bot.level_time().rem_euclid(10_000);

        if time1000 >= 500 && floor_right {
            bot.cmd.right_move = speed;
        } else if floor_left {
            bot.cmd.right_move = -speed;
        } else if floor_right {
            bot.cmd.right_move = speed;
        }

        if time10000 % 2000 < 1000 {
            let right_move = bot.cmd.right_move;
            if (right_move < 0 && floor_right) || (right_move > 0 && floor_left) {
                bot.cmd.right_move = -right_move;
            }
        }

        if time1000 % 300 >= 100 && time10000 % 3000 > 2000 {
            bot.cmd.right_move = 0;
        }
    }

    /// Strafes right for four seconds, then left for four, where there is floor
    pub fn alternate_strafe(&self, bot: &mut Bot) {
        let speed = bot.cmd.max_speed();
        let floor_right = self.trace_for_floor(bot, MoveDir::RIGHT);
        let floor_left = self.trace_for_floor(bot, MoveDir::LEFT);

        if bot.level_time().rem_euclid(8000) < 4000 && floor_right {
            bot.cmd.right_move = speed;
        } else if floor_left {
            bot.cmd.right_move = -speed;
        } else if floor_right {
            bot.cmd.right_move = speed;
        }
    }

    /// Distance at which the current goal counts as reached
    pub fn goal_radius(&self, bot: &Bot) -> f32 {
        let own = self.attributes(bot).bounds;
        let own_radius = radius_from_bounds_2d(own.mins, own.maxs);
        match bot.nav.goal {
            // the point should be (almost) inside our bounding box
            None | Some(NavGoal::Position(_)) => own_radius + self.config.obstacle_avoid_range,
            Some(NavGoal::Entity(goal)) if goal.close_approach => {
                own.maxs.x + goal.bounds.maxs.x
            }
            Some(NavGoal::Entity(goal)) => {
                radius_from_bounds_2d(goal.bounds.mins, goal.bounds.maxs)
                    + own_radius
                    + self.config.obstacle_avoid_range
            }
        }
    }

    /// Whether the goal is within `radius`
    ///
    /// Positions are compared horizontally with a vertical tolerance, so
    /// standing on something at the goal still counts.
    pub fn goal_in_range(&self, bot: &Bot, radius: f32) -> bool {
        let origin = bot.actor.origin;
        match bot.nav.goal {
            None => false,
            Some(NavGoal::Position(_)) => {
                let delta = origin - bot.nav.target_pos;
                length_2d(delta) < radius && delta.z.abs() <= GOAL_MAX_DZ
            }
            Some(NavGoal::Entity(goal)) => {
                let mins = goal.position + goal.bounds.mins;
                let maxs = goal.position + goal.bounds.maxs;
                origin.clamp(mins, maxs).distance(origin) < radius
            }
        }
    }

    pub fn distance_to_goal(&self, bot: &Bot) -> Option<f32> {
        bot.nav
            .goal
            .map(|goal| bot.actor.origin.distance(goal.position()))
    }

    pub fn distance_to_goal_2d_squared(&self, bot: &Bot) -> Option<f32> {
        bot.nav
            .goal
            .map(|goal| (goal.position() - bot.actor.origin).truncate().length_squared())
    }

    /// Whether the navigation mesh connects the bot's feet straight to `target`
    pub fn path_is_walkable(&self, bot: &Bot, paths: &dyn PathQuery, target: Vec3) -> bool {
        let feet = bot.actor.origin + Vec3::Z * self.attributes(bot).bounds.mins.z;
        paths
            .nav_trace(bot.actor.entity, feet, target)
            .is_some_and(|fraction| fraction >= 1.0)
    }
}
