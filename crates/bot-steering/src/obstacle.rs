//! Detecting what blocks the way ahead and finding a way around it

use botnav_common::{
    heading, right_of, yaw_of, Abilities, ContentMask, EntityId, EntityKind, SurfaceFlags,
    TraceHit, Vec3, MIN_WALK_NORMAL,
};

use crate::{Bot, SteeringEngine};

/// How a blocker can be passed without leaving the route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Obstacle {
    #[default]
    None,
    /// A jump clears it
    Jumpable,
    /// A ladder to climb
    Ladder,
}

/// Outcome of obstacle avoidance for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Avoidance {
    /// Direction to steer toward, always set
    pub dir: Vec3,
    pub obstacle: Obstacle,
    /// No way past the blocker was found
    pub blocked: bool,
}

impl SteeringEngine<'_> {
    /// Sweeps the bbox, raised by the step size, along `dir` and returns what blocks it
    ///
    /// Steep surfaces and buildables block, walkable slopes do not.
    pub fn path_blocker(&self, bot: &Bot, dir: Vec3) -> Option<EntityId> {
        let hit = self.sweep(bot, dir, 0.0);
        let entity = hit.entity?;
        let steep = !hit.is_clear() && hit.normal.z < MIN_WALK_NORMAL;
        if steep || self.world.entity_kind(entity) == EntityKind::Buildable {
            Some(entity)
        } else {
            None
        }
    }

    /// Sweep of the step-raised bbox over the avoid range, lifted by `extra_height`
    fn sweep(&self, bot: &Bot, dir: Vec3, extra_height: f32) -> TraceHit {
        let bounds = self
            .attributes(bot)
            .bounds
            .raised(self.config.step_size + extra_height);
        let origin = bot.actor.origin;
        let end = origin + self.config.obstacle_avoid_range * dir;
        self.world
            .trace(origin, &bounds, end, bot.actor.entity, ContentMask::PLAYER_SOLID)
    }

    /// Whether jumping or climbing gets past `blocker`
    pub fn detect_obstacle(&self, bot: &Bot, blocker: EntityId, dir: Vec3) -> Obstacle {
        let low = self.sweep(bot, dir, 0.0);
        if low.is_clear() || low.entity != Some(blocker) {
            return Obstacle::None;
        }

        let attributes = self.attributes(bot);
        let jump_height = attributes.jump_height(bot.actor.gravity);
        let high = self.sweep(bot, dir, jump_height);

        let ladder = attributes.has(Abilities::CAN_USE_LADDERS)
            && (low.hit_world_with(SurfaceFlags::LADDER)
                || high.hit_world_with(SurfaceFlags::LADDER));
        if ladder {
            return Obstacle::Ladder;
        }

        // friendly barricades shrink under a bot standing above their lowered top
        let friendly_buildable = self.world.entity_kind(blocker) == EntityKind::Buildable
            && self.world.team_of(blocker) == bot.actor.team();
        if friendly_buildable {
            let feet = bot.actor.origin.z + attributes.bounds.mins.z;
            if self.world.shrunk_top(blocker).is_some_and(|top| feet >= top) {
                return Obstacle::Jumpable;
            }
        }

        if high.is_clear() {
            Obstacle::Jumpable
        } else {
            Obstacle::None
        }
    }

    /// Sweeps headings on both sides of `dir` for a clear one, right side first
    ///
    /// Returns the first clear heading. When every heading is blocked the
    /// default oscillation pattern is returned instead, with `false`.
    pub fn find_steer_target(&self, bot: &Bot, dir: Vec3) -> (bool, Vec3) {
        let yaw = yaw_of(dir);
        let step = self.config.detour_step_deg;

        for i in 1..=self.config.detour_count() {
            let offset = step * i as f32;
            for candidate in [heading(yaw - offset), heading(yaw + offset)] {
                if self.sweep(bot, candidate, 0.0).is_clear() {
                    return (true, candidate);
                }
            }
        }

        (false, self.default_steer_target(bot, dir))
    }

    /// Goes straight part of the time and sideways the rest, alternating sides
    ///
    /// The entity number shifts the cycle so neighbouring bots do not move in sync.
    pub fn default_steer_target(&self, bot: &Bot, dir: Vec3) -> Vec3 {
        let mut dir = Vec3::new(dir.x, dir.y, 0.0);
        let right = right_of(dir);

        let time = (110 * bot.actor.entity.0 as i64 + bot.level_time().rem_euclid(10_000)) % 1600;
        let invert = time < 800;
        // centred on 600 rather than 800 for some left/right asymmetry
        let sideways = (time - 600).abs() < 500;

        if sideways {
            // atan(2) is about 63 degrees off the blocked heading
            let side = if invert { -1.0 } else { 1.0 };
            dir += right * side * 2.0;
        }
        dir
    }

    /// Looks for an obstacle along the bot's heading and a way past it
    ///
    /// Non-solid geometry and movers are let through while `ignore_geometry` is set.
    pub fn avoid_obstacles(&self, bot: &mut Bot, ignore_geometry: bool) -> Avoidance {
        let mut avoidance = Avoidance {
            dir: bot.nav.dir,
            obstacle: Obstacle::None,
            blocked: false,
        };
        let Some(blocker) = self.path_blocker(bot, avoidance.dir) else {
            return avoidance;
        };

        let attributes = self.attributes(bot);
        if self.config.autocrouch && attributes.has(Abilities::CAN_CROUCH) {
            let origin = bot.actor.origin;
            let end = origin + self.config.obstacle_avoid_range * avoidance.dir;
            let hit = self.world.trace(
                origin,
                &attributes.crouch_bounds(),
                end,
                bot.actor.entity,
                ContentMask::PLAYER_SOLID,
            );
            if hit.is_clear() {
                bot.cmd.up_move = -127;
                return avoidance;
            }
        }

        avoidance.obstacle = self.detect_obstacle(bot, blocker, avoidance.dir);
        match avoidance.obstacle {
            Obstacle::Jumpable => {
                self.jump(bot);
                return avoidance;
            }
            Obstacle::Ladder => {
                // look up the ladder
                avoidance.dir.z += 200.0;
                return avoidance;
            }
            Obstacle::None => {}
        }

        let (found, dir) = self.find_steer_target(bot, avoidance.dir);
        avoidance.dir = dir;
        if found {
            return avoidance;
        }

        let kind = self.world.entity_kind(blocker);
        if ignore_geometry && matches!(kind, EntityKind::General | EntityKind::Mover) {
            return avoidance;
        }

        log::trace!(
            "bot {} blocked by entity {} ({kind:?})",
            bot.actor.entity.0,
            blocker.0
        );
        avoidance.blocked = true;
        avoidance
    }
}
