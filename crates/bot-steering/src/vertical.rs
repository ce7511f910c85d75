//! Climbing, wall jumping, leaping and jetpack flight toward corners above the bot

use botnav_common::{ballistic_pitch, clamp, Abilities, ContentMask, Team, Vec3};

use crate::{Bot, Buttons, JetpackPhase, PathQuery, SteeringEngine};

/// Time after a navigation connection during which a leap may be started
pub const LEAP_NAVCON_WINDOW_MS: i64 = 1050;
/// Height a full jetpack tank climbs, with some margin
const JETPACK_FULL_TANK_HEIGHT: f32 = 1200.0;
/// Climb window extension per enemy in reach, about 100ms
const CLIMB_ATTACK_EXTENSION: i64 = 30;
/// Bound on the climb distance reached through extensions
const CLIMB_ATTACK_MAX_DISTANCE: i64 = 4000;
/// Pitch of a wall jump
const WALL_JUMP_PITCH: f32 = -60.0;

impl SteeringEngine<'_> {
    /// Takes over movement when the next corner is far above the bot
    ///
    /// Returns `true` while the vertical movement controls the bot.
    pub fn try_move_upward(&self, bot: &mut Bot, paths: &dyn PathQuery) -> bool {
        let attributes = self.attributes(bot);
        let own_pos = bot.actor.origin;
        let now = bot.level_time();
        let next_corner = paths
            .next_corner(bot.actor.entity)
            .unwrap_or(bot.nav.target_pos);
        let climb_window_open = now <= bot.nav.wallclimb_stop_time();

        if next_corner.z - own_pos.z < self.config.upward_navcon_min_height {
            // a jetpack may still be landing, climbers may still be on the wall
            let keep_going = if attributes.has(Abilities::JETPACK) {
                true
            } else if attributes.has(Abilities::WALLCLIMBER) {
                climb_window_open
            } else {
                false
            };
            if !keep_going {
                return false;
            }
        }

        if attributes.has(Abilities::JETPACK) {
            if !bot.actor.jetpack_equipped {
                return false;
            }
            return self.fly_upward(bot, own_pos, next_corner);
        }

        if attributes.has(Abilities::WALLCLIMBER) || attributes.has(Abilities::WALL_JUMP) {
            // plain climbers take any high corner, fighters only right after a navcon
            let gated = attributes.has(Abilities::WALL_JUMP)
                || attributes.climb_attack.is_some()
                || attributes.leap.is_some();
            if gated && !climb_window_open {
                return false;
            }
        } else if attributes.leap.is_some() {
            let since_navcon = now - bot.nav.last_navcon_time;
            if !(0..=LEAP_NAVCON_WINDOW_MS).contains(&since_navcon) {
                return false;
            }
            self.stand_still(bot);
        } else {
            return false;
        }

        self.move_upward(bot, next_corner);
        true
    }

    /// Issues the species' upward movement toward `next_corner`
    pub fn move_upward(&self, bot: &mut Bot, next_corner: Vec3) {
        let attributes = self.attributes(bot);
        let now = bot.level_time();

        if attributes.has(Abilities::WALLCLIMBER)
            && (attributes.leap.is_none() || now < bot.nav.wallclimb_stop_time())
        {
            self.climb_to_goal(bot);
            return;
        }

        if attributes.has(Abilities::WALL_JUMP) {
            bot.cmd.forward_move = 127;
            bot.cmd.right_move = 0;
            bot.cmd.set_pitch(WALL_JUMP_PITCH);
            self.jump(bot);
            return;
        }

        if let Some(leap) = attributes.leap {
            if bot.actor.weapon_charge <= leap.max_charge {
                let launch = ballistic_pitch(
                    bot.actor.origin,
                    next_corner,
                    leap.magnitude,
                    bot.actor.gravity,
                );
                bot.cmd
                    .set_pitch(clamp(-launch - self.config.upward_leap_angle_corr, -90.0, 90.0));
                bot.cmd.press(Buttons::ATTACK_SECONDARY);
            }
        }
    }

    /// Runs at the wall ahead, sticking to it
    pub fn climb_to_goal(&self, bot: &mut Bot) {
        let own_pos = bot.actor.origin;
        bot.cmd.aim_at(own_pos, own_pos + 100.0 * bot.nav.dir);
        bot.cmd.up_move = -127;
        bot.cmd.forward_move = 127;
        bot.cmd.right_move = 0;
        self.maybe_attack_while_climbing(bot);
    }

    /// Extends the climb window when an enemy is in reach, attacking it if the species fires
    pub fn maybe_attack_while_climbing(&self, bot: &mut Bot) {
        let attributes = self.attributes(bot);
        let Some(attack) = attributes.climb_attack else {
            return;
        };

        let origin = bot.actor.origin;
        let (forward, _) = bot.actor.view_axes();
        let hit = self.world.trace(
            origin,
            &attributes.bounds,
            origin + attack.range * forward,
            bot.actor.entity,
            ContentMask::PLAYER_SOLID,
        );
        let Some(entity) = hit.entity.filter(|_| !hit.is_clear()) else {
            return;
        };

        let team = self.world.team_of(entity);
        if team == Team::None || team == bot.actor.team() {
            return;
        }

        if attack.fires {
            bot.cmd.press(Buttons::ATTACK_PRIMARY);
        }
        bot.nav.last_navcon_distance = (bot.nav.last_navcon_distance + CLIMB_ATTACK_EXTENSION)
            .min(CLIMB_ATTACK_MAX_DISTANCE);
    }

    /// Advances the jetpack phases, returns `true` while the jetpack controls the bot
    pub fn fly_upward(&self, bot: &mut Bot, own_pos: Vec3, next_corner: Vec3) -> bool {
        let now = bot.level_time();
        let since_navcon = now - bot.nav.last_navcon_time;

        match bot.nav.jetpack {
            JetpackPhase::None => {
                if since_navcon < 500 && bot.nav.last_navcon_distance > 50 {
                    self.set_jetpack_phase(bot, JetpackPhase::Waiting);
                    return true;
                }
                false
            }
            JetpackPhase::Waiting => {
                let required_fuel = (self.config.jetpack_fuel_max as f32
                    * bot.nav.last_navcon_distance as f32
                    / JETPACK_FULL_TANK_HEIGHT) as i32;
                if bot.actor.fuel >= required_fuel && since_navcon > 500 {
                    self.set_jetpack_phase(bot, JetpackPhase::Flying);
                }
                bot.nav.reset_stuck_time(own_pos, now);
                self.stand_still(bot);
                true
            }
            JetpackPhase::Flying => {
                if next_corner.z < own_pos.z + self.config.jetpack_landing_z {
                    self.set_jetpack_phase(bot, JetpackPhase::Landing);
                }
                self.stand_still(bot);
                bot.cmd.up_move = 127;
                true
            }
            JetpackPhase::Landing => {
                if next_corner.z + self.config.jetpack_overshoot_z < own_pos.z {
                    self.set_jetpack_phase(bot, JetpackPhase::None);
                    return false;
                }
                bot.cmd.up_move = 127;
                true
            }
        }
    }

    fn set_jetpack_phase(&self, bot: &mut Bot, phase: JetpackPhase) {
        log::debug!(
            "bot {} jetpack {:?} -> {phase:?}",
            bot.actor.entity.0,
            bot.nav.jetpack
        );
        bot.nav.jetpack = phase;
    }
}
