//! Local steering for bots
//!
//! Every tick the [`SteeringEngine`] turns the direction toward the next
//! corner of a bot's route into a [`UserCmd`]: it sweeps the way ahead with
//! the simulation's [`SpatialQuery`](botnav_common::SpatialQuery), jumps,
//! crouches or detours around what blocks it, and hands control to the
//! vertical traversal (climbing, wall jumps, leaps, jetpack) when the next
//! corner is far above the bot.
//!
//! # Example
//!
//! ```rust,no_run
//! use bot_steering::{Bot, MoveOutcome, PathQuery, SteeringConfig, SteeringEngine};
//! use botnav_common::{SpatialQuery, StaticSpeciesTable};
//!
//! fn tick(world: &dyn SpatialQuery, paths: &dyn PathQuery, bot: &mut Bot, level_time: i64) {
//!     let species = StaticSpeciesTable::new();
//!     let engine = SteeringEngine::new(SteeringConfig::default(), world, &species);
//!     bot.begin_tick(level_time);
//!     if engine.move_to_goal(bot, paths) == MoveOutcome::Stuck {
//!         bot.nav.clear_goal();
//!     }
//! }
//! ```

mod actor;
mod command;
mod config;
mod obstacle;
mod state;
mod steering;
mod vertical;

pub use actor::ActorState;
pub use command::{Buttons, MoveDir, UserCmd, MAX_MOVE, WALK_MOVE};
pub use config::SteeringConfig;
pub use obstacle::{Avoidance, Obstacle};
pub use state::{Bot, BotNavState, EntityGoal, JetpackPhase, MoveOutcome, NavGoal};
pub use steering::{PathQuery, SteeringEngine};
pub use vertical::LEAP_NAVCON_WINDOW_MS;

#[cfg(test)]
mod test_world;


#[cfg(test)]
mod vertical_tests;
