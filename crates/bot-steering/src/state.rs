//! Per-bot navigation state

use botnav_common::{Bounds, EntityId, Team, Vec3};

use crate::{ActorState, UserCmd};

/// Where a bot is heading
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NavGoal {
    /// A point in the world
    Position(Vec3),
    Entity(EntityGoal),
}

/// An entity used as a goal, as last seen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityGoal {
    pub entity: EntityId,
    pub position: Vec3,
    pub bounds: Bounds,
    pub team: Team,
    /// Must be approached until touching, such as a healing station
    pub close_approach: bool,
}

impl NavGoal {
    pub fn position(&self) -> Vec3 {
        match self {
            NavGoal::Position(position) => *position,
            NavGoal::Entity(goal) => goal.position,
        }
    }

    /// Team of the targeted entity, `Team::None` for positions
    pub fn team(&self) -> Team {
        match self {
            NavGoal::Position(_) => Team::None,
            NavGoal::Entity(goal) => goal.team,
        }
    }
}

/// Phase of a jetpack ascent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JetpackPhase {
    #[default]
    None,
    /// Holding position until there is fuel for the climb
    Waiting,
    Flying,
    /// Below the target height, still thrusting until above it
    Landing,
}

/// Result of one steering tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Ordinary steering toward the goal
    Moving,
    /// Vertical traversal has control of the movement
    Traversing,
    /// No progress for too long, pick another goal
    Stuck,
}

/// Navigation memory of one bot
#[derive(Debug, Clone, PartialEq)]
pub struct BotNavState {
    pub goal: Option<NavGoal>,
    /// Direction toward the next corner
    pub dir: Vec3,
    /// Position steering aims for when no corner is known
    pub target_pos: Vec3,
    /// Level time of the last progress
    pub stuck_time: i64,
    /// Where the last progress was measured
    pub stuck_anchor: Vec3,
    /// Level time the last navigation connection was taken
    pub last_navcon_time: i64,
    /// Height covered by the last navigation connection, negative going down
    pub last_navcon_distance: i64,
    pub jetpack: JetpackPhase,
}

impl Default for BotNavState {
    fn default() -> Self {
        Self {
            goal: None,
            dir: Vec3::X,
            target_pos: Vec3::ZERO,
            stuck_time: 0,
            stuck_anchor: Vec3::ZERO,
            last_navcon_time: i64::MIN / 2,
            last_navcon_distance: 0,
            jetpack: JetpackPhase::None,
        }
    }
}

impl BotNavState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts heading for a new goal, forgetting stuck and jetpack state
    pub fn set_goal(&mut self, goal: NavGoal, origin: Vec3, level_time: i64) {
        self.goal = Some(goal);
        self.target_pos = goal.position();
        self.jetpack = JetpackPhase::None;
        self.reset_stuck_time(origin, level_time);
    }

    pub fn clear_goal(&mut self) {
        self.goal = None;
        self.jetpack = JetpackPhase::None;
    }

    /// Updates the heading toward the next corner of the route
    pub fn set_direction(&mut self, dir: Vec3, target_pos: Vec3) {
        self.dir = dir;
        self.target_pos = target_pos;
    }

    /// Records taking a navigation connection covering `distance` vertically
    pub fn record_navcon(&mut self, level_time: i64, distance: i64) {
        self.last_navcon_time = level_time;
        self.last_navcon_distance = distance;
    }

    pub fn reset_stuck_time(&mut self, origin: Vec3, level_time: i64) {
        self.stuck_time = level_time;
        self.stuck_anchor = origin;
    }

    /// Moves the anchor when the actor left its radius, returns the stuck duration
    pub fn update_stuck(&mut self, origin: Vec3, level_time: i64, radius: f32) -> i64 {
        if origin.distance_squared(self.stuck_anchor) > radius * radius {
            self.reset_stuck_time(origin, level_time);
        }
        level_time - self.stuck_time
    }

    /// End of the window in which a wall-climber keeps climbing
    pub fn wallclimb_stop_time(&self) -> i64 {
        self.last_navcon_time + self.last_navcon_distance * 4 + 500
    }
}

/// Everything one bot carries through a steering tick
#[derive(Debug, Clone)]
pub struct Bot {
    pub actor: ActorState,
    pub nav: BotNavState,
    pub cmd: UserCmd,
}

impl Bot {
    pub fn new(actor: ActorState) -> Self {
        let mut nav = BotNavState::new();
        nav.reset_stuck_time(actor.origin, actor.level_time);
        Self {
            actor,
            nav,
            cmd: UserCmd::new(),
        }
    }

    /// Starts a new tick: a fresh command keeping the current aim
    pub fn begin_tick(&mut self, level_time: i64) {
        self.actor.frame_msec = (level_time - self.actor.level_time).max(0);
        self.actor.level_time = level_time;
        self.cmd = UserCmd {
            angles: self.actor.view_angles,
            ..UserCmd::new()
        };
    }

    pub fn level_time(&self) -> i64 {
        self.actor.level_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_goal_resets_jetpack_and_stuck() {
        let mut nav = BotNavState::new();
        nav.jetpack = JetpackPhase::Flying;
        nav.stuck_time = 10;
        nav.set_goal(NavGoal::Position(Vec3::new(100.0, 0.0, 0.0)), Vec3::ZERO, 5000);
        assert_eq!(nav.jetpack, JetpackPhase::None);
        assert_eq!(nav.stuck_time, 5000);
        assert_eq!(nav.target_pos, Vec3::new(100.0, 0.0, 0.0));
    }

    #[test]
    fn test_progress_moves_stuck_anchor() {
        let mut nav = BotNavState::new();
        nav.reset_stuck_time(Vec3::ZERO, 0);
        assert_eq!(nav.update_stuck(Vec3::new(30.0, 0.0, 0.0), 1000, 64.0), 1000);
        assert_eq!(nav.update_stuck(Vec3::new(80.0, 0.0, 0.0), 2000, 64.0), 0);
        assert_eq!(nav.stuck_anchor, Vec3::new(80.0, 0.0, 0.0));
        assert_eq!(nav.update_stuck(Vec3::new(80.0, 10.0, 0.0), 2500, 64.0), 500);
    }

    #[test]
    fn test_wallclimb_stop_time() {
        let mut nav = BotNavState::new();
        nav.record_navcon(1000, 250);
        assert_eq!(nav.wallclimb_stop_time(), 2500);
        nav.record_navcon(1000, -50);
        assert_eq!(nav.wallclimb_stop_time(), 1300);
    }
}
