//! The movement command buffer a bot fills every tick

use bitflags::bitflags;
use botnav_common::{clamp, length_2d, rad_to_deg, yaw_of, Vec3};
use serde::{Deserialize, Serialize};

/// Full speed of a movement axis
pub const MAX_MOVE: i8 = 127;
/// Speed of a movement axis while walking
pub const WALK_MOVE: i8 = 63;

bitflags! {
    /// Buttons held in a command
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Buttons: u32 {
        const ATTACK_PRIMARY = 1 << 0;
        const ATTACK_SECONDARY = 1 << 1;
        const WALKING = 1 << 2;
        const SPRINT = 1 << 3;
    }
}

bitflags! {
    /// Relative movement directions
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MoveDir: u32 {
        const FORWARD = 1 << 0;
        const BACKWARD = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
    }
}

/// Movement and aim requested by a bot for one tick
///
/// Move axes are signed bytes: positive forward, right and up.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UserCmd {
    pub forward_move: i8,
    pub right_move: i8,
    pub up_move: i8,
    pub buttons: Buttons,
    /// Requested view angles `(pitch, yaw, roll)` in degrees, negative pitch looks up
    pub angles: Vec3,
}

impl UserCmd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pressed(&self, button: Buttons) -> bool {
        self.buttons.contains(button)
    }

    pub fn press(&mut self, button: Buttons) {
        self.buttons.insert(button);
    }

    pub fn release(&mut self, button: Buttons) {
        self.buttons.remove(button);
    }

    /// Top speed of the move axes given the walking button
    pub fn max_speed(&self) -> i8 {
        if self.is_pressed(Buttons::WALKING) {
            WALK_MOVE
        } else {
            MAX_MOVE
        }
    }

    /// Points the view from `eye` at `target`
    pub fn aim_at(&mut self, eye: Vec3, target: Vec3) {
        let delta = target - eye;
        if delta.length_squared() < f32::EPSILON {
            return;
        }
        self.angles.y = yaw_of(delta);
        self.angles.x = -rad_to_deg(delta.z.atan2(length_2d(delta)));
    }

    /// Sets the view pitch, clamped to straight up or down
    pub fn set_pitch(&mut self, pitch: f32) {
        self.angles.x = clamp(pitch, -90.0, 90.0);
    }

    /// Clears movement and buttons, keeping the aim
    pub fn clear_movement(&mut self) {
        self.forward_move = 0;
        self.right_move = 0;
        self.up_move = 0;
        self.buttons = Buttons::empty();
    }
}
