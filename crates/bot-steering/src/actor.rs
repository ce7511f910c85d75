//! Snapshot of an actor's simulation state for one tick

use botnav_common::{angle_vectors, EntityId, Species, SpeciesAttributes, Team, Vec3};

/// What the steering engine reads about the actor it drives
#[derive(Debug, Clone, PartialEq)]
pub struct ActorState {
    pub entity: EntityId,
    pub species: Species,
    pub origin: Vec3,
    /// Current view angles `(pitch, yaw, roll)` in degrees
    pub view_angles: Vec3,
    pub gravity: f32,
    pub stamina: i32,
    /// Remaining jetpack fuel
    pub fuel: i32,
    /// Charge accumulated by the secondary attack
    pub weapon_charge: i32,
    /// Carries a jetpack
    pub jetpack_equipped: bool,
    /// Skilled enough to use movement tricks when heading to a goal
    pub fast_flee: bool,
    /// Current simulation time in milliseconds
    pub level_time: i64,
    /// Milliseconds since the previous tick
    pub frame_msec: i64,
}

impl ActorState {
    pub fn new(entity: EntityId, species: Species, origin: Vec3) -> Self {
        Self {
            entity,
            species,
            origin,
            view_angles: Vec3::ZERO,
            gravity: 800.0,
            stamina: 1000,
            fuel: 0,
            weapon_charge: 0,
            jetpack_equipped: false,
            fast_flee: false,
            level_time: 0,
            frame_msec: 0,
        }
    }

    pub fn team(&self) -> Team {
        self.species.team()
    }

    /// Eye position
    pub fn view_origin(&self, attributes: &SpeciesAttributes) -> Vec3 {
        self.origin + Vec3::Z * attributes.view_height
    }

    /// Forward and right vectors of the current view
    pub fn view_axes(&self) -> (Vec3, Vec3) {
        let (forward, right, _) = angle_vectors(self.view_angles);
        (forward, right)
    }

    /// Forward and right vectors of the current view, ignoring pitch
    pub fn flat_view_axes(&self) -> (Vec3, Vec3) {
        let (forward, right, _) = angle_vectors(Vec3::new(0.0, self.view_angles.y, 0.0));
        (forward, right)
    }
}
