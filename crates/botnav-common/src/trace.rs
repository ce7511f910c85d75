//! Contract of the spatial query primitive provided by the game simulation

use crate::Team;
use bitflags::bitflags;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Surfaces with a normal z below this are too steep to walk on
pub const MIN_WALK_NORMAL: f32 = 0.7;

/// Axis-aligned bounding box relative to an origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub mins: Vec3,
    pub maxs: Vec3,
}

impl Bounds {
    pub fn new(mins: Vec3, maxs: Vec3) -> Self {
        Self { mins, maxs }
    }

    /// The same box shifted vertically
    pub fn raised(&self, dz: f32) -> Self {
        Self {
            mins: self.mins + Vec3::Z * dz,
            maxs: self.maxs + Vec3::Z * dz,
        }
    }

    pub fn width(&self) -> f32 {
        self.maxs.x - self.mins.x
    }

    pub fn height(&self) -> f32 {
        self.maxs.z - self.mins.z
    }

    /// Largest horizontal half-extent
    pub fn horizontal_radius(&self) -> f32 {
        self.mins
            .x
            .abs()
            .max(self.maxs.x.abs())
            .max(self.mins.y.abs())
            .max(self.maxs.y.abs())
    }
}

/// Entity number as used by the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    /// The static world geometry
    pub const WORLD: EntityId = EntityId(1022);
}

/// What kind of entity a trace hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Static world geometry
    World,
    /// Non-solid brush entities such as door panes
    General,
    /// Moving platforms, doors in motion
    Mover,
    /// Structures placed by players
    Buildable,
    /// Players and bots
    Client,
    Other,
}

bitflags! {
    /// Surface properties reported by a trace
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SurfaceFlags: u32 {
        const LADDER = 1 << 0;
        const SLICK = 1 << 1;
        const NO_DAMAGE = 1 << 2;
    }
}

bitflags! {
    /// Contents a trace collides with
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ContentMask: u32 {
        const SOLID = 1 << 0;
        const PLAYER_CLIP = 1 << 1;
        const BODY = 1 << 2;
        /// Everything that blocks a moving player
        const PLAYER_SOLID = Self::SOLID.bits() | Self::PLAYER_CLIP.bits() | Self::BODY.bits();
    }
}

/// Result of sweeping a box through the world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceHit {
    /// Fraction of the path travelled before the first hit, 1.0 if clear
    pub fraction: f32,
    pub end_pos: Vec3,
    /// Normal of the surface hit
    pub normal: Vec3,
    pub surface_flags: SurfaceFlags,
    /// The entity hit, if any
    pub entity: Option<EntityId>,
}

impl TraceHit {
    /// A trace that reached its destination
    pub fn clear(end: Vec3) -> Self {
        Self {
            fraction: 1.0,
            end_pos: end,
            normal: Vec3::ZERO,
            surface_flags: SurfaceFlags::empty(),
            entity: None,
        }
    }

    pub fn is_clear(&self) -> bool {
        self.fraction >= 1.0
    }

    pub fn hit_world_with(&self, flags: SurfaceFlags) -> bool {
        self.entity == Some(EntityId::WORLD) && self.surface_flags.contains(flags)
    }
}

/// The low-level spatial query primitive of the simulation
pub trait SpatialQuery {
    /// Sweeps `bounds` from `start` to `end`, ignoring `skip`
    fn trace(
        &self,
        start: Vec3,
        bounds: &Bounds,
        end: Vec3,
        skip: EntityId,
        mask: ContentMask,
    ) -> TraceHit;

    fn entity_kind(&self, entity: EntityId) -> EntityKind;

    fn team_of(&self, entity: EntityId) -> Team;

    /// Top of a buildable once it shrinks to let its own team pass, if it can
    fn shrunk_top(&self, _entity: EntityId) -> Option<f32> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_helpers() {
        let bounds = Bounds::new(Vec3::new(-15.0, -16.0, -24.0), Vec3::new(15.0, 16.0, 32.0));
        assert_eq!(bounds.width(), 30.0);
        assert_eq!(bounds.height(), 56.0);
        assert_eq!(bounds.horizontal_radius(), 16.0);

        let raised = bounds.raised(18.0);
        assert_eq!(raised.mins.z, -6.0);
        assert_eq!(raised.maxs.z, 50.0);
    }

    #[test]
    fn test_ladder_hit_requires_world() {
        let mut hit = TraceHit::clear(Vec3::ZERO);
        hit.fraction = 0.5;
        hit.surface_flags = SurfaceFlags::LADDER;
        hit.entity = Some(EntityId(3));
        assert!(!hit.hit_world_with(SurfaceFlags::LADDER));
        hit.entity = Some(EntityId::WORLD);
        assert!(hit.hit_world_with(SurfaceFlags::LADDER));
    }
}
