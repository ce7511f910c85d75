//! A world made of axis-aligned boxes for steering tests

use std::collections::HashMap;

use botnav_common::{
    Bounds, ContentMask, EntityId, EntityKind, SpatialQuery, SurfaceFlags, Team, TraceHit, Vec3,
};

use crate::PathQuery;

#[derive(Debug, Clone)]
pub struct Solid {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub entity: EntityId,
    pub surface_flags: SurfaceFlags,
}

#[derive(Default)]
pub struct BoxWorld {
    solids: Vec<Solid>,
    kinds: HashMap<EntityId, (EntityKind, Team)>,
    shrunk_tops: HashMap<EntityId, f32>,
    next_entity: u32,
}

impl BoxWorld {
    /// A world with a large floor whose top is at z = 0
    pub fn with_floor() -> Self {
        let mut world = Self {
            next_entity: 64,
            ..Self::default()
        };
        world.add_world(Vec3::new(-4096.0, -4096.0, -16.0), Vec3::new(4096.0, 4096.0, 0.0));
        world
    }

    /// Adds static world geometry
    pub fn add_world(&mut self, mins: Vec3, maxs: Vec3) -> &mut Self {
        self.solids.push(Solid {
            mins,
            maxs,
            entity: EntityId::WORLD,
            surface_flags: SurfaceFlags::empty(),
        });
        self
    }

    pub fn add_ladder(&mut self, mins: Vec3, maxs: Vec3) -> &mut Self {
        self.solids.push(Solid {
            mins,
            maxs,
            entity: EntityId::WORLD,
            surface_flags: SurfaceFlags::LADDER,
        });
        self
    }

    /// Adds a box owned by a new entity and returns its id
    pub fn add_entity(&mut self, mins: Vec3, maxs: Vec3, kind: EntityKind, team: Team) -> EntityId {
        let entity = EntityId(self.next_entity);
        self.next_entity += 1;
        self.solids.push(Solid {
            mins,
            maxs,
            entity,
            surface_flags: SurfaceFlags::empty(),
        });
        self.kinds.insert(entity, (kind, team));
        entity
    }

    /// Adds a buildable of `team` that lowers its top to `shrunk_top` for allies
    pub fn add_barricade(&mut self, mins: Vec3, maxs: Vec3, team: Team, shrunk_top: f32) -> EntityId {
        let entity = self.add_entity(mins, maxs, EntityKind::Buildable, team);
        self.shrunk_tops.insert(entity, shrunk_top);
        entity
    }

    /// Entry fraction and normal of a swept box into one solid
    fn sweep(solid: &Solid, start: Vec3, bounds: &Bounds, end: Vec3) -> Option<(f32, Vec3)> {
        // grow the solid by the moving box and sweep a point instead
        let mins = solid.mins - bounds.maxs;
        let maxs = solid.maxs - bounds.mins;
        let delta = end - start;

        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;
        let mut normal = Vec3::ZERO;

        for axis in 0..3 {
            let (s, d) = (start[axis], delta[axis]);
            if d.abs() < 1e-6 {
                // touching is not overlapping
                if s <= mins[axis] || s >= maxs[axis] {
                    return None;
                }
                continue;
            }
            let t1 = (mins[axis] - s) / d;
            let t2 = (maxs[axis] - s) / d;
            let (near, far) = if t1 < t2 { (t1, t2) } else { (t2, t1) };
            if near > t_enter {
                t_enter = near;
                normal = Vec3::ZERO;
                normal[axis] = -d.signum();
            }
            t_exit = t_exit.min(far);
        }

        if t_enter >= t_exit || t_exit <= 0.0 || t_enter >= 1.0 {
            return None;
        }
        if t_enter < 0.0 {
            // started inside
            return Some((0.0, Vec3::ZERO));
        }
        Some((t_enter, normal))
    }
}

impl SpatialQuery for BoxWorld {
    fn trace(
        &self,
        start: Vec3,
        bounds: &Bounds,
        end: Vec3,
        skip: EntityId,
        _mask: ContentMask,
    ) -> TraceHit {
        let mut best = TraceHit::clear(end);
        for solid in self.solids.iter().filter(|solid| solid.entity != skip) {
            if let Some((fraction, normal)) = Self::sweep(solid, start, bounds, end) {
                if fraction < best.fraction {
                    best = TraceHit {
                        fraction,
                        end_pos: start + (end - start) * fraction,
                        normal,
                        surface_flags: solid.surface_flags,
                        entity: Some(solid.entity),
                    };
                }
            }
        }
        best
    }

    fn entity_kind(&self, entity: EntityId) -> EntityKind {
        if entity == EntityId::WORLD {
            return EntityKind::World;
        }
        self.kinds
            .get(&entity)
            .map_or(EntityKind::Other, |(kind, _)| *kind)
    }

    fn team_of(&self, entity: EntityId) -> Team {
        self.kinds.get(&entity).map_or(Team::None, |(_, team)| *team)
    }

    fn shrunk_top(&self, entity: EntityId) -> Option<f32> {
        self.shrunk_tops.get(&entity).copied()
    }
}

/// A route whose next corner is fixed
#[derive(Default)]
pub struct FixedPath {
    pub corner: Option<Vec3>,
    /// Fraction reported by mesh traces
    pub walkable_fraction: Option<f32>,
}

impl FixedPath {
    pub fn to(corner: Vec3) -> Self {
        Self {
            corner: Some(corner),
            walkable_fraction: Some(1.0),
        }
    }
}

impl PathQuery for FixedPath {
    fn next_corner(&self, _bot: EntityId) -> Option<Vec3> {
        self.corner
    }

    fn nav_trace(&self, _bot: EntityId, _start: Vec3, _end: Vec3) -> Option<f32> {
        self.walkable_fraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn human_bounds() -> Bounds {
        Bounds::new(Vec3::new(-15.0, -15.0, -24.0), Vec3::new(15.0, 15.0, 32.0))
    }

    #[test]
    fn test_standing_on_the_floor_is_not_a_hit() {
        let world = BoxWorld::with_floor();
        let start = Vec3::new(0.0, 0.0, 24.0);
        let hit = world.trace(
            start,
            &human_bounds(),
            start + Vec3::X * 100.0,
            EntityId(1),
            ContentMask::PLAYER_SOLID,
        );
        assert!(hit.is_clear());
    }

    #[test]
    fn test_sweep_reports_fraction_and_normal() {
        let mut world = BoxWorld::with_floor();
        world.add_world(Vec3::new(25.0, -50.0, 0.0), Vec3::new(45.0, 50.0, 100.0));
        let start = Vec3::new(0.0, 0.0, 24.0);
        let hit = world.trace(
            start,
            &human_bounds(),
            start + Vec3::X * 20.0,
            EntityId(1),
            ContentMask::PLAYER_SOLID,
        );
        assert!((hit.fraction - 0.5).abs() < 1e-5);
        assert_eq!(hit.normal, Vec3::NEG_X);
        assert_eq!(hit.entity, Some(EntityId::WORLD));
    }

    #[test]
    fn test_point_trace_down_hits_floor() {
        let world = BoxWorld::with_floor();
        let hit = world.trace(
            Vec3::new(0.0, 0.0, 50.0),
            &Bounds::new(Vec3::ZERO, Vec3::ZERO),
            Vec3::new(0.0, 0.0, -50.0),
            EntityId(1),
            ContentMask::SOLID,
        );
        assert!((hit.fraction - 0.5).abs() < 1e-5);
        assert_eq!(hit.normal, Vec3::Z);
    }
}
