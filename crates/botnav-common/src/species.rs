//! Species enumeration and the static attribute table
//!
//! Steering and mesh generation never branch on a species directly; they ask
//! a [`SpeciesProvider`] for [`SpeciesAttributes`] and act on the capability
//! flags and profiles found there.

use crate::Bounds;
use bitflags::bitflags;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Team an actor or entity belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    None,
    Aliens,
    Humans,
}

/// Actor archetype with fixed physical and movement capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Species {
    Builder,
    BuilderUpg,
    Level0,
    Level1,
    Level2,
    Level2Upg,
    Level3,
    Level3Upg,
    Level4,
    HumanNaked,
    HumanLight,
    HumanMedium,
    HumanBsuit,
}

impl Species {
    /// Every species, in table order
    pub const ALL: [Species; 13] = [
        Species::Builder,
        Species::BuilderUpg,
        Species::Level0,
        Species::Level1,
        Species::Level2,
        Species::Level2Upg,
        Species::Level3,
        Species::Level3Upg,
        Species::Level4,
        Species::HumanNaked,
        Species::HumanLight,
        Species::HumanMedium,
        Species::HumanBsuit,
    ];

    /// Short name used in file names and console commands
    pub fn name(self) -> &'static str {
        match self {
            Species::Builder => "builder",
            Species::BuilderUpg => "builderupg",
            Species::Level0 => "level0",
            Species::Level1 => "level1",
            Species::Level2 => "level2",
            Species::Level2Upg => "level2upg",
            Species::Level3 => "level3",
            Species::Level3Upg => "level3upg",
            Species::Level4 => "level4",
            Species::HumanNaked => "human_naked",
            Species::HumanLight => "human_light",
            Species::HumanMedium => "human_medium",
            Species::HumanBsuit => "human_bsuit",
        }
    }

    /// Case-insensitive lookup by short name
    pub fn from_name(name: &str) -> Option<Species> {
        Self::ALL
            .iter()
            .copied()
            .find(|species| species.name().eq_ignore_ascii_case(name))
    }

    pub fn team(self) -> Team {
        match self {
            Species::HumanNaked
            | Species::HumanLight
            | Species::HumanMedium
            | Species::HumanBsuit => Team::Humans,
            _ => Team::Aliens,
        }
    }

    /// The species whose navigation mesh this species uses
    ///
    /// With `reduce` set, physically similar species share one mesh.
    pub fn navmesh_species(self, reduce: bool) -> Species {
        if !reduce {
            return self;
        }
        match self {
            Species::BuilderUpg => Species::Builder,
            Species::Level2Upg => Species::Level2,
            Species::Level3Upg => Species::Level3,
            Species::HumanLight | Species::HumanMedium => Species::HumanNaked,
            other => other,
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The distinct navigation meshes needed to serve every species
pub fn required_navmeshes(reduce: bool) -> Vec<Species> {
    let mut required: Vec<Species> = Species::ALL
        .iter()
        .map(|species| species.navmesh_species(reduce))
        .collect();
    required.sort();
    required.dedup();
    required
}

bitflags! {
    /// Movement abilities of a species
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Abilities: u32 {
        /// Can climb walls and ceilings
        const WALLCLIMBER = 1 << 0;
        /// Can climb ladder surfaces
        const CAN_USE_LADDERS = 1 << 1;
        /// Can crouch under low obstacles
        const CAN_CROUCH = 1 << 2;
        /// Can carry a jetpack
        const JETPACK = 1 << 3;
        /// Jumps off walls toward higher ground
        const WALL_JUMP = 1 << 4;
        /// Can sprint
        const SPRINT = 1 << 5;
        /// Charges forward with the secondary attack while fleeing
        const TRAMPLE = 1 << 6;
    }
}

/// Close-range attack used opportunistically while wall-climbing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClimbAttack {
    /// Forward trace distance
    pub range: f32,
    /// Presses the primary attack at the enemy, otherwise only keeps climbing
    pub fires: bool,
}

/// Charged leap fired through the secondary attack
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeapProfile {
    /// The leap is (re)charged while the weapon charge is at most this value
    pub max_charge: i32,
    /// Launch speed used to aim the leap
    pub magnitude: f32,
    /// Stops charging while fleeing so a jumpable obstacle can be cleared
    pub yields_to_jump: bool,
}

/// Physical attributes of one species
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesAttributes {
    /// Standing bounding box
    pub bounds: Bounds,
    /// Top of the bounding box while crouched
    pub crouch_max_z: f32,
    /// Eye height above the origin
    pub view_height: f32,
    /// Initial vertical speed of a jump
    pub jump_magnitude: f32,
    /// Stamina a jump costs, if jumping costs stamina at all
    pub stamina_jump_cost: Option<i32>,
    pub abilities: Abilities,
    pub climb_attack: Option<ClimbAttack>,
    pub leap: Option<LeapProfile>,
    /// Chance per second of a random jump while fleeing
    #[serde(default)]
    pub flee_jump_chance: f32,
}

impl SpeciesAttributes {
    pub fn has(&self, ability: Abilities) -> bool {
        self.abilities.contains(ability)
    }

    /// Crouched bounding box
    pub fn crouch_bounds(&self) -> Bounds {
        Bounds::new(
            self.bounds.mins,
            Vec3::new(self.bounds.maxs.x, self.bounds.maxs.y, self.crouch_max_z),
        )
    }

    /// Apex height of a standing jump under `gravity`
    pub fn jump_height(&self, gravity: f32) -> f32 {
        if gravity <= 0.0 {
            return 0.0;
        }
        crate::sqr(self.jump_magnitude) / (gravity * 2.0)
    }
}

/// Read-only lookup of species attributes
pub trait SpeciesProvider {
    fn attributes(&self, species: Species) -> &SpeciesAttributes;
}

pub const LEVEL0_BITE_RANGE: f32 = 64.0;
pub const LEVEL1_CLAW_RANGE: f32 = 96.0;
pub const LEVEL1_POUNCE_DISTANCE: f32 = 300.0;
pub const LEVEL2_FLEE_JUMP_CHANCE: f32 = 0.2;
pub const LEVEL3_POUNCE_TIME: i32 = 700;
pub const LEVEL3_POUNCE_JUMP_MAG: f32 = 700.0;
pub const LEVEL3_POUNCE_TIME_UPG: i32 = 700;
pub const LEVEL3_POUNCE_JUMP_MAG_UPG: f32 = 800.0;

/// The built-in species table
#[derive(Debug, Clone)]
pub struct StaticSpeciesTable {
    entries: Vec<SpeciesAttributes>,
}

impl Default for StaticSpeciesTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticSpeciesTable {
    pub fn new() -> Self {
        let entries = Species::ALL.iter().map(|&s| Self::default_attributes(s)).collect();
        Self { entries }
    }

    /// Replaces the attributes of one species
    pub fn with_attributes(mut self, species: Species, attributes: SpeciesAttributes) -> Self {
        self.entries[species as usize] = attributes;
        self
    }

    fn cube(half: f32, half_height: f32) -> Bounds {
        Bounds::new(
            Vec3::new(-half, -half, -half_height),
            Vec3::new(half, half, half_height),
        )
    }

    fn alien(bounds: Bounds, view_height: f32, jump_magnitude: f32, abilities: Abilities) -> SpeciesAttributes {
        SpeciesAttributes {
            crouch_max_z: bounds.maxs.z,
            bounds,
            view_height,
            jump_magnitude,
            stamina_jump_cost: None,
            abilities,
            climb_attack: None,
            leap: None,
            flee_jump_chance: 0.0,
        }
    }

    fn human(maxs_z: f32, abilities: Abilities) -> SpeciesAttributes {
        SpeciesAttributes {
            bounds: Bounds::new(Vec3::new(-15.0, -15.0, -24.0), Vec3::new(15.0, 15.0, maxs_z)),
            crouch_max_z: 16.0,
            view_height: 26.0,
            jump_magnitude: 270.0,
            stamina_jump_cost: Some(55),
            abilities,
            climb_attack: None,
            leap: None,
            flee_jump_chance: 0.0,
        }
    }

    fn default_attributes(species: Species) -> SpeciesAttributes {
        let human_abilities = Abilities::CAN_USE_LADDERS | Abilities::CAN_CROUCH | Abilities::SPRINT;
        match species {
            Species::Builder => Self::alien(Self::cube(15.0, 20.0), 4.0, 270.0, Abilities::empty()),
            Species::BuilderUpg => {
                Self::alien(Self::cube(15.0, 20.0), 4.0, 270.0, Abilities::WALLCLIMBER)
            }
            Species::Level0 => SpeciesAttributes {
                climb_attack: Some(ClimbAttack {
                    range: LEVEL0_BITE_RANGE,
                    fires: false,
                }),
                ..Self::alien(Self::cube(15.0, 15.0), 0.0, 270.0, Abilities::WALLCLIMBER)
            },
            Species::Level1 => SpeciesAttributes {
                climb_attack: Some(ClimbAttack {
                    range: LEVEL1_CLAW_RANGE,
                    fires: true,
                }),
                leap: Some(LeapProfile {
                    max_charge: 50,
                    magnitude: LEVEL1_POUNCE_DISTANCE,
                    yields_to_jump: false,
                }),
                ..Self::alien(Self::cube(18.0, 18.0), 4.0, 270.0, Abilities::WALLCLIMBER)
            },
            Species::Level2 => SpeciesAttributes {
                flee_jump_chance: LEVEL2_FLEE_JUMP_CHANCE,
                ..Self::alien(Self::cube(24.0, 24.0), 12.0, 380.0, Abilities::WALL_JUMP)
            },
            Species::Level2Upg => SpeciesAttributes {
                flee_jump_chance: LEVEL2_FLEE_JUMP_CHANCE,
                ..Self::alien(Self::cube(27.0, 26.0), 12.0, 380.0, Abilities::WALL_JUMP)
            },
            Species::Level3 => SpeciesAttributes {
                leap: Some(LeapProfile {
                    max_charge: LEVEL3_POUNCE_TIME - 1,
                    magnitude: LEVEL3_POUNCE_JUMP_MAG,
                    yields_to_jump: true,
                }),
                ..Self::alien(Self::cube(32.0, 21.0), 24.0, 200.0, Abilities::empty())
            },
            Species::Level3Upg => SpeciesAttributes {
                leap: Some(LeapProfile {
                    max_charge: LEVEL3_POUNCE_TIME_UPG - 1,
                    magnitude: LEVEL3_POUNCE_JUMP_MAG_UPG,
                    yields_to_jump: true,
                }),
                ..Self::alien(Self::cube(35.0, 21.0), 27.0, 200.0, Abilities::empty())
            },
            Species::Level4 => Self::alien(Self::cube(40.0, 40.0), 35.0, 270.0, Abilities::TRAMPLE),
            Species::HumanNaked | Species::HumanLight | Species::HumanMedium => {
                Self::human(32.0, human_abilities | Abilities::JETPACK)
            }
            Species::HumanBsuit => Self::human(38.0, human_abilities),
        }
    }
}

impl SpeciesProvider for StaticSpeciesTable {
    fn attributes(&self, species: Species) -> &SpeciesAttributes {
        &self.entries[species as usize]
    }
}
