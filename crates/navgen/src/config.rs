//! Configuration for navigation mesh generation and its scheduling

use botnav_common::{Error, Result, SpeciesAttributes};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::navmesh::NAVMESH_VERSION;

/// Smallest and largest accepted per-frame budget for single-thread generation
pub const MSEC_PER_FRAME_RANGE: (u32, u32) = (1, 1500);

/// Voxelization parameters shared by every species on a map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavgenConfig {
    /// Vertical resolution of the voxel grid
    pub cell_height: f32,
    /// Number of cells across an agent radius
    pub cells_per_radius: f32,
    /// Lower bound on the horizontal cell size
    pub min_cell_size: f32,
    /// Largest floor step an agent walks up without jumping
    pub step_size: f32,
    /// The maximum slope in degrees that is considered walkable
    pub walkable_slope_angle: f32,
}

impl Default for NavgenConfig {
    fn default() -> Self {
        Self {
            cell_height: 2.0,
            cells_per_radius: 2.0,
            min_cell_size: 2.0,
            step_size: 18.0,
            walkable_slope_angle: 46.0,
        }
    }
}

impl NavgenConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cell_height(mut self, cell_height: f32) -> Self {
        self.cell_height = cell_height;
        self
    }

    pub fn with_cells_per_radius(mut self, cells_per_radius: f32) -> Self {
        self.cells_per_radius = cells_per_radius;
        self
    }

    pub fn with_step_size(mut self, step_size: f32) -> Self {
        self.step_size = step_size;
        self
    }

    pub fn with_walkable_slope_angle(mut self, walkable_slope_angle: f32) -> Self {
        self.walkable_slope_angle = walkable_slope_angle;
        self
    }

    /// Reads `<dir>/<map>.navcfg` if present, the defaults otherwise
    pub fn read_for_map(dir: &Path, map_name: &str) -> Result<Self> {
        let path = dir.join(format!("{map_name}.navcfg"));
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::InvalidConfig(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cell_height <= 0.0 || self.min_cell_size <= 0.0 {
            return Err(Error::InvalidConfig(
                "Invalid cell size or height".to_string(),
            ));
        }
        if self.cells_per_radius <= 0.0 {
            return Err(Error::InvalidConfig(
                "Cells per radius must be positive".to_string(),
            ));
        }
        if self.step_size < 0.0 {
            return Err(Error::InvalidConfig(
                "Step size cannot be negative".to_string(),
            ));
        }
        if !(0.0..=90.0).contains(&self.walkable_slope_angle) {
            return Err(Error::InvalidConfig(
                "Invalid walkable slope angle".to_string(),
            ));
        }
        Ok(())
    }

    /// Horizontal cell size used for an agent
    pub fn cell_size(&self, agent: &AgentParams) -> f32 {
        (agent.radius / self.cells_per_radius).max(self.min_cell_size)
    }

    /// Digest of everything that influences the mesh built for `agent`
    pub fn fingerprint(&self, agent: &AgentParams) -> u64 {
        let mut hash = Fnv1a::new();
        hash.write_u32(NAVMESH_VERSION);
        for value in [
            self.cell_height,
            self.cells_per_radius,
            self.min_cell_size,
            self.step_size,
            self.walkable_slope_angle,
            agent.radius,
            agent.height,
            agent.climb,
        ] {
            hash.write_u32(value.to_bits());
        }
        hash.finish()
    }
}

/// Physical dimensions of the agent a mesh is built for
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentParams {
    pub radius: f32,
    pub height: f32,
    pub climb: f32,
}

impl AgentParams {
    pub fn for_species(attributes: &SpeciesAttributes, config: &NavgenConfig) -> Self {
        Self {
            radius: attributes.bounds.horizontal_radius(),
            height: attributes.bounds.height(),
            climb: config.step_size,
        }
    }
}

/// 64-bit FNV-1a, stable across runs and platforms
struct Fnv1a(u64);

impl Fnv1a {
    fn new() -> Self {
        Self(0xcbf2_9ce4_8422_2325)
    }

    fn write_u32(&mut self, value: u32) {
        for byte in value.to_le_bytes() {
            self.0 ^= byte as u64;
            self.0 = self.0.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

/// How generation work is scheduled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Background worker threads, 0 generates on the main thread
    pub worker_threads: usize,
    /// Time budget per server frame for main-thread generation
    pub msec_per_frame: u32,
    /// Share meshes between physically similar species
    pub reduce_species: bool,
    /// Level time between progress reports
    pub progress_interval_ms: i64,
    /// Where navigation mesh files are read and written, none keeps them in memory
    pub navmesh_dir: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 1,
            msec_per_frame: 20,
            reduce_species: false,
            progress_interval_ms: 10_000,
            navmesh_dir: None,
        }
    }
}

impl SchedulerConfig {
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    pub fn with_msec_per_frame(mut self, msec_per_frame: u32) -> Self {
        self.msec_per_frame = msec_per_frame;
        self
    }

    pub fn with_reduce_species(mut self, reduce_species: bool) -> Self {
        self.reduce_species = reduce_species;
        self
    }

    pub fn with_navmesh_dir(mut self, navmesh_dir: impl Into<PathBuf>) -> Self {
        self.navmesh_dir = Some(navmesh_dir.into());
        self
    }

    /// The per-frame budget, clamped to [`MSEC_PER_FRAME_RANGE`]
    pub fn frame_budget(&self) -> Duration {
        let (min, max) = MSEC_PER_FRAME_RANGE;
        Duration::from_millis(self.msec_per_frame.clamp(min, max) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botnav_common::{Species, SpeciesProvider, StaticSpeciesTable};

    fn agent() -> AgentParams {
        let table = StaticSpeciesTable::new();
        AgentParams::for_species(table.attributes(Species::HumanNaked), &NavgenConfig::default())
    }

    #[test]
    fn test_fingerprint_is_stable_and_sensitive() {
        let config = NavgenConfig::default();
        assert_eq!(config.fingerprint(&agent()), config.fingerprint(&agent()));

        let changed = config.clone().with_step_size(20.0);
        assert_ne!(config.fingerprint(&agent()), changed.fingerprint(&agent()));

        let mut taller = agent();
        taller.height += 1.0;
        assert_ne!(config.fingerprint(&agent()), config.fingerprint(&taller));
    }

    #[test]
    fn test_agent_params() {
        let agent = agent();
        assert_eq!(agent.radius, 15.0);
        assert_eq!(agent.height, 56.0);
        assert_eq!(agent.climb, 18.0);
        assert_eq!(NavgenConfig::default().cell_size(&agent), 7.5);
    }

    #[test]
    fn test_frame_budget_is_clamped() {
        let config = SchedulerConfig::default().with_msec_per_frame(0);
        assert_eq!(config.frame_budget(), Duration::from_millis(1));
        let config = SchedulerConfig::default().with_msec_per_frame(100_000);
        assert_eq!(config.frame_budget(), Duration::from_millis(1500));
    }

    #[test]
    fn test_validate() {
        assert!(NavgenConfig::default().validate().is_ok());
        assert!(NavgenConfig::default().with_cell_height(0.0).validate().is_err());
        assert!(NavgenConfig::default()
            .with_walkable_slope_angle(120.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_read_for_map() {
        let dir = tempfile::tempdir().unwrap();
        let config = NavgenConfig::read_for_map(dir.path(), "atcs").unwrap();
        assert_eq!(config, NavgenConfig::default());

        std::fs::write(dir.path().join("atcs.navcfg"), r#"{ "step_size": 24.0 }"#).unwrap();
        let config = NavgenConfig::read_for_map(dir.path(), "atcs").unwrap();
        assert_eq!(config.step_size, 24.0);
        assert_eq!(config.cell_height, 2.0);

        std::fs::write(dir.path().join("atcs.navcfg"), "not json").unwrap();
        assert!(NavgenConfig::read_for_map(dir.path(), "atcs").is_err());
    }
}
