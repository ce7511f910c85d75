//! Navigation system lifecycle: load or generate meshes for the current map
//!
//! [`NavSystem`] owns the status, the mesh store and the generator. It is the
//! only writer of [`NavMeshStatus`] and the only place finished meshes are
//! committed.

use std::sync::Arc;

use botnav_common::{required_navmeshes, Error, Result, Species, SpeciesProvider};

use crate::config::{NavgenConfig, SchedulerConfig};
use crate::generator::{expected_header, persist, Clock, MonotonicClock, NavmeshGenerator};
use crate::map::MapGeometry;
use crate::navmesh::{NavMesh, NavMeshHeader};
use crate::request::GenerationRequest;
use crate::store::{navmesh_file_path, NavMeshStore};

/// Where the navigation meshes of the current map stand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavMeshStatus {
    Uninitialized,
    Loaded,
    LoadFailed,
    Generating,
}

/// What to do about meshes with no valid file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateMode {
    /// Fail initialization
    Never,
    /// Generate over the following frames
    Background,
    /// Generate before returning
    Blocking,
}

/// Hooks into the bot population
pub trait BotLifecycle {
    /// Called when navigation is unavailable for the rest of the map
    fn remove_all_bots(&mut self);

    /// Message for operators and players
    fn broadcast(&mut self, message: &str);
}

/// Owner of the per-map navigation meshes and their generation
pub struct NavSystem {
    config: SchedulerConfig,
    default_navgen: NavgenConfig,
    navgen: NavgenConfig,
    species: Box<dyn SpeciesProvider>,
    clock: Box<dyn Clock>,
    status: NavMeshStatus,
    store: NavMeshStore,
    generator: NavmeshGenerator,
    map: Option<Arc<MapGeometry>>,
    required: Vec<Species>,
    server_frame: u64,
    last_slice_frame: Option<u64>,
    next_progress_report: Option<i64>,
}

impl NavSystem {
    pub fn new(config: SchedulerConfig, species: Box<dyn SpeciesProvider>) -> Self {
        Self {
            config,
            default_navgen: NavgenConfig::default(),
            navgen: NavgenConfig::default(),
            species,
            clock: Box::new(MonotonicClock::default()),
            status: NavMeshStatus::Uninitialized,
            store: NavMeshStore::new(),
            generator: NavmeshGenerator::new(),
            map: None,
            required: Vec::new(),
            server_frame: 0,
            last_slice_frame: None,
            next_progress_report: None,
        }
    }

    /// Generation parameters used when a map has no override file
    pub fn with_navgen_config(mut self, navgen: NavgenConfig) -> Self {
        self.default_navgen = navgen;
        self
    }

    /// Time source for the per-frame budget
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn status(&self) -> NavMeshStatus {
        self.status
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn store(&self) -> &NavMeshStore {
        &self.store
    }

    /// Meshes this map needs
    pub fn required_species(&self) -> &[Species] {
        &self.required
    }

    /// The mesh a bot of `species` navigates with, once loaded
    pub fn mesh_for(&self, species: Species) -> Option<&Arc<NavMesh>> {
        if self.status != NavMeshStatus::Loaded {
            return None;
        }
        self.store.mesh_for(species, self.config.reduce_species)
    }

    pub fn fraction_complete(&self) -> f32 {
        match self.status {
            NavMeshStatus::Generating => self.generator.fraction_complete(),
            NavMeshStatus::Loaded => 1.0,
            _ => 0.0,
        }
    }

    /// Marks the start of a server frame; main-thread generation slices at most once per frame
    pub fn begin_server_frame(&mut self) {
        self.server_frame += 1;
    }

    /// Loads the meshes of `map`, generating those without a valid file
    ///
    /// Any previous map and generation in progress are discarded first.
    pub fn init(
        &mut self,
        map: Arc<MapGeometry>,
        mode: GenerateMode,
        lifecycle: &mut dyn BotLifecycle,
    ) -> Result<NavMeshStatus> {
        log::info!("Loading navigation meshes for {}", map.name);
        if let Err(e) = self.select_map(Arc::clone(&map)) {
            return Err(self.fail(lifecycle, e));
        }

        let queued = self.generator.load_map_and_enqueue(
            &map,
            &self.navgen,
            &self.required,
            self.species.as_ref(),
            &mut self.store,
            self.config.navmesh_dir.as_deref(),
        );
        if queued.is_empty() {
            self.status = NavMeshStatus::Loaded;
            log::info!("Loaded {} navigation meshes", self.store.len());
            return Ok(self.status);
        }

        match mode {
            GenerateMode::Never => {
                let species = queued[0];
                let path = match self.config.navmesh_dir.as_deref() {
                    Some(dir) => navmesh_file_path(dir, &map.name, species)
                        .display()
                        .to_string(),
                    None => "<no navmesh directory>".to_string(),
                };
                let e = Error::MissingNavMesh {
                    species: species.to_string(),
                    path,
                };
                Err(self.fail(lifecycle, e))
            }
            GenerateMode::Background => {
                if let Err(e) = self.start_workers() {
                    return Err(self.fail(lifecycle, e));
                }
                self.status = NavMeshStatus::Generating;
                let message = format!(
                    "Generating navigation meshes for {} species",
                    queued.len()
                );
                log::info!("{message}");
                lifecycle.broadcast(&message);
                Ok(self.status)
            }
            GenerateMode::Blocking => {
                if let Err(e) = self.start_workers() {
                    return Err(self.fail(lifecycle, e));
                }
                self.status = NavMeshStatus::Generating;
                self.generator.wait_in_main_thread();
                self.finish_generation(lifecycle)
            }
        }
    }

    /// Makes `map` current without loading or generating any mesh
    ///
    /// This is all [`NavSystem::generate_blocking`] needs, so offline tools
    /// can rebuild meshes without a full initialization.
    pub fn select_map(&mut self, map: Arc<MapGeometry>) -> Result<()> {
        self.shutdown();
        self.navgen = match self.config.navmesh_dir.as_deref() {
            Some(dir) => NavgenConfig::read_for_map(dir, &map.name)?,
            None => self.default_navgen.clone(),
        };
        self.required = required_navmeshes(self.config.reduce_species);
        self.map = Some(map);
        Ok(())
    }

    fn start_workers(&mut self) -> Result<()> {
        if self.config.worker_threads > 0 {
            self.generator
                .start_background_threads(self.config.worker_threads)?;
        }
        Ok(())
    }

    /// Advances background generation; call every logic frame
    ///
    /// With no worker threads, one time-sliced batch of steps runs per server
    /// frame however often this is called. `level_time` drives the periodic
    /// progress report.
    pub fn run_frame(&mut self, level_time: i64, lifecycle: &mut dyn BotLifecycle) -> NavMeshStatus {
        if self.status != NavMeshStatus::Generating {
            return self.status;
        }

        if self.config.worker_threads == 0 && self.last_slice_frame != Some(self.server_frame) {
            self.last_slice_frame = Some(self.server_frame);
            self.generator
                .run_slice(self.config.frame_budget(), self.clock.as_ref());
        }

        if let Err(e) = self.commit_finished() {
            self.fail(lifecycle, e);
            return self.status;
        }

        if self.generator.is_idle() {
            // errors are already reported through the lifecycle
            let _ = self.finish_generation(lifecycle);
            return self.status;
        }

        match self.next_progress_report {
            None => {
                self.next_progress_report = Some(level_time + self.config.progress_interval_ms);
            }
            Some(due) if level_time >= due => {
                let message = format!(
                    "Navigation mesh generation {:.0}% complete",
                    self.generator.fraction_complete() * 100.0
                );
                log::info!("{message}");
                lifecycle.broadcast(&message);
                self.next_progress_report = Some(level_time + self.config.progress_interval_ms);
            }
            Some(_) => {}
        }
        self.status
    }

    /// Persists and commits every finished task; the first failure aborts
    fn commit_finished(&mut self) -> Result<()> {
        for finished in self.generator.handle_finished_tasks() {
            let mesh = finished.result?;
            if let Some(dir) = self.config.navmesh_dir.as_deref() {
                if let Err(e) = persist(&mesh, dir) {
                    log::warn!("Could not save navigation mesh for {}: {e}", finished.species);
                }
            }
            self.store.commit(mesh);
        }
        Ok(())
    }

    fn finish_generation(&mut self, lifecycle: &mut dyn BotLifecycle) -> Result<NavMeshStatus> {
        if let Err(e) = self.commit_finished() {
            return Err(self.fail(lifecycle, e));
        }
        let missing = self.store.missing(&self.required);
        if let Some(&species) = missing.first() {
            let e = Error::Generation {
                species: species.to_string(),
                reason: "no mesh after generation".to_string(),
            };
            return Err(self.fail(lifecycle, e));
        }
        self.generator.cancel();
        self.status = NavMeshStatus::Loaded;
        self.next_progress_report = None;
        let message = format!("Navigation meshes ready for {}", self.store.map_name());
        log::info!("{message}");
        lifecycle.broadcast(&message);
        Ok(self.status)
    }

    /// Aborts initialization: nothing stays loaded and every bot is removed
    fn fail(&mut self, lifecycle: &mut dyn BotLifecycle, error: Error) -> Error {
        log::error!("Navigation mesh initialization failed: {error}");
        self.generator.cancel();
        self.store.clear();
        self.status = NavMeshStatus::LoadFailed;
        self.next_progress_report = None;
        lifecycle.broadcast(&format!("Bots disabled: {error}"));
        lifecycle.remove_all_bots();
        error
    }

    /// Discards the current map, its meshes and any generation in progress
    pub fn shutdown(&mut self) {
        self.generator.cancel();
        self.store.clear();
        self.map = None;
        self.required.clear();
        self.status = NavMeshStatus::Uninitialized;
        self.last_slice_frame = None;
        self.next_progress_report = None;
    }

    /// Runs `request` to completion and writes the resulting files
    ///
    /// The loaded meshes are left as they are. Refused while background
    /// generation is running. Returns the species that were generated.
    pub fn generate_blocking(&mut self, request: &GenerationRequest) -> Result<Vec<Species>> {
        if self.status == NavMeshStatus::Generating {
            return Err(Error::AlreadyGenerating);
        }
        let map = self
            .map
            .clone()
            .ok_or_else(|| Error::InvalidMap("no map loaded".to_string()))?;
        let reduce = self.config.reduce_species;
        let required = required_navmeshes(reduce);
        let dir = self.config.navmesh_dir.clone();

        let targets = request.resolve(&required, reduce, |species| {
            let Some(dir) = dir.as_deref() else {
                return false;
            };
            let expected: NavMeshHeader =
                expected_header(&map, &self.navgen, species, self.species.as_ref());
            NavMesh::load(&navmesh_file_path(dir, &map.name, species), &expected).is_ok()
        });

        let mut generator = NavmeshGenerator::new();
        for &species in &targets {
            generator.enqueue(crate::task::GenerationTask::new(
                Arc::clone(&map),
                species,
                self.species.attributes(species),
                &self.navgen,
            ));
        }
        if self.config.worker_threads > 0 {
            generator.start_background_threads(self.config.worker_threads)?;
        }
        generator.wait_in_main_thread();

        let mut generated = Vec::with_capacity(targets.len());
        for finished in generator.handle_finished_tasks() {
            let mesh = finished.result?;
            if let Some(dir) = dir.as_deref() {
                persist(&mesh, dir)?;
            }
            generated.push(finished.species);
        }
        generated.sort();
        Ok(generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Bots {
        removed: usize,
    }

    impl BotLifecycle for Bots {
        fn remove_all_bots(&mut self) {
            self.removed += 1;
        }

        fn broadcast(&mut self, _message: &str) {}
    }

    #[test]
    fn test_new_system_is_uninitialized() {
        let nav = NavSystem::new(
            SchedulerConfig::default(),
            Box::new(botnav_common::StaticSpeciesTable::new()),
        );
        assert_eq!(nav.status(), NavMeshStatus::Uninitialized);
        assert_eq!(nav.fraction_complete(), 0.0);
        assert!(nav.mesh_for(Species::Level0).is_none());
    }

    #[test]
    fn test_generate_blocking_needs_a_map() {
        let mut nav = NavSystem::new(
            SchedulerConfig::default(),
            Box::new(botnav_common::StaticSpeciesTable::new()),
        );
        let request = GenerationRequest::parse(&["all"]).unwrap();
        assert!(matches!(
            nav.generate_blocking(&request),
            Err(Error::InvalidMap(_))
        ));
        let mut bots = Bots::default();
        assert_eq!(nav.run_frame(0, &mut bots), NavMeshStatus::Uninitialized);
        assert_eq!(bots.removed, 0);
    }
}
