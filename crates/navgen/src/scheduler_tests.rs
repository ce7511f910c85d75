//! End-to-end tests of map initialization through [`NavSystem`]

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use botnav_common::{Error, Species, StaticSpeciesTable};
use glam::Vec3;

use crate::{
    navmesh_file_path, BotLifecycle, Clock, GenerateMode, GenerationRequest, MapGeometry,
    NavMeshStatus, NavSystem, SchedulerConfig,
};

#[derive(Default)]
struct RecordingBots {
    removed: usize,
    messages: Vec<String>,
}

impl BotLifecycle for RecordingBots {
    fn remove_all_bots(&mut self) {
        self.removed += 1;
    }

    fn broadcast(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}

/// Advances 1ms per read and counts the reads
#[derive(Clone, Default)]
struct CountingClock {
    reads: Rc<Cell<u64>>,
}

impl Clock for CountingClock {
    fn now(&self) -> Duration {
        let reads = self.reads.get();
        self.reads.set(reads + 1);
        Duration::from_millis(reads)
    }
}

fn arena() -> Arc<MapGeometry> {
    Arc::new(
        MapGeometry::new("arena")
            .with_box(Vec3::new(-192.0, -192.0, -16.0), Vec3::new(192.0, 192.0, 0.0))
            .with_box(Vec3::new(-32.0, -32.0, 0.0), Vec3::new(32.0, 32.0, 64.0)),
    )
}

/// A 64 unit wide walkway, too narrow for the largest species
fn walkway() -> Arc<MapGeometry> {
    Arc::new(
        MapGeometry::new("walkway")
            .with_box(Vec3::new(-32.0, -256.0, -16.0), Vec3::new(32.0, 256.0, 0.0)),
    )
}

fn system(config: SchedulerConfig) -> NavSystem {
    NavSystem::new(config, Box::new(StaticSpeciesTable::new()))
}

fn run_until_settled(nav: &mut NavSystem, bots: &mut RecordingBots) -> NavMeshStatus {
    let mut level_time = 0;
    for _ in 0..100_000 {
        nav.begin_server_frame();
        let status = nav.run_frame(level_time, bots);
        if status != NavMeshStatus::Generating {
            return status;
        }
        level_time += 50;
        std::thread::sleep(Duration::from_micros(100));
    }
    nav.status()
}

#[test]
fn test_blocking_generation_loads_every_species() {
    let dir = tempfile::tempdir().unwrap();
    let mut nav = system(
        SchedulerConfig::default()
            .with_worker_threads(2)
            .with_reduce_species(true)
            .with_navmesh_dir(dir.path()),
    );
    let mut bots = RecordingBots::default();

    let status = nav.init(arena(), GenerateMode::Blocking, &mut bots).unwrap();
    assert_eq!(status, NavMeshStatus::Loaded);
    assert_eq!(nav.store().len(), nav.required_species().len());
    for species in Species::ALL {
        assert!(nav.mesh_for(species).is_some(), "no mesh for {species}");
        if species.navmesh_species(true) == species {
            assert!(navmesh_file_path(dir.path(), "arena", species).exists());
        }
    }
    assert_eq!(bots.removed, 0);

    // a second map load finds every file and generates nothing
    let status = nav.init(arena(), GenerateMode::Never, &mut bots).unwrap();
    assert_eq!(status, NavMeshStatus::Loaded);
}

#[test]
fn test_generation_is_byte_identical_across_runs() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let mut bots = RecordingBots::default();

    for (dir, threads) in [(&first, 3), (&second, 0)] {
        let mut nav = system(
            SchedulerConfig::default()
                .with_worker_threads(threads)
                .with_reduce_species(true)
                .with_navmesh_dir(dir.path()),
        );
        nav.init(arena(), GenerateMode::Blocking, &mut bots).unwrap();
    }

    for species in botnav_common::required_navmeshes(true) {
        let a = std::fs::read(navmesh_file_path(first.path(), "arena", species)).unwrap();
        let b = std::fs::read(navmesh_file_path(second.path(), "arena", species)).unwrap();
        assert_eq!(a, b, "{species} differs");
    }
}

#[test]
fn test_missing_files_without_generation_fail() {
    let dir = tempfile::tempdir().unwrap();
    let mut nav = system(SchedulerConfig::default().with_navmesh_dir(dir.path()));
    let mut bots = RecordingBots::default();

    let result = nav.init(arena(), GenerateMode::Never, &mut bots);
    assert!(matches!(result, Err(Error::MissingNavMesh { .. })));
    assert_eq!(nav.status(), NavMeshStatus::LoadFailed);
    assert!(nav.store().is_empty());
    assert_eq!(bots.removed, 1);
}

#[test]
fn test_one_failed_species_fails_the_whole_map() {
    let mut nav = system(SchedulerConfig::default().with_worker_threads(2));
    let mut bots = RecordingBots::default();

    let status = nav.init(walkway(), GenerateMode::Background, &mut bots).unwrap();
    assert_eq!(status, NavMeshStatus::Generating);

    assert_eq!(run_until_settled(&mut nav, &mut bots), NavMeshStatus::LoadFailed);
    assert!(nav.store().is_empty());
    assert!(nav.mesh_for(Species::Level0).is_none());
    assert_eq!(bots.removed, 1);
}

#[test]
fn test_single_thread_slices_once_per_server_frame() {
    let clock = CountingClock::default();
    let mut nav = system(
        SchedulerConfig::default()
            .with_worker_threads(0)
            .with_msec_per_frame(5),
    )
    .with_clock(Box::new(clock.clone()));
    let mut bots = RecordingBots::default();

    nav.init(arena(), GenerateMode::Background, &mut bots).unwrap();
    assert_eq!(nav.status(), NavMeshStatus::Generating);

    let mut frames = 0;
    while nav.status() == NavMeshStatus::Generating {
        nav.begin_server_frame();
        let before = clock.reads.get();
        nav.run_frame(frames * 50, &mut bots);
        let after_first = clock.reads.get();
        // budget of 5ms at 1ms per read: the start read plus at most five steps
        assert!(after_first - before <= 6 + 1);

        // further logic frames within the same server frame do no work
        nav.run_frame(frames * 50 + 10, &mut bots);
        nav.run_frame(frames * 50 + 20, &mut bots);
        assert_eq!(clock.reads.get(), after_first);

        frames += 1;
        assert!(frames < 10_000);
    }
    assert_eq!(nav.status(), NavMeshStatus::Loaded);
    assert!(frames > 1);
}

#[test]
fn test_progress_is_broadcast_periodically() {
    let mut nav = system(
        SchedulerConfig::default()
            .with_worker_threads(0)
            .with_msec_per_frame(3),
    )
    .with_clock(Box::new(CountingClock::default()));
    let mut bots = RecordingBots::default();
    nav.init(arena(), GenerateMode::Background, &mut bots).unwrap();

    // each frame advances level time by 4 seconds
    let mut level_time = 0;
    while nav.status() == NavMeshStatus::Generating {
        nav.begin_server_frame();
        nav.run_frame(level_time, &mut bots);
        level_time += 4000;
    }
    let reports = bots
        .messages
        .iter()
        .filter(|message| message.contains("% complete"))
        .count();
    assert!(reports > 0);
    assert!(reports <= (level_time / 10_000) as usize);
}

#[test]
fn test_stale_files_are_regenerated() {
    let dir = tempfile::tempdir().unwrap();
    let mut bots = RecordingBots::default();
    let config = SchedulerConfig::default()
        .with_worker_threads(1)
        .with_reduce_species(true)
        .with_navmesh_dir(dir.path());

    let mut nav = system(config.clone());
    nav.init(arena(), GenerateMode::Blocking, &mut bots).unwrap();

    // a changed step size invalidates every file
    std::fs::write(dir.path().join("arena.navcfg"), r#"{ "step_size": 24.0 }"#).unwrap();
    let mut nav = system(config);
    let result = nav.init(arena(), GenerateMode::Never, &mut bots);
    assert!(matches!(result, Err(Error::MissingNavMesh { .. })));

    let status = nav.init(arena(), GenerateMode::Background, &mut bots).unwrap();
    assert_eq!(status, NavMeshStatus::Generating);
    assert_eq!(run_until_settled(&mut nav, &mut bots), NavMeshStatus::Loaded);
}

#[test]
fn test_generate_blocking_requests() {
    let dir = tempfile::tempdir().unwrap();
    let mut nav = system(
        SchedulerConfig::default()
            .with_worker_threads(0)
            .with_reduce_species(true)
            .with_navmesh_dir(dir.path()),
    );
    let mut bots = RecordingBots::default();
    nav.init(arena(), GenerateMode::Background, &mut bots).unwrap();

    let all = GenerationRequest::parse(&["all"]).unwrap();
    assert!(matches!(nav.generate_blocking(&all), Err(Error::AlreadyGenerating)));

    assert_eq!(run_until_settled(&mut nav, &mut bots), NavMeshStatus::Loaded);
    let loaded = Arc::clone(nav.mesh_for(Species::Level0).unwrap());

    let missing = GenerationRequest::parse(&["missing"]).unwrap();
    assert_eq!(nav.generate_blocking(&missing).unwrap(), Vec::<Species>::new());

    let path = navmesh_file_path(dir.path(), "arena", Species::Level2);
    std::fs::remove_file(&path).unwrap();
    let generated = nav
        .generate_blocking(&GenerationRequest::parse(&["missing", "level0"]).unwrap())
        .unwrap();
    assert_eq!(generated, vec![Species::Level0, Species::Level2]);
    assert!(path.exists());

    // the loaded store is not replaced
    assert!(Arc::ptr_eq(&loaded, nav.mesh_for(Species::Level0).unwrap()));
    assert_eq!(nav.status(), NavMeshStatus::Loaded);
}

#[test]
fn test_shutdown_cancels_generation() {
    let mut nav = system(SchedulerConfig::default().with_worker_threads(2));
    let mut bots = RecordingBots::default();
    nav.init(arena(), GenerateMode::Background, &mut bots).unwrap();

    nav.shutdown();
    assert_eq!(nav.status(), NavMeshStatus::Uninitialized);
    assert!(nav.store().is_empty());
    assert_eq!(nav.run_frame(0, &mut bots), NavMeshStatus::Uninitialized);
    assert_eq!(bots.removed, 0);
}

#[test]
fn test_selected_map_generates_without_loading() {
    let dir = tempfile::tempdir().unwrap();
    let mut nav = system(
        SchedulerConfig::default()
            .with_worker_threads(2)
            .with_reduce_species(true)
            .with_navmesh_dir(dir.path()),
    );
    nav.select_map(arena()).unwrap();
    assert_eq!(nav.status(), NavMeshStatus::Uninitialized);
    assert!(!nav.required_species().is_empty());

    let generated = nav
        .generate_blocking(&GenerationRequest::parse(&["builder"]).unwrap())
        .unwrap();
    assert_eq!(generated, vec![Species::Builder]);
    assert!(navmesh_file_path(dir.path(), "arena", Species::Builder).exists());
    assert!(nav.mesh_for(Species::Builder).is_none());
}
