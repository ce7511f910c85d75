//! Generation task queue, worker pool and main-thread time slicing

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use botnav_common::{Result, Species, SpeciesProvider};
use web_time::Instant;

use crate::config::NavgenConfig;
use crate::map::MapGeometry;
use crate::navmesh::{NavMesh, NavMeshHeader};
use crate::store::{navmesh_file_path, NavMeshStore};
use crate::task::GenerationTask;

/// Monotonic time source used to enforce the per-frame budget
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin
    fn now(&self) -> Duration;
}

/// Wall clock
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A task handed back to the orchestrator once it finished
#[derive(Debug)]
pub struct FinishedTask {
    pub species: Species,
    pub result: Result<NavMesh>,
}

/// Queue of generation tasks, run by worker threads or sliced on the caller
///
/// The queue is only locked for push and pop. Workers own the task they
/// popped until they send it back over the result channel, so no build state
/// is ever shared.
pub struct NavmeshGenerator {
    queue: Arc<Mutex<VecDeque<GenerationTask>>>,
    busy: Arc<AtomicUsize>,
    cancel: Arc<AtomicBool>,
    results_tx: Sender<GenerationTask>,
    results_rx: Receiver<GenerationTask>,
    workers: Vec<JoinHandle<()>>,
    progress: Vec<(Species, Arc<AtomicU32>)>,
    current: Option<GenerationTask>,
}

impl Default for NavmeshGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl NavmeshGenerator {
    pub fn new() -> Self {
        let (results_tx, results_rx) = mpsc::channel();
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            busy: Arc::new(AtomicUsize::new(0)),
            cancel: Arc::new(AtomicBool::new(false)),
            results_tx,
            results_rx,
            workers: Vec::new(),
            progress: Vec::new(),
            current: None,
        }
    }

    fn lock_queue(queue: &Mutex<VecDeque<GenerationTask>>) -> MutexGuard<'_, VecDeque<GenerationTask>> {
        queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue(&mut self, task: GenerationTask) {
        self.progress.push((task.species, task.progress_handle()));
        Self::lock_queue(&self.queue).push_back(task);
    }

    /// Loads every persisted mesh that still matches, and queues a task for each other species
    ///
    /// Returns the species that were queued, in request order.
    pub fn load_map_and_enqueue(
        &mut self,
        map: &Arc<MapGeometry>,
        config: &NavgenConfig,
        species: &[Species],
        provider: &dyn SpeciesProvider,
        store: &mut NavMeshStore,
        navmesh_dir: Option<&Path>,
    ) -> Vec<Species> {
        let mut queued = Vec::new();
        for &species in species {
            let task = GenerationTask::new(
                Arc::clone(map),
                species,
                provider.attributes(species),
                config,
            );
            if let Some(dir) = navmesh_dir {
                match store.load_persisted(dir, task.header()) {
                    Ok(()) => continue,
                    Err(e) if e.is_recoverable_by_generation() => {
                        log::info!("Generating navigation mesh for {species}: {e}");
                    }
                    Err(e) => log::warn!("Regenerating navigation mesh for {species}: {e}"),
                }
            }
            self.enqueue(task);
            queued.push(species);
        }
        queued
    }

    /// Spawns `count` workers that drain the queue and exit once it is empty
    pub fn start_background_threads(&mut self, count: usize) -> Result<()> {
        self.cancel.store(false, Ordering::SeqCst);
        for index in 0..count {
            let queue = Arc::clone(&self.queue);
            let busy = Arc::clone(&self.busy);
            let cancel = Arc::clone(&self.cancel);
            let results = self.results_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("navgen-{index}"))
                .spawn(move || worker_loop(&queue, &busy, &cancel, &results))?;
            self.workers.push(handle);
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// True once the queue is empty and no worker holds a task
    pub fn threads_done(&self) -> bool {
        // busy is raised under the queue lock, so both are read consistently
        let queue = Self::lock_queue(&self.queue);
        queue.is_empty() && self.busy.load(Ordering::SeqCst) == 0
    }

    /// No queued, running or unreported task remains
    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.threads_done()
    }

    /// Steps queued tasks on the calling thread until `budget` has elapsed
    ///
    /// Tasks run one at a time in enqueue order. No step starts once the
    /// budget is spent. Returns the number of steps taken.
    pub fn run_slice(&mut self, budget: Duration, clock: &dyn Clock) -> usize {
        let start = clock.now();
        let mut steps = 0;
        loop {
            if self.current.is_none() {
                self.current = Self::lock_queue(&self.queue).pop_front();
            }
            let Some(task) = self.current.as_mut() else {
                break;
            };
            if clock.now().saturating_sub(start) >= budget {
                break;
            }
            steps += 1;
            if task.step() {
                if let Some(task) = self.current.take() {
                    // the receiver lives in self, so this cannot fail
                    let _ = self.results_tx.send(task);
                }
            }
        }
        steps
    }

    /// Blocks until every queued task has finished
    ///
    /// Joins the workers if any were started, otherwise runs the tasks on
    /// the calling thread.
    pub fn wait_in_main_thread(&mut self) {
        if self.workers.is_empty() {
            while self.run_slice(Duration::MAX, &MonotonicClock::default()) > 0 {}
            return;
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Navigation mesh worker panicked");
            }
        }
    }

    /// Collects finished tasks, flushing their buffered logs
    ///
    /// Must be called from the orchestrating thread.
    pub fn handle_finished_tasks(&mut self) -> Vec<FinishedTask> {
        let mut finished = Vec::new();
        while let Ok(mut task) = self.results_rx.try_recv() {
            task.context.flush(task.species.name());
            let result = task.take_result().unwrap_or_else(|| {
                Err(botnav_common::Error::Generation {
                    species: task.species.to_string(),
                    reason: "task returned unfinished".to_string(),
                })
            });
            finished.push(FinishedTask {
                species: task.species,
                result,
            });
        }
        finished
    }

    /// Mean progress of every task enqueued since the last reset, from 0 to 1
    pub fn fraction_complete(&self) -> f32 {
        if self.progress.is_empty() {
            return 1.0;
        }
        let total: f32 = self
            .progress
            .iter()
            .map(|(_, progress)| progress.load(Ordering::Relaxed) as f32 / 1000.0)
            .sum();
        total / self.progress.len() as f32
    }

    pub fn task_count(&self) -> usize {
        self.progress.len()
    }

    /// Discards queued and running tasks and stops the workers
    pub fn cancel(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        Self::lock_queue(&self.queue).clear();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Navigation mesh worker panicked");
            }
        }
        while self.results_rx.try_recv().is_ok() {}
        self.current = None;
        self.progress.clear();
        self.cancel.store(false, Ordering::SeqCst);
    }
}

impl Drop for NavmeshGenerator {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn worker_loop(
    queue: &Mutex<VecDeque<GenerationTask>>,
    busy: &AtomicUsize,
    cancel: &AtomicBool,
    results: &Sender<GenerationTask>,
) {
    loop {
        if cancel.load(Ordering::SeqCst) {
            return;
        }
        let task = {
            let mut queue = NavmeshGenerator::lock_queue(queue);
            let task = queue.pop_front();
            if task.is_some() {
                busy.fetch_add(1, Ordering::SeqCst);
            }
            task
        };
        let Some(mut task) = task else {
            return;
        };

        let mut finished = false;
        while !finished && !cancel.load(Ordering::SeqCst) {
            finished = task.step();
        }
        if finished {
            // send before releasing busy so an idle pool implies every result is queued
            let _ = results.send(task);
        }
        busy.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Writes a finished mesh to its file under `dir`
pub fn persist(mesh: &NavMesh, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = navmesh_file_path(dir, &mesh.header.map_name, mesh.header.species);
    mesh.save(&path)?;
    log::info!("Saved navigation mesh {}", path.display());
    Ok(())
}

/// Expected header of the mesh for `species` under the given inputs
pub fn expected_header(
    map: &MapGeometry,
    config: &NavgenConfig,
    species: Species,
    provider: &dyn SpeciesProvider,
) -> NavMeshHeader {
    let agent = crate::config::AgentParams::for_species(provider.attributes(species), config);
    NavMeshHeader::new(map.name.clone(), species, config.fingerprint(&agent))
}
