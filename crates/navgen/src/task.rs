//! Resumable generation of one species' navigation mesh
//!
//! A [`GenerationTask`] owns all of its intermediate state. Each call to
//! [`GenerationTask::step`] performs a bounded slice of work, so the same
//! task can be driven to completion on a worker thread or sliced across
//! server frames on the main thread.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use botnav_common::{Error, Result, Species, SpeciesAttributes};

use crate::config::{AgentParams, NavgenConfig};
use crate::context::{BuildContext, TimerCategory};
use crate::heightfield::{Heightfield, Rasterizer};
use crate::map::MapGeometry;
use crate::navmesh::{GridParams, NavMesh, NavMeshHeader};
use crate::polymesh::{Eroder, GraphBuilder, NodeGraph, Polygonizer};

/// Units of work per step: clipped rows and cells, filtered columns, or
/// visited nodes depending on the stage
pub const WORK_PER_STEP: usize = 4096;

/// Progress is reported in thousandths
const PROGRESS_SCALE: f32 = 1000.0;

/// Stage a task will run on its next step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildStage {
    Init,
    Rasterize,
    Filter,
    Connect,
    Erode,
    Polygonize,
    Done,
}

impl BuildStage {
    /// Share of the total work finished when this stage starts
    fn progress_floor(self) -> f32 {
        match self {
            BuildStage::Init => 0.0,
            BuildStage::Rasterize => 0.02,
            BuildStage::Filter => 0.6,
            BuildStage::Connect => 0.7,
            BuildStage::Erode => 0.8,
            BuildStage::Polygonize => 0.9,
            BuildStage::Done => 1.0,
        }
    }

    fn timer(self) -> Option<TimerCategory> {
        match self {
            BuildStage::Rasterize => Some(TimerCategory::Rasterization),
            BuildStage::Filter => Some(TimerCategory::Filtering),
            BuildStage::Connect => Some(TimerCategory::Connect),
            BuildStage::Erode => Some(TimerCategory::Erode),
            BuildStage::Polygonize => Some(TimerCategory::Polygonize),
            BuildStage::Init | BuildStage::Done => None,
        }
    }
}

/// Cell-space agent dimensions
#[derive(Debug, Clone, Copy)]
struct CellAgent {
    clearance: i32,
    climb: i32,
    radius: u32,
}

/// One unit of resumable work tied to exactly one species
pub struct GenerationTask {
    pub species: Species,
    map: Arc<MapGeometry>,
    config: NavgenConfig,
    agent: AgentParams,
    header: NavMeshHeader,
    pub context: BuildContext,
    stage: BuildStage,
    cursor: usize,
    cells: Option<CellAgent>,
    heightfield: Option<Heightfield>,
    rasterizer: Option<Rasterizer>,
    builder: Option<GraphBuilder>,
    graph: Option<NodeGraph>,
    eroder: Option<Eroder>,
    polygonizer: Option<Polygonizer>,
    work_per_step: usize,
    result: Option<Result<NavMesh>>,
    progress: Arc<AtomicU32>,
}

impl GenerationTask {
    pub fn new(
        map: Arc<MapGeometry>,
        species: Species,
        attributes: &SpeciesAttributes,
        config: &NavgenConfig,
    ) -> Self {
        let agent = AgentParams::for_species(attributes, config);
        let header = NavMeshHeader::new(map.name.clone(), species, config.fingerprint(&agent));
        Self {
            species,
            map,
            config: config.clone(),
            agent,
            header,
            context: BuildContext::new(),
            stage: BuildStage::Init,
            cursor: 0,
            cells: None,
            heightfield: None,
            rasterizer: None,
            builder: None,
            graph: None,
            eroder: None,
            polygonizer: None,
            work_per_step: WORK_PER_STEP,
            result: None,
            progress: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Bounds the work of each step
    pub fn with_work_per_step(mut self, work_per_step: usize) -> Self {
        self.work_per_step = work_per_step.max(1);
        self
    }

    /// Header the finished mesh will carry
    pub fn header(&self) -> &NavMeshHeader {
        &self.header
    }

    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    pub fn is_finished(&self) -> bool {
        self.stage == BuildStage::Done
    }

    /// Fraction of the work done, from 0 to 1
    pub fn progress(&self) -> f32 {
        self.progress.load(Ordering::Relaxed) as f32 / PROGRESS_SCALE
    }

    /// Shared progress counter, readable while a worker owns the task
    pub fn progress_handle(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.progress)
    }

    /// Takes the outcome once the task is finished
    pub fn take_result(&mut self) -> Option<Result<NavMesh>> {
        self.result.take()
    }

    /// Steps until finished
    pub fn run_to_completion(&mut self) -> Result<NavMesh> {
        while !self.step() {}
        self.take_result().unwrap_or_else(|| {
            Err(self.failure("task finished without a result".to_string()))
        })
    }

    /// Performs one bounded slice of work; returns true once finished
    pub fn step(&mut self) -> bool {
        if self.is_finished() {
            return true;
        }
        if self.stage == BuildStage::Init {
            self.context.start_timer(TimerCategory::Total);
        }

        let stage = self.stage;
        if let Some(timer) = stage.timer() {
            self.context.start_timer(timer);
        }
        let outcome = self.run_stage();
        if let Some(timer) = stage.timer() {
            self.context.stop_timer(timer);
        }

        match outcome {
            Ok(fraction) => self.set_progress(fraction),
            Err(e) => self.finish(Err(e)),
        }
        self.is_finished()
    }

    fn set_progress(&self, fraction: f32) {
        self.progress
            .store((fraction.clamp(0.0, 1.0) * PROGRESS_SCALE) as u32, Ordering::Relaxed);
    }

    fn advance(&mut self, next: BuildStage) {
        self.stage = next;
        self.cursor = 0;
    }

    fn finish(&mut self, result: Result<NavMesh>) {
        match &result {
            Ok(mesh) => self.context.log_info(format!(
                "{} polygons, {} links",
                mesh.poly_count(),
                mesh.link_count()
            )),
            Err(e) => self.context.log_error(e.to_string()),
        }
        self.context.stop_timer(TimerCategory::Total);
        self.heightfield = None;
        self.rasterizer = None;
        self.builder = None;
        self.graph = None;
        self.eroder = None;
        self.polygonizer = None;
        self.result = Some(result);
        self.stage = BuildStage::Done;
        self.set_progress(1.0);
    }

    fn failure(&self, reason: String) -> Error {
        generation_failure(self.species, reason)
    }

    /// Runs one slice of the current stage, returning the overall progress
    fn run_stage(&mut self) -> Result<f32> {
        match self.stage {
            BuildStage::Init => self.init(),
            BuildStage::Rasterize => self.rasterize(),
            BuildStage::Filter => self.filter(),
            BuildStage::Connect => self.connect(),
            BuildStage::Erode => self.erode(),
            BuildStage::Polygonize => self.polygonize(),
            BuildStage::Done => Ok(1.0),
        }
    }

    fn init(&mut self) -> Result<f32> {
        let cell_size = self.config.cell_size(&self.agent);
        let cell_height = self.config.cell_height;
        let heightfield = Heightfield::for_map(&self.map, cell_size, cell_height)
            .map_err(|e| self.failure(e.to_string()))?;

        let cells = CellAgent {
            clearance: (self.agent.height / cell_height).ceil() as i32,
            climb: (self.agent.climb / cell_height).floor() as i32,
            radius: (self.agent.radius / cell_size).ceil() as u32,
        };
        self.context.log_debug(format!(
            "grid {}x{}, cell {cell_size:.2}x{cell_height:.2}, agent {:.0}x{:.0} climb {:.0}",
            heightfield.width, heightfield.height, self.agent.radius, self.agent.height, self.agent.climb
        ));

        self.cells = Some(cells);
        self.heightfield = Some(heightfield);
        self.rasterizer = Some(Rasterizer::new());
        self.advance(BuildStage::Rasterize);
        Ok(BuildStage::Rasterize.progress_floor())
    }

    fn stage_state(&self) -> Result<(CellAgent, &Heightfield)> {
        match (self.cells, self.heightfield.as_ref()) {
            (Some(cells), Some(hf)) => Ok((cells, hf)),
            _ => Err(self.failure(format!("no heightfield in stage {:?}", self.stage))),
        }
    }

    /// Progress through the stage that starts at `floor`
    fn stage_progress(floor: BuildStage, next: BuildStage, done: f32) -> f32 {
        let start = floor.progress_floor();
        start + (next.progress_floor() - start) * done.clamp(0.0, 1.0)
    }

    fn rasterize(&mut self) -> Result<f32> {
        let (cells, _) = self.stage_state()?;
        let species = self.species;
        let slope = self.config.walkable_slope_angle;
        let budget = self.work_per_step;
        let (Some(hf), Some(rasterizer)) = (self.heightfield.as_mut(), self.rasterizer.as_mut())
        else {
            return Err(generation_failure(species, "no rasterizer".to_string()));
        };

        if !rasterizer.step(hf, &self.map, slope, cells.climb, budget) {
            let done =
                rasterizer.triangles_started() as f32 / self.map.triangles.len().max(1) as f32;
            return Ok(Self::stage_progress(BuildStage::Rasterize, BuildStage::Filter, done));
        }
        self.rasterizer = None;
        self.advance(BuildStage::Filter);
        Ok(BuildStage::Filter.progress_floor())
    }

    fn filter(&mut self) -> Result<f32> {
        let (cells, hf) = self.stage_state()?;
        let total = hf.column_count();
        let end = self.cursor.saturating_add(self.work_per_step).min(total);

        if let Some(hf) = self.heightfield.as_mut() {
            for index in self.cursor..end {
                hf.filter_column(index, cells.climb, cells.clearance);
            }
        }
        self.cursor = end;

        if self.cursor < total {
            let done = self.cursor as f32 / total.max(1) as f32;
            return Ok(Self::stage_progress(BuildStage::Filter, BuildStage::Connect, done));
        }
        if let Some(hf) = self.heightfield.as_ref() {
            self.builder = Some(GraphBuilder::new(hf, cells.climb, cells.clearance));
        }
        self.advance(BuildStage::Connect);
        Ok(BuildStage::Connect.progress_floor())
    }

    fn connect(&mut self) -> Result<f32> {
        let species = self.species;
        let (Some(cells), Some(hf), Some(builder)) =
            (self.cells, self.heightfield.as_ref(), self.builder.as_mut())
        else {
            return Err(generation_failure(species, "no node graph builder".to_string()));
        };
        if !builder.step(hf, self.work_per_step) {
            let done = builder.progress();
            return Ok(Self::stage_progress(BuildStage::Connect, BuildStage::Erode, done));
        }

        let Some(graph) = self.builder.take().map(GraphBuilder::finish) else {
            return Err(generation_failure(species, "no node graph builder".to_string()));
        };
        let message = format!("{} spans, {} walkable nodes", hf.span_count(), graph.nodes.len());
        self.context.log_debug(message);

        self.eroder = Some(Eroder::new(&graph, cells.radius));
        self.graph = Some(graph);
        self.advance(BuildStage::Erode);
        Ok(BuildStage::Erode.progress_floor())
    }

    fn erode(&mut self) -> Result<f32> {
        let species = self.species;
        let (Some(graph), Some(eroder)) = (self.graph.as_mut(), self.eroder.as_mut()) else {
            return Err(generation_failure(species, "no node graph to erode".to_string()));
        };
        if !eroder.step(graph, self.work_per_step) {
            let done = eroder.progress(graph);
            return Ok(Self::stage_progress(BuildStage::Erode, BuildStage::Polygonize, done));
        }
        self.polygonizer = Some(Polygonizer::new(graph));
        self.eroder = None;
        self.advance(BuildStage::Polygonize);
        Ok(BuildStage::Polygonize.progress_floor())
    }

    fn polygonize(&mut self) -> Result<f32> {
        let species = self.species;
        let (Some(graph), Some(hf), Some(polygonizer)) = (
            self.graph.as_ref(),
            self.heightfield.as_ref(),
            self.polygonizer.as_mut(),
        ) else {
            return Err(generation_failure(species, "no node graph to polygonize".to_string()));
        };
        if !polygonizer.step(graph, self.work_per_step) {
            let done = polygonizer.progress(graph);
            return Ok(Self::stage_progress(BuildStage::Polygonize, BuildStage::Done, done));
        }

        let params = GridParams {
            origin: hf.origin,
            cell_size: hf.cell_size,
            cell_height: hf.cell_height,
            width: hf.width as u32,
            height: hf.height as u32,
        };
        let polys = self
            .polygonizer
            .take()
            .map(Polygonizer::finish)
            .unwrap_or_default();
        if polys.is_empty() {
            return Err(self.failure("no walkable area left after erosion".to_string()));
        }

        let mesh = NavMesh {
            header: self.header.clone(),
            params,
            polys,
        };
        self.finish(Ok(mesh));
        Ok(1.0)
    }
}

fn generation_failure(species: Species, reason: String) -> Error {
    Error::Generation {
        species: species.to_string(),
        reason,
    }
}

impl std::fmt::Debug for GenerationTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationTask")
            .field("species", &self.species)
            .field("map", &self.map.name)
            .field("stage", &self.stage)
            .field("progress", &self.progress())
            .finish()
    }
}
