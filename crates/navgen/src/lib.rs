//! Per-species navigation mesh generation for bots
//!
//! Meshes are built from a map's triangle soup by a voxel pipeline
//! (rasterize, filter, connect, erode, polygonize), persisted as
//! `<map>-<species>.navMesh` files and kept in a [`NavMeshStore`].
//! Generation runs as resumable [`GenerationTask`]s, either on worker threads
//! or time-sliced on the main thread, under the control of a [`NavSystem`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use botnav_common::StaticSpeciesTable;
//! use navgen::{BotLifecycle, GenerateMode, MapGeometry, NavSystem, SchedulerConfig};
//!
//! struct NoBots;
//!
//! impl BotLifecycle for NoBots {
//!     fn remove_all_bots(&mut self) {}
//!     fn broadcast(&mut self, message: &str) {
//!         println!("{message}");
//!     }
//! }
//!
//! # fn example() -> botnav_common::Result<()> {
//! let map = Arc::new(MapGeometry::from_obj("maps/atcs.obj")?);
//! let config = SchedulerConfig::default()
//!     .with_worker_threads(4)
//!     .with_navmesh_dir("maps");
//! let mut nav = NavSystem::new(config, Box::new(StaticSpeciesTable::new()));
//! nav.init(map, GenerateMode::Blocking, &mut NoBots)?;
//! # Ok(())
//! # }
//! ```

mod config;
mod context;
mod generator;
mod heightfield;
mod map;
mod navmesh;
mod polymesh;
mod request;
mod scheduler;
mod store;
mod task;

pub use config::{AgentParams, NavgenConfig, SchedulerConfig, MSEC_PER_FRAME_RANGE};
pub use context::{BuildContext, LogEntry, LogLevel, TimerCategory};
pub use generator::{
    expected_header, persist, Clock, FinishedTask, MonotonicClock, NavmeshGenerator,
};
pub use heightfield::{is_walkable_triangle, Heightfield, Rasterizer, Span};
pub use map::MapGeometry;
pub use navmesh::{GridParams, NavMesh, NavMeshHeader, NavPoly, NAVMESH_MAGIC, NAVMESH_VERSION};
pub use polymesh::{polygonize, Eroder, GraphBuilder, Node, NodeGraph, Polygonizer};
pub use request::{GenerationRequest, GenerationTarget};
pub use scheduler::{BotLifecycle, GenerateMode, NavMeshStatus, NavSystem};
pub use store::{navmesh_file_path, NavMeshStore};
pub use task::{BuildStage, GenerationTask, WORK_PER_STEP};

#[cfg(test)]
mod scheduler_tests;
