//! Common types shared by navigation mesh generation and bot steering
//!
//! The world is z-up: the horizontal plane is xy, distances are game units,
//! angles are degrees and times are simulation milliseconds.

mod math;
mod species;
mod trace;

pub use math::*;
pub use species::*;
pub use trace::*;

/// Represents a 3D position
pub type Vec3 = glam::Vec3;

/// Error types for the bot navigation libraries
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("no navigation mesh file for {species} at {path}")]
    MissingNavMesh { species: String, path: String },

    #[error("navigation mesh header mismatch: {0}")]
    HeaderMismatch(String),

    #[error("navigation mesh generation failed for {species}: {reason}")]
    Generation { species: String, reason: String },

    #[error("invalid species name '{0}'")]
    InvalidSpecies(String),

    #[error("navigation mesh generation is already running")]
    AlreadyGenerating,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid map geometry: {0}")]
    InvalidMap(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Missing and stale files are recovered locally by regenerating
    pub fn is_recoverable_by_generation(&self) -> bool {
        matches!(self, Error::MissingNavMesh { .. } | Error::HeaderMismatch(_))
    }
}

/// Result type for bot navigation operations
pub type Result<T> = std::result::Result<T, Error>;
