//! In-memory set of navigation meshes for the current map

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use botnav_common::{Result, Species};

use crate::navmesh::{NavMesh, NavMeshHeader};

/// Path of the persisted mesh of `species` on `map`
pub fn navmesh_file_path(dir: &Path, map_name: &str, species: Species) -> PathBuf {
    dir.join(format!("{map_name}-{}.navMesh", species.name()))
}

/// One navigation mesh per species, for a single map
#[derive(Debug, Default)]
pub struct NavMeshStore {
    map_name: String,
    meshes: BTreeMap<Species, Arc<NavMesh>>,
}

impl NavMeshStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_name(&self) -> &str {
        &self.map_name
    }

    /// Loads a persisted mesh into the store if it matches `expected`
    ///
    /// Missing and mismatching files are reported as errors and leave the
    /// store untouched; callers regenerate in that case.
    pub fn load_persisted(&mut self, dir: &Path, expected: &NavMeshHeader) -> Result<()> {
        let path = navmesh_file_path(dir, &expected.map_name, expected.species);
        let mesh = NavMesh::load(&path, expected)?;
        log::info!("Loaded navigation mesh {}", path.display());
        self.commit(mesh);
        Ok(())
    }

    /// Adds a finished mesh, replacing any previous mesh of the same species
    ///
    /// Committing a mesh built for another map resets the store to that map.
    pub fn commit(&mut self, mesh: NavMesh) {
        if self.map_name != mesh.header.map_name {
            self.meshes.clear();
            self.map_name = mesh.header.map_name.clone();
        }
        self.meshes.insert(mesh.header.species, Arc::new(mesh));
    }

    pub fn get(&self, species: Species) -> Option<&Arc<NavMesh>> {
        self.meshes.get(&species)
    }

    /// The mesh a bot of `species` navigates with
    pub fn mesh_for(&self, species: Species, reduce_species: bool) -> Option<&Arc<NavMesh>> {
        self.get(species.navmesh_species(reduce_species))
    }

    pub fn contains(&self, species: Species) -> bool {
        self.meshes.contains_key(&species)
    }

    /// Which of `required` have no mesh yet, in the given order
    pub fn missing(&self, required: &[Species]) -> Vec<Species> {
        required
            .iter()
            .copied()
            .filter(|species| !self.contains(*species))
            .collect()
    }

    pub fn species(&self) -> impl Iterator<Item = Species> + '_ {
        self.meshes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
        self.map_name.clear();
    }
}
