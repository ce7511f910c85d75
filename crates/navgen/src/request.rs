//! Operator requests to (re)generate navigation meshes

use std::collections::BTreeSet;

use botnav_common::{Error, Result, Species};

/// One word of a generation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationTarget {
    /// Every species the map needs
    All,
    /// Species without a valid mesh file
    Missing,
    Species(Species),
}

/// A parsed `navgen` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub targets: Vec<GenerationTarget>,
}

impl GenerationRequest {
    /// Parses `all`, `missing` and species names, in any mix
    ///
    /// The whole request is rejected if a single word is not understood, so
    /// no work starts for a partly invalid command.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        if args.is_empty() {
            return Err(Error::InvalidConfig(
                "expected all, missing or a list of species".to_string(),
            ));
        }
        let targets = args
            .iter()
            .map(|arg| {
                let arg = arg.as_ref();
                if arg.eq_ignore_ascii_case("all") {
                    Ok(GenerationTarget::All)
                } else if arg.eq_ignore_ascii_case("missing") {
                    Ok(GenerationTarget::Missing)
                } else {
                    Species::from_name(arg)
                        .map(GenerationTarget::Species)
                        .ok_or_else(|| Error::InvalidSpecies(arg.to_string()))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { targets })
    }

    /// The meshes to build, sorted
    ///
    /// `required` lists the meshes the map needs and `has_valid_file` tells
    /// whether one is already persisted with a matching header. Named species
    /// resolve to the mesh they navigate with.
    pub fn resolve(
        &self,
        required: &[Species],
        reduce_species: bool,
        has_valid_file: impl Fn(Species) -> bool,
    ) -> Vec<Species> {
        let mut selected = BTreeSet::new();
        for target in &self.targets {
            match *target {
                GenerationTarget::All => selected.extend(required.iter().copied()),
                GenerationTarget::Missing => selected.extend(
                    required
                        .iter()
                        .copied()
                        .filter(|species| !has_valid_file(*species)),
                ),
                GenerationTarget::Species(species) => {
                    selected.insert(species.navmesh_species(reduce_species));
                }
            }
        }
        selected.into_iter().collect()
    }
}
