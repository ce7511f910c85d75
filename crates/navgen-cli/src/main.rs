//! CLI utility for generating and inspecting bot navigation meshes

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use botnav_common::{required_navmeshes, Species, StaticSpeciesTable};
use navgen::{
    expected_header, navmesh_file_path, BotLifecycle, GenerateMode, GenerationRequest,
    MapGeometry, NavMesh, NavMeshHeader, NavMeshStatus, NavSystem, NavgenConfig,
    SchedulerConfig,
};

/// A CLI utility for per-species bot navigation mesh generation
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate navigation meshes for a map
    Generate {
        /// Map geometry (OBJ format); the file stem is the map name
        #[clap(long, value_parser)]
        map: PathBuf,

        /// Directory the .navMesh files are read from and written to
        #[clap(long, value_parser)]
        out: PathBuf,

        /// Worker threads, 0 generates on this thread
        #[clap(long, default_value = "4")]
        threads: usize,

        /// Share meshes between species of the same size
        #[clap(long)]
        reduce: bool,

        /// What to generate: all, missing, or species names
        #[clap(default_value = "missing")]
        targets: Vec<String>,
    },

    /// Print what a navigation mesh file contains
    Info {
        /// Navigation mesh file
        #[clap(long, value_parser)]
        mesh: PathBuf,

        /// Print the summary as JSON
        #[clap(long)]
        json: bool,
    },

    /// Check the mesh files of a map against its current geometry and config
    Check {
        /// Map geometry (OBJ format)
        #[clap(long, value_parser)]
        map: PathBuf,

        /// Directory holding the .navMesh files
        #[clap(long, value_parser)]
        dir: PathBuf,

        /// Check the reduced set of meshes
        #[clap(long)]
        reduce: bool,
    },
}

/// Prints broadcasts; there are no bots to remove
struct Console;

impl BotLifecycle for Console {
    fn remove_all_bots(&mut self) {}

    fn broadcast(&mut self, message: &str) {
        println!("{message}");
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Generate {
            map,
            out,
            threads,
            reduce,
            targets,
        } => {
            let request = GenerationRequest::parse(&targets[..])
                .map_err(|e| anyhow!("Invalid generation request: {}", e))?;

            let config = SchedulerConfig::default()
                .with_worker_threads(threads)
                .with_reduce_species(reduce)
                .with_navmesh_dir(&out);

            generate(&map, &out, config, &request)?;
        }

        Commands::Info { mesh, json } => {
            info(&mesh, json)?;
        }

        Commands::Check { map, dir, reduce } => {
            check(&map, &dir, reduce)?;
        }
    }

    Ok(())
}

fn load_map(path: &Path) -> Result<Arc<MapGeometry>> {
    println!("Loading map from {}...", path.display());
    let map = MapGeometry::from_obj(path)
        .with_context(|| format!("Failed to load map {}", path.display()))?;
    map.validate()
        .with_context(|| format!("Map {} has no usable geometry", path.display()))?;
    println!(
        "Loaded {} with {} vertices and {} triangles",
        map.name,
        map.vertices.len(),
        map.triangles.len()
    );
    Ok(Arc::new(map))
}

fn generate(
    map_path: &Path,
    out: &Path,
    config: SchedulerConfig,
    request: &GenerationRequest,
) -> Result<()> {
    std::fs::create_dir_all(out)
        .with_context(|| format!("Failed to create {}", out.display()))?;
    let map = load_map(map_path)?;
    let map_name = map.name.clone();

    let mut nav = NavSystem::new(config, Box::new(StaticSpeciesTable::new()));
    nav.select_map(map)
        .with_context(|| format!("Failed to read the navgen config of {}", map_name))?;

    println!("Generating navigation meshes...");
    let generated = nav
        .generate_blocking(request)
        .map_err(|e| anyhow!("Navigation mesh generation failed: {}", e))?;

    if generated.is_empty() {
        println!("Every requested navigation mesh is up to date");
        return Ok(());
    }
    for species in &generated {
        let path = navmesh_file_path(out, &map_name, *species);
        println!("  {:<14} {}", species.name(), path.display());
    }
    println!("Generated {} navigation meshes", generated.len());

    Ok(())
}

fn info(path: &Path, json: bool) -> Result<()> {
    let data =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mesh = NavMesh::from_bytes(&data)
        .map_err(|e| anyhow!("{} is not a valid navigation mesh: {}", path.display(), e))?;

    if json {
        let summary = serde_json::json!({
            "map": mesh.header.map_name,
            "species": mesh.header.species.name(),
            "version": mesh.header.version,
            "fingerprint": format!("{:016x}", mesh.header.fingerprint),
            "cell_size": mesh.params.cell_size,
            "cell_height": mesh.params.cell_height,
            "width": mesh.params.width,
            "height": mesh.params.height,
            "polys": mesh.poly_count(),
            "links": mesh.link_count(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Navigation mesh {}", path.display());
    println!("  Map:         {}", mesh.header.map_name);
    println!("  Species:     {}", mesh.header.species);
    println!("  Version:     {}", mesh.header.version);
    println!("  Fingerprint: {:016x}", mesh.header.fingerprint);
    println!(
        "  Grid:        {} x {} cells of {:.2} x {:.2}, origin ({:.1}, {:.1}, {:.1})",
        mesh.params.width,
        mesh.params.height,
        mesh.params.cell_size,
        mesh.params.cell_height,
        mesh.params.origin.x,
        mesh.params.origin.y,
        mesh.params.origin.z
    );
    println!("  Polygons:    {}", mesh.poly_count());
    println!("  Links:       {}", mesh.link_count());

    Ok(())
}

fn check(map_path: &Path, dir: &Path, reduce: bool) -> Result<()> {
    let map = load_map(map_path)?;
    let config = SchedulerConfig::default()
        .with_worker_threads(0)
        .with_reduce_species(reduce)
        .with_navmesh_dir(dir);
    let navgen_config = NavgenConfig::read_for_map(dir, &map.name)
        .with_context(|| format!("Failed to read the navgen config of {}", map.name))?;
    let species_table = StaticSpeciesTable::new();

    let mut stale: Vec<Species> = Vec::new();
    for species in required_navmeshes(reduce) {
        let path = navmesh_file_path(dir, &map.name, species);
        let expected = expected_header(&map, &navgen_config, species, &species_table);
        match read_header(&path) {
            Ok(header) => match header.check(&expected) {
                Ok(()) => println!("  {:<14} ok", species.name()),
                Err(e) => {
                    println!("  {:<14} stale: {}", species.name(), e);
                    stale.push(species);
                }
            },
            Err(e) => {
                println!("  {:<14} unusable: {:#}", species.name(), e);
                stale.push(species);
            }
        }
    }

    if !stale.is_empty() {
        return Err(anyhow!(
            "{} of {} navigation meshes need regenerating",
            stale.len(),
            required_navmeshes(reduce).len()
        ));
    }

    // the same load path a server takes must accept every file
    let mut nav = NavSystem::new(config, Box::new(species_table));
    let status = nav
        .init(map, GenerateMode::Never, &mut Console)
        .map_err(|e| anyhow!("Navigation meshes failed to load: {}", e))?;
    if status != NavMeshStatus::Loaded {
        return Err(anyhow!("Navigation meshes ended up {:?}", status));
    }
    println!("All {} navigation meshes are valid", nav.store().len());

    Ok(())
}

fn read_header(path: &Path) -> Result<NavMeshHeader> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    Ok(NavMeshHeader::read_from(&mut reader)?)
}
