//! Per-species navigation mesh and its persisted binary format
//!
//! File layout, all little-endian:
//!
//! | field | type |
//! |---|---|
//! | magic | `b"NAVM"` |
//! | version | `u32` |
//! | map name | `u16` length + UTF-8 |
//! | species name | `u16` length + UTF-8 |
//! | config fingerprint | `u64` |
//! | payload | `u32` length + LZ4 block with prepended size |
//!
//! The payload holds the grid parameters followed by the polygons.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::Vec3;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use botnav_common::{Error, Result, Species};

/// Magic bytes at the start of every navigation mesh file
pub const NAVMESH_MAGIC: [u8; 4] = *b"NAVM";

/// Current file format version
pub const NAVMESH_VERSION: u32 = 1;

/// LZ4 never expands a block by more than this factor
const MAX_LZ4_RATIO: usize = 255;

/// Identifies what a navigation mesh was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavMeshHeader {
    pub version: u32,
    pub map_name: String,
    pub species: Species,
    pub fingerprint: u64,
}

impl NavMeshHeader {
    pub fn new(map_name: impl Into<String>, species: Species, fingerprint: u64) -> Self {
        Self {
            version: NAVMESH_VERSION,
            map_name: map_name.into(),
            species,
            fingerprint,
        }
    }

    /// Fails with [`Error::HeaderMismatch`] unless `self` describes the same build as `expected`
    pub fn check(&self, expected: &NavMeshHeader) -> Result<()> {
        if self.version != expected.version {
            return Err(Error::HeaderMismatch(format!(
                "version {} instead of {}",
                self.version, expected.version
            )));
        }
        if self.map_name != expected.map_name {
            return Err(Error::HeaderMismatch(format!(
                "built for map {} instead of {}",
                self.map_name, expected.map_name
            )));
        }
        if self.species != expected.species {
            return Err(Error::HeaderMismatch(format!(
                "built for {} instead of {}",
                self.species, expected.species
            )));
        }
        if self.fingerprint != expected.fingerprint {
            return Err(Error::HeaderMismatch(format!(
                "config fingerprint {:016x} instead of {:016x}",
                self.fingerprint, expected.fingerprint
            )));
        }
        Ok(())
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&NAVMESH_MAGIC)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        write_string(writer, &self.map_name)?;
        write_string(writer, self.species.name())?;
        writer.write_u64::<LittleEndian>(self.fingerprint)?;
        Ok(())
    }

    /// Reads a header, leaving the reader at the payload
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != NAVMESH_MAGIC {
            return Err(Error::HeaderMismatch("not a navigation mesh file".to_string()));
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != NAVMESH_VERSION {
            return Err(Error::HeaderMismatch(format!(
                "version {version} instead of {NAVMESH_VERSION}"
            )));
        }
        let map_name = read_string(reader)?;
        let species_name = read_string(reader)?;
        let species = Species::from_name(&species_name)
            .ok_or_else(|| Error::HeaderMismatch(format!("unknown species {species_name}")))?;
        let fingerprint = reader.read_u64::<LittleEndian>()?;
        Ok(Self {
            version,
            map_name,
            species,
            fingerprint,
        })
    }
}

/// Grid the polygons are expressed in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridParams {
    /// World position of the corner of cell (0, 0) at height 0
    pub origin: Vec3,
    pub cell_size: f32,
    pub cell_height: f32,
    pub width: u32,
    pub height: u32,
}

impl GridParams {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        for value in self.origin.to_array() {
            writer.write_f32::<LittleEndian>(value)?;
        }
        writer.write_f32::<LittleEndian>(self.cell_size)?;
        writer.write_f32::<LittleEndian>(self.cell_height)?;
        writer.write_u32::<LittleEndian>(self.width)?;
        writer.write_u32::<LittleEndian>(self.height)?;
        Ok(())
    }

    fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut origin = [0.0f32; 3];
        reader.read_f32_into::<LittleEndian>(&mut origin)?;
        Ok(Self {
            origin: Vec3::from_array(origin),
            cell_size: reader.read_f32::<LittleEndian>()?,
            cell_height: reader.read_f32::<LittleEndian>()?,
            width: reader.read_u32::<LittleEndian>()?,
            height: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// An axis-aligned walkable rectangle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavPoly {
    /// Lowest cell covered, inclusive
    pub min: [u32; 2],
    /// Highest cell covered, inclusive
    pub max: [u32; 2],
    /// Floor height in cells
    pub floor: i32,
    /// Indices of adjacent polygons, sorted
    pub neighbours: Vec<u32>,
}

/// Navigation mesh of one species on one map
#[derive(Debug, Clone, PartialEq)]
pub struct NavMesh {
    pub header: NavMeshHeader,
    pub params: GridParams,
    pub polys: Vec<NavPoly>,
}

impl NavMesh {
    pub fn poly_count(&self) -> usize {
        self.polys.len()
    }

    pub fn link_count(&self) -> usize {
        self.polys.iter().map(|poly| poly.neighbours.len()).sum()
    }

    /// World-space bounds of a polygon's floor
    pub fn poly_bounds(&self, index: usize) -> (Vec3, Vec3) {
        let poly = &self.polys[index];
        let p = &self.params;
        let z = p.origin.z + poly.floor as f32 * p.cell_height;
        let min = Vec3::new(
            p.origin.x + poly.min[0] as f32 * p.cell_size,
            p.origin.y + poly.min[1] as f32 * p.cell_size,
            z,
        );
        let max = Vec3::new(
            p.origin.x + (poly.max[0] + 1) as f32 * p.cell_size,
            p.origin.y + (poly.max[1] + 1) as f32 * p.cell_size,
            z,
        );
        (min, max)
    }

    pub fn poly_center(&self, index: usize) -> Vec3 {
        let (min, max) = self.poly_bounds(index);
        (min + max) * 0.5
    }

    /// The polygon under `pos` whose floor is closest in height, within `max_dz`
    pub fn find_poly(&self, pos: Vec3, max_dz: f32) -> Option<usize> {
        (0..self.polys.len())
            .filter_map(|index| {
                let (min, max) = self.poly_bounds(index);
                let inside = pos.x >= min.x && pos.x <= max.x && pos.y >= min.y && pos.y <= max.y;
                let dz = (pos.z - min.z).abs();
                (inside && dz <= max_dz).then_some((index, dz))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }

    /// Serializes the mesh into the persisted format
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        self.params.write_to(&mut payload)?;
        payload.write_u32::<LittleEndian>(self.polys.len() as u32)?;
        for poly in &self.polys {
            payload.write_u32::<LittleEndian>(poly.min[0])?;
            payload.write_u32::<LittleEndian>(poly.min[1])?;
            payload.write_u32::<LittleEndian>(poly.max[0])?;
            payload.write_u32::<LittleEndian>(poly.max[1])?;
            payload.write_i32::<LittleEndian>(poly.floor)?;
            payload.write_u32::<LittleEndian>(poly.neighbours.len() as u32)?;
            for &neighbour in &poly.neighbours {
                payload.write_u32::<LittleEndian>(neighbour)?;
            }
        }
        let compressed = lz4_flex::compress_prepend_size(&payload);

        let mut out = Vec::with_capacity(compressed.len() + 64);
        self.header.write_to(&mut out)?;
        out.write_u32::<LittleEndian>(compressed.len() as u32)?;
        out.write_all(&compressed)?;
        Ok(out)
    }

    /// Parses a mesh from the persisted format
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = Cursor::new(data);
        let header = NavMeshHeader::read_from(&mut reader)?;

        let compressed_len = reader.read_u32::<LittleEndian>()? as usize;
        let remaining = data.len().saturating_sub(reader.position() as usize);
        if compressed_len > remaining {
            return Err(Error::HeaderMismatch(format!(
                "payload of {compressed_len} bytes with {remaining} bytes left"
            )));
        }
        let mut compressed = vec![0u8; compressed_len];
        reader.read_exact(&mut compressed)?;
        let declared_len = compressed
            .get(..4)
            .map_or(0, |size| LittleEndian::read_u32(size) as usize);
        if declared_len > compressed_len.saturating_mul(MAX_LZ4_RATIO) {
            return Err(Error::HeaderMismatch(format!(
                "payload claims {declared_len} bytes from {compressed_len} compressed"
            )));
        }
        let payload = lz4_flex::decompress_size_prepended(&compressed)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut reader = Cursor::new(payload.as_slice());
        let params = GridParams::read_from(&mut reader)?;
        let poly_count = reader.read_u32::<LittleEndian>()? as usize;
        let mut polys = Vec::with_capacity(poly_count.min(payload.len() / 24));
        for _ in 0..poly_count {
            let min = [
                reader.read_u32::<LittleEndian>()?,
                reader.read_u32::<LittleEndian>()?,
            ];
            let max = [
                reader.read_u32::<LittleEndian>()?,
                reader.read_u32::<LittleEndian>()?,
            ];
            let floor = reader.read_i32::<LittleEndian>()?;
            let inside_grid = min[0] <= max[0]
                && min[1] <= max[1]
                && max[0] < params.width
                && max[1] < params.height;
            if !inside_grid {
                return Err(Error::HeaderMismatch(format!(
                    "polygon {min:?}..{max:?} outside the {}x{} grid",
                    params.width, params.height
                )));
            }
            let neighbour_count = reader.read_u32::<LittleEndian>()? as usize;
            let mut neighbours = Vec::with_capacity(neighbour_count.min(4096));
            for _ in 0..neighbour_count {
                let neighbour = reader.read_u32::<LittleEndian>()?;
                if neighbour as usize >= poly_count {
                    return Err(Error::HeaderMismatch(format!(
                        "polygon link {neighbour} out of range"
                    )));
                }
                neighbours.push(neighbour);
            }
            polys.push(NavPoly {
                min,
                max,
                floor,
                neighbours,
            });
        }

        Ok(Self {
            header,
            params,
            polys,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Loads a mesh file, rejecting it unless its header matches `expected`
    pub fn load(path: &Path, expected: &NavMeshHeader) -> Result<Self> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::MissingNavMesh {
                    species: expected.species.to_string(),
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let mesh = Self::from_bytes(&data)?;
        mesh.header.check(expected)?;
        Ok(mesh)
    }
}

fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    let len = u16::try_from(value.len())
        .map_err(|_| Error::InvalidConfig(format!("name too long: {value}")))?;
    writer.write_u16::<LittleEndian>(len)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let len = reader.read_u16::<LittleEndian>()? as usize;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| Error::HeaderMismatch("name is not UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_mesh() -> NavMesh {
        NavMesh {
            header: NavMeshHeader::new("atcs", Species::Level1, 0xfeed_beef),
            params: GridParams {
                origin: Vec3::new(-64.0, -32.0, -8.0),
                cell_size: 8.0,
                cell_height: 2.0,
                width: 16,
                height: 8,
            },
            polys: vec![
                NavPoly {
                    min: [0, 0],
                    max: [3, 7],
                    floor: 4,
                    neighbours: vec![1],
                },
                NavPoly {
                    min: [4, 0],
                    max: [15, 7],
                    floor: 5,
                    neighbours: vec![0],
                },
            ],
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atcs-level1.navMesh");
        let mesh = sample_mesh();
        mesh.save(&path).unwrap();

        let loaded = NavMesh::load(&path, &mesh.header).unwrap();
        assert_eq!(loaded, mesh);
        assert_eq!(loaded.link_count(), 2);
    }

    #[test]
    fn test_load_rejects_mismatching_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atcs-level1.navMesh");
        sample_mesh().save(&path).unwrap();

        let wrong_map = NavMeshHeader::new("nexus6", Species::Level1, 0xfeed_beef);
        assert!(matches!(
            NavMesh::load(&path, &wrong_map),
            Err(Error::HeaderMismatch(_))
        ));

        let wrong_config = NavMeshHeader::new("atcs", Species::Level1, 1);
        assert!(matches!(
            NavMesh::load(&path, &wrong_config),
            Err(Error::HeaderMismatch(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let header = NavMeshHeader::new("atcs", Species::Level1, 0);
        let result = NavMesh::load(&dir.path().join("nope.navMesh"), &header);
        assert!(matches!(result, Err(Error::MissingNavMesh { .. })));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            NavMesh::from_bytes(b"DNAV\x01\x00\x00\x00"),
            Err(Error::HeaderMismatch(_))
        ));
        let mut bytes = sample_mesh().to_bytes().unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(NavMesh::from_bytes(&bytes).is_err());
    }

    /// Serialized `mesh` with its payload replaced by `payload`, compressed
    fn bytes_with_payload(mesh: &NavMesh, payload: &[u8]) -> Vec<u8> {
        let compressed = lz4_flex::compress_prepend_size(payload);
        let mut out = Vec::new();
        mesh.header.write_to(&mut out).unwrap();
        out.write_u32::<LittleEndian>(compressed.len() as u32).unwrap();
        out.extend_from_slice(&compressed);
        out
    }

    #[test]
    fn test_polygons_outside_the_grid_are_rejected() {
        let mesh = sample_mesh();
        for (min, max) in [
            ([0, 0], [u32::MAX, 7]),
            ([0, 0], [16, 7]),
            ([0, 0], [3, 8]),
            ([5, 0], [3, 7]),
        ] {
            let mut payload = Vec::new();
            mesh.params.write_to(&mut payload).unwrap();
            payload.write_u32::<LittleEndian>(1).unwrap();
            for value in [min[0], min[1], max[0], max[1]] {
                payload.write_u32::<LittleEndian>(value).unwrap();
            }
            payload.write_i32::<LittleEndian>(0).unwrap();
            payload.write_u32::<LittleEndian>(0).unwrap();

            let result = NavMesh::from_bytes(&bytes_with_payload(&mesh, &payload));
            assert!(
                matches!(result, Err(Error::HeaderMismatch(_))),
                "{min:?}..{max:?}"
            );
        }
    }

    #[test]
    fn test_oversized_payload_lengths_are_rejected() {
        let mesh = sample_mesh();
        let mut bytes = Vec::new();
        mesh.header.write_to(&mut bytes).unwrap();
        bytes.write_u32::<LittleEndian>(u32::MAX).unwrap();
        bytes.extend_from_slice(&[0u8; 16]);
        assert!(matches!(
            NavMesh::from_bytes(&bytes),
            Err(Error::HeaderMismatch(_))
        ));

        // a tiny block claiming a huge decompressed size
        let mut bytes = Vec::new();
        mesh.header.write_to(&mut bytes).unwrap();
        bytes.write_u32::<LittleEndian>(8).unwrap();
        bytes.write_u32::<LittleEndian>(u32::MAX).unwrap();
        bytes.extend_from_slice(&[0u8; 4]);
        assert!(matches!(
            NavMesh::from_bytes(&bytes),
            Err(Error::HeaderMismatch(_))
        ));
    }

    #[test]
    fn test_find_poly() {
        let mesh = sample_mesh();
        // floor of the first polygon is at z = 0
        assert_eq!(mesh.find_poly(Vec3::new(-50.0, 0.0, 1.0), 18.0), Some(0));
        assert_eq!(mesh.find_poly(Vec3::new(10.0, 0.0, 2.0), 18.0), Some(1));
        assert_eq!(mesh.find_poly(Vec3::new(10.0, 0.0, 200.0), 18.0), None);
        assert_eq!(mesh.find_poly(Vec3::new(500.0, 0.0, 0.0), 18.0), None);
        assert_eq!(mesh.poly_center(0), Vec3::new(-48.0, 0.0, 0.0));
    }
}
