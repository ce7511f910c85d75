//! Static map geometry used as generation input

use botnav_common::{Error, Result};
use glam::Vec3;
use std::path::Path;

/// Triangle soup of a level's collision geometry, z-up
///
/// Shared read-only between generation tasks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapGeometry {
    /// Map name, recorded in every navigation mesh header
    pub name: String,
    pub vertices: Vec<Vec3>,
    /// Vertex indices, counter-clockwise seen from the walkable side
    pub triangles: Vec<[u32; 3]>,
}

impl MapGeometry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Loads geometry from a Wavefront OBJ file; the map is named after the file stem
    pub fn from_obj<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| Error::InvalidMap(format!("no map name in {}", path.display())))?;
        let content = std::fs::read_to_string(path)?;
        Self::from_obj_str(name, &content)
    }

    /// Parses OBJ content already held in memory
    pub fn from_obj_str(name: impl Into<String>, content: &str) -> Result<Self> {
        let mut map = Self::new(name);
        for (line_no, line) in content.lines().enumerate() {
            map.parse_obj_line(line)
                .map_err(|reason| Error::InvalidMap(format!("line {}: {reason}", line_no + 1)))?;
        }
        map.validate()?;
        Ok(map)
    }

    fn parse_obj_line(&mut self, line: &str) -> std::result::Result<(), String> {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => {
                let mut coords = [0.0f32; 3];
                for (axis, coord) in coords.iter_mut().enumerate() {
                    *coord = tokens
                        .next()
                        .ok_or_else(|| format!("vertex is missing coordinate {axis}"))?
                        .parse()
                        .map_err(|_| format!("vertex coordinate {axis} is not a number"))?;
                }
                self.vertices.push(Vec3::from_array(coords));
            }
            Some("f") => {
                let mut face = Vec::new();
                for token in tokens {
                    let index: i64 = token
                        .split('/')
                        .next()
                        .unwrap_or_default()
                        .parse()
                        .map_err(|_| "face index is not a number".to_string())?;
                    // OBJ indices are 1-based, negative ones count from the end
                    let resolved = if index < 0 {
                        self.vertices.len() as i64 + index
                    } else {
                        index - 1
                    };
                    if resolved < 0 {
                        return Err(format!("face index {index} out of range"));
                    }
                    face.push(resolved as u32);
                }
                if face.len() < 3 {
                    return Err("face has less than 3 vertices".to_string());
                }
                for i in 1..face.len() - 1 {
                    self.triangles.push([face[0], face[i], face[i + 1]]);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Appends a solid axis-aligned box with outward-facing triangles
    pub fn add_box(&mut self, min: Vec3, max: Vec3) {
        let base = self.vertices.len() as u32;
        for i in 0..8 {
            self.vertices.push(Vec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            ));
        }
        const FACES: [[u32; 4]; 6] = [
            [4, 5, 7, 6], // top
            [0, 2, 3, 1], // bottom
            [0, 1, 5, 4], // -y
            [2, 6, 7, 3], // +y
            [0, 4, 6, 2], // -x
            [1, 3, 7, 5], // +x
        ];
        for [a, b, c, d] in FACES {
            self.triangles.push([base + a, base + b, base + c]);
            self.triangles.push([base + a, base + c, base + d]);
        }
    }

    pub fn with_box(mut self, min: Vec3, max: Vec3) -> Self {
        self.add_box(min, max);
        self
    }

    /// Checks every triangle references an existing vertex
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidMap("map has no name".to_string()));
        }
        let count = self.vertices.len() as u32;
        if let Some(tri) = self.triangles.iter().find(|tri| tri.iter().any(|&i| i >= count)) {
            return Err(Error::InvalidMap(format!(
                "triangle {tri:?} references a vertex beyond {count}"
            )));
        }
        Ok(())
    }

    /// Axis-aligned bounds of all vertices, `None` for an empty map
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.vertices.first()?;
        Some(
            self.vertices
                .iter()
                .fold((first, first), |(min, max), &v| (min.min(v), max.max(v))),
        )
    }

    pub fn triangle(&self, index: usize) -> [Vec3; 3] {
        let [a, b, c] = self.triangles[index];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }
}
