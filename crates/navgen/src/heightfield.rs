//! Solid heightfield: triangle rasterization and walkability filtering

use botnav_common::{deg_to_rad, Error, Result};
use glam::Vec3;

use crate::map::MapGeometry;

/// Largest grid accepted, in columns
const MAX_COLUMNS: usize = 1 << 26;

/// A solid vertical interval of one column, in cell-height units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub smin: i32,
    pub smax: i32,
    /// Top surface can be stood on
    pub walkable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

impl Axis {
    fn of(self, v: Vec3) -> f32 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
        }
    }
}

/// Regular grid of columns, each holding sorted non-overlapping spans
#[derive(Debug, Clone)]
pub struct Heightfield {
    pub width: usize,
    pub height: usize,
    /// World position of the corner of cell (0, 0) at span height 0
    pub origin: Vec3,
    pub cell_size: f32,
    pub cell_height: f32,
    columns: Vec<Vec<Span>>,
}

impl Heightfield {
    /// An empty heightfield covering the whole map
    pub fn for_map(map: &MapGeometry, cell_size: f32, cell_height: f32) -> Result<Self> {
        let (min, max) = map.bounds().ok_or_else(|| Error::InvalidMap(format!(
            "map {} has no geometry",
            map.name
        )))?;
        let width = (((max.x - min.x) / cell_size).ceil() as usize).max(1);
        let height = (((max.y - min.y) / cell_size).ceil() as usize).max(1);
        if width.saturating_mul(height) > MAX_COLUMNS {
            return Err(Error::InvalidMap(format!(
                "map {} needs a {width}x{height} grid",
                map.name
            )));
        }
        Ok(Self {
            width,
            height,
            origin: min,
            cell_size,
            cell_height,
            columns: vec![Vec::new(); width * height],
        })
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, x: usize, y: usize) -> &[Span] {
        &self.columns[x + y * self.width]
    }

    pub fn span_count(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    /// Inserts a span, merging it with any span it overlaps
    ///
    /// When merged tops are within `merge_threshold` the walkable flags are
    /// combined, otherwise the higher top decides.
    pub fn add_span(&mut self, x: usize, y: usize, smin: i32, smax: i32, walkable: bool, merge_threshold: i32) {
        let column = &mut self.columns[x + y * self.width];
        let mut new = Span { smin, smax, walkable };
        let mut i = 0;
        while i < column.len() {
            let current = column[i];
            if current.smin > new.smax {
                break;
            }
            if current.smax < new.smin {
                i += 1;
                continue;
            }
            if (current.smax - new.smax).abs() <= merge_threshold {
                new.walkable |= current.walkable;
            } else if current.smax > new.smax {
                new.walkable = current.walkable;
            }
            new.smin = new.smin.min(current.smin);
            new.smax = new.smax.max(current.smax);
            column.remove(i);
        }
        column.insert(i, new);
    }

    /// Rasterizes one triangle into every cell column it covers
    pub fn rasterize_triangle(&mut self, tri: [Vec3; 3], walkable: bool, merge_threshold: i32) {
        let mut cursor = TriangleCursor::new(self, tri, walkable);
        while !cursor.is_done() {
            cursor.step(self, merge_threshold, usize::MAX);
        }
    }

    fn cell_index(&self, offset: f32, count: usize) -> usize {
        ((offset / self.cell_size).floor().max(0.0) as usize).min(count - 1)
    }

    /// Applies the walkability filters to one column
    ///
    /// Unwalkable spans within `climb` of a walkable span below become
    /// walkable, then walkable spans with less than `clearance` cells of free
    /// space above lose their flag.
    pub fn filter_column(&mut self, index: usize, climb: i32, clearance: i32) {
        let column = &mut self.columns[index];

        let mut previous: Option<Span> = None;
        for span in column.iter_mut() {
            let original = *span;
            if let Some(below) = previous {
                if !span.walkable && below.walkable && (span.smax - below.smax).abs() <= climb {
                    span.walkable = true;
                }
            }
            previous = Some(original);
        }

        for i in 0..column.len() {
            let ceiling = column.get(i + 1).map_or(i32::MAX, |above| above.smin);
            if ceiling - column[i].smax < clearance {
                column[i].walkable = false;
            }
        }
    }
}

/// Clipping state of a triangle part way through rasterization
///
/// Rows are split off the triangle bottom up and cells off each row left to
/// right, so a triangle covering many columns can be spread over several
/// steps.
#[derive(Debug, Clone)]
struct TriangleCursor {
    walkable: bool,
    y: usize,
    y_end: usize,
    rest: Vec<Vec3>,
    row: Option<RowCursor>,
}

#[derive(Debug, Clone)]
struct RowCursor {
    y: usize,
    x: usize,
    x_end: usize,
    rest: Vec<Vec3>,
}

impl TriangleCursor {
    fn new(hf: &Heightfield, tri: [Vec3; 3], walkable: bool) -> Self {
        let tmin = tri[0].min(tri[1]).min(tri[2]);
        let tmax = tri[0].max(tri[1]).max(tri[2]);
        Self {
            walkable,
            y: hf.cell_index(tmin.y - hf.origin.y, hf.height),
            y_end: hf.cell_index(tmax.y - hf.origin.y, hf.height),
            rest: tri.to_vec(),
            row: None,
        }
    }

    fn is_done(&self) -> bool {
        self.row.is_none() && self.y > self.y_end
    }

    /// Clips up to `budget` rows and cells; returns the number clipped
    fn step(&mut self, hf: &mut Heightfield, merge_threshold: i32, budget: usize) -> usize {
        let cs = hf.cell_size;
        let mut work = 0;
        while work < budget {
            if let Some(row) = self.row.as_mut() {
                if row.x > row.x_end {
                    self.row = None;
                    continue;
                }
                let x = row.x;
                row.x += 1;
                work += 1;

                let split = hf.origin.x + (x + 1) as f32 * cs;
                let (cell, remainder) = divide_poly(&row.rest, split, Axis::X);
                row.rest = remainder;
                if cell.len() < 3 {
                    continue;
                }

                let (zmin, zmax) = cell
                    .iter()
                    .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v.z), hi.max(v.z)));
                let smin = (((zmin - hf.origin.z) / hf.cell_height).floor() as i32).max(0);
                let smax = (((zmax - hf.origin.z) / hf.cell_height).ceil() as i32).max(smin + 1);
                let y = row.y;
                hf.add_span(x, y, smin, smax, self.walkable, merge_threshold);
                continue;
            }

            if self.y > self.y_end {
                break;
            }
            let y = self.y;
            self.y += 1;
            work += 1;

            let split = hf.origin.y + (y + 1) as f32 * cs;
            let (row, remainder) = divide_poly(&self.rest, split, Axis::Y);
            self.rest = remainder;
            if row.len() < 3 {
                continue;
            }

            let (row_min, row_max) = row
                .iter()
                .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v.x), hi.max(v.x)));
            self.row = Some(RowCursor {
                y,
                x: hf.cell_index(row_min - hf.origin.x, hf.width),
                x_end: hf.cell_index(row_max - hf.origin.x, hf.width),
                rest: row,
            });
        }
        work
    }
}

/// Rasterizes a map's triangles in steps of bounded work
///
/// Work is counted in clipped rows and cells, so one large floor triangle
/// does not make a step expensive.
#[derive(Debug, Clone, Default)]
pub struct Rasterizer {
    next_triangle: usize,
    current: Option<TriangleCursor>,
}

impl Rasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Triangles started so far
    pub fn triangles_started(&self) -> usize {
        self.next_triangle
    }

    /// Does up to `budget` units of work; returns true once every triangle is in
    pub fn step(
        &mut self,
        hf: &mut Heightfield,
        map: &MapGeometry,
        walkable_slope_angle: f32,
        merge_threshold: i32,
        budget: usize,
    ) -> bool {
        let mut work = 0;
        while work < budget {
            if let Some(cursor) = self.current.as_mut().filter(|cursor| !cursor.is_done()) {
                work += cursor.step(hf, merge_threshold, budget - work);
                continue;
            }
            if self.next_triangle >= map.triangles.len() {
                self.current = None;
                return true;
            }
            let tri = map.triangle(self.next_triangle);
            self.next_triangle += 1;
            let walkable = is_walkable_triangle(tri, walkable_slope_angle);
            self.current = Some(TriangleCursor::new(hf, tri, walkable));
            work += 1;
        }
        self.next_triangle >= map.triangles.len()
            && self.current.as_ref().map_or(true, TriangleCursor::is_done)
    }
}

/// Whether a triangle is flat enough to stand on
pub fn is_walkable_triangle(tri: [Vec3; 3], walkable_slope_angle: f32) -> bool {
    let normal = (tri[1] - tri[0]).cross(tri[2] - tri[0]);
    let length = normal.length();
    if length <= f32::EPSILON {
        return false;
    }
    normal.z / length >= deg_to_rad(walkable_slope_angle).cos()
}

/// Splits a convex polygon by the line `axis = offset`
///
/// Returns the parts below and above the line.
fn divide_poly(poly: &[Vec3], offset: f32, axis: Axis) -> (Vec<Vec3>, Vec<Vec3>) {
    let mut below = Vec::with_capacity(poly.len() + 1);
    let mut above = Vec::with_capacity(poly.len() + 1);
    let n = poly.len();

    for i in 0..n {
        let vi = poly[i];
        let vj = poly[(i + 1) % n];
        let di = axis.of(vi) - offset;
        let dj = axis.of(vj) - offset;

        if di < 0.0 {
            below.push(vi);
        } else if di > 0.0 {
            above.push(vi);
        } else {
            below.push(vi);
            above.push(vi);
            continue;
        }

        if (di < 0.0 && dj > 0.0) || (di > 0.0 && dj < 0.0) {
            let t = di / (di - dj);
            let crossing = vi + (vj - vi) * t;
            below.push(crossing);
            above.push(crossing);
        }
    }

    (below, above)
}
