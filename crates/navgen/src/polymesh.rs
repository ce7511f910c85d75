//! Walkable node graph, border erosion and rectangle polygonization

use std::collections::VecDeque;

use crate::heightfield::Heightfield;
use crate::navmesh::NavPoly;

/// Column offsets for the four link directions: -x, +y, +x, -y
pub const DIR_OFFSETS: [(i32, i32); 4] = [(-1, 0), (0, 1), (1, 0), (0, -1)];

const EAST: usize = 2;
const NORTH: usize = 1;

/// A walkable span with its links to neighbouring columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub x: u32,
    pub y: u32,
    /// Floor height in cells
    pub floor: i32,
    /// Bottom of the next solid span above, in cells
    pub ceiling: i32,
    pub links: [Option<u32>; 4],
    pub alive: bool,
}

impl Node {
    fn link(&self, dir: usize) -> Option<u32> {
        self.links[dir]
    }
}

/// Graph of standable positions, one node per walkable span
#[derive(Debug, Clone)]
pub struct NodeGraph {
    pub width: usize,
    pub height: usize,
    /// First node and node count per column
    columns: Vec<(u32, u32)>,
    pub nodes: Vec<Node>,
}

impl NodeGraph {
    /// Builds nodes from the walkable spans and links 4-adjacent ones
    ///
    /// Two nodes link when their floors differ by at most `climb` cells and
    /// the space they share is at least `clearance` cells high.
    pub fn connect(hf: &Heightfield, climb: i32, clearance: i32) -> Self {
        let mut builder = GraphBuilder::new(hf, climb, clearance);
        while !builder.step(hf, usize::MAX) {}
        builder.finish()
    }

    fn find_link(&self, index: usize, dir: usize, climb: i32, clearance: i32) -> Option<u32> {
        let node = &self.nodes[index];
        let (dx, dy) = DIR_OFFSETS[dir];
        let nx = node.x as i32 + dx;
        let ny = node.y as i32 + dy;
        if nx < 0 || ny < 0 || nx >= self.width as i32 || ny >= self.height as i32 {
            return None;
        }
        self.column_nodes(nx as usize, ny as usize).find(|&candidate| {
            let other = &self.nodes[candidate as usize];
            let top = node.ceiling.min(other.ceiling);
            let bottom = node.floor.max(other.floor);
            (node.floor - other.floor).abs() <= climb && top - bottom >= clearance
        })
    }

    /// Node indices stored in one column, bottom up
    pub fn column_nodes(&self, x: usize, y: usize) -> impl Iterator<Item = u32> {
        let (start, count) = self.columns[x + y * self.width];
        start..start + count
    }

    pub fn alive_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.alive).count()
    }

    fn alive_link(&self, index: u32, dir: usize) -> Option<u32> {
        self.nodes[index as usize]
            .link(dir)
            .filter(|&other| self.nodes[other as usize].alive)
    }
}

/// Builds a [`NodeGraph`] in steps of bounded work
///
/// Every column is turned into nodes first, then every node is linked, one
/// column or node per unit of work.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    climb: i32,
    clearance: i32,
    graph: NodeGraph,
    next_column: usize,
    next_link: usize,
}

impl GraphBuilder {
    pub fn new(hf: &Heightfield, climb: i32, clearance: i32) -> Self {
        Self {
            climb,
            clearance,
            graph: NodeGraph {
                width: hf.width,
                height: hf.height,
                columns: Vec::with_capacity(hf.column_count()),
                nodes: Vec::new(),
            },
            next_column: 0,
            next_link: 0,
        }
    }

    /// Share of the work done, from 0 to 1
    pub fn progress(&self) -> f32 {
        let columns = self.graph.width * self.graph.height;
        if self.next_column < columns {
            return 0.5 * self.next_column as f32 / columns as f32;
        }
        0.5 + 0.5 * self.next_link as f32 / self.graph.nodes.len().max(1) as f32
    }

    /// Does up to `budget` units of work; returns true once every node is linked
    pub fn step(&mut self, hf: &Heightfield, budget: usize) -> bool {
        let column_count = hf.width * hf.height;
        let mut work = 0;
        while work < budget {
            if self.next_column < column_count {
                self.add_column(hf, self.next_column);
                self.next_column += 1;
                work += 1;
                continue;
            }
            let Some(index) = (self.next_link < self.graph.nodes.len()).then_some(self.next_link)
            else {
                return true;
            };
            for dir in 0..4 {
                let link = self.graph.find_link(index, dir, self.climb, self.clearance);
                self.graph.nodes[index].links[dir] = link;
            }
            self.next_link += 1;
            work += 1;
        }
        self.next_column >= column_count && self.next_link >= self.graph.nodes.len()
    }

    fn add_column(&mut self, hf: &Heightfield, column: usize) {
        let (x, y) = (column % hf.width, column / hf.width);
        let nodes = &mut self.graph.nodes;
        let start = nodes.len() as u32;
        let spans = hf.column(x, y);
        for (i, span) in spans.iter().enumerate() {
            if !span.walkable {
                continue;
            }
            nodes.push(Node {
                x: x as u32,
                y: y as u32,
                floor: span.smax,
                ceiling: spans.get(i + 1).map_or(i32::MAX, |above| above.smin),
                links: [None; 4],
                alive: true,
            });
        }
        let count = nodes.len() as u32 - start;
        self.graph.columns.push((start, count));
    }

    /// The finished graph
    pub fn finish(self) -> NodeGraph {
        self.graph
    }
}

/// Incremental multi-source breadth-first erosion from the walkable border
///
/// Border nodes (missing at least one link) are seeded first, distances
/// are then propagated, and finally nodes closer than the radius die. Each
/// phase visits a bounded number of nodes per step.
#[derive(Debug, Clone)]
pub struct Eroder {
    radius: u32,
    distance: Vec<u32>,
    queue: VecDeque<u32>,
    next_seed: usize,
    next_apply: usize,
}

impl Eroder {
    pub fn new(graph: &NodeGraph, radius: u32) -> Self {
        Self {
            radius,
            distance: vec![u32::MAX; graph.nodes.len()],
            queue: VecDeque::new(),
            next_seed: 0,
            next_apply: 0,
        }
    }

    /// Visits up to `budget` nodes; returns true once eroded nodes are removed
    pub fn step(&mut self, graph: &mut NodeGraph, budget: usize) -> bool {
        let count = graph.nodes.len();
        let mut work = 0;
        while work < budget {
            work += 1;
            if self.next_seed < count {
                let index = self.next_seed;
                self.next_seed += 1;
                if graph.nodes[index].links.iter().any(Option::is_none) {
                    self.distance[index] = 0;
                    self.queue.push_back(index as u32);
                }
                continue;
            }

            if let Some(current) = self.queue.pop_front() {
                let next = self.distance[current as usize] + 1;
                for link in graph.nodes[current as usize].links.iter().flatten() {
                    let slot = &mut self.distance[*link as usize];
                    if next < *slot {
                        *slot = next;
                        self.queue.push_back(*link);
                    }
                }
                continue;
            }

            if self.next_apply >= count {
                return true;
            }
            if self.distance[self.next_apply] < self.radius {
                graph.nodes[self.next_apply].alive = false;
            }
            self.next_apply += 1;
        }
        self.next_apply >= count && self.queue.is_empty() && self.next_seed >= count
    }

    /// Nodes waiting in the propagation queue
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Share of the nodes already judged, from 0 to 1
    pub fn progress(&self, graph: &NodeGraph) -> f32 {
        self.next_apply as f32 / graph.nodes.len().max(1) as f32
    }
}

/// Merges surviving nodes of equal floor height into rectangles
///
/// Rectangles grow along +x first, then along +y while a whole row of
/// linked, equal-height, unclaimed nodes is available. Polygon links are
/// derived from node links and are sorted and deduplicated.
pub fn polygonize(graph: &NodeGraph) -> Vec<NavPoly> {
    let mut polygonizer = Polygonizer::new(graph);
    while !polygonizer.step(graph, usize::MAX) {}
    polygonizer.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PolygonizePhase {
    Claim,
    Link,
    Tidy,
    Done,
}

/// A rectangle still growing along +y
#[derive(Debug, Clone)]
struct Growth {
    id: u32,
    floor: i32,
    top_row: Vec<u32>,
}

/// Runs [`polygonize`] in steps of bounded work
///
/// A unit of work is one node scanned, claimed or linked, so a rectangle
/// spanning the whole map grows over many steps.
#[derive(Debug, Clone)]
pub struct Polygonizer {
    owner: Vec<u32>,
    polys: Vec<NavPoly>,
    phase: PolygonizePhase,
    cursor: usize,
    growth: Option<Growth>,
}

impl Polygonizer {
    pub fn new(graph: &NodeGraph) -> Self {
        Self {
            owner: vec![u32::MAX; graph.nodes.len()],
            polys: Vec::new(),
            phase: PolygonizePhase::Claim,
            cursor: 0,
            growth: None,
        }
    }

    pub fn poly_count(&self) -> usize {
        self.polys.len()
    }

    /// Share of the work done, from 0 to 1
    pub fn progress(&self, graph: &NodeGraph) -> f32 {
        let nodes = graph.nodes.len().max(1) as f32;
        match self.phase {
            PolygonizePhase::Claim => 0.6 * self.cursor as f32 / nodes,
            PolygonizePhase::Link => 0.6 + 0.3 * self.cursor as f32 / nodes,
            PolygonizePhase::Tidy => {
                0.9 + 0.1 * self.cursor as f32 / self.polys.len().max(1) as f32
            }
            PolygonizePhase::Done => 1.0,
        }
    }

    /// Does up to `budget` units of work; returns true once the polygons are final
    pub fn step(&mut self, graph: &NodeGraph, budget: usize) -> bool {
        let mut work = 0;
        while work < budget {
            if let Some(growth) = self.growth.take() {
                work += growth.top_row.len().max(1);
                self.grow(graph, growth);
                continue;
            }
            match self.phase {
                PolygonizePhase::Claim => {
                    if self.cursor >= graph.nodes.len() {
                        self.next_phase(PolygonizePhase::Link);
                        continue;
                    }
                    let start = self.cursor as u32;
                    self.cursor += 1;
                    work += 1;
                    work += self.start_rectangle(graph, start);
                }
                PolygonizePhase::Link => {
                    if self.cursor >= graph.nodes.len() {
                        self.next_phase(PolygonizePhase::Tidy);
                        continue;
                    }
                    self.link_node(graph, self.cursor);
                    self.cursor += 1;
                    work += 1;
                }
                PolygonizePhase::Tidy => {
                    let Some(poly) = self.polys.get_mut(self.cursor) else {
                        self.next_phase(PolygonizePhase::Done);
                        continue;
                    };
                    work += 1 + poly.neighbours.len();
                    poly.neighbours.sort_unstable();
                    poly.neighbours.dedup();
                    self.cursor += 1;
                }
                PolygonizePhase::Done => return true,
            }
        }
        self.phase == PolygonizePhase::Done
    }

    /// The finished polygons
    pub fn finish(self) -> Vec<NavPoly> {
        self.polys
    }

    fn next_phase(&mut self, phase: PolygonizePhase) {
        self.phase = phase;
        self.cursor = 0;
    }

    fn claimable(&self, graph: &NodeGraph, index: u32, floor: i32) -> bool {
        let node = &graph.nodes[index as usize];
        node.alive && node.floor == floor && self.owner[index as usize] == u32::MAX
    }

    /// Claims the first row of a new rectangle at `start`; returns the nodes claimed
    fn start_rectangle(&mut self, graph: &NodeGraph, start: u32) -> usize {
        let node = &graph.nodes[start as usize];
        let floor = node.floor;
        if !self.claimable(graph, start, floor) {
            return 0;
        }

        let mut row = vec![start];
        let mut last = start;
        while let Some(next) = graph.alive_link(last, EAST) {
            if !self.claimable(graph, next, floor) {
                break;
            }
            row.push(next);
            last = next;
        }

        let id = self.polys.len() as u32;
        for &index in &row {
            self.owner[index as usize] = id;
        }
        self.polys.push(NavPoly {
            min: [node.x, node.y],
            max: [node.x + row.len() as u32 - 1, node.y],
            floor,
            neighbours: Vec::new(),
        });
        let claimed = row.len();
        self.growth = Some(Growth {
            id,
            floor,
            top_row: row,
        });
        claimed
    }

    /// Adds the row above a growing rectangle when all of it is available
    fn grow(&mut self, graph: &NodeGraph, growth: Growth) {
        let mut above = Vec::with_capacity(growth.top_row.len());
        for &index in &growth.top_row {
            match graph.alive_link(index, NORTH) {
                Some(up) if self.claimable(graph, up, growth.floor) => above.push(up),
                _ => return,
            }
        }
        let contiguous = above
            .windows(2)
            .all(|pair| graph.alive_link(pair[0], EAST) == Some(pair[1]));
        if !contiguous {
            return;
        }

        for &index in &above {
            self.owner[index as usize] = growth.id;
        }
        if let Some(poly) = self.polys.get_mut(growth.id as usize) {
            poly.max[1] += 1;
        }
        self.growth = Some(Growth {
            top_row: above,
            ..growth
        });
    }

    fn link_node(&mut self, graph: &NodeGraph, index: usize) {
        let poly = self.owner[index];
        if poly == u32::MAX {
            return;
        }
        for link in graph.nodes[index].links.iter().flatten() {
            let other = self.owner[*link as usize];
            if other != u32::MAX && other != poly {
                self.polys[poly as usize].neighbours.push(other);
            }
        }
    }
}
