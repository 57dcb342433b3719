//! Uniform grid spatial index used to accelerate "nearest edge to point".
//!
//! The grid is a CSR-style structure — a flat `[start, count)` index per
//! cell into a flat array of edge references — built fresh from the current
//! graph state rather than incrementally patched, the same way this
//! codebase's other flat binary formats (`nbg.csr`, `ebg.csr`-shaped
//! tables) are always produced by a single build pass over their inputs
//! rather than mutated in place. A full rebuild is O(active edges) and is
//! triggered by the engine on any structural mutation the index needs to
//! reflect; see DESIGN.md for why incremental per-cell patching isn't
//! worth the complexity here.

use crate::graph::{GraphStore, NodeId};
use crate::position::{project_onto_segment, Position};

const MIN_CELL_SIZE: f32 = 10.0;
const MAX_CELL_SIZE: f32 = 500.0;
const MAX_CELL_COUNT: usize = 1_000_000;

/// Build-time tuning. `None` for `cell_size` means auto-select from the
/// mean active-edge length.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialGridConfig {
    pub cell_size: Option<f32>,
}

#[derive(Debug, Clone, Copy)]
struct EdgeRef {
    from: NodeId,
    to: NodeId,
}

pub struct SpatialGrid {
    origin: Position,
    cell_size: f32,
    width: usize,
    height: usize,
    cell_start: Vec<u32>, // width*height + 1
    edge_refs: Vec<EdgeRef>,
}

impl SpatialGrid {
    /// Build the grid over the bounding box of all active nodes, auto-
    /// selecting cell size as ~2x mean active-edge length (clamped to
    /// [10, 500] world units) unless the config pins one. Grid dimensions
    /// are grown (cell size increased) until width*height <= 1,000,000.
    pub fn build(graph: &GraphStore, config: SpatialGridConfig) -> Self {
        let active: Vec<NodeId> = graph.active_node_ids().collect();
        if active.is_empty() {
            return SpatialGrid::empty();
        }

        let (mut min, mut max) = (Position::new(f32::MAX, f32::MAX), Position::new(f32::MIN, f32::MIN));
        for &id in &active {
            let p = graph.get_node_position(id).unwrap();
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }

        let edges = Self::collect_edges(graph);

        let mut cell_size = config.cell_size.unwrap_or_else(|| {
            if edges.is_empty() {
                MIN_CELL_SIZE
            } else {
                let total: f32 = edges
                    .iter()
                    .map(|e| {
                        graph
                            .get_node_position(e.from)
                            .unwrap()
                            .distance_to(graph.get_node_position(e.to).unwrap())
                    })
                    .sum();
                (2.0 * total / edges.len() as f32).clamp(MIN_CELL_SIZE, MAX_CELL_SIZE)
            }
        });

        let span_x = (max.x - min.x).max(1.0);
        let span_y = (max.y - min.y).max(1.0);

        let (mut width, mut height) = Self::dims_for(span_x, span_y, cell_size);
        while width.saturating_mul(height) > MAX_CELL_COUNT {
            cell_size *= 1.5;
            let (w, h) = Self::dims_for(span_x, span_y, cell_size);
            width = w;
            height = h;
        }

        let mut grid = SpatialGrid {
            origin: min,
            cell_size,
            width,
            height,
            cell_start: vec![0; width * height + 1],
            edge_refs: Vec::new(),
        };
        grid.populate(graph, &edges);
        grid
    }

    fn empty() -> Self {
        SpatialGrid {
            origin: Position::ZERO,
            cell_size: MIN_CELL_SIZE,
            width: 0,
            height: 0,
            cell_start: vec![0],
            edge_refs: Vec::new(),
        }
    }

    fn dims_for(span_x: f32, span_y: f32, cell_size: f32) -> (usize, usize) {
        let w = ((span_x / cell_size).ceil() as usize).max(1);
        let h = ((span_y / cell_size).ceil() as usize).max(1);
        (w, h)
    }

    fn collect_edges(graph: &GraphStore) -> Vec<EdgeRef> {
        let mut out = Vec::new();
        for id in graph.active_node_ids() {
            for e in graph.get_edges_of(id, true, false) {
                out.push(EdgeRef { from: e.from, to: e.to });
            }
        }
        out
    }

    fn cell_of(&self, p: Position) -> (i64, i64) {
        (
            ((p.x - self.origin.x) / self.cell_size).floor() as i64,
            ((p.y - self.origin.y) / self.cell_size).floor() as i64,
        )
    }

    fn cell_range(&self, from: Position, to: Position) -> (i64, i64, i64, i64) {
        let (x0, y0) = self.cell_of(Position::new(from.x.min(to.x), from.y.min(to.y)));
        let (x1, y1) = self.cell_of(Position::new(from.x.max(to.x), from.y.max(to.y)));
        (x0, y0, x1, y1)
    }

    fn in_bounds(&self, cx: i64, cy: i64) -> bool {
        cx >= 0 && cy >= 0 && (cx as usize) < self.width && (cy as usize) < self.height
    }

    fn cell_index(&self, cx: i64, cy: i64) -> usize {
        cy as usize * self.width + cx as usize
    }

    fn populate(&mut self, graph: &GraphStore, edges: &[EdgeRef]) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let n_cells = self.width * self.height;
        let mut counts = vec![0u32; n_cells];

        let membership = |grid: &SpatialGrid, e: &EdgeRef| -> Vec<usize> {
            let from = graph.get_node_position(e.from).unwrap();
            let to = graph.get_node_position(e.to).unwrap();
            let (x0, y0, x1, y1) = grid.cell_range(from, to);
            let mut cells = Vec::new();
            for cy in y0..=y1 {
                for cx in x0..=x1 {
                    if grid.in_bounds(cx, cy) {
                        cells.push(grid.cell_index(cx, cy));
                    }
                }
            }
            cells
        };

        let mut per_edge_cells = Vec::with_capacity(edges.len());
        for e in edges {
            let cells = membership(self, e);
            for &c in &cells {
                counts[c] += 1;
            }
            per_edge_cells.push(cells);
        }

        let mut start = vec![0u32; n_cells + 1];
        for i in 0..n_cells {
            start[i + 1] = start[i] + counts[i];
        }
        let mut cursor = start.clone();
        let mut refs = vec![
            EdgeRef {
                from: NodeId::SENTINEL,
                to: NodeId::SENTINEL
            };
            start[n_cells] as usize
        ];

        for (e, cells) in edges.iter().zip(per_edge_cells.iter()) {
            for &c in cells {
                refs[cursor[c] as usize] = *e;
                cursor[c] += 1;
            }
        }

        self.cell_start = start;
        self.edge_refs = refs;
    }

    fn cell_edges(&self, cx: i64, cy: i64) -> &[EdgeRef] {
        if !self.in_bounds(cx, cy) {
            return &[];
        }
        let idx = self.cell_index(cx, cy);
        let start = self.cell_start[idx] as usize;
        let end = self.cell_start[idx + 1] as usize;
        &self.edge_refs[start..end]
    }

    /// Search the 3x3 neighborhood of `p`'s cell; for each edge found,
    /// project `p` onto the segment (clamped to endpoints) and track the
    /// minimum squared distance. Falls back to a full linear scan over all
    /// active edges if the neighborhood is empty (correctness over speed).
    pub fn query_nearest_edge(&self, p: Position, graph: &GraphStore) -> Option<(NodeId, NodeId, Position)> {
        if self.width > 0 && self.height > 0 {
            if let Some(hit) = self.query_neighborhood(p, graph) {
                return Some(hit);
            }
        }
        self.query_full_scan(p, graph)
    }

    fn query_neighborhood(&self, p: Position, graph: &GraphStore) -> Option<(NodeId, NodeId, Position)> {
        let (cx, cy) = self.cell_of(p);
        let mut best: Option<(NodeId, NodeId, Position, f32)> = None;

        for dy in -1..=1 {
            for dx in -1..=1 {
                for e in self.cell_edges(cx + dx, cy + dy) {
                    let from = graph.get_node_position(e.from).unwrap();
                    let to = graph.get_node_position(e.to).unwrap();
                    let (proj, dist_sq) = project_onto_segment(p, from, to);
                    if best.map_or(true, |(_, _, _, d)| dist_sq < d) {
                        best = Some((e.from, e.to, proj, dist_sq));
                    }
                }
            }
        }

        best.map(|(from, to, proj, _)| (from, to, proj))
    }

    fn query_full_scan(&self, p: Position, graph: &GraphStore) -> Option<(NodeId, NodeId, Position)> {
        let mut best: Option<(NodeId, NodeId, Position, f32)> = None;
        for id in graph.active_node_ids() {
            for e in graph.get_edges_of(id, true, false) {
                let from = graph.get_node_position(e.from).unwrap();
                let to = graph.get_node_position(e.to).unwrap();
                let (proj, dist_sq) = project_onto_segment(p, from, to);
                if best.map_or(true, |(_, _, _, d)| dist_sq < d) {
                    best = Some((e.from, e.to, proj, dist_sq));
                }
            }
        }
        best.map(|(from, to, proj, _)| (from, to, proj))
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    pub fn occupied_cell_count(&self) -> usize {
        (0..self.cell_count())
            .filter(|&i| self.cell_start[i] != self.cell_start[i + 1])
            .count()
    }

    pub fn max_edges_per_cell(&self) -> usize {
        (0..self.cell_count())
            .map(|i| (self.cell_start[i + 1] - self.cell_start[i]) as usize)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_graph() -> GraphStore {
        let mut g = GraphStore::new(8, 4);
        let n1 = g.add_node(Position::new(0.0, 0.0)).unwrap();
        let n2 = g.add_node(Position::new(100.0, 0.0)).unwrap();
        g.add_edge(n1, n2, 100.0, true).unwrap();
        g
    }

    #[test]
    fn finds_nearest_edge_via_neighborhood() {
        let g = chain_graph();
        let grid = SpatialGrid::build(&g, SpatialGridConfig::default());
        let (from, to, proj) = grid.query_nearest_edge(Position::new(50.0, 5.0), &g).unwrap();
        assert!(from.0 == 0 || to.0 == 0);
        assert!((proj.x - 50.0).abs() < 1.0);
        assert!((proj.y - 0.0).abs() < 1e-3);
    }

    #[test]
    fn empty_graph_returns_none() {
        let g = GraphStore::new(4, 4);
        let grid = SpatialGrid::build(&g, SpatialGridConfig::default());
        assert!(grid.query_nearest_edge(Position::ZERO, &g).is_none());
    }

    #[test]
    fn cell_count_is_clamped() {
        let mut g = GraphStore::new(4, 4);
        let n1 = g.add_node(Position::new(0.0, 0.0)).unwrap();
        let n2 = g.add_node(Position::new(1_000_000.0, 1_000_000.0)).unwrap();
        g.add_edge(n1, n2, 1.0, true).unwrap();
        let grid = SpatialGrid::build(&g, SpatialGridConfig::default());
        assert!(grid.cell_count() <= 1_000_000);
    }

    #[test]
    fn full_scan_fallback_finds_far_edge() {
        let g = chain_graph();
        let grid = SpatialGrid::build(&g, SpatialGridConfig { cell_size: Some(10.0) });
        // Query far outside any populated neighborhood cell but the full
        // scan fallback must still find the one edge in the graph.
        let (from, to, _) = grid
            .query_nearest_edge(Position::new(-500.0, -500.0), &g)
            .unwrap();
        assert!(from.0 == 0 || to.0 == 0);
        let _ = to;
    }
}
