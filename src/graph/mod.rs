//! Flat-array graph store: dense node/edge tables with version counters.
//!
//! Nodes live in a dense array indexed by slot (`NodeId`). Edges for a given
//! source occupy a fixed-capacity contiguous region of a flat array —
//! `edges_index[i] .. edges_index[i] + edge_count[i]` — so no per-node
//! allocation happens after `init`. Every structural mutation bumps at least
//! one of the two graph-wide version counters; callers (the A* engine, the
//! path cache) snapshot these counters to detect concurrent mutation.

use crate::error::PathStatus;
use crate::position::Position;

/// Stable slot index of a node. A slot may be reused after `remove_node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// All-ones sentinel: never a valid allocated slot.
    pub const SENTINEL: NodeId = NodeId(u32::MAX);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_sentinel(self) -> bool {
        self == NodeId::SENTINEL
    }
}

/// Pair of monotonic counters stamped on every structural mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphVersion {
    pub node_version: u64,
    pub edge_version: u64,
}

/// Read-only view of one stored edge, returned by `get_edges_of`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeView {
    pub from: NodeId,
    pub to: NodeId,
    pub cost: f32,
    pub bidirectional: bool,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    dest: NodeId,
    cost: f32,
    bidirectional: bool,
}

/// Flat-array directed weighted graph with pre-allocated capacity.
pub struct GraphStore {
    max_nodes: usize,
    max_edges_per_node: usize,

    positions: Vec<Position>,
    active: Vec<bool>,
    node_version: Vec<u32>,

    // Per-source contiguous edge region: edges[i * max_edges_per_node .. + edge_count[i]]
    edges: Vec<Edge>,
    edge_count: Vec<u32>,

    version: GraphVersion,
}

impl GraphStore {
    /// Allocate all arrays. `init` never fails.
    pub fn new(max_nodes: usize, max_edges_per_node: usize) -> Self {
        GraphStore {
            max_nodes,
            max_edges_per_node,
            positions: vec![Position::ZERO; max_nodes],
            active: vec![false; max_nodes],
            node_version: vec![0; max_nodes],
            edges: vec![
                Edge {
                    dest: NodeId::SENTINEL,
                    cost: 0.0,
                    bidirectional: false,
                };
                max_nodes * max_edges_per_node
            ],
            edge_count: vec![0; max_nodes],
            version: GraphVersion::default(),
        }
    }

    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    pub fn max_edges_per_node(&self) -> usize {
        self.max_edges_per_node
    }

    pub fn version(&self) -> GraphVersion {
        self.version
    }

    pub fn is_active(&self, id: NodeId) -> bool {
        !id.is_sentinel() && id.index() < self.max_nodes && self.active[id.index()]
    }

    pub fn node_version_of(&self, id: NodeId) -> u32 {
        if id.index() < self.node_version.len() {
            self.node_version[id.index()]
        } else {
            0
        }
    }

    /// Flat position table, indexed by `NodeId`. Used by the distance cache
    /// and A* heuristic, which operate on raw indices for speed.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn get_node_position(&self, id: NodeId) -> Option<Position> {
        if self.is_active(id) {
            Some(self.positions[id.index()])
        } else {
            None
        }
    }

    fn region(&self, id: NodeId) -> std::ops::Range<usize> {
        let start = id.index() * self.max_edges_per_node;
        start..start + self.edge_count[id.index()] as usize
    }

    /// Linear scan for the first inactive slot; activates it.
    pub fn add_node(&mut self, pos: Position) -> Result<NodeId, PathStatus> {
        let slot = self.active.iter().position(|&a| !a);
        let Some(slot) = slot else {
            return Err(PathStatus::NodeFull);
        };

        self.active[slot] = true;
        self.positions[slot] = pos;
        self.edge_count[slot] = 0;
        self.version.node_version += 1;
        self.node_version[slot] = self.version.node_version as u32;

        tracing::debug!(node = slot, x = pos.x, y = pos.y, "add_node");
        Ok(NodeId(slot as u32))
    }

    /// No-op if the move is smaller than epsilon, or the id is invalid.
    /// Returns the list of edge-endpoint ids whose incident edges need
    /// spatial-index repositioning (both `id` and anything its edges touch).
    pub fn move_node(&mut self, id: NodeId, pos: Position) -> bool {
        if !self.is_active(id) {
            return false;
        }
        const EPS: f32 = 1e-6;
        let old = self.positions[id.index()];
        if old.squared_distance_to(pos) < EPS * EPS {
            return false;
        }

        self.positions[id.index()] = pos;
        self.version.node_version += 1;
        self.node_version[id.index()] = self.version.node_version as u32;
        tracing::debug!(node = id.0, "move_node");
        true
    }

    /// Idempotent on invalid/inactive ids. Returns the set of nodes whose
    /// edges were touched (for cache/spatial-index invalidation upstream),
    /// not including `id` itself.
    pub fn remove_node(&mut self, id: NodeId) -> Vec<NodeId> {
        if !self.is_active(id) {
            return Vec::new();
        }

        let mut touched = Vec::new();

        // Remove all edges incident on `id`: outgoing (clear its own region)
        // and incoming (scan every other source's region).
        for src in 0..self.max_nodes {
            if !self.active[src] || src == id.index() {
                continue;
            }
            let before = self.edge_count[src];
            self.remove_edges_to(NodeId(src as u32), id);
            if self.edge_count[src] != before {
                touched.push(NodeId(src as u32));
            }
        }

        self.edge_count[id.index()] = 0;
        self.active[id.index()] = false;
        self.version.node_version += 1;
        self.version.edge_version += 1;
        tracing::debug!(node = id.0, "remove_node");
        touched
    }

    fn remove_edges_to(&mut self, src: NodeId, dest: NodeId) {
        let region = self.region(src);
        let mut i = region.start;
        let mut end = region.end;
        while i < end {
            if self.edges[i].dest == dest {
                end -= 1;
                self.edges.swap(i, end);
            } else {
                i += 1;
            }
        }
        self.edge_count[src.index()] = (end - region.start) as u32;
    }

    /// Appends to `u`'s region; if `bidirectional`, also appends `(v, u)` to
    /// `v`'s region with the flag set on both. Duplicate edges are not
    /// detected (spec-documented: both will be traversed).
    pub fn add_edge(
        &mut self,
        u: NodeId,
        v: NodeId,
        cost: f32,
        bidirectional: bool,
    ) -> Result<(), PathStatus> {
        if !self.is_active(u) {
            return Err(PathStatus::StartNodeInvalid);
        }
        if self.edge_count[u.index()] as usize >= self.max_edges_per_node {
            return Err(PathStatus::EdgeFull);
        }
        if bidirectional
            && self.is_active(v)
            && self.edge_count[v.index()] as usize >= self.max_edges_per_node
        {
            return Err(PathStatus::EdgeFull);
        }

        self.push_edge(u, v, cost, bidirectional);
        if bidirectional {
            self.push_edge(v, u, cost, true);
        }

        self.version.edge_version += 1;
        tracing::debug!(from = u.0, to = v.0, cost, bidirectional, "add_edge");
        Ok(())
    }

    fn push_edge(&mut self, src: NodeId, dest: NodeId, cost: f32, bidirectional: bool) {
        let start = src.index() * self.max_edges_per_node;
        let slot = start + self.edge_count[src.index()] as usize;
        self.edges[slot] = Edge {
            dest,
            cost,
            bidirectional,
        };
        self.edge_count[src.index()] += 1;
    }

    /// Swap-and-pop the first matching destination in `u`'s region.
    /// Unidirectional: the caller removes the reverse edge explicitly.
    /// Missing edge is a no-op.
    pub fn remove_edge(&mut self, u: NodeId, v: NodeId) {
        if !self.is_active(u) || u.index() >= self.edge_count.len() {
            return;
        }
        let region = self.region(u);
        if let Some(i) = region.clone().find(|&i| self.edges[i].dest == v) {
            let last = region.end - 1;
            self.edges.swap(i, last);
            self.edge_count[u.index()] -= 1;
            self.version.edge_version += 1;
            tracing::debug!(from = u.0, to = v.0, "remove_edge");
        }
    }

    /// True if `(u -> v)` exists and its bidirectional flag is set;
    /// the flag makes this O(region size) instead of requiring a reverse
    /// scan of `v`'s region.
    pub fn is_bidirectional(&self, u: NodeId, v: NodeId) -> bool {
        if !self.is_active(u) {
            return false;
        }
        self.region(u)
            .any(|i| self.edges[i].dest == v && self.edges[i].bidirectional)
    }

    /// Read-only enumeration. `include_incoming` triggers a full scan of
    /// every source's edge region.
    pub fn get_edges_of(
        &self,
        id: NodeId,
        include_bidirectional: bool,
        include_incoming: bool,
    ) -> Vec<EdgeView> {
        let mut out = Vec::new();
        if !self.is_active(id) {
            return out;
        }

        for i in self.region(id) {
            let e = self.edges[i];
            if e.bidirectional && !include_bidirectional {
                continue;
            }
            out.push(EdgeView {
                from: id,
                to: e.dest,
                cost: e.cost,
                bidirectional: e.bidirectional,
            });
        }

        if include_incoming {
            for src in 0..self.max_nodes {
                if !self.active[src] || src == id.index() {
                    continue;
                }
                for i in self.region(NodeId(src as u32)) {
                    let e = self.edges[i];
                    if e.dest == id {
                        if e.bidirectional && !include_bidirectional {
                            continue;
                        }
                        out.push(EdgeView {
                            from: NodeId(src as u32),
                            to: id,
                            cost: e.cost,
                            bidirectional: e.bidirectional,
                        });
                    }
                }
            }
        }

        out
    }

    /// Outgoing edges of `id`, for the A* expansion step.
    pub(crate) fn outgoing(&self, id: NodeId) -> impl Iterator<Item = (NodeId, f32)> + '_ {
        self.region(id).map(move |i| (self.edges[i].dest, self.edges[i].cost))
    }

    pub fn active_node_count(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }

    pub fn active_node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.max_nodes)
            .filter(|&i| self.active[i])
            .map(|i| NodeId(i as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f32, y: f32) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn add_node_fails_when_full() {
        let mut g = GraphStore::new(2, 4);
        g.add_node(p(0.0, 0.0)).unwrap();
        g.add_node(p(1.0, 0.0)).unwrap();
        assert_eq!(g.add_node(p(2.0, 0.0)), Err(PathStatus::NodeFull));
        assert_eq!(g.active_node_count(), 2);
    }

    #[test]
    fn add_edge_fails_on_inactive_source() {
        let mut g = GraphStore::new(4, 4);
        let a = g.add_node(p(0.0, 0.0)).unwrap();
        let b = NodeId(a.0 + 1);
        assert_eq!(
            g.add_edge(b, a, 1.0, false),
            Err(PathStatus::StartNodeInvalid)
        );
    }

    #[test]
    fn bidirectional_edge_is_visible_both_ways() {
        let mut g = GraphStore::new(4, 4);
        let a = g.add_node(p(0.0, 0.0)).unwrap();
        let b = g.add_node(p(1.0, 0.0)).unwrap();
        g.add_edge(a, b, 5.0, true).unwrap();

        assert!(g.is_bidirectional(a, b));
        assert!(g.is_bidirectional(b, a));

        let out_a = g.get_edges_of(a, true, false);
        assert_eq!(out_a.len(), 1);
        assert_eq!(out_a[0].to, b);

        let out_b = g.get_edges_of(b, true, false);
        assert_eq!(out_b.len(), 1);
        assert_eq!(out_b[0].to, a);
    }

    #[test]
    fn edge_full_on_region_exhaustion() {
        let mut g = GraphStore::new(4, 1);
        let a = g.add_node(p(0.0, 0.0)).unwrap();
        let b = g.add_node(p(1.0, 0.0)).unwrap();
        let c = g.add_node(p(2.0, 0.0)).unwrap();
        g.add_edge(a, b, 1.0, false).unwrap();
        assert_eq!(g.add_edge(a, c, 1.0, false), Err(PathStatus::EdgeFull));
    }

    #[test]
    fn remove_node_clears_incident_edges() {
        let mut g = GraphStore::new(4, 4);
        let a = g.add_node(p(0.0, 0.0)).unwrap();
        let b = g.add_node(p(1.0, 0.0)).unwrap();
        let c = g.add_node(p(2.0, 0.0)).unwrap();
        g.add_edge(a, b, 1.0, true).unwrap();
        g.add_edge(b, c, 1.0, true).unwrap();

        let touched = g.remove_node(b);
        assert!(touched.contains(&a));
        assert!(touched.contains(&c));
        assert!(!g.is_active(b));
        assert_eq!(g.get_edges_of(a, true, false).len(), 0);
        assert_eq!(g.get_edges_of(c, true, false).len(), 0);
    }

    #[test]
    fn remove_node_is_idempotent() {
        let mut g = GraphStore::new(4, 4);
        let a = g.add_node(p(0.0, 0.0)).unwrap();
        g.remove_node(a);
        assert!(g.remove_node(a).is_empty());
    }

    #[test]
    fn move_node_below_epsilon_is_noop() {
        let mut g = GraphStore::new(4, 4);
        let a = g.add_node(p(0.0, 0.0)).unwrap();
        let v0 = g.version();
        assert!(!g.move_node(a, p(1e-9, 0.0)));
        assert_eq!(g.version(), v0);
    }

    #[test]
    fn move_node_bumps_versions() {
        let mut g = GraphStore::new(4, 4);
        let a = g.add_node(p(0.0, 0.0)).unwrap();
        let before = g.node_version_of(a);
        assert!(g.move_node(a, p(5.0, 5.0)));
        assert!(g.node_version_of(a) > before);
    }

    #[test]
    fn remove_edge_missing_is_noop() {
        let mut g = GraphStore::new(4, 4);
        let a = g.add_node(p(0.0, 0.0)).unwrap();
        let b = g.add_node(p(1.0, 0.0)).unwrap();
        let v0 = g.version();
        g.remove_edge(a, b);
        assert_eq!(g.version(), v0);
    }
}
