//! Single-threaded 2D graph pathfinding engine for real-time simulations.
//!
//! [`PathEngine`] owns a flat-array graph store ([`graph`]), a pooled A*
//! search ([`astar`]) backed by a pre-allocated min-heap ([`heap`]), a
//! pairwise distance cache and two LRU path caches ([`cache`]), a uniform
//! spatial grid for edge projection ([`spatial`]), and the virtual-node
//! protocol that lets a caller route from/to an arbitrary world position
//! instead of a node id ([`projection`]). Every fallible operation returns
//! a [`PathStatus`] rather than raising; see `error` for the closed set.
//!
//! The engine is not safe to share across threads — callers needing
//! concurrent routing should shard into multiple instances, one per
//! thread, each with its own `PathEngine`.

pub mod astar;
pub mod cache;
pub mod error;
pub mod graph;
pub mod heap;
pub mod position;
pub mod projection;
pub mod spatial;

pub use error::PathStatus;
pub use graph::{EdgeView, NodeId};
pub use position::Position;

use cache::{
    quantize_point, CacheStats, DistanceCache, NodePathCache, PointKey, PointPathCache,
};
use graph::GraphStore;
use heap::HeapPool;
use projection::VirtualNode;
use spatial::{SpatialGrid, SpatialGridConfig};

/// Number of times `find_path` retries an A* search that aborted with
/// `GraphChanged` before giving up with `GraphChangedTooOften`.
const MAX_GRAPH_CHANGED_RETRIES: u32 = 3;

/// Graphs at or above this many active nodes get an automatically-built
/// spatial grid; smaller graphs use a full linear scan for projection,
/// which is cheaper than maintaining a grid that covers a handful of cells.
const SPATIAL_AUTO_THRESHOLD: usize = 100;

/// Default search-depth budget (heap pool block size) for the inner A* run
/// of a projected query, per spec.md's `virtual_max_path`.
pub const DEFAULT_VIRTUAL_MAX_PATH: usize = 64;

/// `init`-time tuning, passed once to [`PathEngine::new`]. There is no file
/// format or environment variable surface here (spec.md §6) — this is a
/// plain struct with a `Default` impl carrying the constants spec.md
/// recommends.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_nodes: usize,
    pub max_edges_per_node: usize,
    /// Clamped to `max_nodes` at `new()`, per spec.md §4.1.
    pub heap_pool_block_size: usize,
    pub max_cache_path_length: usize,
    pub node_path_cache_capacity: usize,
    pub point_path_cache_capacity: usize,
    /// `None` auto-decides per [`SPATIAL_AUTO_THRESHOLD`]; `Some(true/false)`
    /// pins the spatial index on or off regardless of graph size.
    pub spatial_index_enabled: Option<bool>,
    pub spatial_index: SpatialGridConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_nodes: 4096,
            max_edges_per_node: 8,
            heap_pool_block_size: 1024,
            max_cache_path_length: 256,
            node_path_cache_capacity: 1024,
            point_path_cache_capacity: 256,
            spatial_index_enabled: None,
            spatial_index: SpatialGridConfig::default(),
        }
    }
}

/// Aggregate introspection snapshot across every cache the engine owns.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineCacheStats {
    pub node_path_cache: CacheStats,
    pub point_path_cache: CacheStats,
    pub distance_cache_size: usize,
    pub distance_cache_hits: u64,
    pub distance_cache_misses: u64,
    pub spatial_cell_count: usize,
    pub spatial_occupied_cells: usize,
    pub spatial_max_edges_per_cell: usize,
}

/// Result of a pathfinding call: the node sequence (start..=goal inclusive
/// on success, empty otherwise) and the closed status.
#[derive(Debug, Clone, Default)]
pub struct PathResult {
    pub path: Vec<NodeId>,
    pub status: PathStatus,
    pub cost: f32,
}

impl Default for PathStatus {
    fn default() -> Self {
        PathStatus::NoPath
    }
}

/// A projected query additionally reports the point(s) the engine actually
/// routed from/to, since those rarely coincide with the caller's input.
#[derive(Debug, Clone, Default)]
pub struct ProjectedPathResult {
    pub path: Vec<NodeId>,
    pub status: PathStatus,
    pub cost: f32,
    pub entry_point: Option<Position>,
    pub exit_point: Option<Position>,
}

/// One endpoint of a projected query: either an existing graph node or an
/// arbitrary world position to be projected onto the nearest edge.
#[derive(Debug, Clone, Copy)]
pub enum Endpoint {
    Node(NodeId),
    Point(Position),
}

/// The engine instance. Owns every array and cache; `init`'s allocations
/// are the only ones on the hot path — `find_path` and friends allocate
/// nothing except the caller-visible output vector (spec.md §5).
pub struct PathEngine {
    graph: GraphStore,
    heap_pool: HeapPool,
    distance_cache: DistanceCache,
    node_path_cache: NodePathCache,
    point_path_cache: PointPathCache,
    scratch: astar::SearchScratch,
    spatial: Option<SpatialGrid>,
    spatial_dirty: bool,
    config: EngineConfig,
}

impl PathEngine {
    /// Allocate all arrays and caches. Never fails; `heap_pool_block_size`
    /// is silently clamped to `max_nodes`.
    pub fn new(mut config: EngineConfig) -> Self {
        config.heap_pool_block_size = config.heap_pool_block_size.min(config.max_nodes).max(1);

        let graph = GraphStore::new(config.max_nodes, config.max_edges_per_node);
        let heap_pool = HeapPool::new(config.max_nodes);
        let distance_cache = DistanceCache::new(config.max_nodes);
        let node_path_cache = NodePathCache::new(
            config.node_path_cache_capacity,
            config.max_cache_path_length,
        );
        let point_path_cache = PointPathCache::new(
            config.point_path_cache_capacity,
            config.max_cache_path_length,
        );
        let scratch = astar::SearchScratch::new(config.max_nodes);

        tracing::info!(
            max_nodes = config.max_nodes,
            max_edges_per_node = config.max_edges_per_node,
            heap_pool_block_size = config.heap_pool_block_size,
            "engine initialized"
        );

        PathEngine {
            graph,
            heap_pool,
            distance_cache,
            node_path_cache,
            point_path_cache,
            scratch,
            spatial: None,
            spatial_dirty: true,
            config,
        }
    }

    /// Irrecoverable transition; consumes the engine. There is nothing to
    /// flush (no persistence in scope), so this exists for symmetry with
    /// spec.md's `init`/`shutdown` pairing and to give callers an explicit
    /// point to drop the instance.
    pub fn shutdown(self) {
        tracing::info!("engine shutdown");
    }

    // ---- Graph mutation -------------------------------------------------

    pub fn add_node(&mut self, pos: Position) -> Result<NodeId, PathStatus> {
        let id = self.graph.add_node(pos)?;
        self.spatial_dirty = true;
        Ok(id)
    }

    /// Silently ignores invalid/inactive ids, per spec.md §6.
    pub fn move_node(&mut self, id: NodeId, pos: Position) {
        if self.graph.move_node(id, pos) {
            self.distance_cache.invalidate(id);
            self.spatial_dirty = true;
        }
    }

    /// Silently ignores invalid/inactive ids.
    pub fn remove_node(&mut self, id: NodeId) {
        let was_active = self.graph.is_active(id);
        let touched = self.graph.remove_node(id);
        if was_active {
            self.spatial_dirty = true;
        }
        self.distance_cache.invalidate(id);
        for n in touched {
            self.distance_cache.invalidate(n);
        }
    }

    /// Insert a transient node at `at`, connected to nearest-edge endpoints
    /// `(u, v)`. On success the node and its edges remain in the graph
    /// until [`remove_virtual_node`](Self::remove_virtual_node) is called —
    /// unlike [`projection::VirtualNode`]'s own RAII guard, this doesn't
    /// hold a borrow across the call, because the engine needs `&mut
    /// self.graph` free again immediately to run the search that follows.
    /// [`projection::VirtualNode::insert`] still performs the connect and
    /// rollback-on-failure; this just releases its guard early via
    /// `mem::forget` and takes over cleanup explicitly.
    fn insert_virtual_node(&mut self, at: Position, u: NodeId, v: NodeId) -> Result<NodeId, PathStatus> {
        let vnode = VirtualNode::insert(&mut self.graph, at, u, v)?;
        let id = vnode.id();
        std::mem::forget(vnode);
        self.spatial_dirty = true;
        Ok(id)
    }

    fn remove_virtual_node(&mut self, id: NodeId) {
        self.remove_node(id);
    }

    pub fn add_edge(
        &mut self,
        u: NodeId,
        v: NodeId,
        cost: f32,
        bidirectional: bool,
    ) -> Result<(), PathStatus> {
        self.graph.add_edge(u, v, cost, bidirectional)?;
        self.spatial_dirty = true;
        Ok(())
    }

    pub fn remove_edge(&mut self, u: NodeId, v: NodeId) {
        self.graph.remove_edge(u, v);
        self.spatial_dirty = true;
    }

    pub fn get_node_position(&self, id: NodeId) -> Option<Position> {
        self.graph.get_node_position(id)
    }

    pub fn get_node_edges(
        &self,
        id: NodeId,
        include_bidirectional: bool,
        include_incoming: bool,
    ) -> Vec<EdgeView> {
        self.graph.get_edges_of(id, include_bidirectional, include_incoming)
    }

    pub fn active_node_count(&self) -> usize {
        self.graph.active_node_count()
    }

    // ---- Node-to-node pathfinding ----------------------------------------

    /// Consult the path cache; on miss, run A* (with the `GraphChanged`
    /// retry protocol) and cache the result. `max_path` only sizes the
    /// returned vector's expected capacity — per spec.md §9's Open
    /// Question, this implementation never truncates; the full path is
    /// always returned or an error status is, never a partial one.
    pub fn find_path(&mut self, start: NodeId, goal: NodeId, max_path: usize) -> PathResult {
        if start == goal && self.graph.is_active(start) {
            return PathResult {
                path: Vec::new(),
                status: PathStatus::StartGoalNodeSame,
                cost: 0.0,
            };
        }

        if let Some((path, cost, ())) = self.node_path_cache.get((start, goal), &self.graph) {
            return PathResult {
                status: PathStatus::Success,
                path,
                cost,
            };
        }

        let result = self.run_astar_with_retry(start, goal, self.config.heap_pool_block_size);
        if result.status == PathStatus::Success {
            self.node_path_cache
                .insert((start, goal), &result.path, result.cost, (), &self.graph);
        }

        let mut path = result.path;
        if max_path > path.len() {
            path.reserve(max_path - path.len());
        }
        PathResult {
            path,
            status: result.status,
            cost: result.cost,
        }
    }

    /// Runs A* once; on `GraphChanged`, retries up to
    /// `MAX_GRAPH_CHANGED_RETRIES` times before surfacing
    /// `GraphChangedTooOften`. The heap pool's LIFO discipline makes this
    /// safe to call re-entrantly (a retry is a nested acquire/release of
    /// the same pool).
    fn run_astar_with_retry(
        &mut self,
        start: NodeId,
        goal: NodeId,
        heap_block_size: usize,
    ) -> astar::SearchResult {
        // Silently clamp, same as `init`'s heap_pool_block_size: any search
        // budget is meaningless beyond the pool's total capacity.
        let heap_block_size = heap_block_size.min(self.heap_pool.capacity()).max(1);
        Self::retry_loop(MAX_GRAPH_CHANGED_RETRIES, || {
            astar::search(
                &self.graph,
                &mut self.distance_cache,
                &mut self.heap_pool,
                &mut self.scratch,
                start,
                goal,
                heap_block_size,
            )
        })
    }

    /// The retry-up-to-N-times-then-give-up machinery spec.md describes for
    /// `GRAPH_CHANGED`, factored out as pure control flow over an injected
    /// `attempt` closure so it can be unit-tested without needing to
    /// actually race a mutation against a live search (this engine has no
    /// concurrency to race — see DESIGN.md).
    fn retry_loop(
        max_retries: u32,
        mut attempt: impl FnMut() -> astar::SearchResult,
    ) -> astar::SearchResult {
        for n in 0..max_retries {
            let result = attempt();
            if result.status != PathStatus::GraphChanged {
                return result;
            }
            tracing::debug!(attempt = n, "graph changed during search, retrying");
        }
        astar::SearchResult {
            status: PathStatus::GraphChangedTooOften,
            path: Vec::new(),
            cost: 0.0,
        }
    }

    // ---- Spatial index ----------------------------------------------------

    fn spatial_enabled(&self) -> bool {
        self.config
            .spatial_index_enabled
            .unwrap_or_else(|| self.graph.active_node_count() >= SPATIAL_AUTO_THRESHOLD)
    }

    fn ensure_spatial(&mut self) {
        if !self.spatial_enabled() {
            return;
        }
        if self.spatial_dirty || self.spatial.is_none() {
            self.spatial = Some(SpatialGrid::build(&self.graph, self.config.spatial_index));
            self.spatial_dirty = false;
        }
    }

    fn nearest_edge(&mut self, p: Position) -> Option<(NodeId, NodeId, Position)> {
        self.ensure_spatial();
        match &self.spatial {
            Some(grid) => grid.query_nearest_edge(p, &self.graph),
            None => Self::full_scan_nearest_edge(&self.graph, p),
        }
    }

    fn full_scan_nearest_edge(graph: &GraphStore, p: Position) -> Option<(NodeId, NodeId, Position)> {
        let mut best: Option<(NodeId, NodeId, Position, f32)> = None;
        for id in graph.active_node_ids() {
            for e in graph.get_edges_of(id, true, false) {
                let from = graph.get_node_position(e.from)?;
                let to = graph.get_node_position(e.to)?;
                let (proj, dist_sq) = position::project_onto_segment(p, from, to);
                if best.map_or(true, |(_, _, _, d)| dist_sq < d) {
                    best = Some((e.from, e.to, proj, dist_sq));
                }
            }
        }
        best.map(|(from, to, proj, _)| (from, to, proj))
    }

    // ---- Projected pathfinding --------------------------------------------

    /// Project `point` onto the nearest edge, insert a transient node there,
    /// route to `goal`, then remove the transient node on every exit path.
    pub fn find_path_projected_from_point(
        &mut self,
        point: Position,
        goal: NodeId,
        max_path: usize,
        virtual_max_path: usize,
    ) -> ProjectedPathResult {
        let key: PointKey = {
            let (qx, qy) = quantize_point(point);
            (qx, qy, goal)
        };

        if let Some((path, cost, entry)) = self.point_path_cache.get(key, &self.graph) {
            return ProjectedPathResult {
                status: PathStatus::Success,
                path,
                cost,
                entry_point: Some(entry),
                exit_point: None,
            };
        }

        let Some((u, v, proj)) = self.nearest_edge(point) else {
            return ProjectedPathResult {
                status: PathStatus::NoProjection,
                ..Default::default()
            };
        };

        let virtual_id = match self.insert_virtual_node(proj, u, v) {
            Ok(id) => id,
            Err(status) => return ProjectedPathResult { status, ..Default::default() },
        };

        let inner = self.run_astar_with_retry(virtual_id, goal, virtual_max_path);
        self.remove_virtual_node(virtual_id);

        if inner.status != PathStatus::Success {
            return ProjectedPathResult {
                status: inner.status,
                ..Default::default()
            };
        }

        // Drop the virtual node from the front of the reconstructed path —
        // the caller receives its entry point separately, not as a node id.
        let mut path: Vec<NodeId> = inner.path.into_iter().skip(1).collect();

        self.point_path_cache
            .insert(key, &path, inner.cost, proj, &self.graph);

        if max_path > path.len() {
            path.reserve(max_path - path.len());
        }
        ProjectedPathResult {
            path,
            status: PathStatus::Success,
            cost: inner.cost,
            entry_point: Some(proj),
            exit_point: None,
        }
    }

    /// Symmetric projected query: `start` is either an existing node or an
    /// arbitrary point; `end_point` is always projected. Two transient
    /// nodes may be inserted (one per projected endpoint); both are removed
    /// on every exit path.
    pub fn find_path_projected_with_exit(
        &mut self,
        start: Endpoint,
        end_point: Position,
        max_path: usize,
    ) -> ProjectedPathResult {
        let virtual_max_path = DEFAULT_VIRTUAL_MAX_PATH;

        let Some((eu, ev, exit_proj)) = self.nearest_edge(end_point) else {
            return ProjectedPathResult {
                status: PathStatus::NoProjection,
                ..Default::default()
            };
        };

        let exit_id = match self.insert_virtual_node(exit_proj, eu, ev) {
            Ok(id) => id,
            Err(status) => return ProjectedPathResult { status, ..Default::default() },
        };

        let (start_id, entry_point, start_vnode_id) = match start {
            Endpoint::Node(id) => (id, None, None),
            Endpoint::Point(p) => {
                let Some((su, sv, entry_proj)) = self.nearest_edge(p) else {
                    self.remove_virtual_node(exit_id);
                    return ProjectedPathResult {
                        status: PathStatus::NoProjection,
                        ..Default::default()
                    };
                };
                match self.insert_virtual_node(entry_proj, su, sv) {
                    Ok(id) => (id, Some(entry_proj), Some(id)),
                    Err(status) => {
                        self.remove_virtual_node(exit_id);
                        return ProjectedPathResult { status, ..Default::default() };
                    }
                }
            }
        };

        let inner = self.run_astar_with_retry(start_id, exit_id, virtual_max_path);

        self.remove_virtual_node(exit_id);
        if let Some(id) = start_vnode_id {
            self.remove_virtual_node(id);
        }

        if inner.status != PathStatus::Success {
            return ProjectedPathResult {
                status: inner.status,
                ..Default::default()
            };
        }

        let mut path = inner.path;
        // Strip whichever endpoints were virtual: the exit is always last;
        // the start is virtual only for `Endpoint::Point`.
        path.pop();
        if start_vnode_id.is_some() {
            path.remove(0);
        }

        if max_path > path.len() {
            path.reserve(max_path - path.len());
        }
        ProjectedPathResult {
            path,
            status: PathStatus::Success,
            cost: inner.cost,
            entry_point,
            exit_point: Some(exit_proj),
        }
    }

    // ---- Introspection ------------------------------------------------

    pub fn cache_stats(&self) -> EngineCacheStats {
        let (cells, occupied, max_per_cell) = match &self.spatial {
            Some(g) => (g.cell_count(), g.occupied_cell_count(), g.max_edges_per_cell()),
            None => (0, 0, 0),
        };
        EngineCacheStats {
            node_path_cache: self.node_path_cache.stats(),
            point_path_cache: self.point_path_cache.stats(),
            distance_cache_size: self.distance_cache.len(),
            distance_cache_hits: self.distance_cache.hits(),
            distance_cache_misses: self.distance_cache.misses(),
            spatial_cell_count: cells,
            spatial_occupied_cells: occupied,
            spatial_max_edges_per_cell: max_per_cell,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(max_nodes: usize) -> PathEngine {
        PathEngine::new(EngineConfig {
            max_nodes,
            max_edges_per_node: 8,
            heap_pool_block_size: max_nodes,
            max_cache_path_length: 64,
            node_path_cache_capacity: 32,
            point_path_cache_capacity: 32,
            spatial_index_enabled: None,
            spatial_index: SpatialGridConfig::default(),
        })
    }

    #[test]
    fn straight_chain_scenario_a() {
        let mut e = engine(8);
        let ids: Vec<_> = [(0.0, 0.0), (10.0, 0.0), (20.0, 0.0), (30.0, 0.0)]
            .iter()
            .map(|&(x, y)| e.add_node(Position::new(x, y)).unwrap())
            .collect();
        for w in ids.windows(2) {
            e.add_edge(w[0], w[1], 10.0, true).unwrap();
        }

        let result = e.find_path(ids[0], ids[3], 16);
        assert_eq!(result.status, PathStatus::Success);
        assert_eq!(result.path, ids);
        assert!((result.cost - 30.0).abs() < 1e-3);
    }

    #[test]
    fn diamond_scenario_b() {
        let mut e = engine(8);
        let a = e.add_node(Position::new(0.0, 0.0)).unwrap();
        let b = e.add_node(Position::new(10.0, 10.0)).unwrap();
        let c = e.add_node(Position::new(10.0, -10.0)).unwrap();
        let d = e.add_node(Position::new(20.0, 0.0)).unwrap();
        e.add_edge(a, b, 14.14, true).unwrap();
        e.add_edge(a, c, 14.14, true).unwrap();
        e.add_edge(b, d, 14.14, true).unwrap();
        e.add_edge(c, d, 14.14, true).unwrap();

        let result = e.find_path(a, d, 16);
        assert_eq!(result.status, PathStatus::Success);
        assert_eq!(result.path.len(), 3);
        assert!((result.cost - 28.28).abs() < 0.1);
    }

    #[test]
    fn projected_query_scenario_c() {
        let mut e = engine(8);
        let n1 = e.add_node(Position::new(0.0, 0.0)).unwrap();
        let n2 = e.add_node(Position::new(100.0, 0.0)).unwrap();
        e.add_edge(n1, n2, 100.0, true).unwrap();

        let before_nodes = e.active_node_count();
        let before_edges_n1 = e.get_node_edges(n1, true, false).len();

        let result = e.find_path_projected_from_point(Position::new(50.0, 5.0), n2, 16, 64);
        assert_eq!(result.status, PathStatus::Success);
        assert_eq!(result.path, vec![n2]);
        let entry = result.entry_point.unwrap();
        assert!((entry.x - 50.0).abs() < 1.0);
        assert!((entry.y - 0.0).abs() < 1e-3);
        assert!((result.cost - 50.0).abs() < 1.0);

        assert_eq!(e.active_node_count(), before_nodes);
        assert_eq!(e.get_node_edges(n1, true, false).len(), before_edges_n1);
    }

    #[test]
    fn node_full_scenario_d() {
        let mut e = engine(2);
        e.add_node(Position::new(0.0, 0.0)).unwrap();
        e.add_node(Position::new(1.0, 0.0)).unwrap();
        assert_eq!(
            e.add_node(Position::new(2.0, 0.0)),
            Err(PathStatus::NodeFull)
        );
        assert_eq!(e.active_node_count(), 2);
    }

    #[test]
    fn no_projection_on_empty_graph_scenario_f() {
        let mut e = engine(4);
        let result = e.find_path_projected_from_point(Position::ZERO, NodeId(0), 16, 64);
        assert_eq!(result.status, PathStatus::NoProjection);
    }

    #[test]
    fn repeated_find_path_hits_cache() {
        let mut e = engine(8);
        let a = e.add_node(Position::new(0.0, 0.0)).unwrap();
        let b = e.add_node(Position::new(10.0, 0.0)).unwrap();
        e.add_edge(a, b, 10.0, true).unwrap();

        let first = e.find_path(a, b, 16);
        assert_eq!(first.status, PathStatus::Success);
        let second = e.find_path(a, b, 16);
        assert_eq!(second.path, first.path);
        assert_eq!(e.cache_stats().node_path_cache.hits, 1);
    }

    #[test]
    fn moving_a_node_on_the_cached_path_invalidates_it() {
        let mut e = engine(8);
        let a = e.add_node(Position::new(0.0, 0.0)).unwrap();
        let b = e.add_node(Position::new(10.0, 0.0)).unwrap();
        let c = e.add_node(Position::new(20.0, 0.0)).unwrap();
        e.add_edge(a, b, 10.0, true).unwrap();
        e.add_edge(b, c, 10.0, true).unwrap();

        let first = e.find_path(a, c, 16);
        assert_eq!(first.status, PathStatus::Success);

        e.move_node(b, Position::new(10.0, 100.0));
        let stats_before = e.cache_stats().node_path_cache.misses;
        let second = e.find_path(a, c, 16);
        assert_eq!(second.status, PathStatus::Success);
        assert_eq!(e.cache_stats().node_path_cache.misses, stats_before + 1);
    }

    #[test]
    fn start_equals_goal_is_reported_directly() {
        let mut e = engine(4);
        let a = e.add_node(Position::new(0.0, 0.0)).unwrap();
        let result = e.find_path(a, a, 16);
        assert_eq!(result.status, PathStatus::StartGoalNodeSame);
        assert!(result.path.is_empty());
    }

    // Scenario E (persistent GRAPH_CHANGED): this engine has no concurrency
    // to race a real mutation against a live search, so the retry cap is
    // exercised directly against `retry_loop` with an injected attempt that
    // always reports `GraphChanged`. See DESIGN.md for why this is the
    // chosen shape for that scenario.
    #[test]
    fn retry_loop_gives_up_after_max_retries() {
        let mut calls = 0u32;
        let result = PathEngine::retry_loop(MAX_GRAPH_CHANGED_RETRIES, || {
            calls += 1;
            astar::SearchResult {
                status: PathStatus::GraphChanged,
                path: Vec::new(),
                cost: 0.0,
            }
        });
        assert_eq!(calls, MAX_GRAPH_CHANGED_RETRIES);
        assert_eq!(result.status, PathStatus::GraphChangedTooOften);
    }

    #[test]
    fn retry_loop_returns_first_non_graph_changed_result() {
        let mut calls = 0u32;
        let result = PathEngine::retry_loop(MAX_GRAPH_CHANGED_RETRIES, || {
            calls += 1;
            if calls < 2 {
                astar::SearchResult {
                    status: PathStatus::GraphChanged,
                    path: Vec::new(),
                    cost: 0.0,
                }
            } else {
                astar::SearchResult {
                    status: PathStatus::Success,
                    path: vec![NodeId(0)],
                    cost: 1.0,
                }
            }
        });
        assert_eq!(calls, 2);
        assert_eq!(result.status, PathStatus::Success);
    }

    #[test]
    fn exit_projection_roundtrip_leaves_graph_unchanged() {
        let mut e = engine(8);
        let n1 = e.add_node(Position::new(0.0, 0.0)).unwrap();
        let n2 = e.add_node(Position::new(100.0, 0.0)).unwrap();
        e.add_edge(n1, n2, 100.0, true).unwrap();
        let before_nodes = e.active_node_count();

        let result =
            e.find_path_projected_with_exit(Endpoint::Node(n1), Position::new(60.0, 5.0), 16);
        assert_eq!(result.status, PathStatus::Success);
        assert_eq!(result.path.first().copied(), Some(n1));
        assert!(result.exit_point.is_some());
        assert_eq!(e.active_node_count(), before_nodes);
    }

    #[test]
    fn removing_a_node_invalidates_its_distance_cache_entries() {
        let mut e = engine(8);
        let a = e.add_node(Position::new(0.0, 0.0)).unwrap();
        let b = e.add_node(Position::new(10.0, 0.0)).unwrap();
        e.add_edge(a, b, 10.0, true).unwrap();

        let first = e.find_path(a, b, 16);
        assert_eq!(first.status, PathStatus::Success);

        e.remove_node(b);
        assert_eq!(e.get_node_position(b), None);
        // A fresh node reusing slot b's identity must not see stale cache state.
        let c = e.add_node(Position::new(10.0, 0.0)).unwrap();
        e.add_edge(a, c, 10.0, true).unwrap();
        let result = e.find_path(a, c, 16);
        assert_eq!(result.status, PathStatus::Success);
    }
}
