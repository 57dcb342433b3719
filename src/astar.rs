//! A* search over the flat graph store, using the pooled min-heap and the
//! distance cache for the heuristic.
//!
//! Per-search scratch (`g_score`, `came_from`, `closed`) is a single
//! pre-allocated array reused across searches. Instead of zeroing it before
//! every call (`O(max_nodes)`), each slot is stamped with a generation
//! counter on first touch this search, the same technique
//! `nbg_ch::query::NbgChQuery` uses for its forward/backward distance
//! arrays — validity is "was this slot touched in the current generation",
//! which makes reset `O(1)` and lookups `O(visited)`.

use crate::cache::DistanceCache;
use crate::error::PathStatus;
use crate::graph::{GraphStore, GraphVersion, NodeId};
use crate::heap::{HeapEntry, HeapPool};

#[derive(Clone, Copy)]
struct Scratch {
    generation: u32,
    g_score: f32,
    came_from: NodeId,
    closed: bool,
}

impl Default for Scratch {
    fn default() -> Self {
        Scratch {
            generation: 0,
            g_score: f32::INFINITY,
            came_from: NodeId::SENTINEL,
            closed: false,
        }
    }
}

/// Pre-allocated per-search state, owned by the engine and reused across
/// every `find_path` call.
pub struct SearchScratch {
    slots: Vec<Scratch>,
    generation: u32,
}

impl SearchScratch {
    pub fn new(max_nodes: usize) -> Self {
        SearchScratch {
            slots: vec![Scratch::default(); max_nodes],
            generation: 0,
        }
    }

    fn begin(&mut self) {
        self.generation += 1;
    }

    fn touch(&mut self, id: NodeId) -> &mut Scratch {
        let slot = &mut self.slots[id.index()];
        if slot.generation != self.generation {
            *slot = Scratch {
                generation: self.generation,
                ..Scratch::default()
            };
        }
        slot
    }

    fn g_score(&self, id: NodeId) -> f32 {
        let slot = &self.slots[id.index()];
        if slot.generation == self.generation {
            slot.g_score
        } else {
            f32::INFINITY
        }
    }

    fn is_closed(&self, id: NodeId) -> bool {
        let slot = &self.slots[id.index()];
        slot.generation == self.generation && slot.closed
    }
}

/// Outcome of one A* invocation: status plus, on success, the reconstructed
/// path (inclusive of start and goal) and its total cost.
pub struct SearchResult {
    pub status: PathStatus,
    pub path: Vec<NodeId>,
    pub cost: f32,
}

/// Run A* once against the graph's current version. Returns `GraphChanged`
/// as soon as a version mismatch is observed mid-search; the caller (the
/// engine's `find_path`) is responsible for the retry-up-to-3 protocol.
pub fn search(
    graph: &GraphStore,
    distance_cache: &mut DistanceCache,
    heap_pool: &mut HeapPool,
    scratch: &mut SearchScratch,
    start: NodeId,
    goal: NodeId,
    heap_block_size: usize,
) -> SearchResult {
    let empty = || SearchResult {
        status: PathStatus::NoPath,
        path: Vec::new(),
        cost: 0.0,
    };

    if !graph.is_active(start) {
        return SearchResult {
            status: PathStatus::StartNodeInvalid,
            ..empty()
        };
    }
    if !graph.is_active(goal) {
        return SearchResult {
            status: PathStatus::GoalNodeInvalid,
            ..empty()
        };
    }
    if start == goal {
        return SearchResult {
            status: PathStatus::StartGoalNodeSame,
            path: Vec::new(),
            cost: 0.0,
        };
    }

    let snap: GraphVersion = graph.version();

    let mut heap = match heap_pool.acquire(heap_block_size) {
        Ok(h) => h,
        Err(status) => return SearchResult { status, ..empty() },
    };

    scratch.begin();
    let h = |dc: &mut DistanceCache, a: NodeId, b: NodeId| dc.get_or_compute(a, b, graph.positions());

    scratch.touch(start).g_score = 0.0;
    let start_h = h(distance_cache, start, goal);
    if heap
        .push(HeapEntry {
            node: start,
            f_score: start_h,
        })
        .is_err()
    {
        return SearchResult {
            status: PathStatus::HeapFull,
            ..empty()
        };
    }

    while let Some(top) = heap.pop() {
        let current = top.node;
        if scratch.is_closed(current) {
            continue;
        }

        if current == goal {
            return SearchResult {
                status: PathStatus::Success,
                cost: scratch.g_score(goal),
                path: reconstruct(scratch, start, goal),
            };
        }

        scratch.touch(current).closed = true;

        if graph.version() != snap {
            return SearchResult {
                status: PathStatus::GraphChanged,
                ..empty()
            };
        }

        let current_g = scratch.g_score(current);
        let edges: Vec<(NodeId, f32)> = graph.outgoing(current).collect();
        for (v, cost) in edges {
            let tentative = current_g + cost;
            if tentative < scratch.g_score(v) {
                scratch.touch(v).g_score = tentative;
                scratch.touch(v).came_from = current;
                let f = tentative + h(distance_cache, v, goal);
                if heap.push(HeapEntry { node: v, f_score: f }).is_err() {
                    return SearchResult {
                        status: PathStatus::HeapFull,
                        ..empty()
                    };
                }
            }
        }
    }

    SearchResult {
        status: PathStatus::NoPath,
        ..empty()
    }
}

fn reconstruct(scratch: &SearchScratch, start: NodeId, goal: NodeId) -> Vec<NodeId> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        current = scratch.slots[current.index()].came_from;
        path.push(current);
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;

    fn chain() -> GraphStore {
        let mut g = GraphStore::new(8, 4);
        let ids: Vec<_> = (0..4)
            .map(|i| g.add_node(Position::new(i as f32 * 10.0, 0.0)).unwrap())
            .collect();
        for w in ids.windows(2) {
            g.add_edge(w[0], w[1], 10.0, true).unwrap();
        }
        g
    }

    #[test]
    fn finds_shortest_chain_path() {
        let g = chain();
        let mut dc = DistanceCache::new(8);
        let mut pool = HeapPool::new(8);
        let mut scratch = SearchScratch::new(8);

        let result = search(&g, &mut dc, &mut pool, &mut scratch, NodeId(0), NodeId(3), 8);
        assert_eq!(result.status, PathStatus::Success);
        assert_eq!(result.path, vec![NodeId(0), NodeId(1), NodeId(2), NodeId(3)]);
        assert!((result.cost - 30.0).abs() < 1e-3);
    }

    #[test]
    fn same_start_and_goal() {
        let g = chain();
        let mut dc = DistanceCache::new(8);
        let mut pool = HeapPool::new(8);
        let mut scratch = SearchScratch::new(8);
        let result = search(&g, &mut dc, &mut pool, &mut scratch, NodeId(0), NodeId(0), 8);
        assert_eq!(result.status, PathStatus::StartGoalNodeSame);
        assert!(result.path.is_empty());
    }

    #[test]
    fn unreachable_goal_is_no_path() {
        let mut g = chain();
        let isolated = g.add_node(Position::new(1000.0, 1000.0)).unwrap();
        let mut dc = DistanceCache::new(8);
        let mut pool = HeapPool::new(8);
        let mut scratch = SearchScratch::new(8);
        let result = search(&g, &mut dc, &mut pool, &mut scratch, NodeId(0), isolated, 8);
        assert_eq!(result.status, PathStatus::NoPath);
    }

    #[test]
    fn invalid_start_or_goal() {
        let g = chain();
        let mut dc = DistanceCache::new(8);
        let mut pool = HeapPool::new(8);
        let mut scratch = SearchScratch::new(8);
        let result = search(&g, &mut dc, &mut pool, &mut scratch, NodeId(7), NodeId(0), 8);
        assert_eq!(result.status, PathStatus::StartNodeInvalid);

        let result = search(&g, &mut dc, &mut pool, &mut scratch, NodeId(0), NodeId(7), 8);
        assert_eq!(result.status, PathStatus::GoalNodeInvalid);
    }

    #[test]
    fn heap_full_is_surfaced() {
        // A star: expanding the center pushes both leaves onto the frontier
        // in one go, so a size-1 heap block overflows on the second push.
        let mut g = GraphStore::new(8, 4);
        let center = g.add_node(Position::new(0.0, 0.0)).unwrap();
        let leaf_a = g.add_node(Position::new(10.0, 0.0)).unwrap();
        let leaf_b = g.add_node(Position::new(0.0, 10.0)).unwrap();
        let goal = g.add_node(Position::new(100.0, 100.0)).unwrap();
        g.add_edge(center, leaf_a, 10.0, false).unwrap();
        g.add_edge(center, leaf_b, 10.0, false).unwrap();

        let mut dc = DistanceCache::new(8);
        let mut pool = HeapPool::new(8);
        let mut scratch = SearchScratch::new(8);
        let result = search(&g, &mut dc, &mut pool, &mut scratch, center, goal, 1);
        assert_eq!(result.status, PathStatus::HeapFull);
    }

    #[test]
    fn diamond_optimal_cost() {
        let mut g = GraphStore::new(8, 4);
        let a = g.add_node(Position::new(0.0, 0.0)).unwrap();
        let b = g.add_node(Position::new(10.0, 10.0)).unwrap();
        let c = g.add_node(Position::new(10.0, -10.0)).unwrap();
        let d = g.add_node(Position::new(20.0, 0.0)).unwrap();
        g.add_edge(a, b, 14.14, true).unwrap();
        g.add_edge(a, c, 14.14, true).unwrap();
        g.add_edge(b, d, 14.14, true).unwrap();
        g.add_edge(c, d, 14.14, true).unwrap();

        let mut dc = DistanceCache::new(8);
        let mut pool = HeapPool::new(8);
        let mut scratch = SearchScratch::new(8);
        let result = search(&g, &mut dc, &mut pool, &mut scratch, a, d, 8);
        assert_eq!(result.status, PathStatus::Success);
        assert_eq!(result.path.len(), 3);
        assert!((result.cost - 28.28).abs() < 0.1);
    }
}
