//! LRU path caches keyed by versioned graph state.
//!
//! Both the node-to-node and point-to-node tables are the same generic
//! structure: a fixed-capacity slab of entries threaded through an
//! intrusive doubly-linked LRU list (prev/next stored inline — a plain
//! `std::collections::LinkedList` can't move an arbitrary interior node to
//! the front in O(1)), indexed by an `FxHashMap` from key to slot.
//!
//! Validity is checked lazily at lookup time against the live graph (the
//! simpler of the two strategies spec.md allows — see DESIGN.md): a hit
//! requires the entry's edge-version snapshot to match the graph's current
//! edge version, and every node referenced by the stored path to still be
//! active with its per-node version unchanged.

use rustc_hash::FxHashMap;
use std::hash::Hash;

use crate::graph::{GraphStore, NodeId};
use crate::position::Position;

const NIL: usize = usize::MAX;

struct Slot<K, E> {
    key: Option<K>,
    nodes: Vec<NodeId>,
    node_versions: Vec<u32>,
    edge_version_snapshot: u64,
    cost: f32,
    extra: E,
    prev: usize,
    next: usize,
}

/// Introspection snapshot for one cache table.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Generic fixed-capacity LRU table backing both path-cache flavors.
/// `E` carries the flavor-specific extra payload (`()` for node-to-node,
/// [`Position`] — the entry projection point — for point-to-node).
pub struct LruPathTable<K, E> {
    slots: Vec<Slot<K, E>>,
    index: FxHashMap<K, usize>,
    head: usize,
    tail: usize,
    free: Vec<usize>,
    capacity: usize,
    max_path_length: usize,
    hits: u64,
    misses: u64,
}

impl<K: Copy + Eq + Hash, E: Clone + Default> LruPathTable<K, E> {
    pub fn new(capacity: usize, max_path_length: usize) -> Self {
        LruPathTable {
            slots: Vec::with_capacity(capacity),
            index: FxHashMap::default(),
            head: NIL,
            tail: NIL,
            free: Vec::new(),
            capacity,
            max_path_length,
            hits: 0,
            misses: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.index.len(),
            capacity: self.capacity(),
            hits: self.hits,
            misses: self.misses,
        }
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        if prev != NIL {
            self.slots[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.slots[next].prev = prev;
        } else {
            self.tail = prev;
        }
        self.slots[idx].prev = NIL;
        self.slots[idx].next = NIL;
    }

    fn push_front(&mut self, idx: usize) {
        self.slots[idx].prev = NIL;
        self.slots[idx].next = self.head;
        if self.head != NIL {
            self.slots[self.head].prev = idx;
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }

    fn touch(&mut self, idx: usize) {
        if self.head == idx {
            return;
        }
        self.detach(idx);
        self.push_front(idx);
    }

    fn remove_slot(&mut self, idx: usize) {
        if let Some(key) = self.slots[idx].key.take() {
            self.index.remove(&key);
        }
        self.detach(idx);
        self.free.push(idx);
    }

    /// Look up `key`; on a version-consistent hit, bump LRU recency and
    /// return the cached path, its total cost, and its extra payload. On
    /// any mismatch the entry is invalidated in place (counted as a miss).
    pub fn get(&mut self, key: K, graph: &GraphStore) -> Option<(Vec<NodeId>, f32, E)> {
        let idx = *self.index.get(&key)?;

        if !self.is_consistent(idx, graph) {
            self.remove_slot(idx);
            self.misses += 1;
            return None;
        }

        self.touch(idx);
        self.hits += 1;
        Some((
            self.slots[idx].nodes.clone(),
            self.slots[idx].cost,
            self.slots[idx].extra.clone(),
        ))
    }

    fn is_consistent(&self, idx: usize, graph: &GraphStore) -> bool {
        let slot = &self.slots[idx];
        if slot.edge_version_snapshot != graph.version().edge_version {
            return false;
        }
        slot.nodes.iter().zip(slot.node_versions.iter()).all(|(&n, &v)| {
            graph.is_active(n) && graph.node_version_of(n) == v
        })
    }

    /// Insert or overwrite `key`. Refuses (silently) to cache paths longer
    /// than `max_path_length`; the caller still returns the full path, it
    /// just won't be served from cache next time. Evicts the LRU tail when
    /// at capacity and `key` is new.
    pub fn insert(&mut self, key: K, nodes: &[NodeId], cost: f32, extra: E, graph: &GraphStore) {
        if nodes.len() > self.max_path_length {
            return;
        }

        let node_versions: Vec<u32> = nodes.iter().map(|&n| graph.node_version_of(n)).collect();
        let edge_version_snapshot = graph.version().edge_version;

        if let Some(&idx) = self.index.get(&key) {
            self.slots[idx].nodes = nodes.to_vec();
            self.slots[idx].node_versions = node_versions;
            self.slots[idx].edge_version_snapshot = edge_version_snapshot;
            self.slots[idx].cost = cost;
            self.slots[idx].extra = extra;
            self.touch(idx);
            return;
        }

        let idx = if let Some(idx) = self.free.pop() {
            idx
        } else if self.slots.len() < self.capacity {
            self.slots.push(Slot {
                key: None,
                nodes: Vec::new(),
                node_versions: Vec::new(),
                edge_version_snapshot: 0,
                cost: 0.0,
                extra: E::default(),
                prev: NIL,
                next: NIL,
            });
            self.slots.len() - 1
        } else {
            // At capacity: evict LRU tail.
            let tail = self.tail;
            self.remove_slot(tail);
            tail
        };

        self.slots[idx] = Slot {
            key: Some(key),
            nodes: nodes.to_vec(),
            node_versions,
            edge_version_snapshot,
            cost,
            extra,
            prev: NIL,
            next: NIL,
        };
        self.index.insert(key, idx);
        self.push_front(idx);
    }
}

/// Node-to-node path cache key.
pub type NodeKey = (NodeId, NodeId);

/// Point-to-node path cache key: a quantized start position plus a goal id.
/// Quantization uses a small epsilon so a start position that drifts by
/// less than it still hits cache.
pub type PointKey = (i32, i32, NodeId);

pub const POINT_QUANTIZATION_EPSILON: f32 = 0.5;

pub fn quantize_point(p: Position) -> (i32, i32) {
    (
        (p.x / POINT_QUANTIZATION_EPSILON).round() as i32,
        (p.y / POINT_QUANTIZATION_EPSILON).round() as i32,
    )
}

pub type NodePathCache = LruPathTable<NodeKey, ()>;
pub type PointPathCache = LruPathTable<PointKey, Position>;
