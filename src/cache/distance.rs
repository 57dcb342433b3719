//! Commutative-hashed cache of pairwise Euclidean node distances.
//!
//! Open addressing with linear probing (`MAX_PROBES` slots), sized to a
//! power of two so the slot mask is a single `&`. The hash mixes the pair
//! `(min(a, b), max(a, b))` so `h(a, b) == h(b, a)` — the table never stores
//! the same distance twice under two different slots. Each entry is also
//! linked into an intrusive per-node invalidation chain so a node's move or
//! removal only walks the entries that actually reference it.

use crate::graph::NodeId;
use crate::position::Position;

const MAX_PROBES: usize = 8;

#[derive(Debug, Clone, Copy)]
struct Slot {
    valid: bool,
    a: NodeId,
    b: NodeId,
    distance: f32,
    // Intrusive singly-linked invalidation chains: index of the next slot
    // in `a`'s chain and in `b`'s chain, or `NONE`.
    next_in_a_chain: u32,
    next_in_b_chain: u32,
}

const NONE: u32 = u32::MAX;

impl Default for Slot {
    fn default() -> Self {
        Slot {
            valid: false,
            a: NodeId::SENTINEL,
            b: NodeId::SENTINEL,
            distance: 0.0,
            next_in_a_chain: NONE,
            next_in_b_chain: NONE,
        }
    }
}

/// Fixed-capacity hash table of commutative pairwise distances.
pub struct DistanceCache {
    slots: Vec<Slot>,
    mask: u64,
    // head of each node's invalidation chain, indexed by NodeId
    chain_heads: Vec<u32>,
    hits: u64,
    misses: u64,
}

fn mix(a: u32, b: u32) -> u64 {
    let (lo, hi) = (a.min(b), a.max(b));
    let packed = ((lo as u64) << 32) | hi as u64;
    xxhash_rust::xxh3::xxh3_64(&packed.to_le_bytes())
}

fn next_power_of_two(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

impl DistanceCache {
    pub fn new(node_count: usize) -> Self {
        let size = next_power_of_two((node_count * 8).min(65536));
        DistanceCache {
            slots: vec![Slot::default(); size],
            mask: (size - 1) as u64,
            chain_heads: vec![NONE; node_count],
            hits: 0,
            misses: 0,
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.valid).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn probe_start(&self, a: NodeId, b: NodeId) -> usize {
        (mix(a.0, b.0) & self.mask) as usize
    }

    fn matches(slot: &Slot, a: NodeId, b: NodeId) -> bool {
        slot.valid && ((slot.a == a && slot.b == b) || (slot.a == b && slot.b == a))
    }

    /// Probe up to `MAX_PROBES` slots; on hit return the cached distance. On
    /// miss, compute via `positions`, cache it in the first empty probed
    /// slot, and link it into both nodes' chains. If every probed slot is
    /// occupied by an unrelated valid entry, fall through to a raw compute
    /// without caching this call.
    ///
    /// The degenerate sentinel node id returns 0 and is never cached.
    pub fn get_or_compute(&mut self, a: NodeId, b: NodeId, positions: &[Position]) -> f32 {
        if a.is_sentinel() || b.is_sentinel() {
            return 0.0;
        }

        let start = self.probe_start(a, b);
        let table_len = self.slots.len();

        for probe in 0..MAX_PROBES.min(table_len) {
            let idx = (start + probe) % table_len;
            if Self::matches(&self.slots[idx], a, b) {
                self.hits += 1;
                return self.slots[idx].distance;
            }
        }

        let dist = Self::compute(a, b, positions);
        self.misses += 1;

        for probe in 0..MAX_PROBES.min(table_len) {
            let idx = (start + probe) % table_len;
            if !self.slots[idx].valid {
                self.insert_at(idx, a, b, dist);
                return dist;
            }
        }

        // All probed slots full of unrelated valid entries: compute but
        // don't cache.
        dist
    }

    fn compute(a: NodeId, b: NodeId, positions: &[Position]) -> f32 {
        let pa = positions[a.index()];
        let pb = positions[b.index()];
        pa.distance_to(pb)
    }

    fn insert_at(&mut self, idx: usize, a: NodeId, b: NodeId, distance: f32) {
        self.slots[idx] = Slot {
            valid: true,
            a,
            b,
            distance,
            next_in_a_chain: self.chain_heads[a.index()],
            next_in_b_chain: self.chain_heads[b.index()],
        };
        self.chain_heads[a.index()] = idx as u32;
        self.chain_heads[b.index()] = idx as u32;
    }

    /// Walk `node_id`'s invalidation chain, marking every reached entry
    /// invalid, and unlink the chain.
    pub fn invalidate(&mut self, node_id: NodeId) {
        if node_id.index() >= self.chain_heads.len() {
            return;
        }
        let mut cur = self.chain_heads[node_id.index()];
        while cur != NONE {
            let slot = &mut self.slots[cur as usize];
            slot.valid = false;
            let next = if slot.a == node_id {
                slot.next_in_a_chain
            } else {
                slot.next_in_b_chain
            };
            cur = next;
        }
        self.chain_heads[node_id.index()] = NONE;
    }

    /// Allocate a new table sized for `new_node_count`. Valid entries are
    /// reinserted only if there are few enough to fit a small stack buffer
    /// (<= 1024); otherwise all entries are dropped (a resize is already an
    /// amortized-rare structural event).
    pub fn resize(&mut self, new_node_count: usize) {
        let valid: Vec<(NodeId, NodeId, f32)> = self
            .slots
            .iter()
            .filter(|s| s.valid)
            .map(|s| (s.a, s.b, s.distance))
            .collect();

        *self = DistanceCache::new(new_node_count);

        if valid.len() <= 1024 {
            for (a, b, dist) in valid {
                if a.index() >= self.chain_heads.len() || b.index() >= self.chain_heads.len() {
                    continue;
                }
                let start = self.probe_start(a, b);
                let table_len = self.slots.len();
                for probe in 0..MAX_PROBES.min(table_len) {
                    let idx = (start + probe) % table_len;
                    if !self.slots[idx].valid {
                        self.insert_at(idx, a, b, dist);
                        break;
                    }
                }
            }
        }
    }
}
