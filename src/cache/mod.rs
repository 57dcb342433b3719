//! Amortization layer: the pairwise distance cache and the two path caches.

pub mod distance;
pub mod path;

pub use distance::DistanceCache;
pub use path::{CacheStats, NodePathCache, NodeKey, PointKey, PointPathCache, LruPathTable};
