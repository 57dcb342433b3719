//! Status taxonomy threaded through every fallible core operation.
//!
//! There are no exceptions in this engine: every public operation that can
//! fail returns a [`PathStatus`] alongside its (possibly empty) output. The
//! set is closed and exhaustive so callers can match on it without a
//! catch-all arm.

use thiserror::Error;

/// Closed, tagged outcome of a pathfinding or projection operation.
///
/// `Success` is a valid value of this type (not just the error variants) so
/// that `find_path` and friends can return `(usize, PathStatus)` uniformly.
/// Use [`PathStatus::into_result`] to fold `Success` into `Ok(())` when a
/// `Result`-shaped call site is more convenient.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStatus {
    #[error("success")]
    Success,

    #[error("no path exists between the given nodes")]
    NoPath,

    #[error("start and goal node are the same")]
    StartGoalNodeSame,

    #[error("start node is not active")]
    StartNodeInvalid,

    #[error("goal node is not active")]
    GoalNodeInvalid,

    #[error("graph is at max_nodes capacity")]
    NodeFull,

    #[error("source node's edge region is at max_edges_per_node capacity")]
    EdgeFull,

    #[error("heap pool exhausted for this search's frontier")]
    HeapFull,

    /// Reserved: this implementation treats `max_path` as size-only (see
    /// DESIGN.md's Open Question resolution) and never truncates, so this
    /// variant is never constructed today. Kept in the enum because
    /// spec.md lists it as part of the closed taxonomy.
    #[error("reconstructed path exceeded the caller's buffer")]
    PathTooLong,

    #[error("graph mutated during this search's traversal; retrying")]
    GraphChanged,

    #[error("graph changed too often during search; gave up after 3 retries")]
    GraphChangedTooOften,

    #[error("no edge found to project the query point onto")]
    NoProjection,

    #[error("could not allocate or connect a virtual node for projection")]
    VirtualNodeFailed,
}

impl PathStatus {
    /// True for the single non-error outcome.
    pub fn is_success(self) -> bool {
        matches!(self, PathStatus::Success)
    }

    /// Fold `Success` into `Ok(())`, everything else into `Err(self)`.
    pub fn into_result(self) -> Result<(), PathStatus> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }
}
