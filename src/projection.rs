//! Virtual-node protocol: inject a transient node at an arbitrary point so
//! A* can route from/to positions that aren't graph nodes.
//!
//! [`VirtualNode`] is a scope guard — it owns the `&mut GraphStore`
//! borrow for its lifetime and removes the transient node (and, by
//! `GraphStore::remove_node`'s own contract, every edge incident on it) on
//! every exit path, including early returns and panics during unwinding.
//! This is what spec.md means by "cleanup is bound to scope": there is no
//! separate cleanup call for callers to forget.

use crate::error::PathStatus;
use crate::graph::{GraphStore, NodeId};
use crate::position::Position;

/// An allocated-but-temporary node plus the edges connecting it to the
/// graph it was projected onto. Dropping it removes the node.
pub struct VirtualNode<'g> {
    graph: &'g mut GraphStore,
    id: NodeId,
}

impl<'g> VirtualNode<'g> {
    /// Allocate a node at `at` and connect it to the nearest edge's
    /// endpoints `(u, v)`. If `u -> v` is bidirectional, the virtual node
    /// gets bidirectional edges to both endpoints; if one-way, it only
    /// gets edges preserving that direction (`u -> virtual -> v`) so a
    /// one-way edge can't be routed backward through the projection.
    ///
    /// On any edge-allocation failure, all edges added so far and the node
    /// itself are rolled back (`remove_node` removes both) before
    /// returning the error.
    pub fn insert(graph: &'g mut GraphStore, at: Position, u: NodeId, v: NodeId) -> Result<Self, PathStatus> {
        let id = graph.add_node(at)?;

        let connect_result = Self::connect(graph, id, u, v);
        if let Err(status) = connect_result {
            graph.remove_node(id);
            return Err(status);
        }

        Ok(VirtualNode { graph, id })
    }

    fn connect(graph: &mut GraphStore, virtual_id: NodeId, u: NodeId, v: NodeId) -> Result<(), PathStatus> {
        let at = graph.get_node_position(virtual_id).ok_or(PathStatus::VirtualNodeFailed)?;
        let pu = graph.get_node_position(u).ok_or(PathStatus::VirtualNodeFailed)?;
        let pv = graph.get_node_position(v).ok_or(PathStatus::VirtualNodeFailed)?;
        let d_u = at.distance_to(pu);
        let d_v = at.distance_to(pv);

        if graph.is_bidirectional(u, v) {
            graph.add_edge(virtual_id, u, d_u, true)?;
            graph.add_edge(virtual_id, v, d_v, true)?;
        } else {
            graph.add_edge(u, virtual_id, d_u, false)?;
            graph.add_edge(virtual_id, v, d_v, false)?;
        }
        Ok(())
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn graph(&self) -> &GraphStore {
        self.graph
    }
}

impl Drop for VirtualNode<'_> {
    fn drop(&mut self) {
        self.graph.remove_node(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> GraphStore {
        let mut g = GraphStore::new(8, 4);
        let n1 = g.add_node(Position::new(0.0, 0.0)).unwrap();
        let n2 = g.add_node(Position::new(100.0, 0.0)).unwrap();
        g.add_edge(n1, n2, 100.0, true).unwrap();
        g
    }

    #[test]
    fn insert_connects_and_drop_cleans_up() {
        let mut g = chain();
        let (n1, n2) = (NodeId(0), NodeId(1));
        let before_count = g.active_node_count();

        {
            let vnode = VirtualNode::insert(&mut g, Position::new(50.0, 0.0), n1, n2).unwrap();
            assert_eq!(vnode.graph().active_node_count(), before_count + 1);
            let edges = vnode.graph().get_edges_of(vnode.id(), true, false);
            assert_eq!(edges.len(), 2);
        }

        assert_eq!(g.active_node_count(), before_count);
        assert_eq!(g.get_edges_of(n1, true, false).len(), 1);
        assert_eq!(g.get_edges_of(n2, true, false).len(), 1);
    }

    #[test]
    fn rollback_on_edge_full() {
        // max_edges_per_node = 0 so any add_edge from the virtual node fails.
        let mut g = GraphStore::new(8, 0);
        // insert two nodes with a pre-existing structural pair so
        // `is_bidirectional` can be evaluated even though no edges can fit.
        let n1 = g.add_node(Position::new(0.0, 0.0)).unwrap();
        let n2 = g.add_node(Position::new(100.0, 0.0)).unwrap();
        let before = g.active_node_count();

        let result = VirtualNode::insert(&mut g, Position::new(50.0, 0.0), n1, n2);
        assert!(result.is_err());
        assert_eq!(g.active_node_count(), before);
    }

    #[test]
    fn one_way_edge_connects_with_direction_preserved() {
        let mut g = GraphStore::new(8, 4);
        let n1 = g.add_node(Position::new(0.0, 0.0)).unwrap();
        let n2 = g.add_node(Position::new(100.0, 0.0)).unwrap();
        g.add_edge(n1, n2, 100.0, false).unwrap();

        let vnode = VirtualNode::insert(&mut g, Position::new(50.0, 0.0), n1, n2).unwrap();
        // virtual -> n2 exists (forward continuation)
        assert_eq!(vnode.graph().get_edges_of(vnode.id(), true, false).len(), 1);
        // n1 -> virtual exists (entry into the projection)
        assert_eq!(vnode.graph().get_edges_of(n1, true, false).len(), 1);
    }
}
