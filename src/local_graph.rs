//! The mutable scratch graph the extractor builds, rewires, and finally
//! streams into the sink.
//!
//! Each node stores its forward sequence plus one edge list per side. The
//! lists are symmetric: an edge on side *s* of a node with reversing flag
//! *r* has a matching entry on the peer, on side *s* if *r* and on the
//! opposite side otherwise ([`peer_side`]). A self-loop that ties a node's
//! side to itself (a reversing loop) is listed once on that side.

use std::collections::BTreeMap;

use crate::error::ExtractError;

/// One entry in a node's side list: the peer node and whether traversing
/// the edge flips strand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SideEdge {
    pub peer: usize,
    pub reversing: bool,
}

impl SideEdge {
    pub fn new(peer: usize, reversing: bool) -> Self {
        SideEdge { peer, reversing }
    }
}

/// The side of the peer that holds the counterpart of an edge listed on
/// side `side_left` with the given reversing flag.
#[inline]
pub(crate) fn peer_side(side_left: bool, reversing: bool) -> bool {
    if reversing {
        side_left
    } else {
        !side_left
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct LocalNode {
    pub sequence: Vec<u8>,
    pub edges_left: Vec<SideEdge>,
    pub edges_right: Vec<SideEdge>,
}

impl LocalNode {
    pub fn new(sequence: Vec<u8>) -> Self {
        LocalNode {
            sequence,
            edges_left: Vec::new(),
            edges_right: Vec::new(),
        }
    }

    pub fn side(&self, left: bool) -> &Vec<SideEdge> {
        if left {
            &self.edges_left
        } else {
            &self.edges_right
        }
    }

    pub fn side_mut(&mut self, left: bool) -> &mut Vec<SideEdge> {
        if left {
            &mut self.edges_left
        } else {
            &mut self.edges_right
        }
    }
}

/// Node-id-ordered map of [`LocalNode`]s. Ordered storage keeps every
/// externally observable iteration (pruning sweeps, emission) identical
/// across platforms.
#[derive(Debug, Clone, Default)]
pub(crate) struct LocalGraph {
    nodes: BTreeMap<usize, LocalNode>,
}

impl LocalGraph {
    pub fn new() -> Self {
        LocalGraph {
            nodes: BTreeMap::new(),
        }
    }

    pub fn contains(&self, id: usize) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn insert(&mut self, id: usize, node: LocalNode) {
        self.nodes.insert(id, node);
    }

    pub fn remove(&mut self, id: usize) {
        self.nodes.remove(&id);
    }

    /// Borrow a node that the algorithm knows is present.
    pub fn node(&self, id: usize) -> &LocalNode {
        &self.nodes[&id]
    }

    pub fn node_mut(&mut self, id: usize) -> &mut LocalNode {
        self.nodes.get_mut(&id).expect("local node missing")
    }

    /// Node ids in ascending order.
    pub fn ids(&self) -> Vec<usize> {
        self.nodes.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&usize, &LocalNode)> {
        self.nodes.iter()
    }

    /// Sequence length as a distance contribution.
    pub fn seq_len(&self, id: usize) -> i64 {
        self.node(id).sequence.len() as i64
    }

    /// Owned copy of one side list, safe to iterate while rewiring.
    pub fn snapshot(&self, id: usize, left: bool) -> Vec<SideEdge> {
        self.node(id).side(left).clone()
    }

    pub fn push_edge(&mut self, id: usize, left: bool, edge: SideEdge) {
        self.node_mut(id).side_mut(left).push(edge);
    }

    /// Rewrite the first entry on `node`'s side that matches `old` exactly
    /// so it points at `new_peer`.
    pub fn retarget_backref(
        &mut self,
        node: usize,
        left: bool,
        old: SideEdge,
        new_peer: usize,
    ) -> Result<(), ExtractError> {
        let list = self.node_mut(node).side_mut(left);
        let entry = list.iter_mut().find(|e| **e == old).ok_or_else(|| {
            ExtractError::Invariant(format!(
                "no backreference ({}, {}) on node {}",
                old.peer, old.reversing, node
            ))
        })?;
        entry.peer = new_peer;
        Ok(())
    }

    /// Rewrite the first entry on `node`'s side whose peer is `old_peer`,
    /// whatever its reversing flag, so it points at `new_peer`.
    pub fn retarget_first_backref_by_peer(
        &mut self,
        node: usize,
        left: bool,
        old_peer: usize,
        new_peer: usize,
    ) -> Result<(), ExtractError> {
        let list = self.node_mut(node).side_mut(left);
        let entry = list.iter_mut().find(|e| e.peer == old_peer).ok_or_else(|| {
            ExtractError::Invariant(format!(
                "no backreference to {} on node {}",
                old_peer, node
            ))
        })?;
        entry.peer = new_peer;
        Ok(())
    }

    /// Erase the first entry on `node`'s side that matches `entry`.
    pub fn remove_backref(
        &mut self,
        node: usize,
        left: bool,
        entry: SideEdge,
    ) -> Result<(), ExtractError> {
        let list = self.node_mut(node).side_mut(left);
        let at = list.iter().position(|e| *e == entry).ok_or_else(|| {
            ExtractError::Invariant(format!(
                "no backreference ({}, {}) on node {}",
                entry.peer, entry.reversing, node
            ))
        })?;
        list.remove(at);
        Ok(())
    }
}
