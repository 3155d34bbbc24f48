use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::ExtractError;
use crate::graph_traits::{GraphSink, GraphSource};

/// A handle represents an oriented reference to a node in the graph.
/// The least significant bit (LSB) indicates orientation:
/// - 0 = forward strand
/// - 1 = reverse strand
/// The remaining bits store the node ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    /// Create a new handle with the given node ID and orientation
    pub fn new(node_id: usize, is_reverse: bool) -> Self {
        let mut value = (node_id as u64) << 1;
        if is_reverse {
            value |= 1;
        }
        Handle(value)
    }

    /// Create a forward handle for the given node ID
    pub fn forward(node_id: usize) -> Self {
        Self::new(node_id, false)
    }

    /// Create a reverse handle for the given node ID
    pub fn reverse(node_id: usize) -> Self {
        Self::new(node_id, true)
    }

    /// Get the node ID from this handle
    pub fn node_id(&self) -> usize {
        (self.0 >> 1) as usize
    }

    /// Check if this handle is in reverse orientation
    pub fn is_reverse(&self) -> bool {
        (self.0 & 1) == 1
    }

    /// Get the orientation sign as a char ('+' or '-')
    pub fn orientation_char(&self) -> char {
        if self.is_reverse() {
            '-'
        } else {
            '+'
        }
    }

    /// Flip the orientation of this handle
    pub fn flip(&self) -> Self {
        Handle(self.0 ^ 1)
    }

    /// Get the raw u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Create from raw u64 value
    pub fn from_u64(value: u64) -> Self {
        Handle(value)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.node_id(), self.orientation_char())
    }
}

/// Compute the reverse complement of a DNA sequence
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&base| match base {
            b'A' | b'a' => b'T',
            b'T' | b't' => b'A',
            b'C' | b'c' => b'G',
            b'G' | b'g' => b'C',
            b'N' | b'n' => b'N',
            _ => base, // Keep any other characters unchanged
        })
        .collect()
}

/// A bidirected graph node containing a DNA sequence
#[derive(Debug, Clone)]
pub struct BiNode {
    pub id: usize,
    pub sequence: Vec<u8>,
    pub rank: Option<u64>,
}

impl BiNode {
    /// Create a new node
    pub fn new(id: usize, sequence: Vec<u8>) -> Self {
        BiNode {
            id,
            sequence,
            rank: None,
        }
    }

    /// Get the sequence in the specified orientation
    pub fn get_sequence(&self, is_reverse: bool) -> Vec<u8> {
        if is_reverse {
            reverse_complement(&self.sequence)
        } else {
            self.sequence.clone()
        }
    }
}

/// An edge in the bidirected graph, stored as a directed traversal
/// `from -> to`. The traversal `to.flip() -> from.flip()` is the same
/// physical edge read the other way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BiEdge {
    pub from: Handle,
    pub to: Handle,
}

impl BiEdge {
    /// Create a new edge
    pub fn new(from: Handle, to: Handle) -> Self {
        BiEdge { from, to }
    }

    /// Get the canonical form of this edge, the strand-normalized identity
    /// used to deduplicate bidirected edges: the smaller of the two directed
    /// readings, so an edge and its reverse traversal compare equal.
    pub fn canonical(&self) -> Self {
        let flipped = BiEdge {
            from: self.to.flip(),
            to: self.from.flip(),
        };
        if *self <= flipped {
            *self
        } else {
            flipped
        }
    }

    /// Whether traversing this edge flips strand.
    pub fn is_reversing(&self) -> bool {
        self.from.is_reverse() != self.to.is_reverse()
    }
}

/// An in-memory bidirected graph with id-ordered node and edge storage, so
/// iteration order is the same on every platform.
///
/// The container is deliberately small: it serves as the read-only source
/// for extraction ([`GraphSource`]), as the emission target
/// ([`GraphSink`]), and as the input of the topological sort.
#[derive(Debug, Clone, Default)]
pub struct BidirectedGraph {
    pub nodes: BTreeMap<usize, BiNode>,
    pub edges: BTreeSet<BiEdge>,
}

impl BidirectedGraph {
    pub fn new() -> Self {
        BidirectedGraph {
            nodes: BTreeMap::new(),
            edges: BTreeSet::new(),
        }
    }

    /// Insert a node, replacing any previous node with the same id.
    pub fn add_node(&mut self, id: usize, sequence: Vec<u8>) {
        self.nodes.insert(id, BiNode::new(id, sequence));
    }

    /// Insert an edge given as a traversal; stored canonically.
    pub fn add_edge(&mut self, from: Handle, to: Handle) {
        self.edges.insert(BiEdge::new(from, to).canonical());
    }

    /// Whether the graph contains the physical edge for this traversal.
    pub fn has_edge(&self, from: Handle, to: Handle) -> bool {
        self.edges.contains(&BiEdge::new(from, to).canonical())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Forward handles of all nodes, ordered by assigned rank where present
    /// and by node id otherwise. `topological_sort::sort` fills in ranks.
    pub fn ordered_handles(&self) -> Vec<Handle> {
        let mut ids: Vec<&BiNode> = self.nodes.values().collect();
        ids.sort_by_key(|n| (n.rank.unwrap_or(u64::MAX), n.id));
        ids.iter().map(|n| Handle::forward(n.id)).collect()
    }

    /// Flip a node's local forward orientation in place: the sequence is
    /// reverse-complemented and every edge endpoint referring to the node
    /// changes strand.
    pub fn apply_orientation(&mut self, node_id: usize) {
        let node = match self.nodes.get_mut(&node_id) {
            Some(node) => node,
            None => return,
        };
        node.sequence = reverse_complement(&node.sequence);

        let old_edges = std::mem::take(&mut self.edges);
        for edge in old_edges {
            let mut from = edge.from;
            let mut to = edge.to;
            if from.node_id() == node_id {
                from = from.flip();
            }
            if to.node_id() == node_id {
                to = to.flip();
            }
            self.edges.insert(BiEdge::new(from, to).canonical());
        }
    }

    /// Check that every edge endpoint refers to a node that exists.
    pub fn validate(&self) -> Result<(), ExtractError> {
        for edge in &self.edges {
            for handle in [edge.from, edge.to] {
                if !self.nodes.contains_key(&handle.node_id()) {
                    return Err(ExtractError::Invariant(format!(
                        "edge {} -> {} refers to missing node {}",
                        edge.from,
                        edge.to,
                        handle.node_id()
                    )));
                }
            }
        }
        Ok(())
    }
}

impl GraphSource for BidirectedGraph {
    fn has_node(&self, node_id: usize) -> bool {
        self.nodes.contains_key(&node_id)
    }

    fn sequence(&self, node_id: usize) -> Result<Vec<u8>, ExtractError> {
        self.nodes
            .get(&node_id)
            .map(|node| node.sequence.clone())
            .ok_or_else(|| ExtractError::unknown_node(node_id))
    }

    fn follow_edges(
        &self,
        handle: Handle,
        go_left: bool,
        visit: &mut dyn FnMut(Handle) -> bool,
    ) -> Result<(), ExtractError> {
        if !self.nodes.contains_key(&handle.node_id()) {
            return Err(ExtractError::unknown_node(handle.node_id()));
        }
        for edge in &self.edges {
            // Each stored edge covers two traversals; the else-if keeps a
            // reversing self-loop from being visited twice.
            let next = if go_left {
                if edge.to == handle {
                    Some(edge.from)
                } else if edge.from == handle.flip() {
                    Some(edge.to.flip())
                } else {
                    None
                }
            } else if edge.from == handle {
                Some(edge.to)
            } else if edge.to == handle.flip() {
                Some(edge.from.flip())
            } else {
                None
            };
            if let Some(next) = next {
                if !visit(next) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

impl GraphSink for BidirectedGraph {
    fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    fn add_node(&mut self, node_id: usize, sequence: Vec<u8>) -> Result<(), ExtractError> {
        if self.nodes.contains_key(&node_id) {
            return Err(ExtractError::Sink(format!(
                "node {} added twice",
                node_id
            )));
        }
        self.nodes.insert(node_id, BiNode::new(node_id, sequence));
        Ok(())
    }

    fn add_edge(
        &mut self,
        from: usize,
        to: usize,
        from_start: bool,
        to_end: bool,
    ) -> Result<(), ExtractError> {
        let edge = BiEdge::new(Handle::new(from, from_start), Handle::new(to, to_end)).canonical();
        if !self.edges.insert(edge) {
            return Err(ExtractError::Sink(format!(
                "edge {} -> {} added twice",
                edge.from, edge.to
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_creation() {
        let h1 = Handle::forward(42);
        assert_eq!(h1.node_id(), 42);
        assert!(!h1.is_reverse());
        assert_eq!(h1.orientation_char(), '+');

        let h2 = Handle::reverse(42);
        assert_eq!(h2.node_id(), 42);
        assert!(h2.is_reverse());
        assert_eq!(h2.orientation_char(), '-');
    }

    #[test]
    fn test_handle_flip() {
        let h1 = Handle::forward(10);
        let h2 = h1.flip();
        assert_eq!(h2.node_id(), 10);
        assert!(h2.is_reverse());

        let h3 = h2.flip();
        assert_eq!(h3, h1);
    }

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement(b"ATCG"), b"CGAT");
        assert_eq!(reverse_complement(b"AAAA"), b"TTTT");
        assert_eq!(reverse_complement(b"GCTA"), b"TAGC");
        assert_eq!(reverse_complement(b"N"), b"N");
    }

    #[test]
    fn test_edge_canonical_agrees_on_both_traversals() {
        let e = BiEdge::new(Handle::forward(2), Handle::reverse(1));
        let back = BiEdge::new(Handle::forward(1), Handle::reverse(2));
        assert_eq!(e.canonical(), back.canonical());

        // reversing self loops canonicalize to themselves
        let loop_rr = BiEdge::new(Handle::forward(1), Handle::reverse(1));
        assert_eq!(loop_rr.canonical(), loop_rr);
        assert!(loop_rr.is_reversing());

        // a non-reversing self loop read in reverse is the same edge
        let loop_fwd = BiEdge::new(Handle::forward(1), Handle::forward(1));
        let loop_rev = BiEdge::new(Handle::reverse(1), Handle::reverse(1));
        assert_eq!(loop_rev.canonical(), loop_fwd);
        assert_eq!(loop_fwd.canonical(), loop_fwd);
    }

    #[test]
    fn test_follow_edges_both_sides() {
        let mut g = BidirectedGraph::new();
        g.add_node(1, b"ACG".to_vec());
        g.add_node(2, b"TT".to_vec());
        g.add_edge(Handle::forward(1), Handle::forward(2));

        let mut rights = Vec::new();
        g.follow_edges(Handle::forward(1), false, &mut |h| {
            rights.push(h);
            true
        })
        .unwrap();
        assert_eq!(rights, vec![Handle::forward(2)]);

        let mut lefts = Vec::new();
        g.follow_edges(Handle::forward(2), true, &mut |h| {
            lefts.push(h);
            true
        })
        .unwrap();
        assert_eq!(lefts, vec![Handle::forward(1)]);

        // implied reverse traversal: right side of 2- leads back to 1-
        let mut implied = Vec::new();
        g.follow_edges(Handle::reverse(2), false, &mut |h| {
            implied.push(h);
            true
        })
        .unwrap();
        assert_eq!(implied, vec![Handle::reverse(1)]);
    }

    #[test]
    fn test_follow_edges_reversing_self_loop_visited_once() {
        let mut g = BidirectedGraph::new();
        g.add_node(1, b"AAAT".to_vec());
        g.add_edge(Handle::forward(1), Handle::reverse(1));

        let mut rights = Vec::new();
        g.follow_edges(Handle::forward(1), false, &mut |h| {
            rights.push(h);
            true
        })
        .unwrap();
        assert_eq!(rights, vec![Handle::reverse(1)]);

        let mut lefts = Vec::new();
        g.follow_edges(Handle::forward(1), true, &mut |h| {
            lefts.push(h);
            true
        })
        .unwrap();
        assert!(lefts.is_empty());
    }

    #[test]
    fn test_apply_orientation_flips_sequence_and_edges() {
        let mut g = BidirectedGraph::new();
        g.add_node(1, b"AC".to_vec());
        g.add_node(2, b"GT".to_vec());
        g.add_edge(Handle::forward(1), Handle::reverse(2));

        g.apply_orientation(2);
        assert_eq!(g.nodes[&2].sequence, b"AC".to_vec());
        assert!(g.has_edge(Handle::forward(1), Handle::forward(2)));
        assert!(!g.has_edge(Handle::forward(1), Handle::reverse(2)));
    }

    #[test]
    fn test_sink_rejects_duplicate_node() {
        let mut g = BidirectedGraph::new();
        GraphSink::add_node(&mut g, 1, b"A".to_vec()).unwrap();
        let err = GraphSink::add_node(&mut g, 1, b"C".to_vec()).unwrap_err();
        assert!(matches!(err, ExtractError::Sink(_)));
    }
}
