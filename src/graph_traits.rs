//! The narrow interfaces the extractor works through: a read-only view of
//! the source graph and a write-only sink for the emitted subgraph.

use crate::bidirected_graph::Handle;
use crate::error::ExtractError;

/// Read-only capability set over a bidirected sequence graph.
///
/// Orientation bookkeeping (flipping, id/strand accessors, canonical edge
/// identity) lives on [`Handle`] and
/// [`BiEdge`](crate::bidirected_graph::BiEdge); the view itself only has to
/// resolve node content and adjacency.
pub trait GraphSource {
    /// Whether the graph contains a node with this id.
    fn has_node(&self, node_id: usize) -> bool;

    /// The node's forward-strand sequence.
    fn sequence(&self, node_id: usize) -> Result<Vec<u8>, ExtractError>;

    /// Enumerate the neighboring handles on one side of `handle`:
    /// `go_left == false` visits the handles reachable out of its end,
    /// `go_left == true` the handles arriving at its start. The visitor
    /// returns `false` to stop early.
    fn follow_edges(
        &self,
        handle: Handle,
        go_left: bool,
        visit: &mut dyn FnMut(Handle) -> bool,
    ) -> Result<(), ExtractError>;

    /// Collect the neighbors on one side, in the view's enumeration order.
    fn neighbors(&self, handle: Handle, go_left: bool) -> Result<Vec<Handle>, ExtractError> {
        let mut out = Vec::new();
        self.follow_edges(handle, go_left, &mut |next| {
            out.push(next);
            true
        })?;
        Ok(out)
    }
}

/// Write-only sink for the emitted subgraph.
///
/// Edges are encoded as `(from, to, from_start, to_end)`: `from_start`
/// means the edge leaves the start (left) side of `from`, `to_end` that it
/// arrives at the end (right) side of `to`. Equivalently, the edge is the
/// traversal from `Handle::new(from, from_start)` to
/// `Handle::new(to, to_end)`.
pub trait GraphSink {
    /// Whether nothing has been written yet.
    fn is_empty(&self) -> bool;

    /// Add a node; re-adding an id fails with [`ExtractError::Sink`].
    fn add_node(&mut self, node_id: usize, sequence: Vec<u8>) -> Result<(), ExtractError>;

    /// Add an edge. Endpoint nodes may be added before or after the edge.
    fn add_edge(
        &mut self,
        from: usize,
        to: usize,
        from_start: bool,
        to_end: bool,
    ) -> Result<(), ExtractError>;
}
