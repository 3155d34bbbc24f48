//! Stable topological sort of a bidirected graph.
//!
//! A Kahn-style sort that chooses an orientation for every node as it
//! goes. Cycles are handled by masking the edges that would re-enter an
//! already emitted node; which edges get masked falls out of the visit
//! order, and every externally observable container is ordered by node id,
//! so the output is identical across platforms.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::bidirected_graph::{BiEdge, BidirectedGraph, Handle};

/// Right-side and left-side neighbor lists for every oriented handle,
/// including the traversals implied by reading each edge the other way.
fn side_adjacency(
    g: &BidirectedGraph,
) -> (
    BTreeMap<Handle, Vec<Handle>>,
    BTreeMap<Handle, Vec<Handle>>,
) {
    let mut next_of: BTreeMap<Handle, Vec<Handle>> = BTreeMap::new();
    let mut prev_of: BTreeMap<Handle, Vec<Handle>> = BTreeMap::new();
    for edge in &g.edges {
        next_of.entry(edge.from).or_default().push(edge.to);
        prev_of.entry(edge.to).or_default().push(edge.from);
        let reverse = BiEdge::new(edge.to.flip(), edge.from.flip());
        if (reverse.from, reverse.to) != (edge.from, edge.to) {
            next_of.entry(reverse.from).or_default().push(reverse.to);
            prev_of.entry(reverse.to).or_default().push(reverse.from);
        }
    }
    for list in next_of.values_mut() {
        list.sort();
    }
    for list in prev_of.values_mut() {
        list.sort();
    }
    (next_of, prev_of)
}

/// Locally-forward handles with no edges on their left side, in id order.
pub fn head_nodes(g: &BidirectedGraph) -> Vec<Handle> {
    let (_, prev_of) = side_adjacency(g);
    g.nodes
        .keys()
        .map(|&id| Handle::forward(id))
        .filter(|h| prev_of.get(h).map_or(true, |list| list.is_empty()))
        .collect()
}

/// Locally-forward handles with no edges on their right side, in id order.
pub fn tail_nodes(g: &BidirectedGraph) -> Vec<Handle> {
    let (next_of, _) = side_adjacency(g);
    g.nodes
        .keys()
        .map(|&id| Handle::forward(id))
        .filter(|h| next_of.get(h).map_or(true, |list| list.is_empty()))
        .collect()
}

/// Order and orient all nodes: each node appears exactly once, and for
/// every edge that was not masked as a feedback edge the source handle
/// precedes the target handle.
pub fn topological_order(g: &BidirectedGraph) -> Vec<Handle> {
    let mut sorted = Vec::with_capacity(g.node_count());
    let (next_of, prev_of) = side_adjacency(g);

    // masked edges are treated as removed for the rest of the sort
    let mut masked_edges: HashSet<BiEdge> = HashSet::new();

    // handles whose remaining incoming edges are all masked, keyed by id so
    // the smallest id is always popped first
    let mut ready: BTreeMap<usize, Handle> = BTreeMap::new();

    // first orientation suggested for each node during traversal, used to
    // break into cycles once the ready set runs dry
    let mut seeds: BTreeMap<usize, Handle> = BTreeMap::new();

    // start from the heads so a DAG comes out as a plain topological sort
    for &id in g.nodes.keys() {
        let handle = Handle::forward(id);
        if prev_of.get(&handle).map_or(true, |list| list.is_empty()) {
            ready.insert(id, handle);
        }
    }
    let mut unvisited: BTreeMap<usize, Handle> = g
        .nodes
        .keys()
        .filter(|id| !ready.contains_key(*id))
        .map(|&id| (id, Handle::forward(id)))
        .collect();

    while !unvisited.is_empty() || !ready.is_empty() {
        // refill from seeds, then from the smallest unvisited id locally
        // forward
        while ready.is_empty() {
            match seeds.pop_first() {
                Some((seed_id, seed)) => {
                    if unvisited.remove(&seed_id).is_some() {
                        debug!(seed = %seed, "entering cycle at seed");
                        ready.insert(seed_id, seed);
                    }
                }
                None => break,
            }
        }
        if ready.is_empty() {
            if let Some((id, handle)) = unvisited.pop_first() {
                debug!(node = id, "entering cycle at arbitrary node");
                ready.insert(id, handle);
            }
        }

        while let Some((_, handle)) = ready.pop_first() {
            sorted.push(handle);

            // a left-side edge back to an already emitted node is a cycle
            // entry point; mask it so it is never traversed
            for &prev in prev_of.get(&handle).into_iter().flatten() {
                if !unvisited.contains_key(&prev.node_id()) {
                    masked_edges.insert(BiEdge::new(prev, handle).canonical());
                }
            }

            // consume the right-side edges and release whatever they were
            // holding back
            for &next in next_of.get(&handle).into_iter().flatten() {
                let edge = BiEdge::new(handle, next).canonical();
                if !masked_edges.insert(edge) {
                    continue;
                }
                if !unvisited.contains_key(&next.node_id()) {
                    continue;
                }
                let mut unmasked_incoming = false;
                for &prev in prev_of.get(&next).into_iter().flatten() {
                    if !masked_edges.contains(&BiEdge::new(prev, next).canonical()) {
                        unmasked_incoming = true;
                        break;
                    }
                }
                if !unmasked_incoming {
                    unvisited.remove(&next.node_id());
                    ready.insert(next.node_id(), next);
                } else {
                    // remember the orientation we arrived with, in case the
                    // node has to be used as a cycle entry later
                    seeds.entry(next.node_id()).or_insert(next);
                }
            }
        }
    }

    sorted
}

/// Topologically sort the graph in place: node identity is untouched, but
/// every node gets its sort position as a rank, which
/// [`BidirectedGraph::ordered_handles`] respects.
pub fn sort(g: &mut BidirectedGraph) {
    if g.node_count() <= 1 {
        return;
    }
    let order = topological_order(g);
    for (rank, handle) in order.iter().enumerate() {
        if let Some(node) = g.nodes.get_mut(&handle.node_id()) {
            node.rank = Some(rank as u64);
        }
    }
}

/// Flip every node the sort would emit in reverse orientation, so all
/// handles in the sorted order read forward. Returns the flipped node ids.
pub fn orient_nodes_forward(g: &mut BidirectedGraph) -> HashSet<usize> {
    let order = topological_order(g);
    let mut flipped = HashSet::new();
    for handle in order {
        if handle.is_reverse() {
            flipped.insert(handle.node_id());
            g.apply_orientation(handle.node_id());
        }
    }
    flipped
}
