//! Extraction of the subgraph connecting two oriented positions.
//!
//! Given a read-only bidirected graph and two positions, builds the
//! subgraph of walks between them under a length bound: a Dijkstra-style
//! search copies the reachable region into a local scratch graph, the
//! endpoint nodes are optionally duplicated so terminal cycles survive,
//! then cut mid-sequence so the endpoints become tips, optionally pruned,
//! and finally streamed into a sink. Returns the map from freshly minted
//! node ids back to the ids they were copied from.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, trace};

use crate::bidirected_graph::{BiEdge, Handle};
use crate::error::ExtractError;
use crate::filtered_pqueue::FilteredPriorityQueue;
use crate::graph_traits::{GraphSink, GraphSource};
use crate::local_graph::{peer_side, LocalGraph, LocalNode, SideEdge};
use crate::pos::Pos;

/// Option flags for [`extract_connecting_graph`].
///
/// The three pruning flags are mutually exclusive in intent; when several
/// are set, they apply with precedence
/// `strict_max_len` > `only_paths` > `no_additional_tips`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Keep the bases at the two positions in the trimmed endpoint
    /// sequences instead of cutting them away.
    pub include_terminal_positions: bool,
    /// Also search backward from the second position and duplicate the
    /// endpoint nodes so cycles through them survive the cut.
    pub detect_terminal_cycles: bool,
    /// Iteratively peel tips other than the endpoint (and duplicate) nodes.
    pub no_additional_tips: bool,
    /// Keep only nodes and edges that lie on some walk between the
    /// positions, of any length.
    pub only_paths: bool,
    /// Keep only nodes and edges that lie on some walk between the
    /// positions of length at most `max_len`.
    pub strict_max_len: bool,
}

/// How the two endpoint positions relate when they share a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Colocation {
    SeparateNodes,
    SharedNodeReachable,
    SharedNodeUnreachable,
    SharedNodeReverse,
}

/// A handle at a known distance from the search origin; distance is to the
/// far end of the handle. Ordered so a max-heap pops the closest first,
/// with the handle breaking ties deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Traversal {
    dist: i64,
    handle: Handle,
}

impl Ord for Traversal {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist
            .cmp(&self.dist)
            .then_with(|| other.handle.cmp(&self.handle))
    }
}

impl PartialOrd for Traversal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Same thing for the already-extracted local graph, where handles are no
/// longer needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LocalTraversal {
    dist: i64,
    id: usize,
    rev: bool,
}

impl Ord for LocalTraversal {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist
            .cmp(&self.dist)
            .then_with(|| (other.id, other.rev).cmp(&(self.id, self.rev)))
    }
}

impl PartialOrd for LocalTraversal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn classify_colocation(pos_1: Pos, pos_2: Pos, include_terminal_positions: bool) -> Colocation {
    if pos_1.node_id != pos_2.node_id {
        Colocation::SeparateNodes
    } else if pos_1.is_rev != pos_2.is_rev {
        Colocation::SharedNodeReverse
    } else if pos_1.offset < pos_2.offset + include_terminal_positions as usize {
        Colocation::SharedNodeReachable
    } else {
        Colocation::SharedNodeUnreachable
    }
}

/// The part of the node sequence past the position, reading outward.
fn trimmed_seq_right(seq: &[u8], offset: usize, rev: bool, keep_terminal: bool) -> Vec<u8> {
    let keep = keep_terminal as usize;
    if rev {
        seq[..seq.len() - offset - 1 + keep].to_vec()
    } else {
        seq[offset + 1 - keep..].to_vec()
    }
}

/// The part of the node sequence before the position, reading inward.
fn trimmed_seq_left(seq: &[u8], offset: usize, rev: bool, keep_terminal: bool) -> Vec<u8> {
    let keep = keep_terminal as usize;
    if rev {
        seq[seq.len() - offset - keep..].to_vec()
    } else {
        seq[..offset + keep].to_vec()
    }
}

/// Extract the connecting subgraph between `pos_1` and `pos_2` into `into`.
///
/// On success returns the id-translation map: every emitted node id maps to
/// the source node it came from (identity for ids that were not duplicated
/// or split). If no walk of length at most `max_len` connects the
/// positions, the sink is left empty and the map is empty; that is not an
/// error.
pub fn extract_connecting_graph<G, S>(
    source: &G,
    into: &mut S,
    max_len: i64,
    pos_1: Pos,
    pos_2: Pos,
    opts: ExtractOptions,
) -> Result<HashMap<usize, usize>, ExtractError>
where
    G: GraphSource,
    S: GraphSink,
{
    if !into.is_empty() {
        return Err(ExtractError::NonEmptyOutput);
    }

    let mut pos_1 = pos_1;
    let mut pos_2 = pos_2;
    let keep_terminal = opts.include_terminal_positions;

    let seq_1 = source.sequence(pos_1.node_id)?;
    if pos_1.offset >= seq_1.len() {
        return Err(ExtractError::GraphAccess(format!(
            "position {} lies outside its node (length {})",
            pos_1,
            seq_1.len()
        )));
    }
    let seq_2 = if pos_2.node_id == pos_1.node_id {
        seq_1.clone()
    } else {
        source.sequence(pos_2.node_id)?
    };
    if pos_2.offset >= seq_2.len() {
        return Err(ExtractError::GraphAccess(format!(
            "position {} lies outside its node (length {})",
            pos_2,
            seq_2.len()
        )));
    }

    let colocation = classify_colocation(pos_1, pos_2, keep_terminal);
    debug!(%pos_1, %pos_2, max_len, ?colocation, "extracting connecting graph");

    // the largest node id seen, for minting fresh ids afterwards
    let mut max_id = pos_1.node_id.max(pos_2.node_id);

    let mut id_trans: HashMap<usize, usize> = HashMap::new();
    let mut observed_edges: HashSet<BiEdge> = HashSet::new();

    let mut graph = LocalGraph::new();
    graph.insert(pos_1.node_id, LocalNode::new(seq_1));
    if pos_2.node_id != pos_1.node_id {
        graph.insert(pos_2.node_id, LocalNode::new(seq_2));
    }

    let mut skip_handles: HashSet<Handle> = HashSet::new();
    skip_handles.insert(Handle::new(pos_1.node_id, pos_1.is_rev));
    // skip the final position too, unless traversing through it is the only
    // way to enumerate its terminal cycles
    if !(colocation == Colocation::SharedNodeReverse && opts.detect_terminal_cycles) {
        skip_handles.insert(Handle::new(pos_2.node_id, pos_2.is_rev));
    }

    // distances to the ends of the starting nodes
    let first_traversal_length = graph.seq_len(pos_1.node_id) - pos_1.offset as i64;
    let last_traversal_length = pos_2.offset as i64;

    // the max length of the part of a walk preceding the final node in
    // each search direction
    let forward_max_len = max_len - last_traversal_length;
    let backward_max_len = max_len - first_traversal_length;

    // STEP 1: forward search out of pos_1.
    // When both positions sit on the same node with the second ahead of the
    // first, the walk never leaves the node and the search is unnecessary.
    let found_target = if colocation == Colocation::SharedNodeReachable {
        pos_2.offset as i64 - pos_1.offset as i64 <= max_len
    } else {
        bounded_search(
            source,
            &mut graph,
            Handle::new(pos_1.node_id, pos_1.is_rev),
            first_traversal_length,
            forward_max_len,
            &skip_handles,
            Some(Handle::new(pos_2.node_id, pos_2.is_rev)),
            &mut observed_edges,
            &mut max_id,
        )?
    };

    if !found_target {
        debug!("target not reachable under the length bound");
        return Ok(id_trans);
    }

    // STEP 2: backward search out of pos_2, to pick up walks that re-enter
    // it from its far side, i.e. cycles terminating there. Pointless when
    // both searches would walk the same edges or all connecting walks are
    // already cyclic.
    if opts.detect_terminal_cycles
        && matches!(
            colocation,
            Colocation::SeparateNodes | Colocation::SharedNodeReachable
        )
    {
        skip_handles.clear();
        skip_handles.insert(Handle::new(pos_2.node_id, !pos_2.is_rev));
        skip_handles.insert(Handle::new(pos_1.node_id, !pos_1.is_rev));
        bounded_search(
            source,
            &mut graph,
            Handle::new(pos_2.node_id, !pos_2.is_rev),
            last_traversal_length,
            backward_max_len,
            &skip_handles,
            None,
            &mut observed_edges,
            &mut max_id,
        )?;
    }

    let mut next_id = max_id + 1;
    let mut duplicate_node_1: Option<usize> = None;
    let mut duplicate_node_2: Option<usize> = None;

    // STEP 3: duplicate the endpoint nodes that lie on cycles, so the
    // cyclic walks survive the cutting step.
    if opts.detect_terminal_cycles {
        let p1 = pos_1.node_id;
        let p2 = pos_2.node_id;
        // a node with edges on both sides was traversed in both directions,
        // so it must be on a cycle
        let on_cycle = |g: &LocalGraph, id: usize| {
            !(g.node(id).edges_left.is_empty() || g.node(id).edges_right.is_empty())
        };

        match colocation {
            Colocation::SeparateNodes => {
                // cycles through the two endpoints can be duplicated
                // independently
                if on_cycle(&graph, p1) {
                    let dup = next_id;
                    graph.insert(dup, LocalNode::new(graph.node(p1).sequence.clone()));
                    let looping = copy_cycle_side(&mut graph, p1, dup, false);
                    copy_cycle_side(&mut graph, p1, dup, true);
                    if looping {
                        // the duplicate keeps its own copy of the loop, and
                        // the original's outgoing side feeds into it
                        graph.push_edge(dup, false, SideEdge::new(dup, false));
                        graph.push_edge(dup, true, SideEdge::new(dup, false));
                        graph.push_edge(dup, !pos_1.is_rev, SideEdge::new(p1, false));
                        graph.push_edge(p1, pos_1.is_rev, SideEdge::new(dup, false));
                    }
                    id_trans.insert(dup, p1);
                    next_id += 1;
                }
                if on_cycle(&graph, p2) {
                    let dup = next_id;
                    graph.insert(dup, LocalNode::new(graph.node(p2).sequence.clone()));
                    let looping = copy_cycle_side(&mut graph, p2, dup, false);
                    copy_cycle_side(&mut graph, p2, dup, true);
                    if looping {
                        // mirrored: the duplicate feeds into the original's
                        // incoming side
                        graph.push_edge(dup, false, SideEdge::new(dup, false));
                        graph.push_edge(dup, true, SideEdge::new(dup, false));
                        graph.push_edge(dup, pos_2.is_rev, SideEdge::new(p2, false));
                        graph.push_edge(p2, !pos_2.is_rev, SideEdge::new(dup, false));
                    }
                    id_trans.insert(dup, p2);
                    next_id += 1;
                }
            }
            Colocation::SharedNodeReachable => {
                if on_cycle(&graph, p1) {
                    // the node will be trimmed to its middle, so first mint
                    // fragments to own the edges on either side of the cut,
                    // then a full-length duplicate to carry through-cycles
                    let out_left = pos_1.is_rev;
                    let in_left = !pos_1.is_rev;

                    let righthand_id = next_id;
                    let seq = trimmed_seq_right(
                        &graph.node(p1).sequence,
                        pos_1.offset,
                        pos_1.is_rev,
                        keep_terminal,
                    );
                    graph.insert(righthand_id, LocalNode::new(seq));
                    let moved = std::mem::take(graph.node_mut(p1).side_mut(out_left));
                    *graph.node_mut(righthand_id).side_mut(out_left) = moved;
                    let snapshot = graph.snapshot(righthand_id, out_left);
                    for (i, e) in snapshot.iter().enumerate() {
                        if e.peer == p1 && e.reversing {
                            // reversing self loop now lives on the fragment;
                            // the lefthand entries keep the old id for now
                            graph.node_mut(righthand_id).side_mut(out_left)[i].peer =
                                righthand_id;
                        } else {
                            graph.retarget_backref(
                                e.peer,
                                peer_side(out_left, e.reversing),
                                SideEdge::new(p1, e.reversing),
                                righthand_id,
                            )?;
                        }
                    }
                    id_trans.insert(righthand_id, p1);
                    next_id += 1;

                    let lefthand_id = next_id;
                    let seq = trimmed_seq_left(
                        &graph.node(p1).sequence,
                        pos_2.offset,
                        pos_2.is_rev,
                        keep_terminal,
                    );
                    graph.insert(lefthand_id, LocalNode::new(seq));
                    let moved = std::mem::take(graph.node_mut(p1).side_mut(in_left));
                    *graph.node_mut(lefthand_id).side_mut(in_left) = moved;
                    let snapshot = graph.snapshot(lefthand_id, in_left);
                    for (i, e) in snapshot.iter().enumerate() {
                        let mut e = *e;
                        if e.peer == p1 {
                            // a reversing self loop; the non-reversing ones
                            // were already retargeted at the righthand node
                            graph.node_mut(lefthand_id).side_mut(in_left)[i].peer = lefthand_id;
                            e.peer = lefthand_id;
                        }
                        if !(e.peer == lefthand_id && e.reversing) {
                            graph.retarget_backref(
                                e.peer,
                                peer_side(in_left, e.reversing),
                                SideEdge::new(p1, e.reversing),
                                lefthand_id,
                            )?;
                        }
                    }
                    id_trans.insert(lefthand_id, p1);
                    next_id += 1;

                    // the full-length duplicate that carries cycles passing
                    // through the whole node
                    let cycle_id = next_id;
                    graph.insert(cycle_id, LocalNode::new(graph.node(p1).sequence.clone()));
                    let mut add_looping_connection = false;

                    let snapshot = graph.snapshot(righthand_id, out_left);
                    for (i, e) in snapshot.iter().enumerate() {
                        if e.peer == righthand_id {
                            // reversing self loop migrates onto the duplicate
                            graph.node_mut(righthand_id).side_mut(out_left)[i].peer = cycle_id;
                            graph.push_edge(
                                cycle_id,
                                out_left,
                                SideEdge::new(righthand_id, e.reversing),
                            );
                            graph.push_edge(cycle_id, out_left, SideEdge::new(cycle_id, e.reversing));
                        } else if e.peer == lefthand_id {
                            add_looping_connection = true;
                        } else {
                            graph.push_edge(
                                e.peer,
                                peer_side(out_left, e.reversing),
                                SideEdge::new(cycle_id, e.reversing),
                            );
                            graph.push_edge(cycle_id, out_left, *e);
                        }
                    }
                    let snapshot = graph.snapshot(lefthand_id, in_left);
                    for (i, e) in snapshot.iter().enumerate() {
                        if e.peer == lefthand_id {
                            graph.node_mut(lefthand_id).side_mut(in_left)[i].peer = cycle_id;
                            graph.push_edge(
                                cycle_id,
                                in_left,
                                SideEdge::new(lefthand_id, e.reversing),
                            );
                            graph.push_edge(cycle_id, in_left, SideEdge::new(cycle_id, e.reversing));
                        } else if e.peer != righthand_id {
                            graph.push_edge(
                                e.peer,
                                peer_side(in_left, e.reversing),
                                SideEdge::new(cycle_id, e.reversing),
                            );
                            graph.push_edge(cycle_id, in_left, *e);
                        }
                    }
                    if add_looping_connection {
                        // wire righthand -> duplicate -> lefthand, and give
                        // the duplicate the loop itself
                        graph.push_edge(righthand_id, out_left, SideEdge::new(cycle_id, false));
                        graph.push_edge(cycle_id, in_left, SideEdge::new(righthand_id, false));
                        graph.push_edge(lefthand_id, in_left, SideEdge::new(cycle_id, false));
                        graph.push_edge(cycle_id, out_left, SideEdge::new(lefthand_id, false));
                        graph.push_edge(cycle_id, out_left, SideEdge::new(cycle_id, false));
                        graph.push_edge(cycle_id, in_left, SideEdge::new(cycle_id, false));
                    }
                    id_trans.insert(cycle_id, p1);
                    next_id += 1;

                    duplicate_node_1 = Some(righthand_id);
                    duplicate_node_2 = Some(lefthand_id);
                }
            }
            Colocation::SharedNodeUnreachable => {
                // every connecting walk is cyclic; duplicate the node so
                // cycles passing all the way through it reach the distance
                // filters
                let dup = next_id;
                graph.insert(dup, LocalNode::new(graph.node(p1).sequence.clone()));
                let out_left = pos_1.is_rev;
                let in_left = !pos_1.is_rev;
                let looping = copy_cycle_side(&mut graph, p1, dup, out_left);
                copy_cycle_side(&mut graph, p1, dup, in_left);
                if looping {
                    // cross edges in both directions plus the duplicate's
                    // own copy of the loop
                    graph.push_edge(p1, out_left, SideEdge::new(dup, false));
                    graph.push_edge(dup, in_left, SideEdge::new(p1, false));
                    graph.push_edge(p1, in_left, SideEdge::new(dup, false));
                    graph.push_edge(dup, out_left, SideEdge::new(p1, false));
                    graph.push_edge(dup, out_left, SideEdge::new(dup, false));
                    graph.push_edge(dup, in_left, SideEdge::new(dup, false));
                }
                id_trans.insert(dup, p1);
                next_id += 1;
            }
            Colocation::SharedNodeReverse => {
                if on_cycle(&graph, p1) {
                    let dup = next_id;
                    graph.insert(dup, LocalNode::new(graph.node(p1).sequence.clone()));
                    let out_left = pos_1.is_rev;
                    let in_left = !pos_1.is_rev;
                    let mut add_reversing_connection = false;
                    let mut add_looping_connection = false;

                    for e in &graph.snapshot(p1, out_left) {
                        if e.peer == p1 && e.reversing {
                            add_reversing_connection = true;
                        } else if e.peer == p1 {
                            add_looping_connection = true;
                        } else {
                            graph.push_edge(
                                e.peer,
                                peer_side(out_left, e.reversing),
                                SideEdge::new(dup, e.reversing),
                            );
                            graph.push_edge(dup, out_left, *e);
                        }
                    }
                    for e in &graph.snapshot(p1, in_left) {
                        if e.peer == p1 && e.reversing {
                            // the incoming side of the original is cut away
                            // later; only the duplicate keeps the loop
                            graph.push_edge(dup, in_left, SideEdge::new(dup, e.reversing));
                        } else if e.peer != p1 {
                            graph.push_edge(
                                e.peer,
                                peer_side(in_left, e.reversing),
                                SideEdge::new(dup, e.reversing),
                            );
                            graph.push_edge(dup, in_left, *e);
                        }
                    }
                    if add_reversing_connection {
                        graph.push_edge(p1, out_left, SideEdge::new(dup, true));
                        graph.push_edge(dup, out_left, SideEdge::new(p1, true));
                        graph.push_edge(dup, out_left, SideEdge::new(dup, true));
                    }
                    if add_looping_connection {
                        graph.push_edge(p1, out_left, SideEdge::new(dup, false));
                        graph.push_edge(dup, in_left, SideEdge::new(p1, false));
                        graph.push_edge(dup, out_left, SideEdge::new(dup, false));
                        graph.push_edge(dup, in_left, SideEdge::new(dup, false));
                    }
                    id_trans.insert(dup, p1);
                    next_id += 1;
                }
            }
        }
    }

    // STEP 4: cut the endpoint nodes at the positions and clear the edges
    // on the outward sides, so both positions become tips.
    match colocation {
        Colocation::SeparateNodes => {
            let p1 = pos_1.node_id;
            let p2 = pos_2.node_id;
            let out1_left = !pos_1.is_rev;
            let out2_left = pos_2.is_rev;
            erase_side_backrefs(&mut graph, p1, out1_left)?;
            erase_side_backrefs(&mut graph, p2, out2_left)?;
            graph.node_mut(p1).side_mut(out1_left).clear();
            graph.node_mut(p2).side_mut(out2_left).clear();

            let seq = trimmed_seq_right(
                &graph.node(p1).sequence,
                pos_1.offset,
                pos_1.is_rev,
                keep_terminal,
            );
            graph.node_mut(p1).sequence = seq;
            let seq = trimmed_seq_left(
                &graph.node(p2).sequence,
                pos_2.offset,
                pos_2.is_rev,
                keep_terminal,
            );
            graph.node_mut(p2).sequence = seq;
        }
        Colocation::SharedNodeReachable => {
            let p1 = pos_1.node_id;
            erase_side_backrefs(&mut graph, p1, false)?;
            erase_side_backrefs(&mut graph, p1, true)?;
            let node = graph.node_mut(p1);
            node.edges_right.clear();
            node.edges_left.clear();

            // trim to the middle slice between the two offsets
            let keep = keep_terminal as usize;
            let len = node.sequence.len();
            let cut_len = pos_2.offset + 2 * keep - pos_1.offset - 1;
            let start = if pos_1.is_rev {
                len - pos_2.offset - keep
            } else {
                pos_1.offset + 1 - keep
            };
            node.sequence = node.sequence[start..start + cut_len].to_vec();
        }
        Colocation::SharedNodeUnreachable => {
            // split the node in two: the fresh node takes over the right
            // side, then each fragment is trimmed at its position
            let p1 = pos_1.node_id;
            let new_id = next_id;
            graph.insert(new_id, LocalNode::new(graph.node(p1).sequence.clone()));
            let moved = std::mem::take(&mut graph.node_mut(p1).edges_right);
            graph.node_mut(new_id).edges_right = moved;

            let snapshot = graph.snapshot(new_id, false);
            for (i, e) in snapshot.iter().enumerate() {
                if e.peer == p1 && e.reversing {
                    // same-side self loop: the single entry moved with the
                    // side, so it now loops on the new node
                    graph.node_mut(new_id).edges_right[i].peer = new_id;
                } else {
                    graph.retarget_first_backref_by_peer(
                        e.peer,
                        peer_side(false, e.reversing),
                        p1,
                        new_id,
                    )?;
                }
            }

            id_trans.insert(new_id, p1);

            // the fragment holding the right side goes to whichever
            // position exits that way
            if pos_1.is_rev {
                pos_2.node_id = new_id;
                let seq = trimmed_seq_right(
                    &graph.node(p1).sequence,
                    pos_1.offset,
                    pos_1.is_rev,
                    keep_terminal,
                );
                graph.node_mut(p1).sequence = seq;
                let seq = trimmed_seq_left(
                    &graph.node(new_id).sequence,
                    pos_2.offset,
                    pos_2.is_rev,
                    keep_terminal,
                );
                graph.node_mut(new_id).sequence = seq;
            } else {
                pos_1.node_id = new_id;
                let seq = trimmed_seq_right(
                    &graph.node(new_id).sequence,
                    pos_1.offset,
                    pos_1.is_rev,
                    keep_terminal,
                );
                graph.node_mut(new_id).sequence = seq;
                let seq = trimmed_seq_left(
                    &graph.node(p1).sequence,
                    pos_2.offset,
                    pos_2.is_rev,
                    keep_terminal,
                );
                graph.node_mut(p1).sequence = seq;
            }
        }
        Colocation::SharedNodeReverse => {
            let p1 = pos_1.node_id;
            let in_left = !pos_1.is_rev;
            let out_left = pos_1.is_rev;
            erase_side_backrefs(&mut graph, p1, in_left)?;
            graph.node_mut(p1).side_mut(in_left).clear();

            // a fresh node becomes the sink for pos_2
            let new_id = next_id;
            graph.insert(new_id, LocalNode::new(graph.node(p1).sequence.clone()));
            let snapshot = graph.snapshot(p1, out_left);
            for (i, e) in snapshot.iter().enumerate() {
                if e.peer == p1 {
                    // with the other side cleared this is a reversing self
                    // loop; it becomes the edge connecting the two copies
                    graph.node_mut(p1).side_mut(out_left)[i].peer = new_id;
                    graph.push_edge(new_id, out_left, SideEdge::new(p1, e.reversing));
                } else {
                    graph.push_edge(new_id, out_left, *e);
                    graph.push_edge(
                        e.peer,
                        peer_side(out_left, e.reversing),
                        SideEdge::new(new_id, e.reversing),
                    );
                }
            }

            id_trans.insert(new_id, p1);
            pos_2.node_id = new_id;

            let seq = trimmed_seq_right(
                &graph.node(p1).sequence,
                pos_1.offset,
                pos_1.is_rev,
                keep_terminal,
            );
            graph.node_mut(p1).sequence = seq;
            let seq = trimmed_seq_left(
                &graph.node(new_id).sequence,
                pos_2.offset,
                pos_2.is_rev,
                keep_terminal,
            );
            graph.node_mut(new_id).sequence = seq;
        }
    }

    // STEP 5: pruning
    if opts.strict_max_len {
        prune_to_max_len(
            &mut graph,
            &mut id_trans,
            pos_1,
            pos_2,
            duplicate_node_1,
            duplicate_node_2,
            max_len,
        );
    } else if opts.only_paths {
        prune_to_paths(
            &mut graph,
            &mut id_trans,
            pos_1,
            pos_2,
            duplicate_node_1,
            duplicate_node_2,
        );
    } else if opts.no_additional_tips {
        let mut protected = vec![pos_1.node_id, pos_2.node_id];
        protected.extend(duplicate_node_1);
        protected.extend(duplicate_node_2);
        prune_extra_tips(&mut graph, &mut id_trans, &protected);
    }

    // STEP 6: stream the local graph into the sink
    emit_subgraph(&graph, &mut id_trans, into)?;

    debug!(
        nodes = graph.ids().len(),
        translations = id_trans.len(),
        "extraction finished"
    );
    Ok(id_trans)
}

/// Dijkstra expansion from `seed` recording every node and edge it can
/// reach within `search_max_len`, measured to the far end of each arriving
/// node. Returns whether some edge led to `target`.
fn bounded_search<G: GraphSource>(
    source: &G,
    graph: &mut LocalGraph,
    seed: Handle,
    seed_dist: i64,
    search_max_len: i64,
    skip_handles: &HashSet<Handle>,
    target: Option<Handle>,
    observed_edges: &mut HashSet<BiEdge>,
    max_id: &mut usize,
) -> Result<bool, ExtractError> {
    let mut found_target = false;
    let mut queue = FilteredPriorityQueue::new(|t: &Traversal| t.handle);
    if seed_dist <= search_max_len {
        queue.push(Traversal {
            handle: seed,
            dist: seed_dist,
        });
    }

    while let Some(trav) = queue.pop() {
        trace!(handle = %trav.handle, dist = trav.dist, "search traversal");
        let trav_id = trav.handle.node_id();
        let trav_rev = trav.handle.is_reverse();
        for next in source.neighbors(trav.handle, false)? {
            let next_id = next.node_id();
            let next_rev = next.is_reverse();
            if target == Some(next) {
                found_target = true;
            }
            *max_id = (*max_id).max(next_id);

            if !graph.contains(next_id) {
                graph.insert(next_id, LocalNode::new(source.sequence(next_id)?));
            }

            // distance to the far end of the next node
            let dist_thru = trav.dist + graph.seq_len(next_id);
            if !skip_handles.contains(&next) && dist_thru <= search_max_len {
                queue.push(Traversal {
                    handle: next,
                    dist: dist_thru,
                });
            }

            let reversing = trav_rev != next_rev;
            if observed_edges.insert(BiEdge::new(trav.handle, next).canonical()) {
                // record symmetric side entries; a same-side self loop is
                // listed once
                graph.push_edge(trav_id, trav_rev, SideEdge::new(next_id, reversing));
                if !(trav_id == next_id && reversing) {
                    graph.push_edge(next_id, !next_rev, SideEdge::new(trav_id, reversing));
                }
            }
        }
    }
    Ok(found_target)
}

/// Copy one side of `orig` onto its duplicate `dup` while keeping the side
/// lists symmetric: reversing self loops migrate onto the duplicate
/// (leaving a cross edge on the original), ordinary edges are copied with a
/// matching backreference on the peer. Non-reversing self loops are left
/// alone; the caller stages their wiring afterwards. Returns whether one
/// was present.
fn copy_cycle_side(graph: &mut LocalGraph, orig: usize, dup: usize, left: bool) -> bool {
    let mut saw_nonreversing_loop = false;
    let snapshot = graph.snapshot(orig, left);
    for (i, e) in snapshot.iter().enumerate() {
        if e.peer == orig && e.reversing {
            graph.node_mut(orig).side_mut(left)[i].peer = dup;
            graph.push_edge(dup, left, SideEdge::new(orig, e.reversing));
            graph.push_edge(dup, left, SideEdge::new(dup, e.reversing));
        } else if e.peer == orig {
            saw_nonreversing_loop = true;
        } else {
            graph.push_edge(
                e.peer,
                peer_side(left, e.reversing),
                SideEdge::new(dup, e.reversing),
            );
            graph.push_edge(dup, left, *e);
        }
    }
    saw_nonreversing_loop
}

/// Remove the counterpart of every edge on one side of `id` from the peers'
/// lists, in preparation for clearing that side. A reversing self loop is
/// listed once, so it has no counterpart to remove.
fn erase_side_backrefs(
    graph: &mut LocalGraph,
    id: usize,
    left: bool,
) -> Result<(), ExtractError> {
    for e in &graph.snapshot(id, left) {
        if !(e.peer == id && e.reversing) {
            graph.remove_backref(
                e.peer,
                peer_side(left, e.reversing),
                SideEdge::new(id, e.reversing),
            )?;
        }
    }
    Ok(())
}

/// Keep only nodes and edges on some walk between the positions of length
/// at most `max_len`: two filtered-queue Dijkstra passes give the shortest
/// forward distance from pos_1 and backward distance from pos_2 for every
/// oriented node, and anything whose best combined walk is too long goes.
fn prune_to_max_len(
    graph: &mut LocalGraph,
    id_trans: &mut HashMap<usize, usize>,
    pos_1: Pos,
    pos_2: Pos,
    duplicate_node_1: Option<usize>,
    duplicate_node_2: Option<usize>,
    max_len: i64,
) {
    let mut forward_dist: HashMap<(usize, bool), i64> = HashMap::new();
    let mut reverse_dist: HashMap<(usize, bool), i64> = HashMap::new();

    let mut queue = FilteredPriorityQueue::new(|t: &LocalTraversal| (t.id, t.rev));

    queue.push(LocalTraversal {
        id: pos_1.node_id,
        rev: pos_1.is_rev,
        dist: graph.seq_len(pos_1.node_id),
    });
    if let Some(dup) = duplicate_node_1 {
        queue.push(LocalTraversal {
            id: dup,
            rev: pos_1.is_rev,
            dist: graph.seq_len(dup),
        });
    }
    while let Some(trav) = queue.pop() {
        trace!(id = trav.id, rev = trav.rev, dist = trav.dist, "forward prune");
        forward_dist.insert((trav.id, trav.rev), trav.dist);
        for e in graph.node(trav.id).side(trav.rev) {
            queue.push(LocalTraversal {
                id: e.peer,
                rev: e.reversing != trav.rev,
                dist: trav.dist + graph.seq_len(e.peer),
            });
        }
    }

    queue.clear();
    queue.push(LocalTraversal {
        id: pos_2.node_id,
        rev: !pos_2.is_rev,
        dist: 0,
    });
    if let Some(dup) = duplicate_node_2 {
        queue.push(LocalTraversal {
            id: dup,
            rev: !pos_2.is_rev,
            dist: 0,
        });
    }
    while let Some(trav) = queue.pop() {
        trace!(id = trav.id, rev = trav.rev, dist = trav.dist, "backward prune");
        reverse_dist.insert((trav.id, trav.rev), trav.dist);
        let dist_thru = trav.dist + graph.seq_len(trav.id);
        for e in graph.node(trav.id).side(trav.rev) {
            queue.push(LocalTraversal {
                id: e.peer,
                rev: e.reversing != trav.rev,
                dist: dist_thru,
            });
        }
    }

    let lens: HashMap<usize, i64> = graph
        .iter()
        .map(|(id, node)| (*id, node.sequence.len() as i64))
        .collect();
    let short_enough = |f: Option<&i64>, r: Option<&i64>, extra: i64| match (f, r) {
        (Some(f), Some(r)) => f + r + extra <= max_len,
        _ => false,
    };

    let mut to_erase = Vec::new();
    for id in graph.ids() {
        let keep = short_enough(
            forward_dist.get(&(id, true)),
            reverse_dist.get(&(id, false)),
            0,
        ) || short_enough(
            forward_dist.get(&(id, false)),
            reverse_dist.get(&(id, true)),
            0,
        );
        if !keep {
            to_erase.push(id);
            continue;
        }
        let node = graph.node_mut(id);
        node.edges_right.retain(|e| {
            short_enough(
                forward_dist.get(&(id, false)),
                reverse_dist.get(&(e.peer, !e.reversing)),
                lens[&e.peer],
            ) || short_enough(
                forward_dist.get(&(e.peer, !e.reversing)),
                reverse_dist.get(&(id, false)),
                lens[&id],
            )
        });
        node.edges_left.retain(|e| {
            short_enough(
                forward_dist.get(&(id, true)),
                reverse_dist.get(&(e.peer, e.reversing)),
                lens[&e.peer],
            ) || short_enough(
                forward_dist.get(&(e.peer, e.reversing)),
                reverse_dist.get(&(id, true)),
                lens[&id],
            )
        });
    }
    for id in to_erase {
        id_trans.remove(&id);
        graph.remove(id);
    }
}

/// Keep only nodes and edges reachable from pos_1 going forward and from
/// pos_2 going backward (in one orientation pairing or the other), with no
/// length bound.
fn prune_to_paths(
    graph: &mut LocalGraph,
    id_trans: &mut HashMap<usize, usize>,
    pos_1: Pos,
    pos_2: Pos,
    duplicate_node_1: Option<usize>,
    duplicate_node_2: Option<usize>,
) {
    let mut forward_reachable: HashSet<(usize, bool)> = HashSet::new();
    let mut reverse_reachable: HashSet<(usize, bool)> = HashSet::new();
    let mut stack: Vec<(usize, bool)> = Vec::new();

    stack.push((pos_1.node_id, pos_1.is_rev));
    forward_reachable.insert((pos_1.node_id, pos_1.is_rev));
    if let Some(dup) = duplicate_node_1 {
        stack.push((dup, pos_1.is_rev));
        forward_reachable.insert((dup, pos_1.is_rev));
    }
    while let Some((id, rev)) = stack.pop() {
        for e in graph.node(id).side(rev) {
            let next = (e.peer, e.reversing != rev);
            if forward_reachable.insert(next) {
                stack.push(next);
            }
        }
    }

    stack.push((pos_2.node_id, !pos_2.is_rev));
    reverse_reachable.insert((pos_2.node_id, !pos_2.is_rev));
    if let Some(dup) = duplicate_node_2 {
        stack.push((dup, !pos_2.is_rev));
        reverse_reachable.insert((dup, !pos_2.is_rev));
    }
    while let Some((id, rev)) = stack.pop() {
        for e in graph.node(id).side(rev) {
            let next = (e.peer, e.reversing != rev);
            if reverse_reachable.insert(next) {
                stack.push(next);
            }
        }
    }

    let mut to_erase = Vec::new();
    for id in graph.ids() {
        let keep = (forward_reachable.contains(&(id, true))
            && reverse_reachable.contains(&(id, false)))
            || (forward_reachable.contains(&(id, false))
                && reverse_reachable.contains(&(id, true)));
        if !keep {
            to_erase.push(id);
            continue;
        }
        let node = graph.node_mut(id);
        node.edges_right.retain(|e| {
            (forward_reachable.contains(&(id, false))
                && reverse_reachable.contains(&(e.peer, !e.reversing)))
                || (forward_reachable.contains(&(e.peer, !e.reversing))
                    && reverse_reachable.contains(&(id, false)))
        });
        node.edges_left.retain(|e| {
            (forward_reachable.contains(&(id, true))
                && reverse_reachable.contains(&(e.peer, e.reversing)))
                || (forward_reachable.contains(&(e.peer, e.reversing))
                    && reverse_reachable.contains(&(id, true)))
        });
    }
    for id in to_erase {
        id_trans.remove(&id);
        graph.remove(id);
    }
}

/// Iteratively peel nodes with an edge-free side, except the protected
/// endpoint and duplicate ids, then drop edges whose peer was peeled.
fn prune_extra_tips(
    graph: &mut LocalGraph,
    id_trans: &mut HashMap<usize, usize>,
    protected: &[usize],
) {
    let mut left_degree: HashMap<usize, i64> = HashMap::new();
    let mut right_degree: HashMap<usize, i64> = HashMap::new();
    for (id, node) in graph.iter() {
        left_degree.insert(*id, node.edges_left.len() as i64);
        right_degree.insert(*id, node.edges_right.len() as i64);
    }

    let mut to_check: VecDeque<usize> = VecDeque::new();
    for seed in graph.ids() {
        to_check.push_front(seed);
        while let Some(id) = to_check.pop_back() {
            if protected.contains(&id) || !graph.contains(id) {
                continue;
            }
            if left_degree[&id] == 0 {
                trace!(id, "peeling left tip");
                id_trans.remove(&id);
                for e in graph.snapshot(id, false) {
                    let degree = if e.reversing {
                        right_degree.get_mut(&e.peer)
                    } else {
                        left_degree.get_mut(&e.peer)
                    };
                    if let Some(degree) = degree {
                        *degree -= 1;
                    }
                    to_check.push_front(e.peer);
                }
                graph.remove(id);
            } else if right_degree[&id] == 0 {
                trace!(id, "peeling right tip");
                id_trans.remove(&id);
                for e in graph.snapshot(id, true) {
                    let degree = if e.reversing {
                        left_degree.get_mut(&e.peer)
                    } else {
                        right_degree.get_mut(&e.peer)
                    };
                    if let Some(degree) = degree {
                        *degree -= 1;
                    }
                    to_check.push_front(e.peer);
                }
                graph.remove(id);
            }
        }
    }

    // sweep out edges that point at peeled nodes
    let alive: HashSet<usize> = graph.ids().into_iter().collect();
    for id in graph.ids() {
        let node = graph.node_mut(id);
        node.edges_left.retain(|e| alive.contains(&e.peer));
        node.edges_right.retain(|e| alive.contains(&e.peer));
    }
}

/// Write the local graph into the sink, emitting each edge exactly once:
/// from a left list when the peer id is strictly larger (or it is a
/// reversing self loop), from a right list when the peer id is at least as
/// large.
fn emit_subgraph<S: GraphSink>(
    graph: &LocalGraph,
    id_trans: &mut HashMap<usize, usize>,
    into: &mut S,
) -> Result<(), ExtractError> {
    for (id, _) in graph.iter() {
        id_trans.entry(*id).or_insert(*id);
    }
    for (id, node) in graph.iter() {
        into.add_node(*id, node.sequence.clone())?;
        for e in &node.edges_left {
            if e.peer > *id || (e.peer == *id && e.reversing) {
                into.add_edge(*id, e.peer, true, !e.reversing)?;
            }
        }
        for e in &node.edges_right {
            if e.peer >= *id {
                into.add_edge(*id, e.peer, false, e.reversing)?;
            }
        }
    }
    Ok(())
}
