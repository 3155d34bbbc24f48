use std::collections::HashMap;

use snipgraph::{
    extract_connecting_graph, BidirectedGraph, ExtractError, ExtractOptions, Handle, Pos,
};

fn linear_chain() -> BidirectedGraph {
    // A -> B -> C, all forward
    let mut g = BidirectedGraph::new();
    g.add_node(1, b"ACG".to_vec());
    g.add_node(2, b"TT".to_vec());
    g.add_node(3, b"GGA".to_vec());
    g.add_edge(Handle::forward(1), Handle::forward(2));
    g.add_edge(Handle::forward(2), Handle::forward(3));
    g
}

fn node_seq(g: &BidirectedGraph, id: usize) -> &[u8] {
    &g.nodes[&id].sequence
}

fn identity_translation(ids: &[usize]) -> HashMap<usize, usize> {
    ids.iter().map(|&id| (id, id)).collect()
}

/// No edge in the emitted graph may touch the given side of the node.
/// The traversal leaves `from` through its end and enters `to` through its
/// start, so `from` touches the node's start side only when reversed and
/// `to` only when forward.
fn assert_tip(g: &BidirectedGraph, node_id: usize, left_side: bool) {
    for edge in &g.edges {
        if edge.from.node_id() == node_id {
            assert_ne!(
                edge.from.is_reverse(),
                left_side,
                "edge {} -> {} touches the cut side of node {}",
                edge.from,
                edge.to,
                node_id
            );
        }
        if edge.to.node_id() == node_id {
            assert_ne!(
                !edge.to.is_reverse(),
                left_side,
                "edge {} -> {} touches the cut side of node {}",
                edge.from,
                edge.to,
                node_id
            );
        }
    }
}

#[test]
fn separate_nodes_linear_chain() {
    // S1: endpoints on separate nodes, everything within the bound
    let source = linear_chain();
    let mut out = BidirectedGraph::new();
    let trans = extract_connecting_graph(
        &source,
        &mut out,
        10,
        Pos::new(1, false, 0),
        Pos::new(3, false, 2),
        ExtractOptions::default(),
    )
    .unwrap();

    assert_eq!(out.node_count(), 3);
    assert_eq!(node_seq(&out, 1), b"CG");
    assert_eq!(node_seq(&out, 2), b"TT");
    assert_eq!(node_seq(&out, 3), b"GG");
    assert_eq!(out.edge_count(), 2);
    assert!(out.has_edge(Handle::forward(1), Handle::forward(2)));
    assert!(out.has_edge(Handle::forward(2), Handle::forward(3)));
    // no fresh ids: the translation is the identity map
    assert_eq!(trans, identity_translation(&[1, 2, 3]));
    // the endpoints became tips
    assert_tip(&out, 1, true);
    assert_tip(&out, 3, false);
    out.validate().unwrap();
}

#[test]
fn target_unreachable_under_bound() {
    // S2: same graph, but the bound is too small to reach pos_2
    let source = linear_chain();
    let mut out = BidirectedGraph::new();
    let trans = extract_connecting_graph(
        &source,
        &mut out,
        3,
        Pos::new(1, false, 0),
        Pos::new(3, false, 2),
        ExtractOptions::default(),
    )
    .unwrap();

    assert_eq!(out.node_count(), 0);
    assert_eq!(out.edge_count(), 0);
    assert!(trans.is_empty());
}

#[test]
fn shared_node_reachable_trims_to_middle() {
    // S3: both positions on one node, second ahead of the first
    let mut source = BidirectedGraph::new();
    source.add_node(1, b"ACGTACGT".to_vec());
    let mut out = BidirectedGraph::new();
    let trans = extract_connecting_graph(
        &source,
        &mut out,
        10,
        Pos::new(1, false, 2),
        Pos::new(1, false, 6),
        ExtractOptions {
            include_terminal_positions: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(out.node_count(), 1);
    assert_eq!(node_seq(&out, 1), b"GTACG");
    assert_eq!(out.edge_count(), 0);
    assert_eq!(trans, identity_translation(&[1]));
}

#[test]
fn shared_node_reachable_with_terminal_cycle() {
    // S4: a non-reversing self loop around the shared endpoint node is
    // carried by two fragments and a full-length duplicate
    let mut source = BidirectedGraph::new();
    source.add_node(1, b"ACGTACGT".to_vec());
    source.add_edge(Handle::forward(1), Handle::forward(1));
    let mut out = BidirectedGraph::new();
    let trans = extract_connecting_graph(
        &source,
        &mut out,
        20,
        Pos::new(1, false, 2),
        Pos::new(1, false, 6),
        ExtractOptions {
            include_terminal_positions: true,
            detect_terminal_cycles: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(out.node_count(), 4);
    // the trimmed endpoint node, now a free-standing tip on both sides
    assert_eq!(node_seq(&out, 1), b"GTACG");
    // righthand fragment, lefthand fragment, full-length duplicate
    assert_eq!(node_seq(&out, 2), b"GTACGT");
    assert_eq!(node_seq(&out, 3), b"ACGTACG");
    assert_eq!(node_seq(&out, 4), b"ACGTACGT");

    assert_eq!(out.edge_count(), 4);
    // loop back from the righthand fragment, directly and through the
    // duplicate
    assert!(out.has_edge(Handle::forward(2), Handle::forward(3)));
    assert!(out.has_edge(Handle::forward(2), Handle::forward(4)));
    assert!(out.has_edge(Handle::forward(4), Handle::forward(3)));
    assert!(out.has_edge(Handle::forward(4), Handle::forward(4)));

    let expected: HashMap<usize, usize> = [(1, 1), (2, 1), (3, 1), (4, 1)].into_iter().collect();
    assert_eq!(trans, expected);
    out.validate().unwrap();
}

#[test]
fn shared_node_reverse_makes_sink_copy() {
    // S5: positions on opposite strands of one node with a reversing self
    // loop; the second position moves onto a fresh sink copy
    let mut source = BidirectedGraph::new();
    source.add_node(1, b"AAAT".to_vec());
    source.add_edge(Handle::forward(1), Handle::reverse(1));
    let mut out = BidirectedGraph::new();
    let trans = extract_connecting_graph(
        &source,
        &mut out,
        8,
        Pos::new(1, false, 0),
        Pos::new(1, true, 0),
        ExtractOptions {
            include_terminal_positions: true,
            detect_terminal_cycles: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(out.node_count(), 2);
    assert_eq!(node_seq(&out, 1), b"AAAT");
    assert_eq!(node_seq(&out, 2), b"T");
    assert_eq!(out.edge_count(), 1);
    // the loop became the reversing edge connecting the two copies
    assert!(out.has_edge(Handle::forward(1), Handle::reverse(2)));

    let expected: HashMap<usize, usize> = [(1, 1), (2, 1)].into_iter().collect();
    assert_eq!(trans, expected);
    out.validate().unwrap();
}

#[test]
fn shared_node_unreachable_splits_node() {
    // second position behind the first on the same strand: the node is
    // split in two and the first position moves onto the fresh fragment
    let mut source = BidirectedGraph::new();
    source.add_node(1, b"ACGT".to_vec());
    source.add_edge(Handle::forward(1), Handle::forward(1));
    let mut out = BidirectedGraph::new();
    let trans = extract_connecting_graph(
        &source,
        &mut out,
        10,
        Pos::new(1, false, 2),
        Pos::new(1, false, 1),
        ExtractOptions::default(),
    )
    .unwrap();

    assert_eq!(out.node_count(), 2);
    assert_eq!(node_seq(&out, 1), b"A");
    assert_eq!(node_seq(&out, 2), b"T");
    assert_eq!(out.edge_count(), 1);
    // the self loop now runs from the fragment back into the original
    assert!(out.has_edge(Handle::forward(2), Handle::forward(1)));

    let expected: HashMap<usize, usize> = [(1, 1), (2, 1)].into_iter().collect();
    assert_eq!(trans, expected);
    out.validate().unwrap();
}

#[test]
fn separate_nodes_terminal_cycle_duplication() {
    // a non-reversing self loop on the first endpoint survives the cut via
    // a duplicate node
    let mut source = BidirectedGraph::new();
    source.add_node(1, b"AC".to_vec());
    source.add_node(2, b"TT".to_vec());
    source.add_edge(Handle::forward(1), Handle::forward(1));
    source.add_edge(Handle::forward(1), Handle::forward(2));
    let mut out = BidirectedGraph::new();
    let trans = extract_connecting_graph(
        &source,
        &mut out,
        10,
        Pos::new(1, false, 0),
        Pos::new(2, false, 1),
        ExtractOptions {
            detect_terminal_cycles: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(out.node_count(), 3);
    assert_eq!(node_seq(&out, 1), b"C");
    assert_eq!(node_seq(&out, 2), b"T");
    assert_eq!(node_seq(&out, 3), b"AC");

    assert_eq!(out.edge_count(), 4);
    assert!(out.has_edge(Handle::forward(1), Handle::forward(2)));
    assert!(out.has_edge(Handle::forward(1), Handle::forward(3)));
    assert!(out.has_edge(Handle::forward(3), Handle::forward(2)));
    assert!(out.has_edge(Handle::forward(3), Handle::forward(3)));

    let expected: HashMap<usize, usize> = [(1, 1), (2, 2), (3, 1)].into_iter().collect();
    assert_eq!(trans, expected);
    // pos_1's inward side is still a tip; the duplicate carries the loop
    assert_tip(&out, 1, true);
    out.validate().unwrap();
}

fn branching_dag() -> BidirectedGraph {
    // 1 -> 2 -> 4 with a dead-end branch 2 -> 3
    let mut g = BidirectedGraph::new();
    g.add_node(1, b"AC".to_vec());
    g.add_node(2, b"CC".to_vec());
    g.add_node(3, b"GGGGG".to_vec());
    g.add_node(4, b"GT".to_vec());
    g.add_edge(Handle::forward(1), Handle::forward(2));
    g.add_edge(Handle::forward(2), Handle::forward(3));
    g.add_edge(Handle::forward(2), Handle::forward(4));
    g
}

#[test]
fn no_additional_tips_peels_dead_branch() {
    let source = branching_dag();
    let mut out = BidirectedGraph::new();
    let trans = extract_connecting_graph(
        &source,
        &mut out,
        10,
        Pos::new(1, false, 0),
        Pos::new(4, false, 1),
        ExtractOptions {
            no_additional_tips: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(out.node_count(), 3);
    assert!(!out.nodes.contains_key(&3));
    assert_eq!(out.edge_count(), 2);
    assert!(out.has_edge(Handle::forward(1), Handle::forward(2)));
    assert!(out.has_edge(Handle::forward(2), Handle::forward(4)));
    assert_eq!(trans, identity_translation(&[1, 2, 4]));
    out.validate().unwrap();
}

#[test]
fn only_paths_drops_nodes_off_every_walk() {
    let source = branching_dag();
    let mut out = BidirectedGraph::new();
    let trans = extract_connecting_graph(
        &source,
        &mut out,
        10,
        Pos::new(1, false, 0),
        Pos::new(4, false, 1),
        ExtractOptions {
            only_paths: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(out.node_count(), 3);
    assert!(!out.nodes.contains_key(&3));
    assert_eq!(trans, identity_translation(&[1, 2, 4]));
}

#[test]
fn strict_max_len_drops_too_long_detour() {
    // 1 -> 2 -> 4 directly, plus a detour 2 -> 5 -> 4 that blows the bound
    let mut source = BidirectedGraph::new();
    source.add_node(1, b"AC".to_vec());
    source.add_node(2, b"CC".to_vec());
    source.add_node(4, b"GT".to_vec());
    source.add_node(5, b"GGGGG".to_vec());
    source.add_edge(Handle::forward(1), Handle::forward(2));
    source.add_edge(Handle::forward(2), Handle::forward(4));
    source.add_edge(Handle::forward(2), Handle::forward(5));
    source.add_edge(Handle::forward(5), Handle::forward(4));
    let mut out = BidirectedGraph::new();
    let trans = extract_connecting_graph(
        &source,
        &mut out,
        6,
        Pos::new(1, false, 0),
        Pos::new(4, false, 1),
        ExtractOptions {
            strict_max_len: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(out.node_count(), 3);
    assert!(!out.nodes.contains_key(&5));
    assert_eq!(out.edge_count(), 2);
    assert!(out.has_edge(Handle::forward(1), Handle::forward(2)));
    assert!(out.has_edge(Handle::forward(2), Handle::forward(4)));
    assert_eq!(trans, identity_translation(&[1, 2, 4]));
}

#[test]
fn rerunning_on_own_output_is_stable() {
    // extracting the extracted graph between the same endpoints changes
    // nothing when terminal bases are kept and any walk is allowed
    let source = linear_chain();
    let mut first = BidirectedGraph::new();
    let opts = ExtractOptions {
        include_terminal_positions: true,
        only_paths: true,
        ..Default::default()
    };
    extract_connecting_graph(
        &source,
        &mut first,
        100,
        Pos::new(1, false, 0),
        Pos::new(3, false, 2),
        opts,
    )
    .unwrap();

    let mut second = BidirectedGraph::new();
    extract_connecting_graph(
        &first,
        &mut second,
        100,
        Pos::new(1, false, 0),
        Pos::new(3, false, node_seq(&first, 3).len() - 1),
        opts,
    )
    .unwrap();

    assert_eq!(first.node_count(), second.node_count());
    for (id, node) in &first.nodes {
        assert_eq!(node.sequence, second.nodes[id].sequence);
    }
    assert_eq!(first.edges, second.edges);
}

#[test]
fn nonempty_sink_is_rejected() {
    let source = linear_chain();
    let mut out = BidirectedGraph::new();
    out.add_node(99, b"A".to_vec());
    let err = extract_connecting_graph(
        &source,
        &mut out,
        10,
        Pos::new(1, false, 0),
        Pos::new(3, false, 2),
        ExtractOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ExtractError::NonEmptyOutput));
}

#[test]
fn unknown_node_is_a_graph_access_error() {
    let source = linear_chain();
    let mut out = BidirectedGraph::new();
    let err = extract_connecting_graph(
        &source,
        &mut out,
        10,
        Pos::new(7, false, 0),
        Pos::new(3, false, 2),
        ExtractOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ExtractError::GraphAccess(_)));
}

#[test]
fn out_of_range_offset_is_a_graph_access_error() {
    let source = linear_chain();
    let mut out = BidirectedGraph::new();
    let err = extract_connecting_graph(
        &source,
        &mut out,
        10,
        Pos::new(1, false, 3),
        Pos::new(3, false, 2),
        ExtractOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ExtractError::GraphAccess(_)));
}
