use thiserror::Error;

/// Errors surfaced by the extractor and the graph interfaces.
///
/// "Target not reachable under the length bound" is not an error: the
/// extractor reports it as a successful call with an empty sink and an
/// empty translation map.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The output sink already contained nodes or edges on entry.
    #[error("must extract into an empty graph")]
    NonEmptyOutput,

    /// The source view could not resolve a node id or position.
    #[error("source graph access failed: {0}")]
    GraphAccess(String),

    /// The output sink rejected a node or edge.
    #[error("sink rejected write: {0}")]
    Sink(String),

    /// An internal bookkeeping invariant broke; indicates a bug.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl ExtractError {
    pub(crate) fn unknown_node(node_id: usize) -> Self {
        ExtractError::GraphAccess(format!("node {} is not in the graph", node_id))
    }
}
