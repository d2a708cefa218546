use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;

/// Payload used for the one-shot connectivity check.
pub const CONNECTION_CHECK_PAYLOAD: &str = "nodes=1-2-3T";

static NODE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d+)[TUVWXY]?$").expect("node suffix pattern should always be valid")
});

/// Reduce a node id to its numeric base id.
///
/// The controller reports node ids with a single trailing letter (`22003T`),
/// and setter nodes use a different letter for the same base id. Anything
/// that does not look like digits plus an optional known suffix is returned
/// unchanged.
#[must_use]
pub fn strip_node_suffix(node_id: &str) -> &str {
    if node_id.is_empty() {
        return node_id;
    }

    match NODE_SUFFIX.captures(node_id).and_then(|caps| caps.get(1)) {
        Some(base) => base.as_str(),
        None => {
            log::warn!("Unexpected node id format {node_id:?}, using it as-is");
            node_id
        }
    }
}

/// Build the form body for a batched read of `nodes`.
///
/// Every node is requested through its `T` (text) variant: `nodes=1T-2T-3T`.
pub fn build_payload<'a>(nodes: impl IntoIterator<Item = &'a str>) -> String {
    let ids = nodes.into_iter().map(strip_node_suffix).join("T-");
    format!("nodes={ids}T")
}
