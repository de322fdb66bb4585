use serde::Serialize;
use stackchart_protocol::CallNodeIndex;
use tracing::{debug, instrument};

use crate::model::{CallNodeTable, SamplesTable};

/// Per-call-node weights of a call tree.
///
/// `leaf` is the weight of samples whose stack ends exactly at the node.
/// `self_time` equals `leaf` for non-inverted trees; in inverted trees the
/// self weight is attributed to the roots, which are the sampled functions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallTreeTimings {
    pub leaf: Vec<f64>,
    #[serde(rename = "self")]
    pub self_time: Vec<f64>,
    pub total: Vec<f64>,
    pub has_children: Vec<bool>,
    /// Sum of `|leaf|` over all nodes.
    pub root_total_summary: f64,
}

/// Accumulate sample weights on the call node each sample ends at.
pub fn compute_call_node_leaf(
    samples: &SamplesTable,
    sample_call_nodes: &[Option<CallNodeIndex>],
    call_node_count: usize,
) -> Vec<f64> {
    assert_eq!(
        samples.len(),
        sample_call_nodes.len(),
        "one call node entry per sample"
    );
    let mut leaf = vec![0.0; call_node_count];
    for (sample, call_node) in sample_call_nodes.iter().enumerate() {
        if let Some(call_node) = call_node {
            leaf[call_node.index()] += samples.weight(sample);
        }
    }
    leaf
}

#[instrument(level = "debug", skip_all, fields(nodes = table.len(), is_inverted))]
pub fn compute_call_tree_timings(
    table: &CallNodeTable,
    samples: &SamplesTable,
    sample_call_nodes: &[Option<CallNodeIndex>],
    is_inverted: bool,
) -> CallTreeTimings {
    let count = table.len();
    let leaf = compute_call_node_leaf(samples, sample_call_nodes, count);
    let root_total_summary = leaf.iter().map(|weight| weight.abs()).sum();

    let mut total = vec![0.0; count];
    let mut has_children = vec![false; count];
    // Children come after their parent, so a reverse walk sees every subtree
    // complete before adding it to the parent.
    for index in (0..count).rev() {
        total[index] += leaf[index];
        if total[index] == 0.0 && !has_children[index] {
            continue;
        }
        if let Some(prefix) = table.prefix(CallNodeIndex(index)) {
            total[prefix.index()] += total[index];
            has_children[prefix.index()] = true;
        }
    }

    let self_time = if is_inverted {
        let mut root_of = vec![CallNodeIndex(0); count];
        let mut self_time = vec![0.0; count];
        for index in 0..count {
            let root = table
                .prefix(CallNodeIndex(index))
                .map_or(CallNodeIndex(index), |prefix| root_of[prefix.index()]);
            root_of[index] = root;
            self_time[root.index()] += leaf[index];
        }
        self_time
    } else {
        leaf.clone()
    };

    debug!(root_total_summary, "computed call tree timings");
    CallTreeTimings {
        leaf,
        self_time,
        total,
        has_children,
        root_total_summary,
    }
}
