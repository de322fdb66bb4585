mod display;
pub mod timings;

pub use timings::{CallTreeTimings, compute_call_node_leaf, compute_call_tree_timings};

use std::cell::OnceCell;
use std::collections::BTreeSet;

use stackchart_protocol::{
    CallNodeData, CallNodeDisplayData, CallNodeIndex, CallNodePath, Category, WeightType,
};

use crate::config::EngineConfig;
use crate::model::{CallNodeInfo, CallNodeTable, Thread};

/// An aggregated call tree over one call-node table, with lazily computed
/// children lists and display rows.
///
/// Nodes whose total is zero and that have no children are pruned from
/// [`CallTree::roots`] and [`CallTree::children`]. Siblings are ordered by
/// descending absolute total; equal totals keep call-node table order.
pub struct CallTree<'a> {
    thread: &'a Thread,
    categories: &'a [Category],
    call_node_info: &'a dyn CallNodeInfo,
    timings: CallTreeTimings,
    weight_type: WeightType,
    is_high_precision: bool,
    /// One slot per call node plus a last slot for the virtual root.
    children: Vec<OnceCell<Vec<CallNodeIndex>>>,
    display_data: Vec<OnceCell<CallNodeDisplayData>>,
}

impl<'a> CallTree<'a> {
    pub fn new(
        thread: &'a Thread,
        categories: &'a [Category],
        call_node_info: &'a dyn CallNodeInfo,
        timings: CallTreeTimings,
        config: &EngineConfig,
    ) -> Self {
        let count = call_node_info.call_node_table().len();
        assert_eq!(
            timings.total.len(),
            count,
            "timings must cover the call-node table"
        );
        Self {
            thread,
            categories,
            call_node_info,
            timings,
            weight_type: thread.samples.weight_type(),
            is_high_precision: config.is_high_precision,
            children: std::iter::repeat_with(OnceCell::new).take(count + 1).collect(),
            display_data: std::iter::repeat_with(OnceCell::new).take(count).collect(),
        }
    }

    pub fn call_node_table(&self) -> &CallNodeTable {
        self.call_node_info.call_node_table()
    }

    pub fn call_node_info(&self) -> &dyn CallNodeInfo {
        self.call_node_info
    }

    pub fn thread(&self) -> &Thread {
        self.thread
    }

    pub fn timings(&self) -> &CallTreeTimings {
        &self.timings
    }

    pub fn weight_type(&self) -> WeightType {
        self.weight_type
    }

    pub fn root_total_summary(&self) -> f64 {
        self.timings.root_total_summary
    }

    pub fn roots(&self) -> &[CallNodeIndex] {
        self.children_of(None)
    }

    pub fn children(&self, node: CallNodeIndex) -> &[CallNodeIndex] {
        self.children_of(Some(node))
    }

    fn children_of(&self, parent: Option<CallNodeIndex>) -> &[CallNodeIndex] {
        let slot = parent.map_or(self.call_node_table().len(), CallNodeIndex::index);
        self.children[slot].get_or_init(|| {
            let total = &self.timings.total;
            let has_children = &self.timings.has_children;
            let mut children: Vec<CallNodeIndex> = self
                .call_node_table()
                .children(parent)
                .filter(|child| total[child.index()] != 0.0 || has_children[child.index()])
                .collect();
            // Stable, so equal totals stay in table order.
            let magnitude = |node: &CallNodeIndex| total[node.index()].abs();
            children.sort_by(|a, b| magnitude(b).total_cmp(&magnitude(a)));
            children
        })
    }

    pub fn has_children(&self, node: CallNodeIndex) -> bool {
        self.timings.has_children[node.index()]
    }

    /// Every node below `node` that the tree shows, excluding `node` itself.
    pub fn all_descendants(&self, node: CallNodeIndex) -> BTreeSet<CallNodeIndex> {
        let mut descendants = BTreeSet::new();
        let mut pending = self.children(node).to_vec();
        while let Some(child) = pending.pop() {
            descendants.insert(child);
            pending.extend_from_slice(self.children(child));
        }
        descendants
    }

    pub fn parent(&self, node: CallNodeIndex) -> Option<CallNodeIndex> {
        self.call_node_table().prefix(node)
    }

    pub fn depth(&self, node: CallNodeIndex) -> usize {
        self.call_node_table().depth(node)
    }

    pub fn node_data(&self, node: CallNodeIndex) -> CallNodeData {
        let func = self.call_node_table().func(node);
        let total = self.timings.total[node.index()];
        let self_time = self.timings.self_time[node.index()];
        CallNodeData {
            func_name: self.thread.func_name(func).clone(),
            total,
            total_relative: self.relative(total),
            self_time,
            self_relative: self.relative(self_time),
        }
    }

    fn relative(&self, value: f64) -> f64 {
        if self.timings.root_total_summary == 0.0 {
            0.0
        } else {
            value / self.timings.root_total_summary
        }
    }

    /// Formatted row for `node`, computed on first request.
    pub fn display_data(&self, node: CallNodeIndex) -> &CallNodeDisplayData {
        self.display_data[node.index()].get_or_init(|| self.compute_display_data(node))
    }

    /// Path from the root to the node with the largest `|leaf|` in the
    /// subtree of `node`. The earliest node wins ties.
    pub fn find_heaviest_path_in_subtree(&self, node: CallNodeIndex) -> CallNodePath {
        let leaf = &self.timings.leaf;
        let end = self.call_node_table().subtree_range_end(node);
        let mut heaviest = node;
        let mut heaviest_weight = leaf[node.index()].abs();
        for index in node.index() + 1..end {
            let weight = leaf[index].abs();
            if weight > heaviest_weight {
                heaviest = CallNodeIndex(index);
                heaviest_weight = weight;
            }
        }
        self.call_node_info.call_node_path_from_index(heaviest)
    }

    /// The heaviest path below `node`, cut at `node` and reversed, so that it
    /// starts with the heaviest leaf function. This is the path leading back
    /// to `node`'s function once the tree is inverted.
    pub fn find_heavy_path_to_same_function_after_inversion(
        &self,
        node: Option<CallNodeIndex>,
    ) -> CallNodePath {
        let Some(node) = node else {
            return Vec::new();
        };
        let mut path = self.find_heaviest_path_in_subtree(node);
        let mut suffix = path.split_off(self.depth(node));
        suffix.reverse();
        suffix
    }
}

/// Map samples to call nodes, compute timings and wrap everything in a
/// [`CallTree`].
pub fn compute_call_tree<'a>(
    thread: &'a Thread,
    categories: &'a [Category],
    call_node_info: &'a dyn CallNodeInfo,
    config: &EngineConfig,
) -> CallTree<'a> {
    let sample_call_nodes = call_node_info.sample_call_nodes(&thread.samples);
    let timings = compute_call_tree_timings(
        call_node_info.call_node_table(),
        &thread.samples,
        &sample_call_nodes,
        call_node_info.is_inverted(),
    );
    CallTree::new(thread, categories, call_node_info, timings, config)
}
