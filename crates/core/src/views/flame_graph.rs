use stackchart_protocol::{FlameGraphRow, FlameGraphTiming};
use tracing::{debug, instrument};

use crate::call_tree::CallTree;

/// Lay out a call tree as a flame graph: siblings side by side, heaviest
/// first, each box as wide as its share of the root total.
///
/// Every child starts where its parent starts, so children are nested within
/// their parent's span.
#[instrument(level = "debug", skip_all, fields(roots = call_tree.roots().len()))]
pub fn flame_graph_timing(call_tree: &CallTree<'_>) -> FlameGraphTiming {
    let mut timing: FlameGraphTiming = Vec::new();
    // Start offset of the next box at each depth.
    let mut time_offset: Vec<f64> = vec![0.0];
    let mut stack: Vec<_> = call_tree.roots().iter().rev().copied().collect();

    while let Some(node) = stack.pop() {
        let depth = call_tree.depth(node);
        let data = call_tree.node_data(node);
        if timing.len() <= depth {
            timing.resize_with(depth + 1, FlameGraphRow::default);
        }
        if time_offset.len() <= depth + 1 {
            time_offset.resize(depth + 2, 0.0);
        }

        let start = time_offset[depth];
        let end = start + data.total_relative.abs();
        timing[depth].push(start, end, data.self_relative.abs(), node);

        time_offset[depth + 1] = start;
        time_offset[depth] = end;
        stack.extend(call_tree.children(node).iter().rev());
    }

    debug!(
        rows = timing.len(),
        boxes = timing.iter().map(FlameGraphRow::len).sum::<usize>(),
        "built flame graph timing"
    );
    timing
}
