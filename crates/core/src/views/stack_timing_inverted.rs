use stackchart_protocol::{FuncIndex, StackTimingByDepth, StackTimingRow, StackTimingSpan};
use tracing::{debug, instrument, trace};

use super::stack_timing::{
    DevicePixelMapper, StackChartViewport, StackTimingSource, samples_in_view, view_end_time,
};

#[derive(Debug, Clone, Copy)]
struct OpenSpan {
    sample_index: usize,
    func: FuncIndex,
    category: usize,
    start_dev: f64,
    is_selected_path: bool,
}

const CLOSED: OpenSpan = OpenSpan {
    sample_index: 0,
    func: FuncIndex(0),
    category: 0,
    start_dev: 0.0,
    is_selected_path: false,
};

/// Build stack chart rows with every stack read upside down: row 0 holds the
/// function each sample was running, row 1 its caller, and so on.
///
/// `source` is the non-inverted data. A box stays open while consecutive
/// samples agree on the function at its depth and at every shallower depth.
/// Its category is the one all merged samples share, or `default_category`
/// once they disagree.
///
/// `selected_path` is an inverted call path, leaf function first. A box is
/// selected when its depth and all shallower depths follow that path.
#[instrument(level = "debug", skip_all, fields(rows = source.max_depth_plus_one))]
pub fn inverted_stack_timing_by_depth(
    source: &StackTimingSource<'_>,
    viewport: &StackChartViewport,
    selected_path: &[FuncIndex],
    default_category: usize,
) -> StackTimingByDepth {
    let row_count = source.max_depth_plus_one;
    let mut timing: StackTimingByDepth = vec![StackTimingRow::default(); row_count];
    let Some(mapper) = DevicePixelMapper::new(viewport) else {
        trace!(?viewport, "degenerate viewport");
        return timing;
    };
    if row_count == 0 {
        return timing;
    }

    let table = source.call_node_table;
    let samples = samples_in_view(source.times, source.sample_call_nodes, viewport);
    let mut open = vec![CLOSED; row_count];
    let mut open_count = 0;
    // Number of leading open depths that follow `selected_path`.
    let mut selected_depth = 0;
    let mut stack: Vec<(FuncIndex, usize)> = Vec::with_capacity(row_count);
    let mut previous = None;

    for sample_index in samples.clone() {
        let call_node = source.sample_call_nodes[sample_index];
        if previous == Some(call_node) {
            continue;
        }
        previous = Some(call_node);
        let x = mapper.x(source.times[sample_index]);

        let Some(call_node) = call_node else {
            commit(&mut timing, &open[..open_count], 0, x);
            open_count = 0;
            selected_depth = 0;
            continue;
        };

        stack.clear();
        let mut current = Some(call_node);
        while stack.len() < row_count {
            let Some(node) = current else {
                break;
            };
            stack.push((table.func(node), table.category(node)));
            current = table.prefix(node);
        }

        let mut shared = 0;
        while shared < open_count.min(stack.len()) && open[shared].func == stack[shared].0 {
            if open[shared].category != stack[shared].1 {
                open[shared].category = default_category;
            }
            shared += 1;
        }
        commit(&mut timing, &open[..open_count], shared, x);
        selected_depth = selected_depth.min(shared);

        for (depth, &(func, category)) in stack.iter().enumerate().skip(shared) {
            let is_selected_path =
                selected_depth == depth && selected_path.get(depth) == Some(&func);
            if is_selected_path {
                selected_depth = depth + 1;
            }
            open[depth] = OpenSpan {
                sample_index,
                func,
                category,
                start_dev: x,
                is_selected_path,
            };
        }
        open_count = stack.len();
    }

    let end_time = view_end_time(source.times, &samples, source.interval, viewport);
    let end_x = mapper.x(end_time);
    commit(&mut timing, &open[..open_count], 0, end_x);

    debug!(
        samples_in_view = samples.len(),
        spans = timing.iter().map(StackTimingRow::len).sum::<usize>(),
        "built inverted stack timing"
    );
    timing
}

fn commit(timing: &mut [StackTimingRow], open: &[OpenSpan], keep: usize, end_dev: f64) {
    for depth in (keep..open.len()).rev() {
        let span = open[depth];
        if end_dev <= span.start_dev {
            continue;
        }
        let parent_index_in_previous_row = depth.checked_sub(1).map(|parent| timing[parent].len());
        timing[depth].push(StackTimingSpan {
            start_dev: span.start_dev,
            end_dev,
            sample_index: span.sample_index,
            func: span.func,
            category: span.category,
            is_selected_path: span.is_selected_path,
            parent_index_in_previous_row,
        });
    }
}
