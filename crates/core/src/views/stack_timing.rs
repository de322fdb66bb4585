use std::ops::Range;

use serde::{Deserialize, Serialize};
use stackchart_protocol::{CallNodeIndex, StackTimingByDepth, StackTimingRow, StackTimingSpan};
use tracing::{debug, instrument, trace};

use crate::config::EngineConfig;
use crate::model::{CallNodeTable, SamplesTable};

/// The visible time range of a stack chart and its width in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackChartViewport {
    pub range_start: f64,
    pub range_end: f64,
    pub width_dev: f64,
}

impl StackChartViewport {
    pub fn new(range_start: f64, range_end: f64, width_dev: f64) -> Self {
        Self {
            range_start,
            range_end,
            width_dev,
        }
    }
}

/// Samples and the non-inverted call-node table a stack chart is built from.
#[derive(Debug, Clone, Copy)]
pub struct StackTimingSource<'a> {
    pub times: &'a [f64],
    pub sample_call_nodes: &'a [Option<CallNodeIndex>],
    pub call_node_table: &'a CallNodeTable,
    /// Number of rows to produce; deeper call nodes are drawn at their
    /// ancestor in the last row.
    pub max_depth_plus_one: usize,
    pub interval: f64,
}

impl<'a> StackTimingSource<'a> {
    pub fn new(
        samples: &'a SamplesTable,
        sample_call_nodes: &'a [Option<CallNodeIndex>],
        call_node_table: &'a CallNodeTable,
        config: &EngineConfig,
    ) -> Self {
        assert_eq!(
            samples.len(),
            sample_call_nodes.len(),
            "one call node entry per sample"
        );
        Self {
            times: samples.times(),
            sample_call_nodes,
            call_node_table,
            max_depth_plus_one: call_node_table.max_depth_plus_one(),
            interval: config.interval,
        }
    }

    pub fn with_max_depth_plus_one(mut self, max_depth_plus_one: usize) -> Self {
        self.max_depth_plus_one = max_depth_plus_one;
        self
    }
}

/// Converts sample times into even device-pixel positions.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DevicePixelMapper {
    range_start: f64,
    dev_per_ms: f64,
    width_dev: f64,
}

impl DevicePixelMapper {
    /// `None` for an empty or inverted range, or a chart without width.
    pub(crate) fn new(viewport: &StackChartViewport) -> Option<Self> {
        let duration = viewport.range_end - viewport.range_start;
        if !(duration > 0.0 && viewport.width_dev > 0.0) {
            return None;
        }
        Some(Self {
            range_start: viewport.range_start,
            dev_per_ms: viewport.width_dev / duration,
            width_dev: viewport.width_dev,
        })
    }

    /// Position of `time`, clamped to the chart and rounded to an even pixel
    /// so that adjacent boxes share edges exactly.
    #[inline]
    pub(crate) fn x(&self, time: f64) -> f64 {
        let x = ((time - self.range_start) * self.dev_per_ms).clamp(0.0, self.width_dev);
        (x * 0.5).round() * 2.0
    }
}

/// Samples that can contribute a box to the viewport: from the last sample
/// starting before the range (it is still running at the range start) to the
/// first sample at or after the range end, exclusive. Leading gaps are
/// skipped.
pub(crate) fn samples_in_view(
    times: &[f64],
    sample_call_nodes: &[Option<CallNodeIndex>],
    viewport: &StackChartViewport,
) -> Range<usize> {
    let mut start = times
        .partition_point(|&time| time < viewport.range_start)
        .saturating_sub(1);
    let end = times.partition_point(|&time| time < viewport.range_end);
    while start < end && sample_call_nodes[start].is_none() {
        start += 1;
    }
    start..end
}

/// Time at which boxes still open after the last sample in view end: the
/// next sample, or one interval after the last sample, capped at the range
/// end.
pub(crate) fn view_end_time(
    times: &[f64],
    samples: &Range<usize>,
    interval: f64,
    viewport: &StackChartViewport,
) -> f64 {
    let end = match times.get(samples.end) {
        Some(&next) => next,
        None => samples
            .end
            .checked_sub(1)
            .map_or(viewport.range_end, |last| times[last] + interval),
    };
    end.min(viewport.range_end)
}

#[derive(Debug, Clone, Copy)]
struct OpenSpan {
    sample_index: usize,
    call_node: CallNodeIndex,
    start_dev: f64,
    is_selected_path: bool,
}

const CLOSED: OpenSpan = OpenSpan {
    sample_index: 0,
    call_node: CallNodeIndex(0),
    start_dev: 0.0,
    is_selected_path: false,
};

/// Build the rows of a time-ordered stack chart.
///
/// Consecutive samples in the same call node extend one box per depth; a
/// change of call node closes the boxes below the deepest shared ancestor and
/// opens new ones. Gap samples close every box. Boxes narrower than one
/// snapped pixel step are dropped.
///
/// Boxes on the path from a root to `selected` are flagged as selected.
#[instrument(level = "debug", skip_all, fields(rows = source.max_depth_plus_one))]
pub fn stack_timing_by_depth(
    source: &StackTimingSource<'_>,
    viewport: &StackChartViewport,
    selected: Option<CallNodeIndex>,
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
    let mut path = vec![CallNodeIndex(0); row_count];
    let mut previous: Option<Option<CallNodeIndex>> = None;

    for sample_index in samples.clone() {
        let call_node = source.sample_call_nodes[sample_index]
            .map(|node| clip_to_rows(table, node, row_count));
        if previous == Some(call_node) {
            continue;
        }
        previous = Some(call_node);
        let x = mapper.x(source.times[sample_index]);

        let Some(call_node) = call_node else {
            commit(&mut timing, table, &open[..open_count], 0, x);
            open_count = 0;
            continue;
        };

        let depth = table.depth(call_node);
        let mut ancestor = Some(call_node);
        for slot in path[..=depth].iter_mut().rev() {
            if let Some(node) = ancestor {
                *slot = node;
                ancestor = table.prefix(node);
            }
        }

        let mut shared = open_count.min(depth + 1);
        while shared > 0 && open[shared - 1].call_node != path[shared - 1] {
            shared -= 1;
        }
        commit(&mut timing, table, &open[..open_count], shared, x);

        for (slot, &node) in open[shared..=depth].iter_mut().zip(&path[shared..=depth]) {
            let is_selected_path =
                selected.is_some_and(|selected| table.is_ancestor_or_self(node, selected));
            *slot = OpenSpan {
                sample_index,
                call_node: node,
                start_dev: x,
                is_selected_path,
            };
        }
        open_count = depth + 1;
    }

    let end_time = view_end_time(source.times, &samples, source.interval, viewport);
    let end_x = mapper.x(end_time);
    commit(&mut timing, table, &open[..open_count], 0, end_x);

    debug!(
        samples_in_view = samples.len(),
        spans = timing.iter().map(StackTimingRow::len).sum::<usize>(),
        "built stack timing"
    );
    timing
}

fn clip_to_rows(table: &CallNodeTable, mut node: CallNodeIndex, row_count: usize) -> CallNodeIndex {
    while table.depth(node) >= row_count {
        match table.prefix(node) {
            Some(prefix) => node = prefix,
            None => break,
        }
    }
    node
}

/// Close the open boxes at depths `keep..`, deepest first, so that a child's
/// parent index is the slot its parent is about to take.
fn commit(
    timing: &mut [StackTimingRow],
    table: &CallNodeTable,
    open: &[OpenSpan],
    keep: usize,
    end_dev: f64,
) {
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
            func: table.func(span.call_node),
            category: table.category(span.call_node),
            is_selected_path: span.is_selected_path,
            parent_index_in_previous_row,
        });
    }
}

#[cfg(test)]
mod tests {
    use stackchart_protocol::FuncIndex;

    use super::*;
    use crate::model::{CallNodeInfo, Thread, ThreadBuilder, compute_call_node_info};

    struct Fixture {
        thread: Thread,
        table: CallNodeTable,
        sample_call_nodes: Vec<Option<CallNodeIndex>>,
    }

    impl Fixture {
        fn new(builder: ThreadBuilder) -> Self {
            let thread = builder.build().unwrap();
            let info = compute_call_node_info(&thread, 0).unwrap();
            let sample_call_nodes = info.sample_call_nodes(&thread.samples);
            Self {
                table: info.call_node_table().clone(),
                thread,
                sample_call_nodes,
            }
        }

        fn source(&self) -> StackTimingSource<'_> {
            StackTimingSource::new(
                &self.thread.samples,
                &self.sample_call_nodes,
                &self.table,
                &EngineConfig::default(),
            )
        }

        fn func(&self, name: &str) -> FuncIndex {
            self.thread.func_by_name(name).unwrap()
        }
    }

    fn boxes(row: &StackTimingRow) -> Vec<(f64, f64)> {
        row.spans().map(|s| (s.start_dev, s.end_dev)).collect()
    }

    #[test]
    fn shared_prefix_stays_open() {
        let fixture = Fixture::new(
            ThreadBuilder::new()
                .sample(0.0, &["A", "B", "C"])
                .sample(1.0, &["A", "B", "D"]),
        );
        let viewport = StackChartViewport::new(0.0, 2.0, 100.0);
        let timing = stack_timing_by_depth(&fixture.source(), &viewport, None);

        assert_eq!(timing.len(), 3);
        assert_eq!(boxes(&timing[0]), vec![(0.0, 100.0)]);
        assert_eq!(boxes(&timing[1]), vec![(0.0, 100.0)]);
        assert_eq!(boxes(&timing[2]), vec![(0.0, 50.0), (50.0, 100.0)]);
        assert_eq!(timing[2].func, vec![fixture.func("C"), fixture.func("D")]);
        assert_eq!(timing[2].sample_index, vec![0, 1]);
        assert_eq!(
            timing[2].parent_index_in_previous_row,
            vec![Some(0), Some(0)]
        );
        assert_eq!(timing[0].parent_index_in_previous_row, vec![None]);
    }

    #[test]
    fn degenerate_viewport_yields_empty_rows() {
        let fixture = Fixture::new(ThreadBuilder::new().sample(0.0, &["A", "B"]));
        for viewport in [
            StackChartViewport::new(1.0, 1.0, 100.0),
            StackChartViewport::new(2.0, 1.0, 100.0),
            StackChartViewport::new(0.0, 1.0, 0.0),
        ] {
            let timing = stack_timing_by_depth(&fixture.source(), &viewport, None);
            assert_eq!(timing.len(), 2);
            assert!(timing.iter().all(StackTimingRow::is_empty));
        }
    }

    #[test]
    fn gap_closes_every_box() {
        let fixture = Fixture::new(
            ThreadBuilder::new()
                .sample(0.0, &["A", "B"])
                .gap(1.0)
                .sample(2.0, &["A", "B"]),
        );
        let viewport = StackChartViewport::new(0.0, 3.0, 300.0);
        let timing = stack_timing_by_depth(&fixture.source(), &viewport, None);
        assert_eq!(boxes(&timing[0]), vec![(0.0, 100.0), (200.0, 300.0)]);
        assert_eq!(boxes(&timing[1]), vec![(0.0, 100.0), (200.0, 300.0)]);
        assert_eq!(
            timing[1].parent_index_in_previous_row,
            vec![Some(0), Some(1)]
        );
    }

    #[test]
    fn last_box_ends_one_interval_after_last_sample() {
        let fixture = Fixture::new(ThreadBuilder::new().sample(0.0, &["A"]).sample(1.0, &["B"]));
        let viewport = StackChartViewport::new(0.0, 10.0, 100.0);
        let timing = stack_timing_by_depth(&fixture.source(), &viewport, None);
        assert_eq!(boxes(&timing[0]), vec![(0.0, 10.0), (10.0, 20.0)]);
    }

    #[test]
    fn sample_before_range_is_clamped() {
        let fixture = Fixture::new(
            ThreadBuilder::new()
                .sample(0.0, &["A"])
                .sample(4.0, &["B"])
                .sample(8.0, &["C"]),
        );
        let viewport = StackChartViewport::new(2.0, 6.0, 40.0);
        let timing = stack_timing_by_depth(&fixture.source(), &viewport, None);
        assert_eq!(boxes(&timing[0]), vec![(0.0, 20.0), (20.0, 40.0)]);
        assert_eq!(timing[0].func, vec![fixture.func("A"), fixture.func("B")]);
    }

    #[test]
    fn leading_gaps_are_skipped() {
        let times = [0.0, 1.0];
        let nodes = [None, Some(CallNodeIndex(0))];
        let viewport = StackChartViewport::new(0.5, 2.0, 10.0);
        assert_eq!(samples_in_view(&times, &nodes, &viewport), 1..2);
    }

    #[test]
    fn selected_path_is_flagged() {
        let fixture = Fixture::new(
            ThreadBuilder::new()
                .sample(0.0, &["A", "B", "C"])
                .sample(1.0, &["A", "B", "D"]),
        );
        // Table: A(0) B(1) C(2) D(3)
        let viewport = StackChartViewport::new(0.0, 2.0, 100.0);
        let timing = stack_timing_by_depth(&fixture.source(), &viewport, Some(CallNodeIndex(3)));
        assert_eq!(timing[0].is_selected_path, vec![true]);
        assert_eq!(timing[1].is_selected_path, vec![true]);
        assert_eq!(timing[2].is_selected_path, vec![false, true]);
    }

    #[test]
    fn deep_nodes_clip_to_last_row() {
        let fixture = Fixture::new(
            ThreadBuilder::new()
                .sample(0.0, &["A", "B", "C"])
                .sample(1.0, &["A", "B", "D"])
                .sample(2.0, &["A", "E"]),
        );
        let viewport = StackChartViewport::new(0.0, 3.0, 300.0);
        let source = fixture.source().with_max_depth_plus_one(2);
        let timing = stack_timing_by_depth(&source, &viewport, None);
        assert_eq!(timing.len(), 2);
        assert_eq!(boxes(&timing[1]), vec![(0.0, 200.0), (200.0, 300.0)]);
        assert_eq!(timing[1].func, vec![fixture.func("B"), fixture.func("E")]);
    }

    #[test]
    fn narrow_boxes_are_dropped() {
        let fixture = Fixture::new(
            ThreadBuilder::new()
                .sample(0.0, &["A"])
                .sample(0.1, &["B"])
                .sample(0.2, &["A"]),
        );
        let viewport = StackChartViewport::new(0.0, 10.0, 100.0);
        let timing = stack_timing_by_depth(&fixture.source(), &viewport, None);
        // B lasts 0.1ms = 1 pixel and snaps to a zero-width box.
        assert_eq!(boxes(&timing[0]), vec![(0.0, 2.0), (2.0, 12.0)]);
    }

    #[test]
    fn mapper_snaps_to_even_pixels() {
        let mapper = DevicePixelMapper::new(&StackChartViewport::new(0.0, 100.0, 100.0)).unwrap();
        assert_eq!(mapper.x(3.0), 4.0);
        assert_eq!(mapper.x(2.9), 2.0);
        assert_eq!(mapper.x(-5.0), 0.0);
        assert_eq!(mapper.x(500.0), 100.0);
    }
}
