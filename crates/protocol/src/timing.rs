use serde::{Deserialize, Serialize};

use crate::types::{CallNodeIndex, FuncIndex};

/// One box of a stack chart row, in device pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackTimingSpan {
    pub start_dev: f64,
    pub end_dev: f64,
    /// A sample covered by this box, used for hit-testing and tooltips.
    pub sample_index: usize,
    pub func: FuncIndex,
    pub category: usize,
    pub is_selected_path: bool,
    /// Index of the enclosing box in the row one depth shallower.
    pub parent_index_in_previous_row: Option<usize>,
}

/// All boxes at one stack depth, stored column-wise.
///
/// Boxes are in non-decreasing `start_dev` order and never overlap, which is
/// what makes [`StackTimingRow::span_at`] a binary search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTimingRow {
    pub start_dev: Vec<f64>,
    pub end_dev: Vec<f64>,
    pub sample_index: Vec<usize>,
    pub func: Vec<FuncIndex>,
    pub category: Vec<usize>,
    pub is_selected_path: Vec<bool>,
    pub parent_index_in_previous_row: Vec<Option<usize>>,
    pub length: usize,
}

/// Stack chart rows, indexed by depth.
pub type StackTimingByDepth = Vec<StackTimingRow>;

impl StackTimingRow {
    pub fn push(&mut self, span: StackTimingSpan) {
        debug_assert!(
            self.end_dev.last().is_none_or(|&end| end <= span.start_dev),
            "stack timing spans must not overlap"
        );
        self.start_dev.push(span.start_dev);
        self.end_dev.push(span.end_dev);
        self.sample_index.push(span.sample_index);
        self.func.push(span.func);
        self.category.push(span.category);
        self.is_selected_path.push(span.is_selected_path);
        self.parent_index_in_previous_row
            .push(span.parent_index_in_previous_row);
        self.length += 1;
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The box at `index`. Panics if the index is out of range.
    pub fn span(&self, index: usize) -> StackTimingSpan {
        StackTimingSpan {
            start_dev: self.start_dev[index],
            end_dev: self.end_dev[index],
            sample_index: self.sample_index[index],
            func: self.func[index],
            category: self.category[index],
            is_selected_path: self.is_selected_path[index],
            parent_index_in_previous_row: self.parent_index_in_previous_row[index],
        }
    }

    pub fn spans(&self) -> impl Iterator<Item = StackTimingSpan> + '_ {
        (0..self.length).map(|i| self.span(i))
    }

    /// Index of the box covering device x-position `x_dev`, if any.
    pub fn span_at(&self, x_dev: f64) -> Option<usize> {
        let candidate = self.start_dev.partition_point(|&start| start <= x_dev);
        let index = candidate.checked_sub(1)?;
        (x_dev < self.end_dev[index]).then_some(index)
    }
}

/// Walk from the box `index` at `depth` through its enclosing boxes up to
/// depth 0, yielding `(depth, index)` pairs starting with the box itself.
pub fn stack_timing_ancestors(
    timing: &[StackTimingRow],
    depth: usize,
    index: usize,
) -> impl Iterator<Item = (usize, usize)> + '_ {
    let mut next = Some((depth, index));
    std::iter::from_fn(move || {
        let (depth, index) = next?;
        next = timing[depth].parent_index_in_previous_row[index]
            .and_then(|parent| Some((depth.checked_sub(1)?, parent)));
        Some((depth, index))
    })
}

/// All flame graph boxes at one depth. `start` and `end` are fractions of the
/// root total, so a root covering the whole profile spans `[0, 1)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlameGraphRow {
    pub start: Vec<f64>,
    pub end: Vec<f64>,
    pub self_relative: Vec<f64>,
    pub call_node: Vec<CallNodeIndex>,
    pub length: usize,
}

/// Flame graph rows, indexed by depth.
pub type FlameGraphTiming = Vec<FlameGraphRow>;

impl FlameGraphRow {
    pub fn push(&mut self, start: f64, end: f64, self_relative: f64, call_node: CallNodeIndex) {
        self.start.push(start);
        self.end.push(end);
        self.self_relative.push(self_relative);
        self.call_node.push(call_node);
        self.length += 1;
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Index of the box covering `x` (a fraction of the root total), if any.
    pub fn box_at(&self, x: f64) -> Option<usize> {
        let covers = |&i: &usize| self.start[i] <= x && x < self.end[i];
        (0..self.length).find(covers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start_dev: f64, end_dev: f64, parent: Option<usize>) -> StackTimingSpan {
        StackTimingSpan {
            start_dev,
            end_dev,
            sample_index: 0,
            func: FuncIndex(0),
            category: 0,
            is_selected_path: false,
            parent_index_in_previous_row: parent,
        }
    }

    #[test]
    fn span_at_finds_covering_box() {
        let mut row = StackTimingRow::default();
        row.push(span(0.0, 10.0, None));
        row.push(span(14.0, 20.0, None));
        assert_eq!(row.span_at(0.0), Some(0));
        assert_eq!(row.span_at(9.9), Some(0));
        assert_eq!(row.span_at(12.0), None);
        assert_eq!(row.span_at(14.0), Some(1));
        assert_eq!(row.span_at(20.0), None);
        assert_eq!(row.span_at(-1.0), None);
    }

    #[test]
    fn ancestors_follow_parent_links() {
        let mut depth0 = StackTimingRow::default();
        depth0.push(span(0.0, 4.0, None));
        depth0.push(span(4.0, 10.0, None));
        let mut depth1 = StackTimingRow::default();
        depth1.push(span(6.0, 8.0, Some(1)));
        let timing = vec![depth0, depth1];

        let chain: Vec<_> = stack_timing_ancestors(&timing, 1, 0).collect();
        assert_eq!(chain, vec![(1, 0), (0, 1)]);
    }

    #[test]
    fn flame_graph_box_lookup() {
        let mut row = FlameGraphRow::default();
        row.push(0.0, 0.75, 0.5, CallNodeIndex(0));
        row.push(0.75, 1.0, 0.25, CallNodeIndex(3));
        assert_eq!(row.len(), 2);
        assert_eq!(row.box_at(0.8), Some(1));
        assert_eq!(row.box_at(1.0), None);
    }

    #[test]
    fn rows_serialize_column_wise() {
        let mut row = StackTimingRow::default();
        row.push(span(2.0, 6.0, None));
        let json = serde_json::to_value(&row).unwrap_or_default();
        assert_eq!(json["startDev"][0], 2.0);
        assert_eq!(json["length"], 1);
    }
}
