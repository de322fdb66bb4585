pub mod flame_graph;
pub mod stack_timing;
pub mod stack_timing_inverted;

pub use flame_graph::flame_graph_timing;
pub use stack_timing::{StackChartViewport, StackTimingSource, stack_timing_by_depth};
pub use stack_timing_inverted::inverted_stack_timing_by_depth;
