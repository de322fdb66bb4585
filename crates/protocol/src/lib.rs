pub mod category;
pub mod display;
pub mod strings;
pub mod timing;
pub mod types;
pub mod weight;

pub use category::{Category, CategoryColor, category_pair_label};
pub use display::{CallNodeData, CallNodeDisplayData, InliningBadge, OriginIcon};
pub use strings::{SharedStr, StringTable};
pub use timing::{
    FlameGraphRow, FlameGraphTiming, StackTimingByDepth, StackTimingRow, StackTimingSpan,
    stack_timing_ancestors,
};
pub use types::{CallNodeIndex, CallNodePath, FuncIndex, StackIndex};
pub use weight::{WeightType, format_number, format_percent};
