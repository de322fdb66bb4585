pub mod call_node_info;
pub mod call_node_table;
pub mod samples;
pub mod thread;

pub use call_node_info::{
    CallNodeInfo, InvertedCallNodeInfo, NonInvertedCallNodeInfo, compute_call_node_info,
    sample_index_to_call_node_index,
};
pub use call_node_table::{
    CallNodeColumns, CallNodeFrame, CallNodeTable, CallNodeTableBuilder, InlinedInto,
    PendingCallNode,
};
pub use samples::SamplesTable;
pub use thread::{
    FrameTable, FuncTable, NativeSymbolTable, ResourceTable, ResourceType, StackTable, Thread,
    ThreadBuilder,
};

use thiserror::Error;

/// A table whose columns break one of its structural invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    #[error("column `{column}` has {actual} rows, expected {expected}")]
    ColumnLength {
        column: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("row {index} has prefix {prefix}, which does not precede it")]
    PrefixOrder { index: usize, prefix: usize },

    #[error("call node {index} has depth {actual}, expected {expected}")]
    Depth {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("call node {index} has an inconsistent subtree range ending at {end}")]
    SubtreeRange { index: usize, end: usize },

    #[error("call node {index} has next sibling {actual:?}, expected {expected:?}")]
    NextSibling {
        index: usize,
        expected: Option<usize>,
        actual: Option<usize>,
    },

    #[error("stack {stack} refers to frame {frame}, but the frame table has {len} rows")]
    FrameOutOfRange {
        stack: usize,
        frame: usize,
        len: usize,
    },

    #[error("frame {frame} refers to func {func}, but the func table has {len} rows")]
    FuncOutOfRange {
        frame: usize,
        func: usize,
        len: usize,
    },

    #[error("sample {index} at {time}ms is earlier than the sample before it")]
    UnsortedSamples { index: usize, time: f64 },
}
