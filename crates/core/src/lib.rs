//! Call trees, stack charts and flame graphs for sampled profiles.
//!
//! A thread's stacks are merged into a pre-order call-node table
//! ([`model::compute_call_node_info`]), sample weights are summed into
//! [`CallTree`] timings, and the views turn either into rows ready to paint.

pub mod call_tree;
pub mod config;
pub mod model;
pub mod views;

pub use call_tree::{CallTree, CallTreeTimings, compute_call_tree, compute_call_tree_timings};
pub use config::{ConfigError, EngineConfig};
pub use model::{CallNodeInfo, CallNodeTable, TableError, Thread, ThreadBuilder};
pub use views::{
    StackChartViewport, StackTimingSource, flame_graph_timing, inverted_stack_timing_by_depth,
    stack_timing_by_depth,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
