use stackchart_protocol::{CallNodeIndex, CallNodePath, FuncIndex, StackIndex};
use tracing::{debug, instrument};

use super::call_node_table::{CallNodeFrame, CallNodeTable, CallNodeTableBuilder, InlinedInto};
use super::{SamplesTable, TableError, Thread};

/// A call-node table together with the mapping from stacks into it.
///
/// Implemented for both the non-inverted tree and the inverted tree, whose
/// roots are the functions that were running when samples were taken.
pub trait CallNodeInfo {
    fn call_node_table(&self) -> &CallNodeTable;

    fn is_inverted(&self) -> bool;

    /// The non-inverted table, also for inverted info.
    fn non_inverted_call_node_table(&self) -> &CallNodeTable;

    /// Stack index to call node in [`CallNodeInfo::call_node_table`].
    fn stack_index_to_call_node_index(&self) -> &[CallNodeIndex];

    fn stack_index_to_non_inverted_call_node_index(&self) -> &[CallNodeIndex];

    /// The functions from the root down to `node`.
    fn call_node_path_from_index(&self, node: CallNodeIndex) -> CallNodePath {
        let table = self.call_node_table();
        let mut path = Vec::with_capacity(table.depth(node) + 1);
        let mut current = Some(node);
        while let Some(node) = current {
            path.push(table.func(node));
            current = table.prefix(node);
        }
        path.reverse();
        path
    }

    /// The call node reached by following `path` from the roots.
    fn call_node_index_from_path(&self, path: &[FuncIndex]) -> Option<CallNodeIndex> {
        let table = self.call_node_table();
        let mut node = None;
        for &func in path {
            let child = table.children(node).find(|&child| table.func(child) == func)?;
            node = Some(child);
        }
        node
    }

    /// Call node of every sample in `samples`, `None` for gaps.
    fn sample_call_nodes(&self, samples: &SamplesTable) -> Vec<Option<CallNodeIndex>> {
        sample_index_to_call_node_index(samples, self.stack_index_to_call_node_index())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NonInvertedCallNodeInfo {
    table: CallNodeTable,
    stack_to_call_node: Vec<CallNodeIndex>,
}

impl CallNodeInfo for NonInvertedCallNodeInfo {
    fn call_node_table(&self) -> &CallNodeTable {
        &self.table
    }

    fn is_inverted(&self) -> bool {
        false
    }

    fn non_inverted_call_node_table(&self) -> &CallNodeTable {
        &self.table
    }

    fn stack_index_to_call_node_index(&self) -> &[CallNodeIndex] {
        &self.stack_to_call_node
    }

    fn stack_index_to_non_inverted_call_node_index(&self) -> &[CallNodeIndex] {
        &self.stack_to_call_node
    }
}

/// Merge the stacks of `thread` into a pre-order call-node table.
#[instrument(level = "debug", skip_all, fields(stacks = thread.stack_table.len()))]
pub fn compute_call_node_info(
    thread: &Thread,
    default_category: usize,
) -> Result<NonInvertedCallNodeInfo, TableError> {
    let stacks = &thread.stack_table;
    let frames = &thread.frame_table;
    if stacks.prefix.len() != stacks.frame.len() {
        return Err(TableError::ColumnLength {
            column: "frame",
            expected: stacks.prefix.len(),
            actual: stacks.frame.len(),
        });
    }

    let mut builder = CallNodeTableBuilder::new(default_category);
    let mut pending = Vec::with_capacity(stacks.len());
    let mut stack_category: Vec<(usize, usize)> = Vec::with_capacity(stacks.len());

    for (index, (&prefix, &frame)) in stacks.prefix.iter().zip(&stacks.frame).enumerate() {
        if let Some(prefix) = prefix
            && prefix.index() >= index
        {
            return Err(TableError::PrefixOrder {
                index,
                prefix: prefix.index(),
            });
        }
        if frame >= frames.len() {
            return Err(TableError::FrameOutOfRange {
                stack: index,
                frame,
                len: frames.len(),
            });
        }
        let func = frames.func[frame];
        if func.index() >= thread.func_table.len() {
            return Err(TableError::FuncOutOfRange {
                frame,
                func: func.index(),
                len: thread.func_table.len(),
            });
        }

        let (category, subcategory) = match frames.category[frame] {
            Some(category) => (category, frames.subcategory[frame].unwrap_or(0)),
            None => match prefix {
                Some(prefix) => stack_category[prefix.index()],
                None => (default_category, 0),
            },
        };
        stack_category.push((category, subcategory));

        let inlined_into = if frames.inline_depth[frame] > 0 {
            frames.native_symbol[frame].map(InlinedInto::Symbol)
        } else {
            None
        };
        let parent = prefix.map(|prefix| pending[prefix.index()]);
        pending.push(builder.intern(
            parent,
            CallNodeFrame {
                func,
                category,
                subcategory,
                inlined_into,
            },
        ));
    }

    let (table, final_index) = builder.finish();
    let stack_to_call_node = pending
        .iter()
        .map(|node| final_index[node.index()])
        .collect();
    debug!(
        call_nodes = table.len(),
        max_depth_plus_one = table.max_depth_plus_one(),
        "computed call node table"
    );
    Ok(NonInvertedCallNodeInfo {
        table,
        stack_to_call_node,
    })
}

impl NonInvertedCallNodeInfo {
    /// Build the inverted tree, in which every call node's path is read from
    /// the leaf function back to the root.
    #[instrument(level = "debug", skip_all, fields(call_nodes = self.table.len()))]
    pub fn invert(self, default_category: usize) -> InvertedCallNodeInfo {
        let table = &self.table;
        let mut builder = CallNodeTableBuilder::new(default_category);
        let mut pending = Vec::with_capacity(table.len());

        for index in 0..table.len() {
            let node = CallNodeIndex(index);
            let mut inverted = builder.intern(None, CallNodeFrame::of(table, node));
            let mut current = table.prefix(node);
            while let Some(ancestor) = current {
                inverted = builder.intern(Some(inverted), CallNodeFrame::of(table, ancestor));
                current = table.prefix(ancestor);
            }
            pending.push(inverted);
        }

        let (inverted_table, final_index) = builder.finish();
        let non_inverted_to_inverted: Vec<CallNodeIndex> = pending
            .iter()
            .map(|node| final_index[node.index()])
            .collect();
        let stack_to_call_node = self
            .stack_to_call_node
            .iter()
            .map(|node| non_inverted_to_inverted[node.index()])
            .collect();
        debug!(
            inverted_call_nodes = inverted_table.len(),
            "inverted call node table"
        );

        InvertedCallNodeInfo {
            non_inverted: self,
            table: inverted_table,
            non_inverted_to_inverted,
            stack_to_call_node,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvertedCallNodeInfo {
    non_inverted: NonInvertedCallNodeInfo,
    table: CallNodeTable,
    non_inverted_to_inverted: Vec<CallNodeIndex>,
    stack_to_call_node: Vec<CallNodeIndex>,
}

impl InvertedCallNodeInfo {
    pub fn non_inverted(&self) -> &NonInvertedCallNodeInfo {
        &self.non_inverted
    }

    /// The inverted node whose path is the reversed path of `node`.
    pub fn inverted_call_node_for(&self, node: CallNodeIndex) -> CallNodeIndex {
        self.non_inverted_to_inverted[node.index()]
    }
}

impl CallNodeInfo for InvertedCallNodeInfo {
    fn call_node_table(&self) -> &CallNodeTable {
        &self.table
    }

    fn is_inverted(&self) -> bool {
        true
    }

    fn non_inverted_call_node_table(&self) -> &CallNodeTable {
        &self.non_inverted.table
    }

    fn stack_index_to_call_node_index(&self) -> &[CallNodeIndex] {
        &self.stack_to_call_node
    }

    fn stack_index_to_non_inverted_call_node_index(&self) -> &[CallNodeIndex] {
        &self.non_inverted.stack_to_call_node
    }
}

/// Call node of every sample, `None` for gaps.
pub fn sample_index_to_call_node_index(
    samples: &SamplesTable,
    stack_index_to_call_node_index: &[CallNodeIndex],
) -> Vec<Option<CallNodeIndex>> {
    let call_node_of = |stack: StackIndex| stack_index_to_call_node_index[stack.index()];
    samples
        .stacks()
        .iter()
        .map(|stack| stack.map(call_node_of))
        .collect()
}
