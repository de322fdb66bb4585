use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use stackchart_protocol::{CallNodeIndex, FuncIndex};

use super::TableError;

/// Where the frames of a call node were inlined by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InlinedInto {
    /// The merged frames disagree: some were inlined, some were not, or they
    /// were inlined into different symbols.
    Divergent,
    /// Every merged frame was inlined into this native symbol.
    Symbol(usize),
}

/// The raw columns of a call-node table, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallNodeColumns {
    pub func: Vec<FuncIndex>,
    pub category: Vec<usize>,
    pub subcategory: Vec<usize>,
    pub depth: Vec<usize>,
    pub prefix: Vec<Option<CallNodeIndex>>,
    pub subtree_range_end: Vec<usize>,
    pub next_sibling: Vec<Option<CallNodeIndex>>,
    pub source_frames_inlined_into_symbol: Vec<Option<InlinedInto>>,
}

impl CallNodeColumns {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            func: Vec::with_capacity(capacity),
            category: Vec::with_capacity(capacity),
            subcategory: Vec::with_capacity(capacity),
            depth: Vec::with_capacity(capacity),
            prefix: Vec::with_capacity(capacity),
            subtree_range_end: Vec::with_capacity(capacity),
            next_sibling: Vec::with_capacity(capacity),
            source_frames_inlined_into_symbol: Vec::with_capacity(capacity),
        }
    }
}

/// Every distinct call path of a thread, one row per path, in pre-order.
///
/// The tree shape lives entirely in integer columns:
/// - `prefix[i] < i` points at the parent,
/// - the descendants of `i` occupy `[i + 1, subtree_range_end[i])`,
/// - `next_sibling[i]` is the next child of the same parent.
///
/// Accessors index the columns directly and panic on an out-of-range call
/// node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallNodeTable {
    columns: CallNodeColumns,
    max_depth_plus_one: usize,
}

impl CallNodeTable {
    /// Validate raw columns and wrap them.
    pub fn from_columns(columns: CallNodeColumns) -> Result<Self, TableError> {
        validate(&columns)?;
        Ok(Self::from_valid_columns(columns))
    }

    fn from_valid_columns(columns: CallNodeColumns) -> Self {
        let max_depth_plus_one = columns.depth.iter().max().map_or(0, |&depth| depth + 1);
        Self {
            columns,
            max_depth_plus_one,
        }
    }

    pub fn columns(&self) -> &CallNodeColumns {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.func.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.func.is_empty()
    }

    /// Number of stack chart rows needed to show every call node.
    pub fn max_depth_plus_one(&self) -> usize {
        self.max_depth_plus_one
    }

    #[inline]
    pub fn func(&self, node: CallNodeIndex) -> FuncIndex {
        self.columns.func[node.index()]
    }

    #[inline]
    pub fn category(&self, node: CallNodeIndex) -> usize {
        self.columns.category[node.index()]
    }

    #[inline]
    pub fn subcategory(&self, node: CallNodeIndex) -> usize {
        self.columns.subcategory[node.index()]
    }

    #[inline]
    pub fn depth(&self, node: CallNodeIndex) -> usize {
        self.columns.depth[node.index()]
    }

    #[inline]
    pub fn prefix(&self, node: CallNodeIndex) -> Option<CallNodeIndex> {
        self.columns.prefix[node.index()]
    }

    #[inline]
    pub fn subtree_range_end(&self, node: CallNodeIndex) -> usize {
        self.columns.subtree_range_end[node.index()]
    }

    #[inline]
    pub fn next_sibling(&self, node: CallNodeIndex) -> Option<CallNodeIndex> {
        self.columns.next_sibling[node.index()]
    }

    pub fn inlined_into(&self, node: CallNodeIndex) -> Option<InlinedInto> {
        self.columns.source_frames_inlined_into_symbol[node.index()]
    }

    /// Whether `node` has any row in its subtree besides itself.
    #[inline]
    pub fn has_descendants(&self, node: CallNodeIndex) -> bool {
        self.subtree_range_end(node) != node.index() + 1
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    #[inline]
    pub fn is_ancestor_or_self(&self, ancestor: CallNodeIndex, node: CallNodeIndex) -> bool {
        ancestor <= node && node.index() < self.subtree_range_end(ancestor)
    }

    /// Direct children of `parent` in table order; `None` yields the roots.
    pub fn children(
        &self,
        parent: Option<CallNodeIndex>,
    ) -> impl Iterator<Item = CallNodeIndex> + '_ {
        let first = match parent {
            None => (!self.is_empty()).then_some(CallNodeIndex(0)),
            Some(parent) => self
                .has_descendants(parent)
                .then_some(CallNodeIndex(parent.index() + 1)),
        };
        std::iter::successors(first, move |&node| self.next_sibling(node))
    }
}

fn check_len(column: &'static str, expected: usize, actual: usize) -> Result<(), TableError> {
    if expected == actual {
        Ok(())
    } else {
        Err(TableError::ColumnLength {
            column,
            expected,
            actual,
        })
    }
}

fn validate(columns: &CallNodeColumns) -> Result<(), TableError> {
    let len = columns.func.len();
    check_len("category", len, columns.category.len())?;
    check_len("subcategory", len, columns.subcategory.len())?;
    check_len("depth", len, columns.depth.len())?;
    check_len("prefix", len, columns.prefix.len())?;
    check_len("subtreeRangeEnd", len, columns.subtree_range_end.len())?;
    check_len("nextSibling", len, columns.next_sibling.len())?;
    check_len(
        "sourceFramesInlinedIntoSymbol",
        len,
        columns.source_frames_inlined_into_symbol.len(),
    )?;

    for index in 0..len {
        let (expected_depth, parent_end) = match columns.prefix[index] {
            None => (0, len),
            Some(prefix) => {
                let prefix = prefix.index();
                if prefix >= index {
                    return Err(TableError::PrefixOrder { index, prefix });
                }
                let parent_end = columns.subtree_range_end[prefix];
                if index >= parent_end {
                    return Err(TableError::SubtreeRange {
                        index: prefix,
                        end: parent_end,
                    });
                }
                (columns.depth[prefix] + 1, parent_end)
            }
        };

        let depth = columns.depth[index];
        if depth != expected_depth {
            return Err(TableError::Depth {
                index,
                expected: expected_depth,
                actual: depth,
            });
        }

        let end = columns.subtree_range_end[index];
        if end <= index || end > parent_end {
            return Err(TableError::SubtreeRange { index, end });
        }
        if end > index + 1 && columns.prefix[index + 1] != Some(CallNodeIndex(index)) {
            return Err(TableError::SubtreeRange { index, end });
        }

        let expected_sibling = (end < parent_end).then_some(end);
        let sibling = columns.next_sibling[index].map(CallNodeIndex::index);
        let sibling_matches = sibling == expected_sibling
            && sibling.is_none_or(|s| columns.prefix[s] == columns.prefix[index]);
        if !sibling_matches {
            return Err(TableError::NextSibling {
                index,
                expected: expected_sibling,
                actual: sibling,
            });
        }
    }
    Ok(())
}

/// What one stack (or inverted path) contributes to the call node it is
/// merged into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallNodeFrame {
    pub func: FuncIndex,
    pub category: usize,
    pub subcategory: usize,
    pub inlined_into: Option<InlinedInto>,
}

impl CallNodeFrame {
    /// The properties `node` has in `table`.
    pub fn of(table: &CallNodeTable, node: CallNodeIndex) -> Self {
        Self {
            func: table.func(node),
            category: table.category(node),
            subcategory: table.subcategory(node),
            inlined_into: table.inlined_into(node),
        }
    }
}

/// A call node handed out by [`CallNodeTableBuilder`] before its final
/// pre-order index is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingCallNode(usize);

impl PendingCallNode {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct PendingNode {
    frame: CallNodeFrame,
    prefix: Option<PendingCallNode>,
    children: Vec<usize>,
}

/// Trie of call paths that serializes itself into a pre-order
/// [`CallNodeTable`].
///
/// Paths that share a function under the same parent collapse into one node.
/// Merged frames that disagree on category fall back to the default category;
/// frames that disagree on inlining make the node [`InlinedInto::Divergent`].
/// Children keep the order in which they were first interned.
#[derive(Debug)]
pub struct CallNodeTableBuilder {
    nodes: Vec<PendingNode>,
    roots: Vec<usize>,
    lookup: HashMap<(Option<PendingCallNode>, FuncIndex), PendingCallNode>,
    default_category: usize,
}

impl CallNodeTableBuilder {
    pub fn new(default_category: usize) -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            lookup: HashMap::new(),
            default_category,
        }
    }

    /// The child of `prefix` for `frame.func`, created on first use.
    pub fn intern(
        &mut self,
        prefix: Option<PendingCallNode>,
        frame: CallNodeFrame,
    ) -> PendingCallNode {
        if let Some(&existing) = self.lookup.get(&(prefix, frame.func)) {
            self.merge(existing, frame);
            return existing;
        }

        let id = self.nodes.len();
        match prefix {
            Some(parent) => self.nodes[parent.0].children.push(id),
            None => self.roots.push(id),
        }
        self.nodes.push(PendingNode {
            frame,
            prefix,
            children: Vec::new(),
        });
        self.lookup.insert((prefix, frame.func), PendingCallNode(id));
        PendingCallNode(id)
    }

    fn merge(&mut self, node: PendingCallNode, frame: CallNodeFrame) {
        let default_category = self.default_category;
        let existing = &mut self.nodes[node.0].frame;
        if existing.category != frame.category {
            existing.category = default_category;
            existing.subcategory = 0;
        } else if existing.subcategory != frame.subcategory {
            existing.subcategory = 0;
        }
        if existing.inlined_into != frame.inlined_into {
            existing.inlined_into = Some(InlinedInto::Divergent);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Lay the trie out in pre-order. The returned vector maps each
    /// [`PendingCallNode::index`] to its final call node.
    pub fn finish(self) -> (CallNodeTable, Vec<CallNodeIndex>) {
        let count = self.nodes.len();
        let mut final_index = vec![CallNodeIndex(0); count];
        let mut columns = CallNodeColumns::with_capacity(count);

        let mut work: Vec<(usize, usize)> =
            self.roots.iter().rev().map(|&root| (root, 0)).collect();
        while let Some((pending, depth)) = work.pop() {
            final_index[pending] = CallNodeIndex(columns.func.len());
            let node = &self.nodes[pending];
            columns.func.push(node.frame.func);
            columns.category.push(node.frame.category);
            columns.subcategory.push(node.frame.subcategory);
            columns.depth.push(depth);
            // The parent was popped before its children, so it already has
            // its final index.
            let prefix = node.prefix.map(|parent| final_index[parent.0]);
            columns.prefix.push(prefix);
            columns
                .source_frames_inlined_into_symbol
                .push(node.frame.inlined_into);
            work.extend(node.children.iter().rev().map(|&child| (child, depth + 1)));
        }

        let mut subtree_range_end: Vec<usize> = (1..=count).collect();
        for index in (0..count).rev() {
            if let Some(prefix) = columns.prefix[index] {
                let end = subtree_range_end[index];
                let parent_end = &mut subtree_range_end[prefix.index()];
                *parent_end = (*parent_end).max(end);
            }
        }
        columns.next_sibling = (0..count)
            .map(|index| {
                let parent_end = match columns.prefix[index] {
                    Some(prefix) => subtree_range_end[prefix.index()],
                    None => count,
                };
                let end = subtree_range_end[index];
                (end < parent_end).then_some(CallNodeIndex(end))
            })
            .collect();
        columns.subtree_range_end = subtree_range_end;

        debug_assert!(
            validate(&columns).is_ok(),
            "builder produced an invalid table"
        );
        (CallNodeTable::from_valid_columns(columns), final_index)
    }
}
