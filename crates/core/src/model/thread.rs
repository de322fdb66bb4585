use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use stackchart_protocol::{FuncIndex, SharedStr, StackIndex, StringTable, WeightType};

use super::{SamplesTable, TableError};

/// Where a function's code came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceType {
    #[default]
    Unknown,
    Library,
    Addon,
    Webhost,
    OtherHost,
    Url,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuncTable {
    pub name: Vec<usize>,
    pub resource: Vec<Option<usize>>,
    pub file_name: Vec<Option<usize>>,
    pub line_number: Vec<Option<u32>>,
    pub column_number: Vec<Option<u32>>,
}

impl FuncTable {
    /// Add a function with no resource or source location.
    pub fn push(&mut self, name: usize) -> FuncIndex {
        let index = FuncIndex(self.name.len());
        self.name.push(name);
        self.resource.push(None);
        self.file_name.push(None);
        self.line_number.push(None);
        self.column_number.push(None);
        index
    }

    pub fn len(&self) -> usize {
        self.name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTable {
    pub name: Vec<usize>,
    pub resource_type: Vec<ResourceType>,
}

impl ResourceTable {
    pub fn push(&mut self, name: usize, resource_type: ResourceType) -> usize {
        self.name.push(name);
        self.resource_type.push(resource_type);
        self.name.len() - 1
    }

    pub fn len(&self) -> usize {
        self.name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeSymbolTable {
    pub name: Vec<usize>,
}

impl NativeSymbolTable {
    pub fn push(&mut self, name: usize) -> usize {
        self.name.push(name);
        self.name.len() - 1
    }

    pub fn len(&self) -> usize {
        self.name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameTable {
    pub func: Vec<FuncIndex>,
    /// `None` inherits the category of the calling stack.
    pub category: Vec<Option<usize>>,
    pub subcategory: Vec<Option<usize>>,
    /// Greater than zero when the compiler inlined this frame.
    pub inline_depth: Vec<u32>,
    pub native_symbol: Vec<Option<usize>>,
}

impl FrameTable {
    /// Add a frame for `func` that inherits its category and is not inlined.
    pub fn push(&mut self, func: FuncIndex) -> usize {
        self.func.push(func);
        self.category.push(None);
        self.subcategory.push(None);
        self.inline_depth.push(0);
        self.native_symbol.push(None);
        self.func.len() - 1
    }

    pub fn len(&self) -> usize {
        self.func.len()
    }

    pub fn is_empty(&self) -> bool {
        self.func.is_empty()
    }
}

/// Stacks as a prefix tree: each row is one frame on top of its prefix stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTable {
    pub prefix: Vec<Option<StackIndex>>,
    pub frame: Vec<usize>,
}

impl StackTable {
    pub fn push(&mut self, prefix: Option<StackIndex>, frame: usize) -> StackIndex {
        self.prefix.push(prefix);
        self.frame.push(frame);
        StackIndex(self.frame.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }
}

/// The tables of one profiled thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub string_table: StringTable,
    pub func_table: FuncTable,
    pub resource_table: ResourceTable,
    pub native_symbols: NativeSymbolTable,
    pub frame_table: FrameTable,
    pub stack_table: StackTable,
    pub samples: SamplesTable,
}

impl Thread {
    pub fn func_name(&self, func: FuncIndex) -> &SharedStr {
        self.string_table.get(self.func_table.name[func.index()])
    }

    /// First function with this name.
    pub fn func_by_name(&self, name: &str) -> Option<FuncIndex> {
        let string = self.string_table.find(name)?;
        self.func_table
            .name
            .iter()
            .position(|&n| n == string)
            .map(FuncIndex)
    }
}

/// Builds a [`Thread`] from stacks written as function names, root first.
///
/// Each function gets one frame, so equal names always share a call node.
/// Frames with unusual properties (inlining, resources) can be edited on the
/// built thread's tables.
#[derive(Debug, Default)]
pub struct ThreadBuilder {
    string_table: StringTable,
    func_table: FuncTable,
    frame_table: FrameTable,
    stack_table: StackTable,
    frames_by_name: HashMap<String, usize>,
    stacks: HashMap<(Option<StackIndex>, usize), StackIndex>,
    sample_stacks: Vec<Option<StackIndex>>,
    times: Vec<f64>,
    weights: Vec<f64>,
    weighted: bool,
    weight_type: WeightType,
}

impl ThreadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(mut self, time: f64, stack: &[&str]) -> Self {
        self.push_sample(time, 1.0, stack);
        self
    }

    /// A sample with an explicit weight; the built thread gets a weight column.
    pub fn weighted_sample(mut self, time: f64, weight: f64, stack: &[&str]) -> Self {
        self.weighted = true;
        self.push_sample(time, weight, stack);
        self
    }

    /// A sample with no stack.
    pub fn gap(mut self, time: f64) -> Self {
        self.sample_stacks.push(None);
        self.times.push(time);
        self.weights.push(1.0);
        self
    }

    /// Give the frame of `func_name` its own category instead of inheriting
    /// the caller's.
    pub fn frame_category(mut self, func_name: &str, category: usize, subcategory: usize) -> Self {
        let frame = self.frame(func_name);
        self.frame_table.category[frame] = Some(category);
        self.frame_table.subcategory[frame] = Some(subcategory);
        self
    }

    pub fn weight_type(mut self, weight_type: WeightType) -> Self {
        self.weight_type = weight_type;
        self
    }

    fn frame(&mut self, func_name: &str) -> usize {
        if let Some(&frame) = self.frames_by_name.get(func_name) {
            return frame;
        }
        let name = self.string_table.intern(func_name);
        let func = self.func_table.push(name);
        let frame = self.frame_table.push(func);
        self.frames_by_name.insert(func_name.to_owned(), frame);
        frame
    }

    fn push_sample(&mut self, time: f64, weight: f64, stack: &[&str]) {
        let mut prefix = None;
        for func_name in stack {
            let frame = self.frame(func_name);
            let stack_table = &mut self.stack_table;
            let stack = *self
                .stacks
                .entry((prefix, frame))
                .or_insert_with(|| stack_table.push(prefix, frame));
            prefix = Some(stack);
        }
        self.sample_stacks.push(prefix);
        self.times.push(time);
        self.weights.push(weight);
    }

    pub fn build(self) -> Result<Thread, TableError> {
        let samples = SamplesTable::new(self.sample_stacks, self.times)?;
        let samples = if self.weighted {
            samples.with_weights(self.weights, self.weight_type)?
        } else {
            samples.with_weight_type(self.weight_type)
        };
        Ok(Thread {
            string_table: self.string_table,
            func_table: self.func_table,
            frame_table: self.frame_table,
            stack_table: self.stack_table,
            samples,
            ..Thread::default()
        })
    }
}
