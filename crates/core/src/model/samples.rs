use serde::Serialize;
use stackchart_protocol::{StackIndex, WeightType};

use super::TableError;

/// Time-ordered samples of one thread.
///
/// A sample without a stack is a gap: the thread was not sampled, or the
/// sample was filtered out, and charts show a discontinuity there.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplesTable {
    stack: Vec<Option<StackIndex>>,
    time: Vec<f64>,
    weight: Option<Vec<f64>>,
    weight_type: WeightType,
}

impl SamplesTable {
    /// Samples with one unit of weight each. Times must be ascending.
    pub fn new(stack: Vec<Option<StackIndex>>, time: Vec<f64>) -> Result<Self, TableError> {
        if stack.len() != time.len() {
            return Err(TableError::ColumnLength {
                column: "time",
                expected: stack.len(),
                actual: time.len(),
            });
        }
        if let Some(index) = time.windows(2).position(|pair| pair[1] < pair[0]) {
            return Err(TableError::UnsortedSamples {
                index: index + 1,
                time: time[index + 1],
            });
        }
        Ok(Self {
            stack,
            time,
            weight: None,
            weight_type: WeightType::default(),
        })
    }

    /// Attach a weight column. Weights may be negative (diffed profiles).
    pub fn with_weights(
        mut self,
        weight: Vec<f64>,
        weight_type: WeightType,
    ) -> Result<Self, TableError> {
        if weight.len() != self.stack.len() {
            return Err(TableError::ColumnLength {
                column: "weight",
                expected: self.stack.len(),
                actual: weight.len(),
            });
        }
        self.weight = Some(weight);
        self.weight_type = weight_type;
        Ok(self)
    }

    pub fn with_weight_type(mut self, weight_type: WeightType) -> Self {
        self.weight_type = weight_type;
        self
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn stacks(&self) -> &[Option<StackIndex>] {
        &self.stack
    }

    pub fn times(&self) -> &[f64] {
        &self.time
    }

    pub fn weights(&self) -> Option<&[f64]> {
        self.weight.as_deref()
    }

    /// Weight of sample `index`; 1 when the table has no weight column.
    #[inline]
    pub fn weight(&self, index: usize) -> f64 {
        self.weight.as_ref().map_or(1.0, |weight| weight[index])
    }

    pub fn weight_type(&self) -> WeightType {
        self.weight_type
    }
}
