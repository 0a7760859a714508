//! The per-route accumulator of rendered items awaiting a flush.

use crate::models::notification::RenderedFields;

/// Ordered pending items of one route.
///
/// Never holds more than `threshold` items: the push that reaches the
/// threshold hands the whole batch back and leaves the buffer empty.
#[derive(Debug, Default)]
pub struct AggregationBuffer {
    items: Vec<RenderedFields>,
    threshold: Option<usize>,
}

impl AggregationBuffer {
    /// Creates a buffer; `None` disables the count trigger.
    pub fn new(threshold: Option<usize>) -> Self {
        Self { items: Vec::new(), threshold: threshold.filter(|n| *n > 0) }
    }

    /// Appends `item`, returning the full batch when the threshold is reached.
    pub fn push(&mut self, item: RenderedFields) -> Option<Vec<RenderedFields>> {
        self.items.push(item);
        match self.threshold {
            Some(n) if self.items.len() >= n => Some(self.take()),
            _ => None,
        }
    }

    /// Removes and returns everything pending, in arrival order.
    pub fn take(&mut self) -> Vec<RenderedFields> {
        std::mem::take(&mut self.items)
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.items.len()
    }
}
