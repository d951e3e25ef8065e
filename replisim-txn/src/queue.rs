use crate::Operation;
use std::collections::VecDeque;

/// Operations that could not complete yet, oldest first.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct RetryQueue {
    ops: VecDeque<Operation>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: Operation) {
        self.ops.push_back(op);
    }

    /// Removes everything currently queued for one retry pass. Whatever gets
    /// pushed while the pass runs waits for the next one.
    pub fn take_pass(&mut self) -> Vec<Operation> {
        self.ops.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.ops.iter()
    }
}
