//! Committed/current pair for optimistic local edits.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Saveable<T> {
    committed: T,
    current: T,
    is_dirty: bool,
}

impl<T: Clone> Saveable<T> {
    /// Both sides start as independent copies of `value`.
    pub fn new(value: T) -> Self {
        Self {
            committed: value.clone(),
            current: value,
            is_dirty: false,
        }
    }

    pub fn committed(&self) -> &T {
        &self.committed
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Replace `current` and mark dirty.
    pub fn replace(&mut self, current: T) {
        self.current = current;
        self.is_dirty = true;
    }

    /// Adopt `current` as the new baseline.
    pub fn commit(&mut self) {
        self.committed = self.current.clone();
        self.is_dirty = false;
    }
}
