//! # Stability Filter
//!
//! A small debounce over recent note labels. A detection is settled once the
//! last `size` labels are all the same note. It only drives side signals
//! (logging, guided auto-advance); regular detections are never held back.

use std::collections::VecDeque;

/// Ring buffer of the most recent note labels, newest first.
#[derive(Debug, Clone)]
pub struct StabilityFilter {
    history: VecDeque<Option<String>>,
}

impl StabilityFilter {
    /// Creates a filter over the last `size` labels (at least 1).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            history: std::iter::repeat_n(None, size).collect(),
        }
    }

    /// Records `label` and reports whether the history is now uniform.
    pub fn observe(&mut self, label: &str) -> bool {
        self.history.pop_back();
        self.history.push_front(Some(label.to_string()));
        self.is_settled()
    }

    /// True iff every slot holds the same label.
    pub fn is_settled(&self) -> bool {
        match self.history.front() {
            Some(Some(first)) => self
                .history
                .iter()
                .all(|entry| entry.as_deref() == Some(first.as_str())),
            _ => false,
        }
    }
}
