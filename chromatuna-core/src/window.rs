//! # Sliding Window Buffer
//!
//! Fixed-length FIFO history of raw samples feeding the spectral analyzer.
//! Each capture block is shifted in at the end and the same number of the
//! oldest samples fall off the front, so the length never changes.

/// Fixed-capacity sample history. Starts zero-filled.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    samples: Vec<f32>,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
        }
    }

    /// Appends `block` and discards as many of the oldest samples.
    ///
    /// A block longer than the window leaves only its newest samples.
    pub fn push(&mut self, block: &[f32]) {
        let capacity = self.samples.len();
        if block.len() >= capacity {
            self.samples.copy_from_slice(&block[block.len() - capacity..]);
            return;
        }
        let keep = capacity - block.len();
        self.samples.copy_within(block.len().., 0);
        self.samples[keep..].copy_from_slice(block);
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
