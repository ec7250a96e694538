use super::SignalFilter;
use std::collections::VecDeque;

/// Moving average over a bounded window of recent samples
#[derive(Debug, Clone)]
pub struct MovingAverageFilter {
    window_size: usize,
    buffer: VecDeque<f64>,
}

impl MovingAverageFilter {
    /// A zero window is treated as one
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            window_size,
            buffer: VecDeque::with_capacity(window_size),
        }
    }

    /// Mean of the buffered samples, 0 when empty
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // window sizes are small
    pub fn mean(&self) -> f64 {
        if self.buffer.is_empty() {
            return 0.0;
        }
        self.buffer.iter().sum::<f64>() / self.buffer.len() as f64
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl SignalFilter for MovingAverageFilter {
    fn apply(&mut self, value: f64) -> f64 {
        if self.buffer.len() >= self.window_size {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
        self.mean()
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }

    fn name(&self) -> &str {
        "MovingAverageFilter"
    }
}
