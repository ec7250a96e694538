use super::SignalFilter;

/// Exponential smoothing filter
///
/// The first sample seeds the average; later samples are blended with
/// `alpha * x + (1 - alpha) * previous`.
#[derive(Debug, Clone)]
pub struct ExponentialFilter {
    alpha: f64,
    last: Option<f64>,
}

impl ExponentialFilter {
    /// # Panics
    ///
    /// Panics if `alpha` is outside `(0, 1]`.
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        assert!(alpha > 0.0 && alpha <= 1.0, "Alpha must be in (0, 1]");
        Self { alpha, last: None }
    }

    /// Smoothing factor `2 / (window + 1)`; a zero window behaves like one
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // window sizes are small
    pub fn from_window(window: usize) -> Self {
        Self::new(2.0 / (window.max(1) as f64 + 1.0))
    }

    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Current average, `None` before the first sample
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.last
    }
}

impl SignalFilter for ExponentialFilter {
    fn apply(&mut self, value: f64) -> f64 {
        let filtered = match self.last {
            Some(last) => self.alpha * value + (1.0 - self.alpha) * last,
            None => value,
        };
        self.last = Some(filtered);
        filtered
    }

    fn reset(&mut self) {
        self.last = None;
    }

    fn name(&self) -> &str {
        "ExponentialFilter"
    }
}
