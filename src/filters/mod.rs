//! Scalar smoothing filters for per-session signal state.
//!
//! The gaze estimator smooths its horizontal angle with an exponential
//! moving average and tracks recent quality scores with a rolling mean.

/// Exponential moving average seeded with the first sample
pub mod exponential;

/// Bounded rolling mean over the most recent samples
pub mod moving_average;

pub use exponential::ExponentialFilter;
pub use moving_average::MovingAverageFilter;

/// Trait for stateful scalar filters
pub trait SignalFilter: Send + Sync {
    /// Feed one sample and return the filtered value
    fn apply(&mut self, value: f64) -> f64;

    /// Reset filter state
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}
