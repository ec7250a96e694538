//! Eye-openness ratio (EAR) blink detection.
//!
//! [`BlinkDetector`] is stateless per frame. [`BlinkRunTracker`] optionally
//! validates the duration of closed-eye runs across frames.

use crate::{
    config::BlinkConfig,
    constants::MIN_EYE_SPAN,
    landmarks::{EyeContour, EyeSide, LandmarkSet},
    utils::distance,
};
use serde::Serialize;

/// Eye-openness ratio of one eye, `None` when the eye has no width
///
/// `(|top - bottom| + |top_inner - bottom_inner|) / (2 * |outer - inner|)`
#[must_use]
pub fn eye_aspect_ratio(eye: &EyeContour) -> Option<f64> {
    let horizontal = distance(&eye.outer, &eye.inner);
    if horizontal < MIN_EYE_SPAN {
        return None;
    }
    let vertical = distance(&eye.top, &eye.bottom) + distance(&eye.top_inner, &eye.bottom_inner);
    Some(vertical / (2.0 * horizontal))
}

/// Blink state for one frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BlinkState {
    pub left_ear: Option<f64>,
    pub right_ear: Option<f64>,
    /// Mean of the available eyes
    pub avg_ear: Option<f64>,
    pub is_blinking: bool,
    pub left_closed: bool,
    pub right_closed: bool,
    pub both_eyes_closed: bool,
}

/// Per-frame EAR blink detector
#[derive(Debug, Clone)]
pub struct BlinkDetector {
    ear_threshold: f64,
}

impl BlinkDetector {
    #[must_use]
    pub fn new(config: &BlinkConfig) -> Self {
        Self {
            ear_threshold: config.ear_threshold,
        }
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.ear_threshold
    }

    /// Blink state from a landmark set
    #[must_use]
    pub fn detect_from_landmarks(&self, landmarks: &LandmarkSet) -> BlinkState {
        self.detect(
            landmarks.eye(EyeSide::Left).as_ref(),
            landmarks.eye(EyeSide::Right).as_ref(),
        )
    }

    /// Blink state from whichever eye contours are available
    #[must_use]
    pub fn detect(&self, left: Option<&EyeContour>, right: Option<&EyeContour>) -> BlinkState {
        let left_ear = left.and_then(eye_aspect_ratio);
        let right_ear = right.and_then(eye_aspect_ratio);

        let avg_ear = match (left_ear, right_ear) {
            (Some(l), Some(r)) => Some((l + r) / 2.0),
            (Some(ear), None) | (None, Some(ear)) => Some(ear),
            (None, None) => None,
        };

        let closed = |ear: Option<f64>| ear.is_some_and(|e| e < self.ear_threshold);
        let left_closed = closed(left_ear);
        let right_closed = closed(right_ear);

        BlinkState {
            left_ear,
            right_ear,
            avg_ear,
            is_blinking: closed(avg_ear),
            left_closed,
            right_closed,
            both_eyes_closed: left_closed && right_closed,
        }
    }
}

/// A completed run of consecutive blinking frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlinkRun {
    pub frames: u32,
    /// Whether the run length lies within the configured blink duration
    pub valid: bool,
}

/// Tracks consecutive blinking frames and reports finished runs
#[derive(Debug, Clone)]
pub struct BlinkRunTracker {
    min_frames: u32,
    max_frames: u32,
    current: u32,
    valid_blinks: u64,
}

impl BlinkRunTracker {
    #[must_use]
    pub fn new(config: &BlinkConfig) -> Self {
        Self {
            min_frames: config.min_frames,
            max_frames: config.max_frames,
            current: 0,
            valid_blinks: 0,
        }
    }

    /// Feed one frame's blink flag, returning the run that just ended
    pub fn update(&mut self, is_blinking: bool) -> Option<BlinkRun> {
        if is_blinking {
            self.current = self.current.saturating_add(1);
            return None;
        }
        if self.current == 0 {
            return None;
        }
        let frames = std::mem::take(&mut self.current);
        let valid = (self.min_frames..=self.max_frames).contains(&frames);
        if valid {
            self.valid_blinks += 1;
        }
        Some(BlinkRun { frames, valid })
    }

    /// Length of the run in progress
    #[must_use]
    pub fn current_run(&self) -> u32 {
        self.current
    }

    /// Number of completed runs that were valid blinks
    #[must_use]
    pub fn valid_blinks(&self) -> u64 {
        self.valid_blinks
    }

    pub fn reset(&mut self) {
        self.current = 0;
        self.valid_blinks = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn eye(width: f64, height: f64) -> EyeContour {
        let (cx, cy) = (100.0, 100.0);
        EyeContour {
            outer: Point2::new(cx - width / 2.0, cy),
            inner: Point2::new(cx + width / 2.0, cy),
            top: Point2::new(cx, cy - height / 2.0),
            bottom: Point2::new(cx, cy + height / 2.0),
            top_inner: Point2::new(cx + width / 4.0, cy - height / 2.0),
            bottom_inner: Point2::new(cx + width / 4.0, cy + height / 2.0),
        }
    }

    #[test]
    fn test_ear_formula() {
        let ear = eye_aspect_ratio(&eye(30.0, 12.0)).unwrap();
        assert!((ear - 0.4).abs() < 1e-12);
        assert!(eye_aspect_ratio(&eye(0.0, 12.0)).is_none());
    }

    #[test]
    fn test_closed_eye_blinks() {
        let detector = BlinkDetector::new(&BlinkConfig::default());
        let closed = eye(30.0, 0.3);
        let state = detector.detect(Some(&closed), Some(&closed));
        assert!(state.avg_ear.unwrap() < 0.02);
        assert!(state.is_blinking);
        assert!(state.both_eyes_closed);
    }

    #[test]
    fn test_open_eye_does_not_blink() {
        let detector = BlinkDetector::new(&BlinkConfig::default());
        let open = eye(30.0, 30.0);
        let state = detector.detect(Some(&open), Some(&open));
        assert!(state.avg_ear.unwrap() > 0.3);
        assert!(!state.is_blinking);
        assert!(!state.left_closed && !state.right_closed);
    }

    #[test]
    fn test_single_eye_available() {
        let detector = BlinkDetector::new(&BlinkConfig::default());
        let open = eye(30.0, 15.0);
        let state = detector.detect(None, Some(&open));
        assert_eq!(state.left_ear, None);
        assert_eq!(state.avg_ear, state.right_ear);

        let zero_width = eye(0.0, 15.0);
        let state = detector.detect(Some(&zero_width), Some(&open));
        assert_eq!(state.avg_ear, state.right_ear);

        let none = detector.detect(None, None);
        assert_eq!(none, BlinkState::default());
    }

    #[test]
    fn test_one_closed_eye_is_not_both_closed() {
        let detector = BlinkDetector::new(&BlinkConfig::default());
        let state = detector.detect(Some(&eye(30.0, 0.0)), Some(&eye(30.0, 30.0)));
        assert!(state.left_closed);
        assert!(!state.both_eyes_closed);
        // Average (0 + 1) / 2 is above the threshold
        assert!(!state.is_blinking);
    }

    #[test]
    fn test_run_tracker() {
        let mut tracker = BlinkRunTracker::new(&BlinkConfig::default());
        assert_eq!(tracker.update(false), None);
        assert_eq!(tracker.update(true), None);
        assert_eq!(tracker.update(true), None);
        assert_eq!(tracker.current_run(), 2);
        assert_eq!(tracker.update(false), Some(BlinkRun { frames: 2, valid: true }));

        // Too short
        tracker.update(true);
        assert_eq!(tracker.update(false), Some(BlinkRun { frames: 1, valid: false }));

        // Too long
        for _ in 0..6 {
            tracker.update(true);
        }
        assert_eq!(tracker.update(false), Some(BlinkRun { frames: 6, valid: false }));
        assert_eq!(tracker.valid_blinks(), 1);
    }
}
