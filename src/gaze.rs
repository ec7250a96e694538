//! Iris-offset gaze estimation with quality gating and temporal smoothing.

use crate::{
    config::GazeConfig,
    constants::IRIS_CLUSTER_SIZE,
    filters::{ExponentialFilter, MovingAverageFilter, SignalFilter},
    landmarks::{EyeContour, EyeSide, LandmarkSet},
    pose_estimation::HeadPose,
    utils::{distance, geometry::centroid, midpoint},
};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Horizontal gaze classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GazeDirection {
    Left,
    Center,
    Right,
    #[default]
    Unknown,
}

/// Classify a smoothed horizontal angle
///
/// Strictly below `left_threshold` is left and strictly above
/// `right_threshold` is right. Inside `[-center, center]` (inclusive) is
/// center. The gaps between the center band and the extremes follow the sign
/// of the angle. Non-finite angles are unknown.
#[must_use]
pub fn classify_direction(angle: f64, config: &GazeConfig) -> GazeDirection {
    if !angle.is_finite() {
        GazeDirection::Unknown
    } else if angle < config.left_threshold {
        GazeDirection::Left
    } else if angle > config.right_threshold {
        GazeDirection::Right
    } else if (-config.center_tolerance..=config.center_tolerance).contains(&angle) {
        GazeDirection::Center
    } else if angle < 0.0 {
        GazeDirection::Left
    } else {
        GazeDirection::Right
    }
}

/// Which geometry produced a gaze sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GazeMethod {
    /// Iris offset inside both eye contours
    EyeCorners,
    /// Iris midpoint relative to the nose tip
    NoseReference,
}

/// Landmarks consumed by the gaze estimator for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct GazeInput {
    pub left_iris: [Point2<f64>; IRIS_CLUSTER_SIZE],
    pub right_iris: [Point2<f64>; IRIS_CLUSTER_SIZE],
    pub left_eye: Option<EyeContour>,
    pub right_eye: Option<EyeContour>,
    pub nose_tip: Option<Point2<f64>>,
}

impl GazeInput {
    /// Gather gaze landmarks, `None` when either iris cluster is missing
    #[must_use]
    pub fn from_landmarks(landmarks: &LandmarkSet) -> Option<Self> {
        Some(Self {
            left_iris: landmarks.iris(EyeSide::Left)?,
            right_iris: landmarks.iris(EyeSide::Right)?,
            left_eye: landmarks.eye(EyeSide::Left),
            right_eye: landmarks.eye(EyeSide::Right),
            nose_tip: landmarks.nose_tip(),
        })
    }
}

/// Gaze result for one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GazeEstimate {
    /// Smoothed horizontal angle in degrees
    pub horizontal_angle: f64,
    /// Unsmoothed vertical angle in degrees
    pub vertical_angle: f64,
    pub direction: GazeDirection,
    pub detected: bool,
    pub quality_score: f64,
    /// Mean of the recent quality history
    pub avg_quality: f64,
    pub raw_offset_h: f64,
    pub raw_offset_v: f64,
    pub iris_center_left: Option<Point2<f64>>,
    pub iris_center_right: Option<Point2<f64>>,
    pub method: Option<GazeMethod>,
}

impl GazeEstimate {
    fn undetected(avg_quality: f64) -> Self {
        Self {
            horizontal_angle: 0.0,
            vertical_angle: 0.0,
            direction: GazeDirection::Unknown,
            detected: false,
            quality_score: 0.0,
            avg_quality,
            raw_offset_h: 0.0,
            raw_offset_v: 0.0,
            iris_center_left: None,
            iris_center_right: None,
            method: None,
        }
    }
}

/// Unsmoothed per-frame gaze measurement
struct RawGaze {
    horizontal: f64,
    vertical: f64,
    offset_h: f64,
    offset_v: f64,
    quality: f64,
    method: GazeMethod,
}

/// Per-eye normalized iris offsets
struct EyeOffset {
    horizontal: f64,
    vertical: f64,
}

/// Session-scoped gaze estimator
///
/// Owns the smoothing average and quality history for one monitored
/// subject; create one per session.
pub struct GazeEstimator {
    config: GazeConfig,
    smoother: ExponentialFilter,
    quality_history: MovingAverageFilter,
}

impl GazeEstimator {
    #[must_use]
    pub fn new(config: &GazeConfig) -> Self {
        log::info!(
            "Initializing GazeEstimator (smoothing_window={}, min_eye_width={}px)",
            config.smoothing_window,
            config.min_eye_width_px
        );
        Self {
            config: config.clone(),
            smoother: ExponentialFilter::from_window(config.smoothing_window),
            quality_history: MovingAverageFilter::new(config.quality_history_len),
        }
    }

    #[must_use]
    pub fn config(&self) -> &GazeConfig {
        &self.config
    }

    /// Current smoothed horizontal angle, `None` before the first accepted sample
    #[must_use]
    pub fn smoothed_angle(&self) -> Option<f64> {
        self.smoother.value()
    }

    /// Result for a frame without landmarks; state is left untouched
    #[must_use]
    pub fn not_detected(&self) -> GazeEstimate {
        GazeEstimate::undetected(self.quality_history.mean())
    }

    /// Clear smoothing and quality history
    pub fn reset(&mut self) {
        self.smoother.reset();
        self.quality_history.reset();
    }

    /// Estimate gaze from a frame's landmark set
    pub fn estimate_from_landmarks(&mut self, landmarks: &LandmarkSet, head_pose: Option<&HeadPose>) -> GazeEstimate {
        match GazeInput::from_landmarks(landmarks) {
            Some(input) => self.estimate(&input, head_pose),
            None => GazeEstimate::undetected(self.quality_history.mean()),
        }
    }

    /// Estimate gaze for one frame and advance the session smoothing state
    pub fn estimate(&mut self, input: &GazeInput, head_pose: Option<&HeadPose>) -> GazeEstimate {
        let (Some(left_center), Some(right_center)) = (centroid(&input.left_iris), centroid(&input.right_iris)) else {
            return GazeEstimate::undetected(self.quality_history.mean());
        };

        let raw = match (&input.left_eye, &input.right_eye) {
            (Some(left_eye), Some(right_eye)) => {
                let (left_width, right_width) = (left_eye.width(), right_eye.width());
                if left_width < self.config.min_eye_width_px || right_width < self.config.min_eye_width_px {
                    log::debug!("Eyes too small: L={left_width:.1}, R={right_width:.1}");
                    return GazeEstimate::undetected(self.quality_history.mean());
                }
                self.corner_gaze(left_eye, &left_center, right_eye, &right_center, head_pose)
            }
            _ => self.nose_reference_gaze(&left_center, &right_center, input.nose_tip.as_ref()),
        };

        let avg_quality = self.quality_history.apply(raw.quality);
        if raw.quality < self.config.reject_quality && avg_quality < self.config.min_quality {
            log::debug!(
                "Gaze rejected: quality {:.2}, rolling quality {:.2}",
                raw.quality,
                avg_quality
            );
            return GazeEstimate::undetected(avg_quality);
        }

        let horizontal_angle = self.smoother.apply(raw.horizontal);

        GazeEstimate {
            horizontal_angle,
            vertical_angle: raw.vertical,
            direction: classify_direction(horizontal_angle, &self.config),
            detected: true,
            quality_score: raw.quality,
            avg_quality,
            raw_offset_h: raw.offset_h,
            raw_offset_v: raw.offset_v,
            iris_center_left: Some(left_center),
            iris_center_right: Some(right_center),
            method: Some(raw.method),
        }
    }

    fn corner_gaze(
        &self,
        left_eye: &EyeContour,
        left_iris: &Point2<f64>,
        right_eye: &EyeContour,
        right_iris: &Point2<f64>,
        head_pose: Option<&HeadPose>,
    ) -> RawGaze {
        let left = eye_offset(left_eye, left_iris);
        let right = eye_offset(right_eye, right_iris);

        let offset_h = (left.horizontal + right.horizontal) / 2.0;
        let offset_v = (left.vertical + right.vertical) / 2.0;

        // Eyes that disagree indicate landmark noise
        let disagreement = (left.horizontal - right.horizontal).abs() + (left.vertical - right.vertical).abs();
        let quality = (1.0 - disagreement).max(0.0);

        let mut horizontal = offset_h * self.config.scaling_factor;
        let mut vertical = offset_v * self.config.scaling_factor * self.config.vertical_attenuation;
        if let Some(pose) = head_pose {
            horizontal += pose.yaw * self.config.head_compensation_factor;
            vertical += pose.pitch * self.config.head_compensation_factor;
        }

        RawGaze {
            horizontal,
            vertical,
            offset_h,
            offset_v,
            quality,
            method: GazeMethod::EyeCorners,
        }
    }

    fn nose_reference_gaze(
        &self,
        left_iris: &Point2<f64>,
        right_iris: &Point2<f64>,
        nose_tip: Option<&Point2<f64>>,
    ) -> RawGaze {
        let offset_h = nose_tip.map_or(0.0, |nose| {
            let iris_mid = midpoint(left_iris, right_iris);
            let inter_eye = distance(left_iris, right_iris).max(1.0);
            (iris_mid.x - nose.x) / inter_eye
        });
        RawGaze {
            horizontal: offset_h * self.config.scaling_factor,
            vertical: 0.0,
            offset_h,
            offset_v: 0.0,
            quality: self.config.fallback_quality,
            method: GazeMethod::NoseReference,
        }
    }
}

/// Iris offset normalized by eye size; vertical is positive looking up
fn eye_offset(eye: &EyeContour, iris: &Point2<f64>) -> EyeOffset {
    EyeOffset {
        horizontal: (iris.x - eye.corner_center().x) / eye.width(),
        vertical: (eye.lid_center().y - iris.y) / eye.height().max(1.0),
    }
}
