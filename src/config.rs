//! Configuration management for the proctoring signal pipeline

use crate::{violations::ViolationKind, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Object detection and violation switches
    pub detection: DetectionConfig,

    /// Gaze estimation calibration
    pub gaze: GazeConfig,

    /// Head pose solver and facing ranges
    pub head_pose: HeadPoseConfig,

    /// Blink detection
    pub blink: BlinkConfig,

    /// Evidence capture
    pub evidence: EvidenceConfig,

    /// Frame loop pacing
    pub processing: ProcessingConfig,
}

/// Object detection thresholds and enabled violation checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum confidence for a phone detection (0.0-1.0)
    pub phone_confidence_threshold: f64,

    /// Minimum confidence for a person detection (0.0-1.0)
    pub person_confidence_threshold: f64,

    /// Person count at which the multiple-persons violation fires
    pub multiple_person_threshold: usize,

    /// Violation checks that are evaluated at all
    pub enabled: BTreeSet<ViolationKind>,
}

/// Gaze estimation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeConfig {
    /// Angles below this are "left" (degrees)
    pub left_threshold: f64,

    /// Angles above this are "right" (degrees)
    pub right_threshold: f64,

    /// Half-width of the "center" band (degrees)
    pub center_tolerance: f64,

    /// Degrees per unit of normalized iris offset
    pub scaling_factor: f64,

    /// Fraction of head yaw/pitch added to the gaze angles
    pub head_compensation_factor: f64,

    /// Extra scale applied to the vertical angle
    pub vertical_attenuation: f64,

    /// EMA window; alpha = 2 / (window + 1)
    pub smoothing_window: usize,

    /// Minimum eye width in pixels for the full computation
    pub min_eye_width_px: f64,

    /// Rolling quality floor below which low-quality frames are dropped
    pub min_quality: f64,

    /// Per-frame quality below which a frame may be dropped
    pub reject_quality: f64,

    /// Quality assigned to the nose-reference fallback
    pub fallback_quality: f64,

    /// Number of recent quality scores kept
    pub quality_history_len: usize,
}

/// Head pose solver settings and facing ranges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadPoseConfig {
    pub yaw_min: f64,
    pub yaw_max: f64,
    pub pitch_min: f64,
    pub pitch_max: f64,

    /// Absolute roll beyond which the head counts as tilted
    pub roll_tolerance: f64,

    /// Horizontal field of view; unset uses the image width as focal length
    pub fov_degrees: Option<f64>,

    /// Levenberg-Marquardt iteration cap
    pub max_iterations: usize,

    /// Accepted RMS reprojection error relative to the landmark spread
    pub max_reprojection_ratio: f64,
}

/// Blink detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkConfig {
    /// Eye-openness ratio below which an eye is closed
    pub ear_threshold: f64,

    /// Shortest closed run counted as a blink (frames)
    pub min_frames: u32,

    /// Longest closed run counted as a blink (frames)
    pub max_frames: u32,
}

/// Evidence capture parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    /// Enable evidence capture
    pub enabled: bool,

    /// Minimum seconds between two captures of the same violation kind
    pub cooldown_seconds: f64,

    /// JPEG quality (1-100)
    pub jpeg_quality: u8,

    /// Maximum captures per session, 0 for unlimited
    pub max_per_session: u32,

    /// Violation kinds that trigger a capture
    pub capture_violations: BTreeSet<ViolationKind>,

    /// Directory evidence images are written to
    pub output_dir: PathBuf,
}

/// Frame loop pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Soft per-frame budget; overruns are logged
    pub max_frame_time_ms: u64,

    /// Process every n-th frame
    pub frame_skip: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            gaze: GazeConfig::default(),
            head_pose: HeadPoseConfig::default(),
            blink: BlinkConfig::default(),
            evidence: EvidenceConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            phone_confidence_threshold: 0.5,
            person_confidence_threshold: 0.6,
            multiple_person_threshold: 2,
            enabled: ViolationKind::ALL.into_iter().collect(),
        }
    }
}

impl Default for GazeConfig {
    fn default() -> Self {
        use crate::constants::{
            DEFAULT_GAZE_SCALING_FACTOR, DEFAULT_HEAD_COMPENSATION_FACTOR, DEFAULT_QUALITY_HISTORY_LEN,
            DEFAULT_SMOOTHING_WINDOW, DEFAULT_VERTICAL_ATTENUATION,
        };
        Self {
            left_threshold: -20.0,
            right_threshold: 20.0,
            center_tolerance: 12.0,
            scaling_factor: DEFAULT_GAZE_SCALING_FACTOR,
            head_compensation_factor: DEFAULT_HEAD_COMPENSATION_FACTOR,
            vertical_attenuation: DEFAULT_VERTICAL_ATTENUATION,
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
            min_eye_width_px: 12.0,
            min_quality: 0.3,
            reject_quality: 0.2,
            fallback_quality: 0.4,
            quality_history_len: DEFAULT_QUALITY_HISTORY_LEN,
        }
    }
}

impl Default for HeadPoseConfig {
    fn default() -> Self {
        Self {
            yaw_min: -30.0,
            yaw_max: 30.0,
            pitch_min: -35.0,
            pitch_max: 20.0,
            roll_tolerance: 30.0,
            fov_degrees: None,
            max_iterations: 100,
            max_reprojection_ratio: 0.25,
        }
    }
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            ear_threshold: crate::constants::DEFAULT_EAR_THRESHOLD,
            min_frames: 2,
            max_frames: 5,
        }
    }
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_seconds: 7.0,
            jpeg_quality: 85,
            max_per_session: 100,
            capture_violations: [ViolationKind::PhoneViolation, ViolationKind::MultiplePersons]
                .into_iter()
                .collect(),
            output_dir: PathBuf::from("violation_snapshots"),
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_frame_time_ms: 100,
            frame_skip: 1,
        }
    }
}

impl HeadPoseConfig {
    /// Whether yaw and pitch both lie inside the facing ranges (inclusive)
    #[must_use]
    pub fn is_facing(&self, yaw: f64, pitch: f64) -> bool {
        (self.yaw_min..=self.yaw_max).contains(&yaw) && (self.pitch_min..=self.pitch_max).contains(&pitch)
    }

    /// Whether the roll exceeds the tilt tolerance
    #[must_use]
    pub fn is_tilted(&self, roll: f64) -> bool {
        roll.abs() > self.roll_tolerance
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoError(e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content).map_err(|e| Error::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        // Detection thresholds
        if !(0.0..=1.0).contains(&self.detection.phone_confidence_threshold) {
            return Err(Error::ConfigError(
                "Phone confidence threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.detection.person_confidence_threshold) {
            return Err(Error::ConfigError(
                "Person confidence threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.detection.multiple_person_threshold == 0 {
            return Err(Error::ConfigError(
                "Multiple person threshold must be at least 1".to_string(),
            ));
        }

        // Gaze thresholds must be ordered left < -center < center < right
        let gaze = &self.gaze;
        let ordered = gaze.left_threshold < -gaze.center_tolerance
            && -gaze.center_tolerance < gaze.center_tolerance
            && gaze.center_tolerance < gaze.right_threshold;
        if !ordered {
            return Err(Error::ConfigError(format!(
                "Gaze thresholds must satisfy left < -center < center < right (got left={}, center={}, right={})",
                gaze.left_threshold, gaze.center_tolerance, gaze.right_threshold
            )));
        }
        if gaze.smoothing_window == 0 {
            return Err(Error::ConfigError(
                "Gaze smoothing window must be greater than 0".to_string(),
            ));
        }
        if gaze.quality_history_len == 0 {
            return Err(Error::ConfigError(
                "Gaze quality history length must be greater than 0".to_string(),
            ));
        }
        if gaze.min_eye_width_px <= 0.0 {
            return Err(Error::ConfigError("Minimum eye width must be positive".to_string()));
        }
        if !gaze.scaling_factor.is_finite()
            || !gaze.head_compensation_factor.is_finite()
            || !gaze.vertical_attenuation.is_finite()
        {
            return Err(Error::ConfigError("Gaze calibration factors must be finite".to_string()));
        }
        for (name, quality) in [
            ("min_quality", gaze.min_quality),
            ("reject_quality", gaze.reject_quality),
            ("fallback_quality", gaze.fallback_quality),
        ] {
            if !(0.0..=1.0).contains(&quality) {
                return Err(Error::ConfigError(format!(
                    "Gaze {name} must be between 0.0 and 1.0 (got {quality})"
                )));
            }
        }

        // Head pose ranges
        let pose = &self.head_pose;
        if pose.yaw_min >= pose.yaw_max {
            return Err(Error::ConfigError("Yaw range must satisfy yaw_min < yaw_max".to_string()));
        }
        if pose.pitch_min >= pose.pitch_max {
            return Err(Error::ConfigError(
                "Pitch range must satisfy pitch_min < pitch_max".to_string(),
            ));
        }
        if pose.max_iterations == 0 {
            return Err(Error::ConfigError(
                "Head pose max_iterations must be greater than 0".to_string(),
            ));
        }
        if pose.max_reprojection_ratio < 0.0 {
            return Err(Error::ConfigError(
                "Maximum reprojection ratio must not be negative".to_string(),
            ));
        }

        // Blink detection
        if self.blink.ear_threshold <= 0.0 {
            return Err(Error::ConfigError("EAR threshold must be positive".to_string()));
        }
        if self.blink.min_frames > self.blink.max_frames {
            return Err(Error::ConfigError(
                "Blink min_frames must not exceed max_frames".to_string(),
            ));
        }

        // Evidence capture
        if !(1..=100).contains(&self.evidence.jpeg_quality) {
            return Err(Error::ConfigError("JPEG quality must be between 1 and 100".to_string()));
        }
        if self.evidence.cooldown_seconds.is_nan() || self.evidence.cooldown_seconds < 0.0 {
            return Err(Error::ConfigError("Cooldown must not be negative".to_string()));
        }

        // Frame loop
        if self.processing.frame_skip == 0 {
            return Err(Error::ConfigError("Frame skip must be at least 1".to_string()));
        }
        if self.processing.max_frame_time_ms == 0 {
            return Err(Error::ConfigError(
                "Maximum frame time must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Proctoring Signal Pipeline Configuration

# Object detection and violation checks
detection:
  phone_confidence_threshold: 0.5
  person_confidence_threshold: 0.6
  multiple_person_threshold: 2
  enabled:
    - phone_violation
    - multiple_persons
    - no_face
    - not_facing_screen
    - not_looking_at_screen

# Gaze estimation
gaze:
  left_threshold: -20.0
  right_threshold: 20.0
  center_tolerance: 12.0
  scaling_factor: 100.0
  head_compensation_factor: 0.3
  vertical_attenuation: 0.7
  smoothing_window: 3
  min_eye_width_px: 12.0
  min_quality: 0.3
  reject_quality: 0.2
  fallback_quality: 0.4
  quality_history_len: 10

# Head pose
head_pose:
  yaw_min: -30.0
  yaw_max: 30.0
  pitch_min: -35.0
  pitch_max: 20.0
  roll_tolerance: 30.0
  max_iterations: 100
  max_reprojection_ratio: 0.25

# Blink detection
blink:
  ear_threshold: 0.25
  min_frames: 2
  max_frames: 5

# Evidence capture
evidence:
  enabled: true
  cooldown_seconds: 7.0
  jpeg_quality: 85
  max_per_session: 100
  capture_violations:
    - phone_violation
    - multiple_persons
  output_dir: "violation_snapshots"

# Frame loop
processing:
  max_frame_time_ms: 100
  frame_skip: 1
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let parsed: Config = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let parsed: Config = serde_yaml::from_str("gaze:\n  smoothing_window: 5\n").unwrap();
        assert_eq!(parsed.gaze.smoothing_window, 5);
        assert_eq!(parsed.gaze.center_tolerance, 12.0);
        assert_eq!(parsed.evidence.max_per_session, 100);
    }

    #[test]
    fn test_is_facing_is_inclusive() {
        let pose = HeadPoseConfig::default();
        assert!(pose.is_facing(0.0, 0.0));
        assert!(pose.is_facing(-30.0, 20.0));
        assert!(pose.is_facing(30.0, -35.0));
        assert!(!pose.is_facing(30.1, 0.0));
        assert!(!pose.is_facing(0.0, 20.1));
        assert!(pose.is_tilted(-31.0));
        assert!(!pose.is_tilted(30.0));
    }

    #[test]
    fn test_validation_rules() {
        let mut config = Config::default();
        config.gaze.left_threshold = 25.0;
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));

        let mut config = Config::default();
        config.gaze.center_tolerance = 25.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.head_pose.yaw_min = 40.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.evidence.jpeg_quality = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.evidence.cooldown_seconds = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.processing.frame_skip = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.blink.min_frames = 6;
        assert!(config.validate().is_err());
    }
}
