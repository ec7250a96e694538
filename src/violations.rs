//! Per-frame violation flags.
//!
//! Every flag is recomputed from the current frame only; debouncing happens
//! in the evidence layer through per-kind cooldowns.

use crate::{
    config::{DetectionConfig, HeadPoseConfig},
    detections::ObjectDetections,
    gaze::GazeDirection,
    pose_estimation::PoseStatus,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Named violation conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    PhoneViolation,
    MultiplePersons,
    NoFace,
    NotFacingScreen,
    NotLookingAtScreen,
}

impl ViolationKind {
    /// Every kind, in evaluation order
    pub const ALL: [Self; 5] = [
        Self::PhoneViolation,
        Self::MultiplePersons,
        Self::NoFace,
        Self::NotFacingScreen,
        Self::NotLookingAtScreen,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PhoneViolation => "phone_violation",
            Self::MultiplePersons => "multiple_persons",
            Self::NoFace => "no_face",
            Self::NotFacingScreen => "not_facing_screen",
            Self::NotLookingAtScreen => "not_looking_at_screen",
        }
    }
}

impl FromStr for ViolationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| Error::InvalidInput(format!("Unknown violation kind: {s}")))
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Violation flags for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViolationFlags {
    pub phone_violation: bool,
    pub multiple_persons: bool,
    pub no_face: bool,
    pub not_facing_screen: bool,
    pub not_looking_at_screen: bool,
}

impl ViolationFlags {
    #[must_use]
    pub fn is_active(&self, kind: ViolationKind) -> bool {
        match kind {
            ViolationKind::PhoneViolation => self.phone_violation,
            ViolationKind::MultiplePersons => self.multiple_persons,
            ViolationKind::NoFace => self.no_face,
            ViolationKind::NotFacingScreen => self.not_facing_screen,
            ViolationKind::NotLookingAtScreen => self.not_looking_at_screen,
        }
    }

    fn set(&mut self, kind: ViolationKind, value: bool) {
        match kind {
            ViolationKind::PhoneViolation => self.phone_violation = value,
            ViolationKind::MultiplePersons => self.multiple_persons = value,
            ViolationKind::NoFace => self.no_face = value,
            ViolationKind::NotFacingScreen => self.not_facing_screen = value,
            ViolationKind::NotLookingAtScreen => self.not_looking_at_screen = value,
        }
    }

    /// Active kinds in evaluation order
    pub fn active(&self) -> impl Iterator<Item = ViolationKind> + '_ {
        ViolationKind::ALL.into_iter().filter(|kind| self.is_active(*kind))
    }

    #[must_use]
    pub fn any(&self) -> bool {
        self.active().next().is_some()
    }
}

/// Signals a frame contributes to violation evaluation
#[derive(Debug, Clone, Copy)]
pub struct FrameSignals<'a> {
    pub detections: &'a ObjectDetections,
    pub face_detected: bool,
    pub pose: &'a PoseStatus,
    pub gaze_direction: GazeDirection,
}

/// Evaluates violation flags from one frame's signals
#[derive(Debug, Clone)]
pub struct ViolationEvaluator {
    detection: DetectionConfig,
    head_pose: HeadPoseConfig,
}

impl ViolationEvaluator {
    #[must_use]
    pub fn new(detection: &DetectionConfig, head_pose: &HeadPoseConfig) -> Self {
        Self {
            detection: detection.clone(),
            head_pose: head_pose.clone(),
        }
    }

    /// Compute the flags for one frame
    ///
    /// With a face present, a missing pose counts as not facing and an
    /// unknown gaze direction counts as not looking. Disabled kinds are
    /// always false.
    #[must_use]
    pub fn evaluate(&self, signals: &FrameSignals<'_>) -> ViolationFlags {
        let facing = signals
            .pose
            .pose()
            .is_some_and(|pose| self.head_pose.is_facing(pose.yaw, pose.pitch));

        let crowded = signals.detections.person_count() >= self.detection.multiple_person_threshold;

        let mut flags = ViolationFlags {
            phone_violation: signals.detections.phone_detected(),
            multiple_persons: crowded,
            no_face: !signals.face_detected,
            not_facing_screen: signals.face_detected && !facing,
            not_looking_at_screen: signals.face_detected && signals.gaze_direction != GazeDirection::Center,
        };

        for kind in ViolationKind::ALL {
            if !self.detection.enabled.contains(&kind) {
                flags.set(kind, false);
            }
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        detections::Detection,
        pose_estimation::{HeadPose, PnpSolution, PoseFailure},
        utils::BoundingBox,
    };
    use nalgebra::Vector3;

    fn pose(yaw: f64, pitch: f64) -> PoseStatus {
        PoseStatus::Estimated(HeadPose {
            yaw,
            pitch,
            roll: 0.0,
            solution: PnpSolution {
                rotation_vector: Vector3::zeros(),
                translation: Vector3::new(0.0, 0.0, 600.0),
                rms_error: 0.0,
                iterations: 1,
            },
        })
    }

    fn detection() -> Detection {
        Detection {
            confidence: 0.9,
            bbox: BoundingBox::new(0.0, 0.0, 50.0, 100.0),
        }
    }

    fn evaluator() -> ViolationEvaluator {
        ViolationEvaluator::new(&DetectionConfig::default(), &HeadPoseConfig::default())
    }

    #[test]
    fn test_clean_frame() {
        let detections = ObjectDetections {
            phone: None,
            persons: vec![detection()],
        };
        let status = pose(5.0, -5.0);
        let flags = evaluator().evaluate(&FrameSignals {
            detections: &detections,
            face_detected: true,
            pose: &status,
            gaze_direction: GazeDirection::Center,
        });
        assert_eq!(flags, ViolationFlags::default());
        assert!(!flags.any());
    }

    #[test]
    fn test_phone_and_multiple_persons_together() {
        let detections = ObjectDetections {
            phone: Some(detection()),
            persons: vec![detection(); 3],
        };
        let status = pose(0.0, 0.0);
        let flags = evaluator().evaluate(&FrameSignals {
            detections: &detections,
            face_detected: true,
            pose: &status,
            gaze_direction: GazeDirection::Center,
        });
        assert!(flags.phone_violation);
        assert!(flags.multiple_persons);
        assert_eq!(
            flags.active().collect::<Vec<_>>(),
            vec![ViolationKind::PhoneViolation, ViolationKind::MultiplePersons]
        );
    }

    #[test]
    fn test_no_face_suppresses_face_dependent_flags() {
        let detections = ObjectDetections::default();
        let flags = evaluator().evaluate(&FrameSignals {
            detections: &detections,
            face_detected: false,
            pose: &PoseStatus::NoFace,
            gaze_direction: GazeDirection::Unknown,
        });
        assert!(flags.no_face);
        assert!(!flags.not_facing_screen);
        assert!(!flags.not_looking_at_screen);
    }

    #[test]
    fn test_facing_and_looking() {
        let detections = ObjectDetections::default();
        let turned = pose(45.0, 0.0);
        let flags = evaluator().evaluate(&FrameSignals {
            detections: &detections,
            face_detected: true,
            pose: &turned,
            gaze_direction: GazeDirection::Left,
        });
        assert!(flags.not_facing_screen);
        assert!(flags.not_looking_at_screen);

        let unavailable = PoseStatus::Unavailable {
            reason: PoseFailure::DegenerateGeometry,
        };
        let flags = evaluator().evaluate(&FrameSignals {
            detections: &detections,
            face_detected: true,
            pose: &unavailable,
            gaze_direction: GazeDirection::Unknown,
        });
        assert!(flags.not_facing_screen);
        assert!(flags.not_looking_at_screen);
    }

    #[test]
    fn test_disabled_kinds_never_fire() {
        let mut config = DetectionConfig::default();
        config.enabled.remove(&ViolationKind::NoFace);
        let evaluator = ViolationEvaluator::new(&config, &HeadPoseConfig::default());
        let detections = ObjectDetections::default();
        let flags = evaluator.evaluate(&FrameSignals {
            detections: &detections,
            face_detected: false,
            pose: &PoseStatus::NoFace,
            gaze_direction: GazeDirection::Unknown,
        });
        assert!(!flags.no_face);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ViolationKind::NotLookingAtScreen.to_string(), "not_looking_at_screen");
        assert_eq!("no_face".parse::<ViolationKind>().unwrap(), ViolationKind::NoFace);
        assert!("phone".parse::<ViolationKind>().is_err());
        let json = serde_json::to_string(&ViolationKind::MultiplePersons).unwrap();
        assert_eq!(json, "\"multiple_persons\"");
    }
}
