//! Object detector output: the best phone and the confident persons in a frame.

use crate::{
    config::DetectionConfig,
    constants::{COCO_CLASS_CELL_PHONE, COCO_CLASS_PERSON},
    utils::BoundingBox,
};
use serde::{Deserialize, Serialize};

/// One raw detection before class and confidence filtering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub class_id: u32,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// A detection that passed its class threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// Filtered object detections for one frame
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectDetections {
    /// Highest-confidence phone, if any passed the threshold
    pub phone: Option<Detection>,
    pub persons: Vec<Detection>,
}

impl ObjectDetections {
    /// Filter raw detections by class and confidence
    ///
    /// Keeps the single most confident phone at or above the phone threshold
    /// and every person at or above the person threshold. Other classes and
    /// non-finite confidences are ignored.
    #[must_use]
    pub fn from_raw(raw: &[RawDetection], config: &DetectionConfig) -> Self {
        let mut detections = Self::default();
        for det in raw.iter().filter(|d| d.confidence.is_finite()) {
            let kept = Detection {
                confidence: det.confidence,
                bbox: det.bbox,
            };
            match det.class_id {
                COCO_CLASS_CELL_PHONE if det.confidence >= config.phone_confidence_threshold => {
                    if detections.phone.map_or(true, |best| det.confidence > best.confidence) {
                        detections.phone = Some(kept);
                    }
                }
                COCO_CLASS_PERSON if det.confidence >= config.person_confidence_threshold => {
                    detections.persons.push(kept);
                }
                _ => {}
            }
        }
        detections
    }

    #[must_use]
    pub fn phone_detected(&self) -> bool {
        self.phone.is_some()
    }

    #[must_use]
    pub fn person_count(&self) -> usize {
        self.persons.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(class_id: u32, confidence: f64) -> RawDetection {
        RawDetection {
            class_id,
            confidence,
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
        }
    }

    #[test]
    fn test_best_phone_is_kept() {
        let config = DetectionConfig::default();
        let detections = ObjectDetections::from_raw(
            &[raw(67, 0.55), raw(67, 0.9), raw(67, 0.3), raw(2, 0.99)],
            &config,
        );
        assert!(detections.phone_detected());
        assert_eq!(detections.phone.unwrap().confidence, 0.9);
        assert_eq!(detections.person_count(), 0);
    }

    #[test]
    fn test_person_threshold_is_inclusive() {
        let config = DetectionConfig::default();
        let detections = ObjectDetections::from_raw(
            &[raw(0, 0.6), raw(0, 0.59), raw(0, 0.95), raw(0, f64::NAN)],
            &config,
        );
        assert_eq!(detections.person_count(), 2);
        assert!(!detections.phone_detected());
    }

    #[test]
    fn test_empty_frame() {
        let detections = ObjectDetections::from_raw(&[], &DetectionConfig::default());
        assert_eq!(detections, ObjectDetections::default());
    }
}
