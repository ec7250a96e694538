//! Face-mesh landmark containers and typed accessors.

use crate::{
    constants::{
        IRIS_CLUSTER_SIZE, LANDMARK_NOSE_TIP, LEFT_EYE_BOTTOM, LEFT_EYE_BOTTOM_INNER, LEFT_EYE_INNER,
        LEFT_EYE_OUTER, LEFT_EYE_TOP, LEFT_EYE_TOP_INNER, LEFT_IRIS, NUM_REFINED_LANDMARKS, POSE_LANDMARKS,
        RIGHT_EYE_BOTTOM, RIGHT_EYE_BOTTOM_INNER, RIGHT_EYE_INNER, RIGHT_EYE_OUTER, RIGHT_EYE_TOP,
        RIGHT_EYE_TOP_INNER, RIGHT_IRIS,
    },
    utils::{
        clamp_to_image, distance, midpoint,
        geometry::{centroid, normalized_to_pixel},
    },
};
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Which eye a landmark group belongs to (subject's left/right)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EyeSide {
    Left,
    Right,
}

impl EyeSide {
    pub const BOTH: [Self; 2] = [Self::Left, Self::Right];
}

/// The six contour points of one eye in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeContour {
    pub outer: Point2<f64>,
    pub inner: Point2<f64>,
    pub top: Point2<f64>,
    pub bottom: Point2<f64>,
    pub top_inner: Point2<f64>,
    pub bottom_inner: Point2<f64>,
}

impl EyeContour {
    /// Corner-to-corner distance
    #[must_use]
    pub fn width(&self) -> f64 {
        distance(&self.outer, &self.inner)
    }

    /// Top-to-bottom lid distance
    #[must_use]
    pub fn height(&self) -> f64 {
        distance(&self.top, &self.bottom)
    }

    /// Midpoint of the two corners
    #[must_use]
    pub fn corner_center(&self) -> Point2<f64> {
        midpoint(&self.outer, &self.inner)
    }

    /// Midpoint of the two central lid points
    #[must_use]
    pub fn lid_center(&self) -> Point2<f64> {
        midpoint(&self.top, &self.bottom)
    }
}

/// Landmarks for one detected face in one frame
///
/// Pixel coordinates are always clamped into the image. Normalized
/// coordinates are kept when the producer supplied them.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    pixels: Vec<Point2<f64>>,
    normalized: Vec<Point3<f64>>,
    width: f64,
    height: f64,
}

impl LandmarkSet {
    /// Build from pixel positions
    #[must_use]
    pub fn from_pixels(points: &[Point2<f64>], width: f64, height: f64) -> Self {
        Self {
            pixels: points.iter().map(|p| clamp_to_image(p, width, height)).collect(),
            normalized: Vec::new(),
            width,
            height,
        }
    }

    /// Build from normalized mesh output (x, y in `[0, 1]`, z relative depth)
    #[must_use]
    pub fn from_normalized(points: &[Point3<f64>], width: f64, height: f64) -> Self {
        let pixels = points
            .iter()
            .map(|p| clamp_to_image(&normalized_to_pixel(&Point2::new(p.x, p.y), width, height), width, height))
            .collect();
        Self {
            pixels,
            normalized: points.to_vec(),
            width,
            height,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    #[must_use]
    pub fn image_size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn pixels(&self) -> &[Point2<f64>] {
        &self.pixels
    }

    #[must_use]
    pub fn normalized(&self) -> &[Point3<f64>] {
        &self.normalized
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Point2<f64>> {
        self.pixels.get(index).copied()
    }

    /// Whether the set carries both iris clusters
    #[must_use]
    pub fn has_iris(&self) -> bool {
        self.pixels.len() >= NUM_REFINED_LANDMARKS
    }

    #[must_use]
    pub fn nose_tip(&self) -> Option<Point2<f64>> {
        self.get(LANDMARK_NOSE_TIP)
    }

    /// The six head pose key points in canonical model order
    #[must_use]
    pub fn pose_points(&self) -> Option<[Point2<f64>; 6]> {
        let mut points = [Point2::origin(); 6];
        for (slot, &index) in points.iter_mut().zip(POSE_LANDMARKS.iter()) {
            *slot = self.get(index)?;
        }
        Some(points)
    }

    #[must_use]
    pub fn eye(&self, side: EyeSide) -> Option<EyeContour> {
        let [outer, inner, top, bottom, top_inner, bottom_inner] = match side {
            EyeSide::Left => [
                LEFT_EYE_OUTER,
                LEFT_EYE_INNER,
                LEFT_EYE_TOP,
                LEFT_EYE_BOTTOM,
                LEFT_EYE_TOP_INNER,
                LEFT_EYE_BOTTOM_INNER,
            ],
            EyeSide::Right => [
                RIGHT_EYE_OUTER,
                RIGHT_EYE_INNER,
                RIGHT_EYE_TOP,
                RIGHT_EYE_BOTTOM,
                RIGHT_EYE_TOP_INNER,
                RIGHT_EYE_BOTTOM_INNER,
            ],
        };
        Some(EyeContour {
            outer: self.get(outer)?,
            inner: self.get(inner)?,
            top: self.get(top)?,
            bottom: self.get(bottom)?,
            top_inner: self.get(top_inner)?,
            bottom_inner: self.get(bottom_inner)?,
        })
    }

    /// The five iris points of one eye
    #[must_use]
    pub fn iris(&self, side: EyeSide) -> Option<[Point2<f64>; IRIS_CLUSTER_SIZE]> {
        let indices = match side {
            EyeSide::Left => LEFT_IRIS,
            EyeSide::Right => RIGHT_IRIS,
        };
        let mut points = [Point2::origin(); IRIS_CLUSTER_SIZE];
        for (slot, index) in points.iter_mut().zip(indices) {
            *slot = self.get(index)?;
        }
        Some(points)
    }

    /// Mean of the five iris points
    #[must_use]
    pub fn iris_center(&self, side: EyeSide) -> Option<Point2<f64>> {
        centroid(&self.iris(side)?)
    }
}

/// Face-mesh result for one frame
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FaceObservation {
    #[default]
    NotDetected,
    Detected(LandmarkSet),
}

impl FaceObservation {
    #[must_use]
    pub fn is_detected(&self) -> bool {
        matches!(self, Self::Detected(_))
    }

    #[must_use]
    pub fn landmarks(&self) -> Option<&LandmarkSet> {
        match self {
            Self::Detected(landmarks) => Some(landmarks),
            Self::NotDetected => None,
        }
    }
}
