//! Shared geometry primitives for landmark processing.

use crate::constants::EPSILON;
use nalgebra::{Matrix3, Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Euclidean distance between two image points
#[must_use]
pub fn distance(a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    nalgebra::distance(a, b)
}

/// Midpoint between two image points
#[must_use]
pub fn midpoint(a: &Point2<f64>, b: &Point2<f64>) -> Point2<f64> {
    nalgebra::center(a, b)
}

/// Mean of a set of points, `None` for an empty slice
#[must_use]
#[allow(clippy::cast_precision_loss)] // landmark clusters are tiny
pub fn centroid(points: &[Point2<f64>]) -> Option<Point2<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(Vector2::zeros(), |acc, p| acc + p.coords);
    Some(Point2::from(sum / points.len() as f64))
}

/// Perpendicular distance from `point` to the segment `start`-`end`
#[must_use]
pub fn point_to_segment_distance(point: &Point2<f64>, start: &Point2<f64>, end: &Point2<f64>) -> f64 {
    let segment = end - start;
    let length_sq = segment.norm_squared();
    if length_sq < EPSILON {
        return distance(point, start);
    }
    let t = ((point - start).dot(&segment) / length_sq).clamp(0.0, 1.0);
    distance(point, &(start + segment * t))
}

/// Unsigned angle between two vectors in degrees (0 to 180)
///
/// Returns 0 when either vector is (nearly) zero-length.
#[must_use]
pub fn angle_between_vectors(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    let (na, nb) = (a.norm(), b.norm());
    if na < EPSILON || nb < EPSILON {
        return 0.0;
    }
    (a.dot(b) / (na * nb)).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Signed angle from `a` to `b` in degrees (-180 to 180), counterclockwise positive
#[must_use]
pub fn signed_angle_2d(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    let cross = a.x * b.y - a.y * b.x;
    cross.atan2(a.dot(b)).to_degrees()
}

/// Wrap an angle in degrees into `[-180, 180)`
#[must_use]
pub fn normalize_angle(angle: f64) -> f64 {
    (angle + 180.0).rem_euclid(360.0) - 180.0
}

/// Convert a pixel position into normalized `[0, 1]` image coordinates
///
/// Degenerate image sizes leave the point untouched.
#[must_use]
pub fn pixel_to_normalized(point: &Point2<f64>, width: f64, height: f64) -> Point2<f64> {
    if width <= 0.0 || height <= 0.0 {
        return *point;
    }
    Point2::new(point.x / width, point.y / height)
}

/// Convert normalized `[0, 1]` image coordinates into pixels
#[must_use]
pub fn normalized_to_pixel(point: &Point2<f64>, width: f64, height: f64) -> Point2<f64> {
    Point2::new(point.x * width, point.y * height)
}

/// Clamp a pixel position into `[0, width] x [0, height]`
#[must_use]
pub fn clamp_to_image(point: &Point2<f64>, width: f64, height: f64) -> Point2<f64> {
    let x = if point.x.is_finite() { point.x.clamp(0.0, width.max(0.0)) } else { 0.0 };
    let y = if point.y.is_finite() { point.y.clamp(0.0, height.max(0.0)) } else { 0.0 };
    Point2::new(x, y)
}

/// Whether a pixel position lies inside the image
#[must_use]
pub fn is_point_in_image(point: &Point2<f64>, width: f64, height: f64) -> bool {
    (0.0..width).contains(&point.x) && (0.0..height).contains(&point.y)
}

/// Axis-aligned box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union with another box (0 to 1)
    #[must_use]
    pub fn iou(&self, other: &Self) -> f64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);
        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }
        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// Tight box around a point set, grown by `padding` times its size on each side
#[must_use]
pub fn bounding_box_from_points(points: &[Point2<f64>], padding: f64) -> Option<BoundingBox> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    let (w, h) = (max_x - min_x, max_y - min_y);
    Some(BoundingBox::new(
        min_x - w * padding,
        min_y - h * padding,
        w * (1.0 + 2.0 * padding),
        h * (1.0 + 2.0 * padding),
    ))
}

/// Check orthogonality and unit determinant of a 3x3 matrix
#[must_use]
pub fn is_valid_rotation_matrix(matrix: &Matrix3<f64>, tolerance: f64) -> bool {
    let should_be_identity = matrix * matrix.transpose();
    (should_be_identity - Matrix3::identity()).abs().max() <= tolerance
        && (matrix.determinant() - 1.0).abs() <= tolerance
}
