//! Pinhole camera model used to invert landmark positions into head pose.

use crate::constants::{CAMERA_CENTER_FACTOR, DEFAULT_FOV_DEGREES, EPSILON};
use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};

/// Pinhole intrinsics with square pixels and zero lens distortion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraModel {
    focal_length: f64,
    center: Point2<f64>,
    width: f64,
    height: f64,
}

impl CameraModel {
    /// Intrinsics using the image width as focal-length proxy
    ///
    /// Returns `None` for non-positive or non-finite dimensions.
    #[must_use]
    pub fn from_dimensions(width: f64, height: f64) -> Option<Self> {
        if !Self::valid_dimensions(width, height) {
            return None;
        }
        Some(Self::with_focal_length(width, width, height))
    }

    /// Intrinsics derived from a horizontal field of view in degrees
    ///
    /// A field of view outside `(0, 180)` falls back to 60 degrees.
    #[must_use]
    pub fn from_fov(width: f64, height: f64, fov_degrees: f64) -> Option<Self> {
        if !Self::valid_dimensions(width, height) {
            return None;
        }
        let fov = if fov_degrees > 0.0 && fov_degrees < 180.0 {
            fov_degrees
        } else {
            DEFAULT_FOV_DEGREES
        };
        let focal = (width / 2.0) / (fov.to_radians() / 2.0).tan();
        Some(Self::with_focal_length(focal, width, height))
    }

    fn with_focal_length(focal_length: f64, width: f64, height: f64) -> Self {
        Self {
            focal_length,
            center: Point2::new(width / CAMERA_CENTER_FACTOR, height / CAMERA_CENTER_FACTOR),
            width,
            height,
        }
    }

    fn valid_dimensions(width: f64, height: f64) -> bool {
        width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0
    }

    #[must_use]
    pub fn focal_length(&self) -> f64 {
        self.focal_length
    }

    #[must_use]
    pub fn center(&self) -> Point2<f64> {
        self.center
    }

    #[must_use]
    pub fn dimensions(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    /// The 3x3 intrinsic matrix
    #[must_use]
    #[rustfmt::skip]
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.focal_length, 0.0, self.center.x,
            0.0, self.focal_length, self.center.y,
            0.0, 0.0, 1.0,
        )
    }

    /// Project a point already expressed in camera coordinates
    ///
    /// Points on or behind the image plane have no projection.
    #[must_use]
    pub fn project_camera_point(&self, point: &Point3<f64>) -> Option<Point2<f64>> {
        if point.z <= EPSILON || !point.coords.iter().all(|v| v.is_finite()) {
            return None;
        }
        Some(Point2::new(
            self.focal_length * point.x / point.z + self.center.x,
            self.focal_length * point.y / point.z + self.center.y,
        ))
    }

    /// Project a model point through a rotation vector and translation
    #[must_use]
    pub fn project(
        &self,
        point: &Point3<f64>,
        rotation_vector: &Vector3<f64>,
        translation: &Vector3<f64>,
    ) -> Option<Point2<f64>> {
        let rotation = Rotation3::new(*rotation_vector);
        self.project_camera_point(&(rotation * point + translation))
    }
}

/// Camera intrinsics cached per image size
///
/// The model is rebuilt only when the frame dimensions change.
#[derive(Debug, Default)]
pub struct CameraCache {
    fov_degrees: Option<f64>,
    cached: Option<CameraModel>,
}

impl CameraCache {
    #[must_use]
    pub fn new(fov_degrees: Option<f64>) -> Self {
        Self {
            fov_degrees,
            cached: None,
        }
    }

    /// Intrinsics for the given frame size
    pub fn get(&mut self, width: f64, height: f64) -> Option<CameraModel> {
        if let Some(model) = self.cached {
            if model.dimensions() == (width, height) {
                return Some(model);
            }
        }
        let model = match self.fov_degrees {
            Some(fov) => CameraModel::from_fov(width, height, fov),
            None => CameraModel::from_dimensions(width, height),
        };
        if let Some(model) = model {
            log::debug!(
                "Camera intrinsics rebuilt for {}x{} (focal {:.1})",
                width,
                height,
                model.focal_length()
            );
        }
        self.cached = model;
        model
    }
}
