use crate::{
    camera::{CameraCache, CameraModel},
    config::HeadPoseConfig,
    constants::{CANONICAL_FACE_MODEL, EPSILON, POSE_AXIS_LENGTH, POSE_LANDMARKS},
    landmarks::LandmarkSet,
    Error, Result,
};
use nalgebra::{Matrix2, Matrix6, Point2, Point3, Rotation3, SMatrix, SVector, Vector3, Vector6};
use serde::Serialize;
use thiserror::Error;

/// Number of model/image correspondences used by the solver
pub const NUM_POSE_POINTS: usize = 6;

const NUM_RESIDUALS: usize = NUM_POSE_POINTS * 2;

type Residuals = SVector<f64, NUM_RESIDUALS>;
type Jacobian = SMatrix<f64, NUM_RESIDUALS, 6>;

/// Smallest to largest spread ratio below which image points count as collinear
const MIN_SPREAD_RATIO: f64 = 1e-3;

/// Minimum image point spread in pixels
const MIN_SPREAD_PX: f64 = 1.0;

const INITIAL_DAMPING: f64 = 1e-3;
const MAX_DAMPING: f64 = 1e12;
const STEP_TOLERANCE: f64 = 1e-10;

/// Why a frame produced no head pose
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PoseFailure {
    /// The landmark set does not contain the pose key points
    #[error("pose landmarks missing: got {found}, need index {required}")]
    MissingLandmarks { found: usize, required: usize },

    /// Image dimensions cannot produce camera intrinsics
    #[error("invalid image dimensions {width}x{height}")]
    InvalidCamera { width: f64, height: f64 },

    /// Image points are coincident or collinear after clamping
    #[error("degenerate landmark geometry")]
    DegenerateGeometry,

    /// The solver finished with a reprojection error above the accepted limit
    #[error("pose solver did not converge after {iterations} iterations (rms {rms_error:.2}px)")]
    NotConverged { iterations: usize, rms_error: f64 },

    /// The solution placed the face behind the camera or produced NaN
    #[error("pose solution is not finite or lies behind the camera")]
    NonFinite,
}

/// Rotation and translation recovered from 2D-3D correspondences
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PnpSolution {
    /// Axis-angle rotation (radians)
    pub rotation_vector: Vector3<f64>,
    /// Translation in model units
    pub translation: Vector3<f64>,
    /// Root-mean-square reprojection error in pixels
    pub rms_error: f64,
    /// Iterations the solver used
    pub iterations: usize,
}

impl PnpSolution {
    /// Rotation matrix of the solution
    #[must_use]
    pub fn rotation_matrix(&self) -> Rotation3<f64> {
        Rotation3::new(self.rotation_vector)
    }
}

/// Head orientation for one frame, in degrees
///
/// Positive yaw turns right from the camera's view, positive pitch looks up
/// and positive roll tilts clockwise. Values are raw per-frame estimates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeadPose {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub solution: PnpSolution,
}

/// Per-frame head pose outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PoseStatus {
    /// No face in the frame, nothing to solve
    NoFace,
    Estimated(HeadPose),
    /// A face was present but no pose could be recovered
    Unavailable { reason: PoseFailure },
}

impl PoseStatus {
    #[must_use]
    pub fn pose(&self) -> Option<&HeadPose> {
        match self {
            Self::Estimated(pose) => Some(pose),
            Self::NoFace | Self::Unavailable { .. } => None,
        }
    }
}

impl From<std::result::Result<HeadPose, PoseFailure>> for PoseStatus {
    fn from(result: std::result::Result<HeadPose, PoseFailure>) -> Self {
        match result {
            Ok(pose) => Self::Estimated(pose),
            Err(reason) => Self::Unavailable { reason },
        }
    }
}

/// Head pose estimator using an iterative `PnP` solve against a fixed 3D face
pub struct HeadPoseEstimator {
    model_points: [Point3<f64>; NUM_POSE_POINTS],
    camera_cache: CameraCache,
    max_iterations: usize,
    max_reprojection_ratio: f64,
}

impl HeadPoseEstimator {
    /// Create an estimator using the canonical face model
    #[must_use]
    pub fn new(config: &HeadPoseConfig) -> Self {
        log::info!(
            "Initializing HeadPoseEstimator (max_iterations={}, max_reprojection_ratio={})",
            config.max_iterations,
            config.max_reprojection_ratio
        );
        Self {
            model_points: CANONICAL_FACE_MODEL.map(|[x, y, z]| Point3::new(x, y, z)),
            camera_cache: CameraCache::new(config.fov_degrees),
            max_iterations: config.max_iterations,
            max_reprojection_ratio: config.max_reprojection_ratio,
        }
    }

    /// Create an estimator with a custom 3D face model
    ///
    /// # Errors
    ///
    /// Returns an error if the model points are not finite.
    pub fn with_model(config: &HeadPoseConfig, model_points: [Point3<f64>; NUM_POSE_POINTS]) -> Result<Self> {
        if model_points.iter().any(|p| !p.coords.iter().all(|v| v.is_finite())) {
            return Err(Error::InvalidInput("Face model points must be finite".to_string()));
        }
        let mut estimator = Self::new(config);
        estimator.model_points = model_points;
        Ok(estimator)
    }

    /// Estimate head pose from the mesh landmarks of one frame
    ///
    /// # Errors
    ///
    /// Returns the reason no pose is available for this frame.
    pub fn estimate_from_landmarks(&mut self, landmarks: &LandmarkSet) -> std::result::Result<HeadPose, PoseFailure> {
        let points = landmarks.pose_points().ok_or(PoseFailure::MissingLandmarks {
            found: landmarks.len(),
            required: POSE_LANDMARKS.iter().copied().max().unwrap_or(0),
        })?;
        let (width, height) = landmarks.image_size();
        self.estimate(&points, width, height)
    }

    /// Estimate head pose from the six key points in model order
    ///
    /// Points are clamped into the image before solving.
    ///
    /// # Errors
    ///
    /// Returns the reason no pose is available for this frame.
    pub fn estimate(
        &mut self,
        image_points: &[Point2<f64>; NUM_POSE_POINTS],
        width: f64,
        height: f64,
    ) -> std::result::Result<HeadPose, PoseFailure> {
        let camera = self
            .camera_cache
            .get(width, height)
            .ok_or(PoseFailure::InvalidCamera { width, height })?;

        let clamped = image_points.map(|p| crate::utils::clamp_to_image(&p, width, height));

        let solution = solve_pnp(
            &self.model_points,
            &clamped,
            &camera,
            self.max_iterations,
            self.max_reprojection_ratio,
        )?;

        let (yaw, pitch, roll) = pose_angles(&solution, &camera, &clamped[0]).ok_or(PoseFailure::NonFinite)?;

        Ok(HeadPose {
            yaw,
            pitch,
            roll,
            solution,
        })
    }
}

/// Solve the perspective-n-point problem with Levenberg-Marquardt
///
/// The initial guess is an unrotated face placed along the ray through the
/// first image point at the depth implied by the image/model size ratio.
///
/// # Errors
///
/// Returns [`PoseFailure::DegenerateGeometry`] for collinear input,
/// [`PoseFailure::NotConverged`] when the final RMS reprojection error exceeds
/// `max_reprojection_ratio` times the image point spread, and
/// [`PoseFailure::NonFinite`] for solutions behind the camera.
pub fn solve_pnp(
    model_points: &[Point3<f64>; NUM_POSE_POINTS],
    image_points: &[Point2<f64>; NUM_POSE_POINTS],
    camera: &CameraModel,
    max_iterations: usize,
    max_reprojection_ratio: f64,
) -> std::result::Result<PnpSolution, PoseFailure> {
    let image_spread = point_spread(image_points).ok_or(PoseFailure::DegenerateGeometry)?;
    let model_spread = model_points
        .iter()
        .map(|p| Point2::new(p.x, p.y))
        .collect::<Vec<_>>();
    let model_spread = rms_radius(&model_spread);

    let depth = camera.focal_length() * model_spread / image_spread;
    let center = camera.center();
    let anchor = image_points[0];
    let mut params = Vector6::new(
        0.0,
        0.0,
        0.0,
        (anchor.x - center.x) * depth / camera.focal_length() - model_points[0].x,
        (anchor.y - center.y) * depth / camera.focal_length() - model_points[0].y,
        depth - model_points[0].z,
    );

    let mut residuals =
        reprojection_residuals(model_points, image_points, camera, &params).ok_or(PoseFailure::NonFinite)?;
    let mut cost = residuals.norm_squared();
    let mut damping = INITIAL_DAMPING;
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;
        let Some(jacobian) = numeric_jacobian(model_points, image_points, camera, &params) else {
            break;
        };
        let normal = jacobian.transpose() * jacobian;
        let gradient = jacobian.transpose() * residuals;

        let mut accepted = false;
        let mut step_norm = 0.0;
        while damping < MAX_DAMPING {
            let mut augmented: Matrix6<f64> = normal;
            for i in 0..6 {
                augmented[(i, i)] += damping * normal[(i, i)].max(EPSILON);
            }
            let Some(step) = augmented.cholesky().map(|c| c.solve(&(-gradient))) else {
                damping *= 10.0;
                continue;
            };
            let candidate = params + step;
            match reprojection_residuals(model_points, image_points, camera, &candidate) {
                Some(r) if r.norm_squared() < cost => {
                    params = candidate;
                    residuals = r;
                    cost = r.norm_squared();
                    step_norm = step.norm();
                    damping = (damping / 10.0).max(EPSILON);
                    accepted = true;
                    break;
                }
                _ => damping *= 10.0,
            }
        }

        if !accepted || step_norm < STEP_TOLERANCE * (params.norm() + STEP_TOLERANCE) {
            break;
        }
    }

    #[allow(clippy::cast_precision_loss)] // constant point count
    let rms_error = (cost / NUM_POSE_POINTS as f64).sqrt();
    if !rms_error.is_finite() || !params.iter().all(|v| v.is_finite()) || params[5] <= 0.0 {
        return Err(PoseFailure::NonFinite);
    }
    if rms_error > max_reprojection_ratio * image_spread {
        log::warn!(
            "PnP solve rejected: rms {:.2}px exceeds {:.2}px after {} iterations",
            rms_error,
            max_reprojection_ratio * image_spread,
            iterations
        );
        return Err(PoseFailure::NotConverged { iterations, rms_error });
    }

    Ok(PnpSolution {
        rotation_vector: Vector3::new(params[0], params[1], params[2]),
        translation: Vector3::new(params[3], params[4], params[5]),
        rms_error,
        iterations,
    })
}

/// Derive yaw, pitch and roll by projecting forward and up rays
///
/// Avoids matrix-to-Euler sign ambiguities: the forward ray (+Z) gives yaw and
/// pitch relative to the observed nose tip, the up ray (-Y) gives roll.
#[must_use]
pub fn pose_angles(solution: &PnpSolution, camera: &CameraModel, nose_tip: &Point2<f64>) -> Option<(f64, f64, f64)> {
    let forward = camera.project(
        &Point3::new(0.0, 0.0, POSE_AXIS_LENGTH),
        &solution.rotation_vector,
        &solution.translation,
    )?;
    let up = camera.project(
        &Point3::new(0.0, -POSE_AXIS_LENGTH, 0.0),
        &solution.rotation_vector,
        &solution.translation,
    )?;

    let forward_ray = forward - nose_tip;
    let up_ray = up - nose_tip;

    let yaw = forward_ray.x.atan2(POSE_AXIS_LENGTH).to_degrees();
    let pitch = (-forward_ray.y).atan2(POSE_AXIS_LENGTH).to_degrees();
    let roll = up_ray.x.atan2(-up_ray.y).to_degrees();

    if yaw.is_finite() && pitch.is_finite() && roll.is_finite() {
        Some((yaw, pitch, roll))
    } else {
        None
    }
}

fn reprojection_residuals(
    model_points: &[Point3<f64>; NUM_POSE_POINTS],
    image_points: &[Point2<f64>; NUM_POSE_POINTS],
    camera: &CameraModel,
    params: &Vector6<f64>,
) -> Option<Residuals> {
    let rotation = Vector3::new(params[0], params[1], params[2]);
    let translation = Vector3::new(params[3], params[4], params[5]);
    let mut residuals = Residuals::zeros();
    for (i, (model, observed)) in model_points.iter().zip(image_points).enumerate() {
        let projected = camera.project(model, &rotation, &translation)?;
        residuals[2 * i] = projected.x - observed.x;
        residuals[2 * i + 1] = projected.y - observed.y;
    }
    Some(residuals)
}

fn numeric_jacobian(
    model_points: &[Point3<f64>; NUM_POSE_POINTS],
    image_points: &[Point2<f64>; NUM_POSE_POINTS],
    camera: &CameraModel,
    params: &Vector6<f64>,
) -> Option<Jacobian> {
    let mut jacobian = Jacobian::zeros();
    for j in 0..6 {
        let h = 1e-6 * params[j].abs().max(1.0);
        let mut plus = *params;
        let mut minus = *params;
        plus[j] += h;
        minus[j] -= h;
        let forward = reprojection_residuals(model_points, image_points, camera, &plus)?;
        let backward = reprojection_residuals(model_points, image_points, camera, &minus)?;
        jacobian.set_column(j, &((forward - backward) / (2.0 * h)));
    }
    Some(jacobian)
}

/// RMS radius of the image points, `None` when they are coincident or collinear
fn point_spread(points: &[Point2<f64>; NUM_POSE_POINTS]) -> Option<f64> {
    let centroid = crate::utils::geometry::centroid(points)?;
    let mut covariance = Matrix2::zeros();
    for p in points {
        let d = p - centroid;
        covariance += d * d.transpose();
    }
    #[allow(clippy::cast_precision_loss)] // constant point count
    let covariance = covariance / NUM_POSE_POINTS as f64;
    let eigen = covariance.symmetric_eigenvalues();
    let (small, large) = (eigen.min(), eigen.max());
    if !large.is_finite() || large.sqrt() < MIN_SPREAD_PX || small < MIN_SPREAD_RATIO * large {
        return None;
    }
    Some(rms_radius(points))
}

#[allow(clippy::cast_precision_loss)] // landmark counts are tiny
fn rms_radius(points: &[Point2<f64>]) -> f64 {
    let Some(centroid) = crate::utils::geometry::centroid(points) else {
        return 0.0;
    };
    let sum: f64 = points.iter().map(|p| (p - centroid).norm_squared()).sum();
    (sum / points.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeadPoseConfig;

    fn project_model(rotation: Vector3<f64>, translation: Vector3<f64>) -> [Point2<f64>; NUM_POSE_POINTS] {
        let camera = CameraModel::from_dimensions(640.0, 480.0).unwrap();
        CANONICAL_FACE_MODEL.map(|[x, y, z]| {
            camera
                .project(&Point3::new(x, y, z), &rotation, &translation)
                .unwrap()
        })
    }

    fn estimator() -> HeadPoseEstimator {
        HeadPoseEstimator::new(&HeadPoseConfig::default())
    }

    #[test]
    fn test_frontal_face_has_near_zero_angles() {
        let points = project_model(Vector3::zeros(), Vector3::new(0.0, 0.0, 600.0));
        let pose = estimator().estimate(&points, 640.0, 480.0).unwrap();
        assert!(pose.yaw.abs() < 1.0, "yaw {}", pose.yaw);
        assert!(pose.pitch.abs() < 1.0, "pitch {}", pose.pitch);
        assert!(pose.roll.abs() < 1.0, "roll {}", pose.roll);
        assert!(pose.solution.rms_error < 0.5);
    }

    #[test]
    fn test_solver_recovers_known_pose() {
        let rotation = Vector3::new(0.1, -0.2, 0.05);
        let translation = Vector3::new(20.0, -10.0, 650.0);
        let points = project_model(rotation, translation);
        let camera = CameraModel::from_dimensions(640.0, 480.0).unwrap();
        let model = CANONICAL_FACE_MODEL.map(|[x, y, z]| Point3::new(x, y, z));
        let solution = solve_pnp(&model, &points, &camera, 100, 0.25).unwrap();
        assert!((solution.rotation_vector - rotation).norm() < 1e-3);
        assert!((solution.translation - translation).norm() < 0.5);
    }

    #[test]
    fn test_angle_signs() {
        let t = Vector3::new(0.0, 0.0, 600.0);
        let turn = 20.0f64.to_radians();

        let yawed = estimator()
            .estimate(&project_model(Vector3::new(0.0, turn, 0.0), t), 640.0, 480.0)
            .unwrap();
        assert!(yawed.yaw > 5.0, "yaw {}", yawed.yaw);

        let pitched = estimator()
            .estimate(&project_model(Vector3::new(turn, 0.0, 0.0), t), 640.0, 480.0)
            .unwrap();
        assert!(pitched.pitch > 5.0, "pitch {}", pitched.pitch);

        let rolled = estimator()
            .estimate(&project_model(Vector3::new(0.0, 0.0, 15.0f64.to_radians()), t), 640.0, 480.0)
            .unwrap();
        assert!((rolled.roll - 15.0).abs() < 0.5, "roll {}", rolled.roll);
    }

    #[test]
    fn test_collinear_points_are_degenerate() {
        let points = [
            Point2::new(100.0, 100.0),
            Point2::new(150.0, 150.0),
            Point2::new(200.0, 200.0),
            Point2::new(250.0, 250.0),
            Point2::new(300.0, 300.0),
            Point2::new(350.0, 350.0),
        ];
        assert_eq!(
            estimator().estimate(&points, 640.0, 480.0),
            Err(PoseFailure::DegenerateGeometry)
        );
    }

    #[test]
    fn test_points_clamped_into_corner_are_degenerate() {
        let points = [Point2::new(-50.0, -80.0); NUM_POSE_POINTS];
        assert_eq!(
            estimator().estimate(&points, 640.0, 480.0),
            Err(PoseFailure::DegenerateGeometry)
        );
    }

    #[test]
    fn test_invalid_camera() {
        let points = project_model(Vector3::zeros(), Vector3::new(0.0, 0.0, 600.0));
        assert!(matches!(
            estimator().estimate(&points, 0.0, 480.0),
            Err(PoseFailure::InvalidCamera { .. })
        ));
    }

    #[test]
    fn test_reprojection_gate_reports_not_converged() {
        let mut points = project_model(Vector3::zeros(), Vector3::new(0.0, 0.0, 600.0));
        points[3].x += 6.0;
        let config = HeadPoseConfig {
            max_reprojection_ratio: 0.0,
            ..HeadPoseConfig::default()
        };
        let result = HeadPoseEstimator::new(&config).estimate(&points, 640.0, 480.0);
        assert!(matches!(result, Err(PoseFailure::NotConverged { .. })));
    }

    #[test]
    fn test_with_model_rejects_non_finite() {
        let mut model = CANONICAL_FACE_MODEL.map(|[x, y, z]| Point3::new(x, y, z));
        assert!(HeadPoseEstimator::with_model(&HeadPoseConfig::default(), model).is_ok());
        model[2].z = f64::NAN;
        assert!(HeadPoseEstimator::with_model(&HeadPoseConfig::default(), model).is_err());
    }
}
