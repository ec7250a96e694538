//! Proctoring signal library: turns per-frame detector output into calibrated
//! behavioural signals and cooldown-gated evidence captures.
//!
//! The per-frame pipeline consists of:
//! 1. Head pose estimation from six face-mesh landmarks (`PnP` solve)
//! 2. Gaze estimation from iris offsets with quality gating and smoothing
//! 3. Blink detection from the eye-openness ratio (EAR)
//! 4. Violation flags and evidence capture under cooldowns and a session cap
//!
//! Face-mesh and object-detector models are external collaborators: the
//! library consumes their landmarks and boxes.
//!
//! # Examples
//!
//! ## Processing one frame
//!
//! ```no_run
//! use proctor_signals::{
//!     config::Config,
//!     detections::{ObjectDetections, RawDetection},
//!     evidence::MemorySink,
//!     landmarks::{FaceObservation, LandmarkSet},
//!     session::{FrameInput, MonitoringSession},
//!     utils::BoundingBox,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let detections = ObjectDetections::from_raw(
//!     &[RawDetection { class_id: 67, confidence: 0.8, bbox: BoundingBox::new(10.0, 10.0, 40.0, 80.0) }],
//!     &config.detection,
//! );
//!
//! // Normalized landmarks as produced by a face-mesh model
//! let normalized = vec![nalgebra::Point3::new(0.5, 0.5, 0.0); 478];
//! let face = FaceObservation::Detected(LandmarkSet::from_normalized(&normalized, 640.0, 480.0));
//!
//! let mut session = MonitoringSession::new(config, "student-42", Box::new(MemorySink::new()))?;
//! let report = session.process_frame(&FrameInput {
//!     timestamp: chrono::Utc::now(),
//!     face,
//!     detections,
//!     image: Some(image::RgbImage::new(640, 480)),
//! });
//!
//! println!("phone: {}, pose: {:?}", report.violations.phone_violation, report.pose);
//! # Ok(())
//! # }
//! ```
//!
//! ## Estimating head pose directly
//!
//! ```no_run
//! use proctor_signals::{config::HeadPoseConfig, pose_estimation::HeadPoseEstimator};
//! use nalgebra::Point2;
//!
//! let mut estimator = HeadPoseEstimator::new(&HeadPoseConfig::default());
//! // Nose tip, right eye, left eye, chin, left mouth, right mouth
//! let points = [
//!     Point2::new(320.0, 240.0),
//!     Point2::new(366.0, 205.0),
//!     Point2::new(274.0, 205.0),
//!     Point2::new(320.0, 318.0),
//!     Point2::new(289.0, 271.0),
//!     Point2::new(351.0, 271.0),
//! ];
//! match estimator.estimate(&points, 640.0, 480.0) {
//!     Ok(pose) => println!("yaw {:.1} pitch {:.1} roll {:.1}", pose.yaw, pose.pitch, pose.roll),
//!     Err(reason) => println!("pose unavailable: {reason}"),
//! }
//! ```

/// Blink detection from the eye-openness ratio
pub mod blink;

/// Pinhole camera model and projection
pub mod camera;

/// Configuration management
pub mod config;

/// Constants used throughout the pipeline
pub mod constants;

/// Object detector results
pub mod detections;

/// Error types and result handling
pub mod error;

/// Evidence capture ledger and sinks
pub mod evidence;

/// Signal filtering for per-session smoothing
pub mod filters;

/// Gaze estimation from iris landmarks
pub mod gaze;

/// Face-mesh landmark containers
pub mod landmarks;

/// Head pose estimation module using `PnP` algorithm
pub mod pose_estimation;

/// Per-session pipeline and frame loop
pub mod session;

/// Geometry helpers and coordinate transformations
pub mod utils;

/// Per-frame violation flags
pub mod violations;

pub use error::{Error, Result};
