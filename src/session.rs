//! Per-session monitoring pipeline and frame loop.

use crate::{
    blink::{BlinkDetector, BlinkRun, BlinkRunTracker, BlinkState},
    config::Config,
    detections::ObjectDetections,
    evidence::{CaptureOutcome, EvidenceEngine, EvidenceSink},
    gaze::{GazeDirection, GazeEstimate, GazeEstimator},
    landmarks::FaceObservation,
    pose_estimation::{HeadPoseEstimator, PoseStatus},
    violations::{FrameSignals, ViolationEvaluator, ViolationFlags, ViolationKind},
    Result,
};
use chrono::{DateTime, Utc};
use image::RgbImage;
use log::{debug, info, warn};
use serde::Serialize;
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

/// Collaborator output for one frame
#[derive(Debug, Clone, Default)]
pub struct FrameInput {
    pub timestamp: DateTime<Utc>,
    pub face: FaceObservation,
    pub detections: ObjectDetections,
    /// Frame pixels, needed only for evidence capture
    pub image: Option<RgbImage>,
}

/// Head orientation relative to the facing ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Facing,
    NotFacing,
    Unknown,
}

/// Everything computed for one processed frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub face_detected: bool,
    pub phone_detected: bool,
    pub person_count: usize,
    pub pose: PoseStatus,
    pub orientation: Orientation,
    pub head_tilted: bool,
    pub gaze: GazeEstimate,
    pub blink: BlinkState,
    /// Closed-eye run that ended on this frame
    pub blink_run: Option<BlinkRun>,
    pub violations: ViolationFlags,
    pub evidence: CaptureOutcome,
    pub processing_time_ms: f64,
    /// Frames per second of the surrounding loop, 0 outside [`MonitoringSession::run`]
    pub fps: f64,
}

/// Lifecycle and per-frame notifications
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Ready {
        subject: String,
        timestamp: DateTime<Utc>,
    },
    Frame(Box<FrameReport>),
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },
    Shutdown {
        frames_received: u64,
        frames_failed: u64,
        frames_processed: u64,
        captures: u32,
        timestamp: DateTime<Utc>,
    },
}

/// Source of frames for [`MonitoringSession::run`]
///
/// `None` ends the stream; an `Err` item is reported and skipped.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<Result<FrameInput>>;
}

impl<I> FrameSource for I
where
    I: Iterator<Item = Result<FrameInput>>,
{
    fn next_frame(&mut self) -> Option<Result<FrameInput>> {
        self.next()
    }
}

/// Totals for a finished frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub frames_received: u64,
    /// Source items that were `Err`; included in `frames_received`
    pub frames_failed: u64,
    pub frames_processed: u64,
    pub captures: u32,
}

/// Monitoring state for one subject
///
/// Owns every piece of cross-frame memory: gaze smoothing, blink runs and
/// the evidence ledger.
pub struct MonitoringSession {
    config: Config,
    pose_estimator: HeadPoseEstimator,
    gaze_estimator: GazeEstimator,
    blink_detector: BlinkDetector,
    blink_tracker: BlinkRunTracker,
    violation_evaluator: ViolationEvaluator,
    evidence: EvidenceEngine,
    frames_received: u64,
    frames_failed: u64,
    frames_processed: u64,
}

/// Frames per second over the most recent window
#[derive(Debug, Clone, Copy)]
struct FpsWindow {
    started: Instant,
    frames: u64,
    fps: f64,
}

impl FpsWindow {
    const LENGTH: Duration = Duration::from_secs(1);

    fn new(now: Instant) -> Self {
        Self {
            started: now,
            frames: 0,
            fps: 0.0,
        }
    }

    /// Count one processed frame and return the latest rate
    #[allow(clippy::cast_precision_loss)]
    fn tick(&mut self, now: Instant) -> f64 {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed >= Self::LENGTH {
            self.fps = self.frames as f64 / elapsed.as_secs_f64();
            self.started = now;
            self.frames = 0;
        }
        self.fps
    }
}

impl MonitoringSession {
    /// Create a session after validating the configuration
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ConfigError`] if the configuration is invalid.
    pub fn new(config: Config, subject: impl Into<String>, sink: Box<dyn EvidenceSink>) -> Result<Self> {
        config.validate()?;
        let subject = subject.into();
        info!("Initializing monitoring session for {subject}");

        Ok(Self {
            pose_estimator: HeadPoseEstimator::new(&config.head_pose),
            gaze_estimator: GazeEstimator::new(&config.gaze),
            blink_detector: BlinkDetector::new(&config.blink),
            blink_tracker: BlinkRunTracker::new(&config.blink),
            violation_evaluator: ViolationEvaluator::new(&config.detection, &config.head_pose),
            evidence: EvidenceEngine::new(&config.evidence, subject, sink),
            config,
            frames_received: 0,
            frames_failed: 0,
            frames_processed: 0,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        self.evidence.subject()
    }

    #[must_use]
    pub fn evidence(&self) -> &EvidenceEngine {
        &self.evidence
    }

    #[must_use]
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Replace the capture-worthy violation kinds
    pub fn set_capture_violations(&mut self, kinds: impl IntoIterator<Item = ViolationKind>) {
        self.evidence.set_capture_violations(kinds);
    }

    /// Run pose, gaze, blink, violations and evidence for one frame
    pub fn process_frame(&mut self, frame: &FrameInput) -> FrameReport {
        let start = Instant::now();
        self.frames_processed += 1;

        let landmarks = frame.face.landmarks();
        let pose = match landmarks {
            Some(landmarks) => self.pose_estimator.estimate_from_landmarks(landmarks).into(),
            None => PoseStatus::NoFace,
        };
        if let PoseStatus::Unavailable { reason } = &pose {
            debug!("Frame {}: head pose unavailable: {}", self.frames_processed, reason);
        }

        let (orientation, head_tilted) = match pose.pose() {
            Some(head) if self.config.head_pose.is_facing(head.yaw, head.pitch) => {
                (Orientation::Facing, self.config.head_pose.is_tilted(head.roll))
            }
            Some(head) => (Orientation::NotFacing, self.config.head_pose.is_tilted(head.roll)),
            None => (Orientation::Unknown, false),
        };

        let gaze = match landmarks {
            Some(landmarks) => self.gaze_estimator.estimate_from_landmarks(landmarks, pose.pose()),
            None => self.gaze_estimator.not_detected(),
        };

        let blink = landmarks.map_or_else(BlinkState::default, |l| self.blink_detector.detect_from_landmarks(l));
        let blink_run = self.blink_tracker.update(blink.is_blinking);

        let violations = self.violation_evaluator.evaluate(&FrameSignals {
            detections: &frame.detections,
            face_detected: frame.face.is_detected(),
            pose: &pose,
            gaze_direction: if gaze.detected { gaze.direction } else { GazeDirection::Unknown },
        });

        let evidence = self.evidence.process(&violations, frame.image.as_ref(), frame.timestamp);

        let elapsed = start.elapsed();
        let budget = Duration::from_millis(self.config.processing.max_frame_time_ms);
        if elapsed > budget {
            warn!(
                "Frame {} took {:.1}ms (budget {}ms)",
                self.frames_processed,
                elapsed.as_secs_f64() * 1000.0,
                self.config.processing.max_frame_time_ms
            );
        }

        FrameReport {
            sequence: self.frames_processed,
            timestamp: frame.timestamp,
            face_detected: frame.face.is_detected(),
            phone_detected: frame.detections.phone_detected(),
            person_count: frame.detections.person_count(),
            pose,
            orientation,
            head_tilted,
            gaze,
            blink,
            blink_run,
            violations,
            evidence,
            processing_time_ms: elapsed.as_secs_f64() * 1000.0,
            fps: 0.0,
        }
    }

    /// Process frames until the source ends or `stop` is set
    ///
    /// Only every `frame_skip`-th readable frame is processed; `Err` items
    /// do not shift the skip phase. `stop` is checked between frames, so an
    /// in-flight frame always completes.
    ///
    /// # Errors
    ///
    /// Currently infallible; source errors are emitted as notifications.
    pub fn run<S, F>(&mut self, source: &mut S, stop: &AtomicBool, mut emit: F) -> Result<RunSummary>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&Notification),
    {
        info!("Starting frame loop for {}", self.subject());
        emit(&Notification::Ready {
            subject: self.subject().to_string(),
            timestamp: Utc::now(),
        });

        let frame_skip = u64::from(self.config.processing.frame_skip.max(1));
        let mut fps = FpsWindow::new(Instant::now());

        while !stop.load(Ordering::Relaxed) {
            let Some(next) = source.next_frame() else {
                info!("Frame source exhausted");
                break;
            };
            self.frames_received += 1;

            let frame = match next {
                Ok(frame) => frame,
                Err(e) => {
                    self.frames_failed += 1;
                    warn!("Skipping unreadable frame: {e}");
                    emit(&Notification::Error {
                        message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    continue;
                }
            };

            let frames_read = self.frames_received - self.frames_failed;
            if (frames_read - 1) % frame_skip != 0 {
                continue;
            }

            let mut report = self.process_frame(&frame);
            report.fps = fps.tick(Instant::now());

            emit(&Notification::Frame(Box::new(report)));
        }

        if stop.load(Ordering::Relaxed) {
            info!("Stop requested, shutting down");
        }

        let summary = RunSummary {
            frames_received: self.frames_received,
            frames_failed: self.frames_failed,
            frames_processed: self.frames_processed,
            captures: self.evidence.ledger().total(),
        };
        emit(&Notification::Shutdown {
            frames_received: summary.frames_received,
            frames_failed: summary.frames_failed,
            frames_processed: summary.frames_processed,
            captures: summary.captures,
            timestamp: Utc::now(),
        });
        info!(
            "Session {} finished: {} frames processed, {} captures",
            self.subject(),
            summary.frames_processed,
            summary.captures
        );
        Ok(summary)
    }
}
