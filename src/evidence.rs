//! Cooldown and cap gated evidence capture.
//!
//! The [`EvidenceEngine`] owns the session's capture ledger. A capture is
//! attempted for an active, capture-worthy violation only when the session
//! cap has room and the kind's cooldown has elapsed. The ledger is updated
//! only after the sink confirms the frame was persisted.

use crate::{
    config::EvidenceConfig,
    violations::{ViolationFlags, ViolationKind},
    Error, Result,
};
use chrono::{DateTime, Utc};
use image::{codecs::jpeg::JpegEncoder, RgbImage};
use serde::Serialize;
use std::{
    collections::{BTreeSet, HashMap},
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    sync::{Arc, Mutex},
};

/// Identifies one evidence capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureKey {
    pub subject: String,
    pub kind: ViolationKind,
    pub timestamp: DateTime<Utc>,
    /// 1-based capture number within the session
    pub sequence: u32,
}

impl CaptureKey {
    /// `{subject}_{kind-with-dashes}_{YYYYmmdd_HHMMSS_mmm}_{sequence:04}.jpg`
    ///
    /// The sequence keeps names unique when captures share a millisecond.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{:04}.jpg",
            sanitize_subject(&self.subject),
            self.kind.as_str().replace('_', "-"),
            self.timestamp.format("%Y%m%d_%H%M%S_%3f"),
            self.sequence
        )
    }
}

/// Replace characters that are unsafe in file names with `_`
#[must_use]
pub fn sanitize_subject(subject: &str) -> String {
    let cleaned: String = subject
        .trim()
        .chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, '/' | '\\' | ':' | '.') {
                '_'
            } else {
                c
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// Destination for evidence frames
pub trait EvidenceSink: Send {
    /// Persist one frame and return where it was stored
    ///
    /// # Errors
    ///
    /// Returns an error if the frame could not be stored.
    fn persist(&mut self, key: &CaptureKey, frame: &RgbImage) -> Result<PathBuf>;
}

/// Writes evidence frames as JPEG files into a directory
#[derive(Debug, Clone)]
pub struct JpegFileSink {
    output_dir: PathBuf,
    quality: u8,
}

impl JpegFileSink {
    /// The directory is created on the first capture
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, quality: u8) -> Self {
        Self {
            output_dir: output_dir.into(),
            quality: quality.clamp(1, 100),
        }
    }

    #[must_use]
    pub fn from_config(config: &EvidenceConfig) -> Self {
        Self::new(config.output_dir.clone(), config.jpeg_quality)
    }
}

impl EvidenceSink for JpegFileSink {
    fn persist(&mut self, key: &CaptureKey, frame: &RgbImage) -> Result<PathBuf> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(Error::EvidenceError("Cannot persist an empty frame".to_string()));
        }
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(key.file_name());

        let mut writer = BufWriter::new(File::create(&path)?);
        JpegEncoder::new_with_quality(&mut writer, self.quality).encode_image(frame)?;
        writer.flush()?;

        log::info!("Evidence saved: {}", path.display());
        Ok(path)
    }
}

/// Keeps capture keys in memory; clones share the same store
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    captures: Arc<Mutex<Vec<CaptureKey>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored capture keys
    #[must_use]
    pub fn captures(&self) -> Vec<CaptureKey> {
        self.captures.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl EvidenceSink for MemorySink {
    fn persist(&mut self, key: &CaptureKey, _frame: &RgbImage) -> Result<PathBuf> {
        let mut captures = self
            .captures
            .lock()
            .map_err(|_| Error::EvidenceError("Memory sink lock poisoned".to_string()))?;
        captures.push(key.clone());
        Ok(PathBuf::from(key.file_name()))
    }
}

/// Per-kind last capture times and the session capture count
#[derive(Debug, Clone, Default)]
pub struct CaptureLedger {
    last_capture: HashMap<ViolationKind, DateTime<Utc>>,
    total: u32,
}

impl CaptureLedger {
    #[must_use]
    pub fn last_capture(&self, kind: ViolationKind) -> Option<DateTime<Utc>> {
        self.last_capture.get(&kind).copied()
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    fn record(&mut self, kind: ViolationKind, at: DateTime<Utc>) {
        self.last_capture.insert(kind, at);
        self.total = self.total.saturating_add(1);
    }
}

/// Why a violation was or was not captured
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureDecision {
    Capture,
    /// Capture disabled or the kind is not capture-worthy
    NotEligible,
    /// The session cap has been reached
    CapReached,
    /// The kind was captured too recently
    CoolingDown { remaining_seconds: f64 },
}

/// A persisted evidence frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapturedEvidence {
    pub kind: ViolationKind,
    pub path: PathBuf,
}

/// Evidence produced for one frame
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CaptureOutcome {
    pub captured: Vec<CapturedEvidence>,
    /// Kinds whose capture was attempted but could not be persisted
    pub failed: Vec<ViolationKind>,
}

impl CaptureOutcome {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.captured.is_empty() && self.failed.is_empty()
    }
}

/// Session-scoped capture engine
pub struct EvidenceEngine {
    subject: String,
    enabled: bool,
    cooldown_seconds: f64,
    max_per_session: u32,
    capture_violations: BTreeSet<ViolationKind>,
    ledger: CaptureLedger,
    sink: Box<dyn EvidenceSink>,
    cap_logged: bool,
}

impl EvidenceEngine {
    #[must_use]
    pub fn new(config: &EvidenceConfig, subject: impl Into<String>, sink: Box<dyn EvidenceSink>) -> Self {
        let subject = subject.into();
        log::info!(
            "Initializing EvidenceEngine for {} (cooldown={}s, max_per_session={})",
            subject,
            config.cooldown_seconds,
            config.max_per_session
        );
        Self {
            subject,
            enabled: config.enabled,
            cooldown_seconds: config.cooldown_seconds,
            max_per_session: config.max_per_session,
            capture_violations: config.capture_violations.clone(),
            ledger: CaptureLedger::default(),
            sink,
            cap_logged: false,
        }
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn ledger(&self) -> &CaptureLedger {
        &self.ledger
    }

    #[must_use]
    pub fn capture_violations(&self) -> &BTreeSet<ViolationKind> {
        &self.capture_violations
    }

    /// Replace the set of capture-worthy kinds; the ledger is kept
    pub fn set_capture_violations(&mut self, kinds: impl IntoIterator<Item = ViolationKind>) {
        self.capture_violations = kinds.into_iter().collect();
        log::info!(
            "Capture violations updated: {:?}",
            self.capture_violations.iter().map(|k| k.as_str()).collect::<Vec<_>>()
        );
    }

    /// Whether a capture of `kind` would be allowed at `now`
    #[must_use]
    pub fn decide(&self, kind: ViolationKind, now: DateTime<Utc>) -> CaptureDecision {
        if !self.enabled || !self.capture_violations.contains(&kind) {
            return CaptureDecision::NotEligible;
        }
        if self.max_per_session > 0 && self.ledger.total >= self.max_per_session {
            return CaptureDecision::CapReached;
        }
        if let Some(last) = self.ledger.last_capture(kind) {
            let elapsed = elapsed_seconds(last, now);
            if elapsed < self.cooldown_seconds {
                return CaptureDecision::CoolingDown {
                    remaining_seconds: self.cooldown_seconds - elapsed,
                };
            }
        }
        CaptureDecision::Capture
    }

    /// Capture evidence for each active violation that is due
    ///
    /// Frames without an image produce no captures.
    pub fn process(&mut self, flags: &ViolationFlags, frame: Option<&RgbImage>, now: DateTime<Utc>) -> CaptureOutcome {
        let mut outcome = CaptureOutcome::default();
        let Some(frame) = frame else {
            if flags.any() && self.enabled {
                log::debug!("No frame image available, skipping evidence capture");
            }
            return outcome;
        };

        for kind in flags.active() {
            match self.decide(kind, now) {
                CaptureDecision::Capture => {}
                CaptureDecision::CapReached => {
                    if !self.cap_logged {
                        log::warn!(
                            "Evidence cap of {} reached for {}",
                            self.max_per_session,
                            self.subject
                        );
                        self.cap_logged = true;
                    }
                    continue;
                }
                CaptureDecision::NotEligible | CaptureDecision::CoolingDown { .. } => continue,
            }

            let key = CaptureKey {
                subject: self.subject.clone(),
                kind,
                timestamp: now,
                sequence: self.ledger.total.saturating_add(1),
            };
            match self.sink.persist(&key, frame) {
                Ok(path) => {
                    self.ledger.record(kind, now);
                    outcome.captured.push(CapturedEvidence { kind, path });
                }
                Err(e) => {
                    log::error!("Failed to save {kind} evidence: {e}");
                    outcome.failed.push(kind);
                }
            }
        }
        outcome
    }
}

#[allow(clippy::cast_precision_loss)]
fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let elapsed = to - from;
    match elapsed.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => elapsed.num_seconds() as f64,
    }
}
