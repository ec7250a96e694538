//! Replays recorded face-mesh and object-detector output through a monitoring
//! session and prints notifications as JSON lines.

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::Parser;
use log::info;
use nalgebra::Point3;
use proctor_signals::{
    config::Config,
    detections::{ObjectDetections, RawDetection},
    evidence::{EvidenceSink, JpegFileSink, MemorySink},
    landmarks::{FaceObservation, LandmarkSet},
    session::{FrameInput, MonitoringSession},
    violations::ViolationKind,
    Error,
};
use serde::Deserialize;
use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
    path::PathBuf,
    sync::atomic::AtomicBool,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Recording to replay (JSON lines), `-` for stdin
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Subject identifier used in evidence file names
    #[arg(short, long, default_value = "subject")]
    subject: String,

    /// Write evidence JPEGs to this directory instead of keeping them in memory
    #[arg(short, long)]
    evidence_dir: Option<PathBuf>,

    /// Override the capture-worthy violation kinds (repeatable)
    #[arg(long = "capture")]
    capture: Vec<ViolationKind>,

    /// Attach a blank frame of the recorded size so evidence can be captured
    #[arg(long)]
    blank_frames: bool,

    /// Print the example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

/// One line of a recording
#[derive(Debug, Deserialize)]
struct RecordedFrame {
    /// Milliseconds since the Unix epoch
    timestamp_ms: i64,
    width: u32,
    height: u32,
    /// Normalized face-mesh landmarks, absent when no face was found
    #[serde(default)]
    landmarks: Option<Vec<[f64; 3]>>,
    #[serde(default)]
    detections: Vec<RawDetection>,
}

impl RecordedFrame {
    fn into_frame(self, config: &Config, blank_frames: bool) -> proctor_signals::Result<FrameInput> {
        let timestamp = Utc
            .timestamp_millis_opt(self.timestamp_ms)
            .single()
            .ok_or_else(|| Error::InvalidInput(format!("Invalid timestamp: {}", self.timestamp_ms)))?;
        let (width, height) = (f64::from(self.width), f64::from(self.height));

        let face = match self.landmarks {
            Some(points) if !points.is_empty() => {
                let points: Vec<Point3<f64>> = points.into_iter().map(|[x, y, z]| Point3::new(x, y, z)).collect();
                FaceObservation::Detected(LandmarkSet::from_normalized(&points, width, height))
            }
            _ => FaceObservation::NotDetected,
        };

        Ok(FrameInput {
            timestamp,
            face,
            detections: ObjectDetections::from_raw(&self.detections, &config.detection),
            image: blank_frames.then(|| image::RgbImage::new(self.width, self.height)),
        })
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{}", proctor_signals::config::EXAMPLE_CONFIG);
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => Config::default(),
    };

    let sink: Box<dyn EvidenceSink> = match &args.evidence_dir {
        Some(dir) => Box::new(JpegFileSink::new(dir.clone(), config.evidence.jpeg_quality)),
        None => Box::new(MemorySink::new()),
    };

    let reader: Box<dyn BufRead> = if args.input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(&args.input).with_context(|| format!("opening {}", args.input))?;
        Box::new(BufReader::new(file))
    };

    let frame_config = config.clone();
    let mut session = MonitoringSession::new(config, args.subject.clone(), sink)?;
    if !args.capture.is_empty() {
        session.set_capture_violations(args.capture.iter().copied());
    }

    let blank_frames = args.blank_frames;
    let mut frames = reader
        .lines()
        .filter(|line| line.as_ref().map_or(true, |l| !l.trim().is_empty()))
        .map(|line| -> proctor_signals::Result<FrameInput> {
            let line = line?;
            let recorded: RecordedFrame = serde_json::from_str(&line)?;
            recorded.into_frame(&frame_config, blank_frames)
        });

    let stop = AtomicBool::new(false);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = session.run(&mut frames, &stop, |notification| {
        match serde_json::to_string(notification) {
            Ok(json) => {
                if let Err(e) = writeln!(out, "{json}") {
                    log::error!("Failed to write notification: {e}");
                }
            }
            Err(e) => log::error!("Failed to encode notification: {e}"),
        }
    })?;

    info!(
        "Replay finished: {} frames received ({} unreadable), {} processed, {} captures",
        summary.frames_received, summary.frames_failed, summary.frames_processed, summary.captures
    );
    Ok(())
}
