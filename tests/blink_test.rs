//! Blink detection across frame sequences


use proctor_signals::{
    blink::{BlinkDetector, BlinkRun, BlinkRunTracker},
    config::BlinkConfig,
};
use test_helpers::SyntheticFace;

#[test]
fn test_open_and_closed_eyes() {
    let detector = BlinkDetector::new(&BlinkConfig::default());

    let open = detector.detect_from_landmarks(&SyntheticFace::frontal().landmarks());
    assert!(!open.is_blinking);
    assert!((open.avg_ear.unwrap() - 0.3).abs() < 0.01, "ear {:?}", open.avg_ear);

    let closed = detector.detect_from_landmarks(&SyntheticFace::eyes_closed().landmarks());
    assert!(closed.is_blinking);
    assert!(closed.both_eyes_closed);
    assert!(closed.left_closed && closed.right_closed);
}

#[test]
fn test_threshold_is_strict() {
    let config = BlinkConfig::default();
    let face = SyntheticFace {
        openness: config.ear_threshold + 0.005,
        ..SyntheticFace::default()
    };
    let state = BlinkDetector::new(&config).detect_from_landmarks(&face.landmarks());
    assert!(!state.is_blinking);
}

#[test]
fn test_blink_sequence_counts_valid_runs() {
    let config = BlinkConfig::default();
    let detector = BlinkDetector::new(&config);
    let mut tracker = BlinkRunTracker::new(&config);

    let open = SyntheticFace::frontal().landmarks();
    let closed = SyntheticFace::eyes_closed().landmarks();

    // open, 3 closed, open, 1 closed, open, 8 closed, open
    let pattern = [0, 1, 1, 1, 0, 1, 0, 1, 1, 1, 1, 1, 1, 1, 1, 0];
    let mut runs = Vec::new();
    for &is_closed in &pattern {
        let landmarks = if is_closed == 1 { &closed } else { &open };
        let state = detector.detect_from_landmarks(landmarks);
        if let Some(run) = tracker.update(state.is_blinking) {
            runs.push(run);
        }
    }

    assert_eq!(
        runs,
        vec![
            BlinkRun { frames: 3, valid: true },
            BlinkRun { frames: 1, valid: false },
            BlinkRun { frames: 8, valid: false },
        ]
    );
    assert_eq!(tracker.valid_blinks(), 1);
    assert_eq!(tracker.current_run(), 0);
}

#[test]
fn test_mesh_without_eye_landmarks() {
    let pixels = SyntheticFace::frontal().pixels();
    let landmarks = proctor_signals::landmarks::LandmarkSet::from_pixels(&pixels[..100], 640.0, 480.0);
    let state = BlinkDetector::new(&BlinkConfig::default()).detect_from_landmarks(&landmarks);
    assert!(state.avg_ear.is_none());
    assert!(!state.is_blinking);
}
