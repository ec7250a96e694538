//! Configuration files on disk

use proctor_signals::{
    config::{Config, EXAMPLE_CONFIG},
    violations::ViolationKind,
    Error,
};
use std::io::Write;

#[test]
fn test_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("proctor.yaml");

    let mut config = Config::default();
    config.evidence.cooldown_seconds = 3.5;
    config.evidence.capture_violations.insert(ViolationKind::NoFace);
    config.head_pose.fov_degrees = Some(70.0);
    config.to_file(&path).unwrap();

    let loaded = Config::from_file(&path).unwrap();
    assert_eq!(loaded, config);
    loaded.validate().unwrap();
}

#[test]
fn test_partial_file_uses_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "gaze:\n  center_tolerance: 8.0\nevidence:\n  max_per_session: 5").unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.gaze.center_tolerance, 8.0);
    assert_eq!(config.gaze.right_threshold, 20.0);
    assert_eq!(config.evidence.max_per_session, 5);
    assert_eq!(config.blink, Config::default().blink);
}

#[test]
fn test_example_file_parses_and_validates() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(EXAMPLE_CONFIG.as_bytes()).unwrap();
    let config = Config::from_file(file.path()).unwrap();
    config.validate().unwrap();
}

#[test]
fn test_unknown_violation_kind_is_a_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "evidence:\n  capture_violations: [phone_violation, talking]").unwrap();
    assert!(matches!(Config::from_file(file.path()), Err(Error::ConfigError(_))));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Config::from_file(dir.path().join("absent.yaml")),
        Err(Error::IoError(_))
    ));
}

fn assert_rejected(config: &Config) {
    assert!(matches!(config.validate(), Err(Error::ConfigError(_))), "{config:?}");
}

#[test]
fn test_gaze_quality_bounds_are_validated() {
    for value in [-0.1, 1.5, f64::NAN] {
        let mut config = Config::default();
        config.gaze.min_quality = value;
        assert_rejected(&config);

        let mut config = Config::default();
        config.gaze.reject_quality = value;
        assert_rejected(&config);

        let mut config = Config::default();
        config.gaze.fallback_quality = value;
        assert_rejected(&config);
    }

    let mut config = Config::default();
    config.gaze.min_quality = 1.0;
    config.gaze.reject_quality = 0.0;
    config.validate().unwrap();
}

#[test]
fn test_non_finite_vertical_attenuation_is_rejected() {
    for value in [f64::NAN, f64::INFINITY] {
        let mut config = Config::default();
        config.gaze.vertical_attenuation = value;
        assert_rejected(&config);
    }
}

#[test]
fn test_zero_pose_iterations_is_rejected() {
    let mut config = Config::default();
    config.head_pose.max_iterations = 0;
    assert_rejected(&config);
}

#[test]
fn test_out_of_range_file_values_fail_validation() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "gaze:\n  reject_quality: 2.0\nhead_pose:\n  max_iterations: 0").unwrap();
    let config = Config::from_file(file.path()).unwrap();
    assert_rejected(&config);
}
