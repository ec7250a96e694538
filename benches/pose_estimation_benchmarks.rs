//! Benchmarks for pose estimation and geometry helpers

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::{Point2, Point3, Vector3};
use proctor_signals::{
    camera::CameraModel,
    config::HeadPoseConfig,
    constants::CANONICAL_FACE_MODEL,
    pose_estimation::{pose_angles, solve_pnp, HeadPoseEstimator},
    utils::geometry::{bounding_box_from_points, centroid},
};

fn projected_face(camera: &CameraModel, yaw_degrees: f64) -> [Point2<f64>; 6] {
    let rotation = Vector3::new(0.0, yaw_degrees.to_radians(), 0.0);
    let translation = Vector3::new(0.0, 0.0, 600.0);
    CANONICAL_FACE_MODEL.map(|[x, y, z]| {
        camera
            .project(&Point3::new(x, y, z), &rotation, &translation)
            .expect("face in front of camera")
    })
}

fn benchmark_pose_estimation(c: &mut Criterion) {
    let mut group = c.benchmark_group("pose_estimation");

    let camera = CameraModel::from_dimensions(640.0, 480.0).expect("valid camera");
    let model = CANONICAL_FACE_MODEL.map(|[x, y, z]| Point3::new(x, y, z));
    let frontal = projected_face(&camera, 0.0);
    let turned = projected_face(&camera, 25.0);

    group.bench_function("solve_pnp_frontal", |b| {
        b.iter(|| black_box(solve_pnp(&model, black_box(&frontal), &camera, 100, 0.25)));
    });

    group.bench_function("solve_pnp_turned", |b| {
        b.iter(|| black_box(solve_pnp(&model, black_box(&turned), &camera, 100, 0.25)));
    });

    let solution = solve_pnp(&model, &turned, &camera, 100, 0.25).expect("pose converges");
    group.bench_function("pose_angles", |b| {
        b.iter(|| black_box(pose_angles(black_box(&solution), &camera, &turned[0])));
    });

    let mut estimator = HeadPoseEstimator::new(&HeadPoseConfig::default());
    group.bench_function("estimator_with_cached_camera", |b| {
        b.iter(|| black_box(estimator.estimate(black_box(&turned), 640.0, 480.0)));
    });

    group.finish();
}

fn benchmark_utils(c: &mut Criterion) {
    let mut group = c.benchmark_group("utils");

    let points: Vec<Point2<f64>> = (0..478)
        .map(|i| {
            let angle = f64::from(i) * 2.0 * std::f64::consts::PI / 478.0;
            Point2::new(320.0 + 100.0 * angle.cos(), 240.0 + 100.0 * angle.sin())
        })
        .collect();

    group.bench_function("centroid_478", |b| {
        b.iter(|| black_box(centroid(black_box(&points))));
    });

    group.bench_function("bounding_box_478", |b| {
        b.iter(|| black_box(bounding_box_from_points(black_box(&points), 10.0)));
    });

    group.finish();
}

criterion_group!(benches, benchmark_pose_estimation, benchmark_utils);
criterion_main!(benches);
