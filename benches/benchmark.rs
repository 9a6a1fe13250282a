use aruco_calibration::board::MarkerGeometry;
use aruco_calibration::camera::CameraProfile;
use aruco_calibration::chessboard::chess_response;
use aruco_calibration::optimization::factors::ReprojectionFactor;
use aruco_calibration::optimization::{PerspectiveSolver, SqPnpSolver};
use aruco_calibration::types::RvecTvec;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use glam::Vec2;
use nalgebra as na;
use tiny_solver::factors::Factor;

fn bench_chess_response(c: &mut Criterion) {
    let img = image::GrayImage::from_fn(640, 480, |x, y| {
        if ((x / 40) + (y / 40)) % 2 == 0 {
            image::Luma([30])
        } else {
            image::Luma([220])
        }
    });
    c.bench_function("chess_response_640x480", |b| {
        b.iter(|| chess_response(black_box(&img)))
    });
}

fn bench_reprojection_residual(c: &mut Criterion) {
    let intrinsics = CameraProfile::oneplus_11().intrinsics;
    let p3d = glam::Vec3::new(10.0, 20.0, 0.0);
    let p2d = Vec2::new(1600.0, 2000.0);
    let factor = ReprojectionFactor::new(&p3d, &p2d);
    let all_params = vec![
        intrinsics.params(),
        intrinsics.distortion_params(),
        na::dvector![0.1, -0.2, 0.05],
        na::dvector![10.0, -5.0, 300.0],
    ];

    c.bench_function("reprojection_residual", |b| {
        b.iter(|| factor.residual_func(black_box(&all_params)))
    });
}

fn bench_marker_pnp(c: &mut Criterion) {
    let intrinsics = CameraProfile::oneplus_11().intrinsics;
    let object = MarkerGeometry::default().corners();
    let truth = RvecTvec::new(
        &na::Vector3::new(0.1, -0.2, 0.05),
        &na::Vector3::new(10.0, -5.0, 300.0),
    );
    let image: Vec<Vec2> = intrinsics
        .project_points(&truth, &object)
        .into_iter()
        .flatten()
        .map(|p| Vec2::new(p.x as f32, p.y as f32))
        .collect();
    let solver = SqPnpSolver::default();

    c.bench_function("marker_pnp", |b| {
        b.iter(|| solver.solve(black_box(&object), black_box(&image), &intrinsics))
    });
}

criterion_group!(
    benches,
    bench_chess_response,
    bench_reprojection_residual,
    bench_marker_pnp
);
criterion_main!(benches);
