use std::f32::consts::{FRAC_PI_2, PI};

use aruco_calibration::marker::quad::{QuadParams, convex_hull, fit_quad, polygon_area2};
use aruco_calibration::marker::threshold::{IntegralImage, adaptive_threshold};
use aruco_calibration::marker::union_find::UnionFind;
use aruco_calibration::util::{
    axis_angle_diff, otsu_threshold, parse_switch, sample_bilinear, signed_area2,
};
use glam::Vec2;

#[test]
fn test_sample_bilinear() {
    let img = image::GrayImage::from_raw(2, 2, vec![0, 100, 200, 50]).unwrap();
    assert_eq!(sample_bilinear(&img, 0.0, 0.0), 0.0);
    assert_eq!(sample_bilinear(&img, 1.0, 0.0), 100.0);
    assert!((sample_bilinear(&img, 0.5, 0.0) - 50.0).abs() < 1e-4);
    assert!((sample_bilinear(&img, 0.5, 0.5) - 87.5).abs() < 1e-4);
    // clamped outside
    assert_eq!(sample_bilinear(&img, -3.0, 5.0), 200.0);
}

#[test]
fn test_otsu_splits_two_modes() {
    let mut samples = vec![20.0; 30];
    samples.extend(vec![210.0; 20]);
    let t = otsu_threshold(&samples);
    assert!(t > 20.0 && t < 210.0);
}

#[test]
fn test_angles_and_areas() {
    assert!(axis_angle_diff(0.1, 0.1 + PI).abs() < 1e-5);
    assert!((axis_angle_diff(0.0, FRAC_PI_2) - FRAC_PI_2).abs() < 1e-5);
    assert!((axis_angle_diff(0.2, PI - 0.1) - 0.3).abs() < 1e-5);

    // right then down is clockwise on screen
    let a = signed_area2(Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0));
    assert!(a > 0.0);
}

#[test]
fn test_union_find() {
    let mut uf = UnionFind::new(6);
    uf.union(0, 1);
    uf.union(1, 2);
    uf.union(4, 5);
    assert_eq!(uf.find(0), uf.find(2));
    assert_ne!(uf.find(0), uf.find(4));
    assert_eq!(uf.set_size(2), 3);
    assert_eq!(uf.set_size(3), 1);
    assert_eq!(uf.set_size(5), 2);
}

#[test]
fn test_adaptive_threshold_marks_dark_square() {
    let img = image::GrayImage::from_fn(40, 40, |x, y| {
        if (10..30).contains(&x) && (10..30).contains(&y) {
            image::Luma([20])
        } else {
            image::Luma([220])
        }
    });
    let integral = IntegralImage::new(&img);
    assert!((integral.window_mean(2, 2, 2) - 220.0).abs() < 1e-3);
    let mask = adaptive_threshold(&img, &integral, 13, 7.0);
    // the square's rim is dark, the background is not
    assert!(mask[10 * 40 + 10]);
    assert!(mask[10 * 40 + 20]);
    assert!(!mask[2 * 40 + 2]);
    assert!(!mask[20 * 40 + 5]);
}

#[test]
fn test_fit_quad_on_square_outline() {
    let mut boundary = Vec::new();
    for i in 0..=40 {
        let t = i as f32;
        boundary.extend([
            Vec2::new(10.0 + t, 10.0),
            Vec2::new(50.0, 10.0 + t),
            Vec2::new(50.0 - t, 50.0),
            Vec2::new(10.0, 50.0 - t),
        ]);
    }
    let hull = convex_hull(&boundary);
    assert_eq!(hull.len(), 4);
    assert!(polygon_area2(&hull) > 0.0);

    let quad = fit_quad(&boundary, 10.0, 1000.0, &QuadParams::default()).unwrap();
    assert!((polygon_area2(&quad) - 2.0 * 1600.0).abs() < 1e-2);
    for corner in [
        Vec2::new(10.0, 10.0),
        Vec2::new(50.0, 10.0),
        Vec2::new(50.0, 50.0),
        Vec2::new(10.0, 50.0),
    ] {
        assert!(quad.contains(&corner));
    }
    assert!(fit_quad(&boundary, 500.0, 1000.0, &QuadParams::default()).is_none());
}

#[test]
fn test_parse_switch_only_accepts_true() {
    assert_eq!(parse_switch("true"), Ok(true));
    for value in ["false", "1", "yes", "TRUE", "True", "", " true"] {
        assert_eq!(parse_switch(value), Ok(false), "{:?}", value);
    }
}
