use aruco_calibration::CalibError;
use aruco_calibration::camera::{CameraIntrinsics, CameraProfile};
use aruco_calibration::io::{IntrinsicsReport, MarkerPose, PoseReport, write_report};
use aruco_calibration::types::{RvecTvec, ToRvecTvec};
use nalgebra as na;
use tempfile::TempDir;

#[test]
fn test_rvec_tvec_isometry_round_trip() {
    let rt = RvecTvec::new(
        &na::Vector3::new(0.3, -0.2, 0.1),
        &na::Vector3::new(1.0, 2.0, 3.0),
    );
    let iso = rt.to_na_isometry3();
    let back = iso.to_rvec_tvec();
    assert!((back.na_rvec() - rt.na_rvec()).norm() < 1e-12);
    assert!((back.na_tvec() - rt.na_tvec()).norm() < 1e-12);

    let p = rt.transform_point(&na::Point3::new(0.0, 0.0, 0.0));
    assert_eq!(p.coords, rt.na_tvec());
}

#[test]
fn test_camera_matrix_and_projection() {
    let cam = CameraIntrinsics::new(800.0, 810.0, 320.0, 240.0, [0.0; 5]);
    let k = cam.camera_matrix();
    assert_eq!(k[(0, 0)], 800.0);
    assert_eq!(k[(1, 1)], 810.0);
    assert_eq!(k[(0, 2)], 320.0);
    assert_eq!(k[(1, 2)], 240.0);
    assert_eq!(k[(2, 2)], 1.0);
    assert_eq!(k[(0, 1)], 0.0);

    let px = cam.project_one(&na::Vector3::new(0.1, -0.2, 2.0)).unwrap();
    assert!((px.x - 360.0).abs() < 1e-9);
    assert!((px.y - 159.0).abs() < 1e-9);
    assert!(cam.project_one(&na::Vector3::new(0.1, 0.1, -1.0)).is_none());
    assert!(cam.project_one(&na::Vector3::new(0.1, 0.1, 0.0)).is_none());
}

#[test]
fn test_undistort_inverts_projection() {
    let cam = CameraProfile::oneplus_11().intrinsics;
    for (x, y) in [(0.0, 0.0), (0.05, -0.1), (-0.2, 0.15), (0.12, 0.2)] {
        let px = cam.project_one(&na::Vector3::new(x, y, 1.0)).unwrap();
        let n = cam.undistort_point(&px);
        assert!((n.x - x).abs() < 1e-6 && (n.y - y).abs() < 1e-6, "{:?}", n);
    }
}

#[test]
fn test_undistort_near_image_corners() {
    // r^2 around 0.55, where the phone lens model bends hardest
    let cam = CameraProfile::oneplus_11().intrinsics;
    let n = cam.undistort_point(&na::Vector2::new(86.7, 345.8));
    assert!((n.x + 0.502).abs() < 1e-3 && (n.y + 0.552).abs() < 1e-3, "{:?}", n);

    for (x, y) in [(-0.5, -0.55), (0.45, 0.55), (-0.48, 0.6), (0.5, -0.5)] {
        let px = cam.project_one(&na::Vector3::new(x, y, 1.0)).unwrap();
        let n = cam.undistort_point(&px);
        assert!((n.x - x).abs() < 1e-9 && (n.y - y).abs() < 1e-9, "({}, {}) -> {:?}", x, y, n);
    }
}

#[test]
fn test_intrinsics_validation() {
    assert!(CameraProfile::oneplus_11().intrinsics.validate().is_ok());
    let bad = [
        CameraIntrinsics::new(0.0, 500.0, 320.0, 240.0, [0.0; 5]),
        CameraIntrinsics::new(500.0, -1.0, 320.0, 240.0, [0.0; 5]),
        CameraIntrinsics::new(f64::NAN, 500.0, 320.0, 240.0, [0.0; 5]),
        CameraIntrinsics::new(500.0, 500.0, f64::INFINITY, 240.0, [0.0; 5]),
        CameraIntrinsics::new(500.0, 500.0, 320.0, 240.0, [0.0, f64::NAN, 0.0, 0.0, 0.0]),
    ];
    for cam in bad {
        assert!(matches!(cam.validate(), Err(CalibError::InvalidCamera(_))), "{:?}", cam);
    }
}

#[test]
fn test_profile_with_zero_focal_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("camera.json");
    let text = r#"{"label": "broken", "captured": "2024-01-01",
        "intrinsics": {"fx": 0.0, "fy": 1000.0, "cx": 320.0, "cy": 240.0, "distortion": [0, 0, 0, 0, 0]}}"#;
    std::fs::write(&path, text).unwrap();
    assert!(matches!(
        CameraProfile::from_json_file(&path),
        Err(CalibError::InvalidCamera(_))
    ));
}

#[test]
fn test_camera_profile_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("camera.json");
    let profile = CameraProfile::oneplus_11();
    assert_eq!(profile.label, "OnePlus 11");
    assert_eq!(profile.captured, "2025-10-22");
    profile.to_json_file(&path).unwrap();
    let loaded = CameraProfile::from_json_file(&path).unwrap();
    assert_eq!(loaded, profile);

    // image_size may be omitted
    let text = r#"{"label": "bench", "captured": "2024-01-01",
        "intrinsics": {"fx": 1.0, "fy": 1.0, "cx": 0.0, "cy": 0.0, "distortion": [0, 0, 0, 0, 0]}}"#;
    std::fs::write(&path, text).unwrap();
    let loaded = CameraProfile::from_json_file(&path).unwrap();
    assert_eq!(loaded.image_size, None);
    assert!(CameraProfile::from_json_file(&dir.path().join("missing.json")).is_err());
}

#[test]
fn test_intrinsics_report() {
    let dir = TempDir::new().unwrap();
    let report = IntrinsicsReport {
        rms: 0.25,
        intrinsics: CameraIntrinsics::new(1000.0, 1000.0, 640.0, 480.0, [0.1, 0.0, 0.0, 0.0, 0.0]),
        image_size: (1280, 960),
        views_used: vec!["chess01.jpg".to_string(), "chess03.jpg".to_string()],
        views_skipped: vec!["chess02.jpg".to_string()],
        per_view_rms: vec![0.2, 0.3],
    };
    let text = report.to_string();
    assert!(text.starts_with("RMS reprojection error: 0.25"));
    assert!(text.contains("Camera matrix:\n[1000, 0, 640]\n[0, 1000, 480]\n[0, 0, 1]"));
    assert!(text.contains("Distortion coefficients: [0.1, 0, 0, 0, 0]"));

    let path = dir.path().join("report.txt");
    write_report(&path, &report).unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("image size: 1280 x 960"));
    assert!(content.contains("chess03.jpg:"));
    assert!(content.contains("chess02.jpg: skipped"));
}

#[test]
fn test_pose_report_sorts_ids_for_display() {
    let pose = RvecTvec::new(&na::Vector3::zeros(), &na::Vector3::new(0.0, 0.0, 100.0));
    let report = PoseReport {
        detected_ids: vec![7, 2, 7],
        poses: vec![
            MarkerPose { id: 7, pose, rms: 0.1 },
            MarkerPose { id: 2, pose, rms: 0.1 },
        ],
        rejected_candidates: 4,
    };
    assert_eq!(report.sorted_ids(), vec![2, 7, 7]);
    let text = report.to_string();
    assert!(text.contains("Detected marker ids: 2 7 7"));
    assert!(text.contains("Number of detected markers: 3"));
    // poses stay in detection order
    let first = text.find("Marker 7").unwrap();
    let second = text.find("Marker 2").unwrap();
    assert!(first < second);
    assert!(text.contains("Translation Vector: [0, 0, 100]"));
}
