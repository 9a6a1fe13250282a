mod common;

use std::fs::File;

use aruco_calibration::CalibError;
use aruco_calibration::board::CalibrationPattern;
use aruco_calibration::chessboard::ChessboardDetector;
use aruco_calibration::data_loader::{
    SequenceNaming, collect_observations, discover_calibration_images, load_gray, load_image,
};
use aruco_calibration::pipeline::CalibrationPipeline;
use common::{render_chessboard, render_chessboard_view};
use image::codecs::jpeg::JpegEncoder;
use nalgebra as na;
use tempfile::TempDir;

#[test]
fn test_discovery_stops_at_first_gap() {
    let dir = TempDir::new().unwrap();
    for name in ["chess01.jpg", "chess02.jpg", "chess04.jpg", "other.jpg"] {
        File::create(dir.path().join(name)).unwrap();
    }
    let paths = discover_calibration_images(dir.path(), &SequenceNaming::default()).unwrap();
    let names: Vec<_> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["chess01.jpg", "chess02.jpg"]);
}

#[test]
fn test_discovery_without_first_image() {
    let dir = TempDir::new().unwrap();
    File::create(dir.path().join("chess02.jpg")).unwrap();
    let paths = discover_calibration_images(dir.path(), &SequenceNaming::default()).unwrap();
    assert!(paths.is_empty());
}

#[test]
fn test_custom_naming() {
    let naming = SequenceNaming {
        prefix: "view_".to_string(),
        extension: "png".to_string(),
        digits: 3,
    };
    assert_eq!(naming.file_name(7), "view_007.png");
    assert_eq!(SequenceNaming::default().file_name(12), "chess12.jpg");
}

#[test]
fn test_missing_folder() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope");
    let result = discover_calibration_images(&missing, &SequenceNaming::default());
    assert!(matches!(result, Err(CalibError::InputNotFound(p)) if p == missing));
}

#[test]
fn test_load_errors() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.png");
    assert!(matches!(load_image(&missing), Err(CalibError::InputNotFound(_))));

    let empty = dir.path().join("chess01.jpg");
    File::create(&empty).unwrap();
    assert!(matches!(load_gray(&empty), Err(CalibError::DecodeFailure { .. })));
}

#[test]
fn test_collect_skips_bad_images() {
    let dir = TempDir::new().unwrap();
    let (board, _) = render_chessboard(400, 320, 5, 7, 30.0, 0.15);
    let good = dir.path().join("chess01.png");
    board.save(&good).unwrap();
    let blank = dir.path().join("chess02.png");
    image::GrayImage::from_pixel(400, 320, image::Luma([180])).save(&blank).unwrap();
    let broken = dir.path().join("chess03.png");
    File::create(&broken).unwrap();

    let pattern = CalibrationPattern::new(5, 7, 30.0).unwrap();
    let paths = vec![good.clone(), blank.clone(), broken.clone()];
    let loaded = collect_observations(&paths, &pattern, &ChessboardDetector::default(), None);
    assert_eq!(loaded.observations.len(), 1);
    assert_eq!(loaded.used, vec![good]);
    assert_eq!(loaded.image_size, Some((400, 320)));
    assert_eq!(loaded.skipped.len(), 2);
    assert!(matches!(loaded.skipped[0], (ref p, CalibError::DetectionFailure { .. }) if *p == blank));
    assert!(matches!(loaded.skipped[1], (ref p, CalibError::DecodeFailure { .. }) if *p == broken));
}

#[test]
fn test_pipeline_on_empty_folder() {
    let dir = TempDir::new().unwrap();
    let pipeline = CalibrationPipeline::new(CalibrationPattern::default(), 1);
    let result = pipeline.run(dir.path(), None);
    assert!(matches!(result, Err(CalibError::InsufficientData { found: 0, .. })));

    let result = pipeline.run(&dir.path().join("missing"), None);
    assert!(matches!(result, Err(CalibError::InputNotFound(_))));
}

#[test]
fn test_pipeline_without_detections() {
    let dir = TempDir::new().unwrap();
    image::GrayImage::from_pixel(320, 240, image::Luma([90]))
        .save(dir.path().join("chess01.jpg"))
        .unwrap();
    let pipeline = CalibrationPipeline::new(CalibrationPattern::default(), 1);
    let result = pipeline.run(dir.path(), None);
    assert!(matches!(result, Err(CalibError::InsufficientData { found: 0, required: 1 })));
}

fn save_jpeg(img: &image::GrayImage, path: &std::path::Path) {
    let mut file = File::create(path).unwrap();
    JpegEncoder::new_with_quality(&mut file, 95).encode_image(img).unwrap();
}

#[test]
fn test_pipeline_calibrates_rendered_sequence() {
    let dir = TempDir::new().unwrap();
    let (rows, cols, square) = (6, 8, 25.0);
    let center = na::Translation3::new(
        -((cols - 1) as f64) * square * 0.5,
        -((rows - 1) as f64) * square * 0.5,
        0.0,
    );
    let views = [
        (0.35, 0.0, 0.05, -30.0, 20.0, 550.0),
        (-0.35, 0.1, -0.1, 30.0, -20.0, 600.0),
        (0.0, 0.4, 0.2, 40.0, 25.0, 560.0),
        (0.1, -0.4, -0.2, -40.0, -25.0, 580.0),
        (0.3, 0.3, 0.4, 10.0, 15.0, 540.0),
        (-0.3, -0.3, -0.3, -10.0, -30.0, 620.0),
    ];
    for (i, &(rx, ry, rz, tx, ty, tz)) in views.iter().enumerate() {
        let pose =
            na::Isometry3::new(na::Vector3::new(tx, ty, tz), na::Vector3::new(rx, ry, rz)) * center;
        let (img, _) = render_chessboard_view(640, 480, rows, cols, square, 800.0, &pose);
        save_jpeg(&img, &dir.path().join(format!("chess{:02}.jpg", i + 1)));
    }
    // a view without the board is skipped, the gap after it ends the sequence
    save_jpeg(
        &image::GrayImage::from_pixel(640, 480, image::Luma([200])),
        &dir.path().join("chess07.jpg"),
    );
    save_jpeg(
        &image::GrayImage::from_pixel(640, 480, image::Luma([200])),
        &dir.path().join("chess09.jpg"),
    );

    let pattern = CalibrationPattern::new(rows, cols, square as f32).unwrap();
    let (report, result) = CalibrationPipeline::new(pattern, 3).run(dir.path(), None).unwrap();
    assert_eq!(report.image_size, (640, 480));
    let expected: Vec<_> = (1..=6).map(|i| format!("chess{:02}.jpg", i)).collect();
    assert_eq!(report.views_used, expected);
    assert_eq!(report.views_skipped, vec!["chess07.jpg"]);
    assert_eq!(report.per_view_rms.len(), 6);
    assert_eq!(result.poses.len(), 6);
    assert!(report.rms < 1.0, "rms {}", report.rms);

    let k = &report.intrinsics;
    assert!((k.fx - 800.0).abs() < 40.0, "fx {}", k.fx);
    assert!((k.fy - 800.0).abs() < 40.0, "fy {}", k.fy);
    assert!((k.cx - 319.5).abs() < 30.0, "cx {}", k.cx);
    assert!((k.cy - 239.5).abs() < 30.0, "cy {}", k.cy);
}
