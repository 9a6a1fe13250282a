mod common;

use aruco_calibration::board::MarkerGeometry;
use aruco_calibration::camera::CameraIntrinsics;
use aruco_calibration::marker::{MarkerDetector, MarkerDictionary};
use aruco_calibration::pipeline::PosePipeline;
use aruco_calibration::visualization::{
    axis_length_for, id_to_color, log_image_as_compressed, log_marker_detections, log_pose_axes,
};
use common::render_marker;
use tempfile::TempDir;

#[test]
fn test_id_colors_are_stable() {
    assert_eq!(id_to_color(7), id_to_color(7));
    assert_ne!(id_to_color(7), id_to_color(8));
    assert_eq!(id_to_color(3).3, 255);
}

#[test]
fn test_pose_scene_saves_to_rrd() {
    let dictionary = MarkerDictionary::builtin("DICT_6X6_50").unwrap();
    let (img, _) = render_marker(240, 240, dictionary.codes[5], 6, 12.0, 0.3);
    let img = image::DynamicImage::ImageLuma8(img);
    let pipeline = PosePipeline::with_detector(
        MarkerDetector::from_dictionary(dictionary).unwrap(),
        MarkerGeometry::default(),
        CameraIntrinsics::new(500.0, 500.0, 119.5, 119.5, [0.0; 5]),
    );
    let (report, detections) = pipeline.process(&img);
    assert_eq!(report.detected_ids, vec![5]);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scene.rrd");
    let recording = rerun::RecordingStreamBuilder::new("visualization_test")
        .save(&path)
        .unwrap();
    log_image_as_compressed(&recording, "image", &img, image::ImageFormat::Png).unwrap();
    log_marker_detections(&recording, "image", &detections).unwrap();
    log_pose_axes(
        &recording,
        "image",
        pipeline.intrinsics(),
        &report.poses,
        axis_length_for(pipeline.geometry()),
    )
    .unwrap();
    recording.flush_blocking();
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}
