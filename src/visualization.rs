use std::io::Cursor;

use image::DynamicImage;
use nalgebra as na;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rerun::RecordingStream;

use crate::board::MarkerGeometry;
use crate::camera::CameraIntrinsics;
use crate::detected_points::{MarkerDetections, ObservationPair};
use crate::error::{CalibError, Result};
use crate::io::MarkerPose;

pub fn log_image_as_compressed(
    recording: &RecordingStream,
    topic: &str,
    img: &DynamicImage,
    format: image::ImageFormat,
) -> Result<()> {
    let mut bytes: Vec<u8> = Vec::new();
    img.to_rgb8()
        .write_to(&mut Cursor::new(&mut bytes), format)
        .map_err(|e| CalibError::Visualization(e.to_string()))?;
    recording.log(
        format!("{}/image", topic),
        &rerun::EncodedImage::from_file_contents(bytes),
    )?;
    Ok(())
}

pub fn id_to_color(id: usize) -> (u8, u8, u8, u8) {
    let mut rng = ChaCha8Rng::seed_from_u64(id as u64);
    let color_num = rng.random_range(0..2u32.pow(24));
    (
        ((color_num >> 16) % 256) as u8,
        ((color_num >> 8) % 256) as u8,
        (color_num % 256) as u8,
        255,
    )
}

/// rerun use top left corner as (0, 0)
pub fn rerun_shift(p2ds: &[(f32, f32)]) -> Vec<(f32, f32)> {
    p2ds.iter().map(|(x, y)| (*x + 0.5, *y + 0.5)).collect()
}

fn closed_strip(corners: &[glam::Vec2; 4]) -> [[f32; 2]; 5] {
    std::array::from_fn(|i| {
        let p = corners[i % 4];
        [p.x + 0.5, p.y + 0.5]
    })
}

/// Detected corners of one calibration view, colored by row.
pub fn log_observation(
    recording: &RecordingStream,
    topic: &str,
    observation: &ObservationPair,
    cols: usize,
) -> Result<()> {
    let (pts, colors_labels): (Vec<_>, Vec<_>) = observation
        .image_points()
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let color = id_to_color(i / cols.max(1));
            ((p.x, p.y), (color, format!("{}", i)))
        })
        .unzip();
    let (colors, labels): (Vec<_>, Vec<_>) = colors_labels.into_iter().unzip();
    let pts = rerun_shift(&pts);
    recording.log(
        format!("{}/pts", topic),
        &rerun::Points2D::new(pts)
            .with_colors(colors)
            .with_labels(labels)
            .with_radii([rerun::Radius::new_ui_points(3.0)]),
    )?;
    Ok(())
}

/// Marker outlines with their ids; rejected candidates in gray.
pub fn log_marker_detections(
    recording: &RecordingStream,
    topic: &str,
    detections: &MarkerDetections,
) -> Result<()> {
    let strips: Vec<_> = detections
        .markers
        .iter()
        .map(|m| closed_strip(&m.corners))
        .collect();
    let colors: Vec<_> = detections
        .markers
        .iter()
        .map(|m| id_to_color(m.id as usize))
        .collect();
    let labels: Vec<_> = detections
        .markers
        .iter()
        .map(|m| format!("id={}", m.id))
        .collect();
    recording.log(
        format!("{}/markers", topic),
        &rerun::LineStrips2D::new(strips)
            .with_colors(colors)
            .with_labels(labels)
            .with_radii([rerun::Radius::new_ui_points(2.0)]),
    )?;

    let first_corners: Vec<_> = detections
        .markers
        .iter()
        .map(|m| (m.corners[0].x, m.corners[0].y))
        .collect();
    recording.log(
        format!("{}/first_corner", topic),
        &rerun::Points2D::new(rerun_shift(&first_corners))
            .with_colors([(255, 0, 0, 255)])
            .with_radii([rerun::Radius::new_ui_points(4.0)]),
    )?;

    let rejected: Vec<_> = detections.rejected.iter().map(closed_strip).collect();
    recording.log(
        format!("{}/rejected", topic),
        &rerun::LineStrips2D::new(rejected)
            .with_colors([(128, 128, 128, 255)])
            .with_radii([rerun::Radius::new_ui_points(1.0)]),
    )?;
    Ok(())
}

/// Projected x (red), y (green) and z (blue) axes of every marker pose.
pub fn log_pose_axes(
    recording: &RecordingStream,
    topic: &str,
    intrinsics: &CameraIntrinsics,
    poses: &[MarkerPose],
    axis_length: f32,
) -> Result<()> {
    let l = axis_length as f64;
    let axes = [
        (na::Point3::new(l, 0.0, 0.0), (255, 0, 0, 255)),
        (na::Point3::new(0.0, l, 0.0), (0, 255, 0, 255)),
        (na::Point3::new(0.0, 0.0, l), (0, 0, 255, 255)),
    ];
    let mut strips = Vec::new();
    let mut colors = Vec::new();
    for marker in poses {
        let transform = marker.pose.to_na_isometry3();
        let Some(origin) = intrinsics.project_one(&(transform * na::Point3::origin()).coords) else {
            continue;
        };
        for (end, color) in &axes {
            if let Some(tip) = intrinsics.project_one(&(transform * end).coords) {
                strips.push([
                    [origin.x as f32 + 0.5, origin.y as f32 + 0.5],
                    [tip.x as f32 + 0.5, tip.y as f32 + 0.5],
                ]);
                colors.push(*color);
            }
        }
    }
    recording.log(
        format!("{}/axes", topic),
        &rerun::LineStrips2D::new(strips)
            .with_colors(colors)
            .with_radii([rerun::Radius::new_ui_points(2.0)]),
    )?;
    Ok(())
}

/// Axis length used by the pose display, 1.5 marker sides.
pub fn axis_length_for(geometry: &MarkerGeometry) -> f32 {
    geometry.side_length() * 1.5
}
