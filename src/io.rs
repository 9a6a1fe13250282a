use std::fmt;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::camera::CameraIntrinsics;
use crate::error::{CalibError, Result};
use crate::types::RvecTvec;

/// Serializes an object to a JSON file.
pub fn object_to_json<T: Serialize>(output_path: &Path, object: &T) -> Result<()> {
    let j = serde_json::to_string_pretty(object)?;
    let mut file = std::fs::File::create(output_path)?;
    file.write_all(j.as_bytes())?;
    Ok(())
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    if !file_path.is_file() {
        return Err(CalibError::InputNotFound(file_path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Outcome of a calibration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrinsicsReport {
    pub rms: f64,
    pub intrinsics: CameraIntrinsics,
    pub image_size: (u32, u32),
    pub views_used: Vec<String>,
    pub views_skipped: Vec<String>,
    pub per_view_rms: Vec<f64>,
}

impl fmt::Display for IntrinsicsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RMS reprojection error: {}", self.rms)?;
        writeln!(f, "Camera matrix:")?;
        let k = self.intrinsics.camera_matrix();
        for r in 0..3 {
            writeln!(f, "[{}, {}, {}]", k[(r, 0)], k[(r, 1)], k[(r, 2)])?;
        }
        let d = self.intrinsics.distortion;
        write!(
            f,
            "Distortion coefficients: [{}, {}, {}, {}, {}]",
            d[0], d[1], d[2], d[3], d[4]
        )
    }
}

/// Writes a calibration summary with per-view reprojection errors to a text file.
pub fn write_report(output_path: &Path, report: &IntrinsicsReport) -> Result<()> {
    let mut s = String::new();
    s += format!("image size: {} x {}\n", report.image_size.0, report.image_size.1).as_str();
    s += format!(
        "views used: {}, skipped: {}\n\n",
        report.views_used.len(),
        report.views_skipped.len()
    )
    .as_str();
    s += format!("{}\n\n", report).as_str();
    for (name, rms) in report.views_used.iter().zip(&report.per_view_rms) {
        s += format!("{}:\n", name).as_str();
        s += format!("    rms reprojection error: {:.5} px\n", rms).as_str();
    }
    for name in &report.views_skipped {
        s += format!("{}: skipped\n", name).as_str();
    }
    let mut file = std::fs::File::create(output_path)?;
    file.write_all(s.as_bytes())?;
    Ok(())
}

/// Pose of one decoded marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerPose {
    pub id: u32,
    pub pose: RvecTvec,
    pub rms: f64,
}

/// Markers found in one image with their poses, in detection order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoseReport {
    pub detected_ids: Vec<u32>,
    pub poses: Vec<MarkerPose>,
    pub rejected_candidates: usize,
}

impl PoseReport {
    pub fn sorted_ids(&self) -> Vec<u32> {
        let mut ids = self.detected_ids.clone();
        ids.sort_unstable();
        ids
    }
}

fn format_vec3(v: &nalgebra::Vector3<f64>) -> String {
    format!("[{}, {}, {}]", v.x, v.y, v.z)
}

impl fmt::Display for PoseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.sorted_ids().iter().map(|i| i.to_string()).collect();
        writeln!(f, "Detected marker ids: {}", ids.join(" "))?;
        writeln!(f, "Number of detected markers: {}", self.detected_ids.len())?;
        for marker in &self.poses {
            writeln!(f, "Marker {}:", marker.id)?;
            writeln!(f, "  Rotation Vector: {}", format_vec3(&marker.pose.na_rvec()))?;
            writeln!(f, "  Translation Vector: {}", format_vec3(&marker.pose.na_tvec()))?;
        }
        Ok(())
    }
}
