use nalgebra as na;
use serde::{Deserialize, Serialize};

/// Axis-angle rotation plus translation, mapping object coordinates into the camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RvecTvec {
    rvec: [f64; 3],
    tvec: [f64; 3],
}

/// Pose of a marker (or a calibration view) relative to the camera.
pub type PoseEstimate = RvecTvec;

impl RvecTvec {
    pub fn new(rvec: &na::Vector3<f64>, tvec: &na::Vector3<f64>) -> RvecTvec {
        RvecTvec {
            rvec: [rvec.x, rvec.y, rvec.z],
            tvec: [tvec.x, tvec.y, tvec.z],
        }
    }
    pub fn from_slices(rvec: &[f64], tvec: &[f64]) -> RvecTvec {
        RvecTvec {
            rvec: [rvec[0], rvec[1], rvec[2]],
            tvec: [tvec[0], tvec[1], tvec[2]],
        }
    }
    pub fn na_rvec(&self) -> na::Vector3<f64> {
        na::Vector3::from(self.rvec)
    }
    pub fn na_tvec(&self) -> na::Vector3<f64> {
        na::Vector3::from(self.tvec)
    }
    pub fn to_dvecs(&self) -> (na::DVector<f64>, na::DVector<f64>) {
        (
            na::DVector::from_column_slice(&self.rvec),
            na::DVector::from_column_slice(&self.tvec),
        )
    }
    pub fn to_na_isometry3(&self) -> na::Isometry3<f64> {
        na::Isometry3::new(self.na_tvec(), self.na_rvec())
    }
    pub fn transform_point(&self, p: &na::Point3<f64>) -> na::Point3<f64> {
        self.to_na_isometry3() * p
    }
}

pub trait ToRvecTvec {
    fn to_rvec_tvec(&self) -> RvecTvec;
}

impl ToRvecTvec for na::Isometry3<f64> {
    fn to_rvec_tvec(&self) -> RvecTvec {
        RvecTvec::new(&self.rotation.scaled_axis(), &self.translation.vector)
    }
}
