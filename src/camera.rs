use std::path::Path;

use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::error::{CalibError, Result};
use crate::io::{object_from_json, object_to_json};
use crate::types::RvecTvec;

/// Pinhole intrinsics (zero skew) with the five-coefficient radial-tangential
/// distortion `[k1, k2, p1, p2, k3]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub distortion: [f64; 5],
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, distortion: [f64; 5]) -> CameraIntrinsics {
        CameraIntrinsics {
            fx,
            fy,
            cx,
            cy,
            distortion,
        }
    }

    pub fn from_camera_matrix(k: &na::Matrix3<f64>, distortion: [f64; 5]) -> CameraIntrinsics {
        CameraIntrinsics::new(k[(0, 0)], k[(1, 1)], k[(0, 2)], k[(1, 2)], distortion)
    }

    pub fn camera_matrix(&self) -> na::Matrix3<f64> {
        na::Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// `[fx, fy, cx, cy]`, the layout used by the optimizer.
    pub fn params(&self) -> na::DVector<f64> {
        na::dvector![self.fx, self.fy, self.cx, self.cy]
    }

    pub fn distortion_params(&self) -> na::DVector<f64> {
        na::DVector::from_column_slice(&self.distortion)
    }

    pub fn from_params(params: &[f64], distortion: &[f64]) -> CameraIntrinsics {
        CameraIntrinsics::new(
            params[0],
            params[1],
            params[2],
            params[3],
            [
                distortion[0],
                distortion[1],
                distortion[2],
                distortion[3],
                distortion[4],
            ],
        )
    }

    /// Projects a camera-frame point to pixels. `None` for points at or behind the camera plane.
    pub fn project_one(&self, p: &na::Vector3<f64>) -> Option<na::Vector2<f64>> {
        if p.z <= f64::EPSILON {
            return None;
        }
        Some(project_with_distortion(
            &[self.fx, self.fy, self.cx, self.cy],
            &self.distortion,
            p,
        ))
    }

    /// Projects object points seen from `pose`.
    pub fn project_points(
        &self,
        pose: &RvecTvec,
        points: &[glam::Vec3],
    ) -> Vec<Option<na::Vector2<f64>>> {
        let transform = pose.to_na_isometry3();
        points
            .iter()
            .map(|p| {
                let p_cam = transform * na::Point3::new(p.x as f64, p.y as f64, p.z as f64);
                self.project_one(&p_cam.coords)
            })
            .collect()
    }

    /// Removes distortion from a pixel, returning normalized image coordinates `(x/z, y/z)`.
    ///
    /// Damped Newton iteration on the distortion model, stopping once the
    /// redistorted point matches the input to `UNDISTORT_TOLERANCE`.
    pub fn undistort_point(&self, px: &na::Vector2<f64>) -> na::Vector2<f64> {
        let target = na::Vector2::new((px.x - self.cx) / self.fx, (px.y - self.cy) / self.fy);
        let residual = |p: &na::Vector2<f64>| {
            let (xd, yd) = distort_normalized(p.x, p.y, &self.distortion);
            na::Vector2::new(xd, yd) - target
        };
        let mut p = target;
        let mut err = residual(&p);
        for _ in 0..UNDISTORT_MAX_ITERATIONS {
            if err.norm() < UNDISTORT_TOLERANCE {
                break;
            }
            let Some(step) = self.distortion_jacobian(&p).try_inverse().map(|j| j * err) else {
                break;
            };
            // halve the step until the residual shrinks
            let mut scale = 1.0;
            let accepted = loop {
                let candidate = p - step * scale;
                let candidate_err = residual(&candidate);
                if candidate_err.norm() < err.norm() {
                    break Some((candidate, candidate_err));
                }
                scale *= 0.5;
                if scale < 1e-4 {
                    break None;
                }
            };
            match accepted {
                Some((next, next_err)) => {
                    p = next;
                    err = next_err;
                }
                None => break,
            }
        }
        if err.norm() >= UNDISTORT_TOLERANCE {
            log::trace!("undistortion stopped at residual {:.3e}", err.norm());
        }
        p
    }

    /// Partial derivatives of `distort_normalized` at `p`.
    fn distortion_jacobian(&self, p: &na::Vector2<f64>) -> na::Matrix2<f64> {
        let [k1, k2, p1, p2, k3] = self.distortion;
        let (x, y) = (p.x, p.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + ((k3 * r2 + k2) * r2 + k1) * r2;
        let d_radial = k1 + (2.0 * k2 + 3.0 * k3 * r2) * r2;
        let cross = 2.0 * x * y * d_radial + 2.0 * p1 * x + 2.0 * p2 * y;
        na::Matrix2::new(
            radial + 2.0 * x * x * d_radial + 2.0 * p1 * y + 6.0 * p2 * x,
            cross,
            cross,
            radial + 2.0 * y * y * d_radial + 6.0 * p1 * y + 2.0 * p2 * x,
        )
    }

    /// Pixel RMS of `object` seen from `pose` against `image`. Infinite when a
    /// point lands behind the camera.
    pub fn reprojection_rms(
        &self,
        pose: &RvecTvec,
        object: &[glam::Vec3],
        image: &[glam::Vec2],
    ) -> f64 {
        let sum: f64 = self
            .project_points(pose, object)
            .iter()
            .zip(image)
            .map(|(projected, observed)| match projected {
                Some(p) => (p - na::Vector2::new(observed.x as f64, observed.y as f64)).norm_squared(),
                None => f64::INFINITY,
            })
            .sum();
        if image.is_empty() {
            0.0
        } else {
            (sum / image.len() as f64).sqrt()
        }
    }

    /// Positive finite focal lengths, finite center and distortion.
    pub fn validate(&self) -> Result<()> {
        if !(self.fx.is_finite() && self.fx > 0.0 && self.fy.is_finite() && self.fy > 0.0) {
            return Err(CalibError::InvalidCamera(format!(
                "focal lengths must be positive, got fx {} fy {}",
                self.fx, self.fy
            )));
        }
        if !(self.cx.is_finite() && self.cy.is_finite()) {
            return Err(CalibError::InvalidCamera(format!(
                "principal point ({}, {}) is not finite",
                self.cx, self.cy
            )));
        }
        if self.distortion.iter().any(|d| !d.is_finite()) {
            return Err(CalibError::InvalidCamera(format!(
                "distortion {:?} is not finite",
                self.distortion
            )));
        }
        Ok(())
    }
}

const UNDISTORT_MAX_ITERATIONS: usize = 50;
const UNDISTORT_TOLERANCE: f64 = 1e-12;

/// Applies `[k1, k2, p1, p2, k3]` to normalized coordinates.
pub fn distort_normalized<T: na::RealField>(x: T, y: T, d: &[T]) -> (T, T) {
    let two = T::one() + T::one();
    let r2 = x.clone() * x.clone() + y.clone() * y.clone();
    let r4 = r2.clone() * r2.clone();
    let r6 = r4.clone() * r2.clone();
    let radial = T::one() + d[0].clone() * r2.clone() + d[1].clone() * r4 + d[4].clone() * r6;
    let xy = x.clone() * y.clone();
    let xd = x.clone() * radial.clone()
        + two.clone() * d[2].clone() * xy.clone()
        + d[3].clone() * (r2.clone() + two.clone() * x.clone() * x);
    let yd = y.clone() * radial
        + d[2].clone() * (r2 + two.clone() * y.clone() * y)
        + two * d[3].clone() * xy;
    (xd, yd)
}

/// Pinhole projection with distortion; `intrinsics` is `[fx, fy, cx, cy]`.
///
/// Generic so the same model drives both plain evaluation and autodiff residuals.
pub fn project_with_distortion<T: na::RealField>(
    intrinsics: &[T],
    distortion: &[T],
    p: &na::Vector3<T>,
) -> na::Vector2<T> {
    let x = p[0].clone() / p[2].clone();
    let y = p[1].clone() / p[2].clone();
    let (xd, yd) = distort_normalized(x, y, distortion);
    na::Vector2::new(
        intrinsics[0].clone() * xd + intrinsics[2].clone(),
        intrinsics[1].clone() * yd + intrinsics[3].clone(),
    )
}

/// Intrinsics with enough provenance to tell calibrations apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraProfile {
    pub label: String,
    /// Capture date, `YYYY-MM-DD`.
    pub captured: String,
    #[serde(default)]
    pub image_size: Option<(u32, u32)>,
    pub intrinsics: CameraIntrinsics,
}

impl CameraProfile {
    /// Calibration of the OnePlus 11 main camera taken on 2025-10-22.
    pub fn oneplus_11() -> CameraProfile {
        CameraProfile {
            label: "OnePlus 11".to_string(),
            captured: "2025-10-22".to_string(),
            image_size: None,
            intrinsics: CameraIntrinsics::new(
                3014.044254828271,
                2997.408167857721,
                1528.275218587665,
                1925.62623776718,
                [
                    -0.1941553080712784,
                    -1.392641662440838,
                    -0.005725443843629925,
                    -0.003499506162759533,
                    2.776044852295584,
                ],
            ),
        }
    }

    pub fn from_json_file(path: &Path) -> Result<CameraProfile> {
        let profile: CameraProfile = object_from_json(path)?;
        profile.intrinsics.validate()?;
        Ok(profile)
    }

    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        object_to_json(path, self)
    }
}
