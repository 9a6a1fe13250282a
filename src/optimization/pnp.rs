use std::collections::HashMap;

use log::{debug, trace};
use nalgebra as na;
use tiny_solver::Optimizer;

use super::factors::ReprojectionFactor;
use super::homography::dlt_homography;
use super::linear::{pose_from_homography, sqpnp_pose};
use crate::camera::CameraIntrinsics;
use crate::error::{CalibError, Result};
use crate::types::RvecTvec;
use crate::util::signed_area2;

/// Triangles whose doubled area is below this fraction of the squared extent count as collinear.
const COLLINEAR_TOLERANCE: f32 = 1e-4;
/// Object points with `|z|` below this lie on the target plane.
const PLANAR_TOLERANCE: f32 = 1e-6;

/// Rejects point sets that cannot determine a pose: fewer than four points,
/// coincident points, or any three points on one line.
pub fn check_non_degenerate(points: &[glam::Vec2]) -> Result<()> {
    if points.len() < 4 {
        return Err(CalibError::DegenerateConfiguration(format!(
            "need at least 4 points, got {}",
            points.len()
        )));
    }
    let extent_sq = points
        .iter()
        .flat_map(|a| points.iter().map(move |b| a.distance_squared(*b)))
        .fold(0f32, f32::max);
    if extent_sq <= f32::EPSILON {
        return Err(CalibError::DegenerateConfiguration(
            "points coincide".to_string(),
        ));
    }
    let n = points.len();
    for i in 0..n {
        for j in i + 1..n {
            for k in j + 1..n {
                let area2 = signed_area2(points[i], points[j], points[k]).abs();
                if area2 <= COLLINEAR_TOLERANCE * extent_sq {
                    return Err(CalibError::DegenerateConfiguration(format!(
                        "points {}, {} and {} are collinear",
                        i, j, k
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Pose from 3D-2D correspondences with known intrinsics.
pub trait PerspectiveSolver {
    fn solve(
        &self,
        object_points: &[glam::Vec3],
        image_points: &[glam::Vec2],
        intrinsics: &CameraIntrinsics,
    ) -> Result<RvecTvec>;
}

/// SQPnP and, for planar targets, homography candidates, each refined by
/// Levenberg-Marquardt on pixel residuals with the intrinsics held fixed.
/// The candidate with the lowest reprojection RMS wins.
#[derive(Debug, Clone)]
pub struct SqPnpSolver {
    pub refine: bool,
    pub max_iterations: usize,
    /// Poses whose pixel RMS stays above this are reported as solver failures.
    pub max_reprojection_error: f64,
}

impl Default for SqPnpSolver {
    fn default() -> Self {
        Self {
            refine: true,
            max_iterations: 50,
            max_reprojection_error: 2.0,
        }
    }
}

impl SqPnpSolver {
    fn initial_poses(
        &self,
        object_points: &[glam::Vec3],
        normalized: &[glam::Vec2],
        is_planar: bool,
    ) -> Vec<RvecTvec> {
        let mut candidates = Vec::with_capacity(2);
        match sqpnp_pose(object_points, normalized) {
            Some(pose) => candidates.push(pose),
            None => debug!("sqpnp found no pose"),
        }
        if is_planar {
            match homography_pose(object_points, normalized) {
                Ok(pose) => candidates.push(pose),
                Err(e) => debug!("no homography pose: {}", e),
            }
        }
        candidates
    }

    fn refine_pose(
        &self,
        object_points: &[glam::Vec3],
        image_points: &[glam::Vec2],
        intrinsics: &CameraIntrinsics,
        initial: &RvecTvec,
    ) -> Option<RvecTvec> {
        let mut problem = tiny_solver::Problem::new();
        for (p3d, p2d) in object_points.iter().zip(image_points) {
            problem.add_residual_block(
                2,
                &["intrinsics", "distortion", "rvec", "tvec"],
                Box::new(ReprojectionFactor::new(p3d, p2d)),
                None,
            );
        }
        for i in 0..4 {
            problem.fix_variable("intrinsics", i);
        }
        for i in 0..5 {
            problem.fix_variable("distortion", i);
        }
        let (rvec, tvec) = initial.to_dvecs();
        let initial_values = HashMap::from([
            ("intrinsics".to_string(), intrinsics.params()),
            ("distortion".to_string(), intrinsics.distortion_params()),
            ("rvec".to_string(), rvec),
            ("tvec".to_string(), tvec),
        ]);

        let optimizer = tiny_solver::LevenbergMarquardtOptimizer::default();
        let options = tiny_solver::OptimizerOptions {
            max_iteration: self.max_iterations,
            verbosity_level: 0,
            min_abs_error_decrease_threshold: 1e-20,
            min_rel_error_decrease_threshold: 1e-20,
            min_error_threshold: 1e-20,
            ..Default::default()
        };
        let result = optimizer.optimize(&problem, &initial_values, Some(options))?;
        let pose = RvecTvec::from_slices(result.get("rvec")?.as_slice(), result.get("tvec")?.as_slice());
        pose.na_rvec()
            .iter()
            .chain(pose.na_tvec().iter())
            .all(|v| v.is_finite())
            .then_some(pose)
    }
}

/// Planar object points to normalized image points through the homography.
fn homography_pose(object_points: &[glam::Vec3], normalized: &[glam::Vec2]) -> Result<RvecTvec> {
    let src: Vec<_> = object_points
        .iter()
        .map(|p| na::Vector2::new(p.x as f64, p.y as f64))
        .collect();
    let dst: Vec<_> = normalized
        .iter()
        .map(|p| na::Vector2::new(p.x as f64, p.y as f64))
        .collect();
    let h = dlt_homography(&src, &dst)?;
    pose_from_homography(&na::Matrix3::identity(), &h)
}

impl PerspectiveSolver for SqPnpSolver {
    fn solve(
        &self,
        object_points: &[glam::Vec3],
        image_points: &[glam::Vec2],
        intrinsics: &CameraIntrinsics,
    ) -> Result<RvecTvec> {
        if object_points.len() != image_points.len() {
            return Err(CalibError::MismatchedCorrespondence {
                object: object_points.len(),
                image: image_points.len(),
            });
        }
        check_non_degenerate(image_points)?;
        let is_planar = object_points.iter().all(|p| p.z.abs() <= PLANAR_TOLERANCE);
        if is_planar {
            let planar: Vec<_> = object_points.iter().map(|p| p.truncate()).collect();
            check_non_degenerate(&planar)?;
        }

        let normalized: Vec<glam::Vec2> = image_points
            .iter()
            .map(|p| {
                let n = intrinsics.undistort_point(&na::Vector2::new(p.x as f64, p.y as f64));
                glam::Vec2::new(n.x as f32, n.y as f32)
            })
            .collect();

        let mut best: Option<(RvecTvec, f64)> = None;
        for initial in self.initial_poses(object_points, &normalized, is_planar) {
            let pose = if self.refine {
                self.refine_pose(object_points, image_points, intrinsics, &initial)
                    .unwrap_or_else(|| {
                        trace!("pose refinement failed, keeping the initial estimate");
                        initial
                    })
            } else {
                initial
            };
            let rms = intrinsics.reprojection_rms(&pose, object_points, image_points);
            trace!("pose candidate rms {:.4}", rms);
            if best.as_ref().is_none_or(|(_, b)| rms < *b) {
                best = Some((pose, rms));
            }
        }

        let (pose, rms) =
            best.ok_or_else(|| CalibError::SolverFailure("no initial pose".to_string()))?;
        if rms.is_nan() || rms > self.max_reprojection_error {
            return Err(CalibError::SolverFailure(format!(
                "reprojection rms {:.3} px above {:.3} px",
                rms, self.max_reprojection_error
            )));
        }
        Ok(pose)
    }
}
