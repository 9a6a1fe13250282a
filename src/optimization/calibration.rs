use std::collections::HashMap;

use log::{debug, info, warn};
use nalgebra as na;
use tiny_solver::Optimizer;

use super::factors::ReprojectionFactor;
use super::homography::{dlt_homography, homography_to_focal};
use super::linear::pose_from_homography;
use crate::camera::CameraIntrinsics;
use crate::detected_points::ObservationPair;
use crate::error::{CalibError, Result};
use crate::types::RvecTvec;

/// Below this many views the calibration is accepted but flagged as weak.
pub const RECOMMENDED_MIN_VIEWS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    pub max_iterations: usize,
    /// Huber loss scale in pixels; `None` for plain least squares.
    pub huber_delta: Option<f64>,
    pub verbosity_level: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            huber_delta: None,
            verbosity_level: 0,
        }
    }
}

/// Joint refinement of shared intrinsics and per-view poses.
pub trait BundleAdjuster {
    fn adjust(
        &self,
        observations: &[ObservationPair],
        intrinsics: &CameraIntrinsics,
        poses: &[RvecTvec],
    ) -> Result<(CameraIntrinsics, Vec<RvecTvec>)>;
}

/// Levenberg-Marquardt over `intrinsics`, `distortion`, `rvec{i}`, `tvec{i}`.
#[derive(Debug, Clone, Default)]
pub struct TinySolverAdjuster {
    pub options: SolverOptions,
}

impl BundleAdjuster for TinySolverAdjuster {
    fn adjust(
        &self,
        observations: &[ObservationPair],
        intrinsics: &CameraIntrinsics,
        poses: &[RvecTvec],
    ) -> Result<(CameraIntrinsics, Vec<RvecTvec>)> {
        let mut problem = tiny_solver::Problem::new();
        let mut initial_values = HashMap::<String, na::DVector<f64>>::new();
        initial_values.insert("intrinsics".to_string(), intrinsics.params());
        initial_values.insert("distortion".to_string(), intrinsics.distortion_params());

        for (i, (obs, pose)) in observations.iter().zip(poses).enumerate() {
            let rvec_name = format!("rvec{}", i);
            let tvec_name = format!("tvec{}", i);
            let (rvec, tvec) = pose.to_dvecs();
            initial_values.insert(rvec_name.clone(), rvec);
            initial_values.insert(tvec_name.clone(), tvec);
            for (p3d, p2d) in obs.iter() {
                let cost = ReprojectionFactor::new(p3d, p2d);
                let loss = self.options.huber_delta.map(|d| {
                    Box::new(tiny_solver::loss_functions::HuberLoss::new(d))
                        as Box<dyn tiny_solver::loss_functions::Loss + Send>
                });
                problem.add_residual_block(
                    2,
                    &["intrinsics", "distortion", &rvec_name, &tvec_name],
                    Box::new(cost),
                    loss,
                );
            }
        }

        let optimizer = tiny_solver::LevenbergMarquardtOptimizer::default();
        let options = tiny_solver::OptimizerOptions {
            max_iteration: self.options.max_iterations,
            verbosity_level: self.options.verbosity_level,
            ..Default::default()
        };
        let result = optimizer
            .optimize(&problem, &initial_values, Some(options))
            .ok_or_else(|| CalibError::SolverFailure("bundle adjustment diverged".to_string()))?;

        let get = |name: &str| {
            result
                .get(name)
                .ok_or_else(|| CalibError::SolverFailure(format!("missing variable {}", name)))
        };
        let refined = CameraIntrinsics::from_params(
            get("intrinsics")?.as_slice(),
            get("distortion")?.as_slice(),
        );
        let refined_poses = (0..poses.len())
            .map(|i| {
                Ok(RvecTvec::from_slices(
                    get(&format!("rvec{}", i))?.as_slice(),
                    get(&format!("tvec{}", i))?.as_slice(),
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((refined, refined_poses))
    }
}

/// Reprojection RMS of one view: `sqrt(sum |e|^2 / n)`.
pub fn view_rms(intrinsics: &CameraIntrinsics, obs: &ObservationPair, pose: &RvecTvec) -> f64 {
    let (sum, n) = squared_errors(intrinsics, obs, pose);
    if n == 0 { 0.0 } else { (sum / n as f64).sqrt() }
}

fn squared_errors(
    intrinsics: &CameraIntrinsics,
    obs: &ObservationPair,
    pose: &RvecTvec,
) -> (f64, usize) {
    intrinsics
        .project_points(pose, obs.object_points())
        .iter()
        .zip(obs.image_points())
        .fold((0.0, 0), |(sum, n), (projected, observed)| {
            let err = match projected {
                Some(p) => (p - na::Vector2::new(observed.x as f64, observed.y as f64)).norm_squared(),
                None => f64::INFINITY,
            };
            (sum + err, n + 1)
        })
}

/// Overall reprojection RMS across views: `sqrt(sum |e|^2 / total points)`.
pub fn reprojection_rms(
    intrinsics: &CameraIntrinsics,
    observations: &[ObservationPair],
    poses: &[RvecTvec],
) -> f64 {
    let (sum, n) = observations
        .iter()
        .zip(poses)
        .map(|(obs, pose)| squared_errors(intrinsics, obs, pose))
        .fold((0.0, 0), |(s, n), (s1, n1)| (s + s1, n + n1));
    if n == 0 { 0.0 } else { (sum / n as f64).sqrt() }
}

#[derive(Debug, Clone)]
pub struct CalibrationResult {
    pub intrinsics: CameraIntrinsics,
    pub rms: f64,
    pub poses: Vec<RvecTvec>,
    pub per_view_rms: Vec<f64>,
}

/// Calibrates a camera from planar pattern observations.
pub struct CalibrationSolver<B: BundleAdjuster = TinySolverAdjuster> {
    adjuster: B,
    min_observations: usize,
}

impl Default for CalibrationSolver {
    fn default() -> Self {
        Self::new(TinySolverAdjuster::default())
    }
}

impl<B: BundleAdjuster> CalibrationSolver<B> {
    pub fn new(adjuster: B) -> CalibrationSolver<B> {
        CalibrationSolver {
            adjuster,
            min_observations: 1,
        }
    }

    /// Requires at least `min_observations` views (never fewer than one).
    pub fn with_min_observations(self, min_observations: usize) -> CalibrationSolver<B> {
        CalibrationSolver {
            min_observations: min_observations.max(1),
            ..self
        }
    }

    pub fn min_observations(&self) -> usize {
        self.min_observations
    }

    /// Closed-form initialization followed by bundle adjustment.
    ///
    /// # Arguments
    /// * `observations` - One entry per image sharing the same object points.
    /// * `image_size` - `(width, height)` of the reference image, used to seed the principal point.
    pub fn calibrate(
        &self,
        observations: &[ObservationPair],
        image_size: (u32, u32),
    ) -> Result<CalibrationResult> {
        if observations.len() < self.min_observations {
            return Err(CalibError::InsufficientData {
                found: observations.len(),
                required: self.min_observations,
            });
        }
        if observations.len() < RECOMMENDED_MIN_VIEWS {
            warn!(
                "calibrating from {} view(s); at least {} varied views are recommended",
                observations.len(),
                RECOMMENDED_MIN_VIEWS
            );
        }

        let homographies = observations
            .iter()
            .map(|obs| {
                let src: Vec<_> = obs
                    .object_points()
                    .iter()
                    .map(|p| na::Vector2::new(p.x as f64, p.y as f64))
                    .collect();
                let dst: Vec<_> = obs
                    .image_points()
                    .iter()
                    .map(|p| na::Vector2::new(p.x as f64, p.y as f64))
                    .collect();
                dlt_homography(&src, &dst)
            })
            .collect::<Result<Vec<_>>>()?;

        let initial = initial_intrinsics(&homographies, image_size);
        debug!("initial intrinsics {:?}", initial);
        let k = initial.camera_matrix();
        let initial_poses = homographies
            .iter()
            .map(|h| pose_from_homography(&k, h))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "initial rms {:.4} px",
            reprojection_rms(&initial, observations, &initial_poses)
        );

        let (intrinsics, poses) = self
            .adjuster
            .adjust(observations, &initial, &initial_poses)?;
        let per_view_rms: Vec<f64> = observations
            .iter()
            .zip(&poses)
            .map(|(obs, pose)| view_rms(&intrinsics, obs, pose))
            .collect();
        let rms = reprojection_rms(&intrinsics, observations, &poses);
        if !rms.is_finite() {
            return Err(CalibError::SolverFailure(
                "reprojection error is not finite".to_string(),
            ));
        }
        info!("calibrated {} view(s), rms {:.4} px", observations.len(), rms);
        Ok(CalibrationResult {
            intrinsics,
            rms,
            poses,
            per_view_rms,
        })
    }
}

/// Principal point at the image center, focal lengths from the homographies.
fn initial_intrinsics(homographies: &[na::Matrix3<f64>], image_size: (u32, u32)) -> CameraIntrinsics {
    let (w, h) = (image_size.0 as f64, image_size.1 as f64);
    let cx = (w - 1.0) * 0.5;
    let cy = (h - 1.0) * 0.5;
    let fallback = w.max(h);
    let plausible = |f: f64| f > 0.1 * fallback && f < 100.0 * fallback;
    let (fx, fy) = match homography_to_focal(homographies, cx, cy) {
        Some((fx, fy)) if plausible(fx) && plausible(fy) => (fx, fy),
        other => {
            debug!("focal initialization rejected ({:?}), using {}", other, fallback);
            (fallback, fallback)
        }
    };
    CameraIntrinsics::new(fx, fy, cx, cy, [0.0; 5])
}
