use nalgebra as na;
use sqpnp_simple::sqpnp_solve_glam;

use crate::error::{CalibError, Result};
use crate::types::{RvecTvec, ToRvecTvec};

/// Pose of the `z = 0` plane from its homography and the camera matrix.
///
/// `K^-1 H = lambda [r1 r2 t]`; the sign of lambda is chosen so the plane lies in front of
/// the camera, and `[r1 r2 r1 x r2]` is projected onto the nearest rotation.
pub fn pose_from_homography(k: &na::Matrix3<f64>, h: &na::Matrix3<f64>) -> Result<RvecTvec> {
    let k_inv = k
        .try_inverse()
        .ok_or_else(|| CalibError::DegenerateConfiguration("singular camera matrix".to_string()))?;
    let m = k_inv * h;
    let h1 = m.column(0).into_owned();
    let h2 = m.column(1).into_owned();
    let h3 = m.column(2).into_owned();

    let norm = 0.5 * (h1.norm() + h2.norm());
    if norm < 1e-12 {
        return Err(CalibError::DegenerateConfiguration(
            "homography columns vanish".to_string(),
        ));
    }
    let mut lambda = 1.0 / norm;
    if h3.z * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1 = h1 * lambda;
    let r2 = h2 * lambda;
    let r3 = r1.cross(&r2);
    let t = h3 * lambda;

    let r_approx = na::Matrix3::from_columns(&[r1, r2, r3]);
    let svd = r_approx.svd(true, true);
    let (u, v_t) = svd
        .u
        .zip(svd.v_t)
        .ok_or_else(|| CalibError::SolverFailure("rotation SVD failed".to_string()))?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_fixed = u;
        u_fixed.column_mut(2).neg_mut();
        r = u_fixed * v_t;
    }

    let rotation = na::UnitQuaternion::from_matrix(&r);
    Ok(na::Isometry3::from_parts(na::Translation3::from(t), rotation).to_rvec_tvec())
}

/// SQPnP on normalized (undistorted) image coordinates.
pub fn sqpnp_pose(object_points: &[glam::Vec3], normalized: &[glam::Vec2]) -> Option<RvecTvec> {
    let p3ds = object_points.to_vec();
    let p2ds = normalized.to_vec();
    let ((rx, ry, rz), (tx, ty, tz)) = sqpnp_solve_glam(&p3ds, &p2ds)?;
    let pose = RvecTvec::new(
        &na::Vector3::new(rx, ry, rz),
        &na::Vector3::new(tx, ty, tz),
    );
    if pose.na_rvec().iter().chain(pose.na_tvec().iter()).all(|v| v.is_finite()) {
        Some(pose)
    } else {
        None
    }
}
