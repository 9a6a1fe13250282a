use faer::linalg::solvers::SolveLstsqCore;
use log::debug;
use nalgebra as na;

use crate::error::{CalibError, Result};

/// Hartley normalization: centroid to the origin, mean distance sqrt(2).
fn normalize_points(points: &[na::Vector2<f64>]) -> (Vec<na::Vector2<f64>>, na::Matrix3<f64>) {
    let n = points.len() as f64;
    let mean = points.iter().fold(na::Vector2::zeros(), |acc, p| acc + p) / n;
    let mean_dist = points.iter().map(|p| (p - mean).norm()).sum::<f64>() / n;
    let scale = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    let normalized = points.iter().map(|p| (p - mean) * scale).collect();
    let t = na::Matrix3::new(
        scale,
        0.0,
        -mean.x * scale,
        0.0,
        scale,
        -mean.y * scale,
        0.0,
        0.0,
        1.0,
    );
    (normalized, t)
}

/// Plane-to-image homography `dst ~ H src` from at least four correspondences.
///
/// Normalized DLT; the result is scaled so that `H[(2, 2)] = 1` when possible.
pub fn dlt_homography(
    src: &[na::Vector2<f64>],
    dst: &[na::Vector2<f64>],
) -> Result<na::Matrix3<f64>> {
    if src.len() != dst.len() {
        return Err(CalibError::MismatchedCorrespondence {
            object: src.len(),
            image: dst.len(),
        });
    }
    if src.len() < 4 {
        return Err(CalibError::DegenerateConfiguration(format!(
            "homography needs 4 correspondences, got {}",
            src.len()
        )));
    }
    let (src_n, ts) = normalize_points(src);
    let (dst_n, td) = normalize_points(dst);

    // At least 9 rows so the SVD exposes the null vector for the minimal case.
    let rows = (2 * src.len()).max(9);
    let mut a = na::DMatrix::<f64>::zeros(rows, 9);
    for (i, (s, d)) in src_n.iter().zip(&dst_n).enumerate() {
        let (x, y, u, v) = (s.x, s.y, d.x, d.y);
        let r0 = 2 * i;
        let r1 = r0 + 1;
        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    let svd = a.svd(false, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| CalibError::SolverFailure("homography SVD failed".to_string()))?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .ok_or_else(|| CalibError::SolverFailure("homography SVD is empty".to_string()))?;
    let h = v_t.row(min_idx);
    let hn = na::Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let td_inv = td
        .try_inverse()
        .ok_or_else(|| CalibError::DegenerateConfiguration("coincident image points".to_string()))?;
    let mut hm = td_inv * hn * ts;
    if hm[(2, 2)].abs() > 1e-12 {
        hm /= hm[(2, 2)];
    } else {
        hm /= hm.norm();
    }
    if hm.iter().any(|v| !v.is_finite()) {
        return Err(CalibError::DegenerateConfiguration(
            "homography is not finite".to_string(),
        ));
    }
    Ok(hm)
}

/// Estimates `(fx, fy)` from plane homographies, holding the principal point at `(cx, cy)`.
///
/// With the principal point removed, the first two columns of every
/// homography (and their sum and difference) are orthogonal after scaling
/// by `1/fx, 1/fy`. Each view gives two linear equations in `1/fx^2, 1/fy^2`,
/// solved in the least-squares sense.
pub fn homography_to_focal(homographies: &[na::Matrix3<f64>], cx: f64, cy: f64) -> Option<(f64, f64)> {
    if homographies.is_empty() {
        return None;
    }
    let shift = na::Matrix3::new(1.0, 0.0, -cx, 0.0, 1.0, -cy, 0.0, 0.0, 1.0);
    let mut rows: Vec<([f64; 2], f64)> = Vec::with_capacity(homographies.len() * 2);
    for h in homographies {
        let hc = shift * h;
        let h1 = hc.column(0).into_owned();
        let h2 = hc.column(1).into_owned();
        let pairs = [(h1, h2), ((h1 + h2) * 0.5, (h1 - h2) * 0.5)];
        for (a, b) in pairs {
            let (norm_a, norm_b) = (a.norm(), b.norm());
            if norm_a < 1e-12 || norm_b < 1e-12 {
                continue;
            }
            let a = a / norm_a;
            let b = b / norm_b;
            rows.push(([a.x * b.x, a.y * b.y], -a.z * b.z));
        }
    }
    if rows.len() < 2 {
        return None;
    }

    let m: faer::Mat<f64> = faer::Mat::from_fn(rows.len(), 2, |r, c| rows[r].0[c]);
    let mut x: faer::Mat<f64> = faer::Mat::from_fn(rows.len(), 1, |r, _| rows[r].1);
    m.qr()
        .solve_lstsq_in_place_with_conj(faer::Conj::No, x.as_mut());
    let (inv_fx2, inv_fy2) = (*x.get(0, 0), *x.get(1, 0));
    let fx = (1.0 / inv_fx2.abs()).sqrt();
    let fy = (1.0 / inv_fy2.abs()).sqrt();
    if fx.is_finite() && fy.is_finite() && fx > 0.0 && fy > 0.0 {
        Some((fx, fy))
    } else {
        debug!("focal from homographies is not finite: {} {}", inv_fx2, inv_fy2);
        None
    }
}
