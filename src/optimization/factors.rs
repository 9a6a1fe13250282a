use nalgebra as na;
use tiny_solver::factors::Factor;

use crate::camera::project_with_distortion;

/// Pixel residual of one object point.
///
/// Parameters: `[intrinsics (fx, fy, cx, cy), distortion (k1, k2, p1, p2, k3), rvec, tvec]`.
#[derive(Debug, Clone)]
pub struct ReprojectionFactor {
    pub p3d: na::Point3<f64>,
    pub p2d: na::Vector2<f64>,
}

impl ReprojectionFactor {
    pub fn new(p3d: &glam::Vec3, p2d: &glam::Vec2) -> ReprojectionFactor {
        ReprojectionFactor {
            p3d: na::Point3::new(p3d.x as f64, p3d.y as f64, p3d.z as f64),
            p2d: na::Vector2::new(p2d.x as f64, p2d.y as f64),
        }
    }
}

impl<T: na::RealField> Factor<T> for ReprojectionFactor {
    fn residual_func(&self, params: &[na::DVector<T>]) -> na::DVector<T> {
        let rvec = na::Vector3::new(
            params[2][0].clone(),
            params[2][1].clone(),
            params[2][2].clone(),
        );
        let tvec = na::Vector3::new(
            params[3][0].clone(),
            params[3][1].clone(),
            params[3][2].clone(),
        );
        let transform = na::Isometry3::new(tvec, rvec);
        let p3d_t = transform * self.p3d.cast::<T>();
        let p2d_p = project_with_distortion(
            params[0].as_slice(),
            params[1].as_slice(),
            &p3d_t.coords,
        );
        na::dvector![
            p2d_p[0].clone() - na::convert::<f64, T>(self.p2d.x),
            p2d_p[1].clone() - na::convert::<f64, T>(self.p2d.y)
        ]
    }
}
