use glam::Vec2;
use image::GrayImage;

use crate::util::sample_bilinear;

/// Termination and window settings of the gradient corner refinement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubPixParams {
    /// Half size of the search window; 5 gives the 11x11 window.
    pub half_window: usize,
    pub max_iterations: usize,
    /// Stop once an update moves the corner by at most this many pixels.
    pub epsilon: f32,
}

impl Default for SubPixParams {
    fn default() -> Self {
        Self {
            half_window: 5,
            max_iterations: 30,
            epsilon: 0.1,
        }
    }
}

impl SubPixParams {
    pub fn with_half_window(self, half_window: usize) -> SubPixParams {
        SubPixParams {
            half_window,
            ..self
        }
    }
}

/// Refines a corner to sub-pixel accuracy.
///
/// Every gradient in the window is orthogonal to the vector from the true corner
/// to its sample position, so the corner solves the weighted normal equations
/// `sum(w g g^T) c = sum(w g g^T p)`. The solve is repeated around the new
/// estimate until it settles. A corner that wanders out of its window is
/// returned unchanged.
pub fn refine_corner(img: &GrayImage, initial: Vec2, params: &SubPixParams) -> Vec2 {
    let hw = params.half_window as i32;
    if hw == 0 {
        return initial;
    }
    let coeff = 1.0 / (hw * hw) as f64;
    let weights: Vec<f64> = (-hw..=hw)
        .flat_map(|dy| {
            (-hw..=hw).map(move |dx| {
                (-((dx * dx) as f64) * coeff).exp() * (-((dy * dy) as f64) * coeff).exp()
            })
        })
        .collect();

    let mut c = initial;
    for _ in 0..params.max_iterations {
        let (mut a, mut b, mut cc, mut bb1, mut bb2) = (0.0f64, 0.0f64, 0.0f64, 0.0f64, 0.0f64);
        let mut k = 0;
        for dy in -hw..=hw {
            for dx in -hw..=hw {
                let sx = c.x + dx as f32;
                let sy = c.y + dy as f32;
                let gx = 0.5
                    * (sample_bilinear(img, sx + 1.0, sy) - sample_bilinear(img, sx - 1.0, sy))
                        as f64;
                let gy = 0.5
                    * (sample_bilinear(img, sx, sy + 1.0) - sample_bilinear(img, sx, sy - 1.0))
                        as f64;
                let m = weights[k];
                k += 1;
                let gxx = gx * gx * m;
                let gxy = gx * gy * m;
                let gyy = gy * gy * m;
                a += gxx;
                b += gxy;
                cc += gyy;
                bb1 += gxx * dx as f64 + gxy * dy as f64;
                bb2 += gxy * dx as f64 + gyy * dy as f64;
            }
        }
        let det = a * cc - b * b;
        if det.abs() <= 1e-9 * (a * cc).abs().max(1.0) {
            break;
        }
        let step = Vec2::new(
            ((cc * bb1 - b * bb2) / det) as f32,
            ((a * bb2 - b * bb1) / det) as f32,
        );
        c += step;
        if (c - initial).abs().max_element() > hw as f32 {
            return initial;
        }
        if step.length() <= params.epsilon {
            break;
        }
    }
    c
}

/// Refines every corner independently.
pub fn refine_corners(img: &GrayImage, corners: &mut [Vec2], params: &SubPixParams) {
    for p in corners.iter_mut() {
        *p = refine_corner(img, *p, params);
    }
}
