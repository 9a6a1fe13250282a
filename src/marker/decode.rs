use glam::Vec2;
use image::GrayImage;
use nalgebra as na;

use crate::optimization::dlt_homography;
use crate::util::{otsu_threshold, sample_bilinear};

/// Bit sampling settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeParams {
    /// Width of the black frame in cells.
    pub border_bits: usize,
    /// Fraction of a cell ignored on each side when sampling.
    pub cell_margin: f32,
    /// Minimum spread between the darkest and brightest cell means.
    pub min_contrast: f32,
    /// Fraction of frame cells allowed to read white.
    pub max_border_error_rate: f32,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            border_bits: 1,
            cell_margin: 0.2,
            min_contrast: 20.0,
            max_border_error_rate: 0.35,
        }
    }
}

/// Reads the inner `marker_size x marker_size` bits (black = 1, row-major)
/// of the marker whose outer corners are `quad`, in quad order.
///
/// `None` when the quad lacks contrast or its frame is not black.
pub fn read_bits(img: &GrayImage, quad: &[Vec2; 4], marker_size: usize, params: &DecodeParams) -> Option<u64> {
    let border = params.border_bits;
    let cells = marker_size + 2 * border;
    let n = cells as f64;
    let src = [
        na::Vector2::new(0.0, 0.0),
        na::Vector2::new(n, 0.0),
        na::Vector2::new(n, n),
        na::Vector2::new(0.0, n),
    ];
    let dst = quad.map(|p| na::Vector2::new(p.x as f64, p.y as f64));
    let h = dlt_homography(&src, &dst).ok()?;

    let offsets = [
        params.cell_margin,
        0.5,
        1.0 - params.cell_margin,
    ];
    let mut means = Vec::with_capacity(cells * cells);
    for cy in 0..cells {
        for cx in 0..cells {
            let mut sum = 0.0;
            for oy in offsets {
                for ox in offsets {
                    let p = h * na::Vector3::new(cx as f64 + ox as f64, cy as f64 + oy as f64, 1.0);
                    if p.z.abs() < 1e-12 {
                        return None;
                    }
                    sum += sample_bilinear(img, (p.x / p.z) as f32, (p.y / p.z) as f32);
                }
            }
            means.push(sum / 9.0);
        }
    }

    let (lo, hi) = means
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), &m| (lo.min(m), hi.max(m)));
    if hi - lo < params.min_contrast {
        return None;
    }
    let threshold = otsu_threshold(&means);

    let mut border_total = 0usize;
    let mut border_white = 0usize;
    let mut code = 0u64;
    for cy in 0..cells {
        for cx in 0..cells {
            let black = means[cy * cells + cx] < threshold;
            let on_border = cx < border || cy < border || cx >= cells - border || cy >= cells - border;
            if on_border {
                border_total += 1;
                if !black {
                    border_white += 1;
                }
            } else if black {
                code |= 1u64 << ((cy - border) * marker_size + (cx - border));
            }
        }
    }
    if border_white as f32 > params.max_border_error_rate * border_total as f32 {
        return None;
    }
    Some(code)
}
