#![allow(dead_code)]

use glam::Vec2;
use image::GrayImage;
use nalgebra as na;

const DARK: f32 = 30.0;
const LIGHT: f32 = 225.0;
const SUPERSAMPLE: usize = 4;

fn rotate(p: Vec2, angle: f32) -> Vec2 {
    Vec2::from_angle(angle).rotate(p)
}

/// Averages `is_dark` over a regular subpixel grid of every pixel.
fn supersample<F: Fn(Vec2) -> bool>(width: u32, height: u32, is_dark: F) -> GrayImage {
    let n = SUPERSAMPLE;
    GrayImage::from_fn(width, height, |x, y| {
        let mut sum = 0.0;
        for sy in 0..n {
            for sx in 0..n {
                let p = Vec2::new(
                    x as f32 - 0.5 + (sx as f32 + 0.5) / n as f32,
                    y as f32 - 0.5 + (sy as f32 + 0.5) / n as f32,
                );
                sum += if is_dark(p) { DARK } else { LIGHT };
            }
        }
        image::Luma([(sum / (n * n) as f32).round() as u8])
    })
}

/// Renders a shape given by `is_dark(local)` where `local` is the position in
/// a `size` frame centered on `center` and rotated by `angle`.
fn render<F: Fn(Vec2) -> Option<bool>>(
    width: u32,
    height: u32,
    center: Vec2,
    size: Vec2,
    angle: f32,
    is_dark: F,
) -> GrayImage {
    supersample(width, height, |p| {
        let local = rotate(p - center, -angle) + size * 0.5;
        local.x >= 0.0
            && local.y >= 0.0
            && local.x < size.x
            && local.y < size.y
            && is_dark(local).unwrap_or(false)
    })
}

/// Chessboard with `rows x cols` inner corners, returns the image and the
/// inner corners in row-major order.
pub fn render_chessboard(
    width: u32,
    height: u32,
    rows: usize,
    cols: usize,
    square: f32,
    angle: f32,
) -> (GrayImage, Vec<Vec2>) {
    let size = Vec2::new((cols + 1) as f32 * square, (rows + 1) as f32 * square);
    let center = Vec2::new(width as f32 * 0.5, height as f32 * 0.5);
    let img = render(width, height, center, size, angle, |local| {
        let i = (local.x / square) as usize;
        let j = (local.y / square) as usize;
        Some((i + j) % 2 == 0)
    });
    let corners = (0..rows)
        .flat_map(|r| (0..cols).map(move |c| (r, c)))
        .map(|(r, c)| {
            let local = Vec2::new((c + 1) as f32 * square, (r + 1) as f32 * square);
            center + rotate(local - size * 0.5, angle)
        })
        .collect();
    (img, corners)
}

/// Marker with a one-cell black frame and `marker_size x marker_size` inner
/// bits (row-major, black = 1). Corners are top-left, top-right,
/// bottom-right, bottom-left of the unrotated marker.
pub fn render_marker(
    width: u32,
    height: u32,
    code: u64,
    marker_size: usize,
    cell: f32,
    angle: f32,
) -> (GrayImage, [Vec2; 4]) {
    let cells = marker_size + 2;
    let side = cells as f32 * cell;
    let size = Vec2::splat(side);
    let center = Vec2::new(width as f32 * 0.5, height as f32 * 0.5);
    let img = render(width, height, center, size, angle, |local| {
        let cx = (local.x / cell) as usize;
        let cy = (local.y / cell) as usize;
        if cx == 0 || cy == 0 || cx >= cells - 1 || cy >= cells - 1 {
            return Some(true);
        }
        let bit = (cy - 1) * marker_size + (cx - 1);
        Some((code >> bit) & 1 == 1)
    });
    let h = side * 0.5;
    let corners = [
        Vec2::new(-h, -h),
        Vec2::new(h, -h),
        Vec2::new(h, h),
        Vec2::new(-h, h),
    ]
    .map(|p| center + rotate(p, angle));
    (img, corners)
}

/// Chessboard seen by an ideal pinhole camera (focal `f`, image center) from
/// `pose`, board to camera. Inner corner `(r, c)` sits at `(c * square, r * square, 0)`;
/// returns the image and the projected inner corners in row-major order.
pub fn render_chessboard_view(
    width: u32,
    height: u32,
    rows: usize,
    cols: usize,
    square: f64,
    f: f64,
    pose: &na::Isometry3<f64>,
) -> (GrayImage, Vec<Vec2>) {
    let (cx, cy) = ((width as f64 - 1.0) * 0.5, (height as f64 - 1.0) * 0.5);
    let k = na::Matrix3::new(f, 0.0, cx, 0.0, f, cy, 0.0, 0.0, 1.0);
    let r = pose.rotation.to_rotation_matrix();
    let t = pose.translation.vector;
    let columns = [
        r.matrix().column(0).into_owned(),
        r.matrix().column(1).into_owned(),
        t,
    ];
    let h = k * na::Matrix3::from_columns(&columns);
    let h_inv = h.try_inverse().expect("board plane through the camera center");

    let img = supersample(width, height, |p| {
        let q = h_inv * na::Vector3::new(p.x as f64, p.y as f64, 1.0);
        let (x, y) = (q.x / q.z + square, q.y / q.z + square);
        if x < 0.0 || y < 0.0 {
            return false;
        }
        let (i, j) = ((x / square) as usize, (y / square) as usize);
        i <= cols && j <= rows && (i + j) % 2 == 0
    });
    let corners = (0..rows)
        .flat_map(|r| (0..cols).map(move |c| (r, c)))
        .map(|(r, c)| {
            let q = h * na::Vector3::new(c as f64 * square, r as f64 * square, 1.0);
            Vec2::new((q.x / q.z) as f32, (q.y / q.z) as f32)
        })
        .collect();
    (img, corners)
}
