use image::GrayImage;

/// Bilinear intensity at a sub-pixel position, clamped to the image.
pub fn sample_bilinear(img: &GrayImage, x: f32, y: f32) -> f32 {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }
    let x = x.clamp(0.0, (w - 1) as f32);
    let y = y.clamp(0.0, (h - 1) as f32);
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let raw = img.as_raw();
    let at = |xx: u32, yy: u32| raw[(yy * w + xx) as usize] as f32;
    let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
    let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Otsu's threshold over arbitrary intensity samples in `[0, 255]`.
pub fn otsu_threshold(samples: &[f32]) -> f32 {
    let mut hist = [0usize; 256];
    for &s in samples {
        hist[s.round().clamp(0.0, 255.0) as usize] += 1;
    }
    let total = samples.len() as f64;
    let sum_all: f64 = hist.iter().enumerate().map(|(i, &c)| i as f64 * c as f64).sum();
    let mut sum_bg = 0.0;
    let mut weight_bg = 0.0;
    let mut best = (0.0, 0usize);
    for (t, &count) in hist.iter().enumerate() {
        weight_bg += count as f64;
        if weight_bg == 0.0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0.0 {
            break;
        }
        sum_bg += t as f64 * count as f64;
        let mean_bg = sum_bg / weight_bg;
        let mean_fg = (sum_all - sum_bg) / weight_fg;
        let between = weight_bg * weight_fg * (mean_bg - mean_fg).powi(2);
        if between > best.0 {
            best = (between, t);
        }
    }
    best.1 as f32 + 0.5
}

/// Twice the signed area of triangle `abc`; positive when clockwise in a y-down image.
pub fn signed_area2(a: glam::Vec2, b: glam::Vec2, c: glam::Vec2) -> f32 {
    (b - a).perp_dot(c - a)
}

/// Wraps an angle difference into `[0, pi/2]` treating directions modulo pi.
pub fn axis_angle_diff(a: f32, b: f32) -> f32 {
    let d = (a - b).rem_euclid(std::f32::consts::PI);
    d.min(std::f32::consts::PI - d)
}

/// Command line switch that is on only for the exact text `true`. Anything
/// else, `1` and `TRUE` included, reads as off instead of failing to parse.
pub fn parse_switch(value: &str) -> Result<bool, String> {
    Ok(value == "true")
}
