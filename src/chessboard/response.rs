use glam::Vec2;
use image::GrayImage;
use rayon::prelude::*;

/// Ring of 16 samples at radius ~5, counter-clockwise from +x (y down).
pub const RING: [(i32, i32); 16] = [
    (5, 0),
    (5, 2),
    (4, 4),
    (2, 5),
    (0, 5),
    (-2, 5),
    (-4, 4),
    (-5, 2),
    (-5, 0),
    (-5, -2),
    (-4, -4),
    (-2, -5),
    (0, -5),
    (2, -5),
    (4, -4),
    (5, -2),
];
pub const RING_RADIUS: u32 = 5;

/// Dense ChESS response, zero on the border band.
pub struct ResponseMap {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl ResponseMap {
    pub fn at(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.width + x) as usize]
    }
    pub fn max_value(&self) -> f32 {
        self.data.iter().copied().fold(0.0, f32::max)
    }
}

/// Saddle candidate with the angle of its bright diagonal in `[0, pi)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerDescriptor {
    pub position: Vec2,
    pub orientation: f32,
    pub strength: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChessParams {
    /// Gaussian blur applied before the response; 0 disables it.
    pub blur_sigma: f32,
    /// Peaks below `threshold_rel * max` are dropped.
    pub threshold_rel: f32,
    pub threshold_abs: f32,
    pub nms_radius: u32,
    /// Peaks closer than this are merged, keeping the stronger one.
    pub min_spacing: f32,
    /// Longest image side used for the coarse search; larger images are downscaled.
    pub max_dimension: u32,
}

impl Default for ChessParams {
    fn default() -> Self {
        Self {
            blur_sigma: 1.0,
            threshold_rel: 0.15,
            threshold_abs: 20.0,
            nms_radius: 3,
            min_spacing: 5.0,
            max_dimension: 1600,
        }
    }
}

fn ring_samples(raw: &[u8], w: usize, x: usize, y: usize) -> [f32; 16] {
    let mut s = [0f32; 16];
    for (k, (dx, dy)) in RING.iter().enumerate() {
        let xx = (x as i32 + dx) as usize;
        let yy = (y as i32 + dy) as usize;
        s[k] = raw[yy * w + xx] as f32;
    }
    s
}

/// `R = SR - DR - 16 |ring mean - local mean|` at one pixel.
fn chess_at(raw: &[u8], w: usize, x: usize, y: usize) -> f32 {
    let s = ring_samples(raw, w, x, y);
    let mut sum_resp = 0.0;
    for n in 0..4 {
        sum_resp += ((s[n] + s[n + 8]) - (s[n + 4] + s[n + 12])).abs();
    }
    let mut diff_resp = 0.0;
    for n in 0..8 {
        diff_resp += (s[n] - s[n + 8]).abs();
    }
    let ring_mean = s.iter().sum::<f32>() / 16.0;
    let c = y * w + x;
    let local_mean =
        (raw[c] as f32 + raw[c - 1] as f32 + raw[c + 1] as f32 + raw[c - w] as f32 + raw[c + w] as f32)
            / 5.0;
    sum_resp - diff_resp - 16.0 * (ring_mean - local_mean).abs()
}

/// Computes the ChESS response for every pixel farther than the ring radius from the border.
pub fn chess_response(img: &GrayImage) -> ResponseMap {
    let (width, height) = img.dimensions();
    let (w, h) = (width as usize, height as usize);
    let r = RING_RADIUS as usize;
    let raw = img.as_raw();
    let mut data = vec![0f32; w * h];
    if w > 2 * r && h > 2 * r {
        data.par_chunks_mut(w)
            .enumerate()
            .filter(|(y, _)| *y >= r && *y < h - r)
            .for_each(|(y, row)| {
                for (x, v) in row.iter_mut().enumerate().take(w - r).skip(r) {
                    *v = chess_at(raw, w, x, y);
                }
            });
    }
    ResponseMap {
        width,
        height,
        data,
    }
}

/// Angle of the bright diagonal from the second harmonic of the ring.
pub fn corner_orientation(img: &GrayImage, x: u32, y: u32) -> f32 {
    let w = img.width() as usize;
    let s = ring_samples(img.as_raw(), w, x as usize, y as usize);
    let (mut sin_sum, mut cos_sum) = (0f32, 0f32);
    for (k, (dx, dy)) in RING.iter().enumerate() {
        let phi = (*dy as f32).atan2(*dx as f32);
        sin_sum += s[k] * (2.0 * phi).sin();
        cos_sum += s[k] * (2.0 * phi).cos();
    }
    (0.5 * sin_sum.atan2(cos_sum)).rem_euclid(std::f32::consts::PI)
}

/// Non-maximum suppression over the response, then merging of close peaks.
pub fn find_corner_candidates(
    img: &GrayImage,
    response: &ResponseMap,
    params: &ChessParams,
) -> Vec<CornerDescriptor> {
    let threshold = (params.threshold_rel * response.max_value()).max(params.threshold_abs);
    let nms = params.nms_radius as i64;
    let margin = RING_RADIUS.max(params.nms_radius);
    let (w, h) = (response.width, response.height);
    if w <= 2 * margin || h <= 2 * margin {
        return Vec::new();
    }

    let mut peaks: Vec<CornerDescriptor> = (margin..h - margin)
        .into_par_iter()
        .flat_map_iter(|y| {
            (margin..w - margin).filter_map(move |x| {
                let v = response.at(x, y);
                if v < threshold {
                    return None;
                }
                let idx = (y * w + x) as i64;
                for dy in -nms..=nms {
                    for dx in -nms..=nms {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let qx = (x as i64 + dx) as u32;
                        let qy = (y as i64 + dy) as u32;
                        let q = response.at(qx, qy);
                        let qidx = (qy * w + qx) as i64;
                        if q > v || (q == v && qidx < idx) {
                            return None;
                        }
                    }
                }
                Some(CornerDescriptor {
                    position: Vec2::new(x as f32, y as f32),
                    orientation: corner_orientation(img, x, y),
                    strength: v,
                })
            })
        })
        .collect();

    peaks.sort_by(|a, b| b.strength.total_cmp(&a.strength));
    let mut kept: Vec<CornerDescriptor> = Vec::with_capacity(peaks.len());
    for p in peaks {
        if kept
            .iter()
            .all(|k| k.position.distance(p.position) >= params.min_spacing)
        {
            kept.push(p);
        }
    }
    log::trace!("chess response: {} candidates above {:.1}", kept.len(), threshold);
    kept
}
