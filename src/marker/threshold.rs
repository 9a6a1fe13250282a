use image::GrayImage;
use rayon::prelude::*;

/// Summed-area table with one row and column of zero padding.
pub struct IntegralImage {
    width: usize,
    height: usize,
    sums: Vec<u64>,
}

impl IntegralImage {
    pub fn new(img: &GrayImage) -> Self {
        let (width, height) = (img.width() as usize, img.height() as usize);
        let stride = width + 1;
        let mut sums = vec![0u64; stride * (height + 1)];
        let raw = img.as_raw();
        for y in 0..height {
            let mut row_sum = 0u64;
            for x in 0..width {
                row_sum += raw[y * width + x] as u64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row_sum;
            }
        }
        Self {
            width,
            height,
            sums,
        }
    }

    /// Mean over the window of half size `r` around `(x, y)`, clipped to the image.
    pub fn window_mean(&self, x: usize, y: usize, r: usize) -> f32 {
        let stride = self.width + 1;
        let x0 = x.saturating_sub(r);
        let y0 = y.saturating_sub(r);
        let x1 = (x + r + 1).min(self.width);
        let y1 = (y + r + 1).min(self.height);
        let total = self.sums[y1 * stride + x1] + self.sums[y0 * stride + x0]
            - self.sums[y0 * stride + x1]
            - self.sums[y1 * stride + x0];
        total as f32 / ((x1 - x0) * (y1 - y0)) as f32
    }
}

/// Marks pixels darker than their local mean by more than `offset` as foreground.
///
/// `window` is the full (odd) window size; even sizes are rounded up.
pub fn adaptive_threshold(
    img: &GrayImage,
    integral: &IntegralImage,
    window: usize,
    offset: f32,
) -> Vec<bool> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let r = window.max(3) / 2;
    let raw = img.as_raw();
    let mut mask = vec![false; w * h];
    mask.par_chunks_mut(w.max(1))
        .enumerate()
        .take(h)
        .for_each(|(y, row)| {
            for (x, m) in row.iter_mut().enumerate() {
                *m = (raw[y * w + x] as f32) < integral.window_mean(x, y, r) - offset;
            }
        });
    mask
}
