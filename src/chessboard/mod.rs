pub mod grid;
pub mod response;

use glam::Vec2;
use image::GrayImage;
use image::imageops::{self, FilterType};

use crate::board::CalibrationPattern;
use crate::detected_points::ObservationPair;
use crate::refine::{SubPixParams, refine_corners};
pub use grid::{GridParams, assemble_grid};
pub use response::{ChessParams, CornerDescriptor, chess_response, find_corner_candidates};

/// Coarse chessboard corner localization.
pub trait CornerFinder {
    /// Pixel positions of all inner corners in row-major pattern order, or
    /// `None` when the complete pattern is not visible.
    fn find_corners(&self, img: &GrayImage, pattern: &CalibrationPattern) -> Option<Vec<Vec2>>;
}

/// ChESS saddle response followed by grid assembly.
#[derive(Debug, Clone, Default)]
pub struct ChessCornerFinder {
    pub chess: ChessParams,
    pub grid: GridParams,
}

impl CornerFinder for ChessCornerFinder {
    fn find_corners(&self, img: &GrayImage, pattern: &CalibrationPattern) -> Option<Vec<Vec2>> {
        let (w, h) = img.dimensions();
        let longest = w.max(h);
        let max_dim = self.chess.max_dimension.max(64);
        let work = if longest > max_dim {
            let s = max_dim as f32 / longest as f32;
            let nw = ((w as f32 * s).round() as u32).max(1);
            let nh = ((h as f32 * s).round() as u32).max(1);
            log::trace!("downscaling {}x{} to {}x{} for corner search", w, h, nw, nh);
            imageops::resize(img, nw, nh, FilterType::Triangle)
        } else {
            img.clone()
        };
        let scale = Vec2::new(w as f32 / work.width() as f32, h as f32 / work.height() as f32);
        let work = if self.chess.blur_sigma > 0.0 {
            imageops::blur(&work, self.chess.blur_sigma)
        } else {
            work
        };

        let response = chess_response(&work);
        let candidates = find_corner_candidates(&work, &response, &self.chess);
        let corners = assemble_grid(&candidates, pattern.rows(), pattern.cols(), &self.grid)?;
        Some(
            corners
                .into_iter()
                .map(|p| (p + 0.5) * scale - 0.5)
                .collect(),
        )
    }
}

/// Finds the full pattern and refines its corners to sub-pixel accuracy.
pub struct ChessboardDetector<F: CornerFinder = ChessCornerFinder> {
    finder: F,
    subpix: SubPixParams,
}

impl Default for ChessboardDetector {
    fn default() -> Self {
        Self::new(ChessCornerFinder::default(), SubPixParams::default())
    }
}

impl<F: CornerFinder> ChessboardDetector<F> {
    pub fn new(finder: F, subpix: SubPixParams) -> ChessboardDetector<F> {
        ChessboardDetector { finder, subpix }
    }

    /// Detects the pattern in `img`; `None` means "not found".
    pub fn detect(&self, img: &GrayImage, pattern: &CalibrationPattern) -> Option<ObservationPair> {
        let mut corners = self.finder.find_corners(img, pattern)?;
        if corners.len() != pattern.corner_count() {
            return None;
        }

        // Keep the refinement window inside one square.
        let cols = pattern.cols();
        let min_spacing = corners
            .iter()
            .enumerate()
            .filter(|(i, _)| (i + 1) % cols != 0)
            .map(|(i, p)| p.distance(corners[i + 1]))
            .fold(f32::INFINITY, f32::min);
        let half_window = ((min_spacing * 0.5) as usize)
            .saturating_sub(1)
            .clamp(2, self.subpix.half_window.max(2));
        refine_corners(img, &mut corners, &self.subpix.with_half_window(half_window));

        ObservationPair::new(pattern.object_points(), corners).ok()
    }
}
