pub mod decode;
pub mod dictionary;
pub mod quad;
pub mod threshold;
pub mod union_find;

use glam::Vec2;
use image::{DynamicImage, GrayImage};
use rayon::prelude::*;

use crate::detected_points::{MarkerDetections, MarkerObservation};
use crate::error::Result;
use crate::refine::{SubPixParams, refine_corner};
pub use decode::{DecodeParams, read_bits};
pub use dictionary::{DictionaryCodec, Match, MarkerCodec, MarkerDictionary, rotate_code_u64};
pub use quad::{QuadParams, find_components, fit_quad};
use threshold::{IntegralImage, adaptive_threshold};

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerDetectorParams {
    /// Adaptive threshold window sizes, each run as a separate pass.
    pub threshold_windows: Vec<usize>,
    pub threshold_offset: f32,
    pub quad: QuadParams,
    pub decode: DecodeParams,
    pub subpix: SubPixParams,
    /// Fraction of the dictionary's correction capacity used when matching.
    pub error_correction_rate: f32,
}

impl Default for MarkerDetectorParams {
    fn default() -> Self {
        Self {
            threshold_windows: vec![3, 13, 23],
            threshold_offset: 7.0,
            quad: QuadParams::default(),
            decode: DecodeParams::default(),
            subpix: SubPixParams::default(),
            error_correction_rate: 0.6,
        }
    }
}

enum Candidate {
    Marker(MarkerObservation),
    Rejected([Vec2; 4]),
}

fn quad_center(q: &[Vec2; 4]) -> Vec2 {
    q.iter().copied().sum::<Vec2>() / 4.0
}

fn quad_side(q: &[Vec2; 4]) -> f32 {
    (0..4).map(|i| q[i].distance(q[(i + 1) % 4])).sum::<f32>() / 4.0
}

fn same_quad(a: &[Vec2; 4], b: &[Vec2; 4]) -> bool {
    let side = quad_side(a).min(quad_side(b));
    quad_center(a).distance(quad_center(b)) < 0.25 * side
        && (quad_side(a) - quad_side(b)).abs() < 0.25 * side
}

/// Finds square fiducials and identifies them with a [`MarkerCodec`].
pub struct MarkerDetector<C: MarkerCodec = DictionaryCodec> {
    codec: C,
    params: MarkerDetectorParams,
}

impl MarkerDetector<DictionaryCodec> {
    pub fn from_dictionary(dictionary: MarkerDictionary) -> Result<Self> {
        let params = MarkerDetectorParams::default();
        let codec = DictionaryCodec::new(dictionary, params.error_correction_rate)?;
        Ok(MarkerDetector { codec, params })
    }
}

impl<C: MarkerCodec + Sync> MarkerDetector<C> {
    pub fn new(codec: C, params: MarkerDetectorParams) -> Self {
        MarkerDetector { codec, params }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn detect(&self, img: &DynamicImage) -> MarkerDetections {
        self.detect_gray(&img.to_luma8())
    }

    /// Markers in detection order plus quads that did not decode.
    pub fn detect_gray(&self, gray: &GrayImage) -> MarkerDetections {
        let (w, h) = (gray.width() as usize, gray.height() as usize);
        let mut detections = MarkerDetections::default();
        if w < 8 || h < 8 {
            return detections;
        }
        let longest = w.max(h) as f32;
        let min_perimeter = self.params.quad.min_perimeter_rate * longest;
        let max_perimeter = self.params.quad.max_perimeter_rate * longest;
        let min_pixels = (min_perimeter as usize).max(16);
        let integral = IntegralImage::new(gray);

        for &window in &self.params.threshold_windows {
            let mask = adaptive_threshold(gray, &integral, window, self.params.threshold_offset);
            let components = find_components(&mask, w, h, min_pixels);
            let candidates: Vec<Candidate> = components
                .par_iter()
                .filter_map(|boundary| {
                    let quad = fit_quad(boundary, min_perimeter, max_perimeter, &self.params.quad)?;
                    Some(self.decode_quad(gray, quad))
                })
                .collect();
            log::trace!(
                "threshold window {}: {} components, {} quads",
                window,
                components.len(),
                candidates.len()
            );

            for candidate in candidates {
                match candidate {
                    Candidate::Marker(m) => {
                        if !detections.markers.iter().any(|d| same_quad(&d.corners, &m.corners)) {
                            detections.markers.push(m);
                        }
                    }
                    Candidate::Rejected(q) => {
                        if !detections.rejected.iter().any(|r| same_quad(r, &q)) {
                            detections.rejected.push(q);
                        }
                    }
                }
            }
        }
        let markers = &detections.markers;
        detections
            .rejected
            .retain(|q| !markers.iter().any(|m| same_quad(&m.corners, q)));
        log::debug!(
            "detected {} marker(s), rejected {} candidate(s)",
            detections.markers.len(),
            detections.rejected.len()
        );
        detections
    }

    fn decode_quad(&self, gray: &GrayImage, quad: [Vec2; 4]) -> Candidate {
        let side = quad
            .iter()
            .enumerate()
            .map(|(i, p)| p.distance(quad[(i + 1) % 4]))
            .fold(f32::INFINITY, f32::min);
        let cells = (self.codec.marker_size() + 2 * self.params.decode.border_bits) as f32;
        // Stay inside one cell so the refinement only sees the outer frame edges.
        let half_window = ((side / cells * 0.5) as usize).clamp(1, self.params.subpix.half_window.max(1));
        let subpix = self.params.subpix.with_half_window(half_window);
        let refined = quad.map(|p| refine_corner(gray, p, &subpix));

        let code = read_bits(gray, &refined, self.codec.marker_size(), &self.params.decode);
        match code.and_then(|c| self.codec.identify(c)) {
            Some(m) => {
                let r = m.rotation as usize;
                Candidate::Marker(MarkerObservation {
                    id: m.id,
                    corners: std::array::from_fn(|k| refined[(k + r) % 4]),
                    hamming: m.hamming,
                })
            }
            None => Candidate::Rejected(refined),
        }
    }
}
