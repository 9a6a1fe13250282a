use crate::error::{CalibError, Result};

/// Object points of a pattern paired index-by-index with where they were seen.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationPair {
    object_points: Vec<glam::Vec3>,
    image_points: Vec<glam::Vec2>,
}

impl ObservationPair {
    pub fn new(
        object_points: Vec<glam::Vec3>,
        image_points: Vec<glam::Vec2>,
    ) -> Result<ObservationPair> {
        if object_points.len() != image_points.len() {
            return Err(CalibError::MismatchedCorrespondence {
                object: object_points.len(),
                image: image_points.len(),
            });
        }
        Ok(ObservationPair {
            object_points,
            image_points,
        })
    }
    pub fn object_points(&self) -> &[glam::Vec3] {
        &self.object_points
    }
    pub fn image_points(&self) -> &[glam::Vec2] {
        &self.image_points
    }
    pub fn len(&self) -> usize {
        self.image_points.len()
    }
    pub fn is_empty(&self) -> bool {
        self.image_points.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&glam::Vec3, &glam::Vec2)> {
        self.object_points.iter().zip(self.image_points.iter())
    }
}

/// A decoded marker. Corners follow the canonical marker orientation,
/// clockwise in the image: top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerObservation {
    pub id: u32,
    pub corners: [glam::Vec2; 4],
    /// Bit errors corrected by the dictionary match.
    pub hamming: u8,
}

impl MarkerObservation {
    pub fn center(&self) -> glam::Vec2 {
        self.corners.iter().copied().sum::<glam::Vec2>() / 4.0
    }
}

/// Result of marker detection on one image.
#[derive(Debug, Clone, Default)]
pub struct MarkerDetections {
    pub markers: Vec<MarkerObservation>,
    /// Quads that looked like markers but did not decode.
    pub rejected: Vec<[glam::Vec2; 4]>,
}

impl MarkerDetections {
    pub fn sorted_ids(&self) -> Vec<u32> {
        let mut ids: Vec<_> = self.markers.iter().map(|m| m.id).collect();
        ids.sort_unstable();
        ids
    }
}
