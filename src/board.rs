use serde::{Deserialize, Serialize};

use crate::error::{CalibError, Result};

/// Inner-corner layout and square size of a planar chessboard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPattern {
    rows: usize,
    cols: usize,
    square_size: f32,
}

impl Default for CalibrationPattern {
    fn default() -> Self {
        Self {
            rows: 9,
            cols: 7,
            square_size: 20.0,
        }
    }
}

impl CalibrationPattern {
    pub fn new(rows: usize, cols: usize, square_size: f32) -> Result<CalibrationPattern> {
        let pattern = CalibrationPattern {
            rows,
            cols,
            square_size,
        };
        pattern.validate()?;
        Ok(pattern)
    }

    /// Checks `rows, cols >= 2` and a positive finite spacing.
    ///
    /// Deserialized patterns bypass [`CalibrationPattern::new`], so loaders call this.
    pub fn validate(&self) -> Result<()> {
        if self.rows < 2 || self.cols < 2 {
            return Err(CalibError::InvalidPattern(format!(
                "need at least 2x2 inner corners, got {}x{}",
                self.rows, self.cols
            )));
        }
        if !(self.square_size.is_finite() && self.square_size > 0.0) {
            return Err(CalibError::InvalidPattern(format!(
                "square size must be positive, got {}",
                self.square_size
            )));
        }
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
    pub fn cols(&self) -> usize {
        self.cols
    }
    pub fn square_size(&self) -> f32 {
        self.square_size
    }
    pub fn corner_count(&self) -> usize {
        self.rows * self.cols
    }

    /// 3D corners `(col * s, row * s, 0)` in row-major order.
    pub fn object_points(&self) -> Vec<glam::Vec3> {
        (0..self.rows)
            .flat_map(|r| {
                (0..self.cols).map(move |c| glam::Vec3 {
                    x: c as f32 * self.square_size,
                    y: r as f32 * self.square_size,
                    z: 0.0,
                })
            })
            .collect()
    }
}

/// Physical square marker centered at its own origin in the z = 0 plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerGeometry {
    side_length: f32,
}

impl Default for MarkerGeometry {
    fn default() -> Self {
        Self { side_length: 26.41 }
    }
}

impl MarkerGeometry {
    pub fn new(side_length: f32) -> Result<MarkerGeometry> {
        if !(side_length.is_finite() && side_length > 0.0) {
            return Err(CalibError::InvalidPattern(format!(
                "marker side length must be positive, got {}",
                side_length
            )));
        }
        Ok(MarkerGeometry { side_length })
    }

    pub fn side_length(&self) -> f32 {
        self.side_length
    }

    /// Corners in observation order: top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [glam::Vec3; 4] {
        let h = self.side_length / 2.0;
        [
            glam::Vec3::new(-h, h, 0.0),
            glam::Vec3::new(h, h, 0.0),
            glam::Vec3::new(h, -h, 0.0),
            glam::Vec3::new(-h, -h, 0.0),
        ]
    }
}
