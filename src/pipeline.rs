use std::path::Path;

use image::DynamicImage;
use log::{info, warn};
use rayon::prelude::*;

use crate::board::{CalibrationPattern, MarkerGeometry};
use crate::camera::CameraIntrinsics;
use crate::chessboard::ChessboardDetector;
use crate::data_loader::{SequenceNaming, collect_observations, discover_calibration_images};
use crate::detected_points::{MarkerDetections, MarkerObservation};
use crate::error::{CalibError, Result};
use crate::io::{IntrinsicsReport, MarkerPose, PoseReport};
use crate::marker::{DictionaryCodec, MarkerCodec, MarkerDetector};
use crate::optimization::{CalibrationResult, CalibrationSolver, PerspectiveSolver, SqPnpSolver};

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Folder of chessboard images to intrinsics.
pub struct CalibrationPipeline {
    pub pattern: CalibrationPattern,
    pub naming: SequenceNaming,
    pub detector: ChessboardDetector,
    pub solver: CalibrationSolver,
}

impl CalibrationPipeline {
    pub fn new(pattern: CalibrationPattern, min_views: usize) -> CalibrationPipeline {
        CalibrationPipeline {
            pattern,
            naming: SequenceNaming::default(),
            detector: ChessboardDetector::default(),
            solver: CalibrationSolver::default().with_min_observations(min_views),
        }
    }

    pub fn run(
        &self,
        folder: &Path,
        recording: Option<&rerun::RecordingStream>,
    ) -> Result<(IntrinsicsReport, CalibrationResult)> {
        let paths = discover_calibration_images(folder, &self.naming)?;
        if paths.is_empty() {
            return Err(CalibError::InsufficientData {
                found: 0,
                required: self.solver.min_observations(),
            });
        }
        info!("detecting the chessboard in {} image(s)", paths.len());
        let loaded = collect_observations(&paths, &self.pattern, &self.detector, recording);
        info!(
            "pattern found in {} of {} image(s)",
            loaded.observations.len(),
            paths.len()
        );
        let image_size = loaded.image_size.ok_or(CalibError::InsufficientData {
            found: 0,
            required: self.solver.min_observations(),
        })?;

        let result = self.solver.calibrate(&loaded.observations, image_size)?;
        let report = IntrinsicsReport {
            rms: result.rms,
            intrinsics: result.intrinsics,
            image_size,
            views_used: loaded.used.iter().map(|p| file_label(p)).collect(),
            views_skipped: loaded.skipped.iter().map(|(p, _)| file_label(p)).collect(),
            per_view_rms: result.per_view_rms.clone(),
        };
        Ok((report, result))
    }
}

/// Marker detection and per-marker pose for one image.
pub struct PosePipeline<C: MarkerCodec = DictionaryCodec, S: PerspectiveSolver = SqPnpSolver> {
    detector: MarkerDetector<C>,
    solver: S,
    geometry: MarkerGeometry,
    intrinsics: CameraIntrinsics,
}

impl PosePipeline {
    pub fn with_detector(
        detector: MarkerDetector,
        geometry: MarkerGeometry,
        intrinsics: CameraIntrinsics,
    ) -> PosePipeline {
        PosePipeline::new(detector, SqPnpSolver::default(), geometry, intrinsics)
    }
}

impl<C, S> PosePipeline<C, S>
where
    C: MarkerCodec + Sync,
    S: PerspectiveSolver + Sync,
{
    pub fn new(
        detector: MarkerDetector<C>,
        solver: S,
        geometry: MarkerGeometry,
        intrinsics: CameraIntrinsics,
    ) -> PosePipeline<C, S> {
        PosePipeline {
            detector,
            solver,
            geometry,
            intrinsics,
        }
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    pub fn geometry(&self) -> &MarkerGeometry {
        &self.geometry
    }

    fn marker_pose(&self, marker: &MarkerObservation) -> Result<MarkerPose> {
        let object = self.geometry.corners();
        let pose = self.solver.solve(&object, &marker.corners, &self.intrinsics)?;
        let rms = self
            .intrinsics
            .reprojection_rms(&pose, &object, &marker.corners);
        Ok(MarkerPose {
            id: marker.id,
            pose,
            rms,
        })
    }

    /// Detects the markers and solves their poses in parallel.
    ///
    /// Markers whose pose cannot be solved are left out of `poses` with a warning.
    pub fn process(&self, img: &DynamicImage) -> (PoseReport, MarkerDetections) {
        let detections = self.detector.detect(img);
        let poses: Vec<MarkerPose> = detections
            .markers
            .par_iter()
            .filter_map(|marker| match self.marker_pose(marker) {
                Ok(pose) => Some(pose),
                Err(e) => {
                    warn!("no pose for marker {}: {}", marker.id, e);
                    None
                }
            })
            .collect();
        let report = PoseReport {
            detected_ids: detections.markers.iter().map(|m| m.id).collect(),
            poses,
            rejected_candidates: detections.rejected.len(),
        };
        (report, detections)
    }
}
