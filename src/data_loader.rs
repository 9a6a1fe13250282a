use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, ImageReader};
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use rerun::TimeCell;

use crate::board::CalibrationPattern;
use crate::chessboard::{ChessboardDetector, CornerFinder};
use crate::detected_points::ObservationPair;
use crate::error::{CalibError, Result};
use crate::visualization::{log_image_as_compressed, log_observation};

/// File naming of a calibration sequence, `<prefix><index>.<extension>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceNaming {
    pub prefix: String,
    pub extension: String,
    /// Zero padding of the index.
    pub digits: usize,
}

impl Default for SequenceNaming {
    fn default() -> Self {
        Self {
            prefix: "chess".to_string(),
            extension: "jpg".to_string(),
            digits: 2,
        }
    }
}

impl SequenceNaming {
    pub fn file_name(&self, index: usize) -> String {
        format!(
            "{}{:0width$}.{}",
            self.prefix,
            index,
            self.extension,
            width = self.digits
        )
    }
}

/// Lists `<folder>/chess01.jpg`, `chess02.jpg`, ... up to the first missing index.
pub fn discover_calibration_images(folder: &Path, naming: &SequenceNaming) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(CalibError::InputNotFound(folder.to_path_buf()));
    }
    let paths: Vec<PathBuf> = (1..)
        .map(|i| folder.join(naming.file_name(i)))
        .take_while(|p| p.is_file())
        .collect();
    log::trace!("found {} image(s) in {}", paths.len(), folder.display());
    Ok(paths)
}

pub fn load_image(path: &Path) -> Result<DynamicImage> {
    if !path.is_file() {
        return Err(CalibError::InputNotFound(path.to_path_buf()));
    }
    let decode_failure = |source| CalibError::DecodeFailure {
        path: path.to_path_buf(),
        source,
    };
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(decode_failure)
}

pub fn load_gray(path: &Path) -> Result<GrayImage> {
    Ok(load_image(path)?.to_luma8())
}

/// Chessboard detections over a calibration sequence.
#[derive(Debug, Default)]
pub struct LoadedObservations {
    pub observations: Vec<ObservationPair>,
    /// Source image of each entry of `observations`.
    pub used: Vec<PathBuf>,
    pub skipped: Vec<(PathBuf, CalibError)>,
    /// Size of the first image with a detection.
    pub image_size: Option<(u32, u32)>,
}

fn detect_one<F: CornerFinder>(
    path: &Path,
    frame: i64,
    pattern: &CalibrationPattern,
    detector: &ChessboardDetector<F>,
    recording: Option<&rerun::RecordingStream>,
) -> Result<((u32, u32), ObservationPair)> {
    let img = load_image(path)?;
    let size = (img.width(), img.height());
    let detection = detector.detect(&img.to_luma8(), pattern);
    if let Some(recording) = recording {
        recording.set_time("stable", TimeCell::from_timestamp_nanos_since_epoch(frame * 100_000_000));
        log_image_as_compressed(recording, "cam0", &img, image::ImageFormat::Jpeg)?;
        if let Some(obs) = &detection {
            log_observation(recording, "cam0", obs, pattern.cols())?;
        }
    }
    let obs = detection.ok_or_else(|| CalibError::DetectionFailure {
        path: path.to_path_buf(),
        reason: format!("{} x {} chessboard not found", pattern.cols(), pattern.rows()),
    })?;
    Ok((size, obs))
}

/// Detects the pattern in every image in parallel, keeping the input order.
///
/// Images that fail to load or show no complete pattern are skipped with a warning.
pub fn collect_observations<F: CornerFinder + Sync>(
    paths: &[PathBuf],
    pattern: &CalibrationPattern,
    detector: &ChessboardDetector<F>,
    recording: Option<&rerun::RecordingStream>,
) -> LoadedObservations {
    let results: Vec<_> = paths
        .par_iter()
        .enumerate()
        .progress_count(paths.len() as u64)
        .map(|(i, path)| detect_one(path, i as i64, pattern, detector, recording))
        .collect();

    let mut loaded = LoadedObservations::default();
    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok((size, obs)) => {
                log::trace!("{}: {} corners", path.display(), obs.len());
                loaded.image_size.get_or_insert(size);
                loaded.observations.push(obs);
                loaded.used.push(path.clone());
            }
            Err(e) => {
                log::warn!("skipping {}: {}", path.display(), e);
                loaded.skipped.push((path.clone(), e));
            }
        }
    }
    loaded
}
