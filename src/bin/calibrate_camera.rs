use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use aruco_calibration::board::CalibrationPattern;
use aruco_calibration::camera::CameraProfile;
use aruco_calibration::io::{object_from_json, write_report};
use aruco_calibration::pipeline::CalibrationPipeline;
use clap::Parser;
use env_logger::Env;

#[derive(Parser)]
#[command(version, about, author)]
struct CalibrateCli {
    /// folder containing chess01.jpg, chess02.jpg, ...
    folder: PathBuf,

    /// inner corners per column
    #[arg(long, default_value_t = 9)]
    rows: usize,

    /// inner corners per row
    #[arg(long, default_value_t = 7)]
    cols: usize,

    /// distance between adjacent corners (mm)
    #[arg(long, default_value_t = 20.0)]
    square_size: f32,

    /// calibration pattern json, overrides rows/cols/square-size
    #[arg(long)]
    board_config: Option<PathBuf>,

    /// minimum number of images with a detected pattern
    #[arg(long, default_value_t = 1)]
    min_views: usize,

    /// write the camera profile json here
    #[arg(long)]
    output: Option<PathBuf>,

    /// device label stored in the camera profile
    #[arg(long, default_value = "camera")]
    label: String,

    /// write a per-image report here
    #[arg(long)]
    report: Option<PathBuf>,

    /// save detected corners to a rerun recording
    #[arg(long)]
    rrd: Option<PathBuf>,
}

fn today() -> String {
    time::OffsetDateTime::now_local()
        .unwrap_or_else(|_| time::OffsetDateTime::now_utc())
        .date()
        .to_string()
}

fn run(cli: &CalibrateCli) -> aruco_calibration::Result<()> {
    let pattern = match &cli.board_config {
        Some(path) => {
            let pattern: CalibrationPattern = object_from_json(path)?;
            pattern.validate()?;
            pattern
        }
        None => CalibrationPattern::new(cli.rows, cli.cols, cli.square_size)?,
    };
    log::info!(
        "pattern {} x {} inner corners, spacing {}",
        pattern.cols(),
        pattern.rows(),
        pattern.square_size()
    );
    let recording = cli
        .rrd
        .as_deref()
        .map(|p: &Path| rerun::RecordingStreamBuilder::new("calibrate_camera").save(p))
        .transpose()?;

    let now = Instant::now();
    let pipeline = CalibrationPipeline::new(pattern, cli.min_views);
    let (report, _) = pipeline.run(&cli.folder, recording.as_ref())?;
    log::info!("calibration took {:.3} sec", now.elapsed().as_secs_f64());

    println!("{}", report);
    if let Some(path) = &cli.report {
        write_report(path, &report)?;
        log::info!("report written to {}", path.display());
    }
    if let Some(path) = &cli.output {
        let profile = CameraProfile {
            label: cli.label.clone(),
            captured: today(),
            image_size: Some(report.image_size),
            intrinsics: report.intrinsics,
        };
        profile.to_json_file(path)?;
        log::info!("camera profile written to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = CalibrateCli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
