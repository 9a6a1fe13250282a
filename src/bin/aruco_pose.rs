use std::path::PathBuf;
use std::process::ExitCode;

use aruco_calibration::board::MarkerGeometry;
use aruco_calibration::camera::CameraProfile;
use aruco_calibration::data_loader::load_image;
use aruco_calibration::marker::{MarkerDetector, MarkerDictionary};
use aruco_calibration::pipeline::PosePipeline;
use aruco_calibration::util::parse_switch;
use aruco_calibration::visualization::{
    axis_length_for, log_image_as_compressed, log_marker_detections, log_pose_axes,
};
use clap::Parser;
use env_logger::Env;

#[derive(Parser)]
#[command(version, about, author)]
struct ArucoPoseCli {
    /// image to search for markers
    image: PathBuf,

    /// display detections and pose axes in the rerun viewer, on only for `true`
    #[arg(action = clap::ArgAction::Set, value_parser = parse_switch, default_value = "false")]
    show: bool,

    /// print detected ids and poses, on only for `true`
    #[arg(action = clap::ArgAction::Set, value_parser = parse_switch, default_value = "false")]
    print: bool,

    /// camera profile json, defaults to the built-in OnePlus 11 calibration
    #[arg(long)]
    camera: Option<PathBuf>,

    /// marker side length (mm)
    #[arg(long, default_value_t = 26.41)]
    marker_length: f32,

    /// predefined dictionary name
    #[arg(long, default_value = "DICT_6X6_50")]
    dictionary: String,

    /// custom dictionary json, overrides --dictionary
    #[arg(long)]
    dictionary_file: Option<PathBuf>,

    /// with show, save the recording here instead of spawning a viewer
    #[arg(long)]
    rrd: Option<PathBuf>,
}

fn run(cli: &ArucoPoseCli) -> aruco_calibration::Result<()> {
    let profile = match &cli.camera {
        Some(path) => CameraProfile::from_json_file(path)?,
        None => CameraProfile::oneplus_11(),
    };
    log::info!("using camera profile {} ({})", profile.label, profile.captured);
    let dictionary = match &cli.dictionary_file {
        Some(path) => MarkerDictionary::from_json_file(path)?,
        None => MarkerDictionary::builtin(&cli.dictionary)?,
    };
    let geometry = MarkerGeometry::new(cli.marker_length)?;

    let img = load_image(&cli.image)?;
    let pipeline = PosePipeline::with_detector(
        MarkerDetector::from_dictionary(dictionary)?,
        geometry,
        profile.intrinsics,
    );
    let (report, detections) = pipeline.process(&img);
    log::info!(
        "{} marker(s), {} pose(s), {} rejected candidate(s)",
        report.detected_ids.len(),
        report.poses.len(),
        report.rejected_candidates
    );

    if cli.print {
        print!("{}", report);
    }
    if cli.show {
        let builder = rerun::RecordingStreamBuilder::new("aruco_pose");
        let recording = match &cli.rrd {
            Some(path) => builder.save(path)?,
            None => builder.spawn()?,
        };
        log_image_as_compressed(&recording, "image", &img, image::ImageFormat::Png)?;
        log_marker_detections(&recording, "image", &detections)?;
        log_pose_axes(
            &recording,
            "image",
            pipeline.intrinsics(),
            &report.poses,
            axis_length_for(pipeline.geometry()),
        )?;
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = ArucoPoseCli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
