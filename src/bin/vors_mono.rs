// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use anyhow::{bail, Context};
use clap::Parser;
use log::info;
use std::{fs, path::PathBuf};

use visual_odometry_mono::core::odometry;
use visual_odometry_mono::core::scale::GroundTruthScale;
use visual_odometry_mono::core::trajectory;
use visual_odometry_mono::dataset::kitti;
use visual_odometry_mono::eval;
use visual_odometry_mono::misc::type_aliases::{Mat3, Vec3};

/// Monocular visual odometry on a KITTI sequence.
///
/// Prints one line per frame: `index state x y z`,
/// the filtered camera position in the orientation of the ground truth.
#[derive(Parser)]
#[command(version, about, author)]
struct Cli {
    /// Sequence directory, containing `calib.txt` and the image directories
    #[arg(long)]
    sequence: PathBuf,

    /// Ground truth poses file, used for the scale and the evaluation
    #[arg(long)]
    poses: Option<PathBuf>,

    /// Camera id in the calibration file, images are read in `image_<n>`
    #[arg(long, default_value = kitti::DEFAULT_CAMERA)]
    camera: String,

    /// Minimal displacement (pixels) of a tracked point to be used for motion estimation
    #[arg(long, default_value_t = 5.0)]
    min_parallax: f64,

    /// Maximal number of corners detected per frame
    #[arg(long, default_value_t = 2000)]
    max_corners: usize,

    /// Variance of the position measurements in the Kalman filter
    #[arg(long, default_value_t = 1e-2)]
    measurement_noise: f64,

    /// Variance of the process noise in the Kalman filter
    #[arg(long, default_value_t = 1e-4)]
    process_noise: f64,

    /// Write the trajectory to this file, one row-major 3x4 pose per line
    #[arg(long)]
    export: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    // Load the sequence.
    let intrinsics = kitti::load_calibration(cli.sequence.join("calib.txt"), &cli.camera);
    let image_dir = cli.sequence.join(image_dir_name(&cli.camera));
    let frames = kitti::ImageSequence::open(&image_dir);
    if frames.paths().is_empty() {
        bail!("No png image in {}", image_dir.display());
    }
    let ground_truth = cli
        .poses
        .as_ref()
        .map(|path| kitti::positions(&kitti::load_poses(path)))
        .unwrap_or_default();
    info!(
        "{} frames, {} ground truth positions",
        frames.paths().len(),
        ground_truth.len()
    );

    // Setup the odometry configuration.
    let mut config: odometry::Config = odometry::Config::default();
    config.min_parallax = cli.min_parallax;
    config.tracker.detector.max_corners = cli.max_corners;
    config.filter.measurement_noise = cli.measurement_noise;
    config.filter.process_noise = cli.process_noise;
    let odometry = config.init(
        frames,
        intrinsics,
        GroundTruthScale::new(ground_truth.clone()),
    );

    // Process every frame.
    let flip = Mat3::from_diagonal(&Vec3::new(1.0, -1.0, -1.0));
    let mut rows = Vec::new();
    let mut run = odometry.run_all();
    while let Some(step) = run.next() {
        if let Some(position) = run.trajectory().last() {
            let p = trajectory::flip_for_display(position);
            println!("{} {:?} {} {} {}", step.index, step.state, p.x, p.y, p.z);
            let rotation = flip * run.pose().rotation * flip;
            rows.push(kitti::format_pose(&rotation, &p));
        }
    }
    let odometry = run.into_odometry();

    // Evaluate against ground truth.
    if odometry.unscaled_frames() > 0 {
        info!("{} frames without reference scale", odometry.unscaled_frames());
    }
    let errors = eval::position_errors(odometry.trajectory(), &ground_truth);
    if let Some(rmse) = eval::rmse(&errors) {
        info!("Position RMSE over {} frames: {:.3}", errors.len(), rmse);
    }

    if let Some(path) = cli.export {
        fs::write(&path, rows.join("\n") + "\n")
            .with_context(|| format!("Cannot write trajectory to {}", path.display()))?;
    }
    Ok(())
}

/// Image directory of a camera: `P0` -> `image_0`.
fn image_dir_name(camera: &str) -> String {
    format!("image_{}", camera.trim_start_matches('P'))
}
