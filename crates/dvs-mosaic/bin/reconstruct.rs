//! Gradient-map reconstruction binary
//!
//! Loads an event stream, a pose log (or a gyroscope log) and the sensor
//! calibration, runs the per-pixel EKF over the events and optionally writes
//! the resulting maps as text grids.
//!
//! # Usage
//! ```bash
//! cargo run --release --bin reconstruct -- \
//!     --events data/events.txt --poses data/poses.txt \
//!     --calibration data/calibration.txt --output-dir out/
//!
//! # Event-rate measurement model with a smaller panorama:
//! cargo run --release --bin reconstruct -- ... --model event-rate \
//!     --output-width 1024 --output-height 512
//!
//! # Rotations integrated from angular velocities:
//! cargo run --release --bin reconstruct -- --events data/events.txt \
//!     --angular-velocity data/gyro.txt --calibration data/calibration.txt
//! ```

use clap::{Parser, ValueEnum};
use dvs_mosaic::dvs_io::{
    AngularVelocityLoader, CalibrationLoader, EventLoader, GridWriter, PoseLoader,
};
use dvs_mosaic::{
    BatchProcessor, MeasurementModel, MosaicConfig, ProgressObserver, Trajectory,
    init_logger_with_level,
};
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use tracing::{Level, info};

/// Measurement model for the per-pixel filter
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum ModelArg {
    /// Each event is a brightness step of size C (default)
    #[default]
    Contrast,
    /// Event rate is proportional to the temporal brightness change
    EventRate,
}

impl From<ModelArg> for MeasurementModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Contrast => MeasurementModel::Contrast,
            ModelArg::EventRate => MeasurementModel::EventRate,
        }
    }
}

/// Panoramic gradient reconstruction from a rotating event camera
#[derive(Parser)]
#[command(name = "reconstruct")]
#[command(about = "Reconstruct a panoramic gradient map from events and known rotations")]
struct Args {
    /// Event file (`sec nsec x y pol`)
    #[arg(long)]
    events: PathBuf,

    /// Pose file (`sec nsec x y z qx qy qz qw`)
    #[arg(long, required_unless_present = "angular_velocity", conflicts_with = "angular_velocity")]
    poses: Option<PathBuf>,

    /// Gyroscope file (`sec nsec wx wy wz`), integrated instead of reading poses
    #[arg(long)]
    angular_velocity: Option<PathBuf>,

    /// Undistorted pixel table (`u v` per pixel, column-major)
    #[arg(long)]
    calibration: PathBuf,

    /// Directory for gradient_x.txt, gradient_y.txt and covariance_trace.txt
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Events per batch
    #[arg(short, long, default_value = "3000")]
    batch_size: usize,

    /// Measurement model
    #[arg(short, long, value_enum, default_value_t = ModelArg::Contrast)]
    model: ModelArg,

    /// Contrast threshold C
    #[arg(long, default_value = "0.45")]
    contrast_threshold: f64,

    /// Measurement noise variance (defaults to the model's value)
    #[arg(long)]
    measurement_variance: Option<f64>,

    /// Initial gradient variance of every pixel
    #[arg(long, default_value = "10.0")]
    initial_variance: f64,

    /// Panorama height in pixels
    #[arg(long, default_value = "1024")]
    output_height: u32,

    /// Panorama width in pixels
    #[arg(long, default_value = "2048")]
    output_width: u32,

    /// Sensor width in pixels
    #[arg(long, default_value = "128")]
    sensor_width: u32,

    /// Sensor height in pixels
    #[arg(long, default_value = "128")]
    sensor_height: u32,

    /// Covariance trace above which a pixel is masked before integration
    #[arg(long, default_value = "0.05")]
    trace_threshold: f64,

    /// Log progress every N batches
    #[arg(long, default_value = "50")]
    progress_every: usize,

    /// Verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn to_config(&self) -> MosaicConfig {
        let config = MosaicConfig::new()
            .with_batch_size(self.batch_size)
            .with_measurement_model(self.model.into())
            .with_contrast_threshold(self.contrast_threshold)
            .with_initial_gradient_variance(self.initial_variance)
            .with_output_size(self.output_width, self.output_height)
            .with_sensor_size(self.sensor_width, self.sensor_height)
            .with_trace_threshold(self.trace_threshold);
        match self.measurement_variance {
            Some(variance) => config.with_measurement_variance(variance),
            None => config,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logger_with_level(if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    });

    let config = args.to_config();
    config.validate()?;
    info!("\n{config}");

    let recording = EventLoader::load(&args.events)?;
    let bearings = CalibrationLoader::load(&args.calibration, config.sensor_resolution())?;
    let trajectory = match (&args.poses, &args.angular_velocity) {
        (Some(poses), _) => Trajectory::from_poses(&PoseLoader::load(poses, recording.origin)?)?,
        (None, Some(gyro)) => Trajectory::from_angular_velocities(&AngularVelocityLoader::load(
            gyro,
            recording.origin,
        )?)?,
        (None, None) => return Err("either --poses or --angular-velocity is required".into()),
    };

    let mut processor = BatchProcessor::new(config)?;
    processor.add_observer(ProgressObserver::new(args.progress_every));
    let mut state = processor.initial_state();
    let summary = processor.process(&recording.events, &trajectory, &bearings, &mut state)?;
    println!("{summary}");

    if let Some(output_dir) = &args.output_dir {
        fs::create_dir_all(output_dir)?;
        let map = &state.gradient_map;
        GridWriter::write(output_dir.join("gradient_x.txt"), &map.gradient_x())?;
        GridWriter::write(output_dir.join("gradient_y.txt"), &map.gradient_y())?;
        GridWriter::write(output_dir.join("covariance_trace.txt"), &map.covariance_trace())?;

        let input = map.integrator_input(processor.config().trace_threshold);
        info!(
            masked_pixels = input.masked_pixels,
            output_dir = %output_dir.display(),
            "wrote gradient maps"
        );
    }

    Ok(())
}
