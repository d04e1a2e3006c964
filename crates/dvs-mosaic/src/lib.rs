//! # DVS Mosaic
//!
//! Reconstructs the intensity-gradient panorama of a static scene from an
//! event camera that only rotates, given its orientation over time.
//!
//! ## Pipeline
//!
//! - **Trajectory**: timestamped quaternions, or integrated angular
//!   velocities, become an SO(3) trajectory with geodesic interpolation
//!   ([`Trajectory`])
//! - **Event cache**: every sensor pixel remembers the time and rotation of
//!   its last event ([`EventMap`])
//! - **Projection**: sensor bearings are rotated into the map frame and
//!   projected onto an equirectangular panorama
//! - **Filtering**: a 2-state EKF per panorama pixel fuses each event into
//!   the gradient estimate ([`GradientEkf`], [`GradientMap`])
//! - **Batching**: events are processed in fixed-size batches sharing one
//!   rotation ([`BatchProcessor`])
//!
//! Turning the gradient map into an intensity image is left to an external
//! [`GradientIntegrator`].
//!
//! ## Example
//!
//! ```no_run
//! use dvs_mosaic::{BatchProcessor, MosaicConfig, Trajectory};
//! use dvs_mosaic::dvs_io::{CalibrationLoader, EventLoader, PoseLoader};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MosaicConfig::new();
//! let recording = EventLoader::load("events.txt")?;
//! let poses = PoseLoader::load("poses.txt", recording.origin)?;
//! let bearings = CalibrationLoader::load("calibration.txt", config.sensor_resolution())?;
//!
//! let trajectory = Trajectory::from_poses(&poses)?;
//! let mut processor = BatchProcessor::new(config)?;
//! let mut state = processor.initial_state();
//! let summary = processor.process(&recording.events, &trajectory, &bearings, &mut state)?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

// Re-export workspace crates
pub use dvs_camera_models;
pub use dvs_io;
pub use dvs_manifolds;

pub mod config;
pub mod ekf;
pub mod error;
pub mod event_map;
pub mod gradient_map;
pub mod integration;
pub mod logger;
pub mod observers;
pub mod processor;
pub mod trajectory;

pub use config::{ConfigError, MeasurementModel, MosaicConfig};
pub use ekf::{EventObservation, GradientEkf, UpdateRejection};
pub use error::{MosaicError, MosaicResult};
pub use event_map::{EventMap, EventMapEntry, EventMapError, INITIAL_EVENT_TIME};
pub use gradient_map::{GradientMap, PixelState, ReconstructionState};
pub use integration::{GradientIntegrator, IntegratorInput};
pub use logger::{init_logger, init_logger_with_level};
pub use observers::{BatchObserver, BatchObserverVec, ProgressObserver};
pub use processor::{
    BatchProcessor, BatchReport, ProcessingSummary, SkipCounts, TerminationReason,
};
pub use trajectory::{Trajectory, TrajectoryError};
