//! Error types for the dvs-mosaic library
//!
//! Every workspace crate reports failures through its own `thiserror` enum;
//! this module folds them into [`MosaicError`] so binaries can use a single
//! result type.

use crate::{config::ConfigError, event_map::EventMapError, trajectory::TrajectoryError};
use dvs_camera_models::CameraModelError;
use dvs_io::IoError;
use dvs_manifolds::ManifoldError;
use thiserror::Error;

/// Main result type used throughout the dvs-mosaic library
pub type MosaicResult<T> = Result<T, MosaicError>;

/// Main error type for the dvs-mosaic library
#[derive(Debug, Clone, Error)]
pub enum MosaicError {
    /// Invalid configuration values
    #[error("Configuration error: {0}")]
    Config(String),

    /// Trajectory construction errors
    #[error("Trajectory error: {0}")]
    Trajectory(String),

    /// Event cache access errors
    #[error("Event map error: {0}")]
    EventMap(String),

    /// Rotation algebra errors
    #[error("Manifold error: {0}")]
    Manifold(String),

    /// Projection and calibration errors
    #[error("Camera model error: {0}")]
    Camera(String),

    /// IO related errors (file loading, parsing, writing)
    #[error("IO error: {0}")]
    Io(String),

    /// Inputs that are individually valid but inconsistent with each other
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<std::io::Error> for MosaicError {
    fn from(err: std::io::Error) -> Self {
        MosaicError::Io(err.to_string())
    }
}

impl From<ConfigError> for MosaicError {
    fn from(err: ConfigError) -> Self {
        MosaicError::Config(err.to_string())
    }
}

impl From<TrajectoryError> for MosaicError {
    fn from(err: TrajectoryError) -> Self {
        MosaicError::Trajectory(err.to_string())
    }
}

impl From<EventMapError> for MosaicError {
    fn from(err: EventMapError) -> Self {
        MosaicError::EventMap(err.to_string())
    }
}

impl From<ManifoldError> for MosaicError {
    fn from(err: ManifoldError) -> Self {
        MosaicError::Manifold(err.to_string())
    }
}

impl From<CameraModelError> for MosaicError {
    fn from(err: CameraModelError) -> Self {
        MosaicError::Camera(err.to_string())
    }
}

impl From<IoError> for MosaicError {
    fn from(err: IoError) -> Self {
        MosaicError::Io(err.to_string())
    }
}
