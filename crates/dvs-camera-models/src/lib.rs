//! Projection models for event-camera mosaicing.
//!
//! Two directions are covered:
//!
//! - **Sensor → ray**: [`BearingGrid`] maps every sensor pixel to its undistorted
//!   bearing vector, as provided by an offline calibration.
//! - **Ray → panorama**: [`SphericalCamera`] implementations map a bearing in the
//!   map frame to continuous panorama coordinates. [`EquirectangularCamera`] is
//!   the longitude/latitude projection used for the gradient map.

use nalgebra::{Matrix2xX, Matrix3xX, Vector2, Vector3};

pub mod bearing;
pub mod equirectangular;

pub use bearing::BearingGrid;
pub use equirectangular::EquirectangularCamera;

/// Bearings shorter than this cannot be projected.
pub const MIN_BEARING_NORM: f64 = 1e-12;

/// Tolerance for projection test assertions.
///
/// Maximum allowed error in panorama coordinates for test assertions.
pub const PROJECTION_TEST_TOLERANCE: f64 = 1e-10;

/// Camera model errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CameraModelError {
    #[error("Bearing has zero or non-finite norm, point is at camera center")]
    PointAtCameraCenter,
    #[error("Sensor pixel ({x}, {y}) is outside the {width}x{height} sensor")]
    PixelOutsideSensor {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
    #[error("Calibration has {actual} entries, expected {expected} for a {width}x{height} sensor")]
    CalibrationShapeMismatch {
        expected: usize,
        actual: usize,
        width: usize,
        height: usize,
    },
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
}

/// Represents the resolution of an image or map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// The width in pixels.
    pub width: u32,
    /// The height in pixels.
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Result<Self, CameraModelError> {
        if width == 0 || height == 0 {
            return Err(CameraModelError::InvalidParams(format!(
                "resolution must be positive, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    /// Number of pixels.
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Trait for projections from a bearing vector onto a full-sphere map.
pub trait SphericalCamera: Send + Sync + Clone + std::fmt::Debug {
    /// Size of the target map.
    fn resolution(&self) -> Resolution;

    /// Projects a bearing to continuous map coordinates `(u, v)`.
    ///
    /// The bearing does not need to be unit length.
    fn project(&self, bearing: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError>;

    /// Batch projection of bearings stored as columns.
    ///
    /// Columns that cannot be projected are filled with NaN.
    fn project_batch(&self, bearings: &Matrix3xX<f64>) -> Matrix2xX<f64> {
        let n = bearings.ncols();
        let mut result = Matrix2xX::zeros(n);
        for i in 0..n {
            let bearing: Vector3<f64> = bearings.column(i).into_owned();
            match self.project(&bearing) {
                Ok(uv) => result.set_column(i, &uv),
                Err(_) => result.set_column(i, &Vector2::new(f64::NAN, f64::NAN)),
            }
        }
        result
    }

    /// Integer cell `(row, col) = (floor(v), floor(u))` containing a map point.
    ///
    /// Returns `None` when the point falls outside the map; coordinates are
    /// never clamped.
    fn pixel_index(&self, uv: &Vector2<f64>) -> Option<(usize, usize)> {
        let resolution = self.resolution();
        let (col, row) = (uv.x.floor(), uv.y.floor());
        if !col.is_finite() || !row.is_finite() || col < 0.0 || row < 0.0 {
            return None;
        }
        if col >= resolution.width as f64 || row >= resolution.height as f64 {
            return None;
        }
        Some((row as usize, col as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_rejects_zero() {
        assert!(Resolution::new(0, 10).is_err());
        assert!(Resolution::new(10, 0).is_err());
        let resolution = Resolution::new(4, 3).expect("positive resolution");
        assert_eq!(resolution.area(), 12);
    }

    #[test]
    fn test_error_display() {
        let error = CameraModelError::PixelOutsideSensor {
            x: 130,
            y: 2,
            width: 128,
            height: 128,
        };
        assert_eq!(
            error.to_string(),
            "Sensor pixel (130, 2) is outside the 128x128 sensor"
        );
    }
}
