//! Per-pixel bearing lookup for a calibrated event sensor.
//!
//! Lens distortion is removed offline; the calibration stores for every sensor
//! pixel the normalized image-plane coordinates `(u, v)` of its undistorted ray.
//! The bearing of pixel `(x, y)` is then `(u, v, 1)`.

use crate::{CameraModelError, Resolution};
use nalgebra::{Vector2, Vector3};

/// Undistorted bearing directions for every pixel of the sensor.
///
/// Entries are stored row-major (`y * width + x`).
#[derive(Debug, Clone, PartialEq)]
pub struct BearingGrid {
    resolution: Resolution,
    normalized: Vec<Vector2<f64>>,
}

impl BearingGrid {
    /// Builds a grid from entries ordered row by row (`index = y * width + x`).
    pub fn from_row_major(
        resolution: Resolution,
        normalized: Vec<Vector2<f64>>,
    ) -> Result<Self, CameraModelError> {
        check_shape(resolution, normalized.len())?;
        validate_entries(&normalized)?;
        Ok(Self {
            resolution,
            normalized,
        })
    }

    /// Builds a grid from entries ordered column by column
    /// (`index = x * height + y`), the order calibration tools export.
    pub fn from_column_major(
        resolution: Resolution,
        normalized: Vec<Vector2<f64>>,
    ) -> Result<Self, CameraModelError> {
        check_shape(resolution, normalized.len())?;
        validate_entries(&normalized)?;

        let width = resolution.width as usize;
        let height = resolution.height as usize;
        let mut row_major = Vec::with_capacity(normalized.len());
        for y in 0..height {
            for x in 0..width {
                row_major.push(normalized[x * height + y]);
            }
        }
        Ok(Self {
            resolution,
            normalized: row_major,
        })
    }

    /// Pinhole grid without distortion, mainly for synthetic data.
    ///
    /// `focal` is in pixels and the principal point is the sensor centre.
    pub fn pinhole(resolution: Resolution, focal: f64) -> Result<Self, CameraModelError> {
        if !(focal.is_finite() && focal > 0.0) {
            return Err(CameraModelError::InvalidParams(format!(
                "focal length must be positive, got {focal}"
            )));
        }
        let cx = (resolution.width as f64 - 1.0) / 2.0;
        let cy = (resolution.height as f64 - 1.0) / 2.0;
        let normalized = (0..resolution.height)
            .flat_map(|y| {
                (0..resolution.width)
                    .map(move |x| Vector2::new((x as f64 - cx) / focal, (y as f64 - cy) / focal))
            })
            .collect();
        Ok(Self {
            resolution,
            normalized,
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Bearing `(u, v, 1)` of sensor pixel `(x, y)`, or `None` outside the sensor.
    #[inline]
    pub fn bearing(&self, x: usize, y: usize) -> Option<Vector3<f64>> {
        let width = self.resolution.width as usize;
        if x >= width || y >= self.resolution.height as usize {
            return None;
        }
        let uv = self.normalized[y * width + x];
        Some(Vector3::new(uv.x, uv.y, 1.0))
    }

    /// Like [`BearingGrid::bearing`] but reports the offending pixel.
    pub fn try_bearing(&self, x: usize, y: usize) -> Result<Vector3<f64>, CameraModelError> {
        self.bearing(x, y)
            .ok_or(CameraModelError::PixelOutsideSensor {
                x,
                y,
                width: self.resolution.width as usize,
                height: self.resolution.height as usize,
            })
    }
}

fn check_shape(resolution: Resolution, actual: usize) -> Result<(), CameraModelError> {
    let expected = resolution.area();
    if actual != expected {
        return Err(CameraModelError::CalibrationShapeMismatch {
            expected,
            actual,
            width: resolution.width as usize,
            height: resolution.height as usize,
        });
    }
    Ok(())
}

fn validate_entries(normalized: &[Vector2<f64>]) -> Result<(), CameraModelError> {
    match normalized.iter().position(|uv| !(uv.x.is_finite() && uv.y.is_finite())) {
        Some(index) => Err(CameraModelError::InvalidParams(format!(
            "calibration entry {index} is not finite"
        ))),
        None => Ok(()),
    }
}
