//! Equirectangular Panorama Model
//!
//! Maps a direction on the unit sphere to longitude/latitude map coordinates.
//!
//! # Mathematical Model
//!
//! For a bearing b = (x, y, z) with ρ = ‖b‖:
//!
//! ```text
//! φ = atan2(x, z)            longitude, 0 along +Z
//! θ = asin(-y / ρ)           latitude, positive above the horizon (-Y is up)
//! u = φ · W / 2π + W / 2
//! v = -θ · H / π + H / 2
//! ```
//!
//! The optical axis (0, 0, 1) lands at the map centre (W/2, H/2). A full turn
//! in longitude spans the map width and the poles sit on the top and bottom
//! rows.

use crate::{CameraModelError, MIN_BEARING_NORM, Resolution, SphericalCamera};
use nalgebra::{Vector2, Vector3};
use std::f64::consts::{PI, TAU};

/// Equirectangular projection onto a `width × height` panorama.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquirectangularCamera {
    resolution: Resolution,
}

impl EquirectangularCamera {
    /// Creates a projection for a map of the given size.
    ///
    /// # Example
    ///
    /// ```
    /// use dvs_camera_models::{EquirectangularCamera, Resolution, SphericalCamera};
    /// use nalgebra::Vector3;
    ///
    /// let camera = EquirectangularCamera::new(Resolution::new(2048, 1024)?);
    /// let uv = camera.project(&Vector3::new(0.0, 0.0, 1.0))?;
    /// assert_eq!(camera.pixel_index(&uv), Some((512, 1024)));
    /// # Ok::<(), dvs_camera_models::CameraModelError>(())
    /// ```
    pub fn new(resolution: Resolution) -> Self {
        Self { resolution }
    }

    pub fn width(&self) -> f64 {
        self.resolution.width as f64
    }

    pub fn height(&self) -> f64 {
        self.resolution.height as f64
    }
}

impl SphericalCamera for EquirectangularCamera {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn project(&self, bearing: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        let rho = bearing.norm();
        if !rho.is_finite() || rho < MIN_BEARING_NORM {
            return Err(CameraModelError::PointAtCameraCenter);
        }

        let phi = bearing.x.atan2(bearing.z);
        let theta = (-bearing.y / rho).clamp(-1.0, 1.0).asin();

        let u = phi * self.width() / TAU + self.width() / 2.0;
        let v = -theta * self.height() / PI + self.height() / 2.0;
        Ok(Vector2::new(u, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PROJECTION_TEST_TOLERANCE;
    use nalgebra::Matrix3xX;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn camera() -> Result<EquirectangularCamera, CameraModelError> {
        Ok(EquirectangularCamera::new(Resolution::new(2048, 1024)?))
    }

    #[test]
    fn test_projection_at_optical_axis() -> TestResult {
        let uv = camera()?.project(&Vector3::new(0.0, 0.0, 1.0))?;
        assert!((uv.x - 1024.0).abs() < PROJECTION_TEST_TOLERANCE);
        assert!((uv.y - 512.0).abs() < PROJECTION_TEST_TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_projection_is_scale_invariant() -> TestResult {
        let camera = camera()?;
        let bearing = Vector3::new(0.3, -0.2, 0.9);
        let uv = camera.project(&bearing)?;
        let uv_scaled = camera.project(&(bearing * 7.5))?;
        assert!((uv - uv_scaled).norm() < PROJECTION_TEST_TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_quarter_turn_in_longitude() -> TestResult {
        let uv = camera()?.project(&Vector3::new(1.0, 0.0, 0.0))?;
        assert!((uv.x - (1024.0 + 512.0)).abs() < PROJECTION_TEST_TOLERANCE);
        assert!((uv.y - 512.0).abs() < PROJECTION_TEST_TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_negative_y_is_up() -> TestResult {
        let uv = camera()?.project(&Vector3::new(0.0, -1.0, 0.0))?;
        assert!(uv.y.abs() < PROJECTION_TEST_TOLERANCE);
        let uv = camera()?.project(&Vector3::new(0.0, 1.0, 0.0))?;
        assert!((uv.y - 1024.0).abs() < PROJECTION_TEST_TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_zero_bearing_rejected() -> TestResult {
        let camera = camera()?;
        assert_eq!(
            camera.project(&Vector3::zeros()),
            Err(CameraModelError::PointAtCameraCenter)
        );
        assert!(
            camera
                .project(&Vector3::new(f64::NAN, 0.0, 1.0))
                .is_err()
        );
        Ok(())
    }

    #[test]
    fn test_project_batch_marks_failures() -> TestResult {
        let camera = camera()?;
        let bearings = Matrix3xX::from_columns(&[
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::zeros(),
            Vector3::new(1.0, 0.0, 0.0),
        ]);
        let uv = camera.project_batch(&bearings);
        assert_eq!(uv.ncols(), 3);
        assert!((uv[(0, 0)] - 1024.0).abs() < PROJECTION_TEST_TOLERANCE);
        assert!(uv[(0, 1)].is_nan() && uv[(1, 1)].is_nan());
        assert!((uv[(0, 2)] - 1536.0).abs() < PROJECTION_TEST_TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_pixel_index_bounds() -> TestResult {
        let camera = camera()?;
        assert_eq!(camera.pixel_index(&Vector2::new(0.0, 0.0)), Some((0, 0)));
        assert_eq!(
            camera.pixel_index(&Vector2::new(2047.99, 1023.5)),
            Some((1023, 2047))
        );
        assert_eq!(camera.pixel_index(&Vector2::new(2048.0, 10.0)), None);
        assert_eq!(camera.pixel_index(&Vector2::new(10.0, 1024.0)), None);
        assert_eq!(camera.pixel_index(&Vector2::new(-0.01, 10.0)), None);
        assert_eq!(camera.pixel_index(&Vector2::new(f64::NAN, 10.0)), None);
        Ok(())
    }
}
