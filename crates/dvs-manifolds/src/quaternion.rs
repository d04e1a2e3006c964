//! Quaternion conversions.
//!
//! Pose files store orientations as quaternions that are only approximately
//! unit length. Every conversion here ends with a projection onto SO(3) so the
//! resulting matrices are orthonormal to machine precision.

use crate::{MIN_QUATERNION_NORM_SQUARED, ManifoldError, ManifoldResult};
use nalgebra::{Matrix3, Vector3};
use std::f64::consts::FRAC_PI_2;

/// Convert quaternion coefficients `(w, x, y, z)` into a rotation matrix.
///
/// The closed-form matrix is evaluated on the coefficients as given, without
/// normalizing them first, and then projected onto the nearest rotation (see
/// [`project_to_rotation`]). For a unit quaternion the projection is a no-op.
///
/// # Errors
///
/// Returns [`ManifoldError::InvalidElement`] for zero-norm or non-finite input.
pub fn quaternion_to_rotation(w: f64, x: f64, y: f64, z: f64) -> ManifoldResult<Matrix3<f64>> {
    let norm_squared = w * w + x * x + y * y + z * z;
    if !norm_squared.is_finite() || norm_squared < MIN_QUATERNION_NORM_SQUARED {
        return Err(ManifoldError::InvalidElement(format!(
            "quaternion ({w}, {x}, {y}, {z}) cannot describe a rotation"
        )));
    }

    let (xx, yy, zz) = (2.0 * x * x, 2.0 * y * y, 2.0 * z * z);
    let (xy, xz, yz) = (2.0 * x * y, 2.0 * x * z, 2.0 * y * z);
    let (wx, wy, wz) = (2.0 * w * x, 2.0 * w * y, 2.0 * w * z);

    let rotation = Matrix3::new(
        1.0 - yy - zz,
        xy - wz,
        xz + wy,
        xy + wz,
        1.0 - xx - zz,
        yz - wx,
        xz - wy,
        yz + wx,
        1.0 - xx - yy,
    );

    project_to_rotation(&rotation)
}

/// Project a 3×3 matrix onto SO(3): `R = U · diag(1, 1, det(U Vᵀ)) · Vᵀ`.
///
/// The sign correction is applied along the smallest singular direction.
pub fn project_to_rotation(matrix: &Matrix3<f64>) -> ManifoldResult<Matrix3<f64>> {
    let svd = matrix.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(ManifoldError::NumericalInstability(
            "SVD failed while projecting onto SO(3)".to_string(),
        ));
    };

    let mut correction = Vector3::new(1.0, 1.0, 1.0);
    correction[svd.singular_values.imin()] = (u * v_t).determinant().signum();

    Ok(u * Matrix3::from_diagonal(&correction) * v_t)
}

/// Convert quaternion coefficients `(w, x, y, z)` into `(roll, pitch, yaw)`.
///
/// Angles follow the aerospace ZYX convention. At gimbal lock (`|sin p| ≥ 1`)
/// the pitch snaps to ±π/2, keeping the sign.
pub fn quaternion_to_euler(w: f64, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    let sinr_cosp = 2.0 * (w * x + y * z);
    let cosr_cosp = 1.0 - 2.0 * (x * x + y * y);
    let roll = sinr_cosp.atan2(cosr_cosp);

    let sinp = 2.0 * (w * y - z * x);
    let pitch = if sinp.abs() >= 1.0 {
        FRAC_PI_2.copysign(sinp)
    } else {
        sinp.asin()
    };

    let siny_cosp = 2.0 * (w * z + x * y);
    let cosy_cosp = 1.0 - 2.0 * (y * y + z * z);
    let yaw = siny_cosp.atan2(cosy_cosp);

    (roll, pitch, yaw)
}
