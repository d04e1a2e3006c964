//! Camera orientations as elements of SO(3).
//!
//! SO(3) elements are stored as orthonormal 3×3 matrices; quaternions are
//! converted once on construction.
//!
//! Tangent vectors are scaled axes: unit axis times angle in radians.
//!
//! # Logarithm near the singularities
//!
//! | Angle range       | Axis source                                            |
//! |-------------------|--------------------------------------------------------|
//! | θ ≈ 0             | undefined, fixed to +Z                                 |
//! | generic           | linear term of Rodrigues: vee(R - Rᵀ)                  |
//! | \|θ - π\| < 1e-3  | dominant singular vector of ½(R + I), sign by residual |

use crate::{
    Interpolatable, LieGroup, MIN_AXIS_NORM, ManifoldError, ManifoldResult, NEAR_PI_THRESHOLD,
    Tangent, ZERO_AXIS_THRESHOLD, quaternion, skew_symmetric,
};
use nalgebra::{Matrix3, Vector3};
use std::f64::consts::PI;
use std::fmt::{self, Display, Formatter};

/// A 3D rotation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SO3 {
    /// Orthonormal rotation matrix with determinant +1
    matrix: Matrix3<f64>,
}

impl Display for SO3 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (axis, angle) = decompose(&self.matrix);
        write!(
            f,
            "SO3(axis: [{:.4}, {:.4}, {:.4}], angle: {:.4} rad)",
            axis.x, axis.y, axis.z, angle
        )
    }
}

impl SO3 {
    /// Create SO(3) from a rotation matrix.
    ///
    /// The matrix must be finite with a positive determinant. It is used as-is;
    /// call [`LieGroup::normalize`] to remove small orthonormality errors.
    pub fn from_matrix(matrix: Matrix3<f64>) -> ManifoldResult<Self> {
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(ManifoldError::InvalidElement(
                "rotation matrix contains non-finite entries".to_string(),
            ));
        }
        let det = matrix.determinant();
        if det <= 0.0 {
            return Err(ManifoldError::InvalidElement(format!(
                "rotation matrix must have a positive determinant, got {det:.6}"
            )));
        }
        Ok(SO3 { matrix })
    }

    /// Create SO(3) from quaternion coefficients in `[w, x, y, z]` order.
    ///
    /// Non-unit quaternions are accepted; the result is projected onto the
    /// nearest rotation matrix.
    pub fn from_quaternion_wxyz(w: f64, x: f64, y: f64, z: f64) -> ManifoldResult<Self> {
        let matrix = quaternion::quaternion_to_rotation(w, x, y, z)?;
        Ok(SO3 { matrix })
    }

    /// Create SO(3) from axis-angle representation (Rodrigues formula).
    pub fn from_axis_angle(axis: &Vector3<f64>, angle: f64) -> Self {
        SO3 {
            matrix: axis_angle_to_rotation(axis, angle),
        }
    }

    /// Rotation by `‖v‖` radians about `v`.
    pub fn from_scaled_axis(axis_angle: Vector3<f64>) -> Self {
        SO3Tangent::new(axis_angle).exp()
    }

    #[inline]
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Decompose into a unit axis and an angle in [0, π].
    pub fn to_axis_angle(&self) -> (Vector3<f64>, f64) {
        decompose(&self.matrix)
    }

    /// Geodesic distance: the rotation angle of g₁⁻¹ ∘ g₂.
    pub fn distance(&self, other: &Self) -> f64 {
        self.between(other).log().angle()
    }
}

impl LieGroup for SO3 {
    type TangentVector = SO3Tangent;
    type LieAlgebra = Matrix3<f64>;

    const DIM: usize = 3;
    const DOF: usize = 3;
    const REP_SIZE: usize = 9;

    fn identity() -> Self {
        SO3 {
            matrix: Matrix3::identity(),
        }
    }

    /// R⁻¹ = Rᵀ
    fn inverse(&self) -> Self {
        SO3 {
            matrix: self.matrix.transpose(),
        }
    }

    fn compose(&self, other: &Self) -> Self {
        SO3 {
            matrix: self.matrix * other.matrix,
        }
    }

    fn log(&self) -> SO3Tangent {
        let (axis, angle) = decompose(&self.matrix);
        SO3Tangent::new(axis * angle)
    }

    fn act(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.matrix * vector
    }

    fn random() -> Self {
        SO3::from_scaled_axis(Vector3::new(
            rand::random::<f64>() * 2.0 - 1.0,
            rand::random::<f64>() * 2.0 - 1.0,
            rand::random::<f64>() * 2.0 - 1.0,
        ))
    }

    fn normalize(&mut self) {
        if let Ok(projected) = quaternion::project_to_rotation(&self.matrix) {
            self.matrix = projected;
        }
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        let orthonormality = (self.matrix.transpose() * self.matrix - Matrix3::identity()).norm();
        orthonormality < tolerance && (self.matrix.determinant() - 1.0).abs() < tolerance
    }

    fn between(&self, other: &Self) -> Self {
        SO3 {
            matrix: self.matrix.transpose() * other.matrix,
        }
    }
}

impl Interpolatable for SO3 {}

/// Element of so(3) stored as the scaled axis [θx, θy, θz].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SO3Tangent {
    data: Vector3<f64>,
}

impl Display for SO3Tangent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "so3([{:.4}, {:.4}, {:.4}])",
            self.data.x, self.data.y, self.data.z
        )
    }
}

impl SO3Tangent {
    pub fn new(axis_angle: Vector3<f64>) -> Self {
        SO3Tangent { data: axis_angle }
    }

    pub fn axis_angle(&self) -> Vector3<f64> {
        self.data
    }

    /// Rotation angle in radians.
    pub fn angle(&self) -> f64 {
        self.data.norm()
    }

    /// Unit axis, or +Z for a zero vector.
    pub fn axis(&self) -> Vector3<f64> {
        let norm = self.data.norm();
        if norm < ZERO_AXIS_THRESHOLD {
            Vector3::z()
        } else {
            self.data / norm
        }
    }
}

impl Tangent<SO3> for SO3Tangent {
    fn exp(&self) -> SO3 {
        SO3 {
            matrix: axis_angle_to_rotation(&self.data, self.data.norm()),
        }
    }

    /// [θ]ₓ = [0 -θz θy; θz 0 -θx; -θy θx 0]
    fn hat(&self) -> Matrix3<f64> {
        skew_symmetric(&self.data)
    }

    fn zero() -> Self {
        SO3Tangent::new(Vector3::zeros())
    }

    fn scaled(&self, factor: f64) -> Self {
        SO3Tangent::new(self.data * factor)
    }

    fn is_zero(&self, tolerance: f64) -> bool {
        self.data.norm() < tolerance
    }
}

/// Convert a rotation matrix into a unit axis and an angle.
///
/// The input must have a positive determinant. The angle lies in [0, π];
/// for rotations close to the identity the axis is undetermined and +Z is
/// returned.
pub fn rotation_to_axis_angle(rotation: &Matrix3<f64>) -> ManifoldResult<(Vector3<f64>, f64)> {
    let det = rotation.determinant();
    if det.is_nan() || det <= 0.0 {
        return Err(ManifoldError::InvalidElement(format!(
            "input must be a 3D rotation matrix, determinant is {det:.6}"
        )));
    }
    Ok(decompose(rotation))
}

/// Rodrigues formula: R = I + [u]ₓ sin θ + [u]ₓ² (1 - cos θ).
///
/// The axis does not need to be unit length. Axes shorter than
/// [`MIN_AXIS_NORM`] yield the identity.
pub fn axis_angle_to_rotation(axis: &Vector3<f64>, angle: f64) -> Matrix3<f64> {
    let norm = axis.norm();
    if norm < MIN_AXIS_NORM {
        return Matrix3::identity();
    }
    let omega = skew_symmetric(&(axis / norm));
    Matrix3::identity() + omega * angle.sin() + omega * omega * (1.0 - angle.cos())
}

fn decompose(rotation: &Matrix3<f64>) -> (Vector3<f64>, f64) {
    // acos of a clamped cosine keeps the angle real when the trace drifts past ±1
    let cos_angle = ((rotation.trace() - 1.0) / 2.0).clamp(-1.0, 1.0);
    let angle = cos_angle.acos();

    if (angle - PI).abs() < NEAR_PI_THRESHOLD {
        if let Some(axis) = axis_near_pi(rotation, angle) {
            return (axis, angle);
        }
    }

    let linear = Vector3::new(
        rotation[(2, 1)] - rotation[(1, 2)],
        rotation[(0, 2)] - rotation[(2, 0)],
        rotation[(1, 0)] - rotation[(0, 1)],
    );
    let norm = linear.norm();
    if norm > ZERO_AXIS_THRESHOLD {
        (linear / norm, angle)
    } else {
        (Vector3::z(), angle)
    }
}

/// Near π the linear term vanishes; ½(R + I) ≈ uuᵀ is rank one and its
/// dominant singular vector is the axis up to sign.
fn axis_near_pi(rotation: &Matrix3<f64>, angle: f64) -> Option<Vector3<f64>> {
    let svd = (0.5 * (rotation + Matrix3::identity())).svd(true, false);
    let u = svd.u?;
    let axis: Vector3<f64> = u.column(svd.singular_values.imax()).into_owned();

    let residual_pos = (axis_angle_to_rotation(&axis, angle) - rotation).norm();
    let residual_neg = (axis_angle_to_rotation(&-axis, angle) - rotation).norm();
    if residual_pos > residual_neg {
        Some(-axis)
    } else {
        Some(axis)
    }
}
