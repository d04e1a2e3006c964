//! Rotation algebra on the SO(3) manifold.
//!
//! This crate provides the rotation machinery used by the mosaicing pipeline:
//! - **SO(3)**: rotations stored as orthonormal 3×3 matrices
//! - **Axis-angle** conversions in both directions (Rodrigues formula and its inverse)
//! - **Quaternion** conversions with mandatory re-orthonormalization
//! - **Geodesic interpolation** between two rotations
//!
//! Lie group M,° | size | dim | X ∈ M | Constraint | T_E M        | Exp(T)        | Comp. | Action
//! ------------- | ---- | --- | ----- | ---------- | ------------ | ------------- | ----- | ------
//! Rotation      | 9    | 3   | R     | RᵀR = I    | [θ]x ∈ so(3) | R = exp([θ]x) | R₁R₂  | Rx
//!
//! The trait layout follows the [manif](https://github.com/artivis/manif) conventions:
//! a group element type implementing [`LieGroup`], a tangent type implementing
//! [`Tangent`], and [`Interpolatable`] for groups supporting geodesic blending.
//!
//! # Example
//!
//! ```
//! use dvs_manifolds::{Interpolatable, LieGroup, so3::SO3};
//! use nalgebra::Vector3;
//!
//! let start = SO3::identity();
//! let end = SO3::from_axis_angle(&Vector3::y(), std::f64::consts::FRAC_PI_2);
//! let halfway = start.interp(&end, 0.5);
//! assert!((halfway.distance(&start) - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
//! ```

use nalgebra::{Matrix3, Vector3};
use std::fmt::Debug;

pub mod quaternion;
pub mod so3;

pub use quaternion::{quaternion_to_euler, quaternion_to_rotation};
pub use so3::{SO3, SO3Tangent, axis_angle_to_rotation, rotation_to_axis_angle};

/// Half-width of the band around π where the rotation axis is recovered
/// from the quadratic Rodrigues term instead of the linear one.
pub const NEAR_PI_THRESHOLD: f64 = 1e-3;

/// Below this norm the linear Rodrigues term carries no axis information
/// and the axis falls back to +Z.
pub const ZERO_AXIS_THRESHOLD: f64 = 1e-8;

/// Axis magnitudes below this value are treated as the identity rotation.
pub const MIN_AXIS_NORM: f64 = 1e-6;

/// Squared quaternion norms below this value cannot describe a rotation.
pub const MIN_QUATERNION_NORM_SQUARED: f64 = 1e-12;

/// Failure of a rotation-algebra operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ManifoldError {
    /// An SVD or similar decomposition did not converge
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    /// Input that does not describe a rotation
    #[error("Invalid manifold element: {0}")]
    InvalidElement(String),
}

pub type ManifoldResult<T> = Result<T, ManifoldError>;

/// Group operations shared by rotation types.
///
/// `DIM` is the dimension of the space acted on, `DOF` the tangent dimension
/// and `REP_SIZE` the number of stored scalars (3, 3 and 9 for [`so3::SO3`]).
pub trait LieGroup: Clone + Debug + PartialEq {
    type TangentVector: Tangent<Self>;
    type LieAlgebra: Clone + Debug + PartialEq;

    const DIM: usize;
    const DOF: usize;
    const REP_SIZE: usize;

    fn identity() -> Self;

    /// g⁻¹, with g ∘ g⁻¹ = e.
    fn inverse(&self) -> Self;

    /// g₁ ∘ g₂: apply `other` first, then `self`.
    fn compose(&self, other: &Self) -> Self;

    /// Tangent vector whose exponential is `self`.
    fn log(&self) -> Self::TangentVector;

    /// Rotate a vector.
    fn act(&self, vector: &Vector3<f64>) -> Vector3<f64>;

    /// Random element, for tests and benches.
    fn random() -> Self;

    /// Snap a drifted element back onto the group.
    fn normalize(&mut self);

    /// Whether the element satisfies the group constraints within `tolerance`.
    fn is_valid(&self, tolerance: f64) -> bool;

    /// g₁⁻¹ ∘ g₂.
    fn between(&self, other: &Self) -> Self {
        self.inverse().compose(other)
    }

    /// g ∘ exp(φ).
    fn right_plus(&self, tangent: &Self::TangentVector) -> Self {
        self.compose(&tangent.exp())
    }

    /// log(other⁻¹ ∘ self).
    fn right_minus(&self, other: &Self) -> Self::TangentVector {
        other.between(self).log()
    }
}

/// Elements of the Lie algebra of `G`, in vector form.
pub trait Tangent<G: LieGroup>: Clone + Debug + PartialEq {
    const DIM: usize = G::DOF;

    fn exp(&self) -> G;

    /// Matrix form of the vector.
    fn hat(&self) -> G::LieAlgebra;

    fn zero() -> Self;

    /// Scale the tangent vector, i.e. move a fraction along the geodesic.
    fn scaled(&self, factor: f64) -> Self;

    fn is_zero(&self, tolerance: f64) -> bool;
}

/// Geodesic blending between two group elements.
pub trait Interpolatable: LieGroup {
    /// Point at fraction `t` of the geodesic from `self` to `other`.
    ///
    /// `t = 0` gives `self` and `t = 1` gives `other`. The path is
    /// g₁ ∘ exp(t · log(g₁⁻¹ ∘ g₂)), which stays on the manifold for every t.
    fn interp(&self, other: &Self, t: f64) -> Self {
        let increment = self.between(other).log().scaled(t);
        self.right_plus(&increment)
    }
}

/// Cross-product matrix: `skew_symmetric(v) * w == v.cross(&w)`.
///
/// ```text
/// [  0  -vz   vy ]
/// [ vz    0  -vx ]
/// [-vy   vx    0 ]
/// ```
#[inline]
pub fn skew_symmetric(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}
