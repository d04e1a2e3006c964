//! Hand-off of the gradient map to an external Poisson-type integrator.
//!
//! No integrator ships with this crate; callers plug in their own
//! implementation of [`GradientIntegrator`] (Frankot–Chellappa, multigrid,
//! ...) and feed it the masked channels from
//! [`GradientMap::integrator_input`](crate::GradientMap::integrator_input).

use nalgebra::DMatrix;

/// Recovers a scalar field from its horizontal and vertical derivatives.
pub trait GradientIntegrator {
    /// Both inputs are `height × width`; the output has the same shape.
    fn integrate(&self, gradient_x: &DMatrix<f64>, gradient_y: &DMatrix<f64>) -> DMatrix<f64>;
}

/// Gradient channels ready for integration.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegratorInput {
    pub gradient_x: DMatrix<f64>,
    pub gradient_y: DMatrix<f64>,
    /// Pixels zeroed because their covariance trace was above the threshold
    pub masked_pixels: usize,
}

impl IntegratorInput {
    pub fn integrate_with<I: GradientIntegrator + ?Sized>(&self, integrator: &I) -> DMatrix<f64> {
        integrator.integrate(&self.gradient_x, &self.gradient_y)
    }
}
