//! Per-pixel Extended Kalman Filter on the scene gradient.
//!
//! Each panorama pixel carries an independent 2-state filter on
//! `g = (gx, gy)`. An event at map point `pm`, whose sensor pixel last fired
//! at `pm_prev` a time `dt` earlier, observes the gradient through the
//! apparent map velocity `v = (pm - pm_prev) / dt`:
//!
//! ```text
//! contrast:    H = v · dt · pol          ν = C    - H·g
//! event rate:  H = v / (C · pol)         ν = 1/dt - H·g
//!
//! S = H P Hᵀ + R        K = P Hᵀ / S
//! g ← g + K ν           P ← P - K (P H)ᵀ
//! ```
//!
//! The state is static between events, so there is no prediction step.

use crate::config::{MeasurementModel, MosaicConfig};
use crate::gradient_map::PixelState;
use nalgebra::{Matrix2, Vector2};
use std::fmt;

/// Added to `dt` before inverting it.
pub const EVENT_RATE_EPSILON: f64 = 1e-12;

/// Why an event produced no gradient update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateRejection {
    /// Sensor coordinates outside the calibrated sensor
    OutsideSensor,
    /// Batch time before the first pose
    NoRotation,
    /// Bearing could not be projected onto the panorama
    ProjectionFailed,
    /// First event at this sensor pixel with a known rotation
    WarmUp,
    /// Previous event at the same pixel is not strictly older
    NonPositiveDt,
    /// Current map point falls outside the panorama
    OutsideMap,
    /// Innovation covariance non-finite or not positive
    DegenerateInnovation,
    /// Update would store NaN or infinity
    NonFiniteState,
}

impl fmt::Display for UpdateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UpdateRejection::OutsideSensor => "outside sensor",
            UpdateRejection::NoRotation => "no rotation",
            UpdateRejection::ProjectionFailed => "projection failed",
            UpdateRejection::WarmUp => "warm-up",
            UpdateRejection::NonPositiveDt => "non-positive dt",
            UpdateRejection::OutsideMap => "outside map",
            UpdateRejection::DegenerateInnovation => "degenerate innovation",
            UpdateRejection::NonFiniteState => "non-finite state",
        };
        f.write_str(text)
    }
}

impl std::error::Error for UpdateRejection {}

/// What one event tells the filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventObservation {
    /// Current map point `pm`
    pub map_point: Vector2<f64>,
    /// Map point of the previous event at the same sensor pixel, if known
    pub previous_map_point: Option<Vector2<f64>>,
    /// Time since the previous event at the same sensor pixel
    pub dt: f64,
    /// -1.0 or +1.0
    pub polarity: f64,
}

/// Measurement model and noise shared by all pixel filters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientEkf {
    model: MeasurementModel,
    contrast_threshold: f64,
    measurement_variance: f64,
}

impl GradientEkf {
    pub fn new(model: MeasurementModel, contrast_threshold: f64, measurement_variance: f64) -> Self {
        Self {
            model,
            contrast_threshold,
            measurement_variance,
        }
    }

    pub fn from_config(config: &MosaicConfig) -> Self {
        Self::new(
            config.measurement_model,
            config.contrast_threshold,
            config.measurement_variance(),
        )
    }

    pub fn model(&self) -> MeasurementModel {
        self.model
    }

    /// Measurement Jacobian `H` and observed value `z` for one event.
    fn linearize(
        &self,
        velocity: Vector2<f64>,
        dt: f64,
        polarity: f64,
        event_rate: f64,
    ) -> (Vector2<f64>, f64) {
        match self.model {
            MeasurementModel::Contrast => (velocity * (dt * polarity), self.contrast_threshold),
            MeasurementModel::EventRate => {
                (velocity / (self.contrast_threshold * polarity), event_rate)
            }
        }
    }

    /// Run one EKF update and return the new pixel state.
    ///
    /// `state` is left untouched; the caller decides whether to store the result.
    pub fn update(
        &self,
        state: &PixelState,
        observation: &EventObservation,
    ) -> Result<PixelState, UpdateRejection> {
        let previous = observation
            .previous_map_point
            .ok_or(UpdateRejection::WarmUp)?;
        let dt = observation.dt;
        if dt.is_nan() || dt <= 0.0 {
            return Err(UpdateRejection::NonPositiveDt);
        }

        let event_rate = 1.0 / (dt + EVENT_RATE_EPSILON);
        let velocity = (observation.map_point - previous) * event_rate;
        let (h, measurement) = self.linearize(velocity, dt, observation.polarity, event_rate);

        let p = &state.covariance;
        let ph = p * h;
        let innovation_covariance = h.dot(&ph) + self.measurement_variance;
        if !innovation_covariance.is_finite() || innovation_covariance <= f64::EPSILON {
            return Err(UpdateRejection::DegenerateInnovation);
        }

        let innovation = measurement - h.dot(&state.gradient);
        let gain = ph / innovation_covariance;
        let gradient = state.gradient + gain * innovation;
        let covariance = symmetrize(&(p - gain * ph.transpose()));

        if gradient.iter().chain(covariance.iter()).any(|v| !v.is_finite()) {
            return Err(UpdateRejection::NonFiniteState);
        }
        Ok(PixelState::new(gradient, covariance))
    }
}

#[inline]
fn symmetrize(covariance: &Matrix2<f64>) -> Matrix2<f64> {
    let off_diagonal = 0.5 * (covariance[(0, 1)] + covariance[(1, 0)]);
    Matrix2::new(
        covariance[(0, 0)],
        off_diagonal,
        off_diagonal,
        covariance[(1, 1)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-10;

    fn contrast_filter() -> GradientEkf {
        GradientEkf::new(MeasurementModel::Contrast, 0.45, 0.17 * 0.17)
    }

    fn observation(dx: f64, dy: f64, dt: f64, polarity: f64) -> EventObservation {
        EventObservation {
            map_point: Vector2::new(100.0 + dx, 50.0 + dy),
            previous_map_point: Some(Vector2::new(100.0, 50.0)),
            dt,
            polarity,
        }
    }

    #[test]
    fn test_contrast_update_closed_form() -> Result<(), UpdateRejection> {
        let filter = contrast_filter();
        let prior = PixelState::prior(10.0);
        let updated = filter.update(&prior, &observation(2.0, 0.0, 0.1, 1.0))?;

        // H = Δp · rate · dt · pol
        let h = 2.0 * 0.1 / (0.1 + EVENT_RATE_EPSILON);
        let s = 10.0 * h * h + 0.17 * 0.17;
        let expected_gx = 10.0 * h * 0.45 / s;
        assert!((updated.gradient.x - expected_gx).abs() < TOLERANCE);
        assert!(updated.gradient.y.abs() < TOLERANCE);
        assert!((updated.covariance[(0, 0)] - (10.0 - 100.0 * h * h / s)).abs() < TOLERANCE);
        assert!((updated.covariance[(1, 1)] - 10.0).abs() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_polarity_flips_gradient_sign() -> Result<(), UpdateRejection> {
        let filter = contrast_filter();
        let prior = PixelState::prior(10.0);
        let positive = filter.update(&prior, &observation(1.0, 1.0, 0.05, 1.0))?;
        let negative = filter.update(&prior, &observation(1.0, 1.0, 0.05, -1.0))?;
        assert!((positive.gradient + negative.gradient).norm() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_event_rate_update_closed_form() -> Result<(), UpdateRejection> {
        let filter = GradientEkf::new(MeasurementModel::EventRate, 0.45, 1e4);
        let prior = PixelState::prior(10.0);
        let dt = 0.01;
        let updated = filter.update(&prior, &observation(0.0, 3.0, dt, -1.0))?;

        let rate = 1.0 / (dt + EVENT_RATE_EPSILON);
        let h = 3.0 * rate / (0.45 * -1.0);
        let s = 10.0 * h * h + 1e4;
        let expected_gy = 10.0 * h * rate / s;
        assert!(updated.gradient.x.abs() < TOLERANCE);
        assert!((updated.gradient.y - expected_gy).abs() < 1e-8);
        Ok(())
    }

    #[test]
    fn test_covariance_symmetric_and_trace_non_increasing() -> Result<(), UpdateRejection> {
        let filter = contrast_filter();
        let mut state = PixelState::prior(10.0);
        let mut trace = state.covariance.trace();
        for i in 0..50 {
            let angle = i as f64 * 0.37;
            let obs = observation(angle.cos() * 1.5, angle.sin() * 1.5, 0.02, 1.0);
            state = filter.update(&state, &obs)?;
            assert_eq!(state.covariance[(0, 1)], state.covariance[(1, 0)]);
            let next_trace = state.covariance.trace();
            assert!(next_trace <= trace + 1e-12);
            trace = next_trace;
        }
        assert!(trace < 1.0);
        Ok(())
    }

    #[test]
    fn test_rejections() {
        let filter = contrast_filter();
        let prior = PixelState::prior(10.0);

        let mut warm_up = observation(1.0, 0.0, 0.1, 1.0);
        warm_up.previous_map_point = None;
        assert_eq!(filter.update(&prior, &warm_up), Err(UpdateRejection::WarmUp));

        assert_eq!(
            filter.update(&prior, &observation(1.0, 0.0, 0.0, 1.0)),
            Err(UpdateRejection::NonPositiveDt)
        );
        assert_eq!(
            filter.update(&prior, &observation(1.0, 0.0, f64::NAN, 1.0)),
            Err(UpdateRejection::NonPositiveDt)
        );
    }

    #[test]
    fn test_degenerate_innovation() {
        // zero motion with a tiny measurement variance leaves S ≈ 0
        let filter = GradientEkf::new(MeasurementModel::Contrast, 0.45, 1e-20);
        let prior = PixelState::prior(10.0);
        assert_eq!(
            filter.update(&prior, &observation(0.0, 0.0, 0.1, 1.0)),
            Err(UpdateRejection::DegenerateInnovation)
        );
    }

    #[test]
    fn test_non_finite_state_not_returned() {
        let filter = contrast_filter();
        let prior = PixelState::new(Vector2::new(f64::INFINITY, 0.0), Matrix2::identity());
        assert_eq!(
            filter.update(&prior, &observation(1.0, 0.0, 0.1, 1.0)),
            Err(UpdateRejection::NonFiniteState)
        );
    }
}
