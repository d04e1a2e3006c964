//! Panoramic gradient estimate and its per-pixel covariance.

use crate::config::MosaicConfig;
use crate::event_map::EventMap;
use crate::integration::IntegratorInput;
use nalgebra::{DMatrix, Matrix2, Vector2};

/// Filter state of one panorama pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelState {
    /// `(gx, gy)`
    pub gradient: Vector2<f64>,
    /// Symmetric 2×2 covariance of the gradient
    pub covariance: Matrix2<f64>,
}

impl PixelState {
    pub fn new(gradient: Vector2<f64>, covariance: Matrix2<f64>) -> Self {
        Self {
            gradient,
            covariance,
        }
    }

    /// Zero gradient with `variance · I` covariance.
    pub fn prior(variance: f64) -> Self {
        Self::new(Vector2::zeros(), Matrix2::identity() * variance)
    }
}

/// Gradient map and covariance as flat `height × width` arenas.
#[derive(Debug, Clone)]
pub struct GradientMap {
    width: usize,
    height: usize,
    gradients: Vec<Vector2<f64>>,
    covariances: Vec<Matrix2<f64>>,
}

impl GradientMap {
    pub fn new(width: usize, height: usize, initial_variance: f64) -> Self {
        let prior = PixelState::prior(initial_variance);
        Self {
            width,
            height,
            gradients: vec![prior.gradient; width * height],
            covariances: vec![prior.covariance; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Flat index of `(row, col)`, or `None` outside the map.
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.height && col < self.width).then(|| row * self.width + col)
    }

    pub fn state(&self, row: usize, col: usize) -> Option<PixelState> {
        self.index(row, col).map(|index| self.state_at(index))
    }

    /// State at a flat index obtained from [`GradientMap::index`].
    #[inline]
    pub(crate) fn state_at(&self, index: usize) -> PixelState {
        PixelState::new(self.gradients[index], self.covariances[index])
    }

    #[inline]
    pub(crate) fn store_at(&mut self, index: usize, state: PixelState) {
        self.gradients[index] = state.gradient;
        self.covariances[index] = state.covariance;
    }

    pub fn gradient_x(&self) -> DMatrix<f64> {
        self.channel(|index| self.gradients[index].x)
    }

    pub fn gradient_y(&self) -> DMatrix<f64> {
        self.channel(|index| self.gradients[index].y)
    }

    pub fn covariance_trace(&self) -> DMatrix<f64> {
        self.channel(|index| self.covariances[index].trace())
    }

    /// Both gradient channels with pixels whose covariance trace exceeds
    /// `trace_threshold` set to zero in both.
    pub fn integrator_input(&self, trace_threshold: f64) -> IntegratorInput {
        let confident = |index: usize| self.covariances[index].trace() <= trace_threshold;
        let gradient_x = self.channel(|i| if confident(i) { self.gradients[i].x } else { 0.0 });
        let gradient_y = self.channel(|i| if confident(i) { self.gradients[i].y } else { 0.0 });
        let masked_pixels = (0..self.gradients.len()).filter(|&i| !confident(i)).count();
        IntegratorInput {
            gradient_x,
            gradient_y,
            masked_pixels,
        }
    }

    fn channel<F: Fn(usize) -> f64>(&self, value: F) -> DMatrix<f64> {
        DMatrix::from_fn(self.height, self.width, |row, col| {
            value(row * self.width + col)
        })
    }
}

/// Everything the filter mutates during a run.
#[derive(Debug, Clone)]
pub struct ReconstructionState {
    pub event_map: EventMap,
    pub gradient_map: GradientMap,
}

impl ReconstructionState {
    pub fn new(config: &MosaicConfig) -> Self {
        Self {
            event_map: EventMap::new(config.sensor_width as usize, config.sensor_height as usize),
            gradient_map: GradientMap::new(
                config.output_width as usize,
                config.output_height as usize,
                config.initial_gradient_variance,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_map_prior() {
        let map = GradientMap::new(4, 2, 10.0);
        assert_eq!(map.state(1, 3), Some(PixelState::prior(10.0)));
        assert_eq!(map.state(2, 0), None);
        assert_eq!(map.state(0, 4), None);
        assert!(map.gradient_x().iter().all(|&v| v == 0.0));
        assert!(map.covariance_trace().iter().all(|&v| v == 20.0));
    }

    #[test]
    fn test_channels_are_row_major() {
        let mut map = GradientMap::new(3, 2, 1.0);
        let index = map.index(1, 2).expect("inside map");
        map.store_at(
            index,
            PixelState::new(Vector2::new(0.5, -0.25), Matrix2::identity() * 0.01),
        );
        let gx = map.gradient_x();
        let gy = map.gradient_y();
        assert_eq!((gx.nrows(), gx.ncols()), (2, 3));
        assert_eq!(gx[(1, 2)], 0.5);
        assert_eq!(gy[(1, 2)], -0.25);
        assert_eq!(gx[(0, 2)], 0.0);
        assert!((map.covariance_trace()[(1, 2)] - 0.02).abs() < 1e-15);
    }

    #[test]
    fn test_integrator_input_masks_both_channels() {
        let mut map = GradientMap::new(2, 1, 10.0);
        map.store_at(
            0,
            PixelState::new(Vector2::new(1.0, 2.0), Matrix2::identity() * 0.01),
        );
        map.store_at(
            1,
            PixelState::new(Vector2::new(3.0, 4.0), Matrix2::identity() * 0.5),
        );
        let input = map.integrator_input(0.05);
        assert_eq!(input.gradient_x[(0, 0)], 1.0);
        assert_eq!(input.gradient_y[(0, 0)], 2.0);
        assert_eq!(input.gradient_x[(0, 1)], 0.0);
        assert_eq!(input.gradient_y[(0, 1)], 0.0);
        assert_eq!(input.masked_pixels, 1);
    }

    #[test]
    fn test_reconstruction_state_dimensions() {
        let config = MosaicConfig::new().with_output_size(16, 8).with_sensor_size(4, 2);
        let state = ReconstructionState::new(&config);
        assert_eq!((state.gradient_map.width(), state.gradient_map.height()), (16, 8));
        assert_eq!((state.event_map.width(), state.event_map.height()), (4, 2));
    }
}
