//! Reconstruction parameters.
//!
//! # Example
//!
//! ```
//! use dvs_mosaic::{MeasurementModel, MosaicConfig};
//!
//! let config = MosaicConfig::new()
//!     .with_batch_size(500)
//!     .with_measurement_model(MeasurementModel::EventRate)
//!     .with_output_size(1024, 512);
//! assert!(config.validate().is_ok());
//! assert_eq!(config.measurement_variance(), 100.0 * 100.0);
//! ```

use dvs_camera_models::Resolution;
use std::fmt;
use thiserror::Error;

/// Errors raised by [`MosaicConfig::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be greater than zero")]
    NotPositive { name: &'static str },

    #[error("{name} must be a finite positive number, got {value}")]
    InvalidValue { name: &'static str, value: f64 },
}

/// How an event constrains the gradient at its map point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeasurementModel {
    /// Brightness change over the elapsed time equals the contrast threshold:
    /// `h(g) = g · v · dt · pol`, observed value `C`.
    #[default]
    Contrast,
    /// Event rate equals the temporal brightness change divided by `C`:
    /// `h(g) = g · v / (C · pol)`, observed value `1 / dt`.
    EventRate,
}

impl MeasurementModel {
    /// Measurement noise variance used when none is given explicitly.
    ///
    /// Contrast: `0.17²` in units of C². Event rate: `100²` in 1/s².
    pub fn default_measurement_variance(self) -> f64 {
        match self {
            MeasurementModel::Contrast => 0.17 * 0.17,
            MeasurementModel::EventRate => 100.0 * 100.0,
        }
    }
}

impl fmt::Display for MeasurementModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementModel::Contrast => write!(f, "contrast"),
            MeasurementModel::EventRate => write!(f, "event-rate"),
        }
    }
}

/// Configuration for [`BatchProcessor`](crate::BatchProcessor).
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicConfig {
    /// Events per batch; all events of a batch share one rotation
    pub batch_size: usize,
    pub measurement_model: MeasurementModel,
    /// Contrast threshold C (log-intensity units)
    pub contrast_threshold: f64,
    /// Explicit measurement noise variance var_R; `None` uses the model default
    pub measurement_variance: Option<f64>,
    /// Initial diagonal of every pixel covariance
    pub initial_gradient_variance: f64,
    pub output_width: u32,
    pub output_height: u32,
    pub sensor_width: u32,
    pub sensor_height: u32,
    /// Pixels whose covariance trace exceeds this are zeroed before integration
    pub trace_threshold: f64,
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            batch_size: 3000,
            measurement_model: MeasurementModel::default(),
            contrast_threshold: 0.45,
            measurement_variance: None,
            initial_gradient_variance: 10.0,
            output_width: 2048,
            output_height: 1024,
            sensor_width: 128,
            sensor_height: 128,
            trace_threshold: 0.05,
        }
    }
}

impl MosaicConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Select the measurement model.
    ///
    /// An explicit [`with_measurement_variance`](Self::with_measurement_variance)
    /// is kept whichever order the two are called in.
    pub fn with_measurement_model(mut self, model: MeasurementModel) -> Self {
        self.measurement_model = model;
        self
    }

    pub fn with_contrast_threshold(mut self, contrast_threshold: f64) -> Self {
        self.contrast_threshold = contrast_threshold;
        self
    }

    pub fn with_measurement_variance(mut self, variance: f64) -> Self {
        self.measurement_variance = Some(variance);
        self
    }

    /// Effective var_R: the explicit value if set, otherwise the model default.
    pub fn measurement_variance(&self) -> f64 {
        self.measurement_variance
            .unwrap_or_else(|| self.measurement_model.default_measurement_variance())
    }

    pub fn with_initial_gradient_variance(mut self, variance: f64) -> Self {
        self.initial_gradient_variance = variance;
        self
    }

    pub fn with_output_size(mut self, width: u32, height: u32) -> Self {
        self.output_width = width;
        self.output_height = height;
        self
    }

    pub fn with_sensor_size(mut self, width: u32, height: u32) -> Self {
        self.sensor_width = width;
        self.sensor_height = height;
        self
    }

    pub fn with_trace_threshold(mut self, threshold: f64) -> Self {
        self.trace_threshold = threshold;
        self
    }

    pub fn output_resolution(&self) -> Resolution {
        Resolution {
            width: self.output_width,
            height: self.output_height,
        }
    }

    pub fn sensor_resolution(&self) -> Resolution {
        Resolution {
            width: self.sensor_width,
            height: self.sensor_height,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let counts = [
            ("batch_size", self.batch_size),
            ("output_width", self.output_width as usize),
            ("output_height", self.output_height as usize),
            ("sensor_width", self.sensor_width as usize),
            ("sensor_height", self.sensor_height as usize),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(ConfigError::NotPositive { name });
            }
        }

        let reals = [
            ("contrast_threshold", self.contrast_threshold),
            ("measurement_variance", self.measurement_variance()),
            ("initial_gradient_variance", self.initial_gradient_variance),
            ("trace_threshold", self.trace_threshold),
        ];
        for (name, value) in reals {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidValue { name, value });
            }
        }
        Ok(())
    }
}

impl fmt::Display for MosaicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mosaic configuration:")?;
        writeln!(f, "  batch size:          {}", self.batch_size)?;
        writeln!(f, "  measurement model:   {}", self.measurement_model)?;
        writeln!(f, "  contrast threshold:  {}", self.contrast_threshold)?;
        writeln!(f, "  measurement var:     {:e}", self.measurement_variance())?;
        writeln!(f, "  initial grad var:    {}", self.initial_gradient_variance)?;
        writeln!(
            f,
            "  panorama:            {}x{}",
            self.output_width, self.output_height
        )?;
        writeln!(
            f,
            "  sensor:              {}x{}",
            self.sensor_width, self.sensor_height
        )?;
        write!(f, "  trace threshold:     {}", self.trace_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MosaicConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_size, 3000);
        assert_eq!(config.measurement_model, MeasurementModel::Contrast);
        assert!((config.measurement_variance() - 0.0289).abs() < 1e-12);
        assert_eq!(config.output_resolution(), Resolution { width: 2048, height: 1024 });
    }

    #[test]
    fn test_model_sets_default_variance() {
        let config = MosaicConfig::new().with_measurement_model(MeasurementModel::EventRate);
        assert_eq!(config.measurement_variance(), 1e4);
        assert_eq!(config.measurement_variance, None);

        let config = config.with_measurement_model(MeasurementModel::Contrast);
        assert!((config.measurement_variance() - 0.0289).abs() < 1e-12);
    }

    #[test]
    fn test_explicit_variance_survives_model_change() {
        let model_first = MosaicConfig::new()
            .with_measurement_model(MeasurementModel::EventRate)
            .with_measurement_variance(2.0);
        let variance_first = MosaicConfig::new()
            .with_measurement_variance(2.0)
            .with_measurement_model(MeasurementModel::EventRate);
        assert_eq!(model_first.measurement_variance(), 2.0);
        assert_eq!(variance_first.measurement_variance(), 2.0);
        assert_eq!(model_first, variance_first);
    }

    #[test]
    fn test_validate_rejects_bad_explicit_variance() {
        let config = MosaicConfig::new().with_measurement_variance(0.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                name: "measurement_variance",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let config = MosaicConfig::new().with_batch_size(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotPositive { name: "batch_size" })
        );

        let config = MosaicConfig::new().with_sensor_size(128, 0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotPositive {
                name: "sensor_height"
            })
        );
    }

    #[test]
    fn test_validate_rejects_bad_reals() {
        let config = MosaicConfig::new().with_contrast_threshold(-0.1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                name: "contrast_threshold",
                ..
            })
        ));

        let config = MosaicConfig::new().with_trace_threshold(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_display_mentions_model() {
        let text = MosaicConfig::new()
            .with_measurement_model(MeasurementModel::EventRate)
            .to_string();
        assert!(text.contains("event-rate"));
        assert!(text.contains("2048x1024"));
    }
}
