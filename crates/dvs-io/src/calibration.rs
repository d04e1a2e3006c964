use crate::{IoError, data_fields, parse_field, parse_lines, with_mapped_text};
use dvs_camera_models::{BearingGrid, Resolution};
use nalgebra::Vector2;
use std::path::Path;
use tracing::info;

/// Loader for undistorted-pixel calibration tables.
///
/// Each line holds the normalized coordinates `u v` of one sensor pixel,
/// ordered column by column (`index = x * height + y`).
pub struct CalibrationLoader;

impl CalibrationLoader {
    pub fn load<P: AsRef<Path>>(path: P, sensor: Resolution) -> Result<BearingGrid, IoError> {
        let path = path.as_ref();
        let grid = with_mapped_text(path, |content| Self::parse_content(content, sensor))?;
        info!(
            path = %path.display(),
            width = sensor.width,
            height = sensor.height,
            "loaded sensor calibration"
        );
        Ok(grid)
    }

    pub fn parse_content(content: &str, sensor: Resolution) -> Result<BearingGrid, IoError> {
        let entries = parse_lines(content, Self::parse_line)?;
        Ok(BearingGrid::from_column_major(sensor, entries)?)
    }

    fn parse_line(line: &str, line_num: usize) -> Result<Option<Vector2<f64>>, IoError> {
        let Some(parts) = data_fields(line) else {
            return Ok(None);
        };
        if parts.len() < 2 {
            return Err(IoError::MissingFields { line: line_num });
        }
        let u = parse_field::<f64>(parts[0], line_num)?;
        let v = parse_field::<f64>(parts[1], line_num)?;
        Ok(Some(Vector2::new(u, v)))
    }
}
