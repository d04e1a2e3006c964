//! Text formats consumed and produced by the mosaicing pipeline.
//!
//! All inputs are whitespace-separated text; blank lines and lines starting
//! with `#` are ignored. Files are memory-mapped and, above
//! [`PARALLEL_PARSE_THRESHOLD`] lines, parsed in parallel with rayon.
//!
//! | Loader                    | Line format                           |
//! |---------------------------|---------------------------------------|
//! | [`EventLoader`]           | `sec nsec x y pol` (`pol` in {0, 1})  |
//! | [`PoseLoader`]            | `sec nsec x y z qx qy qz qw`          |
//! | [`AngularVelocityLoader`] | `sec nsec wx wy wz` (rad/s)           |
//! | [`CalibrationLoader`]     | `u v` per sensor pixel, column-major  |
//!
//! Event, pose and angular velocity times are converted to seconds relative to the first event
//! (see [`TimeOrigin`]).

use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub mod calibration;
pub mod events;
pub mod grid;
pub mod poses;

pub use calibration::CalibrationLoader;
pub use events::{Event, EventLoader, EventRecording, Polarity};
pub use grid::GridWriter;
pub use poses::{AngularVelocityLoader, PoseLoader, PoseSample};

/// Files with more lines than this are parsed in parallel.
pub const PARALLEL_PARSE_THRESHOLD: usize = 5000;

/// Errors that can occur while reading or writing data files
#[derive(Error, Debug)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid number format at line {line}: {value}")]
    InvalidNumber { line: usize, value: String },

    #[error("Missing required fields at line {line}")]
    MissingFields { line: usize },

    #[error("Invalid polarity at line {line}: {value} (expected 0 or 1)")]
    InvalidPolarity { line: usize, value: String },

    #[error("File contains no records: {0}")]
    Empty(String),

    #[error("Calibration error: {0}")]
    Calibration(#[from] dvs_camera_models::CameraModelError),
}

/// Timestamp of the first event, used as zero for every relative time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeOrigin {
    pub sec: i64,
    pub nsec: i64,
}

impl TimeOrigin {
    pub fn new(sec: i64, nsec: i64) -> Self {
        Self { sec, nsec }
    }

    /// Seconds elapsed since the origin: `(sec - sec₀) + 1e-9 · (nsec - nsec₀)`.
    #[inline]
    pub fn relative(&self, sec: i64, nsec: i64) -> f64 {
        (sec - self.sec) as f64 + 1e-9 * (nsec - self.nsec) as f64
    }
}

/// Memory-map a file and hand its UTF-8 contents to `parse`.
pub(crate) fn with_mapped_text<P, T, F>(path: P, parse: F) -> Result<T, IoError>
where
    P: AsRef<Path>,
    F: FnOnce(&str) -> Result<T, IoError>,
{
    let file = File::open(path)?;
    // SAFETY: the mapping is read-only and dropped before returning.
    let mmap = unsafe { Mmap::map(&file)? };
    let content = std::str::from_utf8(&mmap).map_err(|e| IoError::Parse {
        line: 0,
        message: format!("Invalid UTF-8: {e}"),
    })?;
    parse(content)
}

/// Fields of a data line, or `None` for blank lines and comments.
pub(crate) fn data_fields(line: &str) -> Option<Vec<&str>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(line.split_whitespace().collect())
}

/// Parse one field, reporting the line on failure.
pub(crate) fn parse_field<T: FromStr>(value: &str, line: usize) -> Result<T, IoError> {
    value.parse::<T>().map_err(|_| IoError::InvalidNumber {
        line,
        value: value.to_string(),
    })
}

/// Run `parse_line` over every line, in parallel for large inputs.
///
/// Line numbers passed to `parse_line` are 1-based. Skipped lines yield `None`
/// and are dropped; the output keeps file order.
pub(crate) fn parse_lines<T, F>(content: &str, parse_line: F) -> Result<Vec<T>, IoError>
where
    T: Send,
    F: Fn(&str, usize) -> Result<Option<T>, IoError> + Sync,
{
    use rayon::prelude::*;

    let lines: Vec<&str> = content.lines().collect();
    let parsed: Vec<Option<T>> = if lines.len() > PARALLEL_PARSE_THRESHOLD {
        lines
            .par_iter()
            .enumerate()
            .map(|(line_num, line)| parse_line(line, line_num + 1))
            .collect::<Result<_, _>>()?
    } else {
        lines
            .iter()
            .enumerate()
            .map(|(line_num, line)| parse_line(line, line_num + 1))
            .collect::<Result<_, _>>()?
    };
    Ok(parsed.into_iter().flatten().collect())
}
