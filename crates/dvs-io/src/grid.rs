use crate::IoError;
use nalgebra::DMatrix;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Writes a matrix as plain text, one row per line, values separated by spaces.
pub struct GridWriter;

impl GridWriter {
    pub fn write<P: AsRef<Path>>(path: P, grid: &DMatrix<f64>) -> Result<(), IoError> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        Self::write_to(&mut writer, grid)?;
        writer.flush()?;
        debug!(
            path = %path.display(),
            rows = grid.nrows(),
            cols = grid.ncols(),
            "wrote grid"
        );
        Ok(())
    }

    pub fn write_to<W: Write>(writer: &mut W, grid: &DMatrix<f64>) -> Result<(), IoError> {
        for row in grid.row_iter() {
            let mut first = true;
            for value in row.iter() {
                if !first {
                    writer.write_all(b" ")?;
                }
                write!(writer, "{value:e}")?;
                first = false;
            }
            writer.write_all(b"\n")?;
        }
        Ok(())
    }
}
