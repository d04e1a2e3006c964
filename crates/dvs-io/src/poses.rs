use crate::{IoError, TimeOrigin, data_fields, parse_field, parse_lines, with_mapped_text};
use nalgebra::Vector3;
use std::fmt;
use std::path::Path;
use tracing::info;

/// Camera orientation at one instant.
///
/// The quaternion is stored as given in the file and is not required to be
/// unit length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    pub time: f64,
    pub qw: f64,
    pub qx: f64,
    pub qy: f64,
    pub qz: f64,
}

impl PoseSample {
    pub fn new(time: f64, qw: f64, qx: f64, qy: f64, qz: f64) -> Self {
        Self {
            time,
            qw,
            qx,
            qy,
            qz,
        }
    }

    /// Quaternion coefficients in `[w, x, y, z]` order.
    pub fn quaternion_wxyz(&self) -> [f64; 4] {
        [self.qw, self.qx, self.qy, self.qz]
    }
}

impl fmt::Display for PoseSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PoseSample [ t: {:.9}, q(wxyz): [{:.6}, {:.6}, {:.6}, {:.6}] ]",
            self.time, self.qw, self.qx, self.qy, self.qz
        )
    }
}

/// Loader for `sec nsec x y z qx qy qz qw` pose files.
///
/// Translation columns are read for validation and then ignored; only the
/// orientation is used by a rotation-only mosaic.
pub struct PoseLoader;

impl PoseLoader {
    pub fn load<P: AsRef<Path>>(path: P, origin: TimeOrigin) -> Result<Vec<PoseSample>, IoError> {
        let path = path.as_ref();
        let poses = with_mapped_text(path, |content| Self::parse_content(content, origin))?;
        info!(path = %path.display(), poses = poses.len(), "loaded trajectory");
        Ok(poses)
    }

    pub fn parse_content(content: &str, origin: TimeOrigin) -> Result<Vec<PoseSample>, IoError> {
        parse_lines(content, |line, line_num| Self::parse_line(line, line_num, origin))
    }

    fn parse_line(
        line: &str,
        line_num: usize,
        origin: TimeOrigin,
    ) -> Result<Option<PoseSample>, IoError> {
        let Some(parts) = data_fields(line) else {
            return Ok(None);
        };
        if parts.len() < 9 {
            return Err(IoError::MissingFields { line: line_num });
        }

        let sec = parse_field::<i64>(parts[0], line_num)?;
        let nsec = parse_field::<i64>(parts[1], line_num)?;
        for translation in &parts[2..5] {
            parse_field::<f64>(translation, line_num)?;
        }
        let qx = parse_field::<f64>(parts[5], line_num)?;
        let qy = parse_field::<f64>(parts[6], line_num)?;
        let qz = parse_field::<f64>(parts[7], line_num)?;
        let qw = parse_field::<f64>(parts[8], line_num)?;

        Ok(Some(PoseSample::new(
            origin.relative(sec, nsec),
            qw,
            qx,
            qy,
            qz,
        )))
    }
}

/// Loader for `sec nsec wx wy wz` gyroscope logs.
///
/// Angular velocities are in rad/s about the camera axes.
pub struct AngularVelocityLoader;

impl AngularVelocityLoader {
    pub fn load<P: AsRef<Path>>(
        path: P,
        origin: TimeOrigin,
    ) -> Result<Vec<(f64, Vector3<f64>)>, IoError> {
        let path = path.as_ref();
        let samples = with_mapped_text(path, |content| Self::parse_content(content, origin))?;
        info!(path = %path.display(), samples = samples.len(), "loaded angular velocities");
        Ok(samples)
    }

    pub fn parse_content(
        content: &str,
        origin: TimeOrigin,
    ) -> Result<Vec<(f64, Vector3<f64>)>, IoError> {
        parse_lines(content, |line, line_num| {
            let Some(parts) = data_fields(line) else {
                return Ok(None);
            };
            if parts.len() < 5 {
                return Err(IoError::MissingFields { line: line_num });
            }
            let sec = parse_field::<i64>(parts[0], line_num)?;
            let nsec = parse_field::<i64>(parts[1], line_num)?;
            let omega = Vector3::new(
                parse_field::<f64>(parts[2], line_num)?,
                parse_field::<f64>(parts[3], line_num)?,
                parse_field::<f64>(parts[4], line_num)?,
            );
            Ok(Some((origin.relative(sec, nsec), omega)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_poses() -> Result<(), IoError> {
        let content = "# sec nsec x y z qx qy qz qw\n\
                       10 0 0.0 0.0 0.0 0.0 0.0 0.0 1.0\n\
                       10 500000000 1.0 2.0 3.0 0.0 0.7071 0.0 0.7071\n";
        let poses = PoseLoader::parse_content(content, TimeOrigin::new(10, 0))?;
        assert_eq!(poses.len(), 2);
        assert_eq!(poses[0].quaternion_wxyz(), [1.0, 0.0, 0.0, 0.0]);
        assert!((poses[1].time - 0.5).abs() < 1e-12);
        assert_eq!(poses[1].quaternion_wxyz(), [0.7071, 0.0, 0.7071, 0.0]);
        Ok(())
    }

    #[test]
    fn test_pose_before_origin_is_negative() -> Result<(), IoError> {
        let poses = PoseLoader::parse_content(
            "9 900000000 0 0 0 0 0 0 1\n",
            TimeOrigin::new(10, 0),
        )?;
        assert!((poses[0].time + 0.1).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_error_handling() {
        let origin = TimeOrigin::default();
        let result = PoseLoader::parse_content("0 0 0 0 0 0 0 1\n", origin);
        assert!(matches!(result, Err(IoError::MissingFields { line: 1 })));

        let result = PoseLoader::parse_content("0 0 0 0 nan? 0 0 0 1\n", origin);
        assert!(matches!(result, Err(IoError::InvalidNumber { line: 1, .. })));
    }

    #[test]
    fn test_parse_angular_velocities() -> Result<(), IoError> {
        let content = "# sec nsec wx wy wz\n\
                       10 0 0.0 0.5 0.0\n\
                       10 250000000 0.1 0.5 -0.2\n";
        let samples = AngularVelocityLoader::parse_content(content, TimeOrigin::new(10, 0))?;
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], (0.0, Vector3::new(0.0, 0.5, 0.0)));
        assert!((samples[1].0 - 0.25).abs() < 1e-12);
        assert_eq!(samples[1].1, Vector3::new(0.1, 0.5, -0.2));

        let result = AngularVelocityLoader::parse_content("10 0 0.0 0.5\n", TimeOrigin::default());
        assert!(matches!(result, Err(IoError::MissingFields { line: 1 })));
        Ok(())
    }
}
