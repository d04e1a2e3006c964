//! Load → reconstruct → write, through real files.

use dvs_mosaic::dvs_io::{CalibrationLoader, EventLoader, GridWriter, PoseLoader};
use dvs_mosaic::{BatchProcessor, MosaicConfig, TerminationReason, Trajectory};
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn write_lines(lines: &[String]) -> Result<NamedTempFile, std::io::Error> {
    let mut file = NamedTempFile::new()?;
    for line in lines {
        writeln!(file, "{line}")?;
    }
    Ok(file)
}

#[test]
fn test_reconstruct_from_files() -> TestResult {
    let events = write_lines(&[
        "# sec nsec x y pol".to_string(),
        "100 0 1 1 1".to_string(),
        "100 500000000 1 1 1".to_string(),
    ])?;
    // 90° about +Y over one second
    let half = std::f64::consts::FRAC_PI_4;
    let poses = write_lines(&[
        "100 0 0.0 0.0 0.0 0.0 0.0 0.0 1.0".to_string(),
        format!("101 0 0.0 0.0 0.0 0.0 {} 0.0 {}", half.sin(), half.cos()),
    ])?;
    // 3x3 pinhole, focal 100, column-major
    let mut calibration_lines = Vec::new();
    for x in 0..3 {
        for y in 0..3 {
            calibration_lines.push(format!("{} {}", (x as f64 - 1.0) / 100.0, (y as f64 - 1.0) / 100.0));
        }
    }
    let calibration = write_lines(&calibration_lines)?;

    let config = MosaicConfig::new()
        .with_batch_size(1)
        .with_output_size(102, 51)
        .with_sensor_size(3, 3);
    let recording = EventLoader::load(events.path())?;
    let trajectory = Trajectory::from_poses(&PoseLoader::load(poses.path(), recording.origin)?)?;
    let bearings = CalibrationLoader::load(calibration.path(), config.sensor_resolution())?;
    assert_eq!(trajectory.time_range(), (0.0, 1.0));

    let mut processor = BatchProcessor::new(config)?;
    let mut state = processor.initial_state();
    let summary = processor.process(&recording.events, &trajectory, &bearings, &mut state)?;
    assert_eq!(summary.termination, TerminationReason::StreamExhausted);
    assert_eq!(summary.events_updated, 1);

    let updated = state.gradient_map.state(25, 63).ok_or("outside map")?;
    assert!(updated.gradient.x > 0.0);
    assert!(updated.covariance[(0, 0)] < 1.0);

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("gradient_x.txt");
    GridWriter::write(&path, &state.gradient_map.gradient_x())?;
    let text = fs::read_to_string(&path)?;
    let rows: Vec<&str> = text.lines().collect();
    assert_eq!(rows.len(), 51);
    assert!(rows.iter().all(|row| row.split_whitespace().count() == 102));
    let written: f64 = rows[25]
        .split_whitespace()
        .nth(63)
        .ok_or("short row")?
        .parse()?;
    assert!((written - updated.gradient.x).abs() <= 1e-12 * updated.gradient.x.abs());

    // the y variance is untouched by a horizontal move, so nothing passes the mask
    let input = state.gradient_map.integrator_input(0.05);
    assert_eq!(input.masked_pixels, 102 * 51);
    Ok(())
}
