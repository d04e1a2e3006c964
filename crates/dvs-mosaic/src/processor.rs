//! Batch-synchronous event processing.
//!
//! Events are consumed in fixed-size batches. All events of a batch share the
//! camera rotation interpolated at the batch mid-time. For every event the
//! processor
//!
//! 1. swaps the sensor pixel's [`EventMapEntry`] for the current time and
//!    rotation, in event order,
//! 2. projects the pixel bearing under the current and the cached rotation
//!    into the panorama,
//! 3. runs the [`GradientEkf`] on the panorama pixel it lands in.
//!
//! Step 3 runs in parallel over the batch against the gradient map as it was
//! when the batch started. The results are written back in event order, so
//! when two events of a batch hit the same panorama pixel the later one wins.
//!
//! Processing stops when fewer than `batch_size` events remain or when a
//! batch mid-time lies after the last pose.

use crate::config::MosaicConfig;
use crate::ekf::{EventObservation, GradientEkf, UpdateRejection};
use crate::error::{MosaicError, MosaicResult};
use crate::event_map::EventMapEntry;
use crate::gradient_map::{GradientMap, PixelState, ReconstructionState};
use crate::observers::{BatchObserver, BatchObserverVec};
use crate::trajectory::Trajectory;
use dvs_camera_models::{BearingGrid, EquirectangularCamera, SphericalCamera};
use dvs_io::{Event, Polarity};
use dvs_manifolds::{LieGroup, so3::SO3};
use nalgebra::Vector3;
use rayon::prelude::*;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Why processing stopped. Both are normal terminations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Fewer than `batch_size` events left
    StreamExhausted,
    /// The next batch mid-time is after the last pose
    TrajectoryExhausted,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::StreamExhausted => write!(f, "event stream exhausted"),
            TerminationReason::TrajectoryExhausted => write!(f, "trajectory exhausted"),
        }
    }
}

/// Number of events dropped for each [`UpdateRejection`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipCounts {
    pub outside_sensor: usize,
    pub no_rotation: usize,
    pub projection_failed: usize,
    pub warm_up: usize,
    pub non_positive_dt: usize,
    pub outside_map: usize,
    pub degenerate_innovation: usize,
    pub non_finite_state: usize,
}

impl SkipCounts {
    pub fn record(&mut self, reason: UpdateRejection) {
        *self.slot(reason) += 1;
    }

    pub fn get(&self, reason: UpdateRejection) -> usize {
        match reason {
            UpdateRejection::OutsideSensor => self.outside_sensor,
            UpdateRejection::NoRotation => self.no_rotation,
            UpdateRejection::ProjectionFailed => self.projection_failed,
            UpdateRejection::WarmUp => self.warm_up,
            UpdateRejection::NonPositiveDt => self.non_positive_dt,
            UpdateRejection::OutsideMap => self.outside_map,
            UpdateRejection::DegenerateInnovation => self.degenerate_innovation,
            UpdateRejection::NonFiniteState => self.non_finite_state,
        }
    }

    pub fn total(&self) -> usize {
        Self::REASONS.iter().map(|&reason| self.get(reason)).sum()
    }

    pub fn merge(&mut self, other: &SkipCounts) {
        for reason in Self::REASONS {
            *self.slot(reason) += other.get(reason);
        }
    }

    const REASONS: [UpdateRejection; 8] = [
        UpdateRejection::OutsideSensor,
        UpdateRejection::NoRotation,
        UpdateRejection::ProjectionFailed,
        UpdateRejection::WarmUp,
        UpdateRejection::NonPositiveDt,
        UpdateRejection::OutsideMap,
        UpdateRejection::DegenerateInnovation,
        UpdateRejection::NonFiniteState,
    ];

    fn slot(&mut self, reason: UpdateRejection) -> &mut usize {
        match reason {
            UpdateRejection::OutsideSensor => &mut self.outside_sensor,
            UpdateRejection::NoRotation => &mut self.no_rotation,
            UpdateRejection::ProjectionFailed => &mut self.projection_failed,
            UpdateRejection::WarmUp => &mut self.warm_up,
            UpdateRejection::NonPositiveDt => &mut self.non_positive_dt,
            UpdateRejection::OutsideMap => &mut self.outside_map,
            UpdateRejection::DegenerateInnovation => &mut self.degenerate_innovation,
            UpdateRejection::NonFiniteState => &mut self.non_finite_state,
        }
    }
}

impl fmt::Display for SkipCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for reason in Self::REASONS {
            let count = self.get(reason);
            if count == 0 {
                continue;
            }
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{reason}: {count}")?;
            first = false;
        }
        if first {
            write!(f, "none")?;
        }
        Ok(())
    }
}

/// What happened in one batch, handed to observers.
#[derive(Debug, Clone)]
pub struct BatchReport<'a> {
    pub index: usize,
    pub events: &'a [Event],
    pub positive: usize,
    pub negative: usize,
    /// Mid-time of the batch, where the trajectory was queried
    pub representative_time: f64,
    /// Camera rotation used for the batch; `None` before the first pose
    pub rotation: Option<SO3>,
    pub updated: usize,
    pub skipped: SkipCounts,
}

impl<'a> BatchReport<'a> {
    pub fn positive_events(&self) -> impl Iterator<Item = &'a Event> + 'a {
        let events: &'a [Event] = self.events;
        events
            .iter()
            .filter(|event| event.polarity == Polarity::Positive)
    }

    pub fn negative_events(&self) -> impl Iterator<Item = &'a Event> + 'a {
        let events: &'a [Event] = self.events;
        events
            .iter()
            .filter(|event| event.polarity == Polarity::Negative)
    }
}

/// Outcome of [`BatchProcessor::process`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingSummary {
    pub batches: usize,
    pub events_processed: usize,
    pub events_updated: usize,
    pub skipped: SkipCounts,
    pub termination: TerminationReason,
    /// Events never looked at: the partial tail, or everything from the first
    /// batch past the trajectory end
    pub unprocessed_events: usize,
    pub elapsed: Duration,
}

impl fmt::Display for ProcessingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Reconstruction summary:")?;
        writeln!(f, "  stopped:            {}", self.termination)?;
        writeln!(f, "  batches:            {}", self.batches)?;
        writeln!(f, "  events processed:   {}", self.events_processed)?;
        writeln!(f, "  gradient updates:   {}", self.events_updated)?;
        writeln!(f, "  skipped:            {}", self.skipped)?;
        writeln!(f, "  unprocessed events: {}", self.unprocessed_events)?;
        write!(f, "  elapsed:            {:.3?}", self.elapsed)
    }
}

/// Drives the reconstruction over an event stream.
#[derive(Debug)]
pub struct BatchProcessor {
    config: MosaicConfig,
    ekf: GradientEkf,
    camera: EquirectangularCamera,
    observers: BatchObserverVec,
}

impl BatchProcessor {
    pub fn new(config: MosaicConfig) -> MosaicResult<Self> {
        config.validate()?;
        Ok(Self {
            ekf: GradientEkf::from_config(&config),
            camera: EquirectangularCamera::new(config.output_resolution()),
            config,
            observers: BatchObserverVec::new(),
        })
    }

    pub fn config(&self) -> &MosaicConfig {
        &self.config
    }

    pub fn add_observer(&mut self, observer: impl BatchObserver + 'static) {
        self.observers.add(observer);
    }

    /// Fresh state sized for this configuration.
    pub fn initial_state(&self) -> ReconstructionState {
        ReconstructionState::new(&self.config)
    }

    /// Consume `events` batch by batch, updating `state` in place.
    ///
    /// The panorama is centred on the first pose of `trajectory`.
    pub fn process(
        &mut self,
        events: &[Event],
        trajectory: &Trajectory,
        bearings: &BearingGrid,
        state: &mut ReconstructionState,
    ) -> MosaicResult<ProcessingSummary> {
        self.check_inputs(bearings, state)?;

        let start = Instant::now();
        let batch_size = self.config.batch_size;
        let (_, last_pose_time) = trajectory.time_range();
        let reference = trajectory.first_rotation().inverse();
        info!(
            events = events.len(),
            batch_size,
            model = %self.config.measurement_model,
            "starting reconstruction"
        );

        let mut termination = TerminationReason::StreamExhausted;
        let mut batches = 0;
        let mut events_updated = 0;
        let mut skipped = SkipCounts::default();

        for (index, batch) in events.chunks_exact(batch_size).enumerate() {
            let representative_time = 0.5 * (batch[0].time + batch[batch.len() - 1].time);
            if representative_time > last_pose_time {
                termination = TerminationReason::TrajectoryExhausted;
                info!(
                    batch = index,
                    time = representative_time,
                    last_pose_time,
                    "batch is past the last pose, stopping"
                );
                break;
            }

            let rotation = trajectory.query(representative_time);
            if rotation.is_none() {
                debug!(
                    batch = index,
                    time = representative_time,
                    "batch precedes the first pose, recording event times only"
                );
            }

            let (updated, batch_skipped) =
                self.process_batch(batch, rotation.as_ref(), &reference, bearings, state);

            let positive = batch
                .iter()
                .filter(|event| event.polarity == Polarity::Positive)
                .count();
            let report = BatchReport {
                index,
                events: batch,
                positive,
                negative: batch.len() - positive,
                representative_time,
                rotation,
                updated,
                skipped: batch_skipped,
            };
            debug!(
                batch = index,
                time = representative_time,
                updated,
                skipped = batch_skipped.total(),
                "processed batch"
            );
            self.observers.notify_batch(&report, state);

            batches += 1;
            events_updated += updated;
            skipped.merge(&batch_skipped);
        }

        let events_processed = batches * batch_size;
        let summary = ProcessingSummary {
            batches,
            events_processed,
            events_updated,
            skipped,
            termination,
            unprocessed_events: events.len() - events_processed,
            elapsed: start.elapsed(),
        };
        info!(
            batches,
            events_updated,
            unprocessed = summary.unprocessed_events,
            "reconstruction stopped: {termination}"
        );
        if skipped.outside_sensor > 0 {
            warn!(
                events = skipped.outside_sensor,
                width = self.config.sensor_width,
                height = self.config.sensor_height,
                "events outside the calibrated sensor were skipped"
            );
        }
        self.observers.notify_complete(state, &summary);
        Ok(summary)
    }

    fn check_inputs(
        &self,
        bearings: &BearingGrid,
        state: &ReconstructionState,
    ) -> MosaicResult<()> {
        let sensor = self.config.sensor_resolution();
        if bearings.resolution() != sensor {
            return Err(MosaicError::InvalidInput(format!(
                "calibration covers a {}x{} sensor, configuration expects {}x{}",
                bearings.resolution().width,
                bearings.resolution().height,
                sensor.width,
                sensor.height
            )));
        }

        let map = &state.gradient_map;
        if (map.width(), map.height())
            != (self.config.output_width as usize, self.config.output_height as usize)
        {
            return Err(MosaicError::InvalidInput(format!(
                "gradient map is {}x{}, configuration expects {}x{}",
                map.width(),
                map.height(),
                self.config.output_width,
                self.config.output_height
            )));
        }

        let cache = &state.event_map;
        if (cache.width(), cache.height()) != (sensor.width as usize, sensor.height as usize) {
            return Err(MosaicError::InvalidInput(format!(
                "event map is {}x{}, configuration expects {}x{}",
                cache.width(),
                cache.height(),
                sensor.width,
                sensor.height
            )));
        }
        Ok(())
    }

    fn process_batch(
        &self,
        batch: &[Event],
        rotation: Option<&SO3>,
        reference: &SO3,
        bearings: &BearingGrid,
        state: &mut ReconstructionState,
    ) -> (usize, SkipCounts) {
        let mut skipped = SkipCounts::default();
        let map_rotation = rotation.map(|rotation| reference.compose(rotation));

        // cache swaps are order dependent and stay sequential
        let mut candidates: Vec<(usize, EventObservation)> = Vec::with_capacity(batch.len());
        for event in batch {
            let (x, y) = (event.x as usize, event.y as usize);
            let Some(bearing) = bearings.bearing(x, y) else {
                skipped.record(UpdateRejection::OutsideSensor);
                continue;
            };
            let Ok(previous) = state
                .event_map
                .replace(x, y, event.time, rotation.copied())
            else {
                skipped.record(UpdateRejection::OutsideSensor);
                continue;
            };
            let Some(map_rotation) = map_rotation.as_ref() else {
                skipped.record(UpdateRejection::NoRotation);
                continue;
            };

            match self.observe(
                event,
                &bearing,
                map_rotation,
                &previous,
                reference,
                &state.gradient_map,
            ) {
                Ok(candidate) => candidates.push(candidate),
                Err(reason) => skipped.record(reason),
            }
        }

        let snapshot = &state.gradient_map;
        let ekf = &self.ekf;
        let results: Vec<Result<PixelState, UpdateRejection>> = candidates
            .par_iter()
            .map(|(index, observation)| ekf.update(&snapshot.state_at(*index), observation))
            .collect();

        let mut updated = 0;
        for ((index, _), result) in candidates.iter().zip(results) {
            match result {
                Ok(pixel) => {
                    state.gradient_map.store_at(*index, pixel);
                    updated += 1;
                }
                Err(reason) => skipped.record(reason),
            }
        }
        (updated, skipped)
    }

    /// Project one event and its predecessor; returns the flat map index and
    /// the filter observation.
    fn observe(
        &self,
        event: &Event,
        bearing: &Vector3<f64>,
        map_rotation: &SO3,
        previous: &EventMapEntry,
        reference: &SO3,
        gradient_map: &GradientMap,
    ) -> Result<(usize, EventObservation), UpdateRejection> {
        let map_point = self
            .camera
            .project(&map_rotation.act(bearing))
            .map_err(|_| UpdateRejection::ProjectionFailed)?;
        let index = self
            .camera
            .pixel_index(&map_point)
            .and_then(|(row, col)| gradient_map.index(row, col))
            .ok_or(UpdateRejection::OutsideMap)?;

        let previous_map_point = match previous.last_rotation.as_ref() {
            Some(last_rotation) => Some(
                self.camera
                    .project(&reference.compose(last_rotation).act(bearing))
                    .map_err(|_| UpdateRejection::ProjectionFailed)?,
            ),
            None => None,
        };

        Ok((
            index,
            EventObservation {
                map_point,
                previous_map_point,
                dt: event.time - previous.last_time,
                polarity: event.polarity.sign(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvs_camera_models::Resolution;
    use nalgebra::Vector3;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn small_config() -> MosaicConfig {
        MosaicConfig::new()
            .with_batch_size(2)
            .with_output_size(64, 32)
            .with_sensor_size(3, 3)
    }

    fn slow_pan() -> Result<Trajectory, Box<dyn std::error::Error>> {
        Ok(Trajectory::from_rotations(
            vec![0.0, 10.0],
            vec![
                SO3::identity(),
                SO3::from_axis_angle(&Vector3::y(), 1.0),
            ],
        )?)
    }

    #[test]
    fn test_skip_counts() {
        let mut counts = SkipCounts::default();
        counts.record(UpdateRejection::WarmUp);
        counts.record(UpdateRejection::WarmUp);
        counts.record(UpdateRejection::OutsideMap);
        assert_eq!(counts.get(UpdateRejection::WarmUp), 2);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.to_string(), "warm-up: 2, outside map: 1");

        let mut merged = SkipCounts::default();
        merged.merge(&counts);
        merged.merge(&counts);
        assert_eq!(merged.warm_up, 4);
        assert_eq!(SkipCounts::default().to_string(), "none");
    }

    #[test]
    fn test_rejects_mismatched_calibration() -> TestResult {
        let mut processor = BatchProcessor::new(small_config())?;
        let mut state = processor.initial_state();
        let bearings = BearingGrid::pinhole(Resolution::new(4, 4)?, 10.0)?;
        let result = processor.process(&[], &slow_pan()?, &bearings, &mut state);
        assert!(matches!(result, Err(MosaicError::InvalidInput(_))));
        Ok(())
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = BatchProcessor::new(MosaicConfig::new().with_batch_size(0));
        assert!(matches!(result, Err(MosaicError::Config(_))));
    }

    #[test]
    fn test_events_outside_sensor_are_counted() -> TestResult {
        let mut processor = BatchProcessor::new(small_config())?;
        let mut state = processor.initial_state();
        let bearings = BearingGrid::pinhole(Resolution::new(3, 3)?, 10.0)?;
        let events = [
            Event::new(1.0, 7, 0, Polarity::Positive),
            Event::new(1.1, 1, 1, Polarity::Negative),
        ];
        let summary = processor.process(&events, &slow_pan()?, &bearings, &mut state)?;
        assert_eq!(summary.skipped.outside_sensor, 1);
        assert_eq!(summary.skipped.warm_up, 1);
        assert_eq!(summary.events_updated, 0);
        Ok(())
    }

    #[test]
    fn test_batch_before_trajectory_records_times_only() -> TestResult {
        let mut processor = BatchProcessor::new(small_config())?;
        let mut state = processor.initial_state();
        let bearings = BearingGrid::pinhole(Resolution::new(3, 3)?, 10.0)?;
        let trajectory = Trajectory::from_rotations(
            vec![1.0, 10.0],
            vec![SO3::identity(), SO3::from_axis_angle(&Vector3::y(), 1.0)],
        )?;
        let events = [
            Event::new(0.1, 0, 0, Polarity::Positive),
            Event::new(0.2, 1, 0, Polarity::Positive),
        ];
        let summary = processor.process(&events, &trajectory, &bearings, &mut state)?;
        assert_eq!(summary.skipped.no_rotation, 2);
        let entry = state.event_map.read(1, 0)?;
        assert_eq!(entry.last_time, 0.2);
        assert!(entry.last_rotation.is_none());
        Ok(())
    }

    #[test]
    fn test_trajectory_exhausted_stops_early() -> TestResult {
        let mut processor = BatchProcessor::new(small_config())?;
        let mut state = processor.initial_state();
        let bearings = BearingGrid::pinhole(Resolution::new(3, 3)?, 10.0)?;
        let events = [
            Event::new(9.0, 0, 0, Polarity::Positive),
            Event::new(9.5, 1, 0, Polarity::Positive),
            Event::new(10.0, 2, 0, Polarity::Positive),
            Event::new(10.5, 0, 1, Polarity::Positive),
            Event::new(11.0, 1, 1, Polarity::Positive),
        ];
        let summary = processor.process(&events, &slow_pan()?, &bearings, &mut state)?;
        assert_eq!(summary.termination, TerminationReason::TrajectoryExhausted);
        assert_eq!(summary.batches, 1);
        assert_eq!(summary.unprocessed_events, 3);
        Ok(())
    }
}
