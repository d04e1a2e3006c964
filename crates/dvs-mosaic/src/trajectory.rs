//! Camera orientation as a function of time.
//!
//! A [`Trajectory`] is built once from timestamped quaternions, or from
//! gyroscope-style angular velocity samples integrated with the trapezoid
//! rule. Between two samples the orientation follows the SO(3) geodesic:
//!
//! ```text
//! R(t) = Rᵢ · exp(s · log(Rᵢᵀ · Rᵢ₊₁)),   s = (t - tᵢ) / (tᵢ₊₁ - tᵢ)
//! ```
//!
//! Queries outside the sampled time span return `None`; the trajectory never
//! extrapolates.

use dvs_io::PoseSample;
use dvs_manifolds::{Interpolatable, LieGroup, ManifoldError, so3::SO3};
use nalgebra::Vector3;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrajectoryError {
    #[error("a trajectory needs at least two pose samples, got {0}")]
    TooFewSamples(usize),

    #[error("pose times must be strictly increasing: sample {index} at {time} follows {previous}")]
    NonIncreasingTime {
        index: usize,
        previous: f64,
        time: f64,
    },

    #[error("pose sample {index} has a non-finite time")]
    NonFiniteTime { index: usize },

    #[error("pose sample {index} has an invalid orientation: {source}")]
    InvalidOrientation {
        index: usize,
        source: ManifoldError,
    },

    #[error("angular velocity sample {index} is not finite")]
    NonFiniteAngularVelocity { index: usize },

    #[error("{times} timestamps but {rotations} rotations")]
    LengthMismatch { times: usize, rotations: usize },
}

/// Time-sorted rotation samples with geodesic interpolation.
#[derive(Debug, Clone)]
pub struct Trajectory {
    times: Vec<f64>,
    rotations: Vec<SO3>,
}

impl Trajectory {
    /// Build a trajectory from pose samples, converting every quaternion to an
    /// orthonormal rotation matrix.
    pub fn from_poses(samples: &[PoseSample]) -> Result<Self, TrajectoryError> {
        let rotations = samples
            .iter()
            .enumerate()
            .map(|(index, sample)| {
                let [w, x, y, z] = sample.quaternion_wxyz();
                SO3::from_quaternion_wxyz(w, x, y, z)
                    .map_err(|source| TrajectoryError::InvalidOrientation { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let times = samples.iter().map(|sample| sample.time).collect();

        let trajectory = Self::from_rotations(times, rotations)?;
        let (start, end) = trajectory.time_range();
        info!(
            samples = trajectory.len(),
            start, end, "built rotation trajectory"
        );
        Ok(trajectory)
    }

    /// Integrate body angular velocities `(t, ω)` into a trajectory.
    ///
    /// The first sample is the identity. Each interval adds
    /// `(tᵢ - tᵢ₋₁) · (ωᵢ₋₁ + ωᵢ) / 2` to a running rotation vector `θ`, and
    /// the orientation at `tᵢ` is `exp([θ]ₓ)`. ω is in rad/s about the
    /// camera x, y and z axes.
    pub fn from_angular_velocities(
        samples: &[(f64, Vector3<f64>)],
    ) -> Result<Self, TrajectoryError> {
        if samples.len() < 2 {
            return Err(TrajectoryError::TooFewSamples(samples.len()));
        }
        if let Some(index) = samples
            .iter()
            .position(|(_, omega)| omega.iter().any(|v| !v.is_finite()))
        {
            return Err(TrajectoryError::NonFiniteAngularVelocity { index });
        }

        let rotations = std::iter::once(SO3::identity())
            .chain(samples.windows(2).scan(
                Vector3::zeros(),
                |accumulated: &mut Vector3<f64>, pair| {
                    let (t0, omega0) = pair[0];
                    let (t1, omega1) = pair[1];
                    *accumulated += (omega0 + omega1) * (0.5 * (t1 - t0));
                    Some(SO3::from_scaled_axis(*accumulated))
                },
            ))
            .collect();
        let times = samples.iter().map(|(time, _)| *time).collect();

        let trajectory = Self::from_rotations(times, rotations)?;
        let (start, end) = trajectory.time_range();
        info!(
            samples = trajectory.len(),
            start, end, "integrated angular velocity trajectory"
        );
        Ok(trajectory)
    }

    pub fn from_rotations(times: Vec<f64>, rotations: Vec<SO3>) -> Result<Self, TrajectoryError> {
        if times.len() != rotations.len() {
            return Err(TrajectoryError::LengthMismatch {
                times: times.len(),
                rotations: rotations.len(),
            });
        }
        if times.len() < 2 {
            return Err(TrajectoryError::TooFewSamples(times.len()));
        }
        if let Some(index) = times.iter().position(|t| !t.is_finite()) {
            return Err(TrajectoryError::NonFiniteTime { index });
        }
        if let Some(index) = times.windows(2).position(|pair| pair[1] <= pair[0]) {
            return Err(TrajectoryError::NonIncreasingTime {
                index: index + 1,
                previous: times[index],
                time: times[index + 1],
            });
        }
        Ok(Self { times, rotations })
    }

    /// Orientation at time `t`, or `None` when no pose is available.
    pub fn query(&self, t: f64) -> Option<SO3> {
        let (first, last) = self.time_range();
        if !(first..=last).contains(&t) {
            return None;
        }
        if t == last {
            return self.rotations.last().copied();
        }

        // first <= t < last, so 1 <= upper <= len - 1
        let upper = self.times.partition_point(|&time| time <= t);
        let i = upper - 1;
        let s = (t - self.times[i]) / (self.times[i + 1] - self.times[i]);
        Some(self.rotations[i].interp(&self.rotations[i + 1], s))
    }

    /// Rotation of the first sample; the panorama is centred on it.
    pub fn first_rotation(&self) -> &SO3 {
        &self.rotations[0]
    }

    pub fn time_range(&self) -> (f64, f64) {
        (self.times[0], self.times[self.times.len() - 1])
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn rotations(&self) -> &[SO3] {
        &self.rotations
    }
}
