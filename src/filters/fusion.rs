//! Two-sensor fusion controller
//!
//! [`FusionFilter`] owns one CTRV estimate and drives it from a stream of
//! timestamped readings. The first reading seeds the state; each later one
//! runs a predict over the elapsed time followed by the update that matches
//! the reading's sensor.

use nalgebra::RealField;
use num_traits::Float;

use super::ekf::{EkfState, ExtendedKalmanFilter};
use crate::config::FilterConfig;
use crate::models::{CtrvModel, PositionSensor, RangeBearingRateSensor};
use crate::types::angles::normalize_angle;
use crate::types::measurement::{polar_vector, position_vector, SensorReading, TimedMeasurement};
use crate::types::spaces::{StateCovariance, StateVector};
use crate::types::state::{CtrvState, StateSnapshot, CTRV_DIM};
use crate::{FusionError, Result};

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

/// Lifecycle of a [`FusionFilter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackPhase<T> {
    /// No reading seen yet
    Uninitialized,
    /// State seeded; `last_timestamp` is the time of the latest processed reading
    Tracking { last_timestamp: T },
}

/// What a call to [`FusionFilter::process_measurement`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The reading seeded the state. No predict or update ran.
    Initialized,
    /// Predict and update both ran.
    Updated,
    /// Predict ran but the update could not; the predicted state was kept.
    UpdateSkipped(FusionError),
}

#[derive(Debug, Clone)]
struct Track<T: RealField> {
    last_timestamp: T,
    estimate: EkfState<T, CTRV_DIM>,
}

/// EKF over the CTRV model fusing position and range/bearing/range-rate readings.
#[derive(Debug, Clone)]
pub struct FusionFilter<T: RealField + Float + Copy> {
    ekf: ExtendedKalmanFilter<T, CtrvModel<T>, CTRV_DIM>,
    position_sensor: PositionSensor<T>,
    range_sensor: RangeBearingRateSensor<T>,
    config: FilterConfig<T>,
    track: Option<Track<T>>,
}

impl<T: RealField + Float + Copy> FusionFilter<T> {
    /// Builds an uninitialized filter.
    ///
    /// # Errors
    /// [`FusionError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: FilterConfig<T>) -> Result<Self> {
        config.validate()?;
        let ekf = ExtendedKalmanFilter::new(config.motion_model())
            .with_covariance_update(config.covariance_update);

        Ok(Self {
            ekf,
            position_sensor: config.position_sensor(),
            range_sensor: config.range_bearing_rate_sensor(),
            config,
            track: None,
        })
    }

    #[inline]
    pub fn config(&self) -> &FilterConfig<T> {
        &self.config
    }

    pub fn phase(&self) -> TrackPhase<T> {
        match &self.track {
            None => TrackPhase::Uninitialized,
            Some(track) => TrackPhase::Tracking {
                last_timestamp: track.last_timestamp,
            },
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.track.is_some()
    }

    /// Mean and covariance of the current estimate.
    pub fn estimate(&self) -> Option<&EkfState<T, CTRV_DIM>> {
        self.track.as_ref().map(|track| &track.estimate)
    }

    /// Current state in the filter frame.
    pub fn state(&self) -> Option<CtrvState<T>> {
        self.estimate().map(|e| CtrvState::from_vector(&e.mean))
    }

    pub fn covariance(&self) -> Option<&StateCovariance<T, CTRV_DIM>> {
        self.estimate().map(|e| &e.covariance)
    }

    /// Current estimate for output, with the frame offset added back.
    pub fn snapshot(&self) -> Option<StateSnapshot<T>> {
        let offset = self.config.frame_offset;
        self.state().map(|state| {
            let mut snapshot = state.snapshot();
            snapshot.x += offset.x;
            snapshot.y += offset.y;
            snapshot
        })
    }

    /// Processes one reading.
    ///
    /// # Errors
    /// - [`FusionError::MalformedMeasurement`] if the timestamp or any reading
    ///   value is not finite; the filter is left unchanged
    /// - [`FusionError::InvalidTimeStep`] if the reading is older than the last
    ///   one processed; the filter is left unchanged
    ///
    /// A failed update is not an error: it is reported as
    /// [`StepOutcome::UpdateSkipped`] with the predicted state kept.
    pub fn process_measurement(&mut self, measurement: &TimedMeasurement<T>) -> Result<StepOutcome> {
        if !Float::is_finite(measurement.timestamp) {
            return Err(FusionError::MalformedMeasurement);
        }
        let reading = self.to_filter_frame(measurement.reading.validated()?);

        if self.track.is_none() {
            let estimate = self.seed(&reading);
            log::debug!(
                "initialized from {:?} reading at t={:?}: {:?}",
                reading.kind(),
                measurement.timestamp,
                CtrvState::from_vector(&estimate.mean)
            );
            self.track = Some(Track {
                last_timestamp: measurement.timestamp,
                estimate,
            });
            return Ok(StepOutcome::Initialized);
        }
        let track = self.track.as_mut().ok_or(FusionError::NotInitialized)?;

        let dt = (measurement.timestamp - track.last_timestamp) * self.config.timestamp_scale;
        let predicted = match self.ekf.predict(&track.estimate, dt) {
            Ok(predicted) => predicted,
            Err(e) => {
                log::warn!(
                    "rejecting reading at t={:?}: last processed t={:?}",
                    measurement.timestamp,
                    track.last_timestamp
                );
                return Err(e);
            }
        };
        log::debug!("predicted over dt={:?}", dt);

        let corrected = match reading {
            SensorReading::Position { x, y } => {
                self.ekf
                    .update(&predicted, &position_vector(x, y), &self.position_sensor)
            }
            SensorReading::RangeBearingRate {
                range,
                bearing,
                range_rate,
            } => self.ekf.update_nonlinear(
                &predicted,
                &polar_vector(range, bearing, range_rate),
                &self.range_sensor,
            ),
        };

        track.last_timestamp = measurement.timestamp;
        match corrected {
            Ok(updated) => {
                track.estimate = updated;
                Ok(StepOutcome::Updated)
            }
            Err(e) => {
                log::warn!(
                    "skipping {:?} update at t={:?}: {}",
                    reading.kind(),
                    measurement.timestamp,
                    e
                );
                track.estimate = predicted;
                Ok(StepOutcome::UpdateSkipped(e))
            }
        }
    }

    /// Feeds `measurements` in order and collects a snapshot after each.
    ///
    /// Stops at the first reading that returns an error.
    #[cfg(feature = "alloc")]
    pub fn process_all(&mut self, measurements: &[TimedMeasurement<T>]) -> Result<Vec<StateSnapshot<T>>> {
        let mut snapshots = Vec::with_capacity(measurements.len());
        for measurement in measurements {
            self.process_measurement(measurement)?;
            snapshots.push(self.snapshot().ok_or(FusionError::NotInitialized)?);
        }
        Ok(snapshots)
    }

    fn to_filter_frame(&self, reading: SensorReading<T>) -> SensorReading<T> {
        let offset = self.config.frame_offset;
        match reading {
            SensorReading::Position { x, y } => SensorReading::Position {
                x: x - offset.x,
                y: y - offset.y,
            },
            polar => polar,
        }
    }

    fn seed(&self, reading: &SensorReading<T>) -> EkfState<T, CTRV_DIM> {
        let (x, y) = match *reading {
            SensorReading::Position { x, y } => (x, y),
            SensorReading::RangeBearingRate {
                range,
                bearing,
                range_rate,
            } => SensorReading::RangeBearingRate {
                range,
                bearing: normalize_angle(bearing),
                range_rate,
            }
            .position(),
        };

        let mean = StateVector::from_array([
            x,
            y,
            self.config.initial_speed,
            T::zero(),
            self.config.initial_yaw_rate,
        ]);
        EkfState::with_diagonal_covariance(mean, &self.config.initial_covariance_diagonal())
    }
}
