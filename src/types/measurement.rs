//! Sensor readings and timestamped measurement records

use nalgebra::RealField;
use num_traits::Float;

use super::spaces::Measurement;
use crate::{FusionError, Result};

/// Which sensor produced a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SensorKind {
    /// Linear position sensor observing (x, y)
    Position,
    /// Nonlinear sensor observing (range, bearing, range rate) from the origin
    RangeBearingRate,
}

impl SensorKind {
    /// Number of raw values a reading of this kind carries.
    #[inline]
    pub const fn field_count(self) -> usize {
        match self {
            SensorKind::Position => 2,
            SensorKind::RangeBearingRate => 3,
        }
    }
}

/// Raw values of one observation, tagged by sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SensorReading<T> {
    Position { x: T, y: T },
    RangeBearingRate { range: T, bearing: T, range_rate: T },
}

impl<T: RealField + Float + Copy> SensorReading<T> {
    pub fn kind(&self) -> SensorKind {
        match self {
            SensorReading::Position { .. } => SensorKind::Position,
            SensorReading::RangeBearingRate { .. } => SensorKind::RangeBearingRate,
        }
    }

    /// Returns true if every value of the reading is finite.
    pub fn is_finite(&self) -> bool {
        match *self {
            SensorReading::Position { x, y } => Float::is_finite(x) && Float::is_finite(y),
            SensorReading::RangeBearingRate {
                range,
                bearing,
                range_rate,
            } => Float::is_finite(range) && Float::is_finite(bearing) && Float::is_finite(range_rate),
        }
    }

    /// Builds a reading from a raw value slice.
    ///
    /// Rejects a field count that does not match `kind` and non-finite values.
    pub fn from_raw(kind: SensorKind, values: &[T]) -> Result<Self> {
        if values.len() != kind.field_count() {
            return Err(FusionError::MalformedMeasurement);
        }
        let reading = match kind {
            SensorKind::Position => SensorReading::Position {
                x: values[0],
                y: values[1],
            },
            SensorKind::RangeBearingRate => SensorReading::RangeBearingRate {
                range: values[0],
                bearing: values[1],
                range_rate: values[2],
            },
        };
        reading.validated()
    }

    /// Passes the reading through if it is finite.
    ///
    /// # Errors
    /// [`FusionError::MalformedMeasurement`] if any value is NaN or infinite.
    pub fn validated(self) -> Result<Self> {
        if self.is_finite() {
            Ok(self)
        } else {
            Err(FusionError::MalformedMeasurement)
        }
    }

    /// Cartesian position implied by the reading alone.
    ///
    /// Polar readings are converted with the bearing taken as is; callers
    /// normalize it first when seeding a state.
    pub fn position(&self) -> (T, T) {
        match *self {
            SensorReading::Position { x, y } => (x, y),
            SensorReading::RangeBearingRate { range, bearing, .. } => {
                let (sin_b, cos_b) = Float::sin_cos(bearing);
                (range * cos_b, range * sin_b)
            }
        }
    }
}

/// A reading with the time it was taken.
///
/// Timestamps fed to one filter must be non-decreasing; their unit is
/// converted to seconds by the filter's configured timestamp scale.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimedMeasurement<T> {
    pub timestamp: T,
    pub reading: SensorReading<T>,
}

impl<T: RealField + Float + Copy> TimedMeasurement<T> {
    #[inline]
    pub fn new(timestamp: T, reading: SensorReading<T>) -> Self {
        Self { timestamp, reading }
    }

    #[inline]
    pub fn position(timestamp: T, x: T, y: T) -> Self {
        Self::new(timestamp, SensorReading::Position { x, y })
    }

    #[inline]
    pub fn range_bearing_rate(timestamp: T, range: T, bearing: T, range_rate: T) -> Self {
        Self::new(
            timestamp,
            SensorReading::RangeBearingRate {
                range,
                bearing,
                range_rate,
            },
        )
    }

    /// Validates a raw record `(kind, timestamp, values)`.
    pub fn from_raw(kind: SensorKind, timestamp: T, values: &[T]) -> Result<Self> {
        if !Float::is_finite(timestamp) {
            return Err(FusionError::MalformedMeasurement);
        }
        Ok(Self::new(timestamp, SensorReading::from_raw(kind, values)?))
    }
}

/// Position reading as a typed 2-vector.
pub(crate) fn position_vector<T: RealField + Copy>(x: T, y: T) -> Measurement<T, 2> {
    Measurement::from_array([x, y])
}

/// Range/bearing/range-rate reading as a typed 3-vector.
pub(crate) fn polar_vector<T: RealField + Copy>(
    range: T,
    bearing: T,
    range_rate: T,
) -> Measurement<T, 3> {
    Measurement::from_array([range, bearing, range_rate])
}
