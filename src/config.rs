//! Filter configuration
//!
//! All tunables are supplied once, through [`FilterConfig`], when a
//! [`FusionFilter`](crate::filters::fusion::FusionFilter) is built. Keys that
//! are not supplied keep their defaults.

use nalgebra::{convert, RealField, SVector};
use num_traits::Float;

use crate::models::{CtrvModel, PositionSensor, RangeBearingRateSensor};
use crate::types::transforms::CovarianceUpdate;
use crate::{FusionError, Result};

/// Recognized keys for [`FilterConfig::with_overrides`].
pub const CONFIG_KEYS: [&str; 17] = [
    "std_laspx",
    "std_laspy",
    "std_radrho",
    "std_radphi",
    "std_radrhodot",
    "px",
    "py",
    "pv",
    "ptheta",
    "pomega",
    "std_a",
    "std_yawdd",
    "initial_speed",
    "initial_yaw_rate",
    "timestamp_scale",
    "offset_x",
    "offset_y",
];

/// Translation between the sensor frame and the frame estimates are reported in.
///
/// Subtracted from position readings on input and added back to the reported
/// position.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameOffset<T> {
    pub x: T,
    pub y: T,
}

/// Settings for one fusion filter instance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(
        default,
        bound(deserialize = "T: serde::Deserialize<'de> + RealField + Float + Copy")
    )
)]
pub struct FilterConfig<T> {
    /// Position sensor noise std dev along x
    pub std_laspx: T,
    /// Position sensor noise std dev along y
    pub std_laspy: T,
    /// Range noise std dev
    pub std_radrho: T,
    /// Bearing noise std dev (radians)
    pub std_radphi: T,
    /// Range-rate noise std dev
    pub std_radrhodot: T,
    /// Initial variance of x
    pub px: T,
    /// Initial variance of y
    pub py: T,
    /// Initial variance of speed
    pub pv: T,
    /// Initial variance of heading
    pub ptheta: T,
    /// Initial variance of yaw rate
    pub pomega: T,
    /// Longitudinal acceleration noise std dev
    pub std_a: T,
    /// Yaw acceleration noise std dev
    pub std_yawdd: T,
    /// Speed assumed when the first measurement seeds the state
    pub initial_speed: T,
    /// Yaw rate assumed when the first measurement seeds the state
    pub initial_yaw_rate: T,
    /// Multiplier converting timestamp differences to seconds
    pub timestamp_scale: T,
    pub frame_offset: FrameOffset<T>,
    pub covariance_update: CovarianceUpdate,
}

impl<T: RealField + Float + Copy> Default for FilterConfig<T> {
    fn default() -> Self {
        Self {
            std_laspx: convert(0.15),
            std_laspy: convert(0.15),
            std_radrho: convert(0.02),
            std_radphi: convert(0.01),
            std_radrhodot: convert(0.2),
            px: convert(0.25),
            py: convert(0.25),
            pv: convert(0.3),
            ptheta: convert(0.2),
            pomega: convert(1.0),
            std_a: convert(2.0),
            std_yawdd: convert(0.3),
            initial_speed: convert(5.0),
            initial_yaw_rate: convert(1e-8),
            timestamp_scale: T::one(),
            frame_offset: FrameOffset {
                x: T::zero(),
                y: T::zero(),
            },
            covariance_update: CovarianceUpdate::Simple,
        }
    }
}

impl<T: RealField + Float + Copy> FilterConfig<T> {
    /// Applies `(key, value)` overrides on top of this configuration.
    ///
    /// # Errors
    /// [`FusionError::UnknownConfigKey`] for a key not in [`CONFIG_KEYS`].
    pub fn with_overrides<'a, I>(mut self, overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, T)>,
    {
        for (key, value) in overrides {
            let slot = match key {
                "std_laspx" => &mut self.std_laspx,
                "std_laspy" => &mut self.std_laspy,
                "std_radrho" => &mut self.std_radrho,
                "std_radphi" => &mut self.std_radphi,
                "std_radrhodot" => &mut self.std_radrhodot,
                "px" => &mut self.px,
                "py" => &mut self.py,
                "pv" => &mut self.pv,
                "ptheta" => &mut self.ptheta,
                "pomega" => &mut self.pomega,
                "std_a" => &mut self.std_a,
                "std_yawdd" => &mut self.std_yawdd,
                "initial_speed" => &mut self.initial_speed,
                "initial_yaw_rate" => &mut self.initial_yaw_rate,
                "timestamp_scale" => &mut self.timestamp_scale,
                "offset_x" => &mut self.frame_offset.x,
                "offset_y" => &mut self.frame_offset.y,
                _ => {
                    log::warn!("rejecting unknown configuration key {:?}", key);
                    return Err(FusionError::UnknownConfigKey);
                }
            };
            *slot = value;
        }
        Ok(self)
    }

    #[inline]
    pub fn with_covariance_update(mut self, form: CovarianceUpdate) -> Self {
        self.covariance_update = form;
        self
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    /// [`FusionError::InvalidConfig`] naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            (self.std_laspx, "std_laspx must be > 0"),
            (self.std_laspy, "std_laspy must be > 0"),
            (self.std_radrho, "std_radrho must be > 0"),
            (self.std_radphi, "std_radphi must be > 0"),
            (self.std_radrhodot, "std_radrhodot must be > 0"),
            (self.timestamp_scale, "timestamp_scale must be > 0"),
        ];
        for (value, what) in positive {
            if !(Float::is_finite(value) && value > T::zero()) {
                return Err(FusionError::InvalidConfig(what));
            }
        }

        let non_negative = [
            (self.px, "px must be >= 0"),
            (self.py, "py must be >= 0"),
            (self.pv, "pv must be >= 0"),
            (self.ptheta, "ptheta must be >= 0"),
            (self.pomega, "pomega must be >= 0"),
            (self.std_a, "std_a must be >= 0"),
            (self.std_yawdd, "std_yawdd must be >= 0"),
        ];
        for (value, what) in non_negative {
            if !(Float::is_finite(value) && value >= T::zero()) {
                return Err(FusionError::InvalidConfig(what));
            }
        }

        let finite = [
            (self.initial_speed, "initial_speed must be finite"),
            (self.initial_yaw_rate, "initial_yaw_rate must be finite"),
            (self.frame_offset.x, "offset_x must be finite"),
            (self.frame_offset.y, "offset_y must be finite"),
        ];
        for (value, what) in finite {
            if !Float::is_finite(value) {
                return Err(FusionError::InvalidConfig(what));
            }
        }
        Ok(())
    }

    pub fn motion_model(&self) -> CtrvModel<T> {
        CtrvModel::new(self.std_a, self.std_yawdd)
    }

    pub fn position_sensor(&self) -> PositionSensor<T> {
        PositionSensor::new(self.std_laspx, self.std_laspy)
    }

    pub fn range_bearing_rate_sensor(&self) -> RangeBearingRateSensor<T> {
        RangeBearingRateSensor::new(self.std_radrho, self.std_radphi, self.std_radrhodot)
    }

    /// Diagonal of the covariance the first measurement seeds.
    pub fn initial_covariance_diagonal(&self) -> SVector<T, 5> {
        nalgebra::vector![self.px, self.py, self.pv, self.ptheta, self.pomega]
    }
}
