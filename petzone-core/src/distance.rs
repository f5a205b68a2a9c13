//! RSSI-to-distance conversion via a log-distance path-loss model
//!
//! ```text
//! distance = 10 ^ ((reference_power - rssi) / (10 * n))
//! ```
//!
//! `reference_power` is the expected RSSI at 1 m and `n` the environment
//! attenuation exponent (2.0 free space, 2.5-4.0 indoors). The output clamps
//! to a fixed sensing range: below the minimum the radio saturates, beyond
//! the maximum the estimate is noise-dominated and callers should treat the
//! beacon as "far" rather than trust a number.
//!
//! The model is monotonic non-increasing in RSSI, which downstream consumers
//! (proximity ordering, lateration weights) rely on.

use crate::constants::{
    MAX_SENSING_RANGE_M, MIN_SENSING_RANGE_M, PATH_LOSS_EXPONENT, REFERENCE_POWER_DBM,
};

/// Path-loss distance estimator
///
/// Uses `libm::powf` so the same code runs on no_std targets without float
/// intrinsics.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PathLossModel {
    reference_power_dbm: f32,
    exponent: f32,
    max_range_m: f32,
}

impl Default for PathLossModel {
    fn default() -> Self {
        Self {
            reference_power_dbm: REFERENCE_POWER_DBM,
            exponent: PATH_LOSS_EXPONENT,
            max_range_m: MAX_SENSING_RANGE_M,
        }
    }
}

impl PathLossModel {
    /// Create a model with explicit calibration
    ///
    /// Inputs are clamped to sane ranges: reference power to [-100, 0] dBm,
    /// exponent to [1.0, 6.0], range to at least the minimum sensing range.
    pub fn new(reference_power_dbm: f32, exponent: f32, max_range_m: f32) -> Self {
        Self {
            reference_power_dbm: reference_power_dbm.clamp(-100.0, 0.0),
            exponent: exponent.clamp(1.0, 6.0),
            max_range_m: max_range_m.max(MIN_SENSING_RANGE_M),
        }
    }

    /// Estimate distance in meters from a filtered RSSI
    pub fn distance(&self, rssi_dbm: f32) -> f32 {
        if !rssi_dbm.is_finite() {
            return self.max_range_m;
        }

        let exponent = (self.reference_power_dbm - rssi_dbm) / (10.0 * self.exponent);
        let distance = libm::powf(10.0, exponent);
        distance.clamp(MIN_SENSING_RANGE_M, self.max_range_m)
    }

    /// Maximum sensing range in meters
    pub fn max_range(&self) -> f32 {
        self.max_range_m
    }
}
