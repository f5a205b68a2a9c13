//! Runtime tuning configuration for the whole pipeline
//!
//! One struct gathers every tunable the command channel can touch:
//! smoothing, temporal filtering, path-loss calibration, the proximity
//! threshold and the beacon expiry. Setters clamp rather than error, so a
//! bad remote command can degrade responsiveness but never wedge the
//! pipeline or smuggle in a NaN.

use crate::{
    constants::{BEACON_EXPIRY_MS, PROXIMITY_THRESHOLD_DBM},
    distance::PathLossModel,
    filter::FilterConfig,
    smoothing::SmoothingConfig,
};

/// Complete pipeline tuning state
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TuningConfig {
    /// Window aggregation stage
    pub smoothing: SmoothingConfig,
    /// Temporal filter stage
    pub filter: FilterConfig,
    /// RSSI-to-distance calibration
    pub path_loss: PathLossModel,
    proximity_threshold_dbm: i16,
    beacon_expiry_ms: u64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            smoothing: SmoothingConfig::default(),
            filter: FilterConfig::default(),
            path_loss: PathLossModel::default(),
            proximity_threshold_dbm: PROXIMITY_THRESHOLD_DBM,
            beacon_expiry_ms: BEACON_EXPIRY_MS,
        }
    }
}

impl TuningConfig {
    /// Defaults with a different aggregation method
    pub fn with_aggregation(method: crate::smoothing::AggregationMethod) -> Self {
        let mut config = Self::default();
        config.smoothing.method = method;
        config
    }

    /// Defaults with a different temporal filter algorithm
    pub fn with_filter_algorithm(algorithm: crate::filter::FilterAlgorithm) -> Self {
        let mut config = Self::default();
        config.filter.algorithm = algorithm;
        config
    }

    /// Defaults with an explicit path-loss calibration
    pub fn with_path_loss(reference_power_dbm: f32, exponent: f32, max_range_m: f32) -> Self {
        Self {
            path_loss: PathLossModel::new(reference_power_dbm, exponent, max_range_m),
            ..Self::default()
        }
    }

    /// Set the filtered-RSSI threshold for "pet is near a beacon",
    /// clamped to [-100, -20] dBm
    pub fn set_proximity_threshold(&mut self, dbm: i16) {
        self.proximity_threshold_dbm = dbm.clamp(-100, -20);
    }

    /// Set how long a beacon may stay silent before its record is dropped,
    /// clamped to [1 s, 10 min]
    pub fn set_beacon_expiry(&mut self, ms: u64) {
        self.beacon_expiry_ms = ms.clamp(1_000, 600_000);
    }

    /// Current proximity threshold in dBm
    pub fn proximity_threshold(&self) -> i16 {
        self.proximity_threshold_dbm
    }

    /// Current beacon expiry in milliseconds
    pub fn beacon_expiry(&self) -> u64 {
        self.beacon_expiry_ms
    }
}
