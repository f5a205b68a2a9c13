//! Second-stage temporal filtering of aggregated RSSI
//!
//! ## Overview
//!
//! Window aggregation removes per-packet outliers; this module smooths the
//! *sequence* of aggregated values over time. Two scalar algorithms are
//! selectable at construction:
//!
//! ### Exponential (IIR)
//! ```text
//! filtered = alpha * z + (1 - alpha) * filtered_prev
//! ```
//! Cheapest possible recursion. The first measurement initializes the state
//! directly, so there is no warm-up bias toward zero.
//!
//! ### Recursive (Kalman-style) scalar filter
//! ```text
//! Predict:  x' = x           (static signal model)
//!           P' = P + Q
//! Update:   K  = P' / (P' + R)
//!           x  = x' + K * (z - x')
//!           P  = (1 - K) * P'
//! ```
//! The static model carries the state forward unchanged; Q (process noise)
//! controls how quickly the filter re-opens to new data, R (measurement
//! noise) how much a single aggregate is trusted. Both are runtime-tunable.
//!
//! ## Diagnostics
//!
//! Each state tracks convergence diagnostics - residual variance over a short
//! ring, update count and RMS error versus the raw input. These are read-only
//! outputs for telemetry and never feed back into the filter itself.

use crate::constants::{
    CONVERGENCE_MIN_UPDATES, CONVERGENCE_VARIANCE, DEFAULT_IIR_ALPHA,
    DEFAULT_MEASUREMENT_NOISE, DEFAULT_PROCESS_NOISE,
};

/// Residual ring depth for the variance diagnostic
const RESIDUAL_WINDOW: usize = 8;

/// Temporal filter algorithm, chosen at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FilterAlgorithm {
    /// Exponential smoothing with a fixed decay factor
    Iir,
    /// Scalar Kalman filter with a static signal model
    Kalman,
}

/// Runtime-tunable filter parameters
///
/// Setters clamp to safe ranges so a bad tuning command can degrade
/// responsiveness but never produce NaN or a diverging filter.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FilterConfig {
    /// Which recursion to run
    pub algorithm: FilterAlgorithm,
    alpha: f32,
    process_noise: f32,
    measurement_noise: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            algorithm: FilterAlgorithm::Kalman,
            alpha: DEFAULT_IIR_ALPHA,
            process_noise: DEFAULT_PROCESS_NOISE,
            measurement_noise: DEFAULT_MEASUREMENT_NOISE,
        }
    }
}

impl FilterConfig {
    /// Config with the given algorithm and default parameters
    pub fn with_algorithm(algorithm: FilterAlgorithm) -> Self {
        Self {
            algorithm,
            ..Self::default()
        }
    }

    /// Set the IIR decay factor, clamped to (0, 1]
    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = if alpha.is_finite() {
            alpha.clamp(0.01, 1.0)
        } else {
            DEFAULT_IIR_ALPHA
        };
    }

    /// Set Kalman process and measurement noise, clamped positive
    pub fn set_kalman_noise(&mut self, process_noise: f32, measurement_noise: f32) {
        self.process_noise = if process_noise.is_finite() {
            process_noise.clamp(1e-4, 100.0)
        } else {
            DEFAULT_PROCESS_NOISE
        };
        self.measurement_noise = if measurement_noise.is_finite() {
            measurement_noise.clamp(1e-4, 1000.0)
        } else {
            DEFAULT_MEASUREMENT_NOISE
        };
    }

    /// Current IIR decay factor
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Current process noise covariance (Q)
    pub fn process_noise(&self) -> f32 {
        self.process_noise
    }

    /// Current measurement noise covariance (R)
    pub fn measurement_noise(&self) -> f32 {
        self.measurement_noise
    }
}

/// Read-only convergence diagnostics for one filter state
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FilterStats {
    /// Number of measurements folded in since the last reset
    pub update_count: u32,
    /// Variance of recent residuals (dB^2)
    pub variance: f32,
    /// RMS error between filter output and raw measurements
    pub rms_error: f32,
    /// Residual variance has settled below the convergence threshold
    pub converged: bool,
}

/// Per-beacon temporal filter state
///
/// Lives alongside the beacon's sample window and dies with it. `reset`
/// returns the state to uninitialized; the next measurement then seeds the
/// filter directly.
#[derive(Debug, Clone)]
pub struct TemporalFilterState {
    initialized: bool,
    value: f32,
    covariance: f32,
    update_count: u32,

    // Diagnostics
    residuals: [f32; RESIDUAL_WINDOW],
    residual_pos: usize,
    residual_len: usize,
    squared_error_sum: f32,
}

impl TemporalFilterState {
    /// Create an uninitialized state
    pub const fn new() -> Self {
        Self {
            initialized: false,
            value: 0.0,
            covariance: 1.0,
            update_count: 0,
            residuals: [0.0; RESIDUAL_WINDOW],
            residual_pos: 0,
            residual_len: 0,
            squared_error_sum: 0.0,
        }
    }

    /// Fold one aggregated measurement in, returning the filtered value
    pub fn update(&mut self, measurement: f32, config: &FilterConfig) -> f32 {
        if !self.initialized {
            self.initialized = true;
            self.value = measurement;
            self.covariance = config.measurement_noise;
            self.update_count = 1;
            return self.value;
        }

        let residual = measurement - self.value;

        match config.algorithm {
            FilterAlgorithm::Iir => {
                self.value = config.alpha * measurement + (1.0 - config.alpha) * self.value;
            }
            FilterAlgorithm::Kalman => {
                // Predict: static model, covariance inflates by Q
                let predicted_cov = self.covariance + config.process_noise;

                // Update: standard scalar gain correction
                let gain = predicted_cov / (predicted_cov + config.measurement_noise);
                self.value += gain * residual;
                self.covariance = (1.0 - gain) * predicted_cov;
            }
        }

        self.update_count += 1;
        self.record_residual(residual);
        let err = measurement - self.value;
        self.squared_error_sum += err * err;

        self.value
    }

    /// Filtered value, `None` until the first measurement arrives
    pub fn value(&self) -> Option<f32> {
        if self.initialized {
            Some(self.value)
        } else {
            None
        }
    }

    /// Current error covariance (Kalman only; meaningless for IIR)
    pub fn covariance(&self) -> f32 {
        self.covariance
    }

    /// Clear all running state back to uninitialized
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Compute diagnostics; all divisions guarded against zero updates
    pub fn stats(&self) -> FilterStats {
        let variance = self.residual_variance();

        // First update seeds the state and produces no residual
        let error_samples = self.update_count.saturating_sub(1);
        let rms_error = if error_samples > 0 {
            libm::sqrtf(self.squared_error_sum / error_samples as f32)
        } else {
            0.0
        };

        FilterStats {
            update_count: self.update_count,
            variance,
            rms_error,
            converged: self.update_count >= CONVERGENCE_MIN_UPDATES
                && variance < CONVERGENCE_VARIANCE,
        }
    }

    fn record_residual(&mut self, residual: f32) {
        self.residuals[self.residual_pos] = residual;
        self.residual_pos = (self.residual_pos + 1) % RESIDUAL_WINDOW;
        if self.residual_len < RESIDUAL_WINDOW {
            self.residual_len += 1;
        }
    }

    fn residual_variance(&self) -> f32 {
        if self.residual_len == 0 {
            return 0.0;
        }

        let n = self.residual_len as f32;
        let mean: f32 = self.residuals[..self.residual_len].iter().sum::<f32>() / n;
        self.residuals[..self.residual_len]
            .iter()
            .map(|r| (r - mean) * (r - mean))
            .sum::<f32>()
            / n
    }
}

impl Default for TemporalFilterState {
    fn default() -> Self {
        Self::new()
    }
}
