//! Error types for the sensing pipeline
//!
//! The error system follows the same rules as the rest of the core:
//!
//! 1. **Small and Copy**: errors are returned in hot paths and may be counted
//!    rather than propagated, so every variant is a few inline words with
//!    `&'static str` reasons only - no heap, no formatting machinery.
//!
//! 2. **Handled locally**: nothing in this core aborts the firmware. A weak
//!    packet bumps a counter, a query with too little data returns
//!    `InsufficientData`, a bad zone reload leaves the previous configuration
//!    intact. Callers check validity before consuming distances, positions or
//!    smoothed RSSI values.
//!
//! 3. **Capacity is not failure**: full beacon tables resolve via
//!    deterministic eviction of the stalest record. `CapacityExceeded` only
//!    surfaces where eviction is not an option, such as zone configuration.

use thiserror_no_std::Error;

/// Result type for sensing operations
pub type SensingResult<T> = Result<T, SensingError>;

/// Sensing errors - kept small for embedded use
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensingError {
    /// Packet failed the quality gate (bad CRC, below the RSSI floor)
    #[error("packet rejected: {reason}")]
    InputRejected {
        /// Why the packet was dropped
        reason: &'static str,
    },

    /// Not enough samples or beacons to answer the query
    #[error("insufficient data: need {required}, have {available}")]
    InsufficientData {
        /// Minimum number of samples/beacons needed
        required: usize,
        /// Actual number available
        available: usize,
    },

    /// Configuration failed validation; previous valid state is retained
    #[error("configuration invalid: {reason}")]
    ConfigurationInvalid {
        /// What failed validation
        reason: &'static str,
    },

    /// A fixed-capacity table cannot take another entry
    #[error("capacity exceeded: limit {limit}")]
    CapacityExceeded {
        /// The fixed capacity that was hit
        limit: usize,
    },
}

#[cfg(feature = "defmt")]
impl defmt::Format for SensingError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::InputRejected { reason } =>
                defmt::write!(fmt, "packet rejected: {}", reason),
            Self::InsufficientData { required, available } =>
                defmt::write!(fmt, "need {} samples, have {}", required, available),
            Self::ConfigurationInvalid { reason } =>
                defmt::write!(fmt, "configuration invalid: {}", reason),
            Self::CapacityExceeded { limit } =>
                defmt::write!(fmt, "capacity exceeded: limit {}", limit),
        }
    }
}
