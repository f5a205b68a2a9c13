//! Proximity sensing and geofencing core for the PetZone collar
//!
//! Turns noisy BLE advertisement packets from stationary beacons into a
//! stable occupancy decision: which geofenced zone the tracked animal is in.
//!
//! Key constraints:
//! - Fixed memory: every table and buffer is pre-allocated, growth is eviction
//! - Bounded latency: a smoothed RSSI is available within 500 ms of the first
//!   packet in a window, even under sparse arrival
//! - Packet ingestion is safe from radio callback context; everything heavier
//!   runs from the main control loop
//!
//! ```no_run
//! use petzone_core::{SensingPipeline, NullBridge, TuningConfig};
//! use petzone_core::time::MonotonicTime;
//! use petzone_core::types::MacAddress;
//!
//! let mut pipeline = SensingPipeline::new(MonotonicTime::new(), TuningConfig::default());
//! let mac = MacAddress::parse("AA:BB:CC:DD:EE:01").unwrap();
//!
//! // Radio context: cheap gate + ring insert
//! pipeline.ingest_advertisement(mac, "PetZone-Home-01", -62, true, None);
//!
//! // Main loop: aggregation, filtering, triangulation, zone evaluation
//! let mut bridge = NullBridge;
//! pipeline.tick(&mut bridge);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

// Macros for optional logging, scoped textually so every module below sees them
#[cfg(feature = "log")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {{}};
}

#[cfg(feature = "log")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {{}};
}

pub mod buffer;
pub mod config;
pub mod constants;
pub mod distance;
pub mod errors;
pub mod filter;
pub mod pipeline;
pub mod registry;
pub mod smoothing;
pub mod time;
pub mod triangulate;
pub mod types;
pub mod zones;

// Public API
pub use config::TuningConfig;
pub use distance::PathLossModel;
pub use errors::{SensingError, SensingResult};
pub use filter::{FilterAlgorithm, FilterConfig, FilterStats};
pub use pipeline::{
    AlertBridge, BeaconSummary, NullBridge, ProximityState, SensingPipeline, TelemetrySnapshot,
    TickReport,
};
pub use registry::{BeaconFunction, BeaconRecord, BeaconRegistry};
pub use smoothing::{AggregationMethod, RssiSmoother, SmoothingConfig, SmoothingResult};
pub use triangulate::{PositionEstimate, Triangulator};
pub use types::{MacAddress, Point};
pub use zones::{AlertMode, AlertPolicy, ZoneDef, ZoneManager, ZoneTransition};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
