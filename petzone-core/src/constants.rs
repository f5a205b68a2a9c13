//! Constants for the PetZone sensing core
//!
//! Centralized defaults used throughout the pipeline. All capacities here are
//! compile-time fixed: apparent "growth" anywhere in the core is eviction of
//! the oldest entry, never reallocation.
//!
//! Values were chosen against the collar's radio characteristics: beacons
//! advertise at 100-250 ms intervals with +/-10-15 dB multipath noise, and the
//! control loop runs at roughly 10 Hz.

// ===== PACKET QUALITY & SMOOTHING =====

/// Minimum RSSI (dBm) for a packet to enter a sample window.
///
/// Below -95 dBm packets are dominated by noise floor artifacts and corrupt
/// the median more than they inform it.
pub const QUALITY_FLOOR_DBM: i16 = -95;

/// Per-beacon sample window capacity (packets per aggregation round)
pub const WINDOW_CAPACITY: usize = 10;

/// Minimum samples before aggregation fires on the count path
pub const MIN_SAMPLES: u8 = 4;

/// Latency budget in milliseconds.
///
/// Aggregation fires once the oldest buffered packet is this old, even if the
/// minimum sample count has not been reached, bounding end-to-end latency
/// under sparse arrival.
pub const LATENCY_BUDGET_MS: u32 = 500;

/// Fraction of samples trimmed from each end by the trimmed-mean strategy
pub const TRIM_FRACTION: f32 = 0.2;

// ===== TEMPORAL FILTER =====

/// Default IIR decay factor (higher = follow measurements more closely)
pub const DEFAULT_IIR_ALPHA: f32 = 0.3;

/// Default Kalman process noise covariance (Q)
pub const DEFAULT_PROCESS_NOISE: f32 = 0.125;

/// Default Kalman measurement noise covariance (R)
pub const DEFAULT_MEASUREMENT_NOISE: f32 = 4.0;

/// Residual variance (dB^2) below which a filter counts as converged
pub const CONVERGENCE_VARIANCE: f32 = 2.0;

/// Updates required before convergence is even considered
pub const CONVERGENCE_MIN_UPDATES: u32 = 5;

// ===== BEACON TABLE =====

/// Maximum tracked beacons (smoother slots, registry records, references)
pub const MAX_BEACONS: usize = 16;

/// Beacon expiry timeout in milliseconds: a beacon unseen this long is
/// pruned on the next maintenance pass
pub const BEACON_EXPIRY_MS: u64 = 10_000;

/// Maximum distinct locations tracked by the registry index (power of two)
pub const MAX_LOCATIONS: usize = 8;

/// RSSI threshold (dBm) above which a beacon counts as "in proximity"
pub const PROXIMITY_THRESHOLD_DBM: i16 = -65;

/// Beacon name prefix recognized by the registry parser
pub const BEACON_NAME_PREFIX: &str = "PetZone-";

// ===== DISTANCE MODEL =====

/// Reference power (dBm) measured at 1 m from a beacon
pub const REFERENCE_POWER_DBM: f32 = -59.0;

/// Path-loss exponent for the collar's indoor environment
pub const PATH_LOSS_EXPONENT: f32 = 2.5;

/// Distances clamp to this maximum sensing range in meters
pub const MAX_SENSING_RANGE_M: f32 = 20.0;

/// Minimum reported distance in meters (inside this the model saturates)
pub const MIN_SENSING_RANGE_M: f32 = 0.1;

// ===== TRIANGULATION =====

/// Beacons with known reference positions required for a position fix
pub const MIN_BEACONS_FOR_TRIANGULATION: usize = 3;

/// Bounded position history depth kept for callers
pub const POSITION_HISTORY: usize = 5;

// ===== ZONES =====

/// Maximum zones; occupancy is a bit per zone in a u8 mask
pub const MAX_ZONES: usize = 8;

/// Maximum polygon vertices per zone
pub const MAX_VERTICES: usize = 16;

/// Bounded FIFO depth for zone transition history
pub const TRANSITION_HISTORY: usize = 32;

/// Default alert trigger delay in milliseconds
pub const DEFAULT_ALERT_DELAY_MS: u32 = 3_000;

/// Default alert cooldown in milliseconds
pub const DEFAULT_ALERT_COOLDOWN_MS: u32 = 10_000;

// ===== INGESTION =====

/// Pending sighting queue depth between radio context and the main loop
pub const PENDING_SIGHTINGS: usize = 16;
