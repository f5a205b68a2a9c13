//! Time management for the collar firmware
//!
//! Provides a clock abstraction over the different time sources available:
//! - Monotonic tick counter (the normal case on the collar)
//! - System clock (host testing, std only)
//! - Fixed clock (deterministic tests)
//!
//! A single monotonic millisecond timestamp is shared across the packet
//! latency budget and the beacon/zone expiry logic, so every component agrees
//! on what "now" means within a tick.

use core::sync::atomic::{AtomicU32, Ordering};

/// Timestamp in milliseconds since device boot (monotonic) or epoch
pub type Timestamp = u64;

/// Source of time for the pipeline
pub trait TimeSource {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;

    /// Check if this source provides wall clock time (vs monotonic)
    fn is_wall_clock(&self) -> bool;

    /// Get precision in milliseconds
    fn precision_ms(&self) -> u32;
}

/// Shared millisecond tick counter, bumped by the platform timer interrupt
static MONOTONIC_MS: AtomicU32 = AtomicU32::new(0);

/// Monotonic time source backed by a shared millisecond tick counter
///
/// Starts at 0 on boot. The embedded integration calls
/// [`MonotonicTime::advance`] from its periodic timer interrupt; every
/// instance reads the same counter, so the radio callback and the main loop
/// agree on "now". The counter is 32 bits and wraps after roughly 49 days
/// of uptime.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicTime;

impl MonotonicTime {
    /// Create a handle on the shared counter
    pub fn new() -> Self {
        Self
    }

    /// Advance the shared counter by `ms`
    ///
    /// A relaxed atomic add, callable from interrupt context. Typically
    /// wired to a 1 kHz timer with `ms = 1`.
    pub fn advance(ms: u32) {
        MONOTONIC_MS.fetch_add(ms, Ordering::Relaxed);
    }
}

impl TimeSource for MonotonicTime {
    fn now(&self) -> Timestamp {
        MONOTONIC_MS.load(Ordering::Relaxed) as Timestamp
    }

    fn is_wall_clock(&self) -> bool {
        false
    }

    fn precision_ms(&self) -> u32 {
        1
    }
}

/// System time source (requires std)
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct SystemTime;

#[cfg(feature = "std")]
impl TimeSource for SystemTime {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime as StdSystemTime, UNIX_EPOCH};

        StdSystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }

    fn is_wall_clock(&self) -> bool {
        true
    }

    fn precision_ms(&self) -> u32 {
        1
    }
}

/// Fixed time source for deterministic tests
#[derive(Debug, Clone)]
pub struct FixedTime {
    timestamp: Timestamp,
}

impl FixedTime {
    /// Create a fixed source at the given timestamp
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    /// Set the current timestamp
    pub fn set(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    /// Advance the clock by `ms` milliseconds
    pub fn advance(&mut self, ms: u64) {
        self.timestamp += ms;
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> Timestamp {
        self.timestamp
    }

    fn is_wall_clock(&self) -> bool {
        false
    }

    fn precision_ms(&self) -> u32 {
        1
    }
}

/// Saturating delta between two timestamps in milliseconds
pub fn delta_ms(earlier: Timestamp, later: Timestamp) -> u64 {
    later.saturating_sub(earlier)
}
