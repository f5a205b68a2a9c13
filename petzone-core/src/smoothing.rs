//! Packet quality gate, per-beacon sample windows and RSSI aggregation
//!
//! ## Overview
//!
//! First smoothing stage of the pipeline. Raw advertisement packets carry
//! +/-10-15 dB of multipath noise; feeding them straight into distance
//! conversion makes proximity decisions chatter. This module:
//!
//! 1. Rejects packets that fail the quality gate (invalid CRC, RSSI below
//!    the configurable floor), counting what it drops
//! 2. Ring-buffers accepted packets per beacon address
//! 3. Aggregates each window with an outlier-robust strategy (median or
//!    trimmed mean) and hands the aggregate to the temporal filter
//!
//! ## Latency bound
//!
//! Aggregation fires when either the window holds the configured minimum
//! sample count, or the oldest buffered packet exceeds the latency budget
//! (default 500 ms) - whichever comes first. Sparse arrival therefore delays
//! a smoothing result by at most the budget, never indefinitely.
//!
//! ## Memory model
//!
//! The smoother is an arena of `B` pre-allocated beacon slots. A packet for
//! an unknown address claims a free slot; when none is free, the globally
//! least-recently-heard slot is evicted. `add_packet` is O(B) slot lookup
//! plus O(1) ring insert with no allocation, and is the only operation safe
//! to call from radio callback context.

use heapless::Vec;

use crate::{
    buffer::{PacketWindow, RssiSample},
    constants::{LATENCY_BUDGET_MS, MIN_SAMPLES, QUALITY_FLOOR_DBM, TRIM_FRACTION},
    errors::{SensingError, SensingResult},
    filter::{FilterConfig, FilterStats, TemporalFilterState},
    time::{delta_ms, Timestamp},
    types::MacAddress,
};

/// Window aggregation strategy, selected at construction or via tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum AggregationMethod {
    /// Sort and take the middle element (lower middle on even counts)
    Median,
    /// Sort, discard a fraction per side, average the rest
    TrimmedMean,
}

/// Smoothing stage configuration with clamped setters
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SmoothingConfig {
    /// Aggregation strategy
    pub method: AggregationMethod,
    quality_floor_dbm: i16,
    min_samples: u8,
    latency_budget_ms: u32,
    trim_fraction: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            method: AggregationMethod::Median,
            quality_floor_dbm: QUALITY_FLOOR_DBM,
            min_samples: MIN_SAMPLES,
            latency_budget_ms: LATENCY_BUDGET_MS,
            trim_fraction: TRIM_FRACTION,
        }
    }
}

impl SmoothingConfig {
    /// Set the RSSI quality floor, clamped to the plausible dBm range
    pub fn set_quality_floor(&mut self, dbm: i16) {
        self.quality_floor_dbm = dbm.clamp(-120, 0);
    }

    /// Set the minimum sample count for the count-triggered path (>= 1)
    pub fn set_min_samples(&mut self, count: u8) {
        self.min_samples = count.max(1);
    }

    /// Set the latency budget, clamped to [50 ms, 5 s]
    pub fn set_latency_budget(&mut self, ms: u32) {
        self.latency_budget_ms = ms.clamp(50, 5_000);
    }

    /// Set the per-side trim fraction, clamped to [0, 0.4]
    pub fn set_trim_fraction(&mut self, fraction: f32) {
        self.trim_fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 0.4)
        } else {
            TRIM_FRACTION
        };
    }

    /// Current quality floor in dBm
    pub fn quality_floor(&self) -> i16 {
        self.quality_floor_dbm
    }

    /// Current minimum sample count
    pub fn min_samples(&self) -> u8 {
        self.min_samples
    }

    /// Current latency budget in milliseconds
    pub fn latency_budget(&self) -> u32 {
        self.latency_budget_ms
    }
}

/// Result of one aggregation round for one beacon
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SmoothingResult {
    /// Aggregated RSSI in dBm
    pub smoothed_rssi: i16,
    /// Packets that contributed to this aggregate
    pub valid_count: u8,
    /// Packets dropped by the quality gate since the previous round
    pub discarded_count: u8,
    /// Age of the oldest contributing packet when aggregation fired
    pub latency_ms: u32,
    /// When this result was produced (monotonic ms)
    pub last_update: Timestamp,
}

/// Global smoother counters for telemetry
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SmootherCounters {
    /// Packets offered to the gate
    pub processed: u32,
    /// Packets the gate rejected
    pub discarded: u32,
    /// Slots evicted because the arena was full
    pub evictions: u32,
}

/// Per-beacon slot: window, last aggregate and temporal filter state
struct BeaconSlot<const W: usize> {
    mac: MacAddress,
    window: PacketWindow<W>,
    stats: Option<SmoothingResult>,
    filter: TemporalFilterState,
    last_packet: Timestamp,
    discarded_since: u8,
}

impl<const W: usize> BeaconSlot<W> {
    fn new(mac: MacAddress, now: Timestamp) -> Self {
        Self {
            mac,
            window: PacketWindow::new(),
            stats: None,
            filter: TemporalFilterState::new(),
            last_packet: now,
            discarded_since: 0,
        }
    }
}

/// Two-stage RSSI smoother over a fixed arena of beacon slots
///
/// `B` is the arena capacity, `W` the per-beacon window capacity.
pub struct RssiSmoother<const B: usize, const W: usize> {
    slots: [Option<BeaconSlot<W>>; B],
    config: SmoothingConfig,
    filter_config: FilterConfig,
    counters: SmootherCounters,
}

impl<const B: usize, const W: usize> RssiSmoother<B, W> {
    /// Create a smoother with the given stage configurations
    pub fn new(config: SmoothingConfig, filter_config: FilterConfig) -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            config,
            filter_config,
            counters: SmootherCounters::default(),
        }
    }

    /// Gate and buffer one advertisement packet
    ///
    /// Returns `true` when the packet entered a window. Safe to call from
    /// radio callback context: bounded time, no allocation. A full arena is
    /// resolved by evicting the least-recently-heard slot, never by failing.
    pub fn add_packet(&mut self, mac: MacAddress, rssi: i16, crc_valid: bool, now: Timestamp) -> bool {
        self.counters.processed = self.counters.processed.wrapping_add(1);

        if let Err(_rejection) = self.gate(rssi, crc_valid) {
            self.counters.discarded = self.counters.discarded.wrapping_add(1);
            log_debug!("smoother: {} dropped: {:?}", mac, _rejection);
            if let Some(slot) = self.slot_mut(&mac) {
                slot.discarded_since = slot.discarded_since.saturating_add(1);
            }
            return false;
        }

        let idx = self.find_or_claim(mac, now);
        if let Some(slot) = self.slots[idx].as_mut() {
            slot.window.push(RssiSample { rssi, timestamp: now });
            slot.last_packet = now;
        }
        true
    }

    /// Run due aggregations and temporal filter updates
    ///
    /// Main-loop only. Returns the number of beacons that produced a fresh
    /// smoothing result this pass.
    pub fn poll(&mut self, now: Timestamp) -> usize {
        let config = self.config;
        let filter_config = self.filter_config;
        let mut produced = 0;

        for slot in self.slots.iter_mut().flatten() {
            let count = slot.window.len();
            if count == 0 {
                continue;
            }

            let first_ts = match slot.window.first() {
                Some(sample) => sample.timestamp,
                None => continue,
            };
            let age = delta_ms(first_ts, now);

            let due = count >= config.min_samples as usize
                || age >= config.latency_budget_ms as u64;
            if !due {
                continue;
            }

            let mut values: Vec<i16, W> = Vec::new();
            for sample in slot.window.iter() {
                // Window and Vec share capacity W; push cannot fail
                let _ = values.push(sample.rssi);
            }
            values.sort_unstable();

            let smoothed = aggregate(&values, config.method, config.trim_fraction);
            slot.stats = Some(SmoothingResult {
                smoothed_rssi: smoothed,
                valid_count: count as u8,
                discarded_count: slot.discarded_since,
                latency_ms: age as u32,
                last_update: now,
            });
            slot.discarded_since = 0;
            slot.filter.update(smoothed as f32, &filter_config);

            // Drain: each result reflects a disjoint batch of packets
            slot.window.clear();
            produced += 1;
        }

        produced
    }

    /// Latest aggregated RSSI for a beacon
    pub fn smoothed_rssi(&self, mac: &MacAddress) -> SensingResult<i16> {
        self.stats(mac).map(|s| s.smoothed_rssi)
    }

    /// Latest full smoothing result for a beacon
    pub fn stats(&self, mac: &MacAddress) -> SensingResult<SmoothingResult> {
        match self.slot(mac) {
            Some(slot) => slot.stats.ok_or(SensingError::InsufficientData {
                required: self.config.min_samples as usize,
                available: slot.window.len(),
            }),
            None => Err(SensingError::InsufficientData {
                required: self.config.min_samples as usize,
                available: 0,
            }),
        }
    }

    /// Temporally filtered RSSI for a beacon
    pub fn filtered_rssi(&self, mac: &MacAddress) -> SensingResult<f32> {
        self.slot(mac)
            .and_then(|slot| slot.filter.value())
            .ok_or(SensingError::InsufficientData {
                required: 1,
                available: 0,
            })
    }

    /// Filter convergence diagnostics for a beacon
    pub fn filter_stats(&self, mac: &MacAddress) -> SensingResult<FilterStats> {
        self.slot(mac)
            .map(|slot| slot.filter.stats())
            .ok_or(SensingError::InsufficientData {
                required: 1,
                available: 0,
            })
    }

    /// Iterate beacons that have both a smoothed and a filtered value
    pub fn filtered(&self) -> impl Iterator<Item = (MacAddress, SmoothingResult, f32)> + '_ {
        self.slots.iter().flatten().filter_map(|slot| {
            let stats = slot.stats?;
            let filtered = slot.filter.value()?;
            Some((slot.mac, stats, filtered))
        })
    }

    /// Reset one beacon's temporal filter to uninitialized
    pub fn reset_filter(&mut self, mac: &MacAddress) {
        if let Some(slot) = self.slot_mut(mac) {
            slot.filter.reset();
        }
    }

    /// Reset every temporal filter
    pub fn reset_all_filters(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            slot.filter.reset();
        }
    }

    /// Drop one beacon's slot entirely
    pub fn clear(&mut self, mac: &MacAddress) -> bool {
        for entry in self.slots.iter_mut() {
            if entry.as_ref().is_some_and(|s| s.mac == *mac) {
                *entry = None;
                return true;
            }
        }
        false
    }

    /// Drop every slot and zero the counters
    pub fn clear_all(&mut self) {
        for entry in self.slots.iter_mut() {
            *entry = None;
        }
        self.counters = SmootherCounters::default();
    }

    /// Drop slots with no packet for `expiry_ms`; returns how many were dropped
    pub fn prune_stale(&mut self, now: Timestamp, expiry_ms: u64) -> usize {
        let mut dropped = 0;
        for entry in self.slots.iter_mut() {
            if let Some(slot) = entry {
                if delta_ms(slot.last_packet, now) > expiry_ms {
                    log_debug!("smoother: dropping stale slot {}", slot.mac);
                    *entry = None;
                    dropped += 1;
                }
            }
        }
        dropped
    }

    /// Number of occupied slots
    pub fn active_beacons(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Global gate/eviction counters
    pub fn counters(&self) -> SmootherCounters {
        self.counters
    }

    /// Mutable smoothing configuration (setters clamp)
    pub fn config_mut(&mut self) -> &mut SmoothingConfig {
        &mut self.config
    }

    /// Current smoothing configuration
    pub fn config(&self) -> &SmoothingConfig {
        &self.config
    }

    /// Mutable temporal filter configuration (setters clamp)
    pub fn filter_config_mut(&mut self) -> &mut FilterConfig {
        &mut self.filter_config
    }

    /// Packet quality gate
    fn gate(&self, rssi: i16, crc_valid: bool) -> SensingResult<()> {
        if !crc_valid {
            return Err(SensingError::InputRejected { reason: "bad crc" });
        }
        if rssi < self.config.quality_floor_dbm {
            return Err(SensingError::InputRejected {
                reason: "below quality floor",
            });
        }
        Ok(())
    }

    fn slot(&self, mac: &MacAddress) -> Option<&BeaconSlot<W>> {
        self.slots
            .iter()
            .flatten()
            .find(|slot| slot.mac == *mac)
    }

    fn slot_mut(&mut self, mac: &MacAddress) -> Option<&mut BeaconSlot<W>> {
        self.slots
            .iter_mut()
            .flatten()
            .find(|slot| slot.mac == *mac)
    }

    /// Find the slot for `mac`, claiming a free one or evicting the globally
    /// least-recently-heard slot when the arena is full
    fn find_or_claim(&mut self, mac: MacAddress, now: Timestamp) -> usize {
        let mut free = None;
        let mut stalest = 0;
        let mut stalest_seen = Timestamp::MAX;

        for (i, entry) in self.slots.iter().enumerate() {
            match entry {
                Some(slot) if slot.mac == mac => return i,
                Some(slot) => {
                    if slot.last_packet < stalest_seen {
                        stalest_seen = slot.last_packet;
                        stalest = i;
                    }
                }
                None => {
                    if free.is_none() {
                        free = Some(i);
                    }
                }
            }
        }

        let idx = match free {
            Some(i) => i,
            None => {
                self.counters.evictions = self.counters.evictions.wrapping_add(1);
                log_warn!("smoother: arena full, evicting {}", mac);
                stalest
            }
        };

        self.slots[idx] = Some(BeaconSlot::new(mac, now));
        idx
    }
}

/// Aggregate a sorted value slice with the chosen strategy
///
/// Median uses the lower middle on even counts so the result is always one of
/// the observed values. Trimmed mean discards `fraction` per side, with at
/// least one sample per side once the window holds five or more, and never
/// trims the slice empty.
fn aggregate(sorted: &[i16], method: AggregationMethod, fraction: f32) -> i16 {
    let n = sorted.len();
    debug_assert!(n > 0);

    match method {
        AggregationMethod::Median => sorted[(n - 1) / 2],
        AggregationMethod::TrimmedMean => {
            let mut trim = (n as f32 * fraction) as usize;
            if trim == 0 && n >= 5 {
                trim = 1;
            }
            trim = trim.min((n - 1) / 2);

            let kept = &sorted[trim..n - trim];
            let sum: i32 = kept.iter().map(|&v| v as i32).sum();
            libm::roundf(sum as f32 / kept.len() as f32) as i16
        }
    }
}
