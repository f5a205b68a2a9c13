//! End-to-end sensing pipeline: ingest, tick, alerts and telemetry
//!
//! ## Overview
//!
//! `SensingPipeline` wires the stages together behind two entry points:
//!
//! - [`SensingPipeline::ingest_advertisement`] - called from radio callback
//!   context for every received advertisement. Bounded time, no allocation:
//!   it gates the packet into the smoother and queues the (address, name)
//!   sighting for the main loop.
//! - [`SensingPipeline::tick`] - called from the main loop. Runs due
//!   aggregations, folds fresh results into the registry, estimates distance
//!   and position, updates zone membership and pushes alerts through the
//!   supplied [`AlertBridge`].
//!
//! The split keeps the heavy work (index rebuilds, polygon tests, solves)
//! off the radio path. Everything is single-threaded and cooperative; there
//! is no locking because there is no concurrent mutation.
//!
//! ## Degradation ladder
//!
//! With three or more surveyed beacons in range the pipeline produces
//! positions and zone transitions. With fewer it degrades to nearest-beacon
//! proximity: "the pet is near the Garden beacon" still works with one
//! beacon and no survey.

use heapless::Deque;

use crate::{
    config::TuningConfig,
    constants::{MAX_BEACONS, MAX_ZONES, PENDING_SIGHTINGS, WINDOW_CAPACITY},
    errors::{SensingError, SensingResult},
    filter::FilterStats,
    registry::{bounded, BeaconRecord, BeaconRegistry, RegistryCounters, LABEL_LEN, NAME_LEN},
    smoothing::{RssiSmoother, SmootherCounters},
    time::{TimeSource, Timestamp},
    triangulate::{PositionEstimate, Triangulator, TriangulatorCounters},
    types::{MacAddress, Point},
    zones::{ZoneDef, ZoneManager, ZoneTransition},
};

/// Pet proximity relative to the beacon field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ProximityState {
    /// No beacon above the proximity threshold
    #[default]
    Away,
    /// At least one beacon above the proximity threshold
    Near,
}

/// Sink for pipeline alerts
///
/// Implemented by the notification layer (MQTT bridge, buzzer driver, test
/// double). Callbacks run inside `tick` and must not block.
pub trait AlertBridge {
    /// A zone boundary was crossed
    ///
    /// `transition.name` identifies the zone; `transition.alert` already
    /// reflects the zone's policy and cooldown; `transition.delay_ms` is the
    /// grace period this layer should apply before firing, cancelling if the
    /// pet crosses back in time.
    fn zone_transition(&mut self, transition: &ZoneTransition);

    /// The overall proximity state changed
    ///
    /// `beacon` is the strongest beacon when transitioning to `Near`, absent
    /// when transitioning to `Away`.
    fn proximity_changed(&mut self, state: ProximityState, beacon: Option<&BeaconRecord>);
}

/// Bridge that discards all alerts, for headless operation and tests
#[derive(Debug, Default)]
pub struct NullBridge;

impl AlertBridge for NullBridge {
    fn zone_transition(&mut self, _transition: &ZoneTransition) {}
    fn proximity_changed(&mut self, _state: ProximityState, _beacon: Option<&BeaconRecord>) {}
}

/// What one tick produced
#[derive(Debug, Clone, Copy, Default)]
pub struct TickReport {
    /// Beacons with a fresh smoothing result this tick
    pub smoothed: usize,
    /// Beacon records expired this tick
    pub expired: usize,
    /// Position estimate, when triangulation had enough beacons
    pub position: Option<PositionEstimate>,
    /// Zone transitions emitted this tick
    pub transitions: usize,
}

/// One tracked beacon as reported on the telemetry channel
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BeaconSummary {
    /// Device address
    pub mac: MacAddress,
    /// Parsed location label
    pub location: heapless::String<LABEL_LEN>,
    /// Latest window aggregate in dBm
    pub smoothed_rssi: i16,
    /// Latest temporally filtered RSSI in dBm
    pub filtered_rssi: f32,
    /// Estimated distance in meters
    pub distance_m: f32,
    /// Temporal filter convergence diagnostics
    pub filter: FilterStats,
}

/// Point-in-time pipeline state for the telemetry channel
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TelemetrySnapshot {
    /// Ticks since construction
    pub ticks: u32,
    /// Beacons currently tracked by the registry
    pub tracked_beacons: usize,
    /// Beacon slots active in the smoother
    pub active_slots: usize,
    /// Current proximity state
    pub proximity: ProximityState,
    /// Zone occupancy bitmask
    pub occupancy: u8,
    /// Latest position estimate, if any
    pub position: Option<PositionEstimate>,
    /// Per-beacon measurements and filter diagnostics
    pub beacons: heapless::Vec<BeaconSummary, MAX_BEACONS>,
    /// Smoother gate/eviction counters
    pub smoother: SmootherCounters,
    /// Registry mutation counters
    pub registry: RegistryCounters,
    /// Solver counters
    pub triangulator: TriangulatorCounters,
    /// Sightings dropped because the pending queue was full
    pub dropped_sightings: u32,
}

/// Queued (address, name, payload) sighting awaiting the next tick
struct PendingSighting {
    mac: MacAddress,
    name: heapless::String<NAME_LEN>,
    metadata: Option<[u8; 8]>,
}

/// Latest advertised identity per address
#[derive(Clone)]
struct Identity {
    name: heapless::String<NAME_LEN>,
    metadata: Option<[u8; 8]>,
}

/// The full sensing pipeline over a monotonic clock
pub struct SensingPipeline<C: TimeSource> {
    clock: C,
    config: TuningConfig,
    smoother: RssiSmoother<MAX_BEACONS, WINDOW_CAPACITY>,
    registry: BeaconRegistry<MAX_BEACONS>,
    triangulator: Triangulator<MAX_BEACONS>,
    zones: ZoneManager<MAX_ZONES>,
    identities: heapless::FnvIndexMap<MacAddress, Identity, MAX_BEACONS>,
    pending: Deque<PendingSighting, PENDING_SIGHTINGS>,
    proximity: ProximityState,
    dropped_sightings: u32,
    ticks: u32,
}

impl<C: TimeSource> SensingPipeline<C> {
    /// Build a pipeline over the given clock and tuning
    pub fn new(clock: C, config: TuningConfig) -> Self {
        let smoother = RssiSmoother::new(config.smoothing, config.filter);
        let registry = BeaconRegistry::new(config.beacon_expiry());
        Self {
            clock,
            config,
            smoother,
            registry,
            triangulator: Triangulator::new(),
            zones: ZoneManager::new(),
            identities: heapless::FnvIndexMap::new(),
            pending: Deque::new(),
            proximity: ProximityState::Away,
            dropped_sightings: 0,
            ticks: 0,
        }
    }

    /// Feed one received advertisement into the pipeline
    ///
    /// Radio-callback safe: bounded time, no allocation, no index rebuilds.
    /// Returns whether the packet passed the quality gate.
    pub fn ingest_advertisement(
        &mut self,
        mac: MacAddress,
        name: &str,
        rssi: i16,
        crc_valid: bool,
        metadata: Option<[u8; 8]>,
    ) -> bool {
        let now = self.clock.now();
        let accepted = self.smoother.add_packet(mac, rssi, crc_valid, now);
        if !accepted {
            return false;
        }

        // Coalesce repeat sightings of the same address
        for sighting in self.pending.iter_mut() {
            if sighting.mac == mac {
                if !name.is_empty() {
                    sighting.name = bounded(name);
                }
                if metadata.is_some() {
                    sighting.metadata = metadata;
                }
                return true;
            }
        }

        if self.pending.is_full() {
            self.pending.pop_front();
            self.dropped_sightings = self.dropped_sightings.wrapping_add(1);
        }
        let _ = self.pending.push_back(PendingSighting {
            mac,
            name: bounded(name),
            metadata,
        });
        true
    }

    /// Run one main-loop pass, pushing alerts through `bridge`
    pub fn tick<B: AlertBridge>(&mut self, bridge: &mut B) -> TickReport {
        let now = self.clock.now();
        let mut report = TickReport::default();

        // Stage 1: due aggregations and temporal filtering
        report.smoothed = self.smoother.poll(now);

        // Absorb queued sightings into the identity table
        while let Some(sighting) = self.pending.pop_front() {
            let identity = Identity {
                name: sighting.name,
                metadata: sighting.metadata,
            };
            if self.identities.insert(sighting.mac, identity).is_err() {
                // Identity table full: the record will carry an empty name
                // until expiry frees a slot
                self.dropped_sightings = self.dropped_sightings.wrapping_add(1);
            }
        }

        // Stage 2: fold fresh smoothing results into the registry
        for (mac, stats, filtered) in self.smoother.filtered() {
            if stats.last_update != now {
                continue;
            }
            let distance = self.config.path_loss.distance(filtered);
            let (name, metadata) = match self.identities.get(&mac) {
                Some(identity) => (identity.name.as_str(), identity.metadata),
                None => ("", None),
            };
            self.registry
                .upsert(mac, name, stats.smoothed_rssi, filtered, distance, metadata, now);
        }

        // Stage 3: expiry
        report.expired = self.registry.prune_expired(now);
        self.smoother.prune_stale(now, self.config.beacon_expiry());
        if report.expired > 0 {
            self.prune_identities();
        }

        // Stage 4: proximity
        self.update_proximity(bridge);

        // Stage 5: position and zones, when enough beacons are usable
        match self.solve_position(now) {
            Ok(estimate) => {
                report.position = Some(estimate);
                let transitions = self.zones.update_position(estimate.position, now);
                report.transitions = transitions.len();
                for transition in &transitions {
                    bridge.zone_transition(transition);
                }
            }
            Err(SensingError::InsufficientData { .. }) => {
                // Nearest-beacon degradation: proximity above still ran
            }
            Err(err) => {
                log_warn!("pipeline: solve failed: {:?}", err);
            }
        }

        self.ticks = self.ticks.wrapping_add(1);
        report
    }

    /// Replace the zone table atomically (see [`ZoneManager::load_zones`])
    pub fn load_zones(&mut self, defs: &[ZoneDef]) -> SensingResult<usize> {
        self.zones.load_zones(defs)
    }

    /// Record a surveyed beacon position for triangulation
    pub fn set_beacon_position(&mut self, mac: MacAddress, position: Point) -> SensingResult<()> {
        self.triangulator.set_beacon_position(mac, position)
    }

    /// Apply a new tuning configuration to every stage
    pub fn apply_config(&mut self, config: TuningConfig) {
        self.config = config;
        *self.smoother.config_mut() = config.smoothing;
        *self.smoother.filter_config_mut() = config.filter;
        self.registry.set_expiry(config.beacon_expiry());
        log_debug!("pipeline: configuration applied");
    }

    /// Current tuning configuration
    pub fn config(&self) -> &TuningConfig {
        &self.config
    }

    /// Current proximity state
    pub fn proximity(&self) -> ProximityState {
        self.proximity
    }

    /// Beacon directory, for queries
    pub fn registry(&self) -> &BeaconRegistry<MAX_BEACONS> {
        &self.registry
    }

    /// Zone state, for queries
    pub fn zones(&self) -> &ZoneManager<MAX_ZONES> {
        &self.zones
    }

    /// Latest position estimate, if any solve has succeeded
    pub fn last_position(&self) -> Option<&PositionEstimate> {
        self.triangulator.last_estimate()
    }

    /// Clock access, primarily for tests driving a fixed time source
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Point-in-time state for the telemetry channel
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let mut beacons: heapless::Vec<BeaconSummary, MAX_BEACONS> = heapless::Vec::new();
        for record in self.registry.iter() {
            let filter = self.smoother.filter_stats(&record.mac).unwrap_or_default();
            let _ = beacons.push(BeaconSummary {
                mac: record.mac,
                location: record.location.clone(),
                smoothed_rssi: record.smoothed_rssi,
                filtered_rssi: record.filtered_rssi,
                distance_m: record.distance_m,
                filter,
            });
        }

        TelemetrySnapshot {
            ticks: self.ticks,
            tracked_beacons: self.registry.len(),
            active_slots: self.smoother.active_beacons(),
            proximity: self.proximity,
            occupancy: self.zones.occupancy(),
            position: self.triangulator.last_estimate().copied(),
            beacons,
            smoother: self.smoother.counters(),
            registry: self.registry.counters(),
            triangulator: self.triangulator.counters(),
            dropped_sightings: self.dropped_sightings,
        }
    }

    fn update_proximity<B: AlertBridge>(&mut self, bridge: &mut B) {
        let threshold = self.config.proximity_threshold() as f32;
        let strongest = self
            .registry
            .iter()
            .filter(|r| r.filtered_rssi >= threshold)
            .max_by(|a, b| match a.filtered_rssi.partial_cmp(&b.filtered_rssi) {
                Some(ordering) => ordering,
                None => core::cmp::Ordering::Equal,
            })
            .map(|r| r.mac);

        let state = if strongest.is_some() {
            ProximityState::Near
        } else {
            ProximityState::Away
        };

        if state != self.proximity {
            self.proximity = state;
            let record = strongest.and_then(|mac| self.registry.get(&mac));
            log_warn!("pipeline: proximity -> {:?}", state);
            bridge.proximity_changed(state, record);
        }
    }

    fn solve_position(&mut self, now: Timestamp) -> SensingResult<PositionEstimate> {
        let mut measurements: heapless::Vec<(MacAddress, f32), MAX_BEACONS> = heapless::Vec::new();
        for record in self.registry.iter() {
            let _ = measurements.push((record.mac, record.distance_m));
        }
        self.triangulator.solve(&measurements, now)
    }

    /// Drop identity entries for beacons the registry no longer tracks
    fn prune_identities(&mut self) {
        let mut stale: heapless::Vec<MacAddress, MAX_BEACONS> = heapless::Vec::new();
        for mac in self.identities.keys() {
            if self.registry.get(mac).is_none() {
                let _ = stale.push(*mac);
            }
        }
        for mac in &stale {
            self.identities.remove(mac);
        }
    }
}
