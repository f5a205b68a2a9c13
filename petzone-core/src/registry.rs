//! Beacon registry: identity, name parsing, grouping and expiry
//!
//! ## Overview
//!
//! The registry is the pipeline's directory of known beacons. The smoother
//! answers "how strong is this address"; the registry answers "what *is*
//! this address": which location it marks, what priority that location
//! carries, how long ago it was last heard.
//!
//! Beacon names follow the `PetZone-<location>[-<zone>]-<id>` convention
//! programmed into the beacons at deployment. Names that do not match fall
//! back to location `"Unknown"` and id `"00"` rather than being rejected -
//! an unnamed beacon is still a signal source worth tracking.
//!
//! Records expire after a configurable silence (default 10 s) and are
//! removed outright, so a re-sighted beacon starts a fresh lifetime with a
//! new `first_seen`.
//!
//! A secondary location index groups addresses by location label for the
//! "which beacons mark the kitchen" style of query. It is rebuilt wholesale
//! after every mutation; with at most 16 records that is cheaper and simpler
//! than incremental maintenance.

use heapless::{FnvIndexMap, String, Vec};

use crate::{
    constants::{BEACON_NAME_PREFIX, MAX_LOCATIONS},
    time::{delta_ms, Timestamp},
    types::MacAddress,
};

/// Longest stored beacon name
pub const NAME_LEN: usize = 32;
/// Longest location or zone label
pub const LABEL_LEN: usize = 16;
/// Longest individual beacon id suffix
pub const ID_LEN: usize = 8;

/// Role a beacon plays, derived from its location token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum BeaconFunction {
    /// Marks a safe area (`Safe`)
    Safety,
    /// Marks an area that should raise attention (`Alert`)
    Alerting,
    /// Waypoint for movement tracking (`Track`)
    Tracking,
    /// Marks the feeding station (`Feed`)
    Feeding,
    /// Plain location marker
    #[default]
    General,
}

/// One tracked beacon and its latest derived measurements
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BeaconRecord {
    /// Device address, the registry key
    pub mac: MacAddress,
    /// Advertised name as received
    pub name: String<NAME_LEN>,
    /// Location label parsed from the name, `"Unknown"` when unparseable
    pub location: String<LABEL_LEN>,
    /// Optional zone label from the four-token name form
    pub zone: Option<String<LABEL_LEN>>,
    /// Individual id suffix, `"00"` when unparseable
    pub beacon_id: String<ID_LEN>,
    /// Role derived from the location token
    pub function: BeaconFunction,
    /// Alerting priority derived from the location (1 = highest)
    pub priority: u8,
    /// Latest window-aggregated RSSI in dBm
    pub smoothed_rssi: i16,
    /// Latest temporally filtered RSSI in dBm
    pub filtered_rssi: f32,
    /// Latest path-loss distance estimate in meters
    pub distance_m: f32,
    /// First sighting of the current lifetime (monotonic ms)
    pub first_seen: Timestamp,
    /// Most recent sighting (monotonic ms)
    pub last_seen: Timestamp,
    /// Updates folded into this record since `first_seen`
    pub sightings: u32,
    /// Opaque manufacturer payload from the latest advertisement
    pub metadata: Option<[u8; 8]>,
}

/// Registry mutation counters for telemetry
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RegistryCounters {
    /// New records created
    pub inserts: u32,
    /// Existing records refreshed
    pub updates: u32,
    /// Records dropped to make room
    pub evictions: u32,
    /// Records dropped by expiry
    pub expirations: u32,
    /// Beacons absent from the location index after the latest rebuild
    /// because the distinct labels exceeded its capacity. A gauge, not a
    /// running total: reset on every rebuild.
    pub unindexed: u32,
}

/// Parsed fields of a conforming beacon name
struct ParsedName {
    location: String<LABEL_LEN>,
    zone: Option<String<LABEL_LEN>>,
    beacon_id: String<ID_LEN>,
}

/// Fixed-capacity beacon directory keyed by device address
///
/// `B` is the record capacity and must be a power of two (index map
/// requirement). A full registry evicts its least-recently-seen record to
/// admit a new sighting.
pub struct BeaconRegistry<const B: usize> {
    records: FnvIndexMap<MacAddress, BeaconRecord, B>,
    by_location: FnvIndexMap<String<LABEL_LEN>, Vec<MacAddress, B>, MAX_LOCATIONS>,
    expiry_ms: u64,
    counters: RegistryCounters,
}

impl<const B: usize> BeaconRegistry<B> {
    /// Create an empty registry with the given silence expiry
    pub fn new(expiry_ms: u64) -> Self {
        Self {
            records: FnvIndexMap::new(),
            by_location: FnvIndexMap::new(),
            expiry_ms,
            counters: RegistryCounters::default(),
        }
    }

    /// Insert or refresh a beacon record from a fresh measurement set
    ///
    /// Main-loop only: a full registry triggers an eviction scan and every
    /// mutation rebuilds the location index.
    pub fn upsert(
        &mut self,
        mac: MacAddress,
        name: &str,
        smoothed_rssi: i16,
        filtered_rssi: f32,
        distance_m: f32,
        metadata: Option<[u8; 8]>,
        now: Timestamp,
    ) {
        if let Some(record) = self.records.get_mut(&mac) {
            let renamed = record.name.as_str() != name;
            if renamed {
                let parsed = parse_name(name);
                record.name = bounded(name);
                record.location = parsed.location;
                record.zone = parsed.zone;
                record.beacon_id = parsed.beacon_id;
                record.function = location_function(record.location.as_str());
                record.priority = location_priority(record.location.as_str());
            }
            record.smoothed_rssi = smoothed_rssi;
            record.filtered_rssi = filtered_rssi;
            record.distance_m = distance_m;
            if metadata.is_some() {
                record.metadata = metadata;
            }
            record.last_seen = now;
            record.sightings = record.sightings.wrapping_add(1);
            self.counters.updates = self.counters.updates.wrapping_add(1);
            if renamed {
                self.rebuild_location_index();
            }
            return;
        }

        if self.records.len() == B {
            self.evict_stalest();
        }

        let parsed = parse_name(name);
        let function = location_function(parsed.location.as_str());
        let priority = location_priority(parsed.location.as_str());
        let record = BeaconRecord {
            mac,
            name: bounded(name),
            location: parsed.location,
            zone: parsed.zone,
            beacon_id: parsed.beacon_id,
            function,
            priority,
            smoothed_rssi,
            filtered_rssi,
            distance_m,
            first_seen: now,
            last_seen: now,
            sightings: 1,
            metadata,
        };

        // Capacity was freed above; insert cannot fail
        let _ = self.records.insert(mac, record);
        self.counters.inserts = self.counters.inserts.wrapping_add(1);
        log_debug!("registry: new beacon {} ({})", mac, name);
        self.rebuild_location_index();
    }

    /// Remove records silent for longer than the expiry; returns how many
    pub fn prune_expired(&mut self, now: Timestamp) -> usize {
        let expiry = self.expiry_ms;
        let mut expired: Vec<MacAddress, B> = Vec::new();
        for (mac, record) in self.records.iter() {
            if delta_ms(record.last_seen, now) > expiry {
                let _ = expired.push(*mac);
            }
        }

        for mac in &expired {
            self.records.remove(mac);
            self.counters.expirations = self.counters.expirations.wrapping_add(1);
            log_debug!("registry: beacon {} expired", mac);
        }

        if !expired.is_empty() {
            self.rebuild_location_index();
        }
        expired.len()
    }

    /// Look up one record
    pub fn get(&self, mac: &MacAddress) -> Option<&BeaconRecord> {
        self.records.get(mac)
    }

    /// Remove one record; returns whether it existed
    pub fn remove(&mut self, mac: &MacAddress) -> bool {
        let removed = self.records.remove(mac).is_some();
        if removed {
            self.rebuild_location_index();
        }
        removed
    }

    /// Iterate all records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &BeaconRecord> {
        self.records.values()
    }

    /// Addresses grouped under a location label
    pub fn beacons_at(&self, location: &str) -> &[MacAddress] {
        self.by_location
            .iter()
            .find(|(label, _)| label.as_str() == location)
            .map(|(_, macs)| macs.as_slice())
            .unwrap_or(&[])
    }

    /// Iterate distinct location labels currently represented
    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.by_location.keys().map(|label| label.as_str())
    }

    /// Iterate records with a given derived function
    pub fn by_function(&self, function: BeaconFunction) -> impl Iterator<Item = &BeaconRecord> {
        self.records.values().filter(move |r| r.function == function)
    }

    /// Strongest (filtered RSSI) record at a location, if any
    pub fn strongest_at(&self, location: &str) -> Option<&BeaconRecord> {
        self.records
            .values()
            .filter(|r| r.location.as_str() == location)
            .max_by(|a, b| match a.filtered_rssi.partial_cmp(&b.filtered_rssi) {
                Some(ordering) => ordering,
                None => core::cmp::Ordering::Equal,
            })
    }

    /// Iterate records whose filtered RSSI meets a threshold
    pub fn in_range(&self, threshold_dbm: f32) -> impl Iterator<Item = &BeaconRecord> + '_ {
        self.records
            .values()
            .filter(move |r| r.filtered_rssi >= threshold_dbm)
    }

    /// Record with the smallest distance estimate
    pub fn closest(&self) -> Option<&BeaconRecord> {
        self.records
            .values()
            .min_by(|a, b| match a.distance_m.partial_cmp(&b.distance_m) {
                Some(ordering) => ordering,
                None => core::cmp::Ordering::Equal,
            })
    }

    /// Highest-priority record within the given distance
    ///
    /// Priority 1 beats priority 5; ties go to the closer beacon.
    pub fn highest_priority_within(&self, range_m: f32) -> Option<&BeaconRecord> {
        self.records
            .values()
            .filter(|r| r.distance_m <= range_m)
            .min_by(|a, b| {
                a.priority.cmp(&b.priority).then_with(|| {
                    match a.distance_m.partial_cmp(&b.distance_m) {
                        Some(ordering) => ordering,
                        None => core::cmp::Ordering::Equal,
                    }
                })
            })
    }

    /// Number of tracked beacons
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Mutation counters
    pub fn counters(&self) -> RegistryCounters {
        self.counters
    }

    /// Set the silence expiry, clamped to [1 s, 10 min]
    pub fn set_expiry(&mut self, expiry_ms: u64) {
        self.expiry_ms = expiry_ms.clamp(1_000, 600_000);
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.records.clear();
        self.by_location.clear();
        self.counters = RegistryCounters::default();
    }

    fn evict_stalest(&mut self) {
        let stalest = self
            .records
            .iter()
            .min_by_key(|(_, record)| record.last_seen)
            .map(|(mac, _)| *mac);

        if let Some(mac) = stalest {
            self.records.remove(&mac);
            self.counters.evictions = self.counters.evictions.wrapping_add(1);
            log_warn!("registry: full, evicting {}", mac);
        }
    }

    /// Rebuild the location grouping from scratch
    ///
    /// Labels beyond the location capacity are dropped from the index (the
    /// records themselves stay queryable by address); the `unindexed`
    /// counter reports how many beacons that affects.
    fn rebuild_location_index(&mut self) {
        self.by_location.clear();
        self.counters.unindexed = 0;
        for (mac, record) in self.records.iter() {
            if let Some(macs) = self.by_location.get_mut(&record.location) {
                let _ = macs.push(*mac);
                continue;
            }
            let mut macs: Vec<MacAddress, B> = Vec::new();
            let _ = macs.push(*mac);
            if self.by_location.insert(record.location.clone(), macs).is_err() {
                self.counters.unindexed = self.counters.unindexed.wrapping_add(1);
                log_warn!("registry: location index full, {} unindexed", mac);
            }
        }
    }
}

/// Parse `PetZone-<location>[-<zone>]-<id>` into its fields
///
/// Anything that does not match the convention maps to location `"Unknown"`
/// with id `"00"`, never an error.
fn parse_name(name: &str) -> ParsedName {
    let fallback = || ParsedName {
        location: bounded("Unknown"),
        zone: None,
        beacon_id: bounded("00"),
    };

    let Some(rest) = name.strip_prefix(BEACON_NAME_PREFIX) else {
        return fallback();
    };

    let mut parts = rest.split('-');
    let (Some(first), second, third) = (parts.next(), parts.next(), parts.next()) else {
        return fallback();
    };
    if parts.next().is_some() || first.is_empty() {
        return fallback();
    }

    match (second, third) {
        // PetZone-<location>-<zone>-<id>
        (Some(zone), Some(id)) if !zone.is_empty() && !id.is_empty() => ParsedName {
            location: bounded(first),
            zone: Some(bounded(zone)),
            beacon_id: bounded(id),
        },
        // PetZone-<location>-<id>
        (Some(id), None) if !id.is_empty() => ParsedName {
            location: bounded(first),
            zone: None,
            beacon_id: bounded(id),
        },
        _ => fallback(),
    }
}

/// Role tag for a location label
fn location_function(location: &str) -> BeaconFunction {
    match location {
        "Safe" => BeaconFunction::Safety,
        "Alert" => BeaconFunction::Alerting,
        "Track" => BeaconFunction::Tracking,
        "Feed" => BeaconFunction::Feeding,
        _ => BeaconFunction::General,
    }
}

/// Alerting priority for a location label, 1 = most urgent
fn location_priority(location: &str) -> u8 {
    match location {
        "Safe" => 1,
        "Alert" => 2,
        "Home" => 3,
        "Garden" => 4,
        _ => 5,
    }
}

/// Copy a str into a fixed-capacity string, truncating on overflow
pub(crate) fn bounded<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    for ch in s.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}
