//! Polygon zones, membership bitmask and entry/exit transition detection
//!
//! ## Overview
//!
//! Zones are polygons in the shared 0-100 coordinate space, configured from
//! the web application and held in a fixed-capacity table. Each position
//! update computes an occupancy bitmask (bit k = inside zone k), diffs it
//! against the previous mask and emits one transition per changed bit.
//!
//! ## Membership rule
//!
//! Point-in-polygon uses ray casting with a half-open vertical span per edge
//! and a strict horizontal crossing test. The practical consequence for the
//! boundary: points on a zone's left or bottom edge count as inside, points
//! on the right or top edge as outside. Adjacent zones sharing an edge
//! therefore never both claim the same point, and a pet walking the shared
//! boundary produces one transition, not a flicker.
//!
//! ## Alerting
//!
//! Each zone carries an alert policy: an actuation mode (buzzer, vibration,
//! both, or none), a trigger delay and a cooldown. The cooldown is enforced
//! here so a pet pacing the boundary cannot flood the alert channel; the
//! delay and mode are forwarded on the transition for the notification layer
//! to apply, since only that layer can cancel a pending alert when the pet
//! crosses back in time.
//!
//! ## Reconfiguration
//!
//! `load_zones` is all-or-nothing: the new set is validated in full before
//! the active table is touched, so a bad config leaves the previous zones
//! running instead of a half-loaded table.

use heapless::{Deque, String, Vec};

use crate::{
    constants::{
        DEFAULT_ALERT_COOLDOWN_MS, DEFAULT_ALERT_DELAY_MS, MAX_VERTICES, TRANSITION_HISTORY,
    },
    errors::{SensingError, SensingResult},
    time::{delta_ms, Timestamp},
    types::Point,
};

/// Longest zone name
pub const ZONE_NAME_LEN: usize = 16;

/// Which actuator a zone alert drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum AlertMode {
    /// Track the zone silently
    None,
    /// Audible alert
    #[default]
    Buzzer,
    /// Haptic alert
    Vibration,
    /// Both actuators
    Both,
}

/// Per-zone alerting policy
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AlertPolicy {
    /// Actuation for this zone's alerts
    pub mode: AlertMode,
    /// Grace period before the alert fires; the notification layer applies
    /// it and cancels if the pet crosses back in time
    pub trigger_delay_ms: u32,
    /// Minimum spacing between alerts for the same zone
    pub cooldown_ms: u32,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            mode: AlertMode::Buzzer,
            trigger_delay_ms: DEFAULT_ALERT_DELAY_MS,
            cooldown_ms: DEFAULT_ALERT_COOLDOWN_MS,
        }
    }
}

/// Zone definition as delivered by configuration
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ZoneDef {
    /// Stable identifier assigned by the configuring application
    pub id: u8,
    /// Display name
    pub name: String<ZONE_NAME_LEN>,
    /// Display color (0xRRGGBB), carried for the UI, unused here
    pub color: u32,
    /// Polygon vertices in order (either winding)
    pub vertices: Vec<Point, MAX_VERTICES>,
    /// Alerting policy
    pub policy: AlertPolicy,
}

/// One boundary crossing
///
/// Carries the zone name captured at detection time, so history entries stay
/// meaningful even after a reload replaces the zone table.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ZoneTransition {
    /// Identifier of the crossed zone
    pub zone_id: u8,
    /// Name of the crossed zone
    pub name: String<ZONE_NAME_LEN>,
    /// `true` for entry, `false` for exit
    pub entered: bool,
    /// When the crossing was detected (monotonic ms)
    pub timestamp: Timestamp,
    /// Position that caused the crossing
    pub position: Point,
    /// Whether the zone's policy (mode and cooldown) wants an alert
    pub alert: bool,
    /// Actuation mode, forwarded for the notification layer
    pub mode: AlertMode,
    /// Policy trigger delay, forwarded for the notification layer
    pub delay_ms: u32,
}

/// Active zone with precomputed bounds and alert bookkeeping
struct Zone {
    def: ZoneDef,
    min: Point,
    max: Point,
    last_alert: Option<Timestamp>,
}

impl Zone {
    fn from_def(def: ZoneDef) -> Self {
        let mut min = Point::new(f32::MAX, f32::MAX);
        let mut max = Point::new(f32::MIN, f32::MIN);
        for v in &def.vertices {
            min.x = min.x.min(v.x);
            min.y = min.y.min(v.y);
            max.x = max.x.max(v.x);
            max.y = max.y.max(v.y);
        }
        Self {
            def,
            min,
            max,
            last_alert: None,
        }
    }

    fn contains(&self, p: &Point) -> bool {
        // Bounding box rejects most points before the edge walk
        if p.x < self.min.x || p.x > self.max.x || p.y < self.min.y || p.y > self.max.y {
            return false;
        }
        point_in_polygon(p, &self.def.vertices)
    }
}

/// Zone table, occupancy tracking and transition history
///
/// `Z` is the zone table capacity. The occupancy bitmask is a `u8`, so
/// [`ZoneManager::load_zones`] accepts at most 8 zones regardless of `Z`.
pub struct ZoneManager<const Z: usize> {
    zones: Vec<Zone, Z>,
    occupancy: u8,
    history: Deque<ZoneTransition, TRANSITION_HISTORY>,
    reloads: u32,
}

impl<const Z: usize> ZoneManager<Z> {
    /// Create a manager with no zones loaded
    pub fn new() -> Self {
        Self {
            zones: Vec::new(),
            occupancy: 0,
            history: Deque::new(),
            reloads: 0,
        }
    }

    /// Replace the zone table atomically
    ///
    /// The whole set is validated before the active table changes; any
    /// invalid definition rejects the load and keeps the previous zones
    /// running. Occupancy resets so the next position update re-derives
    /// membership against the new geometry.
    pub fn load_zones(&mut self, defs: &[ZoneDef]) -> SensingResult<usize> {
        // Occupancy is one bit per zone in a u8, so at most 8 even when the
        // table capacity Z is larger
        if defs.len() > Z.min(8) {
            return Err(SensingError::ConfigurationInvalid {
                reason: "too many zones",
            });
        }

        let mut staged: Vec<Zone, Z> = Vec::new();
        for def in defs {
            validate_def(def)?;
            let _ = staged.push(Zone::from_def(def.clone()));
        }

        self.zones = staged;
        self.occupancy = 0;
        self.reloads = self.reloads.wrapping_add(1);
        log_debug!("zones: loaded {} zones", self.zones.len());
        Ok(self.zones.len())
    }

    /// Fold a position estimate in, returning the boundary crossings
    ///
    /// Re-reporting the same position (or any position with unchanged
    /// membership) returns no transitions. Callers only invoke this with a
    /// valid estimate; while the position is unknown, occupancy holds its
    /// previous value.
    pub fn update_position(&mut self, position: Point, now: Timestamp) -> Vec<ZoneTransition, Z> {
        let mut mask = 0u8;
        for (k, zone) in self.zones.iter().enumerate() {
            if zone.contains(&position) {
                mask |= 1 << k;
            }
        }

        let changed = mask ^ self.occupancy;
        let mut transitions: Vec<ZoneTransition, Z> = Vec::new();
        if changed == 0 {
            return transitions;
        }

        for (k, zone) in self.zones.iter_mut().enumerate() {
            let bit = 1u8 << k;
            if changed & bit == 0 {
                continue;
            }
            let entered = mask & bit != 0;

            let policy = zone.def.policy;
            let cooled = match zone.last_alert {
                Some(last) => delta_ms(last, now) >= policy.cooldown_ms as u64,
                None => true,
            };
            let alert = policy.mode != AlertMode::None && cooled;
            if alert {
                zone.last_alert = Some(now);
                log_warn!(
                    "zones: {} {}",
                    zone.def.name,
                    if entered { "entered" } else { "exited" }
                );
            }

            let transition = ZoneTransition {
                zone_id: zone.def.id,
                name: zone.def.name.clone(),
                entered,
                timestamp: now,
                position,
                alert,
                mode: policy.mode,
                delay_ms: policy.trigger_delay_ms,
            };

            if self.history.is_full() {
                self.history.pop_front();
            }
            let _ = self.history.push_back(transition.clone());
            let _ = transitions.push(transition);
        }

        self.occupancy = mask;
        transitions
    }

    /// Current occupancy bitmask (bit k = inside zone k)
    pub fn occupancy(&self) -> u8 {
        self.occupancy
    }

    /// Whether the pet is currently inside zone `index`
    pub fn in_zone(&self, index: usize) -> bool {
        index < self.zones.len() && self.occupancy & (1 << index) != 0
    }

    /// Whether the pet is inside any loaded zone
    pub fn in_any_zone(&self) -> bool {
        self.occupancy != 0
    }

    /// Number of loaded zones
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Name of zone `index`, if loaded
    pub fn zone_name(&self, index: usize) -> Option<&str> {
        self.zones.get(index).map(|z| z.def.name.as_str())
    }

    /// Name of the zone with configured id `zone_id`, if loaded
    pub fn zone_name_by_id(&self, zone_id: u8) -> Option<&str> {
        self.zones
            .iter()
            .find(|z| z.def.id == zone_id)
            .map(|z| z.def.name.as_str())
    }

    /// Names of the zones currently occupied
    pub fn current_zones(&self) -> impl Iterator<Item = &str> {
        self.zones
            .iter()
            .enumerate()
            .filter(|(k, _)| self.occupancy & (1 << k) != 0)
            .map(|(_, z)| z.def.name.as_str())
    }

    /// Recent transitions, oldest first
    pub fn transitions(&self) -> impl Iterator<Item = &ZoneTransition> {
        self.history.iter()
    }

    /// Number of successful zone reloads
    pub fn reload_count(&self) -> u32 {
        self.reloads
    }

    /// Drop the transition history
    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

impl<const Z: usize> Default for ZoneManager<Z> {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_def(def: &ZoneDef) -> SensingResult<()> {
    if def.name.is_empty() {
        return Err(SensingError::ConfigurationInvalid {
            reason: "zone name empty",
        });
    }
    if def.vertices.len() < 3 {
        return Err(SensingError::ConfigurationInvalid {
            reason: "polygon needs at least 3 vertices",
        });
    }
    for v in &def.vertices {
        if !v.x.is_finite() || !v.y.is_finite() {
            return Err(SensingError::ConfigurationInvalid {
                reason: "vertex not finite",
            });
        }
        if !(0.0..=100.0).contains(&v.x) || !(0.0..=100.0).contains(&v.y) {
            return Err(SensingError::ConfigurationInvalid {
                reason: "vertex outside coordinate space",
            });
        }
    }
    Ok(())
}

/// Ray casting with half-open edge spans and a strict crossing test
///
/// Horizontal edges never cross the ray; each other edge covers the
/// half-open span `[min_y, max_y)` of its endpoints, and only crossings
/// strictly right of the point count. Together these make the left/bottom
/// boundary inside and the right/top boundary outside.
fn point_in_polygon(p: &Point, vertices: &[Point]) -> bool {
    let mut inside = false;
    let mut j = vertices.len() - 1;

    for i in 0..vertices.len() {
        let (vi, vj) = (vertices[i], vertices[j]);
        if (vi.y > p.y) != (vj.y > p.y) {
            let x_cross = vj.x + (p.y - vj.y) * (vi.x - vj.x) / (vi.y - vj.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }

    inside
}
