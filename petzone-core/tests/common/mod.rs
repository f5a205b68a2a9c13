//! Shared helpers for integration tests
//!
//! Deterministic RSSI trace generation (seeded LCG, no external RNG) plus a
//! recording alert bridge. Traces model what the collar actually sees:
//! a stable baseline, bounded multipath noise and occasional large spikes.

#![allow(dead_code)]

use petzone_core::{
    pipeline::{AlertBridge, ProximityState},
    registry::BeaconRecord,
    types::{MacAddress, Point},
    zones::{AlertPolicy, ZoneDef, ZoneTransition},
};

/// Deterministic pseudo-random RSSI trace generator
pub struct TraceGenerator {
    state: u32,
}

impl TraceGenerator {
    pub fn new(seed: u32) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u32(&mut self) -> u32 {
        // Numerical Recipes LCG; quality is irrelevant, determinism is not
        self.state = self.state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.state
    }

    /// Uniform value in [-amplitude, amplitude]
    pub fn noise(&mut self, amplitude: i16) -> i16 {
        let span = (amplitude as i32) * 2 + 1;
        ((self.next_u32() % span as u32) as i32 - amplitude as i32) as i16
    }

    /// Baseline trace with +/-2 dB noise and a +15 dB multipath spike at
    /// every `spike_every`-th sample (0 disables spikes)
    pub fn rssi_trace(&mut self, base: i16, len: usize, spike_every: usize) -> Vec<i16> {
        (0..len)
            .map(|i| {
                let mut rssi = base + self.noise(2);
                if spike_every != 0 && i % spike_every == spike_every - 1 {
                    rssi += 15;
                }
                rssi
            })
            .collect()
    }
}

/// Test MAC with a fixed prefix
pub fn mac(last: u8) -> MacAddress {
    MacAddress::new([0x5E, 0x77, 0x00, 0x00, 0x00, last])
}

/// Axis-aligned rectangular zone
pub fn rect_zone(id: u8, name: &str, x0: f32, y0: f32, x1: f32, y1: f32) -> ZoneDef {
    let mut zone_name = heapless::String::new();
    zone_name.push_str(name).unwrap();
    let mut vertices = heapless::Vec::new();
    for (x, y) in [(x0, y0), (x1, y0), (x1, y1), (x0, y1)] {
        vertices.push(Point::new(x, y)).unwrap();
    }
    ZoneDef {
        id,
        name: zone_name,
        color: 0x2E8B57,
        vertices,
        policy: AlertPolicy::default(),
    }
}

/// Bridge that records everything it is told
#[derive(Default)]
pub struct RecordingBridge {
    pub transitions: Vec<ZoneTransition>,
    pub proximity_changes: Vec<ProximityState>,
}

impl AlertBridge for RecordingBridge {
    fn zone_transition(&mut self, transition: &ZoneTransition) {
        self.transitions.push(transition.clone());
    }

    fn proximity_changed(&mut self, state: ProximityState, _beacon: Option<&BeaconRecord>) {
        self.proximity_changes.push(state);
    }
}
