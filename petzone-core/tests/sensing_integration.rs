//! End-to-end tests for the sensing pipeline
//!
//! Drives the full path - advertisement ingest, smoothing, distance,
//! registry, triangulation, zones, alerts - against a deterministic clock
//! and deterministic noise traces.

mod common;

use common::{mac, rect_zone, RecordingBridge, TraceGenerator};
use petzone_core::{
    pipeline::ProximityState,
    smoothing::{AggregationMethod, RssiSmoother, SmoothingConfig},
    time::FixedTime,
    types::Point,
    FilterConfig, NullBridge, SensingPipeline, TuningConfig,
};

fn pipeline() -> SensingPipeline<FixedTime> {
    SensingPipeline::new(FixedTime::new(0), TuningConfig::default())
}

/// Feed a trace at 50 ms spacing, ticking after every 4 packets
fn feed_trace(p: &mut SensingPipeline<FixedTime>, m: petzone_core::types::MacAddress, name: &str, trace: &[i16]) {
    for chunk in trace.chunks(4) {
        for &rssi in chunk {
            p.ingest_advertisement(m, name, rssi, true, None);
            p.clock_mut().advance(50);
        }
        p.tick(&mut NullBridge);
    }
}

#[test]
fn spiky_trace_smooths_to_baseline() {
    let mut p = pipeline();
    let mut gen = TraceGenerator::new(7);

    // -60 dBm baseline, +15 dB spike every 4th packet
    let trace = gen.rssi_trace(-60, 40, 4);
    feed_trace(&mut p, mac(1), "PetZone-Home-01", &trace);

    let record = p.registry().get(&mac(1)).expect("beacon tracked");
    // Median aggregation plus temporal filtering holds near the baseline
    // despite a spike in every window
    assert!(
        (record.filtered_rssi - (-60.0)).abs() < 3.0,
        "filtered {} strayed from baseline",
        record.filtered_rssi
    );
}

#[test]
fn median_beats_plain_mean_on_spikes() {
    // The same spiky window, aggregated both ways. The mean is dragged
    // several dB toward the spike; the median is not. This is the reason
    // the aggregation stage exists.
    let window = [-60i16, -61, -59, -45, -60];
    let mean = window.iter().map(|&v| v as i32).sum::<i32>() as f32 / window.len() as f32;
    assert!((mean - (-60.0)).abs() > 2.5, "spike should drag the mean");

    let mut smoother: RssiSmoother<4, 8> =
        RssiSmoother::new(SmoothingConfig::default(), FilterConfig::default());
    for (i, &rssi) in window.iter().enumerate() {
        smoother.add_packet(mac(1), rssi, true, i as u64 * 50);
    }
    smoother.poll(250);
    let median = smoother.smoothed_rssi(&mac(1)).unwrap();
    assert!((median - (-60)).abs() <= 1, "median {} dragged by spike", median);
}

#[test]
fn smoothing_latency_stays_under_budget() {
    let mut p = pipeline();
    let m = mac(1);

    // Sparse arrival: one packet per 400 ms, never reaching min_samples
    p.ingest_advertisement(m, "PetZone-Home-01", -60, true, None);
    p.clock_mut().advance(400);
    p.tick(&mut NullBridge);
    assert!(p.registry().get(&m).is_none(), "not due yet");

    p.ingest_advertisement(m, "PetZone-Home-01", -61, true, None);
    p.clock_mut().advance(100);
    // 500 ms after the first packet the deadline forces aggregation
    p.tick(&mut NullBridge);

    let record = p.registry().get(&m).expect("deadline-driven result");
    assert_eq!(record.smoothed_rssi, -61);
}

#[test]
fn walk_across_zone_boundary() {
    let mut p = pipeline();
    p.set_beacon_position(mac(1), Point::new(20.0, 50.0)).unwrap();
    p.set_beacon_position(mac(2), Point::new(80.0, 50.0)).unwrap();
    p.set_beacon_position(mac(3), Point::new(50.0, 10.0)).unwrap();
    p.load_zones(&[rect_zone(1, "Safe", 0.0, 0.0, 50.0, 100.0)]).unwrap();

    let mut bridge = RecordingBridge::default();

    // Phase 1: pet close to the west beacon -> estimate inside "Safe"
    for _ in 0..2 {
        for (m, rssi) in [(mac(1), -50i16), (mac(2), -75), (mac(3), -70)] {
            for _ in 0..4 {
                p.ingest_advertisement(m, "", rssi, true, None);
                p.clock_mut().advance(10);
            }
        }
        p.clock_mut().advance(100);
        p.tick(&mut bridge);
    }
    assert!(p.zones().in_zone(0), "pet should start inside Safe");

    // Phase 2: signal flips east -> estimate crosses the boundary
    for _ in 0..4 {
        for (m, rssi) in [(mac(1), -80i16), (mac(2), -45), (mac(3), -70)] {
            for _ in 0..4 {
                p.ingest_advertisement(m, "", rssi, true, None);
                p.clock_mut().advance(10);
            }
        }
        p.clock_mut().advance(100);
        p.tick(&mut bridge);
    }
    assert!(!p.zones().in_zone(0), "pet should end outside Safe");

    // Exactly one entry and one exit, in that order
    let crossings: Vec<bool> = bridge.transitions.iter().map(|t| t.entered).collect();
    assert_eq!(crossings, vec![true, false]);
    assert_eq!(bridge.transitions[0].name.as_str(), "Safe");
}

#[test]
fn proximity_fallback_with_single_beacon() {
    let mut p = pipeline();
    let mut bridge = RecordingBridge::default();
    let mut gen = TraceGenerator::new(3);

    let trace = gen.rssi_trace(-55, 12, 0);
    for chunk in trace.chunks(4) {
        for &rssi in chunk {
            p.ingest_advertisement(mac(1), "PetZone-Garden-01", rssi, true, None);
            p.clock_mut().advance(50);
        }
        p.tick(&mut bridge);
    }

    // No survey, no zones: still a Near notification with the beacon
    assert_eq!(bridge.proximity_changes, vec![ProximityState::Near]);
    assert!(bridge.transitions.is_empty());
    assert_eq!(
        p.registry().get(&mac(1)).unwrap().location.as_str(),
        "Garden"
    );
}

#[test]
fn beacon_silence_expires_and_resight_is_fresh() {
    let mut p = pipeline();
    let mut gen = TraceGenerator::new(11);

    let trace = gen.rssi_trace(-60, 8, 0);
    feed_trace(&mut p, mac(1), "PetZone-Home-01", &trace);
    let first_seen = p.registry().get(&mac(1)).unwrap().first_seen;

    // Silence well past the 10 s expiry
    p.clock_mut().advance(15_000);
    p.tick(&mut NullBridge);
    assert!(p.registry().get(&mac(1)).is_none());

    // Re-sighting starts a new lifetime
    let trace = gen.rssi_trace(-60, 8, 0);
    feed_trace(&mut p, mac(1), "PetZone-Home-01", &trace);
    let record = p.registry().get(&mac(1)).unwrap();
    assert!(record.first_seen > first_seen);
}

#[test]
fn trimmed_mean_configuration_flows_through() {
    let mut config = TuningConfig::default();
    config.smoothing.method = AggregationMethod::TrimmedMean;
    // Five-sample windows so the trim has something to cut per side
    config.smoothing.set_min_samples(5);
    let mut p = SensingPipeline::new(FixedTime::new(0), config);

    let mut gen = TraceGenerator::new(5);
    // One +15 dB spike in every window
    let trace = gen.rssi_trace(-60, 20, 5);
    for chunk in trace.chunks(5) {
        for &rssi in chunk {
            p.ingest_advertisement(mac(1), "PetZone-Home-01", rssi, true, None);
            p.clock_mut().advance(40);
        }
        p.tick(&mut NullBridge);
    }

    let record = p.registry().get(&mac(1)).unwrap();
    assert!(
        (record.filtered_rssi - (-60.0)).abs() < 3.0,
        "trimmed mean {} dragged by per-window spikes",
        record.filtered_rssi
    );
}

#[test]
fn telemetry_snapshot_counts_the_session() {
    let mut p = pipeline();
    let mut gen = TraceGenerator::new(9);

    let trace = gen.rssi_trace(-60, 16, 0);
    feed_trace(&mut p, mac(1), "PetZone-Home-01", &trace);
    // A couple of garbage packets
    p.ingest_advertisement(mac(1), "PetZone-Home-01", -60, false, None);
    p.ingest_advertisement(mac(1), "PetZone-Home-01", -120, true, None);

    let snapshot = p.snapshot();
    assert_eq!(snapshot.smoother.processed, 18);
    assert_eq!(snapshot.smoother.discarded, 2);
    assert_eq!(snapshot.tracked_beacons, 1);
    assert_eq!(snapshot.registry.inserts, 1);
    assert!(snapshot.ticks >= 4);
}
