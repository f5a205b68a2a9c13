//! Property-based tests for the numeric invariants the pipeline relies on

mod common;

use common::rect_zone;
use proptest::prelude::*;

use petzone_core::{
    smoothing::{AggregationMethod, RssiSmoother, SmoothingConfig},
    types::{MacAddress, Point},
    zones::ZoneManager,
    FilterConfig, PathLossModel,
};

proptest! {
    /// Weaker signal never maps to a shorter distance
    #[test]
    fn distance_is_monotonic_in_rssi(a in -100.0f32..0.0, b in -100.0f32..0.0) {
        let model = PathLossModel::default();
        let (weak, strong) = if a < b { (a, b) } else { (b, a) };
        prop_assert!(model.distance(weak) >= model.distance(strong));
    }

    /// Distance always lands inside the sensing range, whatever comes in
    #[test]
    fn distance_is_always_in_range(rssi in proptest::num::f32::ANY) {
        let model = PathLossModel::default();
        let d = model.distance(rssi);
        prop_assert!(d >= 0.1 && d <= model.max_range());
    }

    /// Both aggregation strategies stay within the window's value range
    #[test]
    fn aggregation_is_bounded_by_window(
        values in prop::collection::vec(-94i16..=-20, 1..10),
        trimmed in any::<bool>(),
    ) {
        let mut config = SmoothingConfig::default();
        config.method = if trimmed {
            AggregationMethod::TrimmedMean
        } else {
            AggregationMethod::Median
        };
        config.set_min_samples(1);

        let mac = MacAddress::new([0, 0, 0, 0, 0, 1]);
        let mut smoother: RssiSmoother<2, 10> =
            RssiSmoother::new(config, FilterConfig::default());
        for (i, &rssi) in values.iter().enumerate() {
            smoother.add_packet(mac, rssi, true, i as u64);
        }
        smoother.poll(values.len() as u64);

        let out = smoother.smoothed_rssi(&mac).unwrap();
        let min = *values.iter().min().unwrap();
        let max = *values.iter().max().unwrap();
        prop_assert!(out >= min && out <= max, "{} outside [{}, {}]", out, min, max);
    }

    /// Rectangle membership matches the half-open box rule exactly:
    /// left/bottom edges in, right/top edges out
    #[test]
    fn rectangle_membership_is_half_open(
        x0 in 0.0f32..40.0, y0 in 0.0f32..40.0,
        w in 1.0f32..50.0, h in 1.0f32..50.0,
        px in 0.0f32..100.0, py in 0.0f32..100.0,
    ) {
        let (x1, y1) = (x0 + w, y0 + h);
        let mut manager: ZoneManager<8> = ZoneManager::new();
        manager.load_zones(&[rect_zone(1, "Box", x0, y0, x1, y1)]).unwrap();

        manager.update_position(Point::new(px, py), 0);
        let expected = (x0..x1).contains(&px) && (y0..y1).contains(&py);
        prop_assert_eq!(manager.in_zone(0), expected);
    }

    /// Re-reporting a position never produces extra transitions
    #[test]
    fn repeated_position_is_idempotent(
        px in 0.0f32..100.0, py in 0.0f32..100.0,
        repeats in 2usize..6,
    ) {
        let mut manager: ZoneManager<8> = ZoneManager::new();
        manager.load_zones(&[rect_zone(1, "Box", 20.0, 20.0, 70.0, 70.0)]).unwrap();

        let first = manager.update_position(Point::new(px, py), 0).len();
        prop_assert!(first <= 1);
        for i in 1..repeats {
            let again = manager.update_position(Point::new(px, py), i as u64 * 100);
            prop_assert!(again.is_empty());
        }
    }

    /// Canonical MAC formatting parses back to the same address
    #[test]
    fn mac_display_parse_round_trip(octets in any::<[u8; 6]>()) {
        let mac = MacAddress::new(octets);
        let shown = format!("{}", mac);
        prop_assert_eq!(MacAddress::parse(&shown), Some(mac));
    }
}
