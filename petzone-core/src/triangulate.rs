//! Position estimation from per-beacon distance estimates
//!
//! ## Overview
//!
//! Given three or more beacons with surveyed positions and path-loss distance
//! estimates, the solver produces a weighted-centroid position:
//!
//! ```text
//! w_i = 1 / d_i^2
//! pos = sum(w_i * p_i) / sum(w_i)
//! ```
//!
//! Closer beacons dominate because their distance estimates are the most
//! trustworthy part of the path-loss model. The weighted centroid is not a
//! true lateration solve, but it is robust to the 20-30% distance error the
//! model produces indoors, needs no iteration, and always returns a point
//! inside the convex hull of the beacons - which matches the coordinate
//! space the zone layer operates in.
//!
//! ## Confidence
//!
//! Beacon positions are in area percent while distances are in meters, so
//! absolute residuals are meaningless. Confidence instead compares the
//! *shape* of the two distance sets: the estimate-to-beacon distances and
//! the measured distances are each normalized by their own mean, and the
//! mean absolute mismatch between the normalized sets is inverted into a
//! [0, 1] score. Consistent geometry scores near 1 regardless of units.

use heapless::{FnvIndexMap, Vec};

use crate::{
    constants::{MIN_BEACONS_FOR_TRIANGULATION, MIN_SENSING_RANGE_M, POSITION_HISTORY},
    errors::{SensingError, SensingResult},
    time::Timestamp,
    types::{MacAddress, Point},
};

/// One solved position with quality metadata
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PositionEstimate {
    /// Estimated position in zone coordinates (0-100 per axis)
    pub position: Point,
    /// Geometry-consistency score in [0, 1]
    pub confidence: f32,
    /// Beacons that contributed to the solve
    pub beacons_used: u8,
    /// When the solve ran (monotonic ms)
    pub timestamp: Timestamp,
}

/// Solver counters for telemetry
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TriangulatorCounters {
    /// Successful solves
    pub solves: u32,
    /// Attempts rejected for too few usable beacons
    pub rejected: u32,
}

/// Weighted-centroid position solver over surveyed beacon positions
///
/// `B` bounds the number of surveyed beacons and must be a power of two.
pub struct Triangulator<const B: usize> {
    positions: FnvIndexMap<MacAddress, Point, B>,
    history: Vec<PositionEstimate, POSITION_HISTORY>,
    counters: TriangulatorCounters,
}

impl<const B: usize> Triangulator<B> {
    /// Create a solver with no surveyed positions
    pub fn new() -> Self {
        Self {
            positions: FnvIndexMap::new(),
            history: Vec::new(),
            counters: TriangulatorCounters::default(),
        }
    }

    /// Record the surveyed position of a beacon
    ///
    /// Fails with `CapacityExceeded` once `B` beacons are surveyed.
    pub fn set_beacon_position(&mut self, mac: MacAddress, position: Point) -> SensingResult<()> {
        self.positions
            .insert(mac, position)
            .map(|_| ())
            .map_err(|_| SensingError::CapacityExceeded { limit: B })
    }

    /// Forget a surveyed position; returns whether it existed
    pub fn remove_beacon(&mut self, mac: &MacAddress) -> bool {
        self.positions.remove(mac).is_some()
    }

    /// Surveyed position of a beacon, if known
    pub fn beacon_position(&self, mac: &MacAddress) -> Option<Point> {
        self.positions.get(mac).copied()
    }

    /// Number of surveyed beacons
    pub fn surveyed(&self) -> usize {
        self.positions.len()
    }

    /// Solve for a position from `(address, distance)` measurements
    ///
    /// Measurements for unsurveyed addresses are skipped. At least three
    /// usable beacons are required; fewer yields `InsufficientData` and the
    /// caller falls back to nearest-beacon presence.
    pub fn solve(
        &mut self,
        measurements: &[(MacAddress, f32)],
        now: Timestamp,
    ) -> SensingResult<PositionEstimate> {
        let mut anchors: Vec<(Point, f32), B> = Vec::new();
        for (mac, distance) in measurements {
            if !distance.is_finite() {
                continue;
            }
            if let Some(position) = self.positions.get(mac) {
                let _ = anchors.push((*position, distance.max(MIN_SENSING_RANGE_M)));
            }
        }

        if anchors.len() < MIN_BEACONS_FOR_TRIANGULATION {
            self.counters.rejected = self.counters.rejected.wrapping_add(1);
            return Err(SensingError::InsufficientData {
                required: MIN_BEACONS_FOR_TRIANGULATION,
                available: anchors.len(),
            });
        }

        let mut weight_sum = 0.0f32;
        let mut x = 0.0f32;
        let mut y = 0.0f32;
        for (position, distance) in &anchors {
            let w = 1.0 / (distance * distance);
            weight_sum += w;
            x += w * position.x;
            y += w * position.y;
        }

        let position = Point::new(x / weight_sum, y / weight_sum);
        let estimate = PositionEstimate {
            position,
            confidence: geometry_confidence(&position, &anchors),
            beacons_used: anchors.len() as u8,
            timestamp: now,
        };

        if self.history.is_full() {
            self.history.remove(0);
        }
        let _ = self.history.push(estimate);
        self.counters.solves = self.counters.solves.wrapping_add(1);
        log_debug!(
            "triangulate: ({}, {}) conf {} from {} beacons",
            position.x,
            position.y,
            estimate.confidence,
            estimate.beacons_used
        );

        Ok(estimate)
    }

    /// Most recent estimate, if any solve has succeeded
    pub fn last_estimate(&self) -> Option<&PositionEstimate> {
        self.history.last()
    }

    /// Recent estimates, oldest first (up to five)
    pub fn history(&self) -> &[PositionEstimate] {
        &self.history
    }

    /// Solver counters
    pub fn counters(&self) -> TriangulatorCounters {
        self.counters
    }

    /// Drop history but keep surveyed positions
    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

impl<const B: usize> Default for Triangulator<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale-invariant consistency between solved geometry and measurements
///
/// Both distance sets are normalized by their own mean before comparison,
/// so mixing percent coordinates with meter distances cancels out.
fn geometry_confidence(estimate: &Point, anchors: &[(Point, f32)]) -> f32 {
    let n = anchors.len() as f32;

    let mut model_sum = 0.0f32;
    let mut measured_sum = 0.0f32;
    for (position, distance) in anchors {
        model_sum += estimate.distance_to(position);
        measured_sum += distance;
    }

    // Degenerate: estimate sits on every beacon, or all distances zero
    if model_sum <= f32::EPSILON || measured_sum <= f32::EPSILON {
        return 0.0;
    }

    let model_mean = model_sum / n;
    let measured_mean = measured_sum / n;

    let mut mismatch = 0.0f32;
    for (position, distance) in anchors {
        let model = estimate.distance_to(position) / model_mean;
        let measured = distance / measured_mean;
        let diff = model - measured;
        mismatch += if diff < 0.0 { -diff } else { diff };
    }

    (1.0 - mismatch / n).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_BEACONS;

    type Solver = Triangulator<MAX_BEACONS>;

    fn mac(last: u8) -> MacAddress {
        MacAddress::new([0xDE, 0xAD, 0xBE, 0xEF, 0x00, last])
    }

    /// Three beacons around the center of the area
    fn surveyed_solver() -> Solver {
        let mut t = Solver::new();
        t.set_beacon_position(mac(1), Point::new(20.0, 20.0)).unwrap();
        t.set_beacon_position(mac(2), Point::new(80.0, 20.0)).unwrap();
        t.set_beacon_position(mac(3), Point::new(50.0, 80.0)).unwrap();
        t
    }

    #[test]
    fn needs_three_usable_beacons() {
        let mut t = surveyed_solver();

        let err = t.solve(&[(mac(1), 2.0), (mac(2), 2.0)], 0).unwrap_err();
        assert!(matches!(
            err,
            SensingError::InsufficientData { required: 3, available: 2 }
        ));
        assert_eq!(t.counters().rejected, 1);
    }

    #[test]
    fn unsurveyed_addresses_are_skipped() {
        let mut t = surveyed_solver();

        // Third measurement has no surveyed position: still only 2 usable
        let err = t
            .solve(&[(mac(1), 2.0), (mac(2), 2.0), (mac(99), 2.0)], 0)
            .unwrap_err();
        assert!(matches!(err, SensingError::InsufficientData { .. }));
    }

    #[test]
    fn equal_distances_yield_centroid() {
        let mut t = surveyed_solver();

        let estimate = t
            .solve(&[(mac(1), 3.0), (mac(2), 3.0), (mac(3), 3.0)], 100)
            .unwrap();

        // Equal weights: plain centroid of the three positions
        assert!((estimate.position.x - 50.0).abs() < 0.01);
        assert!((estimate.position.y - 40.0).abs() < 0.01);
        assert_eq!(estimate.beacons_used, 3);
        assert_eq!(estimate.timestamp, 100);
    }

    #[test]
    fn estimate_pulls_toward_close_beacon() {
        let mut t = surveyed_solver();

        let estimate = t
            .solve(&[(mac(1), 0.5), (mac(2), 8.0), (mac(3), 8.0)], 0)
            .unwrap();

        // mac(1) at (20, 20) dominates with 1/d^2 weighting
        assert!(estimate.position.x < 30.0);
        assert!(estimate.position.y < 30.0);
    }

    #[test]
    fn consistent_geometry_scores_high() {
        let mut t = surveyed_solver();

        // Equidistant beacons, equal measurements: shapes match exactly
        let estimate = t
            .solve(&[(mac(1), 3.0), (mac(2), 3.0), (mac(3), 3.0)], 0)
            .unwrap();
        let consistent = estimate.confidence;

        // Same geometry, wildly inconsistent measurements
        let estimate = t
            .solve(&[(mac(1), 0.5), (mac(2), 9.0), (mac(3), 0.5)], 0)
            .unwrap();
        let inconsistent = estimate.confidence;

        assert!(consistent > inconsistent);
        assert!((0.0..=1.0).contains(&consistent));
        assert!((0.0..=1.0).contains(&inconsistent));
    }

    #[test]
    fn history_keeps_last_five() {
        let mut t = surveyed_solver();
        let measurements = [(mac(1), 3.0), (mac(2), 3.0), (mac(3), 3.0)];

        for i in 0..7u64 {
            t.solve(&measurements, i * 100).unwrap();
        }

        let history = t.history();
        assert_eq!(history.len(), POSITION_HISTORY);
        // Oldest two rolled off
        assert_eq!(history[0].timestamp, 200);
        assert_eq!(t.last_estimate().unwrap().timestamp, 600);
        assert_eq!(t.counters().solves, 7);
    }

    #[test]
    fn zero_distance_is_clamped() {
        let mut t = surveyed_solver();

        // A zero distance must not divide by zero in the weighting
        let estimate = t
            .solve(&[(mac(1), 0.0), (mac(2), 3.0), (mac(3), 3.0)], 0)
            .unwrap();
        assert!(estimate.position.x.is_finite());
        assert!(estimate.position.y.is_finite());
    }

    #[test]
    fn survey_capacity_is_enforced() {
        let mut t = Solver::new();
        for k in 0..MAX_BEACONS {
            t.set_beacon_position(mac(k as u8), Point::new(0.0, 0.0)).unwrap();
        }
        let err = t
            .set_beacon_position(mac(200), Point::new(0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, SensingError::CapacityExceeded { .. }));
    }
}
