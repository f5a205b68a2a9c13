//! Fixed-size ring window for per-beacon packet history
//!
//! ## Overview
//!
//! Each tracked beacon owns one `PacketWindow`: a circular buffer of the most
//! recent quality-gated RSSI samples, sized at compile time through const
//! generics. The aggregator reads the whole window at once (median or trimmed
//! mean), so the window favors cheap insertion over random access.
//!
//! ## Why a ring buffer?
//!
//! Advertisement packets arrive from radio callback context; the insert path
//! must be constant-time and allocation-free:
//! - O(1) insertion, oldest sample overwritten when full
//! - O(1) access to the oldest sample (drives the latency deadline)
//! - O(n) chronological iteration for aggregation
//! - Zero heap allocations
//!
//! When the window is full, the newest packet silently replaces the oldest.
//! For RSSI smoothing recent data is strictly more valuable than old data, so
//! overwrite is the right policy rather than an error.
//!
//! ## Invariants
//!
//! - `write_pos < N` and `len <= N` at all times
//! - Iteration yields samples oldest-to-newest; timestamps are non-decreasing
//!   because insertion order follows the monotonic clock

use crate::time::Timestamp;

/// Single quality-gated RSSI sample
#[derive(Debug, Clone, Copy)]
pub struct RssiSample {
    /// Signal strength in dBm
    pub rssi: i16,
    /// Arrival timestamp (monotonic ms)
    pub timestamp: Timestamp,
}

/// Fixed-size circular window of RSSI samples
///
/// `N` is the window capacity. The aggregator drains (clears) the window
/// after each smoothing round, so `N` bounds the batch size, not the lifetime
/// history.
#[derive(Clone)]
pub struct PacketWindow<const N: usize> {
    /// Storage using Option for uninitialized slots; avoids unsafe code
    data: [Option<RssiSample>; N],

    /// Index where the next write occurs, wraps at N
    write_pos: usize,

    /// Current number of valid samples, saturates at N
    len: usize,
}

impl<const N: usize> PacketWindow<N> {
    /// Create an empty window
    pub const fn new() -> Self {
        Self {
            data: [None; N],
            write_pos: 0,
            len: 0,
        }
    }

    /// Add a sample, overwriting the oldest when full
    pub fn push(&mut self, sample: RssiSample) {
        self.data[self.write_pos] = Some(sample);
        self.write_pos = (self.write_pos + 1) % N;

        if self.len < N {
            self.len += 1;
        }
    }

    /// Number of buffered samples
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the window is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if the window is full
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Oldest buffered sample, if any
    ///
    /// The aggregator compares its timestamp against the latency budget: once
    /// the oldest sample is older than the budget, smoothing fires regardless
    /// of sample count.
    pub fn first(&self) -> Option<&RssiSample> {
        if self.is_empty() {
            return None;
        }
        self.get(0)
    }

    /// Most recent sample, if any
    pub fn last(&self) -> Option<&RssiSample> {
        if self.is_empty() {
            return None;
        }

        let idx = if self.write_pos == 0 { N - 1 } else { self.write_pos - 1 };
        self.data[idx].as_ref()
    }

    /// Iterate samples from oldest to newest
    pub fn iter(&self) -> PacketWindowIter<N> {
        PacketWindowIter {
            window: self,
            index: 0,
        }
    }

    /// Drop all samples
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }

    /// Logical index lookup (0 = oldest, len-1 = newest)
    ///
    /// While the window is not full, logical and physical indices match.
    /// Once full, the oldest element sits at `write_pos`.
    fn get(&self, index: usize) -> Option<&RssiSample> {
        if index >= self.len {
            return None;
        }

        let actual = if self.len < N {
            index
        } else {
            (self.write_pos + index) % N
        };

        self.data[actual].as_ref()
    }
}

/// Iterator over window contents, oldest first
pub struct PacketWindowIter<'a, const N: usize> {
    window: &'a PacketWindow<N>,
    index: usize,
}

impl<'a, const N: usize> Iterator for PacketWindowIter<'a, N> {
    type Item = &'a RssiSample;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.window.get(self.index)?;
        self.index += 1;
        Some(item)
    }
}

impl<const N: usize> Default for PacketWindow<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(rssi: i16, timestamp: Timestamp) -> RssiSample {
        RssiSample { rssi, timestamp }
    }

    #[test]
    fn empty_window() {
        let window: PacketWindow<5> = PacketWindow::new();
        assert!(window.is_empty());
        assert_eq!(window.len(), 0);
        assert!(window.first().is_none());
        assert!(window.last().is_none());
    }

    #[test]
    fn push_and_retrieve() {
        let mut window = PacketWindow::<5>::new();
        window.push(sample(-62, 1000));

        assert_eq!(window.len(), 1);
        assert_eq!(window.first().unwrap().rssi, -62);
        assert_eq!(window.last().unwrap().timestamp, 1000);
    }

    #[test]
    fn circular_overwrite_keeps_newest() {
        let mut window = PacketWindow::<3>::new();

        for i in 0..5 {
            window.push(sample(-60 - i, i as u64 * 100));
        }

        assert!(window.is_full());
        assert_eq!(window.len(), 3);

        // Oldest two were overwritten
        let values: [i16; 3] = {
            let mut out = [0i16; 3];
            for (slot, s) in out.iter_mut().zip(window.iter()) {
                *slot = s.rssi;
            }
            out
        };
        assert_eq!(values, [-62, -63, -64]);
        assert_eq!(window.first().unwrap().timestamp, 200);
    }

    #[test]
    fn iteration_is_chronological() {
        let mut window = PacketWindow::<4>::new();
        for i in 0..7 {
            window.push(sample(-60, i * 10));
        }

        let mut prev = 0;
        for s in window.iter() {
            assert!(s.timestamp >= prev);
            prev = s.timestamp;
        }
    }

    #[test]
    fn clear_resets() {
        let mut window = PacketWindow::<3>::new();
        window.push(sample(-60, 0));
        window.clear();
        assert!(window.is_empty());
        assert!(window.first().is_none());
    }
}
