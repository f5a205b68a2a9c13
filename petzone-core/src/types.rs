//! Shared plain data types used across the pipeline
//!
//! These are the small Copy types that cross component boundaries: beacon
//! addresses and 2D points in the zone coordinate space. Both axes of the
//! coordinate space run 0-100 (percentage of the monitored area), matching
//! the zone configuration delivered by the web application.

use core::fmt;

/// BLE device address, the unique key for every per-beacon table
///
/// Stored as raw octets so it stays `Copy` and hashable without allocation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Create from raw octets
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Parse the canonical `AA:BB:CC:DD:EE:FF` form
    ///
    /// Returns `None` for anything that is not exactly six colon-separated
    /// hex octets. Case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        let mut octets = [0u8; 6];
        let mut count = 0;

        for part in s.split(':') {
            if count == 6 || part.len() != 2 {
                return None;
            }
            octets[count] = u8::from_str_radix(part, 16).ok()?;
            count += 1;
        }

        if count == 6 {
            Some(Self(octets))
        } else {
            None
        }
    }

    /// Get the raw octets
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// 2D point in the zone coordinate space (0-100 on both axes)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Point {
    /// Horizontal coordinate
    pub x: f32,
    /// Vertical coordinate
    pub y: f32,
}

impl Point {
    /// Create a point
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        libm::sqrtf(dx * dx + dy * dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_mac() {
        let mac = MacAddress::parse("AA:BB:CC:DD:EE:FF").unwrap();
        assert_eq!(mac.octets(), [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

        // Lowercase accepted
        let lower = MacAddress::parse("aa:bb:cc:dd:ee:ff").unwrap();
        assert_eq!(mac, lower);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(MacAddress::parse("").is_none());
        assert!(MacAddress::parse("AA:BB:CC:DD:EE").is_none());
        assert!(MacAddress::parse("AA:BB:CC:DD:EE:FF:00").is_none());
        assert!(MacAddress::parse("AA:BB:CC:DD:EE:GG").is_none());
        assert!(MacAddress::parse("AABBCCDDEEFF").is_none());
    }

    #[test]
    fn display_round_trips() {
        let mac = MacAddress::new([0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC]);
        // Display uses the canonical form parse accepts
        let shown = {
            #[cfg(feature = "std")]
            {
                format!("{}", mac)
            }
            #[cfg(not(feature = "std"))]
            {
                let mut s: heapless::String<17> = heapless::String::new();
                core::fmt::write(&mut s, format_args!("{}", mac)).unwrap();
                s
            }
        };
        assert_eq!(MacAddress::parse(&shown), Some(mac));
    }

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-6);
    }
}
