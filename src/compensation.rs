//! Altitude-keyed azimuth deviation compensation
//!
//! A ferromagnetic optical tube close to the magnetometer perturbs the field
//! differently at every altitude, shifting the measured azimuth relative to
//! the value captured during iron calibration (which is performed near the
//! zenith). This module builds a table of that shift, one entry per half
//! degree of altitude: the tube is swung from zenith to horizontal at a
//! fixed azimuth while [`DeviationMap::add_sample`] records
//! `target − measured` per altitude bucket. During normal operation the
//! nearest recorded deviation is added back onto the raw azimuth.
//!
//! Compensation is a last resort; relocating the sensor away from the tube
//! is always the better fix.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use log::{debug, warn};

/// Default number of sweep samples: one per half degree of a 0–90° swing
pub const COMP_SAMPLES: usize = 180;

/// Hash value of the zenith bucket; upward searches turn around here
const ZENITH_HASH: i32 = 900;

/// Search step between adjacent half-degree buckets
const HASH_STEP: i32 = 5;

/// Hard cap on nearest-bucket search steps: one full climb to the zenith
/// bound plus one full descent to below zero
const MAX_SEARCH_STEPS: usize = 2 * (ZENITH_HASH / HASH_STEP) as usize + 4;

/// Bucket an altitude in degrees into a half-degree-resolution hash
///
/// `floor(altitude) * 10` plus 0, 5 or 10 depending on which quarter the
/// fractional part falls in.
///
/// # Example
/// ```
/// use telescope_compass::make_hash;
///
/// assert_eq!(make_hash(75.24887), 750);
/// assert_eq!(make_hash(75.43105), 755);
/// assert_eq!(make_hash(75.61005), 755);
/// assert_eq!(make_hash(75.86702), 760);
/// ```
pub fn make_hash(altitude: f32) -> i32 {
    let whole = altitude.floor();
    let fraction = altitude - whole;
    let add = if fraction < 0.25 {
        0
    } else if fraction < 0.75 {
        5
    } else {
        10
    };
    whole as i32 * 10 + add
}

/// Altitude-indexed table of azimuth corrections
///
/// Entries are only ever added: sweep samples during the build phase, then
/// read-through memoization of every value discovered while searching, so
/// repeated lookups of the same bucket are a single map probe.
#[derive(Debug, Clone)]
pub struct DeviationMap {
    entries: BTreeMap<i32, f32>,
    collected: usize,
    target: usize,
}

impl Default for DeviationMap {
    fn default() -> Self {
        Self::new(COMP_SAMPLES)
    }
}

impl DeviationMap {
    /// Create an empty map that will collect `target` sweep samples
    pub fn new(target: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            collected: 0,
            target,
        }
    }

    /// Rebuild a ready map from persisted `(hash, deviation)` entries
    ///
    /// The inverse of [`entries`](DeviationMap::entries); the map is
    /// immediately queryable, no sweep required.
    pub fn from_entries(entries: impl IntoIterator<Item = (i32, f32)>) -> Self {
        let entries: BTreeMap<i32, f32> = entries.into_iter().collect();
        let collected = entries.len();
        Self {
            entries,
            collected,
            target: collected,
        }
    }

    /// Record one sweep sample, returning the collection countdown
    ///
    /// `target_azimuth` is the fixed bearing the mount is held at during the
    /// sweep; `measured_azimuth` the engine's (uncompensated) output at the
    /// current `altitude`. The countdown starts at the sample target and
    /// ends at 1; once the map is full further calls are no-ops returning 0.
    pub fn add_sample(&mut self, target_azimuth: f32, altitude: f32, measured_azimuth: f32) -> usize {
        if self.collected >= self.target {
            return 0;
        }
        let delta = target_azimuth - measured_azimuth;
        let hash = make_hash(altitude);
        debug!(
            "deviation sample: altitude={:.2} hash={} delta={:.3}",
            altitude, hash, delta
        );
        self.entries.insert(hash, delta);
        self.collected += 1;
        self.target - self.collected + 1
    }

    /// Whether the build sweep has collected all its samples
    pub fn is_ready(&self) -> bool {
        self.collected >= self.target
    }

    /// Number of sweep samples still to collect
    pub fn remaining(&self) -> usize {
        self.target - self.collected.min(self.target)
    }

    /// Deviation for an altitude bucket, searching outward when absent
    ///
    /// Missing buckets are resolved by walking upward in half-degree steps
    /// toward the zenith bound, then downward once the bound is passed; a
    /// walk that drops below zero yields the 0-deviation default. Every
    /// bucket probed along the walk is memoized with the resolved value, so
    /// the next lookup of any of them is O(1). The loop is capped at one
    /// full climb plus one full descent of the bucket range.
    pub fn deviation(&mut self, hash: i32) -> f32 {
        if let Some(&delta) = self.entries.get(&hash) {
            return delta;
        }

        let mut visited: Vec<i32> = Vec::new();
        visited.push(hash);

        let mut current = hash;
        let mut descending = current > ZENITH_HASH;
        let mut resolved = 0.0;

        for _ in 0..MAX_SEARCH_STEPS {
            current = if descending {
                current - HASH_STEP
            } else {
                current + HASH_STEP
            };

            if current < 0 {
                // past the horizon with nothing found: defined zero default
                warn!("deviation search exhausted below hash 0, using 0.0");
                break;
            }

            if let Some(&delta) = self.entries.get(&current) {
                resolved = delta;
                break;
            }
            debug!(
                "deviation hash {} not found, walking {}",
                current,
                if descending { "down" } else { "up" }
            );
            visited.push(current);

            // one bucket past the zenith bound is still probed (altitudes a
            // shade over 90° hash to 905); only then does the walk turn down
            if !descending && current > ZENITH_HASH {
                descending = true;
            }
        }

        for probed in visited {
            self.entries.insert(probed, resolved);
        }
        resolved
    }

    /// Apply the deviation for `altitude` to a raw azimuth
    ///
    /// Identity until the build sweep has completed, so an engine can run
    /// with compensation disabled simply by never feeding the sweep.
    pub fn compensate(&mut self, azimuth: f32, altitude: f32) -> f32 {
        if self.is_ready() {
            azimuth + self.deviation(make_hash(altitude))
        } else {
            azimuth
        }
    }

    /// Recorded entries (including memoized ones), for host inspection
    pub fn entries(&self) -> impl Iterator<Item = (i32, f32)> + '_ {
        self.entries.iter().map(|(&hash, &delta)| (hash, delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_literal_cases() {
        assert_eq!(make_hash(75.24887), 750);
        assert_eq!(make_hash(75.43105), 755);
        assert_eq!(make_hash(75.61005), 755);
        assert_eq!(make_hash(75.86702), 760);
    }

    #[test]
    fn test_hash_band_edges() {
        assert_eq!(make_hash(10.0), 100);
        assert_eq!(make_hash(10.25), 105);
        assert_eq!(make_hash(10.75), 110);
        assert_eq!(make_hash(90.0), 900);
    }

    #[test]
    fn test_build_countdown() {
        let mut map = DeviationMap::new(3);
        assert_eq!(map.add_sample(180.0, 90.0, 179.0), 3);
        assert_eq!(map.add_sample(180.0, 89.5, 179.2), 2);
        assert!(!map.is_ready());
        assert_eq!(map.add_sample(180.0, 89.0, 179.5), 1);
        assert!(map.is_ready());

        // full map ignores further samples
        assert_eq!(map.add_sample(180.0, 88.5, 179.9), 0);
        assert_eq!(map.remaining(), 0);
    }

    #[test]
    fn test_exact_hit() {
        let mut map = DeviationMap::new(1);
        map.add_sample(180.0, 45.1, 178.5);
        assert!((map.deviation(450) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_walks_upward_to_nearest() {
        let mut map = DeviationMap::new(1);
        map.add_sample(180.0, 50.0, 178.0); // hash 500, delta 2.0

        // querying below walks up to 500
        assert!((map.deviation(480) - 2.0).abs() < 1e-6);

        // every bucket on the walk is memoized with the value found
        let entries: alloc::vec::Vec<_> = map.entries().collect();
        for expected in [480, 485, 490, 495] {
            assert!(
                entries.iter().any(|&(h, d)| h == expected && (d - 2.0).abs() < 1e-6),
                "hash {} not memoized",
                expected
            );
        }
    }

    #[test]
    fn test_above_zenith_walks_downward() {
        let mut map = DeviationMap::new(1);
        map.add_sample(180.0, 90.0, 178.0); // hash 900, delta 2.0

        // 905 is past the turnaround bound so the walk goes straight down
        assert!((map.deviation(905) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_upward_miss_turns_around() {
        let mut map = DeviationMap::new(1);
        map.add_sample(180.0, 30.0, 179.3); // hash 300, delta 0.7

        // nothing at or above 310: climbs to the bound, then descends past
        // the query point down to 300
        assert!((map.deviation(310) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_exhausted_search_returns_zero() {
        let mut map = DeviationMap::new(1);
        map.add_sample(180.0, 80.0, 179.0); // hash 800 only

        // a climb from 700 still finds the 800 entry
        assert!((map.deviation(700) - 1.0).abs() < 1e-6);

        // below every entry with nothing underneath: empty-side exhaustion
        let mut empty = DeviationMap::new(1);
        empty.add_sample(180.0, 95.0, 179.0); // hash 950, above the bound
        assert_eq!(empty.deviation(10), 0.0);
    }

    #[test]
    fn test_memoized_lookup_is_direct() {
        let mut map = DeviationMap::new(1);
        map.add_sample(180.0, 60.0, 177.5); // hash 600, delta 2.5

        assert!((map.deviation(580) - 2.5).abs() < 1e-6);
        // second lookup hits the memoized entry directly
        assert!((map.deviation(580) - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_from_entries_is_ready() {
        let mut map = DeviationMap::from_entries([(900, 2.0), (895, 1.8)]);
        assert!(map.is_ready());
        assert!((map.deviation(900) - 2.0).abs() < 1e-6);
        assert!((map.compensate(10.0, 89.6) - 11.8).abs() < 1e-6);
    }

    #[test]
    fn test_compensate_identity_until_ready() {
        let mut map = DeviationMap::new(2);
        map.add_sample(180.0, 90.0, 178.0);
        assert_eq!(map.compensate(100.0, 90.0), 100.0);

        map.add_sample(180.0, 89.5, 178.0);
        assert!((map.compensate(100.0, 90.0) - 102.0).abs() < 1e-6);
    }
}
