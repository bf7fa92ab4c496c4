// Copyright 2026 The Dashcam Core Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Time-indexed GPS telemetry: interpolated location lookup and distance/speed aggregates.
//!
//! Grounded directly in §4.E; the teacher has no geodesy code to imitate, so this module follows
//! the teacher's style of small, dependency-free, pure-computation modules
//! (`image_processing.rs`) rather than any corpus arithmetic.

pub mod event_detector;
pub mod nmea;

use chrono::{DateTime, Utc};

/// Earth radius used by the haversine distance calculation, in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A single GPS fix, expressed in wallclock time. Points held by a [`TelemetryStore`] are always
/// strictly sorted by `wallclock_timestamp` (I5).
#[derive(Clone, Debug, PartialEq)]
pub struct GpsPoint {
    pub wallclock_timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub heading_deg: Option<f64>,
    /// Coarse accuracy estimate. When derived from a GGA sentence's HDOP this is only a heuristic
    /// (`hdop * 10.0`), not a calibrated figure; see [`nmea`].
    pub horizontal_accuracy_m: Option<f64>,
    pub satellite_count: Option<u32>,
}

/// Haversine great-circle distance between two points, in meters.
pub fn haversine_distance_m(a: &GpsPoint, b: &GpsPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();
    EARTH_RADIUS_KM * c * 1000.0
}

/// Shortest signed arc from `from_deg` to `to_deg` on a circle of 360 degrees, in `(-180, 180]`.
/// Used so heading interpolation/delta never takes the long way around 0°/360° (see §9).
pub(crate) fn shortest_heading_delta_deg(from_deg: f64, to_deg: f64) -> f64 {
    let raw = (to_deg - from_deg) % 360.0;
    if raw > 180.0 {
        raw - 360.0
    } else if raw <= -180.0 {
        raw + 360.0
    } else {
        raw
    }
}

fn lerp(a: f64, b: f64, frac: f64) -> f64 {
    a + (b - a) * frac
}

/// Time-sorted sequence of [`GpsPoint`]s with a fixed `start_wallclock` identifying playback-time
/// zero. All lookups are expressed in playback time (seconds since `start_wallclock`).
#[derive(Clone, Debug)]
pub struct TelemetryStore {
    start_wallclock: DateTime<Utc>,
    points: Vec<GpsPoint>,
}

impl TelemetryStore {
    /// Builds a store from an already wallclock-sorted sequence of points. Panics in debug builds
    /// if the invariant is violated by the caller; callers should route points through
    /// [`nmea::GpsStreamBuilder`] which maintains the order itself.
    pub fn new(start_wallclock: DateTime<Utc>, points: Vec<GpsPoint>) -> Self {
        debug_assert!(
            points.windows(2).all(|w| w[0].wallclock_timestamp <= w[1].wallclock_timestamp),
            "GpsPoints must be sorted by wallclock_timestamp"
        );
        Self { start_wallclock, points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    fn offset_of(&self, p: &GpsPoint) -> f64 {
        (p.wallclock_timestamp - self.start_wallclock).num_microseconds().unwrap_or(i64::MAX)
            as f64
            / 1_000_000.0
    }

    /// Interpolated (or nearest-extreme) location at playback time `t`. `None` iff the store has
    /// no points. Total on the covered range (I5): beyond the last point or before the first, the
    /// nearest extreme is returned rather than `None`.
    pub fn location_at(&self, t: f64) -> Option<GpsPoint> {
        if self.points.is_empty() {
            return None;
        }
        let idx = self.points.partition_point(|p| self.offset_of(p) < t);

        if idx == 0 {
            return Some(self.points[0].clone());
        }
        if idx >= self.points.len() {
            return Some(self.points[self.points.len() - 1].clone());
        }
        let after = &self.points[idx];
        let after_offset = self.offset_of(after);
        if after_offset == t {
            return Some(after.clone());
        }
        let before = &self.points[idx - 1];
        let before_offset = self.offset_of(before);

        let span = after_offset - before_offset;
        let frac = if span <= 0.0 { 0.0 } else { (t - before_offset) / span };

        Some(GpsPoint {
            wallclock_timestamp: self.start_wallclock
                + chrono::Duration::microseconds((t * 1_000_000.0).round() as i64),
            latitude: lerp(before.latitude, after.latitude, frac),
            longitude: lerp(before.longitude, after.longitude, frac),
            altitude: match (before.altitude, after.altitude) {
                (Some(a), Some(b)) => Some(lerp(a, b, frac)),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            },
            speed_kmh: match (before.speed_kmh, after.speed_kmh) {
                (Some(a), Some(b)) => Some(lerp(a, b, frac)),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            },
            heading_deg: match (before.heading_deg, after.heading_deg) {
                (Some(a), Some(b)) => {
                    Some((a + shortest_heading_delta_deg(a, b) * frac).rem_euclid(360.0))
                }
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            },
            horizontal_accuracy_m: before.horizontal_accuracy_m.or(after.horizontal_accuracy_m),
            satellite_count: before.satellite_count.or(after.satellite_count),
        })
    }

    /// Points with playback-time offset in `[start_t, end_t]`.
    pub fn points_in(&self, start_t: f64, end_t: f64) -> Vec<GpsPoint> {
        self.points
            .iter()
            .filter(|p| {
                let off = self.offset_of(p);
                off >= start_t && off <= end_t
            })
            .cloned()
            .collect()
    }

    /// Splits the store's points into those at or before `t` and those strictly after it.
    pub fn split_at(&self, t: f64) -> (Vec<GpsPoint>, Vec<GpsPoint>) {
        let idx = self.points.partition_point(|p| self.offset_of(p) <= t);
        (self.points[..idx].to_vec(), self.points[idx..].to_vec())
    }

    /// Sum of haversine distances over consecutive points at or before `t` (meters). Monotonic
    /// non-decreasing in `t` (testable property 6).
    pub fn distance_travelled(&self, t: f64) -> f64 {
        let (past, _) = self.split_at(t);
        past.windows(2).map(|w| haversine_distance_m(&w[0], &w[1])).sum()
    }

    /// Arithmetic mean of `speed_kmh` across points at or before `t` that carry a speed. `None`
    /// when no such point exists.
    pub fn average_speed(&self, t: f64) -> Option<f64> {
        let (past, _) = self.split_at(t);
        let speeds: Vec<f64> = past.iter().filter_map(|p| p.speed_kmh).collect();
        if speeds.is_empty() {
            None
        } else {
            Some(speeds.iter().sum::<f64>() / speeds.len() as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(offset_secs: i64, lat: f64, lon: f64, speed: Option<f64>) -> GpsPoint {
        let base = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        GpsPoint {
            wallclock_timestamp: base + chrono::Duration::seconds(offset_secs),
            latitude: lat,
            longitude: lon,
            altitude: None,
            speed_kmh: speed,
            heading_deg: None,
            horizontal_accuracy_m: None,
            satellite_count: None,
        }
    }

    fn store(points: Vec<GpsPoint>) -> TelemetryStore {
        TelemetryStore::new(DateTime::<Utc>::from_timestamp(0, 0).unwrap(), points)
    }

    #[test]
    fn empty_store_returns_none() {
        let s = store(vec![]);
        assert!(s.location_at(0.0).is_none());
    }

    #[test]
    fn s5_interpolation() {
        let s = store(vec![
            point(0, 37.0, 127.0, Some(50.0)),
            point(1, 37.0002, 127.0002, Some(60.0)),
        ]);
        let p = s.location_at(0.5).unwrap();
        assert!((p.latitude - 37.0001).abs() < 1e-6);
        assert!((p.longitude - 127.0001).abs() < 1e-6);
        assert!((p.speed_kmh.unwrap() - 55.0).abs() < 0.01);
    }

    #[test]
    fn before_range_returns_nearest_extreme() {
        let s = store(vec![point(1, 1.0, 1.0, None), point(2, 2.0, 2.0, None)]);
        let p = s.location_at(-10.0).unwrap();
        assert_eq!(p.latitude, 1.0);
        let p = s.location_at(10.0).unwrap();
        assert_eq!(p.latitude, 2.0);
    }

    #[test]
    fn heading_interpolation_takes_shortest_arc() {
        let base = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        let mut a = point(0, 0.0, 0.0, None);
        a.heading_deg = Some(350.0);
        let mut b = point(1, 0.0, 0.0, None);
        b.heading_deg = Some(10.0);
        let s = TelemetryStore::new(base, vec![a, b]);
        let p = s.location_at(0.5).unwrap();
        // Correct shortest-arc interpolation lands at 0 (360), not 180.
        assert!((p.heading_deg.unwrap() - 0.0).abs() < 1e-6 || (p.heading_deg.unwrap() - 360.0).abs() < 1e-6);
    }

    #[test]
    fn distance_travelled_is_monotonic() {
        let s = store(vec![point(0, 0.0, 0.0, None), point(1, 0.0, 0.001, None), point(2, 0.0, 0.002, None)]);
        let d0 = s.distance_travelled(0.0);
        let d1 = s.distance_travelled(1.0);
        let d2 = s.distance_travelled(2.0);
        assert!(d0 <= d1);
        assert!(d1 <= d2);
        assert!(d2 > 0.0);
    }

    #[test]
    fn average_speed_ignores_missing() {
        let s = store(vec![point(0, 0.0, 0.0, Some(10.0)), point(1, 0.0, 0.0, None), point(2, 0.0, 0.0, Some(30.0))]);
        assert_eq!(s.average_speed(2.0), Some(20.0));
    }

    #[test]
    fn average_speed_none_when_no_point_has_speed() {
        let s = store(vec![point(0, 0.0, 0.0, None)]);
        assert_eq!(s.average_speed(0.0), None);
    }
}
