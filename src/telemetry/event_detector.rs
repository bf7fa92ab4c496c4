// Copyright 2026 The Dashcam Core Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Derives hard-braking / rapid-acceleration / sharp-turn events from consecutive GPS pairs (§4.F).

use std::collections::BTreeMap;

use super::{shortest_heading_delta_deg, GpsPoint};
use crate::config::EventDetectorConfig;

/// Kind of driving event an [`EventMarker`] reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    HardBraking,
    RapidAcceleration,
    SharpTurn,
    Impact,
}

/// A detected event. `playback_time` is expressed in playback time, not wallclock (I6).
/// `attributes` is a small free-form map for kind-specific extra context (e.g. a future impact
/// detector's peak g-force); the GPS-delta detectors in this module never populate it.
#[derive(Clone, Debug, PartialEq)]
pub struct EventMarker {
    pub playback_time: f64,
    pub kind: EventKind,
    pub magnitude: f64,
    pub attributes: BTreeMap<String, String>,
}

/// Stateless pairwise detector over a time-sorted sequence of [`GpsPoint`]s.
pub struct EventDetector {
    config: EventDetectorConfig,
}

impl EventDetector {
    pub fn new(config: EventDetectorConfig) -> Self {
        Self { config }
    }

    /// Runs the pairwise algorithm over `points`, converting each point's wallclock time to
    /// playback time via `start_wallclock`. Events are returned sorted by timestamp (guaranteed
    /// by iterating pairs in order) and then de-duplicated per-kind within `min_interval_secs`
    /// (keeping the higher-magnitude event of each colliding pair).
    pub fn detect(
        &self,
        points: &[GpsPoint],
        start_wallclock: chrono::DateTime<chrono::Utc>,
    ) -> Vec<EventMarker> {
        let mut events = Vec::new();
        for pair in points.windows(2) {
            let (p1, p2) = (&pair[0], &pair[1]);
            let dt = (p2.wallclock_timestamp - p1.wallclock_timestamp).num_microseconds().unwrap_or(0)
                as f64
                / 1_000_000.0;
            if dt <= 0.0 || dt > self.config.max_gap_secs {
                continue;
            }
            let playback_time =
                (p2.wallclock_timestamp - start_wallclock).num_microseconds().unwrap_or(0) as f64
                    / 1_000_000.0;

            if let (Some(v1), Some(v2)) = (p1.speed_kmh, p2.speed_kmh) {
                let delta = v2 - v1;
                if delta <= self.config.hard_braking_delta_kmh && v2 > self.config.hard_braking_min_speed_kmh {
                    events.push(EventMarker {
                        playback_time,
                        kind: EventKind::HardBraking,
                        magnitude: (delta.abs() / 50.0).min(1.0),
                        attributes: BTreeMap::new(),
                    });
                } else if delta >= self.config.rapid_acceleration_delta_kmh
                    && v1 < self.config.rapid_acceleration_max_speed_kmh
                {
                    events.push(EventMarker {
                        playback_time,
                        kind: EventKind::RapidAcceleration,
                        magnitude: (delta / 60.0).min(1.0),
                        attributes: BTreeMap::new(),
                    });
                }

                if let (Some(h1), Some(h2)) = (p1.heading_deg, p2.heading_deg) {
                    let heading_delta = shortest_heading_delta_deg(h1, h2).abs();
                    if v1 > self.config.sharp_turn_min_speed_kmh
                        && v2 > self.config.sharp_turn_min_speed_kmh
                        && heading_delta >= self.config.sharp_turn_min_heading_delta_deg
                        && delta.abs() < self.config.sharp_turn_max_speed_delta_kmh
                    {
                        events.push(EventMarker {
                            playback_time,
                            kind: EventKind::SharpTurn,
                            magnitude: (heading_delta / 90.0).min(1.0),
                            attributes: BTreeMap::new(),
                        });
                    }
                }
            }
        }
        events.sort_by(|a, b| a.playback_time.partial_cmp(&b.playback_time).unwrap());
        dedupe_by_kind(events, self.config.min_interval_secs)
    }
}

/// Keeps at most one event per kind within any `min_interval`-second window, preferring the
/// higher-magnitude event of a colliding pair.
fn dedupe_by_kind(events: Vec<EventMarker>, min_interval: f64) -> Vec<EventMarker> {
    let mut kept: Vec<EventMarker> = Vec::with_capacity(events.len());
    for event in events {
        if let Some(prev_idx) = kept
            .iter()
            .rposition(|e| e.kind == event.kind && (event.playback_time - e.playback_time) < min_interval)
        {
            if event.magnitude > kept[prev_idx].magnitude {
                kept[prev_idx] = event;
            }
        } else {
            kept.push(event);
        }
    }
    kept.sort_by(|a, b| a.playback_time.partial_cmp(&b.playback_time).unwrap());
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn base() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(0, 0).unwrap()
    }

    fn point(offset_ms: i64, speed: Option<f64>, heading: Option<f64>) -> GpsPoint {
        GpsPoint {
            wallclock_timestamp: base() + Duration::milliseconds(offset_ms),
            latitude: 0.0,
            longitude: 0.0,
            altitude: None,
            speed_kmh: speed,
            heading_deg: heading,
            horizontal_accuracy_m: None,
            satellite_count: None,
        }
    }

    #[test]
    fn s3_hard_braking() {
        let points = vec![point(0, Some(60.0), None), point(400, Some(35.0), None)];
        let detector = EventDetector::new(EventDetectorConfig::default());
        let events = detector.detect(&points, base());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::HardBraking);
        assert!((events[0].magnitude - 0.5).abs() < 1e-9);
    }

    #[test]
    fn s4_sharp_turn() {
        let points = vec![point(0, Some(40.0), Some(10.0)), point(400, Some(42.0), Some(70.0))];
        let detector = EventDetector::new(EventDetectorConfig::default());
        let events = detector.detect(&points, base());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::SharpTurn);
        assert!((events[0].magnitude - (60.0_f64 / 90.0)).abs() < 1e-6);
    }

    #[test]
    fn rapid_acceleration_detected() {
        let points = vec![point(0, Some(10.0), None), point(400, Some(35.0), None)];
        let detector = EventDetector::new(EventDetectorConfig::default());
        let events = detector.detect(&points, base());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::RapidAcceleration);
    }

    #[test]
    fn data_gap_skipped() {
        let points = vec![point(0, Some(60.0), None), point(2000, Some(10.0), None)];
        let detector = EventDetector::new(EventDetectorConfig::default());
        assert!(detector.detect(&points, base()).is_empty());
    }

    #[test]
    fn at_most_one_event_per_kind_per_pair() {
        // A single pair can emit at most a braking OR an acceleration event, never both, since
        // the branches are mutually exclusive on sign of delta.
        let points = vec![point(0, Some(100.0), None), point(400, Some(40.0), None)];
        let detector = EventDetector::new(EventDetectorConfig::default());
        let events = detector.detect(&points, base());
        assert!(events.len() <= 1);
    }

    #[test]
    fn dedupe_keeps_higher_magnitude_within_window() {
        let points = vec![
            point(0, Some(80.0), None),
            point(400, Some(60.0), None), // delta -20, magnitude 0.4, v2=60 > 10
            point(800, Some(20.0), None), // delta -40, magnitude 0.8, v2=20 > 10, within 2s of previous
        ];
        let detector = EventDetector::new(EventDetectorConfig::default());
        let events = detector.detect(&points, base());
        assert_eq!(events.len(), 1);
        assert!((events[0].magnitude - 0.8).abs() < 1e-9);
    }
}
