// Copyright 2026 The Dashcam Core Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Policy knobs grouped into small `Default`-impl structs, the way the teacher groups
//! backend-specific decoder options (`C2VaapiDecoderOptions`, `C2V4L2DecoderOptions`) instead of
//! passing long parameter lists.

use crate::buffer::{DEFAULT_CAPACITY, DEFAULT_RETENTION_WINDOW_SECS};
use crate::sync_controller::DriftPolicy;

/// Per-channel [`crate::buffer::FrameBuffer`] sizing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BufferConfig {
    pub capacity: usize,
    pub retention_window_secs: f64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { capacity: DEFAULT_CAPACITY, retention_window_secs: DEFAULT_RETENTION_WINDOW_SECS }
    }
}

/// [`crate::sync_controller::SyncController`] tick cadence and drift/backpressure thresholds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyncConfig {
    pub target_fps: f64,
    pub drift_threshold_secs: f64,
    pub catastrophic_drift_secs: f64,
    pub buffering_fill_ratio: f64,
    pub drift_policy: DriftPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            target_fps: 30.0,
            drift_threshold_secs: 0.050,
            catastrophic_drift_secs: 0.500,
            buffering_fill_ratio: 0.2,
            drift_policy: DriftPolicy::Passive,
        }
    }
}

impl SyncConfig {
    pub fn tick_period_secs(&self) -> f64 {
        1.0 / self.target_fps
    }
}

/// [`crate::telemetry::event_detector::EventDetector`] thresholds, taken directly from §4.F.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EventDetectorConfig {
    pub max_gap_secs: f64,
    pub hard_braking_delta_kmh: f64,
    pub hard_braking_min_speed_kmh: f64,
    pub rapid_acceleration_delta_kmh: f64,
    pub rapid_acceleration_max_speed_kmh: f64,
    pub sharp_turn_min_speed_kmh: f64,
    pub sharp_turn_min_heading_delta_deg: f64,
    pub sharp_turn_max_speed_delta_kmh: f64,
    pub min_interval_secs: f64,
}

impl Default for EventDetectorConfig {
    fn default() -> Self {
        Self {
            max_gap_secs: 0.5,
            hard_braking_delta_kmh: -20.0,
            hard_braking_min_speed_kmh: 10.0,
            rapid_acceleration_delta_kmh: 20.0,
            rapid_acceleration_max_speed_kmh: 100.0,
            sharp_turn_min_speed_kmh: 20.0,
            sharp_turn_min_heading_delta_deg: 45.0,
            sharp_turn_max_speed_delta_kmh: 10.0,
            min_interval_secs: 2.0,
        }
    }
}
