// Copyright 2026 The Dashcam Core Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Bounded, time-sorted frame reservoir feeding one channel's presentation path.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::frame::VideoFrame;

/// How [`FrameBuffer::frame_at`] should pick among candidate frames relative to a query time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameSelectionStrategy {
    /// The frame whose timestamp is closest to the query time; ties favor the earlier frame.
    Nearest,
    /// The frame with the largest timestamp strictly less than the query time.
    Before,
    /// The frame with the smallest timestamp strictly greater than the query time.
    After,
    /// The nearest frame, but only if within `tolerance` seconds of the query time.
    Exact(f64),
}

/// Fill-level snapshot of a [`FrameBuffer`], used for backpressure observation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FillInfo {
    pub fill: usize,
    pub capacity: usize,
}

impl FillInfo {
    pub fn fill_ratio(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.fill as f64 / self.capacity as f64
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("frame buffer capacity must be greater than zero")]
    ZeroCapacity,
}

/// Seconds of playback time behind the last query at which frames are evicted (I2's memory cap).
pub const DEFAULT_RETENTION_WINDOW_SECS: f64 = 0.5;

/// Default capacity in frames (~1s at 30fps), the smallest figure that absorbs a decode stall
/// without starving the renderer while bounding steady-state memory.
pub const DEFAULT_CAPACITY: usize = 30;

struct Inner {
    frames: VecDeque<Arc<VideoFrame>>,
    capacity: usize,
    retention_window: f64,
}

/// Thread-safe, strictly time-sorted, capacity-bounded queue of decoded video frames.
///
/// Guarded by a single `std::sync::Mutex`: contention is low in practice because producer (one
/// decode worker) and consumer (the sync controller's tick) each touch it at roughly the
/// channel's frame rate, not in a tight loop.
pub struct FrameBuffer {
    inner: Mutex<Inner>,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }
        Ok(Self::with_retention_window(capacity, DEFAULT_RETENTION_WINDOW_SECS))
    }

    pub fn with_retention_window(capacity: usize, retention_window: f64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                frames: VecDeque::with_capacity(capacity),
                capacity,
                retention_window,
            }),
        }
    }

    /// Inserts `frame`, evicting the oldest (smallest-timestamp) frame first if already at
    /// capacity. Maintains strict ascending ordering by timestamp (I1).
    pub fn push(&self, frame: VideoFrame) {
        let mut inner = self.inner.lock().unwrap();
        if inner.frames.len() >= inner.capacity {
            inner.frames.pop_front();
        }
        let pos = inner
            .frames
            .iter()
            .position(|f| f.timestamp > frame.timestamp)
            .unwrap_or(inner.frames.len());
        inner.frames.insert(pos, Arc::new(frame));
    }

    /// Looks up a frame per `strategy`; if that lookup returns a frame, also evicts anything
    /// older than `t - retention_window` (§4.B: eviction runs "after any `frame_at` returning a
    /// value", not on a miss).
    pub fn frame_at(&self, t: f64, strategy: FrameSelectionStrategy) -> Option<Arc<VideoFrame>> {
        let mut inner = self.inner.lock().unwrap();
        let result = Self::select(&inner.frames, t, strategy);
        if result.is_some() {
            let retain_from = t - inner.retention_window;
            while inner
                .frames
                .front()
                .map(|f| f.timestamp < retain_from)
                .unwrap_or(false)
            {
                inner.frames.pop_front();
            }
        }
        result
    }

    fn select(
        frames: &VecDeque<Arc<VideoFrame>>,
        t: f64,
        strategy: FrameSelectionStrategy,
    ) -> Option<Arc<VideoFrame>> {
        if frames.is_empty() {
            return None;
        }
        // Index of the first frame with timestamp >= t.
        let insertion = frames.partition_point(|f| f.timestamp < t);

        match strategy {
            FrameSelectionStrategy::Before => {
                if insertion == 0 {
                    None
                } else {
                    Some(frames[insertion - 1].clone())
                }
            }
            FrameSelectionStrategy::After => {
                let idx = if insertion < frames.len() && frames[insertion].timestamp == t {
                    insertion + 1
                } else {
                    insertion
                };
                frames.get(idx).cloned()
            }
            FrameSelectionStrategy::Nearest => Self::nearest(frames, t, insertion),
            FrameSelectionStrategy::Exact(tolerance) => {
                Self::nearest(frames, t, insertion).filter(|f| (f.timestamp - t).abs() <= tolerance)
            }
        }
    }

    fn nearest(
        frames: &VecDeque<Arc<VideoFrame>>,
        t: f64,
        insertion: usize,
    ) -> Option<Arc<VideoFrame>> {
        let after = frames.get(insertion);
        let before = if insertion == 0 { None } else { frames.get(insertion - 1) };
        match (before, after) {
            (None, None) => None,
            (Some(b), None) => Some(b.clone()),
            (None, Some(a)) => Some(a.clone()),
            (Some(b), Some(a)) => {
                if a.timestamp == t {
                    Some(a.clone())
                } else if (t - b.timestamp) <= (a.timestamp - t) {
                    Some(b.clone())
                } else {
                    Some(a.clone())
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().capacity
    }

    pub fn fill_ratio(&self) -> f64 {
        self.status().fill_ratio()
    }

    pub fn status(&self) -> FillInfo {
        let inner = self.inner.lock().unwrap();
        FillInfo { fill: inner.frames.len(), capacity: inner.capacity }
    }

    pub fn latest(&self) -> Option<Arc<VideoFrame>> {
        self.inner.lock().unwrap().frames.back().cloned()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ts: f64) -> VideoFrame {
        VideoFrame {
            timestamp: ts,
            width: 1,
            height: 1,
            pixel_format: crate::frame::PixelFormat::Bgra8,
            pixel_data: vec![0; 4],
            row_stride: 4,
            frame_number: (ts * 1000.0) as u64,
            is_keyframe: false,
        }
    }

    #[test]
    fn zero_capacity_rejected() {
        assert_eq!(FrameBuffer::new(0).unwrap_err(), BufferError::ZeroCapacity);
    }

    #[test]
    fn push_keeps_strict_ascending_order() {
        let buf = FrameBuffer::new(10).unwrap();
        for ts in [0.3, 0.1, 0.2] {
            buf.push(frame(ts));
        }
        let mut last = f64::NEG_INFINITY;
        // Drain via repeated After lookups starting below everything.
        let mut cur = f64::NEG_INFINITY;
        let mut seen = 0;
        while let Some(f) = buf.frame_at(cur, FrameSelectionStrategy::After) {
            assert!(f.timestamp > last);
            last = f.timestamp;
            cur = f.timestamp;
            seen += 1;
        }
        assert_eq!(seen, 3);
    }

    #[test]
    fn capacity_one_evicts_every_push() {
        let buf = FrameBuffer::new(1).unwrap();
        buf.push(frame(0.1));
        buf.push(frame(0.2));
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.latest().unwrap().timestamp, 0.2);
    }

    #[test]
    fn eviction_s6() {
        let buf = FrameBuffer::new(3).unwrap();
        for ts in [0.1, 0.2, 0.3, 0.4] {
            buf.push(frame(ts));
        }
        assert_eq!(buf.len(), 3);
        let remaining: Vec<f64> = {
            let inner = buf.inner.lock().unwrap();
            inner.frames.iter().map(|f| f.timestamp).collect()
        };
        assert_eq!(remaining, vec![0.2, 0.3, 0.4]);
    }

    #[test]
    fn exact_tolerance_zero_returns_pushed_frame() {
        let buf = FrameBuffer::with_retention_window(10, 10.0);
        buf.push(frame(1.5));
        let found = buf.frame_at(1.5, FrameSelectionStrategy::Exact(0.0)).unwrap();
        assert_eq!(found.timestamp, 1.5);
    }

    #[test]
    fn exact_tolerance_rejects_too_far() {
        let buf = FrameBuffer::with_retention_window(10, 10.0);
        buf.push(frame(1.5));
        assert!(buf.frame_at(1.0, FrameSelectionStrategy::Exact(0.1)).is_none());
    }

    #[test]
    fn nearest_ties_break_earlier() {
        let buf = FrameBuffer::with_retention_window(10, 10.0);
        buf.push(frame(1.0));
        buf.push(frame(2.0));
        let found = buf.frame_at(1.5, FrameSelectionStrategy::Nearest).unwrap();
        assert_eq!(found.timestamp, 1.0);
    }

    #[test]
    fn before_and_after_bounds() {
        let buf = FrameBuffer::with_retention_window(10, 10.0);
        buf.push(frame(1.0));
        buf.push(frame(2.0));
        assert!(buf.frame_at(0.5, FrameSelectionStrategy::Before).is_none());
        assert_eq!(buf.frame_at(1.5, FrameSelectionStrategy::Before).unwrap().timestamp, 1.0);
        assert_eq!(buf.frame_at(1.5, FrameSelectionStrategy::After).unwrap().timestamp, 2.0);
        assert!(buf.frame_at(2.5, FrameSelectionStrategy::After).is_none());
    }

    #[test]
    fn retention_window_evicts_after_lookup() {
        let buf = FrameBuffer::with_retention_window(10, 0.5);
        for ts in [0.0, 0.2, 0.4, 1.0] {
            buf.push(frame(ts));
        }
        // Query at t=1.0: everything with timestamp < 0.5 should be evicted afterwards.
        buf.frame_at(1.0, FrameSelectionStrategy::Nearest);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn never_exceeds_capacity() {
        let buf = FrameBuffer::new(5).unwrap();
        for i in 0..100 {
            buf.push(frame(i as f64 * 0.033));
            assert!(buf.len() <= buf.capacity());
        }
    }
}
