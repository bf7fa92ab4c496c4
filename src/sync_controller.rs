// Copyright 2026 The Dashcam Core Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The master clock and multi-channel synchronization controller (§4.D).
//!
//! The tick driver is a dedicated thread parking on the tick period, started and joined the same
//! way a [`crate::channel::VideoChannel`] starts and joins its decode worker — one
//! cancellation idiom (`Arc<AtomicBool>` + `JoinHandle`) reused across the crate instead of a
//! second one invented just for this component.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::buffer::{FillInfo, FrameSelectionStrategy};
use crate::channel::{ChannelError, ChannelState, VideoChannel};
use crate::codec_adapter::CodecAdapter;
use crate::config::{BufferConfig, SyncConfig};
use crate::frame::{CameraPosition, ChannelId, VideoFile, VideoFrame};

/// Whether drift correction merely logs (`Passive`) or actively re-seeks a drifted channel once
/// drift exceeds the catastrophic threshold (`Aggressive`). See SPEC_FULL.md §9 Open Questions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DriftPolicy {
    #[default]
    Passive,
    Aggressive,
}

/// Overall playback state of a [`SyncController`] / [`crate::session::MediaSession`].
#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackState {
    Stopped,
    Paused,
    Playing,
    Buffering,
    Completed,
    Error(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("video file has no enabled channels")]
    NoEnabledChannels,
    #[error("no video file loaded")]
    NotLoaded,
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Advisory notifications a caller may observe: drift measurements and playback-state
/// transitions. The session-scoped analogue of the teacher's callback slots (`work_done_cb`,
/// `error_cb` in `c2_wrapper`), kept out of the synchronous command path so commands stay plain
/// method calls.
pub trait SessionEventSink: Send + Sync {
    fn on_drift(&self, _channel_id: &ChannelId, _drift_secs: f64) {}
    fn on_state_changed(&self, _old: &PlaybackState, _new: &PlaybackState) {}
}

/// Default sink: logs drift and state transitions at `debug`, the teacher's quiet-by-default
/// logging posture.
pub struct LoggingEventSink;

impl SessionEventSink for LoggingEventSink {
    fn on_drift(&self, channel_id: &ChannelId, drift_secs: f64) {
        log::debug!("channel {channel_id}: drift {drift_secs:.3}s");
    }

    fn on_state_changed(&self, old: &PlaybackState, new: &PlaybackState) {
        log::debug!("playback state: {old:?} -> {new:?}");
    }
}

struct ClockAnchor {
    wallclock_start: Instant,
    playback_start: f64,
}

/// State touched by both the owning thread (via [`SyncController`]'s methods) and the tick
/// thread. Single-writer discipline per component field; multi-reader visibility via the mutex.
struct Shared<A: CodecAdapter + 'static> {
    channels: Mutex<Vec<VideoChannel<A>>>,
    master_channel_id: Mutex<Option<ChannelId>>,
    state: Mutex<PlaybackState>,
    current_time: Mutex<f64>,
    duration: Mutex<f64>,
    speed_multiplier: Mutex<f64>,
    anchor: Mutex<Option<ClockAnchor>>,
    running: AtomicBool,
    config: SyncConfig,
    sink: Arc<dyn SessionEventSink>,
}

impl<A: CodecAdapter + 'static> Shared<A> {
    fn set_state(&self, new: PlaybackState) {
        let mut guard = self.state.lock().unwrap();
        if *guard != new {
            self.sink.on_state_changed(&guard, &new);
            *guard = new;
        }
    }

    fn recompute_current_time(&self) -> f64 {
        let anchor = self.anchor.lock().unwrap();
        match anchor.as_ref() {
            Some(a) => {
                let elapsed = a.wallclock_start.elapsed().as_secs_f64();
                let speed = *self.speed_multiplier.lock().unwrap();
                a.playback_start + elapsed * speed
            }
            None => *self.current_time.lock().unwrap(),
        }
    }

    /// One tick: recompute the clock, handle end-of-stream, measure per-channel drift, apply the
    /// configured drift policy, and update the buffering substate. Runs on the tick thread.
    fn tick(&self) {
        let t = self.recompute_current_time();
        let duration = *self.duration.lock().unwrap();

        if t >= duration {
            *self.current_time.lock().unwrap() = duration;
            self.running.store(false, Ordering::SeqCst);
            self.set_state(PlaybackState::Completed);
            return;
        }
        *self.current_time.lock().unwrap() = t;

        let mut channels = self.channels.lock().unwrap();
        let mut any_underfilled = false;
        for channel in channels.iter_mut() {
            let drift = channel
                .frame_at(t, FrameSelectionStrategy::Nearest)
                .map(|f| (f.timestamp - t).abs());
            let fill_ratio = channel.buffer_status().fill_ratio();
            if fill_ratio < self.config.buffering_fill_ratio {
                any_underfilled = true;
            }
            if let Some(drift) = drift {
                if drift > self.config.drift_threshold_secs {
                    self.sink.on_drift(channel.id(), drift);
                }
                if self.config.drift_policy == DriftPolicy::Aggressive
                    && drift > self.config.catastrophic_drift_secs
                {
                    let _ = channel.seek(t);
                }
            }
        }
        drop(channels);

        if any_underfilled {
            if *self.state.lock().unwrap() == PlaybackState::Playing {
                self.set_state(PlaybackState::Buffering);
            }
        } else if *self.state.lock().unwrap() == PlaybackState::Buffering {
            self.set_state(PlaybackState::Playing);
        }
    }
}

/// Owns one [`VideoChannel`] per enabled channel descriptor and drives a wall-clock-anchored
/// master clock across all of them.
pub struct SyncController<A: CodecAdapter + 'static> {
    shared: Arc<Shared<A>>,
    tick_thread: Option<JoinHandle<()>>,
}

impl<A: CodecAdapter + 'static> SyncController<A> {
    pub fn new(config: SyncConfig) -> Self {
        Self::with_sink(config, Arc::new(LoggingEventSink))
    }

    pub fn with_sink(config: SyncConfig, sink: Arc<dyn SessionEventSink>) -> Self {
        Self {
            shared: Arc::new(Shared {
                channels: Mutex::new(Vec::new()),
                master_channel_id: Mutex::new(None),
                state: Mutex::new(PlaybackState::Stopped),
                current_time: Mutex::new(0.0),
                duration: Mutex::new(0.0),
                speed_multiplier: Mutex::new(1.0),
                anchor: Mutex::new(None),
                running: AtomicBool::new(false),
                config,
                sink,
            }),
            tick_thread: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.state.lock().unwrap().clone()
    }

    pub fn current_time(&self) -> f64 {
        *self.shared.current_time.lock().unwrap()
    }

    pub fn duration(&self) -> f64 {
        *self.shared.duration.lock().unwrap()
    }

    pub fn position_ratio(&self) -> f64 {
        let duration = self.duration();
        if duration <= 0.0 {
            0.0
        } else {
            (self.current_time() / duration).clamp(0.0, 1.0)
        }
    }

    pub fn set_speed(&self, multiplier: f64) {
        // Re-anchor so the speed change takes effect from "now", not from when play() started.
        let current = self.current_time();
        *self.shared.speed_multiplier.lock().unwrap() = multiplier;
        if self.state() == PlaybackState::Playing {
            *self.shared.anchor.lock().unwrap() =
                Some(ClockAnchor { wallclock_start: Instant::now(), playback_start: current });
        }
    }

    /// Stops any current session and constructs one [`VideoChannel`] per enabled descriptor.
    /// Fails if `video_file` has zero enabled channels, or if every enabled channel fails to
    /// initialize.
    pub fn load(&mut self, video_file: &VideoFile, buffer_config: BufferConfig) -> Result<(), SyncError> {
        self.stop();

        let enabled: Vec<_> = video_file.channels.iter().filter(|d| d.enabled).collect();
        if enabled.is_empty() {
            self.shared.set_state(PlaybackState::Error("no enabled channels".to_string()));
            return Err(SyncError::NoEnabledChannels);
        }

        let mut channels = Vec::with_capacity(enabled.len());
        for descriptor in &enabled {
            let mut channel = VideoChannel::new((*descriptor).clone(), buffer_config);
            if let Err(e) = channel.initialize() {
                log::error!("channel {}: failed to initialize: {e}", descriptor.id);
            }
            channels.push(channel);
        }

        if channels.iter().all(|c| matches!(c.state(), ChannelState::Errored(_))) {
            let msg = "all channels failed to initialize".to_string();
            self.shared.set_state(PlaybackState::Error(msg));
            return Err(SyncError::Channel(ChannelError::NotIdle));
        }

        let master_id = enabled
            .iter()
            .find(|d| d.position == CameraPosition::Front)
            .or_else(|| enabled.first())
            .map(|d| d.id.clone());
        for channel in &channels {
            let is_master = Some(channel.id()) == master_id.as_ref();
            channel.set_publishes_audio(is_master);
        }

        *self.shared.master_channel_id.lock().unwrap() = master_id;
        *self.shared.channels.lock().unwrap() = channels;
        *self.shared.duration.lock().unwrap() = video_file.duration;
        *self.shared.current_time.lock().unwrap() = 0.0;
        self.shared.set_state(PlaybackState::Paused);
        Ok(())
    }

    /// Starts every channel decoding, anchors the master clock, and starts the tick thread.
    pub fn play(&mut self) {
        if self.shared.channels.lock().unwrap().is_empty() {
            return;
        }
        for channel in self.shared.channels.lock().unwrap().iter_mut() {
            let _ = channel.start_decoding();
        }
        let current = self.current_time();
        *self.shared.anchor.lock().unwrap() =
            Some(ClockAnchor { wallclock_start: Instant::now(), playback_start: current });
        self.shared.set_state(PlaybackState::Playing);
        self.start_tick_thread();
    }

    /// Stops the tick thread; channel workers keep running so buffers continue refilling.
    pub fn pause(&mut self) {
        self.stop_tick_thread();
        if matches!(self.state(), PlaybackState::Playing | PlaybackState::Buffering) {
            self.shared.set_state(PlaybackState::Paused);
        }
    }

    pub fn toggle(&mut self) {
        match self.state() {
            PlaybackState::Playing | PlaybackState::Buffering => self.pause(),
            _ => self.play(),
        }
    }

    /// Full teardown: stops the tick thread and every channel, returns to `Stopped`.
    pub fn stop(&mut self) {
        self.stop_tick_thread();
        for channel in self.shared.channels.lock().unwrap().iter_mut() {
            channel.stop();
        }
        self.shared.channels.lock().unwrap().clear();
        *self.shared.master_channel_id.lock().unwrap() = None;
        *self.shared.current_time.lock().unwrap() = 0.0;
        *self.shared.anchor.lock().unwrap() = None;
        self.shared.set_state(PlaybackState::Stopped);
    }

    /// Clamps `t` to `[0, duration]`, seeks every channel, and re-anchors the clock.
    pub fn seek(&mut self, t: f64) -> Result<(), SyncError> {
        if self.shared.channels.lock().unwrap().is_empty() {
            return Err(SyncError::NotLoaded);
        }
        let was_playing =
            matches!(self.state(), PlaybackState::Playing | PlaybackState::Buffering);
        self.stop_tick_thread();

        let clamped = t.clamp(0.0, self.duration());
        for channel in self.shared.channels.lock().unwrap().iter_mut() {
            channel.seek(clamped)?;
        }
        *self.shared.current_time.lock().unwrap() = clamped;
        *self.shared.anchor.lock().unwrap() =
            Some(ClockAnchor { wallclock_start: Instant::now(), playback_start: clamped });

        if was_playing {
            self.shared.set_state(PlaybackState::Playing);
            self.start_tick_thread();
        }
        Ok(())
    }

    pub fn seek_relative(&mut self, delta: f64) -> Result<(), SyncError> {
        self.seek(self.current_time() + delta)
    }

    /// Steps the master channel to the next frame after `current_time` and re-anchors there.
    pub fn step_forward(&mut self) -> Result<(), SyncError> {
        self.step(FrameSelectionStrategy::After)
    }

    /// Steps the master channel to the last frame before `current_time` and re-anchors there.
    pub fn step_backward(&mut self) -> Result<(), SyncError> {
        self.step(FrameSelectionStrategy::Before)
    }

    fn step(&mut self, strategy: FrameSelectionStrategy) -> Result<(), SyncError> {
        let current = self.current_time();
        let target = {
            let master_id = self.shared.master_channel_id.lock().unwrap().clone();
            let channels = self.shared.channels.lock().unwrap();
            master_id
                .and_then(|id| channels.iter().find(|c| *c.id() == id))
                .and_then(|c| c.frame_at(current, strategy))
                .map(|f| f.timestamp)
                .unwrap_or(current)
        };
        self.seek(target)
    }

    /// Samples every channel's buffer at `current_time` and returns a `{position -> frame}` map,
    /// omitting positions whose buffers were empty at sample time.
    pub fn synchronized_frames(&self) -> BTreeMap<CameraPosition, Arc<VideoFrame>> {
        let t = self.current_time();
        let channels = self.shared.channels.lock().unwrap();
        let mut out = BTreeMap::new();
        for channel in channels.iter() {
            if let Some(frame) = channel.frame_at(t, FrameSelectionStrategy::Nearest) {
                out.insert(channel.descriptor.position, frame);
            }
        }
        out
    }

    pub fn buffer_status(&self) -> BTreeMap<CameraPosition, FillInfo> {
        self.shared
            .channels
            .lock()
            .unwrap()
            .iter()
            .map(|c| (c.descriptor.position, c.buffer_status()))
            .collect()
    }

    fn start_tick_thread(&mut self) {
        self.stop_tick_thread();
        self.shared.running.store(true, Ordering::SeqCst);
        let shared = self.shared.clone();
        let period = Duration::from_secs_f64(shared.config.tick_period_secs());
        self.tick_thread = Some(thread::spawn(move || {
            while shared.running.load(Ordering::SeqCst) {
                shared.tick();
                if !matches!(
                    *shared.state.lock().unwrap(),
                    PlaybackState::Playing | PlaybackState::Buffering
                ) {
                    break;
                }
                thread::sleep(period);
            }
        }));
    }

    fn stop_tick_thread(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.tick_thread.take() {
            let _ = handle.join();
        }
    }

    /// Whether the tick thread is (logically) running.
    pub fn is_ticking(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }
}

impl<A: CodecAdapter + 'static> Drop for SyncController<A> {
    fn drop(&mut self) {
        self.stop_tick_thread();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec_adapter::synthetic::SyntheticAdapter;
    use crate::frame::{ChannelDescriptor, SourceLocator, VideoFileId};
    use chrono::Utc;

    fn descriptor(id: &str, position: CameraPosition, locator: &str) -> ChannelDescriptor {
        ChannelDescriptor {
            id: ChannelId(id.to_string()),
            position,
            source_locator: SourceLocator(locator.to_string()),
            width: 64,
            height: 48,
            frame_rate: 30.0,
            codec_name: "synthetic".to_string(),
            enabled: true,
        }
    }

    fn two_channel_file() -> VideoFile {
        VideoFile {
            id: VideoFileId("vf1".to_string()),
            channels: vec![
                descriptor("front", CameraPosition::Front, "synthetic:64x48@30x10.0"),
                descriptor("rear", CameraPosition::Rear, "synthetic:64x48@30x10.0"),
            ],
            start_wallclock: Utc::now(),
            duration: 10.0,
            telemetry_nmea: None,
        }
    }

    #[test]
    fn load_with_no_enabled_channels_errors() {
        let mut file = two_channel_file();
        for c in &mut file.channels {
            c.enabled = false;
        }
        let mut controller: SyncController<SyntheticAdapter> = SyncController::new(SyncConfig::default());
        assert!(matches!(controller.load(&file, BufferConfig::default()), Err(SyncError::NoEnabledChannels)));
        assert!(matches!(controller.state(), PlaybackState::Error(_)));
    }

    #[test]
    fn s1_two_channel_sync() {
        let file = two_channel_file();
        let mut controller: SyncController<SyntheticAdapter> = SyncController::new(SyncConfig::default());
        controller.load(&file, BufferConfig::default()).unwrap();
        controller.play();
        thread::sleep(Duration::from_millis(1000));
        let t = controller.current_time();
        assert!((0.90..=1.10).contains(&t), "current_time={t}");
        let frames = controller.synchronized_frames();
        assert!(frames.contains_key(&CameraPosition::Front));
        assert!(frames.contains_key(&CameraPosition::Rear));
        for frame in frames.values() {
            assert!((frame.timestamp - t).abs() < 0.1);
        }
        controller.stop();
    }

    #[test]
    fn s2_seek_after_play() {
        let file = two_channel_file();
        let mut controller: SyncController<SyntheticAdapter> = SyncController::new(SyncConfig::default());
        controller.load(&file, BufferConfig::default()).unwrap();
        controller.play();
        thread::sleep(Duration::from_millis(200));
        controller.seek(5.0).unwrap();
        assert_eq!(controller.current_time(), 5.0);
        thread::sleep(Duration::from_millis(100));
        let status = controller.buffer_status();
        assert!(status.values().all(|s| s.fill > 0));
        controller.stop();
    }

    #[test]
    fn seek_clamps_and_sets_current_time() {
        let file = two_channel_file();
        let mut controller: SyncController<SyntheticAdapter> = SyncController::new(SyncConfig::default());
        controller.load(&file, BufferConfig::default()).unwrap();
        controller.seek(500.0).unwrap();
        assert_eq!(controller.current_time(), 10.0);
        controller.seek(-5.0).unwrap();
        assert_eq!(controller.current_time(), 0.0);
        controller.seek(5.0).unwrap();
        assert_eq!(controller.current_time(), 5.0);
        controller.stop();
    }

    #[test]
    fn master_channel_is_front_position() {
        let file = two_channel_file();
        let mut controller: SyncController<SyntheticAdapter> = SyncController::new(SyncConfig::default());
        controller.load(&file, BufferConfig::default()).unwrap();
        assert_eq!(
            *controller.shared.master_channel_id.lock().unwrap(),
            Some(ChannelId("front".to_string()))
        );
        controller.stop();
    }

    #[test]
    fn pause_then_play_preserves_current_time_modulo_one_tick() {
        let file = two_channel_file();
        let mut controller: SyncController<SyntheticAdapter> = SyncController::new(SyncConfig::default());
        controller.load(&file, BufferConfig::default()).unwrap();
        controller.play();
        thread::sleep(Duration::from_millis(150));
        controller.pause();
        let before = controller.current_time();
        controller.play();
        thread::sleep(Duration::from_millis(50));
        let after = controller.current_time();
        assert!(after >= before - 0.05);
        controller.stop();
    }
}
