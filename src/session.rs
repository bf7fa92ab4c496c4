// Copyright 2026 The Dashcam Core Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! [`MediaSession`]: a thin facade wiring [`SyncController`], [`TelemetryStore`], and
//! [`EventDetector`] behind the public session API (§4.G), plus the two external-collaborator
//! traits contracted in §6 ([`StorageBackend`], [`MetadataProvider`]).

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::buffer::FillInfo;
use crate::codec_adapter::CodecAdapter;
use crate::config::{BufferConfig, EventDetectorConfig, SyncConfig};
use crate::frame::{CameraPosition, VideoFile, VideoFileId, VideoFrame};
use crate::sync_controller::{PlaybackState, SessionEventSink, SyncController, SyncError};
use crate::telemetry::event_detector::{EventDetector, EventMarker};
use crate::telemetry::nmea::GpsStreamBuilder;
use crate::telemetry::{GpsPoint, TelemetryStore};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Opaque filesystem/SD-card collaborator contracted in §6. No concrete implementation ships with
/// this crate (external collaborator, out of scope per §1).
pub trait StorageBackend: Send + Sync {
    fn mount(&self) -> Result<(), StorageError>;
    fn unmount(&self) -> Result<(), StorageError>;
    fn list(&self, path: &str) -> Result<Vec<String>, StorageError>;
    fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;
    fn exists(&self, path: &str) -> Result<bool, StorageError>;
    fn file_info(&self, path: &str) -> Result<FileInfo, StorageError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct FileInfo {
    pub size_bytes: u64,
    pub modified_wallclock: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("device not found")]
    DeviceNotFound,
    #[error("mount failed: {0}")]
    MountFailed(String),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("read failed: {0}")]
    ReadFailed(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("corrupt filesystem")]
    CorruptFilesystem,
    #[error("insufficient space")]
    InsufficientSpace,
}

/// Persisted favorites/notes collaborator contracted in §6, keyed by [`VideoFileId`]. The core
/// never persists state itself; it only reads/writes through this interface when a caller
/// supplies one.
pub trait MetadataProvider: Send + Sync {
    fn load_favorite(&self, id: &VideoFileId) -> Option<Vec<u8>>;
    fn save_favorite(&self, id: &VideoFileId, blob: Vec<u8>);
    fn load_notes(&self, id: &VideoFileId) -> Option<Vec<u8>>;
    fn save_notes(&self, id: &VideoFileId, blob: Vec<u8>);
}

/// Thin facade over [`SyncController`] (playback), [`TelemetryStore`] (GPS lookup), and a
/// precomputed [`EventDetector`] result. This is the crate's primary public entry point.
pub struct MediaSession<A: CodecAdapter + 'static> {
    controller: SyncController<A>,
    telemetry: Option<TelemetryStore>,
    events: Vec<EventMarker>,
    buffer_config: BufferConfig,
    event_detector_config: EventDetectorConfig,
}

impl<A: CodecAdapter + 'static> MediaSession<A> {
    pub fn new(sync_config: SyncConfig, buffer_config: BufferConfig, event_detector_config: EventDetectorConfig) -> Self {
        Self {
            controller: SyncController::new(sync_config),
            telemetry: None,
            events: Vec::new(),
            buffer_config,
            event_detector_config,
        }
    }

    pub fn with_event_sink(
        sync_config: SyncConfig,
        buffer_config: BufferConfig,
        event_detector_config: EventDetectorConfig,
        sink: Arc<dyn SessionEventSink>,
    ) -> Self {
        Self {
            controller: SyncController::with_sink(sync_config, sink),
            telemetry: None,
            events: Vec::new(),
            buffer_config,
            event_detector_config,
        }
    }

    /// Loads `video_file`: tears down any prior session, initializes one channel per enabled
    /// descriptor, and — if telemetry text is attached — parses it into a [`TelemetryStore`] and
    /// precomputes [`EventMarker`]s.
    pub fn load(&mut self, video_file: &VideoFile) -> Result<(), SessionError> {
        self.controller.load(video_file, self.buffer_config)?;

        self.telemetry = None;
        self.events.clear();
        if let Some(text) = &video_file.telemetry_nmea {
            let mut builder = GpsStreamBuilder::new();
            builder.ingest_text(text);
            let points: Vec<GpsPoint> = builder.finish();
            let detector = EventDetector::new(self.event_detector_config);
            self.events = detector.detect(&points, video_file.start_wallclock);
            self.telemetry = Some(TelemetryStore::new(video_file.start_wallclock, points));
        }
        Ok(())
    }

    pub fn play(&mut self) {
        self.controller.play();
    }

    pub fn pause(&mut self) {
        self.controller.pause();
    }

    pub fn toggle(&mut self) {
        self.controller.toggle();
    }

    pub fn stop(&mut self) {
        self.controller.stop();
    }

    pub fn seek(&mut self, seconds: f64) -> Result<(), SessionError> {
        self.controller.seek(seconds)?;
        Ok(())
    }

    pub fn seek_relative(&mut self, delta_seconds: f64) -> Result<(), SessionError> {
        self.controller.seek_relative(delta_seconds)?;
        Ok(())
    }

    pub fn step_forward(&mut self) -> Result<(), SessionError> {
        self.controller.step_forward()?;
        Ok(())
    }

    pub fn step_backward(&mut self) -> Result<(), SessionError> {
        self.controller.step_backward()?;
        Ok(())
    }

    pub fn set_speed(&mut self, multiplier: f64) {
        self.controller.set_speed(multiplier);
    }

    pub fn state(&self) -> PlaybackState {
        self.controller.state()
    }

    pub fn current_time(&self) -> f64 {
        self.controller.current_time()
    }

    pub fn duration(&self) -> f64 {
        self.controller.duration()
    }

    pub fn position_ratio(&self) -> f64 {
        self.controller.position_ratio()
    }

    pub fn is_buffering(&self) -> bool {
        self.controller.state() == PlaybackState::Buffering
    }

    pub fn synchronized_frames(&self) -> BTreeMap<CameraPosition, Arc<VideoFrame>> {
        self.controller.synchronized_frames()
    }

    pub fn buffer_status(&self) -> BTreeMap<CameraPosition, FillInfo> {
        self.controller.buffer_status()
    }

    /// Interpolated GPS location at playback time `t`, or `None` if no telemetry was attached to
    /// the loaded [`VideoFile`] or the store is empty.
    pub fn location_at(&self, t: f64) -> Option<GpsPoint> {
        self.telemetry.as_ref()?.location_at(t)
    }

    pub fn distance_travelled(&self, t: f64) -> Option<f64> {
        self.telemetry.as_ref().map(|store| store.distance_travelled(t))
    }

    pub fn average_speed(&self, t: f64) -> Option<f64> {
        self.telemetry.as_ref().and_then(|store| store.average_speed(t))
    }

    /// Driving events detected from this session's telemetry at load time.
    pub fn events(&self) -> &[EventMarker] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec_adapter::synthetic::SyntheticAdapter;
    use crate::frame::{CameraPosition, ChannelDescriptor, ChannelId, SourceLocator, VideoFileId};
    use std::thread;
    use std::time::Duration;

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

    fn video_file_with_gps() -> VideoFile {
        let nmea = "$GPRMC,000000,A,3742.000,N,12700.000,E,032.4,000.0,010124,,*18\n\
                    $GPRMC,000001,A,3742.012,N,12700.012,E,010.0,000.0,010124,,*1D\n";
        VideoFile {
            id: VideoFileId("vf-gps".to_string()),
            channels: vec![descriptor("front", CameraPosition::Front, "synthetic:64x48@30x5.0")],
            start_wallclock: chrono::Utc::now(),
            duration: 5.0,
            telemetry_nmea: Some(nmea.to_string()),
        }
    }

    #[test]
    fn load_empty_channel_list_errors() {
        let mut file = video_file_with_gps();
        file.channels.clear();
        let mut session: MediaSession<SyntheticAdapter> =
            MediaSession::new(SyncConfig::default(), BufferConfig::default(), EventDetectorConfig::default());
        assert!(session.load(&file).is_err());
    }

    #[test]
    fn load_parses_telemetry_into_store_and_runs_event_detection() {
        let file = video_file_with_gps();
        let mut session: MediaSession<SyntheticAdapter> =
            MediaSession::new(SyncConfig::default(), BufferConfig::default(), EventDetectorConfig::default());
        session.load(&file).unwrap();
        // These fixes are 1s apart, wider than max_gap_secs (0.5s), so the pairwise detector
        // treats every pair as a data gap and detects nothing; what matters here is that loading
        // telemetry never panics and the store itself is populated and queryable.
        assert!(session.events().is_empty());
        assert!(session.location_at(0.0).is_some());
        assert!(session.distance_travelled(1.0).unwrap() > 0.0);
        session.stop();
    }

    #[test]
    fn session_without_telemetry_has_no_location() {
        let mut file = video_file_with_gps();
        file.telemetry_nmea = None;
        let mut session: MediaSession<SyntheticAdapter> =
            MediaSession::new(SyncConfig::default(), BufferConfig::default(), EventDetectorConfig::default());
        session.load(&file).unwrap();
        assert!(session.location_at(0.0).is_none());
        assert_eq!(session.distance_travelled(1.0), None);
        session.stop();
    }

    #[test]
    fn play_then_query_frames() {
        let file = video_file_with_gps();
        let mut session: MediaSession<SyntheticAdapter> =
            MediaSession::new(SyncConfig::default(), BufferConfig::default(), EventDetectorConfig::default());
        session.load(&file).unwrap();
        session.play();
        thread::sleep(Duration::from_millis(150));
        assert!(!session.synchronized_frames().is_empty());
        session.stop();
    }
}
