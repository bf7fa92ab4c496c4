// Copyright 2026 The Dashcam Core Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A single camera channel: one [`CodecAdapter`] driven by a dedicated decode worker thread,
//! draining into one [`FrameBuffer`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

use crate::buffer::{FillInfo, FrameBuffer, FrameSelectionStrategy};
use crate::codec_adapter::{CodecAdapter, OpenError, SeekError, VideoInfo};
use crate::config::BufferConfig;
use crate::frame::{AudioFrame, ChannelDescriptor, ChannelId, DecodedUnit, VideoFrame};

/// Backoff applied by the decode worker when its buffer is at capacity (§4.C step 2).
const BUFFER_FULL_BACKOFF: Duration = Duration::from_millis(10);

/// Lifecycle state of a [`VideoChannel`], per the `Idle -> Ready -> Decoding -> Completed/Errored`
/// diagram in §4.C.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelState {
    Idle,
    Ready,
    Decoding,
    Completed,
    Errored(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel is not idle")]
    NotIdle,
    #[error("channel has no adapter open yet")]
    NoAdapter,
    #[error(transparent)]
    Open(#[from] OpenError),
    #[error(transparent)]
    Seek(#[from] SeekError),
}

struct Shared {
    state: Mutex<ChannelState>,
    running: AtomicBool,
    publishes_audio: AtomicBool,
    latest_audio: Mutex<Option<AudioFrame>>,
}

/// Owns one [`CodecAdapter`] plus one [`FrameBuffer`] plus the worker thread that drains the
/// former into the latter. Equality and hashing are by [`ChannelId`] alone; never compare two
/// channels by buffer contents (see crate design notes).
pub struct VideoChannel<A: CodecAdapter + 'static> {
    pub descriptor: ChannelDescriptor,
    buffer: Arc<FrameBuffer>,
    adapter: Arc<Mutex<Option<A>>>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    video_info: Option<VideoInfo>,
}

impl<A: CodecAdapter + 'static> VideoChannel<A> {
    pub fn new(descriptor: ChannelDescriptor, buffer_config: BufferConfig) -> Self {
        assert!(buffer_config.capacity > 0, "buffer_config.capacity must be non-zero");
        let buffer = Arc::new(FrameBuffer::with_retention_window(
            buffer_config.capacity,
            buffer_config.retention_window_secs,
        ));
        Self {
            descriptor,
            buffer,
            adapter: Arc::new(Mutex::new(None)),
            shared: Arc::new(Shared {
                state: Mutex::new(ChannelState::Idle),
                running: AtomicBool::new(false),
                publishes_audio: AtomicBool::new(false),
                latest_audio: Mutex::new(None),
            }),
            worker: None,
            video_info: None,
        }
    }

    pub fn id(&self) -> &ChannelId {
        &self.descriptor.id
    }

    pub fn state(&self) -> ChannelState {
        self.shared.state.lock().unwrap().clone()
    }

    fn set_state(&self, state: ChannelState) {
        *self.shared.state.lock().unwrap() = state;
    }

    /// Opens the adapter and snapshots stream info. Fails if the channel is not `Idle` or if
    /// opening the underlying source fails.
    pub fn initialize(&mut self) -> Result<(), ChannelError> {
        if self.state() != ChannelState::Idle {
            return Err(ChannelError::NotIdle);
        }
        let adapter = A::open(&self.descriptor.source_locator)?;
        self.video_info = Some(adapter.video_info().clone());
        *self.adapter.lock().unwrap() = Some(adapter);
        self.set_state(ChannelState::Ready);
        Ok(())
    }

    pub fn video_info(&self) -> Option<&VideoInfo> {
        self.video_info.as_ref()
    }

    /// Whether this channel should retain decoded audio for the session's audio sink (set by
    /// the [`crate::sync_controller::SyncController`] according to its master-channel policy).
    pub fn set_publishes_audio(&self, publishes: bool) {
        self.shared.publishes_audio.store(publishes, Ordering::SeqCst);
    }

    /// Takes the most recently decoded audio frame, if any and if this channel publishes audio.
    pub fn take_audio_frame(&self) -> Option<AudioFrame> {
        self.shared.latest_audio.lock().unwrap().take()
    }

    /// Starts the background decode worker. Idempotent while already `Decoding`.
    pub fn start_decoding(&mut self) -> Result<(), ChannelError> {
        if self.state() == ChannelState::Decoding {
            return Ok(());
        }
        if self.adapter.lock().unwrap().is_none() {
            return Err(ChannelError::NoAdapter);
        }
        self.set_state(ChannelState::Decoding);
        self.shared.running.store(true, Ordering::SeqCst);
        self.spawn_worker();
        Ok(())
    }

    fn spawn_worker(&mut self) {
        let adapter = self.adapter.clone();
        let buffer = self.buffer.clone();
        let shared = self.shared.clone();
        let channel_id = self.descriptor.id.clone();
        self.worker = Some(thread::spawn(move || {
            decode_worker_loop(adapter, buffer, shared, channel_id);
        }));
    }

    /// Pauses the worker, flushes the buffer, repositions the adapter, and resumes the worker
    /// if it was running. Safe to call from any state that already has an adapter open.
    pub fn seek(&mut self, t: f64) -> Result<(), ChannelError> {
        if self.adapter.lock().unwrap().is_none() {
            return Err(ChannelError::NoAdapter);
        }
        let was_decoding = self.state() == ChannelState::Decoding;
        self.pause_worker();
        self.buffer.clear();
        {
            let mut guard = self.adapter.lock().unwrap();
            guard.as_mut().unwrap().seek(t)?;
        }
        if was_decoding {
            self.set_state(ChannelState::Decoding);
            self.shared.running.store(true, Ordering::SeqCst);
            self.spawn_worker();
        }
        Ok(())
    }

    fn pause_worker(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }

    /// Stops the worker, drops the adapter, clears the buffer, and returns to `Idle`.
    pub fn stop(&mut self) {
        self.pause_worker();
        *self.adapter.lock().unwrap() = None;
        self.buffer.clear();
        *self.shared.latest_audio.lock().unwrap() = None;
        self.video_info = None;
        self.set_state(ChannelState::Idle);
    }

    pub fn frame_at(&self, t: f64, strategy: FrameSelectionStrategy) -> Option<Arc<VideoFrame>> {
        self.buffer.frame_at(t, strategy)
    }

    pub fn buffer_status(&self) -> FillInfo {
        self.buffer.status()
    }
}

impl<A: CodecAdapter + 'static> Drop for VideoChannel<A> {
    fn drop(&mut self) {
        self.pause_worker();
    }
}

impl<A: CodecAdapter + 'static> PartialEq for VideoChannel<A> {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor.id == other.descriptor.id
    }
}

fn decode_worker_loop<A: CodecAdapter + 'static>(
    adapter: Arc<Mutex<Option<A>>>,
    buffer: Arc<FrameBuffer>,
    shared: Arc<Shared>,
    channel_id: ChannelId,
) {
    loop {
        if !shared.running.load(Ordering::SeqCst) {
            return;
        }
        if buffer.len() >= buffer.capacity() {
            thread::sleep(BUFFER_FULL_BACKOFF);
            continue;
        }
        let step = {
            let mut guard = adapter.lock().unwrap();
            match guard.as_mut() {
                Some(a) => a.decode_next(),
                None => return,
            }
        };
        match step {
            Ok(Some(DecodedUnit::Video(frame))) => buffer.push(frame),
            Ok(Some(DecodedUnit::Audio(audio))) => {
                if shared.publishes_audio.load(Ordering::SeqCst) {
                    *shared.latest_audio.lock().unwrap() = Some(audio);
                }
            }
            Ok(None) => continue,
            Err(crate::codec_adapter::DecodeError::EndOfStream) => {
                *shared.state.lock().unwrap() = ChannelState::Completed;
                log::debug!("channel {channel_id}: end of stream");
                return;
            }
            Err(e) => {
                log::error!("channel {channel_id}: fatal decode error: {e}");
                *shared.state.lock().unwrap() = ChannelState::Errored(e.to_string());
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec_adapter::synthetic::SyntheticAdapter;
    use crate::frame::{CameraPosition, SourceLocator};
    use std::time::Instant;

    fn descriptor(locator: &str) -> ChannelDescriptor {
        ChannelDescriptor {
            id: ChannelId("front".to_string()),
            position: CameraPosition::Front,
            source_locator: SourceLocator(locator.to_string()),
            width: 64,
            height: 48,
            frame_rate: 30.0,
            codec_name: "synthetic".to_string(),
            enabled: true,
        }
    }

    #[test]
    fn lifecycle_idle_to_decoding_to_completed() {
        let mut channel: VideoChannel<SyntheticAdapter> =
            VideoChannel::new(descriptor("synthetic:64x48@30x0.2"), BufferConfig::default());
        assert_eq!(channel.state(), ChannelState::Idle);
        channel.initialize().unwrap();
        assert_eq!(channel.state(), ChannelState::Ready);
        channel.start_decoding().unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while channel.state() == ChannelState::Decoding && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(channel.state(), ChannelState::Completed);
        assert!(channel.buffer_status().fill > 0);
    }

    #[test]
    fn initialize_twice_fails() {
        let mut channel: VideoChannel<SyntheticAdapter> =
            VideoChannel::new(descriptor("synthetic:64x48@30x1.0"), BufferConfig::default());
        channel.initialize().unwrap();
        assert!(matches!(channel.initialize(), Err(ChannelError::NotIdle)));
    }

    #[test]
    fn seek_clears_and_repositions_buffer() {
        let mut channel: VideoChannel<SyntheticAdapter> =
            VideoChannel::new(descriptor("synthetic:64x48@30x5.0"), BufferConfig::default());
        channel.initialize().unwrap();
        channel.start_decoding().unwrap();
        thread::sleep(Duration::from_millis(100));
        channel.seek(2.0).unwrap();
        thread::sleep(Duration::from_millis(100));
        let f = channel.frame_at(2.0, FrameSelectionStrategy::Nearest);
        assert!(f.is_some());
        assert!(f.unwrap().timestamp >= 1.9);
        channel.stop();
        assert_eq!(channel.state(), ChannelState::Idle);
        assert_eq!(channel.buffer_status().fill, 0);
    }

    #[test]
    fn stop_without_starting_is_safe() {
        let mut channel: VideoChannel<SyntheticAdapter> =
            VideoChannel::new(descriptor("synthetic:64x48@30x1.0"), BufferConfig::default());
        channel.initialize().unwrap();
        channel.stop();
        assert_eq!(channel.state(), ChannelState::Idle);
    }

    #[test]
    fn equality_is_by_id() {
        let a: VideoChannel<SyntheticAdapter> =
            VideoChannel::new(descriptor("synthetic:64x48@30x1.0"), BufferConfig::default());
        let b: VideoChannel<SyntheticAdapter> =
            VideoChannel::new(descriptor("synthetic:64x48@30x1.0"), BufferConfig::default());
        assert!(a == b);
    }
}
