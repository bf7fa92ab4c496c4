// Copyright 2026 The Dashcam Core Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A deterministic, in-memory [`CodecAdapter`] used by this crate's own tests and demo binary in
//! place of a real FFmpeg binding, the same way the teacher exercises its decoders against canned
//! bitstream bytes rather than hardware.

use crate::codec_adapter::{AudioInfo, CodecAdapter, DecodeError, OpenError, SeekError, TimeBase, VideoInfo};
use crate::frame::{DecodedUnit, PixelFormat, SampleFormat, SourceLocator, VideoFrame};

/// Construction parameters for [`SyntheticAdapter`], independent of the locator string format.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyntheticAdapterOptions {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub duration: f64,
    pub keyframe_interval: u64,
    pub with_audio: bool,
}

impl Default for SyntheticAdapterOptions {
    fn default() -> Self {
        Self {
            width: 64,
            height: 48,
            frame_rate: 30.0,
            duration: 10.0,
            keyframe_interval: 30,
            with_audio: false,
        }
    }
}

/// Parses a `synthetic:<width>x<height>@<fps>x<duration>[:audio]` locator, e.g.
/// `synthetic:640x480@30x10.0:audio`. Intended only for this crate's tests and demo; a real
/// `SourceLocator` is otherwise opaque to the core.
fn parse_locator(locator: &SourceLocator) -> Result<SyntheticAdapterOptions, OpenError> {
    let s = locator.0.strip_prefix("synthetic:").ok_or_else(|| {
        OpenError::CannotOpen(format!("not a synthetic locator: {}", locator.0))
    })?;
    let with_audio = s.ends_with(":audio");
    let s = s.strip_suffix(":audio").unwrap_or(s);

    // Split on the *last* 'x': "<width>x<height>@<fps>" x "<duration>".
    let idx = s.rfind('x').ok_or_else(|| OpenError::CannotOpen("missing duration".to_string()))?;
    let (dims_fps, duration) = s.split_at(idx);
    let duration: f64 = duration
        .trim_start_matches('x')
        .parse()
        .map_err(|_| OpenError::CorruptedHeader)?;

    let (dims, fps) = dims_fps
        .split_once('@')
        .ok_or_else(|| OpenError::CannotOpen("missing '@fps'".to_string()))?;
    let frame_rate: f64 = fps.parse().map_err(|_| OpenError::CorruptedHeader)?;

    let (width, height) = dims
        .split_once('x')
        .ok_or_else(|| OpenError::CannotOpen("missing '<w>x<h>'".to_string()))?;
    let width: u32 = width.parse().map_err(|_| OpenError::CorruptedHeader)?;
    let height: u32 = height.parse().map_err(|_| OpenError::CorruptedHeader)?;

    Ok(SyntheticAdapterOptions {
        width,
        height,
        frame_rate,
        duration,
        with_audio,
        ..SyntheticAdapterOptions::default()
    })
}

/// Deterministic solid-color frame generator standing in for a real codec.
pub struct SyntheticAdapter {
    video_info: VideoInfo,
    audio_info: Option<AudioInfo>,
    frame_period: f64,
    duration: f64,
    keyframe_interval: u64,
    frame_number: u64,
    next_timestamp: f64,
    audio_emitted_up_to: f64,
}

const AUDIO_CHUNK_SECS: f64 = 0.1;

impl SyntheticAdapter {
    pub fn with_options(options: SyntheticAdapterOptions) -> Self {
        let video_info = VideoInfo {
            width: options.width,
            height: options.height,
            frame_rate: options.frame_rate,
            codec_name: "synthetic".to_string(),
            bitrate: 0,
            time_base: TimeBase { num: 1, den: 1_000_000 },
        };
        let audio_info = options.with_audio.then(|| AudioInfo {
            sample_rate: 48_000,
            channels: 1,
            codec_name: "synthetic-pcm".to_string(),
            time_base: TimeBase { num: 1, den: 1_000_000 },
        });
        Self {
            video_info,
            audio_info,
            frame_period: 1.0 / options.frame_rate,
            duration: options.duration,
            keyframe_interval: options.keyframe_interval.max(1),
            frame_number: 0,
            next_timestamp: 0.0,
            audio_emitted_up_to: 0.0,
        }
    }

    fn make_video_frame(&mut self) -> VideoFrame {
        let ts = self.next_timestamp;
        let frame_number = self.frame_number;
        let is_keyframe = frame_number % self.keyframe_interval == 0;
        let row_stride = self.video_info.width as usize * PixelFormat::Bgra8.bytes_per_pixel();
        let size = row_stride * self.video_info.height as usize;
        // Encode the frame number into every pixel so tests can verify identity/ordering.
        let byte = (frame_number % 256) as u8;
        let pixel_data = vec![byte; size];

        self.frame_number += 1;
        self.next_timestamp = self.frame_number as f64 * self.frame_period;

        VideoFrame {
            timestamp: ts,
            width: self.video_info.width,
            height: self.video_info.height,
            pixel_format: PixelFormat::Bgra8,
            pixel_data,
            row_stride,
            frame_number,
            is_keyframe,
        }
    }
}

impl CodecAdapter for SyntheticAdapter {
    fn open(locator: &SourceLocator) -> Result<Self, OpenError> {
        let options = parse_locator(locator)?;
        Ok(Self::with_options(options))
    }

    fn video_info(&self) -> &VideoInfo {
        &self.video_info
    }

    fn audio_info(&self) -> Option<&AudioInfo> {
        self.audio_info.as_ref()
    }

    fn decode_next(&mut self) -> Result<Option<DecodedUnit>, DecodeError> {
        if self.next_timestamp >= self.duration {
            return Err(DecodeError::EndOfStream);
        }
        if self.audio_info.is_some() && self.next_timestamp >= self.audio_emitted_up_to {
            let ts = self.audio_emitted_up_to;
            self.audio_emitted_up_to += AUDIO_CHUNK_SECS;
            let sample_rate = self.audio_info.as_ref().unwrap().sample_rate;
            let sample_count = (sample_rate as f64 * AUDIO_CHUNK_SECS) as usize;
            return Ok(Some(DecodedUnit::Audio(crate::frame::AudioFrame {
                timestamp: ts,
                sample_rate,
                channel_count: 1,
                sample_format: SampleFormat::S16Interleaved,
                sample_count,
                pcm_bytes: vec![0u8; sample_count * 2],
            })));
        }
        Ok(Some(DecodedUnit::Video(self.make_video_frame())))
    }

    fn seek(&mut self, t: f64) -> Result<(), SeekError> {
        if t < 0.0 || t > self.duration {
            return Err(SeekError::OutOfRange);
        }
        let target_frame = (t / self.frame_period).floor() as u64;
        let keyframe = (target_frame / self.keyframe_interval) * self.keyframe_interval;
        self.frame_number = keyframe;
        self.next_timestamp = keyframe as f64 * self.frame_period;
        self.audio_emitted_up_to = self.next_timestamp;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator(s: &str) -> SourceLocator {
        SourceLocator(s.to_string())
    }

    #[test]
    fn parses_basic_locator() {
        let opts = parse_locator(&locator("synthetic:640x480@30x10")).unwrap();
        assert_eq!(opts.width, 640);
        assert_eq!(opts.height, 480);
        assert_eq!(opts.frame_rate, 30.0);
        assert_eq!(opts.duration, 10.0);
        assert!(!opts.with_audio);
    }

    #[test]
    fn parses_audio_suffix() {
        let opts = parse_locator(&locator("synthetic:64x48@30x1.0:audio")).unwrap();
        assert!(opts.with_audio);
        assert_eq!(opts.duration, 1.0);
    }

    #[test]
    fn rejects_non_synthetic_locator() {
        assert!(parse_locator(&locator("file:///tmp/front.mp4")).is_err());
    }

    #[test]
    fn decodes_frames_with_increasing_timestamps_to_eos() {
        let mut adapter =
            SyntheticAdapter::with_options(SyntheticAdapterOptions { duration: 0.1, frame_rate: 30.0, ..Default::default() });
        let mut last = -1.0;
        let mut count = 0;
        loop {
            match adapter.decode_next() {
                Ok(Some(DecodedUnit::Video(f))) => {
                    assert!(f.timestamp > last);
                    last = f.timestamp;
                    count += 1;
                }
                Ok(Some(DecodedUnit::Audio(_))) => {}
                Ok(None) => continue,
                Err(DecodeError::EndOfStream) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert!(count >= 3);
    }

    #[test]
    fn seek_lands_on_or_before_keyframe() {
        let mut adapter = SyntheticAdapter::with_options(SyntheticAdapterOptions {
            duration: 5.0,
            frame_rate: 30.0,
            keyframe_interval: 15,
            ..Default::default()
        });
        adapter.seek(1.0).unwrap();
        if let Ok(Some(DecodedUnit::Video(f))) = adapter.decode_next() {
            assert!(f.is_keyframe);
            assert!(f.timestamp <= 1.0);
        } else {
            panic!("expected a video frame after seek");
        }
    }

    #[test]
    fn seek_out_of_range_rejected() {
        let mut adapter = SyntheticAdapter::with_options(SyntheticAdapterOptions::default());
        assert!(matches!(adapter.seek(-1.0), Err(SeekError::OutOfRange)));
        assert!(matches!(adapter.seek(1000.0), Err(SeekError::OutOfRange)));
    }
}
