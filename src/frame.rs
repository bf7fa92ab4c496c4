// Copyright 2026 The Dashcam Core Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Data model: decoded frames and the static description of a multi-channel recording.

use std::fmt;

use chrono::{DateTime, Utc};

/// Pixel layout of a decoded [`VideoFrame`]'s `pixel_data`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Bgra8,
    Rgba8,
}

impl PixelFormat {
    /// Bytes occupied by a single pixel in this format.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
        }
    }
}

/// PCM sample layout of an [`AudioFrame`]'s `pcm_bytes`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    F32Planar,
    F32Interleaved,
    S16Planar,
    S16Interleaved,
    S32Planar,
    S32Interleaved,
}

/// A single decoded image, immutable once constructed.
///
/// `timestamp` is the presentation time in seconds since the owning channel's stream start and
/// is monotonically increasing across frames from the same channel. `row_stride` may exceed
/// `width * pixel_format.bytes_per_pixel()` due to alignment padding inserted by the decoder;
/// callers must index rows by stride, not by width.
#[derive(Clone, Debug)]
pub struct VideoFrame {
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub pixel_data: Vec<u8>,
    pub row_stride: usize,
    pub frame_number: u64,
    pub is_keyframe: bool,
}

/// A block of PCM samples tied to a presentation timestamp.
///
/// Only produced by the audio-bearing master channel (see [`crate::sync_controller`]); other
/// channels' audio units are discarded by their decode worker.
#[derive(Clone, Debug)]
pub struct AudioFrame {
    pub timestamp: f64,
    pub sample_rate: u32,
    pub channel_count: u16,
    pub sample_format: SampleFormat,
    pub sample_count: usize,
    pub pcm_bytes: Vec<u8>,
}

/// Either kind of unit a [`crate::codec_adapter::CodecAdapter`] can hand back from one decode
/// step.
#[derive(Clone, Debug)]
pub enum DecodedUnit {
    Video(VideoFrame),
    Audio(AudioFrame),
}

/// Physical mounting position of a camera, used both as `ChannelDescriptor::position` and as the
/// key of [`crate::session::MediaSession::synchronized_frames`]'s output map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CameraPosition {
    Front,
    Rear,
    Left,
    Right,
    Interior,
    Other,
}

/// Stable identifier of one channel within a [`VideoFile`]. Two channels are equal iff their ids
/// are equal; buffer contents are never compared.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub String);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier of a [`VideoFile`], used to key persisted favorites/notes (see
/// [`crate::session::MetadataProvider`]).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VideoFileId(pub String);

/// Opaque reference to the backing media for one channel. The core never interprets this value;
/// a [`crate::codec_adapter::CodecAdapter`] implementation does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLocator(pub String);

/// Static metadata of one camera channel within a [`VideoFile`].
#[derive(Clone, Debug)]
pub struct ChannelDescriptor {
    pub id: ChannelId,
    pub position: CameraPosition,
    pub source_locator: SourceLocator,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub codec_name: String,
    pub enabled: bool,
}

/// The composite unit loaded by [`crate::session::MediaSession::load`]: a set of channels that
/// share one timeline, plus optional raw NMEA-0183 telemetry text.
#[derive(Clone, Debug)]
pub struct VideoFile {
    pub id: VideoFileId,
    pub channels: Vec<ChannelDescriptor>,
    pub start_wallclock: DateTime<Utc>,
    pub duration: f64,
    /// Sentence-per-line NMEA-0183 text, if this recording carries GPS telemetry. Parsed by
    /// [`crate::telemetry::nmea`] during `load`.
    pub telemetry_nmea: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_per_pixel() {
        assert_eq!(PixelFormat::Bgra8.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Rgba8.bytes_per_pixel(), 4);
    }

    #[test]
    fn channel_id_equality_ignores_nothing_else() {
        let a = ChannelId("front".to_string());
        let b = ChannelId("front".to_string());
        let c = ChannelId("rear".to_string());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
