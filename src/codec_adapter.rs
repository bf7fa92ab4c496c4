// Copyright 2026 The Dashcam Core Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The pluggable decode backend: wraps a native decoder library and yields timestamped frames.
//!
//! [`CodecAdapter`] is codec-independent orchestration; a real implementation binds to FFmpeg
//! (`avformat_open_input`, `avcodec_send_packet`/`avcodec_receive_frame`, `sws_scale`,
//! `av_seek_frame`) and is an external collaborator, not implemented by this crate (see the
//! crate's scope note). [`synthetic::SyntheticAdapter`] is the deterministic in-memory double
//! this crate's own tests and demo binary drive instead.

pub mod synthetic;

use thiserror::Error;

use crate::frame::{DecodedUnit, SourceLocator};

/// Rational time base used to derive a frame's presentation timestamp from its raw `pts`:
/// `timestamp = pts * num / den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeBase {
    pub num: u32,
    pub den: u32,
}

/// Video stream parameters available once [`CodecAdapter::open`] succeeds.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub codec_name: String,
    pub bitrate: u64,
    pub time_base: TimeBase,
}

/// Audio stream parameters, present only if the source carries an audio track.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub codec_name: String,
    pub time_base: TimeBase,
}

/// Errors from [`CodecAdapter::open`].
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("cannot open source: {0}")]
    CannotOpen(String),
    #[error("no video stream present")]
    NoVideoStream,
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),
    #[error("corrupted stream header")]
    CorruptedHeader,
}

/// Errors from [`CodecAdapter::decode_next`].
///
/// `Ok(None)` (EAGAIN-equivalent: the decoder wants more input before it can yield a frame) and
/// `Err(DecodeError::EndOfStream)` are both normal, non-fatal outcomes the caller must expect on
/// every call; any other variant is a one-shot, terminal error for the owning channel.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("end of stream")]
    EndOfStream,
    #[error("corrupted bitstream: {0}")]
    Corrupted(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from [`CodecAdapter::seek`].
#[derive(Debug, Error)]
pub enum SeekError {
    #[error("seek target out of range")]
    OutOfRange,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Wraps a native decoder for one media source. Implementations own non-`Send`-shareable native
/// state and are therefore used exclusively by the single worker thread that owns them (see
/// [`crate::channel::VideoChannel`]); ownership only moves during `seek`, which pauses that
/// worker first.
pub trait CodecAdapter: Send {
    fn open(locator: &SourceLocator) -> Result<Self, OpenError>
    where
        Self: Sized;

    fn video_info(&self) -> &VideoInfo;

    fn audio_info(&self) -> Option<&AudioInfo>;

    /// Attempts to produce the next decoded unit. `Ok(None)` means "call again"; it is not an
    /// error. `Err(DecodeError::EndOfStream)` is the normal terminal state.
    fn decode_next(&mut self) -> Result<Option<DecodedUnit>, DecodeError>;

    /// Moves the read position to the last keyframe at or before `t` and flushes decoder state.
    /// Landing exactly on `t` is the caller's job: decode forward until a frame's timestamp
    /// reaches `t`.
    fn seek(&mut self, t: f64) -> Result<(), SeekError>;
}
