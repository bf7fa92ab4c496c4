// Copyright 2026 The Dashcam Core Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Synchronized multi-channel dashcam video playback core.
//!
//! This crate turns a set of per-camera video files that share one recording timeline, plus
//! optional NMEA-0183 GPS telemetry, into a single playback session with one master clock. It
//! owns decoding, buffering, and synchronization; it does not touch storage devices, UI
//! rendering, or actual codec bitstreams — those are supplied by the host application.
//!
//! The [frame] module defines the data model: decoded video/audio units and the static
//! description of a multi-channel recording.
//!
//! The [buffer] module is the per-channel time-sorted ring of recently decoded frames that
//! playback reads from.
//!
//! The [codec_adapter] module is the pluggable decode boundary: a [codec_adapter::CodecAdapter]
//! turns an opaque [frame::SourceLocator] into a sequence of [frame::DecodedUnit]s. This crate
//! ships one adapter, [codec_adapter::synthetic], for testing and demos; production hosts supply
//! their own.
//!
//! The [channel] module drives one [codec_adapter::CodecAdapter] on a background thread, filling
//! a [buffer::FrameBuffer].
//!
//! The [sync_controller] module is the master clock: it anchors a wall-clock-derived playback
//! position across every channel, measures and reacts to inter-channel drift, and tracks overall
//! playback state.
//!
//! The [telemetry] module parses and indexes GPS telemetry, and [telemetry::event_detector]
//! derives driving events (hard braking, sharp turns, rapid acceleration) from it.
//!
//! The [config] module groups the policy knobs of the modules above into small `Default`-impl
//! structs.
//!
//! The [session] module is the facade: [session::MediaSession] wires the pieces above into the
//! single entry point a host application uses, and declares the two external-collaborator traits
//! ([session::StorageBackend], [session::MetadataProvider]) a host implements itself.

pub mod buffer;
pub mod channel;
pub mod codec_adapter;
pub mod config;
pub mod frame;
pub mod session;
pub mod sync_controller;
pub mod telemetry;
