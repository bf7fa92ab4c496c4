// Copyright 2026 The Dashcam Core Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! play_session, a small CLI that drives a [`MediaSession`] over a synthetic multi-channel
//! recording and prints the synchronized frame set on every tick, the way `ccdec` drives a
//! decoder over a bitstream file and prints per-frame checksums.

use std::thread;
use std::time::Duration;

use argh::FromArgs;
use chrono::Utc;

use dashcam_core::codec_adapter::synthetic::SyntheticAdapter;
use dashcam_core::config::{BufferConfig, EventDetectorConfig, SyncConfig};
use dashcam_core::frame::{CameraPosition, ChannelDescriptor, ChannelId, SourceLocator, VideoFile, VideoFileId};
use dashcam_core::session::MediaSession;
use dashcam_core::sync_controller::PlaybackState;

/// Play a synchronized two-channel synthetic dashcam session and print frame timestamps.
#[derive(FromArgs)]
struct Args {
    /// recording duration in seconds
    #[argh(option, default = "10.0")]
    duration: f64,

    /// playback speed multiplier
    #[argh(option, default = "1.0")]
    speed: f64,

    /// seek to this playback time (seconds) immediately after starting playback
    #[argh(option)]
    seek: Option<f64>,

    /// sample NMEA telemetry text into the front channel (hard-braking then cruise)
    #[argh(switch)]
    with_telemetry: bool,
}

const SAMPLE_NMEA: &str = "\
$GPRMC,000000,A,3742.000,N,12700.000,E,060.0,090.0,010124,,*12
$GPRMC,000001,A,3742.010,N,12700.010,E,035.0,090.0,010124,,*13
$GPRMC,000002,A,3742.015,N,12700.015,E,036.0,090.0,010124,,*13
$GPGGA,000002,3742.015,N,12700.015,E,1,08,0.9,50.0,M,0.0,M,,*42
";

fn front() -> ChannelDescriptor {
    ChannelDescriptor {
        id: ChannelId("front".to_string()),
        position: CameraPosition::Front,
        source_locator: SourceLocator("synthetic:640x480@30x10.0".to_string()),
        width: 640,
        height: 480,
        frame_rate: 30.0,
        codec_name: "synthetic".to_string(),
        enabled: true,
    }
}

fn rear() -> ChannelDescriptor {
    ChannelDescriptor {
        id: ChannelId("rear".to_string()),
        position: CameraPosition::Rear,
        source_locator: SourceLocator("synthetic:640x480@30x10.0".to_string()),
        width: 640,
        height: 480,
        frame_rate: 30.0,
        codec_name: "synthetic".to_string(),
        enabled: true,
    }
}

fn main() {
    env_logger::init();
    let args: Args = argh::from_env();

    let video_file = VideoFile {
        id: VideoFileId("demo-session".to_string()),
        channels: vec![front(), rear()],
        start_wallclock: Utc::now(),
        duration: args.duration,
        telemetry_nmea: args.with_telemetry.then(|| SAMPLE_NMEA.to_string()),
    };

    let mut session: MediaSession<SyntheticAdapter> = MediaSession::new(
        SyncConfig::default(),
        BufferConfig::default(),
        EventDetectorConfig::default(),
    );
    session.load(&video_file).expect("failed to load session");
    session.set_speed(args.speed);
    session.play();

    if let Some(t) = args.seek {
        thread::sleep(Duration::from_millis(150));
        session.seek(t).expect("seek failed");
    }

    for event in session.events() {
        println!("event: {:?} at t={:.2}s magnitude={:.2}", event.kind, event.playback_time, event.magnitude);
    }

    loop {
        thread::sleep(Duration::from_millis(200));
        let frames = session.synchronized_frames();
        print!("t={:.2}s state={:?}", session.current_time(), session.state());
        for (position, frame) in &frames {
            print!(" {position:?}={:.3}", frame.timestamp);
        }
        println!();

        if matches!(session.state(), PlaybackState::Completed | PlaybackState::Error(_)) {
            break;
        }
    }

    session.stop();
}
