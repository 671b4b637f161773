//! Integration tests for the music front end.

mod common;

use common::*;
use std::time::Duration;

/// Test the state transitions of a streamed track.
#[test]
fn test_state_transitions() {
    let harness = TestHarness::new();
    let music = harness.music();
    assert!(!music.ready());
    assert_eq!(music.state(), State::Idle);

    music
        .open(harness.wav("track.wav", RATE, 1, RATE as usize))
        .unwrap();
    assert!(music.ready());
    assert_eq!(music.length(), Duration::from_secs(1));

    assert!(music.play());
    assert!(music.playing());
    assert!(music.pause());
    assert_eq!(music.state(), State::Paused);
    assert!(music.play());
    assert!(music.stop());
    assert_eq!(music.state(), State::Stopped);
    assert_eq!(music.position(), Duration::ZERO);
}

/// Test opening a new track discards what the old one had queued.
#[test]
fn test_open_replaces_playing_track() {
    let harness = TestHarness::new();
    let music = harness.music();

    music
        .open(harness.wav("first.wav", RATE, 1, RATE as usize))
        .unwrap();
    assert!(music.play());
    harness.play_through(music.source(), 6000);

    music
        .open(harness.wav("second.wav", 22050, 2, 22050 * 3))
        .unwrap();
    assert_eq!(music.source().queued(), 0);
    assert_eq!(music.meta().rate, 22050);
    assert_eq!(music.meta().channels(), 2);
    assert_eq!(music.length(), Duration::from_secs(3));

    assert!(music.play());
    assert_eq!(music.position(), Duration::ZERO);
}

/// Test a failed open keeps the previous track loaded.
#[test]
fn test_failed_open_keeps_previous_track() {
    let harness = TestHarness::new();
    let music = harness.music();

    music
        .open(harness.wav("keep.wav", RATE, 1, RATE as usize))
        .unwrap();
    assert!(music.open(harness.dir.path().join("nope.wav")).is_err());

    assert!(music.ready());
    assert_eq!(music.meta().total_frames, RATE as usize);
    assert!(music.play());
}

/// Test preloading a decoded clip.
#[test]
fn test_preload() {
    let harness = TestHarness::new();
    let music = harness.music();
    let pcm = Pcm::from_file(harness.wav("pcm.wav", RATE, 1, RATE as usize / 2), None).unwrap();

    music.preload(pcm.clone()).unwrap();
    assert_eq!(music.meta(), pcm.meta);
    assert_eq!(music.size(), pcm.size());

    assert!(music.play());
    music.seek(0.25).unwrap();
    assert!(within(
        music.position(),
        Duration::from_millis(250),
        chunk_duration()
    ));
}

/// Test gain, pitch and looping accessors.
#[test]
fn test_voice_settings() {
    let harness = TestHarness::new();
    let music = harness.music();

    assert!((music.gain() - 1.0).abs() < f32::EPSILON);
    assert!(music.set_gain(0.3));
    assert!((music.gain() - 0.3).abs() < f32::EPSILON);
    assert!(!music.set_gain(-0.3));

    assert!((music.pitch() - 1.0).abs() < f32::EPSILON);
    assert!(music.set_pitch(2.0));
    assert!((music.pitch() - 2.0).abs() < f32::EPSILON);

    assert!(!music.looping());
    assert!(music.set_looping(true));
    assert!(music.looping());
}

/// Test human readable metadata.
#[test]
fn test_display_units() {
    let harness = TestHarness::new();
    let music = harness.music();
    music
        .open(harness.wav("units.wav", 48000, 2, 48000 * 2))
        .unwrap();

    assert_eq!(music.sample_rate().to_string(), "48.0kHz");
    assert_eq!(music.size().to_string(), "375.00KiB");
}
