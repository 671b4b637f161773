//! Friendlier front end over a single streaming voice.

use crate::error::{Error, Result};
use crate::metadata::Metadata;
use crate::pcm::Pcm;
use crate::stream_source::{State, StreamSource};
use crate::units::{Rate, Size};
use std::path::Path;
use std::time::Duration;

pub struct Music {
    source: StreamSource,
}

impl Music {
    pub fn new(source: StreamSource) -> Self {
        Music { source }
    }

    /// Stream `path`, discarding whatever was playing before.
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.source.stop();
        self.source.open(path)
    }

    pub fn preload(&self, pcm: Pcm) -> Result<()> {
        self.source.stop();
        self.source.load(pcm);
        Ok(())
    }

    pub fn play(&self) -> bool {
        self.source.play()
    }

    pub fn pause(&self) -> bool {
        self.source.pause()
    }

    pub fn stop(&self) -> bool {
        self.source.stop()
    }

    /// Jump to `secs` seconds from the start.
    pub fn seek(&self, secs: f64) -> Result<()> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(Error::InvalidValue(format!(
                "seek target must be a non-negative number of seconds, got {secs}"
            )));
        }
        self.source.seek(Duration::from_secs_f64(secs))
    }

    pub fn position(&self) -> Duration {
        self.source.position()
    }

    pub fn state(&self) -> State {
        self.source.state()
    }

    pub fn playing(&self) -> bool {
        self.source.playing()
    }

    pub fn set_gain(&self, gain: f32) -> bool {
        self.source.set_gain(gain)
    }

    pub fn gain(&self) -> f32 {
        self.source.gain()
    }

    pub fn set_pitch(&self, pitch: f32) -> bool {
        self.source.set_pitch(pitch)
    }

    pub fn pitch(&self) -> f32 {
        self.source.pitch()
    }

    pub fn set_looping(&self, looping: bool) -> bool {
        self.source.set_looping(looping)
    }

    pub fn looping(&self) -> bool {
        self.source.looping()
    }

    pub fn meta(&self) -> Metadata {
        self.source.meta()
    }

    pub fn size(&self) -> Size {
        self.source.size()
    }

    pub fn sample_rate(&self) -> Rate {
        self.source.sample_rate()
    }

    pub fn length(&self) -> Duration {
        self.meta().length()
    }

    /// A clip is loaded and can be played.
    pub fn ready(&self) -> bool {
        self.source.valid()
    }

    pub fn source(&self) -> &StreamSource {
        &self.source
    }
}
