//! Clip metadata and the sample type shared by every layer.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One interleaved 16-bit signed PCM sample.
pub type Sample = i16;

/// Maximum channel count handled by the engine (mono or stereo).
pub const MAX_CHANNELS: u16 = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ChannelFormat {
    #[default]
    Mono16,
    Stereo16,
}

impl ChannelFormat {
    pub fn from_channels(channels: u16) -> Option<Self> {
        match channels {
            1 => Some(ChannelFormat::Mono16),
            2 => Some(ChannelFormat::Stereo16),
            _ => None,
        }
    }

    pub fn channels(self) -> usize {
        match self {
            ChannelFormat::Mono16 => 1,
            ChannelFormat::Stereo16 => 2,
        }
    }
}

/// Sample rate, channel layout and length of a clip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Metadata {
    /// Frames per second
    pub rate: u32,
    pub format: ChannelFormat,
    /// Frames (one sample per channel) in the whole clip
    pub total_frames: usize,
}

impl Metadata {
    /// Validates decoder-reported values; rejects zero rates and anything but mono/stereo.
    pub fn new(rate: u32, channels: u16, total_frames: usize) -> Result<Self> {
        match ChannelFormat::from_channels(channels) {
            Some(format) if rate > 0 => Ok(Metadata {
                rate,
                format,
                total_frames,
            }),
            _ => Err(Error::UnsupportedMetadata { rate, channels }),
        }
    }

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    /// Interleaved sample count for the whole clip.
    pub fn sample_count(&self) -> usize {
        self.total_frames * self.channels()
    }

    pub fn length(&self) -> Duration {
        if self.rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.total_frames as f64 / self.rate as f64)
    }

    /// Size in bytes of the decoded clip.
    pub fn byte_size(&self) -> usize {
        self.sample_count() * std::mem::size_of::<Sample>()
    }

    /// Frame index for a timestamp, clamped to the clip.
    pub fn frame_at(&self, time: Duration) -> usize {
        let frame = (time.as_secs_f64() * self.rate as f64).round() as usize;
        frame.min(self.total_frames)
    }
}

/// Fraction of a stream already delivered given how many samples are still outstanding.
pub fn stream_progress(total: usize, outstanding: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (1.0 - outstanding as f64 / total as f64).clamp(0.0, 1.0)
}
