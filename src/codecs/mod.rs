//! Per-format decoders behind one pull-based capability.
//!
//! Every decoder implements the `Codec` trait, which provides frame-granular reads into an
//! interleaved 16-bit sample buffer, optional frame-accurate seeking and clip metadata.

pub mod symphonia;
pub mod wav;

use crate::error::{Error, Result};
use crate::metadata::{Metadata, Sample};
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek};
use std::path::Path;

pub use self::symphonia::SymphoniaDecoder;
pub use self::wav::WavDecoder;

/// Byte source a decoder can read from and rewind.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Decode primitive implemented once per container format.
pub trait Codec: Send {
    /// Open an encoded file for sequential decoding.
    fn open_path(path: &Path) -> Result<Self>
    where
        Self: Sized;

    /// Open an in-memory encoded clip.
    fn open_memory(bytes: Vec<u8>) -> Result<Self>
    where
        Self: Sized;

    fn metadata(&self) -> Metadata;

    /// Decode up to `out.len() / channels` frames into `out`.
    ///
    /// Returns the number of frames written; fewer than requested only at end of stream.
    fn read_frames(&mut self, out: &mut [Sample]) -> Result<usize>;

    /// Reposition so the next read starts at `frame`.
    ///
    /// Returns `Ok(false)` when the underlying stream cannot seek; callers then fall back to
    /// reopening from the start.
    fn seek_to_frame(&mut self, _frame: usize) -> Result<bool> {
        Ok(false)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum FileFormat {
    Wav,
    Flac,
    Mp3,
}

const SUPPORTED_EXTENSIONS: [(&str, FileFormat); 3] = [
    ("wav", FileFormat::Wav),
    ("flac", FileFormat::Flac),
    ("mp3", FileFormat::Mp3),
];

impl FileFormat {
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        SUPPORTED_EXTENSIONS
            .iter()
            .find(|(candidate, _)| *candidate == ext)
            .map(|(_, format)| *format)
    }

    /// Recognize a format from the first bytes of an encoded clip.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => Some(FileFormat::Wav),
            [b'f', b'L', b'a', b'C', ..] => Some(FileFormat::Flac),
            [b'I', b'D', b'3', ..] => Some(FileFormat::Mp3),
            [0xFF, second, ..] if second & 0xE0 == 0xE0 => Some(FileFormat::Mp3),
            _ => None,
        }
    }

    /// Extension first, then the file signature.
    pub fn detect(path: &Path) -> Result<Self> {
        if let Some(format) = Self::from_extension(path) {
            return Ok(format);
        }

        let mut header = [0u8; 12];
        let mut file = std::fs::File::open(path)?;
        let read = file.read(&mut header)?;
        Self::sniff(&header[..read]).ok_or(Error::UnknownFormat)
    }

    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Wav => "wav",
            FileFormat::Flac => "flac",
            FileFormat::Mp3 => "mp3",
        }
    }
}

/// Drain a codec completely into a freshly allocated interleaved buffer.
///
/// Fails with `UnexpectedEof` when the decoder runs dry before its declared frame count.
pub fn decode_all<C: Codec>(codec: &mut C) -> Result<Vec<Sample>> {
    let meta = codec.metadata();
    let channels = meta.channels();
    let mut samples = vec![0; meta.sample_count()];
    let mut frames = 0;

    while frames < meta.total_frames {
        let read = codec.read_frames(&mut samples[frames * channels..])?;
        if read == 0 {
            break;
        }
        frames += read;
    }

    if frames < meta.total_frames {
        return Err(Error::UnexpectedEof {
            expected: meta.total_frames,
            read: frames,
        });
    }

    Ok(samples)
}
