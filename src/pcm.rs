//! Fully decoded clips.

use crate::codecs::{decode_all, Codec, FileFormat, SymphoniaDecoder, WavDecoder};
use crate::error::{Error, Result};
use crate::metadata::{Metadata, Sample};
use crate::units::Size;
use std::path::Path;

/// Uncompressed interleaved 16-bit PCM plus its metadata. Mono and stereo only.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pcm {
    pub meta: Metadata,
    pub samples: Vec<Sample>,
    pub bytes: usize,
}

impl Pcm {
    /// Decode a whole file; the format is detected from the path when not given.
    pub fn from_file<P: AsRef<Path>>(path: P, format: Option<FileFormat>) -> Result<Pcm> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        if bytes.is_empty() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("{} is empty", path.display()),
            )));
        }

        let format = format.or_else(|| FileFormat::from_extension(path));
        Pcm::from_memory(bytes, format)
    }

    /// Decode an encoded clip held in memory; the format is sniffed when not given.
    pub fn from_memory(bytes: Vec<u8>, format: Option<FileFormat>) -> Result<Pcm> {
        if bytes.is_empty() {
            return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }

        let format = format
            .or_else(|| FileFormat::sniff(&bytes))
            .ok_or(Error::UnknownFormat)?;

        match format {
            FileFormat::Wav => Pcm::decode(WavDecoder::open_memory(bytes)?),
            FileFormat::Flac | FileFormat::Mp3 => {
                Pcm::decode(SymphoniaDecoder::open_memory(bytes)?)
            }
        }
    }

    fn decode<C: Codec>(mut codec: C) -> Result<Pcm> {
        let meta = codec.metadata();
        let samples = decode_all(&mut codec)?;
        let bytes = samples.len() * std::mem::size_of::<Sample>();

        Ok(Pcm {
            meta,
            samples,
            bytes,
        })
    }

    pub fn size(&self) -> Size {
        Size::from_bytes(self.bytes)
    }
}
