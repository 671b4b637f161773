//! WAV decoding via hound. Only 16-bit integer PCM is accepted.

use super::{Codec, ReadSeek};
use crate::error::{Error, Result};
use crate::metadata::{Metadata, Sample};
use hound::{SampleFormat, WavReader};
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

pub struct WavDecoder {
    reader: WavReader<Box<dyn ReadSeek>>,
    meta: Metadata,
}

impl WavDecoder {
    fn new(source: Box<dyn ReadSeek>) -> Result<Self> {
        let reader = WavReader::new(source)?;
        let spec = reader.spec();

        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(Error::UnsupportedMetadata {
                rate: spec.sample_rate,
                channels: spec.channels,
            });
        }

        let meta = Metadata::new(spec.sample_rate, spec.channels, reader.duration() as usize)?;

        Ok(WavDecoder { reader, meta })
    }
}

impl Codec for WavDecoder {
    fn open_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        WavDecoder::new(Box::new(BufReader::new(file)))
    }

    fn open_memory(bytes: Vec<u8>) -> Result<Self> {
        WavDecoder::new(Box::new(Cursor::new(bytes)))
    }

    fn metadata(&self) -> Metadata {
        self.meta
    }

    fn read_frames(&mut self, out: &mut [Sample]) -> Result<usize> {
        let channels = self.meta.channels();
        let wanted = out.len() / channels * channels;

        let mut written = 0;
        for (slot, sample) in out[..wanted]
            .iter_mut()
            .zip(self.reader.samples::<i16>())
        {
            *slot = sample?;
            written += 1;
        }

        Ok(written / channels)
    }

    fn seek_to_frame(&mut self, frame: usize) -> Result<bool> {
        let frame = frame.min(self.meta.total_frames);
        self.reader.seek(frame as u32)?;
        Ok(true)
    }
}
