use super::Codec;
use crate::error::{Error, Result};
use crate::metadata::{Metadata, Sample};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

// Decode errors are not fatal on their own, the next packet is tried instead.
// More than this many consecutive failures end the stream.
const MAX_DECODE_RETRIES: usize = 3;

/// FLAC / MP3 (and anything else symphonia probes) decoded packet by packet.
pub struct SymphoniaDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    meta: Metadata,
    sample_buf: Option<SampleBuffer<i16>>,
    /// Frame capacity of `sample_buf`
    capacity: usize,
    /// Samples of `sample_buf` already handed out
    offset: usize,
}

impl SymphoniaDecoder {
    pub fn open_with_hint(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<Self> {
        // Create the media source stream using the boxed media source from above.
        let mss = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let format_opts: FormatOptions = Default::default();
        let metadata_opts: MetadataOptions = Default::default();
        let decoder_opts: DecoderOptions = Default::default();

        let probed =
            symphonia::default::get_probe().format(&hint, mss, &format_opts, &metadata_opts)?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::InvalidData("no audio track found".to_string()))?;

        let track_id = track.id;
        let params = track.codec_params.clone();

        let rate = params.sample_rate.unwrap_or(0);
        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(0);
        let declared_frames = params.n_frames;

        let decoder = symphonia::default::get_codecs().make(&params, &decoder_opts)?;

        let mut this = SymphoniaDecoder {
            format,
            decoder,
            track_id,
            meta: Metadata::new(rate, channels, 0)?,
            sample_buf: None,
            capacity: 0,
            offset: 0,
        };

        this.meta.total_frames = match declared_frames {
            Some(frames) => frames as usize,
            None => this.measure_frames()?,
        };

        debug!(
            "Opened {} stream: {} Hz, {} channel(s), {} frames",
            extension.unwrap_or("probed"),
            this.meta.rate,
            this.meta.channels(),
            this.meta.total_frames
        );

        Ok(this)
    }

    /// Count frames by walking every packet, then rewind the reader.
    fn measure_frames(&mut self) -> Result<usize> {
        let mut frames = 0u64;
        loop {
            match self.format.next_packet() {
                Ok(packet) if packet.track_id() == self.track_id => frames += packet.dur(),
                Ok(_) => continue,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.format
            .seek(
                SeekMode::Coarse,
                SeekTo::TimeStamp {
                    ts: 0,
                    track_id: self.track_id,
                },
            )
            .map_err(|e| Error::InvalidData(format!("cannot rewind after length scan: {e}")))?;
        self.decoder.reset();

        Ok(frames as usize)
    }

    fn pending(&self) -> &[Sample] {
        match &self.sample_buf {
            Some(buf) => &buf.samples()[self.offset..],
            None => &[],
        }
    }

    /// Decode the next packet of our track into `sample_buf`.
    ///
    /// Returns `Ok(false)` at end of stream.
    fn decode_next(&mut self) -> Result<bool> {
        let mut decode_errors = 0;

        loop {
            // Symphonia seems to return UnexpectedEof even if the EOF was expected,
            // handle this gracefully
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(false),
                Err(e) => return Err(e.into()),
            };

            // If the packet does not belong to the selected track, skip it.
            if packet.track_id() != self.track_id {
                continue;
            }

            let audio_buf = match self.decoder.decode(&packet) {
                Ok(audio_buf) => audio_buf,
                Err(SymphoniaError::DecodeError(msg)) => {
                    decode_errors += 1;
                    warn!("Decode error ({decode_errors}/{MAX_DECODE_RETRIES}): {msg}");
                    if decode_errors > MAX_DECODE_RETRIES {
                        return Err(Error::InvalidData(msg.to_string()));
                    }
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *audio_buf.spec();
            if spec.channels.count() != self.meta.channels() {
                return Err(Error::InvalidData(format!(
                    "channel count changed mid-stream to {}",
                    spec.channels.count()
                )));
            }

            // Get the capacity of the decoded buffer. Note: This is capacity, not length!
            let frames = audio_buf.capacity();
            if self.sample_buf.is_none() || frames > self.capacity {
                self.sample_buf = Some(SampleBuffer::<i16>::new(frames as u64, spec));
                self.capacity = frames;
            }

            // Copy the decoded audio buffer into the sample buffer in an interleaved format.
            if let Some(buf) = &mut self.sample_buf {
                buf.copy_interleaved_ref(audio_buf);
            }
            self.offset = 0;

            return Ok(true);
        }
    }

    /// Discard `frames` decoded frames (used to land exactly on a seek target).
    fn skip_frames(&mut self, frames: usize) -> Result<()> {
        let mut remaining = frames * self.meta.channels();
        while remaining > 0 {
            let available = self.pending().len();
            if available == 0 {
                if !self.decode_next()? {
                    break;
                }
                continue;
            }
            let skipped = available.min(remaining);
            self.offset += skipped;
            remaining -= skipped;
        }
        Ok(())
    }
}

impl Codec for SymphoniaDecoder {
    fn open_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let extension = path.extension().and_then(|ext| ext.to_str());
        SymphoniaDecoder::open_with_hint(Box::new(file), extension)
    }

    fn open_memory(bytes: Vec<u8>) -> Result<Self> {
        SymphoniaDecoder::open_with_hint(Box::new(Cursor::new(bytes)), None)
    }

    fn metadata(&self) -> Metadata {
        self.meta
    }

    fn read_frames(&mut self, out: &mut [Sample]) -> Result<usize> {
        let channels = self.meta.channels();
        let wanted = out.len() / channels * channels;

        let mut written = 0;
        while written < wanted {
            let pending = self.pending();
            if pending.is_empty() {
                if !self.decode_next()? {
                    break;
                }
                continue;
            }

            let take = pending.len().min(wanted - written);
            out[written..written + take].copy_from_slice(&pending[..take]);
            self.offset += take;
            written += take;
        }

        Ok(written / channels)
    }

    fn seek_to_frame(&mut self, frame: usize) -> Result<bool> {
        let seeked = match self.format.seek(
            SeekMode::Accurate,
            SeekTo::TimeStamp {
                ts: frame as u64,
                track_id: self.track_id,
            },
        ) {
            Ok(seeked) => seeked,
            Err(SymphoniaError::SeekError(kind)) => {
                debug!("Stream refused seek to frame {frame}: {kind:?}");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        self.decoder.reset();
        self.sample_buf = None;
        self.capacity = 0;
        self.offset = 0;

        let behind = seeked.required_ts.saturating_sub(seeked.actual_ts);
        self.skip_frames(behind as usize)?;

        Ok(true)
    }
}
