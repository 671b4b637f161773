//! Incremental reads over either a preloaded clip or a file-backed decoder.
//!
//! Used by the stream source to pull fixed-size chunks and to reposition on seek.

use crate::codecs::{Codec, FileFormat, SymphoniaDecoder, WavDecoder};
use crate::error::{Error, Result};
use crate::metadata::{stream_progress, Metadata, Sample};
use crate::pcm::Pcm;
use crate::units::{Rate, Size};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A decoder bound to the file it was opened from, so it can be reopened.
struct FileStream<C> {
    codec: C,
    path: PathBuf,
}

impl<C: Codec> FileStream<C> {
    fn open(path: &Path) -> Result<Self> {
        Ok(FileStream {
            codec: C::open_path(path)?,
            path: path.to_path_buf(),
        })
    }
}

/// Builds a fresh decoder; called again whenever the stream has to start over.
pub type CodecFactory = Box<dyn Fn() -> Result<Box<dyn Codec>> + Send>;

/// A decoder from a caller-supplied factory.
struct CustomStream {
    codec: Box<dyn Codec>,
    factory: CodecFactory,
}

/// The active source. The tag is chosen at `open`/`preload` and never switched in place.
enum Stream {
    Closed,
    Preloaded(Vec<Sample>),
    Wav(FileStream<WavDecoder>),
    Flac(FileStream<SymphoniaDecoder>),
    Mp3(FileStream<SymphoniaDecoder>),
    Custom(CustomStream),
}

impl Stream {
    fn open(path: &Path) -> Result<Self> {
        let stream = match FileFormat::detect(path)? {
            FileFormat::Wav => Stream::Wav(FileStream::open(path)?),
            FileFormat::Flac => Stream::Flac(FileStream::open(path)?),
            FileFormat::Mp3 => Stream::Mp3(FileStream::open(path)?),
        };
        Ok(stream)
    }

    fn codec(&self) -> Option<&dyn Codec> {
        match self {
            Stream::Wav(file) => Some(&file.codec),
            Stream::Flac(file) | Stream::Mp3(file) => Some(&file.codec),
            Stream::Custom(custom) => Some(custom.codec.as_ref()),
            Stream::Closed | Stream::Preloaded(_) => None,
        }
    }

    fn codec_mut(&mut self) -> Option<&mut dyn Codec> {
        match self {
            Stream::Wav(file) => Some(&mut file.codec),
            Stream::Flac(file) | Stream::Mp3(file) => Some(&mut file.codec),
            Stream::Custom(custom) => Some(custom.codec.as_mut()),
            Stream::Closed | Stream::Preloaded(_) => None,
        }
    }

    /// Swap in a fresh decoder for the same origin. `None` when there is nothing to reopen.
    fn restart(&mut self) -> Option<Result<()>> {
        let reopened = match self {
            Stream::Wav(file) => FileStream::open(&file.path).map(Stream::Wav),
            Stream::Flac(file) => FileStream::open(&file.path).map(Stream::Flac),
            Stream::Mp3(file) => FileStream::open(&file.path).map(Stream::Mp3),
            Stream::Custom(custom) => {
                return Some((custom.factory)().map(|codec| custom.codec = codec));
            }
            Stream::Closed | Stream::Preloaded(_) => return None,
        };
        Some(reopened.map(|stream| *self = stream))
    }

    fn path(&self) -> Option<&Path> {
        match self {
            Stream::Wav(file) => Some(&file.path),
            Stream::Flac(file) | Stream::Mp3(file) => Some(&file.path),
            Stream::Custom(_) | Stream::Closed | Stream::Preloaded(_) => None,
        }
    }
}

pub struct Streamer {
    stream: Stream,
    meta: Metadata,
    /// Samples not yet handed to the caller
    remain: usize,
}

impl Default for Streamer {
    fn default() -> Self {
        Streamer {
            stream: Stream::Closed,
            meta: Metadata::default(),
            remain: 0,
        }
    }
}

impl Streamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `path` for sequential decoding.
    ///
    /// On failure the previously opened stream (if any) is left untouched.
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let stream = Stream::open(path)?;
        let meta = stream
            .codec()
            .map(|codec| codec.metadata())
            .ok_or(Error::Unknown)?;

        info!(
            "Streaming {}: {} Hz, {} channel(s), {:.1}s",
            path.display(),
            meta.rate,
            meta.channels(),
            meta.length().as_secs_f64()
        );

        self.stream = stream;
        self.meta = meta;
        self.remain = meta.sample_count();
        Ok(())
    }

    /// Stream from decoders built by `factory`, which is called again to start over.
    pub fn open_codec(&mut self, factory: CodecFactory) -> Result<()> {
        let codec = factory()?;
        let meta = codec.metadata();
        debug!(
            "Streaming custom decoder: {} Hz, {} channel(s), {} frames",
            meta.rate,
            meta.channels(),
            meta.total_frames
        );

        self.stream = Stream::Custom(CustomStream { codec, factory });
        self.meta = meta;
        self.remain = meta.sample_count();
        Ok(())
    }

    /// Switch to streaming an already decoded clip.
    pub fn preload(&mut self, pcm: Pcm) {
        debug!(
            "Preloaded clip: {} Hz, {} channel(s), {} samples",
            pcm.meta.rate,
            pcm.meta.channels(),
            pcm.samples.len()
        );

        self.meta = pcm.meta;
        self.meta.total_frames = pcm.samples.len() / pcm.meta.channels();
        self.remain = self.meta.sample_count();
        self.stream = Stream::Preloaded(pcm.samples);
    }

    pub fn valid(&self) -> bool {
        !matches!(self.stream, Stream::Closed)
    }

    pub fn meta(&self) -> Metadata {
        self.meta
    }

    pub fn size(&self) -> Size {
        Size::from_bytes(self.meta.byte_size())
    }

    pub fn sample_rate(&self) -> Rate {
        Rate::from_hz(self.meta.rate)
    }

    pub fn sample_count(&self) -> usize {
        self.meta.sample_count()
    }

    pub fn remain(&self) -> usize {
        self.remain
    }

    /// Path of the file being streamed; `None` when preloaded or closed.
    pub fn path(&self) -> Option<&Path> {
        self.stream.path()
    }

    /// Fill `out` with the next samples, returning how many were written.
    ///
    /// Only whole frames are read, so a buffer shorter than one frame reads nothing. Returns
    /// fewer than fit only once the stream runs out; reads after exhaustion return 0. A decoder
    /// failure ends the stream early (`remain` drops to 0) and is returned.
    pub fn read(&mut self, out: &mut [Sample]) -> Result<usize> {
        if self.remain == 0 {
            return Ok(0);
        }

        let total = self.sample_count();
        let channels = self.meta.channels();
        let wanted = out.len().min(self.remain);
        let wanted = wanted - wanted % channels;

        let count = match &mut self.stream {
            Stream::Closed => 0,
            Stream::Preloaded(samples) => {
                let start = total - self.remain;
                out[..wanted].copy_from_slice(&samples[start..start + wanted]);
                wanted
            }
            stream => {
                let codec = stream.codec_mut().ok_or(Error::Unknown)?;
                match codec.read_frames(&mut out[..wanted]) {
                    Ok(frames) => frames * channels,
                    Err(e) => {
                        self.remain = 0;
                        return Err(e);
                    }
                }
            }
        };

        if count < wanted {
            warn!(
                "Stream ended {} samples before its declared length",
                self.remain - count
            );
            self.remain = 0;
        } else {
            self.remain -= count;
        }

        Ok(count)
    }

    /// Reposition to `time` (clamped to the clip length).
    ///
    /// Decoders that cannot seek are reopened instead, which only ever lands on the start.
    pub fn seek(&mut self, time: Duration) -> Result<()> {
        self.seek_frame(self.meta.frame_at(time))
    }

    /// Reposition to `frame` (clamped to the clip length).
    pub fn seek_frame(&mut self, frame: usize) -> Result<()> {
        let frame = frame.min(self.meta.total_frames);
        let channels = self.meta.channels();
        let total = self.sample_count();

        match &mut self.stream {
            Stream::Closed => return Err(Error::InvalidData("no stream open".to_string())),
            Stream::Preloaded(_) => {
                self.remain = total - frame * channels;
            }
            stream => {
                if frame >= self.meta.total_frames {
                    self.remain = 0;
                    return Ok(());
                }

                let codec = stream.codec_mut().ok_or(Error::Unknown)?;
                if codec.seek_to_frame(frame)? {
                    self.remain = total - frame * channels;
                } else {
                    debug!("Seek unsupported, rewinding to start instead of frame {frame}");
                    self.reopen()?;
                }
            }
        }

        Ok(())
    }

    /// Start over from the first sample.
    pub fn reopen(&mut self) -> Result<()> {
        if let Stream::Preloaded(_) = self.stream {
            self.remain = self.sample_count();
            return Ok(());
        }

        match self.stream.restart() {
            Some(Ok(())) => {
                self.remain = self.sample_count();
                Ok(())
            }
            Some(Err(e)) => {
                warn!("Failed to reopen stream: {e}");
                Err(Error::InvalidData(format!("reopen failed: {e}")))
            }
            None => Err(Error::InvalidData("nothing to reopen".to_string())),
        }
    }

    /// Playback position implied by how much has been read so far.
    pub fn position(&self) -> Duration {
        let progress = stream_progress(self.sample_count(), self.remain);
        self.meta.length().mul_f64(progress)
    }
}
