//! Thread-safe streaming voice.
//!
//! A `StreamSource` owns one device voice, a [`BufferRing`] bound to it and a [`Streamer`]
//! feeding the ring. A background worker keeps the ring topped up; control calls and the
//! worker take turns on one mutex so the decode position, the queued buffers and the pending
//! chunk always agree with each other.

use crate::backend::Backend;
use crate::config::StreamConfig;
use crate::device::{BufferId, FloatProperty, Vec3, Vec3Property, VoiceId, VoiceState};
use crate::error::{Error, Result};
use crate::metadata::{stream_progress, Metadata, Sample};
use crate::pcm::Pcm;
use crate::ring::BufferRing;
use crate::streamer::Streamer;
use crate::units::{Rate, Size};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Playback state as seen by callers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum State {
    /// The device could not be queried
    #[default]
    Unknown,
    Idle,
    Playing,
    Paused,
    Stopped,
}

impl From<VoiceState> for State {
    fn from(state: VoiceState) -> Self {
        match state {
            VoiceState::Initial => State::Idle,
            VoiceState::Playing => State::Playing,
            VoiceState::Paused => State::Paused,
            VoiceState::Stopped => State::Stopped,
        }
    }
}

/// Everything the worker and the callers both touch.
struct Shared {
    streamer: Streamer,
    ring: BufferRing,
    /// Decoded ahead of time, uploaded as soon as a buffer frees up
    pending: Vec<Sample>,
    chunk_samples: usize,
    /// Set by `play`, cleared by `pause`/`stop`; lets the worker recover from underruns
    wants_play: bool,
}

impl Shared {
    /// Decode one chunk, wrapping around to the start when looping.
    fn read_chunk(&mut self, looping: bool) -> Result<Vec<Sample>> {
        let mut chunk = vec![0; self.chunk_samples];
        let mut filled = 0;

        while filled < chunk.len() {
            if self.streamer.remain() == 0 {
                if !looping || self.streamer.sample_count() == 0 {
                    break;
                }
                self.streamer.seek(Duration::ZERO)?;
            }

            let read = self.streamer.read(&mut chunk[filled..])?;
            if read == 0 {
                break;
            }
            filled += read;
        }

        chunk.truncate(filled);
        Ok(chunk)
    }

    /// First frame not yet handed to the ring.
    fn unplayed_frame(&self) -> usize {
        let total = self.streamer.sample_count();
        let decoded = total.saturating_sub(self.streamer.remain() + self.pending.len());
        decoded / self.streamer.meta().channels()
    }

    /// Decoded and not yet handed to the ring.
    fn exhausted(&self) -> bool {
        self.streamer.remain() == 0 && self.pending.is_empty()
    }

    /// The pending chunk if there is one, otherwise a freshly decoded one.
    fn next_chunk(&mut self, looping: bool) -> Result<Vec<Sample>> {
        if !self.pending.is_empty() {
            return Ok(std::mem::take(&mut self.pending));
        }
        self.read_chunk(looping)
    }
}

struct Core {
    backend: Backend,
    voice: VoiceId,
    looping: AtomicBool,
    shared: Mutex<Shared>,
}

impl Core {
    fn looping(&self) -> bool {
        self.looping.load(Ordering::Acquire)
    }

    fn voice_state(&self) -> Option<VoiceState> {
        let state = self.backend.device().voice_state(self.voice);
        self.backend.check("voice state", state)
    }

    /// Fill and queue every buffer. On failure the stream goes back to where priming began.
    fn prime(&self, shared: &mut Shared) -> bool {
        let looping = self.looping();
        let count = shared.ring.len();
        let resume_at = shared.unplayed_frame();

        let mut chunks = Vec::with_capacity(count);
        for _ in 0..count {
            match shared.next_chunk(looping) {
                Ok(chunk) => chunks.push(chunk),
                Err(e) => {
                    self.backend.report(&e);
                    self.restore(shared, resume_at);
                    return false;
                }
            }
        }

        let meta = shared.streamer.meta();
        if !shared.ring.acquire(&chunks, meta) {
            self.restore(shared, resume_at);
            return false;
        }

        shared.pending = shared.read_chunk(looping).unwrap_or_else(|e| {
            self.backend.report(&e);
            Vec::new()
        });

        debug!("Primed {count} buffers on voice {}", self.voice);
        true
    }

    /// Drop whatever was decoded ahead and reposition the streamer on `frame`.
    fn restore(&self, shared: &mut Shared, frame: usize) {
        shared.pending.clear();
        if let Err(e) = shared.streamer.seek_frame(frame) {
            self.backend.report(&e);
        }
    }

    /// `rewind` restarts an exhausted stream from the top on a cold start.
    fn play_locked(&self, shared: &mut Shared, rewind: bool) -> bool {
        if !shared.streamer.valid() {
            return false;
        }

        match self.voice_state() {
            None => return false,
            Some(VoiceState::Playing) => {
                shared.wants_play = true;
                return true;
            }
            Some(_) => {}
        }

        if shared.ring.starved() {
            debug!("Voice {} starved, draining before priming", self.voice);
            shared.ring.release();
        }

        if shared.ring.cold() {
            if rewind && shared.exhausted() {
                if let Err(e) = shared.streamer.seek(Duration::ZERO) {
                    self.backend.report(&e);
                    return false;
                }
            }
            if !self.prime(shared) {
                return false;
            }
        }

        let played = self.backend.device().play(self.voice);
        if self.backend.check("play", played).is_none() {
            return false;
        }

        shared.wants_play = true;
        true
    }

    /// Stop the voice and throw away everything decoded ahead of it.
    fn halt_locked(&self, shared: &mut Shared) -> bool {
        let stopped = self.backend.device().stop(self.voice);
        let ok = self.backend.check("stop", stopped).is_some();

        shared.ring.release();
        shared.pending.clear();
        shared.wants_play = false;
        ok
    }

    fn stop_locked(&self, shared: &mut Shared) -> bool {
        let halted = self.halt_locked(shared);
        if shared.streamer.valid() {
            if let Err(e) = shared.streamer.seek(Duration::ZERO) {
                self.backend.report(&e);
                return false;
            }
        }
        halted
    }

    /// One worker iteration: keep a chunk decoded, hand it over when a buffer frees up.
    fn tick(&self) {
        let mut guard = self.shared.lock();
        let shared = &mut *guard;
        if !shared.streamer.valid() {
            return;
        }

        let looping = self.looping();
        if shared.pending.is_empty() {
            match shared.read_chunk(looping) {
                Ok(chunk) => shared.pending = chunk,
                Err(e) => self.backend.report(&e),
            }
        }

        match self.voice_state() {
            Some(VoiceState::Playing | VoiceState::Paused) if !shared.pending.is_empty() => {
                if shared.ring.next(&shared.pending) {
                    shared.pending = shared.read_chunk(looping).unwrap_or_else(|e| {
                        self.backend.report(&e);
                        Vec::new()
                    });
                }
            }
            Some(VoiceState::Stopped) if shared.wants_play && !shared.pending.is_empty() => {
                debug!("Voice {} ran dry, priming again", self.voice);
                self.play_locked(shared, false);
            }
            _ => {}
        }

        if looping && shared.streamer.remain() == 0 && shared.streamer.sample_count() > 0 {
            if let Err(e) = shared.streamer.seek(Duration::ZERO) {
                self.backend.report(&e);
            }
        }
    }
}

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn spawn(core: Arc<Core>, interval: Duration) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let token = stop.clone();

        let handle = std::thread::Builder::new()
            .name(format!("stream-voice-{}", core.voice))
            .spawn(move || {
                debug!("Stream worker for voice {} started", core.voice);
                while !token.load(Ordering::Acquire) {
                    core.tick();
                    if interval.is_zero() {
                        std::thread::yield_now();
                    } else {
                        std::thread::sleep(interval);
                    }
                }
                debug!("Stream worker for voice {} stopped", core.voice);
            })?;

        Ok(Worker { stop, handle })
    }

    fn join(self) {
        self.stop.store(true, Ordering::Release);
        if self.handle.join().is_err() {
            error!("Stream worker panicked");
        }
    }
}

pub struct StreamSource {
    core: Arc<Core>,
    worker: Option<Worker>,
}

impl StreamSource {
    /// Create a voice with its buffer ring and start feeding it in the background.
    pub fn new(backend: Backend, config: &StreamConfig) -> Result<Self> {
        config.validate()?;

        let voice = backend.try_call("create voice", backend.device().create_voice())?;
        let ring = match BufferRing::new(backend.clone(), voice, config.buffer_count) {
            Ok(ring) => ring,
            Err(e) => {
                backend.check("delete voice", backend.device().delete_voice(voice));
                return Err(e);
            }
        };

        let core = Arc::new(Core {
            backend,
            voice,
            looping: AtomicBool::new(false),
            shared: Mutex::new(Shared {
                streamer: Streamer::new(),
                ring,
                pending: Vec::new(),
                chunk_samples: config.chunk_samples,
                wants_play: false,
            }),
        });

        let worker = match Worker::spawn(core.clone(), config.tick_interval()) {
            Ok(worker) => worker,
            Err(e) => {
                Self::release(&core);
                return Err(e);
            }
        };

        Ok(StreamSource {
            core,
            worker: Some(worker),
        })
    }

    pub fn voice(&self) -> VoiceId {
        self.core.voice
    }

    /// Start streaming `path`. Buffers already queued keep playing.
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut shared = self.core.shared.lock();
        shared.streamer.open(path)?;
        shared.pending.clear();
        Ok(())
    }

    /// Start streaming an already decoded clip.
    pub fn load(&self, pcm: Pcm) {
        let mut shared = self.core.shared.lock();
        shared.streamer.preload(pcm);
        shared.pending.clear();
    }

    pub fn play(&self) -> bool {
        let mut shared = self.core.shared.lock();
        self.core.play_locked(&mut shared, true)
    }

    pub fn pause(&self) -> bool {
        let mut shared = self.core.shared.lock();
        shared.wants_play = false;

        let paused = self.core.backend.device().pause(self.core.voice);
        self.core.backend.check("pause", paused).is_some()
    }

    /// Stop, drain the ring and rewind, so the next `play` starts from the top.
    pub fn stop(&self) -> bool {
        let mut shared = self.core.shared.lock();
        self.core.stop_locked(&mut shared)
    }

    /// Jump to `time`, resuming playback if the voice was playing.
    pub fn seek(&self, time: Duration) -> Result<()> {
        let mut shared = self.core.shared.lock();
        if !shared.streamer.valid() {
            return Err(Error::InvalidData("no stream open".to_string()));
        }

        let resume = self.core.voice_state() == Some(VoiceState::Playing);
        self.core.halt_locked(&mut shared);
        let seeked = shared.streamer.seek(time);

        debug!(
            "Seek to {:.3}s on voice {} (resume: {resume})",
            time.as_secs_f64(),
            self.core.voice
        );

        if resume && !self.core.play_locked(&mut shared, false) {
            seeked?;
            return Err(Error::DeviceFailure(
                "playback could not resume after seek".to_string(),
            ));
        }
        seeked
    }

    /// Time of the sample the device is playing right now.
    pub fn position(&self) -> Duration {
        let shared = self.core.shared.lock();
        if !shared.streamer.valid() {
            return Duration::ZERO;
        }

        let meta = shared.streamer.meta();
        let total = meta.sample_count();
        let outstanding =
            shared.streamer.remain() + shared.pending.len() + shared.ring.ahead_samples();

        let played = if total > 0 && outstanding > total {
            // Looping: decoding is already into a later pass than the device
            (total - outstanding % total) % total
        } else {
            total.saturating_sub(outstanding)
        };
        let length = meta.length();
        let mut position = length.mul_f64(stream_progress(total, total - played));

        if matches!(
            self.core.voice_state(),
            Some(VoiceState::Playing | VoiceState::Paused)
        ) {
            let offset = self
                .core
                .backend
                .device()
                .get_float(self.core.voice, FloatProperty::SecOffset);
            if let Some(offset) = self.core.backend.check("sec offset", offset) {
                position += Duration::from_secs_f32(offset.max(0.0));
            }
        }

        if position >= length && self.looping() && !length.is_zero() {
            position -= length;
        }
        position.min(length)
    }

    pub fn state(&self) -> State {
        self.core.voice_state().map(State::from).unwrap_or_default()
    }

    pub fn playing(&self) -> bool {
        self.state() == State::Playing
    }

    pub fn set_gain(&self, gain: f32) -> bool {
        if gain.is_nan() || gain < 0.0 {
            self.core
                .backend
                .report(&Error::InvalidValue(format!("gain must be >= 0, got {gain}")));
            return false;
        }
        self.set_float("gain", FloatProperty::Gain, gain)
    }

    pub fn gain(&self) -> f32 {
        self.get_float("gain", FloatProperty::Gain).unwrap_or(0.0)
    }

    pub fn set_pitch(&self, pitch: f32) -> bool {
        if pitch.is_nan() || pitch <= 0.0 {
            self.core
                .backend
                .report(&Error::InvalidValue(format!("pitch must be > 0, got {pitch}")));
            return false;
        }
        self.set_float("pitch", FloatProperty::Pitch, pitch)
    }

    pub fn pitch(&self) -> f32 {
        self.get_float("pitch", FloatProperty::Pitch).unwrap_or(1.0)
    }

    pub fn set_max_distance(&self, distance: f32) -> bool {
        self.set_float("max distance", FloatProperty::MaxDistance, distance)
    }

    pub fn set_location(&self, position: Vec3) -> bool {
        let set = self
            .core
            .backend
            .device()
            .set_vec3(self.core.voice, Vec3Property::Position, position);
        self.core.backend.check("position", set).is_some()
    }

    pub fn location(&self) -> Vec3 {
        let value = self
            .core
            .backend
            .device()
            .get_vec3(self.core.voice, Vec3Property::Position);
        self.core.backend.check("position", value).unwrap_or_default()
    }

    pub fn set_velocity(&self, velocity: Vec3) -> bool {
        let set = self
            .core
            .backend
            .device()
            .set_vec3(self.core.voice, Vec3Property::Velocity, velocity);
        self.core.backend.check("velocity", set).is_some()
    }

    /// Only consulted by the worker; the voice itself never loops its queue.
    pub fn set_looping(&self, looping: bool) -> bool {
        self.core.looping.store(looping, Ordering::Release);
        true
    }

    pub fn looping(&self) -> bool {
        self.core.looping()
    }

    /// Whether a stream is open or preloaded.
    pub fn valid(&self) -> bool {
        self.core.shared.lock().streamer.valid()
    }

    pub fn meta(&self) -> Metadata {
        self.core.shared.lock().streamer.meta()
    }

    pub fn size(&self) -> Size {
        self.core.shared.lock().streamer.size()
    }

    pub fn sample_rate(&self) -> Rate {
        self.core.shared.lock().streamer.sample_rate()
    }

    /// Nothing left to decode or hand to the ring.
    pub fn exhausted(&self) -> bool {
        self.core.shared.lock().exhausted()
    }

    /// Samples the streamer has not decoded yet.
    pub fn remain(&self) -> usize {
        self.core.shared.lock().streamer.remain()
    }

    pub fn queued(&self) -> usize {
        self.core.shared.lock().ring.queued()
    }

    pub fn vacant(&self) -> usize {
        self.core.shared.lock().ring.vacant()
    }

    pub fn queued_ids(&self) -> Vec<BufferId> {
        self.core.shared.lock().ring.queued_ids()
    }

    fn set_float(&self, op: &'static str, prop: FloatProperty, value: f32) -> bool {
        let set = self
            .core
            .backend
            .device()
            .set_float(self.core.voice, prop, value);
        self.core.backend.check(op, set).is_some()
    }

    fn get_float(&self, op: &'static str, prop: FloatProperty) -> Option<f32> {
        let value = self.core.backend.device().get_float(self.core.voice, prop);
        self.core.backend.check(op, value)
    }

    /// Free the buffers, then the voice. The worker must already be gone.
    fn release(core: &Core) {
        core.shared.lock().ring.close();
        core.backend
            .check("delete voice", core.backend.device().delete_voice(core.voice));
    }
}

impl Drop for StreamSource {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.join();
        }
        Self::release(&self.core);
    }
}
