//! In-process device: voices, buffer queues and a software mixer.
//!
//! Follows the usual hardware queue rules: a stopped voice reports every queued buffer as
//! processed, buffers still sitting in a queue cannot be rewritten or deleted, and a playing
//! voice cannot have its buffers detached.

use super::{
    BufferId, Device, FloatProperty, IntProperty, Vec3, Vec3Property, VoiceId, VoiceState,
};
use crate::config::DeviceConfig;
use crate::error::{DeviceError, DeviceResult, Error, Result};
use crate::metadata::{ChannelFormat, Sample};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

struct Buffer {
    format: ChannelFormat,
    rate: u32,
    samples: Vec<Sample>,
}

impl Buffer {
    fn frames(&self) -> usize {
        self.samples.len() / self.format.channels()
    }

    fn frame(&self, index: usize) -> (i32, i32) {
        match self.format {
            ChannelFormat::Mono16 => {
                let s = self.samples[index] as i32;
                (s, s)
            }
            ChannelFormat::Stereo16 => (
                self.samples[index * 2] as i32,
                self.samples[index * 2 + 1] as i32,
            ),
        }
    }
}

struct Voice {
    state: VoiceState,
    queue: VecDeque<BufferId>,
    /// Leading entries of `queue` already played through
    processed: usize,
    /// Frame position inside the current buffer
    cursor: f64,
    gain: f32,
    pitch: f32,
    looping: bool,
    max_distance: f32,
    position: Vec3,
    velocity: Vec3,
}

impl Default for Voice {
    fn default() -> Self {
        Voice {
            state: VoiceState::Initial,
            queue: VecDeque::new(),
            processed: 0,
            cursor: 0.0,
            gain: 1.0,
            pitch: 1.0,
            looping: false,
            max_distance: f32::MAX,
            position: Vec3::default(),
            velocity: Vec3::default(),
        }
    }
}

impl Voice {
    fn processed(&self) -> usize {
        if self.state == VoiceState::Stopped {
            self.queue.len()
        } else {
            self.processed.min(self.queue.len())
        }
    }

    fn restart(&mut self) {
        self.processed = 0;
        self.cursor = 0.0;
    }

    fn active(&self) -> bool {
        matches!(self.state, VoiceState::Playing | VoiceState::Paused)
    }

    /// Skip past fully played buffers and return the one under the cursor.
    ///
    /// Stops the voice when the queue runs out (unless looping).
    fn advance<'a>(&mut self, buffers: &'a HashMap<BufferId, Buffer>) -> Option<&'a Buffer> {
        let mut wrapped = false;

        loop {
            let Some(&id) = self.queue.get(self.processed) else {
                if self.looping && !wrapped && !self.queue.is_empty() {
                    self.processed = 0;
                    wrapped = true;
                    continue;
                }
                self.state = VoiceState::Stopped;
                self.cursor = 0.0;
                return None;
            };

            let Some(buffer) = buffers.get(&id) else {
                self.state = VoiceState::Stopped;
                return None;
            };

            let frames = buffer.frames() as f64;
            if self.cursor < frames {
                return Some(buffer);
            }

            self.cursor -= frames;
            self.processed += 1;
        }
    }

    fn render(
        &mut self,
        buffers: &HashMap<BufferId, Buffer>,
        mix: &mut [(i32, i32)],
        device_rate: u32,
    ) {
        for slot in mix.iter_mut() {
            let Some(buffer) = self.advance(buffers) else {
                return;
            };

            let (left, right) = buffer.frame(self.cursor as usize);
            slot.0 += (left as f32 * self.gain) as i32;
            slot.1 += (right as f32 * self.gain) as i32;

            self.cursor += buffer.rate as f64 / device_rate as f64 * self.pitch as f64;
        }

        // Report a buffer as processed as soon as its last frame is out
        self.advance(buffers);
    }

    fn sec_offset(&self, buffers: &HashMap<BufferId, Buffer>) -> f32 {
        if !self.active() {
            return 0.0;
        }
        self.queue
            .get(self.processed)
            .and_then(|id| buffers.get(id))
            .map(|buffer| (self.cursor.floor() / buffer.rate as f64) as f32)
            .unwrap_or(0.0)
    }
}

#[derive(Default)]
struct Inner {
    voices: HashMap<VoiceId, Voice>,
    buffers: HashMap<BufferId, Buffer>,
    last_id: u32,
}

impl Inner {
    fn next_id(&mut self) -> u32 {
        self.last_id += 1;
        self.last_id
    }

    fn voice(&self, id: VoiceId) -> DeviceResult<&Voice> {
        self.voices.get(&id).ok_or(DeviceError::InvalidName)
    }

    fn voice_mut(&mut self, id: VoiceId) -> DeviceResult<&mut Voice> {
        self.voices.get_mut(&id).ok_or(DeviceError::InvalidName)
    }

    fn is_queued(&self, buffer: BufferId) -> bool {
        self.voices.values().any(|v| v.queue.contains(&buffer))
    }
}

pub struct SoftDevice {
    config: DeviceConfig,
    inner: Mutex<Inner>,
    claimed: AtomicBool,
}

impl SoftDevice {
    pub fn open(config: DeviceConfig) -> Result<Self> {
        if config.sample_rate == 0 {
            return Err(Error::DeviceFailure("sample rate must be positive".to_string()));
        }
        if ChannelFormat::from_channels(config.channels).is_none() {
            return Err(Error::DeviceFailure(format!(
                "{} output channels not supported",
                config.channels
            )));
        }
        if config.max_voices == 0 {
            return Err(Error::ContextFailure("device allows no voices".to_string()));
        }

        info!(
            "Opened software device: {} Hz, {} channel(s), {} voices",
            config.sample_rate, config.channels, config.max_voices
        );

        Ok(SoftDevice {
            config,
            inner: Mutex::new(Inner::default()),
            claimed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Consume `frames` output frames from every playing voice and mix them.
    ///
    /// Returns interleaved samples in the device's channel layout.
    pub fn render(&self, frames: usize) -> Vec<Sample> {
        let mut mix = vec![(0i32, 0i32); frames];

        {
            let mut inner = self.inner.lock();
            let Inner {
                voices, buffers, ..
            } = &mut *inner;

            for voice in voices.values_mut() {
                if voice.state == VoiceState::Playing {
                    voice.render(buffers, &mut mix, self.config.sample_rate);
                }
            }
        }

        let clamp = |v: i32| v.clamp(i16::MIN as i32, i16::MAX as i32) as Sample;
        let mut out = Vec::with_capacity(frames * self.config.channels as usize);
        for (left, right) in mix {
            if self.config.channels == 2 {
                out.push(clamp(left));
                out.push(clamp(right));
            } else {
                out.push(clamp((left + right) / 2));
            }
        }
        out
    }
}

impl Device for SoftDevice {
    fn claim(&self) -> DeviceResult<()> {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| DeviceError::InvalidOperation)
    }

    fn unclaim(&self) {
        self.claimed.store(false, Ordering::Release);
    }

    fn create_voice(&self) -> DeviceResult<VoiceId> {
        let mut inner = self.inner.lock();
        if inner.voices.len() >= self.config.max_voices {
            return Err(DeviceError::OutOfMemory);
        }
        let id = inner.next_id();
        inner.voices.insert(id, Voice::default());
        Ok(id)
    }

    fn delete_voice(&self, voice: VoiceId) -> DeviceResult<()> {
        let mut inner = self.inner.lock();
        inner
            .voices
            .remove(&voice)
            .map(|_| ())
            .ok_or(DeviceError::InvalidName)
    }

    fn create_buffer(&self) -> DeviceResult<BufferId> {
        let mut inner = self.inner.lock();
        if inner.buffers.len() >= self.config.max_buffers {
            return Err(DeviceError::OutOfMemory);
        }
        let id = inner.next_id();
        inner.buffers.insert(
            id,
            Buffer {
                format: ChannelFormat::Mono16,
                rate: self.config.sample_rate,
                samples: Vec::new(),
            },
        );
        Ok(id)
    }

    fn delete_buffer(&self, buffer: BufferId) -> DeviceResult<()> {
        let mut inner = self.inner.lock();
        if !inner.buffers.contains_key(&buffer) {
            return Err(DeviceError::InvalidName);
        }
        if inner.is_queued(buffer) {
            return Err(DeviceError::InvalidOperation);
        }
        inner.buffers.remove(&buffer);
        Ok(())
    }

    fn upload(
        &self,
        buffer: BufferId,
        format: ChannelFormat,
        samples: &[Sample],
        rate: u32,
    ) -> DeviceResult<()> {
        if rate == 0 || samples.len() % format.channels() != 0 {
            return Err(DeviceError::InvalidValue);
        }

        let mut inner = self.inner.lock();
        if inner.is_queued(buffer) {
            return Err(DeviceError::InvalidOperation);
        }
        let target = inner
            .buffers
            .get_mut(&buffer)
            .ok_or(DeviceError::InvalidName)?;

        target.format = format;
        target.rate = rate;
        target.samples.clear();
        target.samples.extend_from_slice(samples);
        Ok(())
    }

    fn queue_buffers(&self, voice: VoiceId, buffers: &[BufferId]) -> DeviceResult<()> {
        let mut inner = self.inner.lock();
        if buffers.iter().any(|id| !inner.buffers.contains_key(id)) {
            return Err(DeviceError::InvalidName);
        }
        inner.voice_mut(voice)?.queue.extend(buffers.iter().copied());
        Ok(())
    }

    fn unqueue_processed(&self, voice: VoiceId) -> DeviceResult<BufferId> {
        let mut inner = self.inner.lock();
        let voice = inner.voice_mut(voice)?;
        if voice.processed() == 0 {
            return Err(DeviceError::InvalidValue);
        }

        let id = voice.queue.pop_front().ok_or(DeviceError::InvalidValue)?;
        if voice.state != VoiceState::Stopped {
            voice.processed = voice.processed.saturating_sub(1);
        }
        Ok(id)
    }

    fn buffers_processed(&self, voice: VoiceId) -> DeviceResult<usize> {
        Ok(self.inner.lock().voice(voice)?.processed())
    }

    fn buffers_queued(&self, voice: VoiceId) -> DeviceResult<usize> {
        Ok(self.inner.lock().voice(voice)?.queue.len())
    }

    fn play(&self, voice: VoiceId) -> DeviceResult<()> {
        let mut inner = self.inner.lock();
        let voice = inner.voice_mut(voice)?;
        match voice.state {
            VoiceState::Playing => {}
            VoiceState::Paused => voice.state = VoiceState::Playing,
            VoiceState::Initial | VoiceState::Stopped => {
                voice.restart();
                voice.state = if voice.queue.is_empty() {
                    VoiceState::Stopped
                } else {
                    VoiceState::Playing
                };
            }
        }
        Ok(())
    }

    fn pause(&self, voice: VoiceId) -> DeviceResult<()> {
        let mut inner = self.inner.lock();
        let voice = inner.voice_mut(voice)?;
        if voice.state == VoiceState::Playing {
            voice.state = VoiceState::Paused;
        }
        Ok(())
    }

    fn stop(&self, voice: VoiceId) -> DeviceResult<()> {
        let mut inner = self.inner.lock();
        let voice = inner.voice_mut(voice)?;
        voice.state = VoiceState::Stopped;
        voice.cursor = 0.0;
        Ok(())
    }

    fn rewind(&self, voice: VoiceId) -> DeviceResult<()> {
        let mut inner = self.inner.lock();
        let voice = inner.voice_mut(voice)?;
        voice.state = VoiceState::Initial;
        voice.restart();
        Ok(())
    }

    fn voice_state(&self, voice: VoiceId) -> DeviceResult<VoiceState> {
        Ok(self.inner.lock().voice(voice)?.state)
    }

    fn set_float(&self, voice: VoiceId, prop: FloatProperty, value: f32) -> DeviceResult<()> {
        let mut inner = self.inner.lock();
        let voice = inner.voice_mut(voice)?;
        match prop {
            FloatProperty::Gain if value >= 0.0 => voice.gain = value,
            FloatProperty::Pitch if value > 0.0 => voice.pitch = value,
            FloatProperty::MaxDistance if value >= 0.0 => voice.max_distance = value,
            FloatProperty::SecOffset => return Err(DeviceError::InvalidOperation),
            _ => return Err(DeviceError::InvalidValue),
        }
        Ok(())
    }

    fn get_float(&self, voice: VoiceId, prop: FloatProperty) -> DeviceResult<f32> {
        let inner = self.inner.lock();
        let voice = inner.voice(voice)?;
        let value = match prop {
            FloatProperty::Gain => voice.gain,
            FloatProperty::Pitch => voice.pitch,
            FloatProperty::MaxDistance => voice.max_distance,
            FloatProperty::SecOffset => voice.sec_offset(&inner.buffers),
        };
        Ok(value)
    }

    fn set_int(&self, voice: VoiceId, prop: IntProperty, value: i32) -> DeviceResult<()> {
        let mut inner = self.inner.lock();
        let exists = value <= 0 || inner.buffers.contains_key(&(value as BufferId));
        let voice = inner.voice_mut(voice)?;

        match prop {
            IntProperty::Looping => voice.looping = value != 0,
            IntProperty::Buffer => {
                if voice.active() {
                    return Err(DeviceError::InvalidOperation);
                }
                if value < 0 || !exists {
                    return Err(DeviceError::InvalidValue);
                }
                voice.queue.clear();
                if value > 0 {
                    voice.queue.push_back(value as BufferId);
                }
                voice.restart();
            }
        }
        Ok(())
    }

    fn get_int(&self, voice: VoiceId, prop: IntProperty) -> DeviceResult<i32> {
        let inner = self.inner.lock();
        let voice = inner.voice(voice)?;
        let value = match prop {
            IntProperty::Looping => voice.looping as i32,
            IntProperty::Buffer => voice.queue.front().copied().unwrap_or(0) as i32,
        };
        Ok(value)
    }

    fn set_vec3(&self, voice: VoiceId, prop: Vec3Property, value: Vec3) -> DeviceResult<()> {
        let mut inner = self.inner.lock();
        let voice = inner.voice_mut(voice)?;
        match prop {
            Vec3Property::Position => voice.position = value,
            Vec3Property::Velocity => voice.velocity = value,
        }
        Ok(())
    }

    fn get_vec3(&self, voice: VoiceId, prop: Vec3Property) -> DeviceResult<Vec3> {
        let inner = self.inner.lock();
        let voice = inner.voice(voice)?;
        let value = match prop {
            Vec3Property::Position => voice.position,
            Vec3Property::Velocity => voice.velocity,
        };
        Ok(value)
    }
}
