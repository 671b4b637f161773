//! Test infrastructure for gapless integration tests.
//!
//! Provides WAV fixtures, a harness around the software device, a fault-injecting device
//! wrapper and polling helpers for the background worker.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// Re-export key types from the main crate
pub use gapless::config::{DeviceConfig, StreamConfig};
pub use gapless::device::{
    BufferId, Device, FloatProperty, IntProperty, SoftDevice, Vec3, Vec3Property, VoiceId,
    VoiceState,
};
pub use gapless::error::{DeviceError, DeviceResult, ErrorHook};
pub use gapless::metadata::{ChannelFormat, Sample};
pub use gapless::pcm::Pcm;
pub use gapless::{Error, Instance, Music, State, StreamSource};

pub const RATE: u32 = 44100;
pub const CHUNK: usize = 4096;

/// Writes a 16-bit WAV whose samples count up from one (so silence is distinguishable).
pub fn write_wav(dir: &Path, name: &str, rate: u32, channels: u16, frames: usize) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..frames * channels as usize {
        writer.write_sample((i % 20000) as i16 + 1).unwrap();
    }
    writer.finalize().unwrap();
    path
}

/// Ring geometry used by most tests; ticks as fast as possible.
pub fn stream_config() -> StreamConfig {
    StreamConfig {
        buffer_count: 3,
        chunk_samples: CHUNK,
        tick_interval_ms: 0,
    }
}

pub fn mono_device_config() -> DeviceConfig {
    DeviceConfig {
        sample_rate: RATE,
        channels: 1,
        ..Default::default()
    }
}

/// Error hook that records every reported error.
#[derive(Clone, Default)]
pub struct ErrorLog {
    errors: Arc<Mutex<Vec<String>>>,
}

impl ErrorLog {
    pub fn hook(&self) -> ErrorHook {
        let errors = self.errors.clone();
        Arc::new(move |e: &Error| errors.lock().push(e.to_string()))
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.errors.lock().iter().any(|e| e.contains(needle))
    }
}

/// Software device plus an instance claiming it.
pub struct TestHarness {
    pub device: Arc<SoftDevice>,
    pub instance: Instance,
    pub errors: ErrorLog,
    pub dir: tempfile::TempDir,
}

impl TestHarness {
    /// 44.1 kHz mono device, three 4096-sample buffers per voice.
    pub fn new() -> Self {
        Self::with_configs(mono_device_config(), stream_config())
    }

    pub fn with_configs(device: DeviceConfig, stream: StreamConfig) -> Self {
        let device = Arc::new(SoftDevice::open(device).unwrap());
        let errors = ErrorLog::default();
        let instance = Instance::with_error_hook(device.clone(), errors.hook())
            .unwrap()
            .with_stream_config(stream)
            .unwrap();

        Self {
            device,
            instance,
            errors,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn wav(&self, name: &str, rate: u32, channels: u16, frames: usize) -> PathBuf {
        write_wav(self.dir.path(), name, rate, channels, frames)
    }

    pub fn source(&self) -> StreamSource {
        self.instance.stream_source().unwrap()
    }

    pub fn music(&self) -> Music {
        self.instance.music().unwrap()
    }

    /// Renders `frames` and waits for the worker to refill whatever was consumed.
    pub fn play_through(&self, source: &StreamSource, frames: usize) {
        self.device.render(frames);
        wait_until(Duration::from_secs(2), || {
            source.vacant() == 0 || source.remain() == 0 || source.state() != State::Playing
        });
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Whether two times differ by at most `tolerance`.
pub fn within(a: Duration, b: Duration, tolerance: Duration) -> bool {
    (a.as_secs_f64() - b.as_secs_f64()).abs() <= tolerance.as_secs_f64()
}

/// Seconds covered by one ring buffer at the test rate.
pub fn chunk_duration() -> Duration {
    Duration::from_secs_f64(CHUNK as f64 / RATE as f64)
}

/// Wraps a device and fails selected calls on demand.
pub struct FaultyDevice {
    pub inner: SoftDevice,
    pub fail_play: AtomicBool,
    pub fail_upload: AtomicBool,
    pub fail_create_buffer: AtomicBool,
}

impl FaultyDevice {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            inner: SoftDevice::open(config).unwrap(),
            fail_play: AtomicBool::new(false),
            fail_upload: AtomicBool::new(false),
            fail_create_buffer: AtomicBool::new(false),
        }
    }

    fn fail(flag: &AtomicBool, error: DeviceError) -> DeviceResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(error)
        } else {
            Ok(())
        }
    }
}

impl Device for FaultyDevice {
    fn claim(&self) -> DeviceResult<()> {
        self.inner.claim()
    }

    fn unclaim(&self) {
        self.inner.unclaim()
    }

    fn create_voice(&self) -> DeviceResult<VoiceId> {
        self.inner.create_voice()
    }

    fn delete_voice(&self, voice: VoiceId) -> DeviceResult<()> {
        self.inner.delete_voice(voice)
    }

    fn create_buffer(&self) -> DeviceResult<BufferId> {
        Self::fail(&self.fail_create_buffer, DeviceError::OutOfMemory)?;
        self.inner.create_buffer()
    }

    fn delete_buffer(&self, buffer: BufferId) -> DeviceResult<()> {
        self.inner.delete_buffer(buffer)
    }

    fn upload(
        &self,
        buffer: BufferId,
        format: ChannelFormat,
        samples: &[Sample],
        rate: u32,
    ) -> DeviceResult<()> {
        Self::fail(&self.fail_upload, DeviceError::InvalidValue)?;
        self.inner.upload(buffer, format, samples, rate)
    }

    fn queue_buffers(&self, voice: VoiceId, buffers: &[BufferId]) -> DeviceResult<()> {
        self.inner.queue_buffers(voice, buffers)
    }

    fn unqueue_processed(&self, voice: VoiceId) -> DeviceResult<BufferId> {
        self.inner.unqueue_processed(voice)
    }

    fn buffers_processed(&self, voice: VoiceId) -> DeviceResult<usize> {
        self.inner.buffers_processed(voice)
    }

    fn buffers_queued(&self, voice: VoiceId) -> DeviceResult<usize> {
        self.inner.buffers_queued(voice)
    }

    fn play(&self, voice: VoiceId) -> DeviceResult<()> {
        Self::fail(&self.fail_play, DeviceError::InvalidOperation)?;
        self.inner.play(voice)
    }

    fn pause(&self, voice: VoiceId) -> DeviceResult<()> {
        self.inner.pause(voice)
    }

    fn stop(&self, voice: VoiceId) -> DeviceResult<()> {
        self.inner.stop(voice)
    }

    fn rewind(&self, voice: VoiceId) -> DeviceResult<()> {
        self.inner.rewind(voice)
    }

    fn voice_state(&self, voice: VoiceId) -> DeviceResult<VoiceState> {
        self.inner.voice_state(voice)
    }

    fn set_float(&self, voice: VoiceId, prop: FloatProperty, value: f32) -> DeviceResult<()> {
        self.inner.set_float(voice, prop, value)
    }

    fn get_float(&self, voice: VoiceId, prop: FloatProperty) -> DeviceResult<f32> {
        self.inner.get_float(voice, prop)
    }

    fn set_int(&self, voice: VoiceId, prop: IntProperty, value: i32) -> DeviceResult<()> {
        self.inner.set_int(voice, prop, value)
    }

    fn get_int(&self, voice: VoiceId, prop: IntProperty) -> DeviceResult<i32> {
        self.inner.get_int(voice, prop)
    }

    fn set_vec3(&self, voice: VoiceId, prop: Vec3Property, value: Vec3) -> DeviceResult<()> {
        self.inner.set_vec3(voice, prop, value)
    }

    fn get_vec3(&self, voice: VoiceId, prop: Vec3Property) -> DeviceResult<Vec3> {
        self.inner.get_vec3(voice, prop)
    }
}
