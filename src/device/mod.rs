//! Device backend contract: voices consuming queued sample buffers.
//!
//! The streaming engine only talks to hardware through this trait. `SoftDevice` is the
//! in-process implementation used by the player binary and the tests.

pub mod soft;

use crate::error::DeviceResult;
use crate::metadata::{ChannelFormat, Sample};
use serde::{Deserialize, Serialize};

pub use soft::SoftDevice;

pub type VoiceId = u32;
pub type BufferId = u32;

/// Backend-reported voice state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VoiceState {
    #[default]
    Initial,
    Playing,
    Paused,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FloatProperty {
    Gain,
    Pitch,
    MaxDistance,
    /// Seconds into the buffer currently being played (read only)
    SecOffset,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntProperty {
    /// Non-zero to loop the whole queue
    Looping,
    /// Static buffer binding; 0 detaches every buffer
    Buffer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Vec3Property {
    Position,
    Velocity,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Vec3 { x, y, z }
    }
}

/// Hardware voices and their buffer queues.
///
/// Implementations must be usable from the stream worker thread and caller threads at once.
pub trait Device: Send + Sync {
    /// Take exclusive ownership of the backend context.
    fn claim(&self) -> DeviceResult<()>;
    fn unclaim(&self);

    fn create_voice(&self) -> DeviceResult<VoiceId>;
    fn delete_voice(&self, voice: VoiceId) -> DeviceResult<()>;
    fn create_buffer(&self) -> DeviceResult<BufferId>;
    fn delete_buffer(&self, buffer: BufferId) -> DeviceResult<()>;

    /// Copy samples into a buffer that is not currently queued anywhere.
    fn upload(
        &self,
        buffer: BufferId,
        format: ChannelFormat,
        samples: &[Sample],
        rate: u32,
    ) -> DeviceResult<()>;

    fn queue_buffers(&self, voice: VoiceId, buffers: &[BufferId]) -> DeviceResult<()>;
    /// Pop the oldest processed buffer off the voice's queue.
    fn unqueue_processed(&self, voice: VoiceId) -> DeviceResult<BufferId>;
    fn buffers_processed(&self, voice: VoiceId) -> DeviceResult<usize>;
    fn buffers_queued(&self, voice: VoiceId) -> DeviceResult<usize>;

    fn play(&self, voice: VoiceId) -> DeviceResult<()>;
    fn pause(&self, voice: VoiceId) -> DeviceResult<()>;
    fn stop(&self, voice: VoiceId) -> DeviceResult<()>;
    fn rewind(&self, voice: VoiceId) -> DeviceResult<()>;
    fn voice_state(&self, voice: VoiceId) -> DeviceResult<VoiceState>;

    fn set_float(&self, voice: VoiceId, prop: FloatProperty, value: f32) -> DeviceResult<()>;
    fn get_float(&self, voice: VoiceId, prop: FloatProperty) -> DeviceResult<f32>;
    fn set_int(&self, voice: VoiceId, prop: IntProperty, value: i32) -> DeviceResult<()>;
    fn get_int(&self, voice: VoiceId, prop: IntProperty) -> DeviceResult<i32>;
    fn set_vec3(&self, voice: VoiceId, prop: Vec3Property, value: Vec3) -> DeviceResult<()>;
    fn get_vec3(&self, voice: VoiceId, prop: Vec3Property) -> DeviceResult<Vec3>;
}
