//! Fixed set of device buffers cycled through one voice's queue.

use crate::backend::Backend;
use crate::device::{BufferId, IntProperty, VoiceId};
use crate::error::{Error, Result};
use crate::metadata::{ChannelFormat, Metadata, Sample};
use std::collections::VecDeque;

pub struct BufferRing {
    backend: Backend,
    voice: VoiceId,
    buffers: Vec<BufferId>,
    /// Our view of the voice's queue: buffer and the sample count uploaded into it, oldest first
    queue: VecDeque<(BufferId, usize)>,
    format: ChannelFormat,
    rate: u32,
}

impl BufferRing {
    /// Detach whatever is bound to `voice` and allocate `count` buffers for it.
    pub fn new(backend: Backend, voice: VoiceId, count: usize) -> Result<Self> {
        let device = backend.device();
        backend.try_call("detach buffers", device.set_int(voice, IntProperty::Buffer, 0))?;

        let mut buffers = Vec::with_capacity(count);
        for _ in 0..count {
            match backend.try_call("create buffer", device.create_buffer()) {
                Ok(id) => buffers.push(id),
                Err(e) => {
                    for id in buffers {
                        backend.check("delete buffer", device.delete_buffer(id));
                    }
                    return Err(e);
                }
            }
        }

        debug!("Allocated {count} buffers for voice {voice}");

        Ok(BufferRing {
            backend,
            voice,
            buffers,
            queue: VecDeque::with_capacity(count),
            format: ChannelFormat::default(),
            rate: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Upload one chunk per buffer and queue them all in order.
    pub fn acquire(&mut self, chunks: &[Vec<Sample>], meta: Metadata) -> bool {
        if chunks.len() != self.buffers.len() {
            self.backend.report(&Error::InvalidValue(format!(
                "ring holds {} buffers, got {} chunks",
                self.buffers.len(),
                chunks.len()
            )));
            return false;
        }

        self.format = meta.format;
        self.rate = meta.rate;

        let device = self.backend.device();
        for (&id, chunk) in self.buffers.iter().zip(chunks) {
            let uploaded = device.upload(id, self.format, chunk, self.rate);
            if self.backend.check("upload", uploaded).is_none() {
                return false;
            }
        }

        let queued = device.queue_buffers(self.voice, &self.buffers);
        if self.backend.check("queue buffers", queued).is_none() {
            return false;
        }

        self.queue = self
            .buffers
            .iter()
            .zip(chunks)
            .map(|(&id, chunk)| (id, chunk.len()))
            .collect();
        true
    }

    /// Unqueue every processed buffer, returning how many were popped.
    pub fn release(&mut self) -> usize {
        let mut released = 0;
        while self.vacant() > 0 {
            let unqueued = self.backend.device().unqueue_processed(self.voice);
            let Some(id) = self.backend.check("unqueue", unqueued) else {
                break;
            };
            self.forget(id);
            released += 1;
        }
        released
    }

    /// Refill the oldest processed buffer with `samples` and queue it again.
    ///
    /// Returns false when nothing has been processed yet (or the device refused).
    pub fn next(&mut self, samples: &[Sample]) -> bool {
        if self.vacant() == 0 {
            return false;
        }

        let unqueued = self.backend.device().unqueue_processed(self.voice);
        let Some(id) = self.backend.check("unqueue", unqueued) else {
            return false;
        };
        self.forget(id);

        let device = self.backend.device();
        let uploaded = device.upload(id, self.format, samples, self.rate);
        if self.backend.check("upload", uploaded).is_none() {
            return false;
        }
        if self
            .backend
            .check("queue buffers", device.queue_buffers(self.voice, &[id]))
            .is_none()
        {
            return false;
        }

        trace!("Requeued buffer {id} with {} samples", samples.len());
        self.queue.push_back((id, samples.len()));
        true
    }

    pub fn queued(&self) -> usize {
        let queued = self.backend.device().buffers_queued(self.voice);
        self.backend.check("buffers queued", queued).unwrap_or(0)
    }

    pub fn vacant(&self) -> usize {
        let processed = self.backend.device().buffers_processed(self.voice);
        self.backend.check("buffers processed", processed).unwrap_or(0)
    }

    /// Nothing queued: playback has to start by priming every buffer.
    pub fn cold(&self) -> bool {
        self.queued() == 0
    }

    /// Every buffer drained by the device before the worker refilled any.
    pub fn starved(&self) -> bool {
        self.vacant() == self.buffers.len()
    }

    /// Buffer ids in the order the voice will play them.
    pub fn queued_ids(&self) -> Vec<BufferId> {
        self.queue.iter().map(|(id, _)| *id).collect()
    }

    /// Samples sitting in queued buffers the device has not finished yet.
    pub fn ahead_samples(&self) -> usize {
        let unplayed = self.queued().saturating_sub(self.vacant());
        self.queue.iter().rev().take(unplayed).map(|(_, n)| n).sum()
    }

    /// Stop the voice, drain the queue, unbind and free every buffer.
    pub fn close(&mut self) {
        let device = self.backend.device();
        self.backend.check("stop", device.stop(self.voice));
        self.release();

        let device = self.backend.device();
        self.backend.check(
            "detach buffers",
            device.set_int(self.voice, IntProperty::Buffer, 0),
        );
        for id in self.buffers.drain(..) {
            self.backend.check("delete buffer", device.delete_buffer(id));
        }
        self.queue.clear();

        debug!("Released buffers of voice {}", self.voice);
    }

    fn forget(&mut self, id: BufferId) {
        if let Some(index) = self.queue.iter().position(|(queued, _)| *queued == id) {
            self.queue.remove(index);
        }
    }
}
