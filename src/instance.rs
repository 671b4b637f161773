//! Entry point owning the device claim.

use crate::backend::Backend;
use crate::config::StreamConfig;
use crate::device::Device;
use crate::error::{log_error_hook, Error, ErrorHook, Result};
use crate::music::Music;
use crate::stream_source::StreamSource;
use std::sync::Arc;

/// Holds exclusive use of a device and hands out streaming voices on it.
///
/// Only one `Instance` may exist per device at a time; the claim is released on drop.
pub struct Instance {
    backend: Backend,
    config: StreamConfig,
}

impl Instance {
    /// Claim `device`, reporting failures through the `log` error hook.
    pub fn new(device: Arc<dyn Device>) -> Result<Self> {
        Self::with_error_hook(device, log_error_hook())
    }

    pub fn with_error_hook(device: Arc<dyn Device>, hook: ErrorHook) -> Result<Self> {
        device.claim().map_err(|_| Error::DuplicateInstance)?;

        Ok(Instance {
            backend: Backend::new(device, hook),
            config: StreamConfig::default(),
        })
    }

    /// Ring geometry used for voices created from now on.
    pub fn with_stream_config(mut self, config: StreamConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn stream_config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn stream_source(&self) -> Result<StreamSource> {
        StreamSource::new(self.backend.clone(), &self.config)
    }

    pub fn music(&self) -> Result<Music> {
        self.stream_source().map(Music::new)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        self.backend.device().unclaim();
    }
}
