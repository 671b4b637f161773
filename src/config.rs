use crate::constants::{
    BUFFER_COUNT, CHANNELS, CHUNK_SAMPLES, LISTEN_ADDR, MAX_BUFFERS, MAX_VOICES, SAMPLE_RATE,
    TICK_INTERVAL_MS,
};
use crate::error::Error;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs::read_to_string;

/// Ring geometry and worker cadence of a streaming voice.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Device buffers cycled by each voice
    pub buffer_count: usize,

    /// Interleaved samples decoded into each buffer
    pub chunk_samples: usize,

    /// Sleep between worker ticks; 0 busy-polls with a yield
    pub tick_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            buffer_count: BUFFER_COUNT,
            chunk_samples: CHUNK_SAMPLES,
            tick_interval_ms: TICK_INTERVAL_MS,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.buffer_count == 0 {
            return Err(Error::InvalidValue(
                "buffer_count must be at least 1".to_string(),
            ));
        }
        if self.chunk_samples < 2 || self.chunk_samples % 2 != 0 {
            return Err(Error::InvalidValue(format!(
                "chunk_samples must be an even number >= 2, got {}",
                self.chunk_samples
            )));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub max_voices: usize,
    pub max_buffers: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            max_voices: MAX_VOICES,
            max_buffers: MAX_BUFFERS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Address the WAV stream is served on
    pub listen_addr: String,
    pub enabled: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            listen_addr: LISTEN_ADDR.to_string(),
            enabled: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub stream: StreamConfig,
    pub device: DeviceConfig,
    pub output: OutputConfig,
}

pub async fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let config = read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: Config =
        toml::from_str(&config).with_context(|| format!("Failed to parse {}", path.display()))?;
    config.stream.validate()?;

    Ok(config)
}

/// Like [`load`], but a missing file yields the defaults.
pub async fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        info!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    load(path).await
}
