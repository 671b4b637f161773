//! gapless library crate
//!
//! Streaming playback engine: decoders feed a ring of device buffers from a background
//! worker per voice. The player binary is in main.rs.

#[macro_use]
extern crate log;

pub mod backend;
pub mod codecs;
pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod instance;
pub mod metadata;
pub mod mixer;
pub mod music;
pub mod net;
pub mod pcm;
pub mod player;
pub mod ring;
pub mod stdin;
pub mod stream_source;
pub mod streamer;
pub mod units;

pub use error::{Error, Result};
pub use instance::Instance;
pub use music::Music;
pub use stream_source::{State, StreamSource};

#[cfg(test)]
mod soft_device_tests;
