//! Error types shared by the decoders, the streamer and the device layer.

use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by a device backend call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    #[error("invalid name (unknown voice or buffer)")]
    InvalidName,

    #[error("invalid enum (unsupported property)")]
    InvalidEnum,

    #[error("invalid value")]
    InvalidValue,

    #[error("invalid operation for current state")]
    InvalidOperation,

    #[error("out of memory")]
    OutOfMemory,
}

pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Main error type for the streaming engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown error")]
    Unknown,

    /// File missing or unreadable
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed container
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Channel count or sample rate outside the supported range
    #[error("Unsupported metadata: {rate} Hz, {channels} channel(s)")]
    UnsupportedMetadata { rate: u32, channels: u16 },

    /// Decoder delivered fewer frames than it declared
    #[error("Unexpected end of stream: expected {expected} frames, read {read}")]
    UnexpectedEof { expected: usize, read: usize },

    /// Extension or signature not recognized
    #[error("Unknown file format")]
    UnknownFormat,

    #[error("Device failure: {0}")]
    DeviceFailure(String),

    #[error("Context failure: {0}")]
    ContextFailure(String),

    /// Backend context already claimed by another instance
    #[error("Device already in use by another instance")]
    DuplicateInstance,

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Device call {op} failed: {source}")]
    Device {
        op: &'static str,
        #[source]
        source: DeviceError,
    },
}

impl From<hound::Error> for Error {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(e) => Error::Io(e),
            hound::Error::FormatError(msg) => Error::InvalidData(msg.to_string()),
            hound::Error::UnfinishedSample => {
                Error::InvalidData("trailing partial sample".to_string())
            }
            other => Error::InvalidData(format!("unsupported WAV encoding: {other}")),
        }
    }
}

impl From<symphonia::core::errors::Error> for Error {
    fn from(e: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error as SymphoniaError;

        match e {
            SymphoniaError::IoError(e) => Error::Io(e),
            SymphoniaError::Unsupported(_) => Error::UnknownFormat,
            other => Error::InvalidData(other.to_string()),
        }
    }
}

/// Convenience Result type using the engine's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Callback invoked for every failed device call and every decode failure on the worker.
///
/// Injected at [`Instance`](crate::instance::Instance) construction so each instance (and each
/// test) can observe its own failures.
pub type ErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;

/// Hook used when the embedding application does not install one.
pub fn log_error_hook() -> ErrorHook {
    Arc::new(|e: &Error| error!("{e}"))
}
