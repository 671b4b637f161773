//! The single checkpoint every device call passes through.

use crate::device::Device;
use crate::error::{DeviceResult, Error, ErrorHook, Result};
use std::sync::Arc;

/// A device handle paired with the hook its failures are reported to.
#[derive(Clone)]
pub struct Backend {
    device: Arc<dyn Device>,
    hook: ErrorHook,
}

impl Backend {
    pub fn new(device: Arc<dyn Device>, hook: ErrorHook) -> Self {
        Backend { device, hook }
    }

    pub fn device(&self) -> &dyn Device {
        self.device.as_ref()
    }

    /// Report a failed device call and convert it into an engine error.
    pub fn try_call<T>(&self, op: &'static str, result: DeviceResult<T>) -> Result<T> {
        result.map_err(|source| {
            debug!("Device call {op} failed: {source}");
            let e = Error::Device { op, source };
            self.report(&e);
            e
        })
    }

    /// Like [`try_call`](Self::try_call) for callers that only need to know whether it worked.
    pub fn check<T>(&self, op: &'static str, result: DeviceResult<T>) -> Option<T> {
        self.try_call(op, result).ok()
    }

    pub fn report(&self, e: &Error) {
        (self.hook)(e)
    }
}
