//! Human readable byte sizes, sample rates and track lengths.

use std::fmt::{Display, Formatter};
use std::time::Duration;

const SIZE_SUFFIXES: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
const RATE_SUFFIXES: [&str; 4] = ["Hz", "kHz", "MHz", "GHz"];

/// Scales `value` down by `divisor` until it fits the largest suffix that keeps it above 1.
fn scale(value: f64, divisor: f64, units: usize) -> (f64, usize) {
    let mut value = value;
    let mut unit = 0;
    while value > divisor && unit + 1 < units {
        value /= divisor;
        unit += 1;
    }
    (value, unit)
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub bytes: usize,
}

impl Size {
    pub fn from_bytes(bytes: usize) -> Self {
        Size { bytes }
    }
}

impl Display for Size {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let (value, unit) = scale(self.bytes as f64, 1024.0, SIZE_SUFFIXES.len());
        write!(f, "{:.2}{}", value, SIZE_SUFFIXES[unit])
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rate {
    pub hz: u32,
}

impl Rate {
    pub fn from_hz(hz: u32) -> Self {
        Rate { hz }
    }
}

impl Display for Rate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let (value, unit) = scale(self.hz as f64, 1000.0, RATE_SUFFIXES.len());
        write!(f, "{:.1}{}", value, RATE_SUFFIXES[unit])
    }
}

/// Track length or position split into hours, minutes and seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Length {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl From<Duration> for Length {
    fn from(time: Duration) -> Self {
        let total = time.as_secs();
        Length {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }
}

impl Display for Length {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}
