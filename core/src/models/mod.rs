use std::fmt;

use serde::{Deserialize, Serialize};

/// One magnitude reading, stamped in milliseconds since the current
/// detection session started.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MagnitudeSample {
    pub ts_ms: u64,
    pub magnitude: f64,
}

impl MagnitudeSample {
    pub fn new(ts_ms: u64, magnitude: f64) -> Self {
        Self { ts_ms, magnitude }
    }

    /// Euclidean norm of a 3-axis acceleration vector.
    pub fn from_axes(ts_ms: u64, x: f64, y: f64, z: f64) -> Self {
        Self::new(ts_ms, (x * x + y * y + z * z).sqrt())
    }

    /// Finite and non-negative.
    pub fn is_valid(&self) -> bool {
        self.magnitude.is_finite() && self.magnitude >= 0.0
    }
}

/// An accepted rising edge.
///
/// `ordinal` is 0 as emitted by the detector and is assigned its 1-based
/// position in the sequence by the tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PulseEvent {
    pub ts_ms: u64,
    pub ordinal: u32,
}

/// Emitted exactly once per completed sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CompletionEvent {
    pub ts_ms: u64,
    pub pulses: u32,
}

/// Externally observable phase of the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,

    /// Started, no pulse in the current sequence yet.
    Listening,

    /// `n` pulses counted in the current sequence.
    Counted(u32),

    /// The pairing window elapsed; listening for a fresh sequence.
    Timeout,

    /// Target reached; sampling has ended until the next `start()`.
    Completed,

    /// Stopped by the caller.
    Paused,

    /// No motion capability at start; the engine stays inert.
    Unavailable,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => f.write_str("idle"),
            Phase::Listening => f.write_str("listening"),
            Phase::Counted(n) => write!(f, "counted({n})"),
            Phase::Timeout => f.write_str("timeout"),
            Phase::Completed => f.write_str("completed"),
            Phase::Paused => f.write_str("paused"),
            Phase::Unavailable => f.write_str("unavailable"),
        }
    }
}
