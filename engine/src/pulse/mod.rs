pub mod detector;
pub mod tracker;

pub use detector::{DetectorState, Edge, PulseDetector};
pub use tracker::{SequenceState, SequenceTracker, Tracked};

/// Core pulse stage trait.
///
/// A stage:
/// - owns internal state
/// - consumes exactly one input per call
/// - produces a result without side effects
pub trait Pulse {
    /// Input type consumed per call
    type Input;

    /// Output type produced per call
    type Output;

    fn evaluate(&mut self, input: Self::Input) -> Self::Output;
}
