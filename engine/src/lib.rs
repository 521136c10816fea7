//! Motion-impulse detection engine.
//!
//! Data flow:
//! SignalSource → PulseDetector → SequenceTracker → {FeedbackDispatcher, StatusReporter}
//!
//! - [`pulse`] and [`machine`] are pure: they consume samples and timer
//!   firings and return effects.
//! - [`runtime`] owns the tokio task, the timer and the source subscription
//!   and applies those effects.
//! - [`feedback`] performs side effects; its failures never reach the
//!   state machine.

pub mod feedback;
pub mod machine;
pub mod metrics;
pub mod pulse;
pub mod runtime;
pub mod source;
pub mod status;

pub use feedback::{AudioSink, FeedbackDispatcher, HapticSink};
pub use machine::{Effect, Input, Machine};
pub use metrics::{Counters, CountersSnapshot};
pub use runtime::{DetectorHandle, DetectorRuntime, FeedbackSinks, RuntimeSnapshot};
pub use source::{ManualFeed, ManualSource, ReplaySource, SampleSender, SignalSource};
pub use status::{EngineObserver, StatusReporter};
