//! Data model, configuration and error taxonomy shared by the impulse
//! detection engine and its front ends.
//!
//! Nothing in this crate is async or touches hardware; it only describes
//! samples, events, phases and the knobs that shape detection.

pub mod config;
pub mod errors;
pub mod models;

pub use config::{AppConfig, DetectorConfig, FeedbackConfig, HapticPattern, WindowMode};
pub use errors::{ConfigError, EngineError, FeedbackError};
pub use models::{CompletionEvent, MagnitudeSample, Phase, PulseEvent};
