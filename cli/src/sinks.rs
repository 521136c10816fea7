//! Feedback backends for a headless run: every cue becomes a log line.

use async_trait::async_trait;
use impulse_core::{CompletionEvent, FeedbackError, HapticPattern, Phase};
use impulse_engine::{AudioSink, EngineObserver, HapticSink};
use tracing::info;

pub struct LogAudio;

#[async_trait]
impl AudioSink for LogAudio {
    async fn play(&self, cue: &str) -> Result<(), FeedbackError> {
        info!(target: "feedback", cue, "audio");
        Ok(())
    }
}

/// Reports no haptic engine, so completions exercise the impact fallback.
pub struct LogHaptics;

#[async_trait]
impl HapticSink for LogHaptics {
    fn supports_haptics(&self) -> bool {
        false
    }

    async fn play_pattern(&self, _pattern: HapticPattern) -> Result<(), FeedbackError> {
        Err(FeedbackError::HapticsUnsupported)
    }

    async fn impact(&self) -> Result<(), FeedbackError> {
        info!(target: "feedback", "impact");
        Ok(())
    }
}

pub struct LogObserver;

impl EngineObserver for LogObserver {
    fn on_status_changed(&self, phase: Phase) {
        info!(target: "status", %phase, "status");
    }

    fn on_completed(&self, event: CompletionEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::warn!(error = %e, "completion not serialisable"),
        }
    }
}
