//! Best-effort side effects for sequence transitions.
//!
//! Every invocation runs on its own task and every failure stops here:
//! it is logged, counted, and never reaches the state machine.

mod fallback;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use impulse_core::{CompletionEvent, FeedbackConfig, FeedbackError, HapticPattern, PulseEvent};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::metrics::Counters;

pub use fallback::impact_count;

/// Plays audio cues by symbolic name.
#[async_trait]
pub trait AudioSink: Send + Sync + 'static {
    async fn play(&self, cue: &str) -> Result<(), FeedbackError>;
}

/// Haptic hardware.
#[async_trait]
pub trait HapticSink: Send + Sync + 'static {
    fn supports_haptics(&self) -> bool;

    /// Warm up the haptic engine when a session starts.
    async fn prepare(&self) -> Result<(), FeedbackError> {
        Ok(())
    }

    /// Release the haptic engine when a session stops.
    async fn release(&self) {}

    async fn play_pattern(&self, pattern: HapticPattern) -> Result<(), FeedbackError>;

    /// One discrete impact, used by the fallback train.
    async fn impact(&self) -> Result<(), FeedbackError>;
}

/// Maps pulses and completions onto audio, haptics and the flash counter.
#[derive(Clone)]
pub struct FeedbackDispatcher {
    config: Arc<FeedbackConfig>,
    audio: Arc<dyn AudioSink>,
    haptics: Arc<dyn HapticSink>,
    flashes: Arc<AtomicU64>,
    /// At most one fallback train runs; a new one replaces it.
    fallback: Arc<Mutex<Option<JoinHandle<()>>>>,
    counters: Counters,
}

impl FeedbackDispatcher {
    pub fn new(
        config: FeedbackConfig,
        audio: Arc<dyn AudioSink>,
        haptics: Arc<dyn HapticSink>,
        counters: Counters,
    ) -> Self {
        Self {
            config: Arc::new(config),
            audio,
            haptics,
            flashes: Arc::new(AtomicU64::new(0)),
            fallback: Arc::new(Mutex::new(None)),
            counters,
        }
    }

    /// Number of completions signalled to the visual layer so far.
    pub fn flash_count(&self) -> u64 {
        self.flashes.load(Ordering::Relaxed)
    }

    /// Shared handle on the flash counter.
    pub fn flash_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.flashes)
    }

    pub fn on_session_start(&self) {
        let haptics = Arc::clone(&self.haptics);
        let counters = self.counters.clone();
        tokio::spawn(async move {
            if !haptics.supports_haptics() {
                return;
            }
            if let Err(e) = haptics.prepare().await {
                Counters::bump(&counters.feedback_failures);
                debug!(error = %e, "haptic engine could not start; completion will fall back");
            }
        });
    }

    /// Releases the haptic engine. A running fallback train is left alone.
    pub fn on_session_stop(&self) {
        let haptics = Arc::clone(&self.haptics);
        tokio::spawn(async move {
            haptics.release().await;
        });
    }

    pub fn on_pulse(&self, pulse: &PulseEvent) {
        let cue = self.config.pulse_cue(pulse.ordinal).to_string();
        self.play_cue(cue);
    }

    pub fn on_completed(&self, _event: &CompletionEvent) {
        self.play_cue(self.config.completion_cue.clone());
        self.flashes.fetch_add(1, Ordering::Relaxed);

        let this = self.clone();
        tokio::spawn(async move {
            if this.haptics.supports_haptics() {
                match this.haptics.play_pattern(this.config.haptic).await {
                    Ok(()) => return,
                    Err(e) => {
                        Counters::bump(&this.counters.feedback_failures);
                        warn!(error = %e, "haptic pattern failed; using impact fallback");
                    }
                }
            }
            this.start_fallback();
        });
    }

    fn play_cue(&self, cue: String) {
        let audio = Arc::clone(&self.audio);
        let counters = self.counters.clone();
        tokio::spawn(async move {
            if let Err(e) = audio.play(&cue).await {
                Counters::bump(&counters.feedback_failures);
                debug!(%cue, error = %e, "audio cue skipped");
            }
        });
    }

    fn start_fallback(&self) {
        let train = fallback::run_impact_train(
            Arc::clone(&self.haptics),
            self.config.fallback_period_ms,
            self.config.fallback_total_ms,
            self.counters.clone(),
        );

        let mut slot = self.fallback.lock();
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        *slot = Some(tokio::spawn(train));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingAudio {
        played: Mutex<Vec<String>>,
        missing: Vec<String>,
    }

    #[async_trait]
    impl AudioSink for RecordingAudio {
        async fn play(&self, cue: &str) -> Result<(), FeedbackError> {
            if self.missing.iter().any(|m| m == cue) {
                return Err(FeedbackError::AudioUnavailable { cue: cue.into() });
            }
            self.played.lock().push(cue.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingHaptics {
        supported: bool,
        fail_pattern: bool,
        patterns: Mutex<Vec<HapticPattern>>,
        impacts: AtomicU64,
    }

    #[async_trait]
    impl HapticSink for RecordingHaptics {
        fn supports_haptics(&self) -> bool {
            self.supported
        }

        async fn play_pattern(&self, pattern: HapticPattern) -> Result<(), FeedbackError> {
            if self.fail_pattern {
                return Err(FeedbackError::Playback("engine stopped".into()));
            }
            self.patterns.lock().push(pattern);
            Ok(())
        }

        async fn impact(&self) -> Result<(), FeedbackError> {
            self.impacts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn dispatcher(
        audio: Arc<RecordingAudio>,
        haptics: Arc<RecordingHaptics>,
        counters: Counters,
    ) -> FeedbackDispatcher {
        let config = FeedbackConfig {
            pulse_cues: vec!["one".into(), "two".into()],
            ..FeedbackConfig::default()
        };
        FeedbackDispatcher::new(config, audio, haptics, counters)
    }

    fn completion() -> CompletionEvent {
        CompletionEvent {
            ts_ms: 900,
            pulses: 4,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pulse_cues_follow_ordinals() {
        let audio = Arc::new(RecordingAudio::default());
        let d = dispatcher(
            audio.clone(),
            Arc::new(RecordingHaptics::default()),
            Counters::default(),
        );

        for ordinal in 1..=3 {
            d.on_pulse(&PulseEvent { ts_ms: 0, ordinal });
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        assert_eq!(*audio.played.lock(), vec!["one", "two", "tap"]);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_plays_pattern_and_flashes() {
        let audio = Arc::new(RecordingAudio::default());
        let haptics = Arc::new(RecordingHaptics {
            supported: true,
            ..Default::default()
        });
        let d = dispatcher(audio.clone(), haptics.clone(), Counters::default());

        d.on_completed(&completion());
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(*audio.played.lock(), vec!["win"]);
        assert_eq!(*haptics.patterns.lock(), vec![HapticPattern::default()]);
        assert_eq!(haptics.impacts.load(Ordering::SeqCst), 0);
        assert_eq!(d.flash_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unsupported_haptics_use_impact_train() {
        let haptics = Arc::new(RecordingHaptics::default());
        let d = dispatcher(
            Arc::new(RecordingAudio::default()),
            haptics.clone(),
            Counters::default(),
        );

        d.on_completed(&completion());
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(haptics.impacts.load(Ordering::SeqCst), 14);
        assert!(haptics.patterns.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_pattern_falls_back_and_is_counted() {
        let haptics = Arc::new(RecordingHaptics {
            supported: true,
            fail_pattern: true,
            ..Default::default()
        });
        let counters = Counters::default();
        let d = dispatcher(
            Arc::new(RecordingAudio::default()),
            haptics.clone(),
            counters.clone(),
        );

        d.on_completed(&completion());
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(haptics.impacts.load(Ordering::SeqCst), 14);
        assert_eq!(counters.snapshot().feedback_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_fallback_replaces_the_first() {
        let haptics = Arc::new(RecordingHaptics::default());
        let d = dispatcher(
            Arc::new(RecordingAudio::default()),
            haptics.clone(),
            Counters::default(),
        );

        d.on_completed(&completion());
        // Let the first train deliver a few impacts, then restart it.
        tokio::time::sleep(Duration::from_millis(500)).await;
        let before = haptics.impacts.load(Ordering::SeqCst);
        d.on_completed(&completion());
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(before, 3);
        assert_eq!(haptics.impacts.load(Ordering::SeqCst), before + 14);
        assert_eq!(d.flash_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_audio_is_contained() {
        let audio = Arc::new(RecordingAudio {
            missing: vec!["win".into()],
            ..Default::default()
        });
        let counters = Counters::default();
        let d = dispatcher(
            audio.clone(),
            Arc::new(RecordingHaptics {
                supported: true,
                ..Default::default()
            }),
            counters.clone(),
        );

        d.on_completed(&completion());
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(audio.played.lock().is_empty());
        assert_eq!(d.flash_count(), 1);
        assert_eq!(counters.snapshot().feedback_failures, 1);
    }
}
