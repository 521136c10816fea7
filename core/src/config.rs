use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// How the pairing-window deadline moves while a sequence is in progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    /// Every accepted pulse pushes the deadline to `now + pairing_window`.
    #[default]
    Sliding,

    /// The deadline is fixed by the first pulse of the sequence.
    Anchored,
}

impl FromStr for WindowMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sliding" => Ok(WindowMode::Sliding),
            "anchored" => Ok(WindowMode::Anchored),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    // =========================
    // Edge detection
    // =========================
    /// Magnitude a sample must strictly exceed to count as a rising edge.
    pub threshold: f64,

    /// Fraction of `threshold` the signal must fall below before another
    /// rising edge is accepted.
    ///
    /// Together with `threshold` this forms the hysteresis band: a signal
    /// wobbling around `threshold` only re-triggers after it has returned
    /// to baseline.
    pub hysteresis_ratio: f64,

    /// Minimum spacing between two accepted pulses (milliseconds).
    ///
    /// Independent of hysteresis: an edge inside the cooldown is consumed
    /// and never retried.
    pub cooldown_ms: u64,

    // =========================
    // Sequencing
    // =========================
    /// Maximum gap (milliseconds) between pulses of one sequence.
    pub pairing_window_ms: u64,

    /// Number of pulses that completes a sequence.
    pub target_count: u32,

    /// Whether the pairing deadline slides with each pulse.
    pub window_mode: WindowMode,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 1.4,
            hysteresis_ratio: 0.5,
            cooldown_ms: 200,
            pairing_window_ms: 1_000,
            target_count: 4,
            window_mode: WindowMode::Sliding,
        }
    }
}

impl DetectorConfig {
    /// Re-arm level derived from the hysteresis ratio.
    pub fn low_threshold(&self) -> f64 {
        self.threshold * self.hysteresis_ratio
    }

    pub fn pairing_window(&self) -> Duration {
        Duration::from_millis(self.pairing_window_ms)
    }

    /// Rejects configurations whose behaviour would be undefined:
    /// a non-positive threshold, a re-arm level at or above the threshold,
    /// an empty pairing window, or a zero target.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        if !self.hysteresis_ratio.is_finite() || !(0.0..1.0).contains(&self.hysteresis_ratio) {
            return Err(ConfigError::InvalidHysteresisRatio(self.hysteresis_ratio));
        }
        if self.pairing_window_ms == 0 {
            return Err(ConfigError::ZeroPairingWindow);
        }
        if self.target_count == 0 {
            return Err(ConfigError::ZeroTargetCount);
        }
        Ok(())
    }
}

/// Haptic pattern descriptor played on completion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HapticPattern {
    pub intensity: f32,
    pub sharpness: f32,
    pub duration_ms: u64,
}

impl Default for HapticPattern {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            sharpness: 0.5,
            duration_ms: 2_000,
        }
    }
}

/// Symbolic resource names and timings for side effects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Cue per pulse ordinal; index 0 is played for the first pulse.
    pub pulse_cues: Vec<String>,

    /// Played for ordinals without an entry in `pulse_cues`.
    pub default_pulse_cue: String,

    pub completion_cue: String,

    pub haptic: HapticPattern,

    /// Spacing of discrete impacts when continuous haptics are unavailable.
    pub fallback_period_ms: u64,

    /// Total span of the fallback impact train.
    pub fallback_total_ms: u64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            pulse_cues: Vec::new(),
            default_pulse_cue: "tap".to_string(),
            completion_cue: "win".to_string(),
            haptic: HapticPattern::default(),
            fallback_period_ms: 150,
            fallback_total_ms: 2_000,
        }
    }
}

impl FeedbackConfig {
    /// Cue name for the `ordinal`-th pulse (1-based).
    pub fn pulse_cue(&self, ordinal: u32) -> &str {
        ordinal
            .checked_sub(1)
            .and_then(|i| self.pulse_cues.get(i as usize))
            .map(String::as_str)
            .unwrap_or(&self.default_pulse_cue)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fallback_period_ms == 0 {
            return Err(ConfigError::ZeroFallbackPeriod);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detector: DetectorConfig,
    pub feedback: FeedbackConfig,
}

impl AppConfig {
    /// Defaults overlaid with `IMPULSE_*` environment variables.
    ///
    /// Unset variables keep their default; malformed ones are an error
    /// rather than silently ignored.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        let d = &mut cfg.detector;

        d.threshold = env_or("IMPULSE_THRESHOLD", d.threshold)?;
        d.hysteresis_ratio = env_or("IMPULSE_HYSTERESIS_RATIO", d.hysteresis_ratio)?;
        d.cooldown_ms = env_or("IMPULSE_COOLDOWN_MS", d.cooldown_ms)?;
        d.pairing_window_ms = env_or("IMPULSE_PAIRING_WINDOW_MS", d.pairing_window_ms)?;
        d.target_count = env_or("IMPULSE_TARGET_COUNT", d.target_count)?;
        d.window_mode = env_or("IMPULSE_WINDOW_MODE", d.window_mode)?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads a JSON document; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detector.validate()?;
        self.feedback.validate()
    }
}

fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { key, value }),
        Err(_) => Ok(default),
    }
}
