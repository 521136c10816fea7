use thiserror::Error;

/// Rejected configuration. Raised before any detection state exists.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("threshold must be finite and > 0, got {0}")]
    InvalidThreshold(f64),

    #[error("hysteresis ratio must be finite and in [0, 1), got {0}")]
    InvalidHysteresisRatio(f64),

    #[error("pairing window must be > 0 ms")]
    ZeroPairingWindow,

    #[error("target count must be >= 1")]
    ZeroTargetCount,

    #[error("fallback period must be > 0 ms")]
    ZeroFallbackPeriod,

    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A side effect could not be performed.
///
/// Never crosses the feedback dispatcher boundary; it only reaches logs
/// and the failure counter.
#[derive(Error, Debug)]
pub enum FeedbackError {
    #[error("audio resource unavailable: {cue}")]
    AudioUnavailable { cue: String },

    #[error("haptics unsupported on this hardware")]
    HapticsUnsupported,

    #[error("playback failed: {0}")]
    Playback(String),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("motion sensor unavailable")]
    SensorUnavailable,

    #[error("sample source failed to subscribe: {0}")]
    Subscribe(String),

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    #[error("detector runtime has shut down")]
    RuntimeClosed,
}
