use std::time::{Duration, Instant};

use tracing::{Span, field};

use super::TraceId;

/// Root span for one detection session.
///
/// Always a root: a session never nests under whatever span the caller
/// (or the previous session) has entered. `phase` starts empty and is
/// filled in by [`annotate_phase`].
pub fn session_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        parent: None,
        "session",
        kind = %name,
        session_id = %trace_id.as_str(),
        phase = field::Empty
    )
}

pub fn annotate_phase(span: &Span, phase: &str) {
    span.record("phase", field::display(phase));
}

/// Runs `f` and warns under the `performance` target when it exceeds `max`.
pub fn warn_if_slow<T>(label: &'static str, max: Duration, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let out = f();
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_us = elapsed.as_micros() as u64,
            "slow operation detected"
        );
    }
    out
}
