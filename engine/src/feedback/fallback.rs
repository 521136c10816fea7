use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

use super::HapticSink;
use crate::metrics::Counters;

/// Impacts delivered by one fallback train: one per elapsed period until
/// `total_ms` is used up, the last one may overshoot.
pub fn impact_count(period_ms: u64, total_ms: u64) -> u64 {
    if period_ms == 0 {
        return 0;
    }
    total_ms.div_ceil(period_ms)
}

/// Approximates a continuous vibration with discrete impacts.
///
/// Owns its own timer and terminates by itself; nothing in the detector
/// waits for it or cancels it.
pub(super) async fn run_impact_train(
    haptics: Arc<dyn HapticSink>,
    period_ms: u64,
    total_ms: u64,
    counters: Counters,
) {
    let impacts = impact_count(period_ms, total_ms);
    if impacts == 0 {
        return;
    }

    let period = Duration::from_millis(period_ms);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(impacts, period_ms, "haptic fallback started");

    for _ in 0..impacts {
        ticker.tick().await;
        if let Err(e) = haptics.impact().await {
            Counters::bump(&counters.feedback_failures);
            debug!(error = %e, "fallback impact failed");
        }
    }

    debug!("haptic fallback finished");
}
