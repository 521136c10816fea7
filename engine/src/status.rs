use std::sync::Arc;

use impulse_core::{CompletionEvent, Phase};
use tokio::sync::watch;
use tracing::warn;

/// Output callbacks consumed by the surrounding application.
///
/// Both methods run on the detector's task; keep them short.
pub trait EngineObserver: Send + Sync + 'static {
    fn on_status_changed(&self, _phase: Phase) {}

    fn on_completed(&self, _event: CompletionEvent) {}
}

/// Read-only projection of the current phase.
///
/// Updated synchronously by the runtime on every transition. Consumers
/// either poll [`StatusReporter::current`], hold a `watch::Receiver`, or
/// register an [`EngineObserver`].
pub struct StatusReporter {
    tx: watch::Sender<Phase>,
    observer: Option<Arc<dyn EngineObserver>>,
}

impl StatusReporter {
    pub fn new(observer: Option<Arc<dyn EngineObserver>>) -> Self {
        let (tx, _rx) = watch::channel(Phase::Idle);
        Self { tx, observer }
    }

    pub fn current(&self) -> Phase {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.tx.subscribe()
    }

    pub fn publish(&self, phase: Phase) {
        self.tx.send_replace(phase);

        if let Some(observer) = &self.observer {
            // Observers are untrusted: a panicking callback must not take the detector down.
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                observer.on_status_changed(phase);
            }));
            if result.is_err() {
                warn!(%phase, "status observer panicked");
            }
        }
    }

    pub fn notify_completed(&self, event: CompletionEvent) {
        if let Some(observer) = &self.observer {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                observer.on_completed(event);
            }));
            if result.is_err() {
                warn!(ts_ms = event.ts_ms, "completion observer panicked");
            }
        }
    }
}
