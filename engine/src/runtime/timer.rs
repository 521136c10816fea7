use tokio::sync::mpsc::WeakUnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use super::Command;

/// The pairing-window timer.
///
/// At most one is pending. The spawned task holds only a weak sender, so
/// it can neither keep the runtime alive nor outlive a cancel: `cancel`
/// aborts it, and a firing that races the abort carries a stale
/// generation that the machine ignores.
#[derive(Default)]
pub(crate) struct TimeoutTimer {
    pending: Option<JoinHandle<()>>,
}

impl TimeoutTimer {
    pub(crate) fn schedule(
        &mut self,
        at: Instant,
        generation: u64,
        tx: WeakUnboundedSender<Command>,
    ) {
        self.cancel();
        self.pending = Some(tokio::spawn(async move {
            sleep_until(at).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Command::Timeout { generation });
            }
        }));
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for TimeoutTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
