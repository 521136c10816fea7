//! Sample sources feeding the detector runtime.
//!
//! The runtime only sees the [`SignalSource`] trait. Two sources ship with
//! the crate: [`ManualSource`] for hosts that bridge a sensor callback, and
//! [`ReplaySource`] for recorded or synthetic traces.

use std::sync::Arc;
use std::time::Duration;

use impulse_core::{EngineError, MagnitudeSample};
use parking_lot::Mutex;
use tokio::sync::mpsc::WeakUnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

use crate::runtime::Command;

/// Nominal device-motion update interval (100 Hz).
pub const NOMINAL_SAMPLE_INTERVAL: Duration = Duration::from_millis(10);

/// Push side of one subscription.
///
/// Holds only a weak handle on the runtime's queue: it never keeps the
/// detector alive, and samples pushed after the subscription was replaced
/// are discarded by the runtime.
#[derive(Clone, Debug)]
pub struct SampleSender {
    tx: WeakUnboundedSender<Command>,
    session: u64,
}

impl SampleSender {
    pub(crate) fn new(tx: WeakUnboundedSender<Command>, session: u64) -> Self {
        Self { tx, session }
    }

    /// Enqueues one magnitude. Returns `false` once the runtime is gone.
    pub fn push(&self, magnitude: f64) -> bool {
        match self.tx.upgrade() {
            Some(tx) => tx
                .send(Command::Sample {
                    magnitude,
                    session: self.session,
                })
                .is_ok(),
            None => false,
        }
    }
}

/// Motion sensor feed.
pub trait SignalSource: Send + 'static {
    /// Whether the device has motion capability at all.
    fn is_available(&self) -> bool;

    /// Start delivering samples into `sink`, replacing any previous sink.
    fn subscribe(&mut self, sink: SampleSender) -> Result<(), EngineError>;

    /// Stop delivering samples. Must be idempotent.
    fn unsubscribe(&mut self);
}

impl<S: SignalSource + ?Sized> SignalSource for Box<S> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn subscribe(&mut self, sink: SampleSender) -> Result<(), EngineError> {
        (**self).subscribe(sink)
    }

    fn unsubscribe(&mut self) {
        (**self).unsubscribe()
    }
}

/// Source driven by the host through a [`ManualFeed`].
pub struct ManualSource {
    available: bool,
    slot: Arc<Mutex<Option<SampleSender>>>,
}

/// Host-side handle of a [`ManualSource`]. Cheap to clone.
#[derive(Clone)]
pub struct ManualFeed {
    slot: Arc<Mutex<Option<SampleSender>>>,
}

impl ManualSource {
    pub fn new() -> (Self, ManualFeed) {
        Self::with_availability(true)
    }

    /// A source whose device reports no motion capability.
    pub fn unavailable() -> (Self, ManualFeed) {
        Self::with_availability(false)
    }

    fn with_availability(available: bool) -> (Self, ManualFeed) {
        let slot = Arc::new(Mutex::new(None));
        (
            Self {
                available,
                slot: Arc::clone(&slot),
            },
            ManualFeed { slot },
        )
    }
}

impl SignalSource for ManualSource {
    fn is_available(&self) -> bool {
        self.available
    }

    fn subscribe(&mut self, sink: SampleSender) -> Result<(), EngineError> {
        *self.slot.lock() = Some(sink);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.slot.lock().take();
    }
}

impl ManualFeed {
    /// Delivers one magnitude. Returns `false` when nobody is subscribed.
    pub fn push(&self, magnitude: f64) -> bool {
        match self.slot.lock().as_ref() {
            Some(sink) => sink.push(magnitude),
            None => false,
        }
    }

    /// Delivers the norm of a 3-axis user-acceleration reading.
    pub fn push_axes(&self, x: f64, y: f64, z: f64) -> bool {
        self.push(MagnitudeSample::from_axes(0, x, y, z).magnitude)
    }

    pub fn is_subscribed(&self) -> bool {
        self.slot.lock().is_some()
    }
}

/// Replays a timed trace in real time, relative to the moment of subscription.
pub struct ReplaySource {
    samples: Arc<[MagnitudeSample]>,
    task: Option<JoinHandle<()>>,
}

impl ReplaySource {
    pub fn new(samples: Vec<MagnitudeSample>) -> Self {
        Self {
            samples: samples.into(),
            task: None,
        }
    }

    /// Offset of the last sample.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.samples.last().map_or(0, |s| s.ts_ms))
    }
}

impl SignalSource for ReplaySource {
    fn is_available(&self) -> bool {
        true
    }

    fn subscribe(&mut self, sink: SampleSender) -> Result<(), EngineError> {
        self.unsubscribe();

        let samples = Arc::clone(&self.samples);
        self.task = Some(tokio::spawn(async move {
            let origin = Instant::now();
            for s in samples.iter() {
                sleep_until(origin + Duration::from_millis(s.ts_ms)).await;
                if !sink.push(s.magnitude) {
                    debug!("replay stopped: detector gone");
                    return;
                }
            }
            debug!(samples = samples.len(), "replay finished");
        }));
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
