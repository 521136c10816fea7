//! Detector runtime.
//!
//! One task owns the [`Machine`], the pairing-window timer and the source
//! subscription. Samples, timer firings and lifecycle calls all travel
//! through a single unbounded queue, so they are applied strictly in
//! arrival order and never interleave.
//!
//! Ownership is one-directional: the runtime owns the timer task and the
//! source; both hold only a weak sender back into the queue. Dropping
//! every [`DetectorHandle`] closes the queue and ends the task.

mod timer;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use impulse_common::logger::{annotate_phase, session_span, warn_if_slow};
use impulse_common::TraceId;
use impulse_core::{AppConfig, EngineError, MagnitudeSample, Phase};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tracing::{Span, debug, info, warn};

use crate::feedback::{AudioSink, FeedbackDispatcher, HapticSink};
use crate::machine::{Effect, Input, Machine};
use crate::metrics::Counters;
use crate::pulse::{DetectorState, SequenceState};
use crate::source::{SampleSender, SignalSource};
use crate::status::{EngineObserver, StatusReporter};
use timer::TimeoutTimer;

/// Handling one queue item should never take this long.
const SLOW_STEP: Duration = Duration::from_millis(5);

#[derive(Debug)]
pub(crate) enum Command {
    Start {
        ack: oneshot::Sender<Result<(), EngineError>>,
    },
    Stop {
        ack: oneshot::Sender<()>,
    },
    Sample {
        magnitude: f64,
        session: u64,
    },
    Timeout {
        generation: u64,
    },
    Snapshot {
        ack: oneshot::Sender<RuntimeSnapshot>,
    },
}

/// Point-in-time view of the runtime, taken on its own task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeSnapshot {
    pub phase: Phase,
    pub detector: DetectorState,
    pub sequence: SequenceState,
    pub timer_pending: bool,
    pub subscribed: bool,
}

/// Side-effect backends and the optional observer.
pub struct FeedbackSinks {
    pub audio: Arc<dyn AudioSink>,
    pub haptics: Arc<dyn HapticSink>,
    pub observer: Option<Arc<dyn EngineObserver>>,
}

/// Caller-side handle. Cheap to clone.
#[derive(Clone)]
pub struct DetectorHandle {
    tx: UnboundedSender<Command>,
    status: watch::Receiver<Phase>,
    counters: Counters,
    flashes: Arc<AtomicU64>,
}

impl DetectorHandle {
    /// Starts a fresh detection session, replacing any running one.
    ///
    /// Fails with [`EngineError::SensorUnavailable`] when the source has no
    /// motion capability; the phase then reads `unavailable` and nothing
    /// else happens until the next `start`.
    pub async fn start(&self) -> Result<(), EngineError> {
        let (ack, rx) = oneshot::channel();
        self.send(Command::Start { ack })?;
        rx.await.map_err(|_| EngineError::RuntimeClosed)?
    }

    /// Stops detection. Returns once every timer is cancelled and the
    /// source is detached. Idempotent.
    pub async fn stop(&self) -> Result<(), EngineError> {
        let (ack, rx) = oneshot::channel();
        self.send(Command::Stop { ack })?;
        rx.await.map_err(|_| EngineError::RuntimeClosed)
    }

    /// Waits until everything queued before this call has been applied.
    pub async fn snapshot(&self) -> Result<RuntimeSnapshot, EngineError> {
        let (ack, rx) = oneshot::channel();
        self.send(Command::Snapshot { ack })?;
        rx.await.map_err(|_| EngineError::RuntimeClosed)
    }

    pub fn phase(&self) -> Phase {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<Phase> {
        self.status.clone()
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn flash_count(&self) -> u64 {
        self.flashes.load(Ordering::Relaxed)
    }

    fn send(&self, cmd: Command) -> Result<(), EngineError> {
        self.tx.send(cmd).map_err(|_| EngineError::RuntimeClosed)
    }
}

pub struct DetectorRuntime<S: SignalSource> {
    machine: Machine,
    source: S,
    subscribed: bool,
    feedback: FeedbackDispatcher,
    status: StatusReporter,
    counters: Counters,
    timer: TimeoutTimer,

    /// Samples are stamped relative to this instant.
    epoch: Instant,
    /// Bumped on every start; samples from older subscriptions are dropped.
    session: u64,
    span: Span,

    weak_tx: WeakUnboundedSender<Command>,
    rx: UnboundedReceiver<Command>,
}

impl<S: SignalSource> DetectorRuntime<S> {
    /// Validates `config` and builds the runtime plus its handle.
    ///
    /// Nothing runs until the returned runtime is spawned with
    /// [`DetectorRuntime::run`] and the handle calls `start`.
    pub fn new(
        config: AppConfig,
        source: S,
        sinks: FeedbackSinks,
    ) -> Result<(Self, DetectorHandle), EngineError> {
        config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Counters::default();
        let status = StatusReporter::new(sinks.observer);
        let feedback =
            FeedbackDispatcher::new(config.feedback, sinks.audio, sinks.haptics, counters.clone());

        let handle = DetectorHandle {
            tx: tx.clone(),
            status: status.subscribe(),
            counters: counters.clone(),
            flashes: feedback.flash_counter(),
        };

        let runtime = Self {
            machine: Machine::new(config.detector),
            source,
            subscribed: false,
            feedback,
            status,
            counters,
            timer: TimeoutTimer::default(),
            epoch: Instant::now(),
            session: 0,
            span: Span::none(),
            weak_tx: tx.downgrade(),
            rx,
        };

        Ok((runtime, handle))
    }

    /// Runs until every [`DetectorHandle`] is dropped.
    pub async fn run(mut self) {
        info!(
            threshold = self.machine.config().threshold,
            target_count = self.machine.config().target_count,
            "detector runtime started"
        );

        while let Some(cmd) = self.rx.recv().await {
            let span = self.span.clone();
            let _entered = span.enter();
            warn_if_slow("detector_step", SLOW_STEP, || self.handle(cmd));
        }

        self.teardown();
        info!("detector runtime exiting");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Start { ack } => {
                let result = self.start();
                let _ = ack.send(result);
            }
            Command::Stop { ack } => {
                self.stop();
                let _ = ack.send(());
            }
            Command::Sample { magnitude, session } => {
                if session != self.session {
                    return;
                }
                Counters::bump(&self.counters.samples);
                let ts_ms = self.stamp();
                let effects = self
                    .machine
                    .step(Input::Sample(MagnitudeSample::new(ts_ms, magnitude)));
                self.apply(effects);
            }
            Command::Timeout { generation } => {
                let effects = self.machine.step(Input::Timeout { generation });
                self.apply(effects);
            }
            Command::Snapshot { ack } => {
                let _ = ack.send(self.snapshot());
            }
        }
    }

    fn start(&mut self) -> Result<(), EngineError> {
        // Tear down whatever the previous session left behind.
        self.timer.cancel();
        self.detach();
        if self.machine.is_running() {
            self.feedback.on_session_stop();
        }

        self.session += 1;
        let trace_id = TraceId::default();
        self.span = session_span("detection", &trace_id);
        let _entered = self.span.clone().entered();

        if !self.source.is_available() {
            warn!("device motion not available");
            let effects = self.machine.mark_unavailable();
            self.apply(effects);
            return Err(EngineError::SensorUnavailable);
        }

        // Samples delivered right away queue up behind this command, so
        // subscribing before the machine starts cannot lose any.
        let sink = SampleSender::new(self.weak_tx.clone(), self.session);
        if let Err(e) = self.source.subscribe(sink) {
            warn!(error = %e, "sample source refused subscription");
            let effects = self.machine.mark_unavailable();
            self.apply(effects);
            return Err(e);
        }
        self.subscribed = true;

        self.epoch = Instant::now();
        self.feedback.on_session_start();
        let effects = self.machine.start();
        self.apply(effects);

        info!(session = self.session, "detection started");
        Ok(())
    }

    fn stop(&mut self) {
        let effects = self.machine.stop();
        if effects.is_empty() {
            debug!("stop ignored: not running");
            return;
        }
        self.apply(effects);
        self.feedback.on_session_stop();
        info!(session = self.session, "detection stopped");
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Pulse(pulse) => {
                    Counters::bump(&self.counters.pulses);
                    debug!(ts_ms = pulse.ts_ms, ordinal = pulse.ordinal, "pulse");
                    self.feedback.on_pulse(&pulse);
                }
                Effect::EdgeSuppressed { ts_ms } => {
                    Counters::bump(&self.counters.edges_suppressed);
                    debug!(ts_ms, "edge inside cooldown suppressed");
                }
                Effect::SampleRejected { ts_ms } => {
                    Counters::bump(&self.counters.samples_rejected);
                    debug!(ts_ms, "non-finite or negative magnitude dropped");
                }
                Effect::Completed(event) => {
                    Counters::bump(&self.counters.completions);
                    info!(ts_ms = event.ts_ms, pulses = event.pulses, "sequence completed");
                    self.feedback.on_completed(&event);
                    self.status.notify_completed(event);
                }
                Effect::Status(phase) => {
                    if phase == Phase::Timeout {
                        Counters::bump(&self.counters.timeouts);
                        info!("pairing window elapsed; listening");
                    }
                    annotate_phase(&self.span, &phase.to_string());
                    self.status.publish(phase);
                }
                Effect::ScheduleTimeout {
                    deadline_ms,
                    generation,
                } => {
                    let at = self.epoch + Duration::from_millis(deadline_ms);
                    self.timer.schedule(at, generation, self.weak_tx.clone());
                }
                Effect::CancelTimeout => self.timer.cancel(),
                Effect::StopSampling => self.detach(),
            }
        }
    }

    /// Whole milliseconds since the session epoch, truncated. Cooldown and
    /// pairing window are measured on these stamps, so real spacing can be
    /// up to 1 ms shorter than the configured value.
    fn stamp(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn detach(&mut self) {
        if self.subscribed {
            self.source.unsubscribe();
            self.subscribed = false;
        }
    }

    fn snapshot(&self) -> RuntimeSnapshot {
        RuntimeSnapshot {
            phase: self.machine.phase(),
            detector: self.machine.detector_state(),
            sequence: self.machine.sequence_state(),
            timer_pending: self.timer.is_pending(),
            subscribed: self.subscribed,
        }
    }

    fn teardown(&mut self) {
        self.timer.cancel();
        self.detach();
        if self.machine.is_running() {
            self.feedback.on_session_stop();
        }
    }
}
