//! Pure transition function for one detection session.
//!
//! `Machine` combines the [`PulseDetector`] and [`SequenceTracker`] and
//! turns every input (a sample, a timer firing, a lifecycle call) into a
//! list of [`Effect`]s. It never touches time, tasks or hardware; the
//! runtime applies the effects in order.

use impulse_core::{CompletionEvent, DetectorConfig, MagnitudeSample, Phase, PulseEvent};

use crate::pulse::{
    DetectorState, Edge, Pulse, PulseDetector, SequenceState, SequenceTracker, Tracked,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Input {
    Sample(MagnitudeSample),

    /// The pairing-window timer armed with `generation` fired.
    Timeout { generation: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Accepted pulse with its ordinal in the sequence.
    Pulse(PulseEvent),

    /// Rising edge swallowed by the cooldown.
    EdgeSuppressed { ts_ms: u64 },

    /// Non-finite or negative magnitude dropped before detection.
    SampleRejected { ts_ms: u64 },

    Completed(CompletionEvent),

    Status(Phase),

    /// Arm (or replace) the pairing-window timer.
    ScheduleTimeout { deadline_ms: u64, generation: u64 },

    CancelTimeout,

    /// Detach from the sample source.
    StopSampling,
}

pub struct Machine {
    config: DetectorConfig,
    detector: PulseDetector,
    tracker: SequenceTracker,
    /// Between `start()` and `stop()`, including after completion.
    running: bool,
    /// Identifies the only timer whose firing is still meaningful.
    timer_generation: u64,
    phase: Phase,
}

impl Machine {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            detector: PulseDetector::new(&config),
            tracker: SequenceTracker::new(&config),
            config,
            running: false,
            timer_generation: 0,
            phase: Phase::Idle,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn detector_state(&self) -> DetectorState {
        self.detector.state()
    }

    pub fn sequence_state(&self) -> SequenceState {
        self.tracker.state()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Starts (or restarts) a session with fresh detector and sequence state.
    ///
    /// Any timer armed by a previous session is invalidated.
    pub fn start(&mut self) -> Vec<Effect> {
        self.detector.activate();
        self.tracker.reset();
        self.timer_generation += 1;
        self.running = true;

        vec![Effect::CancelTimeout, self.transition(Phase::Listening)]
    }

    /// Ends the session. Idempotent: a second call, or a call before any
    /// `start()`, produces no effects.
    pub fn stop(&mut self) -> Vec<Effect> {
        if !self.running {
            return Vec::new();
        }

        self.running = false;
        self.detector.deactivate();
        self.tracker.reset();
        self.timer_generation += 1;

        vec![
            Effect::CancelTimeout,
            Effect::StopSampling,
            self.transition(Phase::Paused),
        ]
    }

    /// No motion capability: stay inert and report it.
    pub fn mark_unavailable(&mut self) -> Vec<Effect> {
        self.running = false;
        self.detector.deactivate();
        self.tracker.reset();
        self.timer_generation += 1;

        vec![Effect::CancelTimeout, self.transition(Phase::Unavailable)]
    }

    pub fn step(&mut self, input: Input) -> Vec<Effect> {
        match input {
            Input::Sample(sample) => self.on_sample(sample),
            Input::Timeout { generation } => self.on_timeout(generation),
        }
    }

    fn on_sample(&mut self, sample: MagnitudeSample) -> Vec<Effect> {
        if !self.detector.is_active() {
            return Vec::new();
        }

        if !sample.is_valid() {
            return vec![Effect::SampleRejected {
                ts_ms: sample.ts_ms,
            }];
        }

        match self.detector.evaluate(sample) {
            Edge::None => Vec::new(),
            Edge::Suppressed { ts_ms } => vec![Effect::EdgeSuppressed { ts_ms }],
            Edge::Pulse(pulse) => {
                let tracked = self.tracker.evaluate(pulse);
                self.on_pulse(tracked)
            }
        }
    }

    fn on_pulse(&mut self, tracked: Tracked) -> Vec<Effect> {
        let Tracked {
            pulse,
            restarted,
            reschedule,
            completion,
        } = tracked;

        if restarted {
            tracing::debug!(ts_ms = pulse.ts_ms, "previous sequence expired before timer delivery");
        }

        let mut effects = vec![
            Effect::Pulse(pulse),
            self.transition(Phase::Counted(pulse.ordinal)),
        ];

        if let Some(completion) = completion {
            // Detection ends here until an explicit restart.
            self.detector.deactivate();
            self.timer_generation += 1;
            effects.extend([
                Effect::CancelTimeout,
                Effect::Completed(completion),
                self.transition(Phase::Completed),
                Effect::StopSampling,
            ]);
            return effects;
        }

        if let Some(deadline_ms) = reschedule {
            self.timer_generation += 1;
            effects.push(Effect::ScheduleTimeout {
                deadline_ms,
                generation: self.timer_generation,
            });
        }

        effects
    }

    fn on_timeout(&mut self, generation: u64) -> Vec<Effect> {
        if !self.detector.is_active() || generation != self.timer_generation {
            return Vec::new();
        }

        if self.tracker.expire() {
            vec![self.transition(Phase::Timeout)]
        } else {
            Vec::new()
        }
    }

    fn transition(&mut self, phase: Phase) -> Effect {
        self.phase = phase;
        Effect::Status(phase)
    }
}
