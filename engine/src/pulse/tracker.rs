//! Groups accepted pulses into one sequence counting toward a target.
//!
//! The tracker only keeps the deadline as data; arming the real timer is
//! the caller's job. A pulse that arrives after the deadline (because the
//! timer has not been delivered yet) starts a fresh sequence, so the
//! outcome does not depend on timer delivery latency.

use impulse_core::{CompletionEvent, DetectorConfig, PulseEvent, WindowMode};

use super::Pulse;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SequenceState {
    /// Invariant: `0 <= count <= target_count`.
    pub count: u32,
    pub window_deadline: Option<u64>,
}

/// Result of feeding one pulse into the tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tracked {
    /// The pulse with its 1-based ordinal in the sequence.
    pub pulse: PulseEvent,

    /// The previous sequence had already expired when this pulse arrived.
    pub restarted: bool,

    /// New deadline to arm, when it moved.
    pub reschedule: Option<u64>,

    pub completion: Option<CompletionEvent>,
}

pub struct SequenceTracker {
    target_count: u32,
    pairing_window_ms: u64,
    window_mode: WindowMode,
    state: SequenceState,
}

impl SequenceTracker {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            target_count: config.target_count.max(1),
            pairing_window_ms: config.pairing_window_ms,
            window_mode: config.window_mode,
            state: SequenceState::default(),
        }
    }

    pub fn state(&self) -> SequenceState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = SequenceState::default();
    }

    /// Timer callback: abandons an in-progress sequence.
    ///
    /// Returns `true` if a sequence was actually reset.
    pub fn expire(&mut self) -> bool {
        if self.state.count == 0 {
            return false;
        }
        self.reset();
        true
    }

    fn deadline_from(&self, ts_ms: u64) -> u64 {
        ts_ms.saturating_add(self.pairing_window_ms)
    }
}

impl Pulse for SequenceTracker {
    type Input = PulseEvent;
    type Output = Tracked;

    fn evaluate(&mut self, pulse: PulseEvent) -> Tracked {
        let now = pulse.ts_ms;
        let expired = self
            .state
            .window_deadline
            .is_some_and(|deadline| now > deadline);
        let restarted = self.state.count > 0 && expired;

        let reschedule = if self.state.count == 0 || expired {
            let deadline = self.deadline_from(now);
            self.state = SequenceState {
                count: 1,
                window_deadline: Some(deadline),
            };
            Some(deadline)
        } else {
            self.state.count += 1;
            match self.window_mode {
                WindowMode::Sliding => {
                    let deadline = self.deadline_from(now);
                    self.state.window_deadline = Some(deadline);
                    Some(deadline)
                }
                WindowMode::Anchored => None,
            }
        };

        let pulse = PulseEvent {
            ts_ms: now,
            ordinal: self.state.count,
        };

        if self.state.count >= self.target_count {
            let completion = CompletionEvent {
                ts_ms: now,
                pulses: self.state.count,
            };
            self.reset();
            return Tracked {
                pulse,
                restarted,
                reschedule: None,
                completion: Some(completion),
            };
        }

        Tracked {
            pulse,
            restarted,
            reschedule,
            completion: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(target_count: u32, window_mode: WindowMode) -> SequenceTracker {
        SequenceTracker::new(&DetectorConfig {
            target_count,
            window_mode,
            ..DetectorConfig::default()
        })
    }

    fn pulse(ts_ms: u64) -> PulseEvent {
        PulseEvent { ts_ms, ordinal: 0 }
    }

    #[test]
    fn four_pulses_inside_window_complete_once() {
        let mut t = tracker(4, WindowMode::Sliding);

        let outs: Vec<Tracked> = [0, 300, 600, 900]
            .into_iter()
            .map(|ts| t.evaluate(pulse(ts)))
            .collect();

        let ordinals: Vec<u32> = outs.iter().map(|o| o.pulse.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4]);

        let completions: Vec<_> = outs.iter().filter_map(|o| o.completion).collect();
        assert_eq!(
            completions,
            vec![CompletionEvent {
                ts_ms: 900,
                pulses: 4
            }]
        );
        assert_eq!(t.state(), SequenceState::default());
        assert_eq!(outs[3].reschedule, None);
    }

    #[test]
    fn late_pulse_starts_fresh_sequence() {
        let mut t = tracker(4, WindowMode::Sliding);

        t.evaluate(pulse(0));
        let out = t.evaluate(pulse(1_500));

        assert!(out.restarted);
        assert_eq!(out.pulse.ordinal, 1);
        assert_eq!(t.state().count, 1);
        assert_eq!(t.state().window_deadline, Some(2_500));
    }

    #[test]
    fn pulse_exactly_at_deadline_still_pairs() {
        let mut t = tracker(2, WindowMode::Sliding);

        t.evaluate(pulse(0));
        let out = t.evaluate(pulse(1_000));

        assert!(!out.restarted);
        assert!(out.completion.is_some());
    }

    #[test]
    fn sliding_window_moves_with_each_pulse() {
        let mut t = tracker(4, WindowMode::Sliding);

        assert_eq!(t.evaluate(pulse(0)).reschedule, Some(1_000));
        assert_eq!(t.evaluate(pulse(900)).reschedule, Some(1_900));
        // Would be outside an anchored window, inside the slid one.
        let out = t.evaluate(pulse(1_800));
        assert_eq!(out.pulse.ordinal, 3);
        assert!(!out.restarted);
    }

    #[test]
    fn anchored_window_keeps_first_deadline() {
        let mut t = tracker(4, WindowMode::Anchored);

        assert_eq!(t.evaluate(pulse(0)).reschedule, Some(1_000));
        assert_eq!(t.evaluate(pulse(900)).reschedule, None);
        assert_eq!(t.state().window_deadline, Some(1_000));

        let out = t.evaluate(pulse(1_800));
        assert!(out.restarted);
        assert_eq!(out.pulse.ordinal, 1);
    }

    #[test]
    fn expire_resets_only_in_progress_sequences() {
        let mut t = tracker(4, WindowMode::Sliding);
        assert!(!t.expire());

        t.evaluate(pulse(0));
        assert!(t.expire());
        assert_eq!(t.state(), SequenceState::default());
    }

    #[test]
    fn target_of_one_completes_immediately() {
        let mut t = tracker(1, WindowMode::Sliding);
        let out = t.evaluate(pulse(42));
        assert_eq!(out.pulse.ordinal, 1);
        assert_eq!(out.reschedule, None);
        assert!(out.completion.is_some());
    }
}
