//! Rising-edge detector over the magnitude stream.
//!
//! An edge is accepted when the signal strictly exceeds `threshold` while
//! armed and outside the cooldown. Two guards apply independently:
//! - hysteresis: after an edge the detector stays disarmed until a sample
//!   falls below `low_threshold`
//! - cooldown: accepted pulses are at least `cooldown_ms` apart; an edge
//!   inside the cooldown is consumed, not retried

use impulse_core::{DetectorConfig, MagnitudeSample, PulseEvent};

use super::Pulse;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetectorState {
    /// A new rising edge may be accepted.
    pub armed: bool,
    pub cooldown_until: Option<u64>,
    pub active: bool,
}

impl Default for DetectorState {
    fn default() -> Self {
        Self {
            armed: true,
            cooldown_until: None,
            active: false,
        }
    }
}

/// Outcome of one sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    /// No rising edge (or the detector is inactive).
    None,

    /// Rising edge inside the cooldown; consumed without a pulse.
    Suppressed { ts_ms: u64 },

    /// Accepted edge. The ordinal is assigned downstream.
    Pulse(PulseEvent),
}

pub struct PulseDetector {
    threshold: f64,
    low_threshold: f64,
    cooldown_ms: u64,
    state: DetectorState,
}

impl PulseDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            threshold: config.threshold,
            low_threshold: config.low_threshold(),
            cooldown_ms: config.cooldown_ms,
            state: DetectorState::default(),
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    /// Fresh state, armed and accepting samples.
    pub fn activate(&mut self) {
        self.state = DetectorState {
            active: true,
            ..DetectorState::default()
        };
    }

    pub fn deactivate(&mut self) {
        self.state.active = false;
    }
}

impl Pulse for PulseDetector {
    type Input = MagnitudeSample;
    type Output = Edge;

    fn evaluate(&mut self, sample: MagnitudeSample) -> Edge {
        if !self.state.active {
            return Edge::None;
        }

        let MagnitudeSample { ts_ms, magnitude } = sample;

        // Back at baseline: re-arm.
        if magnitude < self.low_threshold {
            self.state.armed = true;
        }

        if !(self.state.armed && magnitude > self.threshold) {
            return Edge::None;
        }

        self.state.armed = false;

        if self.state.cooldown_until.is_some_and(|until| ts_ms < until) {
            return Edge::Suppressed { ts_ms };
        }

        self.state.cooldown_until = Some(ts_ms.saturating_add(self.cooldown_ms));
        Edge::Pulse(PulseEvent { ts_ms, ordinal: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> PulseDetector {
        let mut d = PulseDetector::new(&DetectorConfig::default());
        d.activate();
        d
    }

    fn run(d: &mut PulseDetector, samples: &[(u64, f64)]) -> Vec<Edge> {
        samples
            .iter()
            .map(|&(ts, m)| d.evaluate(MagnitudeSample::new(ts, m)))
            .collect()
    }

    fn pulses(edges: &[Edge]) -> Vec<u64> {
        edges
            .iter()
            .filter_map(|e| match e {
                Edge::Pulse(p) => Some(p.ts_ms),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn cooldown_suppresses_rearmed_edge() {
        let mut d = detector();
        let edges = run(&mut d, &[(0, 2.0), (50, 2.0), (100, 0.5), (200, 2.0)]);

        assert_eq!(pulses(&edges), vec![0, 200]);
        // 50 ms is still disarmed (no baseline in between), so it is not even an edge.
        assert_eq!(edges[1], Edge::None);
    }

    #[test]
    fn edge_inside_cooldown_is_consumed() {
        let mut d = detector();
        let edges = run(&mut d, &[(0, 2.0), (50, 0.1), (100, 2.0), (150, 2.0), (250, 2.0)]);

        assert_eq!(edges[2], Edge::Suppressed { ts_ms: 100 });
        // Still disarmed after the suppressed edge: no retry once the cooldown ends.
        assert_eq!(pulses(&edges), vec![0]);
        assert!(!d.state().armed);
    }

    #[test]
    fn exact_threshold_never_triggers() {
        let mut d = detector();
        let samples: Vec<(u64, f64)> = (0..100)
            .map(|i| (i * 10, if i % 2 == 0 { 0.0 } else { 1.4 }))
            .collect();

        assert!(pulses(&run(&mut d, &samples)).is_empty());
    }

    #[test]
    fn wobble_inside_hysteresis_band_fires_once() {
        let mut d = detector();
        // Oscillates between 1.0 and 1.6; never drops below 0.7.
        let samples: Vec<(u64, f64)> = (0..50)
            .map(|i| (i * 300, if i % 2 == 0 { 1.6 } else { 1.0 }))
            .collect();

        assert_eq!(pulses(&run(&mut d, &samples)), vec![0]);
    }

    #[test]
    fn inactive_detector_ignores_samples() {
        let mut d = PulseDetector::new(&DetectorConfig::default());
        assert_eq!(d.evaluate(MagnitudeSample::new(0, 5.0)), Edge::None);
        assert_eq!(d.state(), DetectorState::default());
    }

    #[test]
    fn activate_resets_arm_and_cooldown() {
        let mut d = detector();
        run(&mut d, &[(0, 2.0)]);
        assert!(!d.state().armed);
        assert_eq!(d.state().cooldown_until, Some(200));

        d.activate();
        assert_eq!(
            d.state(),
            DetectorState {
                armed: true,
                cooldown_until: None,
                active: true
            }
        );
    }
}
