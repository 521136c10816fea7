use impulse_core::{DetectorConfig, MagnitudeSample, WindowMode};
use impulse_engine::{Effect, Input, Machine};
use proptest::prelude::*;

/// Irregular 100 Hz-ish trace: each step is (gap_ms, magnitude).
fn trace() -> impl Strategy<Value = Vec<(u64, f64)>> {
    prop::collection::vec((1u64..40, 0.0f64..4.0), 1..400)
}

fn run(cfg: DetectorConfig, steps: &[(u64, f64)]) -> (Machine, Vec<Effect>) {
    let mut m = Machine::new(cfg);
    m.start();

    let mut ts = 0;
    let mut effects = Vec::new();
    for &(gap, magnitude) in steps {
        ts += gap;
        effects.extend(m.step(Input::Sample(MagnitudeSample::new(ts, magnitude))));
    }
    (m, effects)
}

fn pulse_times(effects: &[Effect]) -> Vec<u64> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Pulse(p) => Some(p.ts_ms),
            _ => None,
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn pulses_respect_cooldown(steps in trace(), cooldown_ms in 0u64..400) {
        let cfg = DetectorConfig {
            cooldown_ms,
            // Never complete, so every pulse in the trace is observed.
            target_count: u32::MAX,
            ..DetectorConfig::default()
        };
        let (_, effects) = run(cfg, &steps);

        for pair in pulse_times(&effects).windows(2) {
            prop_assert!(pair[1] > pair[0]);
            prop_assert!(pair[1] - pair[0] >= cooldown_ms);
        }
    }

    #[test]
    fn sub_threshold_signal_never_pulses(
        steps in prop::collection::vec((1u64..40, 0.0f64..=1.4), 1..400)
    ) {
        let (m, effects) = run(DetectorConfig::default(), &steps);

        prop_assert!(pulse_times(&effects).is_empty());
        prop_assert_eq!(m.sequence_state().count, 0);
    }

    #[test]
    fn count_stays_within_target(
        steps in trace(),
        target_count in 1u32..6,
        anchored in any::<bool>(),
    ) {
        let cfg = DetectorConfig {
            target_count,
            window_mode: if anchored { WindowMode::Anchored } else { WindowMode::Sliding },
            ..DetectorConfig::default()
        };
        let mut m = Machine::new(cfg);
        m.start();

        let mut ts = 0;
        let mut completions = 0;
        for (gap, magnitude) in steps {
            ts += gap;
            for e in m.step(Input::Sample(MagnitudeSample::new(ts, magnitude))) {
                match e {
                    Effect::Pulse(p) => prop_assert!(p.ordinal >= 1 && p.ordinal <= target_count),
                    Effect::Completed(c) => {
                        prop_assert_eq!(c.pulses, target_count);
                        completions += 1;
                    }
                    _ => {}
                }
            }
            prop_assert!(m.sequence_state().count <= target_count);
        }

        // Detection halts after the first completion.
        prop_assert!(completions <= 1);
    }
}
