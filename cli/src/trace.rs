//! Sample traces for the replay source.

use std::path::Path;

use anyhow::{Context, bail};
use impulse_core::MagnitudeSample;
use impulse_engine::source::NOMINAL_SAMPLE_INTERVAL;

/// Baseline magnitude between bursts.
const REST: f64 = 0.05;
/// How long a synthetic burst stays above baseline.
const BURST_MS: u64 = 30;

/// Reads a CSV trace.
///
/// Rows are `ts_ms,magnitude` or `ts_ms,x,y,z`. Blank lines, `#` comments
/// and a non-numeric header row are skipped. Timestamps must not go
/// backwards.
pub fn load_csv(path: &Path) -> anyhow::Result<Vec<MagnitudeSample>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading trace {}", path.display()))?;
    parse_csv(&raw).with_context(|| format!("parsing trace {}", path.display()))
}

pub fn parse_csv(raw: &str) -> anyhow::Result<Vec<MagnitudeSample>> {
    let mut samples: Vec<MagnitudeSample> = Vec::new();

    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let Ok(ts_ms) = fields[0].parse::<u64>() else {
            if idx == 0 {
                continue;
            }
            bail!("line {}: bad timestamp {:?}", idx + 1, fields[0]);
        };

        let values = fields[1..]
            .iter()
            .map(|f| f.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("line {}: bad number", idx + 1))?;

        let sample = match values.as_slice() {
            [m] => MagnitudeSample::new(ts_ms, *m),
            [x, y, z] => MagnitudeSample::from_axes(ts_ms, *x, *y, *z),
            other => bail!(
                "line {}: expected 1 or 3 values after the timestamp, got {}",
                idx + 1,
                other.len()
            ),
        };

        if let Some(prev) = samples.last() {
            if sample.ts_ms < prev.ts_ms {
                bail!("line {}: timestamp {} goes backwards", idx + 1, sample.ts_ms);
            }
        }
        samples.push(sample);
    }

    if samples.is_empty() {
        bail!("trace has no samples");
    }
    Ok(samples)
}

/// Evenly spaced bursts sampled at the nominal device rate, followed by
/// one second of rest.
pub fn synthesize(bursts: u32, gap_ms: u64, peak: f64) -> Vec<MagnitudeSample> {
    let step = NOMINAL_SAMPLE_INTERVAL.as_millis() as u64;
    let end = gap_ms * u64::from(bursts) + 1_000;

    (0..=end)
        .step_by(step as usize)
        .map(|ts_ms| {
            let in_burst = gap_ms > 0
                && ts_ms / gap_ms < u64::from(bursts)
                && ts_ms % gap_ms < BURST_MS;
            MagnitudeSample::new(ts_ms, if in_burst { peak } else { REST })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_row_shapes_and_skips_header() {
        let raw = "ts_ms,magnitude\n0,0.1\n# spike\n10,3,4,0\n\n20,0.2\n";
        let samples = parse_csv(raw).unwrap();

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[1].ts_ms, 10);
        assert!((samples[1].magnitude - 5.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_malformed_rows() {
        assert!(parse_csv("0,0.1\n10,abc\n").is_err());
        assert!(parse_csv("0,0.1,0.2\n").is_err());
        assert!(parse_csv("10,0.1\n5,0.1\n").is_err());
        assert!(parse_csv("ts,m\n").is_err());
    }

    #[test]
    fn synthetic_trace_has_one_onset_per_burst() {
        let samples = synthesize(4, 300, 2.0);

        let onsets = samples
            .windows(2)
            .filter(|w| w[0].magnitude < 1.0 && w[1].magnitude > 1.0)
            .count()
            + usize::from(samples[0].magnitude > 1.0);
        assert_eq!(onsets, 4);
        assert_eq!(samples.last().unwrap().ts_ms, 2_200);
    }
}
