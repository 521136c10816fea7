mod cli;
mod sinks;
mod trace;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use impulse_common::init_logger;
use impulse_core::{AppConfig, Phase};
use impulse_engine::{DetectorRuntime, FeedbackSinks, ReplaySource};
use tracing::{info, warn};

use cli::{Cli, Command, CommonArgs};
use sinks::{LogAudio, LogHaptics, LogObserver};

fn load_config(args: &CommonArgs) -> anyhow::Result<AppConfig> {
    let mut cfg = match &args.config {
        Some(path) => AppConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::from_env().context("reading IMPULSE_* environment")?,
    };

    if let Some(n) = args.target_count {
        cfg.detector.target_count = n;
    }
    cfg.validate().context("invalid configuration")?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger("impulse", cli.common.json_logs);

    let cfg = load_config(&cli.common)?;

    let samples = match cli.command {
        Command::Replay { file } => trace::load_csv(&file)?,
        Command::Simulate {
            bursts,
            gap_ms,
            peak,
        } => trace::synthesize(bursts, gap_ms, peak),
    };
    info!(samples = samples.len(), "trace loaded");

    let source = ReplaySource::new(samples);
    // A trailing sequence gets its full pairing window before we give up.
    let run_for = source.duration() + cfg.detector.pairing_window() + Duration::from_millis(50);
    let linger = Duration::from_millis(cfg.feedback.fallback_total_ms);

    let sinks = FeedbackSinks {
        audio: Arc::new(LogAudio),
        haptics: Arc::new(LogHaptics),
        observer: Some(Arc::new(LogObserver)),
    };
    let (runtime, handle) = DetectorRuntime::new(cfg, source, sinks)?;
    let runtime = tokio::spawn(runtime.run());

    let mut status = handle.watch_status();
    handle.start().await?;

    let completed = async {
        status.wait_for(|p| *p == Phase::Completed).await.is_ok()
    };

    tokio::select! {
        done = completed => {
            if done {
                // Let the completion feedback play out.
                tokio::time::sleep(linger).await;
            }
        }
        _ = tokio::time::sleep(run_for) => {
            info!(phase = %handle.phase(), "trace ended without completion");
        }
        res = tokio::signal::ctrl_c() => {
            res.context("waiting for ctrl-c")?;
            warn!("interrupted");
        }
    }

    handle.stop().await?;
    info!(counters = ?handle.counters().snapshot(), flashes = handle.flash_count(), "done");

    drop(handle);
    runtime.await.context("detector task panicked")?;
    Ok(())
}
