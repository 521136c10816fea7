use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(name = "impulse", version, about = "Motion-impulse detector driven from recorded or synthetic traces")]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct CommonArgs {
    /// JSON config file; `IMPULSE_*` environment variables are used otherwise
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the number of pulses that complete a sequence
    #[clap(long, global = true)]
    pub target_count: Option<u32>,

    /// Emit one JSON object per log line
    #[clap(long, global = true)]
    pub json_logs: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay a `ts_ms,magnitude` (or `ts_ms,x,y,z`) CSV trace in real time
    Replay {
        #[clap(long)]
        file: PathBuf,
    },

    /// Feed a synthetic trace of evenly spaced bursts
    Simulate {
        #[clap(long, default_value = "4")]
        bursts: u32,

        /// Time between burst onsets
        #[clap(long, default_value = "300")]
        gap_ms: u64,

        /// Peak magnitude of each burst
        #[clap(long, default_value = "2.0")]
        peak: f64,
    },
}
