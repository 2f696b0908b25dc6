use crate::profiles::Profile;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "stampede", version, about = "Stage-driven HTTP load generator")]
pub struct StampedeCli {
    /// Built-in profile to run (default `load`).
    #[arg(short, long, value_enum, conflicts_with = "config")]
    pub profile: Option<Profile>,

    /// JSON run definition.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Target base URL (default `http://localhost:8000`).
    #[arg(short, long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// Seed for endpoint selection.
    #[arg(long)]
    pub seed: Option<u64>,

    /// How often the virtual-user pool follows the schedule, e.g. `500ms`.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub poll_interval: Option<Duration>,

    /// Grace period for in-flight requests at the end of the run, e.g. `10s`.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub graceful_stop: Option<Duration>,

    /// Raise log verbosity (`-v` debug, `-vv` trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}
