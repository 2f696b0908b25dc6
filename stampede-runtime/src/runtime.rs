//! Command-line runtime
//!
//! Resolves a run from a built-in profile or a config file, applies command-line overrides and
//! drives it to completion.
use crate::cli::StampedeCli;
use crate::config_file;
use crate::error::RuntimeError;
use crate::profiles::Profile;
use clap::Parser;
use stampede::LoadTest;
use stampede_core::{RunConfig, RunStatistics};
use std::path::{Path, PathBuf};
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, instrument, warn};

/// Exit code when the run completed but at least one threshold failed.
pub const THRESHOLDS_FAILED_EXIT_CODE: u8 = 99;

#[derive(Debug, Clone, PartialEq)]
enum Source {
    Profile(Profile),
    File(PathBuf),
}

/// Stampede command-line runtime.
///
/// # Example
///
/// ```no_run
/// use stampede_runtime::StampedeRuntime;
///
/// #[tokio::main]
/// async fn main() {
///     let stats = StampedeRuntime::new()
///         .with_args()
///         .run()
///         .await
///         .unwrap();
///     println!("{stats}");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct StampedeRuntime {
    source: Source,
    base_url: Option<String>,
    seed: Option<u64>,
    poll_interval: Option<Duration>,
    graceful_stop: Option<Duration>,
    verbosity: u8,
}

impl Default for StampedeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl StampedeRuntime {
    pub fn new() -> Self {
        Self {
            source: Source::Profile(Profile::Load),
            base_url: None,
            seed: None,
            poll_interval: None,
            graceful_stop: None,
            verbosity: 0,
        }
    }

    /// Use the default CLI arguments for Stampede.
    ///
    /// `-p`, `--profile` to pick a built-in profile (`load`, `spike`, `stress`)
    ///
    /// `-c`, `--config` to run a JSON run definition instead
    ///
    /// `-b`, `--base-url` to set the target (also read from `BASE_URL`)
    ///
    /// # Example
    /// ```ignore
    /// $ stampede --profile spike --base-url http://10.0.0.5:8000
    /// $ stampede --config smoke.json --seed 42 -v
    /// ```
    pub fn with_args(self) -> Self {
        self.with_cli(StampedeCli::parse())
    }

    pub fn with_cli(mut self, cli: StampedeCli) -> Self {
        self.source = match (cli.config, cli.profile) {
            (Some(path), _) => Source::File(path),
            (None, Some(profile)) => Source::Profile(profile),
            (None, None) => Source::Profile(Profile::Load),
        };
        self.base_url = cli.base_url;
        self.seed = cli.seed;
        self.poll_interval = cli.poll_interval;
        self.graceful_stop = cli.graceful_stop;
        self.verbosity = cli.verbose;
        self
    }

    pub fn profile(mut self, profile: Profile) -> Self {
        self.source = Source::Profile(profile);
        self
    }

    pub fn config_file(mut self, path: &Path) -> Self {
        self.source = Source::File(path.to_path_buf());
        self
    }

    pub fn base_url(mut self, url: &str) -> Self {
        self.base_url = Some(url.to_string());
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn graceful_stop(mut self, timeout: Duration) -> Self {
        self.graceful_stop = Some(timeout);
        self
    }

    /// Number of `-v` flags given on the command line.
    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    /// The run that [`StampedeRuntime::run`] would execute.
    pub fn resolve(&self) -> Result<RunConfig, RuntimeError> {
        let mut config = match &self.source {
            Source::Profile(profile) => profile.config()?,
            Source::File(path) => config_file::load(path)?,
        };

        if let Some(url) = &self.base_url {
            config.set_base_url(url)?;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(interval) = self.poll_interval {
            config.poll_interval = interval;
        }
        if let Some(timeout) = self.graceful_stop {
            config.graceful_stop = timeout;
        }

        config.validate()?;
        Ok(config)
    }

    #[instrument(name = "stampede", skip_all)]
    pub async fn run(self) -> Result<RunStatistics, RuntimeError> {
        let config = self.resolve()?;
        info!("Resolved run {} against {}", config.name, config.base_url);
        Ok(LoadTest::new(config).await?)
    }
}
