//! Load test future and run loop
use crate::aggregator::{check_tallies, evaluate, trend_summary};
use crate::checks::CheckEvaluator;
use crate::context::RunContext;
use crate::error::RunError;
use crate::pool::VirtualUserPool;
use crate::progress::Progress;
use crate::runner::{HttpTransport, RequestRunner, Transport};
use crate::scheduler::StageScheduler;
use crate::timer::Timer;
use stampede_core::{
    CheckSpec, ConfigError, RunConfig, RunStatistics, Sample, Stage, Threshold, DEFAULT_ENDPOINT,
};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::{sleep_until, Instant};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

type TransportFactory<T> = Box<dyn FnOnce(&RunConfig) -> Result<T, RunError> + Send>;
type RunnerFuture = Pin<Box<dyn Future<Output = Result<RunStatistics, RunError>> + Send>>;

/// A staged load test.
///
/// Built with [`load_test`] or [`LoadTest::new`] and configured through [`ConfigurableLoadTest`].
/// Nothing runs until the value is awaited. Configuration errors from the builder methods are
/// reported when awaited, before any request is sent.
#[pin_project::pin_project]
pub struct LoadTest<T = HttpTransport> {
    config: RunConfig,
    checks: CheckEvaluator,
    make_transport: Option<TransportFactory<T>>,
    error: Option<ConfigError>,
    custom_endpoints: bool,
    runner_fut: Option<RunnerFuture>,
}

/// Starts building a load test against the default base URL.
pub fn load_test(name: &str) -> LoadTest {
    LoadTest::new(RunConfig::new(name))
}

impl LoadTest<HttpTransport> {
    pub fn new(config: RunConfig) -> Self {
        Self::with_factory(
            config,
            Box::new(|config: &RunConfig| -> Result<HttpTransport, RunError> {
                Ok(HttpTransport::new(config.request_timeout)?)
            }),
        )
    }
}

impl<T> LoadTest<T>
where
    T: Send + 'static,
{
    /// Runs against a caller-supplied transport instead of the HTTP client.
    pub fn with_transport(config: RunConfig, transport: T) -> Self {
        Self::with_factory(config, Box::new(move |_: &RunConfig| Ok(transport)))
    }

    fn with_factory(config: RunConfig, make_transport: TransportFactory<T>) -> Self {
        // Endpoints set on the config are kept; only the bare default is replaced by `endpoint`.
        let custom_endpoints = config.endpoints != [DEFAULT_ENDPOINT];
        Self {
            config,
            checks: CheckEvaluator::new(),
            make_transport: Some(make_transport),
            error: None,
            custom_endpoints,
            runner_fut: None,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    fn defer(&mut self, res: Result<(), ConfigError>) {
        if let Err(err) = res {
            if self.error.is_none() {
                self.error = Some(err);
            }
        }
    }
}

impl<T> Future for LoadTest<T>
where
    T: Transport + Sync + 'static,
{
    type Output = Result<RunStatistics, RunError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.runner_fut.is_none() {
            let fut: RunnerFuture = match (self.error.take(), self.make_transport.take()) {
                (Some(err), _) => Box::pin(async move { Err(err.into()) }),
                (None, Some(make_transport)) => {
                    let config = self.config.clone();
                    let checks = std::mem::take(&mut self.checks);
                    Box::pin(async move { run_load_test(config, checks, make_transport).await })
                }
                (None, None) => unreachable!(),
            };
            self.runner_fut = Some(fut);
        }

        if let Some(runner) = &mut self.runner_fut {
            runner.as_mut().poll(cx)
        } else {
            unreachable!()
        }
    }
}

pub trait ConfigurableLoadTest: Future<Output = Result<RunStatistics, RunError>> + Sized + Send {
    fn stage(self, duration: Duration, target: usize) -> Self;
    fn threshold(self, selector: &str, rule: &str) -> Self;
    fn endpoint(self, path: &str) -> Self;
    fn sleep(self, sleep: Duration) -> Self;
    fn check(self, spec: &str) -> Self;
    fn check_with<F>(self, name: &str, predicate: F) -> Self
    where
        F: Fn(&Sample) -> bool + Send + Sync + 'static;
    fn base_url(self, url: &str) -> Self;
    fn start_vus(self, vus: usize) -> Self;
    fn poll_interval(self, interval: Duration) -> Self;
    fn graceful_stop(self, timeout: Duration) -> Self;
    fn request_timeout(self, timeout: Duration) -> Self;
    fn seed(self, seed: u64) -> Self;
}

impl<T> ConfigurableLoadTest for LoadTest<T>
where
    T: Transport + Sync + 'static,
{
    /// Append a stage ramping linearly to `target` virtual users over `duration`.
    ///
    /// # Example
    /// ```no_run
    /// use stampede::prelude::*;
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let stats = load_test("ramp")
    ///         .stage(Duration::from_secs(60), 50)
    ///         .stage(Duration::from_secs(300), 50)
    ///         .stage(Duration::from_secs(60), 0)
    ///         .await
    ///         .unwrap();
    ///     println!("{stats}");
    /// }
    /// ```
    fn stage(mut self, duration: Duration, target: usize) -> Self {
        self.config.stages.push(Stage::new(duration, target));
        self
    }

    /// Add a pass/fail rule evaluated once the run finishes.
    ///
    /// # Example
    /// ```no_run
    /// use stampede::prelude::*;
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let stats = load_test("thresholds")
    ///         .stage(Duration::from_secs(30), 10)
    ///         .threshold("http_req_duration", "p(95)<500")
    ///         .threshold("http_req_failed", "rate<0.05")
    ///         .await
    ///         .unwrap();
    ///     assert!(stats.passed());
    /// }
    /// ```
    fn threshold(mut self, selector: &str, rule: &str) -> Self {
        let res = Threshold::parse(selector, rule).map(|t| self.config.thresholds.push(t));
        self.defer(res);
        self
    }

    /// Add a path to the endpoint set. The first call replaces the default `/`; endpoints already
    /// on the [`RunConfig`] are extended.
    fn endpoint(mut self, path: &str) -> Self {
        if !self.custom_endpoints {
            self.config.endpoints.clear();
            self.custom_endpoints = true;
        }
        self.config.endpoints.push(path.to_string());
        self
    }

    /// Pause between iterations of each virtual user.
    fn sleep(mut self, sleep: Duration) -> Self {
        self.config.sleep = sleep;
        self
    }

    /// Add a built-in check, e.g. `status is 200` or `response time < 500ms`.
    fn check(mut self, spec: &str) -> Self {
        let res = spec
            .parse::<CheckSpec>()
            .map(|spec| self.config.checks.push(spec));
        self.defer(res);
        self
    }

    /// Add a named check backed by an arbitrary predicate.
    ///
    /// # Example
    /// ```no_run
    /// use stampede::prelude::*;
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     load_test("custom")
    ///         .stage(Duration::from_secs(10), 1)
    ///         .check_with("not a server error", |s| s.status < 500)
    ///         .await
    ///         .unwrap();
    /// }
    /// ```
    fn check_with<F>(mut self, name: &str, predicate: F) -> Self
    where
        F: Fn(&Sample) -> bool + Send + Sync + 'static,
    {
        self.checks.add(name, predicate);
        self
    }

    fn base_url(mut self, url: &str) -> Self {
        let res = self.config.set_base_url(url);
        self.defer(res);
        self
    }

    /// Virtual users alive when the first stage starts.
    fn start_vus(mut self, vus: usize) -> Self {
        self.config.start_vus = vus;
        self
    }

    fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// How long retiring workers get to finish their in-flight request at the end of the run.
    fn graceful_stop(mut self, timeout: Duration) -> Self {
        self.config.graceful_stop = timeout;
        self
    }

    fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }
}

#[instrument(name = "load_test", skip_all, fields(name = config.name, run_id = tracing::field::Empty))]
pub(crate) async fn run_load_test<T>(
    config: RunConfig,
    custom_checks: CheckEvaluator,
    make_transport: TransportFactory<T>,
) -> Result<RunStatistics, RunError>
where
    T: Transport + Sync + 'static,
{
    config.validate()?;
    let scheduler = StageScheduler::new(&config.stages, config.start_vus)?;
    let start = Instant::now();
    let end = start
        .checked_add(scheduler.total_duration())
        .ok_or(ConfigError::ScheduleTooLong)?;
    let transport = make_transport(&config)?;

    let mut checks = CheckEvaluator::from_specs(&config.checks);
    checks.extend(custom_checks);

    let ctx = Arc::new(RunContext::new(config, checks));
    tracing::Span::current().record("run_id", tracing::field::display(ctx.run_id));
    info!(
        "Running {} for {} against {} ({} stages, {} thresholds, max {} VUs)",
        ctx.config.name,
        humantime::format_duration(scheduler.total_duration()),
        ctx.config.base_url,
        ctx.config.stages.len(),
        ctx.config.thresholds.len(),
        ctx.config.max_target(),
    );

    let runner = Arc::new(RequestRunner::new(ctx.clone(), transport));
    let mut pool = VirtualUserPool::new(runner);
    let mut progress = Progress::new();
    let mut timer = Timer::new(ctx.config.poll_interval).await;
    debug!("Polling every {timer}");

    let mut stage = None;

    // NOTE: A tick never sleeps past the end of the schedule, so the run stops on time even with
    // a long poll interval.
    loop {
        let elapsed = start.elapsed();
        if scheduler.is_finished(elapsed) {
            break;
        }

        let current = scheduler.stage_at(elapsed);
        if current != stage {
            if let Some(idx) = current {
                let s = &ctx.config.stages[idx];
                info!(
                    "Stage {}/{}: {} to {} VUs",
                    idx + 1,
                    ctx.config.stages.len(),
                    humantime::format_duration(s.duration),
                    s.target
                );
            }
            stage = current;
        }

        let target = scheduler.target_at(elapsed);
        ctx.set_target(target);
        pool.reconcile(target);

        tokio::select! {
            since_last = timer.tick() => progress.report(start.elapsed(), since_last, &ctx),
            _ = sleep_until(end) => {}
        }
    }

    ctx.set_target(0);
    pool.shutdown(ctx.config.graceful_stop).await;
    let elapsed = start.elapsed();

    info!("Load test complete");

    let samples = ctx.aggregator.samples();
    let transport_failures = samples.iter().filter(|s| s.is_transport_failure()).count() as u64;
    if transport_failures > 0 {
        warn!(
            "{transport_failures} of {} requests got no response from {}",
            samples.len(),
            ctx.config.base_url
        );
    }

    let verdicts = evaluate(&samples, &ctx.config.thresholds);
    for verdict in &verdicts {
        if verdict.passed {
            info!("{verdict}");
        } else {
            warn!("{verdict}");
        }
    }

    Ok(RunStatistics {
        name: ctx.config.name.clone(),
        elapsed,
        requests: samples.len() as u64,
        failed_requests: samples.iter().filter(|s| s.failed()).count() as u64,
        transport_failures,
        iterations: ctx.iterations(),
        peak_vus: ctx.peak_vus(),
        checks: check_tallies(&samples, ctx.checks.names()),
        duration: trend_summary(&samples),
        verdicts,
    })
}
