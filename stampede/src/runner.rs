use crate::context::RunContext;
use crate::error::TransportError;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use stampede_core::{Sample, TRANSPORT_FAILURE_STATUS};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Issues a plain GET and reports the response status.
///
/// The production implementation is [`HttpTransport`]; tests substitute their own.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    async fn get(&self, url: &str) -> Result<u16, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<u16, TransportError> {
        let res = self.client.get(url).send().await?;
        let status = res.status().as_u16();
        // NOTE: The body is drained so the connection can be reused and the measured duration
        // covers the whole response.
        res.bytes().await?;
        Ok(status)
    }
}

/// One iteration of a virtual user: pick an endpoint, request it, time it, check it.
pub struct RequestRunner<T> {
    ctx: Arc<RunContext>,
    transport: T,
    transport_failures: AtomicU64,
}

impl<T> RequestRunner<T>
where
    T: Transport + Sync,
{
    pub fn new(ctx: Arc<RunContext>, transport: T) -> Self {
        Self {
            ctx,
            transport,
            transport_failures: AtomicU64::new(0),
        }
    }

    pub fn context(&self) -> &Arc<RunContext> {
        &self.ctx
    }

    pub async fn iterate(&self, rng: &mut SmallRng) {
        let config = &self.ctx.config;
        let Some(endpoint) = config.endpoints.choose(rng) else {
            error!("No endpoints configured; skipping iteration.");
            return;
        };
        let url = format!("{}{}", config.base_url, endpoint);

        let timestamp = SystemTime::now();
        let start = Instant::now();
        let status = match Transport::get(&self.transport, &url).await {
            Ok(status) => status,
            Err(err) => {
                self.transport_failed(&url, &err);
                TRANSPORT_FAILURE_STATUS
            }
        };
        let elapsed = start.elapsed();
        trace!("GET {url} -> {status} in {elapsed:?}");

        let sample = self
            .ctx
            .checks
            .evaluate(Sample::new(timestamp, endpoint, status, elapsed));

        #[cfg(feature = "metrics")]
        record_metrics(&sample, elapsed);

        self.ctx.aggregator.record(sample);
    }

    /// Warns on the 1st, 2nd, 4th, 8th... failure so a dead target is visible without flooding
    /// the log. The others are logged at debug.
    fn transport_failed(&self, url: &str, err: &TransportError) {
        let n = self.transport_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if n.is_power_of_two() {
            warn!("GET {url} failed ({n} transport failures so far): {err}");
        } else {
            debug!("GET {url} failed: {err}");
        }
    }

    /// When a worker that finished an iteration at `finished` should start the next one.
    pub fn next_wake(&self, finished: Instant) -> Instant {
        finished + self.ctx.config.sleep
    }
}

/// Failures are counted the same way as `http_req_failed`: bad status or any failed check.
#[cfg(feature = "metrics")]
fn record_metrics(sample: &Sample, elapsed: Duration) {
    let endpoint = sample.endpoint.clone();
    metrics::histogram!("stampede_http_req_duration", "endpoint" => endpoint.clone())
        .record(elapsed.as_secs_f64() * 1e3);
    metrics::counter!("stampede_http_reqs", "endpoint" => endpoint.clone()).increment(1);
    if sample.failed() {
        metrics::counter!("stampede_http_req_failed", "endpoint" => endpoint).increment(1);
    }
}
