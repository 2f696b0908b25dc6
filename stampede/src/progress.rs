use crate::context::RunContext;
use pdatastructs::tdigest::{TDigest, K1};
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Periodic live-progress line. Durations seen since the last report are folded into a
/// running t-digest so the reported p95 is cheap to compute mid-run; final verdicts use the
/// exact samples instead.
pub(crate) struct Progress {
    digest: TDigest<K1>,
    seen: usize,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            digest: TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE),
            seen: 0,
        }
    }

    /// Logs one progress line. `since_last` is the gap since the previous report and gives the
    /// request rate.
    pub fn report(&mut self, elapsed: Duration, since_last: Duration, ctx: &RunContext) {
        let mut fresh = 0;
        ctx.aggregator.drain_recent(|durations| {
            fresh += durations.len();
            for d in durations {
                self.digest.insert(*d);
            }
        });
        self.seen += fresh;

        info!(
            "[{}] target={} vus={} reqs={} (+{}, {:.1}/s) p95~{}",
            humantime::format_duration(truncate_millis(elapsed)),
            ctx.target(),
            ctx.live_vus(),
            self.seen,
            fresh,
            rate(fresh, since_last),
            format_ms(self.p95()),
        );
    }

    /// Approximate p95 in milliseconds.
    pub fn p95(&self) -> Option<f64> {
        if self.seen == 0 {
            return None;
        }
        let ms = self.digest.quantile(0.95);

        // NOTE: TDigest can return NaN on degenerate inputs.
        if ms.is_finite() {
            Some(ms)
        } else {
            warn!("Non-finite p95 from the progress digest.");
            None
        }
    }
}

fn rate(count: usize, over: Duration) -> f64 {
    if over.is_zero() {
        0.
    } else {
        count as f64 / over.as_secs_f64()
    }
}

fn truncate_millis(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}

fn format_ms(ms: Option<f64>) -> String {
    match ms {
        Some(ms) => format!("{ms:.1}ms"),
        None => "-".to_string(),
    }
}
