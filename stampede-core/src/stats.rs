use std::fmt;
use std::time::Duration;

/// Nearest-rank percentile of an ascending slice.
///
/// `rank = ceil(p / 100 * n)` clamped to `[1, n]`; the result is always one of the recorded
/// values, never an interpolation between two of them.
pub fn nearest_rank(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let n = sorted.len();
    let rank = (p * n as f64 / 100.).ceil() as usize;
    let rank = rank.clamp(1, n);
    Some(sorted[rank - 1])
}

/// Summary of the request-duration trend, in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendSummary {
    pub count: usize,
    pub avg: f64,
    pub min: f64,
    pub med: f64,
    pub max: f64,
    pub p90: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckTally {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

impl CheckTally {
    pub fn pass_rate(&self) -> f64 {
        let total = self.passes + self.fails;
        if total == 0 {
            0.
        } else {
            self.passes as f64 / total as f64
        }
    }
}

/// Result of evaluating one threshold rule at the end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub metric: String,
    pub rule: String,
    /// `None` when the metric had no data, which always fails.
    pub observed: Option<f64>,
    pub passed: bool,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.passed { "✓" } else { "✗" };
        match self.observed {
            Some(v) => write!(f, "{mark} {} {} (observed {v:.4})", self.metric, self.rule),
            None => write!(f, "{mark} {} {} (no data)", self.metric, self.rule),
        }
    }
}

/// Run-level statistics produced once the pool has drained.
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub name: String,
    pub elapsed: Duration,
    pub requests: u64,
    pub failed_requests: u64,
    pub transport_failures: u64,
    pub iterations: u64,
    pub peak_vus: usize,
    pub checks: Vec<CheckTally>,
    pub duration: Option<TrendSummary>,
    pub verdicts: Vec<Verdict>,
}

impl RunStatistics {
    /// Every threshold passed. A run without thresholds passes.
    pub fn passed(&self) -> bool {
        self.verdicts.iter().all(|v| v.passed)
    }

    pub fn failure_rate(&self) -> f64 {
        if self.requests == 0 {
            0.
        } else {
            self.failed_requests as f64 / self.requests as f64
        }
    }

    pub fn request_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0. {
            self.requests as f64 / secs
        } else {
            0.
        }
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  scenario: {}", self.name)?;
        writeln!(
            f,
            "  elapsed:  {}",
            humantime::format_duration(Duration::from_millis(self.elapsed.as_millis() as u64))
        )?;
        writeln!(f)?;

        for check in &self.checks {
            let mark = if check.fails == 0 { "✓" } else { "✗" };
            writeln!(
                f,
                "    {mark} {:.<32} {:.2}% ({}/{})",
                format!("{} ", check.name),
                check.pass_rate() * 100.,
                check.passes,
                check.passes + check.fails
            )?;
        }
        if !self.checks.is_empty() {
            writeln!(f)?;
        }

        match &self.duration {
            Some(d) => writeln!(
                f,
                "    {:.<28}: avg={:.2}ms min={:.2}ms med={:.2}ms max={:.2}ms p(90)={:.2}ms p(95)={:.2}ms",
                "http_req_duration", d.avg, d.min, d.med, d.max, d.p90, d.p95
            )?,
            None => writeln!(f, "    {:.<28}: no data", "http_req_duration")?,
        }
        writeln!(
            f,
            "    {:.<28}: {:.2}% {} out of {}",
            "http_req_failed",
            self.failure_rate() * 100.,
            self.failed_requests,
            self.requests
        )?;
        writeln!(
            f,
            "    {:.<28}: {} {:.2}/s ({} transport failures)",
            "http_reqs",
            self.requests,
            self.request_rate(),
            self.transport_failures
        )?;
        writeln!(f, "    {:.<28}: {}", "iterations", self.iterations)?;
        writeln!(f, "    {:.<28}: {}", "vus_max", self.peak_vus)?;

        if !self.verdicts.is_empty() {
            writeln!(f)?;
            writeln!(f, "  thresholds:")?;
            for verdict in &self.verdicts {
                writeln!(f, "    {verdict}")?;
            }
        }
        Ok(())
    }
}
