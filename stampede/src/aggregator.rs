use metrics_util::AtomicBucket;
use stampede_core::{
    nearest_rank, Aggregation, CheckTally, Metric, MetricSelector, NoDataError, Sample, Threshold,
    TrendSummary, Verdict,
};
use std::fmt;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Run-wide sample store.
///
/// Workers append concurrently through [`ThresholdAggregator::record`], which is the only
/// mutation. Every computation works on a snapshot, so repeated evaluations of an unchanged
/// sample set return identical results.
pub struct ThresholdAggregator {
    samples: AtomicBucket<Sample>,
    recent: AtomicBucket<f64>,
}

impl fmt::Debug for ThresholdAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThresholdAggregator").finish_non_exhaustive()
    }
}

impl Default for ThresholdAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ThresholdAggregator {
    pub fn new() -> Self {
        Self {
            samples: AtomicBucket::new(),
            recent: AtomicBucket::new(),
        }
    }

    pub fn record(&self, sample: Sample) {
        self.recent.push(sample.duration_ms);
        self.samples.push(sample);
    }

    pub fn samples(&self) -> Vec<Sample> {
        self.samples.data()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Durations recorded since the previous call, for progress reporting.
    pub(crate) fn drain_recent(&self, mut f: impl FnMut(&[f64])) {
        self.recent.clear_with(|chunk| f(chunk));
    }

    pub fn observe(
        &self,
        selector: &MetricSelector,
        aggregation: Aggregation,
    ) -> Result<f64, NoDataError> {
        observe(&self.samples(), selector, aggregation)
    }

    /// Share of samples failing on status or on any check.
    pub fn failure_rate(&self) -> Result<f64, NoDataError> {
        self.observe(
            &MetricSelector::new(Metric::HttpReqFailed),
            Aggregation::Rate,
        )
    }

    pub fn evaluate(&self, thresholds: &[Threshold]) -> Vec<Verdict> {
        evaluate(&self.samples(), thresholds)
    }
}

pub(crate) fn evaluate(samples: &[Sample], thresholds: &[Threshold]) -> Vec<Verdict> {
    thresholds
        .iter()
        .map(|threshold| {
            let metric = threshold.selector.to_string();
            let rule = threshold.rule.to_string();
            match observe(samples, &threshold.selector, threshold.rule.aggregation) {
                Ok(observed) => {
                    let passed = threshold.rule.holds(observed);
                    debug!("{metric} {rule}: observed {observed}, passed={passed}");
                    Verdict {
                        metric,
                        rule,
                        observed: Some(observed),
                        passed,
                    }
                }
                Err(err) => {
                    warn!("{err} Threshold {metric} {rule} fails.");
                    Verdict {
                        metric,
                        rule,
                        observed: None,
                        passed: false,
                    }
                }
            }
        })
        .collect()
}

pub(crate) fn observe(
    samples: &[Sample],
    selector: &MetricSelector,
    aggregation: Aggregation,
) -> Result<f64, NoDataError> {
    let no_data = || NoDataError(selector.to_string());
    let matching = samples.iter().filter(|s| selector.matches(s));

    match selector.metric {
        Metric::HttpReqDuration => {
            let sorted = sorted_durations(matching);
            trend(&sorted, aggregation).ok_or_else(no_data)
        }
        Metric::HttpReqFailed => {
            let (failed, total) = matching.fold((0u64, 0u64), |(failed, total), s| {
                (failed + s.failed() as u64, total + 1)
            });
            ratio(failed, total).ok_or_else(no_data)
        }
        Metric::Checks => {
            let (passed, total) = matching
                .flat_map(|s| s.checks.iter())
                .fold((0u64, 0u64), |(passed, total), c| {
                    (passed + c.passed as u64, total + 1)
                });
            ratio(passed, total).ok_or_else(no_data)
        }
        Metric::HttpReqs => Ok(matching.count() as f64),
    }
}

fn ratio(part: u64, total: u64) -> Option<f64> {
    (total > 0).then(|| part as f64 / total as f64)
}

fn sorted_durations<'a>(samples: impl Iterator<Item = &'a Sample>) -> Vec<f64> {
    let mut sorted: Vec<f64> = samples.map(|s| s.duration_ms).collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}

fn trend(sorted: &[f64], aggregation: Aggregation) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    match aggregation {
        Aggregation::Percentile(p) => nearest_rank(sorted, p),
        Aggregation::Avg => Some(statistical::mean(sorted)),
        Aggregation::Med => Some(statistical::median(sorted)),
        Aggregation::Min => sorted.first().copied(),
        Aggregation::Max => sorted.last().copied(),
        Aggregation::Rate | Aggregation::Count => {
            error!("Aggregation {aggregation} is not defined for trend metrics.");
            None
        }
    }
}

pub(crate) fn trend_summary(samples: &[Sample]) -> Option<TrendSummary> {
    let sorted = sorted_durations(samples.iter());
    Some(TrendSummary {
        count: sorted.len(),
        avg: trend(&sorted, Aggregation::Avg)?,
        min: trend(&sorted, Aggregation::Min)?,
        med: trend(&sorted, Aggregation::Med)?,
        max: trend(&sorted, Aggregation::Max)?,
        p90: trend(&sorted, Aggregation::Percentile(90.))?,
        p95: trend(&sorted, Aggregation::Percentile(95.))?,
    })
}

/// Pass/fail counts per check, in `names` order.
pub(crate) fn check_tallies<'a>(
    samples: &[Sample],
    names: impl Iterator<Item = &'a str>,
) -> Vec<CheckTally> {
    let mut tallies: Vec<CheckTally> = names
        .map(|name| CheckTally {
            name: name.to_string(),
            passes: 0,
            fails: 0,
        })
        .collect();

    for result in samples.iter().flat_map(|s| s.checks.iter()) {
        if let Some(tally) = tallies.iter_mut().find(|t| *t.name == *result.name) {
            if result.passed {
                tally.passes += 1;
            } else {
                tally.fails += 1;
            }
        }
    }
    tallies
}
