use crate::aggregator::ThresholdAggregator;
use crate::checks::CheckEvaluator;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use stampede_core::RunConfig;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use uuid::Uuid;

/// Process-scoped state of a single run, shared by the scheduler loop, the pool and every worker.
#[derive(Debug)]
pub struct RunContext {
    pub run_id: Uuid,
    pub config: RunConfig,
    pub checks: CheckEvaluator,
    pub aggregator: ThresholdAggregator,
    target: AtomicUsize,
    live_vus: AtomicUsize,
    peak_vus: AtomicUsize,
    iterations: AtomicU64,
}

impl RunContext {
    pub fn new(config: RunConfig, checks: CheckEvaluator) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            config,
            checks,
            aggregator: ThresholdAggregator::new(),
            target: AtomicUsize::new(0),
            live_vus: AtomicUsize::new(0),
            peak_vus: AtomicUsize::new(0),
            iterations: AtomicU64::new(0),
        }
    }

    /// Endpoint-selection RNG for one worker. Seeded runs give every worker its own
    /// reproducible stream.
    pub fn rng_for(&self, worker: usize) -> SmallRng {
        match self.config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(worker as u64)),
            None => SmallRng::from_entropy(),
        }
    }

    pub fn set_target(&self, target: usize) {
        self.target.store(target, Ordering::Relaxed);
    }

    pub fn target(&self) -> usize {
        self.target.load(Ordering::Relaxed)
    }

    pub(crate) fn set_live_vus(&self, live: usize) {
        self.live_vus.store(live, Ordering::Relaxed);
        self.peak_vus.fetch_max(live, Ordering::Relaxed);
    }

    pub fn live_vus(&self) -> usize {
        self.live_vus.load(Ordering::Relaxed)
    }

    pub fn peak_vus(&self) -> usize {
        self.peak_vus.load(Ordering::Relaxed)
    }

    pub(crate) fn record_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }
}
