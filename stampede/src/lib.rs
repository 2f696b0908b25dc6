#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod scenario;

pub(crate) mod aggregator;
pub(crate) mod checks;
pub(crate) mod context;
pub(crate) mod error;
pub(crate) mod pool;
pub(crate) mod progress;
pub(crate) mod runner;
pub(crate) mod scheduler;
pub(crate) mod timer;

pub use aggregator::ThresholdAggregator;
pub use checks::{CheckEvaluator, Predicate};
pub use context::RunContext;
pub use error::{RunError, TransportError};
pub use runner::{HttpTransport, LocalTransport, RequestRunner, Transport};
pub use scenario::{load_test, ConfigurableLoadTest, LoadTest};
pub use scheduler::StageScheduler;

pub use stampede_core as core;

pub mod prelude {
    pub use crate::scenario::{load_test, ConfigurableLoadTest, LoadTest};
    pub use crate::{RunError, Transport};

    pub use stampede_core::{RunConfig, RunStatistics, Sample, Stage};
}
