use crate::TRANSPORT_FAILURE_STATUS;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Outcome of a single request. Built once by the request runner, completed with check results
/// and then handed to the aggregator which owns it for the rest of the run.
#[derive(Debug, Clone)]
pub struct Sample {
    pub timestamp: SystemTime,
    pub endpoint: String,
    pub status: u16,
    pub duration_ms: f64,
    pub checks: Vec<CheckResult>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub name: Arc<str>,
    pub passed: bool,
}

impl Sample {
    pub fn new(timestamp: SystemTime, endpoint: &str, status: u16, duration: Duration) -> Self {
        Self {
            timestamp,
            endpoint: endpoint.to_string(),
            status,
            duration_ms: duration.as_nanos() as f64 / 1e6,
            checks: vec![],
        }
    }

    pub fn with_checks(mut self, checks: Vec<CheckResult>) -> Self {
        self.checks = checks;
        self
    }

    /// No HTTP response was received (connection refused, timeout, ...).
    pub fn is_transport_failure(&self) -> bool {
        self.status == TRANSPORT_FAILURE_STATUS
    }

    pub fn status_failed(&self) -> bool {
        self.is_transport_failure() || self.status >= 400
    }

    pub fn checks_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Counts towards `http_req_failed`.
    pub fn failed(&self) -> bool {
        self.status_failed() || !self.checks_passed()
    }

    pub fn check(&self, name: &str) -> Option<bool> {
        self.checks
            .iter()
            .find(|c| &*c.name == name)
            .map(|c| c.passed)
    }
}
