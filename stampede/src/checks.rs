use stampede_core::{CheckResult, CheckSpec, Sample};
use std::fmt;
use std::sync::Arc;

pub type Predicate = Arc<dyn Fn(&Sample) -> bool + Send + Sync>;

/// Named per-response assertions.
///
/// Every check is evaluated on every sample, in insertion order; a failing check never prevents
/// the ones after it from running.
#[derive(Clone, Default)]
pub struct CheckEvaluator {
    checks: Vec<(Arc<str>, Predicate)>,
}

impl CheckEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_specs(specs: &[CheckSpec]) -> Self {
        let mut evaluator = Self::new();
        for spec in specs {
            let predicate = spec.clone();
            evaluator.add(spec.to_string(), move |sample| predicate.holds(sample));
        }
        evaluator
    }

    pub fn add<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&Sample) -> bool + Send + Sync + 'static,
    {
        let name: String = name.into();
        self.checks.push((name.into(), Arc::new(predicate)));
    }

    /// Appends the checks of `other` after the existing ones.
    pub fn extend(&mut self, other: CheckEvaluator) {
        self.checks.extend(other.checks);
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.checks.iter().map(|(name, _)| &**name)
    }

    pub fn evaluate(&self, sample: Sample) -> Sample {
        let results = self
            .checks
            .iter()
            .map(|(name, predicate)| CheckResult {
                name: name.clone(),
                passed: predicate(&sample),
            })
            .collect();
        sample.with_checks(results)
    }
}

impl fmt::Debug for CheckEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, SystemTime};

    fn sample(status: u16, ms: u64) -> Sample {
        Sample::new(SystemTime::now(), "/", status, Duration::from_millis(ms))
    }

    #[test]
    fn evaluates_in_insertion_order() {
        let mut evaluator = CheckEvaluator::new();
        evaluator.add("b", |_| true);
        evaluator.add("a", |_| false);
        evaluator.add("c", |_| true);

        let s = evaluator.evaluate(sample(200, 1));
        let names: Vec<_> = s.checks.iter().map(|c| &*c.name).collect();
        assert_eq!(names, ["b", "a", "c"]);
        assert_eq!(s.check("a"), Some(false));
    }

    #[test]
    fn failing_check_does_not_short_circuit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut evaluator = CheckEvaluator::new();
        for i in 0..4 {
            let calls = calls.clone();
            evaluator.add(format!("check {i}"), move |_| {
                calls.fetch_add(1, Ordering::Relaxed);
                i % 2 == 0
            });
        }

        let s = evaluator.evaluate(sample(500, 1));
        assert_eq!(calls.load(Ordering::Relaxed), 4);
        assert_eq!(s.checks.iter().filter(|c| c.passed).count(), 2);
        assert!(s.failed());
    }

    #[test]
    fn built_in_specs() {
        let evaluator = CheckEvaluator::from_specs(&[
            CheckSpec::StatusIs(200),
            CheckSpec::ResponseTimeBelow(500.),
        ]);
        assert_eq!(
            evaluator.names().collect::<Vec<_>>(),
            ["status is 200", "response time < 500ms"]
        );

        let ok = evaluator.evaluate(sample(200, 100));
        assert!(ok.checks_passed());

        let slow = evaluator.evaluate(sample(200, 750));
        assert_eq!(slow.check("status is 200"), Some(true));
        assert_eq!(slow.check("response time < 500ms"), Some(false));
    }
}
