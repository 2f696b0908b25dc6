use crate::{
    CheckSpec, ConfigError, Threshold, BASE_URL_ENV, DEFAULT_BASE_URL, DEFAULT_ENDPOINT,
    DEFAULT_GRACEFUL_STOP, DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_START_VUS,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// A time window ending at `target` virtual users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: usize,
}

impl Stage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub name: String,
    pub stages: Vec<Stage>,
    pub thresholds: Vec<Threshold>,
    /// Normalized without a trailing slash so `base_url + endpoint` is the request URL.
    pub base_url: String,
    pub endpoints: Vec<String>,
    pub sleep: Duration,
    pub checks: Vec<CheckSpec>,
    pub start_vus: usize,
    pub poll_interval: Duration,
    pub graceful_stop: Duration,
    pub request_timeout: Duration,
    pub seed: Option<u64>,
}

impl RunConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            stages: vec![],
            thresholds: vec![],
            base_url: default_base_url(),
            endpoints: vec![DEFAULT_ENDPOINT.to_string()],
            sleep: Duration::ZERO,
            checks: vec![],
            start_vus: DEFAULT_START_VUS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            graceful_stop: DEFAULT_GRACEFUL_STOP,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            seed: None,
        }
    }

    pub fn set_base_url(&mut self, url: &str) -> Result<(), ConfigError> {
        self.base_url = normalize_base_url(url)?;
        Ok(())
    }

    /// Sum of the stage durations, saturating. [`RunConfig::validate`] rejects schedules that
    /// overflow.
    pub fn total_duration(&self) -> Duration {
        self.stages
            .iter()
            .fold(Duration::ZERO, |total, s| total.saturating_add(s.duration))
    }

    pub fn max_target(&self) -> usize {
        self.stages
            .iter()
            .map(|s| s.target)
            .fold(self.start_vus, usize::max)
    }

    /// Checks the invariants the engine relies on. Stages and thresholds are already typed, so
    /// this covers what the types cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::NoStages);
        }
        self.stages
            .iter()
            .try_fold(Duration::ZERO, |total, s| total.checked_add(s.duration))
            .ok_or(ConfigError::ScheduleTooLong)?;
        if self.endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        if let Some(bad) = self.endpoints.iter().find(|e| !e.starts_with('/')) {
            return Err(ConfigError::InvalidEndpoint(bad.clone()));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("pollInterval"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroInterval("requestTimeout"));
        }
        normalize_base_url(&self.base_url)?;
        Ok(())
    }
}

/// `BASE_URL` from the environment, falling back to [`DEFAULT_BASE_URL`].
pub fn default_base_url() -> String {
    std::env::var(BASE_URL_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
        .trim_end_matches('/')
        .to_string()
}

pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query strings and fragments are not allowed"));
    }

    Ok(raw.trim().trim_end_matches('/').to_string())
}

fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::InvalidDuration {
        field: field.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Run definition as written in a JSON config file.
///
/// `thresholds` is keyed by metric selector. Selectors are evaluated and reported in sorted
/// order, whatever their order in the file; rules under one selector keep their file order.
///
/// ```json
/// {
///   "stages": [{ "duration": "1m", "target": 50 }, { "duration": "1m", "target": 0 }],
///   "thresholds": { "http_req_duration": ["p(95)<500"], "http_req_failed": "rate<0.05" },
///   "endpoints": ["/", "/api/data"],
///   "checks": ["status is 200"],
///   "sleep": "1s"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawRunConfig {
    pub name: Option<String>,
    pub stages: Vec<RawStage>,
    #[serde(default)]
    pub thresholds: BTreeMap<String, RawRules>,
    pub base_url: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<String>,
    pub sleep: Option<String>,
    #[serde(default)]
    pub checks: Vec<String>,
    #[serde(rename = "startVUs")]
    pub start_vus: Option<i64>,
    pub poll_interval: Option<String>,
    pub graceful_stop: Option<String>,
    pub request_timeout: Option<String>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawStage {
    pub duration: String,
    pub target: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawRules {
    One(String),
    Many(Vec<String>),
}

impl RawRules {
    fn into_vec(self) -> Vec<String> {
        match self {
            RawRules::One(rule) => vec![rule],
            RawRules::Many(rules) => rules,
        }
    }
}

impl TryFrom<RawStage> for Stage {
    type Error = ConfigError;

    fn try_from(raw: RawStage) -> Result<Self, Self::Error> {
        Self::try_from((0, raw))
    }
}

impl TryFrom<(usize, RawStage)> for Stage {
    type Error = ConfigError;

    fn try_from((index, raw): (usize, RawStage)) -> Result<Self, Self::Error> {
        let duration = parse_duration(&format!("stages[{index}].duration"), &raw.duration)?;
        let target = usize::try_from(raw.target).map_err(|_| ConfigError::NegativeTarget {
            index,
            target: raw.target,
        })?;
        Ok(Stage::new(duration, target))
    }
}

impl TryFrom<RawRunConfig> for RunConfig {
    type Error = ConfigError;

    fn try_from(raw: RawRunConfig) -> Result<Self, Self::Error> {
        let mut config = RunConfig::new(raw.name.as_deref().unwrap_or("default"));

        config.stages = raw
            .stages
            .into_iter()
            .enumerate()
            .map(|(index, stage)| Stage::try_from((index, stage)))
            .collect::<Result<_, _>>()?;

        for (selector, rules) in raw.thresholds {
            for rule in rules.into_vec() {
                config.thresholds.push(Threshold::parse(&selector, &rule)?);
            }
        }

        if let Some(url) = raw.base_url {
            config.set_base_url(&url)?;
        }

        config.endpoints = raw.endpoints;

        config.checks = raw
            .checks
            .iter()
            .map(|c| c.parse())
            .collect::<Result<_, _>>()?;

        if let Some(sleep) = raw.sleep {
            config.sleep = parse_duration("sleep", &sleep)?;
        }
        if let Some(start_vus) = raw.start_vus {
            config.start_vus =
                usize::try_from(start_vus).map_err(|_| ConfigError::NegativeStartVus(start_vus))?;
        }
        if let Some(poll) = raw.poll_interval {
            config.poll_interval = parse_duration("pollInterval", &poll)?;
        }
        if let Some(stop) = raw.graceful_stop {
            config.graceful_stop = parse_duration("gracefulStop", &stop)?;
        }
        if let Some(timeout) = raw.request_timeout {
            config.request_timeout = parse_duration("requestTimeout", &timeout)?;
        }
        config.seed = raw.seed;

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Aggregation, Metric};

    fn raw(json: &str) -> RawRunConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_full_config() {
        let config = RunConfig::try_from(raw(
            r#"{
                "name": "load",
                "stages": [
                    { "duration": "1m", "target": 50 },
                    { "duration": "5m", "target": 50 },
                    { "duration": "1m", "target": 0 }
                ],
                "thresholds": {
                    "http_req_duration": ["p(95)<500"],
                    "http_req_failed": "rate<0.05"
                },
                "baseUrl": "http://127.0.0.1:9000/",
                "endpoints": ["/", "/api/data", "/api/status"],
                "checks": ["status is 200", "response time < 500ms"],
                "sleep": "1s",
                "startVUs": 0,
                "gracefulStop": "5s",
                "seed": 7
            }"#,
        ))
        .unwrap();

        assert_eq!(config.name, "load");
        assert_eq!(config.stages.len(), 3);
        assert_eq!(config.stages[1], Stage::new(Duration::from_secs(300), 50));
        assert_eq!(config.total_duration(), Duration::from_secs(420));
        assert_eq!(config.max_target(), 50);
        assert_eq!(config.thresholds.len(), 2);
        assert_eq!(config.thresholds[0].selector.metric, Metric::HttpReqDuration);
        assert_eq!(
            config.thresholds[0].rule.aggregation,
            Aggregation::Percentile(95.)
        );
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.checks.len(), 2);
        assert_eq!(config.sleep, Duration::from_secs(1));
        assert_eq!(config.start_vus, 0);
        assert_eq!(config.graceful_stop, Duration::from_secs(5));
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn negative_target_is_rejected() {
        let err = RunConfig::try_from(raw(
            r#"{ "stages": [{ "duration": "10s", "target": 5 }, { "duration": "10s", "target": -1 }],
                 "endpoints": ["/"] }"#,
        ))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::NegativeTarget {
                index: 1,
                target: -1
            }
        );
    }

    #[test]
    fn negative_duration_is_rejected() {
        let err = RunConfig::try_from(raw(
            r#"{ "stages": [{ "duration": "-5s", "target": 5 }], "endpoints": ["/"] }"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { .. }));
    }

    #[test]
    fn empty_stages_and_endpoints_are_rejected() {
        let err = RunConfig::try_from(raw(r#"{ "stages": [], "endpoints": ["/"] }"#)).unwrap_err();
        assert_eq!(err, ConfigError::NoStages);

        let err = RunConfig::try_from(raw(r#"{ "stages": [{ "duration": "1s", "target": 1 }] }"#))
            .unwrap_err();
        assert_eq!(err, ConfigError::NoEndpoints);

        let err = RunConfig::try_from(raw(
            r#"{ "stages": [{ "duration": "1s", "target": 1 }], "endpoints": ["api"] }"#,
        ))
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidEndpoint("api".into()));
    }

    #[test]
    fn thresholds_are_ordered_by_selector() {
        let config = RunConfig::try_from(raw(
            r#"{ "stages": [{ "duration": "1s", "target": 1 }], "endpoints": ["/"],
                 "thresholds": {
                     "http_reqs": "count>0",
                     "http_req_failed": "rate<0.05",
                     "http_req_duration": ["p(99)<900", "p(95)<500"]
                 } }"#,
        ))
        .unwrap();

        let order: Vec<_> = config
            .thresholds
            .iter()
            .map(|t| format!("{} {}", t.selector.metric.name(), t.rule))
            .collect();
        assert_eq!(
            order,
            [
                "http_req_duration p(99)<900",
                "http_req_duration p(95)<500",
                "http_req_failed rate<0.05",
                "http_reqs count>0",
            ]
        );
    }

    #[test]
    fn overflowing_schedule_is_rejected() {
        let mut config = RunConfig::new("overflow");
        config.stages = vec![
            Stage::new(Duration::MAX, 10),
            Stage::new(Duration::from_secs(1), 0),
        ];
        assert_eq!(config.validate(), Err(ConfigError::ScheduleTooLong));
        assert_eq!(config.total_duration(), Duration::MAX);
    }

    #[test]
    fn bad_thresholds_are_rejected() {
        let err = RunConfig::try_from(raw(
            r#"{ "stages": [{ "duration": "1s", "target": 1 }], "endpoints": ["/"],
                 "thresholds": { "http_req_failed": ["p(95)<10"] } }"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::AggregationMismatch { .. }));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<RawRunConfig>(
            r#"{ "stages": [], "duration": "10s" }"#
        )
        .is_err());
    }

    #[test]
    fn base_url_validation() {
        assert_eq!(
            normalize_base_url("https://example.com/").unwrap(),
            "https://example.com"
        );
        assert_eq!(
            normalize_base_url("http://localhost:8000/v1").unwrap(),
            "http://localhost:8000/v1"
        );
        assert!(normalize_base_url("localhost:8000").is_err());
        assert!(normalize_base_url("ftp://example.com").is_err());
        assert!(normalize_base_url("http://example.com/?a=b").is_err());
    }
}
