use thiserror::Error;

/// Invalid run definition. Always fatal before the run starts.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("A run needs at least one stage.")]
    NoStages,

    #[error("Stage {index} has a negative target ({target}).")]
    NegativeTarget { index: usize, target: i64 },

    #[error("startVUs cannot be negative ({0}).")]
    NegativeStartVus(i64),

    #[error("Invalid duration {value:?} for {field}: {reason}")]
    InvalidDuration {
        field: String,
        value: String,
        reason: String,
    },

    #[error("The stages add up to more time than the clock can represent.")]
    ScheduleTooLong,

    #[error("{0} must be greater than zero.")]
    ZeroInterval(&'static str),

    #[error("A run needs at least one endpoint.")]
    NoEndpoints,

    #[error("Endpoint {0:?} must start with '/'.")]
    InvalidEndpoint(String),

    #[error("Invalid base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Unknown metric {0:?}.")]
    UnknownMetric(String),

    #[error("Invalid metric selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid threshold rule {rule:?}: {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("Aggregation `{aggregation}` cannot be applied to {kind} metric `{metric}`.")]
    AggregationMismatch {
        metric: String,
        kind: String,
        aggregation: String,
    },

    #[error("Invalid check {0:?}; expected `status is <code>` or `response time < <n>ms`.")]
    InvalidCheck(String),
}

/// A metric had no samples to aggregate.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("No data recorded for `{0}`.")]
pub struct NoDataError(pub String);
