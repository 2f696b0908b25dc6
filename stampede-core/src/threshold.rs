//! Threshold rules
//!
//! A threshold pairs a metric selector (`http_req_duration`, optionally filtered with tags such
//! as `http_req_duration{endpoint:/api/data}`) with a rule of the form
//! `<aggregation> <operator> <bound>`, e.g. `p(95)<500` or `rate<0.05`.
use crate::{ConfigError, Sample};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Trend,
    Rate,
    Counter,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MetricKind::Trend => "trend",
            MetricKind::Rate => "rate",
            MetricKind::Counter => "counter",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Request duration in milliseconds.
    HttpReqDuration,
    /// Share of samples that failed on status or on any check.
    HttpReqFailed,
    /// Share of individual check results that passed.
    Checks,
    /// Number of requests.
    HttpReqs,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::HttpReqDuration => "http_req_duration",
            Metric::HttpReqFailed => "http_req_failed",
            Metric::Checks => "checks",
            Metric::HttpReqs => "http_reqs",
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::HttpReqDuration => MetricKind::Trend,
            Metric::HttpReqFailed | Metric::Checks => MetricKind::Rate,
            Metric::HttpReqs => MetricKind::Counter,
        }
    }
}

impl FromStr for Metric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http_req_duration" => Ok(Metric::HttpReqDuration),
            "http_req_failed" => Ok(Metric::HttpReqFailed),
            "checks" => Ok(Metric::Checks),
            "http_reqs" => Ok(Metric::HttpReqs),
            other => Err(ConfigError::UnknownMetric(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagFilter {
    Endpoint(String),
    Status(u16),
}

impl TagFilter {
    pub fn matches(&self, sample: &Sample) -> bool {
        match self {
            TagFilter::Endpoint(endpoint) => sample.endpoint == *endpoint,
            TagFilter::Status(status) => sample.status == *status,
        }
    }
}

/// A metric, optionally restricted to the samples carrying a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSelector {
    pub metric: Metric,
    pub filter: Option<TagFilter>,
}

impl MetricSelector {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            filter: None,
        }
    }

    pub fn matches(&self, sample: &Sample) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(sample))
    }
}

impl FromStr for MetricSelector {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |reason: &str| ConfigError::InvalidSelector {
            selector: s.to_string(),
            reason: reason.to_string(),
        };

        let Some((name, tags)) = s.split_once('{') else {
            return Ok(MetricSelector::new(s.parse()?));
        };

        let metric = name.trim().parse()?;
        let tags = tags
            .strip_suffix('}')
            .ok_or_else(|| invalid("missing closing '}'"))?;
        let (key, value) = tags
            .split_once(':')
            .ok_or_else(|| invalid("tag filter must be `key:value`"))?;

        let filter = match key.trim() {
            "endpoint" => TagFilter::Endpoint(value.trim().to_string()),
            "status" => TagFilter::Status(
                value
                    .trim()
                    .parse()
                    .map_err(|_| invalid("status must be an integer"))?,
            ),
            _ => return Err(invalid("supported tags are `endpoint` and `status`")),
        };

        Ok(MetricSelector {
            metric,
            filter: Some(filter),
        })
    }
}

impl fmt::Display for MetricSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filter {
            None => f.write_str(self.metric.name()),
            Some(TagFilter::Endpoint(e)) => write!(f, "{}{{endpoint:{e}}}", self.metric.name()),
            Some(TagFilter::Status(s)) => write!(f, "{}{{status:{s}}}", self.metric.name()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    /// Nearest-rank percentile, `0 < p <= 100`.
    Percentile(f64),
    Avg,
    Min,
    Max,
    Med,
    Rate,
    Count,
}

impl Aggregation {
    pub fn kind(&self) -> MetricKind {
        match self {
            Aggregation::Percentile(_)
            | Aggregation::Avg
            | Aggregation::Min
            | Aggregation::Max
            | Aggregation::Med => MetricKind::Trend,
            Aggregation::Rate => MetricKind::Rate,
            Aggregation::Count => MetricKind::Counter,
        }
    }
}

impl FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avg" => Ok(Aggregation::Avg),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "med" => Ok(Aggregation::Med),
            "rate" => Ok(Aggregation::Rate),
            "count" => Ok(Aggregation::Count),
            _ => {
                let p = s
                    .strip_prefix("p(")
                    .and_then(|p| p.strip_suffix(')'))
                    .ok_or_else(|| format!("unknown aggregation `{s}`"))?;
                let p: f64 = p
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid percentile `{p}`"))?;
                if p > 0. && p <= 100. {
                    Ok(Aggregation::Percentile(p))
                } else {
                    Err(format!("percentile {p} out of range (0, 100]"))
                }
            }
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Percentile(p) => write!(f, "p({p})"),
            Aggregation::Avg => f.write_str("avg"),
            Aggregation::Min => f.write_str("min"),
            Aggregation::Max => f.write_str("max"),
            Aggregation::Med => f.write_str("med"),
            Aggregation::Rate => f.write_str("rate"),
            Aggregation::Count => f.write_str("count"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    pub fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
            Comparison::Eq => observed == bound,
            Comparison::Ne => observed != bound,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        }
    }
}

/// `<aggregation> <op> <bound>`
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    pub aggregation: Aggregation,
    pub op: Comparison,
    pub bound: f64,
}

impl ThresholdRule {
    pub fn holds(&self, observed: f64) -> bool {
        self.op.holds(observed, self.bound)
    }
}

impl FromStr for ThresholdRule {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ConfigError::InvalidRule {
            rule: s.to_string(),
            reason,
        };

        let op_start = s
            .find(['<', '>', '=', '!'])
            .ok_or_else(|| invalid("missing comparison operator".into()))?;
        let (aggregation, rest) = s.split_at(op_start);

        let (op, bound) = if let Some(b) = rest.strip_prefix("<=") {
            (Comparison::Le, b)
        } else if let Some(b) = rest.strip_prefix(">=") {
            (Comparison::Ge, b)
        } else if let Some(b) = rest.strip_prefix("==") {
            (Comparison::Eq, b)
        } else if let Some(b) = rest.strip_prefix("!=") {
            (Comparison::Ne, b)
        } else if let Some(b) = rest.strip_prefix('<') {
            (Comparison::Lt, b)
        } else if let Some(b) = rest.strip_prefix('>') {
            (Comparison::Gt, b)
        } else {
            return Err(invalid(format!("unknown operator in `{rest}`")));
        };

        let aggregation = aggregation.trim().parse().map_err(invalid)?;
        let bound: f64 = bound
            .trim()
            .parse()
            .map_err(|_| invalid(format!("bound `{}` is not a number", bound.trim())))?;
        if !bound.is_finite() {
            return Err(invalid("bound must be finite".into()));
        }

        Ok(ThresholdRule {
            aggregation,
            op,
            bound,
        })
    }
}

impl fmt::Display for ThresholdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.aggregation, self.op.symbol(), self.bound)
    }
}

/// A validated selector/rule pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub selector: MetricSelector,
    pub rule: ThresholdRule,
}

impl Threshold {
    pub fn parse(selector: &str, rule: &str) -> Result<Self, ConfigError> {
        let selector: MetricSelector = selector.parse()?;
        let rule: ThresholdRule = rule.parse()?;

        let kind = selector.metric.kind();
        if rule.aggregation.kind() != kind {
            return Err(ConfigError::AggregationMismatch {
                metric: selector.metric.name().to_string(),
                kind: kind.to_string(),
                aggregation: rule.aggregation.to_string(),
            });
        }

        Ok(Self { selector, rule })
    }
}
