use crate::{ConfigError, Sample};
use std::fmt;
use std::str::FromStr;

/// Declarative form of the built-in checks, as written in config files:
/// `status is 200` or `response time < 500ms`.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckSpec {
    StatusIs(u16),
    ResponseTimeBelow(f64),
}

impl CheckSpec {
    pub fn holds(&self, sample: &Sample) -> bool {
        match self {
            CheckSpec::StatusIs(code) => sample.status == *code,
            CheckSpec::ResponseTimeBelow(ms) => sample.duration_ms < *ms,
        }
    }
}

impl FromStr for CheckSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ConfigError::InvalidCheck(s.to_string());
        let text = s.trim();

        if let Some(code) = text.strip_prefix("status is") {
            let code = code.trim().parse::<u16>().map_err(|_| err())?;
            return Ok(CheckSpec::StatusIs(code));
        }

        if let Some(bound) = text.strip_prefix("response time") {
            let ms = bound
                .trim()
                .strip_prefix('<')
                .and_then(|b| b.trim().strip_suffix("ms"))
                .and_then(|b| b.trim().parse::<f64>().ok())
                .filter(|ms| ms.is_finite() && *ms >= 0.)
                .ok_or_else(err)?;
            return Ok(CheckSpec::ResponseTimeBelow(ms));
        }

        Err(err())
    }
}

impl fmt::Display for CheckSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckSpec::StatusIs(code) => write!(f, "status is {code}"),
            CheckSpec::ResponseTimeBelow(ms) => write!(f, "response time < {ms}ms"),
        }
    }
}
