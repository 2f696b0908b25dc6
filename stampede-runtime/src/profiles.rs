//! Built-in load profiles
use clap::ValueEnum;
use stampede_core::{CheckSpec, ConfigError, RunConfig, Stage, Threshold};
use std::fmt;
use std::time::Duration;

const MIXED_ENDPOINTS: [&str; 3] = ["/", "/api/data", "/api/status"];

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Ramp to 50 VUs, hold for five minutes, ramp down.
    Load,
    /// Short ramp to 20 VUs, spike to 150, recover.
    Spike,
    /// Step up to 400 VUs in 2 minute increments.
    Stress,
}

impl Profile {
    pub fn name(&self) -> &'static str {
        match self {
            Profile::Load => "load",
            Profile::Spike => "spike",
            Profile::Stress => "stress",
        }
    }

    /// The run this profile describes, targeting the default base URL.
    pub fn config(&self) -> Result<RunConfig, ConfigError> {
        let mut config = RunConfig::new(self.name());

        match self {
            Profile::Load => {
                config.stages = stages(&[(60, 50), (300, 50), (60, 0)]);
                config.thresholds = vec![
                    Threshold::parse("http_req_duration", "p(95)<500")?,
                    Threshold::parse("http_req_failed", "rate<0.05")?,
                ];
                config.endpoints = endpoints(&MIXED_ENDPOINTS);
                config.checks = vec![
                    CheckSpec::StatusIs(200),
                    CheckSpec::ResponseTimeBelow(500.),
                ];
                config.sleep = Duration::from_secs(1);
            }
            Profile::Spike => {
                config.stages = stages(&[(10, 20), (90, 150), (30, 20), (10, 0)]);
                config.thresholds = vec![
                    Threshold::parse("http_req_duration", "p(95)<1000")?,
                    Threshold::parse("http_req_failed", "rate<0.1")?,
                ];
                config.endpoints = endpoints(&MIXED_ENDPOINTS);
                config.checks = vec![
                    CheckSpec::StatusIs(200),
                    CheckSpec::ResponseTimeBelow(1000.),
                ];
                config.sleep = Duration::from_millis(500);
            }
            Profile::Stress => {
                config.stages = stages(&[
                    (120, 50),
                    (120, 100),
                    (120, 200),
                    (120, 300),
                    (120, 400),
                    (120, 0),
                ]);
                config.thresholds = vec![
                    Threshold::parse("http_req_duration", "p(95)<2000")?,
                    Threshold::parse("http_req_failed", "rate<0.2")?,
                ];
                config.endpoints = endpoints(&["/api/data"]);
                config.checks = vec![CheckSpec::StatusIs(200)];
                config.sleep = Duration::from_millis(500);
            }
        }

        Ok(config)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn stages(spec: &[(u64, usize)]) -> Vec<Stage> {
    spec.iter()
        .map(|(secs, target)| Stage::new(Duration::from_secs(*secs), *target))
        .collect()
}

fn endpoints(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| p.to_string()).collect()
}
