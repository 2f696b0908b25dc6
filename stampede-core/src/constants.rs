use std::time::Duration;

/// Target used when neither the caller nor `BASE_URL` provide one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Environment variable consulted for the base URL.
pub const BASE_URL_ENV: &str = "BASE_URL";

/// Path requested when no endpoints are configured through the library API.
pub const DEFAULT_ENDPOINT: &str = "/";

/// Virtual users alive at t=0; the first stage ramps from this value.
pub const DEFAULT_START_VUS: usize = 1;

/// How often the pool is reconciled against the stage schedule.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long in-flight iterations may run after the schedule ends.
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Status recorded for requests that never produced an HTTP response.
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;
