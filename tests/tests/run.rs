mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;
    use stampede::prelude::*;
    use std::time::Duration;

    fn short(name: &str, base_url: &str) -> LoadTest {
        load_test(name)
            .base_url(base_url)
            .poll_interval(Duration::from_millis(100))
            .graceful_stop(Duration::from_secs(2))
            .sleep(Duration::from_millis(20))
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn single_stage_produces_samples() {
        let base_url = init();

        let stats = load_test("e2e")
            .base_url(base_url)
            .stage(Duration::from_secs(1), 1)
            .endpoint("/health")
            .await
            .unwrap();

        assert!(stats.requests >= 1);
        assert!(stats.elapsed < Duration::from_secs(2));
        assert_eq!(stats.failed_requests, 0);
        assert!(stats.passed());
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn healthy_service_passes_thresholds() {
        let base_url = init();

        let stats = short("healthy", base_url)
            .stage(Duration::from_millis(500), 3)
            .stage(Duration::from_millis(500), 0)
            .endpoint("/")
            .endpoint("/api/status")
            .check("status is 200")
            .check("response time < 500ms")
            .threshold("http_req_duration", "p(95)<500")
            .threshold("http_req_failed", "rate<0.05")
            .threshold("checks", "rate>0.95")
            .await
            .unwrap();

        assert!(stats.requests > 0);
        assert!(stats.peak_vus >= 2);
        assert_eq!(stats.checks.len(), 2);
        assert!(stats.checks.iter().all(|c| c.fails == 0));
        assert!(stats.passed(), "{stats}");
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn server_errors_fail_the_error_rate() {
        let base_url = init();

        let stats = short("errors", base_url)
            .stage(Duration::from_millis(500), 2)
            .endpoint("/status/500")
            .check("status is 200")
            .threshold("http_req_failed", "rate<0.05")
            .await
            .unwrap();

        assert!(stats.requests > 0);
        assert_eq!(stats.failed_requests, stats.requests);
        assert_eq!(stats.transport_failures, 0);
        assert_eq!(stats.verdicts[0].observed, Some(1.));
        assert!(!stats.passed());
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn unreachable_target_records_transport_failures() {
        let base_url = closed_port();

        let stats = short("refused", &base_url)
            .stage(Duration::from_millis(300), 1)
            .request_timeout(Duration::from_secs(1))
            .threshold("http_req_failed", "rate<0.05")
            .await
            .unwrap();

        assert!(stats.requests > 0);
        assert_eq!(stats.transport_failures, stats.requests);
        assert!(!stats.passed());
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn latency_thresholds() {
        let base_url = init();

        let stats = short("latency", base_url)
            .stage(Duration::from_millis(600), 2)
            .endpoint("/delay/ms/50")
            .threshold("http_req_duration", "p(95)>=50")
            .threshold("http_req_duration", "min>=50")
            .threshold("http_req_duration", "p(95)<20")
            .await
            .unwrap();

        let passed: Vec<bool> = stats.verdicts.iter().map(|v| v.passed).collect();
        assert_eq!(passed, [true, true, false]);
        let summary = stats.duration.unwrap();
        assert!(summary.min >= 50.);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn tag_filters_split_endpoints() {
        let base_url = init();

        let stats = short("tags", base_url)
            .stage(Duration::from_secs(1), 2)
            .seed(7)
            .endpoint("/delay/ms/1")
            .endpoint("/status/503")
            .threshold("http_req_failed{endpoint:/delay/ms/1}", "rate<0.01")
            .threshold("http_req_failed{status:503}", "rate>0.99")
            .threshold("http_reqs{endpoint:/status/503}", "count>0")
            .threshold("http_req_failed", "rate<0.05")
            .await
            .unwrap();

        let passed: Vec<bool> = stats.verdicts.iter().map(|v| v.passed).collect();
        assert_eq!(passed, [true, true, true, false]);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn rate_limited_endpoint_reports_partial_failure() {
        let base_url = init();

        let stats = short("limited", base_url)
            .stage(Duration::from_secs(1), 4)
            .start_vus(4)
            .sleep(Duration::ZERO)
            .endpoint("/limited/20/name/partial")
            .check("status is 200")
            .threshold("http_req_failed", "rate<0.05")
            .await
            .unwrap();

        let rate = stats.failure_rate();
        assert!(rate > 0. && rate < 1., "failure rate was {rate}");
        assert!(!stats.passed());
    }
}
