mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;
    use stampede_core::{RawRunConfig, RunConfig};
    use stampede_runtime::{StampedeRuntime, THRESHOLDS_FAILED_EXIT_CODE};
    use std::time::Duration;

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn config_file_run() {
        let base_url = init();

        let path = std::env::temp_dir().join(format!("stampede-it-{}.json", std::process::id()));
        std::fs::write(
            &path,
            format!(
                r#"{{
                    "name": "from-file",
                    "stages": [{{ "duration": "500ms", "target": 2 }}, {{ "duration": "300ms", "target": 0 }}],
                    "thresholds": {{ "http_req_failed": "rate<0.05", "http_req_duration": ["p(95)<1000"] }},
                    "baseUrl": "{base_url}",
                    "endpoints": ["/", "/api/status", "/health"],
                    "checks": ["status is 200"],
                    "sleep": "50ms",
                    "pollInterval": "100ms"
                }}"#
            ),
        )
        .unwrap();

        let stats = StampedeRuntime::new()
            .config_file(&path)
            .graceful_stop(Duration::from_secs(2))
            .run()
            .await;
        std::fs::remove_file(&path).unwrap();
        let stats = stats.unwrap();

        assert_eq!(stats.name, "from-file");
        assert!(stats.requests > 0);
        assert_eq!(stats.verdicts.len(), 2);
        assert!(stats.passed(), "{stats}");
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn raw_config_to_engine() {
        let base_url = init();

        let raw: RawRunConfig = serde_json::from_str(
            r#"{
                "stages": [{ "duration": "400ms", "target": 1 }],
                "thresholds": { "http_req_failed": "rate<0.05" },
                "endpoints": ["/status/404"],
                "pollInterval": "100ms"
            }"#,
        )
        .unwrap();
        let mut config = RunConfig::try_from(raw).unwrap();
        config.set_base_url(base_url).unwrap();

        let stats = stampede::LoadTest::new(config).await.unwrap();
        assert!(stats.requests > 0);
        assert_eq!(stats.failed_requests, stats.requests);
        assert!(!stats.passed());
        assert_eq!(THRESHOLDS_FAILED_EXIT_CODE, 99);
    }
}
