mod tests {
    use stampede::prelude::*;
    use std::time::{Duration, Instant};

    /// A private instance, so toggling its health cannot disturb other tests.
    async fn start() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(mock_service::serve(listener));
        format!("http://{addr}")
    }

    async fn get(client: &reqwest::Client, url: &str) -> u16 {
        client.get(url).send().await.unwrap().status().as_u16()
    }

    async fn post(client: &reqwest::Client, url: &str) -> String {
        client.post(url).send().await.unwrap().text().await.unwrap()
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn break_and_fix_toggle_probes() {
        let base_url = start().await;
        let client = reqwest::Client::new();

        assert_eq!(get(&client, &format!("{base_url}/health")).await, 200);
        assert_eq!(get(&client, &format!("{base_url}/ready")).await, 200);

        assert_eq!(post(&client, &format!("{base_url}/admin/break")).await, "broken");
        assert_eq!(get(&client, &format!("{base_url}/health")).await, 503);
        assert_eq!(get(&client, &format!("{base_url}/ready")).await, 503);

        let status: serde_json::Value = serde_json::from_str(
            &client
                .get(format!("{base_url}/api/status"))
                .send()
                .await
                .unwrap()
                .text()
                .await
                .unwrap(),
        )
        .unwrap();
        assert_eq!(status["healthy"], false);
        assert_eq!(status["ready"], false);

        let stats = load_test("broken")
            .base_url(&base_url)
            .stage(Duration::from_millis(300), 1)
            .poll_interval(Duration::from_millis(100))
            .sleep(Duration::from_millis(20))
            .endpoint("/health")
            .threshold("http_req_failed", "rate<0.05")
            .await
            .unwrap();
        assert!(stats.requests > 0);
        assert_eq!(stats.failure_rate(), 1.);
        assert!(!stats.passed());

        assert_eq!(post(&client, &format!("{base_url}/admin/fix")).await, "fixed");
        assert_eq!(get(&client, &format!("{base_url}/health")).await, 200);
        assert_eq!(get(&client, &format!("{base_url}/ready")).await, 200);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn slow_endpoint_takes_at_least_half_a_second() {
        let base_url = start().await;
        let client = reqwest::Client::new();

        let started = Instant::now();
        assert_eq!(get(&client, &format!("{base_url}/api/slow")).await, 200);
        assert!(started.elapsed() >= Duration::from_millis(500));
    }
}
