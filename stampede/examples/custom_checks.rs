use stampede::prelude::*;
use std::time::Duration;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    FmtSubscriber::builder()
        .with_env_filter("stampede=debug")
        .init();

    let stats = load_test("custom-checks")
        .stage(Duration::from_secs(10), 5)
        .stage(Duration::from_secs(20), 5)
        .stage(Duration::from_secs(5), 0)
        .endpoint("/api/data")
        .endpoint("/api/flaky")
        .check("status is 200")
        .check_with("not a server error", |sample| sample.status < 500)
        .threshold("http_req_failed{endpoint:/api/flaky}", "rate<0.2")
        .threshold("http_req_duration{endpoint:/api/data}", "p(95)<150")
        .threshold("checks", "rate>0.9")
        .sleep(Duration::from_millis(200))
        .await;

    match stats {
        Ok(stats) => println!("{stats}"),
        Err(err) => eprintln!("{err}"),
    }
}
