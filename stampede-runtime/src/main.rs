use stampede_runtime::{StampedeRuntime, THRESHOLDS_FAILED_EXIT_CODE};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let runtime = StampedeRuntime::new().with_args();
    init_tracing(runtime.verbosity());

    let stats = runtime.run().await?;
    println!("{stats}");

    if stats.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(THRESHOLDS_FAILED_EXIT_CODE))
    }
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "stampede=info,stampede_runtime=info",
        1 => "stampede=debug,stampede_runtime=debug",
        _ => "stampede=trace,stampede_runtime=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    FmtSubscriber::builder().with_env_filter(filter).init();
}
