use std::net::SocketAddr;
use std::sync::{mpsc, OnceLock};
use tracing::error;
use tracing_subscriber::FmtSubscriber;

/// Starts the mock service once per test binary and returns its base URL.
///
/// The service runs on its own thread and runtime so it outlives the runtime of whichever test
/// started it.
#[allow(unused)]
pub fn init() -> &'static str {
    static BASE_URL: OnceLock<String> = OnceLock::new();

    BASE_URL.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter("stampede=debug,mock_service=info")
            .try_init();

        let (tx, rx) = mpsc::channel::<SocketAddr>();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                tx.send(listener.local_addr().unwrap()).unwrap();
                mock_service::serve(listener).await.unwrap();
            });
        });

        let addr = rx.recv().unwrap();
        format!("http://{addr}")
    })
}

/// A base URL nothing listens on.
#[allow(unused)]
pub fn closed_port() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
