use axum::{
    debug_handler,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use lazy_static::lazy_static;
use metrics::counter;
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tower_http::trace::TraceLayer;
#[allow(unused)]
use tracing::{debug, error, info, warn};

const VERSION: &str = "1.0.0";

#[derive(Debug)]
pub struct AppState {
    start: Instant,
    requests: AtomicU64,
    healthy: AtomicBool,
    ready: AtomicBool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            start: Instant::now(),
            requests: AtomicU64::new(0),
            healthy: AtomicBool::new(true),
            ready: AtomicBool::new(true),
        }
    }
}

impl AppState {
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    fn uptime_seconds(&self) -> f64 {
        (self.start.elapsed().as_secs_f64() * 100.).round() / 100.
    }
}

pub type SharedState = Arc<AppState>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/api/data", get(data))
        .route("/api/status", get(status))
        .route("/api/slow", get(slow))
        .route("/api/flaky", get(flaky))
        .route("/admin/break", post(break_app))
        .route("/admin/fix", post(fix_app))
        .route("/delay/ms/:delay_ms", get(delay))
        .route("/status/:code", get(fixed_status))
        .route("/limited/:max_tps/name/:name", get(limited))
        .layer(middleware::from_fn_with_state(state.clone(), count_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(addr: SocketAddr) -> anyhow::Result<()> {
    serve(tokio::net::TcpListener::bind(&addr).await?).await
}

pub async fn serve(listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    info!("Mock service listening on {}", listener.local_addr()?);
    axum::serve(listener, router(SharedState::default())).await?;
    Ok(())
}

async fn count_requests(State(state): State<SharedState>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let res = next.run(req).await;
    state.requests.fetch_add(1, Ordering::Relaxed);
    counter!("mock_service.requests", "status" => res.status().as_u16().to_string())
        .increment(1);
    debug!("{method} {path} -> {}", res.status());
    res
}

fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[derive(Serialize)]
struct Info {
    message: &'static str,
    version: &'static str,
    status: &'static str,
    uptime_seconds: f64,
    total_requests: u64,
}

#[debug_handler]
async fn root(State(state): State<SharedState>) -> Json<Info> {
    Json(Info {
        message: "Mock Service",
        version: VERSION,
        status: "operational",
        uptime_seconds: state.uptime_seconds(),
        total_requests: state.requests(),
    })
}

#[derive(Serialize)]
struct Probe {
    status: &'static str,
    timestamp: u64,
}

async fn health(State(state): State<SharedState>) -> Result<Json<Probe>, StatusCode> {
    if !state.healthy.load(Ordering::Relaxed) {
        warn!("Health check failed; service marked unhealthy");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(Probe {
        status: "healthy",
        timestamp: timestamp(),
    }))
}

async fn ready(State(state): State<SharedState>) -> Result<Json<Probe>, StatusCode> {
    if !state.ready.load(Ordering::Relaxed) {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(Probe {
        status: "ready",
        timestamp: timestamp(),
    }))
}

#[derive(Serialize)]
struct Item {
    id: u32,
    value: u32,
}

#[derive(Serialize)]
struct Data {
    data: Vec<Item>,
    processed: bool,
    processing_time_ms: u64,
}

/// Simulated processing time of 10 to 100ms.
#[debug_handler]
async fn data() -> Json<Data> {
    let (processing_ms, data) = {
        let mut rng = rand::thread_rng();
        let data = (1..=3)
            .map(|id| Item {
                id,
                value: rng.gen_range(1..=100),
            })
            .collect();
        (rng.gen_range(10..=100), data)
    };
    tokio::time::sleep(Duration::from_millis(processing_ms)).await;

    Json(Data {
        data,
        processed: true,
        processing_time_ms: processing_ms,
    })
}

#[derive(Serialize)]
struct Status {
    status: &'static str,
    version: &'static str,
    uptime_seconds: f64,
    total_requests: u64,
    healthy: bool,
    ready: bool,
}

async fn status(State(state): State<SharedState>) -> Json<Status> {
    Json(Status {
        status: "operational",
        version: VERSION,
        uptime_seconds: state.uptime_seconds(),
        total_requests: state.requests(),
        healthy: state.healthy.load(Ordering::Relaxed),
        ready: state.ready.load(Ordering::Relaxed),
    })
}

async fn slow() -> String {
    let delay_ms = rand::thread_rng().gen_range(500..=2000);
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    format!("slept {delay_ms}ms")
}

/// Fails one request in ten.
async fn flaky() -> Result<&'static str, StatusCode> {
    if rand::thread_rng().gen_bool(0.1) {
        debug!("Flaky endpoint failing");
        Err(StatusCode::INTERNAL_SERVER_ERROR)
    } else {
        Ok("success")
    }
}

async fn break_app(State(state): State<SharedState>) -> &'static str {
    warn!("Service manually set to unhealthy");
    state.healthy.store(false, Ordering::Relaxed);
    state.ready.store(false, Ordering::Relaxed);
    "broken"
}

async fn fix_app(State(state): State<SharedState>) -> &'static str {
    info!("Service manually restored");
    state.healthy.store(true, Ordering::Relaxed);
    state.ready.store(true, Ordering::Relaxed);
    "fixed"
}

#[debug_handler]
async fn delay(Path(delay_ms): Path<u64>) {
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

async fn fixed_status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(code) => code.into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

lazy_static! {
    static ref LIMITERS: RwLock<HashMap<String, Arc<DefaultDirectRateLimiter>>> =
        RwLock::new(HashMap::new());
}

/// Answers 429 once `name` exceeds `max_tps` requests per second.
#[debug_handler]
async fn limited(Path((max_tps, name)): Path<(u32, String)>) -> StatusCode {
    let Some(tps) = NonZeroU32::new(max_tps) else {
        return StatusCode::BAD_REQUEST;
    };

    let existing = LIMITERS
        .read()
        .ok()
        .and_then(|map| map.get(&name).cloned());
    let limiter = match existing {
        Some(limiter) => limiter,
        None => {
            let limiter = Arc::new(RateLimiter::direct(Quota::per_second(tps)));
            match LIMITERS.write() {
                Ok(mut map) => map.entry(name).or_insert(limiter).clone(),
                Err(_) => limiter,
            }
        }
    };

    match limiter.check() {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::TOO_MANY_REQUESTS,
    }
}
