//! Axum web server: REST endpoints, SSE live streams and monitoring.

pub mod routes;
pub mod stream;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_http::cors::CorsLayer;

use crate::actors::Actor;
use crate::state::SystemState;
use banker::RateLimitSection;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Shared state for the web layer.
pub struct WebState {
    pub root: Arc<SystemState>,
    pub addr: SocketAddr,
    pub stream_count: AtomicU64,
    pub request_count: AtomicU64,
}

impl WebState {
    pub fn new(root: Arc<SystemState>, addr: SocketAddr) -> Self {
        Self {
            root,
            addr,
            stream_count: AtomicU64::new(0),
            request_count: AtomicU64::new(0),
        }
    }
}

// ---------------------------------------------------------------------------
// WebActor: wraps the axum web server as a normal actor
// ---------------------------------------------------------------------------

/// Web server actor. Spawns a dedicated thread with its own tokio runtime
/// to run the axum server.
pub struct WebActor {
    addr: SocketAddr,
    shutdown_tx: Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
}

impl WebActor {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            shutdown_tx: Mutex::new(None),
        }
    }
}

impl Actor for WebActor {
    fn start(&self, state: Arc<SystemState>, _shutdown: Arc<AtomicBool>) {
        let addr = self.addr;
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        *self.shutdown_tx.lock().unwrap_or_else(|e| e.into_inner()) = Some(shutdown_tx);

        std::thread::Builder::new()
            .name(format!("web {addr}"))
            .spawn(move || {
                let rt = tokio::runtime::Runtime::new()
                    .expect("failed to create webserver tokio runtime");
                rt.block_on(run(addr, state, shutdown_rx));
            })
            .expect("failed to spawn webserver thread");
    }

    fn stop(&self) {
        if let Some(tx) = self
            .shutdown_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            let _ = tx.send(());
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Limit `router` to `per_day` requests per client, refilled evenly over a
/// day. A zero quota leaves the router unlimited.
fn limit_per_day(router: Router<Arc<WebState>>, per_day: u32) -> Router<Arc<WebState>> {
    if per_day == 0 {
        return router;
    }
    let period = Duration::from_secs(SECONDS_PER_DAY / u64::from(per_day)).max(Duration::from_secs(1));
    let config = GovernorConfigBuilder::default()
        .period(period)
        .burst_size(per_day)
        .key_extractor(SmartIpKeyExtractor)
        .finish();
    match config {
        Some(config) => router.layer(GovernorLayer {
            config: Arc::new(config),
        }),
        None => {
            tracing::warn!("invalid rate-limit config ({per_day}/day), route left unlimited");
            router
        }
    }
}

/// Build the full application router over `state`.
pub fn router(state: Arc<WebState>, limits: &RateLimitSection) -> Router {
    let mut create = Router::new().route("/api/banker/create", post(routes::post_create));
    let mut join = Router::new().route("/api/banker/join", post(routes::post_join));
    if limits.enabled {
        create = limit_per_day(create, limits.create_per_day);
        join = limit_per_day(join, limits.join_per_day);
    }

    // Request counter middleware
    let counter_state = Arc::clone(&state);
    let count_middleware = axum::middleware::from_fn(move |req, next: axum::middleware::Next| {
        let st = Arc::clone(&counter_state);
        async move {
            st.request_count.fetch_add(1, Ordering::Relaxed);
            next.run(req).await
        }
    });

    Router::new()
        .route("/api/banker/payment", post(routes::post_payment))
        .route("/api/banker/still-active", post(routes::post_still_active))
        .route("/api/banker/{game_id}/stream", get(stream::get_stream))
        .route("/api/monitoring/health", get(routes::get_health))
        .route(
            "/api/monitoring/dashboard/quick",
            get(routes::get_dashboard_quick),
        )
        .merge(create)
        .merge(join)
        .layer(count_middleware)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Web server run loop
// ---------------------------------------------------------------------------

/// Run the web server. Blocks until the shutdown signal.
async fn run(
    addr: SocketAddr,
    root: Arc<SystemState>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    let limits = root.system.snapshot().rate_limit;
    let state = Arc::new(WebState::new(root, addr));
    let app = router(Arc::clone(&state), &limits);

    // Retry bind until success or shutdown
    let mut shutdown_rx = shutdown_rx;
    let listener = loop {
        match tokio::net::TcpListener::bind(addr).await {
            Ok(l) => break l,
            Err(e) => {
                tracing::warn!("web server: failed to bind {addr}: {e}, retrying in 3s");
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(3)) => continue,
                    _ = &mut shutdown_rx => return,
                }
            }
        }
    };

    tracing::info!(
        "web server listening on {addr} (rate limits {})",
        if limits.enabled { "on" } else { "off" }
    );

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async { drop(shutdown_rx.await) })
    .await
    {
        tracing::warn!("web server on {addr} stopped: {e}");
    }
    tracing::info!(
        "web server on {} shut down after {} requests",
        state.addr,
        state.request_count.load(Ordering::Relaxed)
    );
}
