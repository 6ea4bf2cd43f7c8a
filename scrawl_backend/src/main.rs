use std::env;

use axum::{Router, routing::get};
use chrono::Duration;
use scrawl_backend::{registry::RegistryHandle, socket};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scrawl_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let host = env::var("SCRAWL_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("SCRAWL_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8765);
    let session_timeout_min = env::var("SCRAWL_SESSION_TIMEOUT_MIN")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(60);
    let reap_interval_secs = env::var("SCRAWL_REAP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(300);

    // --- Registry + reaper ---
    let registry = RegistryHandle::spawn(Duration::minutes(session_timeout_min));
    info!("session timeout set to {} minute(s)", session_timeout_min);

    let reaper = registry.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(reap_interval_secs));
        interval.tick().await; // the first tick fires immediately
        loop {
            interval.tick().await;
            reaper.reap();
        }
    });

    // --- CORS Setup ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ws", get(socket::websocket_handler))
        .with_state(registry)
        .layer(cors);

    // Bind to 0.0.0.0 by default so the relay is reachable from other hosts
    // and containers.
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await.unwrap();
    info!("relay listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.unwrap();
}
