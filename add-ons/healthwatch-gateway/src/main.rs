//! HTTP entry point: scheduled/manual scan triggers, the review endpoint,
//! and read-only dashboard views over the stores (§6).

mod auth;
mod handlers;
mod state;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use healthwatch_core::Config;
use state::AppState;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into())))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "config load failed");
            std::process::exit(1);
        }
    };
    let port = config.port;
    let state = AppState::new(config);

    let cors = CorsLayer::new().allow_methods([Method::GET, Method::POST]).allow_headers(Any).allow_origin(Any);

    let app = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/trigger/scan", post(handlers::trigger_scan))
        .route("/trigger/weekly", post(handlers::trigger_weekly))
        .route("/trigger/manual", post(handlers::trigger_manual))
        .route("/review", post(handlers::review_decision))
        .route("/overview", get(handlers::overview))
        .route("/pages", get(handlers::list_pages))
        .route("/findings", get(handlers::list_findings))
        .route("/trends", get(handlers::trends))
        .route("/conversion-audit", get(handlers::conversion_audit_latest))
        .layer(cors)
        .with_state(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "healthwatch-gateway listening");
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }
}
