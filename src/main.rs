use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use dotenvy::dotenv;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

mod auth;
mod catalog;
mod config;
mod db;
mod errors;
mod handlers;
mod prompt;
mod providers;
mod state;
mod storage;
mod utils;

use config::Config;
use db::database::Database;
use handlers::checkout::checkout_handler;
use handlers::generate::generate_handler;
use handlers::health_handler;
use handlers::proxy::proxy_image_handler;
use handlers::webhook::stripe_webhook_handler;
use state::AppState;
use utils::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = Config::load()?;
    let _guards = init_logging(&config.log_level);
    config.log_startup_modes();

    info!("Starting FanShot API");

    let db = Database::init(&config.database_url).await?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    // Request bodies carry a base64 selfie, so leave headroom over the raw
    // byte limit for the JSON envelope and base64 expansion.
    let body_limit = config.max_selfie_bytes * 2;
    let state = AppState::new(config, db);

    let app = Router::new()
        .route("/api/generate", post(generate_handler))
        .route("/api/checkout", post(checkout_handler))
        .route("/api/webhook/stripe", post(stripe_webhook_handler))
        .route("/api/proxy-image", get(proxy_image_handler))
        .route("/api/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
