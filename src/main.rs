//! Nurse Scheduling Service
//!
//! Run with: cargo run
//! Then POST an optimize request to http://localhost:8000/optimize
//! (GET /demo-data/SMALL for a ready-made payload).

use std::net::SocketAddr;

use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use nurse_scheduling::api;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // CORS for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::router().layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8000));
    info!("listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind address");
    axum::serve(listener, app).await.expect("serve");
}
