use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::info;

use super::{IngestError, Result, append, stopped, terminate_line};
use crate::rotation::Rotator;

pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| IngestError::Bind { addr, source })
}

/// Routes: `POST /` and `POST /logs` append the body, `GET /health` probes
pub fn router(rotator: Arc<Rotator>) -> Router {
    Router::new()
        .route("/", post(ingest))
        .route("/logs", post(ingest))
        .route("/health", get(health))
        .with_state(rotator)
        // gzip/deflate request bodies are decoded before the handler sees them
        .layer(RequestDecompressionLayer::new())
}

pub async fn run(
    listener: TcpListener,
    rotator: Arc<Rotator>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let address = listener.local_addr()?;
    info!(%address, "HTTP listener accepting");

    axum::serve(listener, router(rotator).into_make_service())
        .with_graceful_shutdown(stopped(shutdown))
        .await?;

    info!(%address, "HTTP listener stopped");
    Ok(())
}

async fn ingest(
    State(rotator): State<Arc<Rotator>>,
    body: Bytes,
) -> std::result::Result<StatusCode, IngestError> {
    if !body.is_empty() {
        append(&rotator, terminate_line(body)).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
