//! Network producers feeding a shared [`Rotator`]
//!
//! Every adapter hands received bytes to the rotator on the blocking pool so
//! file I/O and rotation never stall the runtime. Listeners stop when the
//! shutdown channel flips to `true` (or its sender is dropped).

pub mod http;
pub mod tcp;
pub mod udp;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, http::StatusCode, response::IntoResponse};
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::ListenConfig;
use crate::rotation::{RotateError, Rotator};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("write failed: {0}")]
    Rotate(#[from] RotateError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("writer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// JSON error body returned by the HTTP listener
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

impl IngestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestError::Bind { .. } => StatusCode::SERVICE_UNAVAILABLE,
            IngestError::Rotate(_) | IngestError::Io(_) | IngestError::Join(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            IngestError::Bind { .. } => "BIND_FAILED",
            IngestError::Rotate(_) => "WRITE_FAILED",
            IngestError::Io(_) => "IO_ERROR",
            IngestError::Join(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Append `bytes` to the rotator from the blocking pool
pub async fn append(rotator: &Arc<Rotator>, bytes: Bytes) -> Result<usize> {
    let rotator = Arc::clone(rotator);
    let written = tokio::task::spawn_blocking(move || rotator.write(&bytes)).await??;
    Ok(written)
}

/// Ensure a non-empty record ends with a newline
pub fn terminate_line(bytes: Bytes) -> Bytes {
    if bytes.is_empty() || bytes.ends_with(b"\n") {
        return bytes;
    }
    let mut line = BytesMut::with_capacity(bytes.len() + 1);
    line.put_slice(&bytes);
    line.put_u8(b'\n');
    line.freeze()
}

/// Resolves once shutdown is requested
pub async fn stopped(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Bind every configured listener, then serve until shutdown
///
/// Binding happens up front so a bad address fails before anything runs.
pub async fn serve(
    listen: &ListenConfig,
    rotator: Arc<Rotator>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut tasks = JoinSet::new();

    for addr in &listen.tcp {
        let listener = tcp::bind(*addr).await?;
        tasks.spawn(tcp::run(listener, rotator.clone(), shutdown.clone()));
    }
    for addr in &listen.udp {
        let socket = udp::bind(*addr).await?;
        tasks.spawn(udp::run(socket, rotator.clone(), shutdown.clone()));
    }
    for addr in &listen.http {
        let listener = http::bind(*addr).await?;
        tasks.spawn(http::run(listener, rotator.clone(), shutdown.clone()));
    }

    info!(listeners = tasks.len(), "Ingest listeners running");

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.map_err(IngestError::from).and_then(|r| r);
        if let Err(e) = outcome {
            error!(error = %e, "Listener stopped with error");
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
