use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{IngestError, Result, append, stopped};
use crate::rotation::Rotator;

const READ_BUFFER_SIZE: usize = 8 * 1024;

pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| IngestError::Bind { addr, source })
}

/// Accept connections and stream their bytes into the rotator as read
pub async fn run(
    listener: TcpListener,
    rotator: Arc<Rotator>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let address = listener.local_addr()?;
    info!(%address, "TCP listener accepting");

    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = stopped(shutdown.clone()) => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "TCP connection opened");
                    connections.spawn(copy_stream(stream, peer, rotator.clone(), shutdown.clone()));
                }
                Err(e) => warn!(%address, error = %e, "Failed to accept connection"),
            },
        }
    }

    while connections.join_next().await.is_some() {}
    info!(%address, "TCP listener stopped");
    Ok(())
}

async fn copy_stream(
    mut stream: TcpStream,
    peer: SocketAddr,
    rotator: Arc<Rotator>,
    shutdown: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = tokio::select! {
            _ = stopped(shutdown.clone()) => break,
            read = stream.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!(%peer, error = %e, "TCP read failed");
                    break;
                }
            },
        };

        if let Err(e) = append(&rotator, Bytes::copy_from_slice(&buf[..n])).await {
            warn!(%peer, error = %e, "TCP copy failed");
            break;
        }
    }
    debug!(%peer, "TCP connection closed");
}
