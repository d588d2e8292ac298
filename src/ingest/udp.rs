use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{info, warn};

use super::{IngestError, Result, append, stopped, terminate_line};
use crate::rotation::Rotator;

/// Largest UDP payload
const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

pub async fn bind(addr: SocketAddr) -> Result<UdpSocket> {
    UdpSocket::bind(addr)
        .await
        .map_err(|source| IngestError::Bind { addr, source })
}

/// Append each datagram as one line
pub async fn run(
    socket: UdpSocket,
    rotator: Arc<Rotator>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let address = socket.local_addr()?;
    info!(%address, "UDP listener receiving");

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        let n = tokio::select! {
            _ = stopped(shutdown.clone()) => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok((n, _)) => n,
                Err(e) => {
                    warn!(%address, error = %e, "UDP receive failed");
                    continue;
                }
            },
        };
        if n == 0 {
            continue;
        }

        let line = terminate_line(Bytes::copy_from_slice(&buf[..n]));
        append(&rotator, line).await?;
    }

    info!(%address, "UDP listener stopped");
    Ok(())
}
