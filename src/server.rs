use logbox::config::ListenConfig;
use logbox::ingest;
use logbox::rotation::Rotator;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Run the ingest listeners until a shutdown signal, then close the rotator
pub async fn run(listen: ListenConfig, rotator: Arc<Rotator>) -> Result<(), AnyError> {
    if listen.is_empty() {
        return Err("no listeners configured (use --tcp, --udp, --http or [listen])".into());
    }

    let opener = rotator.clone();
    tokio::task::spawn_blocking(move || opener.open()).await??;
    info!(path = %rotator.path().display(), "logbox serving");

    let (stop, stopped) = watch::channel(false);
    let serving = ingest::serve(&listen, rotator.clone(), stopped);
    tokio::pin!(serving);

    let outcome = tokio::select! {
        result = &mut serving => result,
        _ = shutdown_signal() => {
            let _ = stop.send(true);
            serving.await
        }
    };

    let closer = rotator.clone();
    tokio::task::spawn_blocking(move || closer.close()).await??;
    info!(metrics = ?rotator.metrics(), "logbox stopped");

    outcome.map_err(Into::into)
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
