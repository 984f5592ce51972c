//! Main server loop and worker pool.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use aria_auth::UserStore;
use aria_config::Config;

use crate::error::ServerError;
use crate::handler::handle_conn;
use crate::router::Router;
use crate::util::{create_listener, ConnectionGuard, ConnectionTracker};

/// Default graceful shutdown timeout.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Run the server with a cancellation token for graceful shutdown.
///
/// The worker pool is a semaphore of `max_workers` permits acquired
/// before `accept`: when every worker is busy the loop stops accepting
/// and excess clients queue in the kernel backlog instead of being
/// turned away.
pub async fn run_with_shutdown<S: UserStore + 'static>(
    config: Config,
    store: Arc<S>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let listen: SocketAddr = config
        .server
        .listen
        .parse()
        .map_err(|_| ServerError::Config("invalid listen address".into()))?;

    let listener = create_listener(listen, config.server.connection_backlog)?;
    info!(
        address = %listen,
        backlog = config.server.connection_backlog,
        workers = config.server.max_workers,
        "listening"
    );

    let router = Arc::new(Router::new(store));
    let tracker = ConnectionTracker::new();
    let workers = Arc::new(Semaphore::new(config.server.max_workers));

    loop {
        // Wait for a free worker slot before accepting.
        let permit = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }

            permit = workers.clone().acquire_owned() => {
                let Ok(permit) = permit else {
                    // The semaphore is never closed.
                    break;
                };
                permit
            }
        };

        let (tcp, peer) = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }

            result = listener.accept() => result?,
        };

        debug!(peer = %peer, "new connection");

        let router = router.clone();
        tracker.increment();
        let guard = ConnectionGuard::new(tracker.clone());

        tokio::spawn(async move {
            let _guard = guard; // ensure decrement on drop
            let _permit = permit; // worker slot held for the connection's lifetime

            if let Err(err) = handle_conn(tcp, router, peer).await {
                warn!(peer = %peer, error = %err, "connection closed with error");
            } else {
                debug!(peer = %peer, "connection closed");
            }
        });
    }

    // Graceful drain: wait for active connections
    let active = tracker.count();
    if active > 0 {
        info!("waiting for {} active connections to drain", active);
        if tracker.wait_for_zero(DEFAULT_SHUTDOWN_TIMEOUT).await {
            info!("all connections drained");
        } else {
            warn!(
                "shutdown timeout, {} connections still active",
                tracker.count()
            );
        }
    }

    info!("server stopped");
    Ok(())
}

/// Run the server (blocking until error, no graceful shutdown).
pub async fn run<S: UserStore + 'static>(config: Config, store: Arc<S>) -> Result<(), ServerError> {
    run_with_shutdown(config, store, CancellationToken::new()).await
}
