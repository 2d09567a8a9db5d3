pub mod api;
mod middleware;

pub use api::{ApiState, build_api_router};
pub use middleware::{RequestContext, log_responses, set_request_context};

use std::future::IntoFuture;
use std::time::Duration;

use axum::Router;
use futures::channel::oneshot;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::infra::error::InfraError;

/// Serves `router` until SIGINT/SIGTERM, then drains in-flight requests for
/// at most `grace`.
pub async fn serve(listener: TcpListener, router: Router, grace: Duration) -> Result<(), InfraError> {
    if let Ok(addr) = listener.local_addr() {
        info!(target = "listings::http", %addr, "listening");
    }

    let (notify, signalled) = oneshot::channel::<()>();
    let shutdown = async move {
        shutdown_signal().await;
        let _ = notify.send(());
    };

    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown)
        .into_future();
    tokio::pin!(server);

    let deadline = async move {
        if signalled.await.is_ok() {
            tokio::time::sleep(grace).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = &mut server => result.map_err(InfraError::from),
        () = deadline => {
            warn!(
                target = "listings::http",
                grace_secs = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "listings::http", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target = "listings::http", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!(target = "listings::http", "shutdown signal received");
}
