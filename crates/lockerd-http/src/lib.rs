//! HTTP API surface for the lockerd lock service.
//!
//! The API is a thin collaborator around [`lockerd_core::LockManager`]:
//! every operation is a self-contained request that returns a definitive
//! result, so clients need no persistent session and no protocol-level
//! heartbeats beyond optional lease extensions.
//!
//! | Request | Operation |
//! |---|---|
//! | `POST /<path>` | acquire (blocks on the ticket outcome) |
//! | `DELETE /<path>?id=…` | release |
//! | `PATCH /<path>` | extend |
//! | `GET /<path>` | inspect one lock |
//! | `GET /` | inspect all locks |

pub mod duration;
pub mod handler;
mod response;

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use lockerd_core::LockManager;

/// Errors from running the API server.
#[derive(Error, Debug)]
pub enum ServeError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The server loop failed.
    #[error("server error: {source}")]
    Serve { source: std::io::Error },
}

/// Serves the locking API until interrupted.
///
/// Shuts down gracefully on SIGINT or SIGTERM: the listener stops
/// accepting and in-flight requests are allowed to finish.
pub async fn serve(addr: SocketAddr, manager: LockManager) -> Result<(), ServeError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;

    info!(%addr, "listening");

    axum::serve(listener, handler::router(manager))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|source| ServeError::Serve { source })
}

async fn shutdown_signal() {
    let interrupt = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}
