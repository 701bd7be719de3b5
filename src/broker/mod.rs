//! Host daemon: keeps data objects alive for other processes.
//!
//! Sources publish formats into objects they own; consumers query,
//! fetch and enumerate them. Everything lives in memory and dies with
//! the owning connection or the daemon.
//!
//! Architecture: channel-based actor. A single broker loop owns all
//! mutable state ([`state::BrokerState`]), so data-object calls never
//! run concurrently. Per-connection tasks forward requests over mpsc
//! and wait for the reply on a oneshot.

mod connection;
mod handler;
pub mod state;

use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

use connection::{BrokerCommand, DisconnectNotice};
use state::{BrokerState, ConnectionId, HostConfig};

use crate::ipc::resolve_socket_path;

/// Broker startup/runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker already running at {0}")]
    AlreadyRunning(PathBuf),
    #[error("failed to create directory {path}: {source}")]
    MkdirFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to bind socket {path}: {source}")]
    BindFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the host until SIGTERM or SIGINT.
///
/// - Socket at `socket`, or the per-user default (directory mode 0700)
/// - Stale socket detection and cleanup
/// - On shutdown every hosted object is cleared and the socket removed
pub async fn run(config: HostConfig, socket: Option<PathBuf>) -> Result<(), BrokerError> {
    let private_dir = socket.is_none();
    let socket_path = resolve_socket_path(socket);
    let listener = bind_socket(&socket_path, private_dir).await?;

    tracing::info!(
        path = %socket_path.display(),
        max_objects = config.max_objects,
        max_formats = config.max_formats,
        max_enumerators = config.max_enumerators,
        "broker listening"
    );

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
        }
    };

    serve(listener, BrokerState::new(config), shutdown).await;

    if let Err(e) = std::fs::remove_file(&socket_path) {
        tracing::warn!(error = %e, path = %socket_path.display(), "failed to remove socket");
    }

    tracing::info!("broker stopped");
    Ok(())
}

/// The broker loop. Returns once `shutdown` resolves, after releasing
/// every hosted object.
async fn serve(listener: UnixListener, mut state: BrokerState, shutdown: impl Future<Output = ()>) {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<BrokerCommand>();
    let (disconnect_tx, mut disconnect_rx) = mpsc::unbounded_channel::<DisconnectNotice>();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => accept_connection(stream, &cmd_tx, &disconnect_tx),
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                }
            }

            Some(cmd) = cmd_rx.recv() => {
                let response = handler::handle_message(&mut state, cmd.request, cmd.connection_id);
                let _ = cmd.response_tx.send(response);
            }

            Some(notice) = disconnect_rx.recv() => {
                let conn_id = notice.connection_id;
                state.remove_connection(conn_id);
                tracing::debug!(?conn_id, "connection cleaned up");
            }

            _ = &mut shutdown => break,
        }
    }

    let report = state.release_all();
    tracing::info!(
        released = report.released,
        failed = report.failed,
        "hosted objects released"
    );
}

fn accept_connection(
    stream: UnixStream,
    cmd_tx: &mpsc::UnboundedSender<BrokerCommand>,
    disconnect_tx: &mpsc::UnboundedSender<DisconnectNotice>,
) {
    let conn_id = ConnectionId::new();
    connection::spawn_connection(stream, conn_id, cmd_tx.clone(), disconnect_tx.clone());
    tracing::debug!(?conn_id, "accepted connection");
}

// -- Socket setup --

/// Create the socket directory and bind the Unix listener.
///
/// On `EADDRINUSE` the existing socket is probed: a live peer means
/// another broker is running, otherwise the file is stale and replaced.
/// `private_dir` forces the parent directory to mode 0700 even when it
/// already existed.
async fn bind_socket(path: &Path, private_dir: bool) -> Result<UnixListener, BrokerError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        let created = !parent.exists();
        if created {
            std::fs::create_dir_all(parent).map_err(|e| BrokerError::MkdirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        if created || private_dir {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700)).map_err(
                |e| BrokerError::MkdirFailed {
                    path: parent.to_path_buf(),
                    source: e,
                },
            )?;
        }
    }

    let bind_failed = |source| BrokerError::BindFailed {
        path: path.to_path_buf(),
        source,
    };

    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            if UnixStream::connect(path).await.is_ok() {
                return Err(BrokerError::AlreadyRunning(path.to_path_buf()));
            }
            tracing::info!(path = %path.display(), "removing stale socket");
            std::fs::remove_file(path).map_err(bind_failed)?;
            UnixListener::bind(path).map_err(bind_failed)
        }
        Err(e) => Err(bind_failed(e)),
    }
}
