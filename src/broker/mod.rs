//! The broker's own HTTP control-plane (`/create`, `/delete`, `/list`,
//! `/shutdown`) and the CLI-side auto-spawn/connect logic.
mod routes;

use crate::config::AppConfig;
use crate::manager::Manager;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixListener;
use tracing::info;

pub use routes::{CreateRequest, CreateResponse, DeleteRequest, DeleteResponse};

/// Run the broker: bind the well-known socket and serve until `/shutdown`
/// or SIGTERM. Relies on the OS for process lifetime — there is no
/// self-shutdown timer (see design notes on broker lifecycle).
pub async fn run(config: Arc<AppConfig>) -> Result<()> {
    std::fs::create_dir_all(&config.runtime_dir)
        .context("failed to create runtime directory")?;
    std::fs::create_dir_all(&config.log_dir).context("failed to create log directory")?;

    let socket_path = config.broker_socket();
    let _ = std::fs::remove_file(&socket_path);

    let manager = Arc::new(Manager::new(config.clone()));
    let shutdown = tokio_util::sync::CancellationToken::new();
    let app = routes::router(manager.clone(), shutdown.clone());

    let listener = UnixListener::bind(&socket_path)
        .with_context(|| format!("failed to bind broker socket at {}", socket_path.display()))?;
    info!(socket = %socket_path.display(), "broker listening");

    let reap_handle = {
        let manager = manager.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(5));
            loop {
                ticker.tick().await;
                manager.reap_stopped().await;
            }
        })
    };

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await;
    reap_handle.abort();
    manager.stop_all().await;
    let _ = std::fs::remove_file(&socket_path);
    result.context("broker HTTP server error")
}

#[cfg(unix)]
async fn shutdown_signal(requested: tokio_util::sync::CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut interrupt = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    tokio::select! {
        _ = term.recv() => {}
        _ = interrupt.recv() => {}
        _ = requested.cancelled() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal(requested: tokio_util::sync::CancellationToken) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = requested.cancelled() => {}
    }
}

/// Probe whether the broker socket has a live listener (connect attempt,
/// not just path existence — a stale socket file from a crashed broker
/// must be treated as dead).
pub async fn is_broker_alive(socket_path: &Path) -> bool {
    tokio::net::UnixStream::connect(socket_path).await.is_ok()
}

/// Auto-spawn a broker if the well-known socket is dead, then return a
/// client bound to it. Tolerates the race where two CLI invocations both
/// observe the socket dead and both spawn: the loser's bind fails with
/// `AddrInUse` and it exits; this function always re-probes and re-dials
/// rather than assuming its own spawned process won.
pub async fn connect(config: &AppConfig) -> Result<crate::ipc::UdsClient> {
    let socket_path = config.broker_socket();

    if !is_broker_alive(&socket_path).await {
        spawn_detached_broker()?;
    }

    let mut delay = Duration::from_millis(20);
    for attempt in 0..5 {
        if is_broker_alive(&socket_path).await {
            return Ok(crate::ipc::UdsClient::new(socket_path));
        }
        if attempt < 4 {
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }

    Err(crate::error::LspCliError::BrokerUnreachable {
        socket: socket_path,
        reason: "exhausted retries while waiting for broker to start".to_string(),
    }
    .into())
}

fn spawn_detached_broker() -> Result<()> {
    let exe = std::env::current_exe().context("failed to locate current executable")?;
    std::process::Command::new(exe)
        .arg("server")
        .arg("run-broker")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .context("failed to spawn broker process")?;
    Ok(())
}
