//! A session owns one LSP subprocess for one (language, project-root) pair,
//! serves its capability HTTP surface over a unix-domain socket, and enforces
//! an idle timeout.
mod handlers;

use crate::config::AppConfig;
use crate::lsp::process::LspProcess;
use crate::registry::LanguageDescriptor;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UnixListener;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Deterministic session id: `<language-kind>-<32-bit-hash(project-root)>-default`.
///
/// Used as the human-visible name and socket filename. The manager's table
/// key additionally carries the canonicalized root so a 32-bit hash
/// collision between two distinct roots cannot collapse them into one entry.
pub fn session_id(kind: &str, project_root: &Path) -> String {
    let path_str = project_root.to_string_lossy();
    let hash = xxhash_rust::xxh32::xxh32(path_str.as_bytes(), 0);
    format!("{kind}-{hash:08x}-default")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Ready,
    Stopping,
    Stopped,
}

/// Point-in-time info returned by `/list` and `inspect`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub project_root: PathBuf,
    pub language: String,
    pub remaining_time_secs: f64,
}

struct Deadline {
    instant: RwLock<Instant>,
    notify: Notify,
}

impl Deadline {
    fn new(idle_timeout: Duration) -> Self {
        Self {
            instant: RwLock::new(Instant::now() + idle_timeout),
            notify: Notify::new(),
        }
    }

    async fn reset(&self, idle_timeout: Duration) {
        *self.instant.write().await = Instant::now() + idle_timeout;
        self.notify.notify_one();
    }

    async fn remaining(&self) -> Duration {
        self.instant
            .read()
            .await
            .saturating_duration_since(Instant::now())
    }
}

/// A running session: one LSP subprocess, one unix-domain socket, one
/// idle-watchdog task.
pub struct Session {
    pub id: String,
    pub project_root: PathBuf,
    pub language_kind: &'static str,
    pub socket_path: PathBuf,
    idle_timeout: Duration,
    deadline: Arc<Deadline>,
    state: RwLock<SessionState>,
    should_exit: AtomicBool,
    cancel: CancellationToken,
    process: Mutex<Option<LspProcess>>,
}

impl Session {
    pub fn new(
        descriptor: &LanguageDescriptor,
        project_root: PathBuf,
        config: &AppConfig,
    ) -> Arc<Self> {
        let id = session_id(descriptor.kind, &project_root);
        let socket_path = config.session_socket(&id);
        Arc::new(Self {
            id,
            project_root,
            language_kind: descriptor.kind,
            socket_path,
            idle_timeout: config.idle_timeout,
            deadline: Arc::new(Deadline::new(config.idle_timeout)),
            state: RwLock::new(SessionState::Starting),
            should_exit: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            process: Mutex::new(None),
        })
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub async fn reset_deadline(&self) {
        self.deadline.reset(self.idle_timeout).await;
    }

    pub async fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            project_root: self.project_root.clone(),
            language: self.language_kind.to_string(),
            remaining_time_secs: self.deadline.remaining().await.as_secs_f64(),
        }
    }

    pub fn stop(&self) {
        self.should_exit.store(true, Ordering::SeqCst);
        self.cancel.cancel();
    }

    async fn wait_ready(self: &Arc<Self>, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.state().await {
                SessionState::Ready => return Ok(()),
                SessionState::Stopping | SessionState::Stopped => {
                    anyhow::bail!("session for {} failed to start", self.project_root.display());
                }
                SessionState::Starting => {
                    if Instant::now() >= deadline {
                        return Err(crate::error::LspCliError::StartupTimeout(timeout).into());
                    }
                    tokio::time::sleep(Duration::from_millis(25)).await;
                }
            }
        }
    }

    /// Startup sequence + serve loop. Runs until cancelled (idle expiry,
    /// `/shutdown`, or manager-initiated delete), then tears everything down.
    async fn run(self: Arc<Self>, descriptor: LanguageDescriptor) {
        let _ = std::fs::remove_file(&self.socket_path);
        if let Some(parent) = self.socket_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                error!(err = %e, "failed to create runtime dir for session socket");
                *self.state.write().await = SessionState::Stopped;
                return;
            }
        }

        let root = self.project_root.clone();
        let proc = match tokio::task::spawn_blocking(move || LspProcess::start(&descriptor, &root))
            .await
        {
            Ok(Ok(proc)) => proc,
            Ok(Err(e)) => {
                error!(err = %e, root = %self.project_root.display(), "LSP initialize handshake failed");
                *self.state.write().await = SessionState::Stopped;
                return;
            }
            Err(e) => {
                error!(err = %e, "LSP startup task panicked");
                *self.state.write().await = SessionState::Stopped;
                return;
            }
        };
        *self.process.lock().await = Some(proc);

        let listener = match UnixListener::bind(&self.socket_path) {
            Ok(l) => l,
            Err(e) => {
                error!(err = %e, socket = %self.socket_path.display(), "failed to bind session socket");
                *self.state.write().await = SessionState::Stopped;
                return;
            }
        };

        *self.state.write().await = SessionState::Ready;
        info!(id = %self.id, root = %self.project_root.display(), "session ready");

        let watchdog = tokio::spawn(self.clone().idle_watchdog());

        let app = handlers::router(self.clone());
        let serve = axum::serve(listener, app).with_graceful_shutdown(self.cancel.clone().cancelled_owned());
        if let Err(e) = serve.await {
            warn!(err = %e, "session HTTP server exited with error");
        }

        *self.state.write().await = SessionState::Stopping;
        watchdog.abort();

        if let Some(mut proc) = self.process.lock().await.take() {
            tokio::task::spawn_blocking(move || proc.shutdown()).await.ok();
        }
        let _ = std::fs::remove_file(&self.socket_path);
        *self.state.write().await = SessionState::Stopped;
        info!(id = %self.id, "session stopped");
    }

    async fn idle_watchdog(self: Arc<Self>) {
        loop {
            if self.should_exit.load(Ordering::SeqCst) {
                self.stop();
                return;
            }
            let remaining = self.deadline.remaining().await;
            if remaining.is_zero() {
                info!(id = %self.id, "session idle timeout elapsed");
                self.stop();
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(remaining) => continue,
                _ = self.deadline.notify.notified() => continue,
                _ = self.cancel.cancelled() => return,
            }
        }
    }

    /// Run a synchronous LSP call on a blocking thread, holding the async
    /// process lock for its duration so concurrent capability calls queue
    /// rather than interleave on the subprocess's stdio.
    pub async fn with_process<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut LspProcess) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut guard = self.process.lock().await;
        let mut proc = guard
            .take()
            .context("session has no running LSP process")?;
        let (result, proc) = tokio::task::spawn_blocking(move || {
            let result = f(&mut proc);
            (result, proc)
        })
        .await
        .context("LSP process task panicked")?;
        *guard = Some(proc);
        result
    }
}

/// Spawn a session's run-task onto the given join set / task tracker and
/// return a handle once it's past `starting`.
pub async fn spawn_and_wait_ready(
    session: Arc<Session>,
    descriptor: LanguageDescriptor,
    startup_timeout: Duration,
) -> Result<Arc<Session>> {
    let run_session = session.clone();
    tokio::spawn(run_session.run(descriptor));
    session.wait_ready(startup_timeout).await?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_is_deterministic() {
        let root = PathBuf::from("/home/user/project");
        let a = session_id("rust", &root);
        let b = session_id("rust", &root);
        assert_eq!(a, b);
        assert!(a.starts_with("rust-"));
        assert!(a.ends_with("-default"));
    }

    #[test]
    fn session_id_differs_by_kind_and_root() {
        let root = PathBuf::from("/home/user/project");
        let rust_id = session_id("rust", &root);
        let python_id = session_id("python", &root);
        assert_ne!(rust_id, python_id);

        let other_root = PathBuf::from("/home/user/other");
        assert_ne!(session_id("rust", &root), session_id("rust", &other_root));
    }
}
