//! Holds the session table: creates, reuses, deletes, and lists sessions.
use crate::config::AppConfig;
use crate::registry::Registry;
use crate::session::{self, Session, SessionInfo};
use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Table key: the hash-based id alone is not unique enough to rule out
/// collisions between distinct roots, so the table is keyed on
/// (language kind, canonicalized root) instead; `id` is only the display
/// name / socket filename.
type TableKey = (&'static str, PathBuf);

pub struct Manager {
    config: Arc<AppConfig>,
    registry: Registry,
    sessions: Mutex<HashMap<TableKey, Arc<Session>>>,
}

impl Manager {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            registry: Registry::new(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn supported_kinds(&self) -> Vec<&'static str> {
        self.registry.supported_kinds()
    }

    /// Resolve `path` to a (kind, root); create the session if absent,
    /// reuse and reset-deadline it if present. Returns the session's socket.
    pub async fn create(&self, path: &Path) -> Result<PathBuf> {
        let target = self.registry.find_target(path).ok_or_else(|| {
            crate::error::LspCliError::UnsupportedPath {
                path: path.to_path_buf(),
            }
        })?;
        let root = target.project_root.clone();
        let key: TableKey = (target.descriptor.kind, root.clone());

        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.get(&key) {
            existing.reset_deadline().await;
            return Ok(existing.socket_path.clone());
        }

        let session = Session::new(target.descriptor, root, &self.config);
        let socket_path = session.socket_path.clone();
        let descriptor = target.descriptor.clone();
        let startup_timeout = self.config.startup_timeout;

        match session::spawn_and_wait_ready(session.clone(), descriptor, startup_timeout).await {
            Ok(session) => {
                sessions.insert(key, session);
                Ok(socket_path)
            }
            Err(e) => {
                error!(err = %e, root = %path.display(), "session failed to become ready");
                Err(e)
            }
        }
    }

    /// Idempotent: deleting an absent target succeeds and returns `None`.
    pub async fn delete(&self, path: &Path) -> Result<Option<SessionInfo>> {
        let Some(target) = self.registry.find_target(path) else {
            return Ok(None);
        };
        let key: TableKey = (target.descriptor.kind, target.project_root);
        let mut sessions = self.sessions.lock().await;
        match sessions.remove(&key) {
            Some(session) => {
                let info = session.info().await;
                session.stop();
                Ok(Some(info))
            }
            None => Ok(None),
        }
    }

    pub async fn inspect(&self, path: &Path) -> Result<Option<SessionInfo>> {
        let Some(target) = self.registry.find_target(path) else {
            return Ok(None);
        };
        let key: TableKey = (target.descriptor.kind, target.project_root);
        let sessions = self.sessions.lock().await;
        match sessions.get(&key) {
            Some(session) => Ok(Some(session.info().await)),
            None => Ok(None),
        }
    }

    pub async fn list(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.lock().await;
        let mut out = Vec::with_capacity(sessions.len());
        for session in sessions.values() {
            out.push(session.info().await);
        }
        out
    }

    /// Remove any sessions that have reached `Stopped` from the table. The
    /// session's own run-task already tore down its socket and subprocess;
    /// this just keeps the table from accumulating dead entries between
    /// idle-expiry events and the next `/list` call.
    pub async fn reap_stopped(&self) {
        let mut sessions = self.sessions.lock().await;
        let mut dead = Vec::new();
        for (key, session) in sessions.iter() {
            if session.state().await == session::SessionState::Stopped {
                dead.push(key.clone());
            }
        }
        for key in dead {
            sessions.remove(&key);
        }
    }

    /// Stop every managed session, used by the broker's own `/shutdown` route.
    pub async fn stop_all(&self) {
        let sessions = self.sessions.lock().await;
        for session in sessions.values() {
            session.stop();
        }
        info!(count = sessions.len(), "stopping all sessions");
    }
}
