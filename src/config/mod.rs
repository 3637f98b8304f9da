use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;
const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_RETENTION_DAYS: u32 = 1;

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Seconds of inactivity before a session shuts itself down (default: 300).
    idle_timeout_secs: Option<u64>,
    /// Seconds to wait for a new session's LSP handshake to complete (default: 30).
    startup_timeout_secs: Option<u64>,
    /// Log level filter string, e.g. "debug", "info,lsp_cli=trace" (default: "info").
    log: Option<String>,
    /// How many days of rotated log files to keep (default: 1; 0 = keep forever).
    log_retention_days: Option<u32>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── AppConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Where unix-domain sockets (broker + sessions) are created.
    pub runtime_dir: PathBuf,
    /// Where `manager.log` and `clients/<id>.log` are written.
    pub log_dir: PathBuf,
    /// Where `config.toml` lives.
    pub data_dir: PathBuf,
    pub log: String,
    pub idle_timeout: Duration,
    pub startup_timeout: Duration,
    pub log_retention_days: u32,
}

impl AppConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)`
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        data_dir: Option<PathBuf>,
        runtime_dir: Option<PathBuf>,
        log_dir: Option<PathBuf>,
        idle_timeout_secs: Option<u64>,
        log: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let toml = load_toml(&data_dir).unwrap_or_default();

        let runtime_dir = runtime_dir
            .or_else(|| std::env::var_os("LSP_CLI_RUNTIME_DIR").map(PathBuf::from))
            .unwrap_or_else(default_runtime_dir);
        let log_dir = log_dir
            .or_else(|| std::env::var_os("LSP_CLI_LOG_DIR").map(PathBuf::from))
            .unwrap_or_else(|| data_dir.join("logs"));

        let idle_timeout_secs = idle_timeout_secs
            .or_else(|| {
                std::env::var("LSP_CLI_IDLE_TIMEOUT")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .or(toml.idle_timeout_secs)
            .unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS);

        let startup_timeout_secs = toml
            .startup_timeout_secs
            .unwrap_or(DEFAULT_STARTUP_TIMEOUT_SECS);

        let log = log
            .or_else(|| std::env::var("LSP_CLI_LOG").ok())
            .or(toml.log)
            .unwrap_or_else(|| "info".to_string());

        let log_retention_days = toml
            .log_retention_days
            .unwrap_or(DEFAULT_LOG_RETENTION_DAYS);

        Self {
            runtime_dir,
            log_dir,
            data_dir,
            log,
            idle_timeout: Duration::from_secs(idle_timeout_secs),
            startup_timeout: Duration::from_secs(startup_timeout_secs),
            log_retention_days,
        }
    }

    pub fn broker_socket(&self) -> PathBuf {
        self.runtime_dir.join("lsp-cli-manager.sock")
    }

    pub fn session_socket(&self, session_id: &str) -> PathBuf {
        self.runtime_dir.join(format!("{session_id}.sock"))
    }

    pub fn manager_log_path(&self) -> PathBuf {
        self.log_dir.join("manager.log")
    }

    pub fn session_log_path(&self, session_id: &str) -> PathBuf {
        self.log_dir.join("clients").join(format!("{session_id}.log"))
    }
}

// ─── Hot-reloadable config subset ─────────────────────────────────────────────

/// Non-critical config fields that can be changed without restarting the broker.
#[derive(Debug, Clone)]
pub struct HotConfig {
    pub log_level: String,
    pub idle_timeout: Duration,
}

/// Watches `config.toml` for changes and reloads non-critical fields.
///
/// Only `log` and `idle_timeout_secs` are reloaded; runtime/log directories
/// are startup-only fields and require a full restart.
pub struct ConfigWatcher {
    pub hot: Arc<RwLock<HotConfig>>,
    _watcher: notify_debouncer_full::Debouncer<
        notify_debouncer_full::notify::RecommendedWatcher,
        notify_debouncer_full::FileIdMap,
    >,
}

impl ConfigWatcher {
    /// Start watching `{data_dir}/config.toml` for changes.
    ///
    /// Returns `None` if the watcher could not be created (non-fatal; the
    /// broker runs fine without hot-reload).
    pub fn start(data_dir: &Path) -> Option<Self> {
        let config_path = data_dir.join("config.toml");
        let initial = load_hot_config(&config_path);
        let hot = Arc::new(RwLock::new(initial));

        let hot_clone = hot.clone();
        let config_path_clone = config_path.clone();
        let rt_handle = tokio::runtime::Handle::current();

        let watcher = notify_debouncer_full::new_debouncer(
            Duration::from_secs(2),
            None,
            move |result: notify_debouncer_full::DebounceEventResult| {
                if let Ok(events) = result {
                    let relevant = events.iter().any(|e| {
                        use notify_debouncer_full::notify::EventKind;
                        matches!(e.event.kind, EventKind::Modify(_) | EventKind::Create(_))
                    });
                    if relevant {
                        let hot = hot_clone.clone();
                        let path = config_path_clone.clone();
                        rt_handle.spawn(async move {
                            let new_config = load_hot_config(&path);
                            let mut guard = hot.write().await;
                            if guard.log_level != new_config.log_level
                                || guard.idle_timeout != new_config.idle_timeout
                            {
                                info!(
                                    log_level = %new_config.log_level,
                                    idle_timeout = ?new_config.idle_timeout,
                                    "config.toml reloaded"
                                );
                                *guard = new_config;
                            }
                        });
                    }
                }
            },
        );

        match watcher {
            Ok(mut debouncer) => {
                use notify_debouncer_full::notify::Watcher as _;
                let watch_path = config_path.parent().unwrap_or_else(|| Path::new("."));
                if let Err(e) = debouncer.watcher().watch(
                    watch_path,
                    notify_debouncer_full::notify::RecursiveMode::NonRecursive,
                ) {
                    warn!("config watcher failed to start: {e} — hot-reload disabled");
                    return None;
                }
                info!(path = %config_path.display(), "config hot-reload watcher started");
                Some(Self {
                    hot,
                    _watcher: debouncer,
                })
            }
            Err(e) => {
                warn!("config watcher creation failed: {e} — hot-reload disabled");
                None
            }
        }
    }
}

fn load_hot_config(path: &Path) -> HotConfig {
    let toml = std::fs::read_to_string(path)
        .ok()
        .and_then(|s| toml::from_str::<TomlConfig>(&s).ok())
        .unwrap_or_default();
    HotConfig {
        log_level: toml.log.unwrap_or_else(|| "info".to_string()),
        idle_timeout: Duration::from_secs(
            toml.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS),
        ),
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("lsp-cli");
        }
    }
    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("lsp-cli");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local").join("share").join("lsp-cli");
        }
    }
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("lsp-cli");
        }
    }
    PathBuf::from(".lsp-cli")
}

fn default_runtime_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_RUNTIME_DIR") {
            return PathBuf::from(xdg).join("lsp-cli");
        }
    }
    std::env::temp_dir().join("lsp-cli")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_defaults_when_nothing_set() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = AppConfig::new(Some(tmp.path().to_path_buf()), None, None, None, None);
        assert_eq!(cfg.idle_timeout, Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS));
        assert_eq!(cfg.log, "info");
    }

    #[test]
    fn new_respects_explicit_idle_timeout() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = AppConfig::new(Some(tmp.path().to_path_buf()), None, None, Some(42), None);
        assert_eq!(cfg.idle_timeout, Duration::from_secs(42));
    }

    #[test]
    fn socket_paths_are_namespaced_under_runtime_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = AppConfig::new(
            Some(tmp.path().to_path_buf()),
            Some(tmp.path().join("run")),
            None,
            None,
            None,
        );
        assert_eq!(
            cfg.broker_socket(),
            tmp.path().join("run").join("lsp-cli-manager.sock")
        );
        assert_eq!(
            cfg.session_socket("python-deadbeef-default"),
            tmp.path().join("run").join("python-deadbeef-default.sock")
        );
    }
}
