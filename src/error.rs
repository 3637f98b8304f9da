//! Structured error taxonomy shared across the broker, session, and CLI layers.
use std::path::PathBuf;

/// Errors a caller needs to distinguish from a bare string message.
#[derive(Debug, thiserror::Error)]
pub enum LspCliError {
    #[error("no language server is registered for {path}")]
    UnsupportedPath { path: PathBuf },

    #[error("the language server for this workspace does not support {capability}")]
    CapabilityUnsupported { capability: &'static str },

    #[error("language server for {workspace_root} exited unexpectedly: {reason}")]
    ServerFault {
        workspace_root: PathBuf,
        reason: String,
    },

    #[error("language server returned a protocol error: {0}")]
    ProtocolError(String),

    #[error("could not reach the broker at {socket}: {reason}")]
    BrokerUnreachable { socket: PathBuf, reason: String },

    #[error("could not parse `{input}`: {reason}")]
    ParseError { input: String, reason: String },

    #[error("session did not become ready within {0:?}")]
    StartupTimeout(std::time::Duration),
}
