// SPDX-License-Identifier: MIT
//! Owns one LSP server subprocess: spawn, initialize handshake, request/
//! notification framing, and the advertised server capability set.
use crate::lsp::wire::{LspMessage, Reader, Writer};
use crate::registry::LanguageDescriptor;
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::{Child, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Which LSP capabilities the server advertised in its `initialize` response.
///
/// Populated once at startup; consulted by `session` to reject requests the
/// underlying server cannot serve instead of forwarding them and getting a
/// protocol error back.
#[derive(Debug, Clone, Default)]
pub struct ServerCapabilities {
    pub definition: bool,
    pub hover: bool,
    pub references: bool,
    pub document_symbol: bool,
    pub workspace_symbol: bool,
    pub rename: bool,
}

impl ServerCapabilities {
    fn from_initialize_result(result: &serde_json::Value) -> Self {
        let caps = result.get("capabilities");
        let has = |key: &str| {
            caps.and_then(|c| c.get(key))
                .map(|v| !v.is_null() && v != &serde_json::Value::Bool(false))
                .unwrap_or(false)
        };
        Self {
            definition: has("definitionProvider"),
            hover: has("hoverProvider"),
            references: has("referencesProvider"),
            document_symbol: has("documentSymbolProvider"),
            workspace_symbol: has("workspaceSymbolProvider"),
            rename: has("renameProvider"),
        }
    }
}

/// A single running LSP server subprocess, bound to one workspace root.
///
/// Requests are serialized internally by holding `&mut self`; callers share
/// this behind a `tokio::sync::Mutex` so concurrent capability calls queue
/// rather than interleave on the wire.
pub struct LspProcess {
    child: Child,
    writer: Writer,
    reader: Reader,
    next_id: AtomicU64,
    pub capabilities: ServerCapabilities,
    pub workspace_root: std::path::PathBuf,
}

impl LspProcess {
    /// Spawn the server described by `descriptor` rooted at `workspace_root`
    /// and run the `initialize` / `initialized` handshake.
    pub fn start(descriptor: &LanguageDescriptor, workspace_root: &Path) -> Result<Self> {
        info!(
            language = descriptor.kind,
            cmd = descriptor.server_command,
            root = %workspace_root.display(),
            "launching LSP server"
        );

        let mut cmd = std::process::Command::new(descriptor.server_command);
        cmd.args(descriptor.server_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .current_dir(workspace_root);

        let mut child = cmd.spawn().with_context(|| {
            format!(
                "failed to spawn LSP server for {}: {}",
                descriptor.kind, descriptor.server_command
            )
        })?;

        let stdin = child.stdin.take().context("child stdin not available")?;
        let stdout = child.stdout.take().context("child stdout not available")?;

        let mut proc = Self {
            child,
            writer: Writer::new(stdin),
            reader: Reader::new(stdout),
            next_id: AtomicU64::new(1),
            capabilities: ServerCapabilities::default(),
            workspace_root: workspace_root.to_path_buf(),
        };

        let workspace_uri = format!("file://{}", workspace_root.display());
        let init_params = serde_json::json!({
            "processId": std::process::id(),
            "clientInfo": { "name": "lsp-cli", "version": env!("CARGO_PKG_VERSION") },
            "rootUri": workspace_uri,
            "capabilities": {
                "textDocument": {
                    "synchronization": { "dynamicRegistration": false },
                    "completion": { "completionItem": { "snippetSupport": false } },
                    "hover": { "contentFormat": ["plaintext", "markdown"] },
                    "definition": { "linkSupport": false },
                    "references": {},
                    "documentSymbol": { "hierarchicalDocumentSymbolSupport": true },
                    "rename": { "prepareSupport": false },
                    "publishDiagnostics": { "relatedInformation": false }
                },
                "workspace": {
                    "applyEdit": false,
                    "workspaceEdit": { "documentChanges": false },
                    "symbol": {}
                }
            },
            "workspaceFolders": [{
                "uri": workspace_uri,
                "name": workspace_root.file_name().unwrap_or_default().to_string_lossy(),
            }],
        });

        let result = proc.request("initialize", init_params)?;
        proc.capabilities = ServerCapabilities::from_initialize_result(&result);
        proc.notify("initialized", serde_json::json!({}))?;

        debug!(language = descriptor.kind, pid = proc.pid(), "LSP server initialized");
        Ok(proc)
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn is_alive(&mut self) -> bool {
        self.child.try_wait().ok().flatten().is_none()
    }

    fn alloc_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Send a request and block until the matching response arrives,
    /// skipping any notifications interleaved on the wire.
    pub fn request(&mut self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let id = self.alloc_id();
        let req = LspMessage::request(id, method, params);
        self.writer.send(&req)?;

        loop {
            let msg = self.reader.recv()?;
            if msg.id.is_none() {
                debug!(method = ?msg.method, "lsp notification (skipped while awaiting response)");
                continue;
            }
            let resp_id = msg.id.as_ref().and_then(|v| v.as_u64()).unwrap_or(u64::MAX);
            if resp_id != id {
                debug!(resp_id, expected = id, "lsp response id mismatch, skipping");
                continue;
            }
            if let Some(error) = msg.error {
                bail!("LSP error response: {error}");
            }
            return Ok(msg.result.unwrap_or(serde_json::Value::Null));
        }
    }

    pub fn notify(&mut self, method: &str, params: serde_json::Value) -> Result<()> {
        self.writer.send(&LspMessage::notification(method, params))
    }

    /// Drain up to `max` already-buffered messages matching `method`,
    /// without blocking for ones that haven't arrived yet.
    pub fn drain_notifications(&mut self, method: &str, max: usize) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        for _ in 0..max {
            if !self.reader.has_buffered_data() {
                break;
            }
            match self.reader.recv() {
                Ok(msg) if msg.method.as_deref() == Some(method) => {
                    if let Some(params) = msg.params {
                        out.push(params);
                    }
                }
                Ok(_) => continue,
                Err(_) => break,
            }
        }
        out
    }

    /// Run the LSP `shutdown` / `exit` sequence and wait for the child to exit.
    pub fn shutdown(&mut self) {
        let _ = self.request("shutdown", serde_json::Value::Null);
        let _ = self.notify("exit", serde_json::json!({}));
        let _ = self.child.wait();
    }
}

impl Drop for LspProcess {
    fn drop(&mut self) {
        if self.is_alive() {
            warn!(pid = self.pid(), "killing still-running LSP server on drop");
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
