// SPDX-License-Identifier: MIT
//! Minimal JSON-RPC 2.0 envelope and `Content-Length`-framed stdio transport,
//! matching LSP 3.17's mandated stdio transport.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{ChildStdin, ChildStdout};

#[derive(Debug, Serialize, Deserialize)]
pub struct LspMessage {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

impl LspMessage {
    pub fn request(id: u64, method: &str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: Some(serde_json::json!(id)),
            method: Some(method.into()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    pub fn notification(method: &str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: None,
            method: Some(method.into()),
            params: Some(params),
            result: None,
            error: None,
        }
    }
}

/// Write side of the stdio transport.
pub struct Writer {
    stdin: ChildStdin,
}

impl Writer {
    pub fn new(stdin: ChildStdin) -> Self {
        Self { stdin }
    }

    pub fn send(&mut self, msg: &LspMessage) -> Result<()> {
        let body = serde_json::to_string(msg)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        self.stdin.write_all(header.as_bytes())?;
        self.stdin.write_all(body.as_bytes())?;
        self.stdin.flush()?;
        Ok(())
    }
}

/// Read side of the stdio transport.
pub struct Reader {
    stdout: BufReader<ChildStdout>,
}

impl Reader {
    pub fn new(stdout: ChildStdout) -> Self {
        Self {
            stdout: BufReader::new(stdout),
        }
    }

    /// Read the next complete LSP message, parsing the `Content-Length`
    /// header then exactly that many body bytes.
    pub fn recv(&mut self) -> Result<LspMessage> {
        let mut content_length: Option<usize> = None;
        loop {
            let mut line = String::new();
            let n = self.stdout.read_line(&mut line)?;
            if n == 0 {
                anyhow::bail!("LSP server closed stdout");
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                break;
            }
            if let Some(value) = line.strip_prefix("Content-Length: ") {
                content_length = Some(value.trim().parse()?);
            }
        }
        let length = content_length.context("LSP message missing Content-Length header")?;
        let mut body = vec![0u8; length];
        self.stdout.read_exact(&mut body)?;
        serde_json::from_slice(&body).context("failed to parse LSP JSON body")
    }

    /// True if at least one byte is already buffered (non-blocking peek),
    /// used to drain server-pushed notifications without hanging.
    pub fn has_buffered_data(&mut self) -> bool {
        self.stdout.fill_buf().map(|b| !b.is_empty()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_has_id_and_method() {
        let msg = LspMessage::request(7, "textDocument/hover", serde_json::json!({}));
        assert_eq!(msg.jsonrpc, "2.0");
        assert_eq!(msg.method.as_deref(), Some("textDocument/hover"));
        assert!(msg.id.is_some());
    }

    #[test]
    fn notification_has_no_id() {
        let msg = LspMessage::notification("initialized", serde_json::json!({}));
        assert!(msg.id.is_none());
    }

    #[test]
    fn roundtrips_through_json() {
        let msg = LspMessage::request(1, "initialize", serde_json::json!({"rootUri": "file:///tmp"}));
        let json = serde_json::to_string(&msg).unwrap();
        let back: LspMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.method.as_deref(), Some("initialize"));
    }
}
