//! HTTP-over-unix-domain-socket client shared by the CLI's calls to the
//! broker and to individual sessions.
use anyhow::{Context, Result};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::Method;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;

pub struct UdsClient {
    socket_path: PathBuf,
    inner: Client<hyperlocal::UnixConnector, Full<Bytes>>,
}

impl UdsClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            inner: Client::builder(TokioExecutor::new()).build(hyperlocal::UnixConnector),
        }
    }

    async fn call<B: Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        route: &str,
        body: Option<&B>,
    ) -> Result<Option<R>> {
        let uri: hyper::Uri = hyperlocal::Uri::new(&self.socket_path, route).into();
        let body_bytes = match body {
            Some(b) => serde_json::to_vec(b)?,
            None => Vec::new(),
        };

        let mut builder = hyper::Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if !body_bytes.is_empty() {
            builder = builder.header("content-length", body_bytes.len());
        }
        let request = builder
            .body(Full::new(Bytes::from(body_bytes)))
            .context("failed to build request")?;

        let response = self
            .inner
            .request(request)
            .await
            .with_context(|| format!("request to {route} over {} failed", self.socket_path.display()))?;

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .context("failed to read response body")?
            .to_bytes();

        if status == hyper::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let detail = serde_json::from_slice::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
                .unwrap_or_else(|| String::from_utf8_lossy(&body).to_string());
            anyhow::bail!("{route} returned {status}: {detail}");
        }
        if body.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&body).with_context(|| {
            format!("failed to parse response body from {route}")
        })?))
    }

    pub async fn post<B: Serialize, R: DeserializeOwned>(&self, route: &str, body: &B) -> Result<Option<R>> {
        self.call(Method::POST, route, Some(body)).await
    }

    pub async fn delete<B: Serialize, R: DeserializeOwned>(&self, route: &str, body: &B) -> Result<Option<R>> {
        self.call(Method::DELETE, route, Some(body)).await
    }

    pub async fn get<R: DeserializeOwned>(&self, route: &str) -> Result<Option<R>> {
        self.call::<(), R>(Method::GET, route, None).await
    }
}
