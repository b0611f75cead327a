//! Shared test utilities for integration tests.
//!
//! Starts the kernel HTTP API on an ephemeral port over an in-memory
//! execution environment, with temporary upload and download roots.

#![allow(dead_code)]

use anyhow::Result;
use pyexec_kernel::environment::MemoryEnvironment;
use pyexec_kernel::host::HostState;
use pyexec_kernel::infrastructure::config::{SessionSettings, WorkdirSettings};
use pyexec_kernel::infrastructure::server;
use pyexec_kernel::session::SystemClock;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A running kernel API plus the resources behind it.
pub struct IntegrationTestContext {
    /// Upload root.
    pub inbound: TempDir,
    /// Download root.
    pub outbound: TempDir,
    /// Environment the sessions live in.
    pub env: Arc<MemoryEnvironment>,
    /// Host state served by the API.
    pub host: Arc<HostState>,
    /// Base URL, e.g. `http://127.0.0.1:41234`.
    pub base_url: String,
    /// HTTP client.
    pub client: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<Result<()>>>,
}

impl IntegrationTestContext {
    /// Starts a server with default session settings.
    pub async fn new() -> Result<Self> {
        Self::with_session(SessionSettings::default()).await
    }

    /// Starts a server with custom session settings.
    pub async fn with_session(session: SessionSettings) -> Result<Self> {
        let inbound = TempDir::new()?;
        let outbound = TempDir::new()?;
        let workdirs = WorkdirSettings {
            base: inbound.path().to_path_buf(),
            input: Some(inbound.path().to_path_buf()),
            output: Some(outbound.path().to_path_buf()),
        };

        let env = Arc::new(MemoryEnvironment::new());
        let host = Arc::new(HostState::new(
            env.clone(),
            Arc::new(SystemClock),
            &session,
            &workdirs,
        )?);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let (tx, rx) = oneshot::channel::<()>();
        let app = server::app(host.clone(), None);
        let server = tokio::spawn(server::serve(listener, app, async move {
            let _ = rx.await;
        }));

        Ok(Self {
            inbound,
            outbound,
            env,
            host,
            base_url,
            client: reqwest::Client::new(),
            shutdown: Some(tx),
            server: Some(server),
        })
    }

    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Creates a file under the upload root.
    pub fn create_input_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.inbound.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// GETs `path` and returns status and JSON body.
    pub async fn get(&self, path: &str) -> Result<(u16, Value)> {
        let response = self.client.get(self.url(path)).send().await?;
        let status = response.status().as_u16();
        Ok((status, response.json().await?))
    }

    /// POSTs `body` to `path` and returns status and JSON body.
    pub async fn post(&self, path: &str, body: Value) -> Result<(u16, Value)> {
        let response = self.client.post(self.url(path)).json(&body).send().await?;
        let status = response.status().as_u16();
        Ok((status, response.json().await?))
    }

    /// PUTs `body` to `path` and returns status and JSON body.
    pub async fn put(&self, path: &str, body: Value) -> Result<(u16, Value)> {
        let response = self.client.put(self.url(path)).json(&body).send().await?;
        let status = response.status().as_u16();
        Ok((status, response.json().await?))
    }

    /// DELETEs `path` and returns status and JSON body.
    pub async fn delete(&self, path: &str) -> Result<(u16, Value)> {
        let response = self.client.delete(self.url(path)).send().await?;
        let status = response.status().as_u16();
        Ok((status, response.json().await?))
    }

    /// Stops the server and waits for it to exit.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            server.await??;
        }
        self.host.shutdown().await;
        Ok(())
    }
}
