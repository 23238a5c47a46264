use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{GroupStatus, VersionResponse};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Clash External Controller API client. The engine is an external
/// collaborator: this crate only asks it to reload and to switch nodes.
#[derive(Debug, Clone)]
pub struct ClashClient {
    base_url: String,
    secret: Option<String>,
    client: HttpClient,
}

impl ClashClient {
    pub fn new(base_url: String, secret: Option<String>) -> Self {
        Self {
            base_url,
            secret,
            client: HttpClient::new(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url);

        if let Some(secret) = &self.secret {
            request = request.bearer_auth(secret);
        }

        let response = request
            .send()
            .await
            .context(format!("Failed to connect to Clash API at {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Clash API returned error: {} - {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse Clash API response")
    }

    async fn put(&self, path: &str, body: serde_json::Value) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.put(&url).json(&body);

        if let Some(secret) = &self.secret {
            request = request.bearer_auth(secret);
        }

        let response = request
            .send()
            .await
            .context(format!("Failed to connect to Clash API at {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Clash API returned error: {} - {}", status, body);
        }

        Ok(())
    }

    /// Engine version, also used as the liveness probe after a reload.
    pub async fn get_version(&self) -> Result<VersionResponse> {
        self.get("/version").await
    }

    /// Current selection and members of one selector group.
    pub async fn get_group(&self, name: &str) -> Result<GroupStatus> {
        self.get(&format!("/proxies/{}", name)).await
    }

    /// Switch a selector group to a specific node.
    pub async fn select_proxy(&self, selector: &str, proxy: &str) -> Result<()> {
        self.put(
            &format!("/proxies/{}", selector),
            serde_json::json!({ "name": proxy }),
        )
        .await
    }

    /// Ask the engine to reload its configuration from `config_path`.
    pub async fn reload(&self, config_path: &Path) -> Result<()> {
        debug!(path = %config_path.display(), "requesting engine reload");
        self.put(
            "/configs?force=true",
            serde_json::json!({ "path": config_path.to_string_lossy() }),
        )
        .await
    }

    /// Poll the controller until it answers again, bounded by `timeout`.
    pub async fn wait_active(&self, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.get_version().await {
                Ok(version) => {
                    debug!(version = %version.version, "engine reported active");
                    return Ok(());
                }
                Err(err) if tokio::time::Instant::now() >= deadline => {
                    anyhow::bail!("engine not active within {:?}: {}", timeout, err);
                }
                Err(_) => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }
}
