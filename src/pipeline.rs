//! The import pipeline: fetch → decode → synthesize → write → activate.
//!
//! Fully sequential. The lock file is held from before the fetch until the
//! function returns, so overlapping invocations cannot interleave writes to
//! the shared profile.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::clash::ClashClient;
use crate::config::{self, AppConfig};
use crate::error::ImportError;
use crate::node::{decode_line, NodeRegistry};
use crate::profile::constants::GROUP_PROXY;
use crate::profile::writer::{restore_backup, write_atomic, ImportLock};
use crate::profile::{resolve_mode, synthesize, Mode};
use crate::subscription::Fetcher;

const ACTIVATE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct ImportOutcome {
    pub nodes: usize,
    pub skipped: usize,
    pub mode: Mode,
    pub profile_path: PathBuf,
}

/// Run one full import of `url`. On any fatal error the previously written
/// document is left in place (or restored, for activation failures).
pub async fn run_import(cfg: &AppConfig, url: &str) -> Result<ImportOutcome, ImportError> {
    let profile_path = cfg
        .profile_path()
        .map_err(|e| ImportError::SubscriptionFetch(e.to_string()))?;
    let _lock = ImportLock::acquire(&profile_path)?;

    let fetcher = Fetcher::new()?;
    let lines = fetcher.fetch(url).await?;
    info!(lines = lines.len(), "fetched subscription");

    let mut registry = NodeRegistry::new();
    for line in &lines {
        match decode_line(line) {
            Ok(node) => registry.push(node),
            Err(err) => registry.record_failure(line, &err),
        }
    }
    info!(
        decoded = registry.len(),
        skipped = registry.failed(),
        "decoded subscription lines"
    );

    // The subscription carries no mode information; the only prior state
    // read back is the TUN flag of the previous document.
    let mode = resolve_mode(&profile_path);
    let doc = synthesize(&registry, mode)?;

    let client = ClashClient::new(cfg.api_url.clone(), cfg.secret.clone());
    // Reloading resets every selector to its first member. Remember the
    // current pick so it can be restored when it survives the regeneration.
    let previous_selection = match client.get_group(GROUP_PROXY).await {
        Ok(group) => group.now,
        Err(_) => None,
    };

    let backup = write_atomic(&doc, &profile_path)?;

    if let Err(err) = config::store_last_url(url) {
        warn!(%err, "failed to persist subscription URL");
    }

    if let Err(err) = activate(&client, &profile_path).await {
        if let Some(backup) = backup {
            if let Err(restore_err) = restore_backup(&profile_path, &backup) {
                warn!(%restore_err, "rollback after failed activation also failed");
            } else {
                // Best effort: point the engine back at the restored file.
                let _ = client.reload(&profile_path).await;
            }
        }
        return Err(ImportError::Reload(err.to_string()));
    }

    if let Some(previous) = previous_selection {
        if registry.names().iter().any(|name| *name == previous) {
            match client.select_proxy(GROUP_PROXY, &previous).await {
                Ok(()) => info!(node = %previous, "restored previous node selection"),
                Err(err) => warn!(%err, "could not restore previous node selection"),
            }
        }
    }

    Ok(ImportOutcome {
        nodes: registry.len(),
        skipped: registry.failed(),
        mode,
        profile_path,
    })
}

async fn activate(client: &ClashClient, profile_path: &std::path::Path) -> anyhow::Result<()> {
    client.reload(profile_path).await?;
    client.wait_active(ACTIVATE_TIMEOUT).await
}
