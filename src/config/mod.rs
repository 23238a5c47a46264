use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// clashsub application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Clash External Controller API URL
    pub api_url: String,

    /// Optional secret for authentication
    pub secret: Option<String>,

    /// Where the generated configuration document is written
    #[serde(default)]
    pub profile_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:9090".to_string(),
            secret: None,
            profile_path: None,
        }
    }
}

impl AppConfig {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("config.yaml"))
    }

    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)?;
        let config: AppConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_yaml::to_string(self)?;
        fs::write(&path, contents)?;

        Ok(())
    }

    /// Merge command line arguments into config
    pub fn merge_cli(
        &mut self,
        api_url: Option<String>,
        secret: Option<String>,
        profile: Option<String>,
    ) {
        if let Some(url) = api_url {
            self.api_url = url;
        }

        if let Some(s) = secret {
            self.secret = Some(s);
        }

        if let Some(p) = profile {
            self.profile_path = Some(p);
        }
    }

    /// Resolved path of the generated configuration document.
    pub fn profile_path(&self) -> Result<PathBuf> {
        match &self.profile_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => Ok(config_dir()?.join("profile.yaml")),
        }
    }
}

fn config_dir() -> Result<PathBuf> {
    let config_dir =
        dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
    Ok(config_dir.join("clashsub"))
}

fn last_url_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("subscription.txt"))
}

/// The last successfully imported subscription URL, if any. Stored as a
/// single line so a bare invocation can refresh the current subscription.
pub fn load_last_url() -> Option<String> {
    let path = last_url_path().ok()?;
    let raw = fs::read_to_string(path).ok()?;
    let url = raw.trim();
    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}

/// Remember `url` for later refresh runs.
pub fn store_last_url(url: &str) -> Result<()> {
    let path = last_url_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format!("{url}\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api_url, "http://127.0.0.1:9090");
        assert!(config.secret.is_none());
        assert!(config.profile_path.is_none());
    }

    #[test]
    fn test_merge_cli_overrides() {
        let mut config = AppConfig::default();
        config.merge_cli(
            Some("http://127.0.0.1:9097".to_string()),
            Some("s3cret".to_string()),
            Some("/tmp/profile.yaml".to_string()),
        );
        assert_eq!(config.api_url, "http://127.0.0.1:9097");
        assert_eq!(config.secret.as_deref(), Some("s3cret"));
        assert_eq!(
            config.profile_path().unwrap(),
            PathBuf::from("/tmp/profile.yaml")
        );
    }
}
