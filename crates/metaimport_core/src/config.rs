use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_AGENT: &str = "metaimport/0.1";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const CONFIG_FILENAME: &str = "metaimport.toml";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ImportConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub paths: PathsSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct StoreSection {
    pub api_url: Option<String>,
    pub user_agent: Option<String>,
    pub username: Option<String>,
    pub app_password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct PathsSection {
    pub root: Option<PathBuf>,
}

impl ImportConfig {
    /// Resolve the REST API base URL: env WP_API_URL > config > None.
    pub fn api_url(&self) -> Option<String> {
        env_value("WP_API_URL").or_else(|| self.store.api_url.clone())
    }

    /// Resolve user agent: env WP_USER_AGENT > config > DEFAULT_USER_AGENT.
    pub fn user_agent(&self) -> String {
        env_value("WP_USER_AGENT")
            .or_else(|| self.store.user_agent.clone())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    pub fn timeout_ms(&self) -> u64 {
        env_value("WP_HTTP_TIMEOUT_MS")
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    /// Resolve write credentials: env WP_APP_USER / WP_APP_PASS > config.
    /// Both halves must be present for the pair to count.
    pub fn credentials(&self) -> Option<(String, String)> {
        let username = env_value("WP_APP_USER").or_else(|| self.store.username.clone())?;
        let password = env_value("WP_APP_PASS").or_else(|| self.store.app_password.clone())?;
        Some((username, password))
    }

    /// Resolve the root directory input paths are relative to:
    /// flag > env METAIMPORT_ROOT > config > current directory.
    pub fn root(&self, flag: Option<&Path>) -> PathBuf {
        if let Some(path) = flag {
            return path.to_path_buf();
        }
        if let Some(value) = env_value("METAIMPORT_ROOT") {
            return PathBuf::from(value);
        }
        self.paths
            .root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Load and parse an ImportConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<ImportConfig> {
    if !config_path.exists() {
        return Ok(ImportConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: ImportConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

fn env_value(name: &str) -> Option<String> {
    let value = env::var(name).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
