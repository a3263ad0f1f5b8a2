//! Issuer configuration management.
//!
//! Configuration is read from TOML at `$REELUP_ISSUER_CONFIG`, or:
//! - Linux: `~/.config/reelup/issuer.toml`
//! - Windows: `%APPDATA%/reelup/issuer.toml`
//!
//! `REELUP_PROJECT_URL`, `REELUP_ANON_KEY` and `REELUP_BIND` override the file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

const CONFIG_ENV: &str = "REELUP_ISSUER_CONFIG";

/// Issuer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Socket address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Base URL of the hosted project (auth and storage).
    #[serde(default)]
    pub project_url: String,

    /// Public API key sent to the auth provider.
    #[serde(default)]
    pub anon_key: String,

    /// Storage host override. Derived from `project_url` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_url: Option<String>,
}

fn default_bind() -> String {
    "0.0.0.0:8787".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            project_url: String::new(),
            anon_key: String::new(),
            storage_url: None,
        }
    }
}

impl Config {
    /// Loads configuration from disk and the environment.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(config_path);

        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`, falling back to defaults if it does not exist.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Applies environment overrides looked up through `var`.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("REELUP_PROJECT_URL") {
            self.project_url = url;
        }
        if let Some(key) = var("REELUP_ANON_KEY") {
            self.anon_key = key;
        }
        if let Some(bind) = var("REELUP_BIND") {
            self.bind = bind;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.project_url.trim().is_empty() {
            anyhow::bail!("project_url is not configured (set it in the config file or REELUP_PROJECT_URL)");
        }
        Ok(())
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("reelup")
            .join("issuer.toml")
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("reelup").join("issuer.toml")
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        PathBuf::from("/tmp/reelup/issuer.toml")
    }
}
