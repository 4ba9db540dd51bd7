//! TOML settings for the `retain` binary.
//!
//! ```toml
//! [engine]
//! capacity = 1000
//! merge_threshold = 0.8
//!
//! [server]
//! consolidate_every_secs = 300
//! ```
//!
//! Missing tables and keys fall back to the engine defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use retain_core::EngineConfig;
use serde::{Deserialize, Serialize};

pub const CONFIG_ENV: &str = "RETAIN_CONFIG";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub server: ServerSettings,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Run both consolidation passes on this period while serving. 0 disables.
    pub consolidate_every_secs: u64,
}

/// Explicit path wins, then `RETAIN_CONFIG`.
pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(|| {
        std::env::var(CONFIG_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
    })
}

pub fn parse(content: &str) -> Result<Settings> {
    let settings: Settings = toml::from_str(content).context("invalid TOML config")?;
    settings.engine.validate()?;
    Ok(settings)
}

/// Load settings from `path`, or defaults when no path is configured.
pub fn load(path: Option<&Path>) -> Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let settings =
        parse(&content).with_context(|| format!("failed to load config {}", path.display()))?;
    tracing::info!("loaded config from {}", path.display());
    Ok(settings)
}

pub fn render(settings: &Settings) -> Result<String> {
    toml::to_string_pretty(settings).context("failed to render config")
}
