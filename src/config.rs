//! On-disk configuration for the model-interaction side of the crate.
//!
//! Adapted from the teacher's `Config::load_or_init` (`src/config/schema/core/loader.rs`):
//! resolve a per-user config directory via `directories`, create a default
//! file on first run, otherwise load and parse the existing one.

use crate::error::ConfigError;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f64 {
    0.2
}

/// The interface this crate presents to its model-interaction collaborator
/// — everything needed to call a chat-completion endpoint, plus an
/// informational cap on executor concurrency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_temperature")]
    pub default_temperature: f64,
    #[serde(default)]
    pub max_parallel_steps: Option<usize>,

    #[serde(skip)]
    config_path: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            default_model: default_model(),
            default_temperature: default_temperature(),
            max_parallel_steps: None,
            config_path: None,
        }
    }
}

impl ModelConfig {
    fn project_dirs() -> Result<ProjectDirs, ConfigError> {
        ProjectDirs::from("", "", "dagplan")
            .ok_or_else(|| ConfigError::Load("could not resolve a home directory".to_string()))
    }

    fn default_config_path() -> Result<PathBuf, ConfigError> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Loads `~/.config/dagplan/config.toml` (platform-appropriate path),
    /// creating it with defaults on first run. Any `~`/`$VAR` occurring in
    /// a loaded path-shaped value is expanded via `shellexpand`, matching
    /// the teacher's habit of expanding user-supplied paths even when
    /// nothing downstream reads them yet.
    pub fn load_or_init() -> Result<Self, ConfigError> {
        let path = Self::default_config_path()?;

        if !path.exists() {
            let config = Self {
                config_path: Some(path.clone()),
                ..Self::default()
            };
            config.save()?;
            return Ok(config);
        }

        let raw = std::fs::read_to_string(&path)?;
        let mut config: Self = toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.config_path = Some(path);

        if let Some(endpoint) = &config.endpoint {
            config.endpoint = Some(shellexpand::full(endpoint).map(|s| s.into_owned()).unwrap_or_else(|_| endpoint.clone()));
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = match &self.config_path {
            Some(path) => path.clone(),
            None => Self::default_config_path()?,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = toml::to_string_pretty(self).map_err(|e| ConfigError::Save(e.to_string()))?;
        std::fs::write(&path, serialized)?;
        Ok(())
    }
}
