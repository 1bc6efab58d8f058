//! Subcommands.

pub mod batch;
pub mod config;
pub mod process;

use std::path::{Path, PathBuf};

use tracing::debug;

use invex_core::InvexConfig;

/// Settings given on the command line that take precedence over the file.
pub struct ConfigOverrides {
    /// Explicit config file path.
    pub path: Option<String>,
    /// `--ai` / `--no-ai`.
    pub escalation: Option<bool>,
}

impl ConfigOverrides {
    /// Load the config file (explicit path, else the default location if it
    /// exists, else defaults) and apply the flag overrides.
    pub fn load(&self) -> anyhow::Result<InvexConfig> {
        let mut config = match &self.path {
            Some(path) => InvexConfig::from_file(Path::new(path))?,
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    debug!("Loading config from {}", default_path.display());
                    InvexConfig::from_file(&default_path)?
                } else {
                    InvexConfig::default()
                }
            }
        };

        if let Some(enabled) = self.escalation {
            config.escalation.enabled = enabled;
        }

        Ok(config)
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invex")
        .join("config.json")
}
