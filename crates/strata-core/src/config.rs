use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, StrataError};

/// Top-level configuration for a Strata deployment.
///
/// Loaded from a TOML file. Each section covers one concern; all fields have
/// defaults so a partial (or missing) file is usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrataConfig {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub client: ClientSettings,
}

impl StrataConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: StrataConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| StrataError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// Default store resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Name the engine resolves to a storage location and schema.
    pub name: String,
    /// Open an anonymous throwaway store instead of a named one.
    pub ephemeral: bool,
    /// Whether read contexts pick up commits automatically or only after an
    /// explicit refresh.
    pub merge_on_commit: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            name: "strata".to_string(),
            ephemeral: false,
            merge_on_commit: true,
        }
    }
}

/// Client-side operation tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Number of matching ids fetched per round while deleting. Bounds the
    /// working set on large stores; the delete still commits once.
    pub delete_batch_size: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            delete_batch_size: 256,
        }
    }
}
