//! Runtime configuration.
//!
//! Resolved in layers: built-in defaults, an optional JSON file, environment
//! overrides, then command-line flags (applied by the binary).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::catalog::ScanMode;
use crate::system_hotkeys::{SystemHotkeyRegistry, DEFAULT_SYSTEM_OWNER};

/// Path of a JSON config file to load
pub const ENV_CONFIG_PATH: &str = "HOTKEY_DETECTOR_CONFIG";
/// Overrides `hotkey_store_path`
pub const ENV_STORE_PATH: &str = "HOTKEY_DETECTOR_STORE";
/// Overrides `permission_settle_ms`
pub const ENV_SETTLE_MS: &str = "HOTKEY_DETECTOR_SETTLE_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub scan_mode: ScanMode,
    /// Symbolic hotkey store; `None` means the per-user default location
    pub hotkey_store_path: Option<PathBuf>,
    /// Wait after the accessibility prompt before re-checking trust
    pub permission_settle_ms: u64,
    pub system_owner_label: String,
    /// `tracing` filter used when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            scan_mode: ScanMode::default(),
            hotkey_store_path: None,
            permission_settle_ms: 1000,
            system_owner_label: DEFAULT_SYSTEM_OWNER.to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl DetectorConfig {
    /// Defaults, then `file` (or the file named by `HOTKEY_DETECTOR_CONFIG`),
    /// then environment overrides
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let env_file = std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from);
        let mut config = match file.map(Path::to_path_buf).or(env_file) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(store) = lookup(ENV_STORE_PATH).filter(|s| !s.is_empty()) {
            self.hotkey_store_path = Some(PathBuf::from(store));
        }
        if let Some(settle) = lookup(ENV_SETTLE_MS) {
            self.permission_settle_ms = settle.trim().parse().with_context(|| {
                format!("{} must be milliseconds, got '{}'", ENV_SETTLE_MS, settle)
            })?;
        }
        Ok(())
    }

    pub fn permission_settle(&self) -> Duration {
        Duration::from_millis(self.permission_settle_ms)
    }

    /// Registry for the configured store, or the default location
    pub fn hotkey_registry(&self) -> Option<SystemHotkeyRegistry> {
        let registry = match &self.hotkey_store_path {
            Some(path) => SystemHotkeyRegistry::new(path),
            None => SystemHotkeyRegistry::at_default_location()?,
        };
        Some(registry.with_owner_label(self.system_owner_label.clone()))
    }
}
