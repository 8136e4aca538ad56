use crate::error::{ArmadaError, Result};
use crate::io::atomic_write;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// ArmadaConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmadaConfig {
    /// Width of the dedup time bucket used by windowed disambiguators.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,

    /// Success sentinel additions/overrides: script id to regex pattern.
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,

    /// Verb-to-script additions/overrides.
    #[serde(default)]
    pub verbs: BTreeMap<String, String>,
}

fn default_window_seconds() -> u64 {
    60
}

impl Default for ArmadaConfig {
    fn default() -> Self {
        Self {
            window_seconds: default_window_seconds(),
            scripts: BTreeMap::new(),
            verbs: BTreeMap::new(),
        }
    }
}

impl ArmadaConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(ArmadaError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let config: ArmadaConfig = serde_yaml::from_str(&data)?;
        Ok(config)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        atomic_write(&paths::config_path(root), data.as_bytes())
    }

    /// Write a default config if none exists. Returns true if written.
    pub fn init(root: &Path) -> Result<bool> {
        if paths::config_path(root).exists() {
            return Ok(false);
        }
        ArmadaConfig::default().save(root)?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
