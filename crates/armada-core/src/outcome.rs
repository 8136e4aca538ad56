//! Success/failure classification of captured command transcripts.
//!
//! Each remote script emits a fixed marker only when it finishes
//! successfully. Classification is a pure pattern check over the transcript:
//! the sentinel is present or the run failed. There is no third outcome, so
//! ambiguous or partial output always classifies as failure.

use crate::config::ArmadaConfig;
use crate::error::{ArmadaError, Result};
use regex::Regex;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Built-in catalog
// ---------------------------------------------------------------------------

/// Success sentinels for the stock scripts.
const BUILTIN_SENTINELS: &[(&str, &str)] = &[
    ("backup_restore.txt", "Backup has been completed"),
    ("site_sync.txt", "Site sync is complete"),
    ("replace_domain.txt", "Domain replace is complete"),
    ("clone_site.txt", "Clone site is complete"),
    ("delete_site.txt", "Site has been deleted"),
    ("update_php.txt", "PHP configuration updated"),
    ("staging.txt", "Staging site is complete"),
    ("update_themes_plugins.txt", "Themes and plugins have been updated"),
];

/// Which script each stock verb runs.
const BUILTIN_VERBS: &[(&str, &str)] = &[
    ("backup-run-manual", "backup_restore.txt"),
    ("backup-restore", "backup_restore.txt"),
    ("site-sync", "site_sync.txt"),
    ("replace_domain", "replace_domain.txt"),
    ("clone-site", "clone_site.txt"),
    ("delete-site", "delete_site.txt"),
    ("update-php", "update_php.txt"),
    ("staging-create", "staging.txt"),
    ("update-themes-and-plugins", "update_themes_plugins.txt"),
];

// ---------------------------------------------------------------------------
// ScriptCatalog
// ---------------------------------------------------------------------------

/// Maps verbs to the script they run and scripts to their success sentinel.
pub struct ScriptCatalog {
    verbs: HashMap<String, String>,
    sentinels: HashMap<String, Regex>,
}

impl ScriptCatalog {
    /// Catalog with only the built-in scripts and verbs.
    pub fn builtin() -> Self {
        let mut catalog = Self {
            verbs: HashMap::new(),
            sentinels: HashMap::new(),
        };
        for (script, sentinel) in BUILTIN_SENTINELS {
            // Built-in patterns are fixed strings and always compile.
            if let Ok(re) = Regex::new(&regex::escape(sentinel)) {
                catalog.sentinels.insert(script.to_string(), re);
            }
        }
        for (verb, script) in BUILTIN_VERBS {
            catalog.verbs.insert(verb.to_string(), script.to_string());
        }
        catalog
    }

    /// Built-in catalog with the config's additions and overrides applied.
    /// Config sentinel values are regex patterns.
    pub fn from_config(config: &ArmadaConfig) -> Result<Self> {
        let mut catalog = Self::builtin();
        for (script, pattern) in &config.scripts {
            catalog.register_script(script, pattern)?;
        }
        for (verb, script) in &config.verbs {
            catalog.register_verb(verb, script);
        }
        Ok(catalog)
    }

    /// Add or replace the success sentinel for `script_id`.
    pub fn register_script(&mut self, script_id: &str, pattern: &str) -> Result<()> {
        let re = Regex::new(pattern).map_err(|e| ArmadaError::InvalidPattern {
            script: script_id.to_string(),
            message: e.to_string(),
        })?;
        self.sentinels.insert(script_id.to_string(), re);
        Ok(())
    }

    /// Add or replace the script a verb runs.
    pub fn register_verb(&mut self, verb: &str, script_id: &str) {
        self.verbs.insert(verb.to_string(), script_id.to_string());
    }

    /// The script id a verb runs, if registered.
    pub fn script_for(&self, verb: &str) -> Option<&str> {
        self.verbs.get(verb).map(String::as_str)
    }

    /// True when `transcript` contains the success sentinel for `script_id`.
    /// Unknown script ids classify as failure.
    pub fn classify(&self, transcript: &str, script_id: &str) -> bool {
        self.sentinels
            .get(script_id)
            .map(|re| re.is_match(transcript))
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
