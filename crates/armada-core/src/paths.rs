use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Control directory layout
// ---------------------------------------------------------------------------

pub const ARMADA_DIR: &str = ".armada";
pub const CONFIG_FILE: &str = ".armada/config.yaml";
pub const QUEUE_DB_FILE: &str = ".armada/queue.redb";
pub const META_DB_FILE: &str = ".armada/meta.redb";
pub const TRANSCRIPTS_DIR: &str = ".armada/transcripts";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn armada_dir(root: &Path) -> PathBuf {
    root.join(ARMADA_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn queue_db_path(root: &Path) -> PathBuf {
    root.join(QUEUE_DB_FILE)
}

pub fn meta_db_path(root: &Path) -> PathBuf {
    root.join(META_DB_FILE)
}

pub fn transcripts_dir(root: &Path) -> PathBuf {
    root.join(TRANSCRIPTS_DIR)
}

/// Where the transcript for one command run lives. The token is filename-safe
/// for the subjects the feature layer is expected to choose (domain names).
pub fn transcript_path(root: &Path, resource_id: &str, token: &str) -> PathBuf {
    transcripts_dir(root)
        .join(resource_id)
        .join(format!("{token}.log"))
}
