//! The log collaborator boundary: where captured command output comes from.

use crate::error::Result;
use crate::paths;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// TranscriptSource
// ---------------------------------------------------------------------------

/// Fetch the captured transcript for one command run, keyed by the resource
/// and the full wire-form token.
pub trait TranscriptSource: Send + Sync {
    fn fetch(&self, resource_id: &str, token: &str) -> Result<Option<String>>;
}

// ---------------------------------------------------------------------------
// FileTranscripts
// ---------------------------------------------------------------------------

/// File-backed transcripts under `.armada/transcripts/<resource>/<token>.log`,
/// the layout `LocalTransport` writes.
pub struct FileTranscripts {
    root: PathBuf,
}

impl FileTranscripts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TranscriptSource for FileTranscripts {
    fn fetch(&self, resource_id: &str, token: &str) -> Result<Option<String>> {
        let path = paths::transcript_path(&self.root, resource_id, token);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(&path)?))
    }
}

// ---------------------------------------------------------------------------
// MemoryTranscripts
// ---------------------------------------------------------------------------

/// In-memory transcripts for tests and embedders.
#[derive(Default)]
pub struct MemoryTranscripts {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemoryTranscripts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, resource_id: &str, token: &str, text: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                (resource_id.to_string(), token.to_string()),
                text.to_string(),
            );
        }
    }
}

impl TranscriptSource for MemoryTranscripts {
    fn fetch(&self, resource_id: &str, token: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| crate::error::ArmadaError::Store(e.to_string()))?;
        Ok(entries
            .get(&(resource_id.to_string(), token.to_string()))
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::atomic_write;
    use tempfile::TempDir;

    #[test]
    fn file_transcripts_fetch() {
        let dir = TempDir::new().unwrap();
        let token = "delete-site---old.example.com---1700000000";
        let path = paths::transcript_path(dir.path(), "site-3", token);
        atomic_write(&path, b"Site has been deleted\n").unwrap();

        let source = FileTranscripts::new(dir.path());
        let text = source.fetch("site-3", token).unwrap().unwrap();
        assert!(text.contains("Site has been deleted"));
    }

    #[test]
    fn missing_transcript_is_none() {
        let dir = TempDir::new().unwrap();
        let source = FileTranscripts::new(dir.path());
        assert!(source.fetch("site-3", "a---b---c").unwrap().is_none());
    }

    #[test]
    fn memory_transcripts_roundtrip() {
        let source = MemoryTranscripts::new();
        source.insert("site-1", "a---b---c", "done");
        assert_eq!(source.fetch("site-1", "a---b---c").unwrap().as_deref(), Some("done"));
        assert!(source.fetch("site-1", "a---b---d").unwrap().is_none());
    }
}
