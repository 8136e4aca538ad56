//! Per-resource key/value metadata store.
//!
//! All coordination state (busy flags, last-command bookkeeping, workflow
//! temp-state) lives here rather than in process memory, because every
//! invocation of the core is stateless and independent. Writes are
//! last-write-wins with no optimistic-concurrency check.

use crate::error::{ArmadaError, Result};
use redb::{Database, ReadableTable, TableDefinition};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// Well-known field names.
pub mod fields {
    /// Busy flag for the in-flight command.
    pub const ACTION_STATUS: &str = "action_status";
    /// Verb of the in-flight command.
    pub const ACTION: &str = "action";
    /// JSON snapshot of the dispatch arguments.
    pub const ACTION_ARGS: &str = "action_args";
    /// Temp-state pointer to the pending task awaiting this resource's
    /// completion, cleared by the completion router.
    pub const PENDING_TASK: &str = "pending_task";
}

// ---------------------------------------------------------------------------
// ResourceStore
// ---------------------------------------------------------------------------

/// Narrow contract over whatever persistence backs resource metadata.
///
/// `delete` of an absent field is a no-op, which is what makes guard release
/// idempotent all the way down.
pub trait ResourceStore: Send + Sync {
    fn get(&self, resource_id: &str, field: &str) -> Result<Option<String>>;
    fn set(&self, resource_id: &str, field: &str, value: &str) -> Result<()>;
    fn delete(&self, resource_id: &str, field: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store for tests and embedders that bring their own persistence.
#[derive(Default)]
pub struct MemoryStore {
    cells: Mutex<HashMap<(String, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResourceStore for MemoryStore {
    fn get(&self, resource_id: &str, field: &str) -> Result<Option<String>> {
        let cells = self
            .cells
            .lock()
            .map_err(|e| ArmadaError::Store(e.to_string()))?;
        Ok(cells.get(&(resource_id.to_string(), field.to_string())).cloned())
    }

    fn set(&self, resource_id: &str, field: &str, value: &str) -> Result<()> {
        let mut cells = self
            .cells
            .lock()
            .map_err(|e| ArmadaError::Store(e.to_string()))?;
        cells.insert(
            (resource_id.to_string(), field.to_string()),
            value.to_string(),
        );
        Ok(())
    }

    fn delete(&self, resource_id: &str, field: &str) -> Result<()> {
        let mut cells = self
            .cells
            .lock()
            .map_err(|e| ArmadaError::Store(e.to_string()))?;
        cells.remove(&(resource_id.to_string(), field.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RedbStore
// ---------------------------------------------------------------------------

/// Key: (resource id, field name). Value: the field's string value.
const RESOURCE_META: TableDefinition<(&str, &str), &str> = TableDefinition::new("resource_meta");

/// redb-backed store used by the CLI and server.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create the database at `path`, ensuring the table exists
    /// before any reads.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(|e| ArmadaError::Store(e.to_string()))?;
        let wt = db
            .begin_write()
            .map_err(|e| ArmadaError::Store(e.to_string()))?;
        wt.open_table(RESOURCE_META)
            .map_err(|e| ArmadaError::Store(e.to_string()))?;
        wt.commit().map_err(|e| ArmadaError::Store(e.to_string()))?;
        Ok(Self { db })
    }
}

impl ResourceStore for RedbStore {
    fn get(&self, resource_id: &str, field: &str) -> Result<Option<String>> {
        let rt = self
            .db
            .begin_read()
            .map_err(|e| ArmadaError::Store(e.to_string()))?;
        let table = rt
            .open_table(RESOURCE_META)
            .map_err(|e| ArmadaError::Store(e.to_string()))?;
        let value = table
            .get((resource_id, field))
            .map_err(|e| ArmadaError::Store(e.to_string()))?;
        Ok(value.map(|v| v.value().to_string()))
    }

    fn set(&self, resource_id: &str, field: &str, value: &str) -> Result<()> {
        debug!(resource = resource_id, field, "store set");
        let wt = self
            .db
            .begin_write()
            .map_err(|e| ArmadaError::Store(e.to_string()))?;
        {
            let mut table = wt
                .open_table(RESOURCE_META)
                .map_err(|e| ArmadaError::Store(e.to_string()))?;
            table
                .insert((resource_id, field), value)
                .map_err(|e| ArmadaError::Store(e.to_string()))?;
        }
        wt.commit().map_err(|e| ArmadaError::Store(e.to_string()))?;
        Ok(())
    }

    fn delete(&self, resource_id: &str, field: &str) -> Result<()> {
        debug!(resource = resource_id, field, "store delete");
        let wt = self
            .db
            .begin_write()
            .map_err(|e| ArmadaError::Store(e.to_string()))?;
        {
            let mut table = wt
                .open_table(RESOURCE_META)
                .map_err(|e| ArmadaError::Store(e.to_string()))?;
            // Absent key is fine; delete is idempotent.
            table
                .remove((resource_id, field))
                .map_err(|e| ArmadaError::Store(e.to_string()))?;
        }
        wt.commit().map_err(|e| ArmadaError::Store(e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
