//! Persistent storage for pending tasks using redb.
//!
//! # Table design
//!
//! A single `TASKS` table uses a 24-byte composite key:
//! ```text
//! [ created_at_ms: u64 big-endian (8 bytes) | uuid: 16 bytes ]
//! ```
//!
//! Because the timestamp occupies the high bytes in big-endian encoding,
//! byte ordering equals creation ordering, so a plain table scan yields
//! tasks oldest-first. The runner relies on this to promote `ready` tasks
//! in the order they were enqueued.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use tracing::info;
use uuid::Uuid;

use crate::error::{ArmadaError, Result};

use super::task::{PendingTask, TaskState};

// ---------------------------------------------------------------------------
// Table definition
// ---------------------------------------------------------------------------

/// Key: 24-byte composite (created_at_ms big-endian ++ uuid bytes)
/// Value: JSON-encoded PendingTask
const TASKS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("tasks");

fn task_key(created_at: DateTime<Utc>, id: Uuid) -> [u8; 24] {
    let mut key = [0u8; 24];
    let ms = created_at.timestamp_millis().max(0) as u64;
    key[..8].copy_from_slice(&ms.to_be_bytes());
    key[8..].copy_from_slice(id.as_bytes());
    key
}

// ---------------------------------------------------------------------------
// TaskDb
// ---------------------------------------------------------------------------

/// Persistent store for `PendingTask` records. Tasks are never deleted; the
/// table is the audit trail.
pub struct TaskDb {
    db: Database,
}

impl TaskDb {
    /// Open or create the redb database at `path`, ensuring the table exists
    /// before any reads.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(|e| ArmadaError::QueueDb(e.to_string()))?;
        let wt = db
            .begin_write()
            .map_err(|e| ArmadaError::QueueDb(e.to_string()))?;
        wt.open_table(TASKS)
            .map_err(|e| ArmadaError::QueueDb(e.to_string()))?;
        wt.commit().map_err(|e| ArmadaError::QueueDb(e.to_string()))?;
        Ok(Self { db })
    }

    /// Insert a new task record. The key is derived from `created_at`.
    pub fn insert(&self, task: &PendingTask) -> Result<()> {
        let key = task_key(task.created_at, task.id);
        let value = serde_json::to_vec(task).map_err(|e| ArmadaError::QueueDb(e.to_string()))?;
        let wt = self
            .db
            .begin_write()
            .map_err(|e| ArmadaError::QueueDb(e.to_string()))?;
        {
            let mut table = wt
                .open_table(TASKS)
                .map_err(|e| ArmadaError::QueueDb(e.to_string()))?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(|e| ArmadaError::QueueDb(e.to_string()))?;
        }
        wt.commit().map_err(|e| ArmadaError::QueueDb(e.to_string()))?;
        Ok(())
    }

    /// Fetch a task by id, scanning the table.
    pub fn get(&self, id: Uuid) -> Result<PendingTask> {
        self.list_all()?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| ArmadaError::TaskNotFound(id.to_string()))
    }

    /// Move a task to `new_state`, optionally replacing its payload and
    /// setting a result message.
    ///
    /// Transitions outside the lifecycle diagram are rejected and the stored
    /// record is left untouched.
    pub fn update_state(
        &self,
        id: Uuid,
        payload: Option<serde_json::Value>,
        new_state: TaskState,
        result_message: Option<String>,
    ) -> Result<PendingTask> {
        let mut task = self.get(id)?;
        if !task.state.can_transition_to(new_state) {
            return Err(ArmadaError::IllegalTransition {
                from: task.state.to_string(),
                to: new_state.to_string(),
            });
        }
        task.state = new_state;
        if let Some(payload) = payload {
            task.payload = payload;
        }
        if let Some(message) = result_message {
            task.result_message = Some(message);
        }
        task.updated_at = Utc::now();
        self.reinsert(&task)?;
        Ok(task)
    }

    /// Operator override: return a task to `ready` from outside the normal
    /// diagram, e.g. to retry a `failed` task or recover one stuck
    /// `in-process` because its completion never arrived.
    ///
    /// `complete` tasks are done and stay done; re-running one needs a new
    /// task record.
    pub fn force_ready(&self, id: Uuid) -> Result<PendingTask> {
        let mut task = self.get(id)?;
        match task.state {
            TaskState::Ready => return Ok(task),
            TaskState::Complete => {
                return Err(ArmadaError::IllegalTransition {
                    from: task.state.to_string(),
                    to: TaskState::Ready.to_string(),
                })
            }
            _ => {}
        }
        info!(task = %task.id, from = %task.state, "task forced back to ready");
        task.state = TaskState::Ready;
        task.result_message = None;
        task.updated_at = Utc::now();
        self.reinsert(&task)?;
        Ok(task)
    }

    /// Tasks matching all of the given filters, oldest first. `None` filters
    /// match everything.
    pub fn find(
        &self,
        subject_resource_id: Option<&str>,
        state: Option<TaskState>,
        task_type: Option<&str>,
    ) -> Result<Vec<PendingTask>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|t| {
                subject_resource_id.map_or(true, |s| t.subject_resource_id == s)
                    && state.map_or(true, |s| t.state == s)
                    && task_type.map_or(true, |ty| t.task_type == ty)
            })
            .collect())
    }

    /// All tasks in creation order (oldest first), straight off the
    /// composite-key scan.
    pub fn list_all(&self) -> Result<Vec<PendingTask>> {
        let rt = self
            .db
            .begin_read()
            .map_err(|e| ArmadaError::QueueDb(e.to_string()))?;
        let table = rt
            .open_table(TASKS)
            .map_err(|e| ArmadaError::QueueDb(e.to_string()))?;

        let mut result = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| ArmadaError::QueueDb(e.to_string()))?
        {
            let (_, v) = entry.map_err(|e| ArmadaError::QueueDb(e.to_string()))?;
            let task: PendingTask =
                serde_json::from_slice(v.value()).map_err(|e| ArmadaError::QueueDb(e.to_string()))?;
            result.push(task);
        }
        Ok(result)
    }

    /// Remove the old record and reinsert with the same key but new value.
    fn reinsert(&self, task: &PendingTask) -> Result<()> {
        let key = task_key(task.created_at, task.id);
        let value = serde_json::to_vec(task).map_err(|e| ArmadaError::QueueDb(e.to_string()))?;
        let wt = self
            .db
            .begin_write()
            .map_err(|e| ArmadaError::QueueDb(e.to_string()))?;
        {
            let mut table = wt
                .open_table(TASKS)
                .map_err(|e| ArmadaError::QueueDb(e.to_string()))?;
            table
                .remove(key.as_slice())
                .map_err(|e| ArmadaError::QueueDb(e.to_string()))?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(|e| ArmadaError::QueueDb(e.to_string()))?;
        }
        wt.commit().map_err(|e| ArmadaError::QueueDb(e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
