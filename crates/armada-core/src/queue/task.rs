//! The pending-task data model: one durable record per deferred operation.
//!
//! Tasks are an append-only audit trail. A record is never deleted; it moves
//! through the lifecycle below and stays in the database as evidence of what
//! ran and how it ended.
//!
//! ```text
//! not-ready --(dependency satisfied)--> ready
//! ready     --(runner picks up)------> in-process
//! in-process --(success completion)--> complete   [terminal]
//! in-process --(failure completion)--> failed     [terminal]
//! ```

use crate::error::{ArmadaError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TaskState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    /// Waiting on a prerequisite that has not resolved yet.
    NotReady,
    /// Eligible for the next runner sweep.
    Ready,
    /// Picked up by the runner; awaiting its completion signal.
    InProcess,
    /// Resolved successfully.
    Complete,
    /// Resolved as a failure. Not retried automatically.
    Failed,
}

impl TaskState {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::NotReady => "not-ready",
            TaskState::Ready => "ready",
            TaskState::InProcess => "in-process",
            TaskState::Complete => "complete",
            TaskState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Complete | TaskState::Failed)
    }

    /// Whether the lifecycle diagram allows moving from `self` to `target`.
    pub fn can_transition_to(self, target: TaskState) -> bool {
        matches!(
            (self, target),
            (TaskState::NotReady, TaskState::Ready)
                | (TaskState::Ready, TaskState::InProcess)
                | (TaskState::InProcess, TaskState::Complete)
                | (TaskState::InProcess, TaskState::Failed)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskState {
    type Err = ArmadaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "not-ready" => Ok(TaskState::NotReady),
            "ready" => Ok(TaskState::Ready),
            "in-process" => Ok(TaskState::InProcess),
            "complete" => Ok(TaskState::Complete),
            "failed" => Ok(TaskState::Failed),
            other => Err(ArmadaError::InvalidTaskState(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// PendingTask
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTask {
    pub id: Uuid,
    /// Resource the task concerns.
    pub subject_resource_id: String,
    /// String discriminator, e.g. "delete-site" or "update-themes-and-plugins".
    pub task_type: String,
    /// Correlates to a dispatcher action; the runner looks the action up by
    /// this key, and completion handlers match in-process tasks against it.
    pub action_key: String,
    /// Opaque argument map needed to resume the task.
    pub payload: serde_json::Value,
    pub state: TaskState,
    /// E.g. the server a site lives on, when the subject is the site.
    pub associated_resource_id: Option<String>,
    /// Human-readable audit text.
    pub description: String,
    /// Set when the task resolves as a failure.
    pub result_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PendingTask {
    /// Create a task in `Ready` or `NotReady`. Producers choose `NotReady`
    /// when a prerequisite command must resolve first; the prerequisite's
    /// completion handler flips the task to `Ready`.
    pub fn new(
        subject_resource_id: impl Into<String>,
        task_type: impl Into<String>,
        action_key: impl Into<String>,
        payload: serde_json::Value,
        initial_state: TaskState,
        associated_resource_id: Option<String>,
        description: impl Into<String>,
    ) -> Result<Self> {
        if !matches!(initial_state, TaskState::Ready | TaskState::NotReady) {
            return Err(ArmadaError::IllegalTransition {
                from: "(new)".to_string(),
                to: initial_state.to_string(),
            });
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            subject_resource_id: subject_resource_id.into(),
            task_type: task_type.into(),
            action_key: action_key.into(),
            payload,
            state: initial_state,
            associated_resource_id,
            description: description.into(),
            result_message: None,
            created_at: now,
            updated_at: now,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
