//! Background promotion of `ready` tasks.
//!
//! One sweep is one stateless invocation: select every `ready` task in
//! creation order, move it to `in-process`, and invoke the action registered
//! for its `action_key`. Actions either hand a command to the dispatcher (the
//! completion router resolves the task later) or do their work synchronously
//! and resolve the task themselves.
//!
//! An action that errors marks its task `failed` on the spot; the sweep
//! continues with the remaining tasks.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::dispatch::{Disambiguator, Dispatcher, Transport};
use crate::error::{ArmadaError, Result};
use crate::store::{fields, ResourceStore};

use super::db::TaskDb;
use super::task::{PendingTask, TaskState};

// ---------------------------------------------------------------------------
// ActionRegistry
// ---------------------------------------------------------------------------

type Action = Box<dyn Fn(&PendingTask) -> Result<()> + Send + Sync>;

/// Actions the runner can invoke, keyed by a task's `action_key`.
#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Action>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, action_key: impl Into<String>, action: F)
    where
        F: Fn(&PendingTask) -> Result<()> + Send + Sync + 'static,
    {
        self.actions.insert(action_key.into(), Box::new(action));
    }

    fn get(&self, action_key: &str) -> Option<&Action> {
        self.actions.get(action_key)
    }
}

/// Register the built-in `"dispatch"` action: a task whose payload carries
/// `verb`, `subject`, and `command` is promoted straight into the dispatcher
/// against its subject resource. An optional `"mode": "windowed"` selects the
/// dedup-bucket disambiguator.
///
/// After submission the task's id is written to the resource's
/// `pending_task` pointer so the completion router can resolve the task when
/// the signal arrives.
pub fn register_dispatch_action(
    registry: &mut ActionRegistry,
    store: Arc<dyn ResourceStore>,
    transport: Arc<dyn Transport>,
    window_seconds: u64,
) {
    registry.register("dispatch", move |task| {
        let verb = payload_str(&task.payload, "verb")?;
        let subject = payload_str(&task.payload, "subject")?;
        let command = payload_str(&task.payload, "command")?;
        let mode = match task.payload.get("mode").and_then(Value::as_str) {
            Some("windowed") => Disambiguator::Windowed,
            _ => Disambiguator::OneShot,
        };

        let dispatcher = Dispatcher::new(store.as_ref(), transport.as_ref(), window_seconds);
        dispatcher.dispatch(
            &task.subject_resource_id,
            verb,
            subject,
            command,
            mode,
            &task.payload,
        )?;
        store.set(
            &task.subject_resource_id,
            fields::PENDING_TASK,
            &task.id.to_string(),
        )?;
        Ok(())
    });
}

fn payload_str<'a>(payload: &'a Value, field: &str) -> Result<&'a str> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ArmadaError::MissingPayloadField(field.to_string()))
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------

/// What one sweep did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Tasks moved `ready -> in-process` and started.
    pub started: usize,
    /// Tasks marked `failed` because their action was missing or errored.
    pub failed: usize,
}

/// Promote every `ready` task once, oldest first.
pub fn sweep(db: &TaskDb, registry: &ActionRegistry) -> Result<SweepReport> {
    let ready = db.find(None, Some(TaskState::Ready), None)?;
    let mut report = SweepReport::default();

    for task in ready {
        let task = db.update_state(task.id, None, TaskState::InProcess, None)?;
        info!(task = %task.id, action = %task.action_key, "task picked up");

        match registry.get(&task.action_key) {
            None => {
                warn!(task = %task.id, action = %task.action_key, "no action registered");
                db.update_state(
                    task.id,
                    None,
                    TaskState::Failed,
                    Some(format!("no action registered for '{}'", task.action_key)),
                )?;
                report.failed += 1;
            }
            Some(action) => match action(&task) {
                Ok(()) => report.started += 1,
                Err(e) => {
                    warn!(task = %task.id, error = %e, "action failed at start");
                    db.update_state(task.id, None, TaskState::Failed, Some(e.to_string()))?;
                    report.failed += 1;
                }
            },
        }
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
