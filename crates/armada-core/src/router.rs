//! The completion entry point: one invocation per finished remote command.
//!
//! The transport (or an inbound webhook) calls `on_complete` with nothing but
//! the resource id and the wire-form token; everything else is reconstructed
//! from the token, the captured transcript, and the store. The router is
//! tolerant of duplicates and malformed input: a second delivery re-clears an
//! already-clear guard and finds no in-process task, and a token that does
//! not decode is logged and dropped without touching any state.

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ArmadaError, Result};
use crate::events::{CompletionEvent, HandlerRegistry};
use crate::guard;
use crate::outcome::ScriptCatalog;
use crate::queue::{TaskDb, TaskState};
use crate::store::{fields, ResourceStore};
use crate::token::CommandToken;
use crate::transcript::TranscriptSource;

// ---------------------------------------------------------------------------
// CompletionOutcome
// ---------------------------------------------------------------------------

/// What processing one completion did. `None` from `on_complete` means the
/// token was invalid and nothing happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub verb: String,
    pub subject: String,
    pub success: bool,
    /// Task resolved to `complete`/`failed` by this completion, if any.
    pub resolved_task: Option<Uuid>,
    pub handlers_notified: usize,
}

// ---------------------------------------------------------------------------
// CompletionRouter
// ---------------------------------------------------------------------------

pub struct CompletionRouter<'a> {
    store: &'a dyn ResourceStore,
    transcripts: &'a dyn TranscriptSource,
    catalog: &'a ScriptCatalog,
    handlers: &'a HandlerRegistry,
    tasks: Option<&'a TaskDb>,
}

impl<'a> CompletionRouter<'a> {
    pub fn new(
        store: &'a dyn ResourceStore,
        transcripts: &'a dyn TranscriptSource,
        catalog: &'a ScriptCatalog,
        handlers: &'a HandlerRegistry,
        tasks: Option<&'a TaskDb>,
    ) -> Self {
        Self {
            store,
            transcripts,
            catalog,
            handlers,
            tasks,
        }
    }

    /// Process one completion signal for `(resource_id, raw_token)`.
    ///
    /// Guard release happens before handler dispatch and task resolution, so
    /// the resource becomes available again even if downstream work fails.
    pub fn on_complete(
        &self,
        resource_id: &str,
        raw_token: &str,
    ) -> Result<Option<CompletionOutcome>> {
        let Some(token) = CommandToken::parse(raw_token) else {
            warn!(resource = resource_id, token = raw_token, "invalid completion token ignored");
            return Ok(None);
        };

        let transcript = self.transcripts.fetch(resource_id, raw_token)?;
        let script = self.catalog.script_for(&token.verb);

        let (success, failure_reason) = match (&transcript, script) {
            (Some(text), Some(script)) => {
                if self.catalog.classify(text, script) {
                    (true, None)
                } else {
                    (
                        false,
                        Some(format!("success marker for '{script}' not found in transcript")),
                    )
                }
            }
            (None, _) => (
                false,
                Some(format!("no transcript captured for '{raw_token}'")),
            ),
            (_, None) => (
                false,
                Some(format!("no script registered for verb '{}'", token.verb)),
            ),
        };

        guard::release(self.store, resource_id)?;

        let event = CompletionEvent {
            verb: token.verb.clone(),
            resource_id: resource_id.to_string(),
            subject: token.subject.clone(),
            success,
        };
        let handlers_notified = self.handlers.publish(&event);

        let resolved_task = self.resolve_task(resource_id, &token, success, failure_reason)?;

        info!(
            resource = resource_id,
            verb = %token.verb,
            success,
            "completion processed"
        );
        Ok(Some(CompletionOutcome {
            verb: token.verb,
            subject: token.subject,
            success,
            resolved_task,
            handlers_notified,
        }))
    }

    /// Find the pending task this completion belongs to and resolve it.
    ///
    /// The temp-state pointer on the resource wins; without one, fall back to
    /// querying for the single in-process task whose action key matches the
    /// verb. The pointer is cleared in either case.
    fn resolve_task(
        &self,
        resource_id: &str,
        token: &CommandToken,
        success: bool,
        failure_reason: Option<String>,
    ) -> Result<Option<Uuid>> {
        let Some(db) = self.tasks else {
            return Ok(None);
        };

        let pointer = self.store.get(resource_id, fields::PENDING_TASK)?;
        self.store.delete(resource_id, fields::PENDING_TASK)?;

        let task = match pointer {
            Some(raw_id) => match raw_id.parse::<Uuid>() {
                Ok(id) => match db.get(id) {
                    Ok(task) => Some(task),
                    Err(ArmadaError::TaskNotFound(_)) => {
                        warn!(resource = resource_id, task = %raw_id, "pending-task pointer is dangling");
                        None
                    }
                    Err(e) => return Err(e),
                },
                Err(_) => {
                    warn!(resource = resource_id, pointer = %raw_id, "malformed pending-task pointer cleared");
                    None
                }
            },
            None => db
                .find(Some(resource_id), Some(TaskState::InProcess), None)?
                .into_iter()
                .find(|t| t.action_key == token.verb),
        };

        let Some(task) = task else {
            return Ok(None);
        };
        if task.state != TaskState::InProcess {
            // Duplicate delivery or a task an operator already moved on.
            return Ok(None);
        }

        let new_state = if success {
            TaskState::Complete
        } else {
            TaskState::Failed
        };
        let message = if success {
            None
        } else {
            Some(failure_reason.unwrap_or_else(|| "command failed".to_string()))
        };
        db.update_state(task.id, None, new_state, message)?;
        Ok(Some(task.id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::PendingTask;
    use crate::store::MemoryStore;
    use crate::transcript::MemoryTranscripts;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        store: MemoryStore,
        transcripts: MemoryTranscripts,
        catalog: ScriptCatalog,
        handlers: HandlerRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: MemoryStore::new(),
                transcripts: MemoryTranscripts::new(),
                catalog: ScriptCatalog::builtin(),
                handlers: HandlerRegistry::new(),
            }
        }

        fn router<'a>(&'a self, tasks: Option<&'a TaskDb>) -> CompletionRouter<'a> {
            CompletionRouter::new(
                &self.store,
                &self.transcripts,
                &self.catalog,
                &self.handlers,
                tasks,
            )
        }
    }

    const BACKUP_TOKEN: &str = "backup-run-manual---example.com---1700000000";

    #[test]
    fn success_completion_clears_guard_and_notifies() {
        let mut fx = Fixture::new();
        let successes = Arc::new(AtomicUsize::new(0));
        let s = successes.clone();
        fx.handlers.subscribe("backup-run-manual", move |e| {
            if e.success {
                s.fetch_add(1, Ordering::SeqCst);
            }
        });

        guard::acquire(&fx.store, "site-42", "backup-run-manual", &json!({})).unwrap();
        fx.transcripts.insert(
            "site-42",
            BACKUP_TOKEN,
            "archiving...\nBackup has been completed\n",
        );

        let outcome = fx
            .router(None)
            .on_complete("site-42", BACKUP_TOKEN)
            .unwrap()
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.verb, "backup-run-manual");
        assert_eq!(outcome.subject, "example.com");
        assert_eq!(outcome.handlers_notified, 1);
        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert!(!guard::is_busy(&fx.store, "site-42").unwrap());
    }

    #[test]
    fn invalid_token_is_ignored_without_side_effects() {
        let fx = Fixture::new();
        guard::acquire(&fx.store, "site-42", "backup-run-manual", &json!({})).unwrap();

        let outcome = fx.router(None).on_complete("site-42", "not-a-token").unwrap();
        assert!(outcome.is_none());
        // The guard survives: nothing was mutated.
        assert!(guard::is_busy(&fx.store, "site-42").unwrap());

        assert!(fx
            .router(None)
            .on_complete("site-42", "a---b---c---d")
            .unwrap()
            .is_none());
    }

    #[test]
    fn missing_transcript_classifies_as_failure_but_still_releases() {
        let fx = Fixture::new();
        guard::acquire(&fx.store, "site-42", "site-sync", &json!({})).unwrap();

        let outcome = fx
            .router(None)
            .on_complete("site-42", "site-sync---example.com---1700000000")
            .unwrap()
            .unwrap();
        assert!(!outcome.success);
        assert!(!guard::is_busy(&fx.store, "site-42").unwrap());
    }

    #[test]
    fn unknown_verb_classifies_as_failure() {
        let fx = Fixture::new();
        fx.transcripts
            .insert("site-1", "mystery---example.com---1", "all good");
        let outcome = fx
            .router(None)
            .on_complete("site-1", "mystery---example.com---1")
            .unwrap()
            .unwrap();
        assert!(!outcome.success);
    }

    #[test]
    fn duplicate_completion_is_idempotent() {
        let fx = Fixture::new();
        guard::acquire(&fx.store, "site-42", "backup-run-manual", &json!({})).unwrap();
        fx.transcripts
            .insert("site-42", BACKUP_TOKEN, "Backup has been completed");

        let router = fx.router(None);
        let first = router.on_complete("site-42", BACKUP_TOKEN).unwrap().unwrap();
        let second = router.on_complete("site-42", BACKUP_TOKEN).unwrap().unwrap();
        assert_eq!(first.success, second.success);
        assert!(!guard::is_busy(&fx.store, "site-42").unwrap());
    }

    #[test]
    fn pointer_linked_task_resolves_to_complete() {
        let fx = Fixture::new();
        let dir = TempDir::new().unwrap();
        let db = TaskDb::open(&dir.path().join("queue.redb")).unwrap();

        let task = PendingTask::new(
            "site-7",
            "delete-site",
            "delete-site",
            json!({}),
            TaskState::Ready,
            None,
            "",
        )
        .unwrap();
        db.insert(&task).unwrap();
        db.update_state(task.id, None, TaskState::InProcess, None)
            .unwrap();
        fx.store
            .set("site-7", fields::PENDING_TASK, &task.id.to_string())
            .unwrap();

        let token = "delete-site---old.example.com---1700000000";
        fx.transcripts
            .insert("site-7", token, "Site has been deleted");

        let outcome = fx
            .router(Some(&db))
            .on_complete("site-7", token)
            .unwrap()
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.resolved_task, Some(task.id));
        assert_eq!(db.get(task.id).unwrap().state, TaskState::Complete);
        // Pointer is cleared even on success.
        assert_eq!(fx.store.get("site-7", fields::PENDING_TASK).unwrap(), None);
    }

    #[test]
    fn query_fallback_finds_the_in_process_task() {
        let fx = Fixture::new();
        let dir = TempDir::new().unwrap();
        let db = TaskDb::open(&dir.path().join("queue.redb")).unwrap();

        let task = PendingTask::new(
            "site-3",
            "site-sync",
            "site-sync",
            json!({}),
            TaskState::Ready,
            None,
            "",
        )
        .unwrap();
        db.insert(&task).unwrap();
        db.update_state(task.id, None, TaskState::InProcess, None)
            .unwrap();

        // No pointer on the resource; the router queries instead.
        let token = "site-sync---example.com---1700000000";
        fx.transcripts.insert("site-3", token, "rsync: some files vanished\n");

        let outcome = fx
            .router(Some(&db))
            .on_complete("site-3", token)
            .unwrap()
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.resolved_task, Some(task.id));

        let task = db.get(task.id).unwrap();
        assert_eq!(task.state, TaskState::Failed);
        let message = task.result_message.unwrap();
        assert!(!message.is_empty());
        assert!(message.contains("site_sync.txt"));
    }

    #[test]
    fn dangling_pointer_is_cleared_and_ignored() {
        let fx = Fixture::new();
        let dir = TempDir::new().unwrap();
        let db = TaskDb::open(&dir.path().join("queue.redb")).unwrap();

        fx.store
            .set("site-9", fields::PENDING_TASK, &Uuid::new_v4().to_string())
            .unwrap();
        let token = "site-sync---example.com---1700000000";
        fx.transcripts.insert("site-9", token, "Site sync is complete");

        let outcome = fx
            .router(Some(&db))
            .on_complete("site-9", token)
            .unwrap()
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.resolved_task, None);
        assert_eq!(fx.store.get("site-9", fields::PENDING_TASK).unwrap(), None);
    }
}
