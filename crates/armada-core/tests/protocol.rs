//! End-to-end exercises of the dispatch/completion protocol against real
//! redb databases: dispatch marks the resource busy, the "remote host"
//! leaves a transcript behind, and the completion router correlates the
//! signal back, classifies it, and resolves queued work.

use std::sync::{Arc, Mutex};

use serde_json::json;
use tempfile::TempDir;

use armada_core::dispatch::{Disambiguator, Dispatcher, Transport};
use armada_core::events::HandlerRegistry;
use armada_core::io::atomic_write;
use armada_core::outcome::ScriptCatalog;
use armada_core::queue::{
    register_dispatch_action, sweep, ActionRegistry, PendingTask, TaskDb, TaskState,
};
use armada_core::router::CompletionRouter;
use armada_core::store::RedbStore;
use armada_core::transcript::FileTranscripts;
use armada_core::{guard, paths, Result};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Accepts every submission and records it, standing in for the SSH layer.
/// Tests play the remote host by writing the transcript file themselves.
#[derive(Default)]
struct FakeRemote {
    submissions: Mutex<Vec<(String, String, String)>>,
}

impl Transport for FakeRemote {
    fn submit(&self, resource_id: &str, token: &str, command_text: &str) -> Result<()> {
        self.submissions.lock().unwrap().push((
            resource_id.to_string(),
            token.to_string(),
            command_text.to_string(),
        ));
        Ok(())
    }
}

struct Harness {
    dir: TempDir,
    store: Arc<RedbStore>,
    tasks: TaskDb,
    remote: Arc<FakeRemote>,
    catalog: ScriptCatalog,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(paths::armada_dir(dir.path())).unwrap();
        let store = Arc::new(RedbStore::open(&paths::meta_db_path(dir.path())).unwrap());
        let tasks = TaskDb::open(&paths::queue_db_path(dir.path())).unwrap();
        Self {
            dir,
            store,
            tasks,
            remote: Arc::new(FakeRemote::default()),
            catalog: ScriptCatalog::builtin(),
        }
    }

    fn write_transcript(&self, resource_id: &str, token: &str, text: &str) {
        let path = paths::transcript_path(self.dir.path(), resource_id, token);
        atomic_write(&path, text.as_bytes()).unwrap();
    }

    fn complete(
        &self,
        handlers: &HandlerRegistry,
        resource_id: &str,
        token: &str,
    ) -> Option<armada_core::router::CompletionOutcome> {
        let transcripts = FileTranscripts::new(self.dir.path());
        let router = CompletionRouter::new(
            self.store.as_ref(),
            &transcripts,
            &self.catalog,
            handlers,
            Some(&self.tasks),
        );
        router.on_complete(resource_id, token).unwrap()
    }
}

// ---------------------------------------------------------------------------
// One-shot backup
// ---------------------------------------------------------------------------

#[test]
fn one_shot_backup_round_trip() {
    let h = Harness::new();
    let dispatcher = Dispatcher::new(h.store.as_ref(), h.remote.as_ref(), 60);

    let token = dispatcher
        .dispatch(
            "site-42",
            "backup-run-manual",
            "example.com",
            "bash backup_restore.txt example.com",
            Disambiguator::OneShot,
            &json!({"kind": "manual"}),
        )
        .unwrap();
    assert!(guard::is_busy(h.store.as_ref(), "site-42").unwrap());

    // The remote host runs the script and leaves its output behind.
    h.write_transcript(
        "site-42",
        &token.to_string(),
        "creating archive\nuploading\nBackup has been completed\n",
    );

    let saw_success = Arc::new(Mutex::new(None));
    let mut handlers = HandlerRegistry::new();
    let seen = saw_success.clone();
    handlers.subscribe("backup-run-manual", move |e| {
        *seen.lock().unwrap() = Some(e.success);
    });

    let outcome = h
        .complete(&handlers, "site-42", &token.to_string())
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.subject, "example.com");
    assert_eq!(*saw_success.lock().unwrap(), Some(true));
    assert!(!guard::is_busy(h.store.as_ref(), "site-42").unwrap());
}

// ---------------------------------------------------------------------------
// Malformed token safety
// ---------------------------------------------------------------------------

#[test]
fn malformed_token_mutates_nothing() {
    let h = Harness::new();
    guard::acquire(h.store.as_ref(), "site-42", "site-sync", &json!({})).unwrap();

    let handlers = HandlerRegistry::new();
    for bad in ["", "one-part", "two---parts", "a---b---c---d"] {
        assert!(h.complete(&handlers, "site-42", bad).is_none());
    }
    assert!(guard::is_busy(h.store.as_ref(), "site-42").unwrap());
}

// ---------------------------------------------------------------------------
// Dedup window
// ---------------------------------------------------------------------------

#[test]
fn windowed_double_submit_collapses() {
    let h = Harness::new();
    // Hour-wide bucket so both dispatches land in the same window.
    let dispatcher = Dispatcher::new(h.store.as_ref(), h.remote.as_ref(), 3600);

    let a = dispatcher
        .dispatch(
            "site-7",
            "replace_domain",
            "example.com",
            "bash replace_domain.txt",
            Disambiguator::Windowed,
            &json!({}),
        )
        .unwrap();
    let b = dispatcher
        .dispatch(
            "site-7",
            "replace_domain",
            "example.com",
            "bash replace_domain.txt",
            Disambiguator::Windowed,
            &json!({}),
        )
        .unwrap();

    assert_eq!(a.disambiguator, b.disambiguator);
    assert_eq!(a.to_string(), b.to_string());
}

// ---------------------------------------------------------------------------
// Queued multi-step workflow
// ---------------------------------------------------------------------------

#[test]
fn queued_delete_site_runs_to_complete() {
    let h = Harness::new();

    let task = PendingTask::new(
        "site-7",
        "delete-site",
        "dispatch",
        json!({
            "verb": "delete-site",
            "subject": "old.example.com",
            "command": "bash delete_site.txt old.example.com",
        }),
        TaskState::Ready,
        Some("server-2".into()),
        "Delete old.example.com after the migration settles",
    )
    .unwrap();
    let task_id = task.id;
    h.tasks.insert(&task).unwrap();

    // Background sweep promotes the task and dispatches its command.
    let mut registry = ActionRegistry::new();
    register_dispatch_action(
        &mut registry,
        h.store.clone(),
        h.remote.clone(),
        60,
    );
    let report = sweep(&h.tasks, &registry).unwrap();
    assert_eq!(report.started, 1);
    assert_eq!(h.tasks.get(task_id).unwrap().state, TaskState::InProcess);
    assert!(guard::is_busy(h.store.as_ref(), "site-7").unwrap());

    // Days later, the completion arrives for the dispatched token.
    let (_, token, _) = h.remote.submissions.lock().unwrap()[0].clone();
    h.write_transcript("site-7", &token, "removing files\nSite has been deleted\n");

    let outcome = h
        .complete(&HandlerRegistry::new(), "site-7", &token)
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.resolved_task, Some(task_id));

    let resolved = h.tasks.get(task_id).unwrap();
    assert_eq!(resolved.id, task_id);
    assert_eq!(resolved.state, TaskState::Complete);
    assert!(!guard::is_busy(h.store.as_ref(), "site-7").unwrap());
}

// ---------------------------------------------------------------------------
// Failure path
// ---------------------------------------------------------------------------

#[test]
fn missing_sentinel_fails_the_associated_task() {
    let h = Harness::new();

    let task = PendingTask::new(
        "site-3",
        "update-themes-and-plugins",
        "dispatch",
        json!({
            "verb": "site-sync",
            "subject": "example.com",
            "command": "bash site_sync.txt example.com",
        }),
        TaskState::Ready,
        None,
        "Sync example.com to the staging server",
    )
    .unwrap();
    let task_id = task.id;
    h.tasks.insert(&task).unwrap();

    let mut registry = ActionRegistry::new();
    register_dispatch_action(&mut registry, h.store.clone(), h.remote.clone(), 60);
    sweep(&h.tasks, &registry).unwrap();

    let (_, token, _) = h.remote.submissions.lock().unwrap()[0].clone();
    // The script died partway: no sentinel in the output.
    h.write_transcript("site-3", &token, "rsync: connection unexpectedly closed\n");

    let outcome = h
        .complete(&HandlerRegistry::new(), "site-3", &token)
        .unwrap();
    assert!(!outcome.success);

    let failed = h.tasks.get(task_id).unwrap();
    assert_eq!(failed.state, TaskState::Failed);
    let message = failed.result_message.unwrap();
    assert!(!message.is_empty());

    // The guard is still released; the resource is not wedged.
    assert!(!guard::is_busy(h.store.as_ref(), "site-3").unwrap());
}

// ---------------------------------------------------------------------------
// Duplicate completion
// ---------------------------------------------------------------------------

#[test]
fn duplicate_completion_is_a_noop_second_time() {
    let h = Harness::new();

    let task = PendingTask::new(
        "site-7",
        "delete-site",
        "dispatch",
        json!({
            "verb": "delete-site",
            "subject": "old.example.com",
            "command": "bash delete_site.txt old.example.com",
        }),
        TaskState::Ready,
        None,
        "",
    )
    .unwrap();
    let task_id = task.id;
    h.tasks.insert(&task).unwrap();

    let mut registry = ActionRegistry::new();
    register_dispatch_action(&mut registry, h.store.clone(), h.remote.clone(), 60);
    sweep(&h.tasks, &registry).unwrap();

    let (_, token, _) = h.remote.submissions.lock().unwrap()[0].clone();
    h.write_transcript("site-7", &token, "Site has been deleted\n");

    let handlers = HandlerRegistry::new();
    let first = h.complete(&handlers, "site-7", &token).unwrap();
    assert_eq!(first.resolved_task, Some(task_id));

    // Transport retry: same token delivered again.
    let second = h.complete(&handlers, "site-7", &token).unwrap();
    assert!(second.success);
    assert_eq!(second.resolved_task, None);
    assert_eq!(h.tasks.get(task_id).unwrap().state, TaskState::Complete);
}

// ---------------------------------------------------------------------------
// Operator recovery
// ---------------------------------------------------------------------------

#[test]
fn stuck_task_recovers_via_force_ready() {
    let h = Harness::new();

    let task = PendingTask::new(
        "site-5",
        "delete-site",
        "dispatch",
        json!({
            "verb": "delete-site",
            "subject": "old.example.com",
            "command": "bash delete_site.txt old.example.com",
        }),
        TaskState::Ready,
        None,
        "",
    )
    .unwrap();
    h.tasks.insert(&task).unwrap();

    let mut registry = ActionRegistry::new();
    register_dispatch_action(&mut registry, h.store.clone(), h.remote.clone(), 60);
    sweep(&h.tasks, &registry).unwrap();

    // The completion never arrives. An operator clears the resource and
    // forces the task back to ready.
    guard::release(h.store.as_ref(), "site-5").unwrap();
    h.tasks.force_ready(task.id).unwrap();
    assert_eq!(h.tasks.get(task.id).unwrap().state, TaskState::Ready);

    // The next sweep picks it up again.
    let report = sweep(&h.tasks, &registry).unwrap();
    assert_eq!(report.started, 1);
    assert_eq!(h.remote.submissions.lock().unwrap().len(), 2);
}
