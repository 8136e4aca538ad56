use crate::output::print_json;
use armada_core::config::ArmadaConfig;
use armada_core::events::HandlerRegistry;
use armada_core::outcome::ScriptCatalog;
use armada_core::paths;
use armada_core::queue::TaskDb;
use armada_core::router::CompletionRouter;
use armada_core::store::RedbStore;
use armada_core::transcript::FileTranscripts;
use std::path::Path;

pub fn run(root: &Path, resource: &str, token: &str, json: bool) -> anyhow::Result<()> {
    let config = ArmadaConfig::load(root)?;
    let catalog = ScriptCatalog::from_config(&config)?;
    let store = RedbStore::open(&paths::meta_db_path(root))?;
    let transcripts = FileTranscripts::new(root);
    let tasks = TaskDb::open(&paths::queue_db_path(root))?;
    let handlers = HandlerRegistry::new();

    let router = CompletionRouter::new(&store, &transcripts, &catalog, &handlers, Some(&tasks));
    let outcome = router.on_complete(resource, token)?;

    match outcome {
        None => {
            if json {
                print_json(&serde_json::json!({ "processed": false }))?;
            } else {
                println!("Ignored: token does not decode");
            }
        }
        Some(o) => {
            if json {
                print_json(&serde_json::json!({
                    "processed": true,
                    "verb": o.verb,
                    "subject": o.subject,
                    "success": o.success,
                    "resolved_task": o.resolved_task,
                }))?;
            } else {
                let result = if o.success { "success" } else { "failure" };
                println!("Completion for {} ({}): {result}", o.verb, o.subject);
                if let Some(id) = o.resolved_task {
                    println!("Resolved task {id}");
                }
            }
        }
    }
    Ok(())
}
