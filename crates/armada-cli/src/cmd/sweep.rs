use crate::output::print_json;
use armada_core::config::ArmadaConfig;
use armada_core::dispatch::LocalTransport;
use armada_core::paths;
use armada_core::queue::{self, ActionRegistry, TaskDb};
use armada_core::store::RedbStore;
use std::path::Path;
use std::sync::Arc;

/// One sweep of the background runner. Meant to be driven by cron or a
/// periodic timer; each run is independent.
pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = ArmadaConfig::load(root)?;
    let store = Arc::new(RedbStore::open(&paths::meta_db_path(root))?);
    let transport = Arc::new(LocalTransport::new(root));
    let db = TaskDb::open(&paths::queue_db_path(root))?;

    let mut registry = ActionRegistry::new();
    queue::register_dispatch_action(&mut registry, store, transport, config.window_seconds);

    let report = queue::sweep(&db, &registry)?;

    if json {
        print_json(&serde_json::json!({
            "started": report.started,
            "failed": report.failed,
        }))?;
    } else {
        println!("Sweep: {} started, {} failed", report.started, report.failed);
    }
    Ok(())
}
