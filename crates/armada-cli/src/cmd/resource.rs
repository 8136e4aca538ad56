use crate::output::print_json;
use armada_core::paths;
use armada_core::store::{fields, RedbStore, ResourceStore};
use armada_core::{guard, ArmadaError};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum ResourceSubcommand {
    /// Show the execution record for a resource
    Record { id: String },
    /// Manually clear a stuck resource (record and pending-task pointer)
    Clear { id: String },
}

pub fn run(root: &Path, subcmd: ResourceSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ResourceSubcommand::Record { id } => record(root, &id, json),
        ResourceSubcommand::Clear { id } => clear(root, &id, json),
    }
}

fn open_store(root: &Path) -> Result<RedbStore, ArmadaError> {
    RedbStore::open(&paths::meta_db_path(root))
}

fn record(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let record = guard::current(&store, id)?;
    let pending = store.get(id, fields::PENDING_TASK)?;

    if json {
        print_json(&match &record {
            Some(r) => serde_json::json!({
                "resource_id": id,
                "busy": true,
                "action": r.action,
                "args": r.args,
                "pending_task": pending,
            }),
            None => serde_json::json!({
                "resource_id": id,
                "busy": false,
                "pending_task": pending,
            }),
        })?;
    } else {
        match record {
            Some(r) => {
                println!("{id}: busy ({})", r.action);
                if let Some(task) = pending {
                    println!("  pending task: {task}");
                }
            }
            None => println!("{id}: idle"),
        }
    }
    Ok(())
}

fn clear(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    guard::release(&store, id)?;
    store.delete(id, fields::PENDING_TASK)?;
    tracing::info!(resource = id, "execution record cleared manually");

    if json {
        print_json(&serde_json::json!({ "resource_id": id, "cleared": true }))?;
    } else {
        println!("Cleared execution record for {id}");
    }
    Ok(())
}
