use crate::output::print_json;
use anyhow::Context;
use armada_core::config::ArmadaConfig;
use armada_core::dispatch::{Disambiguator, Dispatcher, LocalTransport};
use armada_core::paths;
use armada_core::store::RedbStore;
use std::path::Path;

#[allow(clippy::too_many_arguments)]
pub fn run(
    root: &Path,
    resource: &str,
    verb: &str,
    subject: &str,
    command: &str,
    windowed: bool,
    context: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let config = ArmadaConfig::load(root)?;
    let args: serde_json::Value = match context {
        Some(raw) => serde_json::from_str(raw).context("--context is not valid JSON")?,
        None => serde_json::Value::Null,
    };

    let store = RedbStore::open(&paths::meta_db_path(root))?;
    let transport = LocalTransport::new(root);
    let dispatcher = Dispatcher::new(&store, &transport, config.window_seconds);

    let mode = if windowed {
        Disambiguator::Windowed
    } else {
        Disambiguator::OneShot
    };
    let token = dispatcher
        .dispatch(resource, verb, subject, command, mode, &args)
        .context("dispatch failed")?;

    if json {
        print_json(&serde_json::json!({
            "resource_id": resource,
            "token": token.to_string(),
        }))?;
    } else {
        println!("Dispatched {token}");
    }
    Ok(())
}
