use crate::output::print_json;
use anyhow::Context;
use armada_core::config::ArmadaConfig;
use armada_core::io::ensure_dir;
use armada_core::paths;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    ensure_dir(&paths::armada_dir(root)).context("failed to create .armada/")?;
    ensure_dir(&paths::transcripts_dir(root))?;
    let created = ArmadaConfig::init(root).context("failed to write config")?;

    if json {
        print_json(&serde_json::json!({
            "root": root,
            "created": created,
        }))?;
    } else if created {
        println!("Initialized armada control directory at {}", root.display());
    } else {
        println!("Already initialized at {}", root.display());
    }
    Ok(())
}
