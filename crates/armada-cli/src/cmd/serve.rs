use anyhow::Context;
use armada_core::config::ArmadaConfig;
use std::path::Path;

pub fn run(root: &Path, port: u16) -> anyhow::Result<()> {
    // Fail fast before binding if the control directory is missing.
    ArmadaConfig::load(root).context("run 'armada init' first")?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        tokio::select! {
            result = armada_server::serve(root.to_path_buf(), port) => result,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })
}
