use std::path::{Path, PathBuf};

/// Resolve the armada control root.
///
/// An explicit `--root` flag or `ARMADA_ROOT` env var wins. Otherwise walk
/// upward from the working directory for a `.armada/` control directory,
/// then for a `.git/` repository root, and fall back to the working
/// directory itself.
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_up(&cwd, ".armada")
        .or_else(|| find_up(&cwd, ".git"))
        .unwrap_or(cwd)
}

fn find_up(start: &Path, marker: &str) -> Option<PathBuf> {
    let mut dir = start;
    loop {
        if dir.join(marker).is_dir() {
            return Some(dir.to_path_buf());
        }
        dir = dir.parent()?;
    }
}
