//! Build workspace directory.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::fetch::remove_if_exists;

/// Recreate `path` empty and return its absolute form.
///
/// Anything already at `path` (directory or file) is removed first, so every
/// run starts from a clean tree. Relative paths resolve against the current
/// directory, which is not changed.
pub fn prepare_workspace(path: &Path) -> Result<PathBuf> {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to read current directory")?
            .join(path)
    };

    remove_if_exists(&abs)?;
    fs::create_dir_all(&abs)
        .with_context(|| format!("Failed to create workspace {}", abs.display()))?;

    log::debug!("workspace ready: {}", abs.display());
    Ok(abs)
}
