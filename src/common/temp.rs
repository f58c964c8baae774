//! Scratch directories for unpacking and package conversion.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Prepare a work directory, removing any leftover from an interrupted run.
///
/// A rerun of the pipeline starts from scratch, so stale `.partial`
/// directories are discarded rather than resumed.
pub fn prepare_work_dir(parent_dir: &Path, name: &str) -> Result<PathBuf> {
    let work_dir = parent_dir.join(name);

    if work_dir.exists() {
        fs::remove_dir_all(&work_dir)
            .with_context(|| format!("Failed to clear {}", work_dir.display()))?;
    }

    fs::create_dir_all(&work_dir)
        .with_context(|| format!("Failed to create {}", work_dir.display()))?;

    Ok(work_dir)
}

/// Remove a work directory. Missing directories are fine.
pub fn cleanup_work_dir(path: &Path) {
    let _ = fs::remove_dir_all(path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_work_dir_discards_leftovers() {
        let temp = TempDir::new().unwrap();
        let stale = temp.path().join(".unpack.partial");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("half-written"), "x").unwrap();

        let work = prepare_work_dir(temp.path(), ".unpack.partial").unwrap();
        assert!(work.is_dir());
        assert!(!work.join("half-written").exists());

        cleanup_work_dir(&work);
        assert!(!work.exists());
        // Idempotent
        cleanup_work_dir(&work);
    }
}
