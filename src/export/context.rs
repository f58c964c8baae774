//! Build context staging.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::dockerfile::{CONTEXT_BINARY, CONTEXT_REQUIREMENTS, CONTEXT_VENDOR};
use crate::common::files::{make_executable, write_file_atomic};
use crate::common::temp::prepare_work_dir;
use crate::config::Config;

/// Lay out `<output>/context` with the vendor tree, requirements, the
/// provisioner binary and the Dockerfile. Any previous context is discarded.
pub fn stage(config: &Config, binary: &Path, dockerfile: &str) -> Result<PathBuf> {
    let context = prepare_work_dir(&config.output_dir, "context")?;

    let copied = copy_tree(&config.vendor_dir, &context.join(CONTEXT_VENDOR))?;
    println!("  Staged {} vendored file(s)", copied);

    fs::copy(&config.requirements, context.join(CONTEXT_REQUIREMENTS)).with_context(|| {
        format!("Failed to stage {}", config.requirements.display())
    })?;

    if !binary.is_file() {
        bail!("provisioner binary {} not found", binary.display());
    }
    let staged_binary = context.join(CONTEXT_BINARY);
    fs::copy(binary, &staged_binary)
        .with_context(|| format!("Failed to stage {}", binary.display()))?;
    make_executable(&staged_binary)?;

    write_file_atomic(context.join("Dockerfile"), dockerfile)?;
    Ok(context)
}

/// Copy a directory tree. Returns the number of files copied.
fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    fs::create_dir_all(dst)?;
    let mut count = 0;

    for entry in walkdir::WalkDir::new(src).follow_links(true) {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("{} escaped {}", entry.path().display(), src.display()))?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
            count += 1;
        }
    }
    Ok(count)
}
