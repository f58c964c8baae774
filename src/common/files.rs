//! File operations that never leave a half-written result behind.

use anyhow::{bail, Context, Result};
use std::fs;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::Path;

/// Write a file by writing a sibling temp file and renaming it over the target.
///
/// Readers see either the old content or the new content, never a mix.
pub fn write_file_atomic<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, content: C) -> Result<()> {
    let path = path.as_ref();
    let parent = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .with_context(|| format!("{} has no file name", path.display()))?;
    let tmp = parent.join(format!(".{}.tmp", file_name.to_string_lossy()));

    fs::write(&tmp, content).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}

const MB: u64 = 1024 * 1024;

/// Size in whole megabytes, rounded up.
pub fn size_mb(bytes: u64) -> u64 {
    (bytes + MB - 1) / MB
}

/// Atomic write followed by a permission change.
pub fn write_file_mode<P: AsRef<Path>, C: AsRef<[u8]>>(
    path: P,
    content: C,
    mode: u32,
) -> Result<()> {
    let path = path.as_ref();
    write_file_atomic(path, content)?;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

/// Set mode 0755 on a file. Fails if the file does not exist.
pub fn make_executable(path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!("{} not found", path.display());
    }
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("Failed to chmod {}", path.display()))?;
    Ok(())
}

/// True if `path` is a regular file with any execute bit set.
pub fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Point `link` at `target`, replacing whatever link was there before.
///
/// Refuses to replace a real file or directory.
pub fn replace_symlink(target: &Path, link: &Path) -> Result<()> {
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent)?;
    }

    if link.is_symlink() {
        if fs::read_link(link)? == target {
            return Ok(());
        }
        fs::remove_file(link)?;
    } else if link.exists() {
        bail!(
            "{} exists and is not a symlink, refusing to replace it",
            link.display()
        );
    }

    symlink(target, link).with_context(|| {
        format!(
            "Failed to link {} -> {}",
            link.display(),
            target.display()
        )
    })?;
    Ok(())
}

/// Replace `dest` with the fully staged directory `staged`.
///
/// `staged` must live on the same filesystem (a sibling of `dest`) so the
/// final rename cannot be observed half-done.
pub fn move_into_place(staged: &Path, dest: &Path) -> Result<()> {
    if dest.exists() || dest.is_symlink() {
        if dest.is_dir() && !dest.is_symlink() {
            fs::remove_dir_all(dest)?;
        } else {
            fs::remove_file(dest)?;
        }
    }
    fs::rename(staged, dest).with_context(|| {
        format!(
            "Failed to move {} to {}",
            staged.display(),
            dest.display()
        )
    })?;
    Ok(())
}
