//! APT mirror configuration.
//!
//! The source list is replaced wholesale on every run. Nothing inherited
//! from the base image survives, including drop-in files, so the result
//! depends only on the [`MirrorSource`] value.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::common::files::write_file_atomic;
use crate::common::paths::{Layout, APT_SOURCES_DIR, APT_SOURCES_LIST};

pub const DEFAULT_COMPONENTS: &[&str] = &["main", "contrib", "non-free", "non-free-firmware"];

/// Proof that the mirror configuration was written for this run.
#[derive(Debug, Clone)]
pub struct AppliedMirror {
    pub source: MirrorSource,
    /// Host path of the written sources list.
    pub sources_list: PathBuf,
}

/// Fully specified mirror set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSource {
    pub primary: String,
    pub security: String,
    pub suite: String,
    pub components: Vec<String>,
}

impl MirrorSource {
    /// Debian layout: primary, `-updates` on the primary, `-security` on the
    /// security mirror.
    pub fn debian(primary: &str, security: &str, suite: &str) -> Self {
        Self {
            primary: primary.trim_end_matches('/').to_string(),
            security: security.trim_end_matches('/').to_string(),
            suite: suite.to_string(),
            components: DEFAULT_COMPONENTS.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Repository URLs in priority order.
    pub fn urls(&self) -> Vec<&str> {
        vec![
            self.primary.as_str(),
            self.security.as_str(),
            self.primary.as_str(),
        ]
    }

    /// `sources.list` content.
    pub fn render(&self) -> String {
        let components = self.components.join(" ");
        format!(
            "# Generated by workerimg. Do not edit.\n\
             deb {primary} {suite} {components}\n\
             deb {security} {suite}-security {components}\n\
             deb {primary} {suite}-updates {components}\n",
            primary = self.primary,
            security = self.security,
            suite = self.suite,
            components = components,
        )
    }

    /// Overwrite the package-source configuration under `layout`.
    pub fn apply(&self, layout: &Layout) -> Result<AppliedMirror> {
        let drop_in_dir = layout.path(APT_SOURCES_DIR);
        if drop_in_dir.is_dir() {
            for entry in fs::read_dir(&drop_in_dir)
                .with_context(|| format!("Failed to read {}", drop_in_dir.display()))?
            {
                let path = entry?.path();
                let is_source = path
                    .extension()
                    .map(|ext| ext == "list" || ext == "sources")
                    .unwrap_or(false);
                if is_source {
                    fs::remove_file(&path)
                        .with_context(|| format!("Failed to remove {}", path.display()))?;
                }
            }
        }

        let sources_list = layout.path(APT_SOURCES_LIST);
        write_file_atomic(&sources_list, self.render())
            .context("Failed to write APT sources list")?;

        tracing::info!(primary = %self.primary, suite = %self.suite, "mirror configuration written");
        Ok(AppliedMirror {
            source: self.clone(),
            sources_list,
        })
    }
}
