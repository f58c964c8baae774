//! Failure taxonomy for provisioning and export.
//!
//! Plumbing uses `anyhow`; these typed errors ride inside the `anyhow::Error`
//! and are recovered with `downcast_ref` wherever an exit code or a
//! pipeline decision depends on the kind of failure.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A vendored artifact or build input is not present/readable.
    #[error("required artifact missing: {name} (expected at {path})")]
    ArtifactMissing { name: String, path: PathBuf },

    /// A host tool the current phase depends on is unavailable.
    #[error("required tool unavailable: {tool}: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    /// Installation failed and the retry policy is exhausted.
    #[error("step '{step}' failed after {attempts} attempt(s): {cause}")]
    FatalInstall {
        step: String,
        attempts: u32,
        cause: String,
    },

    /// Foreign package conversion, install, or library linking failed.
    #[error("step '{step}': {cause}")]
    ConversionOrLink { step: String, cause: String },

    /// An installed component failed its version/import probe.
    #[error("verification failed for {probe}: {reason}")]
    Verification { probe: String, reason: String },

    /// A later step tried to redefine an environment binding.
    #[error("environment binding {name} already set to '{existing}', refusing '{attempted}'")]
    BindingConflict {
        name: String,
        existing: String,
        attempted: String,
    },

    /// Cleanup would remove something the runtime depends on.
    #[error("cleanup refuses to remove {path}: overlaps protected path {protected}")]
    UnsafeCleanup { path: String, protected: String },
}

impl ProvisionError {
    /// True for failures detected before any expensive work starts.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ProvisionError::ArtifactMissing { .. } | ProvisionError::ToolUnavailable { .. }
        )
    }
}

/// Find the typed provisioning error inside an `anyhow` chain, if any.
pub fn find(err: &anyhow::Error) -> Option<&ProvisionError> {
    err.chain().find_map(|e| e.downcast_ref::<ProvisionError>())
}
