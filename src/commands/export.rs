//! Export command - builds the image and saves it as a single file.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::config::Config;
use crate::export::ImageExporter;
use crate::process::SystemRunner;

/// Execute the export command. Returns the process exit code.
pub fn cmd_export(config: &Config, binary: Option<PathBuf>) -> Result<i32> {
    let binary = match binary {
        Some(path) => path,
        None => std::env::current_exe().context("Failed to locate the workerimg binary")?,
    };
    let report = ImageExporter::new(config, &SystemRunner, binary).run();
    Ok(report.exit_code())
}
