//! Preflight checks for image export.
//!
//! Validates the vendored artifacts and the container engine before any
//! build starts. Run with `workerimg preflight` to check everything is ready.

mod artifacts;
mod host_tools;
mod types;

use anyhow::{bail, Result};

use crate::artifact::ArtifactStore;
use crate::config::Config;
use crate::process::CommandRunner;

pub use artifacts::check_artifacts;
pub use host_tools::check_engine;
pub use types::{CheckResult, CheckStatus, PreflightReport};

/// Run all preflight checks.
pub fn run_preflight(config: &Config, runner: &dyn CommandRunner) -> PreflightReport {
    let mut checks = Vec::new();

    println!("Running preflight checks...\n");

    // =======================================================================
    // Vendored artifacts
    // =======================================================================
    println!("Checking vendored artifacts...");
    let store = ArtifactStore::new(&config.vendor_dir, &config.requirements);
    checks.extend(check_artifacts(&store));

    // =======================================================================
    // Container engine
    // =======================================================================
    println!("Checking container engine...");
    checks.extend(check_engine(&config.engine, runner));

    println!();

    PreflightReport { checks }
}

/// Run preflight and bail if any checks fail.
pub fn run_preflight_or_fail(config: &Config, runner: &dyn CommandRunner) -> Result<()> {
    let report = run_preflight(config, runner);
    report.print();

    if !report.all_passed() {
        bail!(
            "Preflight failed: {} check(s) failed. Fix the issues above before exporting.",
            report.fail_count()
        );
    }

    println!("All preflight checks passed!\n");
    Ok(())
}
