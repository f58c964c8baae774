//! Host-side image export.
//!
//! `PreflightCheck → Build → Export → Report`. Each phase maps to one
//! terminal state and exit code. Artifacts are checked before the engine, so
//! a missing artifact never gets as far as invoking it.

pub mod context;
pub mod dockerfile;

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::artifact::ArtifactStore;
use crate::common::files::size_mb;
use crate::config::Config;
use crate::error::ProvisionError;
use crate::pipeline::declared_environment;
use crate::preflight::{check_artifacts, check_engine, CheckResult, PreflightReport};
use crate::process::{Cmd, CommandRunner};
use crate::timing::Timer;

/// Terminal state of an export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    EngineUnavailable,
    ArtifactMissing,
    BuildFailed,
    ExportFailed,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::EngineUnavailable => 2,
            Outcome::ArtifactMissing => 3,
            Outcome::BuildFailed => 4,
            Outcome::ExportFailed => 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub outcome: Outcome,
    /// The exported archive, on success.
    pub archive: Option<PathBuf>,
    pub size_mb: Option<u64>,
    /// Why the run stopped, when it did not succeed.
    pub reason: Option<String>,
}

impl ExportReport {
    fn failed(outcome: Outcome, reason: String) -> Self {
        tracing::error!(?outcome, "{}", reason);
        println!("\n✗ {}", reason);
        Self {
            outcome,
            archive: None,
            size_mb: None,
            reason: Some(reason),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }
}

/// Drives the image build and export through the container engine.
pub struct ImageExporter<'a> {
    config: &'a Config,
    runner: &'a dyn CommandRunner,
    /// Provisioner binary copied into the build context.
    binary: PathBuf,
}

impl<'a> ImageExporter<'a> {
    pub fn new(config: &'a Config, runner: &'a dyn CommandRunner, binary: PathBuf) -> Self {
        Self {
            config,
            runner,
            binary,
        }
    }

    pub fn run(&self) -> ExportReport {
        let image = self.config.image_ref();
        println!("=== Exporting {} ===\n", image);

        println!("[1/4] preflight...");
        if let Err(report) = self.preflight() {
            return report;
        }

        println!("[2/4] build...");
        let timer = Timer::start("build");
        if let Err(e) = self.build() {
            return ExportReport::failed(Outcome::BuildFailed, format!("build failed: {:#}", e));
        }
        timer.finish();

        println!("[3/4] export...");
        let timer = Timer::start("export");
        let (archive, bytes) = match self.export() {
            Ok(exported) => exported,
            Err(e) => {
                return ExportReport::failed(
                    Outcome::ExportFailed,
                    format!("export failed: {:#}", e),
                )
            }
        };
        timer.finish();

        println!("[4/4] report...\n");
        let mb = size_mb(bytes);
        let file_name = self.config.export_file_name();
        println!("=== Export complete ===");
        println!("  Image:   {}", image);
        println!("  Archive: {} ({} MB)", archive.display(), mb);
        println!();
        println!("Load and run on the target host:");
        println!("  {} load -i {}", self.config.engine, file_name);
        println!("  {} run -d --name {} {}", self.config.engine, self.config.image_name, image);

        ExportReport {
            outcome: Outcome::Success,
            archive: Some(archive),
            size_mb: Some(mb),
            reason: None,
        }
    }

    /// Artifacts first, engine second.
    fn preflight(&self) -> Result<(), ExportReport> {
        let store = ArtifactStore::new(&self.config.vendor_dir, &self.config.requirements);
        let artifacts = check_artifacts(&store);
        let missing = first_failure(&artifacts);
        if let Some(reason) = missing {
            PreflightReport { checks: artifacts }.print();
            return Err(ExportReport::failed(Outcome::ArtifactMissing, reason));
        }

        let engine = check_engine(&self.config.engine, self.runner);
        let unavailable = first_failure(&engine).map(|reason| {
            ProvisionError::ToolUnavailable {
                tool: self.config.engine.clone(),
                reason,
            }
            .to_string()
        });
        let mut checks = artifacts;
        checks.extend(engine);
        PreflightReport { checks }.print();

        match unavailable {
            Some(reason) => Err(ExportReport::failed(Outcome::EngineUnavailable, reason)),
            None => Ok(()),
        }
    }

    fn build(&self) -> Result<()> {
        let env = declared_environment(self.config)?;
        let dockerfile = dockerfile::render(self.config, &env);
        let context = context::stage(self.config, &self.binary, &dockerfile)?;
        println!("  Context: {}", context.display());

        Cmd::new(&self.config.engine)
            .args(["build", "-t"])
            .arg(self.config.image_ref())
            .arg_path(&context)
            .env("DOCKER_BUILDKIT", "1")
            .error_msg(format!("{} build failed", self.config.engine))
            .run_with(self.runner)?;
        Ok(())
    }

    /// Save the image as a single file. Returns its path and size in bytes.
    fn export(&self) -> Result<(PathBuf, u64)> {
        fs::create_dir_all(&self.config.output_dir).with_context(|| {
            format!("Failed to create {}", self.config.output_dir.display())
        })?;
        let archive = self.config.output_dir.join(self.config.export_file_name());
        if archive.exists() {
            fs::remove_file(&archive)
                .with_context(|| format!("Failed to remove old {}", archive.display()))?;
        }

        Cmd::new(&self.config.engine)
            .args(["save", "-o"])
            .arg_path(&archive)
            .arg(self.config.image_ref())
            .error_msg(format!("{} save failed", self.config.engine))
            .run_with(self.runner)?;

        let bytes = fs::metadata(&archive)
            .with_context(|| format!("{} was not written", archive.display()))?
            .len();
        if bytes == 0 {
            bail!("{} is empty", archive.display());
        }
        Ok((archive, bytes))
    }
}

fn first_failure(checks: &[CheckResult]) -> Option<String> {
    checks.iter().find(|c| c.failed()).map(|c| match &c.details {
        Some(details) => format!("{}: {}", c.name, details),
        None => c.name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Outcome::Success.exit_code(), 0);
        assert_eq!(Outcome::EngineUnavailable.exit_code(), 2);
        assert_eq!(Outcome::ArtifactMissing.exit_code(), 3);
        assert_eq!(Outcome::BuildFailed.exit_code(), 4);
        assert_eq!(Outcome::ExportFailed.exit_code(), 5);
    }
}
