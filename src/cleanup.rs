//! Removal of build-only tooling and caches.
//!
//! Runs last and only with a [`Verified`] token in hand. Every removal path
//! is checked against the runtime paths first; any overlap aborts before
//! anything is purged.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::common::paths::{
    Layout, APT_LISTS_DIR, CHROME_ALIAS, CHROME_DIR, DRIVER_ALIAS, DRIVER_DIR, ENV_PROFILE,
    LD_CONF, MANIFEST, ORACLE_BASE, PIP_CACHE, PROVISIONER_BIN, PYTHON_LIB, WORK_DIR,
};
use crate::error::ProvisionError;
use crate::install::packages::BUILD_PACKAGES;
use crate::process::{Cmd, CommandRunner};
use crate::verify::Verified;

/// Paths the worker needs at runtime.
pub const PROTECTED_PATHS: &[&str] = &[
    CHROME_DIR,
    DRIVER_DIR,
    CHROME_ALIAS,
    DRIVER_ALIAS,
    ORACLE_BASE,
    "/u01/obclient",
    LD_CONF,
    PROVISIONER_BIN,
    PYTHON_LIB,
    ENV_PROFILE,
    MANIFEST,
];

/// What cleanup will do.
#[derive(Debug, Clone)]
pub struct CleanupPlan {
    /// Packages purged together with their orphaned dependencies.
    pub purge: Vec<String>,
    /// Directories emptied but kept.
    pub empty_dirs: Vec<String>,
    /// Paths removed entirely.
    pub remove: Vec<String>,
}

impl CleanupPlan {
    pub fn standard() -> Self {
        Self {
            purge: BUILD_PACKAGES.iter().map(|p| p.to_string()).collect(),
            empty_dirs: vec![APT_LISTS_DIR.to_string()],
            remove: vec![PIP_CACHE.to_string(), WORK_DIR.to_string()],
        }
    }

    fn targets(&self) -> impl Iterator<Item = &str> {
        self.empty_dirs
            .iter()
            .chain(self.remove.iter())
            .map(String::as_str)
    }

    /// Reject any target equal to, inside, or containing a protected path.
    pub fn validate(&self, protected: &[&str]) -> Result<(), ProvisionError> {
        for target in self.targets() {
            let path = Path::new(target);
            if !path.is_absolute() {
                return Err(ProvisionError::UnsafeCleanup {
                    path: target.to_string(),
                    protected: "/".to_string(),
                });
            }
            for keep in protected {
                let keep_path = Path::new(keep);
                if path.starts_with(keep_path) || keep_path.starts_with(path) {
                    return Err(ProvisionError::UnsafeCleanup {
                        path: target.to_string(),
                        protected: keep.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Purge, clean the package cache, then remove files.
    pub fn run(
        &self,
        _verified: &Verified,
        runner: &dyn CommandRunner,
        layout: &Layout,
    ) -> Result<()> {
        self.validate(PROTECTED_PATHS)?;

        if !self.purge.is_empty() {
            println!("  Purging {} build-only packages", self.purge.len());
            Cmd::new("apt-get")
                .env("DEBIAN_FRONTEND", "noninteractive")
                .args(["purge", "-y", "--auto-remove"])
                .args(&self.purge)
                .error_msg("apt-get purge of build tooling failed")
                .run_with(runner)?;
        }

        Cmd::new("apt-get")
            .arg("clean")
            .error_msg("apt-get clean failed")
            .run_with(runner)?;

        for dir in &self.empty_dirs {
            empty_dir(&layout.path(dir))?;
        }
        for path in &self.remove {
            remove_path(&layout.path(path))?;
        }

        tracing::info!(
            purged = self.purge.len(),
            removed = self.empty_dirs.len() + self.remove.len(),
            "cleanup finished"
        );
        Ok(())
    }
}

fn empty_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        remove_path(&entry?.path())?;
    }
    Ok(())
}

fn remove_path(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(_) => return Ok(()),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
    .with_context(|| format!("Failed to remove {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::CommandResult;
    use crate::verify::{Expect, Probe, Verified, Verifier};
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<String>>,
    }

    impl CommandRunner for Recorder {
        fn execute(&self, cmd: &Cmd) -> Result<CommandResult> {
            self.calls.borrow_mut().push(cmd.to_string());
            Ok(CommandResult::ok(""))
        }
    }

    /// Token from a passing verification on its own runner.
    fn verified() -> Verified {
        let probes = vec![Probe::new("true", "true", &[], Expect::ExitCode(0))];
        Verifier::new(&Recorder::default(), probes).run().unwrap()
    }

    #[test]
    fn test_standard_plan_is_safe() {
        CleanupPlan::standard().validate(PROTECTED_PATHS).unwrap();
    }

    #[test]
    fn test_rejects_overlap_in_every_direction() {
        for bad in ["/opt/chrome-linux64", "/opt/chrome-linux64/chrome", "/opt", "/", "/usr/local/bin"] {
            let plan = CleanupPlan {
                purge: vec![],
                empty_dirs: vec![],
                remove: vec![bad.to_string()],
            };
            let err = plan.validate(PROTECTED_PATHS).unwrap_err();
            assert!(
                matches!(err, ProvisionError::UnsafeCleanup { .. }),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_sibling_prefix_is_not_overlap() {
        let plan = CleanupPlan {
            purge: vec![],
            empty_dirs: vec![],
            remove: vec!["/opt/chrome-linux64.partial".to_string()],
        };
        plan.validate(PROTECTED_PATHS).unwrap();
    }

    #[test]
    fn test_run_removes_targets_and_keeps_runtime() {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());
        fs::create_dir_all(layout.path(APT_LISTS_DIR)).unwrap();
        fs::write(layout.path(APT_LISTS_DIR).join("Packages"), "x").unwrap();
        fs::create_dir_all(layout.path(WORK_DIR).join("rpm")).unwrap();
        fs::create_dir_all(layout.path(CHROME_DIR)).unwrap();
        fs::write(layout.path(CHROME_DIR).join("chrome"), "bin").unwrap();

        let runner = Recorder::default();
        let verified = verified();
        CleanupPlan::standard().run(&verified, &runner, &layout).unwrap();

        assert!(layout.path(APT_LISTS_DIR).is_dir());
        assert_eq!(fs::read_dir(layout.path(APT_LISTS_DIR)).unwrap().count(), 0);
        assert!(!layout.path(WORK_DIR).exists());
        assert!(layout.path(CHROME_DIR).join("chrome").exists());

        let calls = runner.calls.borrow();
        assert!(calls[0].starts_with("apt-get purge -y --auto-remove alien"));
        assert_eq!(calls[1], "apt-get clean");
    }

    #[test]
    fn test_unsafe_plan_runs_nothing() {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());
        let runner = Recorder::default();
        let verified = verified();

        let plan = CleanupPlan {
            purge: vec!["gcc".to_string()],
            empty_dirs: vec![],
            remove: vec![ORACLE_BASE.to_string()],
        };
        assert!(plan.run(&verified, &runner, &layout).is_err());
        assert!(runner.calls.borrow().is_empty());
    }
}
