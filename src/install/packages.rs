//! OS package installation through the configured mirror.
//!
//! The whole list goes to a single `apt-get install`, which resolves every
//! package before unpacking any of them, so an attempt either installs the
//! full set or fails without a partial selection.

use anyhow::Result;

use crate::mirror::AppliedMirror;
use crate::process::{Cmd, CommandRunner};
use crate::retry::{Attempted, RetryPolicy};

/// Packages the worker needs at runtime. Never purged.
pub const RUNTIME_PACKAGES: &[&str] = &[
    // === FETCH / UNPACK ===
    "ca-certificates",
    "unzip",
    "wget",
    // === HEADLESS DISPLAY ===
    "xvfb",
    "xauth",
    // === BROWSER RUNTIME LIBRARIES ===
    "fonts-liberation",
    "fonts-wqy-zenhei", // CJK glyphs for rendered pages
    "libasound2",
    "libatk-bridge2.0-0",
    "libatk1.0-0",
    "libcups2",
    "libdbus-1-3",
    "libdrm2",
    "libgbm1",
    "libgtk-3-0",
    "libnspr4",
    "libnss3",
    "libu2f-udev",
    "libvulkan1",
    "libxcomposite1",
    "libxdamage1",
    "libxkbcommon0",
    "libxrandr2",
    "libxss1",
    "xdg-utils",
    // === NATIVE DATABASE CLIENT ===
    "libaio1", // required by libclntsh
];

/// Build-only tooling. Purged by cleanup once verification passes.
pub const BUILD_PACKAGES: &[&str] = &[
    "alien", // RPM -> deb conversion
    "rpm",
    "gcc",
    "g++",
    "make",
    "libc6-dev",
];

/// Everything the package step installs, in one list.
pub fn all_packages() -> Vec<&'static str> {
    RUNTIME_PACKAGES
        .iter()
        .chain(BUILD_PACKAGES.iter())
        .copied()
        .collect()
}

/// Installs OS packages with a bounded fallback.
pub struct PackageInstaller<'a> {
    runner: &'a dyn CommandRunner,
    mirror: &'a AppliedMirror,
    policy: RetryPolicy,
}

impl<'a> PackageInstaller<'a> {
    pub fn new(runner: &'a dyn CommandRunner, mirror: &'a AppliedMirror) -> Self {
        Self {
            runner,
            mirror,
            policy: RetryPolicy::RefreshIndexOnce,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// `apt-get` pinned to the applied sources list only.
    fn apt(&self) -> Cmd {
        Cmd::new("apt-get")
            .env("DEBIAN_FRONTEND", "noninteractive")
            .arg("-o")
            .arg(format!(
                "Dir::Etc::sourcelist={}",
                self.mirror.sources_list.display()
            ))
            .args(["-o", "Dir::Etc::sourceparts=-"])
    }

    fn update(&self, fix_missing: bool) -> Result<()> {
        let mut cmd = self.apt().arg("update");
        if fix_missing {
            cmd = cmd.arg("--fix-missing");
        }
        cmd.error_msg("apt-get update failed")
            .run_with(self.runner)?;
        Ok(())
    }

    fn install_once(&self, packages: &[&str]) -> Result<()> {
        self.apt()
            .args(["install", "-y", "--no-install-recommends"])
            .args(packages)
            .error_msg("apt-get install failed")
            .run_with(self.runner)?;
        Ok(())
    }

    /// Install `packages` as one unit.
    ///
    /// First attempt: update the index from the mirror, then install.
    /// Fallback: `apt-get update --fix-missing`, then install once more.
    pub fn install(&self, step: &str, packages: &[&str]) -> Result<Attempted<()>> {
        println!(
            "  Installing {} packages from {}",
            packages.len(),
            self.mirror.source.primary
        );

        self.policy.run(
            step,
            |attempt| {
                if attempt == 1 {
                    self.update(false)?;
                }
                self.install_once(packages)
            },
            || self.update(true),
        )
    }
}
