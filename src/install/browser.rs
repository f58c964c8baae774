//! Browser and driver installation.
//!
//! Both archives unpack into a `.partial` sibling of their install
//! directory and are renamed into place once complete. Callers use the
//! stable aliases in `/usr/local/bin`, never the versioned directories.

use anyhow::{bail, Context, Result};
use std::fs;

use super::context::ProvisionContext;
use crate::artifact::{self, ArtifactSpec};
use crate::common::files::{make_executable, move_into_place, replace_symlink};
use crate::common::paths::{
    relative_target, Layout, CHROME_ALIAS, CHROME_BIN, CHROME_DIR, DRIVER_ALIAS, DRIVER_BIN,
    DRIVER_DIR,
};
use crate::common::temp::{cleanup_work_dir, prepare_work_dir};
use crate::env::EnvironmentBindings;
use crate::error::ProvisionError;
use crate::process::Cmd;
use crate::verify::Probe;

pub const CHROME_VERSION_PATTERN: &str = r"Chrom(e|ium) \d+";
pub const DRIVER_VERSION_PATTERN: &str = r"ChromeDriver \d+";

/// Flags the worker passes to the headless browser.
pub const CHROME_FLAGS: &str = "--headless --no-sandbox --disable-dev-shm-usage --disable-gpu";

/// One unpack target: archive, install directory, entry point, alias.
struct Target {
    artifact: &'static ArtifactSpec,
    dir: &'static str,
    bin: &'static str,
    alias: &'static str,
}

const TARGETS: &[Target] = &[
    Target {
        artifact: &artifact::BROWSER_ARCHIVE,
        dir: CHROME_DIR,
        bin: CHROME_BIN,
        alias: CHROME_ALIAS,
    },
    Target {
        artifact: &artifact::DRIVER_ARCHIVE,
        dir: DRIVER_DIR,
        bin: DRIVER_BIN,
        alias: DRIVER_ALIAS,
    },
];

/// Unpack, mark executable, alias, and publish bindings.
///
/// Version probes are attached to the step and run by the pipeline right
/// after this returns.
pub fn install(ctx: &ProvisionContext, env: &mut EnvironmentBindings) -> Result<()> {
    for target in TARGETS {
        unpack(ctx, target)
            .with_context(|| format!("installing {}", target.artifact.name))?;
        println!("  {} -> {}", target.alias, target.bin);
    }
    bind(env)?;
    Ok(())
}

/// Bindings this step contributes.
pub fn bind(env: &mut EnvironmentBindings) -> Result<(), ProvisionError> {
    env.set("CHROME_BIN", CHROME_ALIAS)?;
    env.set("CHROMEDRIVER_PATH", DRIVER_ALIAS)?;
    env.set("CHROME_FLAGS", CHROME_FLAGS)?;
    env.prepend("PATH", &[CHROME_DIR, DRIVER_DIR])?;
    Ok(())
}

/// Self-reported version of browser and driver, by install path.
pub fn probes(layout: &Layout) -> Vec<Probe> {
    vec![
        Probe::version("chrome", &layout.path(CHROME_BIN), CHROME_VERSION_PATTERN),
        Probe::version("chromedriver", &layout.path(DRIVER_BIN), DRIVER_VERSION_PATTERN),
    ]
}

/// The same probes through the stable aliases.
pub fn alias_probes(layout: &Layout) -> Vec<Probe> {
    vec![
        Probe::version("google-chrome alias", &layout.path(CHROME_ALIAS), CHROME_VERSION_PATTERN),
        Probe::version("chromedriver alias", &layout.path(DRIVER_ALIAS), DRIVER_VERSION_PATTERN),
    ]
}

fn unpack(ctx: &ProvisionContext, target: &Target) -> Result<()> {
    let archive = ctx.store.check(target.artifact.id)?;
    let dest = ctx.layout.path(target.dir);
    let parent = dest
        .parent()
        .with_context(|| format!("{} has no parent", target.dir))?
        .to_path_buf();
    fs::create_dir_all(&parent)?;

    let dir_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = prepare_work_dir(&parent, &format!(".{}.partial", dir_name))?;

    Cmd::new("unzip")
        .args(["-q", "-o"])
        .arg_path(&archive)
        .arg("-d")
        .arg_path(&staging)
        .error_msg(format!("unzip of {} failed", archive.display()))
        .run_with(ctx.runner)?;

    // Archives carry a single top-level directory named like the install dir.
    let unpacked = staging.join(&dir_name);
    if !unpacked.is_dir() {
        cleanup_work_dir(&staging);
        bail!(
            "{} did not contain {}/",
            archive.display(),
            dir_name
        );
    }

    let entry_name = std::path::Path::new(target.bin)
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    if !unpacked.join(&entry_name).is_file() {
        cleanup_work_dir(&staging);
        bail!(
            "{} did not contain {}/{}",
            archive.display(),
            dir_name,
            entry_name.to_string_lossy()
        );
    }

    move_into_place(&unpacked, &dest)?;
    cleanup_work_dir(&staging);

    if target.artifact.executable {
        make_executable(&ctx.layout.path(target.bin))?;
    }

    replace_symlink(
        &relative_target(target.alias, target.bin),
        &ctx.layout.path(target.alias),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactId;

    #[test]
    fn test_targets_match_artifacts() {
        assert_eq!(TARGETS[0].artifact.id, ArtifactId::BrowserArchive);
        assert_eq!(TARGETS[1].artifact.id, ArtifactId::DriverArchive);
        for target in TARGETS {
            assert!(target.bin.starts_with(target.dir));
            assert_eq!(target.artifact.install_dest, Some(target.dir));
        }
    }

    #[test]
    fn test_bindings() {
        let mut env = EnvironmentBindings::new();
        env.prepend("PATH", &["/opt/oracle/instantclient"]).unwrap();
        bind(&mut env).unwrap();

        assert_eq!(
            env.entries("PATH"),
            vec![CHROME_DIR, DRIVER_DIR, "/opt/oracle/instantclient"]
        );
        assert_eq!(
            env.resolve("CHROMEDRIVER_PATH", None).unwrap(),
            "/usr/local/bin/chromedriver"
        );
    }

    #[test]
    fn test_probes_target_installed_binaries() {
        let layout = Layout::new("/scratch");
        let probes = probes(&layout);
        assert_eq!(probes[0].program, "/scratch/opt/chrome-linux64/chrome");
        assert_eq!(probes[0].args, vec!["--version"]);
        assert_eq!(
            probes[1].program,
            "/scratch/opt/chromedriver-linux64/chromedriver"
        );
    }
}
