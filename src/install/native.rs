//! Native database client installation.
//!
//! Makes the Oracle Instant Client and the OceanBase client usable from
//! Python:
//! 1. Unpack the Instant Client bundle and link `instantclient` to it
//! 2. Convert the vendored RPMs to debs and install them
//! 3. Register both library directories with the dynamic linker
//! 4. Build the `cx_Oracle` adapter from source against them
//!
//! Every sub-step is fatal on failure. Broken native libraries are not
//! transient, so nothing here is retried.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::PathBuf;

use super::context::ProvisionContext;
use crate::artifact::ArtifactId;
use crate::common::files::{move_into_place, replace_symlink, write_file_atomic};
use crate::common::paths::{
    relative_target, INSTANTCLIENT_LINK, LD_CONF, OBCLIENT_BIN, OBCLIENT_LIB, ORACLE_BASE,
    WORK_DIR,
};
use crate::common::temp::{cleanup_work_dir, prepare_work_dir};
use crate::env::EnvironmentBindings;
use crate::error::ProvisionError;
use crate::process::Cmd;
use crate::verify::{Expect, Probe};

const STEP: &str = "native-runtime";

/// Foreign-format packages, converted and installed together.
pub const CLIENT_RPMS: &[ArtifactId] = &[ArtifactId::OracleClientRpm, ArtifactId::OceanBaseClientRpm];

/// Library directories, in search order.
pub const LIBRARY_DIRS: &[&str] = &[INSTANTCLIENT_LINK, OBCLIENT_LIB];

/// Executable directories, in search order.
pub const BIN_DIRS: &[&str] = &[INSTANTCLIENT_LINK, OBCLIENT_BIN];

/// Run all native sub-steps, then publish the bindings.
pub fn install(ctx: &ProvisionContext, env: &mut EnvironmentBindings) -> Result<()> {
    let versioned = unpack_bundle(ctx).map_err(|e| link_failure("unpack client bundle", e))?;
    println!("  Instant Client: {}/{}", ORACLE_BASE, versioned);

    install_client_packages(ctx).map_err(|e| link_failure("install client packages", e))?;
    register_libraries(ctx).map_err(|e| link_failure("register shared libraries", e))?;
    build_adapter(ctx).map_err(|e| link_failure("build cx_Oracle adapter", e))?;

    bind(env)?;
    Ok(())
}

/// Bindings this step contributes.
pub fn bind(env: &mut EnvironmentBindings) -> Result<(), ProvisionError> {
    env.set("ORACLE_HOME", INSTANTCLIENT_LINK)?;
    env.inherit("LD_LIBRARY_PATH")?;
    env.prepend("LD_LIBRARY_PATH", LIBRARY_DIRS)?;
    env.prepend("PATH", BIN_DIRS)?;
    Ok(())
}

/// The client library is known to the dynamic linker.
pub fn probes() -> Vec<Probe> {
    vec![Probe::new(
        "libclntsh",
        "ldconfig",
        &["-p"],
        Expect::Pattern(r"libclntsh\.so".to_string()),
    )]
}

fn link_failure(what: &str, err: anyhow::Error) -> anyhow::Error {
    if crate::error::find(&err).is_some() {
        return err;
    }
    ProvisionError::ConversionOrLink {
        step: STEP.to_string(),
        cause: format!("{}: {:#}", what, err),
    }
    .into()
}

/// Unpack the bundle next to its destination and point the stable link at it.
///
/// Returns the versioned directory name (e.g. `instantclient_21_12`).
fn unpack_bundle(ctx: &ProvisionContext) -> Result<String> {
    let archive = ctx.store.check(ArtifactId::NativeClientBundle)?;
    let base = ctx.layout.path(ORACLE_BASE);
    fs::create_dir_all(&base)?;

    let staging = prepare_work_dir(&base, ".unpack.partial")?;
    Cmd::new("unzip")
        .args(["-q", "-o"])
        .arg_path(&archive)
        .arg("-d")
        .arg_path(&staging)
        .error_msg("unzip of client bundle failed")
        .run_with(ctx.runner)?;

    let mut versioned: Vec<String> = fs::read_dir(&staging)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("instantclient_"))
        .collect();

    if versioned.len() != 1 {
        cleanup_work_dir(&staging);
        bail!(
            "expected exactly one instantclient_* directory in the bundle, found {}",
            versioned.len()
        );
    }
    let name = versioned.remove(0);

    move_into_place(&staging.join(&name), &base.join(&name))?;
    cleanup_work_dir(&staging);

    let target = relative_target(INSTANTCLIENT_LINK, &format!("{}/{}", ORACLE_BASE, name));
    replace_symlink(&target, &ctx.layout.path(INSTANTCLIENT_LINK))?;

    Ok(name)
}

/// Convert every vendored RPM, then install all debs with one dpkg call.
fn install_client_packages(ctx: &ProvisionContext) -> Result<()> {
    let work = prepare_work_dir(&ctx.layout.path(WORK_DIR), "rpm")?;

    for id in CLIENT_RPMS {
        let rpm = ctx.store.check(*id)?;
        println!(
            "  Converting {}",
            rpm.file_name().unwrap_or_default().to_string_lossy()
        );
        Cmd::new("alien")
            .args(["--to-deb", "--scripts"])
            .arg_path(&rpm)
            .dir(&work)
            .error_msg(format!("alien could not convert {}", rpm.display()))
            .run_with(ctx.runner)?;
    }

    let mut debs: Vec<PathBuf> = fs::read_dir(&work)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|ext| ext == "deb").unwrap_or(false))
        .collect();
    debs.sort();

    if debs.len() < CLIENT_RPMS.len() {
        bail!(
            "alien produced {} .deb file(s) for {} packages",
            debs.len(),
            CLIENT_RPMS.len()
        );
    }

    let mut dpkg = Cmd::new("dpkg").arg("-i");
    for deb in &debs {
        dpkg = dpkg.arg_path(deb);
    }
    dpkg.error_msg("dpkg could not install converted client packages")
        .run_with(ctx.runner)?;

    cleanup_work_dir(&work);
    Ok(())
}

/// Write the linker drop-in for both client library directories and refresh
/// the cache.
fn register_libraries(ctx: &ProvisionContext) -> Result<()> {
    for dir in LIBRARY_DIRS {
        let host = ctx.layout.path(dir);
        if !host.is_dir() {
            bail!("library directory {} missing after install", dir);
        }
    }

    let mut conf = String::new();
    for dir in LIBRARY_DIRS {
        conf.push_str(dir);
        conf.push('\n');
    }
    write_file_atomic(ctx.layout.path(LD_CONF), conf)
        .with_context(|| format!("Failed to write {}", LD_CONF))?;

    Cmd::new("ldconfig")
        .error_msg("ldconfig failed")
        .run_with(ctx.runner)?;
    Ok(())
}

/// Compile the adapter from source against the installed client.
fn build_adapter(ctx: &ProvisionContext) -> Result<()> {
    let requirement = format!("cx_Oracle=={}", ctx.config.cx_oracle_version);
    println!("  Building {} from source", requirement);

    let mut cmd = Cmd::new("python3")
        .args(["-m", "pip", "install", "--no-cache-dir"])
        .args(["--no-binary", "cx_Oracle"]);
    if let Some(index) = &ctx.config.pip_index_url {
        cmd = cmd.args(["-i", index.as_str()]);
    }
    cmd.arg(&requirement)
        .env("ORACLE_HOME", INSTANTCLIENT_LINK)
        .env("LD_LIBRARY_PATH", LIBRARY_DIRS.join(":"))
        .error_msg(format!("building {} failed", requirement))
        .run_with(ctx.runner)?;
    Ok(())
}
