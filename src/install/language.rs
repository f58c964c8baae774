//! Python dependency installation.
//!
//! The requirements file is opaque here: it is installed as-is and checked
//! for consistency afterwards.

use anyhow::Result;

use super::context::ProvisionContext;
use crate::artifact::ArtifactId;
use crate::install::native::LIBRARY_DIRS;
use crate::process::Cmd;
use crate::verify::{Expect, Probe};

/// `pip install -r <requirements>`, through the index mirror if configured.
pub fn install(ctx: &ProvisionContext) -> Result<()> {
    let requirements = ctx.store.check(ArtifactId::Requirements)?;

    let mut cmd = Cmd::new("python3").args(["-m", "pip", "install", "--no-cache-dir"]);
    if let Some(index) = &ctx.config.pip_index_url {
        cmd = cmd.args(["-i", index.as_str()]);
        println!("  Using package index {}", index);
    }
    cmd.arg("-r")
        .arg_path(&requirements)
        .error_msg("pip install of pinned requirements failed")
        .run_with(ctx.runner)?;
    Ok(())
}

/// Installed set is consistent and the browser binding imports.
pub fn probes() -> Vec<Probe> {
    vec![
        Probe::new(
            "pip check",
            "python3",
            &["-m", "pip", "check"],
            Expect::ExitCode(0),
        ),
        Probe::python("selenium", "import selenium; print(selenium.__version__)"),
    ]
}

/// The database adapter loads and initializes against the native client.
pub fn adapter_probe() -> Probe {
    Probe::new(
        "cx_Oracle",
        "python3",
        &[
            "-c",
            "import cx_Oracle; cx_Oracle.init_oracle_client(); print(cx_Oracle.clientversion())",
        ],
        Expect::Pattern(r"^\(\d+,".to_string()),
    )
    .with_env("LD_LIBRARY_PATH", &LIBRARY_DIRS.join(":"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probes_are_local_only() {
        let mut all = probes();
        all.push(adapter_probe());
        for probe in &all {
            assert_eq!(probe.program, "python3");
            assert!(!probe.args.iter().any(|a| a.contains("http")));
        }
    }
}
