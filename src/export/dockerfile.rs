//! Dockerfile generation.
//!
//! The vendor tree and requirements are bind-mounted into the single
//! `RUN workerimg provision` step, so the archives never land in an image
//! layer. Everything the provisioner reads from its environment is passed on
//! the `RUN` line, so the build does not depend on the host shell.

use crate::common::paths::{PROVISIONER_BIN, REQUIREMENTS_STAGING, VENDOR_STAGING};
use crate::config::Config;
use crate::env::{EnvironmentBindings, Syntax};

/// Names of the staged inputs inside the build context.
pub const CONTEXT_VENDOR: &str = "vendor";
pub const CONTEXT_REQUIREMENTS: &str = "requirements.txt";
pub const CONTEXT_BINARY: &str = "workerimg";

pub const HEALTHCHECK: &str =
    "HEALTHCHECK --interval=60s --timeout=30s --retries=3 CMD [\"workerimg\", \"health\"]";

/// Bind mounts need BuildKit.
pub const SYNTAX_DIRECTIVE: &str = "# syntax=docker/dockerfile:1";

/// Single-quote for `sh`.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Configuration forwarded to the in-image provisioner.
fn provision_env(config: &Config) -> Vec<(&'static str, String)> {
    let mut vars = vec![
        ("IMAGE_NAME", config.image_name.clone()),
        ("IMAGE_TAG", config.image_tag.clone()),
        ("APT_MIRROR", config.apt_mirror.clone()),
        ("APT_SECURITY_MIRROR", config.apt_security_mirror.clone()),
        ("DEBIAN_SUITE", config.suite.clone()),
        ("CX_ORACLE_VERSION", config.cx_oracle_version.clone()),
        ("WORKER_DISPLAY", config.display.clone()),
    ];
    if let Some(index) = &config.pip_index_url {
        vars.push(("PIP_INDEX_URL", index.clone()));
    }
    vars
}

/// Render the Dockerfile for `config`, exporting `env`.
pub fn render(config: &Config, env: &EnvironmentBindings) -> String {
    let mut out = String::new();
    out.push_str(SYNTAX_DIRECTIVE);
    out.push('\n');
    out.push_str("# Generated by workerimg. Do not edit.\n");
    out.push_str(&format!("FROM {}\n\n", config.base_image));

    out.push_str(&format!("COPY {} {}\n\n", CONTEXT_BINARY, PROVISIONER_BIN));

    out.push_str(&format!(
        "RUN --mount=type=bind,source={},target={} \\\n",
        CONTEXT_VENDOR, VENDOR_STAGING
    ));
    out.push_str(&format!(
        "    --mount=type=bind,source={},target={} \\\n",
        CONTEXT_REQUIREMENTS, REQUIREMENTS_STAGING
    ));
    out.push_str(&format!("    chmod 0755 {} \\\n", PROVISIONER_BIN));
    out.push_str(" && env");
    for (key, value) in provision_env(config) {
        out.push_str(&format!(" \\\n    {}={}", key, quote(&value)));
    }
    out.push_str(&format!(
        " \\\n    workerimg provision --vendor-dir {} --requirements {}\n\n",
        VENDOR_STAGING, REQUIREMENTS_STAGING
    ));

    for binding in env.iter() {
        out.push_str(&format!(
            "ENV {}=\"{}\"\n",
            binding.name,
            env.render_value(binding, Syntax::Dockerfile)
        ));
    }
    out.push('\n');
    out.push_str(HEALTHCHECK);
    out.push('\n');
    out
}
